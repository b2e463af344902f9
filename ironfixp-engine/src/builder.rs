/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Fluent construction of a [`FixpAcceptor`].
//!
//! Every collaborator has a working default: an accept-all authentication
//! strategy, an in-memory store backing both the message log and the ledger
//! store, a no-op connection handler, a resend-everything controller and a
//! no-op retransmit observer. Production deployments override the pieces
//! they care about.

use crate::acceptor::FixpAcceptor;
use crate::handler::{ConnectionHandler, NoOpConnectionHandler};
use ironfixp_replay::resend::{DefaultResendController, ResendRequestController};
use ironfixp_replay::{NoOpRetransmitHandler, RetransmitHandler};
use ironfixp_session::auth::{AuthenticationGate, AuthenticationStrategy};
use ironfixp_session::config::SessionConfig;
use ironfixp_store::traits::{LedgerStore, MessageLog};
use ironfixp_store::MemoryStore;
use std::sync::Arc;

/// Builder for [`FixpAcceptor`].
#[derive(Default)]
pub struct AcceptorBuilder {
    config: SessionConfig,
    strategy: Option<Arc<dyn AuthenticationStrategy>>,
    log: Option<Arc<dyn MessageLog>>,
    ledger_store: Option<Arc<dyn LedgerStore>>,
    handler: Option<Arc<dyn ConnectionHandler>>,
    resend_controller: Option<Arc<dyn ResendRequestController>>,
    retransmit_handler: Option<Arc<dyn RetransmitHandler>>,
}

impl AcceptorBuilder {
    /// Creates a builder with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session configuration.
    #[must_use]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the authentication strategy evaluated on every handshake.
    #[must_use]
    pub fn with_auth_strategy(mut self, strategy: Arc<dyn AuthenticationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the durable log of sent business messages.
    #[must_use]
    pub fn with_message_log(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Sets the durable store for ledger snapshots and negotiated identities.
    #[must_use]
    pub fn with_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    /// Sets the business-layer connection handler.
    #[must_use]
    pub fn with_connection_handler(mut self, handler: Arc<dyn ConnectionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the policy deciding the fate of retransmit requests.
    #[must_use]
    pub fn with_resend_controller(
        mut self,
        controller: Arc<dyn ResendRequestController>,
    ) -> Self {
        self.resend_controller = Some(controller);
        self
    }

    /// Sets the observer of replayed business messages.
    #[must_use]
    pub fn with_retransmit_handler(mut self, handler: Arc<dyn RetransmitHandler>) -> Self {
        self.retransmit_handler = Some(handler);
        self
    }

    /// Builds the acceptor.
    ///
    /// When neither storage handle was provided, one shared in-memory store
    /// backs both, so replay and recovery see the same data.
    #[must_use]
    pub fn build(self) -> FixpAcceptor {
        let (log, ledger_store) = match (self.log, self.ledger_store) {
            (Some(log), Some(store)) => (log, store),
            (log, store) => {
                let memory = Arc::new(MemoryStore::new());
                (
                    log.unwrap_or_else(|| memory.clone()),
                    store.unwrap_or(memory),
                )
            }
        };
        let gate = match self.strategy {
            Some(strategy) => Arc::new(AuthenticationGate::new(strategy)),
            None => Arc::new(AuthenticationGate::default()),
        };

        FixpAcceptor::new(
            gate,
            self.config,
            log,
            ledger_store,
            self.handler
                .unwrap_or_else(|| Arc::new(NoOpConnectionHandler)),
            self.resend_controller
                .unwrap_or_else(|| Arc::new(DefaultResendController)),
            self.retransmit_handler
                .unwrap_or_else(|| Arc::new(NoOpRetransmitHandler)),
        )
    }
}

impl std::fmt::Debug for AcceptorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptorBuilder")
            .field("config", &self.config)
            .field("has_strategy", &self.strategy.is_some())
            .field("has_log", &self.log.is_some())
            .field("has_ledger_store", &self.ledger_store.is_some())
            .finish_non_exhaustive()
    }
}
