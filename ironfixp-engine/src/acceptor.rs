/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Acceptor-side engine.
//!
//! [`FixpAcceptor`] owns the process-wide session state shared across all
//! accepted connections: the ledger registry, the negotiated identity table,
//! the authentication gate and the storage handles. Each accepted transport
//! connection gets its own [`ConnectionDriver`].
//!
//! After a process restart, [`FixpAcceptor::restore`] rebuilds the identity
//! table and the sequence ledgers from the ledger store, so counterparties
//! can re-establish their sessions without renegotiating.

use crate::driver::ConnectionDriver;
use crate::handler::ConnectionHandler;
use ironfixp_core::error::FixpError;
use ironfixp_replay::publication::Publication;
use ironfixp_replay::resend::ResendRequestController;
use ironfixp_replay::RetransmitHandler;
use ironfixp_session::auth::AuthenticationGate;
use ironfixp_session::config::SessionConfig;
use ironfixp_session::connection::FixpConnection;
use ironfixp_session::identity::SessionIdentityTable;
use ironfixp_session::sequence::LedgerRegistry;
use ironfixp_store::traits::{LedgerStore, MessageLog};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared acceptor state; one per process.
pub struct FixpAcceptor {
    ledgers: Arc<LedgerRegistry>,
    gate: Arc<AuthenticationGate>,
    identities: Arc<SessionIdentityTable>,
    config: SessionConfig,
    log: Arc<dyn MessageLog>,
    ledger_store: Arc<dyn LedgerStore>,
    handler: Arc<dyn ConnectionHandler>,
    resend_controller: Arc<dyn ResendRequestController>,
    retransmit_handler: Arc<dyn RetransmitHandler>,
    next_connection_id: AtomicU64,
}

impl FixpAcceptor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        gate: Arc<AuthenticationGate>,
        config: SessionConfig,
        log: Arc<dyn MessageLog>,
        ledger_store: Arc<dyn LedgerStore>,
        handler: Arc<dyn ConnectionHandler>,
        resend_controller: Arc<dyn ResendRequestController>,
        retransmit_handler: Arc<dyn RetransmitHandler>,
    ) -> Self {
        Self {
            ledgers: Arc::new(LedgerRegistry::new()),
            gate,
            identities: Arc::new(SessionIdentityTable::new()),
            config,
            log,
            ledger_store,
            handler,
            resend_controller,
            retransmit_handler,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Rebuilds in-process session state from the ledger store.
    ///
    /// Called once at startup, before any connection is accepted. Negotiated
    /// identities are reinstated (retired ones stay retired) and sequence
    /// ledgers resume from their last persisted snapshot.
    ///
    /// # Returns
    /// The number of session identities restored.
    ///
    /// # Errors
    /// Propagates ledger store failures.
    pub async fn restore(&self) -> Result<usize, FixpError> {
        let sessions = self.ledger_store.negotiated_sessions().await?;
        for (identity, active) in &sessions {
            self.identities.restore(identity, *active);
            if let Some(snapshot) = self.ledger_store.load_snapshot(identity.session_id).await? {
                self.ledgers.restore(identity.session_id, snapshot);
            }
            debug!(%identity, active, "session restored");
        }
        info!(count = sessions.len(), "session state restored");
        Ok(sessions.len())
    }

    /// Accepts one transport connection, yielding its driver.
    ///
    /// # Arguments
    /// * `publication` - Outbound side of the accepted connection
    #[must_use]
    pub fn accept(&self, publication: Arc<dyn Publication>) -> ConnectionDriver {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        debug!(connection_id, "connection accepted");

        let connection = FixpConnection::new(
            connection_id,
            Arc::clone(&self.ledgers),
            Arc::clone(&self.gate),
            Arc::clone(&self.identities),
            self.config.clone(),
            Instant::now(),
        );
        ConnectionDriver::new(
            connection,
            self.config.clone(),
            publication,
            Arc::clone(&self.log),
            Arc::clone(&self.ledger_store),
            Arc::clone(&self.handler),
            Arc::clone(&self.resend_controller),
            Arc::clone(&self.retransmit_handler),
        )
    }

    /// Returns the shared authentication gate.
    #[must_use]
    pub fn authentication_gate(&self) -> &Arc<AuthenticationGate> {
        &self.gate
    }
}

impl std::fmt::Debug for FixpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixpAcceptor")
            .field("identities", &self.identities)
            .field(
                "next_connection_id",
                &self.next_connection_id.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AcceptorBuilder;
    use bytes::Bytes;
    use ironfixp_core::codes::EstablishRejectCode;
    use ironfixp_core::frame::BusinessFrame;
    use ironfixp_core::message::{
        admin, ControlMessage, Establish, FinishedSending, Negotiate,
    };
    use ironfixp_core::types::{
        SeqNum, SessionId, SessionIdentity, SessionVerId, TemplateId, Timestamp,
    };
    use ironfixp_replay::publication::OfferOutcome;
    use ironfixp_store::MemoryStore;
    use parking_lot::Mutex;

    const SESSION_ID: u64 = 42;

    #[derive(Default)]
    struct CapturingPublication {
        published: Mutex<Vec<BusinessFrame>>,
    }

    impl CapturingPublication {
        fn published(&self) -> Vec<BusinessFrame> {
            self.published.lock().clone()
        }
    }

    impl Publication for CapturingPublication {
        fn offer(&self, frame: &BusinessFrame) -> OfferOutcome {
            self.published.lock().push(frame.clone());
            OfferOutcome::Success
        }
    }

    fn identity(ver: u64) -> SessionIdentity {
        SessionIdentity::new(SessionId::new(SESSION_ID), SessionVerId::new(ver))
    }

    fn negotiate(ver: u64) -> ControlMessage {
        ControlMessage::Negotiate(Negotiate {
            identity: identity(ver),
            timestamp: Timestamp::from_millis(1),
            entering_firm: 1,
            credentials: Bytes::new(),
        })
    }

    fn establish(ver: u64, next_seq_no: u64, last_received: u64) -> ControlMessage {
        ControlMessage::Establish(Establish {
            identity: identity(ver),
            timestamp: Timestamp::from_millis(2),
            keep_alive_interval_ms: 1_000,
            next_seq_no: SeqNum::new(next_seq_no),
            last_received_seq_no: last_received,
            credentials: Bytes::new(),
        })
    }

    fn acceptor(store: Arc<MemoryStore>) -> FixpAcceptor {
        AcceptorBuilder::new()
            .with_message_log(store.clone())
            .with_ledger_store(store)
            .build()
    }

    async fn drive_replay(driver: &mut ConnectionDriver) {
        for _ in 0..32 {
            driver.poll(Instant::now()).await.unwrap();
            if !driver.replay_in_progress() {
                return;
            }
        }
        panic!("replay did not complete within 32 polls");
    }

    #[tokio::test]
    async fn test_accept_assigns_distinct_connection_ids() {
        let acceptor = acceptor(Arc::new(MemoryStore::new()));
        let a = acceptor.accept(Arc::new(CapturingPublication::default()));
        let b = acceptor.accept(Arc::new(CapturingPublication::default()));
        assert_ne!(a.connection().connection_id(), b.connection().connection_id());
    }

    #[tokio::test]
    async fn test_restart_resumes_counters_without_renegotiation() {
        let store = Arc::new(MemoryStore::new());

        // First process lifetime: negotiate, exchange traffic.
        {
            let acceptor = acceptor(store.clone());
            let mut driver = acceptor.accept(Arc::new(CapturingPublication::default()));
            driver.on_control(negotiate(1)).await.unwrap();
            driver.on_control(establish(1, 1, 0)).await.unwrap();
            driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
            driver.send_business(TemplateId::new(2), b"m2").await.unwrap();
            driver
                .on_business(BusinessFrame::encode(
                    TemplateId::new(1),
                    SessionId::new(SESSION_ID),
                    1,
                    SeqNum::new(1),
                    b"order",
                ))
                .await
                .unwrap();
        }

        // Second lifetime over the same durable store.
        let acceptor = acceptor(store);
        assert_eq!(acceptor.restore().await.unwrap(), 1);

        let publication = Arc::new(CapturingPublication::default());
        let mut driver = acceptor.accept(publication);
        // The counterparty received everything; a plain re-Establish resumes.
        driver.on_control(establish(1, 2, 2)).await.unwrap();
        assert!(driver.connection().state().is_established());
        assert!(!driver.replay_in_progress());

        match &driver.drain_outbound()[0] {
            ControlMessage::EstablishAck(ack) => {
                assert_eq!(ack.last_incoming_seq_no, 1);
            }
            other => panic!("expected EstablishAck, got {other:?}"),
        }
        // The outbound stream continues where the first lifetime stopped.
        let seq = driver.send_business(TemplateId::new(2), b"m3").await.unwrap();
        assert_eq!(seq, SeqNum::new(3));
    }

    #[tokio::test]
    async fn test_restart_replays_unreceived_messages() {
        let store = Arc::new(MemoryStore::new());
        {
            let acceptor = acceptor(store.clone());
            let mut driver = acceptor.accept(Arc::new(CapturingPublication::default()));
            driver.on_control(negotiate(1)).await.unwrap();
            driver.on_control(establish(1, 1, 0)).await.unwrap();
            driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
            driver.send_business(TemplateId::new(2), b"m2").await.unwrap();
        }

        let acceptor = acceptor(store);
        acceptor.restore().await.unwrap();

        let publication = Arc::new(CapturingPublication::default());
        let mut driver = acceptor.accept(publication.clone());
        driver.on_control(establish(1, 1, 0)).await.unwrap();
        assert!(driver.replay_in_progress());
        drive_replay(&mut driver).await;

        let published = publication.published();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].seq_no().value(), 1);
        assert_eq!(published[1].seq_no().value(), 2);
        assert_eq!(published[2].template_id(), admin::REPLAY_COMPLETE);
        // Replayed records are rebound to the live connection.
        let live = driver.connection().connection_id();
        assert_eq!(published[0].connection_id(), live);
        assert_eq!(published[1].connection_id(), live);
    }

    #[tokio::test]
    async fn test_finished_session_stays_retired_after_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let acceptor = acceptor(store.clone());
            let mut driver = acceptor.accept(Arc::new(CapturingPublication::default()));
            driver.on_control(negotiate(1)).await.unwrap();
            driver.on_control(establish(1, 1, 0)).await.unwrap();
            driver
                .on_control(ControlMessage::FinishedSending(FinishedSending {
                    identity: identity(1),
                    last_seq_no: 0,
                }))
                .await
                .unwrap();
        }

        let acceptor = acceptor(store);
        acceptor.restore().await.unwrap();

        let mut driver = acceptor.accept(Arc::new(CapturingPublication::default()));
        driver.on_control(establish(1, 1, 0)).await.unwrap();
        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::EstablishReject(reject)
                if reject.code == EstablishRejectCode::Unnegotiated
        ));

        // A negotiation with a higher version id revives the session id.
        let mut driver = acceptor.accept(Arc::new(CapturingPublication::default()));
        driver.on_control(negotiate(2)).await.unwrap();
        driver.on_control(establish(2, 1, 0)).await.unwrap();
        assert!(driver.connection().state().is_established());
    }
}
