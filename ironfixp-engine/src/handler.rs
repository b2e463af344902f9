/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection handler callback interface.
//!
//! The business layer sits behind this trait: it receives forwarded business
//! messages and lifecycle notifications for each accepted connection.

use async_trait::async_trait;
use ironfixp_core::codes::DisconnectReason;
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::types::SessionIdentity;

/// Verdict of the business layer on one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message was consumed normally.
    Continue,
    /// Suppress the downstream business effect of this message.
    ///
    /// The sequence number is still consumed; aborting never rolls the
    /// ledger back.
    Abort,
}

/// Callback interface for session lifecycle and business messages.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Called when a session reaches the established state.
    ///
    /// # Arguments
    /// * `identity` - The established session identity
    async fn on_established(&self, identity: &SessionIdentity);

    /// Called for every inbound business message applied to the ledger.
    ///
    /// # Arguments
    /// * `identity` - The session the message arrived on
    /// * `frame` - The framed business message
    async fn on_business_message(
        &self,
        identity: &SessionIdentity,
        frame: &BusinessFrame,
    ) -> DispatchOutcome;

    /// Called when a connection leaves the wire.
    ///
    /// # Arguments
    /// * `connection_id` - The transport connection identifier
    /// * `reason` - Why the connection disconnected
    async fn on_disconnect(&self, connection_id: u64, reason: DisconnectReason);
}

/// Default no-op handler: consumes every message, observes nothing.
#[derive(Debug, Default)]
pub struct NoOpConnectionHandler;

#[async_trait]
impl ConnectionHandler for NoOpConnectionHandler {
    async fn on_established(&self, _identity: &SessionIdentity) {}

    async fn on_business_message(
        &self,
        _identity: &SessionIdentity,
        _frame: &BusinessFrame,
    ) -> DispatchOutcome {
        DispatchOutcome::Continue
    }

    async fn on_disconnect(&self, _connection_id: u64, _reason: DisconnectReason) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfixp_core::types::{SeqNum, SessionId, SessionVerId, TemplateId};

    #[tokio::test]
    async fn test_noop_handler_continues() {
        let handler = NoOpConnectionHandler;
        let identity = SessionIdentity::new(SessionId::new(1), SessionVerId::new(1));
        let frame = BusinessFrame::encode(
            TemplateId::new(1),
            SessionId::new(1),
            7,
            SeqNum::new(1),
            b"order",
        );

        assert_eq!(
            handler.on_business_message(&identity, &frame).await,
            DispatchOutcome::Continue
        );
        handler.on_established(&identity).await;
        handler
            .on_disconnect(7, DisconnectReason::TransportClosed)
            .await;
    }
}
