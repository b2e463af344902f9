/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Resend decision port.
//!
//! Before a counterparty retransmit request reaches the replay engine, a
//! deployment-supplied policy decides whether to honour, refuse, or answer
//! it with a custom message. The policy is a pure decision function: it
//! performs no I/O, only composes the response handed to the sink.

use ironfixp_core::message::{ControlMessage, RetransmitRequest};
use ironfixp_core::types::SessionIdentity;
use tracing::warn;

/// Decision recorded in a [`ResendResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendDecision {
    /// Honour the request; the replay engine runs.
    Resend,
    /// Refuse the request with the default reject.
    Reject,
    /// Refuse the request with a custom message composed by the policy.
    RejectWith(ControlMessage),
}

/// One-shot response sink passed to the resend policy.
///
/// Exactly one of [`resend`](Self::resend), [`reject`](Self::reject) or
/// [`reject_with`](Self::reject_with) must be called; later calls are
/// ignored.
#[derive(Debug, Default)]
pub struct ResendResponse {
    decision: Option<ResendDecision>,
}

impl ResendResponse {
    /// Creates an empty response sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Honours the request.
    pub fn resend(&mut self) {
        self.record(ResendDecision::Resend);
    }

    /// Refuses the request with the default reject.
    pub fn reject(&mut self) {
        self.record(ResendDecision::Reject);
    }

    /// Refuses the request with a custom message.
    ///
    /// # Arguments
    /// * `message` - The message sent instead of the replayed records
    pub fn reject_with(&mut self, message: ControlMessage) {
        self.record(ResendDecision::RejectWith(message));
    }

    /// Returns the recorded decision, if the policy made one.
    #[must_use]
    pub fn decision(&self) -> Option<&ResendDecision> {
        self.decision.as_ref()
    }

    /// Consumes the sink, yielding the recorded decision.
    #[must_use]
    pub fn into_decision(self) -> Option<ResendDecision> {
        self.decision
    }

    fn record(&mut self, decision: ResendDecision) {
        if self.decision.is_some() {
            warn!("resend policy responded more than once; keeping first decision");
            return;
        }
        self.decision = Some(decision);
    }
}

/// Deployment-supplied policy over counterparty retransmit requests.
pub trait ResendRequestController: Send + Sync {
    /// Decides the fate of one retransmit request.
    ///
    /// # Arguments
    /// * `identity` - The requesting session
    /// * `request` - The parsed request
    /// * `corrected_end_seq_no` - The request's end bound clamped to the
    ///   highest sequence number actually persisted
    /// * `response` - Sink for exactly one decision
    fn on_resend(
        &self,
        identity: &SessionIdentity,
        request: &RetransmitRequest,
        corrected_end_seq_no: u64,
        response: &mut ResendResponse,
    );
}

/// Controller that honours every request. The default.
#[derive(Debug, Default)]
pub struct DefaultResendController;

impl ResendRequestController for DefaultResendController {
    fn on_resend(
        &self,
        _identity: &SessionIdentity,
        _request: &RetransmitRequest,
        _corrected_end_seq_no: u64,
        response: &mut ResendResponse,
    ) {
        response.resend();
    }
}
