/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-layer control messages.
//!
//! Typed representations of the FIXP handshake and administrative messages.
//! The wire byte layout of each message is owned by the codec at the
//! transport boundary; the session layer works with these structs only.

use crate::codes::{EstablishRejectCode, NegotiationRejectCode, TerminationCode};
use crate::types::{SeqNum, SessionId, SessionIdentity, TemplateId, Timestamp};
use bytes::Bytes;

/// Reserved template identifiers for administrative frames emitted by the
/// replay engine onto the live transport.
pub mod admin {
    use crate::types::TemplateId;

    /// Administrative Sequence message standing in for gap-filled records.
    pub const SEQUENCE: TemplateId = TemplateId::new(u16::MAX);
    /// Marker signalling that a retransmit session has finished.
    pub const REPLAY_COMPLETE: TemplateId = TemplateId::new(u16::MAX - 1);
}

/// First message of a handshake; creates a new logical session version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiate {
    /// Presented session identity.
    pub identity: SessionIdentity,
    /// Client send time, echoed on the response.
    pub timestamp: Timestamp,
    /// Identifier of the firm entering the session.
    pub entering_firm: u32,
    /// Opaque credentials evaluated by the authentication strategy.
    pub credentials: Bytes,
}

/// Positive reply to a Negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiateResponse {
    /// Negotiated session identity.
    pub identity: SessionIdentity,
    /// Echo of the Negotiate timestamp.
    pub request_timestamp: Timestamp,
}

/// Negative reply to a Negotiate; the connection is dropped afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiateReject {
    /// Rejected session identity.
    pub identity: SessionIdentity,
    /// Why the negotiation was refused.
    pub code: NegotiationRejectCode,
}

/// Confirms (or resumes) a negotiated session and opens message exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Establish {
    /// Presented session identity.
    pub identity: SessionIdentity,
    /// Client send time, echoed on the ack.
    pub timestamp: Timestamp,
    /// Requested keep-alive interval in milliseconds.
    pub keep_alive_interval_ms: u64,
    /// The next sequence number the counterparty will send.
    pub next_seq_no: SeqNum,
    /// Count of messages the counterparty has received on this session.
    pub last_received_seq_no: u64,
    /// Opaque credentials evaluated by the authentication strategy.
    pub credentials: Bytes,
}

/// Positive reply to an Establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishAck {
    /// Established session identity.
    pub identity: SessionIdentity,
    /// Echo of the Establish timestamp.
    pub request_timestamp: Timestamp,
    /// Granted keep-alive interval in milliseconds.
    pub keep_alive_interval_ms: u64,
    /// Echo of the counterparty's next sequence number.
    pub next_seq_no: SeqNum,
    /// Count of messages this side has received from the counterparty.
    pub last_incoming_seq_no: u64,
}

/// Negative reply to an Establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishReject {
    /// Rejected session identity.
    pub identity: SessionIdentity,
    /// Why the establishment was refused.
    pub code: EstablishRejectCode,
}

/// Keep-alive / sequence-advertisement message.
///
/// Carries the sender's next outbound sequence number. A value above the
/// receiver's expectation signals a gap; an expected value is a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    /// The next sequence number the sender will use.
    pub next_seq_no: SeqNum,
}

/// Notifies the counterparty that a range of its messages was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotApplied {
    /// First sequence number of the missing range.
    pub from_seq_no: SeqNum,
    /// Number of messages in the missing range.
    pub count: u64,
}

/// Counterparty-driven request to re-deliver previously sent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitRequest {
    /// The requesting session.
    pub session_id: SessionId,
    /// Request send time.
    pub timestamp: Timestamp,
    /// First sequence number to re-deliver.
    pub from_seq_no: SeqNum,
    /// Number of messages requested.
    pub count: u64,
}

/// Positive reply to a RetransmitRequest, sent before the replayed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retransmission {
    /// The requesting session.
    pub session_id: SessionId,
    /// Echo of the request timestamp.
    pub request_timestamp: Timestamp,
    /// First sequence number being re-delivered.
    pub from_seq_no: SeqNum,
    /// Number of messages being re-delivered.
    pub count: u64,
}

/// Declares that the sender will emit no further business messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedSending {
    /// The declaring session identity.
    pub identity: SessionIdentity,
    /// Highest sequence number the sender has used.
    pub last_seq_no: u64,
}

/// Acknowledges a FinishedSending from the counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedReceiving {
    /// The acknowledging session identity.
    pub identity: SessionIdentity,
}

/// Closes the connection; the receiver echoes its own Terminate back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate {
    /// The terminating session identity.
    pub identity: SessionIdentity,
    /// Why the connection is being closed.
    pub code: TerminationCode,
}

/// Any session-layer control message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// See [`Negotiate`].
    Negotiate(Negotiate),
    /// See [`NegotiateResponse`].
    NegotiateResponse(NegotiateResponse),
    /// See [`NegotiateReject`].
    NegotiateReject(NegotiateReject),
    /// See [`Establish`].
    Establish(Establish),
    /// See [`EstablishAck`].
    EstablishAck(EstablishAck),
    /// See [`EstablishReject`].
    EstablishReject(EstablishReject),
    /// See [`Sequence`].
    Sequence(Sequence),
    /// See [`NotApplied`].
    NotApplied(NotApplied),
    /// See [`RetransmitRequest`].
    RetransmitRequest(RetransmitRequest),
    /// See [`Retransmission`].
    Retransmission(Retransmission),
    /// See [`FinishedSending`].
    FinishedSending(FinishedSending),
    /// See [`FinishedReceiving`].
    FinishedReceiving(FinishedReceiving),
    /// See [`Terminate`].
    Terminate(Terminate),
}

impl ControlMessage {
    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Negotiate(_) => "Negotiate",
            Self::NegotiateResponse(_) => "NegotiateResponse",
            Self::NegotiateReject(_) => "NegotiateReject",
            Self::Establish(_) => "Establish",
            Self::EstablishAck(_) => "EstablishAck",
            Self::EstablishReject(_) => "EstablishReject",
            Self::Sequence(_) => "Sequence",
            Self::NotApplied(_) => "NotApplied",
            Self::RetransmitRequest(_) => "RetransmitRequest",
            Self::Retransmission(_) => "Retransmission",
            Self::FinishedSending(_) => "FinishedSending",
            Self::FinishedReceiving(_) => "FinishedReceiving",
            Self::Terminate(_) => "Terminate",
        }
    }
}

/// Returns true if the template identifies an administrative frame rather
/// than a persisted business message.
#[must_use]
pub fn is_admin_template(template_id: TemplateId) -> bool {
    template_id == admin::SEQUENCE || template_id == admin::REPLAY_COMPLETE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionId, SessionVerId};

    #[test]
    fn test_control_message_name() {
        let identity = SessionIdentity::new(SessionId::new(1), SessionVerId::new(1));
        let msg = ControlMessage::Terminate(Terminate {
            identity,
            code: TerminationCode::Finished,
        });
        assert_eq!(msg.name(), "Terminate");
    }

    #[test]
    fn test_admin_templates_are_reserved() {
        assert!(is_admin_template(admin::SEQUENCE));
        assert!(is_admin_template(admin::REPLAY_COMPLETE));
        assert!(!is_admin_template(TemplateId::new(1)));
    }
}
