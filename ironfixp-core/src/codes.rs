/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Wire-level reject and termination codes.
//!
//! These are closed enumerations shared with the counterparty to explain why
//! a negotiation, establishment, or termination occurred. They are outcomes
//! carried on the wire, not retryable error states, so they are modelled as
//! plain tagged values with an explicit wire-encoding mapping rather than as
//! errors.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason a Negotiate message was rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, ToPrimitive,
)]
#[repr(u8)]
pub enum NegotiationRejectCode {
    /// Rejected for an unspecified reason.
    Unspecified = 0,
    /// The authentication strategy rejected the presented credentials.
    Credentials = 1,
    /// The session version id was not strictly greater than a previously
    /// accepted one for the same session id.
    DuplicateId = 2,
}

/// Reason an Establish message was rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, ToPrimitive,
)]
#[repr(u8)]
pub enum EstablishRejectCode {
    /// Rejected for an unspecified reason.
    Unspecified = 0,
    /// The authentication strategy rejected the presented credentials.
    Credentials = 1,
    /// No matching Negotiate preceded the Establish, or the presented
    /// version id is stale relative to the highest negotiated one.
    Unnegotiated = 2,
    /// The session is already established; the reject is sent and the
    /// existing connection is left intact.
    AlreadyEstablished = 3,
    /// The requested keep-alive interval is outside the supported bound.
    KeepaliveInterval = 4,
}

/// Reason a Terminate message was sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, ToPrimitive,
)]
#[repr(u8)]
pub enum TerminationCode {
    /// Orderly shutdown after a finished-sending handshake or operator action.
    Finished = 0,
    /// Terminated for an unspecified error.
    UnspecifiedError = 1,
    /// A retransmit request referenced a range outside the persisted stream.
    ReRequestOutOfBounds = 2,
    /// An inbound sequence number was below the expected value.
    SequenceTooLow = 3,
}

macro_rules! wire_code {
    ($ty:ident) => {
        impl $ty {
            /// Returns the protocol wire value for this code.
            #[must_use]
            pub fn as_wire(self) -> u8 {
                self.to_u8().unwrap_or(0)
            }

            /// Decodes a code from its protocol wire value.
            ///
            /// # Arguments
            /// * `value` - The wire value
            ///
            /// # Returns
            /// `Some` if the value maps to a known code, `None` otherwise.
            #[must_use]
            pub fn from_wire(value: u8) -> Option<Self> {
                Self::from_u8(value)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{self:?}")
            }
        }
    };
}

wire_code!(NegotiationRejectCode);
wire_code!(EstablishRejectCode);
wire_code!(TerminationCode);

/// Why a connection left the wire.
///
/// Reported to the connection handler on unbind; not itself a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The counterparty initiated a Terminate.
    RemoteTerminate(TerminationCode),
    /// This side initiated a Terminate.
    LocalTerminate(TerminationCode),
    /// No Negotiate arrived within the no-logon timeout.
    NoNegotiateTimeout,
    /// No Establish followed a successful Negotiate within the timeout.
    NoEstablishTimeout,
    /// The negotiation was rejected and the connection dropped.
    NegotiateRejected(NegotiationRejectCode),
    /// The establishment was rejected and the connection dropped.
    EstablishRejected(EstablishRejectCode),
    /// The transport closed underneath the session.
    TransportClosed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteTerminate(code) => write!(f, "remote terminate ({code})"),
            Self::LocalTerminate(code) => write!(f, "local terminate ({code})"),
            Self::NoNegotiateTimeout => write!(f, "no negotiate within timeout"),
            Self::NoEstablishTimeout => write!(f, "no establish within timeout"),
            Self::NegotiateRejected(code) => write!(f, "negotiate rejected ({code})"),
            Self::EstablishRejected(code) => write!(f, "establish rejected ({code})"),
            Self::TransportClosed => write!(f, "transport closed"),
        }
    }
}
