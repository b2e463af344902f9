/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection lifecycle states.
//!
//! The state is a runtime value rather than a type parameter because it must
//! be observable mid-handshake (diagnostics, tests) and reconstructed after a
//! process restart.

use std::fmt;

/// Lifecycle state of a FIXP connection.
///
/// `Unbound` is both the initial state (pre-negotiation) and the terminal
/// state (post-disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session bound to the connection.
    Unbound,
    /// A Negotiate is being validated.
    Negotiating,
    /// Negotiation succeeded; awaiting Establish.
    Negotiated,
    /// An Establish is being validated.
    Establishing,
    /// Message exchange is open in both directions.
    Established,
    /// This side declared it will send no further business messages.
    FinishedSending,
    /// The counterparty declared finished-sending and we acknowledged.
    FinishedReceiving,
    /// A Terminate was sent; awaiting the counterparty's echo.
    Unbinding,
}

impl ConnectionState {
    /// Returns true if business messages may be exchanged.
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Established)
    }

    /// Returns true if the connection is past its active life.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Unbound)
    }

    /// Returns true if a finished-sending handshake has taken effect on
    /// either side.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::FinishedSending | Self::FinishedReceiving)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "UNBOUND",
            Self::Negotiating => "NEGOTIATING",
            Self::Negotiated => "NEGOTIATED",
            Self::Establishing => "ESTABLISHING",
            Self::Established => "ESTABLISHED",
            Self::FinishedSending => "FINISHED_SENDING",
            Self::FinishedReceiving => "FINISHED_RECEIVING",
            Self::Unbinding => "UNBINDING",
        };
        write!(f, "{name}")
    }
}
