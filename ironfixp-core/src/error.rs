/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the IronFixP session-layer engine.
//!
//! This module provides a unified error hierarchy using `thiserror` for
//! typed, domain-specific errors across all IronFixP operations.
//!
//! Protocol rejects (negotiation/establishment reject codes) are not errors:
//! they are wire values modelled in [`crate::codes`]. The errors here cover
//! local contract violations, sequence anomalies, and store failures.

use std::ops::Range;
use thiserror::Error;

/// Result type alias using [`FixpError`] as the error type.
pub type Result<T> = std::result::Result<T, FixpError>;

/// Top-level error type for all IronFixP operations.
#[derive(Debug, Error)]
pub enum FixpError {
    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in replay engine operations.
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    /// Error in message log or ledger store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error reading or writing a business frame header.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error from underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in session state machine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session is not in the correct state for the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current session state.
        current: String,
    },

    /// A business send was attempted after finished-sending took effect.
    ///
    /// Raised synchronously, before any transport I/O.
    #[error("illegal send state: finished sending already declared")]
    IllegalSendState,

    /// Sequence number gap detected on the inbound stream.
    #[error("sequence gap detected: expected {expected}, received {received}")]
    SequenceGap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Inbound sequence number below the expected value.
    #[error("sequence too low: expected >= {expected}, received {received}")]
    SequenceTooLow {
        /// Minimum expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Session configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors in retransmit replay operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The outbound publication closed mid-replay; the replay is aborted.
    #[error("publication closed during replay")]
    PublicationClosed,

    /// The requested range exceeds the persisted outbound stream.
    #[error("replay range out of bounds: {begin}..={end}, highest persisted {highest}")]
    RangeOutOfBounds {
        /// Begin sequence number of the requested range.
        begin: u64,
        /// End sequence number of the requested range.
        end: u64,
        /// Highest sequence number ever persisted for the session.
        highest: u64,
    },

    /// The durable log failed while the replay was reading it.
    #[error("replay log failure: {0}")]
    Log(#[from] StoreError),
}

/// Errors in message log and ledger store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to append a message.
    #[error("failed to append message seq={seq_num}: {reason}")]
    AppendFailed {
        /// Sequence number of the message.
        seq_num: u64,
        /// Reason for failure.
        reason: String,
    },

    /// Message not found in the log.
    #[error("message not found: seq={seq_num}")]
    NotFound {
        /// Sequence number of the missing message.
        seq_num: u64,
    },

    /// Range of messages not available.
    #[error("messages not available for range: {range:?}")]
    RangeNotAvailable {
        /// The requested range of sequence numbers.
        range: Range<u64>,
    },

    /// No persisted ledger entry for the session.
    #[error("no ledger entry for session {session_id}")]
    UnknownSession {
        /// The unknown session identifier.
        session_id: u64,
    },

    /// I/O error in persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

/// Errors reading a business frame header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than the fixed frame header.
    #[error("truncated frame: {length} bytes, need {needed}")]
    Truncated {
        /// Actual buffer length.
        length: usize,
        /// Minimum required length.
        needed: usize,
    },
}
