/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP Core
//!
//! Core types, traits, and error definitions for the IronFixP FIXP
//! session-layer gateway.
//!
//! This crate provides the fundamental building blocks used across all
//! IronFixP crates:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Wire codes**: Closed reject/termination code enumerations
//! - **Message model**: Typed session-layer control messages
//! - **Frame layout**: Fixed-header business frame with opaque body
//! - **Core types**: `SeqNum`, `SessionIdentity`, `TemplateId`, `Timestamp`

pub mod codes;
pub mod error;
pub mod frame;
pub mod message;
pub mod types;

pub use codes::{
    DisconnectReason, EstablishRejectCode, NegotiationRejectCode, TerminationCode,
};
pub use error::{FixpError, FrameError, ReplayError, Result, SessionError, StoreError};
pub use frame::{BusinessFrame, FRAME_HEADER_LEN};
pub use message::{ControlMessage, Establish, EstablishAck, EstablishReject, FinishedReceiving,
    FinishedSending, Negotiate, NegotiateReject, NegotiateResponse, NotApplied, Retransmission,
    RetransmitRequest, Sequence, Terminate};
pub use types::{SeqNum, SessionId, SessionIdentity, SessionVerId, TemplateId, Timestamp};
