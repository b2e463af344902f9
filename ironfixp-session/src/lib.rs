/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP Session
//!
//! FIXP session layer for the IronFixP acceptor.
//!
//! This crate provides:
//! - **State machine**: Per-connection negotiate/establish/terminate lifecycle
//! - **Sequence management**: Atomic per-session sequence ledgers
//! - **Identity tracking**: Session version id validation across connections
//! - **Authentication**: Pluggable credential strategy behind an observing gate
//! - **Configuration**: Keep-alive bounds, handshake timeouts, gap-fill set

pub mod auth;
pub mod config;
pub mod connection;
pub mod identity;
pub mod sequence;
pub mod state;

pub use auth::{AcceptAllStrategy, AuthDecision, AuthenticationGate, AuthenticationStrategy};
pub use config::SessionConfig;
pub use connection::{FixpConnection, SessionEvent};
pub use identity::{EstablishStatus, SessionIdentityTable};
pub use sequence::{LedgerRegistry, LedgerSnapshot, SequenceLedger, SequenceOutcome};
pub use state::ConnectionState;
