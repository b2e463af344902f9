/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP Engine
//!
//! Acceptor-side engine binding the session state machine to transports,
//! durable storage and the replay engine.
//!
//! This crate provides:
//! - **FixpAcceptor**: Process-wide session state, restart recovery, and
//!   per-connection driver creation
//! - **ConnectionDriver**: Executes session events against the publication,
//!   the stores and the retransmit replay engine
//! - **ConnectionHandler**: Business-layer callback interface
//! - **AcceptorBuilder**: Fluent configuration with working defaults

pub mod acceptor;
pub mod builder;
pub mod driver;
pub mod handler;

pub use acceptor::FixpAcceptor;
pub use builder::AcceptorBuilder;
pub use driver::ConnectionDriver;
pub use handler::{ConnectionHandler, DispatchOutcome, NoOpConnectionHandler};
