/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP
//!
//! A FIXP binary session-layer gateway for Rust.
//!
//! IronFixP implements the acceptor side of a point-to-point FIXP session:
//! the negotiate/establish/terminate handshake, per-direction sequence
//! numbering that survives reconnects and process restarts, and a
//! backpressure-safe retransmission engine with gap-fill suppression.
//!
//! ## Features
//!
//! - **I/O-free state machine**: Session logic yields events; the driver
//!   executes them against transport and storage
//! - **Durable recovery**: Ledgers and negotiated identities restore from
//!   the ledger store at startup
//! - **Poll-driven replay**: Retransmits never block; backpressure resumes
//!   exactly where it left off
//! - **Pluggable policy**: Authentication and resend decisions are
//!   deployment-supplied traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ironfixp::prelude::*;
//!
//! let acceptor = AcceptorBuilder::new()
//!     .with_connection_handler(Arc::new(MyHandler))
//!     .with_session_config(SessionConfig::new())
//!     .build();
//!
//! acceptor.restore().await?;
//! let driver = acceptor.accept(publication);
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, control messages, and error definitions
//! - [`session`]: Session state machine, ledgers, identities, authentication
//! - [`store`]: Message log and ledger store traits with an in-memory backend
//! - [`replay`]: Retransmit replay engine and resend decision port
//! - [`engine`]: Acceptor facade, connection driver, and builder

pub mod core {
    //! Fundamental types, control messages, and error definitions.
    pub use ironfixp_core::*;
}

pub mod session {
    //! Session state machine, ledgers, identities, authentication.
    pub use ironfixp_session::*;
}

pub mod store {
    //! Message log and ledger store traits with an in-memory backend.
    pub use ironfixp_store::*;
}

pub mod replay {
    //! Retransmit replay engine and resend decision port.
    pub use ironfixp_replay::*;
}

pub mod engine {
    //! Acceptor facade, connection driver, and builder.
    pub use ironfixp_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use ironfixp_core::{
        BusinessFrame, ControlMessage, DisconnectReason, EstablishRejectCode, FixpError,
        NegotiationRejectCode, Result, SeqNum, SessionError, SessionId, SessionIdentity,
        SessionVerId, TemplateId, TerminationCode, Timestamp,
    };

    // Session
    pub use ironfixp_session::{
        AuthDecision, AuthenticationStrategy, ConnectionState, FixpConnection, SessionConfig,
        SessionEvent,
    };

    // Store
    pub use ironfixp_store::{LedgerStore, MemoryStore, MessageLog};

    // Replay
    pub use ironfixp_replay::{
        OfferOutcome, Publication, ResendRequestController, ResendResponse, RetransmitHandler,
    };

    // Engine
    pub use ironfixp_engine::{
        AcceptorBuilder, ConnectionDriver, ConnectionHandler, DispatchOutcome, FixpAcceptor,
    };
}
