/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP Replay
//!
//! Retransmission and replay engine for the IronFixP session layer.
//!
//! This crate provides:
//! - **Publication trait**: Non-blocking offer onto the live transport
//! - **RetransmitReplayEngine**: Poll-driven replay with gap-fill
//!   suppression and backpressure-safe resumption
//! - **ResendRequestController**: Deployment policy over retransmit requests
//! - **RetransmitHandler**: Exactly-once observation of replayed messages

pub mod engine;
pub mod handler;
pub mod publication;
pub mod resend;

pub use engine::RetransmitReplayEngine;
pub use handler::{NoOpRetransmitHandler, RetransmitHandler};
pub use publication::{OfferOutcome, Publication};
pub use resend::{
    DefaultResendController, ResendDecision, ResendRequestController, ResendResponse,
};
