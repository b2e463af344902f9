/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronFixP Store
//!
//! Durable storage for the IronFixP session layer.
//!
//! This crate provides:
//! - **MessageLog trait**: Outbound frame log backing retransmit replays
//! - **LedgerStore trait**: Ledger snapshots and negotiated identities
//! - **ReplayCursor**: Resumable pull-based view over a log range
//! - **MemoryStore**: In-memory implementation of both traits

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{LedgerStore, MessageLog, ReplayCursor};
