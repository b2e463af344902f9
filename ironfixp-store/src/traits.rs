/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Storage trait definitions.
//!
//! Two abstract interfaces back the session layer: the [`MessageLog`] keeps
//! every sent business frame for retransmission, and the [`LedgerStore`]
//! persists sequence-ledger snapshots and negotiated identities so sessions
//! survive a process restart.

use async_trait::async_trait;
use ironfixp_core::error::StoreError;
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::types::{SeqNum, SessionId, SessionIdentity};
use ironfixp_session::sequence::LedgerSnapshot;
use std::collections::VecDeque;

/// Abstract interface for the per-session outbound message log.
///
/// Every business frame sent on an established session is appended here
/// before it goes on the wire; retransmit replays read it back by sequence
/// number range.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Appends a sent business frame under its sequence number.
    ///
    /// # Arguments
    /// * `session_id` - The owning session
    /// * `frame` - The framed message as sent
    ///
    /// # Errors
    /// Returns `StoreError` if the frame cannot be persisted.
    async fn append(&self, session_id: SessionId, frame: &BusinessFrame) -> Result<(), StoreError>;

    /// Returns the highest sequence number persisted for a session, or 0 if
    /// nothing has been logged.
    ///
    /// # Errors
    /// Returns `StoreError` if the log cannot be read.
    async fn highest_seq_no(&self, session_id: SessionId) -> Result<u64, StoreError>;

    /// Opens a cursor over the inclusive sequence number range.
    ///
    /// # Arguments
    /// * `session_id` - The owning session
    /// * `begin` - First sequence number (inclusive)
    /// * `end` - Last sequence number (inclusive)
    ///
    /// # Errors
    /// Returns [`StoreError::RangeNotAvailable`] if any number in the range
    /// is missing from the log.
    async fn replay_range(
        &self,
        session_id: SessionId,
        begin: SeqNum,
        end: SeqNum,
    ) -> Result<ReplayCursor, StoreError>;
}

/// Abstract interface for session metadata persistence.
///
/// Holds whatever must outlive a process: ledger counter snapshots and the
/// set of negotiated identities with their establishable status.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists the current ledger counters for a session.
    ///
    /// # Errors
    /// Returns `StoreError` if the snapshot cannot be written.
    async fn save_snapshot(
        &self,
        session_id: SessionId,
        snapshot: LedgerSnapshot,
    ) -> Result<(), StoreError>;

    /// Loads the persisted ledger counters for a session, if any.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be read.
    async fn load_snapshot(&self, session_id: SessionId)
    -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Records a negotiated identity.
    ///
    /// # Arguments
    /// * `identity` - The negotiated identity
    /// * `active` - Whether the version is still establishable
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be written.
    async fn record_negotiated(
        &self,
        identity: &SessionIdentity,
        active: bool,
    ) -> Result<(), StoreError>;

    /// Marks a session's current version as finished.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be updated.
    async fn retire_session(&self, session_id: SessionId) -> Result<(), StoreError>;

    /// Returns every persisted identity with its establishable status.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be read.
    async fn negotiated_sessions(&self) -> Result<Vec<(SessionIdentity, bool)>, StoreError>;
}

/// A drained, ordered view over a log range.
///
/// The cursor is pull-based so a replay can stop mid-range under transport
/// backpressure and resume exactly where it left off.
#[derive(Debug)]
pub struct ReplayCursor {
    frames: VecDeque<BusinessFrame>,
}

impl ReplayCursor {
    /// Creates a cursor over frames already ordered by sequence number.
    #[must_use]
    pub fn new(frames: Vec<BusinessFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Takes the next frame, if any remain.
    pub fn next_frame(&mut self) -> Option<BusinessFrame> {
        self.frames.pop_front()
    }

    /// Returns the number of frames not yet taken.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Returns true once every frame has been taken.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}
