/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory storage implementation.
//!
//! Backs both storage traits with process-local maps. Not persistent on its
//! own, but an `Arc<MemoryStore>` shared across acceptor instances behaves
//! like a durable medium, which is how restart recovery is exercised in
//! tests.

use crate::traits::{LedgerStore, MessageLog, ReplayCursor};
use async_trait::async_trait;
use ironfixp_core::error::StoreError;
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::types::{SeqNum, SessionId, SessionIdentity, SessionVerId};
use ironfixp_session::sequence::LedgerSnapshot;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// In-memory message log and ledger store.
///
/// Frames are kept in a `BTreeMap` per session for efficient range queries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Logged frames per session, indexed by sequence number.
    frames: RwLock<HashMap<SessionId, BTreeMap<u64, BusinessFrame>>>,
    /// Persisted ledger counters per session.
    snapshots: RwLock<HashMap<SessionId, LedgerSnapshot>>,
    /// Negotiated identities: highest version id and establishable flag.
    sessions: RwLock<HashMap<SessionId, (SessionVerId, bool)>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of frames logged for a session.
    #[must_use]
    pub fn frame_count(&self, session_id: SessionId) -> usize {
        self.frames
            .read()
            .get(&session_id)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl MessageLog for MemoryStore {
    async fn append(&self, session_id: SessionId, frame: &BusinessFrame) -> Result<(), StoreError> {
        self.frames
            .write()
            .entry(session_id)
            .or_default()
            .insert(frame.seq_no().value(), frame.clone());
        Ok(())
    }

    async fn highest_seq_no(&self, session_id: SessionId) -> Result<u64, StoreError> {
        Ok(self
            .frames
            .read()
            .get(&session_id)
            .and_then(|log| log.keys().next_back().copied())
            .unwrap_or(0))
    }

    async fn replay_range(
        &self,
        session_id: SessionId,
        begin: SeqNum,
        end: SeqNum,
    ) -> Result<ReplayCursor, StoreError> {
        let begin = begin.value();
        let end = end.value();
        let frames = self.frames.read();
        let log = frames.get(&session_id).ok_or(StoreError::UnknownSession {
            session_id: session_id.value(),
        })?;

        let result: Vec<BusinessFrame> = log
            .range(begin..=end)
            .map(|(_, frame)| frame.clone())
            .collect();

        // An inclusive range must be fully present; a hole means the
        // counterparty asked for something never sent.
        let expected = (end - begin + 1) as usize;
        if result.len() != expected {
            return Err(StoreError::RangeNotAvailable {
                range: begin..end + 1,
            });
        }

        Ok(ReplayCursor::new(result))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn save_snapshot(
        &self,
        session_id: SessionId,
        snapshot: LedgerSnapshot,
    ) -> Result<(), StoreError> {
        self.snapshots.write().insert(session_id, snapshot);
        Ok(())
    }

    async fn load_snapshot(
        &self,
        session_id: SessionId,
    ) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self.snapshots.read().get(&session_id).copied())
    }

    async fn record_negotiated(
        &self,
        identity: &SessionIdentity,
        active: bool,
    ) -> Result<(), StoreError> {
        self.sessions
            .write()
            .insert(identity.session_id, (identity.session_ver_id, active));
        Ok(())
    }

    async fn retire_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        if let Some((_, active)) = self.sessions.write().get_mut(&session_id) {
            *active = false;
        }
        Ok(())
    }

    async fn negotiated_sessions(&self) -> Result<Vec<(SessionIdentity, bool)>, StoreError> {
        Ok(self
            .sessions
            .read()
            .iter()
            .map(|(session_id, (ver_id, active))| {
                (SessionIdentity::new(*session_id, *ver_id), *active)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfixp_core::types::TemplateId;

    fn frame(session_id: u64, seq_no: u64) -> BusinessFrame {
        BusinessFrame::encode(
            TemplateId::new(1),
            SessionId::new(session_id),
            7,
            SeqNum::new(seq_no),
            b"payload",
        )
    }

    fn identity(id: u64, ver: u64) -> SessionIdentity {
        SessionIdentity::new(SessionId::new(id), SessionVerId::new(ver))
    }

    #[tokio::test]
    async fn test_append_and_highest() {
        let store = MemoryStore::new();
        let session = SessionId::new(1);
        assert_eq!(store.highest_seq_no(session).await.unwrap(), 0);

        store.append(session, &frame(1, 1)).await.unwrap();
        store.append(session, &frame(1, 2)).await.unwrap();

        assert_eq!(store.frame_count(session), 2);
        assert_eq!(store.highest_seq_no(session).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replay_range_in_order() {
        let store = MemoryStore::new();
        let session = SessionId::new(1);
        for seq in 1..=5 {
            store.append(session, &frame(1, seq)).await.unwrap();
        }

        let mut cursor = store
            .replay_range(session, SeqNum::new(2), SeqNum::new(4))
            .await
            .unwrap();
        assert_eq!(cursor.remaining(), 3);
        assert_eq!(cursor.next_frame().map(|f| f.seq_no().value()), Some(2));
        assert_eq!(cursor.next_frame().map(|f| f.seq_no().value()), Some(3));
        assert_eq!(cursor.next_frame().map(|f| f.seq_no().value()), Some(4));
    }

    #[tokio::test]
    async fn test_replay_range_with_hole_fails() {
        let store = MemoryStore::new();
        let session = SessionId::new(1);
        store.append(session, &frame(1, 1)).await.unwrap();
        store.append(session, &frame(1, 3)).await.unwrap();

        let result = store
            .replay_range(session, SeqNum::new(1), SeqNum::new(3))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::RangeNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_replay_unknown_session_fails() {
        let store = MemoryStore::new();
        let result = store
            .replay_range(SessionId::new(9), SeqNum::new(1), SeqNum::new(1))
            .await;
        assert!(matches!(result, Err(StoreError::UnknownSession { .. })));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = MemoryStore::new();
        let session = SessionId::new(1);
        assert!(store.load_snapshot(session).await.unwrap().is_none());

        let snapshot = LedgerSnapshot {
            next_sent_seq_no: 4,
            next_recv_seq_no: 2,
        };
        store.save_snapshot(session, snapshot).await.unwrap();
        assert_eq!(store.load_snapshot(session).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_negotiated_sessions_and_retire() {
        let store = MemoryStore::new();
        store.record_negotiated(&identity(1, 2), true).await.unwrap();
        store.record_negotiated(&identity(5, 1), true).await.unwrap();

        store.retire_session(SessionId::new(5)).await.unwrap();

        let mut sessions = store.negotiated_sessions().await.unwrap();
        sessions.sort_by_key(|(identity, _)| identity.session_id);
        assert_eq!(sessions, vec![(identity(1, 2), true), (identity(5, 1), false)]);
    }
}
