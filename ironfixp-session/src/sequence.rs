/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence number ledger.
//!
//! Tracks the next-to-send and next-expected-receive sequence numbers for a
//! logical session. The ledger outlives any single connection: its values are
//! snapshotted to durable storage and restored on re-establishment, including
//! across a full process restart.

use ironfixp_core::types::{SeqNum, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks per-direction sequence numbers for a session.
///
/// Both counters are 1-based and monotonically non-decreasing; they only
/// move forward, never backward, even across re-establishment.
#[derive(Debug)]
pub struct SequenceLedger {
    /// Next outgoing sequence number.
    next_sent_seq: AtomicU64,
    /// Next expected incoming sequence number.
    next_recv_seq: AtomicU64,
}

impl SequenceLedger {
    /// Creates a new ledger with both counters starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_sent_seq: AtomicU64::new(1),
            next_recv_seq: AtomicU64::new(1),
        }
    }

    /// Creates a ledger with specified starting values.
    ///
    /// # Arguments
    /// * `next_sent` - Initial next-to-send sequence number
    /// * `next_recv` - Initial next-expected-receive sequence number
    #[must_use]
    pub fn with_initial(next_sent: u64, next_recv: u64) -> Self {
        Self {
            next_sent_seq: AtomicU64::new(next_sent),
            next_recv_seq: AtomicU64::new(next_recv),
        }
    }

    /// Restores a ledger from a persisted snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self::with_initial(snapshot.next_sent_seq_no, snapshot.next_recv_seq_no)
    }

    /// Returns the next outbound sequence number without consuming it.
    #[inline]
    #[must_use]
    pub fn next_sent_seq_no(&self) -> SeqNum {
        SeqNum::new(self.next_sent_seq.load(Ordering::SeqCst))
    }

    /// Returns the next expected inbound sequence number.
    #[inline]
    #[must_use]
    pub fn next_recv_seq_no(&self) -> SeqNum {
        SeqNum::new(self.next_recv_seq.load(Ordering::SeqCst))
    }

    /// Consumes and returns the next outbound sequence number.
    #[inline]
    pub fn on_message_sent(&self) -> SeqNum {
        SeqNum::new(self.next_sent_seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Validates an inbound sequence number and advances the receive counter
    /// when it matches the expectation.
    ///
    /// Gap and too-low conditions are reported as values for the state
    /// machine to act on; they are never thrown across the session boundary.
    ///
    /// # Arguments
    /// * `received` - The received sequence number
    #[must_use]
    pub fn on_message_received(&self, received: SeqNum) -> SequenceOutcome {
        let expected = self.next_recv_seq.load(Ordering::SeqCst);
        let received = received.value();

        if received == expected {
            self.next_recv_seq.store(expected + 1, Ordering::SeqCst);
            SequenceOutcome::Applied
        } else if received < expected {
            SequenceOutcome::TooLow { expected, received }
        } else {
            SequenceOutcome::Gap { expected, received }
        }
    }

    /// Moves the receive counter forward to `seq`.
    ///
    /// Backward moves are ignored; the counters never regress.
    ///
    /// # Arguments
    /// * `seq` - The new next expected inbound sequence number
    #[inline]
    pub fn advance_recv_to(&self, seq: SeqNum) {
        self.next_recv_seq.fetch_max(seq.value(), Ordering::SeqCst);
    }

    /// Moves the send counter forward to `seq`.
    ///
    /// Backward moves are ignored; the counters never regress.
    ///
    /// # Arguments
    /// * `seq` - The new next outbound sequence number
    #[inline]
    pub fn advance_sent_to(&self, seq: SeqNum) {
        self.next_sent_seq.fetch_max(seq.value(), Ordering::SeqCst);
    }

    /// Captures the current counters for persistence.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            next_sent_seq_no: self.next_sent_seq.load(Ordering::SeqCst),
            next_recv_seq_no: self.next_recv_seq.load(Ordering::SeqCst),
        }
    }
}

impl Default for SequenceLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of inbound sequence number validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Sequence number matched; the receive counter advanced.
    Applied,
    /// Sequence number lower than expected (already seen).
    TooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number higher than expected (messages missing).
    Gap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

impl SequenceOutcome {
    /// Returns true if the message was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns true if a gap was detected.
    #[must_use]
    pub const fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }

    /// Returns true if the number was below the expectation.
    #[must_use]
    pub const fn is_too_low(&self) -> bool {
        matches!(self, Self::TooLow { .. })
    }
}

/// Persistable view of a [`SequenceLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Next outbound sequence number.
    pub next_sent_seq_no: u64,
    /// Next expected inbound sequence number.
    pub next_recv_seq_no: u64,
}

/// In-process registry of per-session sequence ledgers.
///
/// Connections are transient; the ledger for a session identity lives here
/// so a re-established connection resumes the same counters. Durability
/// across restarts comes from snapshotting into the ledger store and calling
/// [`LedgerRegistry::restore`] at startup.
#[derive(Debug, Default)]
pub struct LedgerRegistry {
    ledgers: parking_lot::RwLock<std::collections::HashMap<SessionId, Arc<SequenceLedger>>>,
}

impl LedgerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ledger for a session, creating a fresh one if absent.
    ///
    /// # Arguments
    /// * `session_id` - The owning session
    #[must_use]
    pub fn ledger_for(&self, session_id: SessionId) -> Arc<SequenceLedger> {
        if let Some(ledger) = self.ledgers.read().get(&session_id) {
            return Arc::clone(ledger);
        }
        let mut ledgers = self.ledgers.write();
        Arc::clone(
            ledgers
                .entry(session_id)
                .or_insert_with(|| Arc::new(SequenceLedger::new())),
        )
    }

    /// Replaces the session's ledger with a fresh one starting at 1/1.
    ///
    /// Used when a new session version is negotiated: renegotiation starts a
    /// new sequence-number stream.
    ///
    /// # Arguments
    /// * `session_id` - The owning session
    #[must_use]
    pub fn reset(&self, session_id: SessionId) -> Arc<SequenceLedger> {
        let ledger = Arc::new(SequenceLedger::new());
        self.ledgers.write().insert(session_id, Arc::clone(&ledger));
        ledger
    }

    /// Reinstates a ledger from a persisted snapshot at startup.
    ///
    /// # Arguments
    /// * `session_id` - The owning session
    /// * `snapshot` - The persisted counters
    pub fn restore(&self, session_id: SessionId, snapshot: LedgerSnapshot) {
        self.ledgers
            .write()
            .insert(session_id, Arc::new(SequenceLedger::from_snapshot(snapshot)));
    }

    /// Returns the ledger for a session if one exists.
    #[must_use]
    pub fn get(&self, session_id: SessionId) -> Option<Arc<SequenceLedger>> {
        self.ledgers.read().get(&session_id).map(Arc::clone)
    }
}
