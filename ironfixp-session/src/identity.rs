/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Process-wide session identity table.
//!
//! Tracks the highest negotiated session version id per session id, so that
//! duplicate or stale handshakes can be rejected regardless of which
//! connection they arrive on. The table is shared across connections and
//! rebuilt from durable storage after a restart.

use ironfixp_core::types::{SessionId, SessionIdentity, SessionVerId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct IdentityEntry {
    highest_ver_id: SessionVerId,
    /// False once the session completed a finished-sending handshake; a
    /// retired version can no longer be re-established, only renegotiated
    /// with a higher version id.
    active: bool,
}

/// How a presented identity relates to the negotiated state on Establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstablishStatus {
    /// The identity matches the highest negotiated, still-active version.
    Negotiated,
    /// The version id is lower than the highest negotiated one.
    Stale,
    /// No matching negotiation exists (unknown, higher than negotiated, or
    /// retired).
    Unknown,
}

/// Shared table of negotiated session identities.
#[derive(Debug, Default)]
pub struct SessionIdentityTable {
    entries: RwLock<HashMap<SessionId, IdentityEntry>>,
}

impl SessionIdentityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a Negotiate attempt.
    ///
    /// Acceptance requires the version id to be unseen for the session id or
    /// strictly greater than any previously accepted one. An arbitrary first
    /// value is legal and becomes the baseline.
    ///
    /// # Arguments
    /// * `identity` - The presented identity
    ///
    /// # Returns
    /// `true` if the negotiation was registered, `false` on a duplicate or
    /// non-increasing version id.
    pub fn check_and_register(&self, identity: &SessionIdentity) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&identity.session_id) {
            Some(entry) if identity.session_ver_id <= entry.highest_ver_id => false,
            _ => {
                entries.insert(
                    identity.session_id,
                    IdentityEntry {
                        highest_ver_id: identity.session_ver_id,
                        active: true,
                    },
                );
                true
            }
        }
    }

    /// Classifies an Establish attempt against the negotiated state.
    ///
    /// # Arguments
    /// * `identity` - The presented identity
    #[must_use]
    pub fn establish_status(&self, identity: &SessionIdentity) -> EstablishStatus {
        let entries = self.entries.read();
        match entries.get(&identity.session_id) {
            Some(entry) if identity.session_ver_id == entry.highest_ver_id => {
                if entry.active {
                    EstablishStatus::Negotiated
                } else {
                    EstablishStatus::Unknown
                }
            }
            Some(entry) if identity.session_ver_id < entry.highest_ver_id => {
                EstablishStatus::Stale
            }
            _ => EstablishStatus::Unknown,
        }
    }

    /// Returns the highest negotiated version id for a session, if any.
    #[must_use]
    pub fn highest_negotiated(&self, session_id: SessionId) -> Option<SessionVerId> {
        self.entries
            .read()
            .get(&session_id)
            .map(|entry| entry.highest_ver_id)
    }

    /// Marks a session's current version as finished.
    ///
    /// Re-establishment of a retired version is refused; only a negotiation
    /// with a higher version id can revive the session id.
    ///
    /// # Arguments
    /// * `session_id` - The session to retire
    pub fn retire(&self, session_id: SessionId) {
        if let Some(entry) = self.entries.write().get_mut(&session_id) {
            entry.active = false;
        }
    }

    /// Reinstates a negotiated identity from durable storage after restart.
    ///
    /// # Arguments
    /// * `identity` - The persisted identity
    /// * `active` - Whether the session version was still establishable
    pub fn restore(&self, identity: &SessionIdentity, active: bool) {
        let mut entries = self.entries.write();
        let entry = entries
            .entry(identity.session_id)
            .or_insert(IdentityEntry {
                highest_ver_id: identity.session_ver_id,
                active,
            });
        if identity.session_ver_id >= entry.highest_ver_id {
            entry.highest_ver_id = identity.session_ver_id;
            entry.active = active;
        }
    }
}
