/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Authentication gate.
//!
//! Wraps a deployment-supplied authentication strategy and records the last
//! identity it evaluated, independent of whether the connection proceeds.
//! The strategy is invoked exactly once per Negotiate and once per
//! (re-)Establish.

use ironfixp_core::types::SessionIdentity;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of an authentication evaluation.
///
/// A rejection is a business decision surfaced as a protocol reject, not an
/// error; the state machine maps it to the CREDENTIALS code of the relevant
/// handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// The identity may proceed with the handshake.
    Accept,
    /// The identity is refused.
    Reject,
}

/// Deployment-supplied credential verification strategy.
pub trait AuthenticationStrategy: Send + Sync {
    /// Evaluates a presented session identity.
    ///
    /// # Arguments
    /// * `identity` - The identity presented on Negotiate or Establish
    fn evaluate(&self, identity: &SessionIdentity) -> AuthDecision;
}

/// Strategy that accepts every identity. The default.
#[derive(Debug, Default)]
pub struct AcceptAllStrategy;

impl AuthenticationStrategy for AcceptAllStrategy {
    fn evaluate(&self, _identity: &SessionIdentity) -> AuthDecision {
        AuthDecision::Accept
    }
}

/// Records every evaluation the wrapped strategy makes.
///
/// The last identity and decision stay observable for diagnostics even when
/// the connection is refused.
pub struct AuthenticationGate {
    strategy: Arc<dyn AuthenticationStrategy>,
    last: Mutex<Option<(SessionIdentity, AuthDecision)>>,
}

impl AuthenticationGate {
    /// Creates a gate around a strategy.
    ///
    /// # Arguments
    /// * `strategy` - The deployment-supplied strategy
    #[must_use]
    pub fn new(strategy: Arc<dyn AuthenticationStrategy>) -> Self {
        Self {
            strategy,
            last: Mutex::new(None),
        }
    }

    /// Evaluates an identity and records the outcome.
    ///
    /// # Arguments
    /// * `identity` - The identity presented on the handshake message
    pub fn authenticate(&self, identity: &SessionIdentity) -> AuthDecision {
        let decision = self.strategy.evaluate(identity);
        *self.last.lock() = Some((*identity, decision));
        decision
    }

    /// Returns the last identity evaluated, if any.
    #[must_use]
    pub fn last_identity(&self) -> Option<SessionIdentity> {
        self.last.lock().map(|(identity, _)| identity)
    }

    /// Returns the last decision made, if any.
    #[must_use]
    pub fn last_decision(&self) -> Option<AuthDecision> {
        self.last.lock().map(|(_, decision)| decision)
    }

    /// Clears the recorded observation.
    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}

impl Default for AuthenticationGate {
    fn default() -> Self {
        Self::new(Arc::new(AcceptAllStrategy))
    }
}

impl std::fmt::Debug for AuthenticationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationGate")
            .field("last", &*self.last.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfixp_core::types::{SessionId, SessionVerId};

    /// Strategy with a switchable decision, for handshake tests.
    pub struct SwitchableStrategy {
        reject: parking_lot::Mutex<bool>,
    }

    impl SwitchableStrategy {
        fn new() -> Self {
            Self {
                reject: parking_lot::Mutex::new(false),
            }
        }

        fn reject(&self, reject: bool) {
            *self.reject.lock() = reject;
        }
    }

    impl AuthenticationStrategy for SwitchableStrategy {
        fn evaluate(&self, _identity: &SessionIdentity) -> AuthDecision {
            if *self.reject.lock() {
                AuthDecision::Reject
            } else {
                AuthDecision::Accept
            }
        }
    }

    fn identity(ver: u64) -> SessionIdentity {
        SessionIdentity::new(SessionId::new(99), SessionVerId::new(ver))
    }

    #[test]
    fn test_accept_all_default() {
        let gate = AuthenticationGate::default();
        assert_eq!(gate.authenticate(&identity(1)), AuthDecision::Accept);
    }

    #[test]
    fn test_gate_records_last_identity_on_reject() {
        let strategy = Arc::new(SwitchableStrategy::new());
        let gate = AuthenticationGate::new(strategy.clone());

        strategy.reject(true);
        assert_eq!(gate.authenticate(&identity(7)), AuthDecision::Reject);

        // The rejected identity remains observable for diagnostics.
        assert_eq!(gate.last_identity(), Some(identity(7)));
        assert_eq!(gate.last_decision(), Some(AuthDecision::Reject));
    }

    #[test]
    fn test_gate_reset() {
        let gate = AuthenticationGate::default();
        gate.authenticate(&identity(1));
        assert!(gate.last_identity().is_some());

        gate.reset();
        assert!(gate.last_identity().is_none());
        assert!(gate.last_decision().is_none());
    }
}
