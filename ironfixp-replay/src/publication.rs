/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound transport publication abstraction.
//!
//! The replay engine never blocks on the transport: every send is a
//! non-blocking offer whose outcome tells the caller whether to move on,
//! retry on the next poll, or abort.

use ironfixp_core::frame::BusinessFrame;

/// Outcome of a non-blocking offer to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The frame was accepted.
    Success,
    /// The transport has no capacity right now; retry on a later poll.
    BackPressured,
    /// The transport is mid-administrative-action; retry on a later poll.
    AdminAction,
    /// The transport is gone; the offer can never succeed.
    Closed,
}

impl OfferOutcome {
    /// Returns true if the frame was accepted.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the same offer may succeed on a later poll.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::BackPressured | Self::AdminAction)
    }
}

/// Non-blocking outbound publication onto the live transport.
pub trait Publication: Send + Sync {
    /// Offers a frame to the transport without blocking.
    ///
    /// # Arguments
    /// * `frame` - The frame to publish
    fn offer(&self, frame: &BusinessFrame) -> OfferOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        assert!(OfferOutcome::Success.is_success());
        assert!(OfferOutcome::BackPressured.is_retryable());
        assert!(OfferOutcome::AdminAction.is_retryable());
        assert!(!OfferOutcome::Closed.is_retryable());
        assert!(!OfferOutcome::Closed.is_success());
    }
}
