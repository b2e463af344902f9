/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Retransmit replay engine.
//!
//! Re-delivers a persisted range of sent business messages over the live
//! transport. The engine is a small poll-driven state machine: each
//! [`RetransmitReplayEngine::attempt_replay`] call makes non-blocking
//! progress and returns whether the replay has finished, so one thread can
//! cooperatively drive many replays without ever blocking on backpressure.
//!
//! Records whose template id is in the gap-fill set are not re-sent; a
//! pending administrative Sequence message stands in for them, emitted with
//! the next real record's number (or the end of range) and never skipped or
//! duplicated under backpressure.

use crate::handler::RetransmitHandler;
use crate::publication::{OfferOutcome, Publication};
use ironfixp_core::error::ReplayError;
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::message::admin;
use ironfixp_core::types::{SeqNum, SessionId, TemplateId};
use ironfixp_store::traits::ReplayCursor;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayState {
    Replaying,
    SendCompleteMessage,
    Complete,
}

/// Poll-driven replay of one retransmit range.
///
/// Owns the log cursor for the range; the cursor is released on completion,
/// on a fatal publication error, and on [`RetransmitReplayEngine::close`].
pub struct RetransmitReplayEngine {
    session_id: SessionId,
    connection_id: u64,
    end: SeqNum,
    gapfill_template_ids: HashSet<TemplateId>,
    handler: Arc<dyn RetransmitHandler>,
    cursor: Option<ReplayCursor>,
    /// Record taken from the cursor whose offer has not yet succeeded.
    pending: Option<BusinessFrame>,
    /// True once the handler has been notified for the pending record.
    pending_observed: bool,
    must_send_sequence: bool,
    state: ReplayState,
}

impl RetransmitReplayEngine {
    /// Creates a replay over an already-opened cursor.
    ///
    /// # Arguments
    /// * `session_id` - The session whose stream is being replayed
    /// * `connection_id` - The live connection; persisted records are
    ///   rebound to it before publishing
    /// * `end` - Last sequence number of the range (inclusive)
    /// * `gapfill_template_ids` - Template ids substituted by a Sequence
    /// * `cursor` - Cursor over the persisted range, ordered by sequence
    /// * `handler` - Retransmit observation hook
    #[must_use]
    pub fn new(
        session_id: SessionId,
        connection_id: u64,
        end: SeqNum,
        gapfill_template_ids: HashSet<TemplateId>,
        cursor: ReplayCursor,
        handler: Arc<dyn RetransmitHandler>,
    ) -> Self {
        Self {
            session_id,
            connection_id,
            end,
            gapfill_template_ids,
            handler,
            cursor: Some(cursor),
            pending: None,
            pending_observed: false,
            must_send_sequence: false,
            state: ReplayState::Replaying,
        }
    }

    /// Returns true once the completion marker has been published.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == ReplayState::Complete
    }

    /// Makes non-blocking progress on the replay.
    ///
    /// # Arguments
    /// * `publication` - The live outbound transport
    ///
    /// # Returns
    /// `Ok(true)` when the replay has fully completed, `Ok(false)` when more
    /// polls are needed (backpressure or remaining records).
    ///
    /// # Errors
    /// [`ReplayError::PublicationClosed`] if the transport closed; the
    /// cursor is released and the replay cannot be resumed.
    pub fn attempt_replay(&mut self, publication: &dyn Publication) -> Result<bool, ReplayError> {
        match self.state {
            ReplayState::Complete => Ok(true),
            ReplayState::SendCompleteMessage => self.attempt_completion(publication),
            ReplayState::Replaying => self.attempt_records(publication),
        }
    }

    fn attempt_records(&mut self, publication: &dyn Publication) -> Result<bool, ReplayError> {
        loop {
            let (mut frame, observed) = match self.pending.take() {
                Some(frame) => (frame, self.pending_observed),
                None => match self.cursor.as_mut().and_then(ReplayCursor::next_frame) {
                    Some(frame) => (frame, false),
                    None => {
                        trace!(session_id = %self.session_id, "replay range drained");
                        self.state = ReplayState::SendCompleteMessage;
                        return Ok(false);
                    }
                },
            };
            self.pending_observed = false;

            // Exactly one observation per persisted record, gap-filled or
            // not, and never repeated across backpressure retries.
            if !observed {
                self.handler
                    .on_replayed_business_message(frame.template_id(), &frame);
            }

            if self.gapfill_template_ids.contains(&frame.template_id()) {
                trace!(seq_no = %frame.seq_no(), "record gap-filled");
                self.must_send_sequence = true;
                continue;
            }

            if self.must_send_sequence {
                match self.offer_sequence(publication, frame.seq_no().value()) {
                    OfferOutcome::Success => self.must_send_sequence = false,
                    outcome if outcome.is_retryable() => {
                        self.stash(frame);
                        return Ok(false);
                    }
                    _ => return self.abort(),
                }
            }

            // Persisted records carry the connection they were originally
            // sent on; rebind to the live one.
            frame.set_connection_id(self.connection_id);
            match publication.offer(&frame) {
                OfferOutcome::Success => {}
                outcome if outcome.is_retryable() => {
                    self.stash(frame);
                    return Ok(false);
                }
                _ => return self.abort(),
            }
        }
    }

    fn attempt_completion(&mut self, publication: &dyn Publication) -> Result<bool, ReplayError> {
        // An outstanding gap-fill Sequence must reach the counterparty
        // before it can observe completion.
        if self.must_send_sequence {
            match self.offer_sequence(publication, self.end.value() + 1) {
                OfferOutcome::Success => self.must_send_sequence = false,
                outcome if outcome.is_retryable() => return Ok(false),
                _ => return self.abort(),
            }
        }

        let marker = self.admin_frame(admin::REPLAY_COMPLETE, self.end.value() + 1);
        match publication.offer(&marker) {
            OfferOutcome::Success => {
                debug!(session_id = %self.session_id, end = %self.end, "replay complete");
                self.close();
                self.state = ReplayState::Complete;
                Ok(true)
            }
            outcome if outcome.is_retryable() => Ok(false),
            _ => self.abort(),
        }
    }

    fn offer_sequence(&self, publication: &dyn Publication, next_seq_no: u64) -> OfferOutcome {
        let frame = self.admin_frame(admin::SEQUENCE, next_seq_no);
        let outcome = publication.offer(&frame);
        if outcome.is_success() {
            trace!(next_seq_no, "gap-fill sequence published");
        }
        outcome
    }

    fn admin_frame(&self, template_id: TemplateId, seq_no: u64) -> BusinessFrame {
        BusinessFrame::encode(
            template_id,
            self.session_id,
            self.connection_id,
            SeqNum::new(seq_no),
            &[],
        )
    }

    fn stash(&mut self, frame: BusinessFrame) {
        self.pending = Some(frame);
        self.pending_observed = true;
    }

    fn abort(&mut self) -> Result<bool, ReplayError> {
        self.close();
        Err(ReplayError::PublicationClosed)
    }

    /// Releases the log cursor and any pending record.
    ///
    /// Safe to call at any point; a closed replay makes no further progress.
    pub fn close(&mut self) {
        self.cursor = None;
        self.pending = None;
        self.pending_observed = false;
    }
}

impl std::fmt::Debug for RetransmitReplayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetransmitReplayEngine")
            .field("session_id", &self.session_id)
            .field("connection_id", &self.connection_id)
            .field("end", &self.end)
            .field("state", &self.state)
            .field("must_send_sequence", &self.must_send_sequence)
            .finish_non_exhaustive()
    }
}
