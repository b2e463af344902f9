/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection driver.
//!
//! The [`ConnectionDriver`] sits between one transport connection and the
//! I/O-free session state machine: it feeds inbound messages in, executes
//! the resulting [`SessionEvent`]s against the publication, the durable
//! stores and the replay engine, and exposes the outbound control messages
//! for the transport layer to encode.

use crate::handler::{ConnectionHandler, DispatchOutcome};
use ironfixp_core::codes::{DisconnectReason, TerminationCode};
use ironfixp_core::error::FixpError;
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::message::{ControlMessage, Retransmission, RetransmitRequest};
use ironfixp_core::types::{SeqNum, TemplateId};
use ironfixp_replay::engine::RetransmitReplayEngine;
use ironfixp_replay::publication::{OfferOutcome, Publication};
use ironfixp_replay::resend::{ResendDecision, ResendRequestController, ResendResponse};
use ironfixp_replay::RetransmitHandler;
use ironfixp_session::config::SessionConfig;
use ironfixp_session::connection::{FixpConnection, SessionEvent};
use ironfixp_store::traits::{LedgerStore, MessageLog};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Drives one accepted connection end to end.
pub struct ConnectionDriver {
    connection: FixpConnection,
    config: SessionConfig,
    publication: Arc<dyn Publication>,
    log: Arc<dyn MessageLog>,
    ledger_store: Arc<dyn LedgerStore>,
    handler: Arc<dyn ConnectionHandler>,
    resend_controller: Arc<dyn ResendRequestController>,
    retransmit_handler: Arc<dyn RetransmitHandler>,
    replay: Option<RetransmitReplayEngine>,
    outbound: VecDeque<ControlMessage>,
    /// Live frames whose offer was backpressured, flushed in order on poll.
    pending_frames: VecDeque<BusinessFrame>,
    closed: bool,
}

impl ConnectionDriver {
    /// Creates a driver around a fresh connection state machine.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        connection: FixpConnection,
        config: SessionConfig,
        publication: Arc<dyn Publication>,
        log: Arc<dyn MessageLog>,
        ledger_store: Arc<dyn LedgerStore>,
        handler: Arc<dyn ConnectionHandler>,
        resend_controller: Arc<dyn ResendRequestController>,
        retransmit_handler: Arc<dyn RetransmitHandler>,
    ) -> Self {
        Self {
            connection,
            config,
            publication,
            log,
            ledger_store,
            handler,
            resend_controller,
            retransmit_handler,
            replay: None,
            outbound: VecDeque::new(),
            pending_frames: VecDeque::new(),
            closed: false,
        }
    }

    /// Returns the underlying session state machine.
    #[must_use]
    pub fn connection(&self) -> &FixpConnection {
        &self.connection
    }

    /// Returns true once the connection has left the wire.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns true while a retransmit replay is in progress.
    #[must_use]
    pub fn replay_in_progress(&self) -> bool {
        self.replay.is_some()
    }

    /// Takes the control messages awaiting encoding by the transport layer.
    pub fn drain_outbound(&mut self) -> Vec<ControlMessage> {
        self.outbound.drain(..).collect()
    }

    /// Feeds an inbound control message through the state machine.
    ///
    /// # Errors
    /// Propagates store failures from executing the resulting events.
    pub async fn on_control(&mut self, msg: ControlMessage) -> Result<(), FixpError> {
        let was_established = self.connection.state().is_established();
        let events = self.connection.on_message(msg);
        self.execute(events).await?;

        if !was_established && self.connection.state().is_established() {
            if let Some(identity) = self.connection.identity() {
                self.handler.on_established(&identity).await;
            }
        }
        Ok(())
    }

    /// Feeds an inbound business frame through the state machine.
    ///
    /// # Errors
    /// Propagates store failures from executing the resulting events.
    pub async fn on_business(&mut self, frame: BusinessFrame) -> Result<(), FixpError> {
        let events = self.connection.on_business(frame);
        self.execute(events).await?;
        self.save_snapshot().await
    }

    /// Sends a business message on the established session.
    ///
    /// The frame is appended to the durable log before it is offered to the
    /// transport; a backpressured offer is queued and flushed on poll.
    ///
    /// # Arguments
    /// * `template_id` - The message-type identifier
    /// * `body` - Opaque message body bytes
    ///
    /// # Errors
    /// [`ironfixp_core::error::SessionError::IllegalSendState`] after
    /// finished-sending; store failures from the log append.
    pub async fn send_business(
        &mut self,
        template_id: TemplateId,
        body: &[u8],
    ) -> Result<SeqNum, FixpError> {
        let frame = self.connection.try_send_business(template_id, body)?;
        let seq_no = frame.seq_no();

        self.log.append(frame.session_id(), &frame).await?;
        self.offer_or_queue(frame)?;
        self.save_snapshot().await?;
        Ok(seq_no)
    }

    /// Initiates a Terminate from this side.
    ///
    /// # Errors
    /// Propagates store failures from executing the resulting events.
    pub async fn terminate(&mut self, code: TerminationCode) -> Result<(), FixpError> {
        let events = self.connection.terminate(code);
        self.execute(events).await
    }

    /// Declares that this side will send no further business messages.
    ///
    /// # Errors
    /// Propagates store failures from executing the resulting events.
    pub async fn finish_sending(&mut self) -> Result<(), FixpError> {
        let events = self.connection.finish_sending();
        self.execute(events).await
    }

    /// Makes non-blocking progress: flushes queued frames, advances an
    /// active replay, and checks the handshake deadlines.
    ///
    /// # Arguments
    /// * `now` - Current instant for deadline checks
    ///
    /// # Errors
    /// Propagates store failures from executing the resulting events.
    pub async fn poll(&mut self, now: Instant) -> Result<(), FixpError> {
        self.flush_pending();

        if let Some(replay) = self.replay.as_mut() {
            match replay.attempt_replay(self.publication.as_ref()) {
                Ok(true) => {
                    self.replay = None;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%err, "replay aborted");
                    self.replay = None;
                    self.force_disconnect(DisconnectReason::TransportClosed)
                        .await?;
                    return Ok(());
                }
            }
        }

        let events = self.connection.poll(now);
        self.execute(events).await
    }

    async fn execute(&mut self, events: Vec<SessionEvent>) -> Result<(), FixpError> {
        let mut queue: VecDeque<SessionEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            match event {
                SessionEvent::Send(msg) => {
                    if let ControlMessage::NegotiateResponse(response) = &msg {
                        self.ledger_store
                            .record_negotiated(&response.identity, true)
                            .await?;
                    }
                    self.outbound.push_back(msg);
                }
                SessionEvent::ForwardBusiness(frame) => {
                    if let Some(identity) = self.connection.identity() {
                        let outcome = self.handler.on_business_message(&identity, &frame).await;
                        if outcome == DispatchOutcome::Abort {
                            // Sequence number stays consumed; only the
                            // downstream effect is suppressed.
                            trace!(seq_no = %frame.seq_no(), "business message aborted");
                        }
                    }
                }
                SessionEvent::StartReplay { begin, end } => {
                    if let Err(err) = self.start_replay(begin, end).await {
                        warn!(%err, "replay range unavailable");
                        queue.extend(
                            self.connection
                                .terminate(TerminationCode::ReRequestOutOfBounds),
                        );
                    }
                }
                SessionEvent::RetransmitRequested(request) => {
                    let followup = self.process_retransmit_request(request).await?;
                    queue.extend(followup);
                }
                SessionEvent::SessionFinished => {
                    if let Some(identity) = self.connection.identity() {
                        self.ledger_store.retire_session(identity.session_id).await?;
                    }
                    self.save_snapshot().await?;
                }
                SessionEvent::Disconnect(reason) => {
                    self.force_disconnect(reason).await?;
                }
            }
        }
        Ok(())
    }

    async fn process_retransmit_request(
        &mut self,
        request: RetransmitRequest,
    ) -> Result<Vec<SessionEvent>, FixpError> {
        let Some(identity) = self.connection.identity() else {
            return Ok(Vec::new());
        };

        let highest = self.log.highest_seq_no(request.session_id).await?;
        let begin = request.from_seq_no.value();
        if begin == 0 || request.count == 0 || begin > highest {
            warn!(begin, count = request.count, highest, "retransmit out of bounds");
            return Ok(self
                .connection
                .terminate(TerminationCode::ReRequestOutOfBounds));
        }
        // count is counterparty-controlled; begin + count - 1 can exceed u64.
        let Some(requested_end) = begin.checked_add(request.count - 1) else {
            warn!(begin, count = request.count, "retransmit range overflows");
            return Ok(self
                .connection
                .terminate(TerminationCode::ReRequestOutOfBounds));
        };
        let corrected_end = requested_end.min(highest);

        let mut response = ResendResponse::new();
        self.resend_controller
            .on_resend(&identity, &request, corrected_end, &mut response);

        match response.into_decision() {
            Some(ResendDecision::Resend) => {
                self.outbound
                    .push_back(ControlMessage::Retransmission(Retransmission {
                        session_id: request.session_id,
                        request_timestamp: request.timestamp,
                        from_seq_no: request.from_seq_no,
                        count: corrected_end - begin + 1,
                    }));
                if let Err(err) = self
                    .start_replay(request.from_seq_no, SeqNum::new(corrected_end))
                    .await
                {
                    warn!(%err, "replay range unavailable");
                    return Ok(self
                        .connection
                        .terminate(TerminationCode::ReRequestOutOfBounds));
                }
                Ok(Vec::new())
            }
            Some(ResendDecision::RejectWith(message)) => {
                self.outbound.push_back(message);
                Ok(Vec::new())
            }
            Some(ResendDecision::Reject) | None => Ok(self
                .connection
                .terminate(TerminationCode::ReRequestOutOfBounds)),
        }
    }

    async fn start_replay(&mut self, begin: SeqNum, end: SeqNum) -> Result<(), FixpError> {
        let Some(identity) = self.connection.identity() else {
            return Ok(());
        };

        let cursor = self
            .log
            .replay_range(identity.session_id, begin, end)
            .await?;
        debug!(%identity, %begin, %end, "starting retransmit replay");

        self.replay = Some(RetransmitReplayEngine::new(
            identity.session_id,
            self.connection.connection_id(),
            end,
            self.config.gapfill_template_ids.clone(),
            cursor,
            Arc::clone(&self.retransmit_handler),
        ));
        Ok(())
    }

    async fn force_disconnect(&mut self, reason: DisconnectReason) -> Result<(), FixpError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(replay) = self.replay.as_mut() {
            replay.close();
        }
        self.replay = None;

        self.save_snapshot().await?;
        debug!(
            connection_id = self.connection.connection_id(),
            %reason,
            "connection disconnected"
        );
        self.handler
            .on_disconnect(self.connection.connection_id(), reason)
            .await;
        Ok(())
    }

    async fn save_snapshot(&self) -> Result<(), FixpError> {
        if let (Some(identity), Some(ledger)) =
            (self.connection.identity(), self.connection.ledger())
        {
            self.ledger_store
                .save_snapshot(identity.session_id, ledger.snapshot())
                .await?;
        }
        Ok(())
    }

    fn offer_or_queue(&mut self, frame: BusinessFrame) -> Result<(), FixpError> {
        if self.pending_frames.is_empty() {
            match self.publication.offer(&frame) {
                OfferOutcome::Success => return Ok(()),
                outcome if outcome.is_retryable() => {}
                _ => return Err(ironfixp_core::error::ReplayError::PublicationClosed.into()),
            }
        }
        self.pending_frames.push_back(frame);
        Ok(())
    }

    fn flush_pending(&mut self) {
        while let Some(frame) = self.pending_frames.front() {
            if self.publication.offer(frame) != OfferOutcome::Success {
                break;
            }
            self.pending_frames.pop_front();
        }
    }
}

impl std::fmt::Debug for ConnectionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDriver")
            .field("connection", &self.connection)
            .field("replay", &self.replay)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use ironfixp_core::message::{
        admin, Establish, FinishedSending, Negotiate, Sequence, Terminate,
    };
    use ironfixp_core::types::{SessionId, SessionIdentity, SessionVerId, Timestamp};
    use ironfixp_replay::{DefaultResendController, NoOpRetransmitHandler};
    use ironfixp_session::auth::AuthenticationGate;
    use ironfixp_session::identity::SessionIdentityTable;
    use ironfixp_session::sequence::LedgerRegistry;
    use ironfixp_session::state::ConnectionState;
    use ironfixp_store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SESSION_ID: u64 = 42;

    #[derive(Default)]
    struct TestPublication {
        published: Mutex<Vec<BusinessFrame>>,
        script: Mutex<VecDeque<OfferOutcome>>,
    }

    impl TestPublication {
        fn published(&self) -> Vec<BusinessFrame> {
            self.published.lock().clone()
        }

        fn push_outcomes(&self, outcomes: Vec<OfferOutcome>) {
            self.script.lock().extend(outcomes);
        }
    }

    impl Publication for TestPublication {
        fn offer(&self, frame: &BusinessFrame) -> OfferOutcome {
            let outcome = self
                .script
                .lock()
                .pop_front()
                .unwrap_or(OfferOutcome::Success);
            if outcome.is_success() {
                self.published.lock().push(frame.clone());
            }
            outcome
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        established: Mutex<Vec<SessionIdentity>>,
        business_seqs: Mutex<Vec<u64>>,
        disconnects: Mutex<Vec<DisconnectReason>>,
        abort_next: AtomicBool,
    }

    #[async_trait]
    impl ConnectionHandler for RecordingHandler {
        async fn on_established(&self, identity: &SessionIdentity) {
            self.established.lock().push(*identity);
        }

        async fn on_business_message(
            &self,
            _identity: &SessionIdentity,
            frame: &BusinessFrame,
        ) -> DispatchOutcome {
            self.business_seqs.lock().push(frame.seq_no().value());
            if self.abort_next.swap(false, Ordering::SeqCst) {
                DispatchOutcome::Abort
            } else {
                DispatchOutcome::Continue
            }
        }

        async fn on_disconnect(&self, _connection_id: u64, reason: DisconnectReason) {
            self.disconnects.lock().push(reason);
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        ledgers: Arc<LedgerRegistry>,
        gate: Arc<AuthenticationGate>,
        identities: Arc<SessionIdentityTable>,
        config: SessionConfig,
        handler: Arc<RecordingHandler>,
        next_connection_id: u64,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                ledgers: Arc::new(LedgerRegistry::new()),
                gate: Arc::new(AuthenticationGate::default()),
                identities: Arc::new(SessionIdentityTable::new()),
                config: SessionConfig::new(),
                handler: Arc::new(RecordingHandler::default()),
                next_connection_id: 0,
            }
        }

        fn driver(&mut self, publication: Arc<TestPublication>) -> ConnectionDriver {
            self.next_connection_id += 1;
            let connection = FixpConnection::new(
                self.next_connection_id,
                Arc::clone(&self.ledgers),
                Arc::clone(&self.gate),
                Arc::clone(&self.identities),
                self.config.clone(),
                Instant::now(),
            );
            ConnectionDriver::new(
                connection,
                self.config.clone(),
                publication,
                self.store.clone(),
                self.store.clone(),
                self.handler.clone(),
                Arc::new(DefaultResendController),
                Arc::new(NoOpRetransmitHandler),
            )
        }
    }

    fn identity(ver: u64) -> SessionIdentity {
        SessionIdentity::new(SessionId::new(SESSION_ID), SessionVerId::new(ver))
    }

    fn negotiate(ver: u64) -> ControlMessage {
        ControlMessage::Negotiate(Negotiate {
            identity: identity(ver),
            timestamp: Timestamp::from_millis(1),
            entering_firm: 1,
            credentials: Bytes::new(),
        })
    }

    fn establish(ver: u64, next_seq_no: u64, last_received: u64) -> ControlMessage {
        ControlMessage::Establish(Establish {
            identity: identity(ver),
            timestamp: Timestamp::from_millis(2),
            keep_alive_interval_ms: 1_000,
            next_seq_no: SeqNum::new(next_seq_no),
            last_received_seq_no: last_received,
            credentials: Bytes::new(),
        })
    }

    fn inbound_frame(seq_no: u64) -> BusinessFrame {
        BusinessFrame::encode(
            TemplateId::new(1),
            SessionId::new(SESSION_ID),
            1,
            SeqNum::new(seq_no),
            b"order",
        )
    }

    async fn establish_session(driver: &mut ConnectionDriver, ver: u64) {
        driver.on_control(negotiate(ver)).await.unwrap();
        driver.on_control(establish(ver, 1, 0)).await.unwrap();
        assert!(driver.connection().state().is_established());
        let outbound = driver.drain_outbound();
        assert!(matches!(outbound[0], ControlMessage::NegotiateResponse(_)));
        assert!(matches!(outbound[1], ControlMessage::EstablishAck(_)));
    }

    async fn drive_replay(driver: &mut ConnectionDriver) {
        for _ in 0..32 {
            driver.poll(Instant::now()).await.unwrap();
            if !driver.replay_in_progress() {
                return;
            }
        }
        panic!("replay did not complete within 32 polls");
    }

    #[tokio::test]
    async fn test_order_and_report_round_trip() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());

        establish_session(&mut driver, 1).await;
        assert_eq!(*harness.handler.established.lock(), vec![identity(1)]);

        driver.on_business(inbound_frame(1)).await.unwrap();
        assert_eq!(*harness.handler.business_seqs.lock(), vec![1]);

        let seq = driver
            .send_business(TemplateId::new(2), b"report")
            .await
            .unwrap();
        assert_eq!(seq, SeqNum::new(1));
        assert_eq!(publication.published().len(), 1);
        assert_eq!(harness.store.frame_count(SessionId::new(SESSION_ID)), 1);

        assert_eq!(driver.connection().next_sent_seq_no().value(), 2);
        assert_eq!(driver.connection().next_recv_seq_no().value(), 2);
    }

    #[tokio::test]
    async fn test_acceptor_initiated_terminate() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication);

        establish_session(&mut driver, 1).await;

        driver.terminate(TerminationCode::Finished).await.unwrap();
        assert_eq!(driver.connection().state(), ConnectionState::Unbinding);
        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::Terminate(Terminate {
                code: TerminationCode::Finished,
                ..
            })
        ));

        // Counterparty's echo completes the unbind.
        driver
            .on_control(ControlMessage::Terminate(Terminate {
                identity: identity(1),
                code: TerminationCode::Finished,
            }))
            .await
            .unwrap();
        assert_eq!(driver.connection().state(), ConnectionState::Unbound);
        assert!(driver.is_closed());
        assert_eq!(
            *harness.handler.disconnects.lock(),
            vec![DisconnectReason::LocalTerminate(TerminationCode::Finished)]
        );
    }

    #[tokio::test]
    async fn test_establish_gap_replays_with_gapfill() {
        let mut harness = Harness::new();
        harness.config = harness.config.clone().with_gapfill_template(TemplateId::new(9));

        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication);
        establish_session(&mut driver, 1).await;

        driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
        driver.send_business(TemplateId::new(9), b"m2").await.unwrap();
        driver.send_business(TemplateId::new(2), b"m3").await.unwrap();

        // Reconnect; the counterparty received nothing.
        let replay_publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(replay_publication.clone());
        driver.on_control(establish(1, 4, 0)).await.unwrap();
        assert!(driver.replay_in_progress());

        drive_replay(&mut driver).await;

        let published = replay_publication.published();
        assert_eq!(published.len(), 4);
        assert_eq!(published[0].seq_no().value(), 1);
        assert_eq!(published[1].template_id(), admin::SEQUENCE);
        assert_eq!(published[1].seq_no().value(), 3);
        assert_eq!(published[2].seq_no().value(), 3);
        assert_eq!(published[3].template_id(), admin::REPLAY_COMPLETE);
        // The ledger resumed where the first connection left off.
        assert_eq!(driver.connection().next_sent_seq_no().value(), 4);
        assert_eq!(driver.connection().next_recv_seq_no().value(), 4);
    }

    #[tokio::test]
    async fn test_retransmit_request_replays_range() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());
        establish_session(&mut driver, 1).await;

        for body in [b"m1", b"m2", b"m3"] {
            driver.send_business(TemplateId::new(2), body).await.unwrap();
        }

        driver
            .on_control(ControlMessage::RetransmitRequest(RetransmitRequest {
                session_id: SessionId::new(SESSION_ID),
                timestamp: Timestamp::from_millis(3),
                from_seq_no: SeqNum::new(1),
                count: 2,
            }))
            .await
            .unwrap();

        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::Retransmission(Retransmission { count: 2, .. })
        ));
        drive_replay(&mut driver).await;

        // 3 live sends, then records 1 and 2 replayed plus the marker.
        let published = publication.published();
        assert_eq!(published.len(), 6);
        assert_eq!(published[3].seq_no().value(), 1);
        assert_eq!(published[4].seq_no().value(), 2);
        assert_eq!(published[5].template_id(), admin::REPLAY_COMPLETE);
    }

    #[tokio::test]
    async fn test_retransmit_request_out_of_bounds_terminates() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication);
        establish_session(&mut driver, 1).await;
        driver.send_business(TemplateId::new(2), b"m1").await.unwrap();

        driver
            .on_control(ControlMessage::RetransmitRequest(RetransmitRequest {
                session_id: SessionId::new(SESSION_ID),
                timestamp: Timestamp::from_millis(3),
                from_seq_no: SeqNum::new(5),
                count: 2,
            }))
            .await
            .unwrap();

        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::Terminate(Terminate {
                code: TerminationCode::ReRequestOutOfBounds,
                ..
            })
        ));
        assert_eq!(driver.connection().state(), ConnectionState::Unbinding);
    }

    #[tokio::test]
    async fn test_retransmit_count_overflow_terminates() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());
        establish_session(&mut driver, 1).await;
        driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
        driver.send_business(TemplateId::new(2), b"m2").await.unwrap();

        // begin + count - 1 would wrap past u64::MAX.
        driver
            .on_control(ControlMessage::RetransmitRequest(RetransmitRequest {
                session_id: SessionId::new(SESSION_ID),
                timestamp: Timestamp::from_millis(3),
                from_seq_no: SeqNum::new(2),
                count: u64::MAX,
            }))
            .await
            .unwrap();

        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::Terminate(Terminate {
                code: TerminationCode::ReRequestOutOfBounds,
                ..
            })
        ));
        assert_eq!(driver.connection().state(), ConnectionState::Unbinding);
        assert!(!driver.replay_in_progress());
        // The live sends are the only transport traffic.
        assert_eq!(publication.published().len(), 2);
    }

    #[tokio::test]
    async fn test_retransmit_count_clamped_to_persisted() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());
        establish_session(&mut driver, 1).await;
        driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
        driver.send_business(TemplateId::new(2), b"m2").await.unwrap();

        driver
            .on_control(ControlMessage::RetransmitRequest(RetransmitRequest {
                session_id: SessionId::new(SESSION_ID),
                timestamp: Timestamp::from_millis(3),
                from_seq_no: SeqNum::new(1),
                count: 100,
            }))
            .await
            .unwrap();

        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::Retransmission(Retransmission { count: 2, .. })
        ));
        drive_replay(&mut driver).await;
        assert_eq!(publication.published().len(), 5);
    }

    #[tokio::test]
    async fn test_abort_consumes_sequence_number() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication);
        establish_session(&mut driver, 1).await;

        harness.handler.abort_next.store(true, Ordering::SeqCst);
        driver.on_business(inbound_frame(1)).await.unwrap();

        // Aborting suppressed the business effect but not the ledger move.
        assert_eq!(driver.connection().next_recv_seq_no().value(), 2);
        driver.on_business(inbound_frame(2)).await.unwrap();
        assert_eq!(*harness.handler.business_seqs.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_send_after_finished_sending_fails_without_io() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());
        establish_session(&mut driver, 1).await;

        driver
            .on_control(ControlMessage::FinishedSending(FinishedSending {
                identity: identity(1),
                last_seq_no: 0,
            }))
            .await
            .unwrap();
        assert!(matches!(
            driver.drain_outbound()[0],
            ControlMessage::FinishedReceiving(_)
        ));

        let result = driver.send_business(TemplateId::new(2), b"late").await;
        assert!(matches!(
            result,
            Err(FixpError::Session(
                ironfixp_core::error::SessionError::IllegalSendState
            ))
        ));
        // No transport I/O was attempted for the refused send.
        assert!(publication.published().is_empty());
        // The session version was retired in durable storage.
        let sessions = harness.store.negotiated_sessions().await.unwrap();
        assert_eq!(sessions, vec![(identity(1), false)]);
    }

    #[tokio::test]
    async fn test_backpressured_live_send_flushed_in_order() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication.clone());
        establish_session(&mut driver, 1).await;

        publication.push_outcomes(vec![OfferOutcome::BackPressured]);
        driver.send_business(TemplateId::new(2), b"m1").await.unwrap();
        driver.send_business(TemplateId::new(2), b"m2").await.unwrap();
        assert!(publication.published().is_empty());

        driver.poll(Instant::now()).await.unwrap();
        let published = publication.published();
        assert_eq!(
            published.iter().map(|f| f.seq_no().value()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_sequence_gap_notifies_not_applied() {
        let mut harness = Harness::new();
        let publication = Arc::new(TestPublication::default());
        let mut driver = harness.driver(publication);
        establish_session(&mut driver, 1).await;

        driver
            .on_control(ControlMessage::Sequence(Sequence {
                next_seq_no: SeqNum::new(4),
            }))
            .await
            .unwrap();

        let outbound = driver.drain_outbound();
        match &outbound[0] {
            ControlMessage::NotApplied(not_applied) => {
                assert_eq!(not_applied.from_seq_no, SeqNum::new(1));
                assert_eq!(not_applied.count, 3);
            }
            other => panic!("expected NotApplied, got {other:?}"),
        }
        assert_eq!(driver.connection().next_recv_seq_no().value(), 4);
    }
}
