/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection FIXP session state machine.
//!
//! [`FixpConnection`] owns the lifecycle of one accepted transport
//! connection: negotiation, establishment, business-message exchange, the
//! finished-sending handshake, and termination. It performs no I/O; every
//! inbound message or poll tick yields a list of [`SessionEvent`]s that the
//! driving layer executes against the transport, the durable log, and the
//! replay engine.

use crate::auth::{AuthDecision, AuthenticationGate};
use crate::config::SessionConfig;
use crate::identity::{EstablishStatus, SessionIdentityTable};
use crate::sequence::{LedgerRegistry, SequenceLedger, SequenceOutcome};
use crate::state::ConnectionState;
use ironfixp_core::codes::{
    DisconnectReason, EstablishRejectCode, NegotiationRejectCode, TerminationCode,
};
use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::message::{
    ControlMessage, Establish, EstablishAck, EstablishReject, FinishedReceiving, FinishedSending,
    Negotiate, NegotiateReject, NegotiateResponse, NotApplied, RetransmitRequest, Sequence,
    Terminate,
};
use ironfixp_core::types::{SeqNum, SessionIdentity, TemplateId};
use ironfixp_core::SessionError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Action requested by the state machine, to be executed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Send a control message to the counterparty.
    Send(ControlMessage),
    /// Deliver a business message to the downstream consumer.
    ForwardBusiness(BusinessFrame),
    /// Start a retransmit replay for the inclusive range.
    StartReplay {
        /// First sequence number to replay.
        begin: SeqNum,
        /// Last sequence number to replay.
        end: SeqNum,
    },
    /// A counterparty retransmit request awaits the resend decision policy.
    RetransmitRequested(RetransmitRequest),
    /// The session's finished-sending handshake completed; retire it in
    /// durable storage.
    SessionFinished,
    /// Close the transport connection.
    Disconnect(DisconnectReason),
}

/// State machine for one accepted FIXP connection.
#[derive(Debug)]
pub struct FixpConnection {
    connection_id: u64,
    state: ConnectionState,
    identity: Option<SessionIdentity>,
    ledger: Option<Arc<SequenceLedger>>,
    ledgers: Arc<LedgerRegistry>,
    gate: Arc<AuthenticationGate>,
    identities: Arc<SessionIdentityTable>,
    config: SessionConfig,
    connected_at: Instant,
    negotiated_at: Option<Instant>,
    keep_alive_interval_ms: Option<u64>,
    local_terminate_code: Option<TerminationCode>,
}

impl FixpConnection {
    /// Creates a state machine for a freshly accepted connection.
    ///
    /// # Arguments
    /// * `connection_id` - Transport connection identifier
    /// * `ledgers` - Registry of per-session sequence ledgers
    /// * `gate` - Shared authentication gate
    /// * `identities` - Process-wide negotiated identity table
    /// * `config` - Session configuration
    /// * `now` - Accept time, baseline for the no-logon timeout
    #[must_use]
    pub fn new(
        connection_id: u64,
        ledgers: Arc<LedgerRegistry>,
        gate: Arc<AuthenticationGate>,
        identities: Arc<SessionIdentityTable>,
        config: SessionConfig,
        now: Instant,
    ) -> Self {
        Self {
            connection_id,
            state: ConnectionState::Unbound,
            identity: None,
            ledger: None,
            ledgers,
            gate,
            identities,
            config,
            connected_at: now,
            negotiated_at: None,
            keep_alive_interval_ms: None,
            local_terminate_code: None,
        }
    }

    /// Returns the transport connection identifier.
    #[must_use]
    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the bound session identity, if the handshake got that far.
    #[must_use]
    pub const fn identity(&self) -> Option<SessionIdentity> {
        self.identity
    }

    /// Returns the next outbound sequence number.
    #[must_use]
    pub fn next_sent_seq_no(&self) -> SeqNum {
        self.ledger
            .as_ref()
            .map_or(SeqNum::new(1), |ledger| ledger.next_sent_seq_no())
    }

    /// Returns the next expected inbound sequence number.
    #[must_use]
    pub fn next_recv_seq_no(&self) -> SeqNum {
        self.ledger
            .as_ref()
            .map_or(SeqNum::new(1), |ledger| ledger.next_recv_seq_no())
    }

    /// Returns the session's sequence ledger, once bound.
    #[must_use]
    pub fn ledger(&self) -> Option<Arc<SequenceLedger>> {
        self.ledger.clone()
    }

    /// Processes an inbound control message.
    ///
    /// # Arguments
    /// * `msg` - The decoded control message
    #[must_use]
    pub fn on_message(&mut self, msg: ControlMessage) -> Vec<SessionEvent> {
        trace!(connection_id = self.connection_id, msg = msg.name(), "inbound control message");
        match msg {
            ControlMessage::Negotiate(negotiate) => self.on_negotiate(negotiate),
            ControlMessage::Establish(establish) => self.on_establish(establish),
            ControlMessage::Sequence(sequence) => self.on_sequence(sequence),
            ControlMessage::RetransmitRequest(request) => self.on_retransmit_request(request),
            ControlMessage::FinishedSending(finished) => self.on_finished_sending(finished),
            ControlMessage::FinishedReceiving(_) => self.on_finished_receiving(),
            ControlMessage::Terminate(terminate) => self.on_terminate(terminate),
            other => {
                warn!(
                    connection_id = self.connection_id,
                    msg = other.name(),
                    state = %self.state,
                    "unexpected control message; ignored"
                );
                Vec::new()
            }
        }
    }

    /// Processes a Negotiate, the first message of a new logical session.
    #[must_use]
    pub fn on_negotiate(&mut self, msg: Negotiate) -> Vec<SessionEvent> {
        if self.state != ConnectionState::Unbound {
            warn!(
                connection_id = self.connection_id,
                state = %self.state,
                "Negotiate received mid-session; ignored"
            );
            return Vec::new();
        }
        self.state = ConnectionState::Negotiating;

        let identity = msg.identity;
        if self.gate.authenticate(&identity) == AuthDecision::Reject {
            debug!(%identity, "negotiation rejected: credentials");
            return self.reject_negotiate(identity, NegotiationRejectCode::Credentials);
        }

        if !self.identities.check_and_register(&identity) {
            debug!(%identity, "negotiation rejected: duplicate or non-increasing ver id");
            return self.reject_negotiate(identity, NegotiationRejectCode::DuplicateId);
        }

        // A new session version starts a fresh sequence-number stream.
        let ledger = self.ledgers.reset(identity.session_id);
        self.ledger = Some(ledger);
        self.identity = Some(identity);
        self.state = ConnectionState::Negotiated;
        self.negotiated_at = Some(Instant::now());

        debug!(%identity, "session negotiated");
        vec![SessionEvent::Send(ControlMessage::NegotiateResponse(
            NegotiateResponse {
                identity,
                request_timestamp: msg.timestamp,
            },
        ))]
    }

    /// Processes an Establish or re-Establish.
    #[must_use]
    pub fn on_establish(&mut self, msg: Establish) -> Vec<SessionEvent> {
        let identity = msg.identity;

        // A later Establish on an already-established session is answered
        // with a reject and otherwise ignored; the live connection stays up.
        if self.state == ConnectionState::Established && self.identity == Some(identity) {
            debug!(%identity, "duplicate Establish ignored");
            return vec![SessionEvent::Send(ControlMessage::EstablishReject(
                EstablishReject {
                    identity,
                    code: EstablishRejectCode::AlreadyEstablished,
                },
            ))];
        }

        if !matches!(
            self.state,
            ConnectionState::Unbound | ConnectionState::Negotiated
        ) {
            warn!(
                connection_id = self.connection_id,
                state = %self.state,
                "Establish received in invalid state; ignored"
            );
            return Vec::new();
        }
        self.state = ConnectionState::Establishing;

        if self.gate.authenticate(&identity) == AuthDecision::Reject {
            debug!(%identity, "establish rejected: credentials");
            return self.reject_establish(identity, EstablishRejectCode::Credentials);
        }

        match self.identities.establish_status(&identity) {
            EstablishStatus::Negotiated => {}
            EstablishStatus::Stale | EstablishStatus::Unknown => {
                debug!(%identity, "establish rejected: unnegotiated");
                return self.reject_establish(identity, EstablishRejectCode::Unnegotiated);
            }
        }

        if !self.config.keep_alive_supported(msg.keep_alive_interval_ms) {
            debug!(
                %identity,
                interval_ms = msg.keep_alive_interval_ms,
                "establish rejected: keep-alive interval out of bounds"
            );
            return self.reject_establish(identity, EstablishRejectCode::KeepaliveInterval);
        }

        let ledger = self.ledgers.ledger_for(identity.session_id);
        let last_incoming_seq_no = ledger.next_recv_seq_no().value() - 1;

        // Reconcile the counterparty's view of the streams against the
        // ledger. Its send position only ever moves ours forward.
        ledger.advance_recv_to(msg.next_seq_no);

        let sent_count = ledger.next_sent_seq_no().value() - 1;
        let mut events = vec![SessionEvent::Send(ControlMessage::EstablishAck(
            EstablishAck {
                identity,
                request_timestamp: msg.timestamp,
                keep_alive_interval_ms: msg.keep_alive_interval_ms,
                next_seq_no: msg.next_seq_no,
                last_incoming_seq_no,
            },
        ))];

        // Anything the counterparty never received is recovered via replay,
        // not re-sent inline.
        if msg.last_received_seq_no < sent_count {
            events.push(SessionEvent::StartReplay {
                begin: SeqNum::new(msg.last_received_seq_no + 1),
                end: SeqNum::new(sent_count),
            });
        }

        self.ledger = Some(ledger);
        self.identity = Some(identity);
        self.keep_alive_interval_ms = Some(msg.keep_alive_interval_ms);
        self.state = ConnectionState::Established;
        debug!(%identity, "session established");
        events
    }

    /// Processes an inbound business frame.
    ///
    /// # Arguments
    /// * `frame` - The framed business message
    #[must_use]
    pub fn on_business(&mut self, frame: BusinessFrame) -> Vec<SessionEvent> {
        if !matches!(
            self.state,
            ConnectionState::Established | ConnectionState::FinishedSending
        ) {
            warn!(
                connection_id = self.connection_id,
                state = %self.state,
                "business message outside established session; ignored"
            );
            return Vec::new();
        }
        let Some(ledger) = self.ledger.clone() else {
            return Vec::new();
        };

        match ledger.on_message_received(frame.seq_no()) {
            SequenceOutcome::Applied => vec![SessionEvent::ForwardBusiness(frame)],
            SequenceOutcome::Gap { expected, received } => {
                debug!(expected, received, "inbound business gap");
                ledger.advance_recv_to(SeqNum::new(received + 1));
                vec![
                    SessionEvent::Send(ControlMessage::NotApplied(NotApplied {
                        from_seq_no: SeqNum::new(expected),
                        count: received - expected,
                    })),
                    SessionEvent::ForwardBusiness(frame),
                ]
            }
            SequenceOutcome::TooLow { expected, received } => {
                warn!(expected, received, "inbound sequence too low; terminating");
                self.terminate(TerminationCode::SequenceTooLow)
            }
        }
    }

    /// Processes a Sequence (keep-alive / sequence-advertisement) message.
    #[must_use]
    pub fn on_sequence(&mut self, msg: Sequence) -> Vec<SessionEvent> {
        if !matches!(
            self.state,
            ConnectionState::Established | ConnectionState::FinishedSending
        ) {
            return Vec::new();
        }
        let Some(ledger) = self.ledger.clone() else {
            return Vec::new();
        };

        let expected = ledger.next_recv_seq_no().value();
        let advertised = msg.next_seq_no.value();

        if advertised > expected {
            // Never silently advance: report the missing range, then move on.
            debug!(expected, advertised, "sequence gap advertised");
            ledger.advance_recv_to(msg.next_seq_no);
            vec![SessionEvent::Send(ControlMessage::NotApplied(NotApplied {
                from_seq_no: SeqNum::new(expected),
                count: advertised - expected,
            }))]
        } else if advertised == expected {
            // On-time Sequence at the expected number is a heartbeat.
            trace!(advertised, "sequence heartbeat");
            Vec::new()
        } else {
            warn!(expected, advertised, "sequence too low; terminating");
            self.terminate(TerminationCode::SequenceTooLow)
        }
    }

    /// Routes a retransmit request to the resend decision policy.
    #[must_use]
    pub fn on_retransmit_request(&mut self, msg: RetransmitRequest) -> Vec<SessionEvent> {
        if !self.state.is_established() {
            warn!(
                connection_id = self.connection_id,
                state = %self.state,
                "retransmit request outside established session; ignored"
            );
            return Vec::new();
        }
        vec![SessionEvent::RetransmitRequested(msg)]
    }

    /// Processes the counterparty's FinishedSending declaration.
    #[must_use]
    pub fn on_finished_sending(&mut self, msg: FinishedSending) -> Vec<SessionEvent> {
        if !matches!(
            self.state,
            ConnectionState::Established | ConnectionState::FinishedSending
        ) {
            return Vec::new();
        }

        debug!(last_seq_no = msg.last_seq_no, "counterparty finished sending");
        self.state = ConnectionState::FinishedReceiving;
        self.identities.retire(msg.identity.session_id);

        vec![
            SessionEvent::Send(ControlMessage::FinishedReceiving(FinishedReceiving {
                identity: msg.identity,
            })),
            SessionEvent::SessionFinished,
        ]
    }

    /// Processes the counterparty's FinishedReceiving acknowledgement of our
    /// own FinishedSending.
    #[must_use]
    pub fn on_finished_receiving(&mut self) -> Vec<SessionEvent> {
        if self.state != ConnectionState::FinishedSending {
            return Vec::new();
        }
        debug!("finished-sending handshake acknowledged");
        if let Some(identity) = self.identity {
            self.identities.retire(identity.session_id);
        }
        vec![SessionEvent::SessionFinished]
    }

    /// Processes an inbound Terminate.
    #[must_use]
    pub fn on_terminate(&mut self, msg: Terminate) -> Vec<SessionEvent> {
        if self.state == ConnectionState::Unbinding {
            // Echo of a terminate we initiated.
            self.state = ConnectionState::Unbound;
            let code = self.local_terminate_code.unwrap_or(msg.code);
            debug!(%code, "terminate acknowledged");
            return vec![SessionEvent::Disconnect(DisconnectReason::LocalTerminate(
                code,
            ))];
        }

        debug!(code = %msg.code, "counterparty terminate");
        self.state = ConnectionState::Unbound;
        vec![
            SessionEvent::Send(ControlMessage::Terminate(msg)),
            SessionEvent::Disconnect(DisconnectReason::RemoteTerminate(msg.code)),
        ]
    }

    /// Initiates a Terminate from this side.
    ///
    /// The connection moves to `Unbinding` synchronously, before the
    /// counterparty's acknowledgement arrives.
    ///
    /// # Arguments
    /// * `code` - The termination reason sent on the wire
    #[must_use]
    pub fn terminate(&mut self, code: TerminationCode) -> Vec<SessionEvent> {
        let Some(identity) = self.identity else {
            self.state = ConnectionState::Unbound;
            return vec![SessionEvent::Disconnect(DisconnectReason::LocalTerminate(
                code,
            ))];
        };

        debug!(%identity, %code, "initiating terminate");
        self.state = ConnectionState::Unbinding;
        self.local_terminate_code = Some(code);
        vec![SessionEvent::Send(ControlMessage::Terminate(Terminate {
            identity,
            code,
        }))]
    }

    /// Declares that this side will send no further business messages.
    #[must_use]
    pub fn finish_sending(&mut self) -> Vec<SessionEvent> {
        let Some(identity) = self.identity else {
            return Vec::new();
        };
        if self.state != ConnectionState::Established {
            return Vec::new();
        }

        let last_seq_no = self.next_sent_seq_no().value() - 1;
        debug!(%identity, last_seq_no, "finishing sending");
        self.state = ConnectionState::FinishedSending;
        vec![SessionEvent::Send(ControlMessage::FinishedSending(
            FinishedSending {
                identity,
                last_seq_no,
            },
        ))]
    }

    /// Allocates the next outbound sequence number and frames a business
    /// message for sending.
    ///
    /// Fails synchronously, before any transport I/O, once a
    /// finished-sending handshake has taken effect on either side.
    ///
    /// # Arguments
    /// * `template_id` - The message-type identifier
    /// * `body` - Opaque message body bytes
    ///
    /// # Errors
    /// [`SessionError::IllegalSendState`] after finished-sending;
    /// [`SessionError::InvalidState`] outside an established session.
    pub fn try_send_business(
        &mut self,
        template_id: TemplateId,
        body: &[u8],
    ) -> Result<BusinessFrame, SessionError> {
        if self.state.is_finished() {
            return Err(SessionError::IllegalSendState);
        }
        let (Some(identity), Some(ledger), ConnectionState::Established) =
            (self.identity, self.ledger.as_ref(), self.state)
        else {
            return Err(SessionError::InvalidState {
                expected: ConnectionState::Established.to_string(),
                current: self.state.to_string(),
            });
        };

        let seq_no = ledger.on_message_sent();
        Ok(BusinessFrame::encode(
            template_id,
            identity.session_id,
            self.connection_id,
            seq_no,
            body,
        ))
    }

    /// Checks the wall-clock handshake deadlines.
    ///
    /// The no-logon and no-establish timeouts are the only time-driven
    /// forced disconnects.
    ///
    /// # Arguments
    /// * `now` - Current instant
    #[must_use]
    pub fn poll(&mut self, now: Instant) -> Vec<SessionEvent> {
        match self.state {
            ConnectionState::Unbound
                if now.duration_since(self.connected_at) >= self.config.no_logon_timeout =>
            {
                warn!(connection_id = self.connection_id, "no negotiate within timeout");
                vec![SessionEvent::Disconnect(DisconnectReason::NoNegotiateTimeout)]
            }
            ConnectionState::Negotiated => match self.negotiated_at {
                Some(at) if now.duration_since(at) >= self.config.no_establish_timeout => {
                    warn!(connection_id = self.connection_id, "no establish within timeout");
                    self.state = ConnectionState::Unbound;
                    vec![SessionEvent::Disconnect(DisconnectReason::NoEstablishTimeout)]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn reject_negotiate(
        &mut self,
        identity: SessionIdentity,
        code: NegotiationRejectCode,
    ) -> Vec<SessionEvent> {
        self.state = ConnectionState::Unbound;
        vec![
            SessionEvent::Send(ControlMessage::NegotiateReject(NegotiateReject {
                identity,
                code,
            })),
            SessionEvent::Disconnect(DisconnectReason::NegotiateRejected(code)),
        ]
    }

    fn reject_establish(
        &mut self,
        identity: SessionIdentity,
        code: EstablishRejectCode,
    ) -> Vec<SessionEvent> {
        self.state = ConnectionState::Unbound;
        vec![
            SessionEvent::Send(ControlMessage::EstablishReject(EstablishReject {
                identity,
                code,
            })),
            SessionEvent::Disconnect(DisconnectReason::EstablishRejected(code)),
        ]
    }
}
