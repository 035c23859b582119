use crate::error::SignalError;
use crate::peer::primitive::ConnectionFactory;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::session::{PeerSession, Phase, Role};
use crate::signaling::{self, SignalingMessage};
use crate::transport::SignalingTransport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events routed into a session's queue. Each session processes them one at
/// a time, in arrival order.
enum SessionInput {
    StartOffer,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    LocalCandidate(IceCandidate),
    Close,
}

struct SessionHandle {
    role: Role,
    phase: Arc<Mutex<Phase>>,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    fn phase(&self) -> Phase {
        *self.phase.lock().expect("phase lock")
    }

    fn send(&self, input: SessionInput) {
        // A closed queue means the session task already exited; the event
        // becomes a no-op, which is exactly the close semantics we want.
        let _ = self.tx.send(input);
    }
}

/// Owns the per-peer sessions and routes transport events to them.
///
/// Routing itself is synchronous and never awaits session work: each session
/// runs on its own task, so a suspended description application for one peer
/// cannot stall dispatch for the others. The session table is the only
/// shared state and is held only for insert/lookup/remove.
pub struct SessionManager {
    factory: Arc<dyn ConnectionFactory>,
    transport: Arc<dyn SignalingTransport>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        transport: Arc<dyn SignalingTransport>,
    ) -> Self {
        Self {
            factory,
            transport,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// A peer appeared in the room: open an offerer session toward it and
    /// start negotiating. A second join notification for a peer with a live
    /// session is ignored, so at most one session per peer ever exists.
    pub fn on_peer_joined(&self, peer_id: &str) {
        let mut sessions = self.sessions.lock().expect("session table lock");
        if sessions.contains_key(peer_id) {
            debug!(peer_id, "join for a live session ignored");
            return;
        }
        info!(peer_id, "peer joined, starting negotiation");
        let handle = self.spawn_session(peer_id, Role::Offerer);
        handle.send(SessionInput::StartOffer);
        sessions.insert(peer_id.to_string(), handle);
    }

    /// Manual-flow equivalent of [`on_peer_joined`](Self::on_peer_joined).
    pub fn request_connect(&self, peer_id: &str) {
        self.on_peer_joined(peer_id);
    }

    /// Routes one inbound signaling message. Policy rejections and messages
    /// for unknown peers are logged and dropped here; primitive-level
    /// failures are handled on the session's own task.
    pub fn on_inbound_message(&self, from_peer_id: &str, message: SignalingMessage) {
        match message {
            SignalingMessage::Offer { offer } => self.route_offer(from_peer_id, offer),
            SignalingMessage::Answer { answer } => self.route_answer(from_peer_id, answer),
            SignalingMessage::Candidate { candidate } => {
                self.route_candidate(from_peer_id, candidate)
            }
        }
    }

    /// Decodes raw transport payload first; a malformed payload is reported
    /// to the caller and changes no session state.
    pub fn on_inbound_raw(&self, from_peer_id: &str, raw: &str) -> Result<(), SignalError> {
        match signaling::decode(raw) {
            Ok(message) => {
                self.on_inbound_message(from_peer_id, message);
                Ok(())
            }
            Err(e) => {
                warn!(peer_id = %from_peer_id, error = %e, "dropping malformed inbound message");
                Err(e)
            }
        }
    }

    /// Forwards one locally discovered candidate to the remote peer, for
    /// primitives hosted outside the factory's candidate stream.
    pub fn on_local_candidate(&self, peer_id: &str, candidate: IceCandidate) {
        let sessions = self.sessions.lock().expect("session table lock");
        match sessions.get(peer_id) {
            Some(handle) => handle.send(SessionInput::LocalCandidate(candidate)),
            None => warn!(peer_id, "local candidate for unknown peer dropped"),
        }
    }

    /// The peer left the room; same as [`close`](Self::close).
    pub fn on_peer_left(&self, peer_id: &str) {
        self.close(peer_id);
    }

    /// Releases the session and its connection primitive. Idempotent; an
    /// operation still in flight on the session task finishes as a no-op.
    pub fn close(&self, peer_id: &str) {
        let removed = self
            .sessions
            .lock()
            .expect("session table lock")
            .remove(peer_id);
        if let Some(handle) = removed {
            info!(peer_id, "closing session");
            handle.send(SessionInput::Close);
        }
    }

    /// Negotiation status for one peer, for display.
    pub fn phase(&self, peer_id: &str) -> Option<Phase> {
        self.sessions
            .lock()
            .expect("session table lock")
            .get(peer_id)
            .map(SessionHandle::phase)
    }

    /// Peers with a live session, in no particular order.
    pub fn active_peers(&self) -> Vec<String> {
        self.sessions
            .lock()
            .expect("session table lock")
            .keys()
            .cloned()
            .collect()
    }

    /// Manual flow: accept a pasted description blob (offer or answer) from
    /// the human relay.
    pub fn submit_remote_description(
        &self,
        peer_id: &str,
        raw: &str,
    ) -> Result<(), SignalError> {
        match signaling::decode_blob(raw)? {
            message @ (SignalingMessage::Offer { .. } | SignalingMessage::Answer { .. }) => {
                self.on_inbound_message(peer_id, message);
                Ok(())
            }
            SignalingMessage::Candidate { .. } => Err(SignalError::MalformedMessage(
                "expected a description blob, got a candidate".into(),
            )),
        }
    }

    /// Manual flow: accept a pasted candidate blob.
    pub fn submit_remote_candidate(&self, peer_id: &str, raw: &str) -> Result<(), SignalError> {
        match signaling::decode_blob(raw)? {
            SignalingMessage::Candidate { candidate } => {
                self.route_candidate(peer_id, candidate);
                Ok(())
            }
            other => Err(SignalError::MalformedMessage(format!(
                "expected a candidate blob, got {}",
                other.kind()
            ))),
        }
    }

    fn route_offer(&self, from_peer_id: &str, offer: SessionDescription) {
        let mut sessions = self.sessions.lock().expect("session table lock");
        match sessions.get(from_peer_id) {
            Some(handle) => {
                // A duplicated offer that raced the answerer task is refused
                // by the session's own guard; anything else is a
                // renegotiation attempt on a live session.
                if handle.role == Role::Answerer && handle.phase() == Phase::Idle {
                    handle.send(SessionInput::RemoteOffer(offer));
                } else {
                    warn!(
                        peer_id = %from_peer_id,
                        phase = ?handle.phase(),
                        "renegotiation rejected: session already negotiating"
                    );
                }
            }
            None => {
                info!(peer_id = %from_peer_id, "inbound offer, starting answerer session");
                let handle = self.spawn_session(from_peer_id, Role::Answerer);
                handle.send(SessionInput::RemoteOffer(offer));
                sessions.insert(from_peer_id.to_string(), handle);
            }
        }
    }

    fn route_answer(&self, from_peer_id: &str, answer: SessionDescription) {
        let sessions = self.sessions.lock().expect("session table lock");
        match sessions.get(from_peer_id) {
            Some(handle) if handle.role == Role::Offerer => match handle.phase() {
                Phase::OfferCreated | Phase::OfferSent | Phase::Connected => {
                    handle.send(SessionInput::RemoteAnswer(answer));
                }
                phase => {
                    warn!(peer_id = %from_peer_id, ?phase, "answer dropped in unexpected phase")
                }
            },
            Some(_) => {
                warn!(peer_id = %from_peer_id, "answer for an answerer session dropped")
            }
            None => warn!(peer_id = %from_peer_id, "answer for unknown peer dropped"),
        }
    }

    fn route_candidate(&self, from_peer_id: &str, candidate: IceCandidate) {
        let sessions = self.sessions.lock().expect("session table lock");
        match sessions.get(from_peer_id) {
            Some(handle) => handle.send(SessionInput::RemoteCandidate(candidate)),
            None => warn!(peer_id = %from_peer_id, "candidate for unknown peer dropped"),
        }
    }

    fn spawn_session(&self, peer_id: &str, role: Role) -> SessionHandle {
        let phase = Arc::new(Mutex::new(Phase::Idle));
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_session(
            peer_id.to_string(),
            role,
            phase.clone(),
            rx,
            self.factory.clone(),
            self.transport.clone(),
        ));
        SessionHandle { role, phase, tx }
    }
}

/// The per-session actor: creates the connection primitive, then processes
/// queued inputs strictly in order, interleaved with locally discovered
/// candidates. Exits when the session is closed or its queue is dropped.
async fn run_session(
    peer_id: String,
    role: Role,
    phase: Arc<Mutex<Phase>>,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    factory: Arc<dyn ConnectionFactory>,
    transport: Arc<dyn SignalingTransport>,
) {
    let (connection, mut local_candidates) = match factory.create(&peer_id).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(peer_id = %peer_id, error = %e, "connection primitive setup failed");
            *phase.lock().expect("phase lock") = Phase::Failed;
            return;
        }
    };
    let mut session = PeerSession::new(peer_id, role, connection, phase);
    let mut gathering_done = false;

    loop {
        tokio::select! {
            input = inputs.recv() => match input {
                Some(SessionInput::Close) | None => {
                    session.close().await;
                    return;
                }
                Some(input) => {
                    if let Err(e) = handle_input(&mut session, &transport, input).await {
                        warn!(peer_id = %session.peer_id(), error = %e, "session failed");
                        session.fail();
                    }
                }
            },
            cand = local_candidates.recv(), if !gathering_done => match cand {
                Some(candidate) => {
                    let input = SessionInput::LocalCandidate(candidate);
                    if let Err(e) = handle_input(&mut session, &transport, input).await {
                        warn!(peer_id = %session.peer_id(), error = %e, "session failed");
                        session.fail();
                    }
                }
                None => gathering_done = true,
            },
        }
    }
}

async fn handle_input(
    session: &mut PeerSession,
    transport: &Arc<dyn SignalingTransport>,
    input: SessionInput,
) -> Result<(), SignalError> {
    match input {
        SessionInput::StartOffer => {
            if let Some(message) = session.start_offer().await? {
                transport.send(session.peer_id(), &message).await?;
                session.mark_offer_sent();
                debug!(peer_id = %session.peer_id(), "offer sent");
            }
        }
        SessionInput::RemoteOffer(offer) => match session.accept_offer(offer).await {
            Ok(Some(message)) => {
                transport.send(session.peer_id(), &message).await?;
                session.mark_answer_sent();
                // no further message expected on this side
                session.complete();
                info!(peer_id = %session.peer_id(), "answer sent, negotiation complete");
            }
            Ok(None) => {}
            // policy rejection, the live negotiation is untouched
            Err(e @ SignalError::RenegotiationRejected(_)) => {
                warn!(peer_id = %session.peer_id(), error = %e, "offer rejected");
            }
            Err(e) => return Err(e),
        },
        SessionInput::RemoteAnswer(answer) => {
            session.accept_answer(answer).await?;
            if session.phase() == Phase::Connected {
                info!(peer_id = %session.peer_id(), "answer applied, negotiation complete");
            }
        }
        SessionInput::RemoteCandidate(candidate) => {
            session.add_remote_candidate(candidate).await?;
        }
        SessionInput::LocalCandidate(candidate) => {
            let message = SignalingMessage::Candidate { candidate };
            transport.send(session.peer_id(), &message).await?;
        }
        SessionInput::Close => unreachable!("close is handled by the session loop"),
    }
    Ok(())
}
