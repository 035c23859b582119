use crate::error::SignalError;
use crate::peer::primitive::PeerConnection;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::signaling::SignalingMessage;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// How this end of the negotiation was created. Fixed for the session's
/// lifetime: locally initiated sessions offer, sessions triggered by an
/// inbound offer answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Offerer,
    Answerer,
}

/// Where a negotiation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    OfferCreated,
    OfferSent,
    AnswerCreated,
    AnswerSent,
    Connected,
    Failed,
}

/// One negotiation with one remote peer. Owns its connection primitive
/// exclusively; all operations run on the session's own task, one at a time.
pub struct PeerSession {
    peer_id: String,
    role: Role,
    phase: Arc<Mutex<Phase>>,
    connection: Arc<dyn PeerConnection>,
    pending_candidates: Vec<IceCandidate>,
    local_description_set: bool,
    remote_description_set: bool,
}

impl PeerSession {
    /// `phase` is shared with the manager's handle so collaborators can read
    /// negotiation status without touching the session.
    pub fn new(
        peer_id: String,
        role: Role,
        connection: Arc<dyn PeerConnection>,
        phase: Arc<Mutex<Phase>>,
    ) -> Self {
        Self {
            peer_id,
            role,
            phase,
            connection,
            pending_candidates: Vec::new(),
            local_description_set: false,
            remote_description_set: false,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().expect("phase lock")
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().expect("phase lock") = phase;
    }

    /// Offerer entry point: produce the offer to relay to the remote peer.
    /// A repeated call is a no-op and returns `None`; descriptions are set
    /// at most once per direction.
    pub async fn start_offer(&mut self) -> Result<Option<SignalingMessage>, SignalError> {
        if self.local_description_set {
            debug!(peer_id = %self.peer_id, "offer already created, ignoring repeat");
            return Ok(None);
        }
        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(offer.clone()).await?;
        self.local_description_set = true;
        self.set_phase(Phase::OfferCreated);
        Ok(Some(SignalingMessage::Offer { offer }))
    }

    /// Marks the offer as handed off to the transport. Observational only.
    pub fn mark_offer_sent(&self) {
        self.set_phase(Phase::OfferSent);
    }

    /// Answerer entry point: apply the inbound offer and produce the answer.
    /// A second offer on a session that already applied one is a
    /// renegotiation attempt and is refused.
    pub async fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<Option<SignalingMessage>, SignalError> {
        if self.remote_description_set {
            return Err(SignalError::RenegotiationRejected(self.peer_id.clone()));
        }
        self.connection.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.flush_pending().await?;

        let answer = self.connection.create_answer().await?;
        if !self.local_description_set {
            self.connection
                .set_local_description(answer.clone())
                .await?;
            self.local_description_set = true;
        }
        self.set_phase(Phase::AnswerCreated);
        Ok(Some(SignalingMessage::Answer { answer }))
    }

    /// Marks the answer as handed off to the transport.
    pub fn mark_answer_sent(&self) {
        self.set_phase(Phase::AnswerSent);
    }

    /// Terminal success. The answerer reaches this as soon as its answer is
    /// out, since no further signaling message is expected.
    pub fn complete(&self) {
        self.set_phase(Phase::Connected);
    }

    /// Offerer side: apply the remote answer and finish the negotiation.
    /// Re-applying after the remote description is set is an idempotent
    /// no-op, so a duplicated answer cannot double-apply.
    pub async fn accept_answer(&mut self, answer: SessionDescription) -> Result<(), SignalError> {
        if self.remote_description_set {
            debug!(peer_id = %self.peer_id, "remote description already set, ignoring answer");
            return Ok(());
        }
        self.connection.set_remote_description(answer).await?;
        self.remote_description_set = true;
        self.flush_pending().await?;
        self.set_phase(Phase::Connected);
        Ok(())
    }

    /// Applies a remote candidate immediately when possible, otherwise
    /// queues it until the remote description lands. Candidates for a failed
    /// session are discarded.
    pub async fn add_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<(), SignalError> {
        if self.phase() == Phase::Failed {
            debug!(peer_id = %self.peer_id, "session failed, discarding candidate");
            return Ok(());
        }
        if self.remote_description_set {
            self.connection.add_ice_candidate(candidate).await
        } else {
            debug!(peer_id = %self.peer_id, queued = self.pending_candidates.len() + 1,
                "remote description not set yet, queuing candidate");
            self.pending_candidates.push(candidate);
            Ok(())
        }
    }

    /// Applies queued candidates in their original receipt order.
    async fn flush_pending(&mut self) -> Result<(), SignalError> {
        for candidate in self.pending_candidates.drain(..) {
            self.connection.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    /// Terminal failure; the session stays around for status reads until the
    /// collaborator closes it.
    pub fn fail(&self) {
        self.set_phase(Phase::Failed);
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::SdpType;
    use async_trait::async_trait;

    #[derive(Default)]
    struct MockConnection {
        calls: Mutex<Vec<String>>,
        remote_set: Mutex<bool>,
        reject_remote: bool,
    }

    impl MockConnection {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl PeerConnection for MockConnection {
        async fn create_offer(&self) -> Result<SessionDescription, SignalError> {
            self.record("create_offer");
            Ok(SessionDescription::offer("mock-offer"))
        }

        async fn create_answer(&self) -> Result<SessionDescription, SignalError> {
            self.record("create_answer");
            Ok(SessionDescription::answer("mock-answer"))
        }

        async fn set_local_description(
            &self,
            desc: SessionDescription,
        ) -> Result<(), SignalError> {
            self.record(format!("set_local:{:?}", desc.kind));
            Ok(())
        }

        async fn set_remote_description(
            &self,
            desc: SessionDescription,
        ) -> Result<(), SignalError> {
            if self.reject_remote {
                return Err(SignalError::DescriptionRejected("mock rejection".into()));
            }
            self.record(format!("set_remote:{:?}", desc.kind));
            *self.remote_set.lock().unwrap() = true;
            Ok(())
        }

        async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SignalError> {
            if !*self.remote_set.lock().unwrap() {
                return Err(SignalError::CandidateRejected(
                    "remote description absent".into(),
                ));
            }
            self.record(format!("candidate:{}", candidate.candidate));
            Ok(())
        }

        async fn close(&self) {
            self.record("close");
        }
    }

    fn candidate(tag: &str) -> IceCandidate {
        IceCandidate {
            candidate: tag.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        }
    }

    fn offerer(conn: Arc<MockConnection>) -> PeerSession {
        PeerSession::new(
            "remote".into(),
            Role::Offerer,
            conn,
            Arc::new(Mutex::new(Phase::Idle)),
        )
    }

    #[tokio::test]
    async fn offer_is_created_once() {
        let conn = Arc::new(MockConnection::default());
        let mut session = offerer(conn.clone());

        let first = session.start_offer().await.unwrap();
        assert!(matches!(first, Some(SignalingMessage::Offer { .. })));
        assert_eq!(session.phase(), Phase::OfferCreated);

        let second = session.start_offer().await.unwrap();
        assert!(second.is_none());
        assert_eq!(
            conn.calls()
                .iter()
                .filter(|c| *c == "create_offer")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn buffered_candidates_flush_in_receipt_order() {
        let conn = Arc::new(MockConnection::default());
        let mut session = offerer(conn.clone());
        session.start_offer().await.unwrap();

        for tag in ["c1", "c2", "c3"] {
            session.add_remote_candidate(candidate(tag)).await.unwrap();
        }
        // nothing applied yet, remote description still absent
        assert!(!conn.calls().iter().any(|c| c.starts_with("candidate:")));

        session
            .accept_answer(SessionDescription::answer("a"))
            .await
            .unwrap();
        assert_eq!(session.phase(), Phase::Connected);

        let applied: Vec<_> = conn
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("candidate:"))
            .collect();
        assert_eq!(applied, vec!["candidate:c1", "candidate:c2", "candidate:c3"]);
    }

    #[tokio::test]
    async fn duplicate_answer_is_a_noop() {
        let conn = Arc::new(MockConnection::default());
        let mut session = offerer(conn.clone());
        session.start_offer().await.unwrap();

        let answer = SessionDescription::answer("a");
        session.accept_answer(answer.clone()).await.unwrap();
        session.accept_answer(answer).await.unwrap();

        assert_eq!(session.phase(), Phase::Connected);
        assert_eq!(
            conn.calls()
                .iter()
                .filter(|c| c.starts_with("set_remote"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn second_offer_is_renegotiation() {
        let conn = Arc::new(MockConnection::default());
        let mut session = PeerSession::new(
            "remote".into(),
            Role::Answerer,
            conn.clone(),
            Arc::new(Mutex::new(Phase::Idle)),
        );

        let offer = SessionDescription::offer("o");
        let reply = session.accept_offer(offer.clone()).await.unwrap();
        assert!(matches!(reply, Some(SignalingMessage::Answer { .. })));
        assert_eq!(session.phase(), Phase::AnswerCreated);
        assert_eq!(
            session.accept_offer(offer).await.unwrap_err().to_string(),
            SignalError::RenegotiationRejected("remote".into()).to_string()
        );
    }

    #[tokio::test]
    async fn answerer_offer_kind_sequence() {
        let conn = Arc::new(MockConnection::default());
        let mut session = PeerSession::new(
            "remote".into(),
            Role::Answerer,
            conn.clone(),
            Arc::new(Mutex::new(Phase::Idle)),
        );

        session
            .add_remote_candidate(candidate("early"))
            .await
            .unwrap();
        session
            .accept_offer(SessionDescription {
                kind: SdpType::Offer,
                sdp: "o".into(),
            })
            .await
            .unwrap();

        // remote description first, then the early candidate, then the answer
        assert_eq!(
            conn.calls(),
            vec![
                "set_remote:Offer",
                "candidate:early",
                "create_answer",
                "set_local:Answer",
            ]
        );
    }

    #[tokio::test]
    async fn candidates_after_failure_are_discarded() {
        let conn = Arc::new(MockConnection::default());
        let mut session = offerer(conn.clone());
        session.fail();

        session
            .add_remote_candidate(candidate("late"))
            .await
            .unwrap();
        assert!(conn.calls().is_empty());
        assert_eq!(session.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn rejected_description_surfaces_error() {
        let conn = Arc::new(MockConnection {
            reject_remote: true,
            ..Default::default()
        });
        let mut session = offerer(conn);
        session.start_offer().await.unwrap();

        let err = session
            .accept_answer(SessionDescription::answer("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::DescriptionRejected(_)));
    }
}
