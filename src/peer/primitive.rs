use crate::error::SignalError;
use crate::peer::types::{IceCandidate, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The connection primitive a session drives. One instance per session,
/// created once and never replaced.
///
/// Locally discovered candidates are not part of this trait; they arrive on
/// the channel handed out by [`ConnectionFactory::create`] so the session can
/// forward each one exactly once, in discovery order.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, SignalError>;

    async fn create_answer(&self) -> Result<SessionDescription, SignalError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SignalError>;

    /// Fails with `DescriptionRejected` when the primitive is in an
    /// incompatible state.
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SignalError>;

    /// Fails with `CandidateRejected`; callers must only invoke this once a
    /// remote description has been applied.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SignalError>;

    async fn close(&self);
}

/// Creates one primitive per session together with its local-candidate
/// stream. The stream ends when the primitive finishes gathering or is
/// closed.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &str,
    ) -> Result<
        (
            Arc<dyn PeerConnection>,
            mpsc::UnboundedReceiver<IceCandidate>,
        ),
        SignalError,
    >;
}
