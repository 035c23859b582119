use crate::error::SignalError;
use crate::signaling::{self, SignalingMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of the signaling relay. Inbound traffic and room-join
/// notifications are pushed into the [`SessionManager`](crate::SessionManager)
/// by whoever owns the transport's receive loop.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn send(&self, peer_id: &str, message: &SignalingMessage) -> Result<(), SignalError>;
}

/// The degenerate transport for the manual copy/paste flow: `send` means
/// "hand the encoded blob to a human". Each outbound message is emitted on
/// a channel as `(peer_id, blob)` for the caller to display; the return path
/// is `SessionManager::submit_remote_description` /
/// `submit_remote_candidate` with pasted text.
pub struct ManualSignaling {
    outbound: mpsc::UnboundedSender<(String, String)>,
}

impl ManualSignaling {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { outbound: tx }, rx)
    }
}

#[async_trait]
impl SignalingTransport for ManualSignaling {
    async fn send(&self, peer_id: &str, message: &SignalingMessage) -> Result<(), SignalError> {
        let blob = signaling::encode_blob(message.clone());
        debug!(peer_id, kind = message.kind(), len = blob.len(), "blob ready for copy");
        self.outbound
            .send((peer_id.to_string(), blob))
            .map_err(|_| SignalError::Transport("manual outbound channel closed".into()))
    }
}
