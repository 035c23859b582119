use thiserror::Error;

/// Errors raised while negotiating a peer connection.
///
/// All of these are contained at the session boundary: a failure while
/// processing one peer's traffic never propagates to another session or to
/// the manager's dispatch path.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Inbound payload was not a valid signaling message. Logged and dropped.
    #[error("malformed signaling message: {0}")]
    MalformedMessage(String),

    /// An offer arrived for a peer that already has a live negotiation.
    #[error("renegotiation rejected for peer {0}")]
    RenegotiationRejected(String),

    /// The connection primitive refused a remote description.
    #[error("remote description rejected: {0}")]
    DescriptionRejected(String),

    /// The connection primitive refused an ICE candidate.
    #[error("ice candidate rejected: {0}")]
    CandidateRejected(String),

    /// A message referenced a peer with no session. Dropped.
    #[error("no session for peer {0}")]
    UnknownPeer(String),

    /// The signaling transport failed to deliver a message.
    #[error("transport send failed: {0}")]
    Transport(String),

    /// Connection primitive setup failed before a session could start.
    #[error("connection setup failed: {0}")]
    Setup(String),
}
