//! Peer-connection signaling orchestrator.
//!
//! Negotiates point-to-point connections by relaying offer/answer/candidate
//! messages through an out-of-band channel. The connection primitive and the
//! relay itself are pluggable capabilities: production code wires in the
//! [`peer::WebRtcConnectionFactory`] and whatever transport delivers room
//! traffic; the manual copy/paste flow uses [`transport::ManualSignaling`]
//! with a human as the relay.

pub mod config;
pub mod error;
pub mod manager;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod transport;
pub mod utils;

pub use error::SignalError;
pub use manager::SessionManager;
pub use peer::{
    ConnectionFactory, IceCandidate, PeerConnection, SdpType, ServerConfig, SessionDescription,
    WebRtcConnectionFactory,
};
pub use session::{Phase, Role};
pub use signaling::{SignalBlob, SignalingMessage};
pub use transport::{ManualSignaling, SignalingTransport};
