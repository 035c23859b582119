pub mod connection;
pub mod primitive;
pub mod types;

pub use connection::{WebRtcConnection, WebRtcConnectionFactory};
pub use primitive::{ConnectionFactory, PeerConnection};
pub use types::{IceCandidate, SdpType, ServerConfig, SessionDescription};
