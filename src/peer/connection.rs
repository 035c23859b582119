use crate::config::validate_ice_servers;
use crate::error::SignalError;
use crate::peer::primitive::{ConnectionFactory, PeerConnection};
use crate::peer::types::{IceCandidate, SdpType, ServerConfig, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::{
    api::APIBuilder,
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, sdp::session_description::RTCSessionDescription,
        RTCPeerConnection,
    },
};

/// Production connection primitive backed by `webrtc::RTCPeerConnection`.
pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcConnection {
    /// The underlying peer connection, for the media layer to attach tracks
    /// or data channels and to observe remote-track events. Signaling never
    /// goes through this handle.
    pub fn inner(&self) -> Arc<RTCPeerConnection> {
        self.pc.clone()
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, SignalError> {
    match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(|e| SignalError::DescriptionRejected(format!("invalid session description: {e}")))
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription, SignalError> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        other => {
            return Err(SignalError::Setup(format!(
                "unsupported sdp type produced: {other:?}"
            )))
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription, SignalError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| SignalError::Setup(format!("create_offer failed: {e}")))?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, SignalError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| SignalError::Setup(format!("create_answer failed: {e}")))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SignalError> {
        let desc = to_rtc_description(desc)?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| SignalError::DescriptionRejected(e.to_string()))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SignalError> {
        let desc = to_rtc_description(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| SignalError::DescriptionRejected(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SignalError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| SignalError::CandidateRejected(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!(error = %e, "peer connection close failed");
        }
    }
}

/// Builds one `RTCPeerConnection` per session from a shared ICE server list.
pub struct WebRtcConnectionFactory {
    ice_servers: Vec<ServerConfig>,
}

impl WebRtcConnectionFactory {
    pub fn new(ice_servers: Vec<ServerConfig>) -> Result<Self, SignalError> {
        validate_ice_servers(&ice_servers)?;
        Ok(Self { ice_servers })
    }

    fn rtc_config(&self) -> RTCConfiguration {
        let ice_servers = self
            .ice_servers
            .iter()
            .map(|config| RTCIceServer {
                urls: vec![add_ice_url_scheme(config)],
                username: config.username.clone().unwrap_or_default(),
                credential: config.credential.clone().unwrap_or_default(),
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ice_candidate_pool_size: 10,
            bundle_policy: RTCBundlePolicy::MaxBundle,
            rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
            ..Default::default()
        }
    }
}

impl Default for WebRtcConnectionFactory {
    fn default() -> Self {
        Self {
            ice_servers: crate::config::default_ice_servers(),
        }
    }
}

#[async_trait]
impl ConnectionFactory for WebRtcConnectionFactory {
    async fn create(
        &self,
        peer_id: &str,
    ) -> Result<
        (
            Arc<dyn PeerConnection>,
            mpsc::UnboundedReceiver<IceCandidate>,
        ),
        SignalError,
    > {
        let api = APIBuilder::new().build();
        let pc = Arc::new(
            api.new_peer_connection(self.rtc_config())
                .await
                .map_err(|e| SignalError::Setup(e.to_string()))?,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Arc::new(Mutex::new(Some(tx)));
        let peer = peer_id.to_string();

        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            match cand {
                Some(c) => {
                    if let Ok(init) = c.to_json() {
                        debug!(peer_id = %peer, candidate = %init.candidate, "local candidate gathered");
                        let guard = sender.lock().expect("candidate sender lock");
                        if let Some(tx) = guard.as_ref() {
                            let _ = tx.send(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                            });
                        }
                    }
                }
                None => {
                    // end of gathering, close the stream
                    debug!(peer_id = %peer, "candidate gathering complete");
                    sender.lock().expect("candidate sender lock").take();
                }
            }
            Box::pin(async {})
        }));

        Ok((Arc::new(WebRtcConnection { pc }), rx))
    }
}
