use crate::error::SignalError;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::utils::random_id;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// The wire unit relayed between peers. Serialized as a tagged union, the
/// same shape the relay traffic has always used:
///
/// ```json
/// {"type":"offer","offer":{...}}
/// {"type":"answer","answer":{...}}
/// {"type":"candidate","candidate":{...}}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer { offer: SessionDescription },
    Answer { answer: SessionDescription },
    Candidate { candidate: IceCandidate },
}

impl SignalingMessage {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::Candidate { .. } => "candidate",
        }
    }
}

/// Manual-flow envelope around a message: an id to let a human correlate
/// pasted blobs with the session they came from, plus a creation timestamp.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignalBlob {
    pub id: String,
    pub ts: i64,
    pub message: SignalingMessage,
}

impl SignalBlob {
    pub fn new(message: SignalingMessage) -> Self {
        Self {
            id: random_id(),
            ts: chrono::Utc::now().timestamp(),
            message,
        }
    }
}

/// Serializes a message for the transport: JSON, then standard base64.
pub fn encode(message: &SignalingMessage) -> String {
    // Serialization of these enums cannot fail.
    let json = serde_json::to_vec(message).expect("signaling message serializes");
    general_purpose::STANDARD.encode(json)
}

/// Inverse of [`encode`]. Any defect in the payload (bad base64, bad JSON,
/// missing or unrecognized `type` tag, missing kind-specific field) comes
/// back as `MalformedMessage` so the caller can log and drop it.
pub fn decode(raw: &str) -> Result<SignalingMessage, SignalError> {
    let bytes = general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| SignalError::MalformedMessage(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SignalError::MalformedMessage(format!("invalid message body: {e}")))
}

/// Encodes a message wrapped in the manual-flow envelope.
pub fn encode_blob(message: SignalingMessage) -> String {
    let blob = SignalBlob::new(message);
    let json = serde_json::to_vec(&blob).expect("signal blob serializes");
    general_purpose::STANDARD.encode(json)
}

/// Decodes a manual-flow blob back to its message, with the same error
/// policy as [`decode`].
pub fn decode_blob(raw: &str) -> Result<SignalingMessage, SignalError> {
    let bytes = general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| SignalError::MalformedMessage(format!("invalid base64: {e}")))?;
    let blob: SignalBlob = serde_json::from_slice(&bytes)
        .map_err(|e| SignalError::MalformedMessage(format!("invalid blob body: {e}")))?;
    Ok(blob.message)
}
