use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Role of a session description in the offer/answer exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SdpKind::Offer => "offer",
            SdpKind::Pranswer => "pranswer",
            SdpKind::Answer => "answer",
            SdpKind::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// Session description exchanged with a remote party
///
/// Serialized as `{"type": "offer", "sdp": "v=0..."}`, the same document
/// browsers produce from `RTCSessionDescription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Failure to turn a signaling payload into a session description
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("signaling payload is empty")]
    Empty,

    #[error("signaling payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("signaling payload is not a session description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a session description as base64 over its JSON document
pub fn encode_description(description: &SessionDescription) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(description)?;
    Ok(STANDARD.encode(json))
}

/// Decode a base64 signaling payload into a session description
///
/// Whitespace anywhere in the payload is ignored, so payloads pasted from a
/// terminal or wrapped across lines decode the same as an unwrapped payload.
pub fn decode_description(payload: &str) -> Result<SessionDescription, DecodeError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }

    let json = STANDARD.decode(compact.as_bytes())?;
    Ok(serde_json::from_slice(&json)?)
}
