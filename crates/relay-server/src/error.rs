use relay_protocol::{DecodeError, MediaKind, SessionId};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the media transport collaborator
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("Transport produced no local description")]
    MissingLocalDescription,

    #[error("Handle is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

/// A session could not be negotiated; nothing was registered
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("Negotiation failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Negotiation did not complete within {0:?}")]
    Timeout(Duration),
}

/// A single best-effort write to one target did not go through
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardWriteError {
    #[error("{kind} queue of {target} is full")]
    Backpressure { target: SessionId, kind: MediaKind },

    #[error("{kind} queue of {target} is closed")]
    Closed { target: SessionId, kind: MediaKind },
}

/// An inbound stream stopped producing media
#[derive(Error, Debug)]
pub enum DrainError {
    #[error("Inbound {kind} stream of {session} ended: {source}")]
    Ended {
        session: SessionId,
        kind: MediaKind,
        #[source]
        source: TransportError,
    },
}

/// Internal registry invariant violation
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session {0} is already registered")]
    DuplicateId(SessionId),
}

/// Errors surfaced to whoever submitted an offer
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid signaling payload: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("Registry inconsistency: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to encode answer: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
