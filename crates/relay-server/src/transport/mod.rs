//! Media transport seam
//!
//! The relay core never talks to a peer connection directly. Negotiation,
//! connectivity and packet I/O go through these traits, which `rtc.rs`
//! implements on top of webrtc-rs.

mod rtc;

pub use rtc::WebRtcTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use relay_protocol::{MediaKind, SessionDescription};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::rtp::packet::Packet;

/// Connectivity reported by the transport for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Asynchronous notification from the transport about one session
pub enum TransportEvent {
    State(ConnectivityState),
    /// The remote party started sending a stream of `kind`
    Track {
        kind: MediaKind,
        source: Box<dyn MediaSource>,
    },
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportEvent::State(state) => f.debug_tuple("State").field(state).finish(),
            TransportEvent::Track { kind, .. } => {
                f.debug_struct("Track").field("kind", kind).finish_non_exhaustive()
            }
        }
    }
}

/// Read side of a negotiated inbound stream
#[async_trait]
pub trait MediaSource: Send {
    /// Next packet from the remote party; an error means the stream is over
    async fn recv(&mut self) -> Result<Packet, TransportError>;
}

/// Write side of a negotiated outbound stream
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn write(&self, packet: &Packet) -> Result<(), TransportError>;
}

/// Owner handle of a negotiated association
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Release the association; safe to call on an already closed link
    async fn close(&self) -> Result<(), TransportError>;
}

/// Transport work that has to keep running while the session is alive
pub type Background = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Result of a completed negotiation
pub struct Negotiated {
    pub answer: SessionDescription,
    pub link: Arc<dyn PeerLink>,
    pub audio: Arc<dyn MediaSink>,
    pub video: Arc<dyn MediaSink>,
    /// Connectivity and track notifications, buffered from the moment the
    /// association was created
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Handed to the session, which stops it on teardown
    pub background: Vec<Background>,
}

/// External collaborator that turns an offer into a live association
#[async_trait]
pub trait Transport: Send + Sync {
    /// Negotiate against `offer`, returning once the local answer is
    /// committed and candidate gathering is complete
    async fn negotiate(&self, offer: SessionDescription) -> Result<Negotiated, TransportError>;
}
