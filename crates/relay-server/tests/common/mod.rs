//! In-memory transport for driving the relay without a network

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use relay_protocol::{MediaKind, SessionDescription};
use relay_server::error::TransportError;
use relay_server::sfu::Orchestrator;
use relay_server::state::Config;
use relay_server::transport::{
    Background, ConnectivityState, MediaSink, MediaSource, Negotiated, PeerLink, Transport,
    TransportEvent,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use webrtc::rtp::packet::Packet;

/// How the fake transport responds to the next offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Answer,
    Reject,
    Hang,
}

pub struct FakeTransport {
    behavior: Mutex<Behavior>,
    peers: Mutex<Vec<Arc<RemotePeer>>>,
    negotiations: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(Behavior::Answer),
            peers: Mutex::new(Vec::new()),
            negotiations: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    /// Remote side of the most recently negotiated session
    pub fn last_peer(&self) -> Arc<RemotePeer> {
        self.peers.lock().last().cloned().expect("no session negotiated")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn negotiate(&self, offer: SessionDescription) -> Result<Negotiated, TransportError> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        match behavior {
            Behavior::Reject => return Err(TransportError::Other("remote rejected".into())),
            Behavior::Hang => std::future::pending::<()>().await,
            Behavior::Answer => {}
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        let peer = Arc::new(RemotePeer {
            events: Mutex::new(Some(events_tx)),
            audio: Arc::new(Recorder::default()),
            video: Arc::new(Recorder::default()),
            link: Arc::new(Link::default()),
            reader_stopped: Arc::new(AtomicBool::new(false)),
        });
        self.peers.lock().push(peer.clone());

        Ok(Negotiated {
            answer: SessionDescription::answer(format!("answer to {}", offer.sdp)),
            link: peer.link.clone(),
            audio: peer.audio.clone(),
            video: peer.video.clone(),
            events,
            background: vec![Box::pin(endless_reader(peer.reader_stopped.clone())) as Background],
        })
    }
}

/// Test-side controller of one negotiated session
pub struct RemotePeer {
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    audio: Arc<Recorder>,
    video: Arc<Recorder>,
    link: Arc<Link>,
    reader_stopped: Arc<AtomicBool>,
}

impl RemotePeer {
    fn send(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn connect(&self) {
        self.send(TransportEvent::State(ConnectivityState::Connected));
    }

    pub fn signal(&self, state: ConnectivityState) {
        self.send(TransportEvent::State(state));
    }

    /// Drop the notification channel as a crashed transport would
    pub fn vanish(&self) {
        self.events.lock().take();
    }

    /// Start a remote stream of `kind`; packets pushed into the feed reach the relay
    pub fn publish(&self, kind: MediaKind) -> mpsc::UnboundedSender<Packet> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send(TransportEvent::Track {
            kind,
            source: Box::new(Feed { rx }),
        });
        tx
    }

    /// Payloads written to this session's outbound stream of `kind`
    pub fn received(&self, kind: MediaKind) -> Vec<(u16, Bytes)> {
        self.recorder(kind).packets.lock().clone()
    }

    pub async fn wait_for(&self, kind: MediaKind, count: usize) {
        let recorder = self.recorder(kind);
        eventually(|| recorder.packets.lock().len() >= count).await;
    }

    pub fn closes(&self) -> usize {
        self.link.closes.load(Ordering::SeqCst)
    }

    /// Whether the transport's background reader has been stopped
    pub fn reader_stopped(&self) -> bool {
        self.reader_stopped.load(Ordering::SeqCst)
    }

    /// Make closing the link fail from now on
    pub fn fail_close(&self) {
        self.link.fail.store(true, Ordering::SeqCst);
    }

    fn recorder(&self, kind: MediaKind) -> &Arc<Recorder> {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }
}

struct Feed {
    rx: mpsc::UnboundedReceiver<Packet>,
}

#[async_trait]
impl MediaSource for Feed {
    async fn recv(&mut self) -> Result<Packet, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

#[derive(Default)]
struct Recorder {
    packets: Mutex<Vec<(u16, Bytes)>>,
}

#[async_trait]
impl MediaSink for Recorder {
    async fn write(&self, packet: &Packet) -> Result<(), TransportError> {
        self.packets
            .lock()
            .push((packet.header.sequence_number, packet.payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct Link {
    closes: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl PeerLink for Link {
    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Other("close refused".into()));
        }
        Ok(())
    }
}

/// Sets its flag when dropped
struct StopFlag(Arc<AtomicBool>);

impl Drop for StopFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Reader loop that only ends when the relay stops it
async fn endless_reader(stopped: Arc<AtomicBool>) {
    let _flag = StopFlag(stopped);
    std::future::pending::<()>().await
}

pub fn test_config() -> Config {
    Config {
        stun_servers: vec![],
        turn_servers: vec![],
        negotiation_timeout_secs: 2,
        outbound_queue_depth: 256,
        shutdown_grace_secs: 2,
    }
}

pub fn relay(transport: &Arc<FakeTransport>) -> Orchestrator {
    Orchestrator::new(transport.clone(), &test_config())
}

/// Negotiate one session and mark it connected
pub async fn join(relay: &Orchestrator, transport: &FakeTransport) -> Arc<RemotePeer> {
    relay
        .handle_offer(SessionDescription::offer("v=0"))
        .await
        .expect("offer should be answered");
    let peer = transport.last_peer();
    peer.connect();
    peer
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
