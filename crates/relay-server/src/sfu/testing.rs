//! In-memory transport handles for unit tests

use super::session::Session;
use crate::error::TransportError;
use crate::transport::{MediaSink, PeerLink};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_protocol::{MediaKind, SessionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use webrtc::rtp::packet::Packet;

#[derive(Default)]
pub struct CountingLink {
    pub closes: AtomicUsize,
}

#[async_trait]
impl PeerLink for CountingLink {
    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that remembers the sequence numbers written to it, per kind
#[derive(Default)]
pub struct RecordingSink {
    written: Mutex<Vec<(MediaKind, u16)>>,
}

impl RecordingSink {
    pub fn sequence_numbers(&self, kind: MediaKind) -> Vec<u16> {
        self.written
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, seq)| *seq)
            .collect()
    }

    pub async fn wait_for(&self, kind: MediaKind, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.sequence_numbers(kind).len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sink never received the expected packets");
    }
}

struct KindSink {
    kind: MediaKind,
    inner: Arc<RecordingSink>,
}

#[async_trait]
impl MediaSink for KindSink {
    async fn write(&self, packet: &Packet) -> Result<(), TransportError> {
        self.inner
            .written
            .lock()
            .push((self.kind, packet.header.sequence_number));
        Ok(())
    }
}

pub fn recording_session(id: SessionId, queue_depth: usize) -> (Arc<Session>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let session = Session::new(
        id,
        Arc::new(CountingLink::default()),
        Arc::new(KindSink {
            kind: MediaKind::Audio,
            inner: sink.clone(),
        }),
        Arc::new(KindSink {
            kind: MediaKind::Video,
            inner: sink.clone(),
        }),
        queue_depth,
    );
    (session, sink)
}

pub fn idle_session(id: SessionId) -> Arc<Session> {
    recording_session(id, 8).0
}

/// Sink whose every second write fails; successful writes are recorded
#[derive(Default)]
pub struct FlakySink {
    attempts: AtomicUsize,
    pub written: Mutex<Vec<u16>>,
}

impl FlakySink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSink for FlakySink {
    async fn write(&self, packet: &Packet) -> Result<(), TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt % 2 == 0 {
            return Err(TransportError::Other("write refused".into()));
        }
        self.written.lock().push(packet.header.sequence_number);
        Ok(())
    }
}
