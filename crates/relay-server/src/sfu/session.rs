//! Relayed session
//!
//! One remote party's association with the relay: its identity, lifecycle
//! state, the outbound queues other sessions forward into, and the tasks
//! spawned on its behalf.

use super::forwarder;
use crate::error::ForwardWriteError;
use crate::transport::{MediaSink, PeerLink};
use parking_lot::Mutex;
use relay_media::MediaUnit;
use relay_protocol::{MediaKind, SessionId, SessionState};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Why a session left the connected state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    /// `Disconnected` or `Failed`
    pub state: SessionState,
    pub reason: String,
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: SessionState,
    termination: Option<Termination>,
}

/// Forwarding counters for one session
#[derive(Debug, Default)]
pub(crate) struct ForwardStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    write_failures: AtomicU64,
}

impl ForwardStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fan_out(&self, forwarded: u64, dropped: u64) {
        self.forwarded.fetch_add(forwarded, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a session's forwarding counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Units read from this session's inbound streams
    pub received: u64,
    /// Units from this session queued for another session
    pub forwarded: u64,
    /// Units from this session dropped for a target (full or closed queue)
    pub dropped: u64,
    /// Units destined to this session that the transport failed to write
    pub write_failures: u64,
}

pub struct Session {
    id: SessionId,
    lifecycle: Mutex<Lifecycle>,
    link: Arc<dyn PeerLink>,
    audio_out: mpsc::Sender<Arc<MediaUnit>>,
    video_out: mpsc::Sender<Arc<MediaUnit>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    stats: Arc<ForwardStats>,
}

impl Session {
    /// Create a session in `Negotiating` and start its outbound writers
    ///
    /// `queue_depth` bounds how many units may wait for each outbound sink
    /// before further units for this session are dropped.
    pub fn new(
        id: SessionId,
        link: Arc<dyn PeerLink>,
        audio: Arc<dyn MediaSink>,
        video: Arc<dyn MediaSink>,
        queue_depth: usize,
    ) -> Arc<Self> {
        let (audio_out, audio_queue) = mpsc::channel(queue_depth.max(1));
        let (video_out, video_queue) = mpsc::channel(queue_depth.max(1));

        let session = Arc::new(Self {
            id,
            lifecycle: Mutex::new(Lifecycle::default()),
            link,
            audio_out,
            video_out,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            stats: Arc::new(ForwardStats::default()),
        });

        forwarder::spawn_writer(&session, MediaKind::Audio, audio_queue, audio);
        forwarder::spawn_writer(&session, MediaKind::Video, video_queue, video);

        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    /// Terminal state and reason, once the session has left the connected state
    pub fn termination(&self) -> Option<Termination> {
        self.lifecycle.lock().termination.clone()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            received: self.stats.received.load(Ordering::Relaxed),
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            write_failures: self.stats.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Queue a unit for this session's outbound stream of the unit's kind
    ///
    /// Never waits: a full queue drops the unit for this session only.
    pub fn try_forward(&self, unit: Arc<MediaUnit>) -> Result<(), ForwardWriteError> {
        let kind = unit.kind;
        let queue = match kind {
            MediaKind::Audio => &self.audio_out,
            MediaKind::Video => &self.video_out,
        };

        queue.try_send(unit).map_err(|e| match e {
            TrySendError::Full(_) => ForwardWriteError::Backpressure {
                target: self.id,
                kind,
            },
            TrySendError::Closed(_) => ForwardWriteError::Closed {
                target: self.id,
                kind,
            },
        })
    }

    /// Record `Negotiating -> Connected`; false if the session is past that point
    pub(crate) fn mark_connected(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.state.can_transition_to(SessionState::Connected) {
            return false;
        }
        lifecycle.state = SessionState::Connected;
        true
    }

    /// Move to `terminal` (unless already terminal) and then to `Removed`
    ///
    /// Returns true for exactly one caller over the session's lifetime; that
    /// caller owns teardown.
    pub(crate) fn begin_removal(&self, terminal: SessionState, reason: &str) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == SessionState::Removed {
            return false;
        }

        if !lifecycle.state.is_terminal() {
            debug_assert!(lifecycle.state.can_transition_to(terminal));
            lifecycle.state = terminal;
            lifecycle.termination = Some(Termination {
                state: terminal,
                reason: reason.to_string(),
            });
        }
        lifecycle.state = SessionState::Removed;
        true
    }

    pub(crate) fn link(&self) -> &Arc<dyn PeerLink> {
        &self.link
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn forward_stats(&self) -> Arc<ForwardStats> {
        self.stats.clone()
    }

    /// Spawn a task owned by this session
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Stop every task spawned for this session
    pub(crate) fn stop_tasks(&self) {
        self.cancel.cancel();
        self.tasks.close();
    }

    /// Number of tasks still running for this session
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Resolve once the session is removed and all of its tasks have exited
    pub async fn wait_stopped(&self) {
        self.cancel.cancelled().await;
        self.tasks.wait().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
