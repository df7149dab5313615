//! Forwarding engine
//!
//! Each inbound stream gets a drain task that reads units from the remote
//! party and queues them on every other registered session. Each session
//! has one writer task per kind moving its queued units into the transport.
//!
//! A drain task is the only producer for its (source, kind) pair and the
//! queues are FIFO, so units from one source reach a given target in the
//! order they were received.

use super::registry::{Registry, Snapshot};
use super::session::{ForwardStats, Session};
use crate::error::DrainError;
use crate::transport::{MediaSink, MediaSource};
use relay_media::MediaUnit;
use relay_protocol::{MediaKind, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outcome of offering one unit to every target in a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub queued: u64,
    pub dropped: u64,
}

/// Offer `unit` to every session in `snapshot` except its origin
///
/// Failures are per target and never stop delivery to the others.
pub fn fan_out(snapshot: &Snapshot, unit: &Arc<MediaUnit>) -> FanOut {
    let mut result = FanOut::default();

    for target in snapshot.targets(unit.origin) {
        match target.try_forward(unit.clone()) {
            Ok(()) => result.queued += 1,
            Err(e) => {
                result.dropped += 1;
                tracing::debug!(
                    "Dropped {} packet seq {} from {}: {}",
                    unit.kind,
                    unit.sequence_number(),
                    unit.origin,
                    e
                );
            }
        }
    }

    result
}

/// Everything a drain task needs, handed over when it is spawned
struct DrainContext {
    origin: SessionId,
    kind: MediaKind,
    registry: Arc<Registry>,
    cancel: CancellationToken,
    stats: Arc<ForwardStats>,
}

/// Start draining an inbound stream of `session`
pub(crate) fn spawn_drain(
    registry: Arc<Registry>,
    session: &Session,
    kind: MediaKind,
    source: Box<dyn MediaSource>,
) {
    let ctx = DrainContext {
        origin: session.id(),
        kind,
        registry,
        cancel: session.cancel_token(),
        stats: session.forward_stats(),
    };

    tracing::info!("Starting {} forwarding from {}", kind, ctx.origin);
    session.spawn(async move {
        if let Err(e) = drain(ctx, source).await {
            tracing::info!("{}", e);
        }
    });
}

async fn drain(ctx: DrainContext, mut source: Box<dyn MediaSource>) -> Result<(), DrainError> {
    let mut received = 0u64;

    loop {
        let packet = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                tracing::debug!(
                    "{} forwarding from {} stopped after {} packets",
                    ctx.kind,
                    ctx.origin,
                    received
                );
                return Ok(());
            }
            result = source.recv() => result.map_err(|source| DrainError::Ended {
                session: ctx.origin,
                kind: ctx.kind,
                source,
            })?,
        };

        received += 1;
        ctx.stats.record_received();

        let unit = Arc::new(MediaUnit::new(ctx.origin, ctx.kind, packet));
        let snapshot = ctx.registry.snapshot();
        let result = fan_out(&snapshot, &unit);
        ctx.stats.record_fan_out(result.queued, result.dropped);

        if received % 500 == 1 {
            tracing::trace!(
                "Forwarded {} packet {} from {} to {} sessions ({} dropped)",
                ctx.kind,
                received,
                ctx.origin,
                result.queued,
                result.dropped
            );
        }
    }
}

/// Start moving queued units for `session` into its outbound sink
pub(crate) fn spawn_writer(
    session: &Session,
    kind: MediaKind,
    mut queue: mpsc::Receiver<Arc<MediaUnit>>,
    sink: Arc<dyn MediaSink>,
) {
    let target = session.id();
    let cancel = session.cancel_token();
    let stats = session.forward_stats();

    session.spawn(async move {
        loop {
            let unit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                unit = queue.recv() => match unit {
                    Some(unit) => unit,
                    None => break,
                },
            };

            if let Err(e) = sink.write(&unit.packet).await {
                stats.record_write_failure();
                tracing::debug!(
                    "Failed to write {} packet from {} to {}: {}",
                    kind,
                    unit.origin,
                    target,
                    e
                );
            }
        }

        // Dropping the receiver makes further forwards to this session fail fast
        queue.close();
        tracing::debug!("{} writer for {} stopped", kind, target);
    });
}
