//! Lifecycle monitor
//!
//! Consumes a session's transport notifications: attaches drain tasks as
//! inbound streams appear, records connectivity, and tears the session down
//! on the first terminal signal.

use super::forwarder;
use super::registry::Registry;
use super::session::Session;
use crate::transport::{Background, ConnectivityState, TransportEvent};
use relay_protocol::SessionState;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Start monitoring a registered session
pub(crate) fn attach(
    registry: Arc<Registry>,
    session: Arc<Session>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let owner = session.clone();
    owner.spawn(monitor(registry, session, events));
}

/// Run the transport's background work as tasks owned by `session`
pub(crate) fn adopt(session: &Session, background: Vec<Background>) {
    for work in background {
        let cancel = session.cancel_token();
        session.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = work => {}
            }
        });
    }
}

async fn monitor(
    registry: Arc<Registry>,
    session: Arc<Session>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let cancel = session.cancel_token();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = events.recv() => event,
        };

        match event {
            Some(TransportEvent::Track { kind, source }) => {
                forwarder::spawn_drain(registry.clone(), &session, kind, source);
            }
            Some(TransportEvent::State(ConnectivityState::Connected)) => {
                if session.mark_connected() {
                    tracing::info!("Session {} connected", session.id());
                }
            }
            Some(TransportEvent::State(state)) => {
                let (terminal, reason) = match state {
                    ConnectivityState::Failed => (SessionState::Failed, "failed"),
                    ConnectivityState::Closed => (SessionState::Disconnected, "closed"),
                    _ => (SessionState::Disconnected, "disconnected"),
                };
                teardown(&registry, &session, terminal, reason).await;
                return;
            }
            None => {
                teardown(&registry, &session, SessionState::Failed, "transport gone").await;
                return;
            }
        }
    }
}

/// Unregister a session and release everything it holds
///
/// Runs at most once per session no matter how many terminal signals or
/// shutdown requests arrive; returns whether this call did the work.
pub(crate) async fn teardown(
    registry: &Registry,
    session: &Session,
    terminal: SessionState,
    reason: &str,
) -> bool {
    if !session.begin_removal(terminal, reason) {
        return false;
    }

    registry.remove(session.id());
    release(session).await;

    tracing::info!(
        "Session {} removed ({}), {} sessions remain",
        session.id(),
        reason,
        registry.len()
    );
    true
}

/// Stop a session's tasks and close its transport association
pub(crate) async fn release(session: &Session) {
    session.stop_tasks();
    if let Err(e) = session.link().close().await {
        tracing::warn!("Error closing transport for {}: {}", session.id(), e);
    }
}
