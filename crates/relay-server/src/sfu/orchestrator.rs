//! Session orchestrator
//!
//! Entry point for new offers: negotiates through the transport, registers
//! the resulting session, and hands it to the lifecycle monitor.

use super::lifecycle;
use super::registry::Registry;
use super::session::Session;
use crate::error::{NegotiationError, RelayError, Result, TransportError};
use crate::state::Config;
use crate::transport::{Negotiated, Transport};
use relay_protocol::{
    decode_description, encode_description, SdpKind, SessionDescription, SessionState,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    negotiation_timeout: Duration,
    queue_depth: usize,
    shutdown_grace: Duration,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            registry: Arc::new(Registry::new()),
            negotiation_timeout: config.negotiation_timeout(),
            queue_depth: config.outbound_queue_depth,
            shutdown_grace: config.shutdown_grace(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Answer an offer and start relaying for the new session
    ///
    /// Nothing is registered unless negotiation completes within the
    /// configured deadline.
    pub async fn handle_offer(&self, offer: SessionDescription) -> Result<SessionDescription> {
        if offer.kind != SdpKind::Offer {
            return Err(NegotiationError::Transport(TransportError::Other(format!(
                "expected an offer, got {}",
                offer.kind
            )))
            .into());
        }

        let negotiated = tokio::time::timeout(
            self.negotiation_timeout,
            self.transport.negotiate(offer),
        )
        .await
        .map_err(|_| NegotiationError::Timeout(self.negotiation_timeout))?
        .map_err(NegotiationError::from)?;

        let Negotiated {
            answer,
            link,
            audio,
            video,
            events,
            background,
        } = negotiated;

        let id = self.registry.next_id();
        let session = Session::new(id, link, audio, video, self.queue_depth);
        lifecycle::adopt(&session, background);

        if let Err(e) = self.registry.add(session.clone()) {
            tracing::error!("Failed to register session {}: {}", id, e);
            lifecycle::release(&session).await;
            return Err(RelayError::Registry(e));
        }

        lifecycle::attach(self.registry.clone(), session, events);
        tracing::info!(
            "Session {} registered, {} sessions active",
            id,
            self.registry.len()
        );

        Ok(answer)
    }

    /// Decode a base64 offer payload, answer it, and encode the answer
    pub async fn handle_encoded_offer(&self, payload: &str) -> Result<String> {
        let offer = decode_description(payload)?;
        let answer = self.handle_offer(offer).await?;
        Ok(encode_description(&answer)?)
    }

    /// Close every registered session and wait for their tasks to finish
    pub async fn shutdown(&self) {
        let sessions = self.registry.snapshot();
        tracing::info!("Shutting down relay, closing {} sessions", sessions.len());

        for session in sessions.iter() {
            lifecycle::teardown(&self.registry, session, SessionState::Disconnected, "shutdown")
                .await;
        }

        let stopped = async {
            for session in sessions.iter() {
                session.wait_stopped().await;
            }
        };
        if tokio::time::timeout(self.shutdown_grace, stopped).await.is_err() {
            tracing::warn!(
                "Sessions still had running tasks after {:?}",
                self.shutdown_grace
            );
        }
    }
}
