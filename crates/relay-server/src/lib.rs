//! Relay Server Library
//!
//! This module exposes the relay components for testing and embedding.

pub mod error;
pub mod sfu;
pub mod signaling;
pub mod state;
pub mod transport;

use std::sync::Arc;

/// Create a relay backed by the WebRTC transport
pub fn create_relay(config: &state::Config) -> anyhow::Result<sfu::Orchestrator> {
    let transport = transport::WebRtcTransport::from_config(config)?;
    Ok(sfu::Orchestrator::new(Arc::new(transport), config))
}
