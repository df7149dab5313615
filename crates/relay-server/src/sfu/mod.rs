//! SFU (Selective Forwarding Unit) core
//!
//! Every session publishes one audio and one video stream; each received RTP
//! packet is forwarded unchanged to every other active session.

mod forwarder;
mod lifecycle;
mod orchestrator;
mod registry;
mod session;

#[cfg(test)]
mod testing;

pub use forwarder::{fan_out, FanOut};
pub use orchestrator::Orchestrator;
pub use registry::{Registry, Snapshot};
pub use session::{Session, SessionStats, Termination};
