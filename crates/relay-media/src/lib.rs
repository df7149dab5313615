//! Media plumbing for the relay
//!
//! This crate provides:
//! - The media unit routed between sessions (an RTP packet tagged with its origin)
//! - The codec table the relay negotiates (Opus audio, VP8 video)

pub mod codec;
pub mod unit;

pub use codec::*;
pub use unit::*;
