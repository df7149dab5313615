//! Shared protocol definitions for the relay
//!
//! Session identity, media kinds, session states, and the signaling payload
//! codec used to exchange session descriptions with remote parties.

pub mod messages;
pub mod types;

pub use messages::*;
pub use types::*;
