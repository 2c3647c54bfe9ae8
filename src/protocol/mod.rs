//! Agent messaging protocol.
//!
//! - Action vocabulary (send / receive)
//! - Message envelopes with sender, receiver, timestamp and type

pub mod envelope;
pub mod types;

pub use envelope::{decode, encode, Envelope};
pub use types::{Action, MessageKind};
