//! Event bus: wire framing, pub/sub clients, and a minimal broker.
//!
//! One well-known channel carries every installation event as a
//! length-prefixed, channel-tagged JSON frame. Ordering contract: frames
//! from a single publisher are delivered to every subscriber in publish
//! order; frames from different publishers may interleave arbitrarily.

mod broker;
mod client;
pub mod wire;

pub use broker::Broker;
pub use client::{BusPublisher, BusSubscriber, Envelope};
