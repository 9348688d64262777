//! The `queue` module decouples network I/O from device logic.
//!
//! Two independent `MessageQueue` instances exist at runtime: inbound (broker
//! to dispatcher) and outbound (dispatcher to broker). FIFO order holds within a
//! queue; there is no ordering relationship between the two.

pub mod bounded;
pub mod message;

pub use bounded::MessageQueue;
pub use message::Message;
