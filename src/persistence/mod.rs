//! The `persistence` module keeps actuator state across a device restart.
//!
//! Queued messages are never persisted; a restart discards them.

pub mod sled_store;

pub use sled_store::{StateStore, StoredState};
