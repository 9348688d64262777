use serde::{Deserialize, Serialize};

/// A message travelling between the broker session and the unit.
///
/// A message is an immutable topic/payload pair with no identity beyond its
/// contents. It is moved into and out of the inbound and outbound queues.
///
/// # Fields
///
/// - `topic` - The MQTT topic the payload was received from / should be delivered to.
/// - `payload` - The message content, usually a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
