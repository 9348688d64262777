//! The `session` module owns the application-protocol connection to the MQTT
//! broker, layered on top of the network link.
//!
//! - `transport`: the `BrokerConnector` / `BrokerClient` seam.
//! - `mqtt`: the `rumqttc` client used on the unit.
//! - `loopback`: an in-memory broker for simulation and tests.
//! - `manager`: the session state machine and its three loops.

pub mod loopback;
pub mod manager;
pub mod mqtt;
pub mod transport;

pub use loopback::{LoopbackBroker, LoopbackClient, LoopbackConnector};
pub use manager::{SessionManager, SessionOptions, SessionState};
pub use mqtt::{MqttClient, MqttConnector};
pub use transport::{BrokerClient, BrokerConnector, InboundCallback};

#[cfg(test)]
mod tests;
