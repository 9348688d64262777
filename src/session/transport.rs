//! Broker transport seam
//!
//! The session manager talks to the broker through these two traits only. A
//! connector builds a fresh client for every session attempt; the client is the
//! protocol connection itself. Every network operation is a single short step
//! that returns to the run-loop, so a slow broker cannot starve other tasks.

use std::future::Future;

use crate::queue::Message;
use crate::utils::error::TransportError;

/// Called by the client for every message that arrives on a subscribed topic.
pub type InboundCallback = Box<dyn Fn(Message) + Send + Sync>;

pub trait BrokerConnector: Send + Sync + 'static {
    type Client: BrokerClient;

    fn create_client(&self) -> Self::Client;
}

pub trait BrokerClient: Send + 'static {
    fn set_callback(&mut self, callback: InboundCallback);

    /// Message the broker publishes on our behalf if we vanish uncleanly. Takes
    /// effect on the next `connect`.
    fn set_last_will(&mut self, will: Message);

    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn publish(&mut self, message: &Message)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Deliver whatever has arrived since the last check to the callback.
    fn check_msg(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
