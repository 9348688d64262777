//! In-memory broker
//!
//! `LoopbackBroker` stands in for a real MQTT broker in `simulate` mode and in
//! tests. It keeps every published message, delivers injected messages to
//! subscribed clients and publishes a client's last will when its connection is
//! dropped. Reachability and subscription failures can be switched at runtime.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::transport::{BrokerClient, BrokerConnector, InboundCallback};
use crate::queue::Message;
use crate::utils::error::TransportError;

#[derive(Debug, Default)]
struct BrokerState {
    reachable: bool,
    fail_subscriptions: bool,
    /// Bumped whenever existing connections are cut.
    generation: u64,
    connect_attempts: usize,
    connects: usize,
    subscriptions: Vec<String>,
    pending: VecDeque<Message>,
    published: Vec<Message>,
    live_will: Option<Message>,
    wills_published: Vec<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl LoopbackBroker {
    /// A reachable broker.
    pub fn new() -> Self {
        let broker = Self::default();
        broker.lock().reachable = true;
        broker
    }

    pub fn connector(&self) -> LoopbackConnector {
        LoopbackConnector {
            broker: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An unreachable broker refuses connects and cuts live connections.
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.lock();
        state.reachable = reachable;
        if !reachable {
            cut(&mut state);
        }
    }

    /// Cut every live connection. The next operation of a connected client fails.
    pub fn drop_connections(&self) {
        cut(&mut self.lock());
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.lock().fail_subscriptions = fail;
    }

    /// Queue a message for delivery to subscribers on their next check.
    pub fn inject(&self, message: Message) {
        self.lock().pending.push_back(message);
    }

    pub fn published(&self) -> Vec<Message> {
        self.lock().published.clone()
    }

    pub fn take_published(&self) -> Vec<Message> {
        std::mem::take(&mut self.lock().published)
    }

    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    pub fn wills_published(&self) -> Vec<Message> {
        self.lock().wills_published.clone()
    }
}

fn cut(state: &mut BrokerState) {
    state.generation += 1;
    state.subscriptions.clear();
    if let Some(will) = state.live_will.take() {
        debug!(topic = %will.topic, "publishing last will");
        state.wills_published.push(will);
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    broker: LoopbackBroker,
}

impl BrokerConnector for LoopbackConnector {
    type Client = LoopbackClient;

    fn create_client(&self) -> LoopbackClient {
        LoopbackClient {
            broker: self.broker.clone(),
            callback: None,
            last_will: None,
            session: None,
        }
    }
}

pub struct LoopbackClient {
    broker: LoopbackBroker,
    callback: Option<InboundCallback>,
    last_will: Option<Message>,
    /// Broker generation this client connected in.
    session: Option<u64>,
}

impl LoopbackClient {
    fn ensure_live(&mut self, state: &BrokerState) -> Result<(), TransportError> {
        match self.session {
            Some(generation) if generation == state.generation => Ok(()),
            Some(_) => {
                self.session = None;
                Err(TransportError::Io("connection reset by broker".to_string()))
            }
            None => Err(TransportError::NotConnected),
        }
    }
}

impl BrokerClient for LoopbackClient {
    fn set_callback(&mut self, callback: InboundCallback) {
        self.callback = Some(callback);
    }

    fn set_last_will(&mut self, will: Message) {
        self.last_will = Some(will);
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        let mut state = self.broker.lock();
        state.connect_attempts += 1;
        if !state.reachable {
            return Err(TransportError::Io("connection refused".to_string()));
        }
        state.connects += 1;
        state.live_will = self.last_will.clone();
        self.session = Some(state.generation);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        let broker = self.broker.clone();
        let mut state = broker.lock();
        self.ensure_live(&state)?;
        if state.fail_subscriptions {
            return Err(TransportError::Io(format!("subscription to {topic} rejected")));
        }
        if !state.subscriptions.iter().any(|t| t == topic) {
            state.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        let broker = self.broker.clone();
        let mut state = broker.lock();
        self.ensure_live(&state)?;
        state.published.push(message.clone());
        Ok(())
    }

    async fn check_msg(&mut self) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        let delivered: Vec<Message> = {
            let broker = self.broker.clone();
            let mut state = broker.lock();
            self.ensure_live(&state)?;
            let pending = std::mem::take(&mut state.pending);
            let (matching, rest): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|m| state.subscriptions.contains(&m.topic));
            state.pending = rest.into();
            matching
        };
        if let Some(callback) = &self.callback {
            for message in delivered {
                callback(message);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoopbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackClient")
            .field("session", &self.session)
            .field("last_will", &self.last_will)
            .finish()
    }
}
