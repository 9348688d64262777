//! MQTT client on top of `rumqttc`.
//!
//! `rumqttc` only makes progress while its event loop is polled. Instead of
//! handing the loop to a background task, every operation here drives it just
//! far enough to see its own acknowledgement, so each call is one bounded step
//! on the run-loop. Publishes that arrive while we wait are handed to the
//! inbound callback like any other.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet,
    QoS, Transport,
};
use tracing::{debug, trace};

use super::transport::{BrokerClient, BrokerConnector, InboundCallback};
use crate::config::MqttSettings;
use crate::queue::Message;
use crate::utils::error::TransportError;

const REQUEST_CAPACITY: usize = 10;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long `check_msg` waits for the next event before deciding nothing is pending.
const CHECK_WINDOW: Duration = Duration::from_millis(10);
const MAX_EVENTS_PER_CHECK: usize = 16;

/// Map a configured QoS level; anything above 2 is treated as 1.
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[derive(Debug, Clone)]
pub struct MqttConnector {
    client_id: String,
    settings: MqttSettings,
}

impl MqttConnector {
    pub fn new(client_id: impl Into<String>, settings: &MqttSettings) -> Self {
        Self {
            client_id: client_id.into(),
            settings: settings.clone(),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.client_id.as_str(),
            self.settings.server.as_str(),
            self.settings.port,
        );
        options.set_keep_alive(Duration::from_secs(self.settings.keepalive_sec.max(1)));
        if !self.settings.user.is_empty() {
            options.set_credentials(
                self.settings.user.as_str(),
                self.settings.password.as_str(),
            );
        }
        if self.settings.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

impl BrokerConnector for MqttConnector {
    type Client = MqttClient;

    fn create_client(&self) -> MqttClient {
        MqttClient {
            options: self.options(),
            qos: qos_from_level(self.settings.qos),
            callback: None,
            connection: None,
        }
    }
}

struct Connection {
    client: AsyncClient,
    event_loop: EventLoop,
}

pub struct MqttClient {
    options: MqttOptions,
    qos: QoS,
    callback: Option<InboundCallback>,
    connection: Option<Connection>,
}

impl MqttClient {
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Poll the event loop until `done` accepts an event.
    async fn drive_until<F>(&mut self, mut done: F) -> Result<(), TransportError>
    where
        F: FnMut(&Event) -> bool + Send,
    {
        let Some(connection) = self.connection.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        loop {
            let event = poll_once(&mut connection.event_loop, RESPONSE_TIMEOUT)
                .await?
                .ok_or(TransportError::Timeout(RESPONSE_TIMEOUT))?;
            deliver(self.callback.as_ref(), &event);
            if done(&event) {
                return Ok(());
            }
        }
    }

    fn on_error(&mut self, error: TransportError) -> TransportError {
        debug!("dropping broker connection: {error}");
        self.connection = None;
        error
    }
}

impl BrokerClient for MqttClient {
    fn set_callback(&mut self, callback: InboundCallback) {
        self.callback = Some(callback);
    }

    fn set_last_will(&mut self, will: Message) {
        self.options.set_last_will(LastWill::new(
            will.topic,
            will.payload.into_bytes(),
            self.qos,
            false,
        ));
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let (client, mut event_loop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        loop {
            let event = poll_once(&mut event_loop, RESPONSE_TIMEOUT)
                .await?
                .ok_or(TransportError::Timeout(RESPONSE_TIMEOUT))?;
            match event {
                Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
                    break;
                }
                Event::Incoming(Packet::ConnAck(ack)) => {
                    return Err(TransportError::Io(format!(
                        "connection refused: {:?}",
                        ack.code
                    )));
                }
                other => trace!(?other, "waiting for connack"),
            }
        }
        self.connection = Some(Connection { client, event_loop });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        let requested = connection.client.subscribe(topic, self.qos).await;
        if let Err(e) = requested {
            return Err(self.on_error(TransportError::Io(e.to_string())));
        }
        let result = self
            .drive_until(|event| matches!(event, Event::Incoming(Packet::SubAck(_))))
            .await;
        result.map_err(|e| self.on_error(e))
    }

    async fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        let requested = connection
            .client
            .publish(
                message.topic.as_str(),
                self.qos,
                false,
                message.payload.as_bytes().to_vec(),
            )
            .await;
        if let Err(e) = requested {
            return Err(self.on_error(TransportError::Io(e.to_string())));
        }
        let result = self
            .drive_until(|event| matches!(event, Event::Outgoing(Outgoing::Publish(_))))
            .await;
        result.map_err(|e| self.on_error(e))
    }

    async fn check_msg(&mut self) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut failure = None;
        for _ in 0..MAX_EVENTS_PER_CHECK {
            match poll_once(&mut connection.event_loop, CHECK_WINDOW).await {
                Ok(Some(event)) => deliver(self.callback.as_ref(), &event),
                Ok(None) => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        match failure {
            Some(e) => Err(self.on_error(e)),
            None => Ok(()),
        }
    }
}

/// One event from the loop, or `None` if nothing happened within `window`.
async fn poll_once(
    event_loop: &mut EventLoop,
    window: Duration,
) -> Result<Option<Event>, TransportError> {
    match tokio::time::timeout(window, event_loop.poll()).await {
        Ok(Ok(event)) => Ok(Some(event)),
        Ok(Err(e)) => Err(TransportError::Io(e.to_string())),
        Err(_) => Ok(None),
    }
}

fn deliver(callback: Option<&InboundCallback>, event: &Event) {
    if let Event::Incoming(Packet::Publish(publish)) = event {
        let payload = String::from_utf8_lossy(&publish.payload).into_owned();
        debug!(topic = %publish.topic, "message arrived");
        if let Some(callback) = callback {
            callback(Message::new(publish.topic.as_str(), payload));
        }
    }
}

impl std::fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("broker", &self.options.broker_address())
            .field("qos", &self.qos)
            .field("connected", &self.is_connected())
            .finish()
    }
}
