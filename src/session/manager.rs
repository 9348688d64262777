//! Broker session manager
//!
//! Owns the broker connection and the `mqtt_is_connected` flag. The session goes
//! `Disconnected -> Connecting -> Connected` through `start_session`, and back to
//! `Disconnected` when a publish or poll fails. Nothing here retries a failed
//! session by itself: the connection checker loop notices the flag and starts
//! a new one.
//!
//! A broker failure while the network link is down cannot be reasoned about at
//! this layer and ends the session loop with a restart reason.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::transport::{BrokerClient, BrokerConnector};
use crate::config::Settings;
use crate::dispatch::UnitIdentity;
use crate::flags::{FlagReader, FlagWriter, flag};
use crate::queue::{Message, MessageQueue};
use crate::scheduler::{TaskResult, pace};
use crate::utils::error::{RestartReason, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Fixed parameters of every session attempt.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub last_will: Message,
    pub subscriptions: Vec<String>,
    pub check_interval: Duration,
    pub message_check_interval: Duration,
    /// Pause between the steps of a session attempt and between connect retries.
    pub granularity: Duration,
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            last_will: UnitIdentity::from_settings(&settings.unit)
                .last_will(&settings.topics.inactive),
            subscriptions: settings.topics.subscriptions(),
            check_interval: settings.mqtt.check_interval(),
            message_check_interval: settings.mqtt.message_check_interval(),
            granularity: settings.schedule.yield_granularity(),
        }
    }
}

/// Clears the in-progress marker however the attempt ends.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionManager<C: BrokerConnector> {
    connector: C,
    options: SessionOptions,
    link_up: FlagReader,
    connected: FlagWriter,
    connecting: AtomicBool,
    client: Mutex<Option<C::Client>>,
    inbound: Arc<MessageQueue>,
    outbound: Arc<MessageQueue>,
}

impl<C: BrokerConnector> SessionManager<C> {
    pub fn new(
        connector: C,
        options: SessionOptions,
        link_up: FlagReader,
        inbound: Arc<MessageQueue>,
        outbound: Arc<MessageQueue>,
    ) -> Self {
        Self {
            connector,
            options,
            link_up,
            connected: flag("mqtt_is_connected"),
            connecting: AtomicBool::new(false),
            client: Mutex::new(None),
            inbound,
            outbound,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn state(&self) -> SessionState {
        if self.connecting.load(Ordering::Acquire) {
            SessionState::Connecting
        } else if self.connected.get() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Observable `mqtt_is_connected` flag for other components.
    pub fn connected_flag(&self) -> FlagReader {
        self.connected.reader()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn inbound(&self) -> &Arc<MessageQueue> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<MessageQueue> {
        &self.outbound
    }

    /// Queue `message` for publishing. Dropped if the outbound queue is full.
    pub fn enqueue_outbound(&self, message: Message) -> bool {
        self.outbound.try_enqueue(message)
    }

    /// Run one session attempt. A call while another attempt is in flight
    /// returns immediately.
    pub async fn start_session(&self) -> Result<(), RestartReason> {
        if self.connecting.swap(true, Ordering::AcqRel) {
            trace!("session attempt already in progress");
            return Ok(());
        }
        let _guard = ConnectingGuard(&self.connecting);
        self.establish().await
    }

    async fn establish(&self) -> Result<(), RestartReason> {
        let granularity = self.options.granularity;
        info!("starting broker session");
        self.connected.set(false);

        let mut client = self.connector.create_client();
        pace(granularity).await;

        let inbound = self.inbound.clone();
        client.set_callback(Box::new(move |message| {
            inbound.try_enqueue(message);
        }));
        pace(granularity).await;

        client.set_last_will(self.options.last_will.clone());
        pace(granularity).await;

        self.connect_to_broker(&mut client).await?;

        for topic in &self.options.subscriptions {
            pace(granularity).await;
            if let Err(e) = client.subscribe(topic).await {
                warn!(%topic, "subscription failed, abandoning session attempt: {e}");
                return Ok(());
            }
            debug!(%topic, "subscribed");
        }

        *self.client.lock().await = Some(client);
        self.connected.set(true);
        info!("broker session established");
        Ok(())
    }

    /// Retry the connect step for as long as the link is up.
    async fn connect_to_broker(&self, client: &mut C::Client) -> Result<(), RestartReason> {
        loop {
            match client.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if self.link_up.get() => {
                    debug!("broker connect failed, retrying: {e}");
                    pace(self.options.granularity).await;
                }
                Err(e) => {
                    error!("broker connect failed while the link is down: {e}");
                    return Err(RestartReason::BrokerFailureDuringLinkLoss {
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    fn disconnected(&self, client: &mut Option<C::Client>, error: &TransportError) {
        warn!("broker session lost: {error}");
        *client = None;
        self.connected.set(false);
    }

    /// Connection checker loop: start a session whenever we are disconnected and
    /// the link is up.
    pub async fn connection_checker(&self) -> TaskResult {
        loop {
            if !self.connected.get()
                && !self.connecting.load(Ordering::Acquire)
                && self.link_up.get()
            {
                self.start_session().await?;
            }
            tokio::time::sleep(self.options.check_interval).await;
        }
    }

    /// Outbound drain loop: publish queued messages in order, holding each one
    /// until the session is connected. A failed publish consumes the message.
    pub async fn outbound_drain(&self) -> TaskResult {
        let connected = self.connected.reader();
        loop {
            let message = self.outbound.dequeue().await;
            loop {
                connected.wait_for(true).await;

                // The session may have dropped while we waited for the client.
                let mut client = self.client.lock().await;
                if !self.connected.get() {
                    continue;
                }
                let Some(c) = client.as_mut() else {
                    continue;
                };
                match c.publish(&message).await {
                    Ok(()) => debug!(topic = %message.topic, "message published"),
                    Err(e) => {
                        warn!(topic = %message.topic, "publish failed, message discarded");
                        self.disconnected(&mut client, &e);
                    }
                }
                break;
            }
        }
    }

    /// Inbound poll loop: let the client deliver arrived messages to the inbound
    /// queue.
    pub async fn inbound_poll(&self) -> TaskResult {
        loop {
            if self.connected.get() {
                let mut client = self.client.lock().await;
                let result = match client.as_mut() {
                    Some(c) => c.check_msg().await,
                    None => Err(TransportError::NotConnected),
                };
                if let Err(e) = result {
                    self.disconnected(&mut client, &e);
                }
            }
            tokio::time::sleep(self.options.message_check_interval).await;
        }
    }
}

impl<C: BrokerConnector> std::fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("subscriptions", &self.options.subscriptions)
            .finish()
    }
}
