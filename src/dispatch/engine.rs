//! Command dispatcher
//!
//! This module contains the dispatcher responsible for:
//! - consuming the inbound queue, one message at a time, forever
//! - composing status snapshots from the registered sensors and actuators
//! - applying control commands to controllable actuators
//! - turning every bad input into an error report on the outbound queue
//!
//! Error handling is local: nothing a remote peer sends can stop the dispatch
//! loop. Reports are enqueued with drop-on-full semantics like any other
//! outbound message.

use std::convert::Infallible;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::report::UnitIdentity;
use super::topic::{Route, TopicTable};
use crate::config::Settings;
use crate::modules::ModuleRegistry;
use crate::queue::{Message, MessageQueue};
use crate::utils::error::{DispatchError, ModuleError, RestartReason};

/// Static irrigation schedule reported in every status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleParams {
    pub irrigation_on_sec: u64,
    pub irrigation_off_sec: u64,
}

#[derive(Debug)]
pub struct Dispatcher {
    routes: TopicTable,
    identity: UnitIdentity,
    status_topic: String,
    error_topic: String,
    schedule: ScheduleParams,
    modules: ModuleRegistry,
    inbound: Arc<MessageQueue>,
    outbound: Arc<MessageQueue>,
}

impl Dispatcher {
    pub fn new(
        settings: &Settings,
        modules: ModuleRegistry,
        inbound: Arc<MessageQueue>,
        outbound: Arc<MessageQueue>,
    ) -> Self {
        Self {
            routes: TopicTable::from_settings(&settings.topics),
            identity: UnitIdentity::from_settings(&settings.unit),
            status_topic: settings.topics.status.clone(),
            error_topic: settings.topics.error.clone(),
            schedule: ScheduleParams {
                irrigation_on_sec: settings.schedule.irrigation_on_sec,
                irrigation_off_sec: settings.schedule.irrigation_off_sec,
            },
            modules,
            inbound,
            outbound,
        }
    }

    pub fn identity(&self) -> &UnitIdentity {
        &self.identity
    }

    /// Dispatch loop: take inbound messages and handle them, forever.
    pub async fn run(&self) -> Result<Infallible, RestartReason> {
        loop {
            let message = self.inbound.dequeue().await;
            self.dispatch(message).await;
        }
    }

    /// Route a single message by topic and act on it.
    pub async fn dispatch(&self, message: Message) {
        debug!(topic = %message.topic, payload = %message.payload, "message received");
        match self.routes.route(&message.topic) {
            Route::StatusRequest => {
                self.send_status().await;
            }
            Route::Control => match self.handle_control(&message.payload) {
                Ok(module) => {
                    info!(%module, "control command applied");
                    tokio::task::yield_now().await;
                    self.send_status().await;
                }
                Err(error) => {
                    self.send_error(&error);
                }
            },
            Route::Unrecognized => {
                self.send_error(&DispatchError::UnrecognizedTopic {
                    topic: message.topic,
                });
            }
        }
    }

    /// Apply a control document `{"<module-id>": 0|1}`. Returns the id of the
    /// module that was switched.
    pub fn handle_control(&self, payload: &str) -> Result<String, DispatchError> {
        let invalid = || DispatchError::InvalidPayload {
            payload: payload.to_string(),
        };
        let document: Map<String, Value> = match serde_json::from_str(payload) {
            Ok(Value::Object(document)) => document,
            Ok(_) | Err(_) => return Err(invalid()),
        };

        let (actuator, value) =
            self.modules
                .find_control(&document)
                .ok_or_else(|| DispatchError::UnrecognizedModule {
                    payload: payload.to_string(),
                })?;

        actuator.apply(value).map_err(|source| match source {
            ModuleError::InvalidInput { .. } => DispatchError::InvalidValue {
                payload: payload.to_string(),
                source,
            },
            ModuleError::Hardware { .. } => DispatchError::ModuleFailure {
                payload: payload.to_string(),
                source,
            },
        })?;
        Ok(actuator.module_id().to_string())
    }

    /// Identity fields, the primary reading of every sensor, the state of every
    /// actuator and the irrigation schedule.
    pub async fn status_document(&self) -> Map<String, Value> {
        let mut document = self.identity.document();
        for sensor in self.modules.sensors() {
            let (id, reading) = sensor.read_primary().await;
            document.insert(id, Value::from(reading));
        }
        for actuator in self.modules.actuators() {
            let (id, state) = actuator.current_state();
            document.insert(id, Value::from(state));
        }
        document.insert(
            "irrigationOnSec".to_string(),
            Value::from(self.schedule.irrigation_on_sec),
        );
        document.insert(
            "irrigationOffSec".to_string(),
            Value::from(self.schedule.irrigation_off_sec),
        );
        document
    }

    /// Compose a status snapshot and queue it for publishing.
    pub async fn send_status(&self) -> bool {
        let document = self.status_document().await;
        let payload = Value::Object(document).to_string();
        self.outbound
            .try_enqueue(Message::new(self.status_topic.as_str(), payload))
    }

    /// Queue an error report for `error`.
    pub fn send_error(&self, error: &DispatchError) -> bool {
        warn!(%error, "reporting error");
        let report = self
            .identity
            .error_report(&self.error_topic, &error.to_string());
        self.outbound.try_enqueue(report)
    }
}
