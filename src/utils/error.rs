//! The `error` module defines the error types used across the unit.
//!
//! Each failure channel gets its own type so that a lost connection is never
//! confused with bad input:
//!
//! - `TransportError`: transient link or broker I/O. Owners retry and flip a flag.
//! - `DispatchError`: malformed or unroutable application messages. Reported on the
//!   error topic by the dispatcher.
//! - `ModuleError`: an actuator or sensor rejected a value or failed in hardware.
//! - `PersistenceError`: the actuator state store failed.
//! - `SetupError`: the unit's hardware could not be brought up at startup.
//! - `RestartReason`: terminal conditions. Only the run-loop consumes these and turns
//!   them into a device reset.

use std::time::Duration;

use thiserror::Error;

/// Transient I/O failure at the link or broker layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network I/O failed: {0}")]
    Io(String),

    #[error("no broker client is connected")]
    NotConnected,

    #[error("broker did not answer within {0:?}")]
    Timeout(Duration),
}

/// Application-level input the dispatcher could not act on.
///
/// The `Display` text is what ends up in the `error` field of the error report.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Error! Invalid payload: {payload}")]
    InvalidPayload { payload: String },

    #[error("Error! Unrecognized module id: {payload}")]
    UnrecognizedModule { payload: String },

    #[error("Error! Invalid value in control payload: {payload}")]
    InvalidValue {
        payload: String,
        #[source]
        source: ModuleError,
    },

    #[error("Error! Module failure while applying control payload: {payload}")]
    ModuleFailure {
        payload: String,
        #[source]
        source: ModuleError,
    },

    #[error("Error! Unrecognized topic: {topic}")]
    UnrecognizedTopic { topic: String },
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {module} rejected input {value}")]
    InvalidInput { module: String, value: String },

    #[error("hardware fault on {module}: {source}")]
    Hardware {
        module: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state store failure: {0}")]
    Database(#[from] sled::Error),

    #[error("state encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to open output pin {pin}: {source}")]
    Pin {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Terminal conditions that end the run-loop and force a full device reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestartReason {
    #[error("broker I/O failed while the network link was down: {error}")]
    BrokerFailureDuringLinkLoss { error: String },

    #[error("run-loop has no runnable tasks left")]
    SchedulerStarved,

    #[error("task `{task}` panicked")]
    TaskPanicked { task: String },

    #[error("a hosted task was cancelled")]
    TaskCancelled,
}
