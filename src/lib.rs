//! # Aeroponics
//!
//! `aeroponics` is the controller firmware of a networked aeroponics unit. It keeps
//! the unit reachable over an unreliable network link and an unreliable MQTT broker
//! session while the local relays and sensors keep running.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `queue`: The `Message` value type and the bounded, drop-on-full message queues.
//! - `flags`: Single-writer connectivity flags observed by the rest of the unit.
//! - `link`: Supervision of the physical network link.
//! - `session`: The broker session state machine and its inbound/outbound loops.
//! - `dispatch`: Topic routing of inbound messages to status and control handlers.
//! - `modules`: Actuator and sensor capabilities (relays, DS18B20 probes).
//! - `persistence`: A `sled` store for actuator state that survives a restart.
//! - `scheduler`: The run-loop hosting every task, memory reclamation and the restart path.
//! - `unit`: Wiring of all of the above into a running unit.
//! - `config`: Handles loading and managing the unit configuration.
//! - `utils`: Shared utilities, such as error types and logging.

pub mod config;
pub mod dispatch;
pub mod flags;
pub mod link;
pub mod modules;
pub mod persistence;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod unit;
pub mod utils;
