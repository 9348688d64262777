//! The `modules` module defines the actuator and sensor capabilities the
//! dispatcher works with, and the drivers of the aeroponics unit.
//!
//! Every module is addressed by a reference string `<kind>|<name>`, used both as
//! the key in the status document and as the lookup key on the control topic.

pub mod gpio;
pub mod relay;
pub mod temp_sensor;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::utils::error::ModuleError;

pub use gpio::{MemoryPin, OutputPin, SysfsPin};
pub use relay::Relay;
pub use temp_sensor::{Ds18b20, SENSOR_READ_FAILED};

/// Reference string of a module, `<kind>|<name>`.
pub fn module_ref(kind: &str, name: &str) -> String {
    format!("{kind}|{name}")
}

/// A two-state output such as a relay.
pub trait Actuator: Send + Sync {
    fn module_id(&self) -> &str;

    fn switch(&self, on: bool) -> Result<(), ModuleError>;

    /// Current state as `(module id, 0|1)`.
    fn current_state(&self) -> (String, u8);

    /// Apply a control value. Accepts values equal to `0` or `1`: integers,
    /// floats such as `1.0` and booleans.
    fn apply(&self, value: &Value) -> Result<(), ModuleError> {
        let on = match value {
            Value::Bool(on) => Some(*on),
            Value::Number(n) => match n.as_f64() {
                Some(x) if x == 1.0 => Some(true),
                Some(x) if x == 0.0 => Some(false),
                _ => None,
            },
            _ => None,
        };
        match on {
            Some(on) => self.switch(on),
            None => Err(ModuleError::InvalidInput {
                module: self.module_id().to_string(),
                value: value.to_string(),
            }),
        }
    }
}

pub trait Sensor: Send + Sync {
    fn module_id(&self) -> &str;

    /// Primary reading as `(module id, value)`. May suspend for the sensor's settle
    /// delay; returns the sensor's failure sentinel instead of an error.
    fn read_primary(&self) -> BoxFuture<'_, (String, f64)>;
}

/// The modules registered on a unit.
///
/// All actuators are reported in status snapshots; only the controllable ones
/// accept values from the control topic.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    sensors: Vec<Arc<dyn Sensor>>,
    actuators: Vec<(Arc<dyn Actuator>, bool)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn Sensor>) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_actuator(mut self, actuator: Arc<dyn Actuator>, controllable: bool) -> Self {
        self.actuators.push((actuator, controllable));
        self
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Arc<dyn Sensor>> {
        self.sensors.iter()
    }

    pub fn actuators(&self) -> impl Iterator<Item = &Arc<dyn Actuator>> {
        self.actuators.iter().map(|(actuator, _)| actuator)
    }

    /// First controllable actuator, in registration order, named in `document`,
    /// together with the value addressed to it.
    pub fn find_control<'a>(
        &'a self,
        document: &'a Map<String, Value>,
    ) -> Option<(&'a Arc<dyn Actuator>, &'a Value)> {
        self.actuators
            .iter()
            .filter(|(_, controllable)| *controllable)
            .find_map(|(actuator, _)| {
                document
                    .get(actuator.module_id())
                    .map(|value| (actuator, value))
            })
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field(
                "sensors",
                &self.sensors.iter().map(|s| s.module_id()).collect::<Vec<_>>(),
            )
            .field(
                "actuators",
                &self
                    .actuators
                    .iter()
                    .map(|(a, controllable)| (a.module_id(), *controllable))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
