//! Outbound documents
//!
//! Status, error and last-will payloads all start from the unit's identity
//! fields (`unitID`, `project`, `name`).

use serde_json::{Map, Value};

use crate::config::UnitSettings;
use crate::queue::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitIdentity {
    pub unit_id: String,
    pub project: String,
    pub name: String,
}

impl UnitIdentity {
    pub fn from_settings(unit: &UnitSettings) -> Self {
        Self {
            unit_id: unit.unit_id(),
            project: unit.project.clone(),
            name: unit.name.clone(),
        }
    }

    pub fn document(&self) -> Map<String, Value> {
        let mut document = Map::new();
        document.insert("unitID".to_string(), Value::from(self.unit_id.as_str()));
        document.insert("project".to_string(), Value::from(self.project.as_str()));
        document.insert("name".to_string(), Value::from(self.name.as_str()));
        document
    }

    /// Identity document alone, published by the broker if the unit disappears.
    pub fn last_will(&self, topic: &str) -> Message {
        Message::new(topic, Value::Object(self.document()).to_string())
    }

    pub fn error_report(&self, topic: &str, error: &str) -> Message {
        let mut document = self.document();
        document.insert("error".to_string(), Value::from(error));
        Message::new(topic, Value::Object(document).to_string())
    }
}
