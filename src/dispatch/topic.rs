//! Topic routing
//!
//! The routing table maps the two subscribed topics to handler roles. It is
//! built once from configuration and never changes while the unit runs.

use crate::config::TopicSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    StatusRequest,
    Control,
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct TopicTable {
    status_request: String,
    control: String,
}

impl TopicTable {
    pub fn new(status_request: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            status_request: status_request.into(),
            control: control.into(),
        }
    }

    pub fn from_settings(topics: &TopicSettings) -> Self {
        Self::new(topics.status_request.clone(), topics.control.clone())
    }

    pub fn route(&self, topic: &str) -> Route {
        if topic == self.status_request {
            Route::StatusRequest
        } else if topic == self.control {
            Route::Control
        } else {
            Route::Unrecognized
        }
    }
}
