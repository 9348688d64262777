//! The `dispatch` module consumes the inbound queue and routes each message by
//! topic: status requests produce a status snapshot, control commands mutate an
//! actuator, anything else is reported on the error topic.

pub mod engine;
pub mod report;
pub mod topic;

pub use engine::{Dispatcher, ScheduleParams};
pub use report::UnitIdentity;
pub use topic::{Route, TopicTable};

#[cfg(test)]
mod tests;
