//! The `utils` module provides definitions shared by every part of the unit:
//! the error types of each failure channel and logging initialisation.

pub mod error;
pub mod logging;
