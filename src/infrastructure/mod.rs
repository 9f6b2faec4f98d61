//! Infrastructure layer module
//!
//! Concrete implementations that sit outside the control loop:
//! - Configuration loading (figment)
//! - Logging (tracing-subscriber, tracing-appender)
//! - Persistence of the controller state (JSON file, in-memory)

pub mod config;
pub mod logging;
pub mod persistence;
