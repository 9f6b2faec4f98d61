//! Domain layer for the homeostat control loop
//!
//! This module contains the core data model, the port traits implemented by
//! collaborators outside the core, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ControlError, DomainResult, ErrorKind, RecordedError};
