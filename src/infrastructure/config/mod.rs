//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading from `.homeostat/`
//! - `HOMEOSTAT_*` environment variable overrides
//! - Typed validation of engine parameters and the activity catalog

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
