//! Homeostat - autonomous capital-allocation control loop
//!
//! Homeostat runs a fixed-order control cycle over a catalog of
//! revenue-generating activities: it reallocates capital with a symplectic
//! (leapfrog) integrator, picks activities by expected free energy under a
//! Boltzmann temperature, folds observed outcomes into conjugate beliefs, and
//! trips a drawdown circuit breaker when the balance falls too far from its peak.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): data model, port traits, error taxonomy
//! - **Service Layer** (`services`): the engines and the [`Controller`] state machine
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, persistence
//! - **Adapters** (`adapters`): simulated executor and a settable environment probe
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use homeostat::{Config, Controller, SimulatedExecutor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controller = Controller::new(Config::default())?;
//!     controller
//!         .register_default_executor(Arc::new(SimulatedExecutor::new(Some(7))))
//!         .await;
//!     controller.initialize().await?;
//!     let result = controller.cycle().await?;
//!     println!("cycle {} selected {:?}", result.cycle, result.selected);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{ManualEnvironment, SimulatedExecutor, SimulationProfile};
pub use domain::models::{
    ActivityProfile, Config, ControllerState, CyclePhase, CycleResult, LoggingConfig, Outcome,
    PersistedState, Tier,
};
pub use domain::ports::{ActivityExecutor, EnvironmentProbe, EnvironmentSignals, StateStore};
pub use domain::{ControlError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::persistence::{JsonFileStore, MemoryStateStore};
pub use services::Controller;
