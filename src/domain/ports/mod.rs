//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces that collaborators outside
//! the core must implement:
//! - ActivityExecutor: runs one activity and reports its outcome
//! - StateStore: loads and saves the minimal persisted state
//! - EnvironmentProbe: emergency flag, live-mode prerequisites, novelty/fatigue signals
//!
//! These traits keep the control loop independent of the concrete activities,
//! storage and observability surfaces.

pub mod activity_executor;
pub mod environment;
pub mod state_store;

pub use activity_executor::ActivityExecutor;
pub use environment::{EnvironmentProbe, EnvironmentSignals};
pub use state_store::StateStore;
