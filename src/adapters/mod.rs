//! Reference implementations of the domain ports for paper runs and tests.

pub mod manual_environment;
pub mod simulated;

pub use manual_environment::ManualEnvironment;
pub use simulated::{SimulatedExecutor, SimulationProfile};
