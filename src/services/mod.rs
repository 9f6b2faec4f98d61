//! The control-loop engines and the controller that orchestrates them.

pub mod action_selector;
pub mod belief_store;
pub mod capital_allocator;
pub mod controller;
pub mod convergence_monitor;
pub mod executor_registry;
pub mod planner;
pub mod regime;
pub mod risk_engine;
pub mod stability_monitor;
pub mod temperature;

pub use action_selector::{expected_free_energy, select_from_scores, ActionSelector, Candidate};
pub use belief_store::{Belief, BeliefStore, BeliefUpdate};
pub use capital_allocator::{ActivityDynState, CapitalAllocator, StepReport};
pub use controller::Controller;
pub use convergence_monitor::{extrapolate_monthly, ConvergenceMonitor};
pub use executor_registry::ExecutorRegistry;
pub use planner::{rank_with_lookahead, RankedCandidate};
pub use regime::RegimeEstimator;
pub use risk_engine::{BreakerState, RiskEngine};
pub use stability_monitor::StabilityMonitor;
pub use temperature::{TemperatureSchedule, TemperatureSignals};
