pub mod activity;
pub mod config;
pub mod cycle;
pub mod engine_state;
pub mod persisted;

pub use activity::{default_catalog, ActivityCatalog, ActivityIdx, ActivityProfile, Tier};
pub use config::{
    AllocatorConfig, BeliefConfig, Config, ConvergenceConfig, LoggingConfig, PhaseConfig,
    RegimeConfig, RiskConfig, SelectionConfig, StabilityConfig, TemperatureConfig,
};
pub use cycle::{
    ActivityView, ControllerState, CyclePhase, CycleResult, CycleSummary, ExecutionRecord, Outcome,
};
pub use engine_state::{
    ConvergenceState, EfeScore, Regime, RegimeState, RiskState, StabilityState,
};
pub use persisted::{PendingFeedback, PersistedState, TodayStats};
