use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// External signals sampled once at the start of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    /// Operator-raised emergency; skips the cycle body.
    pub emergency: bool,
    /// Live-mode prerequisites (e.g. gas for on-chain activities) are available.
    pub live_prerequisites_met: bool,
    /// Novelty of the environment in `[0, 1]`, if known.
    pub novelty: Option<f64>,
    /// Fatigue of the current activity mix in `[0, 1]`, if known.
    pub fatigue: Option<f64>,
}

impl Default for EnvironmentSignals {
    fn default() -> Self {
        Self {
            emergency: false,
            live_prerequisites_met: true,
            novelty: None,
            fatigue: None,
        }
    }
}

/// Port for the emergency flag, live prerequisites, and novelty/fatigue signals.
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    async fn sample(&self) -> EnvironmentSignals;
}
