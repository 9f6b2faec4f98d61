//! Per-cycle state emitted by the engines.
//!
//! These are plain snapshots: each engine rebuilds its state every cycle and
//! hands a copy to the controller, which folds them into `CycleResult` and
//! `ControllerState`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of recent return conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Bull,
    #[default]
    Neutral,
    Bear,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Bull, Regime::Neutral, Regime::Bear];

    pub fn index(self) -> usize {
        match self {
            Self::Bull => 0,
            Self::Neutral => 1,
            Self::Bear => 2,
        }
    }

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Bull,
            2 => Self::Bear,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Neutral => "neutral",
            Self::Bear => "bear",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the regime estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub regime: Regime,
    /// Multiplier applied to the target return.
    pub factor: f64,
    /// Filtered posterior over `[bull, neutral, bear]`.
    pub posterior: [f64; 3],
    /// Mean of the signal window that drove the latest update.
    pub trend: f64,
}

impl Default for RegimeState {
    fn default() -> Self {
        Self {
            regime: Regime::Neutral,
            factor: 1.0,
            posterior: [0.0, 1.0, 0.0],
            trend: 0.0,
        }
    }
}

/// Expected-free-energy score of one candidate. Recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfeScore {
    pub activity_id: String,
    pub epistemic_value: f64,
    pub pragmatic_value: f64,
    pub risk_penalty: f64,
    pub exploration_bonus: f64,
    /// Expected free energy; lower is better.
    #[serde(rename = "G")]
    pub g: f64,
    /// `-G` clipped to `[0, 1]`; higher is better.
    pub score: f64,
}

/// Contraction estimate of the allocation/return feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityState {
    pub stable: bool,
    /// Running average of `ln L`.
    pub log_lipschitz_avg: f64,
    /// Most recent Lipschitz ratio, if one could be measured.
    pub last_ratio: Option<f64>,
    /// Damping in `[0, 1]` the allocator applies next.
    pub damping_recommended: f64,
    pub warnings: Vec<String>,
}

impl Default for StabilityState {
    fn default() -> Self {
        Self {
            stable: true,
            log_lipschitz_avg: 0.0,
            last_ratio: None,
            damping_recommended: 0.0,
            warnings: Vec::new(),
        }
    }
}

/// Distance from the revenue/cost steady state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConvergenceState {
    /// Normalized deviation from the target balance.
    pub deviation: f64,
    /// Exponential decay rate of the deviation; positive when converging.
    pub convergence_rate: f64,
    /// Cycles until the deviation is expected to drop below epsilon.
    pub estimated_cycles_to_steady: Option<u64>,
    pub at_steady_state: bool,
    /// Months the current balance covers at the current burn; `None` when not burning.
    pub runway: Option<f64>,
    /// Allocation-weighted mean observed return.
    pub capital_efficiency: f64,
}

/// Drawdown and prediction-error risk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskState {
    /// `(peak - current) / peak`, in `[0, 1]`.
    pub drawdown: f64,
    pub circuit_broken: bool,
    pub peak_balance: f64,
    pub current_balance: f64,
    /// Mean precision-weighted prediction error of this cycle's observations.
    pub prediction_error: f64,
    pub warnings: Vec<String>,
}
