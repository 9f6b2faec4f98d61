//! Cycle results and the externally visible controller snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::activity::Tier;
use super::engine_state::{ConvergenceState, EfeScore, RegimeState, RiskState, StabilityState};
use crate::domain::errors::RecordedError;

/// Revenue and cost reported by one activity execution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub revenue: f64,
    pub cost: f64,
}

impl Outcome {
    pub fn new(revenue: f64, cost: f64) -> Self {
        Self { revenue, cost }
    }

    /// Net return of the execution.
    pub fn net(&self) -> f64 {
        self.revenue - self.cost
    }

    /// Outcomes must be finite and non-negative on both sides.
    pub fn is_valid(&self) -> bool {
        self.revenue.is_finite() && self.cost.is_finite() && self.revenue >= 0.0 && self.cost >= 0.0
    }
}

/// The strictly ordered states of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    EmergencyCheck,
    ContractionCheck,
    Allocate,
    Execute,
    ObserveNess,
    Infer,
    VariationalStep,
    PhaseCheck,
    Maintenance,
}

impl CyclePhase {
    pub const ORDER: [CyclePhase; 9] = [
        CyclePhase::EmergencyCheck,
        CyclePhase::ContractionCheck,
        CyclePhase::Allocate,
        CyclePhase::Execute,
        CyclePhase::ObserveNess,
        CyclePhase::Infer,
        CyclePhase::VariationalStep,
        CyclePhase::PhaseCheck,
        CyclePhase::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyCheck => "emergency_check",
            Self::ContractionCheck => "contraction_check",
            Self::Allocate => "allocate",
            Self::Execute => "execute",
            Self::ObserveNess => "observe_ness",
            Self::Infer => "infer",
            Self::VariationalStep => "variational_step",
            Self::PhaseCheck => "phase_check",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one activity execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub activity_id: String,
    /// `None` when the executor failed or returned nothing.
    pub outcome: Option<Outcome>,
    /// Allocation held by the activity when it was executed.
    pub allocation: f64,
}

impl ExecutionRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Summary of one cycle. Append-only; never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub id: Uuid,
    /// 1-based cycle number.
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// True when the emergency check short-circuited the cycle.
    pub skipped: bool,
    pub phases_completed: Vec<CyclePhase>,
    pub scores: Vec<EfeScore>,
    pub selected: Vec<String>,
    pub executions: Vec<ExecutionRecord>,
    pub revenue: f64,
    pub cost: f64,
    pub allocations: Vec<f64>,
    pub temperature: f64,
    pub regime: RegimeState,
    pub stability: StabilityState,
    pub convergence: ConvergenceState,
    pub risk: RiskState,
    pub unlocked_phase: usize,
    pub errors: Vec<RecordedError>,
    pub warnings: Vec<String>,
}

impl CycleResult {
    /// An empty result for cycle `cycle`.
    pub fn empty(cycle: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle,
            started_at: Utc::now(),
            duration_ms: 0,
            skipped: false,
            phases_completed: Vec::new(),
            scores: Vec::new(),
            selected: Vec::new(),
            executions: Vec::new(),
            revenue: 0.0,
            cost: 0.0,
            allocations: Vec::new(),
            temperature: 0.0,
            regime: RegimeState::default(),
            stability: StabilityState::default(),
            convergence: ConvergenceState::default(),
            risk: RiskState::default(),
            unlocked_phase: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn net(&self) -> f64 {
        self.revenue - self.cost
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-activity view inside [`ControllerState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityView {
    pub id: String,
    pub name: String,
    pub tier: Tier,
    pub risk_level: f64,
    /// Operator flag.
    pub enabled: bool,
    /// Effective activation: enabled, unlocked by phase, not suspended by the breaker.
    pub active: bool,
    pub allocation: f64,
    pub momentum: f64,
    pub belief_mean: f64,
    pub belief_variance: f64,
    pub observations: u64,
    pub observed_return: f64,
    pub total_earned: f64,
    pub total_spent: f64,
    pub last_executed_cycle: Option<u64>,
}

/// The sole externally visible snapshot, rebuilt at the end of every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub cycle_count: u64,
    pub last_cycle_time: Option<DateTime<Utc>>,
    pub running: bool,
    /// Configured cap on deployed capital.
    pub total_budget: f64,
    /// Capital the allocator may deploy this cycle, after the reserve and the cap.
    pub deployable_budget: f64,
    pub balance: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub monthly_revenue_estimate: f64,
    pub monthly_cost_estimate: f64,
    pub unlocked_phase: usize,
    pub phase_name: String,
    pub unlocked_tiers: Vec<Tier>,
    pub temperature: f64,
    pub regime: RegimeState,
    pub stability: StabilityState,
    pub convergence: ConvergenceState,
    pub risk: RiskState,
    pub activities: Vec<ActivityView>,
    pub last_result: Option<CycleSummary>,
}

impl ControllerState {
    pub fn activity(&self, id: &str) -> Option<&ActivityView> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn total_allocated(&self) -> f64 {
        self.activities.iter().map(|a| a.allocation).sum()
    }
}

/// Condensed view of the latest cycle kept in [`ControllerState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub skipped: bool,
    pub selected: Vec<String>,
    pub revenue: f64,
    pub cost: f64,
    pub error_count: usize,
    pub warning_count: usize,
}

impl From<&CycleResult> for CycleSummary {
    fn from(result: &CycleResult) -> Self {
        Self {
            cycle: result.cycle,
            skipped: result.skipped,
            selected: result.selected.clone(),
            revenue: result.revenue,
            cost: result.cost,
            error_count: result.errors.len(),
            warning_count: result.warnings.len(),
        }
    }
}
