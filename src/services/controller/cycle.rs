//! The per-cycle state machine.
//!
//! [`CycleEngine`] owns every engine and all mutable loop state. One call to
//! [`CycleEngine::run_cycle`] walks the nine phases in order:
//!
//! ```text
//! EmergencyCheck -> ContractionCheck -> Allocate -> Execute -> ObserveNess
//!   -> Infer -> VariationalStep -> PhaseCheck -> Maintenance
//! ```
//!
//! Nothing in here returns an error to the caller. Failures inside a phase
//! are recorded on the [`CycleResult`] and the cycle moves on.

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::domain::errors::{ControlError, DomainResult, RecordedError};
use crate::domain::models::{
    ActivityCatalog, ActivityIdx, ActivityView, Config, ControllerState, CyclePhase, CycleResult,
    CycleSummary, ExecutionRecord, PendingFeedback, PersistedState, TodayStats,
};
use crate::domain::ports::{EnvironmentSignals, StateStore};
use crate::services::action_selector::{ActionSelector, Candidate};
use crate::services::belief_store::BeliefStore;
use crate::services::capital_allocator::CapitalAllocator;
use crate::services::convergence_monitor::{
    extrapolate_monthly, ConvergenceInputs, ConvergenceMonitor,
};
use crate::services::executor_registry::ExecutorRegistry;
use crate::services::planner::rank_with_lookahead;
use crate::services::regime::{cycle_signal, RegimeEstimator};
use crate::services::risk_engine::{BreakerTransition, RiskEngine, Surprise};
use crate::services::stability_monitor::StabilityMonitor;
use crate::services::temperature::{TemperatureSchedule, TemperatureSignals};

use super::phase::{PhaseChange, PhaseTracker};

/// Deployable capital for a balance: `min(total_budget, max(0, balance) * fraction)`.
pub fn deployable_budget(config: &Config, balance: f64) -> f64 {
    let fraction = config.deployable_fraction.clamp(0.0, 1.0);
    (balance.max(0.0) * fraction).min(config.total_budget.max(0.0))
}

/// All mutable control-loop state.
pub struct CycleEngine {
    config: Config,
    catalog: ActivityCatalog,
    beliefs: BeliefStore,
    regime: RegimeEstimator,
    temperature: TemperatureSchedule,
    allocator: CapitalAllocator,
    stability: StabilityMonitor,
    selector: ActionSelector,
    convergence: ConvergenceMonitor,
    risk: RiskEngine,
    phases: PhaseTracker,
    pub(crate) executors: ExecutorRegistry,
    rng: StdRng,
    cycle_count: u64,
    /// Cycles run by this process. The revenue and cost totals cover exactly
    /// these cycles, so monthly extrapolation divides by this, not `cycle_count`.
    session_cycles: u64,
    last_cycle_time: Option<chrono::DateTime<Utc>>,
    total_revenue: f64,
    total_cost: f64,
    today_stats: TodayStats,
    pending_feedback: Vec<PendingFeedback>,
    last_result: Option<CycleSummary>,
}

impl std::fmt::Debug for CycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleEngine")
            .field("activities", &self.catalog.len())
            .field("cycle_count", &self.cycle_count)
            .field("balance", &self.balance())
            .field("executors", &self.executors)
            .finish_non_exhaustive()
    }
}

impl CycleEngine {
    /// Build every engine from `config`. Fails on an invalid catalog.
    pub fn new(config: Config) -> DomainResult<Self> {
        let catalog = ActivityCatalog::new(config.activities.clone())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let phases = PhaseTracker::new(config.phases.clone());
        let risk = RiskEngine::new(config.risk.clone(), config.initial_balance);

        let initial_active: Vec<bool> = catalog
            .profiles()
            .iter()
            .map(|p| p.active && phases.is_unlocked(p.tier))
            .collect();
        let allocator = CapitalAllocator::new(
            config.allocator.clone(),
            deployable_budget(&config, config.initial_balance),
            initial_active,
        );

        Ok(Self {
            beliefs: BeliefStore::new(&catalog, &config.belief),
            regime: RegimeEstimator::new(config.regime.clone()),
            temperature: TemperatureSchedule::new(config.temperature.clone()),
            stability: StabilityMonitor::new(config.stability.clone()),
            selector: ActionSelector::new(config.selection.clone(), config.max_concurrent),
            convergence: ConvergenceMonitor::new(config.convergence.clone()),
            executors: ExecutorRegistry::with_slots(catalog.len()),
            allocator,
            risk,
            phases,
            catalog,
            rng,
            cycle_count: 0,
            session_cycles: 0,
            last_cycle_time: None,
            total_revenue: 0.0,
            total_cost: 0.0,
            today_stats: TodayStats::default(),
            pending_feedback: Vec::new(),
            last_result: None,
            config,
        })
    }

    pub fn catalog(&self) -> &ActivityCatalog {
        &self.catalog
    }

    /// Cycles counted since the first run, including restored ones.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Initial balance plus this process's revenue minus its cost.
    pub fn balance(&self) -> f64 {
        self.config.initial_balance + self.total_revenue - self.total_cost
    }

    /// Revenue extrapolated to a month from this process's cycles.
    pub fn monthly_revenue(&self) -> f64 {
        extrapolate_monthly(
            self.total_revenue,
            self.session_cycles,
            self.config.convergence.cycles_per_month,
        )
    }

    /// Cost extrapolated to a month from this process's cycles.
    pub fn monthly_cost(&self) -> f64 {
        extrapolate_monthly(
            self.total_cost,
            self.session_cycles,
            self.config.convergence.cycles_per_month,
        )
    }

    /// Restore the persisted bookkeeping from a previous process.
    pub fn restore(&mut self, persisted: PersistedState) {
        self.cycle_count = persisted.cycle_count;
        self.last_cycle_time = persisted.last_cycle_time;
        self.today_stats = persisted.today_stats;
        self.today_stats.roll_over(Utc::now());
        self.pending_feedback = persisted.pending_feedback;
        info!(
            cycle_count = self.cycle_count,
            pending = self.pending_feedback.len(),
            "restored persisted controller state"
        );
    }

    /// The subset of state that survives a restart.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            today_stats: self.today_stats.clone(),
            pending_feedback: self.pending_feedback.clone(),
            cycle_count: self.cycle_count,
            last_cycle_time: self.last_cycle_time,
        }
    }

    /// Set the operator flag of one activity and re-derive its effective activation.
    pub fn set_activity_active(&mut self, id: &str, active: bool) -> DomainResult<bool> {
        let idx = self.catalog.resolve(id)?;
        let changed = self.catalog.set_active(idx, active);
        if changed {
            info!(activity = id, active, "operator activation changed");
            self.sync_activation();
        }
        Ok(changed)
    }

    fn effectively_active(&self, idx: ActivityIdx) -> bool {
        let profile = self.catalog.profile(idx);
        profile.active && self.phases.is_unlocked(profile.tier) && !self.risk.suppresses(profile)
    }

    /// Push the effective activation of every activity into the allocator.
    /// Returns the ids whose activation changed.
    fn sync_activation(&mut self) -> Vec<(String, bool)> {
        let mut changes = Vec::new();
        for idx in self.catalog.indices() {
            let active = self.effectively_active(idx);
            if self.allocator.set_activity_active(idx, active) {
                changes.push((self.catalog.profile(idx).id.clone(), active));
            }
        }
        changes
    }

    /// Run one full cycle.
    pub async fn run_cycle(
        &mut self,
        signals: EnvironmentSignals,
        store: Option<&dyn StateStore>,
    ) -> CycleResult {
        let started = Instant::now();
        self.cycle_count += 1;
        self.session_cycles += 1;
        let cycle = self.cycle_count;
        let mut result = CycleResult::empty(cycle);

        // EmergencyCheck
        let halt_reason = if signals.emergency {
            Some("emergency flag raised")
        } else if self.config.live_mode && !signals.live_prerequisites_met {
            Some("live-mode prerequisites unavailable")
        } else {
            None
        };
        result.phases_completed.push(CyclePhase::EmergencyCheck);
        if let Some(reason) = halt_reason {
            warn!(cycle, reason, "cycle skipped by emergency check");
            result.skipped = true;
            result
                .errors
                .push(ControlError::EmergencyHalt(reason.to_string()).into());
            self.last_cycle_time = Some(Utc::now());
            self.fill_telemetry(&mut result);
            result.duration_ms = started.elapsed().as_millis() as u64;
            self.last_result = Some(CycleSummary::from(&result));
            return result;
        }

        self.contraction_check(cycle, &signals, &mut result);
        result.phases_completed.push(CyclePhase::ContractionCheck);

        self.allocate(cycle, &mut result);
        result.phases_completed.push(CyclePhase::Allocate);

        self.execute(cycle, &mut result).await;
        result.phases_completed.push(CyclePhase::Execute);

        self.observe_ness(&mut result);
        result.phases_completed.push(CyclePhase::ObserveNess);

        let surprises = self.infer(&mut result);
        result.phases_completed.push(CyclePhase::Infer);

        self.variational_step(&surprises, &mut result);
        result.phases_completed.push(CyclePhase::VariationalStep);

        self.phase_check(cycle, &mut result);
        result.phases_completed.push(CyclePhase::PhaseCheck);

        self.maintenance(store, &mut result).await;
        result.phases_completed.push(CyclePhase::Maintenance);

        self.fill_telemetry(&mut result);
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.last_result = Some(CycleSummary::from(&result));
        result
    }

    fn contraction_check(
        &mut self,
        cycle: u64,
        signals: &EnvironmentSignals,
        result: &mut CycleResult,
    ) {
        let allocations = self.allocator.allocations();
        let returns = self.allocator.observed_returns();
        let stability = self.stability.observe(&allocations, &returns);
        if !stability.stable {
            result.errors.push(
                ControlError::StabilityWarning(format!(
                    "mean ln L = {:.3}, damping {:.3}",
                    stability.log_lipschitz_avg, stability.damping_recommended
                ))
                .into(),
            );
        }
        result.warnings.extend(stability.warnings.iter().cloned());

        let beta = self.temperature.update(
            cycle,
            TemperatureSignals {
                unstable: !stability.stable,
                novelty: signals.novelty,
                fatigue: signals.fatigue,
            },
        );
        debug!(cycle, beta, damping = stability.damping_recommended, "contraction check");
    }

    fn allocate(&mut self, cycle: u64, result: &mut CycleResult) {
        if !self.allocator.needs_rebalance(cycle) {
            return;
        }
        let selection = self.selector.config();
        let target = selection.target_return * self.regime.factor();
        let report = self.allocator.step(
            cycle,
            &self.beliefs.means(),
            target,
            selection.return_scale,
            self.stability.damping(),
        );
        if let Some(w) = report.warning {
            result.warnings.push(w);
        }
        debug!(
            cycle,
            allocated = self.allocator.total_allocated(),
            budget = self.allocator.budget(),
            drift = report.relative_drift,
            "allocation rebalanced"
        );
    }

    async fn execute(&mut self, cycle: u64, result: &mut CycleResult) {
        let eligible: Vec<ActivityIdx> = self
            .catalog
            .iter()
            .filter(|(idx, profile)| {
                self.allocator.is_active(*idx)
                    && self
                        .allocator
                        .state(*idx)
                        .cooled_down(cycle, profile.cooldown_cycles)
            })
            .map(|(idx, _)| idx)
            .collect();

        let bonuses = self.selector.draw_bonuses(eligible.len(), &mut self.rng);
        let candidates: Vec<Candidate<'_>> = eligible
            .iter()
            .map(|&idx| Candidate {
                idx,
                profile: self.catalog.profile(idx),
                belief: self.beliefs.get(idx),
            })
            .collect();
        let ranked = rank_with_lookahead(
            &candidates,
            self.regime.factor(),
            self.selector.config(),
            &bonuses,
        );

        let order: Vec<ActivityIdx> = ranked.iter().map(|r| r.idx).collect();
        let g: Vec<f64> = ranked.iter().map(|r| r.combined_g).collect();
        let selected = self
            .selector
            .select(&order, &g, self.temperature.beta(), &mut self.rng);
        result.scores = ranked.into_iter().map(|r| r.immediate).collect();

        for idx in selected {
            let profile = self.catalog.profile(idx);
            let id = profile.id.clone();
            let allocation = self.allocator.state(idx).allocation;
            result.selected.push(id.clone());

            match self.executors.run(idx, profile).await {
                Ok(outcome) => {
                    self.allocator.record_outcome(idx, outcome, cycle);
                    self.today_stats.record(Some(outcome));
                    self.total_revenue += outcome.revenue;
                    self.total_cost += outcome.cost;
                    result.revenue += outcome.revenue;
                    result.cost += outcome.cost;
                    self.pending_feedback.push(PendingFeedback {
                        activity_id: id.clone(),
                        cycle,
                        outcome,
                        recorded_at: Utc::now(),
                    });
                    debug!(cycle, activity = %id, revenue = outcome.revenue, cost = outcome.cost, "activity executed");
                    result.executions.push(ExecutionRecord {
                        activity_id: id,
                        outcome: Some(outcome),
                        allocation,
                    });
                }
                Err(err) => {
                    warn!(cycle, activity = %id, error = %err, "activity execution failed");
                    self.allocator.record_attempt(idx, cycle);
                    self.today_stats.record(None);
                    result.errors.push(RecordedError::from(&err));
                    result.executions.push(ExecutionRecord {
                        activity_id: id,
                        outcome: None,
                        allocation,
                    });
                }
            }
        }
    }

    fn observe_ness(&mut self, result: &mut CycleResult) {
        let allocations = self.allocator.allocations();
        let returns = self.allocator.observed_returns();
        let state = self.convergence.observe(ConvergenceInputs {
            monthly_revenue: self.monthly_revenue(),
            monthly_cost: self.monthly_cost(),
            balance: self.balance(),
            allocations: &allocations,
            returns: &returns,
        });
        if state.at_steady_state {
            debug!(deviation = state.deviation, "at steady state");
        }
        result.convergence = state;
    }

    /// Fold pending feedback into the beliefs and update the regime.
    fn infer(&mut self, result: &mut CycleResult) -> Vec<Surprise> {
        let pending = std::mem::take(&mut self.pending_feedback);
        let mut surprises = Vec::with_capacity(pending.len());
        let mut returns = Vec::with_capacity(pending.len());

        for feedback in pending {
            let Some(idx) = self.catalog.index_of(&feedback.activity_id) else {
                warn!(activity = %feedback.activity_id, "dropping feedback for unknown activity");
                result.warnings.push(format!(
                    "dropped feedback for unknown activity '{}'",
                    feedback.activity_id
                ));
                continue;
            };
            let net = feedback.outcome.net();
            let update = self.beliefs.observe(idx, net);
            returns.push(net);
            surprises.push(Surprise {
                activity_id: feedback.activity_id,
                weighted_error: update.weighted_error,
            });
        }

        if let Some(signal) = cycle_signal(&returns, self.selector.config().target_return) {
            let regime = self.regime.observe(signal);
            debug!(regime = %regime.regime, trend = regime.trend, "regime updated");
        }
        surprises
    }

    fn variational_step(&mut self, surprises: &[Surprise], result: &mut CycleResult) {
        let balance = self.balance();
        let transition = self.risk.step(balance, surprises);
        if transition == BreakerTransition::Tripped {
            result.errors.push(
                ControlError::CircuitBreakerTripped {
                    drawdown: self.risk.drawdown(),
                    max_drawdown: self.config.risk.max_drawdown,
                }
                .into(),
            );
        }
        result.warnings.extend(self.risk.state().warnings.iter().cloned());

        for (id, active) in self.sync_activation() {
            if active {
                info!(activity = %id, "activity resumed");
            } else {
                warn!(activity = %id, "activity suspended by circuit breaker");
            }
        }
    }

    fn phase_check(&mut self, cycle: u64, result: &mut CycleResult) {
        let revenue = self.monthly_revenue();
        match self.phases.evaluate(revenue) {
            PhaseChange::Advanced { from, to } => {
                info!(cycle, from, to, phase = self.phases.name(), revenue, "phase advanced");
            }
            PhaseChange::Relocked { from, to } => {
                warn!(cycle, from, to, phase = self.phases.name(), revenue, "phase re-locked");
                result
                    .warnings
                    .push(format!("phase re-locked from {from} to {to}"));
            }
            PhaseChange::Unchanged => {}
        }
        for (id, active) in self.sync_activation() {
            debug!(activity = %id, active, "activation changed by phase");
        }
    }

    async fn maintenance(&mut self, store: Option<&dyn StateStore>, result: &mut CycleResult) {
        let budget = deployable_budget(&self.config, self.balance());
        self.allocator.update_budget(budget);

        let now = Utc::now();
        if self.today_stats.roll_over(now) {
            info!(date = %self.today_stats.date, "daily stats rolled over");
        }
        self.last_cycle_time = Some(now);

        if let Some(store) = store {
            if let Err(err) = store.save(&self.persisted()).await {
                warn!(error = %err, "failed to persist controller state");
                result.errors.push(RecordedError::from(&err));
            }
        }
    }

    fn fill_telemetry(&self, result: &mut CycleResult) {
        result.allocations = self.allocator.allocations();
        result.temperature = self.temperature.beta();
        result.regime = self.regime.state();
        result.stability = self.stability.state().clone();
        result.convergence = self.convergence.state().clone();
        result.risk = self.risk.state().clone();
        result.unlocked_phase = self.phases.current();
    }

    /// Build the externally visible snapshot.
    pub fn snapshot(&self, running: bool) -> ControllerState {
        let activities = self
            .catalog
            .iter()
            .map(|(idx, profile)| {
                let dyn_state = self.allocator.state(idx);
                let belief = self.beliefs.get(idx);
                ActivityView {
                    id: profile.id.clone(),
                    name: profile.name.clone(),
                    tier: profile.tier,
                    risk_level: profile.risk_level,
                    enabled: profile.active,
                    active: self.allocator.is_active(idx),
                    allocation: dyn_state.allocation,
                    momentum: dyn_state.momentum,
                    belief_mean: belief.mean(),
                    belief_variance: belief.variance(),
                    observations: belief.observations,
                    observed_return: dyn_state.observed_return,
                    total_earned: dyn_state.total_earned,
                    total_spent: dyn_state.total_spent,
                    last_executed_cycle: dyn_state.last_executed_cycle,
                }
            })
            .collect();

        ControllerState {
            cycle_count: self.cycle_count,
            last_cycle_time: self.last_cycle_time,
            running,
            total_budget: self.config.total_budget,
            deployable_budget: self.allocator.budget(),
            balance: self.balance(),
            total_revenue: self.total_revenue,
            total_cost: self.total_cost,
            monthly_revenue_estimate: self.monthly_revenue(),
            monthly_cost_estimate: self.monthly_cost(),
            unlocked_phase: self.phases.current(),
            phase_name: self.phases.name().to_string(),
            unlocked_tiers: self.phases.unlocked_tiers(),
            temperature: self.temperature.beta(),
            regime: self.regime.state(),
            stability: self.stability.state().clone(),
            convergence: self.convergence.state().clone(),
            risk: self.risk.state().clone(),
            activities,
            last_result: self.last_result.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActivityProfile, Outcome, PhaseConfig, Tier};
    use crate::domain::ports::ActivityExecutor;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Steady(Outcome);

    #[async_trait]
    impl ActivityExecutor for Steady {
        async fn execute(&self, _activity: &ActivityProfile) -> anyhow::Result<Option<Outcome>> {
            Ok(Some(self.0))
        }
    }

    fn config() -> Config {
        Config {
            seed: Some(42),
            activities: vec![
                ActivityProfile::new("alpha", Tier::S).with_return(20.0).with_risk(0.1),
                ActivityProfile::new("beta", Tier::A).with_return(30.0).with_risk(0.2),
            ],
            phases: vec![PhaseConfig::new("all", 0.0, Tier::ALL.to_vec())],
            ..Default::default()
        }
    }

    fn engine_with(outcome: Outcome) -> CycleEngine {
        let mut engine = CycleEngine::new(config()).unwrap();
        let exec: Arc<dyn ActivityExecutor> = Arc::new(Steady(outcome));
        engine.executors.register_default(&exec);
        engine
    }

    #[test]
    fn test_deployable_budget_is_capped() {
        let cfg = Config::default();
        assert!((deployable_budget(&cfg, 1000.0) - 800.0).abs() < 1e-9);
        assert!((deployable_budget(&cfg, 10_000.0) - 1000.0).abs() < 1e-9);
        assert_eq!(deployable_budget(&cfg, -50.0), 0.0);
    }

    #[test]
    fn test_snapshot_reports_configured_and_deployable_budget() {
        let mut cfg = config();
        cfg.total_budget = 5_000.0;
        cfg.initial_balance = 1_000.0;
        let engine = CycleEngine::new(cfg).unwrap();
        let state = engine.snapshot(false);
        assert!((state.total_budget - 5_000.0).abs() < 1e-9);
        assert!((state.deployable_budget - 800.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cycle_walks_every_phase_in_order() {
        let mut engine = engine_with(Outcome::new(30.0, 5.0));
        let result = engine.run_cycle(EnvironmentSignals::default(), None).await;
        assert_eq!(result.cycle, 1);
        assert!(!result.skipped);
        assert_eq!(result.phases_completed, CyclePhase::ORDER.to_vec());
        assert!(!result.selected.is_empty());
        assert!(result.revenue > 0.0);
    }

    #[tokio::test]
    async fn test_feedback_drained_by_infer() {
        let mut engine = engine_with(Outcome::new(30.0, 5.0));
        let result = engine.run_cycle(EnvironmentSignals::default(), None).await;
        assert!(engine.persisted().pending_feedback.is_empty());
        let executed = result.executions.len() as u64;
        let observations: u64 = engine
            .snapshot(false)
            .activities
            .iter()
            .map(|a| a.observations)
            .sum();
        assert_eq!(observations, executed);
    }

    #[tokio::test]
    async fn test_emergency_skips_body_but_counts() {
        let mut engine = engine_with(Outcome::new(30.0, 5.0));
        let signals = EnvironmentSignals {
            emergency: true,
            ..Default::default()
        };
        let result = engine.run_cycle(signals, None).await;
        assert!(result.skipped);
        assert_eq!(result.phases_completed, vec![CyclePhase::EmergencyCheck]);
        assert!(result.executions.is_empty());
        assert_eq!(engine.cycle_count(), 1);
    }

    #[tokio::test]
    async fn test_live_mode_requires_prerequisites() {
        let mut cfg = config();
        cfg.live_mode = true;
        let mut engine = CycleEngine::new(cfg).unwrap();
        let signals = EnvironmentSignals {
            live_prerequisites_met: false,
            ..Default::default()
        };
        assert!(engine.run_cycle(signals, None).await.skipped);
        assert!(!engine.run_cycle(EnvironmentSignals::default(), None).await.skipped);
    }

    #[tokio::test]
    async fn test_restored_feedback_is_folded_in() {
        let mut engine = engine_with(Outcome::new(0.0, 0.0));
        engine.restore(PersistedState {
            pending_feedback: vec![PendingFeedback {
                activity_id: "alpha".into(),
                cycle: 3,
                outcome: Outcome::new(100.0, 0.0),
                recorded_at: Utc::now(),
            }],
            cycle_count: 3,
            ..Default::default()
        });
        let result = engine.run_cycle(EnvironmentSignals::default(), None).await;
        assert_eq!(result.cycle, 4);
        let alpha = engine.snapshot(false).activities[0].clone();
        assert!(alpha.observations >= 1);
        assert!(alpha.belief_mean > 20.0);
    }

    #[test]
    fn test_operator_flag_controls_allocation() {
        let mut engine = CycleEngine::new(config()).unwrap();
        assert!(engine.set_activity_active("beta", false).unwrap());
        assert!(!engine.set_activity_active("beta", false).unwrap());
        let view = engine.snapshot(false);
        let beta = view.activity("beta").unwrap();
        assert!(!beta.enabled);
        assert!(!beta.active);
        assert_eq!(beta.allocation, 0.0);
        assert!(engine.set_activity_active("nope", true).is_err());
    }
}
