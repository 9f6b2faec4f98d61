//! Symplectic capital allocator.
//!
//! Allocation is treated as a mechanical system: `q_i` is the capital held by
//! activity `i`, `p_i` its momentum. Each rebalance advances the system by one
//! leapfrog step under the force
//!
//! ```text
//! a_i = force_gain * (mu_i - target) / return_scale
//! F_i = clip(a_i - k * q_i, ±max_force)
//! ```
//!
//! where `k` is the cost of capital. The stability monitor's damping scales
//! momentum by `(1 - damping)` between the first half-kick and the drift.
//! After integration allocations are clamped non-negative and scaled down
//! so that `Σ q_i <= budget`; the remainder is reserve.
//!
//! The matching Hamiltonian is `H = Σ p²/2m + Σ (-a_i q_i + ½ k q_i²)`. Each
//! step reports its relative energy drift; damping, clipping and the budget
//! wall all remove energy on purpose, so drift is only checked against the
//! tolerance on steps where none of them acted.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::{ActivityIdx, AllocatorConfig, Outcome};

/// Dynamic per-activity record, one per catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDynState {
    /// Capital currently allocated, always `>= 0`.
    pub allocation: f64,
    /// Signed rate of change of the allocation.
    pub momentum: f64,
    /// Net return of the most recent execution.
    pub observed_return: f64,
    /// Lifetime revenue attributed to this activity.
    pub total_earned: f64,
    /// Lifetime cost attributed to this activity.
    pub total_spent: f64,
    pub last_executed_cycle: Option<u64>,
}

impl ActivityDynState {
    /// Whether `cooldown` cycles have passed since the last execution.
    pub fn cooled_down(&self, cycle: u64, cooldown: u64) -> bool {
        self.last_executed_cycle
            .map_or(true, |last| cycle > last.saturating_add(cooldown))
    }
}

/// Diagnostics of one leapfrog step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Hamiltonian before the step.
    pub energy_before: f64,
    /// Hamiltonian after the step.
    pub energy_after: f64,
    /// `|H_after - H_before|` relative to the magnitude of the energy terms.
    pub relative_drift: f64,
    /// Damping, force clipping or a position clamp acted during the step.
    pub dissipative: bool,
    /// The budget wall scaled allocations down.
    pub rescaled: bool,
    /// Set when the drift exceeded tolerance on a conservative step.
    pub warning: Option<String>,
}

/// Moves capital between activities with a damped leapfrog integrator under a budget wall.
#[derive(Debug, Clone)]
pub struct CapitalAllocator {
    config: AllocatorConfig,
    budget: f64,
    states: Vec<ActivityDynState>,
    active: Vec<bool>,
    last_rebalance_cycle: Option<u64>,
    last_rebalance_budget: f64,
    last_step: Option<StepReport>,
}

impl CapitalAllocator {
    /// Build the allocator and spread `initial_deployment * budget` evenly
    /// over the active activities.
    pub fn new(config: AllocatorConfig, budget: f64, active: Vec<bool>) -> Self {
        let budget = budget.max(0.0);
        let active_count = active.iter().filter(|a| **a).count();
        let share = if active_count > 0 {
            budget * config.initial_deployment.clamp(0.0, 1.0) / active_count as f64
        } else {
            0.0
        };
        let states = active
            .iter()
            .map(|on| ActivityDynState {
                allocation: if *on { share } else { 0.0 },
                ..Default::default()
            })
            .collect();
        Self {
            config,
            budget,
            states,
            active,
            last_rebalance_cycle: None,
            last_rebalance_budget: budget,
            last_step: None,
        }
    }

    /// Capital the allocator may deploy.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Set the total budget. Allocations above a reduced budget are scaled
    /// down immediately so conservation holds between rebalances too.
    pub fn update_budget(&mut self, budget: f64) {
        let budget = if budget.is_finite() { budget.max(0.0) } else { 0.0 };
        if (budget - self.budget).abs() <= f64::EPSILON {
            return;
        }
        debug!(from = self.budget, to = budget, "allocator budget updated");
        self.budget = budget;
        self.enforce_budget();
    }

    /// Set the effective activation of one activity. Deactivation releases
    /// its capital immediately. Returns whether anything changed.
    pub fn set_activity_active(&mut self, idx: ActivityIdx, active: bool) -> bool {
        let Some(slot) = self.active.get_mut(idx.0) else {
            return false;
        };
        if *slot == active {
            return false;
        }
        *slot = active;
        if !active {
            let state = &mut self.states[idx.0];
            state.allocation = 0.0;
            state.momentum = 0.0;
        }
        true
    }

    /// Whether `idx` may hold capital.
    pub fn is_active(&self, idx: ActivityIdx) -> bool {
        self.active.get(idx.0).copied().unwrap_or(false)
    }

    /// True once every `rebalance_interval` cycles, or when the budget moved
    /// by more than `budget_change_threshold` since the last rebalance.
    pub fn needs_rebalance(&self, cycle: u64) -> bool {
        let Some(last) = self.last_rebalance_cycle else {
            return true;
        };
        if cycle.saturating_sub(last) >= self.config.rebalance_interval.max(1) {
            return true;
        }
        let reference = self.last_rebalance_budget.abs().max(f64::EPSILON);
        (self.budget - self.last_rebalance_budget).abs() / reference
            > self.config.budget_change_threshold
    }

    /// Unclipped return advantage `a_i` for each activity.
    fn advantages(&self, means: &[f64], target: f64, return_scale: f64) -> Vec<f64> {
        let scale = return_scale.abs().max(f64::EPSILON);
        (0..self.states.len())
            .map(|i| {
                let mu = means.get(i).copied().unwrap_or(0.0);
                self.config.force_gain * (mu - target) / scale
            })
            .collect()
    }

    fn force(&self, advantage: f64, q: f64) -> (f64, bool) {
        let raw = advantage - self.config.cost_of_capital * q;
        let limit = self.config.max_force.abs();
        let clipped = raw.clamp(-limit, limit);
        (clipped, (clipped - raw).abs() > f64::EPSILON)
    }

    /// Hamiltonian of the current state under the given advantages.
    pub fn energy(&self, advantages: &[f64]) -> f64 {
        self.energy_terms(advantages).map(|(kin, lin, quad)| kin + lin + quad).sum()
    }

    /// Sum of the absolute magnitudes of every energy term.
    fn energy_scale(&self, advantages: &[f64]) -> f64 {
        self.energy_terms(advantages)
            .map(|(kin, lin, quad)| kin + lin.abs() + quad)
            .sum()
    }

    fn energy_terms<'a>(
        &'a self,
        advantages: &'a [f64],
    ) -> impl Iterator<Item = (f64, f64, f64)> + 'a {
        let mass = self.mass();
        let k = self.config.cost_of_capital;
        self.states.iter().zip(advantages).map(move |(s, a)| {
            (
                s.momentum * s.momentum / (2.0 * mass),
                -a * s.allocation,
                0.5 * k * s.allocation * s.allocation,
            )
        })
    }

    fn mass(&self) -> f64 {
        self.config.mass.max(f64::EPSILON)
    }

    /// Advance allocations by one damped leapfrog step.
    pub fn step(
        &mut self,
        cycle: u64,
        means: &[f64],
        target: f64,
        return_scale: f64,
        damping: f64,
    ) -> StepReport {
        let damping = damping.clamp(0.0, 1.0);
        let dt = self.config.dt;
        let mass = self.mass();
        let advantages = self.advantages(means, target, return_scale);

        for (state, on) in self.states.iter_mut().zip(&self.active) {
            if !on {
                state.allocation = 0.0;
                state.momentum = 0.0;
            }
        }
        let energy_before = self.energy(&advantages);
        let scale_before = self.energy_scale(&advantages);
        let mut dissipative = damping > 0.0;

        for i in 0..self.states.len() {
            if !self.active[i] {
                continue;
            }
            let (f0, clipped0) = self.force(advantages[i], self.states[i].allocation);
            let mut p = self.states[i].momentum + 0.5 * dt * f0;
            p *= 1.0 - damping;
            let mut q = self.states[i].allocation + dt * p / mass;
            let mut clamped = false;
            if q < 0.0 {
                q = 0.0;
                p = 0.0;
                clamped = true;
            }
            let (f1, clipped1) = self.force(advantages[i], q);
            if !clamped {
                p += 0.5 * dt * f1;
            }
            dissipative |= clipped0 || clipped1 || clamped;
            let state = &mut self.states[i];
            state.allocation = q;
            state.momentum = p;
        }

        let rescaled = self.enforce_budget();
        let energy_after = self.energy(&advantages);
        let scale = scale_before.max(self.energy_scale(&advantages)).max(1.0);
        let relative_drift = (energy_after - energy_before).abs() / scale;

        let warning = if !dissipative && !rescaled && relative_drift > self.config.energy_tolerance {
            let msg = format!(
                "allocator energy drift {relative_drift:.4} exceeds tolerance {:.4}",
                self.config.energy_tolerance
            );
            warn!(cycle, drift = relative_drift, "allocator energy drift above tolerance");
            Some(msg)
        } else {
            None
        };

        self.last_rebalance_cycle = Some(cycle);
        self.last_rebalance_budget = self.budget;

        let report = StepReport {
            energy_before,
            energy_after,
            relative_drift,
            dissipative,
            rescaled,
            warning,
        };
        self.last_step = Some(report.clone());
        report
    }

    /// Scale allocations down to the budget. Momentum pushing outward is
    /// absorbed by the wall. Returns whether scaling happened.
    fn enforce_budget(&mut self) -> bool {
        let total = self.total_allocated();
        if total <= self.budget || total <= 0.0 {
            return false;
        }
        let ratio = self.budget / total;
        for state in &mut self.states {
            state.allocation *= ratio;
            if state.momentum > 0.0 {
                state.momentum = 0.0;
            }
        }
        true
    }

    /// Fold one execution outcome into the activity's ledger.
    pub fn record_outcome(&mut self, idx: ActivityIdx, outcome: Outcome, cycle: u64) {
        if let Some(state) = self.states.get_mut(idx.0) {
            state.total_earned += outcome.revenue;
            state.total_spent += outcome.cost;
            state.observed_return = outcome.net();
            state.last_executed_cycle = Some(cycle);
        }
    }

    /// Mark an attempted execution that produced no outcome.
    pub fn record_attempt(&mut self, idx: ActivityIdx, cycle: u64) {
        if let Some(state) = self.states.get_mut(idx.0) {
            state.last_executed_cycle = Some(cycle);
        }
    }

    /// Dynamic state of one activity. Panics on an index outside the catalog.
    pub fn state(&self, idx: ActivityIdx) -> &ActivityDynState {
        &self.states[idx.0]
    }

    pub fn states(&self) -> &[ActivityDynState] {
        &self.states
    }

    pub fn allocations(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.allocation).collect()
    }

    pub fn observed_returns(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.observed_return).collect()
    }

    /// Sum of all allocations, never above [`Self::budget`].
    pub fn total_allocated(&self) -> f64 {
        self.states.iter().map(|s| s.allocation).sum()
    }

    /// Diagnostics of the most recent rebalance.
    pub fn last_step(&self) -> Option<&StepReport> {
        self.last_step.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(n: usize, budget: f64) -> CapitalAllocator {
        CapitalAllocator::new(AllocatorConfig::default(), budget, vec![true; n])
    }

    #[test]
    fn test_initial_deployment_is_even() {
        let alloc = allocator(4, 1000.0);
        for s in alloc.states() {
            assert!((s.allocation - 125.0).abs() < 1e-9);
        }
        assert!((alloc.total_allocated() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_positive_advantage_grows_allocation() {
        let mut alloc = allocator(2, 1000.0);
        let before = alloc.state(ActivityIdx(0)).allocation;
        alloc.step(1, &[60.0, 10.0], 10.0, 100.0, 0.0);
        assert!(alloc.state(ActivityIdx(0)).allocation > before);
    }

    #[test]
    fn test_never_exceeds_budget() {
        let mut alloc = allocator(3, 300.0);
        for cycle in 0..200 {
            alloc.step(cycle, &[500.0, 400.0, 300.0], 0.0, 100.0, 0.0);
            assert!(alloc.total_allocated() <= 300.0 + 1e-9);
            assert!(alloc.states().iter().all(|s| s.allocation >= 0.0));
        }
    }

    #[test]
    fn test_budget_cut_rescales_immediately() {
        let mut alloc = allocator(2, 1000.0);
        alloc.update_budget(100.0);
        assert!(alloc.total_allocated() <= 100.0 + 1e-9);
    }

    #[test]
    fn test_negative_advantage_drains_to_zero() {
        let mut alloc = allocator(1, 1000.0);
        for cycle in 0..100 {
            alloc.step(cycle, &[-100.0], 10.0, 100.0, 0.1);
        }
        assert!(alloc.state(ActivityIdx(0)).allocation.abs() < 1e-9);
    }

    #[test]
    fn test_deactivation_releases_capital() {
        let mut alloc = allocator(2, 1000.0);
        assert!(alloc.set_activity_active(ActivityIdx(1), false));
        assert!(!alloc.set_activity_active(ActivityIdx(1), false));
        assert_eq!(alloc.state(ActivityIdx(1)).allocation, 0.0);
        alloc.step(1, &[50.0, 50.0], 10.0, 100.0, 0.0);
        assert_eq!(alloc.state(ActivityIdx(1)).allocation, 0.0);
    }

    #[test]
    fn test_full_damping_freezes_momentum() {
        let mut alloc = allocator(1, 1000.0);
        let before = alloc.state(ActivityIdx(0)).allocation;
        alloc.step(1, &[60.0], 10.0, 100.0, 1.0);
        // The drift sees zero momentum; only the trailing half-kick acts.
        assert!((alloc.state(ActivityIdx(0)).allocation - before).abs() < 1e-12);
    }

    #[test]
    fn test_energy_drift_bounded_without_dissipation() {
        let config = AllocatorConfig {
            max_force: 1e9,
            initial_deployment: 0.0,
            ..Default::default()
        };
        let mut alloc = CapitalAllocator::new(config, 1e9, vec![true]);
        for cycle in 0..50 {
            let report = alloc.step(cycle, &[30.0], 10.0, 100.0, 0.0);
            assert!(!report.dissipative);
            assert!(report.relative_drift < 0.05, "drift {}", report.relative_drift);
            assert!(report.warning.is_none());
        }
    }

    #[test]
    fn test_needs_rebalance() {
        let config = AllocatorConfig {
            rebalance_interval: 3,
            ..Default::default()
        };
        let mut alloc = CapitalAllocator::new(config, 1000.0, vec![true]);
        assert!(alloc.needs_rebalance(0));
        alloc.step(0, &[10.0], 10.0, 100.0, 0.0);
        assert!(!alloc.needs_rebalance(1));
        assert!(alloc.needs_rebalance(3));
        alloc.update_budget(1200.0);
        assert!(alloc.needs_rebalance(1));
    }

    #[test]
    fn test_cooldown() {
        let state = ActivityDynState {
            last_executed_cycle: Some(5),
            ..Default::default()
        };
        assert!(!state.cooled_down(5, 0));
        assert!(state.cooled_down(6, 0));
        assert!(!state.cooled_down(7, 2));
        assert!(state.cooled_down(8, 2));
        assert!(ActivityDynState::default().cooled_down(0, 10));
    }

    #[test]
    fn test_record_outcome() {
        let mut alloc = allocator(1, 100.0);
        alloc.record_outcome(ActivityIdx(0), Outcome::new(30.0, 5.0), 4);
        let s = alloc.state(ActivityIdx(0));
        assert_eq!(s.total_earned, 30.0);
        assert_eq!(s.total_spent, 5.0);
        assert_eq!(s.observed_return, 25.0);
        assert_eq!(s.last_executed_cycle, Some(4));
    }
}
