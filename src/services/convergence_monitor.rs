//! Non-equilibrium steady state (NESS) tracking.
//!
//! The loop is at steady state when extrapolated monthly revenue and cost both
//! sit at their targets. Deviation is the RMS of the two relative errors; the
//! convergence rate is the negated slope of `ln(deviation)` over the recent
//! history, so a positive rate means the deviation is decaying exponentially.

use std::collections::VecDeque;

use crate::domain::models::{ConvergenceConfig, ConvergenceState};

/// Floor applied before taking `ln(deviation)`.
const MIN_LOG_DEVIATION: f64 = 1e-12;

/// Extrapolate a to-date total to one month: `total / (cycles / cycles_per_month)`.
pub fn extrapolate_monthly(total: f64, cycles: u64, cycles_per_month: f64) -> f64 {
    if cycles == 0 || cycles_per_month <= 0.0 {
        return 0.0;
    }
    total * cycles_per_month / cycles as f64
}

/// One cycle's observation for the monitor.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceInputs<'a> {
    /// Extrapolated monthly revenue.
    pub monthly_revenue: f64,
    /// Extrapolated monthly cost.
    pub monthly_cost: f64,
    pub balance: f64,
    /// Per-activity allocations after this cycle's rebalance.
    pub allocations: &'a [f64],
    /// Per-activity observed returns.
    pub returns: &'a [f64],
}

/// Tracks revenue/cost deviation and declares the steady state.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    config: ConvergenceConfig,
    history: VecDeque<f64>,
    below_epsilon: u32,
    state: ConvergenceState,
}

impl ConvergenceMonitor {
    /// A monitor with empty history and full deviation.
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            below_epsilon: 0,
            state: ConvergenceState {
                deviation: 1.0,
                ..Default::default()
            },
        }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// State as of the last observation.
    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    /// Whether deviation stayed under epsilon for the required window.
    pub fn is_at_steady_state(&self) -> bool {
        self.state.at_steady_state
    }

    /// RMS of the relative revenue and cost errors.
    pub fn deviation(&self, monthly_revenue: f64, monthly_cost: f64) -> f64 {
        let rel = |actual: f64, target: f64| (actual - target) / target.abs().max(1.0);
        let dr = rel(monthly_revenue, self.config.target_monthly_revenue);
        let dc = rel(monthly_cost, self.config.target_monthly_cost);
        ((dr * dr + dc * dc) / 2.0).sqrt()
    }

    /// Negated least-squares slope of `ln(deviation)` against cycle index.
    fn convergence_rate(&self) -> f64 {
        let n = self.history.len();
        if n < 2 {
            return 0.0;
        }
        let ys: Vec<f64> = self
            .history
            .iter()
            .map(|d| d.max(MIN_LOG_DEVIATION).ln())
            .collect();
        let n_f = n as f64;
        let x_mean = (n_f - 1.0) / 2.0;
        let y_mean = ys.iter().sum::<f64>() / n_f;
        let (mut num, mut den) = (0.0, 0.0);
        for (i, y) in ys.iter().enumerate() {
            let dx = i as f64 - x_mean;
            num += dx * (y - y_mean);
            den += dx * dx;
        }
        if den == 0.0 {
            0.0
        } else {
            -num / den
        }
    }

    pub fn observe(&mut self, inputs: ConvergenceInputs<'_>) -> ConvergenceState {
        let deviation = self.deviation(inputs.monthly_revenue, inputs.monthly_cost);
        let deviation = if deviation.is_finite() { deviation } else { f64::MAX };

        self.history.push_back(deviation);
        while self.history.len() > self.config.history.max(2) {
            self.history.pop_front();
        }
        let convergence_rate = self.convergence_rate();

        let epsilon = self.config.epsilon.max(MIN_LOG_DEVIATION);
        if deviation < epsilon {
            self.below_epsilon = self.below_epsilon.saturating_add(1);
        } else {
            self.below_epsilon = 0;
        }
        let at_steady_state = self.below_epsilon >= self.config.steady_cycles.max(1);

        let estimated_cycles_to_steady = if deviation < epsilon {
            Some(0)
        } else if convergence_rate > 0.0 {
            let cycles = ((deviation / epsilon).ln() / convergence_rate).ceil();
            (cycles.is_finite() && cycles < u64::MAX as f64).then_some(cycles as u64)
        } else {
            None
        };

        let burn = inputs.monthly_cost - inputs.monthly_revenue;
        let runway = (burn > 0.0).then(|| inputs.balance.max(0.0) / burn);

        let deployed: f64 = inputs.allocations.iter().sum();
        let capital_efficiency = if deployed > 0.0 {
            inputs
                .allocations
                .iter()
                .zip(inputs.returns)
                .map(|(a, r)| a * r)
                .sum::<f64>()
                / deployed
        } else {
            0.0
        };

        self.state = ConvergenceState {
            deviation,
            convergence_rate,
            estimated_cycles_to_steady,
            at_steady_state,
            runway,
            capital_efficiency,
        };
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConvergenceConfig {
        ConvergenceConfig {
            target_monthly_revenue: 1000.0,
            target_monthly_cost: 200.0,
            ..Default::default()
        }
    }

    fn inputs(revenue: f64, cost: f64) -> ConvergenceInputs<'static> {
        ConvergenceInputs {
            monthly_revenue: revenue,
            monthly_cost: cost,
            balance: 500.0,
            allocations: &[],
            returns: &[],
        }
    }

    #[test]
    fn test_extrapolate_monthly() {
        assert_eq!(extrapolate_monthly(100.0, 0, 30.0), 0.0);
        assert!((extrapolate_monthly(100.0, 10, 30.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_deviation_zero_on_target() {
        let monitor = ConvergenceMonitor::new(config());
        assert!(monitor.deviation(1000.0, 200.0).abs() < 1e-12);
        // only revenue off by 100%
        assert!((monitor.deviation(0.0, 200.0) - (0.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_decaying_deviation_has_positive_rate() {
        let mut monitor = ConvergenceMonitor::new(config());
        for revenue in [500.0, 750.0, 875.0] {
            monitor.observe(inputs(revenue, 200.0));
        }
        let state = monitor.state();
        assert!(state.convergence_rate > 0.0);
        let cycles = state.estimated_cycles_to_steady.unwrap();
        assert!(cycles > 0);
    }

    #[test]
    fn test_steady_state_needs_consecutive_cycles_and_resets() {
        let mut monitor = ConvergenceMonitor::new(config());
        for _ in 0..2 {
            assert!(!monitor.observe(inputs(1000.0, 200.0)).at_steady_state);
        }
        assert!(monitor.observe(inputs(1000.0, 200.0)).at_steady_state);
        assert_eq!(monitor.state().estimated_cycles_to_steady, Some(0));
        // deviation rises above epsilon again
        assert!(!monitor.observe(inputs(500.0, 200.0)).at_steady_state);
        assert!(!monitor.observe(inputs(1000.0, 200.0)).at_steady_state);
    }

    #[test]
    fn test_runway_only_when_burning() {
        let mut monitor = ConvergenceMonitor::new(config());
        let burning = monitor.observe(inputs(100.0, 200.0));
        assert_eq!(burning.runway, Some(5.0));
        let earning = monitor.observe(inputs(300.0, 200.0));
        assert!(earning.runway.is_none());
    }

    #[test]
    fn test_capital_efficiency_is_weighted() {
        let mut monitor = ConvergenceMonitor::new(config());
        let state = monitor.observe(ConvergenceInputs {
            monthly_revenue: 0.0,
            monthly_cost: 0.0,
            balance: 0.0,
            allocations: &[300.0, 100.0],
            returns: &[10.0, 50.0],
        });
        assert!((state.capital_efficiency - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_diverging_has_no_estimate() {
        let mut monitor = ConvergenceMonitor::new(config());
        for r in [900.0, 700.0, 400.0, 0.0] {
            monitor.observe(inputs(r, 200.0));
        }
        assert!(monitor.state().convergence_rate < 0.0);
        assert!(monitor.state().estimated_cycles_to_steady.is_none());
    }
}
