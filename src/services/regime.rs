//! Market regime inference.
//!
//! Every cycle with realized returns contributes one aggregate signal: the
//! mean net return of the cycle relative to the target, normalized by the
//! target's magnitude. The mean of the last `window` signals is thresholded
//! into a bull/neutral/bear observation, which is folded into a three-state
//! posterior with one forward-filter step:
//!
//! ```text
//! prior_j     = sum_i posterior_i * T[i][j]
//! posterior_j ∝ prior_j * P(observation | regime j)
//! ```
//!
//! The sticky transition matrix means one contrary observation is not enough
//! to flip a confident regime, which keeps the regime from flapping.

use std::collections::VecDeque;

use crate::domain::models::{Regime, RegimeConfig, RegimeState};

/// Forward-filtered bull/sideways/bear posterior over a window of return signals.
#[derive(Debug, Clone)]
pub struct RegimeEstimator {
    config: RegimeConfig,
    transition: [[f64; 3]; 3],
    posterior: [f64; 3],
    signals: VecDeque<f64>,
    trend: f64,
}

impl RegimeEstimator {
    /// Start certain of the sideways regime, with a sticky transition matrix.
    pub fn new(config: RegimeConfig) -> Self {
        let stay = config.stickiness.clamp(0.0, 1.0);
        let leave = (1.0 - stay) / 2.0;
        let mut transition = [[leave; 3]; 3];
        for (i, row) in transition.iter_mut().enumerate() {
            row[i] = stay;
        }
        Self {
            config,
            transition,
            posterior: [0.0, 1.0, 0.0],
            signals: VecDeque::new(),
            trend: 0.0,
        }
    }

    /// The transition-probability matrix, rows indexed by the current regime.
    pub fn transition_matrix(&self) -> &[[f64; 3]; 3] {
        &self.transition
    }

    /// Classify a trend value with the fixed thresholds.
    pub fn classify(&self, trend: f64) -> Regime {
        if trend > self.config.bull_threshold {
            Regime::Bull
        } else if trend < self.config.bear_threshold {
            Regime::Bear
        } else {
            Regime::Neutral
        }
    }

    /// Fold one cycle's aggregate signal into the posterior.
    pub fn observe(&mut self, signal: f64) -> RegimeState {
        if !signal.is_finite() {
            return self.state();
        }
        self.signals.push_back(signal);
        while self.signals.len() > self.config.window.max(1) {
            self.signals.pop_front();
        }
        self.trend = self.signals.iter().sum::<f64>() / self.signals.len() as f64;
        let observed = self.classify(self.trend);

        let accuracy = self.config.emission_accuracy.clamp(1.0 / 3.0, 1.0);
        let miss = (1.0 - accuracy) / 2.0;

        let mut next = [0.0; 3];
        for (j, slot) in next.iter_mut().enumerate() {
            let prior: f64 = (0..3).map(|i| self.posterior[i] * self.transition[i][j]).sum();
            let likelihood = if j == observed.index() { accuracy } else { miss };
            *slot = prior * likelihood;
        }
        let total: f64 = next.iter().sum();
        if total > 0.0 {
            for p in &mut next {
                *p /= total;
            }
            self.posterior = next;
        }

        self.state()
    }

    /// The most probable regime. Ties resolve to neutral.
    pub fn regime(&self) -> Regime {
        let neutral = Regime::Neutral.index();
        let mut best = neutral;
        for (i, p) in self.posterior.iter().enumerate() {
            if *p > self.posterior[best] {
                best = i;
            }
        }
        Regime::from_index(best)
    }

    /// Multiplier on the target return: above 1 in bull, below 1 in bear.
    pub fn factor(&self) -> f64 {
        match self.regime() {
            Regime::Bull => self.config.bull_factor,
            Regime::Neutral => 1.0,
            Regime::Bear => self.config.bear_factor,
        }
    }

    /// Current regime, its allocation factor and the posterior.
    pub fn state(&self) -> RegimeState {
        RegimeState {
            regime: self.regime(),
            factor: self.factor(),
            posterior: self.posterior,
            trend: self.trend,
        }
    }
}

/// Aggregate regime signal for one cycle: mean net return relative to the target.
pub fn cycle_signal(returns: &[f64], target_return: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    Some((mean - target_return) / target_return.abs().max(1.0))
}
