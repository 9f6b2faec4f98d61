//! Selection temperature (inverse temperature `beta`).
//!
//! `beta` anneals linearly with the cycle count toward `max`, so the selector
//! moves from exploring to exploiting. A multiplicative perturbation is layered
//! on top: instability or a novel environment pulls `beta` down, sustained
//! fatigue with low novelty pushes it up. The perturbation relaxes back toward
//! neutral every cycle, and the result always stays inside `[min, max]`.

use tracing::debug;

use crate::domain::models::TemperatureConfig;

/// Inputs the temperature reacts to in one cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureSignals {
    /// The allocation loop is not contracting.
    pub unstable: bool,
    /// Novelty in `[0, 1]`; lowers beta.
    pub novelty: Option<f64>,
    /// Fatigue in `[0, 1]`; raises beta.
    pub fatigue: Option<f64>,
}

/// Annealing schedule for `beta` with a decaying perturbation.

#[derive(Debug, Clone)]
pub struct TemperatureSchedule {
    config: TemperatureConfig,
    perturbation: f64,
    fatigued_streak: u32,
    beta: f64,
}

impl TemperatureSchedule {
    /// Start at `initial`, clamped into `[min, max]`.
    pub fn new(config: TemperatureConfig) -> Self {
        let beta = config.initial.clamp(Self::floor(&config), config.max.max(Self::floor(&config)));
        Self {
            config,
            perturbation: 1.0,
            fatigued_streak: 0,
            beta,
        }
    }

    fn floor(config: &TemperatureConfig) -> f64 {
        config.min.max(f64::MIN_POSITIVE)
    }

    /// Current `beta`, always strictly positive.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Annealed `beta` before perturbation.
    pub fn annealed(&self, cycle: u64) -> f64 {
        let floor = Self::floor(&self.config);
        let raw = self.config.initial * (1.0 + self.config.anneal_rate * cycle as f64);
        raw.clamp(floor, self.config.max.max(floor))
    }

    /// Advance the schedule to `cycle` and return the new `beta`.
    pub fn update(&mut self, cycle: u64, signals: TemperatureSignals) -> f64 {
        let memory = self.config.perturbation_memory.clamp(0.0, 1.0);
        self.perturbation = 1.0 + (self.perturbation - 1.0) * memory;

        let novel = signals
            .novelty
            .is_some_and(|n| n > self.config.novelty_threshold);
        let fatigued = signals
            .fatigue
            .is_some_and(|f| f > self.config.fatigue_threshold);

        if fatigued && !novel {
            self.fatigued_streak += 1;
        } else {
            self.fatigued_streak = 0;
        }

        if signals.unstable || novel {
            self.perturbation *= self.config.exploration_factor;
            debug!(
                unstable = signals.unstable,
                novel, "temperature lowered for exploration"
            );
        } else if self.fatigued_streak >= self.config.fatigue_cycles.max(1) {
            self.perturbation *= self.config.exploitation_factor;
            debug!(streak = self.fatigued_streak, "temperature raised for exploitation");
        }

        let floor = Self::floor(&self.config);
        let ceiling = self.config.max.max(floor);
        self.beta = (self.annealed(cycle) * self.perturbation).clamp(floor, ceiling);
        if !self.beta.is_finite() {
            self.beta = floor;
        }
        self.beta
    }
}
