//! Contraction monitor for the allocation/return feedback loop.
//!
//! Each cycle compares the latest allocation and return vectors with the
//! previous pair and measures the local gain
//! `L = ‖Δreturn‖ / ‖Δallocation‖`. The loop is contracting while the running
//! average of `ln L` stays negative. The further that average rises above
//! zero, the more damping the allocator is told to apply.

use tracing::warn;

use crate::domain::models::{StabilityConfig, StabilityState};

/// Lower clamp on a gain sample; also used when the gain cannot be measured.
pub const L_MIN: f64 = 1e-3;
/// Upper clamp on a gain sample.
pub const L_MAX: f64 = 1e3;

/// Estimates the contraction rate of the allocation loop and recommends damping.
#[derive(Debug, Clone)]
pub struct StabilityMonitor {
    config: StabilityConfig,
    previous: Option<(Vec<f64>, Vec<f64>)>,
    log_avg: Option<f64>,
    state: StabilityState,
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl StabilityMonitor {
    /// A monitor that recommends `base_damping` until it has two samples.
    pub fn new(config: StabilityConfig) -> Self {
        let state = StabilityState {
            damping_recommended: config.base_damping.clamp(0.0, 1.0),
            ..Default::default()
        };
        Self {
            config,
            previous: None,
            log_avg: None,
            state,
        }
    }

    /// State as of the last observation.
    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    /// Damping the allocator should apply on its next step, in `[0, 1]`.
    pub fn damping(&self) -> f64 {
        self.state.damping_recommended
    }

    /// Whether the averaged gain is below one.
    pub fn is_stable(&self) -> bool {
        self.state.stable
    }

    /// Record the latest allocation and return vectors and re-estimate stability.
    pub fn observe(&mut self, allocations: &[f64], returns: &[f64]) -> StabilityState {
        let mut warnings = Vec::new();
        let mut last_ratio = None;

        if let Some((prev_alloc, prev_ret)) = &self.previous {
            let d_alloc = euclidean_distance(allocations, prev_alloc);
            let d_ret = euclidean_distance(returns, prev_ret);
            let ratio = if d_alloc < self.config.min_delta {
                L_MIN
            } else {
                (d_ret / d_alloc).clamp(L_MIN, L_MAX)
            };
            let ratio = if ratio.is_finite() { ratio } else { L_MAX };
            last_ratio = Some(ratio);

            let sample = ratio.ln();
            let weight = self.config.log_average_weight.clamp(0.0, 1.0);
            let avg = match self.log_avg {
                Some(avg) => (1.0 - weight) * avg + weight * sample,
                None => sample,
            };
            self.log_avg = Some(avg);

            if ratio > self.config.spike_ratio {
                warnings.push(format!(
                    "loop gain spike: L = {ratio:.3} exceeds {:.3}",
                    self.config.spike_ratio
                ));
            }
        }
        self.previous = Some((allocations.to_vec(), returns.to_vec()));

        let avg = self.log_avg.unwrap_or(0.0);
        let stable = self.log_avg.map_or(true, |a| a < 0.0);
        if !stable {
            warnings.push(format!(
                "allocation loop not contracting: mean ln L = {avg:.3}"
            ));
        }
        let damping = (self.config.base_damping + self.config.damping_gain * avg.max(0.0))
            .clamp(0.0, 1.0);

        for w in &warnings {
            warn!(damping, "{w}");
        }

        self.state = StabilityState {
            stable,
            log_lipschitz_avg: avg,
            last_ratio,
            damping_recommended: damping,
            warnings,
        };
        self.state.clone()
    }
}
