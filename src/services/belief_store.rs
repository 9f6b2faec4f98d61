//! Per-activity Bayesian beliefs over realized return.
//!
//! Each activity carries a Normal-Inverse-Gamma posterior `NIG(mu, kappa,
//! alpha, beta)` over the mean and variance of its net return per execution.
//! Observations are folded in with the closed-form conjugate update, so the
//! final posterior depends only on the multiset of observations, not their
//! order.
//!
//! ## Update
//!
//! ```text
//! mu'    = (kappa * mu + x) / (kappa + 1)
//! kappa' = kappa + 1
//! alpha' = alpha + 1/2
//! beta'  = beta + kappa * (x - mu)^2 / (2 * (kappa + 1))
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::models::{ActivityCatalog, ActivityIdx, ActivityProfile, BeliefConfig};

/// Smallest prior standard deviation, so zero-return activities still have uncertainty.
const MIN_PRIOR_STD: f64 = 1.0;

// ---------------------------------------------------------------------------
// Belief
// ---------------------------------------------------------------------------

/// Normal-Inverse-Gamma posterior over one activity's return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// Posterior mean of the return.
    pub mu: f64,
    /// Pseudo-observation count behind `mu`.
    pub kappa: f64,
    /// Inverse-gamma shape.
    pub alpha: f64,
    /// Inverse-gamma scale.
    pub beta: f64,
    /// Real observations folded in so far.
    pub observations: u64,
}

/// Result of folding one observation into a belief.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeliefUpdate {
    /// `x - mu` against the pre-update posterior.
    pub prediction_error: f64,
    /// `1 / E[sigma^2]` of the pre-update posterior.
    pub precision: f64,
    /// `precision * prediction_error^2`.
    pub weighted_error: f64,
}

impl Belief {
    /// Build the prior for `profile`: centered on the catalog's estimated
    /// return with a spread proportional to its magnitude and risk.
    pub fn prior(profile: &ActivityProfile, config: &BeliefConfig) -> Self {
        let std = (config.prior_cv * profile.estimated_return.abs()).max(MIN_PRIOR_STD)
            * (1.0 + profile.risk_level);
        let alpha = config.prior_shape.max(1.0 + f64::EPSILON);
        Self {
            mu: profile.estimated_return,
            kappa: config.prior_strength.max(f64::EPSILON),
            alpha,
            beta: std * std * (alpha - 1.0),
            observations: 0,
        }
    }

    /// Posterior mean of the return.
    pub fn mean(&self) -> f64 {
        self.mu
    }

    /// Expected observation variance `E[sigma^2] = beta / (alpha - 1)`.
    pub fn variance(&self) -> f64 {
        self.beta / (self.alpha - 1.0)
    }

    /// Variance of the mean estimate itself, `E[sigma^2] / kappa`.
    pub fn mean_uncertainty(&self) -> f64 {
        self.variance() / self.kappa
    }

    /// Fold one observed return into the posterior.
    pub fn observe(&mut self, x: f64) -> BeliefUpdate {
        let prediction_error = x - self.mu;
        let precision = 1.0 / self.variance().max(f64::MIN_POSITIVE);

        let kappa_next = self.kappa + 1.0;
        self.beta += self.kappa * prediction_error * prediction_error / (2.0 * kappa_next);
        self.mu = (self.kappa * self.mu + x) / kappa_next;
        self.kappa = kappa_next;
        self.alpha += 0.5;
        self.observations += 1;

        BeliefUpdate {
            prediction_error,
            precision,
            weighted_error: precision * prediction_error * prediction_error,
        }
    }

    /// The posterior as it would look after observing its own mean: same
    /// `mu`, one more pseudo-observation, unchanged scale.
    pub fn hypothetical_after_mean(&self) -> Self {
        let mut next = self.clone();
        next.observe(self.mu);
        next
    }
}

// ---------------------------------------------------------------------------
// BeliefStore
// ---------------------------------------------------------------------------

/// Beliefs for every catalog activity, addressed by [`ActivityIdx`].
#[derive(Debug, Clone)]
pub struct BeliefStore {
    beliefs: Vec<Belief>,
}

impl BeliefStore {
    /// One prior per catalog activity.
    pub fn new(catalog: &ActivityCatalog, config: &BeliefConfig) -> Self {
        Self {
            beliefs: catalog
                .profiles()
                .iter()
                .map(|p| Belief::prior(p, config))
                .collect(),
        }
    }

    /// Belief for `idx`. Panics on an index outside the catalog.
    pub fn get(&self, idx: ActivityIdx) -> &Belief {
        &self.beliefs[idx.0]
    }

    /// Observe a return for `idx`.
    pub fn observe(&mut self, idx: ActivityIdx, x: f64) -> BeliefUpdate {
        self.beliefs[idx.0].observe(x)
    }

    /// Posterior mean return of every activity, in catalog order.
    pub fn means(&self) -> Vec<f64> {
        self.beliefs.iter().map(Belief::mean).collect()
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Tier;

    fn profile() -> ActivityProfile {
        ActivityProfile::new("x", Tier::A)
            .with_return(20.0)
            .with_risk(0.2)
    }

    #[test]
    fn test_prior_is_centered_on_estimate() {
        let belief = Belief::prior(&profile(), &BeliefConfig::default());
        assert!((belief.mean() - 20.0).abs() < 1e-12);
        assert_eq!(belief.observations, 0);
        // std = 0.5 * 20 * 1.2 = 12
        assert!((belief.variance() - 144.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_moves_toward_samples() {
        let mut belief = Belief::prior(&profile(), &BeliefConfig::default());
        for _ in 0..50 {
            belief.observe(50.0);
        }
        assert!((belief.mean() - 50.0).abs() < 1.0);
        assert_eq!(belief.observations, 50);
    }

    #[test]
    fn test_uncertainty_shrinks_with_observations() {
        let mut belief = Belief::prior(&profile(), &BeliefConfig::default());
        let before = belief.mean_uncertainty();
        for _ in 0..10 {
            belief.observe(20.0);
        }
        assert!(belief.mean_uncertainty() < before);
    }

    #[test]
    fn test_order_independence() {
        let samples = [3.0, -7.5, 42.0, 18.0, 18.0, 0.0, 110.0, -20.0];
        let mut forward = Belief::prior(&profile(), &BeliefConfig::default());
        let mut backward = forward.clone();
        for x in samples {
            forward.observe(x);
        }
        for x in samples.iter().rev() {
            backward.observe(*x);
        }
        assert!((forward.mean() - backward.mean()).abs() < 1e-9);
        assert!((forward.variance() - backward.variance()).abs() < 1e-6);
        assert_eq!(forward.observations, backward.observations);
    }

    #[test]
    fn test_prediction_error_uses_prior_posterior() {
        let mut belief = Belief::prior(&profile(), &BeliefConfig::default());
        let update = belief.observe(32.0);
        assert!((update.prediction_error - 12.0).abs() < 1e-12);
        assert!((update.weighted_error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hypothetical_keeps_mean() {
        let belief = Belief::prior(&profile(), &BeliefConfig::default());
        let next = belief.hypothetical_after_mean();
        assert!((next.mean() - belief.mean()).abs() < 1e-12);
        assert!(next.mean_uncertainty() < belief.mean_uncertainty());
    }
}
