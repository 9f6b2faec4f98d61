//! Simulated executor for paper trading.

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::{Mutex, PoisonError};

use crate::domain::models::{ActivityProfile, Outcome};
use crate::domain::ports::ActivityExecutor;

/// How a simulated activity behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationProfile {
    /// Standard deviation of the net return, relative to `|estimated_return|` (min 1).
    pub noise: f64,
    /// Probability that an execution produces no outcome.
    pub failure_rate: f64,
    /// Multiplier on the catalog's estimated return.
    pub return_bias: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            noise: 0.2,
            failure_rate: 0.0,
            return_bias: 1.0,
        }
    }
}

impl SimulationProfile {
    pub fn deterministic() -> Self {
        Self {
            noise: 0.0,
            ..Self::default()
        }
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_return_bias(mut self, return_bias: f64) -> Self {
        self.return_bias = return_bias;
        self
    }
}

/// Draws outcomes around each activity's estimated return.
///
/// The execution costs `capital_required`; revenue is that cost plus a
/// normally distributed net return, floored at zero.
#[derive(Debug)]
pub struct SimulatedExecutor {
    rng: Mutex<StdRng>,
    default_profile: SimulationProfile,
    overrides: HashMap<String, SimulationProfile>,
}

impl SimulatedExecutor {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            rng: Mutex::new(rng),
            default_profile: SimulationProfile::default(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_default_profile(mut self, profile: SimulationProfile) -> Self {
        self.default_profile = profile;
        self
    }

    /// Override the behaviour of one activity.
    pub fn with_profile(mut self, activity_id: impl Into<String>, profile: SimulationProfile) -> Self {
        self.overrides.insert(activity_id.into(), profile);
        self
    }

    fn profile_for(&self, activity_id: &str) -> SimulationProfile {
        self.overrides
            .get(activity_id)
            .copied()
            .unwrap_or(self.default_profile)
    }

    /// Sample one outcome; `None` models a soft failure.
    pub fn sample(&self, activity: &ActivityProfile) -> Option<Outcome> {
        let sim = self.profile_for(&activity.id);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        if sim.failure_rate > 0.0 && rng.gen_bool(sim.failure_rate) {
            return None;
        }

        let mean = activity.estimated_return * sim.return_bias;
        let sd = sim.noise * activity.estimated_return.abs().max(1.0);
        let net = mean + sd * standard_normal(&mut *rng);
        let cost = activity.capital_required.max(0.0);
        let revenue = (cost + net).max(0.0);
        Some(Outcome::new(revenue, cost))
    }
}

/// Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

#[async_trait]
impl ActivityExecutor for SimulatedExecutor {
    async fn execute(&self, activity: &ActivityProfile) -> Result<Option<Outcome>> {
        Ok(self.sample(activity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Tier;

    fn activity() -> ActivityProfile {
        ActivityProfile::new("sim", Tier::S)
            .with_capital(10.0)
            .with_return(5.0)
    }

    #[tokio::test]
    async fn test_deterministic_profile_returns_estimate() {
        let exec =
            SimulatedExecutor::new(Some(1)).with_default_profile(SimulationProfile::deterministic());
        let outcome = exec.execute(&activity()).await.unwrap().unwrap();
        assert!((outcome.revenue - 15.0).abs() < 1e-12);
        assert!((outcome.cost - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let a = SimulatedExecutor::new(Some(7));
        let b = SimulatedExecutor::new(Some(7));
        for _ in 0..20 {
            assert_eq!(a.sample(&activity()), b.sample(&activity()));
        }
    }

    #[test]
    fn test_outcomes_are_valid_and_centered() {
        let exec = SimulatedExecutor::new(Some(3));
        let n = 2_000_u32;
        let mut net = 0.0;
        for _ in 0..n {
            let o = exec.sample(&activity()).unwrap();
            assert!(o.is_valid());
            net += o.net();
        }
        let mean = net / f64::from(n);
        assert!((mean - 5.0).abs() < 0.5, "mean net {mean}");
    }

    #[test]
    fn test_failure_override() {
        let exec = SimulatedExecutor::new(Some(5))
            .with_profile("sim", SimulationProfile::deterministic().with_failure_rate(1.0));
        assert!(exec.sample(&activity()).is_none());
        let other = ActivityProfile::new("other", Tier::A).with_return(2.0);
        assert!(exec.sample(&other).is_some());
    }
}
