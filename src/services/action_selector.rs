//! Expected-free-energy scoring and Boltzmann selection.
//!
//! For an activity with belief `(mu, n, u)` the terms are
//!
//! ```text
//! epistemic = 0.5 / (1 + n) + 0.5 * u / (1 + u)       u = sd(mean) / return_scale
//! pragmatic = 0.5 * tanh((mu - target * regime) / return_scale) + 0.5
//!             - 0.5 * difficulty
//! risk      = risk_level + competition_weight * competition
//! G         = -(w_e * epistemic + w_p * pragmatic - w_r * risk + w_x * bonus)
//! ```
//!
//! Lower `G` is better; the reported `score` is `-G` clipped to `[0, 1]`.
//! Selection samples without replacement with probability proportional to
//! `exp(-beta * (G - G_min))`.

use rand::Rng;

use crate::domain::models::{ActivityIdx, ActivityProfile, EfeScore, SelectionConfig};
use crate::services::belief_store::Belief;

/// Weight of the difficulty penalty inside the pragmatic term.
const DIFFICULTY_WEIGHT: f64 = 0.5;

/// An eligible activity together with its current belief.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub idx: ActivityIdx,
    pub profile: &'a ActivityProfile,
    pub belief: &'a Belief,
}

/// Score one activity under `belief`.
pub fn expected_free_energy(
    profile: &ActivityProfile,
    belief: &Belief,
    regime_factor: f64,
    config: &SelectionConfig,
    exploration_bonus: f64,
) -> EfeScore {
    let scale = config.return_scale.abs().max(f64::EPSILON);

    let uncertainty = belief.mean_uncertainty().max(0.0).sqrt() / scale;
    let epistemic_value =
        0.5 / (1.0 + belief.observations as f64) + 0.5 * uncertainty / (1.0 + uncertainty);

    let advantage = (belief.mean() - config.target_return * regime_factor) / scale;
    let pragmatic_value =
        0.5 * advantage.tanh() + 0.5 - DIFFICULTY_WEIGHT * profile.difficulty.clamp(0.0, 1.0);

    let risk_penalty = profile.risk_level + config.competition_weight * profile.competition;

    let g = -(config.w_epistemic * epistemic_value + config.w_pragmatic * pragmatic_value
        - config.w_risk * risk_penalty
        + config.w_exploration * exploration_bonus);

    EfeScore {
        activity_id: profile.id.clone(),
        epistemic_value,
        pragmatic_value,
        risk_penalty,
        exploration_bonus,
        g,
        score: (-g).clamp(0.0, 1.0),
    }
}

/// Draw indices from `g` without replacement, Boltzmann-weighted by `beta`.
///
/// Returns at most `k` positions into `g`, in the order they were drawn.
pub fn select_from_scores<R: Rng + ?Sized>(g: &[f64], beta: f64, k: usize, rng: &mut R) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..g.len()).filter(|&i| g[i].is_finite()).collect();
    let mut chosen = Vec::with_capacity(k.min(remaining.len()));
    let beta = beta.max(0.0);

    while chosen.len() < k && !remaining.is_empty() {
        let g_min = remaining
            .iter()
            .map(|&i| g[i])
            .fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> = remaining
            .iter()
            .map(|&i| (-beta * (g[i] - g_min)).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        let mut pick = remaining.len() - 1;
        if total.is_finite() && total > 0.0 {
            let mut draw = rng.gen::<f64>() * total;
            for (pos, w) in weights.iter().enumerate() {
                if draw < *w {
                    pick = pos;
                    break;
                }
                draw -= w;
            }
        }
        chosen.push(remaining.remove(pick));
    }
    chosen
}

/// Scores candidates and picks the activities to execute.
#[derive(Debug, Clone)]
pub struct ActionSelector {
    config: SelectionConfig,
    max_concurrent: usize,
}

impl ActionSelector {
    /// Select at most `max_concurrent` activities per cycle.
    pub fn new(config: SelectionConfig, max_concurrent: usize) -> Self {
        Self {
            config,
            max_concurrent,
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Upper bound on selections per cycle.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// One Bernoulli exploration draw per candidate.
    pub fn draw_bonuses<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        let rate = self.config.exploration_rate.clamp(0.0, 1.0);
        (0..n)
            .map(|_| if rng.gen_bool(rate) { 1.0 } else { 0.0 })
            .collect()
    }

    /// Score every candidate with the given bonuses.
    pub fn score(&self, candidates: &[Candidate<'_>], regime_factor: f64, bonuses: &[f64]) -> Vec<EfeScore> {
        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let bonus = bonuses.get(i).copied().unwrap_or(0.0);
                expected_free_energy(c.profile, c.belief, regime_factor, &self.config, bonus)
            })
            .collect()
    }

    /// Pick up to `max_concurrent` candidates from their combined `G`.
    pub fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[ActivityIdx],
        g: &[f64],
        beta: f64,
        rng: &mut R,
    ) -> Vec<ActivityIdx> {
        select_from_scores(g, beta, self.max_concurrent, rng)
            .into_iter()
            .map(|pos| candidates[pos])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BeliefConfig, Tier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(ret: f64, risk: f64) -> ActivityProfile {
        ActivityProfile::new("a", Tier::A).with_return(ret).with_risk(risk)
    }

    fn score(p: &ActivityProfile, bonus: f64) -> EfeScore {
        let belief = Belief::prior(p, &BeliefConfig::default());
        expected_free_energy(p, &belief, 1.0, &SelectionConfig::default(), bonus)
    }

    #[test]
    fn test_higher_return_lowers_g() {
        let good = score(&profile(80.0, 0.2), 0.0);
        let bad = score(&profile(-20.0, 0.2), 0.0);
        assert!(good.g < bad.g);
        assert!(good.score >= bad.score);
    }

    #[test]
    fn test_risk_raises_g() {
        let safe = score(&profile(30.0, 0.1), 0.0);
        let risky = score(&profile(30.0, 0.9), 0.0);
        assert!(risky.g > safe.g);
        assert!(risky.risk_penalty > safe.risk_penalty);
    }

    #[test]
    fn test_bonus_is_additive() {
        let p = profile(30.0, 0.3);
        let plain = score(&p, 0.0);
        let bonus = score(&p, 1.0);
        let w = SelectionConfig::default().w_exploration;
        assert!((plain.g - bonus.g - w).abs() < 1e-12);
    }

    #[test]
    fn test_epistemic_value_falls_with_observations() {
        let p = profile(30.0, 0.3);
        let mut belief = Belief::prior(&p, &BeliefConfig::default());
        let cfg = SelectionConfig::default();
        let fresh = expected_free_energy(&p, &belief, 1.0, &cfg, 0.0);
        for _ in 0..20 {
            belief.observe(30.0);
        }
        let seasoned = expected_free_energy(&p, &belief, 1.0, &cfg, 0.0);
        assert!(seasoned.epistemic_value < fresh.epistemic_value);
    }

    #[test]
    fn test_score_clipped() {
        let s = score(&profile(1e6, 0.0), 1.0);
        assert!((0.0..=1.0).contains(&s.score));
    }

    #[test]
    fn test_select_without_replacement() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks = select_from_scores(&[-0.5, -0.2, -0.1, 0.3], 1.0, 3, &mut rng);
        assert_eq!(picks.len(), 3);
        let mut sorted = picks.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }

    #[test]
    fn test_select_stops_when_candidates_run_out() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks = select_from_scores(&[0.1, 0.2], 1.0, 5, &mut rng);
        assert_eq!(picks.len(), 2);
        assert!(select_from_scores(&[], 1.0, 5, &mut rng).is_empty());
    }

    #[test]
    fn test_large_beta_is_greedy() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let picks = select_from_scores(&[0.2, -0.4, 0.0], 1e4, 1, &mut rng);
            assert_eq!(picks, vec![1]);
        }
    }

    #[test]
    fn test_small_beta_is_near_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let picks = select_from_scores(&[0.2, -0.4, 0.0], 1e-6, 1, &mut rng);
            counts[picks[0]] += 1;
        }
        for c in counts {
            assert!(c > 800 && c < 1200, "counts {counts:?}");
        }
    }
}
