//! One-step lookahead ranking.
//!
//! Each candidate is scored twice: under its current belief, and under the
//! belief it would hold after observing its own mean. The second score stands
//! in for the value of the activity one cycle from now, so candidates whose
//! appeal is mostly novelty lose some ground to ones that stay attractive.

use std::cmp::Ordering;

use crate::domain::models::{ActivityIdx, EfeScore, SelectionConfig};
use crate::services::action_selector::{expected_free_energy, Candidate};

/// A candidate with its immediate and lookahead free energy.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub idx: ActivityIdx,
    /// Free energy of acting now.
    pub immediate: EfeScore,
    /// Free energy after one simulated update.
    pub lookahead_g: f64,
    /// `G_now + gamma * G_next`; lower is better.
    pub combined_g: f64,
}

/// Rank candidates by combined `G`, best first.
///
/// `bonuses[i]` is the exploration draw for `candidates[i]`; the same draw is
/// used for both horizons.
pub fn rank_with_lookahead(
    candidates: &[Candidate<'_>],
    regime_factor: f64,
    config: &SelectionConfig,
    bonuses: &[f64],
) -> Vec<RankedCandidate> {
    let gamma = config.lookahead_gamma.max(0.0);
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let bonus = bonuses.get(i).copied().unwrap_or(0.0);
            let immediate = expected_free_energy(c.profile, c.belief, regime_factor, config, bonus);
            let next_belief = c.belief.hypothetical_after_mean();
            let lookahead =
                expected_free_energy(c.profile, &next_belief, regime_factor, config, bonus);
            RankedCandidate {
                idx: c.idx,
                combined_g: immediate.g + gamma * lookahead.g,
                lookahead_g: lookahead.g,
                immediate,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.combined_g
            .partial_cmp(&b.combined_g)
            .unwrap_or(Ordering::Equal)
            .then(a.idx.cmp(&b.idx))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActivityProfile, BeliefConfig, Tier};
    use crate::services::belief_store::Belief;

    #[test]
    fn test_ranking_prefers_better_return() {
        let strong = ActivityProfile::new("strong", Tier::A).with_return(80.0).with_risk(0.1);
        let weak = ActivityProfile::new("weak", Tier::A).with_return(-10.0).with_risk(0.1);
        let cfg = BeliefConfig::default();
        let b_strong = Belief::prior(&strong, &cfg);
        let b_weak = Belief::prior(&weak, &cfg);
        let candidates = [
            Candidate {
                idx: ActivityIdx(0),
                profile: &weak,
                belief: &b_weak,
            },
            Candidate {
                idx: ActivityIdx(1),
                profile: &strong,
                belief: &b_strong,
            },
        ];
        let ranked = rank_with_lookahead(&candidates, 1.0, &SelectionConfig::default(), &[0.0, 0.0]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].idx, ActivityIdx(1));
        assert!(ranked[0].combined_g <= ranked[1].combined_g);
    }

    #[test]
    fn test_combined_is_discounted_sum() {
        let p = ActivityProfile::new("p", Tier::S).with_return(25.0);
        let belief = Belief::prior(&p, &BeliefConfig::default());
        let config = SelectionConfig::default();
        let ranked = rank_with_lookahead(
            &[Candidate {
                idx: ActivityIdx(0),
                profile: &p,
                belief: &belief,
            }],
            1.0,
            &config,
            &[0.0],
        );
        let r = &ranked[0];
        let expected = r.immediate.g + config.lookahead_gamma * r.lookahead_g;
        assert!((r.combined_g - expected).abs() < 1e-12);
        // Observing its own mean only removes epistemic value.
        assert!(r.lookahead_g >= r.immediate.g);
    }
}
