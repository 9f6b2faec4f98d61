//! Bootstrap phases and tier unlocking.
//!
//! The phase index is recomputed from scratch on every check: it is the
//! highest phase whose revenue threshold does not exceed the current monthly
//! revenue estimate. A dip in revenue therefore re-locks tiers that an earlier
//! cycle unlocked.

use crate::domain::models::{PhaseConfig, Tier};

/// Result of one phase evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    Unchanged,
    Advanced { from: usize, to: usize },
    Relocked { from: usize, to: usize },
}

/// Highest index `i` with `phases[i].revenue_threshold <= revenue`, or 0.
pub fn phase_index(phases: &[PhaseConfig], revenue: f64) -> usize {
    phases
        .iter()
        .rposition(|p| p.revenue_threshold <= revenue)
        .unwrap_or(0)
}

/// Current revenue phase and the tiers it unlocks.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phases: Vec<PhaseConfig>,
    current: usize,
}

impl PhaseTracker {
    pub fn new(phases: Vec<PhaseConfig>) -> Self {
        let current = phase_index(&phases, 0.0);
        Self { phases, current }
    }

    /// Index of the current phase.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn name(&self) -> &str {
        self.phases
            .get(self.current)
            .map_or("unphased", |p| p.name.as_str())
    }

    /// Tiers unlocked by the current phase and every phase below it.
    ///
    /// Without any configured phases every tier is unlocked.
    pub fn unlocked_tiers(&self) -> Vec<Tier> {
        if self.phases.is_empty() {
            return Tier::ALL.to_vec();
        }
        Tier::ALL
            .into_iter()
            .filter(|t| self.is_unlocked(*t))
            .collect()
    }

    /// Whether `tier` may run in the current phase.
    pub fn is_unlocked(&self, tier: Tier) -> bool {
        self.phases.is_empty()
            || self
                .phases
                .iter()
                .take(self.current + 1)
                .any(|p| p.tiers.contains(&tier))
    }

    /// Recompute the phase from the monthly revenue estimate.
    pub fn evaluate(&mut self, monthly_revenue: f64) -> PhaseChange {
        let next = phase_index(&self.phases, monthly_revenue);
        let from = self.current;
        self.current = next;
        match next.cmp(&from) {
            std::cmp::Ordering::Greater => PhaseChange::Advanced { from, to: next },
            std::cmp::Ordering::Less => PhaseChange::Relocked { from, to: next },
            std::cmp::Ordering::Equal => PhaseChange::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases() -> Vec<PhaseConfig> {
        vec![
            PhaseConfig::new("bootstrap", 0.0, vec![Tier::S, Tier::A]),
            PhaseConfig::new("growth", 1_000.0, vec![Tier::B]),
            PhaseConfig::new("scale", 10_000.0, vec![Tier::C, Tier::D]),
        ]
    }

    #[test]
    fn test_index_tracks_revenue_without_stickiness() {
        let mut tracker = PhaseTracker::new(phases());
        let revenue = [0.0, 500.0, 1_000.0, 1_500.0, 20_000.0, 900.0, 12_000.0, 9_999.0];
        let expected = [0, 0, 1, 1, 2, 0, 2, 1];
        for (r, want) in revenue.into_iter().zip(expected) {
            tracker.evaluate(r);
            assert_eq!(tracker.current(), want, "revenue {r}");
            assert_eq!(tracker.current(), phase_index(&phases(), r));
        }
    }

    #[test]
    fn test_change_classification() {
        let mut tracker = PhaseTracker::new(phases());
        assert_eq!(tracker.evaluate(100.0), PhaseChange::Unchanged);
        assert_eq!(
            tracker.evaluate(50_000.0),
            PhaseChange::Advanced { from: 0, to: 2 }
        );
        assert_eq!(
            tracker.evaluate(10.0),
            PhaseChange::Relocked { from: 2, to: 0 }
        );
    }

    #[test]
    fn test_unlocked_tiers_accumulate() {
        let mut tracker = PhaseTracker::new(phases());
        assert_eq!(tracker.unlocked_tiers(), vec![Tier::S, Tier::A]);
        tracker.evaluate(1_200.0);
        assert_eq!(tracker.unlocked_tiers(), vec![Tier::S, Tier::A, Tier::B]);
        assert!(!tracker.is_unlocked(Tier::D));
        tracker.evaluate(10_000.0);
        assert_eq!(tracker.unlocked_tiers().len(), 5);
        assert_eq!(tracker.name(), "scale");
    }

    #[test]
    fn test_negative_revenue_stays_in_first_phase() {
        assert_eq!(phase_index(&phases(), -50.0), 0);
    }

    #[test]
    fn test_no_phases_unlocks_everything() {
        let tracker = PhaseTracker::new(Vec::new());
        assert_eq!(tracker.unlocked_tiers().len(), 5);
        assert_eq!(tracker.name(), "unphased");
    }
}
