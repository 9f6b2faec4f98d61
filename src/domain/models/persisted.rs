//! Minimal persisted state. Every field is a recomputable estimate, not a
//! ledger of record, so losing the last write costs at most one cycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::cycle::Outcome;

/// Totals for the current UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub executions: u64,
    pub failures: u64,
}

impl TodayStats {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            revenue: 0.0,
            cost: 0.0,
            executions: 0,
            failures: 0,
        }
    }

    /// Reset the totals when `now` falls on a later day. Returns `true` on rollover.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today != self.date {
            *self = Self::for_date(today);
            true
        } else {
            false
        }
    }

    pub fn record(&mut self, outcome: Option<Outcome>) {
        self.executions += 1;
        match outcome {
            Some(o) => {
                self.revenue += o.revenue;
                self.cost += o.cost;
            }
            None => self.failures += 1,
        }
    }
}

impl Default for TodayStats {
    fn default() -> Self {
        Self::for_date(Utc::now().date_naive())
    }
}

/// An observed outcome not yet folded into the beliefs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFeedback {
    pub activity_id: String,
    pub cycle: u64,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

/// State written at the end of every cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub today_stats: TodayStats,
    #[serde(default)]
    pub pending_feedback: Vec<PendingFeedback>,
    #[serde(default)]
    pub cycle_count: u64,
    #[serde(default, rename = "lastCycleTimeISO8601")]
    pub last_cycle_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_stats_rollover() {
        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap();
        let mut stats = TodayStats::for_date(day1.date_naive());
        stats.record(Some(Outcome::new(10.0, 4.0)));
        stats.record(None);
        assert_eq!(stats.executions, 2);
        assert_eq!(stats.failures, 1);

        assert!(!stats.roll_over(day1));
        assert!(stats.roll_over(day2));
        assert_eq!(stats.executions, 0);
        assert_eq!(stats.date, day2.date_naive());
    }

    #[test]
    fn test_persisted_keys() {
        let state = PersistedState {
            cycle_count: 7,
            ..Default::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["cycleCount"], 7);
        assert!(json.get("todayStats").is_some());
        assert!(json.get("pendingFeedback").is_some());
        assert!(json.get("lastCycleTimeISO8601").is_some());
    }

    #[test]
    fn test_missing_fields_default() {
        let state: PersistedState = serde_json::from_str("{\"cycleCount\": 3}").unwrap();
        assert_eq!(state.cycle_count, 3);
        assert!(state.pending_feedback.is_empty());
        assert!(state.last_cycle_time.is_none());
    }
}
