//! Variational risk step and drawdown circuit breaker.
//!
//! The breaker is level-triggered: it is open exactly while the drawdown from
//! peak balance exceeds `max_drawdown`, and closes on its own on the first
//! step where the drawdown is back under the limit. While open, activities in
//! a risky tier with a risk level above `risk_threshold` are suppressed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::models::{ActivityProfile, RiskConfig, RiskState};

/// State of the drawdown breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Risky activities run normally.
    Closed,
    /// Risky activities are suppressed.
    Open,
}

impl BreakerState {
    /// Lowercase name used in logs and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}

/// Change of breaker state produced by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    Unchanged,
    /// Closed to open.
    Tripped,
    /// Open to closed.
    Cleared,
}

/// Precision-weighted prediction error of one activity this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Surprise {
    pub activity_id: String,
    /// `precision * (x - mean)^2`.
    pub weighted_error: f64,
}

/// Drawdown tracking with a circuit breaker over risky tiers.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    peak_balance: f64,
    current_balance: f64,
    breaker: BreakerState,
    /// When the breaker last opened.
    opened_at: Option<DateTime<Utc>>,
    /// Total times the breaker opened.
    trip_count: u32,
    state: RiskState,
}

impl RiskEngine {
    /// Closed breaker with the peak at `initial_balance`.
    pub fn new(config: RiskConfig, initial_balance: f64) -> Self {
        let balance = initial_balance.max(0.0);
        Self {
            config,
            peak_balance: balance,
            current_balance: balance,
            breaker: BreakerState::Closed,
            opened_at: None,
            trip_count: 0,
            state: RiskState {
                peak_balance: balance,
                current_balance: balance,
                ..Default::default()
            },
        }
    }

    /// State as of the last step.
    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Current breaker position.
    pub fn breaker(&self) -> BreakerState {
        self.breaker
    }

    /// Whether the breaker is open.
    pub fn is_broken(&self) -> bool {
        self.breaker == BreakerState::Open
    }

    /// Times the breaker has opened.
    pub fn trip_count(&self) -> u32 {
        self.trip_count
    }

    /// When the breaker last opened.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// `(peak - current) / peak`, 0 when there is no positive peak.
    pub fn drawdown(&self) -> f64 {
        if self.peak_balance <= 0.0 {
            return 0.0;
        }
        ((self.peak_balance - self.current_balance) / self.peak_balance).clamp(0.0, 1.0)
    }

    /// Whether the open breaker suppresses `profile`.
    pub fn suppresses(&self, profile: &ActivityProfile) -> bool {
        self.is_broken()
            && self.config.risky_tiers.contains(&profile.tier)
            && profile.risk_level > self.config.risk_threshold
    }

    /// Fold in the latest balance and this cycle's surprises.
    pub fn step(&mut self, balance: f64, surprises: &[Surprise]) -> BreakerTransition {
        if balance.is_finite() {
            self.current_balance = balance;
            if balance > self.peak_balance {
                self.peak_balance = balance;
            }
        }
        let drawdown = self.drawdown();
        let mut warnings = Vec::new();

        let transition = match (self.breaker, drawdown > self.config.max_drawdown) {
            (BreakerState::Closed, true) => {
                self.breaker = BreakerState::Open;
                self.opened_at = Some(Utc::now());
                self.trip_count += 1;
                warn!(
                    drawdown,
                    max_drawdown = self.config.max_drawdown,
                    trips = self.trip_count,
                    "circuit breaker tripped"
                );
                BreakerTransition::Tripped
            }
            (BreakerState::Open, false) => {
                self.breaker = BreakerState::Closed;
                self.opened_at = None;
                info!(drawdown, "circuit breaker cleared");
                BreakerTransition::Cleared
            }
            _ => BreakerTransition::Unchanged,
        };

        if self.is_broken() {
            warnings.push(format!(
                "drawdown {:.1}% exceeds limit {:.1}%; risky activities suspended",
                drawdown * 100.0,
                self.config.max_drawdown * 100.0
            ));
        } else if drawdown > 0.5 * self.config.max_drawdown {
            warnings.push(format!(
                "drawdown {:.1}% past half of limit {:.1}%",
                drawdown * 100.0,
                self.config.max_drawdown * 100.0
            ));
        }

        for s in surprises {
            if s.weighted_error > self.config.surprise_threshold {
                warnings.push(format!(
                    "activity '{}' surprised the model: weighted error {:.2}",
                    s.activity_id, s.weighted_error
                ));
            }
        }

        let prediction_error = if surprises.is_empty() {
            0.0
        } else {
            surprises.iter().map(|s| s.weighted_error).sum::<f64>() / surprises.len() as f64
        };

        self.state = RiskState {
            drawdown,
            circuit_broken: self.is_broken(),
            peak_balance: self.peak_balance,
            current_balance: self.current_balance,
            prediction_error,
            warnings,
        };
        transition
    }
}
