//! Activity catalog: the static registry of revenue-generating activities.
//!
//! Activities are configured once at startup and stored in a dense arena.
//! Every engine addresses an activity by its [`ActivityIdx`]; the string id is
//! only resolved once, through [`ActivityCatalog::index_of`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{ControlError, DomainResult};

/// Stable integer handle for an activity inside the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityIdx(pub usize);

impl ActivityIdx {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActivityIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Activity tier, from safest/most proven (`S`) to most speculative (`D`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::S, Tier::A, Tier::B, Tier::C, Tier::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Self::S),
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Immutable catalog entry describing one activity.
///
/// Only `active` (the operator flag) can change after startup, via
/// [`ActivityCatalog::set_active`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActivityProfile {
    /// Unique string identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Risk/maturity tier.
    pub tier: Tier,
    /// Capital committed per execution.
    #[serde(default)]
    pub capital_required: f64,
    /// Prior estimate of net return per execution.
    #[serde(default)]
    pub estimated_return: f64,
    /// Configured risk level in `[0, 1]`.
    #[serde(default)]
    pub risk_level: f64,
    /// Cycles to wait after an execution before the activity is eligible again.
    #[serde(default)]
    pub cooldown_cycles: u64,
    /// Operator activation flag.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Execution difficulty in `[0, 1]`, penalises pragmatic value.
    #[serde(default)]
    pub difficulty: f64,
    /// Competition / late-entry pressure in `[0, 1]`, adds to risk.
    #[serde(default)]
    pub competition: f64,
}

const fn default_true() -> bool {
    true
}

impl ActivityProfile {
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tier,
            capital_required: 0.0,
            estimated_return: 0.0,
            risk_level: 0.0,
            cooldown_cycles: 0,
            active: true,
            difficulty: 0.0,
            competition: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capital(mut self, capital_required: f64) -> Self {
        self.capital_required = capital_required;
        self
    }

    pub fn with_return(mut self, estimated_return: f64) -> Self {
        self.estimated_return = estimated_return;
        self
    }

    pub fn with_risk(mut self, risk_level: f64) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_cooldown(mut self, cooldown_cycles: u64) -> Self {
        self.cooldown_cycles = cooldown_cycles;
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_competition(mut self, competition: f64) -> Self {
        self.competition = competition;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Validate the descriptor's numeric ranges.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.trim().is_empty() {
            return Err(ControlError::Validation("activity id cannot be empty".into()));
        }
        let finite = [
            self.capital_required,
            self.estimated_return,
            self.risk_level,
            self.difficulty,
            self.competition,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(ControlError::Validation(format!(
                "activity '{}' has non-finite parameters",
                self.id
            )));
        }
        if self.capital_required < 0.0 {
            return Err(ControlError::Validation(format!(
                "activity '{}' capital_required must be >= 0",
                self.id
            )));
        }
        for (field, value) in [
            ("risk_level", self.risk_level),
            ("difficulty", self.difficulty),
            ("competition", self.competition),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ControlError::Validation(format!(
                    "activity '{}' {field} must be within [0, 1], got {value}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Arena of activity descriptors with a one-time id lookup table.
#[derive(Debug, Clone, Default)]
pub struct ActivityCatalog {
    profiles: Vec<ActivityProfile>,
    by_id: HashMap<String, ActivityIdx>,
}

impl ActivityCatalog {
    /// Build a catalog from descriptors, rejecting duplicates and invalid ranges.
    pub fn new(profiles: Vec<ActivityProfile>) -> DomainResult<Self> {
        let mut by_id = HashMap::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            profile.validate()?;
            if by_id.insert(profile.id.clone(), ActivityIdx(i)).is_some() {
                return Err(ControlError::Validation(format!(
                    "duplicate activity id: {}",
                    profile.id
                )));
            }
        }
        Ok(Self { profiles, by_id })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<ActivityIdx> {
        self.by_id.get(id).copied()
    }

    /// Resolve an id or fail with [`ControlError::UnknownActivity`].
    pub fn resolve(&self, id: &str) -> DomainResult<ActivityIdx> {
        self.index_of(id)
            .ok_or_else(|| ControlError::UnknownActivity(id.to_string()))
    }

    pub fn get(&self, idx: ActivityIdx) -> Option<&ActivityProfile> {
        self.profiles.get(idx.0)
    }

    /// Indexed access for indices produced by this catalog.
    pub fn profile(&self, idx: ActivityIdx) -> &ActivityProfile {
        &self.profiles[idx.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActivityIdx, &ActivityProfile)> {
        self.profiles
            .iter()
            .enumerate()
            .map(|(i, p)| (ActivityIdx(i), p))
    }

    pub fn indices(&self) -> impl Iterator<Item = ActivityIdx> {
        (0..self.profiles.len()).map(ActivityIdx)
    }

    /// Set the operator activation flag. Returns `true` if it changed.
    pub fn set_active(&mut self, idx: ActivityIdx, active: bool) -> bool {
        match self.profiles.get_mut(idx.0) {
            Some(profile) if profile.active != active => {
                profile.active = active;
                true
            }
            _ => false,
        }
    }

    pub fn profiles(&self) -> &[ActivityProfile] {
        &self.profiles
    }
}

/// A small default catalog spanning every tier, used when no activities are configured.
pub fn default_catalog() -> Vec<ActivityProfile> {
    vec![
        ActivityProfile::new("content-syndication", Tier::S)
            .with_name("Content syndication")
            .with_capital(10.0)
            .with_return(12.0)
            .with_risk(0.1),
        ActivityProfile::new("bounty-triage", Tier::A)
            .with_name("Open-source bounty triage")
            .with_capital(20.0)
            .with_return(25.0)
            .with_risk(0.2)
            .with_cooldown(1)
            .with_difficulty(0.3),
        ActivityProfile::new("compute-resale", Tier::B)
            .with_name("Compute marketplace resale")
            .with_capital(80.0)
            .with_return(60.0)
            .with_risk(0.45)
            .with_cooldown(2)
            .with_competition(0.4),
        ActivityProfile::new("outreach-campaign", Tier::C)
            .with_name("Email outreach campaign")
            .with_capital(40.0)
            .with_return(35.0)
            .with_risk(0.5)
            .with_cooldown(3)
            .with_difficulty(0.4),
        ActivityProfile::new("liquidity-provision", Tier::D)
            .with_name("On-chain liquidity provision")
            .with_capital(200.0)
            .with_return(150.0)
            .with_risk(0.8)
            .with_cooldown(4)
            .with_competition(0.6),
    ]
}
