//! Common test utilities for integration tests
//!
//! Provides scripted executors, config builders and logging setup shared
//! across the integration test files.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use homeostat::domain::models::{ActivityProfile, Config, Outcome, PhaseConfig, Tier};
use homeostat::domain::ports::ActivityExecutor;

/// Setup test logging
///
/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Returns the same outcome on every call.
pub struct FixedExecutor {
    outcome: Outcome,
    calls: AtomicUsize,
}

impl FixedExecutor {
    pub fn new(revenue: f64, cost: f64) -> Self {
        Self {
            outcome: Outcome::new(revenue, cost),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityExecutor for FixedExecutor {
    async fn execute(&self, _activity: &ActivityProfile) -> Result<Option<Outcome>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.outcome))
    }
}

/// Hands out scripted outcomes in call order, then `Outcome(0, 0)` forever.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Outcome>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ActivityExecutor for ScriptedExecutor {
    async fn execute(&self, _activity: &ActivityProfile) -> Result<Option<Outcome>> {
        let next = self.script.lock().unwrap().pop_front();
        Ok(Some(next.unwrap_or_default()))
    }
}

/// Always fails.
pub struct FailingExecutor;

#[async_trait]
impl ActivityExecutor for FailingExecutor {
    async fn execute(&self, _activity: &ActivityProfile) -> Result<Option<Outcome>> {
        Err(anyhow!("upstream unavailable"))
    }
}

/// Always panics.
pub struct PanickingExecutor;

#[async_trait]
impl ActivityExecutor for PanickingExecutor {
    async fn execute(&self, _activity: &ActivityProfile) -> Result<Option<Outcome>> {
        panic!("executor bug")
    }
}

/// Sleeps before returning a small positive outcome.
pub struct SlowExecutor(pub Duration);

#[async_trait]
impl ActivityExecutor for SlowExecutor {
    async fn execute(&self, _activity: &ActivityProfile) -> Result<Option<Outcome>> {
        tokio::time::sleep(self.0).await;
        Ok(Some(Outcome::new(1.0, 0.5)))
    }
}

/// A seeded config with one phase that unlocks every tier.
pub fn test_config(activities: Vec<ActivityProfile>) -> Config {
    Config {
        seed: Some(42),
        activities,
        phases: vec![PhaseConfig::new("all", 0.0, Tier::ALL.to_vec())],
        ..Config::default()
    }
}

/// One S-tier activity with the given estimated return.
pub fn single_activity(estimated_return: f64) -> ActivityProfile {
    ActivityProfile::new("solo", Tier::S)
        .with_return(estimated_return)
        .with_risk(0.1)
}
