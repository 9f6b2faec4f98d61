//! Registry of activity executors.
//!
//! Executors are registered once per activity at startup and looked up by
//! [`ActivityIdx`]. [`ExecutorRegistry::run`] normalises every way an
//! execution can go wrong into a single transient error, so the controller
//! only has to deal with "outcome" or "recorded failure".

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::domain::errors::ControlError;
use crate::domain::models::{ActivityIdx, ActivityProfile, Outcome};
use crate::domain::ports::ActivityExecutor;

/// Executors indexed by activity.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: Vec<Option<Arc<dyn ActivityExecutor>>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<usize> = self
            .executors
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| i))
            .collect();
        f.debug_struct("ExecutorRegistry")
            .field("slots", &self.executors.len())
            .field("registered", &registered)
            .finish()
    }
}

impl ExecutorRegistry {
    /// An empty registry with one slot per catalog activity.
    pub fn with_slots(len: usize) -> Self {
        Self {
            executors: vec![None; len],
        }
    }

    /// Register (or replace) the executor for `idx`.
    pub fn register(&mut self, idx: ActivityIdx, executor: Arc<dyn ActivityExecutor>) -> bool {
        match self.executors.get_mut(idx.0) {
            Some(slot) => {
                *slot = Some(executor);
                true
            }
            None => false,
        }
    }

    /// Register the same executor for every slot that has none yet.
    pub fn register_default(&mut self, executor: &Arc<dyn ActivityExecutor>) {
        for slot in &mut self.executors {
            if slot.is_none() {
                *slot = Some(Arc::clone(executor));
            }
        }
    }

    /// Executor registered for `idx`, if any.
    pub fn get(&self, idx: ActivityIdx) -> Option<&Arc<dyn ActivityExecutor>> {
        self.executors.get(idx.0).and_then(Option::as_ref)
    }

    pub fn is_registered(&self, idx: ActivityIdx) -> bool {
        self.get(idx).is_some()
    }

    /// Number of activities with an executor.
    pub fn registered_count(&self) -> usize {
        self.executors.iter().filter(|e| e.is_some()).count()
    }

    /// Execute `profile` once.
    ///
    /// A missing executor, an `Err`, an empty result, an invalid outcome and a
    /// panic all come back as [`ControlError::TransientExecution`].
    pub async fn run(&self, idx: ActivityIdx, profile: &ActivityProfile) -> Result<Outcome, ControlError> {
        let transient = |reason: String| ControlError::TransientExecution {
            activity: profile.id.clone(),
            reason,
        };

        let Some(executor) = self.get(idx) else {
            return Err(transient("no executor registered".to_string()));
        };

        let result = AssertUnwindSafe(executor.execute(profile)).catch_unwind().await;
        match result {
            Err(_) => Err(transient("executor panicked".to_string())),
            Ok(Err(e)) => Err(transient(format!("{e:#}"))),
            Ok(Ok(None)) => Err(transient("executor returned no outcome".to_string())),
            Ok(Ok(Some(outcome))) if !outcome.is_valid() => Err(transient(format!(
                "invalid outcome: revenue={}, cost={}",
                outcome.revenue, outcome.cost
            ))),
            Ok(Ok(Some(outcome))) => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Tier;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct Fixed(Option<Outcome>);

    #[async_trait]
    impl ActivityExecutor for Fixed {
        async fn execute(&self, _activity: &ActivityProfile) -> anyhow::Result<Option<Outcome>> {
            Ok(self.0)
        }
    }

    struct Failing;

    #[async_trait]
    impl ActivityExecutor for Failing {
        async fn execute(&self, _activity: &ActivityProfile) -> anyhow::Result<Option<Outcome>> {
            Err(anyhow!("upstream timeout"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ActivityExecutor for Panicking {
        async fn execute(&self, _activity: &ActivityProfile) -> anyhow::Result<Option<Outcome>> {
            panic!("boom")
        }
    }

    fn profile() -> ActivityProfile {
        ActivityProfile::new("x", Tier::S)
    }

    async fn run_with(exec: Arc<dyn ActivityExecutor>) -> Result<Outcome, ControlError> {
        let mut registry = ExecutorRegistry::with_slots(1);
        assert!(registry.register(ActivityIdx(0), exec));
        registry.run(ActivityIdx(0), &profile()).await
    }

    #[tokio::test]
    async fn test_successful_outcome() {
        let out = run_with(Arc::new(Fixed(Some(Outcome::new(10.0, 2.0))))).await.unwrap();
        assert_eq!(out, Outcome::new(10.0, 2.0));
    }

    #[tokio::test]
    async fn test_failures_are_transient() {
        let cases: Vec<Arc<dyn ActivityExecutor>> = vec![
            Arc::new(Fixed(None)),
            Arc::new(Fixed(Some(Outcome::new(-1.0, 0.0)))),
            Arc::new(Failing),
            Arc::new(Panicking),
        ];
        for exec in cases {
            let err = run_with(exec).await.unwrap_err();
            assert!(matches!(err, ControlError::TransientExecution { .. }), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_executor() {
        let mut registry = ExecutorRegistry::with_slots(2);
        let err = registry.run(ActivityIdx(1), &profile()).await.unwrap_err();
        assert_eq!(err.activity(), Some("x"));
        assert!(!registry.register(ActivityIdx(5), Arc::new(Failing)));
    }

    #[test]
    fn test_register_default_fills_gaps() {
        let mut registry = ExecutorRegistry::with_slots(3);
        registry.register(ActivityIdx(1), Arc::new(Failing));
        let fallback: Arc<dyn ActivityExecutor> = Arc::new(Fixed(None));
        registry.register_default(&fallback);
        assert_eq!(registry.registered_count(), 3);
    }
}
