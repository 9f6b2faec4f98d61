//! The control loop and its public API.
//!
//! [`Controller`] is a cheap, cloneable handle. All engine state sits behind
//! one async mutex and is only touched from inside [`Controller::cycle`];
//! readers go through a snapshot that is rebuilt at the end of every cycle,
//! so [`Controller::get_state`] never observes a half-finished cycle and
//! never mutates anything.
//!
//! A second `cycle()` call while one is in flight fails fast with
//! [`ControlError::CycleInProgress`] instead of queueing behind the mutex.

mod cycle;
mod phase;

pub use cycle::{deployable_budget, CycleEngine};
pub use phase::{phase_index, PhaseChange, PhaseTracker};

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{error, info, info_span, warn, Instrument};

use crate::domain::errors::{ControlError, DomainResult, RecordedError};
use crate::domain::models::{Config, ControllerState, CycleResult, CycleSummary};
use crate::domain::ports::{ActivityExecutor, EnvironmentProbe, EnvironmentSignals, StateStore};

/// Handle to the homeostat control loop.
#[derive(Clone)]
pub struct Controller {
    config: Arc<Config>,
    engine: Arc<Mutex<CycleEngine>>,
    snapshot: Arc<RwLock<ControllerState>>,
    store: Option<Arc<dyn StateStore>>,
    environment: Option<Arc<dyn EnvironmentProbe>>,
    in_cycle: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("has_store", &self.store.is_some())
            .field("has_environment", &self.environment.is_some())
            .field("in_cycle", &self.in_cycle.load(Ordering::Relaxed))
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Clears the in-cycle flag however the cycle ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Controller {
    /// Build a controller from configuration. Fails on an invalid catalog.
    pub fn new(config: Config) -> DomainResult<Self> {
        let engine = CycleEngine::new(config.clone())?;
        let snapshot = engine.snapshot(false);
        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(Mutex::new(engine)),
            snapshot: Arc::new(RwLock::new(snapshot)),
            store: None,
            environment: None,
            in_cycle: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
        })
    }

    /// Persist state through `store` at the end of every cycle.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sample emergency, live-mode and novelty/fatigue signals from `environment`.
    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentProbe>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// The configuration this controller was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register the executor for activity `id`.
    pub async fn register_executor(
        &self,
        id: &str,
        executor: Arc<dyn ActivityExecutor>,
    ) -> DomainResult<()> {
        let mut engine = self.engine.lock().await;
        let idx = engine.catalog().resolve(id)?;
        engine.executors.register(idx, executor);
        Ok(())
    }

    /// Register `executor` for every activity that has none yet.
    pub async fn register_default_executor(&self, executor: Arc<dyn ActivityExecutor>) {
        self.engine.lock().await.executors.register_default(&executor);
    }

    /// Load persisted state, if a store is configured. A missing or corrupt
    /// store yields defaults; load errors are logged and ignored.
    pub async fn initialize(&self) -> DomainResult<()> {
        let mut engine = self.engine.lock().await;
        if let Some(store) = &self.store {
            match store.load().await {
                Ok(state) => engine.restore(state),
                Err(err) => warn!(error = %err, "failed to load persisted state, starting fresh"),
            }
        }
        let snapshot = engine.snapshot(self.is_running());
        *self.snapshot.write().await = snapshot;
        info!(
            activities = engine.catalog().len(),
            cycle_count = engine.cycle_count(),
            "controller initialized"
        );
        Ok(())
    }

    /// Run exactly one cycle.
    ///
    /// Returns [`ControlError::CycleInProgress`] if another cycle is running.
    /// Any panic inside the cycle body is contained and recorded on the result.
    pub async fn cycle(&self) -> DomainResult<CycleResult> {
        if self
            .in_cycle
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControlError::CycleInProgress);
        }
        let _guard = CycleGuard(&self.in_cycle);

        let signals = match &self.environment {
            Some(env) => env.sample().await,
            None => EnvironmentSignals::default(),
        };

        let mut engine = self.engine.lock().await;
        let span = info_span!("cycle", cycle = engine.cycle_count() + 1);
        let store = self.store.as_deref();
        let outcome = AssertUnwindSafe(engine.run_cycle(signals, store).instrument(span))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(cycle = engine.cycle_count(), %message, "cycle body panicked");
                let mut result = CycleResult::empty(engine.cycle_count());
                result
                    .errors
                    .push(RecordedError::from(ControlError::CyclePanicked(message)));
                result
            }
        };

        let mut snapshot = engine.snapshot(self.is_running());
        snapshot.last_result = Some(CycleSummary::from(&result));
        *self.snapshot.write().await = snapshot;
        drop(engine);

        info!(
            cycle = result.cycle,
            skipped = result.skipped,
            selected = result.selected.len(),
            revenue = result.revenue,
            cost = result.cost,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "cycle completed"
        );
        Ok(result)
    }

    /// Run cycles every `interval` until [`Controller::stop`] is called.
    ///
    /// Stopping takes effect between cycles: an in-flight cycle always
    /// completes. Returns immediately if the loop is already running. A
    /// `stop()` issued while no loop is running has no effect on later starts.
    pub async fn start(&self, interval: Duration) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("control loop already running");
            return;
        }
        self.snapshot.write().await.running = true;
        info!(interval_ms = interval.as_millis() as u64, "control loop started");

        loop {
            // Registered before the flag check so a stop() in between still wakes the sleep.
            let stopped = self.stop_signal.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            if !self.is_running() {
                break;
            }
            match self.cycle().await {
                Ok(_) => {}
                Err(err) => warn!(error = %err, "cycle did not run"),
            }
            if !self.is_running() {
                break;
            }
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = &mut stopped => {}
            }
        }

        self.snapshot.write().await.running = false;
        info!("control loop stopped");
    }

    /// Ask the loop to stop after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.stop_signal.notify_waiters();
    }

    /// Whether the periodic loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Set the operator activation flag of one activity.
    pub async fn set_activity_active(&self, id: &str, active: bool) -> DomainResult<()> {
        let mut engine = self.engine.lock().await;
        if engine.set_activity_active(id, active)? {
            *self.snapshot.write().await = engine.snapshot(self.is_running());
        }
        Ok(())
    }

    /// The latest snapshot. Reading never changes controller state.
    pub async fn get_state(&self) -> ControllerState {
        self.snapshot.read().await.clone()
    }

    /// Whether the loop currently sits at its revenue/cost steady state.
    pub async fn is_at_ness(&self) -> bool {
        self.snapshot.read().await.convergence.at_steady_state
    }

    /// Extrapolated monthly revenue as of the last completed cycle.
    pub async fn estimate_monthly_revenue(&self) -> f64 {
        self.snapshot.read().await.monthly_revenue_estimate
    }
}
