//! Settable environment probe.

use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

use crate::domain::ports::{EnvironmentProbe, EnvironmentSignals};

/// An [`EnvironmentProbe`] whose signals are set by hand, e.g. by an
/// operator command or a test.
#[derive(Debug, Default)]
pub struct ManualEnvironment {
    signals: RwLock<EnvironmentSignals>,
}

impl ManualEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signals(signals: EnvironmentSignals) -> Self {
        Self {
            signals: RwLock::new(signals),
        }
    }

    fn update(&self, f: impl FnOnce(&mut EnvironmentSignals)) {
        let mut signals = self.signals.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut signals);
    }

    pub fn set_emergency(&self, emergency: bool) {
        self.update(|s| s.emergency = emergency);
    }

    pub fn set_live_prerequisites(&self, met: bool) {
        self.update(|s| s.live_prerequisites_met = met);
    }

    /// Novelty in `[0, 1]`; `None` clears the signal.
    pub fn set_novelty(&self, novelty: Option<f64>) {
        self.update(|s| s.novelty = novelty.map(|n| n.clamp(0.0, 1.0)));
    }

    /// Fatigue in `[0, 1]`; `None` clears the signal.
    pub fn set_fatigue(&self, fatigue: Option<f64>) {
        self.update(|s| s.fatigue = fatigue.map(|f| f.clamp(0.0, 1.0)));
    }

    pub fn current(&self) -> EnvironmentSignals {
        *self.signals.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EnvironmentProbe for ManualEnvironment {
    async fn sample(&self) -> EnvironmentSignals {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_calm() {
        let env = ManualEnvironment::new();
        let signals = env.sample().await;
        assert!(!signals.emergency);
        assert!(signals.live_prerequisites_met);
        assert!(signals.novelty.is_none());
    }

    #[tokio::test]
    async fn test_setters_are_visible_to_sample() {
        let env = ManualEnvironment::new();
        env.set_emergency(true);
        env.set_live_prerequisites(false);
        env.set_novelty(Some(1.7));
        env.set_fatigue(Some(0.4));

        let signals = env.sample().await;
        assert!(signals.emergency);
        assert!(!signals.live_prerequisites_met);
        assert_eq!(signals.novelty, Some(1.0));
        assert_eq!(signals.fatigue, Some(0.4));

        env.set_novelty(None);
        assert!(env.current().novelty.is_none());
    }
}
