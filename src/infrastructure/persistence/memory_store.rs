use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{ControlError, DomainResult};
use crate::domain::models::PersistedState;
use crate::domain::ports::StateStore;

/// In-process store for tests and paper runs.
///
/// `fail_saves` makes every subsequent save return a persistence error.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RwLock<Option<PersistedState>>,
    saves: AtomicU64,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `state`.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            ..Self::default()
        }
    }

    /// The last saved state, if any.
    pub async fn snapshot(&self) -> Option<PersistedState> {
        self.state.read().await.clone()
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Make every following save fail until reset.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> DomainResult<PersistedState> {
        Ok(self.state.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, state: &PersistedState) -> DomainResult<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(ControlError::Persistence("store unavailable".to_string()));
        }
        *self.state.write().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_loads_default() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().await.unwrap().cycle_count, 0);
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_saves_leave_state_untouched() {
        let store = MemoryStateStore::with_state(PersistedState {
            cycle_count: 3,
            ..Default::default()
        });
        store.set_fail_saves(true);
        let next = PersistedState {
            cycle_count: 4,
            ..Default::default()
        };
        assert!(matches!(
            store.save(&next).await,
            Err(ControlError::Persistence(_))
        ));
        assert_eq!(store.load().await.unwrap().cycle_count, 3);

        store.set_fail_saves(false);
        store.save(&next).await.unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().await.unwrap().cycle_count, 4);
    }
}
