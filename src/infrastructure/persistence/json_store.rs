use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::PersistedState;
use crate::domain::ports::StateStore;

/// Stores [`PersistedState`] as a single pretty-printed JSON document.
///
/// Writes go to a sibling `.tmp` file that is renamed over the target, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store state as JSON at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> DomainResult<PersistedState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted state, starting fresh");
                return Ok(PersistedState::default());
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "persisted state is corrupt, starting fresh"
                );
                Ok(PersistedState::default())
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> DomainResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Outcome, PendingFeedback};
    use chrono::Utc;

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let state = store.load().await.unwrap();
        assert_eq!(state.cycle_count, 0);
        assert!(state.last_cycle_time.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let state = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(state.cycle_count, 0);
        assert!(state.pending_feedback.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));
        let state = PersistedState {
            cycle_count: 12,
            last_cycle_time: Some(Utc::now()),
            pending_feedback: vec![PendingFeedback {
                activity_id: "alpha".to_string(),
                cycle: 12,
                outcome: Outcome::new(5.0, 1.0),
                recorded_at: Utc::now(),
            }],
            ..Default::default()
        };
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
        assert!(!store.tmp_path().exists());
    }
}
