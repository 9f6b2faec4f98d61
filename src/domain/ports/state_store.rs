use crate::domain::errors::DomainResult;
use crate::domain::models::PersistedState;
use async_trait::async_trait;

/// Port for the minimal load/save persistence contract.
///
/// `load` tolerates a missing or corrupt backing store by returning
/// zero-valued defaults. `save` may fail; the controller logs the failure and
/// keeps its in-memory state authoritative until the next successful save.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> DomainResult<PersistedState>;

    async fn save(&self, state: &PersistedState) -> DomainResult<()>;
}
