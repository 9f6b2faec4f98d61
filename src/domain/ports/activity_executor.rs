use crate::domain::models::{ActivityProfile, Outcome};
use anyhow::Result;
use async_trait::async_trait;

/// Port for running one activity against the outside world
///
/// One implementation is registered per activity at startup. The controller
/// calls `execute` at most once per cycle per activity, sequentially, and only
/// for activities the action selector picked.
///
/// # Contract
///
/// * `Ok(Some(outcome))` - the activity ran; `revenue` and `cost` must be finite and `>= 0`
/// * `Ok(None)` - the activity had nothing to do or failed softly
/// * `Err(_)` - treated exactly like `Ok(None)` plus a recorded failure
///
/// Implementations should not panic; a panic is contained and recorded as a
/// failure. Idempotency across cycles is the implementation's responsibility.
///
/// # Examples
///
/// ```no_run
/// use homeostat::domain::ports::ActivityExecutor;
/// use homeostat::domain::models::ActivityProfile;
/// use anyhow::Result;
///
/// async fn example(exec: &dyn ActivityExecutor, profile: &ActivityProfile) -> Result<()> {
///     if let Some(outcome) = exec.execute(profile).await? {
///         println!("net {}", outcome.net());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ActivityExecutor: Send + Sync {
    /// Execute the activity once and report its outcome.
    async fn execute(&self, activity: &ActivityProfile) -> Result<Option<Outcome>>;
}
