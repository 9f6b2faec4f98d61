//! Implementation of the `homeostat status` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::load_config;
use crate::cli::output::{money, output, CommandOutput};
use crate::domain::models::PersistedState;
use crate::domain::ports::StateStore;
use crate::infrastructure::persistence::JsonFileStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Read state from this file instead of the configured state_path
    #[arg(long)]
    pub state: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub state_path: PathBuf,
    pub state: PersistedState,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let s = &self.state;
        let last = s
            .last_cycle_time
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        [
            format!("State file:        {}", self.state_path.display()),
            format!("Cycles run:        {}", s.cycle_count),
            format!("Last cycle:        {last}"),
            format!(
                "Today ({}):  revenue {} / cost {}",
                s.today_stats.date,
                money(s.today_stats.revenue),
                money(s.today_stats.cost)
            ),
            format!(
                "Executions today:  {} ({} failed)",
                s.today_stats.executions, s.today_stats.failures
            ),
            format!("Pending feedback:  {}", s.pending_feedback.len()),
        ]
        .join("\n")
    }
}

pub async fn load_status(state_path: &Path) -> Result<StatusOutput> {
    let store = JsonFileStore::new(state_path);
    let state = store
        .load()
        .await
        .with_context(|| format!("Failed to read {}", state_path.display()))?;
    Ok(StatusOutput {
        state_path: state_path.to_path_buf(),
        state,
    })
}

pub async fn execute(args: StatusArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let state_path = match args.state {
        Some(path) => path,
        None => PathBuf::from(load_config(config_path)?.state_path),
    };
    output(&load_status(&state_path).await?, json_mode);
    Ok(())
}
