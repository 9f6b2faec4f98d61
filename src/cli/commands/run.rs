//! Implementation of the `homeostat run` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::adapters::{ManualEnvironment, SimulatedExecutor, SimulationProfile};
use crate::cli::load_config;
use crate::cli::output::{money, output, table, CommandOutput};
use crate::domain::models::{ControllerState, CycleResult};
use crate::domain::ports::StateStore;
use crate::infrastructure::persistence::{JsonFileStore, MemoryStateStore};
use crate::services::Controller;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run this many cycles back to back and exit (loop until Ctrl-C when absent)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Override cycle_interval_ms for the continuous loop
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Seed for selection and simulated outcomes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Relative noise of simulated returns
    #[arg(long, default_value = "0.2")]
    pub noise: f64,

    /// Keep state in memory only; neither read nor write the state file
    #[arg(long)]
    pub no_persist: bool,
}

#[derive(Debug, Serialize)]
pub struct CycleRow {
    pub cycle: u64,
    pub skipped: bool,
    pub selected: Vec<String>,
    pub revenue: f64,
    pub cost: f64,
    pub temperature: f64,
    pub regime: String,
    pub stable: bool,
    pub circuit_broken: bool,
    pub unlocked_phase: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl From<&CycleResult> for CycleRow {
    fn from(r: &CycleResult) -> Self {
        Self {
            cycle: r.cycle,
            skipped: r.skipped,
            selected: r.selected.clone(),
            revenue: r.revenue,
            cost: r.cost,
            temperature: r.temperature,
            regime: r.regime.regime.to_string(),
            stable: r.stability.stable,
            circuit_broken: r.risk.circuit_broken,
            unlocked_phase: r.unlocked_phase,
            errors: r.errors.len(),
            warnings: r.warnings.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub cycles: Vec<CycleRow>,
    pub state: ControllerState,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut t = table(&[
            "Cycle", "Selected", "Revenue", "Cost", "Beta", "Regime", "Stable", "Breaker", "Phase",
            "Errors",
        ]);
        for row in &self.cycles {
            let selected = if row.skipped {
                "(skipped)".to_string()
            } else if row.selected.is_empty() {
                "-".to_string()
            } else {
                row.selected.join(", ")
            };
            t.add_row(vec![
                row.cycle.to_string(),
                selected,
                money(row.revenue),
                money(row.cost),
                format!("{:.3}", row.temperature),
                row.regime.clone(),
                if row.stable { "yes" } else { "no" }.to_string(),
                if row.circuit_broken { "OPEN" } else { "closed" }.to_string(),
                row.unlocked_phase.to_string(),
                row.errors.to_string(),
            ]);
        }

        let s = &self.state;
        let mut lines = Vec::new();
        if !self.cycles.is_empty() {
            lines.push(t.to_string());
        }
        lines.push(format!(
            "Balance {} | allocated {} of {} | phase {} ({})",
            money(s.balance),
            money(s.total_allocated()),
            money(s.deployable_budget),
            s.unlocked_phase,
            s.phase_name
        ));
        lines.push(format!(
            "Monthly revenue {} / cost {} | deviation {:.3} | steady state: {}",
            money(s.monthly_revenue_estimate),
            money(s.monthly_cost_estimate),
            s.convergence.deviation,
            if s.convergence.at_steady_state { "yes" } else { "no" }
        ));
        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let mut config = load_config(config_path)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(config.cycle_interval_ms));

    let store: Arc<dyn StateStore> = if args.no_persist {
        Arc::new(MemoryStateStore::new())
    } else {
        Arc::new(JsonFileStore::new(&config.state_path))
    };
    let executor = SimulatedExecutor::new(config.seed)
        .with_default_profile(SimulationProfile::default().with_noise(args.noise));

    let controller = Controller::new(config)
        .context("Invalid activity catalog")?
        .with_store(store)
        .with_environment(Arc::new(ManualEnvironment::new()));
    controller
        .register_default_executor(Arc::new(executor))
        .await;
    controller.initialize().await?;

    let cycles = match args.cycles {
        Some(n) => run_cycles(&controller, n).await?,
        None => {
            run_until_interrupted(&controller, interval).await?;
            Vec::new()
        }
    };

    let result = RunOutput {
        cycles,
        state: controller.get_state().await,
    };
    output(&result, json_mode);
    Ok(())
}

/// Run `n` cycles back to back.
pub async fn run_cycles(controller: &Controller, n: u64) -> Result<Vec<CycleRow>> {
    let mut rows = Vec::new();
    for _ in 0..n {
        let result = controller.cycle().await?;
        rows.push(CycleRow::from(&result));
    }
    Ok(rows)
}

async fn run_until_interrupted(controller: &Controller, interval: Duration) -> Result<()> {
    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start(interval).await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("interrupt received, stopping after the current cycle");
    controller.stop();
    handle.await.context("Control loop task failed")?;
    Ok(())
}
