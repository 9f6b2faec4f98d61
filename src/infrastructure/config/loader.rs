use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid total_budget: {0}. Must be finite and non-negative")]
    InvalidBudget(f64),

    #[error("Invalid deployable_fraction: {0}. Must be within [0, 1]")]
    InvalidDeployableFraction(f64),

    #[error("Invalid max_concurrent: {0}. Must be at least 1")]
    InvalidMaxConcurrent(usize),

    #[error("Invalid cycle_interval_ms: {0}. Must be at least 1")]
    InvalidCycleInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("State path cannot be empty")]
    EmptyStatePath,

    #[error("Invalid max_drawdown: {0}. Must be within (0, 1]")]
    InvalidMaxDrawdown(f64),

    #[error(
        "Invalid temperature bounds: require 0 < min ({min}) <= initial ({initial}) <= max ({max})"
    )]
    InvalidTemperature { min: f64, initial: f64, max: f64 },

    #[error("Invalid weight {name}: {value}. Must be finite and non-negative")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("Invalid probability {name}: {value}. Must be within [0, 1]")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("Invalid allocator {name}: {value}. Must be positive")]
    InvalidAllocator { name: &'static str, value: f64 },

    #[error("Phase thresholds must start at 0 and increase: {0}")]
    InvalidPhases(String),

    #[error("Duplicate activity id: {0}")]
    DuplicateActivity(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .homeostat/config.yaml (project config, created by init)
    /// 3. .homeostat/local.yaml (project local overrides, optional)
    /// 4. Environment variables (HOMEOSTAT_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".homeostat/config.yaml"))
            .merge(Yaml::file(".homeostat/local.yaml"))
            .merge(Env::prefixed("HOMEOSTAT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("HOMEOSTAT_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if !config.total_budget.is_finite() || config.total_budget < 0.0 {
            return Err(ConfigError::InvalidBudget(config.total_budget));
        }
        if !config.initial_balance.is_finite() {
            return Err(ConfigError::ValidationFailed(
                "initial_balance must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.deployable_fraction) {
            return Err(ConfigError::InvalidDeployableFraction(
                config.deployable_fraction,
            ));
        }
        if config.max_concurrent == 0 {
            return Err(ConfigError::InvalidMaxConcurrent(config.max_concurrent));
        }
        if config.cycle_interval_ms == 0 {
            return Err(ConfigError::InvalidCycleInterval(config.cycle_interval_ms));
        }
        if config.state_path.trim().is_empty() {
            return Err(ConfigError::EmptyStatePath);
        }

        Self::validate_logging(config)?;
        Self::validate_engines(config)?;
        Self::validate_phases(config)?;

        let mut seen = HashSet::new();
        for activity in &config.activities {
            if !seen.insert(activity.id.as_str()) {
                return Err(ConfigError::DuplicateActivity(activity.id.clone()));
            }
            activity
                .validate()
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        }

        Ok(())
    }

    fn validate_logging(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }
        Ok(())
    }

    fn validate_engines(config: &Config) -> Result<(), ConfigError> {
        let alloc = &config.allocator;
        for (name, value) in [("dt", alloc.dt), ("mass", alloc.mass), ("max_force", alloc.max_force)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidAllocator { name, value });
            }
        }

        let sel = &config.selection;
        for (name, value) in [
            ("w_epistemic", sel.w_epistemic),
            ("w_pragmatic", sel.w_pragmatic),
            ("w_risk", sel.w_risk),
            ("w_exploration", sel.w_exploration),
            ("competition_weight", sel.competition_weight),
            ("lookahead_gamma", sel.lookahead_gamma),
            ("force_gain", alloc.force_gain),
            ("cost_of_capital", alloc.cost_of_capital),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if !sel.return_scale.is_finite() || sel.return_scale <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                name: "return_scale",
                value: sel.return_scale,
            });
        }

        for (name, value) in [
            ("exploration_rate", sel.exploration_rate),
            ("regime.stickiness", config.regime.stickiness),
            ("regime.emission_accuracy", config.regime.emission_accuracy),
            ("stability.log_average_weight", config.stability.log_average_weight),
            ("stability.base_damping", config.stability.base_damping),
            ("temperature.perturbation_memory", config.temperature.perturbation_memory),
            ("allocator.initial_deployment", alloc.initial_deployment),
            ("risk.risk_threshold", config.risk.risk_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }

        let temp = &config.temperature;
        if !(temp.min > 0.0 && temp.min <= temp.initial && temp.initial <= temp.max) {
            return Err(ConfigError::InvalidTemperature {
                min: temp.min,
                initial: temp.initial,
                max: temp.max,
            });
        }

        let max_drawdown = config.risk.max_drawdown;
        if !(max_drawdown > 0.0 && max_drawdown <= 1.0) {
            return Err(ConfigError::InvalidMaxDrawdown(max_drawdown));
        }

        if config.regime.window == 0 {
            return Err(ConfigError::ValidationFailed(
                "regime.window must be at least 1".to_string(),
            ));
        }
        if config.convergence.cycles_per_month <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "convergence.cycles_per_month must be positive".to_string(),
            ));
        }
        if config.belief.prior_shape <= 1.0 || config.belief.prior_strength <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "belief priors require prior_shape > 1 and prior_strength > 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_phases(config: &Config) -> Result<(), ConfigError> {
        let Some(first) = config.phases.first() else {
            return Ok(());
        };
        if first.revenue_threshold != 0.0 {
            return Err(ConfigError::InvalidPhases(format!(
                "first phase '{}' starts at {}",
                first.name, first.revenue_threshold
            )));
        }
        if let Some(w) = config
            .phases
            .windows(2)
            .find(|w| w[1].revenue_threshold <= w[0].revenue_threshold)
        {
            return Err(ConfigError::InvalidPhases(format!(
                "'{}' ({}) does not exceed '{}' ({})",
                w[1].name, w[1].revenue_threshold, w[0].name, w[0].revenue_threshold
            )));
        }
        Ok(())
    }
}
