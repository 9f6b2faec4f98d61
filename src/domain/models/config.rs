use serde::{Deserialize, Serialize};

use super::activity::{default_catalog, ActivityProfile, Tier};

/// Main configuration structure for homeostat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Capital available for allocation at startup
    #[serde(default = "default_total_budget")]
    pub total_budget: f64,

    /// Starting balance of the ledger (revenue/cost accumulate on top)
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,

    /// Fraction of a positive balance that may be deployed; the rest is reserve
    #[serde(default = "default_deployable_fraction")]
    pub deployable_fraction: f64,

    /// Sleep between cycles when running the loop
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Maximum activities executed in one cycle
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Seed for the pseudo-random source (entropy when absent)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Live mode requires the environment's live prerequisites every cycle
    #[serde(default)]
    pub live_mode: bool,

    /// Path of the persisted controller state
    #[serde(default = "default_state_path")]
    pub state_path: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub allocator: AllocatorConfig,

    #[serde(default)]
    pub belief: BeliefConfig,

    #[serde(default)]
    pub regime: RegimeConfig,

    #[serde(default)]
    pub temperature: TemperatureConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub stability: StabilityConfig,

    #[serde(default)]
    pub convergence: ConvergenceConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    /// Bootstrap phases, sorted by ascending revenue threshold
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseConfig>,

    /// Activity catalog
    #[serde(default = "default_catalog")]
    pub activities: Vec<ActivityProfile>,
}

const fn default_total_budget() -> f64 {
    1000.0
}

const fn default_initial_balance() -> f64 {
    1000.0
}

const fn default_deployable_fraction() -> f64 {
    0.8
}

const fn default_cycle_interval_ms() -> u64 {
    60_000
}

const fn default_max_concurrent() -> usize {
    3
}

fn default_state_path() -> String {
    ".homeostat/state.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_budget: default_total_budget(),
            initial_balance: default_initial_balance(),
            deployable_fraction: default_deployable_fraction(),
            cycle_interval_ms: default_cycle_interval_ms(),
            max_concurrent: default_max_concurrent(),
            seed: None,
            live_mode: false,
            state_path: default_state_path(),
            logging: LoggingConfig::default(),
            allocator: AllocatorConfig::default(),
            belief: BeliefConfig::default(),
            regime: RegimeConfig::default(),
            temperature: TemperatureConfig::default(),
            selection: SelectionConfig::default(),
            stability: StabilityConfig::default(),
            convergence: ConvergenceConfig::default(),
            risk: RiskConfig::default(),
            phases: default_phases(),
            activities: default_catalog(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Symplectic allocator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AllocatorConfig {
    /// Integration time step
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Inertia of an allocation (momentum = mass * velocity)
    #[serde(default = "default_mass")]
    pub mass: f64,

    /// Absolute force clip
    #[serde(default = "default_max_force")]
    pub max_force: f64,

    /// Capital units of force per unit of normalized return advantage
    #[serde(default = "default_force_gain")]
    pub force_gain: f64,

    /// Cost of holding one unit of capital (restoring stiffness)
    #[serde(default = "default_cost_of_capital")]
    pub cost_of_capital: f64,

    /// Rebalance at least once every N cycles
    #[serde(default = "default_rebalance_interval")]
    pub rebalance_interval: u64,

    /// Relative budget change that forces a rebalance
    #[serde(default = "default_budget_change_threshold")]
    pub budget_change_threshold: f64,

    /// Fraction of the budget spread evenly over active activities at startup
    #[serde(default = "default_initial_deployment")]
    pub initial_deployment: f64,

    /// Acceptable relative energy drift of an undamped, unclamped step
    #[serde(default = "default_energy_tolerance")]
    pub energy_tolerance: f64,
}

const fn default_dt() -> f64 {
    0.5
}

const fn default_mass() -> f64 {
    1.0
}

const fn default_max_force() -> f64 {
    100.0
}

const fn default_force_gain() -> f64 {
    50.0
}

const fn default_cost_of_capital() -> f64 {
    0.02
}

const fn default_rebalance_interval() -> u64 {
    1
}

const fn default_budget_change_threshold() -> f64 {
    0.05
}

const fn default_initial_deployment() -> f64 {
    0.5
}

const fn default_energy_tolerance() -> f64 {
    0.05
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            mass: default_mass(),
            max_force: default_max_force(),
            force_gain: default_force_gain(),
            cost_of_capital: default_cost_of_capital(),
            rebalance_interval: default_rebalance_interval(),
            budget_change_threshold: default_budget_change_threshold(),
            initial_deployment: default_initial_deployment(),
            energy_tolerance: default_energy_tolerance(),
        }
    }
}

/// Conjugate belief priors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BeliefConfig {
    /// Pseudo-observation weight of the catalog prior mean (kappa0)
    #[serde(default = "default_prior_strength")]
    pub prior_strength: f64,

    /// Inverse-gamma shape prior (alpha0 > 1 keeps the variance finite)
    #[serde(default = "default_prior_shape")]
    pub prior_shape: f64,

    /// Prior return standard deviation as a fraction of |estimated_return|
    #[serde(default = "default_prior_cv")]
    pub prior_cv: f64,
}

const fn default_prior_strength() -> f64 {
    1.0
}

const fn default_prior_shape() -> f64 {
    2.0
}

const fn default_prior_cv() -> f64 {
    0.5
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            prior_strength: default_prior_strength(),
            prior_shape: default_prior_shape(),
            prior_cv: default_prior_cv(),
        }
    }
}

/// Market regime inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegimeConfig {
    /// Number of cycle signals averaged into the trend
    #[serde(default = "default_regime_window")]
    pub window: usize,

    /// Trend above which the observation reads "bull"
    #[serde(default = "default_bull_threshold")]
    pub bull_threshold: f64,

    /// Trend below which the observation reads "bear"
    #[serde(default = "default_bear_threshold")]
    pub bear_threshold: f64,

    /// Probability of staying in the current regime per cycle
    #[serde(default = "default_stickiness")]
    pub stickiness: f64,

    /// Probability that the thresholded observation matches the hidden regime
    #[serde(default = "default_emission_accuracy")]
    pub emission_accuracy: f64,

    #[serde(default = "default_bull_factor")]
    pub bull_factor: f64,

    #[serde(default = "default_bear_factor")]
    pub bear_factor: f64,
}

const fn default_regime_window() -> usize {
    5
}

const fn default_bull_threshold() -> f64 {
    0.1
}

const fn default_bear_threshold() -> f64 {
    -0.1
}

const fn default_stickiness() -> f64 {
    0.8
}

const fn default_emission_accuracy() -> f64 {
    0.7
}

const fn default_bull_factor() -> f64 {
    1.2
}

const fn default_bear_factor() -> f64 {
    0.8
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            window: default_regime_window(),
            bull_threshold: default_bull_threshold(),
            bear_threshold: default_bear_threshold(),
            stickiness: default_stickiness(),
            emission_accuracy: default_emission_accuracy(),
            bull_factor: default_bull_factor(),
            bear_factor: default_bear_factor(),
        }
    }
}

/// Selection temperature (beta) schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TemperatureConfig {
    #[serde(default = "default_beta_initial")]
    pub initial: f64,

    #[serde(default = "default_beta_min")]
    pub min: f64,

    #[serde(default = "default_beta_max")]
    pub max: f64,

    /// Linear annealing rate per cycle, relative to `initial`
    #[serde(default = "default_anneal_rate")]
    pub anneal_rate: f64,

    /// Multiplier applied on instability or novelty (< 1, more exploration)
    #[serde(default = "default_cooling_factor")]
    pub exploration_factor: f64,

    /// Multiplier applied on sustained fatigue with low novelty (> 1)
    #[serde(default = "default_exploitation_factor")]
    pub exploitation_factor: f64,

    /// Fraction of the perturbation kept from one cycle to the next
    #[serde(default = "default_perturbation_memory")]
    pub perturbation_memory: f64,

    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f64,

    #[serde(default = "default_fatigue_threshold")]
    pub fatigue_threshold: f64,

    /// Consecutive fatigued cycles before exploitation is boosted
    #[serde(default = "default_fatigue_cycles")]
    pub fatigue_cycles: u32,
}

const fn default_beta_initial() -> f64 {
    1.0
}

const fn default_beta_min() -> f64 {
    0.05
}

const fn default_beta_max() -> f64 {
    10.0
}

const fn default_anneal_rate() -> f64 {
    0.05
}

const fn default_cooling_factor() -> f64 {
    0.7
}

const fn default_exploitation_factor() -> f64 {
    1.15
}

const fn default_perturbation_memory() -> f64 {
    0.8
}

const fn default_novelty_threshold() -> f64 {
    0.7
}

const fn default_fatigue_threshold() -> f64 {
    0.7
}

const fn default_fatigue_cycles() -> u32 {
    3
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            initial: default_beta_initial(),
            min: default_beta_min(),
            max: default_beta_max(),
            anneal_rate: default_anneal_rate(),
            exploration_factor: default_cooling_factor(),
            exploitation_factor: default_exploitation_factor(),
            perturbation_memory: default_perturbation_memory(),
            novelty_threshold: default_novelty_threshold(),
            fatigue_threshold: default_fatigue_threshold(),
            fatigue_cycles: default_fatigue_cycles(),
        }
    }
}

/// Expected-free-energy weights and selection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectionConfig {
    #[serde(default = "default_w_epistemic")]
    pub w_epistemic: f64,

    #[serde(default = "default_w_pragmatic")]
    pub w_pragmatic: f64,

    #[serde(default = "default_w_risk")]
    pub w_risk: f64,

    #[serde(default = "default_w_exploration")]
    pub w_exploration: f64,

    /// Bernoulli rate of the exploration bonus
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,

    /// Net return per execution every activity is measured against
    #[serde(default = "default_target_return")]
    pub target_return: f64,

    /// Scale used to normalize returns into [-1, 1]
    #[serde(default = "default_return_scale")]
    pub return_scale: f64,

    /// Weight of competition pressure in the risk term
    #[serde(default = "default_competition_weight")]
    pub competition_weight: f64,

    /// Discount applied to the one-step lookahead G
    #[serde(default = "default_lookahead_gamma")]
    pub lookahead_gamma: f64,
}

const fn default_w_epistemic() -> f64 {
    0.3
}

const fn default_w_pragmatic() -> f64 {
    0.5
}

const fn default_w_risk() -> f64 {
    0.2
}

const fn default_w_exploration() -> f64 {
    0.1
}

const fn default_exploration_rate() -> f64 {
    0.1
}

const fn default_target_return() -> f64 {
    10.0
}

const fn default_return_scale() -> f64 {
    100.0
}

const fn default_competition_weight() -> f64 {
    0.5
}

const fn default_lookahead_gamma() -> f64 {
    0.5
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            w_epistemic: default_w_epistemic(),
            w_pragmatic: default_w_pragmatic(),
            w_risk: default_w_risk(),
            w_exploration: default_w_exploration(),
            exploration_rate: default_exploration_rate(),
            target_return: default_target_return(),
            return_scale: default_return_scale(),
            competition_weight: default_competition_weight(),
            lookahead_gamma: default_lookahead_gamma(),
        }
    }
}

/// Contraction (Lipschitz) monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StabilityConfig {
    /// Allocation changes smaller than this carry no gain information
    #[serde(default = "default_min_delta")]
    pub min_delta: f64,

    /// Weight of the newest log-Lipschitz sample in the running average
    #[serde(default = "default_log_average_weight")]
    pub log_average_weight: f64,

    /// Damping applied even when the loop is contracting
    #[serde(default = "default_base_damping")]
    pub base_damping: f64,

    /// Damping added per unit of positive log-Lipschitz average
    #[serde(default = "default_damping_gain")]
    pub damping_gain: f64,

    /// Single-sample Lipschitz ratio that raises a warning on its own
    #[serde(default = "default_spike_ratio")]
    pub spike_ratio: f64,
}

const fn default_min_delta() -> f64 {
    1e-6
}

const fn default_log_average_weight() -> f64 {
    0.3
}

const fn default_base_damping() -> f64 {
    0.05
}

const fn default_damping_gain() -> f64 {
    0.5
}

const fn default_spike_ratio() -> f64 {
    10.0
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            min_delta: default_min_delta(),
            log_average_weight: default_log_average_weight(),
            base_damping: default_base_damping(),
            damping_gain: default_damping_gain(),
            spike_ratio: default_spike_ratio(),
        }
    }
}

/// Non-equilibrium steady state targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    #[serde(default = "default_target_monthly_revenue")]
    pub target_monthly_revenue: f64,

    #[serde(default = "default_target_monthly_cost")]
    pub target_monthly_cost: f64,

    /// Cycles that make up one month of extrapolation
    #[serde(default = "default_cycles_per_month")]
    pub cycles_per_month: f64,

    /// Deviation below which the loop counts as steady
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Consecutive sub-epsilon cycles required for steady state
    #[serde(default = "default_steady_cycles")]
    pub steady_cycles: u32,

    /// Deviations kept for the convergence-rate fit
    #[serde(default = "default_history")]
    pub history: usize,
}

const fn default_target_monthly_revenue() -> f64 {
    10_000.0
}

const fn default_target_monthly_cost() -> f64 {
    2_000.0
}

const fn default_cycles_per_month() -> f64 {
    43_200.0
}

const fn default_epsilon() -> f64 {
    0.05
}

const fn default_steady_cycles() -> u32 {
    3
}

const fn default_history() -> usize {
    10
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            target_monthly_revenue: default_target_monthly_revenue(),
            target_monthly_cost: default_target_monthly_cost(),
            cycles_per_month: default_cycles_per_month(),
            epsilon: default_epsilon(),
            steady_cycles: default_steady_cycles(),
            history: default_history(),
        }
    }
}

/// Drawdown circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskConfig {
    /// Drawdown above which the breaker trips
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,

    /// Tiers the breaker may suspend
    #[serde(default = "default_risky_tiers")]
    pub risky_tiers: Vec<Tier>,

    /// Risk level above which an activity in a risky tier is suspended
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,

    /// Precision-weighted prediction error that flags an activity
    #[serde(default = "default_surprise_threshold")]
    pub surprise_threshold: f64,
}

const fn default_max_drawdown() -> f64 {
    0.3
}

fn default_risky_tiers() -> Vec<Tier> {
    vec![Tier::B, Tier::C, Tier::D]
}

const fn default_risk_threshold() -> f64 {
    0.4
}

const fn default_surprise_threshold() -> f64 {
    9.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown: default_max_drawdown(),
            risky_tiers: default_risky_tiers(),
            risk_threshold: default_risk_threshold(),
            surprise_threshold: default_surprise_threshold(),
        }
    }
}

/// One bootstrap phase: crossing `revenue_threshold` unlocks `tiers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhaseConfig {
    pub name: String,
    /// Extrapolated monthly revenue required for this phase
    pub revenue_threshold: f64,
    /// Tiers unlocked from this phase upward
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

impl PhaseConfig {
    pub fn new(name: impl Into<String>, revenue_threshold: f64, tiers: Vec<Tier>) -> Self {
        Self {
            name: name.into(),
            revenue_threshold,
            tiers,
        }
    }
}

fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("bootstrap", 0.0, vec![Tier::S, Tier::A]),
        PhaseConfig::new("growth", 1_000.0, vec![Tier::B]),
        PhaseConfig::new("scale", 10_000.0, vec![Tier::C, Tier::D]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phases_are_sorted() {
        let phases = default_phases();
        assert!(phases
            .windows(2)
            .all(|w| w[0].revenue_threshold < w[1].revenue_threshold));
        assert_eq!(phases[0].revenue_threshold, 0.0);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "total_budget: 500\nrisk:\n  max_drawdown: 0.2\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!((config.total_budget - 500.0).abs() < f64::EPSILON);
        assert!((config.risk.max_drawdown - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.risk.risky_tiers, vec![Tier::B, Tier::C, Tier::D]);
        assert_eq!(config.activities.len(), 5);
        assert_eq!(config.max_concurrent, 3);
    }
}
