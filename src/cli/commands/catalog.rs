//! Implementation of the `homeostat catalog` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;

use crate::cli::load_config;
use crate::cli::output::{money, output, table, truncate, CommandOutput};
use crate::domain::models::{ActivityProfile, Config, Tier};

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Only show activities of this tier
    #[arg(long)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub profile: ActivityProfile,
    /// Name of the first phase that unlocks the activity's tier
    pub unlocked_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogOutput {
    pub activities: Vec<CatalogEntry>,
}

impl CommandOutput for CatalogOutput {
    fn to_human(&self) -> String {
        if self.activities.is_empty() {
            return "No activities configured.".to_string();
        }
        let mut t = table(&[
            "Id", "Name", "Tier", "Capital", "Est. return", "Risk", "Cooldown", "Enabled",
            "Unlocked by",
        ]);
        for entry in &self.activities {
            let p = &entry.profile;
            t.add_row(vec![
                p.id.clone(),
                truncate(&p.name, 32),
                p.tier.to_string(),
                money(p.capital_required),
                money(p.estimated_return),
                format!("{:.2}", p.risk_level),
                p.cooldown_cycles.to_string(),
                if p.active { "yes" } else { "no" }.to_string(),
                entry.unlocked_by.clone().unwrap_or_else(|| "never".to_string()),
            ]);
        }
        t.to_string()
    }
}

/// Build the catalog listing from a loaded configuration.
pub fn catalog(config: &Config, tier: Option<Tier>) -> CatalogOutput {
    let activities = config
        .activities
        .iter()
        .filter(|p| tier.map_or(true, |t| p.tier == t))
        .map(|p| CatalogEntry {
            profile: p.clone(),
            unlocked_by: unlocking_phase(config, p.tier),
        })
        .collect();
    CatalogOutput { activities }
}

fn unlocking_phase(config: &Config, tier: Tier) -> Option<String> {
    if config.phases.is_empty() {
        return Some("always".to_string());
    }
    config
        .phases
        .iter()
        .find(|phase| phase.tiers.contains(&tier))
        .map(|phase| phase.name.clone())
}

pub async fn execute(args: CatalogArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = load_config(config_path)?;
    output(&catalog(&config, args.tier), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_default_activities() {
        let config = Config::default();
        let out = catalog(&config, None);
        assert_eq!(out.activities.len(), config.activities.len());
        let human = out.to_human();
        assert!(human.contains("content-syndication"));

        let json = out.to_json();
        assert_eq!(json["activities"][0]["id"], "content-syndication");
        assert_eq!(json["activities"][0]["unlocked_by"], "bootstrap");
    }

    #[test]
    fn test_tier_filter_and_unlock() {
        let config = Config::default();
        let out = catalog(&config, Some(Tier::D));
        assert_eq!(out.activities.len(), 1);
        assert_eq!(out.activities[0].unlocked_by.as_deref(), Some("scale"));
    }
}
