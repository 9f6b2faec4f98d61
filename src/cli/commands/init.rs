//! Implementation of the `homeostat init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub directories_created: Vec<String>,
    pub config_written: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push("\nDefault configuration written to .homeostat/config.yaml".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let result = init_project(&args).await?;
    output(&result, json_mode);
    Ok(())
}

/// Create `.homeostat/` under `args.path` with a default `config.yaml`.
pub async fn init_project(args: &InitArgs) -> Result<InitOutput> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let homeostat_dir = target_path.join(".homeostat");
    let config_path = homeostat_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite the configuration."
                .to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            config_written: false,
        });
    }

    let mut directories_created = vec![];
    for dir in [homeostat_dir.clone(), homeostat_dir.join("logs")] {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir
                .strip_prefix(&target_path)
                .unwrap_or(&dir)
                .to_string_lossy()
                .to_string();
            directories_created.push(relative);
        }
    }

    let yaml = serde_yaml::to_string(&Config::default())
        .context("Failed to serialize default configuration")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    Ok(InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        config_written: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };

        let out = init_project(&args).await.unwrap();
        assert!(out.success);
        assert_eq!(out.directories_created.len(), 2);

        let config_path = dir.path().join(".homeostat").join("config.yaml");
        let yaml = std::fs::read_to_string(&config_path).unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        ConfigLoader::validate(&config).unwrap();
        assert_eq!(config.activities.len(), Config::default().activities.len());

        let again = init_project(&args).await.unwrap();
        assert!(!again.success);
        assert!(!again.config_written);
    }

    #[tokio::test]
    async fn test_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        init_project(&args).await.unwrap();
        args.force = true;
        let out = init_project(&args).await.unwrap();
        assert!(out.success);
        assert!(out.directories_created.is_empty());
    }
}
