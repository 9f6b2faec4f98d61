//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{catalog::CatalogArgs, init::InitArgs, run::RunArgs, status::StatusArgs};

#[derive(Parser, Debug)]
#[command(name = "homeostat")]
#[command(about = "Homeostat - autonomous capital-allocation control loop", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .homeostat/config.yaml + local.yaml)
    #[arg(short, long, global = true, env = "HOMEOSTAT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .homeostat/ with a default configuration
    Init(InitArgs),

    /// Run the control loop against simulated executors
    Run(RunArgs),

    /// Show the configured activity catalog
    Catalog(CatalogArgs),

    /// Show the persisted controller state
    Status(StatusArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "homeostat", "run", "--cycles", "5", "--seed", "9", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.cycles, Some(5));
                assert_eq!(args.seed, Some(9));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_init_defaults() {
        let cli = Cli::try_parse_from(["homeostat", "init"]).unwrap();
        match cli.command {
            Commands::Init(args) => {
                assert!(!args.force);
                assert_eq!(args.path, PathBuf::from("."));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
