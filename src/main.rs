//! Homeostat CLI entry point.

use clap::Parser;

use homeostat::cli::{self, Cli, Commands};
use homeostat::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // An unloadable config falls back to default logging; the command
    // itself reports the config error.
    let logging = cli::load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    let mut log_config = LogConfig::from(&logging);
    if cli.json {
        log_config = log_config.without_stdout();
    }
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init(args) => cli::commands::init::execute(args, cli.json).await,
        Commands::Run(args) => cli::commands::run::execute(args, config_path, cli.json).await,
        Commands::Catalog(args) => {
            cli::commands::catalog::execute(args, config_path, cli.json).await
        }
        Commands::Status(args) => {
            cli::commands::status::execute(args, config_path, cli.json).await
        }
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
