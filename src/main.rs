//! Paper trading bot CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.json_logs || config.logging.is_json();
    let _guard = setup_logging(&level, json, config.logging.dir.as_deref().map(Path::new));

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, config).await,
        Commands::Backtest(args) => cli::commands::backtest::run(args, config).await,
        Commands::Interval(args) => cli::commands::interval::run(args, config).await,
        Commands::Strategies => cli::commands::strategies::run(),
        Commands::Validate => cli::commands::validate::run(&cli.config, &config),
    }
}
