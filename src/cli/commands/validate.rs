//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::AppConfig;

/// Print the effective configuration. Loading already validated it.
pub fn run(config_path: &Path, config: &AppConfig) -> Result<()> {
    if config_path.exists() {
        println!("Configuration file: {}", config_path.display());
    } else {
        println!("Configuration file {} not found; using defaults", config_path.display());
    }
    println!("Configuration is valid!");
    println!();
    println!("App: {} ({})", config.app.name, config.app.environment);
    println!("Symbols: {}", config.bot.symbols.join(", "));
    println!(
        "Timeframes: {}",
        config
            .bot
            .timeframes
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Initial balance: {}", config.app.initial_balance);
    println!("Risk per trade: {}", config.risk.risk_per_trade);
    println!();
    println!("Effective configuration:");
    println!();
    let dump = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", dump);

    Ok(())
}
