//! List strategies command.

use anyhow::Result;
use trading_strategies::{StrategyKind, StrategyRegistry};

pub fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for (key, info) in registry.names().into_iter().zip(registry.list()) {
        let driver = match info.kind {
            StrategyKind::SignalDriven => "autotrader run",
            StrategyKind::Proposal => "autotrader interval",
        };
        println!("  {} ({})", info.name, key);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  Started with: {}", driver);
        println!("  Defaults:");
        let defaults = serde_json::to_string_pretty(&info.default_config)?;
        for line in defaults.lines() {
            println!("    {}", line);
        }
        println!();
    }

    Ok(())
}
