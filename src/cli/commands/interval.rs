//! Interval strategy paper trading command.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use trading_broker::{Ledger, OrderBook};
use trading_config::AppConfig;
use trading_engine::{EngineConfig, IntervalRunner, TradingEngine};
use trading_risk::RiskEngine;
use trading_strategies::IntervalStrategy;

use super::{exchange_feed, initial_balance};
use crate::cli::IntervalArgs;

pub async fn run(args: IntervalArgs, config: AppConfig) -> Result<()> {
    let mut interval = config.interval.clone();
    if let Some(symbol) = &args.symbol {
        interval.symbol = symbol.to_uppercase();
    }
    if let Some(method) = &args.method {
        interval.method = method.parse().context("Invalid analysis method")?;
    }
    let balance = initial_balance(args.balance, &config)?;

    let ledger = Arc::new(Ledger::new(balance));
    let order_book = Arc::new(OrderBook::new(Arc::clone(&ledger)));
    let engine = Arc::new(TradingEngine::new(
        EngineConfig {
            symbol: interval.symbol.clone(),
            ..config.engine.clone()
        },
        Arc::clone(&ledger),
        order_book,
        Arc::new(RiskEngine::new(config.risk.clone())),
    ));
    let feed = exchange_feed(&config)?;
    let strategy = IntervalStrategy::new(interval.clone()).context("Invalid interval settings")?;
    let runner = Arc::new(IntervalRunner::new(
        strategy,
        Arc::clone(&engine),
        feed,
        Duration::from_secs(args.tick_secs.max(1)),
    ));

    let band = runner.recalculate().await.context("Failed to derive the initial interval")?;
    info!(
        symbol = %interval.symbol,
        lower = band.lower,
        upper = band.upper,
        width_pct = band.width_pct,
        "Interval trading started"
    );
    engine.start();
    runner.start();

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    runner.stop();
    engine.stop();

    let stats = engine.stats();
    let state = runner.strategy_state();
    println!("═══════════════════════════════════════════════════════════");
    println!("                   INTERVAL SESSION SUMMARY                 ");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Symbol:              {}", interval.symbol);
    if let Some(band) = runner.interval() {
        println!("  Band:                {:.2} - {:.2}", band.lower, band.upper);
    }
    println!("  Final Equity:        ${:.2}", ledger.equity());
    println!("  Total Trades:        {}", stats.total_trades);
    println!("  Win Rate:            {:.2}%", stats.win_rate);
    println!("  Realised P&L:        ${:.2}", stats.total_pnl);
    println!("  Proposals Made:      {}", state.proposals_made);
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}
