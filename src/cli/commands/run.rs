//! Signal-driven paper trading command.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trading_broker::Ledger;
use trading_config::AppConfig;
use trading_data::{FearGreedSentiment, HttpPredictor};
use trading_engine::Orchestrator;
use trading_monitor::{Dashboard, DashboardState};
use trading_risk::RiskEngine;
use trading_strategies::SignalAggregator;

use super::{exchange_feed, initial_balance, parse_timeframe};
use crate::cli::RunArgs;

pub async fn run(args: RunArgs, mut config: AppConfig) -> Result<()> {
    if !args.symbols.is_empty() {
        config.bot.symbols = args.symbols.iter().map(|s| s.to_uppercase()).collect();
    }
    if !args.timeframes.is_empty() {
        config.bot.timeframes = args
            .timeframes
            .iter()
            .map(|t| parse_timeframe(t))
            .collect::<Result<_>>()?;
    }
    let balance = initial_balance(args.balance, &config)?;

    let feed = exchange_feed(&config)?;
    let ledger = Arc::new(Ledger::new(balance));
    let risk = Arc::new(RiskEngine::new(config.risk.clone()));
    let mut orchestrator = Orchestrator::new(
        config.bot.clone(),
        config.engine.clone(),
        SignalAggregator::new(config.signals.clone()),
        ledger,
        risk,
        feed.clone(),
    );
    if config.bot.enable_ml {
        match &config.exchange.ml_url {
            Some(url) => {
                let predictor = HttpPredictor::new(url.clone()).context("Failed to create ML client")?;
                orchestrator = orchestrator.with_ml(Arc::new(predictor));
            }
            None => warn!("ML scoring enabled but exchange.ml_url is not set"),
        }
    }
    if config.bot.enable_sentiment {
        let sentiment = FearGreedSentiment::new(config.exchange.sentiment_url.clone())
            .context("Failed to create sentiment client")?;
        orchestrator = orchestrator.with_sentiment(Arc::new(sentiment));
    }
    let orchestrator = Arc::new(orchestrator);

    info!(
        symbols = ?config.bot.symbols,
        timeframes = ?config.bot.timeframes,
        balance = %balance,
        "Starting paper trading"
    );
    orchestrator.start().await.context("Failed to start orchestrator")?;

    if args.dashboard {
        let view = Arc::clone(&orchestrator);
        tokio::task::spawn_blocking(move || {
            Dashboard::new(250).run(|| DashboardState::capture(&view))
        })
        .await
        .context("Dashboard task failed")?
        .context("Dashboard error")?;
    } else {
        let mut status = tokio::time::interval(Duration::from_secs(args.status_secs.max(1)));
        status.tick().await;
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                _ = status.tick() => log_status(&orchestrator),
            }
        }
    }

    info!("Shutting down");
    orchestrator.stop();
    feed.shutdown();
    print_summary(&orchestrator);
    Ok(())
}

fn log_status(orchestrator: &Orchestrator) {
    let ledger = orchestrator.ledger();
    info!(
        balance = %ledger.balance(),
        equity = %ledger.equity(),
        positions = ledger.position_count(),
        trades = ledger.trades().len(),
        signals = orchestrator.signals().len(),
        "Status"
    );
}

fn print_summary(orchestrator: &Orchestrator) {
    let state = DashboardState::capture(orchestrator);

    println!("═══════════════════════════════════════════════════════════");
    println!("                     SESSION SUMMARY                        ");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Initial Balance:     ${:.2}", state.initial_balance);
    println!("  Final Equity:        ${:.2}", state.equity);
    println!("  Realised P&L:        ${:.2}", state.total_pnl());
    println!("  Win Rate:            {:.2}%", state.win_rate());
    println!("  Max Drawdown:        {:.2}%", state.max_drawdown());
    println!("  Open Positions:      {}", state.positions.len());
    println!();
    for (symbol, stats) in &state.stats {
        println!(
            "  {:<10} trades {:>4}  wins {:>4}  pnl ${:.2}",
            symbol, stats.total_trades, stats.winning_trades, stats.total_pnl
        );
    }
    println!("═══════════════════════════════════════════════════════════");
}
