//! Backtest command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use trading_backtest::{BacktestEngine, BacktestReport};
use trading_config::AppConfig;
use trading_data::CsvDataSource;
use trading_strategies::{AnalysisMethod, IntervalConfig};

use super::{exchange_feed, parse_timeframe};
use crate::cli::BacktestArgs;

const METHODS: [AnalysisMethod; 3] = [
    AnalysisMethod::Simplest,
    AnalysisMethod::BestWidth,
    AnalysisMethod::MathStat,
];

pub async fn run(args: BacktestArgs, config: AppConfig) -> Result<()> {
    let mut interval = config.interval.clone();
    if let Some(symbol) = &args.symbol {
        interval.symbol = symbol.to_uppercase();
    }
    if let Some(timeframe) = &args.timeframe {
        interval.timeframe = parse_timeframe(timeframe)?;
    }
    if let Some(method) = &args.method {
        interval.method = method.parse().context("Invalid analysis method")?;
    }
    let mut backtest = config.backtest.clone();
    if let Some(days) = args.days {
        backtest.days = days;
    }
    backtest.validate().map_err(anyhow::Error::msg).context("Invalid backtest settings")?;

    info!(symbol = %interval.symbol, method = ?interval.method, "Starting backtest");
    let engine = BacktestEngine::new(backtest);

    let configs: Vec<IntervalConfig> = if args.compare {
        METHODS
            .iter()
            .map(|&method| IntervalConfig {
                method,
                ..interval.clone()
            })
            .collect()
    } else {
        vec![interval.clone()]
    };

    let reports = match &args.data {
        Some(path) => {
            let candles = load_csv(path, &interval)?;
            engine.run_multiple(&configs, &candles)
        }
        None => {
            let feed = exchange_feed(&config)?;
            engine
                .run_multiple_from_feed(feed.as_ref(), &configs)
                .await
                .context("Failed to load exchange history")?
        }
    };

    if reports.is_empty() {
        anyhow::bail!("No backtest completed; see the log for details");
    }

    for report in &reports {
        match args.output.as_str() {
            "json" => println!("{}", report.to_json()?),
            _ => println!("{}", report.summary()),
        }
    }
    if args.compare {
        print_ranking(&reports);
    }

    // The best report is saved
    let best = &reports[0];
    if let Some(save_path) = &args.save {
        std::fs::write(save_path, best.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }
    if let Some(csv_path) = &args.equity_csv {
        std::fs::write(csv_path, best.equity_to_csv())
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("Equity curve saved to {:?}", csv_path);
    }

    Ok(())
}

fn load_csv(path: &Path, interval: &IntervalConfig) -> Result<Vec<trading_core::types::Candle>> {
    let source = CsvDataSource::new(path)
        .with_context(|| format!("Data file '{}' does not exist", path.display()))?;
    let candles = source
        .load(interval.timeframe)
        .with_context(|| format!("Failed to read candles from {}", path.display()))?;
    info!("Loaded {} candles from {:?}", candles.len(), path);
    Ok(candles)
}

fn print_ranking(reports: &[BacktestReport]) {
    println!("Ranking by average day profit");
    println!("───────────────────────────────────────────────────────────");
    for (rank, report) in reports.iter().enumerate() {
        println!(
            "  {}. {:<12} {:>8.2}%/day  trades {:>4}  profit {:>8.2}%",
            rank + 1,
            format!("{:?}", report.interval_config.method),
            report.stats.average_day_profit_pct,
            report.stats.total_trades,
            report.stats.total_profit_pct
        );
    }
}
