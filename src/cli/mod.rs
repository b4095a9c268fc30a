//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autotrader")]
#[command(author, version, about = "Autonomous paper-trading bot driven by streaming indicators")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config/default.toml", env = "TRADING_CONFIG")]
    pub config: PathBuf,

    /// Log level; overrides the configured level
    #[arg(short, long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the signal-driven paper trading bot
    Run(RunArgs),
    /// Backtest the interval strategy on historical candles
    Backtest(BacktestArgs),
    /// Paper trade the interval strategy on live prices
    Interval(IntervalArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    Validate,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Symbols to trade (comma-separated); overrides the configuration
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Timeframes to stream (comma-separated), e.g. 1m,5m
    #[arg(short, long, value_delimiter = ',')]
    pub timeframes: Vec<String>,

    /// Initial paper balance
    #[arg(long)]
    pub balance: Option<f64>,

    /// Show the terminal dashboard
    #[arg(long)]
    pub dashboard: bool,

    /// Seconds between status log lines when the dashboard is off
    #[arg(long, default_value = "60")]
    pub status_secs: u64,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Symbol to backtest; overrides the configuration
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Timeframe, e.g. 1m
    #[arg(short, long)]
    pub timeframe: Option<String>,

    /// Days of exchange history to load
    #[arg(long)]
    pub days: Option<u32>,

    /// Analysis method: simplest, best_width or math_stat
    #[arg(short, long)]
    pub method: Option<String>,

    /// Compare every analysis method, best average day profit first
    #[arg(long)]
    pub compare: bool,

    /// Read candles from a CSV file instead of the exchange
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,

    /// Save the report as JSON
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save the equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct IntervalArgs {
    /// Symbol to trade; overrides the configuration
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Analysis method: simplest, best_width or math_stat
    #[arg(short, long)]
    pub method: Option<String>,

    /// Seconds between decision ticks
    #[arg(long, default_value = "10")]
    pub tick_secs: u64,

    /// Initial paper balance
    #[arg(long)]
    pub balance: Option<f64>,
}
