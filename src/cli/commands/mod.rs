//! CLI command implementations.

pub mod backtest;
pub mod interval;
pub mod run;
pub mod strategies;
pub mod validate;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use trading_config::AppConfig;
use trading_core::money::to_decimal;
use trading_core::types::Timeframe;
use trading_data::{ExchangeFeed, RestClient};

/// Market feed against the configured exchange endpoints.
pub fn exchange_feed(config: &AppConfig) -> Result<Arc<ExchangeFeed>> {
    let rest = RestClient::new(config.exchange.rest_url.clone())
        .context("Failed to create REST client")?;
    Ok(Arc::new(ExchangeFeed::new(rest, config.exchange.stream_config())))
}

pub fn parse_timeframe(value: &str) -> Result<Timeframe> {
    value
        .parse::<Timeframe>()
        .map_err(|e| anyhow!("Invalid timeframe '{}': {}", value, e))
}

/// Positive balance from a CLI flag, or the configured one.
pub fn initial_balance(flag: Option<f64>, config: &AppConfig) -> Result<Decimal> {
    match flag {
        None => Ok(config.app.initial_balance),
        Some(value) => {
            let balance = to_decimal(value);
            if balance <= Decimal::ZERO {
                anyhow::bail!("Balance must be positive, got {}", value);
            }
            Ok(balance)
        }
    }
}
