//! Configuration structures.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_backtest::BacktestConfig;
use trading_core::traits::StrategyConfig;
use trading_data::{StreamConfig, DEFAULT_FEAR_GREED_URL, DEFAULT_REST_URL, DEFAULT_WS_URL};
use trading_engine::{BotConfig, EngineConfig};
use trading_risk::RiskConfig;
use trading_strategies::{AggregatorConfig, IntervalConfig};

use crate::ConfigError;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub bot: BotConfig,
    /// Per-symbol engine thresholds; the symbol is filled in per engine
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub signals: AggregatorConfig,
    #[serde(default)]
    pub interval: IntervalConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

impl AppConfig {
    /// Check every section, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |section: &'static str| move |message: String| ConfigError::Invalid { section, message };

        self.app.validate().map_err(invalid("app"))?;
        self.logging.validate().map_err(invalid("logging"))?;
        self.exchange.validate().map_err(invalid("exchange"))?;
        self.bot.validate().map_err(invalid("bot"))?;
        self.engine.validate().map_err(invalid("engine"))?;
        self.risk.validate().map_err(invalid("risk"))?;
        validate_signals(&self.signals).map_err(invalid("signals"))?;
        self.interval
            .validate()
            .map_err(|e| invalid("interval")(e.to_string()))?;
        self.backtest.validate().map_err(invalid("backtest"))?;
        Ok(())
    }
}

fn validate_signals(signals: &AggregatorConfig) -> Result<(), String> {
    let weights = [signals.technical_weight, signals.ml_weight, signals.sentiment_weight];
    if weights.iter().any(|w| *w < 0.0) {
        return Err("score weights must not be negative".into());
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err("at least one score weight must be positive".into());
    }
    if !(0.0..=1.0).contains(&signals.confidence_floor) {
        return Err("confidence_floor must be in [0, 1]".into());
    }
    Ok(())
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
    /// Starting quote balance of the paper ledger
    pub initial_balance: Decimal,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "autotrader".to_string(),
            environment: "development".to_string(),
            initial_balance: dec!(10000),
        }
    }
}

impl AppSettings {
    fn validate(&self) -> Result<(), String> {
        if self.initial_balance <= Decimal::ZERO {
            return Err("initial_balance must be positive".into());
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily-rolling log files
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> Result<(), String> {
        match self.format.to_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Exchange and external scorer endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub rest_url: String,
    pub ws_url: String,
    pub reconnect_delay_secs: u64,
    pub ping_interval_secs: u64,
    /// Handshake timeout of a WebSocket connect attempt
    pub connect_timeout_secs: u64,
    /// Capacity of each candle subscription channel
    pub channel_capacity: usize,
    /// Prediction service base URL; ML scoring is off without it
    pub ml_url: Option<String>,
    pub sentiment_url: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay_secs: 5,
            ping_interval_secs: 30,
            connect_timeout_secs: 10,
            channel_capacity: 100,
            ml_url: None,
            sentiment_url: DEFAULT_FEAR_GREED_URL.to_string(),
        }
    }
}

impl ExchangeSettings {
    /// WebSocket parameters for the market feed.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            base_url: self.ws_url.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            channel_capacity: self.channel_capacity,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.rest_url.starts_with("http") {
            return Err(format!("rest_url must be an http(s) URL: {}", self.rest_url));
        }
        if !self.ws_url.starts_with("ws") {
            return Err(format!("ws_url must be a ws(s) URL: {}", self.ws_url));
        }
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be at least 1".into());
        }
        if self.reconnect_delay_secs == 0
            || self.ping_interval_secs == 0
            || self.connect_timeout_secs == 0
        {
            return Err("exchange intervals and timeouts must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_section_is_named() {
        let mut config = AppConfig::default();
        config.logging.format = "xml".to_string();
        match config.validate() {
            Err(ConfigError::Invalid { section, .. }) => assert_eq!(section, "logging"),
            other => panic!("unexpected result: {:?}", other),
        }

        let mut config = AppConfig::default();
        config.interval.stop_loss_pct = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { section: "interval", .. })
        ));
    }

    #[test]
    fn test_stream_config() {
        let settings = ExchangeSettings {
            reconnect_delay_secs: 7,
            ..Default::default()
        };
        let stream = settings.stream_config();
        assert_eq!(stream.reconnect_delay, Duration::from_secs(7));
        assert_eq!(stream.channel_capacity, 100);
    }
}
