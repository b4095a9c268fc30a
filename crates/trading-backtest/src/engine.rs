//! Interval backtesting engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trading_broker::{Ledger, OpenRequest};
use trading_core::error::{StrategyError, TradingError};
use trading_core::money::{floor_lot, to_decimal};
use trading_core::traits::{MarketFeed, StrategyConfig, MAX_HISTORY_LIMIT};
use trading_core::types::{Candle, PositionSide};
use trading_strategies::{interval::MIN_CANDLES, IntervalAnalyzer, IntervalConfig};

use crate::report::BacktestReport;
use crate::statistics::BacktestStats;

const MS_PER_DAY: f64 = 86_400_000.0;
const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

/// Backtest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting quote balance of the simulated ledger
    pub initial_balance: Decimal,
    /// Entry fires at `lower * (1 + entry_tolerance)` or below
    pub entry_tolerance: f64,
    /// Exit fires at `upper * (1 - exit_tolerance)` or above
    pub exit_tolerance: f64,
    /// Days of history requested when loading from a feed
    pub days: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            entry_tolerance: 0.001,
            exit_tolerance: 0.001,
            days: 1,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_balance <= Decimal::ZERO {
            return Err("initial balance must be positive".into());
        }
        if !(0.0..1.0).contains(&self.entry_tolerance) || !(0.0..1.0).contains(&self.exit_tolerance) {
            return Err("tolerances must be in [0, 1)".into());
        }
        if self.days == 0 {
            return Err("days must be at least 1".into());
        }
        Ok(())
    }

    /// Candles to request for `days` of `timeframe_minutes` bars, capped at
    /// the exchange history limit.
    pub fn history_limit(&self, timeframe_minutes: u64) -> usize {
        let per_day = (24 * 60 / timeframe_minutes.max(1)).max(1) as usize;
        (self.days.max(1) as usize * per_day).min(MAX_HISTORY_LIMIT)
    }
}

/// Trains an interval on the first half of a candle history and trades it
/// on the second half.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Load history from `feed` and run a single backtest.
    pub async fn run_from_feed(
        &self,
        feed: &dyn MarketFeed,
        interval_config: &IntervalConfig,
    ) -> Result<BacktestReport, TradingError> {
        let candles = self.load(feed, interval_config).await?;
        Ok(self.run(interval_config, &candles)?)
    }

    /// Backtest every configuration against the same history, best average
    /// day profit first. Configurations that fail are logged and skipped.
    pub async fn run_multiple_from_feed(
        &self,
        feed: &dyn MarketFeed,
        configs: &[IntervalConfig],
    ) -> Result<Vec<BacktestReport>, TradingError> {
        let Some(first) = configs.first() else {
            return Ok(Vec::new());
        };
        let candles = self.load(feed, first).await?;
        Ok(self.run_multiple(configs, &candles))
    }

    async fn load(
        &self,
        feed: &dyn MarketFeed,
        interval_config: &IntervalConfig,
    ) -> Result<Vec<Candle>, TradingError> {
        let limit = self.config.history_limit(interval_config.timeframe.as_minutes());
        let candles = feed
            .historical_candles(&interval_config.symbol, interval_config.timeframe, limit)
            .await?;
        info!(
            symbol = %interval_config.symbol,
            timeframe = %interval_config.timeframe,
            candles = candles.len(),
            "Loaded backtest history"
        );
        Ok(candles)
    }

    /// Run a backtest over `candles`, oldest first.
    pub fn run(
        &self,
        interval_config: &IntervalConfig,
        candles: &[Candle],
    ) -> Result<BacktestReport, StrategyError> {
        interval_config.validate()?;
        let candles: Vec<Candle> = candles.iter().copied().filter(|c| c.is_final).collect();
        if candles.len() < MIN_CANDLES * 2 {
            return Err(StrategyError::InsufficientData {
                required: MIN_CANDLES * 2,
                available: candles.len(),
            });
        }

        let (train, test) = candles.split_at(candles.len() / 2);
        let symbol = interval_config.symbol.as_str();
        let interval = IntervalAnalyzer::new(interval_config.clone()).analyze(symbol, train)?;
        info!(
            symbol,
            lower = interval.lower,
            upper = interval.upper,
            width_pct = interval.width_pct,
            "Training interval"
        );

        let ledger = Ledger::new(self.config.initial_balance);
        let mut stats = BacktestStats::new(self.config.initial_balance);
        let entry_level = interval.lower * (1.0 + self.config.entry_tolerance);
        let exit_level = interval.upper * (1.0 - self.config.exit_tolerance);

        for candle in test {
            let price = candle.close;
            let marked = to_decimal(price);

            match ledger.position(symbol) {
                None if interval.is_valid() && price <= entry_level => {
                    let quantity = floor_lot(to_decimal(interval_config.preferred_position_value / price));
                    let stop = to_decimal(price * (1.0 - interval_config.stop_loss_pct / 100.0));
                    let request = OpenRequest::new(symbol, PositionSide::Long, marked, quantity)
                        .with_levels(stop, to_decimal(interval.upper));
                    if let Err(e) = ledger.open(request) {
                        debug!(error = %e, price, "Backtest entry skipped");
                    }
                }
                Some(position) => {
                    let reason = if price >= exit_level {
                        Some("Take Profit")
                    } else if position.stop_hit(marked) {
                        Some("Stop Loss")
                    } else {
                        None
                    };
                    if let Some(reason) = reason {
                        match ledger.close(symbol, marked, reason) {
                            Ok(trade) => {
                                debug!(
                                    reason,
                                    entry = %trade.entry_price,
                                    exit = %trade.exit_price,
                                    pnl = %trade.pnl,
                                    "Backtest trade closed"
                                );
                                stats.add_trade(trade);
                            }
                            Err(e) => warn!(error = %e, "Backtest exit failed"),
                        }
                    }
                }
                None => {}
            }

            ledger.update_price(symbol, marked);
            stats.record_equity(candle.close_time, ledger.equity());
        }

        let days = span_days(test);
        let periods_per_year = MINUTES_PER_YEAR / interval_config.timeframe.as_minutes().max(1) as f64;
        stats.finalize(ledger.equity(), days, periods_per_year);

        info!(
            symbol,
            trades = stats.total_trades,
            win_rate = %stats.win_rate_pct.round_dp(2),
            profit_pct = %stats.total_profit_pct.round_dp(2),
            "Backtest completed"
        );

        Ok(BacktestReport {
            symbol: symbol.to_string(),
            config: self.config.clone(),
            interval_config: interval_config.clone(),
            interval,
            train_candles: train.len(),
            test_candles: test.len(),
            days,
            open_position: ledger.position(symbol),
            stats,
        })
    }

    /// Backtest every configuration, best average day profit first.
    pub fn run_multiple(&self, configs: &[IntervalConfig], candles: &[Candle]) -> Vec<BacktestReport> {
        let mut reports: Vec<BacktestReport> = configs
            .iter()
            .enumerate()
            .filter_map(|(i, config)| {
                info!("Running backtest {}/{}", i + 1, configs.len());
                self.run(config, candles)
                    .map_err(|e| warn!(error = %e, "Backtest failed"))
                    .ok()
            })
            .collect();
        reports.sort_by(|a, b| b.stats.average_day_profit_pct.cmp(&a.stats.average_day_profit_pct));
        reports
    }
}

/// Days covered by `candles`, at least one.
fn span_days(candles: &[Candle]) -> f64 {
    match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => ((last.close_time - first.open_time) as f64 / MS_PER_DAY).max(1.0),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_strategies::AnalysisMethod;

    /// Candles swinging between roughly 100 and 110.
    fn ranging(n: i64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = match i % 4 {
                    0 => 100.5,
                    1 => 105.0,
                    2 => 109.5,
                    _ => 105.0,
                };
                let t = i * 60_000;
                Candle::new(t, close, 110.0, 100.0, close, 5.0, t + 59_999)
            })
            .collect()
    }

    fn math_stat() -> IntervalConfig {
        IntervalConfig {
            method: AnalysisMethod::MathStat,
            low_percentile: 10.0,
            high_percentile: 90.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_short_history_rejected() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let result = engine.run(&math_stat(), &ranging(12));
        assert!(matches!(result, Err(StrategyError::InsufficientData { .. })));
    }

    #[test]
    fn test_ranging_market_is_profitable() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let report = engine.run(&math_stat(), &ranging(200)).unwrap();

        assert_eq!(report.train_candles, 100);
        assert_eq!(report.test_candles, 100);
        assert!(report.stats.total_trades > 0);
        assert_eq!(report.stats.losing_trades, 0);
        assert!(report.stats.total_profit > Decimal::ZERO);
        assert_eq!(report.stats.equity_curve.len(), 100);
        assert!(report.stats.final_equity > dec!(10000));
    }

    #[test]
    fn test_stop_loss_exit() {
        let mut candles = ranging(100);
        // Collapse after training: enter near the band then fall through the stop.
        for i in 100..120 {
            let close = if i == 100 { 100.5 } else { 90.0 };
            let t = i * 60_000;
            candles.push(Candle::new(t, close, close, close, close, 5.0, t + 59_999));
        }
        let engine = BacktestEngine::new(BacktestConfig::default());
        let report = engine.run(&math_stat(), &candles).unwrap();

        let stopped = report.stats.trades.iter().filter(|t| t.reason == "Stop Loss").count();
        assert!(stopped >= 1);
        assert!(report.stats.losing_trades >= 1);
        assert!(report.stats.max_drawdown_pct > Decimal::ZERO);
    }

    #[test]
    fn test_run_multiple_sorted_by_day_profit() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let mut small = math_stat();
        small.preferred_position_value = 100.0;
        let mut large = math_stat();
        large.preferred_position_value = 2000.0;
        let mut invalid = math_stat();
        invalid.stop_loss_pct = 0.0;

        let reports = engine.run_multiple(&[small, invalid, large], &ranging(200));
        assert_eq!(reports.len(), 2);
        assert!(reports[0].stats.average_day_profit_pct >= reports[1].stats.average_day_profit_pct);
        assert!((reports[0].interval_config.preferred_position_value - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_limit() {
        let config = BacktestConfig {
            days: 3,
            ..Default::default()
        };
        assert_eq!(config.history_limit(1), MAX_HISTORY_LIMIT);
        assert_eq!(config.history_limit(60), 72);
        assert!(BacktestConfig::default().validate().is_ok());
    }
}
