//! Interval trading strategy.
//!
//! Buys in the lower part of the analysed price band and sells near its
//! upper bound or at the stop.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    money::to_f64,
    traits::{Strategy, StrategyConfig, StrategyContext, StrategyState, TradeProposal},
    types::{Candle, CandleSeries, PositionSide},
};

use crate::interval::{IntervalAnalyzer, IntervalConfig, PriceInterval};

/// Fraction of the band, measured from the lower bound, in which entries are taken.
const ENTRY_ZONE: f64 = 0.6;
/// Entries are also taken within this percent above the lower bound.
const ENTRY_DISTANCE_PCT: f64 = 10.0;
/// Exits are taken once price is within this percent of the upper bound.
const EXIT_DISTANCE_PCT: f64 = 0.1;

/// Counters kept across completed round trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub successful_trades: usize,
    pub failed_trades: usize,
    /// Completed buy/sell round trips
    pub total_crosses: usize,
    pub last_recalculation: Option<DateTime<Utc>>,
}

/// Strategy trading a single analysed price band.
pub struct IntervalStrategy {
    config: IntervalConfig,
    analyzer: IntervalAnalyzer,
    history: CandleSeries,
    interval: Option<PriceInterval>,
    stats: IntervalStats,
    candles_processed: usize,
    proposals_made: usize,
}

impl IntervalStrategy {
    pub fn new(config: IntervalConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let history =
            CandleSeries::with_capacity(config.symbol.clone(), config.timeframe, config.candle_limit());
        Ok(Self {
            analyzer: IntervalAnalyzer::new(config.clone()),
            config,
            history,
            interval: None,
            stats: IntervalStats::default(),
            candles_processed: 0,
            proposals_made: 0,
        })
    }

    pub fn config(&self) -> &IntervalConfig {
        &self.config
    }

    /// The band currently traded.
    pub fn interval(&self) -> Option<&PriceInterval> {
        self.interval.as_ref()
    }

    pub fn stats(&self) -> &IntervalStats {
        &self.stats
    }

    /// Replace the traded band.
    pub fn set_interval(&mut self, interval: PriceInterval) {
        tracing::info!(
            symbol = %interval.symbol,
            lower = interval.lower,
            upper = interval.upper,
            width_pct = interval.width_pct,
            volatility = interval.volatility,
            "Active interval updated"
        );
        self.stats.last_recalculation = Some(interval.calculated_at);
        self.interval = Some(interval);
    }

    /// Analyse `candles` and trade the resulting band.
    pub fn recalculate(&mut self, candles: &[Candle]) -> Result<&PriceInterval, StrategyError> {
        let interval = self.analyzer.analyze(&self.config.symbol, candles)?;
        self.history.clear();
        self.history.extend(candles.iter().cloned());
        self.set_interval(interval);
        self.interval
            .as_ref()
            .ok_or_else(|| StrategyError::Internal("interval missing after update".into()))
    }

    /// Re-analyse from the candles received so far.
    pub fn recalculate_from_history(&mut self) -> Result<&PriceInterval, StrategyError> {
        let candles = self.history.to_vec();
        self.recalculate(&candles)
    }

    /// Whether the band is missing or older than `recalculate_hours`.
    pub fn needs_recalculation(&self, now: DateTime<Utc>) -> bool {
        match self.stats.last_recalculation {
            None => true,
            Some(at) => now - at >= Duration::hours(self.config.recalculate_hours as i64),
        }
    }

    /// Record the outcome of a completed round trip.
    pub fn record_close(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.stats.successful_trades += 1;
        } else {
            self.stats.failed_trades += 1;
        }
        self.stats.total_crosses += 1;
    }

    /// Whether `price` sits in the band's entry zone.
    pub fn should_buy(&self, price: f64, interval: &PriceInterval) -> bool {
        let range = interval.range();
        if range <= 0.0 || interval.lower <= 0.0 {
            return false;
        }
        let zone_top = interval.lower + range * ENTRY_ZONE;
        let distance_pct = (price - interval.lower) / interval.lower * 100.0;
        price <= zone_top || (0.0..=ENTRY_DISTANCE_PCT).contains(&distance_pct)
    }

    /// Whether an open long at `stop` should be closed at `price`.
    pub fn should_sell(&self, price: f64, stop: f64, interval: &PriceInterval) -> bool {
        if price <= 0.0 {
            return false;
        }
        let upper_distance_pct = (interval.upper - price) / price * 100.0;
        upper_distance_pct <= EXIT_DISTANCE_PCT || price <= stop
    }

    fn entry(&self, ctx: &StrategyContext<'_>, interval: &PriceInterval) -> TradeProposal {
        let price = ctx.price;
        let mut quantity = self.config.preferred_position_value / price;
        let cost = quantity * price;
        if cost > self.config.max_position_value {
            quantity = self.config.max_position_value / price;
        }
        if quantity * price > ctx.balance * 0.99 {
            quantity = ctx.balance * 0.9 / price;
        }
        if quantity <= 0.0 || !quantity.is_finite() {
            return TradeProposal::Hold;
        }

        TradeProposal::Open {
            side: PositionSide::Long,
            quantity,
            stop_loss: price * (1.0 - self.config.stop_loss_pct / 100.0),
            take_profit: interval.upper,
            reason: format!(
                "Price {:.8} in entry zone of [{:.8} - {:.8}]",
                price, interval.lower, interval.upper
            ),
        }
    }
}

impl Strategy for IntervalStrategy {
    fn name(&self) -> &str {
        "Interval"
    }

    fn description(&self) -> &str {
        "Buys the lower part of a frequently traversed price band and sells near its top"
    }

    fn on_candle(&mut self, candle: &Candle) {
        if candle.is_final && self.history.push(candle.clone()) {
            self.candles_processed += 1;
        }
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> TradeProposal {
        let Some(interval) = self.interval.clone() else {
            tracing::warn!(symbol = ctx.symbol, "No active interval, skipping");
            return TradeProposal::Hold;
        };
        if ctx.price <= 0.0 || ctx.symbol != self.config.symbol {
            return TradeProposal::Hold;
        }

        let proposal = match ctx.position {
            None => {
                if ctx.open_positions >= self.config.max_positions {
                    tracing::debug!(
                        open = ctx.open_positions,
                        max = self.config.max_positions,
                        "Max positions reached"
                    );
                    TradeProposal::Hold
                } else if self.should_buy(ctx.price, &interval) {
                    self.entry(ctx, &interval)
                } else {
                    TradeProposal::Hold
                }
            }
            Some(position) => {
                let stop = to_f64(position.stop_loss);
                if self.should_sell(ctx.price, stop, &interval) {
                    let reason = if ctx.price <= stop {
                        "Interval stop loss"
                    } else {
                        "Interval upper bound reached"
                    };
                    TradeProposal::Close {
                        reason: reason.to_string(),
                    }
                } else {
                    TradeProposal::Hold
                }
            }
        };

        if proposal != TradeProposal::Hold {
            self.proposals_made += 1;
        }
        proposal
    }

    fn reset(&mut self) {
        self.history.clear();
        self.interval = None;
        self.stats = IntervalStats::default();
        self.candles_processed = 0;
        self.proposals_made = 0;
    }

    fn state(&self) -> StrategyState {
        let mut indicators = std::collections::HashMap::new();
        if let Some(interval) = &self.interval {
            indicators.insert("lower".to_string(), interval.lower);
            indicators.insert("upper".to_string(), interval.upper);
            indicators.insert("width_pct".to_string(), interval.width_pct);
            indicators.insert("volatility".to_string(), interval.volatility);
        }

        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.interval.is_some(),
            candles_processed: self.candles_processed,
            proposals_made: self.proposals_made,
            indicators,
            custom: serde_json::json!({
                "method": self.config.method,
                "successful_trades": self.stats.successful_trades,
                "failed_trades": self.stats.failed_trades,
                "total_crosses": self.stats.total_crosses,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::types::Position;

    fn interval() -> PriceInterval {
        PriceInterval {
            symbol: "BTCUSDT".to_string(),
            lower: 100.0,
            upper: 110.0,
            median: 105.0,
            width_pct: 9.5,
            crosses: 4,
            volatility: 38.0,
            candles_analyzed: 100,
            calculated_at: Utc::now(),
        }
    }

    fn strategy() -> IntervalStrategy {
        let mut s = IntervalStrategy::new(IntervalConfig::default()).unwrap();
        s.set_interval(interval());
        s
    }

    fn ctx(price: f64, position: Option<&Position>) -> StrategyContext<'_> {
        StrategyContext {
            symbol: "BTCUSDT",
            price,
            balance: 10_000.0,
            open_positions: usize::from(position.is_some()),
            position,
        }
    }

    #[test]
    fn test_holds_without_interval() {
        let mut s = IntervalStrategy::new(IntervalConfig::default()).unwrap();
        assert_eq!(s.propose(&ctx(100.0, None)), TradeProposal::Hold);
        assert!(s.needs_recalculation(Utc::now()));
    }

    #[test]
    fn test_buy_in_entry_zone() {
        let mut s = strategy();
        match s.propose(&ctx(105.0, None)) {
            TradeProposal::Open {
                side,
                quantity,
                stop_loss,
                take_profit,
                ..
            } => {
                assert_eq!(side, PositionSide::Long);
                assert!((quantity - 1000.0 / 105.0).abs() < 1e-9);
                assert!((stop_loss - 105.0 * 0.985).abs() < 1e-9);
                assert_eq!(take_profit, 110.0);
            }
            other => panic!("unexpected proposal: {:?}", other),
        }
        assert_eq!(s.state().proposals_made, 1);
    }

    #[test]
    fn test_entry_within_distance_of_lower() {
        let s = strategy();
        let wide = PriceInterval {
            upper: 200.0,
            ..interval()
        };
        // Above the zone top (160) and 70% above the lower bound.
        assert!(!s.should_buy(170.0, &wide));
        assert!(s.should_buy(108.0, &wide));
        // Narrow band: 6% above lower is outside the zone but within 10%.
        assert!(s.should_buy(106.5, &interval()));
    }

    #[test]
    fn test_entry_capped_by_balance() {
        let mut s = strategy();
        let c = StrategyContext {
            balance: 500.0,
            ..ctx(100.0, None)
        };
        match s.propose(&c) {
            TradeProposal::Open { quantity, .. } => assert!((quantity - 4.5).abs() < 1e-9),
            other => panic!("unexpected proposal: {:?}", other),
        }
    }

    #[test]
    fn test_max_positions_blocks_entry() {
        let mut s = strategy();
        let c = StrategyContext {
            open_positions: 3,
            ..ctx(100.0, None)
        };
        assert_eq!(s.propose(&c), TradeProposal::Hold);
    }

    #[test]
    fn test_sell_at_upper_or_stop() {
        let mut s = strategy();
        let position = Position::new(
            "BTCUSDT",
            PositionSide::Long,
            dec!(105),
            dec!(1),
            dec!(103),
            dec!(110),
        );

        assert_eq!(s.propose(&ctx(106.0, Some(&position))), TradeProposal::Hold);
        assert_eq!(
            s.propose(&ctx(109.95, Some(&position))),
            TradeProposal::Close {
                reason: "Interval upper bound reached".to_string()
            }
        );
        assert_eq!(
            s.propose(&ctx(102.0, Some(&position))),
            TradeProposal::Close {
                reason: "Interval stop loss".to_string()
            }
        );
    }

    #[test]
    fn test_record_close_and_recalculate() {
        let mut s = strategy();
        s.record_close(5.0);
        s.record_close(-1.0);
        assert_eq!(s.stats().successful_trades, 1);
        assert_eq!(s.stats().failed_trades, 1);
        assert_eq!(s.stats().total_crosses, 2);

        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle::new(i * 60_000, 100.0, 101.0, 99.0, 100.0, 1.0, i * 60_000 + 59_999))
            .collect();
        for c in &candles {
            s.on_candle(c);
        }
        assert_eq!(s.state().candles_processed, 20);
        let interval = s.recalculate_from_history().unwrap().clone();
        assert!(interval.is_valid());
        assert!(!s.needs_recalculation(Utc::now()));
    }
}
