//! Unified risk engine.

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trading_core::types::PositionSide;

use crate::{
    stop_loss::take_profit_price, LimitCheck, PortfolioLimits, PositionSizer, StopLossCalculator,
    StopMultipliers,
};

/// Risk management configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of the balance risked per trade
    pub risk_per_trade: Decimal,
    /// Largest fraction of the balance one position may cost
    pub max_position_fraction: Decimal,
    /// Stop distance in percent of price when volatility is unknown
    pub default_stop_loss_pct: Decimal,
    /// Daily loss, as a fraction of the balance, that halts new entries
    pub daily_loss_limit: Decimal,
    /// Total exposure allowed, in multiples of `max_position_fraction`
    pub exposure_multiple: Decimal,
    /// Reward-to-risk ratio used for take-profit targets
    pub default_reward_ratio: Decimal,
    pub stop_multipliers: StopMultipliers,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.05),
            max_position_fraction: dec!(0.2),
            default_stop_loss_pct: dec!(2),
            daily_loss_limit: dec!(0.05),
            exposure_multiple: dec!(3),
            default_reward_ratio: dec!(1.5),
            stop_multipliers: StopMultipliers::default(),
        }
    }
}

impl RiskConfig {
    /// Reject configurations that would size or stop nonsensically.
    pub fn validate(&self) -> Result<(), String> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.risk_per_trade) || self.risk_per_trade.is_zero() {
            return Err(format!("risk_per_trade must be in (0, 1], got {}", self.risk_per_trade));
        }
        if !unit.contains(&self.max_position_fraction) || self.max_position_fraction.is_zero() {
            return Err(format!(
                "max_position_fraction must be in (0, 1], got {}",
                self.max_position_fraction
            ));
        }
        if self.default_stop_loss_pct <= Decimal::ZERO {
            return Err("default_stop_loss_pct must be positive".to_string());
        }
        if self.daily_loss_limit <= Decimal::ZERO {
            return Err("daily_loss_limit must be positive".to_string());
        }
        if self.exposure_multiple <= Decimal::ZERO {
            return Err("exposure_multiple must be positive".to_string());
        }
        if self.default_reward_ratio <= Decimal::ZERO {
            return Err("default_reward_ratio must be positive".to_string());
        }
        Ok(())
    }

    fn sizer(&self) -> PositionSizer {
        PositionSizer::new(self.risk_per_trade, self.max_position_fraction)
    }

    fn stops(&self) -> StopLossCalculator {
        StopLossCalculator::new(self.stop_multipliers.clone(), self.default_stop_loss_pct)
    }

    fn limits(&self) -> PortfolioLimits {
        PortfolioLimits {
            max_position_fraction: self.max_position_fraction,
            exposure_multiple: self.exposure_multiple,
            daily_loss_limit: self.daily_loss_limit,
        }
    }
}

/// Realised results for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_trades: u32,
    pub total_pnl: Decimal,
    /// Lowest running PnL seen during the day
    pub max_daily_loss: Decimal,
    pub trades_won: u32,
    pub trades_lost: u32,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_trades: 0,
            total_pnl: Decimal::ZERO,
            max_daily_loss: Decimal::ZERO,
            trades_won: 0,
            trades_lost: 0,
        }
    }
}

/// Sizing, stops and circuit breakers shared by every trading path.
///
/// Configuration and daily statistics sit behind separate locks so a config
/// swap never resets the day's results.
pub struct RiskEngine {
    config: RwLock<RiskConfig>,
    daily: Mutex<DailyStats>,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config: RwLock::new(config),
            daily: Mutex::new(DailyStats::new(Utc::now().date_naive())),
        }
    }

    pub fn config(&self) -> RiskConfig {
        self.config.read().clone()
    }

    /// Replace the configuration. Daily statistics are kept.
    pub fn update_config(&self, config: RiskConfig) {
        info!(
            risk_per_trade = %config.risk_per_trade,
            max_position_fraction = %config.max_position_fraction,
            "Risk configuration updated"
        );
        *self.config.write() = config;
    }

    /// Quantity to trade for the given entry and stop; zero means "do not trade".
    pub fn position_size(&self, balance: Decimal, entry: Decimal, stop: Decimal) -> Decimal {
        self.config.read().sizer().calculate(balance, entry, stop)
    }

    /// Protective stop for a new position.
    pub fn stop_loss(
        &self,
        entry: Decimal,
        volatility: Decimal,
        side: PositionSide,
        confidence: f64,
    ) -> Decimal {
        self.config
            .read()
            .stops()
            .stop_price(entry, volatility, side, confidence)
    }

    /// Profit target at `reward_ratio` times the stop distance.
    pub fn take_profit(
        &self,
        entry: Decimal,
        stop: Decimal,
        side: PositionSide,
        reward_ratio: Decimal,
    ) -> Decimal {
        take_profit_price(entry, stop, side, reward_ratio)
    }

    /// Profit target using the configured reward ratio.
    pub fn default_take_profit(&self, entry: Decimal, stop: Decimal, side: PositionSide) -> Decimal {
        let ratio = self.config.read().default_reward_ratio;
        take_profit_price(entry, stop, side, ratio)
    }

    /// Check exposure and the daily loss breaker.
    pub fn check_open(&self, balance: Decimal, exposure: Decimal) -> LimitCheck {
        let daily_pnl = self.daily.lock().total_pnl;
        let check = self
            .config
            .read()
            .limits()
            .check_new_position(balance, exposure, daily_pnl);
        if let LimitCheck::Blocked { reason } = &check {
            debug!(%reason, "New position blocked");
        }
        check
    }

    pub fn can_open(&self, balance: Decimal, exposure: Decimal) -> bool {
        self.check_open(balance, exposure).is_allowed()
    }

    /// Record a realised trade result for today.
    pub fn record_trade(&self, pnl: Decimal) {
        let mut daily = self.daily.lock();
        daily.total_trades += 1;
        daily.total_pnl += pnl;
        if pnl > Decimal::ZERO {
            daily.trades_won += 1;
        } else {
            daily.trades_lost += 1;
        }
        if daily.total_pnl < daily.max_daily_loss {
            daily.max_daily_loss = daily.total_pnl;
        }
        debug!(%pnl, total_pnl = %daily.total_pnl, trades = daily.total_trades, "Trade recorded");
    }

    /// Start a new trading day. A no-op when `date` is the current day.
    pub fn reset_daily(&self, date: NaiveDate) {
        let mut daily = self.daily.lock();
        if daily.date == date {
            return;
        }
        if daily.total_pnl.is_sign_negative() {
            warn!(date = %daily.date, pnl = %daily.total_pnl, "Closing losing day");
        }
        info!(
            date = %daily.date,
            trades = daily.total_trades,
            pnl = %daily.total_pnl,
            "Daily stats reset"
        );
        *daily = DailyStats::new(date);
    }

    pub fn daily_stats(&self) -> DailyStats {
        self.daily.lock().clone()
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
