//! Stop-loss and take-profit placement.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::types::PositionSide;

/// Volatility multipliers used for the stop distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopMultipliers {
    /// Multiplier for ordinary confidence
    pub base: Decimal,
    /// Multiplier above `high_confidence`
    pub tight: Decimal,
    /// Multiplier below `low_confidence`
    pub wide: Decimal,
    pub high_confidence: f64,
    pub low_confidence: f64,
}

impl Default for StopMultipliers {
    fn default() -> Self {
        Self {
            base: dec!(1.5),
            tight: dec!(1.2),
            wide: dec!(1.8),
            high_confidence: 0.7,
            low_confidence: 0.4,
        }
    }
}

impl StopMultipliers {
    /// Multiplier for a signal of the given confidence.
    pub fn for_confidence(&self, confidence: f64) -> Decimal {
        if confidence > self.high_confidence {
            self.tight
        } else if confidence < self.low_confidence {
            self.wide
        } else {
            self.base
        }
    }
}

/// Computes protective stops and profit targets.
#[derive(Debug, Clone)]
pub struct StopLossCalculator {
    multipliers: StopMultipliers,
    /// Percent of price used when no volatility measure is available
    fallback_pct: Decimal,
}

impl StopLossCalculator {
    pub fn new(multipliers: StopMultipliers, fallback_pct: Decimal) -> Self {
        Self {
            multipliers,
            fallback_pct,
        }
    }

    /// Distance between entry and stop.
    pub fn distance(&self, entry: Decimal, volatility: Decimal, confidence: f64) -> Decimal {
        if volatility > Decimal::ZERO {
            volatility * self.multipliers.for_confidence(confidence)
        } else {
            entry * self.fallback_pct / Decimal::ONE_HUNDRED
        }
    }

    /// Stop price for a new position.
    pub fn stop_price(
        &self,
        entry: Decimal,
        volatility: Decimal,
        side: PositionSide,
        confidence: f64,
    ) -> Decimal {
        let distance = self.distance(entry, volatility, confidence);
        match side {
            PositionSide::Long => entry - distance,
            PositionSide::Short => entry + distance,
        }
    }
}

/// Target `ratio` times the stop distance away on the profit side.
pub fn take_profit_price(
    entry: Decimal,
    stop: Decimal,
    side: PositionSide,
    ratio: Decimal,
) -> Decimal {
    let distance = (entry - stop).abs() * ratio;
    match side {
        PositionSide::Long => entry + distance,
        PositionSide::Short => entry - distance,
    }
}
