//! Candle (kline) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::Timeframe;

/// OHLCV summary of one exchange time bucket.
///
/// Prices are `f64` for fast indicator math. A candle with `is_final == false`
/// is a provisional snapshot of a bucket that is still open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time, Unix milliseconds
    pub open_time: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing (or latest) price
    pub close: f64,
    /// Traded base volume
    pub volume: f64,
    /// Bucket close time, Unix milliseconds
    pub close_time: i64,
    /// Whether the bucket has closed
    pub is_final: bool,
}

impl Candle {
    /// Create a final candle.
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
            is_final: true,
        }
    }

    /// Mark the candle as provisional.
    pub fn provisional(mut self) -> Self {
        self.is_final = false;
        self
    }

    /// Average of open, high, low and close.
    #[inline]
    pub fn average_price(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// Calculate the typical price (HLC average).
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Calculate the candle's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check whether the candle spans both bounds of a price band.
    #[inline]
    pub fn crosses(&self, lower: f64, upper: f64) -> bool {
        self.high >= upper && self.low <= lower
    }

    /// Close time as a DateTime.
    pub fn closed_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.close_time).unwrap_or_default()
    }

    /// Calculate the true range (used for ATR and ADX).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => {
                let hl = self.high - self.low;
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => self.high - self.low,
        }
    }
}

/// Bounded rolling window of final candles for one `(symbol, timeframe)` key.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    /// Symbol identifier
    pub symbol: String,
    /// Timeframe of the candles
    pub timeframe: Timeframe,
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    /// Default number of candles retained per key.
    pub const DEFAULT_CAPACITY: usize = 500;

    /// Create a series with a maximum capacity. Oldest candles are evicted first.
    pub fn with_capacity(symbol: impl Into<String>, timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a candle, evicting the oldest when full.
    ///
    /// A candle with the same open time as the newest one replaces it, so a
    /// duplicated delivery of a closed bucket is not counted twice. Candles older
    /// than the newest one are ignored.
    pub fn push(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.candles.back_mut() {
            if candle.open_time == last.open_time {
                *last = candle;
                return false;
            }
            if candle.open_time < last.open_time {
                return false;
            }
        }
        if self.candles.len() >= self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        true
    }

    /// Push multiple candles.
    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.push(candle);
        }
    }

    /// Get the number of candles.
    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Check if the series is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Maximum number of retained candles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the newest candle.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Get a candle by index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Extract close prices.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Copy the candles out, oldest first.
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    /// Get an iterator over the candles.
    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Clear all candles.
    pub fn clear(&mut self) {
        self.candles.clear();
    }
}
