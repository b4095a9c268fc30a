//! Rolling candle buffers keyed by `symbol:timeframe`.

use std::collections::HashMap;

use parking_lot::RwLock;
use trading_core::types::{signal_key, Candle, CandleSeries, Timeframe};

/// Bounded final-candle history per stream.
pub struct CandleStore {
    capacity: usize,
    series: RwLock<HashMap<String, CandleSeries>>,
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Append a final candle. Provisional candles are ignored.
    ///
    /// Returns `true` when the candle extended the series.
    pub fn push(&self, symbol: &str, timeframe: Timeframe, candle: Candle) -> bool {
        if !candle.is_final {
            return false;
        }
        let mut series = self.series.write();
        series
            .entry(signal_key(symbol, timeframe))
            .or_insert_with(|| CandleSeries::with_capacity(symbol, timeframe, self.capacity))
            .push(candle)
    }

    /// Replace the history of a stream.
    pub fn load(&self, symbol: &str, timeframe: Timeframe, candles: impl IntoIterator<Item = Candle>) {
        let mut fresh = CandleSeries::with_capacity(symbol, timeframe, self.capacity);
        fresh.extend(candles.into_iter().filter(|c| c.is_final));
        self.series.write().insert(signal_key(symbol, timeframe), fresh);
    }

    /// Copy of the buffered candles, oldest first.
    pub fn candles(&self, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        self.series
            .read()
            .get(&signal_key(symbol, timeframe))
            .map(CandleSeries::to_vec)
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.series
            .read()
            .get(&signal_key(symbol, timeframe))
            .map_or(0, CandleSeries::len)
    }

    pub fn last(&self, symbol: &str, timeframe: Timeframe) -> Option<Candle> {
        self.series
            .read()
            .get(&signal_key(symbol, timeframe))
            .and_then(|s| s.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(minute: i64) -> Candle {
        let t = minute * 60_000;
        Candle::new(t, 1.0, 1.0, 1.0, minute as f64, 1.0, t + 59_999)
    }

    #[test]
    fn test_push_bounds_and_ignores_provisional() {
        let store = CandleStore::new(3);
        for m in 0..5 {
            store.push("BTCUSDT", Timeframe::Minute1, candle(m));
        }
        assert!(!store.push("BTCUSDT", Timeframe::Minute1, candle(9).provisional()));

        let candles = store.candles("BTCUSDT", Timeframe::Minute1);
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open_time, 2 * 60_000);
        assert_eq!(store.last("BTCUSDT", Timeframe::Minute1).unwrap().open_time, 4 * 60_000);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = CandleStore::new(10);
        store.load("BTCUSDT", Timeframe::Minute1, (0..4).map(candle));
        store.push("BTCUSDT", Timeframe::Minute5, candle(0));
        assert_eq!(store.len("BTCUSDT", Timeframe::Minute1), 4);
        assert_eq!(store.len("BTCUSDT", Timeframe::Minute5), 1);
        assert_eq!(store.len("ETHUSDT", Timeframe::Minute1), 0);
    }

    #[test]
    fn test_duplicate_open_time_replaces() {
        let store = CandleStore::new(10);
        store.push("BTCUSDT", Timeframe::Minute1, candle(1));
        let mut revised = candle(1);
        revised.close = 42.0;
        assert!(!store.push("BTCUSDT", Timeframe::Minute1, revised));
        let candles = store.candles("BTCUSDT", Timeframe::Minute1);
        assert_eq!(candles.len(), 1);
        assert!((candles[0].close - 42.0).abs() < 1e-12);
    }
}
