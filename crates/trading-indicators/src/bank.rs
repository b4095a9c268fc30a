//! Per-stream indicator bank and the registry that owns one bank per stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use trading_core::traits::{OhlcvIndicator, StreamingIndicator, VoteSource};
use trading_core::types::{signal_key, Candle, Timeframe, Vote};

use crate::momentum::{Macd, Momentum, Rsi, StochRsi};
use crate::moving_average::Ema;
use crate::trend::{Adx, Cci, WilliamsR};
use crate::volatility::{Atr, BollingerBands};
use crate::volume::Obv;

/// Every indicator value after one update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi14: f64,
    pub rsi7: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_percent_b: f64,
    pub atr14: f64,
    pub stoch_rsi_k: f64,
    pub stoch_rsi_d: f64,
    pub obv: f64,
    pub adx: f64,
    pub cci: f64,
    pub williams: f64,
    pub momentum: f64,
}

/// The full indicator set for one `(symbol, timeframe)` stream.
///
/// Only final candles should be fed in; the bank never sees a candle twice.
#[derive(Debug, Clone)]
pub struct IndicatorBank {
    ema9: Ema,
    ema21: Ema,
    ema50: Ema,
    ema200: Ema,
    rsi14: Rsi,
    rsi7: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
    atr: Atr,
    stoch_rsi: StochRsi,
    obv: Obv,
    adx: Adx,
    cci: Cci,
    williams: WilliamsR,
    momentum: Momentum,
    updates: usize,
}

impl Default for IndicatorBank {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorBank {
    pub fn new() -> Self {
        Self {
            ema9: Ema::new(9),
            ema21: Ema::new(21),
            ema50: Ema::new(50),
            ema200: Ema::new(200),
            rsi14: Rsi::new(14),
            rsi7: Rsi::new(7),
            macd: Macd::default(),
            bollinger: BollingerBands::default(),
            atr: Atr::new(14),
            stoch_rsi: StochRsi::default(),
            obv: Obv::new(),
            adx: Adx::default(),
            cci: Cci::default(),
            williams: WilliamsR::default(),
            momentum: Momentum::default(),
            updates: 0,
        }
    }

    /// Feed one candle's high/low/close/volume to every indicator.
    pub fn update(&mut self, high: f64, low: f64, close: f64, volume: f64) -> IndicatorSnapshot {
        self.updates += 1;

        let macd = self.macd.update(close);
        let bands = self.bollinger.update(close);
        let stoch = self.stoch_rsi.update(close);

        IndicatorSnapshot {
            ema9: self.ema9.update(close),
            ema21: self.ema21.update(close),
            ema50: self.ema50.update(close),
            ema200: self.ema200.update(close),
            rsi14: self.rsi14.update(close),
            rsi7: self.rsi7.update(close),
            macd_line: macd.macd,
            macd_signal: macd.signal,
            macd_hist: macd.histogram,
            bb_upper: bands.upper,
            bb_middle: bands.middle,
            bb_lower: bands.lower,
            bb_percent_b: bands.percent_b(close),
            atr14: self.atr.update(high, low, close, volume),
            stoch_rsi_k: stoch.k,
            stoch_rsi_d: stoch.d,
            obv: self.obv.update(close, volume),
            adx: self.adx.update(high, low, close, volume).adx,
            cci: self.cci.update(high, low, close, volume),
            williams: self.williams.update(high, low, close, volume),
            momentum: self.momentum.update(close),
        }
    }

    /// Feed a candle.
    pub fn update_candle(&mut self, candle: &Candle) -> IndicatorSnapshot {
        self.update(candle.high, candle.low, candle.close, candle.volume)
    }

    /// Collect every indicator's vote at `price`.
    pub fn votes(&self, price: f64) -> Vec<Vote> {
        let mut votes = vec![
            self.rsi14.vote(price),
            self.rsi7.vote(price),
            self.macd.vote(price),
            self.bollinger.vote(price),
            self.stoch_rsi.vote(price),
            self.adx.vote(price),
            self.cci.vote(price),
            self.williams.vote(price),
            self.momentum.vote(price),
        ];
        votes.extend(self.ema_votes(price));
        votes.push(self.obv.vote(price));
        votes
    }

    /// Trend-alignment votes from the EMA stack.
    fn ema_votes(&self, price: f64) -> Vec<Vote> {
        let e9 = self.ema9.current();
        let e21 = self.ema21.current();
        let e50 = self.ema50.current();
        let e200 = self.ema200.current();
        let mut votes = Vec::with_capacity(2);

        if e9 > e21 && e21 > e50 && e50 > e200 {
            votes.push(Vote::buy("EMA", 0.8, "Strong uptrend (all EMAs aligned)"));
        } else if e9 > e21 && e21 > e50 {
            votes.push(Vote::buy("EMA", 0.6, "EMA9 above EMA21 and EMA50"));
        } else if e9 > e21 {
            votes.push(Vote::buy("EMA", 0.4, "EMA9 above EMA21"));
        } else if e9 < e21 && e21 < e50 && e50 < e200 {
            votes.push(Vote::sell("EMA", 0.8, "Strong downtrend (all EMAs aligned)"));
        } else if e9 < e21 && e21 < e50 {
            votes.push(Vote::sell("EMA", 0.6, "EMA9 below EMA21 and EMA50"));
        } else if e9 < e21 {
            votes.push(Vote::sell("EMA", 0.4, "EMA9 below EMA21"));
        }

        if price > e9 && e9 > e21 {
            votes.push(Vote::buy("EMA", 0.3, "Price above EMAs"));
        } else if price < e9 && e9 < e21 {
            votes.push(Vote::sell("EMA", 0.3, "Price below EMAs"));
        }
        votes
    }

    /// Latest ATR value.
    pub fn atr(&self) -> f64 {
        self.atr.current()
    }

    /// Number of candles fed since creation or the last reset.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Whether the slowest indicator has finished warming up.
    pub fn is_warmed_up(&self) -> bool {
        self.ema200.is_ready()
    }

    /// Restore the cold state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Lazily creates and hands out one shared bank per `"symbol:timeframe"`.
#[derive(Debug, Default)]
pub struct IndicatorManager {
    banks: RwLock<HashMap<String, Arc<Mutex<IndicatorBank>>>>,
}

impl IndicatorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bank for a stream, creating it on first use.
    pub fn get_or_create(&self, symbol: &str, timeframe: Timeframe) -> Arc<Mutex<IndicatorBank>> {
        let key = signal_key(symbol, timeframe);

        if let Some(bank) = self.banks.read().get(&key) {
            return Arc::clone(bank);
        }

        let mut banks = self.banks.write();
        // Another writer may have won the race.
        Arc::clone(
            banks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(IndicatorBank::new()))),
        )
    }

    /// Number of streams with a bank.
    pub fn len(&self) -> usize {
        self.banks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::VoteKind;

    fn feed(bank: &mut IndicatorBank, prices: impl IntoIterator<Item = f64>) -> IndicatorSnapshot {
        let mut snap = IndicatorSnapshot::default();
        for p in prices {
            snap = bank.update(p + 0.5, p - 0.5, p, 1000.0);
        }
        snap
    }

    fn all_finite(s: &IndicatorSnapshot) -> bool {
        [
            s.ema9, s.ema21, s.ema50, s.ema200, s.rsi14, s.rsi7, s.macd_line, s.macd_signal,
            s.macd_hist, s.bb_upper, s.bb_middle, s.bb_lower, s.bb_percent_b, s.atr14,
            s.stoch_rsi_k, s.stoch_rsi_d, s.obv, s.adx, s.cci, s.williams, s.momentum,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    #[test]
    fn test_first_update_is_neutral() {
        let mut bank = IndicatorBank::new();
        let snap = bank.update(101.0, 99.0, 100.0, 10.0);
        assert_eq!(snap.rsi14, 50.0);
        assert_eq!(snap.ema9, 100.0);
        assert_eq!(snap.bb_percent_b, 0.5);
        assert!(all_finite(&snap));
        assert!(!bank.is_warmed_up());
    }

    #[test]
    fn test_uptrend_votes_lean_buy() {
        let mut bank = IndicatorBank::new();
        feed(&mut bank, (0..250).map(|i| 100.0 + i as f64 * 0.5));
        assert!(bank.is_warmed_up());

        let votes = bank.votes(225.0);
        let ema: Vec<_> = votes.iter().filter(|v| v.indicator == "EMA").collect();
        assert_eq!(ema.len(), 2);
        assert!(ema.iter().all(|v| v.kind == VoteKind::Buy));
        assert!((ema[0].strength - 0.8).abs() < 1e-12);

        let adx = votes.iter().find(|v| v.indicator == "ADX").unwrap();
        assert_eq!(adx.kind, VoteKind::Buy);
        // Oscillators read the steady climb as overbought.
        let rsi = votes.iter().find(|v| v.indicator == "RSI").unwrap();
        assert_eq!(rsi.kind, VoteKind::Sell);
    }

    #[test]
    fn test_flat_market_stays_finite() {
        let mut bank = IndicatorBank::new();
        let mut snap = IndicatorSnapshot::default();
        for _ in 0..300 {
            snap = bank.update(100.0, 100.0, 100.0, 0.0);
        }
        assert!(all_finite(&snap));
        assert!(bank.votes(100.0).iter().all(|v| v.strength.is_finite()));
    }

    #[test]
    fn test_reset_restores_cold_state() {
        let mut bank = IndicatorBank::new();
        feed(&mut bank, (0..50).map(|i| 100.0 + i as f64));
        bank.reset();
        assert_eq!(bank.updates(), 0);
        let snap = bank.update(10.5, 9.5, 10.0, 5.0);
        assert_eq!(snap.ema200, 10.0);
        assert_eq!(snap.obv, 5.0);
    }

    #[test]
    fn test_manager_shares_bank_per_key() {
        let manager = IndicatorManager::new();
        let a = manager.get_or_create("BTCUSDT", Timeframe::Minute1);
        let b = manager.get_or_create("BTCUSDT", Timeframe::Minute1);
        let c = manager.get_or_create("BTCUSDT", Timeframe::Minute5);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.len(), 2);

        a.lock().update(1.0, 1.0, 1.0, 1.0);
        assert_eq!(b.lock().updates(), 1);
    }

    #[test]
    fn test_manager_concurrent_creation() {
        let manager = Arc::new(IndicatorManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                std::thread::spawn(move || m.get_or_create("ETHUSDT", Timeframe::Hour1))
            })
            .collect();
        let banks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(banks.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(manager.len(), 1);
    }
}
