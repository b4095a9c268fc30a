//! Momentum indicators and oscillators driven by close prices.

use serde::{Deserialize, Serialize};
use trading_core::traits::{StreamingIndicator, VoteSource};
use trading_core::types::Vote;

use crate::moving_average::{Ema, RollingWindow};

/// Relative Strength Index (RSI), streaming with Wilder smoothing.
///
/// Output is always within `[0, 100]`. It stays at the neutral 50 until the
/// warm-up window is collected, and saturates at 100 when the average loss is 0.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    avg_gain: f64,
    avg_loss: f64,
    prev_price: f64,
    count: usize,
    gains: RollingWindow,
    losses: RollingWindow,
    value: f64,
}

impl Rsi {
    /// Create a new RSI indicator.
    ///
    /// Common periods are 14 (default) or 7 for faster signals.
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "Period must be greater than 1");
        Self {
            period,
            avg_gain: 0.0,
            avg_loss: 0.0,
            prev_price: 0.0,
            count: 0,
            gains: RollingWindow::new(period),
            losses: RollingWindow::new(period),
            value: 50.0,
        }
    }
}

impl StreamingIndicator for Rsi {
    type Output = f64;

    fn update(&mut self, price: f64) -> f64 {
        if self.count == 0 {
            self.prev_price = price;
            self.count = 1;
            self.value = 50.0;
            return self.value;
        }

        let change = price - self.prev_price;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.prev_price = price;
        self.count += 1;

        let period = self.period as f64;
        if self.count <= self.period {
            self.gains.push(gain);
            self.losses.push(loss);
            if self.count < self.period {
                self.value = 50.0;
                return self.value;
            }
            self.avg_gain = self.gains.sum() / period;
            self.avg_loss = self.losses.sum() / period;
        } else {
            self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
            self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
        }

        self.value = if self.avg_loss == 0.0 {
            100.0
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        self.value
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.prev_price = 0.0;
        self.count = 0;
        self.gains.clear();
        self.losses.clear();
        self.value = 50.0;
    }

    fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

impl VoteSource for Rsi {
    fn vote(&self, _price: f64) -> Vote {
        let v = self.value;
        if v <= 30.0 {
            Vote::buy("RSI", 0.9 + (30.0 - v) / 30.0 * 0.1, "Strong oversold condition")
        } else if v <= 40.0 {
            Vote::buy("RSI", 0.5 + (40.0 - v) / 10.0 * 0.4, "Moderate oversold condition")
        } else if v <= 45.0 {
            Vote::buy("RSI", 0.3 + (45.0 - v) / 5.0 * 0.2, "Weak oversold condition")
        } else if v >= 70.0 {
            Vote::sell("RSI", 0.9 + (v - 70.0) / 30.0 * 0.1, "Strong overbought condition")
        } else if v >= 60.0 {
            Vote::sell("RSI", 0.5 + (v - 60.0) / 10.0 * 0.4, "Moderate overbought condition")
        } else if v >= 55.0 {
            Vote::sell("RSI", 0.3 + (v - 55.0) / 5.0 * 0.2, "Weak overbought condition")
        } else {
            Vote::hold("RSI")
        }
    }
}

/// Stochastic RSI output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochRsiOutput {
    /// Smoothed %K
    pub k: f64,
    /// %D (equal to %K)
    pub d: f64,
}

/// Stochastic RSI: where the current RSI sits within its recent range.
#[derive(Debug, Clone)]
pub struct StochRsi {
    rsi: Rsi,
    rsi_values: RollingWindow,
    k_values: RollingWindow,
    k: f64,
    d: f64,
}

impl StochRsi {
    /// Create a new Stochastic RSI.
    pub fn new(rsi_period: usize, stoch_period: usize, smooth_k: usize) -> Self {
        Self {
            rsi: Rsi::new(rsi_period),
            rsi_values: RollingWindow::new(stoch_period),
            k_values: RollingWindow::new(smooth_k),
            k: 50.0,
            d: 50.0,
        }
    }
}

impl Default for StochRsi {
    fn default() -> Self {
        Self::new(14, 14, 3)
    }
}

impl StreamingIndicator for StochRsi {
    type Output = StochRsiOutput;

    fn update(&mut self, price: f64) -> StochRsiOutput {
        let rsi = self.rsi.update(price);
        self.rsi_values.push(rsi);

        if !self.rsi_values.is_full() {
            self.k = 50.0;
            self.d = 50.0;
            return self.current();
        }

        let lowest = self.rsi_values.min();
        let highest = self.rsi_values.max();
        if highest - lowest == 0.0 {
            self.k = 50.0;
        } else {
            let raw_k = (rsi - lowest) / (highest - lowest) * 100.0;
            self.k_values.push(raw_k);
            self.k = self.k_values.mean();
        }
        self.d = self.k;
        self.current()
    }

    fn current(&self) -> StochRsiOutput {
        StochRsiOutput { k: self.k, d: self.d }
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.rsi_values.clear();
        self.k_values.clear();
        self.k = 50.0;
        self.d = 50.0;
    }

    fn is_ready(&self) -> bool {
        self.rsi_values.is_full()
    }

    fn period(&self) -> usize {
        self.rsi.period() + self.rsi_values.capacity()
    }

    fn name(&self) -> &str {
        "StochRSI"
    }
}

impl VoteSource for StochRsi {
    fn vote(&self, _price: f64) -> Vote {
        let k = self.k;
        if k < 20.0 {
            Vote::buy("StochRSI", 0.9 + (20.0 - k) / 20.0 * 0.1, "Strong oversold condition")
        } else if k < 30.0 {
            Vote::buy("StochRSI", 0.6 + (30.0 - k) / 10.0 * 0.3, "Moderate oversold condition")
        } else if k < 40.0 {
            Vote::buy("StochRSI", 0.3 + (40.0 - k) / 10.0 * 0.3, "Weak oversold condition")
        } else if k > 80.0 {
            Vote::sell("StochRSI", 0.9 + (k - 80.0) / 20.0 * 0.1, "Strong overbought condition")
        } else if k > 70.0 {
            Vote::sell("StochRSI", 0.6 + (k - 70.0) / 10.0 * 0.3, "Moderate overbought condition")
        } else if k > 60.0 {
            Vote::sell("StochRSI", 0.3 + (k - 60.0) / 10.0 * 0.3, "Weak overbought condition")
        } else {
            Vote::hold("StochRSI")
        }
    }
}

/// MACD output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacdOutput {
    /// MACD line (fast EMA - slow EMA)
    pub macd: f64,
    /// Signal line (EMA of MACD)
    pub signal: f64,
    /// Histogram (MACD - Signal)
    pub histogram: f64,
}

/// MACD indicator, streaming.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    output: MacdOutput,
}

impl Macd {
    /// Create a MACD with custom periods.
    pub fn with_periods(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "Fast period must be less than slow period");
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            output: MacdOutput::default(),
        }
    }
}

impl Default for Macd {
    /// Standard 12, 26, 9 parameters.
    fn default() -> Self {
        Self::with_periods(12, 26, 9)
    }
}

impl StreamingIndicator for Macd {
    type Output = MacdOutput;

    fn update(&mut self, price: f64) -> MacdOutput {
        let macd = self.fast.update(price) - self.slow.update(price);
        let signal = self.signal.update(macd);
        self.output = MacdOutput {
            macd,
            signal,
            histogram: macd - signal,
        };
        self.output
    }

    fn current(&self) -> MacdOutput {
        self.output
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
        self.output = MacdOutput::default();
    }

    fn is_ready(&self) -> bool {
        self.slow.is_ready() && self.signal.is_ready()
    }

    fn period(&self) -> usize {
        self.slow.period() + self.signal.period()
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

impl VoteSource for Macd {
    fn vote(&self, _price: f64) -> Vote {
        let MacdOutput {
            macd,
            signal,
            histogram,
        } = self.output;
        // Strength is the histogram relative to the signal line, saturating at 1.
        let strength = if signal == 0.0 {
            1.0
        } else {
            ((histogram / signal).abs() * 10.0).min(1.0)
        };

        if macd > signal && histogram > 0.0 {
            Vote::buy("MACD", strength, "Bullish crossover")
        } else if macd < signal && histogram < 0.0 {
            Vote::sell("MACD", strength, "Bearish crossover")
        } else {
            Vote::hold("MACD")
        }
    }
}

/// Rate of change over `period` candles, in percent.
#[derive(Debug, Clone)]
pub struct Momentum {
    period: usize,
    prices: RollingWindow,
    value: f64,
}

impl Momentum {
    /// Create a new momentum indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            period,
            prices: RollingWindow::new(period + 1),
            value: 0.0,
        }
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Self::new(10)
    }
}

impl StreamingIndicator for Momentum {
    type Output = f64;

    fn update(&mut self, close: f64) -> f64 {
        self.prices.push(close);
        if !self.prices.is_full() {
            return 0.0;
        }
        match self.prices.front() {
            Some(old) if old != 0.0 => {
                self.value = (close - old) / old * 100.0;
                self.value
            }
            _ => 0.0,
        }
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.value = 0.0;
    }

    fn is_ready(&self) -> bool {
        self.prices.is_full()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "Momentum"
    }
}

impl VoteSource for Momentum {
    fn vote(&self, _price: f64) -> Vote {
        let v = self.value;
        if v > 1.0 {
            Vote::buy("Momentum", (v / 5.0).min(1.0).max(0.3), "Positive momentum")
        } else if v < -1.0 {
            Vote::sell("Momentum", (v.abs() / 5.0).min(1.0).max(0.3), "Negative momentum")
        } else if v > 0.3 {
            Vote::buy("Momentum", 0.25, "Weak positive momentum")
        } else if v < -0.3 {
            Vote::sell("Momentum", 0.25, "Weak negative momentum")
        } else {
            Vote::hold("Momentum")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::VoteKind;

    #[test]
    fn test_rsi_neutral_during_warmup() {
        let mut rsi = Rsi::new(14);
        for i in 0..13 {
            assert_eq!(rsi.update(100.0 + i as f64), 50.0);
        }
        assert!(!rsi.is_ready());
    }

    #[test]
    fn test_rsi_constant_prices_saturate() {
        let mut rsi = Rsi::new(14);
        let mut last = 0.0;
        for _ in 0..50 {
            last = rsi.update(100.0);
            assert!(last.is_finite());
            assert!((0.0..=100.0).contains(&last));
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_rsi_downtrend_is_oversold() {
        let mut rsi = Rsi::new(14);
        for i in 0..40 {
            rsi.update(200.0 - i as f64 * 2.0);
        }
        assert!(rsi.current() < 30.0);
        let vote = rsi.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Buy);
        assert!(vote.strength >= 0.9);
    }

    #[test]
    fn test_rsi_vote_tiers() {
        let mut rsi = Rsi::new(14);
        rsi.value = 42.5;
        let vote = rsi.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Buy);
        assert!((vote.strength - 0.4).abs() < 1e-9);

        rsi.value = 50.0;
        assert_eq!(rsi.vote(0.0).kind, VoteKind::Hold);

        rsi.value = 65.0;
        let vote = rsi.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Sell);
        assert!((vote.strength - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_stoch_rsi_flat_range_is_neutral() {
        let mut stoch = StochRsi::default();
        for _ in 0..60 {
            stoch.update(100.0);
        }
        assert_eq!(stoch.current().k, 50.0);
        assert_eq!(stoch.vote(0.0).kind, VoteKind::Hold);
    }

    #[test]
    fn test_stoch_rsi_bounds() {
        let mut stoch = StochRsi::default();
        for i in 0..200 {
            let out = stoch.update(100.0 + (i as f64 * 0.3).sin() * 5.0);
            assert!((0.0..=100.0).contains(&out.k));
        }
    }

    #[test]
    fn test_macd_uptrend_votes_buy() {
        let mut macd = Macd::default();
        for i in 0..60 {
            macd.update(100.0 + (i as f64).powf(1.5));
        }
        let out = macd.current();
        assert!(out.macd > out.signal);
        assert_eq!(macd.vote(0.0).kind, VoteKind::Buy);
    }

    #[test]
    fn test_macd_zero_signal_is_finite() {
        let macd = Macd::default();
        let vote = macd.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Hold);
        assert!(vote.strength.is_finite());
    }

    #[test]
    fn test_momentum() {
        let mut m = Momentum::new(2);
        assert_eq!(m.update(100.0), 0.0);
        assert_eq!(m.update(101.0), 0.0);
        assert!((m.update(102.0) - 2.0).abs() < 1e-10);

        let vote = m.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Buy);
        assert!((vote.strength - 0.4).abs() < 1e-10);
    }

    #[test]
    fn test_momentum_zero_base() {
        let mut m = Momentum::new(1);
        m.update(0.0);
        assert_eq!(m.update(5.0), 0.0);
    }
}
