//! Volatility indicators.

use serde::{Deserialize, Serialize};
use trading_core::traits::{OhlcvIndicator, StreamingIndicator, VoteSource};
use trading_core::types::Vote;

use crate::moving_average::RollingWindow;

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BollingerOutput {
    /// Upper band
    pub upper: f64,
    /// Middle band (SMA)
    pub middle: f64,
    /// Lower band
    pub lower: f64,
}

impl BollingerOutput {
    /// Position of `price` within the bands (0 = lower, 1 = upper).
    ///
    /// Returns 0.5 when the bands have collapsed.
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width == 0.0 {
            0.5
        } else {
            (price - self.lower) / width
        }
    }

    /// Band width relative to the middle band.
    pub fn bandwidth(&self) -> f64 {
        if self.middle == 0.0 {
            0.0
        } else {
            (self.upper - self.lower) / self.middle
        }
    }
}

/// Bollinger Bands, streaming.
///
/// Rolling mean ± k·(population) standard deviation. Until the window is
/// full all three bands equal the latest price.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    prices: RollingWindow,
    std_dev_mult: f64,
    output: BollingerOutput,
}

impl BollingerBands {
    /// Create new Bollinger Bands.
    pub fn new(period: usize, std_dev_mult: f64) -> Self {
        assert!(period > 1, "Period must be greater than 1");
        Self {
            prices: RollingWindow::new(period),
            std_dev_mult,
            output: BollingerOutput::default(),
        }
    }
}

impl Default for BollingerBands {
    /// Standard 20 period, 2.0 std dev.
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl StreamingIndicator for BollingerBands {
    type Output = BollingerOutput;

    fn update(&mut self, price: f64) -> BollingerOutput {
        self.prices.push(price);

        if !self.prices.is_full() {
            self.output = BollingerOutput {
                upper: price,
                middle: price,
                lower: price,
            };
            return self.output;
        }

        let middle = self.prices.mean();
        let n = self.prices.len() as f64;
        let variance = self.prices.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / n;
        let band = self.std_dev_mult * variance.sqrt();

        self.output = BollingerOutput {
            upper: middle + band,
            middle,
            lower: middle - band,
        };
        self.output
    }

    fn current(&self) -> BollingerOutput {
        self.output
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.output = BollingerOutput::default();
    }

    fn is_ready(&self) -> bool {
        self.prices.is_full()
    }

    fn period(&self) -> usize {
        self.prices.capacity()
    }

    fn name(&self) -> &str {
        "BollingerBands"
    }
}

impl VoteSource for BollingerBands {
    fn vote(&self, price: f64) -> Vote {
        let b = self.output.percent_b(price);
        const NAME: &str = "BollingerBands";

        if b <= 0.05 {
            Vote::buy(NAME, 0.9 + (0.05 - b) * 2.0, "Price at lower band")
        } else if b <= 0.20 {
            Vote::buy(NAME, 0.5 + (0.20 - b) / 0.15 * 0.4, "Price in lower band region")
        } else if b <= 0.35 {
            Vote::buy(NAME, 0.3 + (0.35 - b) / 0.15 * 0.2, "Price approaching lower band")
        } else if b >= 0.95 {
            Vote::sell(NAME, 0.9 + (b - 0.95) * 2.0, "Price at upper band")
        } else if b >= 0.80 {
            Vote::sell(NAME, 0.5 + (b - 0.80) / 0.15 * 0.4, "Price in upper band region")
        } else if b >= 0.65 {
            Vote::sell(NAME, 0.3 + (b - 0.65) / 0.15 * 0.2, "Price approaching upper band")
        } else {
            Vote::hold(NAME)
        }
    }
}

/// Average True Range (ATR), streaming.
///
/// During warm-up the value is the plain average of the true ranges seen so
/// far; afterwards it uses Wilder smoothing. Feeds stop distances rather than
/// producing votes.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    true_ranges: RollingWindow,
    count: usize,
    value: f64,
}

impl Atr {
    /// Create a new ATR indicator.
    ///
    /// Common period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            period,
            prev_close: None,
            true_ranges: RollingWindow::new(period),
            count: 0,
            value: 0.0,
        }
    }
}

impl OhlcvIndicator for Atr {
    type Output = f64;

    fn update(&mut self, high: f64, low: f64, close: f64, _volume: f64) -> f64 {
        let tr = match self.prev_close {
            Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
            None => high - low,
        };
        self.prev_close = Some(close);
        self.count += 1;
        self.true_ranges.push(tr);

        let period = self.period as f64;
        self.value = if !self.true_ranges.is_full() || self.count == self.period {
            self.true_ranges.mean()
        } else {
            (self.value * (period - 1.0) + tr) / period
        };
        self.value
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.true_ranges.clear();
        self.count = 0;
        self.value = 0.0;
    }

    fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    fn name(&self) -> &str {
        "ATR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::VoteKind;

    #[test]
    fn test_bollinger_warmup_collapses_to_price() {
        let mut bb = BollingerBands::new(5, 2.0);
        let out = bb.update(101.0);
        assert_eq!(out.upper, 101.0);
        assert_eq!(out.lower, 101.0);
        assert_eq!(out.percent_b(150.0), 0.5);
        assert_eq!(bb.vote(150.0).kind, VoteKind::Hold);
    }

    #[test]
    fn test_bollinger_bands() {
        let mut bb = BollingerBands::new(5, 2.0);
        let mut out = BollingerOutput::default();
        for p in [1.0, 2.0, 3.0, 4.0, 5.0] {
            out = bb.update(p);
        }
        assert!((out.middle - 3.0).abs() < 1e-10);
        let std = 2.0_f64.sqrt();
        assert!((out.upper - (3.0 + 2.0 * std)).abs() < 1e-10);
        assert!((out.lower - (3.0 - 2.0 * std)).abs() < 1e-10);
        assert!((out.percent_b(3.0) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_bollinger_votes_are_monotone() {
        let mut bb = BollingerBands::new(5, 2.0);
        for p in [1.0, 2.0, 3.0, 4.0, 5.0] {
            bb.update(p);
        }
        let out = bb.current();
        let at = |b: f64| out.lower + b * (out.upper - out.lower);

        let strong = bb.vote(at(0.0));
        let weak = bb.vote(at(0.3));
        assert_eq!(strong.kind, VoteKind::Buy);
        assert_eq!(weak.kind, VoteKind::Buy);
        assert!(strong.strength > weak.strength);

        assert_eq!(bb.vote(at(0.5)).kind, VoteKind::Hold);
        assert_eq!(bb.vote(at(1.2)).kind, VoteKind::Sell);
        assert_eq!(bb.vote(at(1.2)).strength, 1.0);
    }

    #[test]
    fn test_atr() {
        let mut atr = Atr::new(3);
        assert!((atr.update(12.0, 10.0, 11.0, 0.0) - 2.0).abs() < 1e-10);
        // Gap up: TR = |15 - 11| = 4
        assert!((atr.update(15.0, 14.0, 14.5, 0.0) - 3.0).abs() < 1e-10);
        assert!((atr.update(15.0, 14.0, 14.5, 0.0) - (2.0 + 4.0 + 1.0) / 3.0).abs() < 1e-10);
        assert!(atr.is_ready());

        let prev = atr.current();
        let next = atr.update(15.0, 14.0, 14.5, 0.0);
        assert!((next - (prev * 2.0 + 1.0) / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_atr_constant_candles_is_zero() {
        let mut atr = Atr::new(14);
        for _ in 0..30 {
            atr.update(100.0, 100.0, 100.0, 1.0);
        }
        assert_eq!(atr.current(), 0.0);
    }
}
