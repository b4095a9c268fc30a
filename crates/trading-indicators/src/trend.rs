//! Trend-strength and range oscillators that read the full candle.

use serde::{Deserialize, Serialize};
use trading_core::traits::{OhlcvIndicator, VoteSource};
use trading_core::types::Vote;

use crate::moving_average::RollingWindow;

/// ADX output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdxOutput {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Average Directional Index.
///
/// Uses simple averages of directional movement and true range over the
/// window; the reported ADX is the current DX. Reads 0 during warm-up or when
/// the window has no range.
#[derive(Debug, Clone)]
pub struct Adx {
    plus_dm: RollingWindow,
    minus_dm: RollingWindow,
    true_ranges: RollingWindow,
    prev: Option<(f64, f64, f64)>,
    output: AdxOutput,
}

impl Adx {
    /// Create a new ADX.
    pub fn new(period: usize) -> Self {
        Self {
            plus_dm: RollingWindow::new(period),
            minus_dm: RollingWindow::new(period),
            true_ranges: RollingWindow::new(period),
            prev: None,
            output: AdxOutput::default(),
        }
    }
}

impl Default for Adx {
    fn default() -> Self {
        Self::new(14)
    }
}

impl OhlcvIndicator for Adx {
    type Output = AdxOutput;

    fn update(&mut self, high: f64, low: f64, close: f64, _volume: f64) -> AdxOutput {
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return AdxOutput::default();
        };

        let mut up = (high - prev_high).max(0.0);
        let mut down = (prev_low - low).max(0.0);
        if up > down {
            down = 0.0;
        } else if down > up {
            up = 0.0;
        } else {
            up = 0.0;
            down = 0.0;
        }
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        self.plus_dm.push(up);
        self.minus_dm.push(down);
        self.true_ranges.push(tr);

        if !self.true_ranges.is_full() {
            return AdxOutput::default();
        }

        let tr_avg = self.true_ranges.mean();
        if tr_avg == 0.0 {
            return AdxOutput::default();
        }
        let plus_di = 100.0 * self.plus_dm.mean() / tr_avg;
        let minus_di = 100.0 * self.minus_dm.mean() / tr_avg;
        let di_sum = plus_di + minus_di;
        if di_sum == 0.0 {
            return AdxOutput::default();
        }

        self.output = AdxOutput {
            adx: 100.0 * (plus_di - minus_di).abs() / di_sum,
            plus_di,
            minus_di,
        };
        self.output
    }

    fn current(&self) -> AdxOutput {
        self.output
    }

    fn reset(&mut self) {
        self.plus_dm.clear();
        self.minus_dm.clear();
        self.true_ranges.clear();
        self.prev = None;
        self.output = AdxOutput::default();
    }

    fn is_ready(&self) -> bool {
        self.true_ranges.is_full()
    }

    fn name(&self) -> &str {
        "ADX"
    }
}

impl VoteSource for Adx {
    fn vote(&self, _price: f64) -> Vote {
        let AdxOutput {
            adx,
            plus_di,
            minus_di,
        } = self.output;
        if adx <= 25.0 {
            return Vote::hold("ADX");
        }
        let strength = ((adx - 25.0) / 25.0).min(1.0);
        if plus_di > minus_di {
            Vote::buy("ADX", strength, "Strong bullish trend")
        } else if minus_di > plus_di {
            Vote::sell("ADX", strength, "Strong bearish trend")
        } else {
            Vote::hold("ADX")
        }
    }
}

/// Commodity Channel Index.
///
/// Deviation of the typical price from its rolling mean, scaled by the mean
/// absolute deviation. Reads 0 during warm-up or when the deviation is 0.
#[derive(Debug, Clone)]
pub struct Cci {
    typical: RollingWindow,
    value: f64,
}

impl Cci {
    /// Create a new CCI.
    pub fn new(period: usize) -> Self {
        Self {
            typical: RollingWindow::new(period),
            value: 0.0,
        }
    }
}

impl Default for Cci {
    fn default() -> Self {
        Self::new(20)
    }
}

impl OhlcvIndicator for Cci {
    type Output = f64;

    fn update(&mut self, high: f64, low: f64, close: f64, _volume: f64) -> f64 {
        let tp = (high + low + close) / 3.0;
        self.typical.push(tp);
        if !self.typical.is_full() {
            return 0.0;
        }

        let mean = self.typical.mean();
        let n = self.typical.len() as f64;
        let mean_dev = self.typical.iter().map(|p| (p - mean).abs()).sum::<f64>() / n;
        if mean_dev == 0.0 {
            self.value = 0.0;
            return 0.0;
        }
        self.value = (tp - mean) / (0.015 * mean_dev);
        self.value
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.typical.clear();
        self.value = 0.0;
    }

    fn is_ready(&self) -> bool {
        self.typical.is_full()
    }

    fn name(&self) -> &str {
        "CCI"
    }
}

impl VoteSource for Cci {
    fn vote(&self, _price: f64) -> Vote {
        let v = self.value;
        if v > 100.0 {
            Vote::sell("CCI", ((v - 100.0) / 100.0).min(1.0), "Overbought condition")
        } else if v < -100.0 {
            Vote::buy("CCI", ((v + 100.0).abs() / 100.0).min(1.0), "Oversold condition")
        } else if v > 50.0 {
            Vote::sell("CCI", 0.3, "Moderate overbought")
        } else if v < -50.0 {
            Vote::buy("CCI", 0.3, "Moderate oversold")
        } else {
            Vote::hold("CCI")
        }
    }
}

/// Williams %R, in `[-100, 0]`.
///
/// Reads 0 during warm-up and −50 when the window's range is 0.
#[derive(Debug, Clone)]
pub struct WilliamsR {
    highs: RollingWindow,
    lows: RollingWindow,
    value: f64,
}

impl WilliamsR {
    /// Create a new Williams %R.
    pub fn new(period: usize) -> Self {
        Self {
            highs: RollingWindow::new(period),
            lows: RollingWindow::new(period),
            value: 0.0,
        }
    }
}

impl Default for WilliamsR {
    fn default() -> Self {
        Self::new(14)
    }
}

impl OhlcvIndicator for WilliamsR {
    type Output = f64;

    fn update(&mut self, high: f64, low: f64, close: f64, _volume: f64) -> f64 {
        self.highs.push(high);
        self.lows.push(low);
        if !self.highs.is_full() {
            return 0.0;
        }

        let highest = self.highs.max();
        let lowest = self.lows.min();
        self.value = if highest == lowest {
            -50.0
        } else {
            -100.0 * (highest - close) / (highest - lowest)
        };
        self.value
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.value = 0.0;
    }

    fn is_ready(&self) -> bool {
        self.highs.is_full()
    }

    fn name(&self) -> &str {
        "Williams%R"
    }
}

impl VoteSource for WilliamsR {
    fn vote(&self, _price: f64) -> Vote {
        const NAME: &str = "Williams%R";
        let v = self.value;
        if v <= -80.0 {
            Vote::buy(NAME, ((v + 80.0).abs() / 20.0).min(1.0), "Oversold condition")
        } else if v >= -20.0 {
            Vote::sell(NAME, ((v + 20.0) / 20.0).min(1.0), "Overbought condition")
        } else if v <= -60.0 {
            Vote::buy(NAME, 0.4, "Moderate oversold")
        } else if v >= -40.0 {
            Vote::sell(NAME, 0.4, "Moderate overbought")
        } else {
            Vote::hold(NAME)
        }
    }
}
