//! Price interval analysis.
//!
//! Finds a price band that recent candles span repeatedly. The band's
//! "volatility" is its width in percent times the number of candles whose
//! range covers the whole band, and the analyzer looks for the band that
//! maximises it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use trading_core::{
    error::StrategyError,
    traits::StrategyConfig,
    types::{Candle, Timeframe},
};

/// Fewest candles an analysis accepts.
pub const MIN_CANDLES: usize = 10;

/// Most candles an analysis requests from the exchange.
pub const MAX_CANDLES: usize = 1000;

const WIDTH_STEP_PCT: f64 = 0.05;
const CENTER_STEPS: f64 = 1000.0;

/// How the band is searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Grid search over centers and widths.
    Simplest,
    /// Grow the band around the median until volatility drops.
    #[default]
    BestWidth,
    /// Band between two percentiles of the price distribution.
    MathStat,
}

impl std::str::FromStr for AnalysisMethod {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "simplest" => Ok(Self::Simplest),
            "best_width" => Ok(Self::BestWidth),
            "math_stat" => Ok(Self::MathStat),
            other => Err(StrategyError::InvalidConfig(format!(
                "unknown analysis method: {}",
                other
            ))),
        }
    }
}

/// Configuration of the interval strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// History window analysed, in minutes
    pub period_minutes: u64,
    /// Narrowest band tried, in percent of the center price
    pub min_profit_pct: f64,
    /// Widest band tried, in percent of the center price
    pub max_profit_pct: f64,
    pub method: AnalysisMethod,
    pub low_percentile: f64,
    pub high_percentile: f64,
    pub stop_loss_pct: f64,
    /// Open positions across all symbols above which no entry is proposed
    pub max_positions: usize,
    /// Quote amount spent per entry
    pub preferred_position_value: f64,
    pub max_position_value: f64,
    pub recalculate_hours: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::Minute1,
            period_minutes: 7 * 24 * 60,
            min_profit_pct: 0.2,
            max_profit_pct: 0.6,
            method: AnalysisMethod::BestWidth,
            low_percentile: 25.0,
            high_percentile: 75.0,
            stop_loss_pct: 1.5,
            max_positions: 3,
            preferred_position_value: 1000.0,
            max_position_value: 5000.0,
            recalculate_hours: 6,
        }
    }
}

impl IntervalConfig {
    /// Number of candles covering `period_minutes`, clamped to `[10, 1000]`.
    pub fn candle_limit(&self) -> usize {
        let period = if self.period_minutes == 0 {
            7 * 24 * 60
        } else {
            self.period_minutes
        };
        let per_candle = self.timeframe.as_minutes().max(1);
        ((period / per_candle) as usize).clamp(MIN_CANDLES, MAX_CANDLES)
    }
}

impl StrategyConfig for IntervalConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbol.is_empty() {
            return Err(StrategyError::InvalidConfig("symbol is required".into()));
        }
        if self.min_profit_pct <= 0.0 || self.max_profit_pct < self.min_profit_pct {
            return Err(StrategyError::InvalidConfig(
                "profit range must satisfy 0 < min <= max".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.low_percentile)
            || !(0.0..=100.0).contains(&self.high_percentile)
            || self.low_percentile >= self.high_percentile
        {
            return Err(StrategyError::InvalidConfig(
                "percentiles must satisfy 0 <= low < high <= 100".into(),
            ));
        }
        if self.stop_loss_pct <= 0.0 || self.stop_loss_pct >= 100.0 {
            return Err(StrategyError::InvalidConfig(
                "stop loss must be between 0 and 100 percent".into(),
            ));
        }
        if self.preferred_position_value <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "preferred position value must be positive".into(),
            ));
        }
        if self.max_positions == 0 {
            return Err(StrategyError::InvalidConfig(
                "max positions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A price band found by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInterval {
    pub symbol: String,
    pub lower: f64,
    pub upper: f64,
    pub median: f64,
    /// Width in percent of the median
    pub width_pct: f64,
    /// Candles whose range covers the whole band
    pub crosses: usize,
    /// `width_pct * crosses`
    pub volatility: f64,
    pub candles_analyzed: usize,
    pub calculated_at: DateTime<Utc>,
}

impl PriceInterval {
    pub fn range(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn is_valid(&self) -> bool {
        self.lower > 0.0 && self.upper > self.lower
    }
}

/// Searches candle history for the most frequently traversed price band.
#[derive(Debug, Clone)]
pub struct IntervalAnalyzer {
    config: IntervalConfig,
}

impl IntervalAnalyzer {
    pub fn new(config: IntervalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntervalConfig {
        &self.config
    }

    /// Analyse `candles` with the configured method.
    ///
    /// Returns an interval with zero volatility when no band is crossed.
    pub fn analyze(&self, symbol: &str, candles: &[Candle]) -> Result<PriceInterval, StrategyError> {
        if candles.len() < MIN_CANDLES {
            return Err(StrategyError::InsufficientData {
                required: MIN_CANDLES,
                available: candles.len(),
            });
        }

        let prices: Vec<f64> = candles.iter().map(Candle::average_price).collect();
        let interval = match self.config.method {
            AnalysisMethod::Simplest => self.simplest(symbol, candles, &prices),
            AnalysisMethod::BestWidth => self.best_width(symbol, candles, &prices),
            AnalysisMethod::MathStat => self.math_stat(symbol, candles, &prices),
        };

        tracing::debug!(
            symbol,
            method = ?self.config.method,
            lower = interval.lower,
            upper = interval.upper,
            width_pct = interval.width_pct,
            crosses = interval.crosses,
            "Interval analysed"
        );
        Ok(interval)
    }

    fn widths(&self) -> impl Iterator<Item = f64> {
        let min = self.config.min_profit_pct;
        let max = self.config.max_profit_pct;
        // Integer steps avoid accumulating float error over the range.
        (0..)
            .map(move |i| min + i as f64 * WIDTH_STEP_PCT)
            .take_while(move |w| *w <= max + 1e-9)
    }

    fn band(
        &self,
        symbol: &str,
        candles: &[Candle],
        center: f64,
        width_pct: f64,
    ) -> Option<PriceInterval> {
        let half = center * width_pct / 100.0 / 2.0;
        let (lower, upper) = (center - half, center + half);
        if lower <= 0.0 {
            return None;
        }
        let crosses = count_crosses(candles, lower, upper);
        Some(PriceInterval {
            symbol: symbol.to_string(),
            lower,
            upper,
            median: center,
            width_pct,
            crosses,
            volatility: width_pct * crosses as f64,
            candles_analyzed: candles.len(),
            calculated_at: Utc::now(),
        })
    }

    fn empty(&self, symbol: &str, candles: &[Candle], median: f64) -> PriceInterval {
        PriceInterval {
            symbol: symbol.to_string(),
            lower: median,
            upper: median,
            median,
            width_pct: 0.0,
            crosses: 0,
            volatility: 0.0,
            candles_analyzed: candles.len(),
            calculated_at: Utc::now(),
        }
    }

    fn simplest(&self, symbol: &str, candles: &[Candle], prices: &[f64]) -> PriceInterval {
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut best = self.empty(symbol, candles, median(prices));

        let step = (max - min) / CENTER_STEPS;
        let centers: Box<dyn Iterator<Item = f64>> = if step > 0.0 {
            Box::new((0..=CENTER_STEPS as usize).map(move |i| min + i as f64 * step))
        } else {
            Box::new(std::iter::once(min))
        };

        for center in centers {
            for width in self.widths() {
                if let Some(candidate) = self.band(symbol, candles, center, width) {
                    if candidate.volatility > best.volatility {
                        best = candidate;
                    }
                }
            }
        }
        best
    }

    fn best_width(&self, symbol: &str, candles: &[Candle], prices: &[f64]) -> PriceInterval {
        let center = median(prices);
        let mut best = self.empty(symbol, candles, center);

        for width in self.widths() {
            let Some(candidate) = self.band(symbol, candles, center, width) else {
                continue;
            };
            if candidate.volatility > best.volatility {
                best = candidate;
            } else if candidate.volatility < best.volatility && best.volatility > 0.0 {
                break;
            }
        }
        best
    }

    fn math_stat(&self, symbol: &str, candles: &[Candle], prices: &[f64]) -> PriceInterval {
        let mut sorted = prices.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let lower = percentile(&sorted, self.config.low_percentile);
        let upper = percentile(&sorted, self.config.high_percentile);
        let center = median(prices);
        let crosses = count_crosses(candles, lower, upper);
        let width_pct = if center > 0.0 {
            (upper - lower) / center * 100.0
        } else {
            0.0
        };

        PriceInterval {
            symbol: symbol.to_string(),
            lower,
            upper,
            median: center,
            width_pct,
            crosses,
            volatility: width_pct * crosses as f64,
            candles_analyzed: candles.len(),
            calculated_at: Utc::now(),
        }
    }
}

/// Candles whose range covers `[lower, upper]`.
pub fn count_crosses(candles: &[Candle], lower: f64, upper: f64) -> usize {
    candles.iter().filter(|c| c.crosses(lower, upper)).count()
}

/// Median; the mean of the middle pair for even lengths.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values.to_vec()).median()
}

/// Nearest-rank-below percentile of an ascending slice; always one of its
/// elements, never an interpolation.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() - 1) as f64 * pct / 100.0) as usize;
    sorted[index.min(sorted.len() - 1)]
}
