//! Signal aggregation.
//!
//! Fuses indicator votes into a technical score, blends it with the ML and
//! sentiment scores, and turns the result into a direction and confidence.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use trading_core::types::{AggregatedSignal, Direction, Timeframe, Vote};
use trading_indicators::IndicatorBank;
use uuid::Uuid;

/// Which score decides the direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSource {
    /// Only the technical score; ML and sentiment can raise confidence only.
    #[default]
    Technical,
    /// The blended score.
    Combined,
}

/// Weights and thresholds of the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Per-indicator vote weights
    pub indicator_weights: HashMap<String, f64>,
    /// Weight of an indicator missing from the table
    pub default_weight: f64,
    pub technical_weight: f64,
    pub ml_weight: f64,
    pub sentiment_weight: f64,
    pub direction_source: DirectionSource,
    /// Minimum absolute deciding score for a directional signal
    pub direction_threshold: f64,
    /// Multiplier from deciding score to confidence
    pub confidence_scale: f64,
    /// Lowest confidence a directional signal gets
    pub confidence_floor: f64,
    /// Blended score above which confidence may be boosted
    pub boost_threshold: f64,
    /// Multiplier from blended score to boosted confidence
    pub boost_scale: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let indicator_weights = [
            ("RSI", 1.2),
            ("MACD", 1.5),
            ("BollingerBands", 1.0),
            ("StochRSI", 1.1),
            ("EMA", 1.3),
            ("ADX", 1.4),
            ("CCI", 1.1),
            ("Williams%R", 1.0),
            ("Momentum", 1.2),
            ("OBV", 0.9),
        ]
        .into_iter()
        .map(|(name, w)| (name.to_string(), w))
        .collect();

        Self {
            indicator_weights,
            default_weight: 1.0,
            technical_weight: 0.7,
            ml_weight: 0.2,
            sentiment_weight: 0.1,
            direction_source: DirectionSource::Technical,
            direction_threshold: 1e-4,
            confidence_scale: 5.0,
            confidence_floor: 0.25,
            boost_threshold: 0.01,
            boost_scale: 10.0,
        }
    }
}

/// Direction and confidence derived from the three scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDecision {
    pub direction: Direction,
    /// In `[0, 1]`; 0 for `Hold`
    pub confidence: f64,
    pub combined_score: f64,
}

/// Turns votes and model scores into [`AggregatedSignal`]s.
#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    config: AggregatorConfig,
}

impl SignalAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    fn weight(&self, indicator: &str) -> f64 {
        self.config
            .indicator_weights
            .get(indicator)
            .copied()
            .unwrap_or(self.config.default_weight)
    }

    /// Weighted mean of the vote scores, in `[-1, 1]`; 0 without votes.
    pub fn technical_score(&self, votes: &[Vote]) -> f64 {
        let (total, weights) = votes.iter().fold((0.0, 0.0), |(total, weights), vote| {
            let w = self.weight(&vote.indicator);
            (total + vote.score() * w, weights + w)
        });

        if weights == 0.0 {
            0.0
        } else {
            total / weights
        }
    }

    /// Blend the scores and decide direction and confidence.
    pub fn combine(&self, technical: f64, ml: f64, sentiment: f64) -> SignalDecision {
        let cfg = &self.config;
        let technical = finite_or_zero(technical);
        let ml = finite_or_zero(ml);
        let sentiment = finite_or_zero(sentiment);

        let combined =
            technical * cfg.technical_weight + ml * cfg.ml_weight + sentiment * cfg.sentiment_weight;
        let deciding = match cfg.direction_source {
            DirectionSource::Technical => technical,
            DirectionSource::Combined => combined,
        };

        if deciding.abs() <= cfg.direction_threshold {
            return SignalDecision {
                direction: Direction::Hold,
                confidence: 0.0,
                combined_score: combined,
            };
        }

        let direction = if deciding > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        };
        let mut confidence = (deciding.abs() * cfg.confidence_scale)
            .max(cfg.confidence_floor)
            .clamp(0.0, 1.0);
        if combined.abs() > cfg.boost_threshold {
            confidence = confidence.max((combined.abs() * cfg.boost_scale).min(1.0));
        }

        SignalDecision {
            direction,
            confidence,
            combined_score: combined,
        }
    }

    /// Build a full signal for one stream.
    #[allow(clippy::too_many_arguments)]
    pub fn aggregate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        price: f64,
        volatility: f64,
        votes: &[Vote],
        ml_score: f64,
        sentiment_score: f64,
    ) -> AggregatedSignal {
        let technical = self.technical_score(votes);
        let decision = self.combine(technical, ml_score, sentiment_score);

        AggregatedSignal {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timeframe,
            direction: decision.direction,
            confidence: decision.confidence,
            technical_score: technical,
            ml_score: finite_or_zero(ml_score),
            sentiment_score: finite_or_zero(sentiment_score),
            price,
            volatility,
            reasons: votes
                .iter()
                .filter(|v| v.is_directional())
                .map(|v| format!("{}: {}", v.indicator, v.reason))
                .collect(),
            timestamp: Utc::now(),
        }
    }

    /// Build a signal from the current state of a stream's indicator bank.
    ///
    /// Uses the bank's ATR as the signal volatility. The bank is not mutated.
    pub fn aggregate_bank(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        price: f64,
        bank: &IndicatorBank,
        ml_score: f64,
        sentiment_score: f64,
    ) -> AggregatedSignal {
        let votes = bank.votes(price);
        self.aggregate(symbol, timeframe, price, bank.atr(), &votes, ml_score, sentiment_score)
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aggregator() -> SignalAggregator {
        SignalAggregator::default()
    }

    #[test]
    fn test_technical_score_weighted() {
        let votes = vec![
            Vote::buy("MACD", 1.0, "cross"),
            Vote::sell("RSI", 0.5, "overbought"),
            Vote::hold("CCI"),
        ];
        let expected = (1.5 - 0.6) / (1.5 + 1.2 + 1.1);
        assert!((aggregator().technical_score(&votes) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_technical_score_unknown_indicator_and_empty() {
        let agg = aggregator();
        assert_eq!(agg.technical_score(&[]), 0.0);
        let votes = vec![Vote::buy("Custom", 0.4, "")];
        assert!((agg.technical_score(&votes) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_combine_floor_and_boost() {
        let agg = aggregator();

        // Weak technical lean: floor applies, blend too small to boost.
        let d = agg.combine(0.001, 0.0, 0.0);
        assert_eq!(d.direction, Direction::Long);
        assert!((d.confidence - 0.25).abs() < 1e-12);

        // 0.1 technical: 0.5 from scale, blend 0.07 boosts to 0.7.
        let d = agg.combine(0.1, 0.0, 0.0);
        assert!((d.confidence - 0.7).abs() < 1e-12);

        let d = agg.combine(-0.5, 0.0, 0.0);
        assert_eq!(d.direction, Direction::Short);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_combine_hold_has_zero_confidence() {
        let d = aggregator().combine(0.0, 1.0, 1.0);
        assert_eq!(d.direction, Direction::Hold);
        assert_eq!(d.confidence, 0.0);
        assert!((d.combined_score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_combined_direction_source() {
        let agg = SignalAggregator::new(AggregatorConfig {
            direction_source: DirectionSource::Combined,
            ..Default::default()
        });
        let d = agg.combine(0.0, 1.0, 0.0);
        assert_eq!(d.direction, Direction::Long);

        let d = agg.combine(0.1, -1.0, 0.0);
        assert_eq!(d.direction, Direction::Short);
    }

    #[test]
    fn test_custom_thresholds() {
        let agg = SignalAggregator::new(AggregatorConfig {
            direction_threshold: 0.2,
            confidence_floor: 0.0,
            boost_threshold: 1.0,
            ..Default::default()
        });
        assert_eq!(agg.combine(0.15, 0.0, 0.0).direction, Direction::Hold);
        let d = agg.combine(0.3, 0.0, 0.0);
        assert!((d.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_collects_reasons() {
        let votes = vec![
            Vote::buy("RSI", 0.9, "Strong oversold condition"),
            Vote::hold("MACD"),
        ];
        let signal = aggregator().aggregate("BTCUSDT", Timeframe::Minute1, 100.0, 2.0, &votes, 0.0, f64::NAN);
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.reasons, vec!["RSI: Strong oversold condition".to_string()]);
        assert_eq!(signal.sentiment_score, 0.0);
        assert_eq!(signal.key(), "BTCUSDT:1m");
    }

    #[test]
    fn test_aggregate_bank_leaves_bank_untouched() {
        let mut bank = IndicatorBank::new();
        for i in 0..60 {
            let p = 100.0 - i as f64 * 0.3;
            bank.update(p + 0.2, p - 0.2, p, 10.0);
        }
        let before = bank.updates();
        let signal = aggregator().aggregate_bank("BTCUSDT", Timeframe::Minute5, 82.0, &bank, 0.0, 0.0);
        assert_eq!(bank.updates(), before);
        assert!((signal.volatility - bank.atr()).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&signal.confidence));
    }

    proptest! {
        #[test]
        fn test_confidence_in_unit_range(t in -1.0f64..1.0, m in -1.0f64..1.0, s in -1.0f64..1.0) {
            let d = aggregator().combine(t, m, s);
            prop_assert!((0.0..=1.0).contains(&d.confidence));
            if d.direction == Direction::Hold {
                prop_assert_eq!(d.confidence, 0.0);
            }
        }
    }
}
