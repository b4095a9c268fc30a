//! Indicator votes and aggregated trading signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timeframe;

/// Directional opinion of a single indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteKind {
    Buy,
    Sell,
    Hold,
}

/// One indicator's vote with a strength in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub kind: VoteKind,
    pub strength: f64,
    /// Indicator family name, used to look up the vote's weight
    pub indicator: String,
    pub reason: String,
}

impl Vote {
    /// Create a buy vote. Strength is clamped to `[0, 1]`.
    pub fn buy(indicator: &str, strength: f64, reason: &str) -> Self {
        Self::new(VoteKind::Buy, indicator, strength, reason)
    }

    /// Create a sell vote. Strength is clamped to `[0, 1]`.
    pub fn sell(indicator: &str, strength: f64, reason: &str) -> Self {
        Self::new(VoteKind::Sell, indicator, strength, reason)
    }

    /// Create a neutral vote.
    pub fn hold(indicator: &str) -> Self {
        Self::new(VoteKind::Hold, indicator, 0.0, "")
    }

    fn new(kind: VoteKind, indicator: &str, strength: f64, reason: &str) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            kind,
            strength,
            indicator: indicator.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Signed score: `+strength` for buy, `-strength` for sell, 0 for hold.
    pub fn score(&self) -> f64 {
        match self.kind {
            VoteKind::Buy => self.strength,
            VoteKind::Sell => -self.strength,
            VoteKind::Hold => 0.0,
        }
    }

    /// Check if the vote is directional.
    pub fn is_directional(&self) -> bool {
        self.kind != VoteKind::Hold
    }
}

/// Direction of an aggregated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Hold,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

/// Fused, confidence-scored signal for one `(symbol, timeframe)` key.
///
/// Signals are immutable once created. A newer signal for the same key
/// supersedes the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSignal {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Certainty in `[0, 1]`; always 0 for `Hold`
    pub confidence: f64,
    pub technical_score: f64,
    pub ml_score: f64,
    pub sentiment_score: f64,
    /// Price the signal was generated at
    pub price: f64,
    /// Volatility measure (ATR) used for stop placement
    pub volatility: f64,
    /// Reasons of the directional votes behind the signal
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedSignal {
    /// Key under which the signal is stored.
    pub fn key(&self) -> String {
        signal_key(&self.symbol, self.timeframe)
    }

    /// Check if the signal asks for a trade.
    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Hold
    }
}

/// Canonical `"symbol:timeframe"` key.
pub fn signal_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("{}:{}", symbol, timeframe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_score() {
        assert_eq!(Vote::buy("RSI", 0.8, "oversold").score(), 0.8);
        assert_eq!(Vote::sell("RSI", 0.8, "overbought").score(), -0.8);
        assert_eq!(Vote::hold("RSI").score(), 0.0);
    }

    #[test]
    fn test_vote_strength_is_clamped() {
        assert_eq!(Vote::buy("MACD", 3.0, "").strength, 1.0);
        assert_eq!(Vote::sell("MACD", -1.0, "").strength, 0.0);
        assert_eq!(Vote::buy("MACD", f64::NAN, "").strength, 0.0);
    }

    #[test]
    fn test_signal_key() {
        assert_eq!(signal_key("BTCUSDT", Timeframe::Minute5), "BTCUSDT:5m");
    }
}
