//! Optional external score providers.

use crate::error::ScoringError;
use crate::types::Candle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price prediction from an external model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_price: f64,
    /// Model confidence in `[0, 1]`
    pub confidence: f64,
}

impl Prediction {
    /// Directional score in `[-1, 1]` relative to the current price.
    ///
    /// The relative move is scaled so a 1% predicted move saturates, then
    /// weighted by the model's confidence.
    pub fn score(&self, current_price: f64) -> f64 {
        if current_price <= 0.0 || !self.predicted_price.is_finite() {
            return 0.0;
        }
        let change = (self.predicted_price - current_price) / current_price * 100.0;
        (change.clamp(-1.0, 1.0) * self.confidence.clamp(0.0, 1.0)).clamp(-1.0, 1.0)
    }
}

/// Market sentiment breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// Overall score in `[-1, 1]`
    pub overall: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub timestamp: DateTime<Utc>,
}

impl SentimentScore {
    /// Neutral sentiment.
    pub fn neutral() -> Self {
        Self {
            overall: 0.0,
            positive: 0.33,
            negative: 0.33,
            neutral: 0.34,
            timestamp: Utc::now(),
        }
    }
}

/// External price-prediction service.
#[async_trait]
pub trait MlPredictor: Send + Sync {
    /// Predict the next price from recent final candles.
    async fn predict(&self, symbol: &str, candles: &[Candle]) -> Result<Prediction, ScoringError>;
}

/// External sentiment service.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    /// Current market sentiment.
    async fn sentiment(&self) -> Result<SentimentScore, ScoringError>;
}
