//! Fear & Greed index sentiment.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;
use trading_core::error::ScoringError;
use trading_core::traits::{SentimentScore, SentimentSource};

use crate::wire::FearGreedResponse;

pub const DEFAULT_FEAR_GREED_URL: &str = "https://api.alternative.me/fng/";

/// Sentiment from the crypto Fear & Greed index.
pub struct FearGreedSentiment {
    client: Client,
    url: String,
}

impl FearGreedSentiment {
    pub fn new(url: impl Into<String>) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScoringError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

/// Map an index value in `[0, 100]` to a sentiment breakdown.
///
/// `overall = (value - 50) / 50`; the positive/negative split follows the
/// index directly.
pub fn score_from_index(value: f64) -> SentimentScore {
    let value = value.clamp(0.0, 100.0);
    let overall = (value - 50.0) / 50.0;
    let positive = value / 100.0;
    let negative = 1.0 - positive;
    let neutral = 1.0 - overall.abs();
    SentimentScore {
        overall,
        positive,
        negative,
        neutral,
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl SentimentSource for FearGreedSentiment {
    async fn sentiment(&self) -> Result<SentimentScore, ScoringError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ScoringError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Unavailable(format!("status {status}")));
        }
        let body: FearGreedResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;
        let entry = body
            .data
            .first()
            .ok_or_else(|| ScoringError::InvalidResponse("empty data".to_string()))?;
        debug!(value = entry.value, classification = %entry.value_classification, "Fear & Greed index");
        Ok(score_from_index(entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_from_index() {
        assert!((score_from_index(50.0).overall).abs() < 1e-12);
        assert!((score_from_index(100.0).overall - 1.0).abs() < 1e-12);
        assert!((score_from_index(25.0).overall + 0.5).abs() < 1e-12);
        assert!((score_from_index(150.0).overall - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_fetch_index() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fng/")
            .with_body(r#"{"name":"Fear and Greed Index","data":[{"value":"75","value_classification":"Greed","timestamp":"1700000000"}]}"#)
            .create_async()
            .await;

        let source = FearGreedSentiment::new(format!("{}/fng/", server.url())).unwrap();
        let score = source.sentiment().await.unwrap();
        assert!((score.overall - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_empty_and_failed_responses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/empty")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;
        server.mock("GET", "/down").with_status(502).create_async().await;

        let empty = FearGreedSentiment::new(format!("{}/empty", server.url())).unwrap();
        assert!(matches!(empty.sentiment().await, Err(ScoringError::InvalidResponse(_))));
        let down = FearGreedSentiment::new(format!("{}/down", server.url())).unwrap();
        assert!(matches!(down.sentiment().await, Err(ScoringError::Unavailable(_))));
    }
}
