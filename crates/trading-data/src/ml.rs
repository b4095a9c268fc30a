//! HTTP client for an external price-prediction service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use trading_core::error::ScoringError;
use trading_core::traits::{MlPredictor, Prediction};
use trading_core::types::Candle;

/// Request body of `POST {base}/predict`.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    symbol: &'a str,
    /// `[open, high, low, close, volume]` rows, oldest first
    candles: Vec<[f64; 5]>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predicted_price: f64,
    confidence: f64,
}

/// Prediction service reached over HTTP.
pub struct HttpPredictor {
    client: Client,
    base_url: String,
    /// Number of trailing candles sent with each request
    window: usize,
}

impl HttpPredictor {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScoringError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            window: 100,
        })
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }
}

#[async_trait]
impl MlPredictor for HttpPredictor {
    async fn predict(&self, symbol: &str, candles: &[Candle]) -> Result<Prediction, ScoringError> {
        if candles.is_empty() {
            return Err(ScoringError::Unavailable("no candles".to_string()));
        }
        let start = candles.len().saturating_sub(self.window);
        let request = PredictRequest {
            symbol,
            candles: candles[start..]
                .iter()
                .map(|c| [c.open, c.high, c.low, c.close, c.volume])
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoringError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Unavailable(format!("status {status}")));
        }
        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;
        if !body.predicted_price.is_finite() || !body.confidence.is_finite() {
            return Err(ScoringError::InvalidResponse("non-finite prediction".to_string()));
        }
        Ok(Prediction {
            predicted_price: body.predicted_price,
            confidence: body.confidence.clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64 * 60_000, 1.0, 2.0, 0.5, 1.5, 10.0, i as i64 * 60_000 + 59_999))
            .collect()
    }

    #[tokio::test]
    async fn test_predict_sends_window() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "symbol": "BTCUSDT",
                "candles": [[1.0, 2.0, 0.5, 1.5, 10.0], [1.0, 2.0, 0.5, 1.5, 10.0]]
            })))
            .with_body(r#"{"predicted_price": 101.5, "confidence": 1.7}"#)
            .create_async()
            .await;

        let predictor = HttpPredictor::new(server.url()).unwrap().with_window(2);
        let prediction = predictor.predict("BTCUSDT", &candles(5)).await.unwrap();
        mock.assert_async().await;
        assert!((prediction.predicted_price - 101.5).abs() < 1e-12);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_predict_failure() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/predict").with_status(500).create_async().await;
        let predictor = HttpPredictor::new(server.url()).unwrap();
        assert!(predictor.predict("BTCUSDT", &candles(3)).await.is_err());
        assert!(predictor.predict("BTCUSDT", &[]).await.is_err());
    }
}
