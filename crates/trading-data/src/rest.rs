//! Exchange REST client for candle history and ticker prices.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use trading_core::error::FeedError;
use trading_core::traits::MAX_HISTORY_LIMIT;
use trading_core::types::{Candle, Timeframe};

use crate::wire::{parse_rest_klines, TickerPrice};

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;

/// Public market-data endpoints; no API key required.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    retry_backoff: Duration,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_backoff: Duration::from_millis(500),
        })
    }

    /// Set the base delay between retries of throttled or failed requests.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters, retrying 429 and 5xx responses.
    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, FeedError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.client.get(&url).query(query).send().await;
            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(%url, attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    continue;
                }
                Err(e) => return Err(FeedError::Http(e.to_string())),
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .text()
                    .await
                    .map_err(|e| FeedError::Http(e.to_string()));
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                warn!(%url, %status, attempt, "Transient HTTP status, retrying");
                tokio::time::sleep(self.retry_backoff * attempt).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }

    /// Most recent closed candles, oldest first.
    pub async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let query = [
            ("symbol", symbol.to_uppercase()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self.get_text("/api/v3/klines", &query).await?;
        let mut candles = parse_rest_klines(&body)?;
        candles.sort_by_key(|c| c.open_time);
        debug!(symbol, timeframe = %timeframe, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    /// Latest traded price.
    pub async fn ticker_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let body = self
            .get_text("/api/v3/ticker/price", &[("symbol", symbol.to_uppercase())])
            .await?;
        let ticker: TickerPrice =
            serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))?;
        if ticker.price <= 0.0 {
            return Err(FeedError::Decode(format!(
                "non-positive price {} for {}",
                ticker.price, ticker.symbol
            )));
        }
        Ok(ticker.price)
    }
}
