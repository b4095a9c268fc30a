//! Exchange-backed [`MarketFeed`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use trading_core::error::FeedError;
use trading_core::traits::MarketFeed;
use trading_core::types::{Candle, Timeframe};

use crate::rest::{RestClient, DEFAULT_REST_URL};
use crate::websocket::{spawn_kline_stream, StreamConfig};

/// Market feed combining the REST endpoints with WebSocket kline streams.
pub struct ExchangeFeed {
    rest: RestClient,
    stream: StreamConfig,
    shutdown: CancellationToken,
}

impl ExchangeFeed {
    pub fn new(rest: RestClient, stream: StreamConfig) -> Self {
        Self {
            rest,
            stream,
            shutdown: CancellationToken::new(),
        }
    }

    /// Feed against the public production endpoints.
    pub fn public() -> Result<Self, FeedError> {
        Ok(Self::new(RestClient::new(DEFAULT_REST_URL)?, StreamConfig::default()))
    }

    /// Close every open subscription.
    pub fn shutdown(&self) {
        info!("Shutting down market feed");
        self.shutdown.cancel();
    }
}

#[async_trait]
impl MarketFeed for ExchangeFeed {
    async fn historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        self.rest.klines(symbol, timeframe, limit).await
    }

    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<mpsc::Receiver<Candle>, FeedError> {
        if self.shutdown.is_cancelled() {
            return Err(FeedError::Closed);
        }
        Ok(spawn_kline_stream(
            self.stream.clone(),
            symbol,
            timeframe,
            self.shutdown.child_token(),
        ))
    }

    async fn current_price(&self, symbol: &str) -> Result<f64, FeedError> {
        self.rest.ticker_price(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fails() {
        let feed = ExchangeFeed::new(
            RestClient::new("http://127.0.0.1:1").unwrap(),
            StreamConfig::default(),
        );
        feed.shutdown();
        assert!(matches!(
            feed.subscribe("BTCUSDT", Timeframe::Minute1).await,
            Err(FeedError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_history_through_feed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"[[0,"1","2","0.5","1.5","10",59999]]"#)
            .create_async()
            .await;
        let feed = ExchangeFeed::new(RestClient::new(server.url()).unwrap(), StreamConfig::default());
        let candles = feed
            .historical_candles("BTCUSDT", Timeframe::Minute1, 10)
            .await
            .unwrap();
        assert_eq!(candles.len(), 1);
    }
}
