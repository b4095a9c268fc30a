//! Market feed trait definitions.

use crate::error::FeedError;
use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Exchange's maximum number of candles per historical request.
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Typed candle and ticker feed consumed by the orchestrator.
///
/// Implementations normalise wire data before returning it; callers never see
/// raw exchange payloads.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Fetch recent historical candles.
    ///
    /// # Arguments
    /// * `symbol` - The symbol to fetch
    /// * `timeframe` - The candle interval
    /// * `limit` - Number of candles, capped at [`MAX_HISTORY_LIMIT`]
    ///
    /// # Returns
    /// Final candles ordered from oldest to newest
    async fn historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError>;

    /// Subscribe to live candle updates for one key.
    ///
    /// The stream carries both provisional and final candles. It stays open
    /// across reconnects and ends only when the receiver is dropped or the
    /// feed is shut down.
    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<mpsc::Receiver<Candle>, FeedError>;

    /// Latest traded price from the REST fallback.
    async fn current_price(&self, symbol: &str) -> Result<f64, FeedError>;
}
