//! Market data: exchange feed adapter, external scorers and candle storage.

mod csv_source;
mod feed;
mod ml;
mod rest;
mod sentiment;
mod store;
pub mod websocket;
pub mod wire;

pub use csv_source::CsvDataSource;
pub use feed::ExchangeFeed;
pub use ml::HttpPredictor;
pub use rest::{RestClient, DEFAULT_REST_URL};
pub use sentiment::{score_from_index, FearGreedSentiment, DEFAULT_FEAR_GREED_URL};
pub use store::CandleStore;
pub use websocket::{StreamConfig, DEFAULT_WS_URL};
