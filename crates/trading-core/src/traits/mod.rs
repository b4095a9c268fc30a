//! Core traits for the trading system.

mod indicator;
mod market_feed;
mod scoring;
mod strategy;

pub use indicator::{OhlcvIndicator, StreamingIndicator, VoteSource};
pub use market_feed::{MarketFeed, MAX_HISTORY_LIMIT};
pub use scoring::{MlPredictor, Prediction, SentimentScore, SentimentSource};
pub use strategy::{Strategy, StrategyConfig, StrategyContext, StrategyState, TradeProposal};
