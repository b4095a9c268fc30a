//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Candle, CandleSeries, Timeframe)
//! - Indicator votes and aggregated signals
//! - Position, trade and order types for the paper ledger
//! - Core traits for indicators, market feeds, external scorers and strategies

pub mod types;
pub mod traits;
pub mod error;
pub mod money;

pub use error::{TradingError, TradingResult};
pub use types::*;
pub use traits::*;
