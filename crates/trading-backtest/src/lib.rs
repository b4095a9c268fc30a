//! Interval strategy backtesting.
//!
//! The candle history is split in half: the price band is trained on the
//! first half and traded on the second against a fresh paper ledger.

mod engine;
mod statistics;
mod report;

pub use engine::{BacktestEngine, BacktestConfig};
pub use statistics::BacktestStats;
pub use report::BacktestReport;
