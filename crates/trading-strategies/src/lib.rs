//! Signal aggregation and trading strategies.
//!
//! - [`SignalAggregator`]: fuses indicator votes with ML and sentiment scores
//!   into a directional, confidence-scored signal
//! - [`IntervalAnalyzer`] and [`IntervalStrategy`]: range trading on the most
//!   frequently traversed price band
//! - [`StrategyRegistry`]: catalogue of the built-in strategies

mod aggregator;
pub mod interval;
mod interval_strategy;
mod registry;

pub use aggregator::{AggregatorConfig, DirectionSource, SignalAggregator, SignalDecision};
pub use interval::{AnalysisMethod, IntervalAnalyzer, IntervalConfig, PriceInterval};
pub use interval_strategy::{IntervalStats, IntervalStrategy};
pub use registry::{StrategyInfo, StrategyKind, StrategyRegistry};
