//! Signal execution and orchestration.
//!
//! - [`SignalBook`]: newest signal per stream, with bounded subscriptions
//! - [`TradingEngine`]: per-symbol decisions against the shared ledger
//! - [`Orchestrator`]: streams, indicators, aggregation and engines wired together
//! - [`IntervalRunner`]: drives the interval strategy through an engine

mod engine;
mod interval_runner;
mod orchestrator;
mod signal_book;

pub use engine::{EngineConfig, Execution, SignalOutcome, TradingEngine, TradingStats};
pub use interval_runner::IntervalRunner;
pub use orchestrator::{BotConfig, Orchestrator, RuntimeConfig};
pub use signal_book::SignalBook;
