//! Core data types for the trading system.

mod candle;
mod order;
mod position;
mod signal;
mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use order::{Order, OrderKind, OrderStatus, Side};
pub use position::{Position, PositionSide, Trade};
pub use signal::{signal_key, AggregatedSignal, Direction, Vote, VoteKind};
pub use timeframe::Timeframe;
