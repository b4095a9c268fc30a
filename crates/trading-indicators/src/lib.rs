//! Streaming technical indicators.
//!
//! Every indicator is updated in O(1) from one final candle and keeps only
//! bounded recurrence state:
//! - Moving averages (EMA) and the rolling window they share
//! - Momentum indicators (RSI, StochRSI, MACD, Momentum)
//! - Volatility indicators (Bollinger Bands, ATR)
//! - Trend indicators (ADX, CCI, Williams %R)
//! - Volume indicators (OBV)
//!
//! [`IndicatorBank`] bundles the full set for one `(symbol, timeframe)` stream
//! and turns it into indicator votes.

pub mod bank;
pub mod momentum;
pub mod moving_average;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use bank::{IndicatorBank, IndicatorManager, IndicatorSnapshot};
pub use momentum::{Macd, MacdOutput, Momentum, Rsi, StochRsi, StochRsiOutput};
pub use moving_average::{Ema, RollingWindow};
pub use trend::{Adx, AdxOutput, Cci, WilliamsR};
pub use volatility::{Atr, BollingerBands, BollingerOutput};
pub use volume::Obv;
