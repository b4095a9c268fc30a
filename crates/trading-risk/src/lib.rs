//! Risk management for trading.
//!
//! Provides position sizing, stop-loss placement, and portfolio circuit breakers,
//! unified behind [`RiskEngine`].

mod portfolio_limits;
mod position_sizer;
mod risk_engine;
mod stop_loss;

pub use portfolio_limits::{LimitCheck, PortfolioLimits};
pub use position_sizer::PositionSizer;
pub use risk_engine::{DailyStats, RiskConfig, RiskEngine};
pub use stop_loss::{take_profit_price, StopLossCalculator, StopMultipliers};
