//! Error types for the trading system.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Risk management blocked trade: {reason}")]
    RiskBlocked { reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Capital errors raised by the paper-trading ledger.
///
/// A ledger operation that fails never applies any part of its mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Position already open for {0}")]
    AlreadyOpen(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("No open position for {0}")]
    NoPosition(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Decimal),

    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),

    #[error("Refund of {requested} exceeds reserved amount {reserved}")]
    RefundExceedsReserved { requested: Decimal, reserved: Decimal },
}

/// Order book errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {id} is {status} and can no longer change")]
    Terminal { id: Uuid, status: String },

    #[error("Sell quantity {requested} exceeds position quantity {available}")]
    ExceedsPosition { requested: Decimal, available: Decimal },

    #[error("Invalid order: {0}")]
    Invalid(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Market feed errors.
///
/// All variants are transient from the engine's point of view.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Feed closed")]
    Closed,

    #[error("Unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),
}

/// Failure reported by an optional external scorer (ML or sentiment).
///
/// Callers degrade these to a zero contribution.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid scoring response: {0}")]
    InvalidResponse(String),
}

/// Data source errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
