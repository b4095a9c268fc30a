//! Order types and structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    /// Executed immediately at the given price
    Market,
    /// Rests in the book until the market reaches the limit price
    Limit,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Order status.
///
/// Transitions only move forward: `Pending -> PartiallyFilled -> Filled`, or
/// `Pending | PartiallyFilled -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Check if the order is active (can still be filled).
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// An order tracked by the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: Uuid,
    /// Symbol
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Market or limit
    pub kind: OrderKind,
    /// Limit price (execution price for market orders)
    pub price: Decimal,
    /// Requested quantity
    pub quantity: Decimal,
    /// Filled quantity so far
    pub filled_quantity: Decimal,
    /// Balance still held in reserve for the unfilled part (buy limits only)
    pub reserved: Decimal,
    /// Position opened by this order's first fill (buy limits only)
    #[serde(default)]
    pub position_id: Option<Uuid>,
    /// Current status
    pub status: OrderStatus,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order was completely filled
    pub filled_at: Option<DateTime<Utc>>,
    /// When the order was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending limit order.
    pub fn limit(symbol: impl Into<String>, side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit,
            price,
            quantity,
            filled_quantity: Decimal::ZERO,
            reserved: Decimal::ZERO,
            position_id: None,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            filled_at: None,
            cancelled_at: None,
        }
    }

    /// Create a market order record that has already executed.
    pub fn filled_market(
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            price,
            quantity,
            filled_quantity: quantity,
            reserved: Decimal::ZERO,
            position_id: None,
            status: OrderStatus::Filled,
            created_at: now,
            filled_at: Some(now),
            cancelled_at: None,
        }
    }

    /// Get the remaining unfilled quantity.
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    /// Check whether a market price satisfies the limit condition.
    pub fn is_marketable(&self, price: Decimal) -> bool {
        match self.side {
            Side::Buy => price <= self.price,
            Side::Sell => price >= self.price,
        }
    }

    /// Record a fill of `quantity` and advance the status.
    pub fn apply_fill(&mut self, quantity: Decimal) {
        self.filled_quantity += quantity;
        if self.filled_quantity >= self.quantity {
            self.filled_quantity = self.quantity;
            self.status = OrderStatus::Filled;
            self.filled_at = Some(Utc::now());
        } else if self.filled_quantity > Decimal::ZERO {
            self.status = OrderStatus::PartiallyFilled;
        }
    }

    /// Move the order to the cancelled state.
    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_order_status() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());

        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(!OrderStatus::Filled.is_active());
    }

    #[test]
    fn test_order_fills() {
        let mut order = Order::limit("BTCUSDT", Side::Buy, dec!(100), dec!(2));
        assert_eq!(order.remaining_quantity(), dec!(2));

        order.apply_fill(dec!(0.5));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining_quantity(), dec!(1.5));

        order.apply_fill(dec!(1.5));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.filled_at.is_some());
    }

    #[test]
    fn test_marketable() {
        let buy = Order::limit("BTCUSDT", Side::Buy, dec!(100), dec!(1));
        assert!(buy.is_marketable(dec!(99)));
        assert!(buy.is_marketable(dec!(100)));
        assert!(!buy.is_marketable(dec!(101)));

        let sell = Order::limit("BTCUSDT", Side::Sell, dec!(100), dec!(1));
        assert!(sell.is_marketable(dec!(101)));
        assert!(!sell.is_marketable(dec!(99)));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap();
        assert_eq!(json, "\"PARTIALLY_FILLED\"");
    }
}
