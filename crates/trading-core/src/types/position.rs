//! Position and trade types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Direction, Side};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    /// Map a signal direction onto a position side. `Hold` has none.
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Long => Some(PositionSide::Long),
            Direction::Short => Some(PositionSide::Short),
            Direction::Hold => None,
        }
    }

    /// Order side that opens a position of this direction.
    pub fn entry_side(&self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// Signed profit of moving from `entry` to `exit` with `quantity`.
    pub fn pnl(&self, entry: Decimal, exit: Decimal, quantity: Decimal) -> Decimal {
        match self {
            PositionSide::Long => (exit - entry) * quantity,
            PositionSide::Short => (entry - exit) * quantity,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// An open position on one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique position ID
    pub id: Uuid,
    /// Symbol
    pub symbol: String,
    /// Long or short
    pub side: PositionSide,
    /// Entry price
    pub entry_price: Decimal,
    /// Quantity held (always positive)
    pub quantity: Decimal,
    /// Stop-loss price; zero when unset
    pub stop_loss: Decimal,
    /// Take-profit price; zero when unset
    pub take_profit: Decimal,
    /// When the position was opened
    pub opened_at: DateTime<Utc>,
    /// Signal that opened the position, if any
    pub signal_id: Option<Uuid>,
    /// Latest mark price
    pub current_price: Decimal,
    /// Unrealized profit/loss at the mark price
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// Create a position marked at its entry price.
    pub fn new(
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: Decimal,
        quantity: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            opened_at: Utc::now(),
            signal_id: None,
            current_price: entry_price,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    /// Capital committed at entry.
    pub fn cost(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Mark the position at a new price.
    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = price;
        self.unrealized_pnl = self.side.pnl(self.entry_price, price, self.quantity);
    }

    /// Unrealized profit in percent of entry price at `price`.
    pub fn pnl_percent_at(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let move_pct = (price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED;
        match self.side {
            PositionSide::Long => move_pct,
            PositionSide::Short => -move_pct,
        }
    }

    /// Check whether `price` has breached the stop-loss.
    pub fn stop_hit(&self, price: Decimal) -> bool {
        if self.stop_loss.is_zero() {
            return false;
        }
        match self.side {
            PositionSide::Long => price <= self.stop_loss,
            PositionSide::Short => price >= self.stop_loss,
        }
    }

    /// Check whether `price` has reached the take-profit.
    pub fn target_hit(&self, price: Decimal) -> bool {
        if self.take_profit.is_zero() {
            return false;
        }
        match self.side {
            PositionSide::Long => price >= self.take_profit,
            PositionSide::Short => price <= self.take_profit,
        }
    }

    /// Whether `candidate` would tighten the current stop.
    pub fn is_tighter_stop(&self, candidate: Decimal) -> bool {
        if self.stop_loss.is_zero() {
            return candidate > Decimal::ZERO;
        }
        match self.side {
            PositionSide::Long => candidate > self.stop_loss,
            PositionSide::Short => candidate < self.stop_loss,
        }
    }
}

/// A closed (or partially closed) slice of a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade ID
    pub id: Uuid,
    /// Position this trade closed
    pub position_id: Uuid,
    /// Symbol
    pub symbol: String,
    /// Direction of the closed position
    pub side: PositionSide,
    /// Entry price
    pub entry_price: Decimal,
    /// Exit price
    pub exit_price: Decimal,
    /// Quantity closed
    pub quantity: Decimal,
    /// Realized profit/loss
    pub pnl: Decimal,
    /// Realized profit/loss in percent of cost
    pub pnl_percent: Decimal,
    /// When the position was opened
    pub opened_at: DateTime<Utc>,
    /// When the trade was closed
    pub closed_at: DateTime<Utc>,
    /// Holding time in seconds
    pub duration_secs: i64,
    /// Why the position was closed
    pub reason: String,
    /// Signal that opened the position, if any
    pub signal_id: Option<Uuid>,
}

impl Trade {
    /// Check if the trade made money.
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(side: PositionSide) -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side,
            entry_price: dec!(100),
            quantity: dec!(2),
            stop_loss: if side == PositionSide::Long { dec!(95) } else { dec!(105) },
            take_profit: if side == PositionSide::Long { dec!(110) } else { dec!(90) },
            opened_at: Utc::now(),
            signal_id: None,
            current_price: dec!(100),
            unrealized_pnl: Decimal::ZERO,
        }
    }

    #[test]
    fn test_side_pnl() {
        assert_eq!(PositionSide::Long.pnl(dec!(100), dec!(110), dec!(1)), dec!(10));
        assert_eq!(PositionSide::Short.pnl(dec!(100), dec!(110), dec!(1)), dec!(-10));
    }

    #[test]
    fn test_update_price() {
        let mut pos = position(PositionSide::Short);
        pos.update_price(dec!(97));
        assert_eq!(pos.unrealized_pnl, dec!(6));
        assert_eq!(pos.pnl_percent_at(dec!(97)), dec!(3));
    }

    #[test]
    fn test_stop_and_target() {
        let long = position(PositionSide::Long);
        assert!(long.stop_hit(dec!(95)));
        assert!(!long.stop_hit(dec!(96)));
        assert!(long.target_hit(dec!(111)));

        let short = position(PositionSide::Short);
        assert!(short.stop_hit(dec!(105)));
        assert!(short.target_hit(dec!(90)));
        assert!(!short.target_hit(dec!(91)));
    }

    #[test]
    fn test_tighter_stop() {
        let long = position(PositionSide::Long);
        assert!(long.is_tighter_stop(dec!(100)));
        assert!(!long.is_tighter_stop(dec!(90)));

        let short = position(PositionSide::Short);
        assert!(short.is_tighter_stop(dec!(100)));
        assert!(!short.is_tighter_stop(dec!(110)));
    }

    #[test]
    fn test_unset_levels_never_trigger() {
        let mut pos = position(PositionSide::Long);
        pos.stop_loss = Decimal::ZERO;
        pos.take_profit = Decimal::ZERO;
        assert!(!pos.stop_hit(dec!(1)));
        assert!(!pos.target_hit(dec!(1000)));
        assert!(pos.is_tighter_stop(dec!(90)));
    }
}
