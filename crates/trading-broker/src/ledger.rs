//! Paper ledger: balance, reservations, open positions and closed trades.
//!
//! Every check and every mutation of one operation happens under a single
//! write lock, so concurrent callers can never double-spend the balance or
//! open two positions on one symbol.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::error::LedgerError;
use trading_core::types::{Position, PositionSide, Trade};
use uuid::Uuid;

/// Parameters of a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    /// Zero for no stop
    pub stop_loss: Decimal,
    /// Zero for no target
    pub take_profit: Decimal,
    pub signal_id: Option<Uuid>,
}

impl OpenRequest {
    pub fn new(
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            signal_id: None,
        }
    }

    /// Set stop-loss and take-profit.
    pub fn with_levels(mut self, stop_loss: Decimal, take_profit: Decimal) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn with_signal(mut self, signal_id: Uuid) -> Self {
        self.signal_id = Some(signal_id);
        self
    }

    pub fn cost(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(self.quantity));
        }
        if self.entry_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(self.entry_price));
        }
        Ok(())
    }

    fn into_position(self) -> Position {
        let mut position = Position::new(
            self.symbol,
            self.side,
            self.entry_price,
            self.quantity,
            self.stop_loss,
            self.take_profit,
        );
        position.signal_id = self.signal_id;
        position
    }
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub balance: Decimal,
    pub reserved: Decimal,
    pub equity: Decimal,
    pub exposure: Decimal,
    pub open_positions: usize,
    pub closed_trades: usize,
}

#[derive(Debug)]
struct LedgerState {
    balance: Decimal,
    reserved: Decimal,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
}

impl LedgerState {
    fn new(balance: Decimal) -> Self {
        Self {
            balance,
            reserved: Decimal::ZERO,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    fn exposure(&self) -> Decimal {
        self.positions.values().map(Position::cost).sum()
    }

    /// Close `quantity` of the position on `symbol` and record the slice.
    fn close_slice(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        exit_price: Decimal,
        reason: &str,
    ) -> Result<Trade, LedgerError> {
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;

        let quantity = quantity.min(position.quantity);
        let cost = position.entry_price * quantity;
        let pnl = position.side.pnl(position.entry_price, exit_price, quantity);
        let pnl_percent = if cost.is_zero() {
            Decimal::ZERO
        } else {
            pnl / cost * Decimal::ONE_HUNDRED
        };

        let closed_at = Utc::now();
        let trade = Trade {
            id: Uuid::new_v4(),
            position_id: position.id,
            symbol: symbol.to_string(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            quantity,
            pnl,
            pnl_percent,
            opened_at: position.opened_at,
            closed_at,
            duration_secs: (closed_at - position.opened_at).num_seconds(),
            reason: reason.to_string(),
            signal_id: position.signal_id,
        };

        position.quantity -= quantity;
        if position.quantity.is_zero() {
            self.positions.remove(symbol);
        } else {
            position.update_price(exit_price);
        }

        self.balance += cost + pnl;
        self.trades.push(trade.clone());
        Ok(trade)
    }
}

/// Paper account shared by every engine of a bot.
#[derive(Debug)]
pub struct Ledger {
    initial_balance: Decimal,
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            state: RwLock::new(LedgerState::new(initial_balance)),
        }
    }

    /// Open a position, debiting its cost from the free balance.
    pub fn open(&self, request: OpenRequest) -> Result<Position, LedgerError> {
        request.validate()?;

        let mut state = self.state.write();
        if state.positions.contains_key(&request.symbol) {
            return Err(LedgerError::AlreadyOpen(request.symbol));
        }
        let cost = request.cost();
        if cost > state.balance {
            return Err(LedgerError::InsufficientBalance {
                required: cost,
                available: state.balance,
            });
        }

        state.balance -= cost;
        let position = request.into_position();
        debug!(
            symbol = %position.symbol,
            side = %position.side,
            entry = %position.entry_price,
            quantity = %position.quantity,
            "Position opened"
        );
        state
            .positions
            .insert(position.symbol.clone(), position.clone());
        Ok(position)
    }

    /// Close the whole position on `symbol`.
    ///
    /// The loss is always booked in full. A short that lost more than its
    /// cost takes the excess from the free balance, which can leave the
    /// balance negative.
    pub fn close(&self, symbol: &str, exit_price: Decimal, reason: &str) -> Result<Trade, LedgerError> {
        if exit_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(exit_price));
        }
        let mut state = self.state.write();
        let quantity = state
            .positions
            .get(symbol)
            .map(|p| p.quantity)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;
        let trade = state.close_slice(symbol, quantity, exit_price, reason)?;
        debug!(symbol, pnl = %trade.pnl, reason, "Position closed");
        Ok(trade)
    }

    /// Close `quantity` of the position; closes it entirely when `quantity`
    /// covers the whole position.
    pub fn reduce(
        &self,
        symbol: &str,
        quantity: Decimal,
        exit_price: Decimal,
        reason: &str,
    ) -> Result<Trade, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        if exit_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(exit_price));
        }
        let mut state = self.state.write();
        let trade = state.close_slice(symbol, quantity, exit_price, reason)?;
        debug!(symbol, quantity = %trade.quantity, pnl = %trade.pnl, reason, "Position reduced");
        Ok(trade)
    }

    /// Move `amount` from the free balance into reservations.
    pub fn reserve(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(amount));
        }
        let mut state = self.state.write();
        if amount > state.balance {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: state.balance,
            });
        }
        state.balance -= amount;
        state.reserved += amount;
        Ok(())
    }

    /// Return `amount` of reservations to the free balance.
    pub fn refund(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(amount));
        }
        let mut state = self.state.write();
        if amount > state.reserved {
            return Err(LedgerError::RefundExceedsReserved {
                requested: amount,
                reserved: state.reserved,
            });
        }
        state.reserved -= amount;
        state.balance += amount;
        Ok(())
    }

    /// Open a position paid for by `release` of previously reserved funds.
    ///
    /// Any difference between the released reservation and the position cost
    /// settles against the free balance.
    pub fn open_from_reserve(
        &self,
        request: OpenRequest,
        release: Decimal,
    ) -> Result<Position, LedgerError> {
        request.validate()?;

        let mut state = self.state.write();
        if release < Decimal::ZERO || release > state.reserved {
            return Err(LedgerError::RefundExceedsReserved {
                requested: release,
                reserved: state.reserved,
            });
        }
        if state.positions.contains_key(&request.symbol) {
            return Err(LedgerError::AlreadyOpen(request.symbol));
        }
        let cost = request.cost();
        let available = release + state.balance;
        if cost > available {
            return Err(LedgerError::InsufficientBalance {
                required: cost,
                available,
            });
        }

        state.reserved -= release;
        state.balance += release - cost;
        let position = request.into_position();
        debug!(symbol = %position.symbol, %release, %cost, "Position opened from reservation");
        state
            .positions
            .insert(position.symbol.clone(), position.clone());
        Ok(position)
    }

    /// Add `quantity` at `price` to the long position `position_id`, paid for
    /// by `release` of reserved funds. The entry becomes the quantity-weighted
    /// average of both fills.
    pub fn increase_from_reserve(
        &self,
        symbol: &str,
        position_id: Uuid,
        price: Decimal,
        quantity: Decimal,
        release: Decimal,
    ) -> Result<Position, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }

        let mut state = self.state.write();
        if release < Decimal::ZERO || release > state.reserved {
            return Err(LedgerError::RefundExceedsReserved {
                requested: release,
                reserved: state.reserved,
            });
        }
        let available = release + state.balance;
        let position = match state.positions.get(symbol) {
            Some(p) if p.id == position_id && p.side == PositionSide::Long => p,
            Some(_) => return Err(LedgerError::AlreadyOpen(symbol.to_string())),
            None => return Err(LedgerError::NoPosition(symbol.to_string())),
        };
        let old_cost = position.cost();
        let new_quantity = position.quantity + quantity;
        let new_entry = (old_cost + price * quantity) / new_quantity;
        let added_cost = new_entry * new_quantity - old_cost;
        if added_cost > available {
            return Err(LedgerError::InsufficientBalance {
                required: added_cost,
                available,
            });
        }

        state.reserved -= release;
        state.balance += release - added_cost;
        let Some(position) = state.positions.get_mut(symbol) else {
            return Err(LedgerError::NoPosition(symbol.to_string()));
        };
        position.entry_price = new_entry;
        position.quantity = new_quantity;
        let mark = position.current_price;
        position.update_price(mark);
        debug!(symbol, %release, cost = %added_cost, quantity = %new_quantity, "Position increased from reservation");
        Ok(position.clone())
    }

    /// Mark the position on `symbol` at `price`. Returns the updated position.
    pub fn update_price(&self, symbol: &str, price: Decimal) -> Option<Position> {
        let mut state = self.state.write();
        let position = state.positions.get_mut(symbol)?;
        position.update_price(price);
        Some(position.clone())
    }

    /// Move the stop-loss to `stop` if that tightens it. Returns whether it moved.
    pub fn ratchet_stop(&self, symbol: &str, stop: Decimal) -> Result<bool, LedgerError> {
        let mut state = self.state.write();
        let position = state
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;
        if !position.is_tighter_stop(stop) {
            return Ok(false);
        }
        debug!(symbol, from = %position.stop_loss, to = %stop, "Stop tightened");
        position.stop_loss = stop;
        Ok(true)
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Free balance.
    pub fn balance(&self) -> Decimal {
        self.state.read().balance
    }

    /// Funds held for resting buy orders.
    pub fn reserved(&self) -> Decimal {
        self.state.read().reserved
    }

    /// Balance plus reservations plus the marked value of open positions.
    pub fn equity(&self) -> Decimal {
        let state = self.state.read();
        let marked: Decimal = state
            .positions
            .values()
            .map(|p| p.cost() + p.unrealized_pnl)
            .sum();
        state.balance + state.reserved + marked
    }

    /// Capital committed to open positions.
    pub fn exposure(&self) -> Decimal {
        self.state.read().exposure()
    }

    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.state.read().positions.get(symbol).cloned()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.state.read().positions.contains_key(symbol)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.state.read().positions.values().cloned().collect()
    }

    pub fn position_count(&self) -> usize {
        self.state.read().positions.len()
    }

    /// Closed trades, oldest first.
    pub fn trades(&self) -> Vec<Trade> {
        self.state.read().trades.clone()
    }

    /// Closed trades on one symbol, oldest first.
    pub fn trades_for(&self, symbol: &str) -> Vec<Trade> {
        self.state
            .read()
            .trades
            .iter()
            .filter(|t| t.symbol == symbol)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read();
        let marked: Decimal = state
            .positions
            .values()
            .map(|p| p.cost() + p.unrealized_pnl)
            .sum();
        LedgerSnapshot {
            balance: state.balance,
            reserved: state.reserved,
            equity: state.balance + state.reserved + marked,
            exposure: state.exposure(),
            open_positions: state.positions.len(),
            closed_trades: state.trades.len(),
        }
    }

    /// Restore the initial balance and forget positions, reservations and trades.
    pub fn reset(&self) {
        *self.state.write() = LedgerState::new(self.initial_balance);
    }
}
