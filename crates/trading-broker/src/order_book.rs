//! Resting limit orders and the archive of executed market orders.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};
use trading_core::error::{LedgerError, OrderError};
use trading_core::types::{Order, OrderKind, PositionSide, Side};
use uuid::Uuid;

use crate::{Ledger, OpenRequest};

/// Limit orders settled against a shared [`Ledger`].
///
/// The order map lock is always taken before any ledger call.
pub struct OrderBook {
    ledger: Arc<Ledger>,
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl OrderBook {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            orders: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Place a limit order.
    ///
    /// Buy orders reserve `price * quantity`; sell orders must be covered by
    /// an open long position.
    pub fn create_limit(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Order, OrderError> {
        if price <= Decimal::ZERO {
            return Err(OrderError::Invalid(format!("price must be positive, got {price}")));
        }
        if quantity <= Decimal::ZERO {
            return Err(OrderError::Invalid(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mut orders = self.orders.lock();
        let mut order = Order::limit(symbol, side, price, quantity);
        match side {
            Side::Sell => {
                let position = self
                    .ledger
                    .position(symbol)
                    .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;
                if position.side != PositionSide::Long {
                    return Err(OrderError::Invalid(format!(
                        "no long position to sell on {symbol}"
                    )));
                }
                if quantity > position.quantity {
                    return Err(OrderError::ExceedsPosition {
                        requested: quantity,
                        available: position.quantity,
                    });
                }
            }
            Side::Buy => {
                let cost = price * quantity;
                self.ledger.reserve(cost)?;
                order.reserved = cost;
            }
        }

        info!(
            id = %order.id,
            symbol,
            side = %side,
            %price,
            %quantity,
            "Limit order created"
        );
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Fill up to `quantity` of an order at `price`.
    ///
    /// The quantity is clamped to what remains; a zero fill is a no-op.
    pub fn fill(&self, id: Uuid, price: Decimal, quantity: Decimal) -> Result<Order, OrderError> {
        let mut orders = self.orders.lock();
        self.fill_locked(&mut orders, id, price, quantity)
    }

    fn fill_locked(
        &self,
        orders: &mut HashMap<Uuid, Order>,
        id: Uuid,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Order, OrderError> {
        let order = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;
        if order.status.is_terminal() {
            return Err(OrderError::Terminal {
                id,
                status: order.status.to_string(),
            });
        }
        if price <= Decimal::ZERO {
            return Err(OrderError::Invalid(format!("fill price must be positive, got {price}")));
        }

        let remaining = order.remaining_quantity();
        let quantity = quantity.min(remaining);
        if quantity <= Decimal::ZERO {
            return Ok(order.clone());
        }

        let settled = match order.side {
            Side::Buy => {
                let release = if quantity == remaining {
                    order.reserved
                } else {
                    order.reserved * quantity / remaining
                };
                let own_position = order
                    .position_id
                    .filter(|id| self.ledger.position(&order.symbol).is_some_and(|p| p.id == *id));
                let settled = match own_position {
                    // A later fill of an order whose earlier fill opened the position.
                    Some(position_id) => self.ledger.increase_from_reserve(
                        &order.symbol,
                        position_id,
                        price,
                        quantity,
                        release,
                    ),
                    None => {
                        let request =
                            OpenRequest::new(&order.symbol, PositionSide::Long, price, quantity);
                        self.ledger.open_from_reserve(request, release)
                    }
                };
                settled.map(|position| {
                    order.reserved -= release;
                    order.position_id = Some(position.id);
                })
            }
            Side::Sell => self
                .ledger
                .reduce(&order.symbol, quantity, price, "Limit order filled")
                .map(|_| ()),
        };

        if let Err(e) = settled {
            warn!(id = %order.id, symbol = %order.symbol, error = %e, "Limit fill rejected, cancelling order");
            if order.reserved > Decimal::ZERO {
                self.ledger.refund(order.reserved)?;
                order.reserved = Decimal::ZERO;
            }
            order.cancel();
            return Err(e.into());
        }

        order.apply_fill(quantity);
        info!(
            id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            %price,
            %quantity,
            status = %order.status,
            "Limit order filled"
        );
        Ok(order.clone())
    }

    /// Fill every resting limit order on `symbol` whose price condition holds
    /// at `price`. Fills execute at the order's limit price.
    pub fn process_against_price(&self, symbol: &str, price: Decimal) -> Vec<Order> {
        let mut orders = self.orders.lock();

        let mut due: Vec<(Uuid, Decimal, Decimal, chrono::DateTime<chrono::Utc>)> = orders
            .values()
            .filter(|o| {
                o.symbol == symbol
                    && o.kind == OrderKind::Limit
                    && o.status.is_active()
                    && o.is_marketable(price)
            })
            .map(|o| (o.id, o.price, o.remaining_quantity(), o.created_at))
            .collect();
        due.sort_by_key(|(_, _, _, created_at)| *created_at);

        let mut filled = Vec::with_capacity(due.len());
        for (id, limit, remaining, _) in due {
            match self.fill_locked(&mut orders, id, limit, remaining) {
                Ok(order) => filled.push(order),
                Err(e) => warn!(%id, symbol, error = %e, "Limit order could not be filled"),
            }
        }
        filled
    }

    /// Cancel an active order and refund whatever it still holds in reserve.
    pub fn cancel(&self, id: Uuid) -> Result<Order, OrderError> {
        let mut orders = self.orders.lock();
        let order = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;
        if !order.status.is_active() {
            return Err(OrderError::Terminal {
                id,
                status: order.status.to_string(),
            });
        }

        if order.reserved > Decimal::ZERO {
            self.ledger.refund(order.reserved)?;
            order.reserved = Decimal::ZERO;
        }
        order.cancel();
        info!(%id, symbol = %order.symbol, "Order cancelled");
        Ok(order.clone())
    }

    /// Archive an executed market order.
    pub fn record_market(&self, symbol: &str, side: Side, price: Decimal, quantity: Decimal) -> Order {
        let order = Order::filled_market(symbol, side, price, quantity);
        self.orders.lock().insert(order.id, order.clone());
        order
    }

    /// Pending and partially filled orders, optionally for one symbol, oldest first.
    pub fn active_orders(&self, symbol: Option<&str>) -> Vec<Order> {
        let mut active: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|o| o.status.is_active() && symbol.map_or(true, |s| o.symbol == s))
            .cloned()
            .collect();
        active.sort_by_key(|o| o.created_at);
        active
    }

    /// Every order ever placed, oldest first.
    pub fn all_orders(&self) -> Vec<Order> {
        let mut all: Vec<Order> = self.orders.lock().values().cloned().collect();
        all.sort_by_key(|o| o.created_at);
        all
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders.lock().get(&id).cloned()
    }
}
