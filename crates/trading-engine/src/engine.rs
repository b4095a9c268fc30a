//! Per-symbol trading engine.
//!
//! Turns aggregated signals into ledger operations: opens sized by the risk
//! engine, reversals, breakeven stops and quick profit taking. A maintenance
//! loop marks the open position, enforces its stop and target, and fills
//! resting limit orders.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trading_broker::{Ledger, OpenRequest, OrderBook};
use trading_core::error::{OrderError, TradingError};
use trading_core::money::{floor_lot, to_decimal, to_f64};
use trading_core::traits::TradeProposal;
use trading_core::types::{AggregatedSignal, Order, Position, PositionSide, Side, Trade};
use trading_risk::{LimitCheck, RiskEngine};
use uuid::Uuid;

/// Decision thresholds of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    /// Signals below this confidence are ignored; 0 disables the check
    pub min_confidence: f64,
    pub max_daily_trades: u32,
    /// Minimum minutes between executed trades
    pub cooldown_minutes: u32,
    /// Opposing signals above this confidence reverse the position
    pub reversal_confidence: f64,
    /// Profit percent above which the stop moves to entry
    pub breakeven_pct: f64,
    /// Profit percent above which a weak signal closes the position
    pub quick_profit_pct: f64,
    /// Signal confidence below which quick profits are taken
    pub quick_profit_confidence: f64,
    /// Take-profit distance as a multiple of the stop distance
    pub reward_ratio: f64,
    pub maintenance_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            min_confidence: 0.3,
            max_daily_trades: 20,
            cooldown_minutes: 2,
            reversal_confidence: 0.5,
            breakeven_pct: 0.5,
            quick_profit_pct: 0.3,
            quick_profit_confidence: 0.4,
            reward_ratio: 1.5,
            maintenance_interval_secs: 1,
        }
    }
}

impl EngineConfig {
    /// Default thresholds for `symbol`.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!("min_confidence must be in [0, 1], got {}", self.min_confidence));
        }
        if self.reward_ratio <= 0.0 {
            return Err(format!("reward_ratio must be positive, got {}", self.reward_ratio));
        }
        if self.maintenance_interval_secs == 0 {
            return Err("maintenance_interval_secs must be positive".to_string());
        }
        Ok(())
    }
}

/// What [`TradingEngine::process_signal`] did with a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Rejected { reason: String },
    Opened(Position),
    /// The position was closed on an opposing signal; `opened` is the new
    /// position in the signal's direction, if one could be opened.
    Reversed {
        closed: Trade,
        opened: Option<Position>,
    },
    StopMovedToBreakeven { stop: Decimal },
    ClosedForProfit(Trade),
    Held,
}

impl SignalOutcome {
    fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Result of a manual order or strategy proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Opened(Position),
    Closed(Trade),
    None,
}

/// Running performance figures of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_pnl: Decimal,
    /// Equity change against the initial balance, in percent
    pub total_pnl_percent: f64,
    /// Percent of trades closed with a profit
    pub win_rate: f64,
    /// Mean percent gain of winning trades
    pub avg_win: f64,
    /// Mean percent result of losing trades (zero or negative)
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub peak_balance: Decimal,
    /// Largest drop from the peak, in percent
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub today_trades: u32,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
}

impl TradingStats {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_pnl: Decimal::ZERO,
            total_pnl_percent: 0.0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            profit_factor: 0.0,
            peak_balance: initial_balance,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
            today_trades: 0,
            last_trade_time: None,
            start_time: Utc::now(),
        }
    }

    /// Fold a closed trade in. `equity` is the account value after the close.
    pub fn record(&mut self, trade: &Trade, equity: Decimal, initial_balance: Decimal) {
        let pnl_pct = to_f64(trade.pnl_percent);
        self.total_trades += 1;
        self.total_pnl += trade.pnl;

        if trade.pnl > Decimal::ZERO {
            self.winning_trades += 1;
            let n = f64::from(self.winning_trades);
            self.avg_win = (self.avg_win * (n - 1.0) + pnl_pct) / n;
        } else {
            self.losing_trades += 1;
            let n = f64::from(self.losing_trades);
            self.avg_loss = (self.avg_loss * (n - 1.0) + pnl_pct) / n;
        }
        self.win_rate = f64::from(self.winning_trades) / f64::from(self.total_trades) * 100.0;

        if initial_balance > Decimal::ZERO {
            self.total_pnl_percent = to_f64((equity - initial_balance) / initial_balance) * 100.0;
        }
        if equity > self.peak_balance {
            self.peak_balance = equity;
        }
        if self.peak_balance > Decimal::ZERO {
            self.current_drawdown = to_f64((self.peak_balance - equity) / self.peak_balance) * 100.0;
            self.max_drawdown = self.max_drawdown.max(self.current_drawdown);
        }

        let total_losses = -self.avg_loss * f64::from(self.losing_trades);
        if total_losses > 0.0 {
            self.profit_factor = self.avg_win * f64::from(self.winning_trades) / total_losses;
        }
    }
}

struct EngineState {
    stats: TradingStats,
    today: NaiveDate,
    /// Number of this symbol's ledger trades already folded into the stats
    trade_cursor: usize,
}

/// Executes signals and manual orders for one symbol.
///
/// All decisions for the symbol are serialised by the engine's state lock,
/// which is always taken before any ledger or order book call.
pub struct TradingEngine {
    config: RwLock<EngineConfig>,
    ledger: Arc<Ledger>,
    order_book: Arc<OrderBook>,
    risk: Arc<RiskEngine>,
    state: Mutex<EngineState>,
    last_price: Mutex<Option<Decimal>>,
    running: Mutex<Option<CancellationToken>>,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<Ledger>,
        order_book: Arc<OrderBook>,
        risk: Arc<RiskEngine>,
    ) -> Self {
        let initial = ledger.initial_balance();
        let trade_cursor = ledger.trades_for(&config.symbol).len();
        Self {
            config: RwLock::new(config),
            ledger,
            order_book,
            risk,
            state: Mutex::new(EngineState {
                stats: TradingStats::new(initial),
                today: Utc::now().date_naive(),
                trade_cursor,
            }),
            last_price: Mutex::new(None),
            running: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> String {
        self.config.read().symbol.clone()
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Replace the thresholds. The traded symbol never changes.
    pub fn update_config(&self, mut config: EngineConfig) {
        let mut current = self.config.write();
        if config.symbol != current.symbol {
            warn!(
                from = %current.symbol,
                to = %config.symbol,
                "Engine symbol cannot change at runtime, keeping current symbol"
            );
            config.symbol = current.symbol.clone();
        }
        info!(symbol = %config.symbol, min_confidence = config.min_confidence, "Engine configuration updated");
        *current = config;
    }

    /// Record the latest market price.
    pub fn update_price(&self, price: f64) {
        let price = to_decimal(price);
        if price > Decimal::ZERO {
            *self.last_price.lock() = Some(price);
        }
    }

    pub fn last_price(&self) -> Option<Decimal> {
        *self.last_price.lock()
    }

    pub fn process_signal(&self, signal: &AggregatedSignal) -> SignalOutcome {
        self.process_signal_at(signal, Utc::now())
    }

    /// Decide on `signal` as of `now`.
    pub fn process_signal_at(&self, signal: &AggregatedSignal, now: DateTime<Utc>) -> SignalOutcome {
        let config = self.config();
        let mut state = self.state.lock();

        if signal.symbol != config.symbol {
            return SignalOutcome::rejected(format!(
                "Signal for {} sent to {} engine",
                signal.symbol, config.symbol
            ));
        }
        let Some(side) = PositionSide::from_direction(signal.direction) else {
            return SignalOutcome::rejected("Hold signal");
        };
        if let Err(reason) = can_trade(&config, &state.stats, now) {
            debug!(symbol = %config.symbol, %reason, "Signal skipped");
            return SignalOutcome::rejected(reason);
        }
        if config.min_confidence > 0.0 && signal.confidence < config.min_confidence {
            return SignalOutcome::rejected(format!(
                "Confidence {:.2} below minimum {:.2}",
                signal.confidence, config.min_confidence
            ));
        }

        let price = to_decimal(signal.price);
        if price <= Decimal::ZERO {
            return SignalOutcome::rejected("Signal has no price");
        }

        let outcome = match self.ledger.position(&config.symbol) {
            None => match self.open_for_signal(&config, &mut state, signal, side, price, now) {
                Ok(position) => SignalOutcome::Opened(position),
                Err(reason) => SignalOutcome::rejected(reason),
            },
            Some(position) => self.handle_existing(&config, &mut state, signal, side, price, position, now),
        };

        self.sync_trades(&config.symbol, &mut state, now);
        if !outcome.is_rejected() {
            info!(
                symbol = %config.symbol,
                direction = %signal.direction,
                confidence = signal.confidence,
                outcome = outcome_name(&outcome),
                "Signal processed"
            );
        }
        outcome
    }

    fn open_for_signal(
        &self,
        config: &EngineConfig,
        state: &mut EngineState,
        signal: &AggregatedSignal,
        side: PositionSide,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Position, String> {
        let balance = self.ledger.balance();
        if let LimitCheck::Blocked { reason } = self.risk.check_open(balance, self.ledger.exposure()) {
            return Err(reason);
        }

        let stop = self
            .risk
            .stop_loss(price, to_decimal(signal.volatility), side, signal.confidence);
        let quantity = self.risk.position_size(balance, price, stop);
        if quantity <= Decimal::ZERO {
            return Err("Position size is zero".to_string());
        }
        let target = self
            .risk
            .take_profit(price, stop, side, to_decimal(config.reward_ratio));

        let request = OpenRequest::new(&config.symbol, side, price, quantity)
            .with_levels(stop, target)
            .with_signal(signal.id);
        let position = self.ledger.open(request).map_err(|e| e.to_string())?;
        self.order_book
            .record_market(&config.symbol, side.entry_side(), price, quantity);
        stamp_open(state, now);

        info!(
            symbol = %config.symbol,
            side = %side,
            entry = %price,
            quantity = %quantity,
            stop = %stop,
            target = %target,
            "Position opened from signal"
        );
        Ok(position)
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_existing(
        &self,
        config: &EngineConfig,
        state: &mut EngineState,
        signal: &AggregatedSignal,
        side: PositionSide,
        price: Decimal,
        position: Position,
        now: DateTime<Utc>,
    ) -> SignalOutcome {
        if side != position.side && signal.confidence > config.reversal_confidence {
            let closed = match self.close_position(&position, price, "Signal reversal") {
                Ok(trade) => trade,
                Err(reason) => return SignalOutcome::rejected(reason),
            };
            let opened = match self.open_for_signal(config, state, signal, side, price, now) {
                Ok(p) => Some(p),
                Err(reason) => {
                    warn!(symbol = %config.symbol, %reason, "Reversal closed without reopening");
                    None
                }
            };
            return SignalOutcome::Reversed { closed, opened };
        }

        let pnl_pct = to_f64(position.pnl_percent_at(price));
        let mut moved = false;
        if pnl_pct > config.breakeven_pct {
            match self.ledger.ratchet_stop(&config.symbol, position.entry_price) {
                Ok(true) => {
                    info!(symbol = %config.symbol, stop = %position.entry_price, "Stop moved to breakeven");
                    moved = true;
                }
                Ok(false) => {}
                Err(e) => warn!(symbol = %config.symbol, error = %e, "Could not move stop"),
            }
        }

        if pnl_pct > config.quick_profit_pct && signal.confidence < config.quick_profit_confidence {
            return match self.close_position(&position, price, "Quick profit taken") {
                Ok(trade) => SignalOutcome::ClosedForProfit(trade),
                Err(reason) => SignalOutcome::rejected(reason),
            };
        }

        if moved {
            SignalOutcome::StopMovedToBreakeven {
                stop: position.entry_price,
            }
        } else {
            SignalOutcome::Held
        }
    }

    fn close_position(&self, position: &Position, price: Decimal, reason: &str) -> Result<Trade, String> {
        let trade = self
            .ledger
            .close(&position.symbol, price, reason)
            .map_err(|e| e.to_string())?;
        self.order_book.record_market(
            &position.symbol,
            position.side.opposite().entry_side(),
            price,
            trade.quantity,
        );
        info!(symbol = %position.symbol, exit = %price, pnl = %trade.pnl, reason, "Position closed");
        Ok(trade)
    }

    /// Fold trades closed since the last sync into the stats and the risk
    /// engine's daily results.
    fn sync_trades(&self, symbol: &str, state: &mut EngineState, now: DateTime<Utc>) -> Vec<Trade> {
        let trades = self.ledger.trades_for(symbol);
        let start = state.trade_cursor.min(trades.len());
        let fresh: Vec<Trade> = trades[start..].to_vec();
        state.trade_cursor = trades.len();
        if fresh.is_empty() {
            return fresh;
        }

        let equity = self.ledger.equity();
        let initial = self.ledger.initial_balance();
        for trade in &fresh {
            self.risk.record_trade(trade.pnl);
            state.stats.record(trade, equity, initial);
        }
        state.stats.last_trade_time = Some(now);
        fresh
    }

    /// Mark the position at the last price, enforce its stop and target, and
    /// fill resting limit orders.
    ///
    /// Returns the trades closed during the tick. Does nothing until a price
    /// is known.
    pub fn maintenance_tick(&self) -> Vec<Trade> {
        let Some(price) = self.last_price() else {
            return Vec::new();
        };
        let symbol = self.symbol();
        let now = Utc::now();
        let mut state = self.state.lock();

        if let Some(position) = self.ledger.update_price(&symbol, price) {
            let reason = if position.stop_hit(price) {
                Some("Stop loss hit")
            } else if position.target_hit(price) {
                Some("Take profit hit")
            } else {
                None
            };
            if let Some(reason) = reason {
                if let Err(e) = self.close_position(&position, price, reason) {
                    warn!(%symbol, error = %e, "Protective close failed");
                }
            }
        }

        for order in self.order_book.process_against_price(&symbol, price) {
            if order.side == Side::Buy && self.ledger.has_position(&symbol) {
                stamp_open(&mut state, now);
            }
        }

        self.sync_trades(&symbol, &mut state, now)
    }

    /// Spawn the maintenance loop. Returns `false` when it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());

        let engine = Arc::clone(self);
        let period = Duration::from_secs(self.config.read().maintenance_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        engine.maintenance_tick();
                    }
                }
            }
            debug!(symbol = %engine.symbol(), "Maintenance loop stopped");
        });
        info!(symbol = %self.symbol(), "Trading engine started");
        true
    }

    pub fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
            info!(symbol = %self.symbol(), "Trading engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Start a new trading day when `date` differs from the current one.
    pub fn reset_daily(&self, date: NaiveDate) {
        let mut state = self.state.lock();
        if state.today == date {
            return;
        }
        info!(symbol = %self.symbol(), trades = state.stats.today_trades, "Daily trade count reset");
        state.today = date;
        state.stats.today_trades = 0;
        drop(state);
        self.risk.reset_daily(date);
    }

    /// Place a limit order on the engine's symbol.
    pub fn place_limit_order(&self, side: Side, price: Decimal, quantity: Decimal) -> Result<Order, OrderError> {
        let _state = self.state.lock();
        self.order_book.create_limit(&self.symbol(), side, price, quantity)
    }

    pub fn cancel_order(&self, id: Uuid) -> Result<Order, OrderError> {
        let _state = self.state.lock();
        self.order_book.cancel(id)
    }

    /// Execute a market order at `price`.
    ///
    /// A buy opens a long position with optional stop and target (zero means
    /// unset); a sell reduces or closes the open position.
    pub fn execute_market_order(
        &self,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<Execution, TradingError> {
        let symbol = self.symbol();
        let now = Utc::now();
        let mut state = self.state.lock();

        let execution = match side {
            Side::Buy => {
                let request = OpenRequest::new(&symbol, PositionSide::Long, price, floor_lot(quantity))
                    .with_levels(stop_loss, take_profit);
                let position = self.ledger.open(request)?;
                self.order_book
                    .record_market(&symbol, Side::Buy, price, position.quantity);
                stamp_open(&mut state, now);
                info!(%symbol, %price, quantity = %position.quantity, "Market buy executed");
                Execution::Opened(position)
            }
            Side::Sell => {
                let position = self
                    .ledger
                    .position(&symbol)
                    .ok_or_else(|| TradingError::Validation(format!("No position to sell on {symbol}")))?;
                let quantity = quantity.min(position.quantity);
                let reason = if quantity >= position.quantity {
                    "Manual sell"
                } else {
                    "Partial sell"
                };
                let trade = self.ledger.reduce(&symbol, quantity, price, reason)?;
                self.order_book.record_market(
                    &symbol,
                    position.side.opposite().entry_side(),
                    price,
                    trade.quantity,
                );
                info!(%symbol, %price, quantity = %trade.quantity, pnl = %trade.pnl, "Market sell executed");
                Execution::Closed(trade)
            }
        };

        self.sync_trades(&symbol, &mut state, now);
        Ok(execution)
    }

    /// Carry out a strategy's proposal at `price`.
    ///
    /// Opens are subject to the risk engine's exposure and daily loss checks
    /// but not to the signal cooldown.
    pub fn execute_proposal(&self, proposal: &TradeProposal, price: f64) -> Result<Execution, TradingError> {
        let symbol = self.symbol();
        let now = Utc::now();
        let price = to_decimal(price);
        let mut state = self.state.lock();

        let execution = match proposal {
            TradeProposal::Hold => Execution::None,
            TradeProposal::Open {
                side,
                quantity,
                stop_loss,
                take_profit,
                reason,
            } => {
                if let LimitCheck::Blocked { reason } =
                    self.risk.check_open(self.ledger.balance(), self.ledger.exposure())
                {
                    return Err(TradingError::RiskBlocked { reason });
                }
                let quantity = floor_lot(to_decimal(*quantity));
                let request = OpenRequest::new(&symbol, *side, price, quantity)
                    .with_levels(to_decimal(*stop_loss), to_decimal(*take_profit));
                let position = self.ledger.open(request)?;
                self.order_book
                    .record_market(&symbol, side.entry_side(), price, quantity);
                stamp_open(&mut state, now);
                info!(%symbol, side = %side, %price, %quantity, %reason, "Proposal opened position");
                Execution::Opened(position)
            }
            TradeProposal::Close { reason } => {
                let position = self
                    .ledger
                    .position(&symbol)
                    .ok_or_else(|| TradingError::Validation(format!("No position to close on {symbol}")))?;
                let trade = self
                    .close_position(&position, price, reason)
                    .map_err(TradingError::Validation)?;
                Execution::Closed(trade)
            }
        };

        self.sync_trades(&symbol, &mut state, now);
        Ok(execution)
    }

    pub fn stats(&self) -> TradingStats {
        self.state.lock().stats.clone()
    }

    pub fn balance(&self) -> Decimal {
        self.ledger.balance()
    }

    pub fn position(&self) -> Option<Position> {
        self.ledger.position(&self.symbol())
    }

    /// Open positions across the shared ledger.
    pub fn positions(&self) -> Vec<Position> {
        self.ledger.positions()
    }

    pub fn trade_history(&self) -> Vec<Trade> {
        self.ledger.trades_for(&self.symbol())
    }

    /// Active orders on the engine's symbol.
    pub fn orders(&self) -> Vec<Order> {
        self.order_book.active_orders(Some(&self.symbol()))
    }

    pub fn all_orders(&self) -> Vec<Order> {
        self.order_book.all_orders()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

/// Daily cap and cooldown check.
fn can_trade(config: &EngineConfig, stats: &TradingStats, now: DateTime<Utc>) -> Result<(), String> {
    if stats.today_trades >= config.max_daily_trades {
        return Err(format!(
            "Daily trade limit reached ({}/{})",
            stats.today_trades, config.max_daily_trades
        ));
    }
    if let Some(last) = stats.last_trade_time {
        let cooldown = chrono::Duration::minutes(i64::from(config.cooldown_minutes));
        if now - last < cooldown {
            return Err(format!("Cooldown active ({} min)", config.cooldown_minutes));
        }
    }
    Ok(())
}

fn stamp_open(state: &mut EngineState, now: DateTime<Utc>) {
    state.stats.today_trades += 1;
    state.stats.last_trade_time = Some(now);
}

fn outcome_name(outcome: &SignalOutcome) -> &'static str {
    match outcome {
        SignalOutcome::Rejected { .. } => "rejected",
        SignalOutcome::Opened(_) => "opened",
        SignalOutcome::Reversed { .. } => "reversed",
        SignalOutcome::StopMovedToBreakeven { .. } => "breakeven",
        SignalOutcome::ClosedForProfit(_) => "quick_profit",
        SignalOutcome::Held => "held",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use trading_core::types::{Direction, OrderStatus, Timeframe};

    fn engine_with(config: EngineConfig) -> TradingEngine {
        let ledger = Arc::new(Ledger::new(dec!(10000)));
        let order_book = Arc::new(OrderBook::new(Arc::clone(&ledger)));
        TradingEngine::new(config, ledger, order_book, Arc::new(RiskEngine::default()))
    }

    fn engine() -> TradingEngine {
        engine_with(EngineConfig::for_symbol("BTCUSDT"))
    }

    fn signal(direction: Direction, confidence: f64, price: f64) -> AggregatedSignal {
        AggregatedSignal {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::Minute1,
            direction,
            confidence,
            technical_score: 0.1,
            ml_score: 0.0,
            sentiment_score: 0.0,
            price,
            volatility: 1.0,
            reasons: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_open_sized_by_risk() {
        let engine = engine();
        match engine.process_signal(&signal(Direction::Long, 0.6, 100.0)) {
            SignalOutcome::Opened(position) => {
                // Stop 1.5 ATR below entry; risk sizing capped at 20% of balance.
                assert_eq!(position.stop_loss, dec!(98.5));
                assert_eq!(position.quantity, dec!(20));
                assert_eq!(position.take_profit, dec!(102.25));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(engine.balance(), dec!(8000));
        assert_eq!(engine.stats().today_trades, 1);
        assert_eq!(engine.all_orders().len(), 1);
    }

    #[test]
    fn test_rejections_in_order() {
        let engine = engine();
        let mut other = signal(Direction::Long, 0.9, 100.0);
        other.symbol = "ETHUSDT".to_string();
        assert!(engine.process_signal(&other).is_rejected());
        assert_eq!(
            engine.process_signal(&signal(Direction::Hold, 0.0, 100.0)),
            SignalOutcome::Rejected {
                reason: "Hold signal".to_string()
            }
        );
        match engine.process_signal(&signal(Direction::Long, 0.1, 100.0)) {
            SignalOutcome::Rejected { reason } => assert!(reason.contains("below minimum")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(engine.position().is_none());
    }

    #[test]
    fn test_cooldown_rejects_signal_30s_later() {
        let engine = engine();
        let t0 = Utc::now();
        assert!(matches!(
            engine.process_signal_at(&signal(Direction::Long, 0.6, 100.0), t0),
            SignalOutcome::Opened(_)
        ));

        let later = engine.process_signal_at(&signal(Direction::Short, 0.9, 101.0), t0 + ChronoDuration::seconds(30));
        match later {
            SignalOutcome::Rejected { reason } => assert!(reason.contains("Cooldown")),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let after = engine.process_signal_at(&signal(Direction::Short, 0.9, 101.0), t0 + ChronoDuration::minutes(3));
        assert!(matches!(after, SignalOutcome::Reversed { .. }));
    }

    #[test]
    fn test_zero_min_confidence_disables_check() {
        let mut config = EngineConfig::for_symbol("BTCUSDT");
        config.min_confidence = 0.0;
        let engine = engine_with(config);
        assert!(matches!(
            engine.process_signal(&signal(Direction::Long, 0.05, 100.0)),
            SignalOutcome::Opened(_)
        ));
    }

    #[test]
    fn test_daily_cap() {
        let mut config = EngineConfig::for_symbol("BTCUSDT");
        config.max_daily_trades = 1;
        config.cooldown_minutes = 0;
        let engine = engine_with(config);
        let t0 = Utc::now();
        engine.process_signal_at(&signal(Direction::Long, 0.6, 100.0), t0);
        match engine.process_signal_at(&signal(Direction::Long, 0.6, 100.0), t0) {
            SignalOutcome::Rejected { reason } => assert!(reason.contains("Daily trade limit")),
            other => panic!("unexpected outcome: {:?}", other),
        }

        engine.reset_daily(t0.date_naive() + ChronoDuration::days(1));
        assert_eq!(engine.stats().today_trades, 0);
    }

    #[test]
    fn test_breakeven_then_quick_profit() {
        let mut config = EngineConfig::for_symbol("BTCUSDT");
        config.cooldown_minutes = 0;
        let engine = engine_with(config);
        engine.process_signal(&signal(Direction::Long, 0.6, 100.0));

        // +0.6% with a strong same-side signal moves the stop only.
        assert_eq!(
            engine.process_signal(&signal(Direction::Long, 0.6, 100.6)),
            SignalOutcome::StopMovedToBreakeven { stop: dec!(100) }
        );
        assert_eq!(engine.position().unwrap().stop_loss, dec!(100));
        assert_eq!(engine.process_signal(&signal(Direction::Long, 0.6, 100.6)), SignalOutcome::Held);

        // A weak signal above the quick-profit threshold closes.
        match engine.process_signal(&signal(Direction::Long, 0.35, 100.4)) {
            SignalOutcome::ClosedForProfit(trade) => assert_eq!(trade.reason, "Quick profit taken"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(engine.position().is_none());
        assert_eq!(engine.stats().winning_trades, 1);
    }

    #[test]
    fn test_weak_opposing_signal_holds() {
        let mut config = EngineConfig::for_symbol("BTCUSDT");
        config.cooldown_minutes = 0;
        let engine = engine_with(config);
        engine.process_signal(&signal(Direction::Long, 0.6, 100.0));
        assert_eq!(engine.process_signal(&signal(Direction::Short, 0.45, 100.0)), SignalOutcome::Held);
    }

    #[test]
    fn test_reversal_opens_opposite() {
        let mut config = EngineConfig::for_symbol("BTCUSDT");
        config.cooldown_minutes = 0;
        let engine = engine_with(config);
        engine.process_signal(&signal(Direction::Long, 0.6, 100.0));
        match engine.process_signal(&signal(Direction::Short, 0.8, 99.0)) {
            SignalOutcome::Reversed { closed, opened } => {
                assert_eq!(closed.reason, "Signal reversal");
                assert_eq!(opened.unwrap().side, PositionSide::Short);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(engine.stats().losing_trades, 1);
        assert_eq!(engine.stats().today_trades, 2);
    }

    #[test]
    fn test_maintenance_closes_at_stop() {
        let engine = engine();
        assert!(engine.maintenance_tick().is_empty());
        engine.process_signal(&signal(Direction::Long, 0.6, 100.0));

        engine.update_price(99.0);
        assert!(engine.maintenance_tick().is_empty());
        assert_eq!(engine.position().unwrap().current_price, dec!(99));

        engine.update_price(98.0);
        let closed = engine.maintenance_tick();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].reason, "Stop loss hit");
        assert!(engine.position().is_none());
        assert_eq!(engine.stats().total_trades, 1);
    }

    #[test]
    fn test_maintenance_closes_at_target() {
        let engine = engine();
        engine.process_signal(&signal(Direction::Short, 0.6, 100.0));
        engine.update_price(97.0);
        let closed = engine.maintenance_tick();
        assert_eq!(closed[0].reason, "Take profit hit");
        assert!(closed[0].pnl > Decimal::ZERO);
    }

    #[test]
    fn test_long_market_round_trip() {
        let engine = engine();
        let before = engine.balance();
        engine
            .execute_market_order(Side::Buy, dec!(100), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        let execution = engine
            .execute_market_order(Side::Sell, dec!(110), dec!(5), Decimal::ZERO, Decimal::ZERO)
            .unwrap();

        match execution {
            Execution::Closed(trade) => {
                assert_eq!(trade.pnl, dec!(10));
                assert_eq!(trade.pnl_percent, dec!(10));
                assert_eq!(trade.reason, "Manual sell");
            }
            other => panic!("unexpected execution: {:?}", other),
        }
        assert_eq!(engine.balance(), before + dec!(10));
        let stats = engine.stats();
        assert_eq!(stats.total_pnl, dec!(10));
        assert!((stats.win_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_executions_compare_by_value() {
        let engine = engine();
        let opened = engine
            .execute_market_order(Side::Buy, dec!(100), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        assert_eq!(opened, Execution::Opened(engine.position().unwrap()));

        let closed = engine
            .execute_market_order(Side::Sell, dec!(101), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        let trade = engine.trade_history().pop().unwrap();
        assert_eq!(closed, Execution::Closed(trade.clone()));
        assert_ne!(SignalOutcome::ClosedForProfit(trade), SignalOutcome::Held);
    }

    #[test]
    fn test_partial_market_sell() {
        let engine = engine();
        engine
            .execute_market_order(Side::Buy, dec!(100), dec!(2), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        engine
            .execute_market_order(Side::Sell, dec!(105), dec!(0.5), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        assert_eq!(engine.position().unwrap().quantity, dec!(1.5));
        assert_eq!(engine.trade_history()[0].reason, "Partial sell");
        engine
            .execute_market_order(Side::Sell, dec!(105), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        // Oversized sells are clamped to the remaining 0.5 and close the position.
        match engine
            .execute_market_order(Side::Sell, dec!(105), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap()
        {
            Execution::Closed(trade) => {
                assert_eq!(trade.quantity, dec!(0.5));
                assert_eq!(trade.reason, "Manual sell");
            }
            other => panic!("unexpected execution: {:?}", other),
        }
        assert!(engine
            .execute_market_order(Side::Sell, dec!(105), dec!(1), Decimal::ZERO, Decimal::ZERO)
            .is_err());
    }

    #[test]
    fn test_limit_order_filled_by_maintenance() {
        let engine = engine();
        let order = engine.place_limit_order(Side::Buy, dec!(95), dec!(2)).unwrap();
        assert_eq!(engine.balance(), dec!(9810));
        assert_eq!(engine.orders().len(), 1);

        engine.update_price(96.0);
        engine.maintenance_tick();
        assert!(engine.position().is_none());

        engine.update_price(94.0);
        engine.maintenance_tick();
        assert_eq!(engine.position().unwrap().quantity, dec!(2));
        assert!(engine.orders().is_empty());
        assert_eq!(engine.all_orders()[0].id, order.id);
        assert_eq!(engine.all_orders()[0].status, OrderStatus::Filled);
        assert_eq!(engine.stats().today_trades, 1);
    }

    #[test]
    fn test_cancel_refunds() {
        let engine = engine();
        let order = engine.place_limit_order(Side::Buy, dec!(100), dec!(1)).unwrap();
        engine.cancel_order(order.id).unwrap();
        assert_eq!(engine.balance(), dec!(10000));
        assert!(engine.cancel_order(order.id).is_err());
    }

    #[test]
    fn test_execute_proposal() {
        let engine = engine();
        let open = TradeProposal::Open {
            side: PositionSide::Long,
            quantity: 2.5,
            stop_loss: 98.0,
            take_profit: 110.0,
            reason: "entry zone".to_string(),
        };
        assert!(matches!(engine.execute_proposal(&open, 100.0).unwrap(), Execution::Opened(_)));
        assert!(engine.execute_proposal(&open, 100.0).is_err());
        assert_eq!(engine.execute_proposal(&TradeProposal::Hold, 100.0).unwrap(), Execution::None);

        let close = TradeProposal::Close {
            reason: "Interval upper bound reached".to_string(),
        };
        match engine.execute_proposal(&close, 108.0).unwrap() {
            Execution::Closed(trade) => assert_eq!(trade.pnl, dec!(20)),
            other => panic!("unexpected execution: {:?}", other),
        }
    }

    #[test]
    fn test_stats_drawdown_and_profit_factor() {
        let mut stats = TradingStats::new(dec!(1000));
        let mut trade = |pnl: Decimal, pct: Decimal, equity: Decimal| {
            let t = Trade {
                id: Uuid::new_v4(),
                position_id: Uuid::new_v4(),
                symbol: "BTCUSDT".to_string(),
                side: PositionSide::Long,
                entry_price: dec!(100),
                exit_price: dec!(100),
                quantity: dec!(1),
                pnl,
                pnl_percent: pct,
                opened_at: Utc::now(),
                closed_at: Utc::now(),
                duration_secs: 0,
                reason: String::new(),
                signal_id: None,
            };
            stats.record(&t, equity, dec!(1000));
        };
        trade(dec!(100), dec!(10), dec!(1100));
        trade(dec!(-55), dec!(-5), dec!(1045));

        assert_eq!(stats.peak_balance, dec!(1100));
        assert!((stats.current_drawdown - 5.0).abs() < 1e-9);
        assert!((stats.max_drawdown - 5.0).abs() < 1e-9);
        assert!((stats.profit_factor - 2.0).abs() < 1e-9);
        assert!((stats.win_rate - 50.0).abs() < 1e-9);
        assert!((stats.total_pnl_percent - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_update_config_keeps_symbol() {
        let engine = engine();
        let mut config = EngineConfig::for_symbol("ETHUSDT");
        config.min_confidence = 0.5;
        engine.update_config(config);
        assert_eq!(engine.symbol(), "BTCUSDT");
        assert_eq!(engine.config().min_confidence, 0.5);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let engine = Arc::new(engine());
        assert!(engine.start());
        assert!(!engine.start());
        assert!(engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
        assert!(engine.start());
        engine.stop();
    }
}
