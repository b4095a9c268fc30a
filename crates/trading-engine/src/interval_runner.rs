//! Drives an [`IntervalStrategy`] against a [`TradingEngine`] on a fixed tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trading_core::error::{StrategyError, TradingError};
use trading_core::money::to_f64;
use trading_core::traits::{MarketFeed, Strategy, StrategyContext};
use trading_strategies::{IntervalStrategy, PriceInterval};

use crate::engine::{Execution, TradingEngine};

/// Fewest candles an interval can be derived from.
const MIN_HISTORY: usize = 10;

pub struct IntervalRunner {
    strategy: Mutex<IntervalStrategy>,
    engine: Arc<TradingEngine>,
    feed: Arc<dyn MarketFeed>,
    tick: Duration,
    running: Mutex<Option<CancellationToken>>,
}

impl IntervalRunner {
    pub fn new(
        strategy: IntervalStrategy,
        engine: Arc<TradingEngine>,
        feed: Arc<dyn MarketFeed>,
        tick: Duration,
    ) -> Self {
        Self {
            strategy: Mutex::new(strategy),
            engine,
            feed,
            tick,
            running: Mutex::new(None),
        }
    }

    /// Fetch fresh history and re-derive the traded band.
    pub async fn recalculate(&self) -> Result<PriceInterval, TradingError> {
        let (symbol, timeframe, limit) = {
            let strategy = self.strategy.lock();
            let config = strategy.config();
            (config.symbol.clone(), config.timeframe, config.candle_limit())
        };
        let candles = self.feed.historical_candles(&symbol, timeframe, limit).await?;
        if candles.len() < MIN_HISTORY {
            return Err(StrategyError::InsufficientData {
                required: MIN_HISTORY,
                available: candles.len(),
            }
            .into());
        }
        let interval = self.strategy.lock().recalculate(&candles)?.clone();
        info!(
            %symbol,
            lower = interval.lower,
            upper = interval.upper,
            crosses = interval.crosses,
            "Interval recalculated"
        );
        Ok(interval)
    }

    /// One decision cycle: refresh the band when stale, fetch the price, ask
    /// the strategy and execute its proposal.
    pub async fn tick(&self) -> Result<Execution, TradingError> {
        let stale = self.strategy.lock().needs_recalculation(Utc::now());
        if stale {
            self.recalculate().await?;
        }

        let symbol = self.engine.symbol();
        let price = self.feed.current_price(&symbol).await?;
        self.engine.update_price(price);

        let position = self.engine.position();
        let balance = to_f64(self.engine.balance());
        let open_positions = self.engine.positions().len();
        let ctx = StrategyContext {
            symbol: &symbol,
            price,
            balance,
            open_positions,
            position: position.as_ref(),
        };
        let proposal = self.strategy.lock().propose(&ctx);

        let execution = self.engine.execute_proposal(&proposal, price)?;
        if let Execution::Closed(trade) = &execution {
            self.strategy.lock().record_close(to_f64(trade.pnl));
        }
        Ok(execution)
    }

    /// Spawn the tick loop. Returns `false` when already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(runner.tick);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => match runner.tick().await {
                        Ok(Execution::None) => {}
                        Ok(execution) => debug!(?execution, "Interval proposal executed"),
                        Err(e) => warn!(error = %e, "Interval tick failed"),
                    },
                }
            }
            debug!("Interval runner stopped");
        });
        true
    }

    pub fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The band currently traded.
    pub fn interval(&self) -> Option<PriceInterval> {
        self.strategy.lock().interval().cloned()
    }

    pub fn engine(&self) -> &Arc<TradingEngine> {
        &self.engine
    }

    pub fn strategy_state(&self) -> trading_core::traits::StrategyState {
        self.strategy.lock().state()
    }
}
