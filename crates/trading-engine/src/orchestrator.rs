//! Multi-symbol orchestrator.
//!
//! Owns one subscription task per `symbol:timeframe`, one [`TradingEngine`]
//! per symbol, a control loop acting on the freshest signals and a REST loop
//! keeping prices current when the streams are quiet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trading_broker::{Ledger, OrderBook};
use trading_core::error::TradingError;
use trading_core::traits::{MarketFeed, MlPredictor, SentimentSource, MAX_HISTORY_LIMIT};
use trading_core::types::{AggregatedSignal, Candle, Position, Timeframe, Trade};
use trading_data::CandleStore;
use trading_indicators::IndicatorManager;
use trading_risk::{RiskConfig, RiskEngine};
use trading_strategies::SignalAggregator;

use crate::engine::{EngineConfig, TradingEngine, TradingStats};
use crate::signal_book::SignalBook;

/// Streams and timing of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    /// Candles loaded per stream before subscribing
    pub history_limit: usize,
    /// Candles a stream needs before it produces signals
    pub min_candles: usize,
    pub buffer_capacity: usize,
    pub control_interval_secs: u64,
    pub price_poll_interval_secs: u64,
    /// Delay between consecutive subscriptions
    pub subscribe_stagger_ms: u64,
    pub enable_ml: bool,
    pub enable_sentiment: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            timeframes: vec![Timeframe::Minute1],
            history_limit: 500,
            min_candles: 60,
            buffer_capacity: 500,
            control_interval_secs: 5,
            price_poll_interval_secs: 2,
            subscribe_stagger_ms: 100,
            enable_ml: false,
            enable_sentiment: false,
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.symbols.is_empty() {
            return Err("at least one symbol is required".to_string());
        }
        if self.timeframes.is_empty() {
            return Err("at least one timeframe is required".to_string());
        }
        if self.symbols.iter().any(String::is_empty) {
            return Err("symbols must not be empty".to_string());
        }
        if self.control_interval_secs == 0 || self.price_poll_interval_secs == 0 {
            return Err("loop intervals must be positive".to_string());
        }
        Ok(())
    }
}

/// Settings that can be swapped while running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub risk: Option<RiskConfig>,
    /// Applied to every engine; each engine keeps its own symbol
    pub engine: Option<EngineConfig>,
}

/// Runs the full pipeline for every configured stream.
pub struct Orchestrator {
    config: BotConfig,
    feed: Arc<dyn MarketFeed>,
    aggregator: SignalAggregator,
    indicators: IndicatorManager,
    candles: CandleStore,
    signals: SignalBook,
    ledger: Arc<Ledger>,
    order_book: Arc<OrderBook>,
    risk: Arc<RiskEngine>,
    engines: HashMap<String, Arc<TradingEngine>>,
    ml: Option<Arc<dyn MlPredictor>>,
    sentiment: Option<Arc<dyn SentimentSource>>,
    prices: RwLock<HashMap<String, f64>>,
    running: Mutex<Option<CancellationToken>>,
}

impl Orchestrator {
    /// Build an orchestrator with one engine per configured symbol.
    ///
    /// `engine_config` is the template for every engine; its symbol is
    /// replaced per engine.
    pub fn new(
        config: BotConfig,
        engine_config: EngineConfig,
        aggregator: SignalAggregator,
        ledger: Arc<Ledger>,
        risk: Arc<RiskEngine>,
        feed: Arc<dyn MarketFeed>,
    ) -> Self {
        let order_book = Arc::new(OrderBook::new(Arc::clone(&ledger)));
        let engines = config
            .symbols
            .iter()
            .map(|symbol| {
                let engine = TradingEngine::new(
                    EngineConfig {
                        symbol: symbol.clone(),
                        ..engine_config.clone()
                    },
                    Arc::clone(&ledger),
                    Arc::clone(&order_book),
                    Arc::clone(&risk),
                );
                (symbol.clone(), Arc::new(engine))
            })
            .collect();

        Self {
            candles: CandleStore::new(config.buffer_capacity),
            config,
            feed,
            aggregator,
            indicators: IndicatorManager::new(),
            signals: SignalBook::new(),
            ledger,
            order_book,
            risk,
            engines,
            ml: None,
            sentiment: None,
            prices: RwLock::new(HashMap::new()),
            running: Mutex::new(None),
        }
    }

    pub fn with_ml(mut self, predictor: Arc<dyn MlPredictor>) -> Self {
        self.ml = Some(predictor);
        self
    }

    pub fn with_sentiment(mut self, source: Arc<dyn SentimentSource>) -> Self {
        self.sentiment = Some(source);
        self
    }

    /// Warm up every stream and spawn the background tasks.
    ///
    /// Fails on an invalid configuration or when already running.
    pub async fn start(self: &Arc<Self>) -> Result<(), TradingError> {
        self.config.validate().map_err(TradingError::Config)?;
        let token = {
            let mut running = self.running.lock();
            if running.is_some() {
                return Err(TradingError::Validation("orchestrator is already running".to_string()));
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };
        info!(
            symbols = ?self.config.symbols,
            timeframes = ?self.config.timeframes,
            "Starting orchestrator"
        );

        for symbol in &self.config.symbols {
            for &timeframe in &self.config.timeframes {
                self.warm_up(symbol, timeframe).await;
            }
        }

        let stagger = Duration::from_millis(self.config.subscribe_stagger_ms);
        let mut index: u32 = 0;
        for symbol in &self.config.symbols {
            for &timeframe in &self.config.timeframes {
                let this = Arc::clone(self);
                let symbol = symbol.clone();
                let delay = stagger * index;
                let token = token.clone();
                tokio::spawn(async move { this.run_subscription(symbol, timeframe, delay, token).await });
                index += 1;
            }
        }

        for engine in self.engines.values() {
            engine.start();
        }

        let this = Arc::clone(self);
        let control_token = token.clone();
        tokio::spawn(async move { this.run_control_loop(control_token).await });

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_price_loop(token).await });

        info!("Orchestrator started");
        Ok(())
    }

    /// Cancel every task. A later `start` begins afresh.
    pub fn stop(&self) {
        let Some(token) = self.running.lock().take() else {
            return;
        };
        token.cancel();
        for engine in self.engines.values() {
            engine.stop();
        }
        info!("Orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Load history for a stream and feed it through the indicators.
    async fn warm_up(&self, symbol: &str, timeframe: Timeframe) {
        let limit = self.config.history_limit.min(MAX_HISTORY_LIMIT);
        let history = match self.feed.historical_candles(symbol, timeframe, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol, %timeframe, error = %e, "Failed to load history");
                return;
            }
        };
        let finals: Vec<Candle> = history.into_iter().filter(|c| c.is_final).collect();
        let Some(last) = finals.last().copied() else {
            return;
        };

        {
            let bank = self.indicators.get_or_create(symbol, timeframe);
            let mut bank = bank.lock();
            bank.reset();
            for candle in &finals {
                bank.update_candle(candle);
            }
        }
        self.candles.load(symbol, timeframe, finals.iter().copied());
        self.set_price(symbol, last.close);
        info!(symbol, %timeframe, candles = finals.len(), "History loaded");

        if self.candles.len(symbol, timeframe) >= self.config.min_candles {
            let signal = self.generate_signal(symbol, timeframe, last.close).await;
            self.signals.publish(signal);
        }
    }

    async fn run_subscription(
        self: Arc<Self>,
        symbol: String,
        timeframe: Timeframe,
        delay: Duration,
        token: CancellationToken,
    ) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let mut rx = match self.feed.subscribe(&symbol, timeframe).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(%symbol, %timeframe, error = %e, "Subscription failed");
                return;
            }
        };
        info!(%symbol, %timeframe, "Subscribed to candles");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                candle = rx.recv() => match candle {
                    Some(candle) => {
                        self.ingest(&symbol, timeframe, candle).await;
                    }
                    None => {
                        warn!(%symbol, %timeframe, "Candle stream closed");
                        break;
                    }
                },
            }
        }
    }

    /// Handle one streamed candle.
    ///
    /// Every candle updates the last price. Only a new final candle updates
    /// the indicators and, once enough history exists, produces a signal that
    /// is published and handed to the symbol's engine.
    pub async fn ingest(&self, symbol: &str, timeframe: Timeframe, candle: Candle) -> Option<AggregatedSignal> {
        self.set_price(symbol, candle.close);
        if !candle.is_final {
            return None;
        }
        if !self.candles.push(symbol, timeframe, candle) {
            debug!(symbol, %timeframe, open_time = candle.open_time, "Candle already seen");
            return None;
        }
        self.indicators
            .get_or_create(symbol, timeframe)
            .lock()
            .update_candle(&candle);

        if self.candles.len(symbol, timeframe) < self.config.min_candles {
            return None;
        }
        let price = self.last_price(symbol).unwrap_or(candle.close);
        let signal = self.generate_signal(symbol, timeframe, price).await;
        self.signals.publish_acted(signal.clone());
        if let Some(engine) = self.engines.get(symbol) {
            engine.process_signal(&signal);
        }
        Some(signal)
    }

    /// Build a signal from the current indicator state without changing it.
    async fn generate_signal(&self, symbol: &str, timeframe: Timeframe, price: f64) -> AggregatedSignal {
        let ml_score = self.ml_score(symbol, timeframe, price).await;
        let sentiment_score = self.sentiment_score().await;

        let bank = self.indicators.get_or_create(symbol, timeframe);
        let bank = bank.lock();
        let signal = self
            .aggregator
            .aggregate_bank(symbol, timeframe, price, &bank, ml_score, sentiment_score);
        info!(
            symbol,
            %timeframe,
            direction = %signal.direction,
            confidence = signal.confidence,
            technical = signal.technical_score,
            ml = ml_score,
            sentiment = sentiment_score,
            "Signal generated"
        );
        signal
    }

    async fn ml_score(&self, symbol: &str, timeframe: Timeframe, price: f64) -> f64 {
        let Some(predictor) = self.ml.as_ref().filter(|_| self.config.enable_ml) else {
            return 0.0;
        };
        let candles = self.candles.candles(symbol, timeframe);
        match predictor.predict(symbol, &candles).await {
            Ok(prediction) => prediction.score(price),
            Err(e) => {
                warn!(symbol, error = %e, "ML prediction unavailable");
                0.0
            }
        }
    }

    async fn sentiment_score(&self) -> f64 {
        let Some(source) = self.sentiment.as_ref().filter(|_| self.config.enable_sentiment) else {
            return 0.0;
        };
        match source.sentiment().await {
            Ok(score) if score.overall.is_finite() => score.overall.clamp(-1.0, 1.0),
            Ok(_) => 0.0,
            Err(e) => {
                warn!(error = %e, "Sentiment unavailable");
                0.0
            }
        }
    }

    async fn run_control_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.control_interval_secs));
        let mut today = Utc::now().date_naive();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    today = self.roll_day(today, Utc::now().date_naive());
                    self.control_tick().await;
                }
            }
        }
        debug!("Control loop stopped");
    }

    /// Reset daily counters when `now` is past `today`. Returns the current day.
    fn roll_day(&self, today: NaiveDate, now: NaiveDate) -> NaiveDate {
        if now == today {
            return today;
        }
        info!(%today, %now, "New trading day");
        for engine in self.engines.values() {
            engine.reset_daily(now);
        }
        self.risk.reset_daily(now);
        now
    }

    /// Act on the newest unprocessed signal of every symbol.
    ///
    /// A symbol with no signal at all gets one generated on demand from its
    /// first timeframe once enough history and a price are available.
    pub async fn control_tick(&self) {
        for symbol in &self.config.symbols {
            let signal = match self.signals.take_unacted(symbol) {
                Some(signal) => signal,
                None => match self.on_demand_signal(symbol).await {
                    Some(signal) => signal,
                    None => continue,
                },
            };
            if let Some(engine) = self.engines.get(symbol) {
                let outcome = engine.process_signal(&signal);
                debug!(%symbol, ?outcome, "Control loop processed signal");
            }
        }
    }

    async fn on_demand_signal(&self, symbol: &str) -> Option<AggregatedSignal> {
        if self.signals.latest_for_symbol(symbol).is_some() {
            return None;
        }
        let timeframe = *self.config.timeframes.first()?;
        let price = self.last_price(symbol)?;
        if self.candles.len(symbol, timeframe) < self.config.min_candles {
            debug!(symbol, "Not enough candles for an on-demand signal");
            return None;
        }
        let signal = self.generate_signal(symbol, timeframe, price).await;
        self.signals.publish_acted(signal.clone());
        info!(symbol, direction = %signal.direction, "Signal generated on demand");
        Some(signal)
    }

    async fn run_price_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.price_poll_interval_secs));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.poll_prices().await,
            }
        }
        debug!("Price loop stopped");
    }

    /// Refresh every symbol's price over REST. Indicators are never touched.
    pub async fn poll_prices(&self) {
        for symbol in &self.config.symbols {
            match self.feed.current_price(symbol).await {
                Ok(price) => self.set_price(symbol, price),
                Err(e) => debug!(%symbol, error = %e, "REST price update failed"),
            }
        }
    }

    fn set_price(&self, symbol: &str, price: f64) {
        if !(price.is_finite() && price > 0.0) {
            return;
        }
        self.prices.write().insert(symbol.to_string(), price);
        if let Some(engine) = self.engines.get(symbol) {
            engine.update_price(price);
        }
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.prices.read().get(symbol).copied()
    }

    pub fn signal(&self, symbol: &str, timeframe: Timeframe) -> Option<AggregatedSignal> {
        self.signals.get(symbol, timeframe)
    }

    pub fn signals(&self) -> Vec<AggregatedSignal> {
        self.signals.signals()
    }

    /// Receive every signal published from now on.
    pub fn subscribe_signals(&self, capacity: usize) -> mpsc::Receiver<AggregatedSignal> {
        self.signals.subscribe(capacity)
    }

    /// Swap risk and engine settings without restarting.
    pub fn update_config(&self, update: RuntimeConfig) {
        if let Some(risk) = update.risk {
            self.risk.update_config(risk);
        }
        if let Some(template) = update.engine {
            for (symbol, engine) in &self.engines {
                engine.update_config(EngineConfig {
                    symbol: symbol.clone(),
                    ..template.clone()
                });
            }
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn engine(&self, symbol: &str) -> Option<&Arc<TradingEngine>> {
        self.engines.get(symbol)
    }

    pub fn stats(&self, symbol: &str) -> Option<TradingStats> {
        self.engines.get(symbol).map(|e| e.stats())
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn order_book(&self) -> &Arc<OrderBook> {
        &self.order_book
    }

    pub fn risk(&self) -> &Arc<RiskEngine> {
        &self.risk
    }

    pub fn positions(&self) -> Vec<Position> {
        self.ledger.positions()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.ledger.trades()
    }

    /// Number of indicator updates applied to a stream.
    pub fn indicator_updates(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.indicators.get_or_create(symbol, timeframe).lock().updates()
    }

    pub fn candle_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.candles.len(symbol, timeframe)
    }
}
