//! Latest aggregated signal per `symbol:timeframe` and its subscribers.

use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use trading_core::types::{signal_key, AggregatedSignal, Timeframe};
use uuid::Uuid;

/// Store of the newest signal per stream.
///
/// A newer signal for a key replaces the older one. Subscribers receive every
/// published signal through a bounded channel; a full channel drops the newest
/// signal for that subscriber.
#[derive(Default)]
pub struct SignalBook {
    signals: RwLock<HashMap<String, AggregatedSignal>>,
    /// Ids of signals already handed to an engine
    acted: Mutex<HashSet<Uuid>>,
    subscribers: Mutex<Vec<mpsc::Sender<AggregatedSignal>>>,
}

impl SignalBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `signal` as the latest for its key and fan it out.
    ///
    /// A signal older than the stored one for the same key is ignored.
    /// Returns whether the signal was stored.
    pub fn publish(&self, signal: AggregatedSignal) -> bool {
        self.store(signal, false)
    }

    /// Like [`publish`](Self::publish), but the signal is recorded as acted on
    /// in the same critical section, so `take_unacted` can never hand it out.
    pub fn publish_acted(&self, signal: AggregatedSignal) -> bool {
        self.store(signal, true)
    }

    fn store(&self, signal: AggregatedSignal, acted: bool) -> bool {
        let key = signal.key();
        {
            let mut signals = self.signals.write();
            if let Some(current) = signals.get(&key) {
                if current.timestamp > signal.timestamp {
                    debug!(%key, "Ignoring stale signal");
                    return false;
                }
                self.acted.lock().remove(&current.id);
            }
            if acted {
                self.acted.lock().insert(signal.id);
            }
            signals.insert(key, signal.clone());
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(signal.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(symbol = %dropped.symbol, id = %dropped.id, "Signal subscriber lagging, dropping newest signal");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        true
    }

    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<AggregatedSignal> {
        self.signals.read().get(&signal_key(symbol, timeframe)).cloned()
    }

    /// All stored signals, ordered by key.
    pub fn signals(&self) -> Vec<AggregatedSignal> {
        let mut all: Vec<AggregatedSignal> = self.signals.read().values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }

    /// Newest signal for `symbol` across its timeframes.
    pub fn latest_for_symbol(&self, symbol: &str) -> Option<AggregatedSignal> {
        self.signals
            .read()
            .values()
            .filter(|s| s.symbol == symbol)
            .max_by_key(|s| s.timestamp)
            .cloned()
    }

    /// Newest signal for `symbol` that has not been acted on yet, marking it
    /// as acted on.
    pub fn take_unacted(&self, symbol: &str) -> Option<AggregatedSignal> {
        let latest = self.latest_for_symbol(symbol)?;
        self.acted.lock().insert(latest.id).then_some(latest)
    }

    /// Receive every signal published from now on.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<AggregatedSignal> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.signals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use trading_core::types::Direction;

    fn signal(symbol: &str, timeframe: Timeframe, direction: Direction) -> AggregatedSignal {
        AggregatedSignal {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timeframe,
            direction,
            confidence: 0.6,
            technical_score: 0.1,
            ml_score: 0.0,
            sentiment_score: 0.0,
            price: 100.0,
            volatility: 1.0,
            reasons: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_newer_signal_replaces_older() {
        let book = SignalBook::new();
        let first = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
        let second = signal("BTCUSDT", Timeframe::Minute1, Direction::Short);
        assert!(book.publish(first));
        assert!(book.publish(second.clone()));

        assert_eq!(book.len(), 1);
        assert_eq!(book.get("BTCUSDT", Timeframe::Minute1).unwrap().id, second.id);
    }

    #[test]
    fn test_stale_signal_ignored() {
        let book = SignalBook::new();
        let newer = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
        let mut older = signal("BTCUSDT", Timeframe::Minute1, Direction::Short);
        older.timestamp = newer.timestamp - Duration::seconds(10);

        book.publish(newer.clone());
        assert!(!book.publish(older));
        assert_eq!(book.get("BTCUSDT", Timeframe::Minute1).unwrap().id, newer.id);
    }

    #[test]
    fn test_take_unacted_once() {
        let book = SignalBook::new();
        let mut m1 = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
        m1.timestamp = Utc::now() - Duration::seconds(30);
        let m5 = signal("BTCUSDT", Timeframe::Minute5, Direction::Short);
        book.publish(m1);
        book.publish(m5.clone());
        book.publish(signal("ETHUSDT", Timeframe::Minute1, Direction::Long));

        assert_eq!(book.take_unacted("BTCUSDT").unwrap().id, m5.id);
        assert!(book.take_unacted("BTCUSDT").is_none());
        assert!(book.take_unacted("SOLUSDT").is_none());
        assert_eq!(book.signals().len(), 3);
    }

    #[test]
    fn test_publish_acted_never_taken() {
        let book = SignalBook::new();
        let acted = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
        assert!(book.publish_acted(acted.clone()));
        assert_eq!(book.get("BTCUSDT", Timeframe::Minute1).unwrap().id, acted.id);
        assert!(book.take_unacted("BTCUSDT").is_none());

        // A later plain publish is still handed out once.
        let fresh = signal("BTCUSDT", Timeframe::Minute1, Direction::Short);
        book.publish(fresh.clone());
        assert_eq!(book.take_unacted("BTCUSDT").unwrap().id, fresh.id);
    }

    #[test]
    fn test_publish_acted_races_take_unacted() {
        use std::sync::Arc;

        for _ in 0..200 {
            let book = Arc::new(SignalBook::new());
            let acted = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
            let publisher = {
                let book = Arc::clone(&book);
                let acted = acted.clone();
                std::thread::spawn(move || book.publish_acted(acted))
            };
            let taker = {
                let book = Arc::clone(&book);
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    for _ in 0..50 {
                        if let Some(s) = book.take_unacted("BTCUSDT") {
                            taken.push(s.id);
                        }
                    }
                    taken
                })
            };
            assert!(publisher.join().unwrap());
            let taken = taker.join().unwrap();
            assert!(!taken.contains(&acted.id));
        }
    }

    #[tokio::test]
    async fn test_subscriber_overflow_drops_newest() {
        let book = SignalBook::new();
        let mut rx = book.subscribe(1);
        let first = signal("BTCUSDT", Timeframe::Minute1, Direction::Long);
        book.publish(first.clone());
        book.publish(signal("ETHUSDT", Timeframe::Minute1, Direction::Long));

        assert_eq!(rx.recv().await.unwrap().id, first.id);
        assert!(rx.try_recv().is_err());
        // Both signals are still stored.
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_closed_subscriber_removed() {
        let book = SignalBook::new();
        drop(book.subscribe(4));
        book.publish(signal("BTCUSDT", Timeframe::Minute1, Direction::Long));
        assert!(book.subscribers.lock().is_empty());
    }
}
