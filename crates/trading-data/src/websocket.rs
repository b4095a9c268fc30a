//! WebSocket kline subscriptions.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trading_core::types::{Candle, Timeframe};

use crate::wire::parse_ws_message;

pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters of a kline stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base URL; the stream name is appended as a path segment
    pub base_url: String,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    /// Upper bound on the TCP, TLS and WebSocket handshake
    pub connect_timeout: Duration,
    /// Capacity of the per-subscription candle channel
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 100,
        }
    }
}

/// Exchange stream name, e.g. `btcusdt@kline_1m`.
pub fn stream_name(symbol: &str, timeframe: Timeframe) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), timeframe.as_str())
}

/// Outcome of handing a candle to the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Channel full; the candle was dropped
    Dropped,
    /// Subscriber gone
    Closed,
}

/// Send without waiting. A full channel drops the newest candle.
pub fn deliver(tx: &mpsc::Sender<Candle>, candle: Candle, stream: &str) -> Delivery {
    match tx.try_send(candle) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(dropped)) => {
            warn!(stream, open_time = dropped.open_time, "Candle channel full, dropping newest candle");
            Delivery::Dropped
        }
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

/// Spawn a task streaming candles for one key.
///
/// The task reconnects with a fixed delay for as long as the receiver is
/// alive and `shutdown` is not cancelled.
pub fn spawn_kline_stream(
    config: StreamConfig,
    symbol: &str,
    timeframe: Timeframe,
    shutdown: CancellationToken,
) -> mpsc::Receiver<Candle> {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let stream = stream_name(symbol, timeframe);
    tokio::spawn(run_stream(config, stream, tx, shutdown));
    rx
}

async fn run_stream(
    config: StreamConfig,
    stream: String,
    tx: mpsc::Sender<Candle>,
    shutdown: CancellationToken,
) {
    let url = format!("{}/{}", config.base_url.trim_end_matches('/'), stream);
    let mut attempt: u64 = 0;

    loop {
        if shutdown.is_cancelled() || tx.is_closed() {
            break;
        }
        attempt += 1;

        let connected = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tx.closed() => break,
            result = tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())) => result,
        };
        match connected {
            Ok(Ok((ws, _))) => {
                info!(%stream, attempt, "WebSocket connected");
                attempt = 0;
                if let SessionEnd::Finished = run_session(&config, &stream, ws, &tx, &shutdown).await {
                    break;
                }
                warn!(%stream, "WebSocket disconnected");
            }
            Ok(Err(e)) => warn!(%stream, attempt, error = %e, "WebSocket connect failed"),
            Err(_) => warn!(%stream, attempt, timeout = ?config.connect_timeout, "WebSocket connect timed out"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tx.closed() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
    debug!(%stream, "Kline stream stopped");
}

enum SessionEnd {
    /// Reconnect
    Disconnected,
    /// Shutdown or subscriber gone
    Finished,
}

async fn run_session(
    config: &StreamConfig,
    stream: &str,
    ws: WsStream,
    tx: &mpsc::Sender<Candle>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();
    let mut ping = tokio::time::interval(config.ping_interval);
    ping.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Finished;
            }
            _ = tx.closed() => return SessionEnd::Finished,
            _ = ping.tick() => {
                if write.send(Message::Ping(Vec::new())).await.is_err() {
                    return SessionEnd::Disconnected;
                }
            }
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!(stream, error = %e, "WebSocket read error");
                        return SessionEnd::Disconnected;
                    }
                    None => return SessionEnd::Disconnected,
                };
                match msg {
                    Message::Text(text) => match parse_ws_message(&text) {
                        Ok(Some(candle)) => {
                            if deliver(tx, candle, stream) == Delivery::Closed {
                                return SessionEnd::Finished;
                            }
                        }
                        Ok(None) => debug!(stream, "Ignoring non-kline frame"),
                        Err(e) => warn!(stream, error = %e, "Undecodable frame"),
                    },
                    Message::Ping(payload) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Message::Close(frame) => {
                        debug!(stream, ?frame, "Server closed the connection");
                        return SessionEnd::Disconnected;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64) -> Candle {
        Candle::new(t, 1.0, 1.0, 1.0, 1.0, 1.0, t + 59_999)
    }

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name("BTCUSDT", Timeframe::Minute15), "btcusdt@kline_15m");
    }

    #[tokio::test]
    async fn test_full_channel_drops_newest() {
        let (tx, mut rx) = mpsc::channel(2);
        assert_eq!(deliver(&tx, candle(1), "s"), Delivery::Sent);
        assert_eq!(deliver(&tx, candle(2), "s"), Delivery::Sent);
        assert_eq!(deliver(&tx, candle(3), "s"), Delivery::Dropped);

        assert_eq!(rx.recv().await.unwrap().open_time, 1);
        assert_eq!(rx.recv().await.unwrap().open_time, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_detected() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert_eq!(deliver(&tx, candle(1), "s"), Delivery::Closed);
    }

    #[tokio::test]
    async fn test_stream_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let config = StreamConfig {
            base_url: "ws://127.0.0.1:1".to_string(),
            reconnect_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let mut rx = spawn_kline_stream(config, "BTCUSDT", Timeframe::Minute1, shutdown.clone());
        shutdown.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    /// A listener that accepts TCP but never answers the WebSocket handshake.
    async fn silent_listener() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_hanging_connect() {
        let (_listener, url) = silent_listener().await;
        let shutdown = CancellationToken::new();
        let config = StreamConfig {
            base_url: url,
            connect_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let mut rx = spawn_kline_stream(config, "BTCUSDT", Timeframe::Minute1, shutdown.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[tokio::test]
    async fn test_hanging_connect_times_out_and_retries() {
        let (listener, url) = silent_listener().await;
        let shutdown = CancellationToken::new();
        let config = StreamConfig {
            base_url: url,
            connect_timeout: Duration::from_millis(50),
            reconnect_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let _rx = spawn_kline_stream(config, "BTCUSDT", Timeframe::Minute1, shutdown.clone());

        // Each timed-out attempt is followed by a fresh TCP connection.
        for _ in 0..2 {
            let accepted = tokio::time::timeout(Duration::from_secs(2), listener.accept()).await;
            assert!(matches!(accepted, Ok(Ok(_))));
        }
        shutdown.cancel();
    }
}
