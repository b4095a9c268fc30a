//! Exchange wire formats.
//!
//! Prices and volumes arrive as JSON strings or numbers depending on the
//! endpoint; both are normalised to `f64` here so nothing downstream ever
//! sees raw payloads.

use chrono::Utc;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use trading_core::error::FeedError;
use trading_core::types::Candle;

/// Deserialize an `f64` sent either as a number or as a numeric string.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_f64(&value).map_err(de::Error::custom)
}

fn value_to_f64(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(format!("expected a finite number, got {value}")),
    }
}

fn value_to_i64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("expected an integer, got {n}")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, got {s:?}")),
        other => Err(format!("expected an integer, got {other}")),
    }
}

/// Parse one REST kline row:
/// `[open_time, open, high, low, close, volume, close_time, ...]`.
///
/// The newest row of a history response is the bucket still in progress; a
/// row whose close time is not before `now_ms` is returned as provisional.
pub fn parse_rest_kline(row: &[Value], now_ms: i64) -> Result<Candle, FeedError> {
    if row.len() < 7 {
        return Err(FeedError::Decode(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        )));
    }
    let num = |i: usize| value_to_f64(&row[i]).map_err(FeedError::Decode);
    let time = |i: usize| value_to_i64(&row[i]).map_err(FeedError::Decode);

    let candle = Candle::new(
        time(0)?,
        num(1)?,
        num(2)?,
        num(3)?,
        num(4)?,
        num(5)?,
        time(6)?,
    );
    Ok(if candle.close_time < now_ms {
        candle
    } else {
        candle.provisional()
    })
}

/// Parse a full REST klines response body.
pub fn parse_rest_klines(body: &str) -> Result<Vec<Candle>, FeedError> {
    parse_rest_klines_at(body, Utc::now().timestamp_millis())
}

/// Parse a REST klines response body as seen at `now_ms`.
pub fn parse_rest_klines_at(body: &str, now_ms: i64) -> Result<Vec<Candle>, FeedError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| FeedError::Decode(e.to_string()))?;
    rows.iter().map(|row| parse_rest_kline(row, now_ms)).collect()
}

/// `GET /api/v3/ticker/price` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: f64,
}

/// Kline payload of a WebSocket kline event.
#[derive(Debug, Clone, Deserialize)]
pub struct WsKline {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "lenient_f64")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "lenient_f64")]
    pub volume: f64,
    #[serde(rename = "x")]
    pub is_final: bool,
}

impl WsKline {
    pub fn into_candle(self) -> Candle {
        let candle = Candle::new(
            self.open_time,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.close_time,
        );
        if self.is_final {
            candle
        } else {
            candle.provisional()
        }
    }
}

/// WebSocket kline event.
#[derive(Debug, Clone, Deserialize)]
pub struct WsKlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: WsKline,
}

/// Decode a WebSocket text frame into a candle.
///
/// Returns `Ok(None)` for frames that are not kline events, such as
/// subscription acknowledgements.
pub fn parse_ws_message(text: &str) -> Result<Option<Candle>, FeedError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))?;
    // Combined streams wrap the event in {"stream": .., "data": ..}.
    let event = match value.get("data") {
        Some(data) => data.clone(),
        None => value,
    };
    if event.get("e").and_then(Value::as_str) != Some("kline") {
        return Ok(None);
    }
    let event: WsKlineEvent =
        serde_json::from_value(event).map_err(|e| FeedError::Decode(e.to_string()))?;
    Ok(Some(event.kline.into_candle()))
}

/// Fear & Greed index response.
#[derive(Debug, Clone, Deserialize)]
pub struct FearGreedResponse {
    pub data: Vec<FearGreedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FearGreedEntry {
    #[serde(deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(default)]
    pub value_classification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_kline_strings_and_numbers() {
        let body = r#"[
            [1700000000000, "100.5", "101.0", "99.5", "100.8", "12.3", 1700000059999, "0", 10],
            [1700000060000, 100.8, 101.2, 100.1, 101.0, 4, 1700000119999]
        ]"#;
        let candles = parse_rest_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert!((candles[0].open - 100.5).abs() < 1e-12);
        assert!((candles[1].volume - 4.0).abs() < 1e-12);
        assert!(candles.iter().all(|c| c.is_final));
    }

    #[test]
    fn test_rest_kline_open_bucket_is_provisional() {
        let body = r#"[
            [1700000000000, "100", "101", "99", "100.5", "10", 1700000059999],
            [1700000060000, "100.5", "102", "100", "101.5", "3", 1700000119999]
        ]"#;
        let candles = parse_rest_klines_at(body, 1_700_000_090_000).unwrap();
        assert!(candles[0].is_final);
        assert!(!candles[1].is_final);

        // Once its close time has passed the same row is final.
        let later = parse_rest_klines_at(body, 1_700_000_120_000).unwrap();
        assert!(later.iter().all(|c| c.is_final));
    }

    #[test]
    fn test_rest_kline_rejects_garbage() {
        assert!(parse_rest_klines(r#"[[1, "x", "1", "1", "1", "1", 2]]"#).is_err());
        assert!(parse_rest_klines(r#"[[1, "1"]]"#).is_err());
        assert!(parse_rest_klines("not json").is_err());
    }

    #[test]
    fn test_ws_kline_event() {
        let text = r#"{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":1000,"T":1999,"s":"BTCUSDT","i":"1m",
            "o":"10","c":"11","h":"12","l":"9","v":"100","n":5,"x":false,"q":"0"}}"#;
        let candle = parse_ws_message(text).unwrap().unwrap();
        assert!(!candle.is_final);
        assert!((candle.close - 11.0).abs() < 1e-12);
        assert_eq!(candle.open_time, 1000);
    }

    #[test]
    fn test_ws_combined_stream_and_ack() {
        let text = r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","s":"BTCUSDT","k":{"t":1,"T":2,
            "s":"BTCUSDT","i":"1m","o":1,"c":2,"h":3,"l":0.5,"v":7,"x":true}}}"#;
        assert!(parse_ws_message(text).unwrap().unwrap().is_final);
        assert!(parse_ws_message(r#"{"result":null,"id":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_ticker_price() {
        let t: TickerPrice = serde_json::from_str(r#"{"symbol":"BTCUSDT","price":"43000.10"}"#).unwrap();
        assert!((t.price - 43000.10).abs() < 1e-9);
    }
}
