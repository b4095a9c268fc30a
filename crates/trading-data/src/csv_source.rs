//! CSV candle files for offline backtests.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use trading_core::error::DataError;
use trading_core::types::{Candle, Timeframe};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp", alias = "open_time")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Final candles read from a CSV file.
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Load every row as a final candle of `timeframe`, oldest first.
    ///
    /// Close times are derived from the timeframe.
    pub fn load(&self, timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| DataError::ParseError(e.to_string()))?;

        let span = timeframe.as_millis() as i64;
        let mut candles = Vec::new();
        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            let open_time = parse_timestamp(&record.date)?;
            candles.push(Candle::new(
                open_time,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
                open_time + span - 1,
            ));
        }

        if candles.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);
        Ok(candles)
    }
}

/// Smallest 11-digit integer.
const MILLIS_CUTOFF: i64 = 10_000_000_000;

/// Parse a date, date-time or Unix timestamp into milliseconds since the epoch.
///
/// Integers of 11 or more digits are milliseconds; shorter ones are seconds.
fn parse_timestamp(date_str: &str) -> Result<i64, DataError> {
    let date_str = date_str.trim();

    if let Ok(ts) = date_str.parse::<i64>() {
        return Ok(if ts >= MILLIS_CUTOFF { ts } else { ts * 1000 });
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
        }
    }

    Err(DataError::ParseError(format!("Could not parse date: {date_str}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1970-01-02").unwrap(), 86_400_000);
        assert_eq!(parse_timestamp("1970-01-01 00:01:00").unwrap(), 60_000);
        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_seconds_millis_cutoff() {
        assert_eq!(parse_timestamp("9999999999").unwrap(), 9_999_999_999_000);
        assert_eq!(parse_timestamp("10000000000").unwrap(), 10_000_000_000);
        assert_eq!(parse_timestamp("60").unwrap(), 60_000);
    }

    #[test]
    fn test_load_sorted_final_candles() {
        let path = std::env::temp_dir().join(format!("candles-{}.csv", unique_suffix()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
            writeln!(file, "1705312860000,2,3,1,2.5,10").unwrap();
            writeln!(file, "1705312800000,1,2,0.5,1.5,10").unwrap();
        }

        let candles = CsvDataSource::new(&path).unwrap().load(Timeframe::Minute1).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1_705_312_800_000);
        assert_eq!(candles[0].close_time, 1_705_312_859_999);
        assert_eq!(candles[1].open_time, 1_705_312_860_000);
        assert!(candles.iter().all(|c| c.is_final));
    }

    #[test]
    fn test_missing_file() {
        assert!(CsvDataSource::new("/definitely/not/here.csv").is_err());
    }

    fn unique_suffix() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    }
}
