//! Timeframe definitions for market data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval, named the way the exchange names its kline streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    #[default]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "8h")]
    Hour8,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "3d")]
    Day3,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
}

impl Timeframe {
    /// Length of one candle in minutes.
    pub fn as_minutes(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute3 => 3,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Hour2 => 120,
            Timeframe::Hour4 => 240,
            Timeframe::Hour6 => 360,
            Timeframe::Hour8 => 480,
            Timeframe::Hour12 => 720,
            Timeframe::Day1 => 1_440,
            Timeframe::Day3 => 4_320,
            Timeframe::Week1 => 10_080,
            Timeframe::Month1 => 43_200, // Approximate (30 days)
        }
    }

    /// Get the duration of the timeframe in seconds.
    pub fn as_secs(&self) -> u64 {
        self.as_minutes() * 60
    }

    /// Get the duration of the timeframe in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.as_secs() * 1000
    }

    /// Exchange interval string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour6 => "6h",
            Timeframe::Hour8 => "8h",
            Timeframe::Hour12 => "12h",
            Timeframe::Day1 => "1d",
            Timeframe::Day3 => "3d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1M",
        }
    }

    /// Get all available timeframes.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Minute1,
            Timeframe::Minute3,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Minute30,
            Timeframe::Hour1,
            Timeframe::Hour2,
            Timeframe::Hour4,
            Timeframe::Hour6,
            Timeframe::Hour8,
            Timeframe::Hour12,
            Timeframe::Day1,
            Timeframe::Day3,
            Timeframe::Week1,
            Timeframe::Month1,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" is the month interval; everything else is case-insensitive.
        if s == "1M" {
            return Ok(Timeframe::Month1);
        }
        match s.to_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::Minute1),
            "3m" | "3min" => Ok(Timeframe::Minute3),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "1hour" | "hour" => Ok(Timeframe::Hour1),
            "2h" => Ok(Timeframe::Hour2),
            "4h" | "4hour" => Ok(Timeframe::Hour4),
            "6h" => Ok(Timeframe::Hour6),
            "8h" => Ok(Timeframe::Hour8),
            "12h" => Ok(Timeframe::Hour12),
            "1d" | "day" | "daily" => Ok(Timeframe::Day1),
            "3d" => Ok(Timeframe::Day3),
            "1w" | "week" | "weekly" => Ok(Timeframe::Week1),
            "month" | "monthly" => Ok(Timeframe::Month1),
            _ => Err(format!("Invalid timeframe: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::Minute1.as_secs(), 60);
        assert_eq!(Timeframe::Hour1.as_secs(), 3600);
        assert_eq!(Timeframe::Day1.as_minutes(), 1440);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::Minute1);
        assert_eq!(Timeframe::from_str("1M").unwrap(), Timeframe::Month1);
        assert_eq!(Timeframe::from_str("15M").unwrap(), Timeframe::Minute15);
        assert_eq!(Timeframe::from_str("daily").unwrap(), Timeframe::Day1);
        assert!(Timeframe::from_str("7m").is_err());
    }

    #[test]
    fn test_timeframe_display_roundtrip() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(&tf.to_string()).unwrap(), *tf);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Timeframe::Hour4).unwrap();
        assert_eq!(json, "\"4h\"");
        let tf: Timeframe = serde_json::from_str("\"1M\"").unwrap();
        assert_eq!(tf, Timeframe::Month1);
    }
}
