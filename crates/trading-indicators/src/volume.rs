//! Volume indicators.

use trading_core::traits::VoteSource;
use trading_core::types::Vote;

/// On-Balance Volume.
///
/// The first update seeds the total with that candle's volume. Afterwards
/// volume is added on an up close and subtracted on a down close.
#[derive(Debug, Clone, Default)]
pub struct Obv {
    value: f64,
    prev_value: f64,
    prev_close: Option<f64>,
}

impl Obv {
    /// Create a new OBV.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a closing price and its volume.
    pub fn update(&mut self, close: f64, volume: f64) -> f64 {
        let Some(prev_close) = self.prev_close.replace(close) else {
            self.value = volume;
            return self.value;
        };

        self.prev_value = self.value;
        if close > prev_close {
            self.value += volume;
        } else if close < prev_close {
            self.value -= volume;
        }
        self.value
    }

    /// Current running total.
    pub fn current(&self) -> f64 {
        self.value
    }

    /// Change produced by the most recent update.
    pub fn slope(&self) -> f64 {
        self.value - self.prev_value
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl VoteSource for Obv {
    fn vote(&self, _price: f64) -> Vote {
        let slope = self.slope();
        if slope > 0.0 {
            Vote::buy("OBV", 0.25, "Positive volume flow")
        } else if slope < 0.0 {
            Vote::sell("OBV", 0.25, "Negative volume flow")
        } else {
            Vote::hold("OBV")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::VoteKind;

    #[test]
    fn test_obv_accumulates() {
        let mut obv = Obv::new();
        assert_eq!(obv.update(10.0, 100.0), 100.0);
        assert_eq!(obv.update(11.0, 50.0), 150.0);
        assert_eq!(obv.update(10.5, 30.0), 120.0);
        assert_eq!(obv.update(10.5, 999.0), 120.0);
    }

    #[test]
    fn test_obv_votes_on_slope() {
        let mut obv = Obv::new();
        obv.update(10.0, 100.0);
        obv.update(11.0, 50.0);
        assert_eq!(obv.vote(0.0).kind, VoteKind::Buy);

        // Total stays positive but the flow turned negative.
        obv.update(10.0, 20.0);
        assert!(obv.current() > 0.0);
        let vote = obv.vote(0.0);
        assert_eq!(vote.kind, VoteKind::Sell);
        assert_eq!(vote.strength, 0.25);

        obv.update(10.0, 20.0);
        assert_eq!(obv.vote(0.0).kind, VoteKind::Hold);
    }

    #[test]
    fn test_obv_reset() {
        let mut obv = Obv::new();
        obv.update(10.0, 100.0);
        obv.reset();
        assert_eq!(obv.current(), 0.0);
        assert_eq!(obv.update(5.0, 7.0), 7.0);
    }
}
