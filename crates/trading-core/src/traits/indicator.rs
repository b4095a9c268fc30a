//! Indicator trait definitions.

use crate::types::Vote;

/// Streaming indicator fed one close price at a time.
///
/// Streaming indicators keep only the bounded recurrence state needed for an
/// O(1) update; they never reprocess history. Before the warm-up window is
/// full they return a neutral value instead of failing.
pub trait StreamingIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Update the indicator with a new value.
    ///
    /// # Arguments
    /// * `value` - New input value (typically a close price)
    ///
    /// # Returns
    /// The current indicator value, neutral while warming up
    fn update(&mut self, value: f64) -> Self::Output;

    /// Get the current value without adding new data.
    fn current(&self) -> Self::Output;

    /// Reset the indicator state.
    fn reset(&mut self);

    /// Check if the indicator has enough data to produce real values.
    fn is_ready(&self) -> bool;

    /// Get the warm-up length.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}

/// Streaming indicator that uses the full candle (not just close).
pub trait OhlcvIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Update the indicator from one final candle.
    fn update(&mut self, high: f64, low: f64, close: f64, volume: f64) -> Self::Output;

    /// Get the current value without adding new data.
    fn current(&self) -> Self::Output;

    /// Reset the indicator state.
    fn reset(&mut self);

    /// Check if the indicator has enough data to produce real values.
    fn is_ready(&self) -> bool;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}

/// Indicator that can express its current state as a vote.
pub trait VoteSource {
    /// Vote given the current market price.
    ///
    /// Must be a pure function of the indicator state and `price`.
    fn vote(&self, price: f64) -> Vote;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: usize,
        period: usize,
    }

    impl StreamingIndicator for Counter {
        type Output = f64;

        fn update(&mut self, _value: f64) -> f64 {
            self.count += 1;
            self.current()
        }

        fn current(&self) -> f64 {
            if self.is_ready() {
                self.count as f64
            } else {
                0.0
            }
        }

        fn reset(&mut self) {
            self.count = 0;
        }

        fn is_ready(&self) -> bool {
            self.count >= self.period
        }

        fn period(&self) -> usize {
            self.period
        }

        fn name(&self) -> &str {
            "counter"
        }
    }

    #[test]
    fn test_streaming_warmup_is_neutral() {
        let mut ind = Counter { count: 0, period: 3 };
        assert_eq!(ind.update(1.0), 0.0);
        assert_eq!(ind.update(1.0), 0.0);
        assert_eq!(ind.update(1.0), 3.0);
        ind.reset();
        assert!(!ind.is_ready());
    }
}
