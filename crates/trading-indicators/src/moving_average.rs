//! Moving averages and rolling windows.

use std::collections::VecDeque;
use trading_core::traits::StreamingIndicator;

/// Exponential Moving Average, streaming.
///
/// Seeded with the first value, then `ema = v·α + ema·(1 − α)` with
/// `α = 2 / (period + 1)`. Ready once `period` values have been seen.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    value: f64,
    count: usize,
}

impl Ema {
    /// Create a new streaming EMA.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: 0.0,
            count: 0,
        }
    }
}

impl StreamingIndicator for Ema {
    type Output = f64;

    fn update(&mut self, value: f64) -> f64 {
        self.count += 1;
        if self.count == 1 {
            self.value = value;
        } else {
            self.value = value * self.multiplier + self.value * (1.0 - self.multiplier);
        }
        self.value
    }

    fn current(&self) -> f64 {
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.count = 0;
    }

    fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// Fixed-length window of the most recent values with a running sum.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingWindow {
    /// Create a window holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Period must be greater than 0");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Push a value, evicting the oldest when full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Number of values held.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Maximum number of values held.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the window holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if the window is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Mean of the held values, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            // Recompute to avoid drift from repeated add/subtract.
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    /// Running sum of the held values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest held value.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest held value.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Oldest held value.
    pub fn front(&self) -> Option<f64> {
        self.values.front().copied()
    }

    /// Newest held value.
    pub fn back(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}
