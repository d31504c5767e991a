//! Sliding time window over power samples
//!
//! Samples arrive from a single periodic source, so timestamps are
//! non-decreasing and expiry is a prefix trim of the queue.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Headroom window length
pub const SHORT_WINDOW_SECS: u64 = 30;

/// Budget window length
pub const BUDGET_WINDOW_SECS: u64 = 15 * 60;

/// One timestamped power reading in watts (positive = import)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    pub power: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-duration rolling window with lazy expiry
#[derive(Debug, Clone)]
pub struct PowerWindow {
    duration: Duration,
    samples: VecDeque<PowerSample>,
}

impl PowerWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            samples: VecDeque::new(),
        }
    }

    pub fn from_secs(seconds: u64) -> Self {
        let duration = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(duration)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Append a sample, then expire everything older than
    /// `timestamp - duration`.
    pub fn add(&mut self, power: f64, timestamp: DateTime<Utc>) {
        self.samples.push_back(PowerSample { power, timestamp });
        self.purge(timestamp);
    }

    /// Mean power over the samples still inside the window at `now`, or
    /// `None` when the window is empty.
    pub fn average(&mut self, now: DateTime<Utc>) -> Option<f64> {
        self.purge(now);
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.power).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn purge(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.duration) else {
            return;
        };
        while self
            .samples
            .front()
            .is_some_and(|sample| sample.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
    }
}
