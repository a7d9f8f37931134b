//! # Rate Tracker
//! Sliding window of message arrivals (default 5s).
//!
//! Every arrival is recorded, samples strictly older than the window are
//! dropped from the front, and the remaining count gives messages per second.
//! The filter is "active" while that rate is at or above the configured
//! threshold.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Trailing window used for MPS, in seconds.
pub const CHAT_RATE_WINDOW_SECS: f64 = 5.0;

/// Throughput snapshot produced on every arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateState {
    pub messages_per_second: f64,
    pub filter_active: bool,
}

#[derive(Debug)]
pub struct RateTracker {
    /// Arrival timestamps, oldest at the front.
    samples: VecDeque<DateTime<Utc>>,
    window: Duration,
    window_secs: f64,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self::with_window(CHAT_RATE_WINDOW_SECS)
    }

    pub fn with_window(window_secs: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            window: Duration::microseconds((window_secs * 1_000_000.0) as i64),
            window_secs,
        }
    }

    /// Record an arrival at `now` and report the current rate.
    ///
    /// Precondition: `now` is not earlier than the previous call. Out-of-order
    /// timestamps are not rejected; they just skew pruning. The worker feeds
    /// its own monotonic arrival clock here.
    pub fn record(&mut self, now: DateTime<Utc>, mps_threshold: f64) -> RateState {
        self.samples.push_back(now);
        while let Some(&front) = self.samples.front() {
            if now - front > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        let mps = self.samples.len() as f64 / self.window_secs;
        RateState {
            messages_per_second: mps,
            filter_active: mps >= mps_threshold,
        }
    }

    /// Number of samples currently inside the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
