//! Time Source
//!
//! The usage meter and the rate limiter read the current time through
//! [`Clock`] so that month boundaries and window expiry can be driven
//! deterministically in tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    /// Move the clock forward
    pub fn advance(&self, duration: Duration) {
        let mut now = self.0.lock();
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.0.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}
