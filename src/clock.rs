//! Time source for due-time and daily anchor calculations.
//!
//! The scheduler never calls `Utc::now()` directly; it asks its [`Clock`].

use chrono::{DateTime, Utc};

/// Source of "now" for the scheduler.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
///
/// The scheduler holds it behind an `Arc`, so moving time takes `&self`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    current: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Clock stopped at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: parking_lot::Mutex::new(at),
        }
    }

    /// Clock stopped at an RFC 3339 timestamp.
    ///
    /// # Panics
    /// If `timestamp` does not parse.
    pub fn from_rfc3339(timestamp: &str) -> Self {
        let at = DateTime::parse_from_rfc3339(timestamp)
            .expect("valid RFC 3339")
            .with_timezone(&Utc);
        Self::new(at)
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        *self.current.lock() += by;
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
