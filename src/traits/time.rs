//! Clock abstraction for testability.
//!
//! Question ids, generated test ids and generated test names are all derived
//! from the clock, so tests inject a fixed one.

use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstraction over the system clock.
pub trait TimeProvider: Send + Sync {
    /// Get the current system time.
    fn now(&self) -> SystemTime;

    /// Get the current time as a UTC DateTime.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current Unix timestamp in milliseconds.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as i64
    }

    /// Current UTC date as `YYYY-MM-DD`.
    fn today(&self) -> String {
        self.now_utc().format("%Y-%m-%d").to_string()
    }
}

/// Real implementation using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl RealTimeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: TimeProvider + ?Sized> TimeProvider for std::sync::Arc<T> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Mock implementation for testing with controlled time.
#[cfg(test)]
pub use mock::MockTimeProvider;

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::{Arc, RwLock};

    /// Mock clock that only moves when told to.
    #[derive(Debug, Clone)]
    pub struct MockTimeProvider {
        current: Arc<RwLock<SystemTime>>,
    }

    impl MockTimeProvider {
        /// Create a mock time provider with a fixed time.
        pub fn fixed(time: SystemTime) -> Self {
            Self {
                current: Arc::new(RwLock::new(time)),
            }
        }

        /// Create a mock time provider with a fixed Unix timestamp in milliseconds.
        pub fn from_millis(millis: u64) -> Self {
            Self::fixed(UNIX_EPOCH + Duration::from_millis(millis))
        }

        /// Advance time by a number of milliseconds.
        pub fn advance_millis(&self, millis: u64) {
            let mut current = self.current.write().unwrap();
            *current += Duration::from_millis(millis);
        }
    }

    impl TimeProvider for MockTimeProvider {
        fn now(&self) -> SystemTime {
            *self.current.read().unwrap()
        }

        fn now_utc(&self) -> DateTime<Utc> {
            DateTime::<Utc>::from(*self.current.read().unwrap())
        }
    }
}
