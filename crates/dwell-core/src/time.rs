//! Time sources
//!
//! Everything that needs "now" takes a [`Clock`] instead of calling
//! `Utc::now()` directly. Production code uses [`SystemClock`]; tests and
//! replays use [`ManualClock`], which only moves when told to.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only advances when told to
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the engine and keep another to fast-forward time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at the current wall-clock time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Start at a specific instant
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Move forward and return the new instant
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = *current + by;
        *current
    }

    pub fn advance_seconds(&self, seconds: i64) -> DateTime<Utc> {
        self.advance(Duration::seconds(seconds))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = ManualClock::at(start);
        assert_eq!(clock.now(), start);

        let later = clock.advance_seconds(90);
        assert_eq!((later - start).num_seconds(), 90);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_seconds(5);
        assert_eq!(clock.now(), handle.now());
    }

    #[test]
    fn test_system_clock_moves() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
