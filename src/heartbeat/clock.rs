//! Injectable "now" provider.
//!
//! The log never reads system time directly. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] or any closure returning a
//! `DateTime<FixedOffset>`.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local};

/// Source of the current instant.
///
/// The instant keeps whatever offset the observer is in; normalizing to a
/// UTC day is the caller's job (see [`HeartbeatDay::of`](super::HeartbeatDay::of)).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<FixedOffset> + Send + Sync,
{
    fn now(&self) -> DateTime<FixedOffset> {
        self()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<FixedOffset>) {
        *self.lock() = instant;
    }

    /// Move forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<FixedOffset>> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(at("2021-11-01T23:59:59Z"));
        assert_eq!(clock.now(), at("2021-11-01T23:59:59Z"));

        clock.advance(Duration::seconds(1));
        assert_eq!(clock.now(), at("2021-11-02T00:00:00Z"));

        clock.set(at("2030-01-01T12:00:00+05:30"));
        assert_eq!(clock.now(), at("2030-01-01T12:00:00+05:30"));
    }

    #[test]
    fn test_closure_is_a_clock() {
        let fixed = at("2021-11-01T08:00:00-04:00");
        let clock = move || fixed;
        assert_eq!(Clock::now(&clock), fixed);
    }

    #[test]
    fn test_system_clock_is_close_to_utc_now() {
        let now = SystemClock.now();
        let drift = (chrono::Utc::now() - now.with_timezone(&chrono::Utc))
            .num_seconds()
            .abs();
        assert!(drift < 5);
    }
}
