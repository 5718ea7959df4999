//! Clock abstraction for testable timing.
//!
//! Backoff sleeps and token expiries go through an injected [`Clock`] so
//! tests can assert retry schedules deterministically instead of waiting
//! out real delays.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Time source injected into the worker and transport client.
///
/// Production code uses [`SystemClock`]; tests use [`TestClock`], which
/// records sleeps and advances virtual time immediately.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Current wall-clock time, used for token expiry timestamps.
    fn now_system(&self) -> SystemTime;

    /// Sleeps for the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual clock for deterministic tests.
///
/// `sleep` returns immediately after advancing virtual time and recording the
/// requested duration, so a test can drive a worker through hours of backoff
/// in microseconds and then assert the exact delay sequence.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Virtual nanoseconds advanced since creation.
    advanced_ns: Arc<AtomicU64>,
    /// Wall-clock base the virtual offset is applied to.
    system_base: SystemTime,
    /// Monotonic base the virtual offset is applied to.
    instant_base: Instant,
    /// Every duration passed to `sleep`, in order.
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl TestClock {
    /// Creates a virtual clock anchored at the current time.
    pub fn new() -> Self {
        Self {
            advanced_ns: Arc::new(AtomicU64::new(0)),
            system_base: SystemTime::now(),
            instant_base: Instant::now(),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Advances virtual time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(u64::MAX);
        self.advanced_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Total virtual time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.advanced_ns.load(Ordering::Acquire))
    }

    /// Durations of every `sleep` call so far, in call order.
    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleep log poisoned").clone()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.instant_base + self.elapsed()
    }

    fn now_system(&self) -> SystemTime {
        self.system_base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.sleeps.lock().expect("sleep log poisoned").push(duration);
        self.advance(duration);
        // Yield so concurrently running tasks get scheduled.
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances() {
        let clock = TestClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(90));
        assert_eq!(clock.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn sleeps_are_recorded_in_order() {
        let clock = TestClock::new();

        clock.sleep(Duration::from_secs(2)).await;
        clock.sleep(Duration::from_secs(4)).await;

        assert_eq!(
            clock.recorded_sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(clock.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn system_time_follows_virtual_advance() {
        let clock = TestClock::new();
        let before = clock.now_system();

        clock.sleep(Duration::from_secs(30)).await;

        assert_eq!(
            clock.now_system().duration_since(before).unwrap(),
            Duration::from_secs(30)
        );
    }
}
