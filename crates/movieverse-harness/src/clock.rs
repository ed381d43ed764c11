//! Clocks for waits and scenario deadlines.
//!
//! Every wait and every deadline check goes through a [`Clock`], so tests
//! can swap the tokio-backed [`SystemClock`] for a [`ManualClock`] whose
//! time only moves when somebody sleeps on it or advances it explicitly.
//! That makes polling behaviour fully deterministic.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Poll, Waker};
use std::time::Duration;

/// Monotonic time source with an async sleep.
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);

    /// Suspend the caller until the clock reads at least `at`.
    ///
    /// Never moves the clock itself.
    async fn sleep_until(&self, at: Duration);

    /// Time elapsed since an earlier reading of [`Clock::now`]
    fn since(&self, earlier: Duration) -> Duration {
        self.now().saturating_sub(earlier)
    }
}

/// Wall clock backed by tokio's timer
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, at: Duration) {
        tokio::time::sleep_until(self.origin + at).await;
    }
}

/// Fake clock for deterministic tests.
///
/// Clones share the same time. `sleep` advances the shared time by the
/// requested amount and yields once to the runtime instead of blocking.
/// `sleep_until` parks until some other caller moves time far enough.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_nanos: Arc<AtomicU64>,
    timers: Arc<Mutex<Vec<(Duration, Waker)>>>,
}

impl ManualClock {
    /// Create a clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `start`
    #[must_use]
    pub fn starting_at(start: Duration) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.now_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
        self.wake_due();
    }

    /// Move time forward by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Jump to an absolute time
    pub fn set(&self, at: Duration) {
        self.now_nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
        self.wake_due();
    }

    /// Current time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }

    fn timers(&self) -> MutexGuard<'_, Vec<(Duration, Waker)>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_due(&self) {
        let now = self.now();
        let due: Vec<(Duration, Waker)> = {
            let mut timers = self.timers();
            let (due, pending) = timers.drain(..).partition(|(at, _)| *at <= now);
            *timers = pending;
            due
        };
        for (_, waker) in due {
            waker.wake();
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_nanos.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }

    async fn sleep_until(&self, at: Duration) {
        std::future::poll_fn(|cx| {
            if self.now() >= at {
                return Poll::Ready(());
            }
            let mut timers = self.timers();
            timers.retain(|(due, waker)| !(*due == at && waker.will_wake(cx.waker())));
            timers.push((at, cx.waker().clone()));
            drop(timers);
            // time may have moved while registering
            if self.now() >= at {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
    }
}
