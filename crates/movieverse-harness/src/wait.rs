//! Wait Policy: bounded condition polling.
//!
//! Fixed sleeps are replaced by polling an observable [`Condition`] every
//! `poll` until it holds or `timeout` elapses. The final sleep is clamped so
//! the last check happens exactly at `timeout`, which keeps the call from
//! ever blocking past `timeout + poll`. [`Condition::Elapsed`] is the plain
//! maximum-wait fallback for signals the page does not expose.
//!
//! Time comes from a [`Clock`], so waits are deterministic under
//! [`ManualClock`](crate::clock::ManualClock).

use crate::clock::Clock;
use crate::locator::{resolve, LocatorSpec, Resolution};
use crate::network::UrlPattern;
use crate::page::PageHandle;
use crate::result::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Smallest poll interval honoured
const MIN_POLL: Duration = Duration::from_millis(1);

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout and poll interval of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    /// Give up after this long
    #[serde(with = "crate::config::duration_ms")]
    pub timeout: Duration,
    /// Check the condition this often
    #[serde(with = "crate::config::duration_ms")]
    pub poll: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    /// Create a policy from milliseconds
    #[must_use]
    pub const fn from_millis(timeout_ms: u64, poll_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_ms),
        )
    }

    /// Same policy with the timeout cut down to `budget` if smaller
    #[must_use]
    pub fn clamped(self, budget: Duration) -> Self {
        Self {
            timeout: self.timeout.min(budget),
            poll: self.poll,
        }
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// Predicate over an element count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPredicate {
    /// `count >= n`
    AtLeast(usize),
    /// `count == n`
    Equals(usize),
    /// `count <= n`
    AtMost(usize),
}

impl CountPredicate {
    /// Whether `count` satisfies the predicate
    #[must_use]
    pub const fn holds(&self, count: usize) -> bool {
        match *self {
            Self::AtLeast(n) => count >= n,
            Self::Equals(n) => count == n,
            Self::AtMost(n) => count <= n,
        }
    }
}

impl std::fmt::Display for CountPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AtLeast(n) => write!(f, ">= {n}"),
            Self::Equals(n) => write!(f, "== {n}"),
            Self::AtMost(n) => write!(f, "<= {n}"),
        }
    }
}

/// Something a scenario can wait for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// At least one matching element is visible
    Visible(LocatorSpec),
    /// No matching element is visible (absent counts as hidden)
    Hidden(LocatorSpec),
    /// The driver reports no network activity
    NetworkIdle,
    /// The current URL matches
    UrlMatches(UrlPattern),
    /// The number of matching elements satisfies a predicate
    Count {
        /// Elements to count
        locator: LocatorSpec,
        /// Predicate over the count
        predicate: CountPredicate,
    },
    /// A fixed amount of time has passed
    Elapsed(#[serde(with = "crate::config::duration_ms")] Duration),
}

impl Condition {
    /// Evaluate once, `elapsed` after the wait started
    pub async fn evaluate(&self, page: &PageHandle, elapsed: Duration) -> DriverResult<bool> {
        match self {
            Self::Visible(locator) => any_visible(locator, page).await,
            Self::Hidden(locator) => any_visible(locator, page).await.map(|visible| !visible),
            Self::NetworkIdle => page.driver().network_idle().await,
            Self::UrlMatches(pattern) => {
                let url = page.driver().current_url().await?;
                Ok(pattern.matches(&url))
            }
            Self::Count { locator, predicate } => {
                let count = resolve(locator, page).await?.count();
                Ok(predicate.holds(count))
            }
            Self::Elapsed(duration) => Ok(elapsed >= *duration),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visible(locator) => write!(f, "visible({locator})"),
            Self::Hidden(locator) => write!(f, "hidden({locator})"),
            Self::NetworkIdle => write!(f, "network idle"),
            Self::UrlMatches(pattern) => write!(f, "url matches {pattern}"),
            Self::Count { locator, predicate } => write!(f, "count({locator}) {predicate}"),
            Self::Elapsed(duration) => write!(f, "{}ms elapsed", duration.as_millis()),
        }
    }
}

async fn any_visible(locator: &LocatorSpec, page: &PageHandle) -> DriverResult<bool> {
    let Resolution::Found(element) = resolve(locator, page).await? else {
        return Ok(false);
    };
    for handle in element.handles() {
        match page.driver().is_visible(handle).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            // detached between locate and check: treat as not visible yet
            Err(DriverError::Detached { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}

// =============================================================================
// WAIT OUTCOME
// =============================================================================

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held
    Satisfied {
        /// Time until the satisfying poll
        elapsed: Duration,
    },
    /// The timeout elapsed first
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
    },
}

impl WaitOutcome {
    /// Whether the condition held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match *self {
            Self::Satisfied { elapsed } | Self::TimedOut { elapsed } => elapsed,
        }
    }
}

/// Poll `condition` until it holds or `policy.timeout` elapses.
///
/// Checks at `0, poll, 2*poll, ...` and once more exactly at the timeout.
/// A timeout is an outcome, not an error; only driver faults are errors.
pub async fn await_condition(
    page: &PageHandle,
    condition: &Condition,
    policy: &WaitPolicy,
    clock: &dyn Clock,
) -> DriverResult<WaitOutcome> {
    let poll = policy.poll.max(MIN_POLL);
    let start = clock.now();
    let mut polls = 0_u32;

    loop {
        let elapsed = clock.since(start);
        polls += 1;
        if condition.evaluate(page, elapsed).await? {
            let elapsed_ms = elapsed.as_millis() as u64;
            tracing::debug!(%condition, elapsed_ms, polls, "wait satisfied");
            return Ok(WaitOutcome::Satisfied { elapsed });
        }
        if elapsed >= policy.timeout {
            let elapsed_ms = elapsed.as_millis() as u64;
            tracing::debug!(%condition, elapsed_ms, polls, "wait timed out");
            return Ok(WaitOutcome::TimedOut { elapsed });
        }
        clock.sleep(poll.min(policy.timeout - elapsed)).await;
    }
}
