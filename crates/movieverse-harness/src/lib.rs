//! MovieVerse harness: deterministic end-to-end scenarios for the MovieVerse
//! web app.
//!
//! A [`Scenario`] is an ordered list of steps (navigate, resolve, act,
//! wait, assert, capture). The [`ScenarioRunner`] executes it against a
//! [`BrowserDriver`] and always returns a complete [`ScenarioReport`]:
//! missing elements, timeouts and failed matchers are recorded as step
//! results, never raised.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Scenario ──► ScenarioRunner ──► PageHandle ──► BrowserDriver   │
//! │                    │                               ├ Chromium    │
//! │                    │                               └ MockDriver  │
//! │                    ├── Locator Resolver  (resolve)               │
//! │                    ├── Wait Policy       (await_condition)       │
//! │                    ├── Assertion Layer   (check)                 │
//! │                    └── Reporter          (JSON / JUnit / HTML)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use movieverse_harness::{movieverse, HarnessConfig, MockDriver, ScenarioRunner};
//!
//! # async fn run() {
//! let runner = ScenarioRunner::new(HarnessConfig::default());
//! let report = runner.run(MockDriver::new(), &movieverse::homepage_loads()).await;
//! println!("{}", report.summary());
//! # }
//! ```

#![warn(missing_docs)]

mod artifact;
mod assertion;
#[cfg(feature = "browser")]
mod browser;
mod clock;
mod config;
mod driver;
mod locator;
mod network;
mod page;
mod reporter;
mod result;
mod runner;
mod scenario;
mod wait;

/// Tracing subscriber setup
pub mod logging;

/// Scripted in-memory driver for tests
pub mod mock;

/// The MovieVerse journey catalog
pub mod movieverse;

/// YAML bridge for harness types
pub mod yaml;

pub use artifact::{slugify, ArtifactStore};
pub use assertion::{
    assert_that, check, gather, Actual, CheckStep, MatchOutcome, Matcher, RequestExpectation,
    Subject, TextPattern,
};
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumFactory};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    HarnessConfig, DEFAULT_ARTIFACT_DIR, DEFAULT_BASE_URL, DEFAULT_SCENARIO_DEADLINE_MS,
    ENV_ARTIFACT_DIR, ENV_BASE_URL, ENV_DEADLINE_MS, ENV_HEADLESS,
};
pub use driver::{
    BrowserDriver, DeviceDescriptor, DriverConfig, DriverFactory, ElementHandle,
    INNER_WIDTH_SCRIPT, SCROLL_WIDTH_SCRIPT,
};
pub use locator::{resolve, ElementRef, LocatorSpec, Resolution, Strategy};
pub use mock::{MockChange, MockDriver, MockElement, MockPage, MockReaction};
pub use network::{
    requests_matching, responses_matching, AbortReason, MockResponse, NetworkEvent, Route,
    RouteAction, RoutePolicy, RouteTable, UrlPattern,
};
pub use page::PageHandle;
pub use reporter::{
    FailureKind, RunReport, ScenarioReport, ScenarioStatus, StepResult, StepStatus,
};
pub use result::{DriverError, DriverResult, HarnessError, HarnessResult};
pub use runner::{ScenarioRunner, TEARDOWN_STEP};
pub use scenario::{Action, FailurePolicy, Scenario, Step, StepKind, Target};
pub use wait::{
    await_condition, Condition, CountPredicate, WaitOutcome, WaitPolicy,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};
