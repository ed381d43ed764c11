//! Scenario Runner.
//!
//! ```text
//! step:      Pending ──► Running ──► Passed | Failed | Skipped
//! scenario:  Pending ──► Running ──► Completed | Aborted
//! ```
//!
//! Each scenario owns one [`PageHandle`] and runs its steps strictly in
//! order. A hard failure under [`FailurePolicy::AbortOnHardFailure`], a
//! driver fault or an exhausted deadline stops the scenario: every remaining
//! step is recorded as `Skipped`, so a report always holds exactly one entry
//! per declared step. The page is released afterwards and the release is
//! recorded as the report's `teardown`.
//!
//! Scenarios only run concurrently through [`ScenarioRunner::run_all`],
//! each with its own driver from a [`DriverFactory`].

use crate::artifact::ArtifactStore;
use crate::assertion::{check, CheckStep, Subject};
use crate::clock::{Clock, SystemClock};
use crate::config::HarnessConfig;
use crate::driver::{BrowserDriver, DriverFactory};
use crate::locator::{resolve, ElementRef, LocatorSpec, Resolution};
use crate::network::Route;
use crate::page::PageHandle;
use crate::reporter::{
    FailureKind, RunReport, ScenarioReport, ScenarioStatus, StepResult, StepStatus,
};
use crate::result::{DriverError, DriverResult, HarnessError};
use crate::scenario::{Action, FailurePolicy, Scenario, Step, StepKind, Target};
use crate::wait::{await_condition, WaitOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Name of the teardown entry
pub const TEARDOWN_STEP: &str = "release page";

/// Runs scenarios against browser drivers
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: HarnessConfig,
    clock: Arc<dyn Clock>,
    artifacts: ArtifactStore,
}

impl ScenarioRunner {
    /// Runner on the system clock
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        let artifacts = ArtifactStore::new(config.artifact_dir.clone());
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            artifacts,
        }
    }

    /// Use another clock (e.g. a shared `ManualClock` in tests)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Artifact store in use
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run one scenario on `driver`, which is closed afterwards
    pub async fn run(
        &self,
        driver: impl BrowserDriver + 'static,
        scenario: &Scenario,
    ) -> ScenarioReport {
        self.run_page(PageHandle::new(driver), scenario).await
    }

    /// Run one scenario on an existing page, which is released afterwards.
    ///
    /// An invalid scenario is not started: every step is `Skipped` with the
    /// validation error and the report is `Aborted`.
    pub async fn run_page(&self, mut page: PageHandle, scenario: &Scenario) -> ScenarioReport {
        if let Err(error) = scenario.validate() {
            let mut report = rejected(scenario, &error);
            let index = scenario.steps.len();
            report.teardown = Some(match page.release().await {
                Ok(()) => StepResult::passed(index, TEARDOWN_STEP, Duration::ZERO),
                Err(error) => {
                    tracing::warn!(scenario = %scenario.name, %error, "page release failed");
                    let result = StepResult::failed(
                        index,
                        TEARDOWN_STEP,
                        FailureKind::DriverError,
                        error.to_string(),
                        Duration::ZERO,
                    );
                    report.driver_error = Some(error);
                    result
                }
            });
            return report;
        }
        let span = tracing::info_span!("scenario", scenario = %scenario.name, page = %page.id());
        Execution::new(self, page, scenario)
            .run()
            .instrument(span)
            .await
    }

    /// Run scenarios concurrently, each on a fresh driver from `factory`.
    ///
    /// Reports keep the order of `scenarios`.
    pub async fn run_all<F>(&self, factory: &F, scenarios: &[Scenario]) -> RunReport
    where
        F: DriverFactory,
    {
        let mut run = RunReport::new("movieverse");
        tracing::info!(run = %run.run_id, scenarios = scenarios.len(), "run started");

        let reports = futures::future::join_all(scenarios.iter().map(|scenario| async move {
            if let Err(error) = scenario.validate() {
                return rejected(scenario, &error);
            }
            match factory.open(&self.config.driver).await {
                Ok(driver) => self.run(driver, scenario).await,
                Err(error) => {
                    tracing::error!(scenario = %scenario.name, %error, "could not open driver");
                    unstarted(scenario, "driver could not be opened", error)
                }
            }
        }))
        .await;

        for report in reports {
            run.push(report);
        }
        tracing::info!(run = %run.run_id, summary = %run.summary(), "run finished");
        run
    }

    /// Validate then run; invalid scenarios are not started
    pub async fn run_validated(
        &self,
        driver: impl BrowserDriver + 'static,
        scenario: &Scenario,
    ) -> Result<ScenarioReport, HarnessError> {
        scenario.validate()?;
        Ok(self.run(driver, scenario).await)
    }
}

/// Report for a scenario that never got a page
fn unstarted(scenario: &Scenario, reason: &str, error: DriverError) -> ScenarioReport {
    let mut report = skipped_all(scenario, reason);
    report.driver_error = Some(error);
    report
}

/// Report for a scenario that failed validation
fn rejected(scenario: &Scenario, error: &HarnessError) -> ScenarioReport {
    tracing::error!(scenario = %scenario.name, %error, "scenario rejected");
    skipped_all(scenario, &format!("not started: {error}"))
}

fn skipped_all(scenario: &Scenario, reason: &str) -> ScenarioReport {
    let mut report = ScenarioReport::new(scenario.name.clone(), scenario.tags.clone());
    for (index, step) in scenario.steps.iter().enumerate() {
        report.push(StepResult::skipped(index, step.name.clone(), reason));
    }
    report.abort();
    report
}

// ============================================================================
// EXECUTION
// ============================================================================

/// Why the scenario stopped early
enum Stop {
    HardFailure(String),
    Deadline,
    Fault,
}

impl Stop {
    fn skip_reason(&self) -> String {
        match self {
            Self::HardFailure(step) => format!("skipped after hard failure in '{step}'"),
            Self::Deadline => "skipped: scenario deadline exceeded".to_string(),
            Self::Fault => "skipped after driver error".to_string(),
        }
    }
}

/// State of one scenario run
struct Execution<'a> {
    runner: &'a ScenarioRunner,
    scenario: &'a Scenario,
    page: PageHandle,
    report: ScenarioReport,
    bindings: HashMap<String, ElementRef>,
    started: Duration,
    deadline: Option<Duration>,
    previous_step: Option<Duration>,
}

impl<'a> Execution<'a> {
    fn new(runner: &'a ScenarioRunner, page: PageHandle, scenario: &'a Scenario) -> Self {
        Self {
            runner,
            scenario,
            page,
            report: ScenarioReport::new(scenario.name.clone(), scenario.tags.clone()),
            bindings: HashMap::new(),
            started: runner.clock.now(),
            deadline: scenario.deadline.or(runner.config.scenario_deadline),
            previous_step: None,
        }
    }

    fn clock(&self) -> &dyn Clock {
        self.runner.clock.as_ref()
    }

    fn elapsed(&self) -> Duration {
        self.clock().since(self.started)
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_sub(self.elapsed()))
    }

    async fn run(mut self) -> ScenarioReport {
        tracing::info!(steps = self.scenario.steps.len(), "scenario started");

        let scenario = self.scenario;
        let mut stop = self.setup().await;
        for (index, step) in scenario.steps.iter().enumerate() {
            if let Some(reason) = &stop {
                self.report
                    .push(StepResult::skipped(index, step.name.clone(), reason.skip_reason()));
                continue;
            }
            stop = self.step(index, step).await;
        }

        if stop.is_some() {
            self.report.abort();
        }
        self.teardown().await;
        self.report.duration = self.elapsed();

        let summary = self.report.summary();
        match self.report.status {
            ScenarioStatus::Completed => tracing::info!(%summary, "scenario completed"),
            ScenarioStatus::Aborted => tracing::warn!(%summary, "scenario aborted"),
        }
        self.report
    }

    /// Navigate to the entry URL, if any
    async fn setup(&mut self) -> Option<Stop> {
        let url = self.runner.config.resolve_url(self.scenario.entry_url.as_deref()?);
        let runner = self.runner;
        let navigated = match self.deadline {
            None => self.page.navigate(&url).await,
            Some(deadline) => {
                let expires = self.started + deadline;
                tokio::select! {
                    biased;
                    navigated = self.page.navigate(&url) => navigated,
                    () = runner.clock.sleep_until(expires) => {
                        tracing::warn!(%url, "entry navigation interrupted by scenario deadline");
                        return Some(Stop::Deadline);
                    }
                }
            }
        };
        match navigated {
            Ok(()) => None,
            Err(error) => {
                tracing::error!(%url, %error, "entry navigation failed");
                self.report.driver_error = Some(error);
                Some(Stop::Fault)
            }
        }
    }

    async fn step(&mut self, index: usize, step: &Step) -> Option<Stop> {
        if self.remaining() == Some(Duration::ZERO) {
            let result = StepResult::failed(
                index,
                step.name.clone(),
                FailureKind::DeadlineExceeded,
                self.deadline_message(),
                Duration::ZERO,
            );
            self.record(result);
            return Some(Stop::Deadline);
        }

        let step_started = self.clock().now();
        tracing::debug!(index, step = %step.name, "step started");
        let runner = self.runner;
        let deadline = self.deadline;
        let outcome = match deadline {
            None => Some(self.execute(index, step).await),
            Some(deadline) => {
                // waits are clamped to the budget; give their final check one poll
                let grace = match &step.kind {
                    StepKind::Wait { policy, .. } => policy.unwrap_or(runner.config.wait).poll,
                    _ => Duration::ZERO,
                };
                let expires = self.started + deadline + grace;
                tokio::select! {
                    biased;
                    outcome = self.execute(index, step) => Some(outcome),
                    () = runner.clock.sleep_until(expires) => None,
                }
            }
        };
        let duration = self.clock().since(step_started);
        self.previous_step = Some(duration);

        let Some(outcome) = outcome else {
            tracing::warn!(index, step = %step.name, "step interrupted by scenario deadline");
            let result = StepResult::failed(
                index,
                step.name.clone(),
                FailureKind::DeadlineExceeded,
                self.deadline_message(),
                duration,
            );
            self.record(result);
            return Some(Stop::Deadline);
        };

        let result = match outcome {
            Ok(result) => result.with_duration(duration),
            Err(error) => {
                tracing::error!(index, step = %step.name, %error, "driver error");
                let result = StepResult::failed(
                    index,
                    step.name.clone(),
                    FailureKind::DriverError,
                    error.to_string(),
                    duration,
                );
                self.report.driver_error = Some(error);
                self.record(result);
                return Some(Stop::Fault);
            }
        };

        if let Some(deadline) = self.deadline {
            let elapsed = self.elapsed();
            if elapsed > deadline || (elapsed == deadline && !result.status.is_passed()) {
                let mut result = result;
                result.status = StepStatus::Failed;
                result.failure = Some(FailureKind::DeadlineExceeded);
                result.message = self.deadline_message();
                self.record(result);
                return Some(Stop::Deadline);
            }
        }

        let hard_failure = result.status.is_failed() && step.kind.is_hard();
        self.record(result);
        if hard_failure && self.scenario.policy == FailurePolicy::AbortOnHardFailure {
            return Some(Stop::HardFailure(step.name.clone()));
        }
        None
    }

    fn record(&mut self, result: StepResult) {
        match (&result.failure, result.status.is_passed()) {
            (_, true) => tracing::info!(
                index = result.index,
                step = %result.name,
                duration_ms = result.duration.as_millis() as u64,
                "step passed"
            ),
            (Some(kind), false) => tracing::warn!(
                index = result.index,
                step = %result.name,
                %kind,
                message = %result.message,
                "step failed"
            ),
            (None, false) => {}
        }
        self.report.push(result);
    }

    fn deadline_message(&self) -> String {
        let deadline = self.deadline.unwrap_or_default();
        format!(
            "scenario deadline of {}ms exceeded after {}ms",
            deadline.as_millis(),
            self.elapsed().as_millis()
        )
    }

    async fn teardown(&mut self) {
        let index = self.scenario.steps.len();
        let started = self.clock().now();
        let result = match self.page.release().await {
            Ok(()) => StepResult::passed(index, TEARDOWN_STEP, self.clock().since(started)),
            Err(error) => {
                tracing::warn!(%error, "page release failed");
                let result = StepResult::failed(
                    index,
                    TEARDOWN_STEP,
                    FailureKind::DriverError,
                    error.to_string(),
                    self.clock().since(started),
                );
                self.report.driver_error.get_or_insert(error);
                result
            }
        };
        self.report.teardown = Some(result);
    }

    // ------------------------------------------------------------------------
    // step kinds
    // ------------------------------------------------------------------------

    async fn execute(&mut self, index: usize, step: &Step) -> DriverResult<StepResult> {
        let name = step.name.clone();
        match &step.kind {
            StepKind::Navigate { url } => {
                let url = self.runner.config.resolve_url(url);
                match self.page.navigate(&url).await {
                    Ok(()) => Ok(StepResult::passed(index, name, Duration::ZERO).with_message(url)),
                    Err(DriverError::NavigationFailed { url, message }) => Ok(StepResult::failed(
                        index,
                        name,
                        FailureKind::NotFound,
                        format!("could not navigate to {url}: {message}"),
                        Duration::ZERO,
                    )),
                    Err(error) => Err(error),
                }
            }
            StepKind::Resolve { bind, locator, .. } => {
                match resolve(locator, &self.page).await? {
                    Resolution::Found(element) => {
                        let message = format!(
                            "{} element(s) via {}",
                            element.count(),
                            element
                                .strategy()
                                .map_or_else(String::new, ToString::to_string)
                        );
                        self.bindings.insert(bind.clone(), element);
                        Ok(StepResult::passed(index, name, Duration::ZERO).with_message(message))
                    }
                    Resolution::NotFound => {
                        self.bindings.remove(bind);
                        Ok(not_found(index, name, locator))
                    }
                }
            }
            StepKind::Act { target, action } => {
                let element = match self.element(target).await? {
                    Ok(element) => element,
                    Err(message) => {
                        return Ok(StepResult::failed(
                            index,
                            name,
                            FailureKind::NotFound,
                            message,
                            Duration::ZERO,
                        ))
                    }
                };
                let Some(handle) = element.primary().cloned() else {
                    return Ok(not_found(index, name, element.spec()));
                };
                let driver = self.page.driver_mut();
                match action {
                    Action::Click => driver.click(&handle).await?,
                    Action::Fill(text) => driver.fill(&handle, text).await?,
                    Action::Press(key) => driver.press(&handle, key).await?,
                    Action::Scroll { dx, dy } => driver.scroll(&handle, *dx, *dy).await?,
                }
                let navigated = self.page.observe_navigation().await?;
                let mut message = format!("{action} on {target}");
                if navigated {
                    let url = self.page.last_url().unwrap_or_default();
                    message.push_str(&format!(" (navigated to {url})"));
                }
                Ok(StepResult::passed(index, name, Duration::ZERO).with_message(message))
            }
            StepKind::Wait {
                condition, policy, ..
            } => {
                let policy = policy.unwrap_or(self.runner.config.wait);
                let effective = match self.remaining() {
                    Some(remaining) => policy.clamped(remaining),
                    None => policy,
                };
                let outcome =
                    await_condition(&self.page, condition, &effective, self.runner.clock.as_ref())
                        .await?;
                self.page.observe_navigation().await?;
                Ok(match outcome {
                    WaitOutcome::Satisfied { elapsed } => StepResult::passed(index, name, elapsed)
                        .with_message(format!("{condition} after {}ms", elapsed.as_millis())),
                    WaitOutcome::TimedOut { elapsed } => StepResult::failed(
                        index,
                        name,
                        FailureKind::TimedOut,
                        format!("{condition} not met within {}ms", elapsed.as_millis()),
                        elapsed,
                    ),
                })
            }
            StepKind::Assert {
                target,
                matcher,
                capture,
                ..
            } => {
                let (subject, missing) = match target {
                    Target::Page => (Subject::Page, None),
                    target => match self.element(target).await? {
                        Ok(element) => (Subject::Elements(Resolution::Found(element)), None),
                        Err(reason) => (Subject::Elements(Resolution::NotFound), Some(reason)),
                    },
                };
                let options = CheckStep {
                    scenario: &self.scenario.name,
                    index,
                    name: &step.name,
                    capture: *capture,
                    capture_on_failure: self.runner.config.capture_on_failure,
                    previous_step: self.previous_before(index),
                };
                let mut result = check(
                    &self.page,
                    &self.runner.artifacts,
                    &subject,
                    matcher,
                    options,
                    Duration::ZERO,
                )
                .await?;
                if let (Some(reason), true) = (missing, result.status.is_failed()) {
                    result.message = format!("{reason}: {}", result.message);
                }
                Ok(result)
            }
            StepKind::Capture { label } => {
                match self
                    .runner
                    .artifacts
                    .capture(&self.page, &self.scenario.name, index, label)
                    .await
                {
                    Ok(path) => {
                        Ok(StepResult::passed(index, name, Duration::ZERO).with_artifact(path))
                    }
                    Err(HarnessError::Driver(error)) => Err(error),
                    Err(error) => Ok(StepResult::failed(
                        index,
                        name,
                        FailureKind::AssertionFailed,
                        format!("artifact not written: {error}"),
                        Duration::ZERO,
                    )),
                }
            }
            StepKind::SetViewport { width, height } => {
                self.page
                    .driver_mut()
                    .set_viewport_size(*width, *height)
                    .await?;
                Ok(StepResult::passed(index, name, Duration::ZERO)
                    .with_message(format!("{width}x{height}")))
            }
            StepKind::Route { pattern, policy } => {
                self.page
                    .driver_mut()
                    .route(Route::new(pattern.clone(), policy.clone()))
                    .await?;
                Ok(StepResult::passed(index, name, Duration::ZERO)
                    .with_message(format!("route {pattern}")))
            }
        }
    }

    /// Duration of the step right before `index` (the one just recorded)
    fn previous_before(&self, index: usize) -> Option<Duration> {
        index
            .checked_sub(1)
            .and_then(|i| self.report.steps.get(i))
            .map(|s| s.duration)
    }

    /// Element for an act or assert target.
    ///
    /// Bindings from an older navigation epoch are re-resolved from their
    /// spec and rebound. The inner `Err` is a not-found message.
    async fn element(&mut self, target: &Target) -> DriverResult<Result<ElementRef, String>> {
        match target {
            Target::Page => Ok(Err("the page is not an element".to_string())),
            Target::Locator(spec) => Ok(resolve(spec, &self.page)
                .await?
                .found()
                .ok_or_else(|| format!("no element matched {spec}"))),
            Target::Binding(name) => {
                let Some(bound) = self.bindings.get(name) else {
                    return Ok(Err(format!("binding '{name}' is not resolved")));
                };
                if !bound.is_stale(&self.page) {
                    return Ok(Ok(bound.clone()));
                }
                let spec = bound.spec().clone();
                tracing::debug!(binding = %name, locator = %spec, "re-resolving stale binding");
                match resolve(&spec, &self.page).await? {
                    Resolution::Found(fresh) => {
                        self.bindings.insert(name.clone(), fresh.clone());
                        Ok(Ok(fresh))
                    }
                    Resolution::NotFound => {
                        self.bindings.remove(name);
                        Ok(Err(format!("binding '{name}' no longer matches {spec}")))
                    }
                }
            }
        }
    }
}

fn not_found(index: usize, name: String, locator: &LocatorSpec) -> StepResult {
    StepResult::failed(
        index,
        name,
        FailureKind::NotFound,
        format!("no element matched {locator}"),
        Duration::ZERO,
    )
}
