//! Assertion Layer.
//!
//! Assertions are split in two halves:
//!
//! - [`assert_that`] is pure: an [`Actual`] snapshot and a [`Matcher`] in,
//!   a [`MatchOutcome`] out. No browser, no clock.
//! - [`check`] gathers the `Actual` a matcher needs from the page, evaluates
//!   it, and turns the outcome into a [`StepResult`], capturing a screenshot
//!   on failure (or on success when asked to).
//!
//! Whether a failed check aborts the scenario is not decided here; that is
//! the step's `hard` flag, applied by the runner.

use crate::artifact::ArtifactStore;
use crate::driver::{INNER_WIDTH_SCRIPT, SCROLL_WIDTH_SCRIPT};
use crate::locator::Resolution;
use crate::network::{NetworkEvent, UrlPattern};
use crate::page::PageHandle;
use crate::reporter::{FailureKind, StepResult};
use crate::result::{DriverError, DriverResult, HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// MATCHERS
// ============================================================================

/// Expected text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPattern {
    /// Contains the substring
    Contains(String),
    /// Matches the regular expression
    Regex(String),
    /// Has any non-whitespace text
    NonEmpty,
}

impl TextPattern {
    /// Whether `text` satisfies the pattern
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(fragment) => text.contains(fragment.as_str()),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            Self::NonEmpty => !text.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for TextPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contains(s) => write!(f, "containing {s:?}"),
            Self::Regex(s) => write!(f, "matching /{s}/"),
            Self::NonEmpty => write!(f, "non-empty"),
        }
    }
}

/// What the observed network traffic must show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestExpectation {
    /// At least `n` matching requests were issued
    AtLeast(usize),
    /// Every matching request URL contains the fragment
    AllContain(String),
    /// Every matching response has a status below the bound
    AllStatusBelow(u16),
}

/// Condition checked by an assertion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// At least one matched element is visible
    IsVisible,
    /// No matched element is visible (absent counts as hidden)
    IsHidden,
    /// The first matched element's text satisfies the pattern
    HasText(TextPattern),
    /// The page URL matches
    UrlMatches(UrlPattern),
    /// At least `n` elements matched
    CountAtLeast(usize),
    /// Exactly `n` elements matched
    CountEquals(usize),
    /// Document is no wider than the viewport plus `tolerance` pixels
    NoHorizontalOverflow {
        /// Allowed excess in CSS pixels
        tolerance: u32,
    },
    /// Page title does not contain the text
    TitleExcludes(String),
    /// A script evaluates to the expected JSON value
    ScriptEquals {
        /// JavaScript expression
        script: String,
        /// Expected value
        expected: serde_json::Value,
    },
    /// Observed requests matching a pattern meet an expectation
    Requests {
        /// Requests considered
        pattern: UrlPattern,
        /// Expectation over them
        expectation: RequestExpectation,
    },
    /// The previous step finished within the budget
    PreviousStepWithin(#[serde(with = "crate::config::duration_ms")] Duration),
}

impl Matcher {
    /// Whether the matcher inspects elements rather than the page
    #[must_use]
    pub const fn inspects_elements(&self) -> bool {
        matches!(
            self,
            Self::IsVisible
                | Self::IsHidden
                | Self::HasText(_)
                | Self::CountAtLeast(_)
                | Self::CountEquals(_)
        )
    }

    /// Whether a locator that matched nothing fails this matcher as `NotFound`
    #[must_use]
    pub const fn requires_match(&self) -> bool {
        matches!(self, Self::IsVisible | Self::HasText(_))
    }

    /// Reject patterns that can never match
    pub fn validate(&self) -> HarnessResult<()> {
        let pattern = match self {
            Self::HasText(TextPattern::Regex(p)) => p.as_str(),
            Self::UrlMatches(pattern) | Self::Requests { pattern, .. } => {
                match pattern.regex_source() {
                    Some(p) => p,
                    None => return Ok(()),
                }
            }
            _ => return Ok(()),
        };
        regex::Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| HarnessError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IsVisible => write!(f, "visible"),
            Self::IsHidden => write!(f, "hidden"),
            Self::HasText(pattern) => write!(f, "text {pattern}"),
            Self::UrlMatches(pattern) => write!(f, "url {pattern}"),
            Self::CountAtLeast(n) => write!(f, "count >= {n}"),
            Self::CountEquals(n) => write!(f, "count == {n}"),
            Self::NoHorizontalOverflow { tolerance } => {
                write!(f, "no horizontal overflow (tolerance {tolerance}px)")
            }
            Self::TitleExcludes(text) => write!(f, "title without {text:?}"),
            Self::ScriptEquals { script, expected } => write!(f, "`{script}` == {expected}"),
            Self::Requests {
                pattern,
                expectation,
            } => write!(f, "requests {pattern} {expectation:?}"),
            Self::PreviousStepWithin(budget) => {
                write!(f, "previous step within {}ms", budget.as_millis())
            }
        }
    }
}

// ============================================================================
// ACTUAL VALUES
// ============================================================================

/// Snapshot of whatever a matcher inspects
#[derive(Debug, Clone, PartialEq)]
pub enum Actual {
    /// Matched elements
    Elements {
        /// Number matched
        count: usize,
        /// Number of those visible
        visible: usize,
        /// Text of the first element, when gathered
        text: Option<String>,
    },
    /// Current URL
    Url(String),
    /// Document title
    Title(String),
    /// Document and viewport widths
    Layout {
        /// `document.body.scrollWidth`
        scroll_width: f64,
        /// `window.innerWidth`
        viewport_width: f64,
    },
    /// Script result
    Script(serde_json::Value),
    /// Network log
    Network(Vec<NetworkEvent>),
    /// Duration of the previous step (`None` for the first step)
    PreviousStep(Option<Duration>),
}

impl std::fmt::Display for Actual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elements {
                count,
                visible,
                text,
            } => {
                write!(f, "{count} element(s), {visible} visible")?;
                if let Some(text) = text {
                    write!(f, ", text {text:?}")?;
                }
                Ok(())
            }
            Self::Url(url) => write!(f, "url {url}"),
            Self::Title(title) => write!(f, "title {title:?}"),
            Self::Layout {
                scroll_width,
                viewport_width,
            } => write!(f, "scrollWidth {scroll_width}px, viewport {viewport_width}px"),
            Self::Script(value) => write!(f, "{value}"),
            Self::Network(log) => write!(f, "{} network event(s)", log.len()),
            Self::PreviousStep(Some(d)) => write!(f, "{}ms", d.as_millis()),
            Self::PreviousStep(None) => write!(f, "no previous step"),
        }
    }
}

/// Verdict of a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether the matcher held
    pub passed: bool,
    /// Description of what was expected and observed
    pub message: String,
}

impl MatchOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn verdict(passed: bool, matcher: &Matcher, actual: &Actual) -> Self {
        if passed {
            Self::pass(format!("{matcher}: {actual}"))
        } else {
            Self::fail(format!("expected {matcher}, got {actual}"))
        }
    }
}

/// Evaluate `matcher` against `actual`. Pure.
#[must_use]
pub fn assert_that(actual: &Actual, matcher: &Matcher) -> MatchOutcome {
    let passed = match (matcher, actual) {
        (Matcher::IsVisible, Actual::Elements { visible, .. }) => *visible > 0,
        (Matcher::IsHidden, Actual::Elements { visible, .. }) => *visible == 0,
        (Matcher::HasText(pattern), Actual::Elements { text, .. }) => {
            text.as_deref().is_some_and(|t| pattern.matches(t))
        }
        (Matcher::CountAtLeast(n), Actual::Elements { count, .. }) => count >= n,
        (Matcher::CountEquals(n), Actual::Elements { count, .. }) => count == n,
        (Matcher::UrlMatches(pattern), Actual::Url(url)) => pattern.matches(url),
        (Matcher::TitleExcludes(text), Actual::Title(title)) => !title.contains(text.as_str()),
        (
            Matcher::NoHorizontalOverflow { tolerance },
            Actual::Layout {
                scroll_width,
                viewport_width,
            },
        ) => *scroll_width <= viewport_width + f64::from(*tolerance),
        (Matcher::ScriptEquals { expected, .. }, Actual::Script(value)) => {
            json_equal(expected, value)
        }
        (
            Matcher::Requests {
                pattern,
                expectation,
            },
            Actual::Network(log),
        ) => return requests_outcome(matcher, pattern, expectation, log),
        (Matcher::PreviousStepWithin(budget), Actual::PreviousStep(Some(d))) => d <= budget,
        (Matcher::PreviousStepWithin(_), Actual::PreviousStep(None)) => {
            return MatchOutcome::fail("no previous step to time");
        }
        (matcher, actual) => {
            return MatchOutcome::fail(format!("{matcher} cannot be checked against {actual}"));
        }
    };
    MatchOutcome::verdict(passed, matcher, actual)
}

/// Numbers compare by value, so `300` equals `300.0`
fn json_equal(expected: &serde_json::Value, actual: &serde_json::Value) -> bool {
    match (expected.as_f64(), actual.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => expected == actual,
    }
}

fn requests_outcome(
    matcher: &Matcher,
    pattern: &UrlPattern,
    expectation: &RequestExpectation,
    log: &[NetworkEvent],
) -> MatchOutcome {
    use crate::network::{requests_matching, responses_matching};

    match expectation {
        RequestExpectation::AtLeast(n) => {
            let seen = requests_matching(log, pattern).count();
            if seen >= *n {
                MatchOutcome::pass(format!("{matcher}: {seen} request(s)"))
            } else {
                MatchOutcome::fail(format!("expected {matcher}, got {seen} request(s)"))
            }
        }
        RequestExpectation::AllContain(fragment) => {
            match requests_matching(log, pattern).find(|url| !url.contains(fragment.as_str())) {
                None => MatchOutcome::pass(format!("{matcher}")),
                Some(url) => MatchOutcome::fail(format!("request without {fragment:?}: {url}")),
            }
        }
        RequestExpectation::AllStatusBelow(bound) => {
            match responses_matching(log, pattern).find(|(_, status)| status >= bound) {
                None => MatchOutcome::pass(format!("{matcher}")),
                Some((url, status)) => {
                    MatchOutcome::fail(format!("response {status} >= {bound}: {url}"))
                }
            }
        }
    }
}

// ============================================================================
// CHECK (gather + evaluate + capture)
// ============================================================================

/// What an assertion step looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// The page as a whole
    Page,
    /// Elements resolved from a locator (possibly nothing)
    Elements(Resolution),
}

/// Identity and options of one assertion step
#[derive(Debug, Clone, Copy)]
pub struct CheckStep<'a> {
    /// Scenario name (artifact prefix)
    pub scenario: &'a str,
    /// Step position
    pub index: usize,
    /// Step name
    pub name: &'a str,
    /// Capture a screenshot even when passing
    pub capture: bool,
    /// Capture a screenshot on failure
    pub capture_on_failure: bool,
    /// Duration of the step before this one
    pub previous_step: Option<Duration>,
}

/// Gather the snapshot `matcher` needs
pub async fn gather(
    page: &PageHandle,
    subject: &Subject,
    matcher: &Matcher,
    previous_step: Option<Duration>,
) -> DriverResult<Actual> {
    let driver = page.driver();
    if matcher.inspects_elements() {
        let Subject::Elements(resolution) = subject else {
            return Ok(Actual::Url(driver.current_url().await?));
        };
        let Resolution::Found(element) = resolution else {
            return Ok(Actual::Elements {
                count: 0,
                visible: 0,
                text: None,
            });
        };
        let mut visible = 0;
        for handle in element.handles() {
            match driver.is_visible(handle).await {
                Ok(true) => visible += 1,
                Ok(false) | Err(DriverError::Detached { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        let text = match (matcher, element.primary()) {
            (Matcher::HasText(_), Some(handle)) => Some(driver.text_content(handle).await?),
            _ => None,
        };
        return Ok(Actual::Elements {
            count: element.count(),
            visible,
            text,
        });
    }

    Ok(match matcher {
        Matcher::UrlMatches(_) => Actual::Url(driver.current_url().await?),
        Matcher::TitleExcludes(_) => Actual::Title(driver.title().await?),
        Matcher::NoHorizontalOverflow { .. } => Actual::Layout {
            scroll_width: number(driver.evaluate(SCROLL_WIDTH_SCRIPT).await?, SCROLL_WIDTH_SCRIPT)?,
            viewport_width: number(driver.evaluate(INNER_WIDTH_SCRIPT).await?, INNER_WIDTH_SCRIPT)?,
        },
        Matcher::ScriptEquals { script, .. } => Actual::Script(driver.evaluate(script).await?),
        Matcher::Requests { .. } => Actual::Network(driver.network_log().await?),
        Matcher::PreviousStepWithin(_) => Actual::PreviousStep(previous_step),
        _ => Actual::Url(driver.current_url().await?),
    })
}

fn number(value: serde_json::Value, script: &str) -> DriverResult<f64> {
    value.as_f64().ok_or_else(|| DriverError::ScriptFailed {
        message: format!("{script} returned {value}, expected a number"),
    })
}

/// Gather, evaluate and record one assertion.
///
/// Driver faults while gathering are returned as errors. A failing
/// screenshot only loses the artifact.
pub async fn check(
    page: &PageHandle,
    artifacts: &ArtifactStore,
    subject: &Subject,
    matcher: &Matcher,
    step: CheckStep<'_>,
    duration_so_far: Duration,
) -> DriverResult<StepResult> {
    let actual = gather(page, subject, matcher, step.previous_step).await?;
    let outcome = assert_that(&actual, matcher);

    let (result, capture) = if outcome.passed {
        let result = StepResult::passed(step.index, step.name, duration_so_far)
            .with_message(outcome.message);
        (result, step.capture)
    } else {
        let kind = match subject {
            Subject::Elements(Resolution::NotFound) if matcher.requires_match() => {
                FailureKind::NotFound
            }
            _ => FailureKind::AssertionFailed,
        };
        let result = StepResult::failed(
            step.index,
            step.name,
            kind,
            outcome.message,
            duration_so_far,
        );
        (result, step.capture || step.capture_on_failure)
    };

    if !capture {
        return Ok(result);
    }
    let label = if result.status.is_failed() {
        "failure"
    } else {
        step.name
    };
    match artifacts.capture(page, step.scenario, step.index, label).await {
        Ok(path) => Ok(result.with_artifact(path)),
        Err(e) => {
            tracing::warn!(step = step.name, error = %e, "artifact capture failed");
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{resolve, LocatorSpec};
    use crate::mock::{MockDriver, MockElement, MockPage};
    use crate::network::AbortReason;
    use crate::reporter::StepStatus;

    const HOME: &str = "http://localhost:5173/";

    fn elements(count: usize, visible: usize, text: Option<&str>) -> Actual {
        Actual::Elements {
            count,
            visible,
            text: text.map(str::to_string),
        }
    }

    mod assert_that_tests {
        use super::*;

        #[test]
        fn test_visibility() {
            assert!(assert_that(&elements(1, 1, None), &Matcher::IsVisible).passed);
            assert!(!assert_that(&elements(2, 0, None), &Matcher::IsVisible).passed);
            assert!(assert_that(&elements(0, 0, None), &Matcher::IsHidden).passed);
            assert!(!assert_that(&elements(1, 1, None), &Matcher::IsHidden).passed);
        }

        #[test]
        fn test_text() {
            let actual = elements(1, 1, Some("Dune: Part Two"));
            let contains = Matcher::HasText(TextPattern::Contains("Dune".into()));
            assert!(assert_that(&actual, &contains).passed);
            let regex = Matcher::HasText(TextPattern::Regex(r"^Dune:".into()));
            assert!(assert_that(&actual, &regex).passed);
            assert!(assert_that(&actual, &Matcher::HasText(TextPattern::NonEmpty)).passed);
            let blank = elements(1, 1, Some("  "));
            assert!(!assert_that(&blank, &Matcher::HasText(TextPattern::NonEmpty)).passed);
        }

        #[test]
        fn test_counts_and_message() {
            let zero = elements(0, 0, None);
            let outcome = assert_that(&zero, &Matcher::CountAtLeast(1));
            assert!(!outcome.passed);
            assert_eq!(outcome.message, "expected count >= 1, got 0 element(s), 0 visible");
            assert!(assert_that(&zero, &Matcher::CountEquals(0)).passed);
        }

        #[test]
        fn test_url_and_title() {
            let url = Actual::Url("http://localhost:5173/movie/550".into());
            let detail = Matcher::UrlMatches(UrlPattern::Regex(r"/movie/\d+".into()));
            assert!(assert_that(&url, &detail).passed);
            let title = Actual::Title("MovieVerse".into());
            assert!(assert_that(&title, &Matcher::TitleExcludes("Error".into())).passed);
            let broken = Actual::Title("Error 500".into());
            assert!(!assert_that(&broken, &Matcher::TitleExcludes("Error".into())).passed);
        }

        #[test]
        fn test_horizontal_overflow_tolerance() {
            let matcher = Matcher::NoHorizontalOverflow { tolerance: 20 };
            let fits = Actual::Layout {
                scroll_width: 410.0,
                viewport_width: 390.0,
            };
            let overflows = Actual::Layout {
                scroll_width: 411.0,
                viewport_width: 390.0,
            };
            assert!(assert_that(&fits, &matcher).passed);
            assert!(!assert_that(&overflows, &matcher).passed);
        }

        #[test]
        fn test_script_numbers_compare_by_value() {
            let matcher = Matcher::ScriptEquals {
                script: "el.scrollLeft".into(),
                expected: serde_json::json!(300),
            };
            assert!(assert_that(&Actual::Script(serde_json::json!(300.0)), &matcher).passed);
            assert!(!assert_that(&Actual::Script(serde_json::json!("300")), &matcher).passed);
        }

        #[test]
        fn test_requests() {
            let log = vec![
                NetworkEvent::Request {
                    url: "https://api.themoviedb.org/3/movie/popular?api_key=k".into(),
                    method: "GET".into(),
                },
                NetworkEvent::Response {
                    url: "https://api.themoviedb.org/3/movie/popular?api_key=k".into(),
                    status: 200,
                },
                NetworkEvent::Request {
                    url: "https://api.themoviedb.org/3/genre/list".into(),
                    method: "GET".into(),
                },
                NetworkEvent::Failed {
                    url: "https://api.themoviedb.org/3/genre/list".into(),
                    reason: AbortReason::Failed,
                },
            ];
            let actual = Actual::Network(log);
            let tmdb = UrlPattern::contains("api.themoviedb.org");
            let at_least = Matcher::Requests {
                pattern: tmdb.clone(),
                expectation: RequestExpectation::AtLeast(1),
            };
            let keyed = Matcher::Requests {
                pattern: tmdb.clone(),
                expectation: RequestExpectation::AllContain("api_key=".into()),
            };
            let healthy = Matcher::Requests {
                pattern: tmdb,
                expectation: RequestExpectation::AllStatusBelow(400),
            };
            assert!(assert_that(&actual, &at_least).passed);
            let outcome = assert_that(&actual, &keyed);
            assert!(!outcome.passed);
            assert!(outcome.message.contains("genre/list"));
            assert!(assert_that(&actual, &healthy).passed);
        }

        #[test]
        fn test_previous_step_budget() {
            let matcher = Matcher::PreviousStepWithin(Duration::from_secs(3));
            let on_budget = Actual::PreviousStep(Some(Duration::from_secs(3)));
            assert!(assert_that(&on_budget, &matcher).passed);
            let over_budget = Actual::PreviousStep(Some(Duration::from_millis(3001)));
            assert!(!assert_that(&over_budget, &matcher).passed);
            assert!(!assert_that(&Actual::PreviousStep(None), &matcher).passed);
        }

        #[test]
        fn test_mismatched_actual_fails() {
            let outcome = assert_that(&Actual::Url("x".into()), &Matcher::IsVisible);
            assert!(!outcome.passed);
            assert!(outcome.message.contains("cannot be checked"));
        }

        #[test]
        fn test_validate() {
            assert!(Matcher::HasText(TextPattern::Regex("(".into())).validate().is_err());
            assert!(Matcher::UrlMatches(UrlPattern::Regex("[".into())).validate().is_err());
            assert!(Matcher::UrlMatches(UrlPattern::contains("search")).validate().is_ok());
        }

        #[test]
        fn test_validate_reports_pattern() {
            let err = Matcher::HasText(TextPattern::Regex(r"\d+ temporada(".into()))
                .validate()
                .unwrap_err();
            match err {
                HarnessError::InvalidPattern { pattern, .. } => {
                    assert_eq!(pattern, r"\d+ temporada(");
                }
                other => panic!("unexpected error: {other}"),
            }
            let err = Matcher::UrlMatches(UrlPattern::Regex("/movie/[".into()))
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("/movie/["), "{err}");
        }

        #[test]
        fn test_yaml_shape() {
            let matcher: Matcher =
                crate::yaml::from_str("no_horizontal_overflow:\n  tolerance: 20\n").unwrap();
            assert_eq!(matcher, Matcher::NoHorizontalOverflow { tolerance: 20 });
            let matcher: Matcher = crate::yaml::from_str("count_at_least: 1\n").unwrap();
            assert_eq!(matcher, Matcher::CountAtLeast(1));
            let matcher: Matcher = crate::yaml::from_str("is_visible\n").unwrap();
            assert_eq!(matcher, Matcher::IsVisible);
        }
    }

    mod check_tests {
        use super::*;

        async fn page() -> PageHandle {
            let driver = MockDriver::new().page(
                MockPage::new(UrlPattern::Exact(HOME.into()))
                    .title("MovieVerse")
                    .element(MockElement::new("span").text("MovIA"))
                    .element(MockElement::new("div").selector(".modal").hidden()),
            );
            let mut page = PageHandle::new(driver);
            page.navigate(HOME).await.unwrap();
            page
        }

        fn step(name: &str) -> CheckStep<'_> {
            CheckStep {
                scenario: "homepage",
                index: 0,
                name,
                capture: false,
                capture_on_failure: true,
                previous_step: None,
            }
        }

        #[tokio::test]
        async fn test_pass_writes_no_artifact() {
            let temp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(temp.path());
            let page = page().await;
            let found = resolve(&LocatorSpec::text("MovIA"), &page).await.unwrap();
            let subject = Subject::Elements(found);
            let options = step("logo");
            let result = check(
                &page,
                &store,
                &subject,
                &Matcher::IsVisible,
                options,
                Duration::ZERO,
            )
            .await
            .unwrap();
            assert_eq!(result.status, StepStatus::Passed);
            assert!(result.artifact_path.is_none());
            assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_failure_captures_artifact() {
            let temp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(temp.path());
            let page = page().await;
            let found = resolve(&LocatorSpec::css(".modal"), &page).await.unwrap();
            let subject = Subject::Elements(found);
            let options = step("modal open");
            let result = check(
                &page,
                &store,
                &subject,
                &Matcher::IsVisible,
                options,
                Duration::ZERO,
            )
            .await
            .unwrap();
            assert_eq!(result.failure, Some(FailureKind::AssertionFailed));
            let path = result.artifact_path.unwrap();
            assert!(path.ends_with("homepage-00-failure.png"));
            assert!(path.exists());
        }

        #[tokio::test]
        async fn test_unmatched_locator_is_not_found() {
            let temp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(temp.path());
            let page = page().await;
            let found = resolve(&LocatorSpec::css("iframe"), &page).await.unwrap();
            let subject = Subject::Elements(found);
            let mut options = step("trailer");
            options.capture_on_failure = false;
            let result = check(
                &page,
                &store,
                &subject,
                &Matcher::IsVisible,
                options,
                Duration::ZERO,
            )
            .await
            .unwrap();
            assert_eq!(result.failure, Some(FailureKind::NotFound));
            assert!(result.artifact_path.is_none());
        }

        #[tokio::test]
        async fn test_requested_capture_on_success() {
            let temp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(temp.path());
            let page = page().await;
            let mut options = step("title ok");
            options.capture = true;
            let result = check(
                &page,
                &store,
                &Subject::Page,
                &Matcher::TitleExcludes("Error".into()),
                options,
                Duration::ZERO,
            )
            .await
            .unwrap();
            assert!(result.status.is_passed());
            assert!(result.artifact_path.unwrap().ends_with("homepage-00-title-ok.png"));
        }

        #[tokio::test]
        async fn test_overflow_against_viewport() {
            let temp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(temp.path());
            let mut page = page().await;
            page.driver_mut().set_viewport_size(390, 844).await.unwrap();
            let result = check(
                &page,
                &store,
                &Subject::Page,
                &Matcher::NoHorizontalOverflow { tolerance: 20 },
                step("no overflow"),
                Duration::ZERO,
            )
            .await
            .unwrap();
            assert!(result.status.is_passed(), "{}", result.message);
        }
    }
}
