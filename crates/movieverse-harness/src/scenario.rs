//! Scenario definitions.
//!
//! A [`Scenario`] is a named, ordered list of [`Step`]s modelling one user
//! journey. Scenarios are plain data: they can be built in Rust (see
//! [`crate::movieverse`]) or loaded from YAML:
//!
//! ```yaml
//! name: search spider
//! tags: [search]
//! entry_url: /
//! steps:
//!   - name: search box
//!     resolve:
//!       bind: search
//!       locator:
//!         strategies:
//!           - css: 'input[placeholder*="Buscar"]'
//!           - css: 'input[type="search"]'
//!   - name: type query
//!     act:
//!       target: { binding: search }
//!       action: { fill: Spider }
//! ```

use crate::assertion::Matcher;
use crate::locator::LocatorSpec;
use crate::network::{RoutePolicy, UrlPattern};
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{Condition, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const fn default_hard() -> bool {
    true
}

/// What an act or assert step operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The page as a whole
    Page,
    /// An element bound by an earlier resolve step
    Binding(String),
    /// Elements resolved inline
    Locator(LocatorSpec),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Binding(name) => write!(f, "${name}"),
            Self::Locator(spec) => write!(f, "{spec}"),
        }
    }
}

/// User interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Click the element
    Click,
    /// Replace the element's value
    Fill(String),
    /// Press a key with the element focused
    Press(String),
    /// Scroll the element's content
    Scroll {
        /// Horizontal offset in pixels
        #[serde(default)]
        dx: i32,
        /// Vertical offset in pixels
        #[serde(default)]
        dy: i32,
    },
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(text) => write!(f, "fill {text:?}"),
            Self::Press(key) => write!(f, "press {key}"),
            Self::Scroll { dx, dy } => write!(f, "scroll ({dx}, {dy})"),
        }
    }
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Load a URL (relative URLs resolve against the base URL)
    Navigate {
        /// Destination
        url: String,
    },
    /// Resolve a locator and bind the result to a name
    Resolve {
        /// Binding name
        bind: String,
        /// Element description
        locator: LocatorSpec,
        /// Abort when nothing matches
        #[serde(default = "default_hard")]
        hard: bool,
    },
    /// Interact with an element
    Act {
        /// Element acted upon
        target: Target,
        /// Interaction
        action: Action,
    },
    /// Poll a condition
    Wait {
        /// Condition to wait for
        condition: Condition,
        /// Overrides the configured default policy
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<WaitPolicy>,
        /// Abort when the wait times out
        #[serde(default = "default_hard")]
        hard: bool,
    },
    /// Check a matcher
    Assert {
        /// Subject
        target: Target,
        /// Expectation
        matcher: Matcher,
        /// Abort when the check fails
        #[serde(default = "default_hard")]
        hard: bool,
        /// Screenshot even when passing
        #[serde(default)]
        capture: bool,
    },
    /// Screenshot the page
    Capture {
        /// Artifact label
        label: String,
    },
    /// Resize the viewport
    SetViewport {
        /// Width in CSS pixels
        width: u32,
        /// Height in CSS pixels
        height: u32,
    },
    /// Install request interception
    Route {
        /// Requests affected
        pattern: UrlPattern,
        /// What to do with them
        policy: RoutePolicy,
    },
}

impl StepKind {
    /// Whether a failure of this step aborts the scenario
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        match self {
            Self::Resolve { hard, .. } | Self::Wait { hard, .. } | Self::Assert { hard, .. } => {
                *hard
            }
            Self::Navigate { .. }
            | Self::Act { .. }
            | Self::Capture { .. }
            | Self::SetViewport { .. }
            | Self::Route { .. } => true,
        }
    }
}

/// One named step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, shown in reports
    pub name: String,
    /// What the step does
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// Create a step
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Navigate to `url`
    #[must_use]
    pub fn navigate(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, StepKind::Navigate { url: url.into() })
    }

    /// Bind `locator` to `bind` (hard)
    #[must_use]
    pub fn resolve(name: impl Into<String>, bind: impl Into<String>, locator: LocatorSpec) -> Self {
        Self::new(
            name,
            StepKind::Resolve {
                bind: bind.into(),
                locator,
                hard: true,
            },
        )
    }

    /// Interact with `target`
    #[must_use]
    pub fn act(name: impl Into<String>, target: Target, action: Action) -> Self {
        Self::new(name, StepKind::Act { target, action })
    }

    /// Click `target`
    #[must_use]
    pub fn click(name: impl Into<String>, target: Target) -> Self {
        Self::act(name, target, Action::Click)
    }

    /// Wait for `condition` with the default policy (hard)
    #[must_use]
    pub fn wait(name: impl Into<String>, condition: Condition) -> Self {
        Self::new(
            name,
            StepKind::Wait {
                condition,
                policy: None,
                hard: true,
            },
        )
    }

    /// Assert `matcher` on `target` (hard)
    #[must_use]
    pub fn assert(name: impl Into<String>, target: Target, matcher: Matcher) -> Self {
        Self::new(
            name,
            StepKind::Assert {
                target,
                matcher,
                hard: true,
                capture: false,
            },
        )
    }

    /// Screenshot labelled `label`
    #[must_use]
    pub fn capture(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Capture {
                label: label.into(),
            },
        )
    }

    /// Resize the viewport
    #[must_use]
    pub fn viewport(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(name, StepKind::SetViewport { width, height })
    }

    /// Install a route
    #[must_use]
    pub fn route(name: impl Into<String>, pattern: UrlPattern, policy: RoutePolicy) -> Self {
        Self::new(name, StepKind::Route { pattern, policy })
    }

    /// Record failures without aborting (resolve, wait and assert steps)
    #[must_use]
    pub fn soft(mut self) -> Self {
        match &mut self.kind {
            StepKind::Resolve { hard, .. }
            | StepKind::Wait { hard, .. }
            | StepKind::Assert { hard, .. } => *hard = false,
            _ => {}
        }
        self
    }

    /// Use `policy` instead of the default (wait steps)
    #[must_use]
    pub fn with_policy(mut self, wait_policy: WaitPolicy) -> Self {
        if let StepKind::Wait { policy, .. } = &mut self.kind {
            *policy = Some(wait_policy);
        }
        self
    }

    /// Screenshot even when passing (assert steps)
    #[must_use]
    pub fn captured(mut self) -> Self {
        if let StepKind::Assert { capture, .. } = &mut self.kind {
            *capture = true;
        }
        self
    }
}

/// What happens after a hard failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first hard failure; remaining steps are skipped
    #[default]
    AbortOnHardFailure,
    /// Record every failure and keep going (driver faults and deadlines still stop)
    ContinueOnFailure,
}

/// Named user journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form tags (e.g. `basic`, `search`)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Page loaded before the first step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Failure policy
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Wall-clock ceiling, overriding the configured one
    #[serde(
        default,
        with = "crate::config::option_duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Duration>,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            entry_url: None,
            steps: Vec::new(),
            policy: FailurePolicy::default(),
            deadline: None,
        }
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Load `url` before the first step
    #[must_use]
    pub fn entry(mut self, url: impl Into<String>) -> Self {
        self.entry_url = Some(url.into());
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the failure policy
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the deadline
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether the scenario carries `tag`
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Parse one scenario from YAML and validate it
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let scenario: Self = crate::yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a YAML sequence of scenarios and validate each
    pub fn list_from_yaml(yaml: &str) -> HarnessResult<Vec<Self>> {
        let scenarios: Vec<Self> = crate::yaml::from_str(yaml)?;
        for scenario in &scenarios {
            scenario.validate()?;
        }
        Ok(scenarios)
    }

    /// Load scenarios from a YAML file holding a sequence
    pub fn load_file(path: impl AsRef<Path>) -> HarnessResult<Vec<Self>> {
        let yaml = std::fs::read_to_string(path)?;
        Self::list_from_yaml(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        crate::yaml::to_string(self)
    }

    /// Serialize a list of scenarios to YAML
    pub fn list_to_yaml(scenarios: &[Self]) -> HarnessResult<String> {
        crate::yaml::to_string(&scenarios)
    }

    /// Check the scenario is runnable.
    ///
    /// Rejects invalid regexes, bindings used before they are bound,
    /// element matchers on the page, page matchers on elements, acting on
    /// the page, elapsed waits longer than their timeout and zero-period
    /// routes.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("scenario name is empty"));
        }

        let mut bound: HashSet<&str> = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let at = |message: String| {
                self.invalid(format!("step {index} '{}': {message}", step.name))
            };
            match &step.kind {
                StepKind::Navigate { url } if url.trim().is_empty() => {
                    return Err(at("empty url".to_string()));
                }
                StepKind::Resolve { bind, locator, .. } => {
                    locator.validate()?;
                    bound.insert(bind.as_str());
                }
                StepKind::Act { target, .. } => match target {
                    Target::Page => return Err(at("cannot act on the page".to_string())),
                    other => self.check_target(other, &bound).map_err(at)?,
                },
                StepKind::Wait {
                    condition, policy, ..
                } => {
                    validate_condition(condition)?;
                    if let (Condition::Elapsed(d), Some(policy)) = (condition, policy) {
                        if policy.timeout < *d {
                            return Err(at(format!(
                                "elapsed wait of {}ms exceeds its {}ms timeout",
                                d.as_millis(),
                                policy.timeout.as_millis()
                            )));
                        }
                    }
                }
                StepKind::Assert {
                    target, matcher, ..
                } => {
                    matcher.validate()?;
                    match (target, matcher.inspects_elements()) {
                        (Target::Page, true) => {
                            return Err(at(format!("{matcher} needs an element target")));
                        }
                        (Target::Binding(_) | Target::Locator(_), false) => {
                            return Err(at(format!("{matcher} checks the page, not elements")));
                        }
                        _ => {}
                    }
                    self.check_target(target, &bound).map_err(at)?;
                }
                StepKind::Route { pattern, policy } => {
                    if let Some(p) = pattern.regex_source() {
                        regex::Regex::new(p).map_err(|e| HarnessError::InvalidPattern {
                            pattern: p.to_string(),
                            message: e.to_string(),
                        })?;
                    }
                    if matches!(policy, RoutePolicy::AbortEveryNth { n: 0, .. }) {
                        return Err(at("abort_every_nth needs n > 0".to_string()));
                    }
                }
                StepKind::SetViewport { width, height } if *width == 0 || *height == 0 => {
                    return Err(at("viewport must be non-empty".to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_target(&self, target: &Target, bound: &HashSet<&str>) -> Result<(), String> {
        match target {
            Target::Binding(name) if !bound.contains(name.as_str()) => {
                Err(format!("binding '{name}' used before it is resolved"))
            }
            Target::Locator(spec) => spec.validate().map_err(|e| e.to_string()),
            _ => Ok(()),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> HarnessError {
        HarnessError::InvalidScenario {
            scenario: self.name.clone(),
            message: message.into(),
        }
    }
}

fn validate_condition(condition: &Condition) -> HarnessResult<()> {
    match condition {
        Condition::Visible(locator)
        | Condition::Hidden(locator)
        | Condition::Count { locator, .. } => locator.validate(),
        Condition::UrlMatches(pattern) => match pattern.regex_source() {
            Some(p) => regex::Regex::new(p)
                .map(|_| ())
                .map_err(|e| HarnessError::InvalidPattern {
                    pattern: p.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(()),
        },
        Condition::NetworkIdle | Condition::Elapsed(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Strategy;
    use crate::network::AbortReason;
    use crate::wait::CountPredicate;

    fn search() -> Scenario {
        Scenario::new("search spider")
            .tag("search")
            .entry("/")
            .step(Step::resolve(
                "search box",
                "search",
                LocatorSpec::css(r#"input[placeholder*="Buscar"]"#)
                    .or_css(r#"input[type="search"]"#),
            ))
            .step(Step::act(
                "type query",
                Target::Binding("search".into()),
                Action::Fill("Spider".into()),
            ))
            .step(Step::act(
                "submit",
                Target::Binding("search".into()),
                Action::Press("Enter".into()),
            ))
            .step(Step::wait(
                "results url",
                Condition::UrlMatches(UrlPattern::contains("search")),
            ))
            .step(
                Step::assert(
                    "results shown",
                    Target::Locator(LocatorSpec::css("img")),
                    Matcher::CountAtLeast(1),
                )
                .soft(),
            )
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let scenario = search();
            assert_eq!(scenario.steps.len(), 5);
            assert!(scenario.has_tag("search"));
            assert_eq!(scenario.entry_url.as_deref(), Some("/"));
            assert_eq!(scenario.policy, FailurePolicy::AbortOnHardFailure);
            assert!(!scenario.steps[4].kind.is_hard());
            assert!(scenario.steps[1].kind.is_hard());
            assert!(scenario.validate().is_ok());
        }

        #[test]
        fn test_soft_ignores_unflagged_kinds() {
            let step = Step::click("go", Target::Binding("x".into())).soft();
            assert!(step.kind.is_hard());
        }

        #[test]
        fn test_with_policy_and_captured() {
            let wait = Step::wait("idle", Condition::NetworkIdle)
                .with_policy(WaitPolicy::from_millis(3_000, 250));
            assert!(matches!(
                wait.kind,
                StepKind::Wait {
                    policy: Some(p),
                    ..
                } if p.timeout == Duration::from_secs(3)
            ));
            let logo = Target::Locator(LocatorSpec::text("MovIA"));
            let assert = Step::assert("logo", logo, Matcher::IsVisible).captured();
            assert!(matches!(assert.kind, StepKind::Assert { capture: true, .. }));
        }

        #[test]
        fn test_display() {
            assert_eq!(Target::Binding("search".into()).to_string(), "$search");
            assert_eq!(Action::Scroll { dx: 300, dy: 0 }.to_string(), "scroll (300, 0)");
        }
    }

    mod validate_tests {
        use super::*;

        fn expect_invalid(scenario: &Scenario, fragment: &str) {
            let err = scenario.validate().unwrap_err();
            assert!(err.to_string().contains(fragment), "{err}");
        }

        #[test]
        fn test_unbound_binding() {
            let scenario =
                Scenario::new("bad").step(Step::click("go", Target::Binding("logo".into())));
            expect_invalid(&scenario, "binding 'logo'");
        }

        #[test]
        fn test_invalid_regex_in_locator() {
            let scenario = Scenario::new("bad").step(Step::resolve(
                "seasons",
                "seasons",
                LocatorSpec::regex(r"(\d+.*temporada"),
            ));
            assert!(matches!(
                scenario.validate().unwrap_err(),
                HarnessError::InvalidPattern { .. }
            ));
        }

        #[test]
        fn test_element_matcher_on_page() {
            let visible = Step::assert("visible", Target::Page, Matcher::IsVisible);
            let scenario = Scenario::new("bad").step(visible);
            expect_invalid(&scenario, "needs an element target");
        }

        #[test]
        fn test_page_matcher_on_element() {
            let scenario = Scenario::new("bad").step(Step::assert(
                "url",
                Target::Locator(LocatorSpec::css("h1")),
                Matcher::TitleExcludes("Error".into()),
            ));
            expect_invalid(&scenario, "checks the page");
        }

        #[test]
        fn test_act_on_page() {
            let scenario = Scenario::new("bad").step(Step::click("click", Target::Page));
            expect_invalid(&scenario, "cannot act on the page");
        }

        #[test]
        fn test_elapsed_longer_than_timeout() {
            let scenario = Scenario::new("bad").step(
                Step::wait("settle", Condition::Elapsed(Duration::from_secs(3)))
                    .with_policy(WaitPolicy::from_millis(1_000, 100)),
            );
            expect_invalid(&scenario, "exceeds");
        }

        #[test]
        fn test_zero_period_route() {
            let scenario = Scenario::new("bad").step(Step::route(
                "flaky",
                UrlPattern::Any,
                RoutePolicy::AbortEveryNth {
                    n: 0,
                    reason: AbortReason::Failed,
                },
            ));
            expect_invalid(&scenario, "n > 0");
        }

        #[test]
        fn test_empty_name() {
            expect_invalid(&Scenario::new(" "), "name is empty");
        }
    }

    mod yaml_tests {
        use super::*;

        const SEARCH_YAML: &str = r#"
name: search spider
tags: [search]
entry_url: /
deadline: 30000
steps:
  - name: search box
    resolve:
      bind: search
      locator:
        strategies:
          - css: 'input[placeholder*="Buscar"]'
          - css: 'input[type="search"]'
  - name: type query
    act:
      target: { binding: search }
      action: { fill: Spider }
  - name: submit
    act:
      target: { binding: search }
      action: { press: Enter }
  - name: results url
    wait:
      condition: { url_matches: { contains: search } }
      policy: { timeout: 3000, poll: 100 }
  - name: results shown
    assert:
      target: { locator: { strategies: [ { css: img } ] } }
      matcher: { count_at_least: 1 }
      hard: false
"#;

        #[test]
        fn test_from_yaml_matches_builder() {
            let scenario = Scenario::from_yaml(SEARCH_YAML).unwrap();
            assert_eq!(scenario.deadline, Some(Duration::from_secs(30)));
            let mut expected = search().with_deadline(Duration::from_secs(30));
            expected.steps[3] = expected.steps[3]
                .clone()
                .with_policy(WaitPolicy::from_millis(3_000, 100));
            assert_eq!(scenario, expected);
        }

        #[test]
        fn test_yaml_round_trip() {
            let scenario = search();
            let back = Scenario::from_yaml(&scenario.to_yaml().unwrap()).unwrap();
            assert_eq!(back, scenario);
        }

        #[test]
        fn test_list_and_file() {
            let temp = tempfile::tempdir().unwrap();
            let path = temp.path().join("scenarios.yaml");
            let yaml = Scenario::list_to_yaml(&[
                search(),
                Scenario::new("logo").entry("/").step(Step::assert(
                    "logo visible",
                    Target::Locator(LocatorSpec::text("MovIA")),
                    Matcher::IsVisible,
                )),
            ])
            .unwrap();
            std::fs::write(&path, yaml).unwrap();
            let scenarios = Scenario::load_file(&path).unwrap();
            assert_eq!(scenarios.len(), 2);
            assert_eq!(scenarios[1].name, "logo");
        }

        #[test]
        fn test_invalid_yaml_scenario_is_rejected() {
            let yaml = concat!(
                "name: bad\n",
                "steps:\n",
                "  - name: go\n",
                "    act:\n",
                "      target: { binding: nope }\n",
                "      action: click\n",
            );
            assert!(matches!(
                Scenario::from_yaml(yaml).unwrap_err(),
                HarnessError::InvalidScenario { .. }
            ));
        }

        #[test]
        fn test_count_condition_yaml() {
            let yaml = concat!(
                "name: grid\n",
                "steps:\n",
                "  - name: posters\n",
                "    wait:\n",
                "      condition:\n",
                "        count:\n",
                "          locator: { strategies: [ { css: img } ] }\n",
                "          predicate: { at_least: 1 }\n",
            );
            let scenario = Scenario::from_yaml(yaml).unwrap();
            assert_eq!(
                scenario.steps[0].kind,
                StepKind::Wait {
                    condition: Condition::Count {
                        locator: LocatorSpec::new(Strategy::Css("img".into())),
                        predicate: CountPredicate::AtLeast(1),
                    },
                    policy: None,
                    hard: true,
                }
            );
        }
    }
}
