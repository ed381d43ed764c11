//! Step results, scenario reports and run-level output.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  RunReport (run id, timestamp)                                     │
//! │    └── ScenarioReport × M   status: Completed | Aborted            │
//! │          ├── StepResult × N  exactly one per declared step         │
//! │          └── teardown        page release, recorded separately     │
//! │                                                                    │
//! │  Output: JSON (serde_json) · JUnit XML · HTML (base64 screenshots) │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps are append-only. Once a scenario aborts only `Skipped` entries
//! follow.

use crate::result::{DriverError, HarnessResult};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// STEP RESULTS
// ============================================================================

/// Terminal state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step passed
    Passed,
    /// Step failed
    Failed,
    /// Step did not run
    Skipped,
}

impl StepStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if the step was skipped
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A locator matched nothing
    NotFound,
    /// A wait exceeded its budget
    TimedOut,
    /// A matcher returned false
    AssertionFailed,
    /// The scenario ran out of wall-clock time
    DeadlineExceeded,
    /// The browser driver reported a fault
    DriverError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::TimedOut => "timed out",
            Self::AssertionFailed => "assertion failed",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::DriverError => "driver error",
        };
        f.write_str(s)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Position in the scenario
    pub index: usize,
    /// Step name
    pub name: String,
    /// Terminal state
    pub status: StepStatus,
    /// Human-readable detail
    pub message: String,
    /// Screenshot captured for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// Time spent in the step
    #[serde(rename = "duration_ms", with = "crate::config::duration_ms")]
    pub duration: Duration,
    /// Failure classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl StepResult {
    /// Create a passing result
    #[must_use]
    pub fn passed(index: usize, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            index,
            name: name.into(),
            status: StepStatus::Passed,
            message: String::new(),
            artifact_path: None,
            duration,
            failure: None,
        }
    }

    /// Create a failing result
    #[must_use]
    pub fn failed(
        index: usize,
        name: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            status: StepStatus::Failed,
            message: message.into(),
            artifact_path: None,
            duration,
            failure: Some(kind),
        }
    }

    /// Create a skipped result
    #[must_use]
    pub fn skipped(index: usize, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            status: StepStatus::Skipped,
            message: reason.into(),
            artifact_path: None,
            duration: Duration::ZERO,
            failure: None,
        }
    }

    /// Attach a detail message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach an artifact
    #[must_use]
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    /// Set the duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

// ============================================================================
// SCENARIO REPORT
// ============================================================================

/// Terminal state of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every step ran (some may have failed softly)
    Completed,
    /// Execution stopped early
    Aborted,
}

/// Step-by-step record of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Scenario tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Terminal state
    pub status: ScenarioStatus,
    /// Exactly one entry per declared step
    pub steps: Vec<StepResult>,
    /// Page release after the last step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown: Option<StepResult>,
    /// Fault that aborted the scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_error: Option<DriverError>,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Total time
    #[serde(rename = "duration_ms", with = "crate::config::duration_ms")]
    pub duration: Duration,
}

impl ScenarioReport {
    /// Empty report for a scenario that is about to run
    #[must_use]
    pub fn new(scenario: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            scenario: scenario.into(),
            tags,
            status: ScenarioStatus::Completed,
            steps: Vec::new(),
            teardown: None,
            driver_error: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Append a step result
    pub fn push(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    /// Mark the scenario aborted
    pub fn abort(&mut self) {
        self.status = ScenarioStatus::Aborted;
    }

    /// Whether the scenario aborted
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.status == ScenarioStatus::Aborted
    }

    /// Whether every step passed and the scenario completed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.status == ScenarioStatus::Completed && self.steps.iter().all(|s| s.status.is_passed())
    }

    /// False when a driver fault cut the run short
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.driver_error.is_none()
    }

    /// Count passed steps
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(StepStatus::Passed)
    }

    /// Count failed steps
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    /// Count skipped steps
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    /// Steps that actually ran
    #[must_use]
    pub fn executed(&self) -> usize {
        self.steps.len() - self.skipped_count()
    }

    /// Failed steps
    #[must_use]
    pub fn failures(&self) -> Vec<&StepResult> {
        self.steps.iter().filter(|s| s.status.is_failed()).collect()
    }

    /// Step by name
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Every artifact written, in step order
    #[must_use]
    pub fn artifacts(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|s| s.artifact_path.as_deref())
            .collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let status = match self.status {
            ScenarioStatus::Completed => "completed",
            ScenarioStatus::Aborted => "aborted",
        };
        format!(
            "{}: {status} ({} passed, {} failed, {} skipped)",
            self.scenario,
            self.passed_count(),
            self.failed_count(),
            self.skipped_count()
        )
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// Reports of every scenario in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run id
    pub run_id: Uuid,
    /// Suite name
    pub suite: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Scenario reports, in submission order
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    /// Empty run report
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite: suite.into(),
            started_at: Utc::now(),
            scenarios: Vec::new(),
        }
    }

    /// Add a scenario report
    pub fn push(&mut self, report: ScenarioReport) {
        self.scenarios.push(report);
    }

    /// Scenario by name
    #[must_use]
    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.scenario == name)
    }

    /// Count completed scenarios
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.is_aborted()).count()
    }

    /// Count aborted scenarios
    #[must_use]
    pub fn aborted_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.is_aborted()).count()
    }

    /// Whether every scenario completed with every step passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::all_passed)
    }

    /// False when any scenario was cut short by a driver fault
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::is_complete)
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.scenarios.iter().map(|s| s.duration).sum()
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        let (passed, failed, skipped) = self.scenarios.iter().fold((0, 0, 0), |acc, s| {
            (
                acc.0 + s.passed_count(),
                acc.1 + s.failed_count(),
                acc.2 + s.skipped_count(),
            )
        });
        format!(
            "{}: {}/{} scenarios completed; \
             steps {passed} passed, {failed} failed, {skipped} skipped",
            self.suite,
            self.completed_count(),
            self.scenarios.len()
        )
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON report
    pub fn from_json(json: &str) -> HarnessResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render JUnit XML content: one testsuite per scenario, one testcase per step
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuites name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.suite),
            self.scenarios.iter().map(|s| s.steps.len()).sum::<usize>(),
            self.scenarios
                .iter()
                .map(ScenarioReport::failed_count)
                .sum::<usize>(),
            self.total_duration().as_secs_f64()
        ));
        xml.push('\n');

        for scenario in &self.scenarios {
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" \
                 skipped=\"{}\" time=\"{:.3}\" timestamp=\"{}\">",
                escape_xml(&scenario.scenario),
                scenario.steps.len(),
                scenario.failed_count(),
                scenario.skipped_count(),
                scenario.duration.as_secs_f64(),
                scenario.started_at.to_rfc3339()
            ));
            xml.push('\n');

            for step in &scenario.steps {
                xml.push_str(&format!(
                    r#"    <testcase classname="{}" name="{}" time="{:.3}">"#,
                    escape_xml(&scenario.scenario),
                    escape_xml(&step.name),
                    step.duration.as_secs_f64()
                ));
                xml.push('\n');
                match step.status {
                    StepStatus::Passed => {}
                    StepStatus::Failed => {
                        let kind = step.failure.map_or_else(String::new, |k| k.to_string());
                        xml.push_str(&format!(
                            r#"      <failure type="{}" message="{}">{}</failure>"#,
                            escape_xml(&kind),
                            escape_xml(&step.message),
                            escape_xml(&step.message)
                        ));
                        xml.push('\n');
                    }
                    StepStatus::Skipped => {
                        xml.push_str(&format!(
                            r#"      <skipped message="{}"/>"#,
                            escape_xml(&step.message)
                        ));
                        xml.push('\n');
                    }
                }
                if let Some(path) = &step.artifact_path {
                    xml.push_str(&format!(
                        "      <system-out>[[ATTACHMENT|{}]]</system-out>\n",
                        escape_xml(&path.display().to_string())
                    ));
                }
                xml.push_str("    </testcase>\n");
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    /// Render HTML report content.
    ///
    /// Screenshots of failed steps are embedded as base64 data URIs; ones
    /// that cannot be read are linked instead.
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::new();

        html.push_str(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>MovieVerse E2E Report</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 20px;
        }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .scenario { margin: 20px 0; }
        .scenario.aborted h2 { color: #d32f2f; }
        .step { padding: 10px; margin: 5px 0; border-radius: 4px; }
        .step.pass { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .step.fail { background: #ffebee; border-left: 4px solid #f44336; }
        .step.skip { background: #fff3e0; border-left: 4px solid #ff9800; }
        .error { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
        .step img { max-width: 480px; border: 1px solid #ddd; margin-top: 8px; }
    </style>
</head>
<body>
"#,
        );

        html.push_str(&format!(
            r#"<div class="summary">
    <h1>{}</h1>
    <p>{}</p>
    <p>Run {} started {}</p>
</div>
"#,
            escape_xml(&self.suite),
            escape_xml(&self.summary()),
            self.run_id,
            self.started_at.to_rfc3339()
        ));

        for scenario in &self.scenarios {
            let class = if scenario.is_aborted() {
                "aborted"
            } else {
                "completed"
            };
            html.push_str(&format!(
                "<div class=\"scenario {class}\">\n    <h2>{}</h2>\n",
                escape_xml(&scenario.summary())
            ));
            if let Some(error) = &scenario.driver_error {
                html.push_str(&format!(
                    "    <div class=\"error\">driver error: {}</div>\n",
                    escape_xml(&error.to_string())
                ));
            }

            for step in &scenario.steps {
                let class = match step.status {
                    StepStatus::Passed => "pass",
                    StepStatus::Failed => "fail",
                    StepStatus::Skipped => "skip",
                };
                html.push_str(&format!("    <div class=\"step {class}\">\n"));
                html.push_str(&format!(
                    "        <strong>{}. {}</strong> - {:?} ({:.2}ms)\n",
                    step.index + 1,
                    escape_xml(&step.name),
                    step.status,
                    step.duration.as_secs_f64() * 1000.0
                ));
                if !step.message.is_empty() {
                    html.push_str(&format!(
                        "        <div class=\"error\">{}</div>\n",
                        escape_xml(&step.message)
                    ));
                }
                if let Some(path) = &step.artifact_path {
                    html.push_str(&format!("        {}\n", screenshot_tag(path)));
                }
                html.push_str("    </div>\n");
            }
            html.push_str("</div>\n");
        }

        html.push_str(
            r#"
<footer>
    <p>Generated by movieverse-harness</p>
</footer>
</body>
</html>
"#,
        );

        html
    }

    /// Write `report.json`, `junit.xml` and `report.html` into `dir`
    pub async fn write_all(&self, dir: &Path) -> HarnessResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir).await?;
        let outputs = [
            (dir.join("report.json"), self.to_json()?),
            (dir.join("junit.xml"), self.render_junit()),
            (dir.join("report.html"), self.render_html()),
        ];
        let mut written = Vec::with_capacity(outputs.len());
        for (path, content) in outputs {
            tokio::fs::write(&path, content).await?;
            written.push(path);
        }
        tracing::info!(dir = %dir.display(), "reports written");
        Ok(written)
    }
}

fn screenshot_tag(path: &Path) -> String {
    let alt = escape_xml(&path.display().to_string());
    match std::fs::read(path) {
        Ok(bytes) => format!(
            r#"<img alt="{alt}" src="data:image/png;base64,{}">"#,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ),
        Err(_) => format!(r#"<a href="{alt}">{alt}</a>"#),
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn search_report() -> ScenarioReport {
        let mut report = ScenarioReport::new("search: spider", vec!["search".into()]);
        report.push(StepResult::passed(0, "resolve search box", Duration::from_millis(4)));
        report.push(StepResult::passed(1, "fill Spider", Duration::from_millis(2)));
        report.push(
            StepResult::failed(
                2,
                "results shown",
                FailureKind::AssertionFailed,
                "expected count >= 1, got 0",
                Duration::from_millis(9),
            )
            .with_artifact("screenshots/search-spider-02-results-shown.png"),
        );
        report
    }

    mod step_result_tests {
        use super::*;

        #[test]
        fn test_constructors() {
            let passed = StepResult::passed(0, "a", Duration::from_millis(1));
            assert!(passed.status.is_passed());
            assert!(passed.failure.is_none());

            let failed = StepResult::failed(1, "b", FailureKind::TimedOut, "slow", Duration::ZERO);
            assert!(failed.status.is_failed());
            assert_eq!(failed.failure, Some(FailureKind::TimedOut));

            let skipped = StepResult::skipped(2, "c", "aborted");
            assert!(skipped.status.is_skipped());
            assert_eq!(skipped.message, "aborted");
        }

        #[test]
        fn test_json_shape() {
            let step = StepResult::failed(
                3,
                "logo visible",
                FailureKind::NotFound,
                "no match",
                Duration::from_millis(12),
            );
            let json = serde_json::to_value(&step).unwrap();
            assert_eq!(json["status"], "failed");
            assert_eq!(json["failure"], "not_found");
            assert_eq!(json["duration_ms"], 12);
            assert!(json.get("artifact_path").is_none());
        }

        #[test]
        fn test_failure_kind_display() {
            assert_eq!(FailureKind::DeadlineExceeded.to_string(), "deadline exceeded");
        }
    }

    mod scenario_report_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let mut report = search_report();
            report.push(StepResult::skipped(3, "d", "aborted"));
            assert_eq!(report.passed_count(), 2);
            assert_eq!(report.failed_count(), 1);
            assert_eq!(report.skipped_count(), 1);
            assert_eq!(report.executed(), 3);
            assert_eq!(report.failures()[0].name, "results shown");
            assert_eq!(report.artifacts().len(), 1);
        }

        #[test]
        fn test_completion() {
            let mut report = search_report();
            assert!(report.is_complete());
            assert!(!report.all_passed());
            report.driver_error = Some(DriverError::Disconnected {
                message: "gone".into(),
            });
            report.abort();
            assert!(!report.is_complete());
            assert!(report.is_aborted());
        }

        #[test]
        fn test_summary() {
            assert_eq!(
                search_report().summary(),
                "search: spider: completed (2 passed, 1 failed, 0 skipped)"
            );
        }
    }

    mod run_report_tests {
        use super::*;

        fn run() -> RunReport {
            let mut run = RunReport::new("movieverse");
            run.push(search_report());
            let mut logo = ScenarioReport::new("homepage <logo>", Vec::new());
            logo.push(StepResult::passed(0, "logo visible", Duration::from_millis(3)));
            run.push(logo);
            run
        }

        #[test]
        fn test_summary() {
            assert_eq!(
                run().summary(),
                "movieverse: 2/2 scenarios completed; steps 3 passed, 1 failed, 0 skipped"
            );
        }

        #[test]
        fn test_json_round_trip() {
            let run = run();
            let back = RunReport::from_json(&run.to_json().unwrap()).unwrap();
            assert_eq!(back.run_id, run.run_id);
            assert_eq!(back.scenarios.len(), 2);
            assert_eq!(back.scenarios[0].steps[2].failure, Some(FailureKind::AssertionFailed));
        }

        #[test]
        fn test_render_junit() {
            let xml = run().render_junit();
            assert!(xml.contains(r#"<testsuites name="movieverse" tests="4" failures="1""#));
            assert!(xml.contains(r#"<testsuite name="homepage &lt;logo&gt;""#));
            assert!(xml.contains(r#"<failure type="assertion failed""#));
            assert!(xml.contains("[[ATTACHMENT|screenshots/search-spider-02-results-shown.png]]"));
        }

        #[test]
        fn test_render_html_embeds_screenshot() {
            let temp = tempfile::tempdir().unwrap();
            let shot = temp.path().join("failure.png");
            std::fs::write(&shot, b"\x89PNG").unwrap();
            let mut run = run();
            run.scenarios[0].steps[2].artifact_path = Some(shot);
            let html = run.render_html();
            assert!(html.contains("data:image/png;base64,iVBORw=="));
            assert!(html.contains("step fail"));
        }

        #[test]
        fn test_render_html_links_missing_screenshot() {
            let html = run().render_html();
            assert!(html.contains(r#"<a href="screenshots/search-spider-02-results-shown.png">"#));
        }

        #[tokio::test]
        async fn test_write_all() {
            let temp = tempfile::tempdir().unwrap();
            let written = run().write_all(&temp.path().join("reports")).await.unwrap();
            assert_eq!(written.len(), 3);
            assert!(written.iter().all(|p| p.exists()));
        }
    }
}
