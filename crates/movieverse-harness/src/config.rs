//! Harness configuration.
//!
//! Loaded from YAML (`movieverse-harness.yaml` by convention) and then
//! overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `MOVIEVERSE_BASE_URL` | `base_url` |
//! | `MOVIEVERSE_ARTIFACT_DIR` | `artifact_dir` |
//! | `MOVIEVERSE_DEADLINE_MS` | `scenario_deadline` |
//! | `MOVIEVERSE_HEADLESS` | `driver.headless` |

use crate::driver::DriverConfig;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::WaitPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default MovieVerse dev server
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Default directory for screenshots
pub const DEFAULT_ARTIFACT_DIR: &str = "screenshots";

/// Default scenario wall-clock ceiling (60 seconds)
pub const DEFAULT_SCENARIO_DEADLINE_MS: u64 = 60_000;

/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "MOVIEVERSE_BASE_URL";
/// Environment variable overriding the artifact directory
pub const ENV_ARTIFACT_DIR: &str = "MOVIEVERSE_ARTIFACT_DIR";
/// Environment variable overriding the scenario deadline
pub const ENV_DEADLINE_MS: &str = "MOVIEVERSE_DEADLINE_MS";
/// Environment variable overriding headless mode
pub const ENV_HEADLESS: &str = "MOVIEVERSE_HEADLESS";

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub base_url: String,
    /// Directory receiving screenshots
    pub artifact_dir: PathBuf,
    /// Wait policy used when a wait step does not set its own
    pub wait: WaitPolicy,
    /// Wall-clock ceiling per scenario (`None` disables it)
    #[serde(with = "option_duration_ms")]
    pub scenario_deadline: Option<Duration>,
    /// Capture a screenshot when an assertion fails
    pub capture_on_failure: bool,
    /// Browser settings
    pub driver: DriverConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            wait: WaitPolicy::default(),
            scenario_deadline: Some(Duration::from_millis(DEFAULT_SCENARIO_DEADLINE_MS)),
            capture_on_failure: true,
            driver: DriverConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        let config: Self = crate::yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> HarnessResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(dir) = lookup(ENV_ARTIFACT_DIR) {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup(ENV_DEADLINE_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| HarnessError::Config {
                message: format!("{ENV_DEADLINE_MS} must be milliseconds, got {ms:?}"),
            })?;
            self.scenario_deadline = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(flag) = lookup(ENV_HEADLESS) {
            self.driver.headless = !matches!(flag.trim(), "0" | "false" | "no");
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set the default wait policy
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Set the scenario deadline
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.scenario_deadline = deadline;
        self
    }

    /// Enable or disable failure screenshots
    #[must_use]
    pub const fn with_capture_on_failure(mut self, enabled: bool) -> Self {
        self.capture_on_failure = enabled;
        self
    }

    /// Set the driver configuration
    #[must_use]
    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Resolve a scenario URL against the base URL.
    ///
    /// Absolute URLs pass through untouched.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("about:")
        {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = url.trim_start_matches('/');
        if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}")
        }
    }

    fn validate(&self) -> HarnessResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(HarnessError::Config {
                message: format!("base_url must be http(s), got {:?}", self.base_url),
            });
        }
        if self.wait.poll.is_zero() {
            return Err(HarnessError::Config {
                message: "wait.poll must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Serialize a `Duration` as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Write milliseconds
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    /// Read milliseconds
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serialize an optional `Duration` as integer milliseconds
pub mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Write milliseconds, or null when unset
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    /// Read milliseconds; null means unset
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
