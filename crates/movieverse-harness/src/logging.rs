//! Tracing subscriber setup.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the level
//! passed in. `LogFormat::Json` emits one JSON object per event, which is
//! what CI log collectors want.

use crate::result::{HarnessError, HarnessResult};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive
pub const DEFAULT_FILTER: &str = "info";

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse `pretty` / `json` (case-insensitive)
    pub fn parse(value: &str) -> HarnessResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(HarnessError::Config {
                message: format!("unknown log format {other:?}"),
            }),
        }
    }
}

/// Build the filter: `RUST_LOG` first, then `default_level`
pub fn filter(default_level: &str) -> HarnessResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|e| HarnessError::Config {
        message: format!("invalid log filter {default_level:?}: {e}"),
    })
}

/// Install the global subscriber.
///
/// Fails if one is already installed.
pub fn try_init(format: LogFormat, default_level: &str) -> HarnessResult<()> {
    let filter = filter(default_level)?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| HarnessError::Config {
        message: format!("tracing subscriber already installed: {e}"),
    })
}

/// Install the default subscriber, ignoring a second call
pub fn init() {
    let _ = try_init(LogFormat::Pretty, DEFAULT_FILTER);
}
