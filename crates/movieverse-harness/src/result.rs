//! Result and error types for the harness.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Transport or crash-level faults reported by the browser driver.
///
/// These are never retried by the harness and always abort the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverError {
    /// Browser could not be launched
    #[error("Failed to launch browser: {message}")]
    LaunchFailed {
        /// Error message
        message: String,
    },

    /// Navigation failed at the transport level
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation failed
    #[error("Script evaluation failed: {message}")]
    ScriptFailed {
        /// Error message
        message: String,
    },

    /// The element handle no longer exists in the page
    #[error("Element {id} is detached from the document")]
    Detached {
        /// Handle id
        id: String,
    },

    /// Input could not be delivered
    #[error("Input failed: {message}")]
    InputFailed {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    ScreenshotFailed {
        /// Error message
        message: String,
    },

    /// Connection to the browser was lost
    #[error("Browser disconnected: {message}")]
    Disconnected {
        /// Error message
        message: String,
    },

    /// The driver does not implement this capability
    #[error("Unsupported driver operation: {operation}")]
    Unsupported {
        /// Operation name
        operation: String,
    },
}

/// Errors that can occur in the harness outside of scenario execution
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Driver fault
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration is invalid
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario definition is invalid
    #[error("Invalid scenario '{scenario}': {message}")]
    InvalidScenario {
        /// Scenario name
        scenario: String,
        /// Error message
        message: String,
    },

    /// Regex pattern does not compile
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}
