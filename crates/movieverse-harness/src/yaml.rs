//! YAML reading and writing for scenarios, matchers and config.
//!
//! Values pass through a `serde_json::Value`, so externally tagged enums
//! read and write as plain `variant: value` maps rather than YAML `!tags`.
//! Flattened step kinds only round-trip in that form.

use crate::result::HarnessResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse YAML into `T`
pub fn from_str<T: DeserializeOwned>(yaml: &str) -> HarnessResult<T> {
    let value: serde_json::Value = serde_yaml_ng::from_str(yaml)?;
    Ok(serde_json::from_value(value)?)
}

/// Render `value` as YAML
pub fn to_string<T: Serialize>(value: &T) -> HarnessResult<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_yaml_ng::to_string(&value)?)
}
