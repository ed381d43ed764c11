//! Locator Resolver.
//!
//! A [`LocatorSpec`] describes one logical element as an ordered fallback
//! chain of strategies, e.g. "the search box is `input[placeholder*=Buscar]`,
//! or failing that `input[type=search]`". [`resolve`] tries them in order and
//! reports the first that matches *right now*.
//!
//! # Design Philosophy
//!
//! - **No implicit waiting**: resolving is a snapshot; waiting is the job of
//!   [`crate::wait`]
//! - **No-match is data**: [`Resolution::NotFound`], never an error
//! - **Epoch-tagged**: an [`ElementRef`] is only valid for the navigation
//!   epoch it was resolved in

use crate::driver::{BrowserDriver, ElementHandle};
use crate::page::PageHandle;
use crate::result::{DriverResult, HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};

/// One way of finding an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Text content contains the value (case-insensitive)
    Text(String),
    /// CSS selector
    Css(String),
    /// ARIA role with optional accessible name
    Role {
        /// Role name, e.g. `button`
        role: String,
        /// Accessible name filter
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Text content matches a regular expression
    Regex(String),
}

impl Strategy {
    /// Ask the driver for elements matching this strategy
    pub async fn locate(&self, driver: &dyn BrowserDriver) -> DriverResult<Vec<ElementHandle>> {
        match self {
            Self::Text(text) => driver.by_text(text).await,
            Self::Css(selector) => driver.by_css(selector).await,
            Self::Role { role, name } => driver.by_role(role, name.as_deref()).await,
            Self::Regex(pattern) => driver.by_regex(pattern).await,
        }
    }

    /// Reject strategies that can never match (invalid regex, empty value)
    pub fn validate(&self) -> HarnessResult<()> {
        match self {
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| HarnessError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                }),
            Self::Text(value) | Self::Css(value) | Self::Role { role: value, .. }
                if value.trim().is_empty() =>
            {
                Err(HarnessError::InvalidPattern {
                    pattern: self.to_string(),
                    message: "empty locator value".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "text={s}"),
            Self::Css(s) => write!(f, "css={s}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
            Self::Regex(s) => write!(f, "regex=/{s}/"),
        }
    }
}

/// Ordered fallback chain describing one logical element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorSpec {
    /// Strategies, tried in order
    pub strategies: Vec<Strategy>,
    /// Keep only the first matching element
    #[serde(default)]
    pub first: bool,
}

impl LocatorSpec {
    /// Spec with a single strategy
    #[must_use]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategies: vec![strategy],
            first: false,
        }
    }

    /// Text locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Strategy::Text(text.into()))
    }

    /// CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css(selector.into()))
    }

    /// Role locator
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(Strategy::Role {
            role: role.into(),
            name: name.map(str::to_string),
        })
    }

    /// Regex locator
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Regex(pattern.into()))
    }

    /// Append a fallback strategy
    #[must_use]
    pub fn or(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Append a text fallback
    #[must_use]
    pub fn or_text(self, text: impl Into<String>) -> Self {
        self.or(Strategy::Text(text.into()))
    }

    /// Append a CSS fallback
    #[must_use]
    pub fn or_css(self, selector: impl Into<String>) -> Self {
        self.or(Strategy::Css(selector.into()))
    }

    /// Append a regex fallback
    #[must_use]
    pub fn or_regex(self, pattern: impl Into<String>) -> Self {
        self.or(Strategy::Regex(pattern.into()))
    }

    /// Keep only the first matching element
    #[must_use]
    pub const fn first(mut self) -> Self {
        self.first = true;
        self
    }

    /// Validate every strategy
    pub fn validate(&self) -> HarnessResult<()> {
        if self.strategies.is_empty() {
            return Err(HarnessError::InvalidPattern {
                pattern: String::new(),
                message: "locator has no strategies".to_string(),
            });
        }
        self.strategies.iter().try_for_each(Strategy::validate)
    }
}

impl std::fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, strategy) in self.strategies.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{strategy}")?;
        }
        if self.first {
            f.write_str(" >> first")?;
        }
        Ok(())
    }
}

/// Elements resolved from a spec at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    spec: LocatorSpec,
    handles: Vec<ElementHandle>,
    strategy_index: usize,
    epoch: u64,
}

impl ElementRef {
    /// Spec this reference was resolved from
    #[must_use]
    pub const fn spec(&self) -> &LocatorSpec {
        &self.spec
    }

    /// Matched elements, in document order
    #[must_use]
    pub fn handles(&self) -> &[ElementHandle] {
        &self.handles
    }

    /// Element acted upon
    #[must_use]
    pub fn primary(&self) -> Option<&ElementHandle> {
        self.handles.first()
    }

    /// Number of matched elements
    #[must_use]
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Index of the strategy that matched
    #[must_use]
    pub const fn strategy_index(&self) -> usize {
        self.strategy_index
    }

    /// Strategy that matched
    #[must_use]
    pub fn strategy(&self) -> Option<&Strategy> {
        self.spec.strategies.get(self.strategy_index)
    }

    /// Navigation epoch this reference belongs to
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the page navigated since resolution
    #[must_use]
    pub fn is_stale(&self, page: &PageHandle) -> bool {
        self.epoch != page.epoch()
    }
}

/// Outcome of resolving a spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// At least one strategy matched
    Found(ElementRef),
    /// No strategy matched
    NotFound,
}

impl Resolution {
    /// Whether something matched
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Matched reference, if any
    #[must_use]
    pub fn found(self) -> Option<ElementRef> {
        match self {
            Self::Found(element) => Some(element),
            Self::NotFound => None,
        }
    }

    /// Number of elements matched (zero when not found)
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Found(element) => element.count(),
            Self::NotFound => 0,
        }
    }
}

/// Resolve `spec` against the current document.
///
/// Strategies are tried in declared order and the first yielding at least
/// one element wins. Only driver faults are errors.
pub async fn resolve(spec: &LocatorSpec, page: &PageHandle) -> DriverResult<Resolution> {
    for (index, strategy) in spec.strategies.iter().enumerate() {
        let mut handles = strategy.locate(page.driver()).await?;
        if handles.is_empty() {
            continue;
        }
        if spec.first {
            handles.truncate(1);
        }
        tracing::trace!(locator = %spec, strategy = %strategy, count = handles.len(), "resolved");
        return Ok(Resolution::Found(ElementRef {
            spec: spec.clone(),
            handles,
            strategy_index: index,
            epoch: page.epoch(),
        }));
    }
    tracing::trace!(locator = %spec, "no strategy matched");
    Ok(Resolution::NotFound)
}
