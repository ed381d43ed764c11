//! Network request interception and observation.
//!
//! Scenarios install [`Route`]s to abort or fulfil requests (for example
//! failing every second TMDB call) and assert on the [`NetworkEvent`] log
//! the driver records.

use serde::{Deserialize, Serialize};

/// Reasons for aborting a network request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Request failed
    #[default]
    Failed,
    /// Request was aborted
    Aborted,
    /// Request timed out
    TimedOut,
    /// Connection was refused
    ConnectionRefused,
    /// Internet is disconnected
    InternetDisconnected,
    /// Request was blocked by client
    BlockedByClient,
}

impl AbortReason {
    /// Get the error message for this abort reason
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Failed => "net::ERR_FAILED",
            Self::Aborted => "net::ERR_ABORTED",
            Self::TimedOut => "net::ERR_TIMED_OUT",
            Self::ConnectionRefused => "net::ERR_CONNECTION_REFUSED",
            Self::InternetDisconnected => "net::ERR_INTERNET_DISCONNECTED",
            Self::BlockedByClient => "net::ERR_BLOCKED_BY_CLIENT",
        }
    }
}

/// Canned response used to fulfil an intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code
    pub status: u16,
    /// Content type header
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Response body
    #[serde(default)]
    pub body: String,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl MockResponse {
    /// JSON response with the given status
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: default_content_type(),
            body: body.to_string(),
        }
    }

    /// Error response with a plain-text message
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: message.to_string(),
        }
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/api.themoviedb.org/**")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Substring pattern
    #[must_use]
    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    /// Glob pattern
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Regex source when this is a regex pattern
    #[must_use]
    pub fn regex_source(&self) -> Option<&str> {
        match self {
            Self::Regex(pattern) => Some(pattern),
            _ => None,
        }
    }

    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();

        let mut pos = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if let Some(found) = url[pos..].find(part) {
                if i == 0 && found != 0 {
                    return false;
                }
                pos += found + part.len();
            } else {
                return false;
            }
        }

        // a trailing '*' accepts any remainder
        pattern.ends_with('*') || pos == url.len()
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "exact:{s}"),
            Self::Prefix(s) => write!(f, "prefix:{s}"),
            Self::Contains(s) => write!(f, "contains:{s}"),
            Self::Regex(s) => write!(f, "regex:{s}"),
            Self::Glob(s) => write!(f, "glob:{s}"),
            Self::Any => write!(f, "*"),
        }
    }
}

/// What to do with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Let the request through
    Continue,
    /// Fail the request
    Abort(AbortReason),
    /// Answer with a canned response
    Fulfill(MockResponse),
}

/// Declarative interception behaviour for a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutePolicy {
    /// Observe only
    Continue,
    /// Abort every matching request
    AbortAll {
        /// Failure reported to the page
        #[serde(default)]
        reason: AbortReason,
    },
    /// Abort the n-th, 2n-th, ... matching request and let the rest through
    AbortEveryNth {
        /// Period
        n: usize,
        /// Failure reported to the page
        #[serde(default)]
        reason: AbortReason,
    },
    /// Fulfil every matching request
    Fulfill {
        /// Canned response
        response: MockResponse,
    },
}

/// An installed interception rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// URL pattern the rule applies to
    pub pattern: UrlPattern,
    /// Behaviour for matching requests
    pub policy: RoutePolicy,
    /// Number of requests this route has seen
    #[serde(skip)]
    seen: usize,
}

impl Route {
    /// Create a new route
    #[must_use]
    pub const fn new(pattern: UrlPattern, policy: RoutePolicy) -> Self {
        Self {
            pattern,
            policy,
            seen: 0,
        }
    }

    /// Number of requests matched so far
    #[must_use]
    pub const fn seen(&self) -> usize {
        self.seen
    }

    /// Decide the fate of a request, or `None` if the route does not apply
    pub fn decide(&mut self, url: &str) -> Option<RouteAction> {
        if !self.pattern.matches(url) {
            return None;
        }
        self.seen += 1;
        let action = match &self.policy {
            RoutePolicy::Continue => RouteAction::Continue,
            RoutePolicy::AbortAll { reason } => RouteAction::Abort(*reason),
            RoutePolicy::AbortEveryNth { n, reason } => {
                if *n > 0 && self.seen % n == 0 {
                    RouteAction::Abort(*reason)
                } else {
                    RouteAction::Continue
                }
            }
            RoutePolicy::Fulfill { response } => RouteAction::Fulfill(response.clone()),
        };
        Some(action)
    }
}

/// Ordered set of routes; the first matching route wins
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a route
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Decide the fate of a request
    pub fn decide(&mut self, url: &str) -> RouteAction {
        self.routes
            .iter_mut()
            .find_map(|route| route.decide(url))
            .unwrap_or(RouteAction::Continue)
    }

    /// Installed routes
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of installed routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are installed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Observed network activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetworkEvent {
    /// A request was issued
    Request {
        /// Request URL
        url: String,
        /// HTTP method
        method: String,
    },
    /// A response arrived
    Response {
        /// Request URL
        url: String,
        /// HTTP status
        status: u16,
    },
    /// A request failed or was aborted
    Failed {
        /// Request URL
        url: String,
        /// Failure reason
        reason: AbortReason,
    },
}

impl NetworkEvent {
    /// URL the event refers to
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Request { url, .. } | Self::Response { url, .. } | Self::Failed { url, .. } => {
                url
            }
        }
    }
}

/// Requests in `log` whose URL matches `pattern`
pub fn requests_matching<'a>(
    log: &'a [NetworkEvent],
    pattern: &'a UrlPattern,
) -> impl Iterator<Item = &'a str> + 'a {
    log.iter().filter_map(move |event| match event {
        NetworkEvent::Request { url, .. } if pattern.matches(url) => Some(url.as_str()),
        _ => None,
    })
}

/// Responses in `log` whose URL matches `pattern`, as `(url, status)`
pub fn responses_matching<'a>(
    log: &'a [NetworkEvent],
    pattern: &'a UrlPattern,
) -> impl Iterator<Item = (&'a str, u16)> + 'a {
    log.iter().filter_map(move |event| match event {
        NetworkEvent::Response { url, status } if pattern.matches(url) => {
            Some((url.as_str(), *status))
        }
        _ => None,
    })
}
