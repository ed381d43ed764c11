//! Abstract browser driver.
//!
//! The harness never talks to a browser directly. Everything it needs from
//! one goes through [`BrowserDriver`], so scenarios run unchanged against
//! the CDP-backed `ChromiumDriver` (feature `browser`) or the scripted
//! [`MockDriver`](crate::MockDriver) used in tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ScenarioRunner ──► PageHandle ──► dyn BrowserDriver          │
//! │                                      ├── ChromiumDriver (CDP) │
//! │                                      └── MockDriver (tests)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::network::{NetworkEvent, Route};
use crate::result::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Script answering the rendered document width
pub const SCROLL_WIDTH_SCRIPT: &str = "document.body.scrollWidth";

/// Script answering the layout viewport width
pub const INNER_WIDTH_SCRIPT: &str = "window.innerWidth";

/// Opaque reference to one element inside the current document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
    /// Element tag name
    pub tag: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
        }
    }
}

/// Browser configuration for driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Timeout for a single navigation
    #[serde(with = "crate::config::duration_ms")]
    pub navigation_timeout: Duration,
    /// Executable path override
    pub executable_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: None,
            navigation_timeout: Duration::from_secs(30),
            executable_path: None,
            sandbox: true,
        }
    }
}

impl DriverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Disable the sandbox (containers/CI)
    #[must_use]
    pub const fn no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Viewport preset for responsive checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Device name
    pub name: &'static str,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Is mobile device
    pub is_mobile: bool,
}

impl DeviceDescriptor {
    /// iPhone 12/13/14
    pub const IPHONE: Self = Self {
        name: "iPhone",
        viewport_width: 390,
        viewport_height: 844,
        is_mobile: true,
    };

    /// iPad portrait
    pub const IPAD: Self = Self {
        name: "iPad",
        viewport_width: 768,
        viewport_height: 1024,
        is_mobile: true,
    };

    /// Desktop 1080p
    pub const DESKTOP: Self = Self {
        name: "Desktop",
        viewport_width: 1920,
        viewport_height: 1080,
        is_mobile: false,
    };

    /// Devices swept by the multi-device journey
    pub const ALL: [Self; 3] = [Self::IPHONE, Self::IPAD, Self::DESKTOP];

    /// Convert to driver config
    #[must_use]
    pub fn to_config(&self) -> DriverConfig {
        DriverConfig::default().viewport(self.viewport_width, self.viewport_height)
    }
}

/// Capability set the harness needs from a browser.
///
/// Locating never waits: each `by_*` call reports what matches right now,
/// possibly nothing. Handles returned by the `by_*` calls are valid until
/// the next navigation.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to URL and wait for the load event
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    /// Current document URL
    async fn current_url(&self) -> DriverResult<String>;

    /// Current document title
    async fn title(&self) -> DriverResult<String>;

    /// Elements whose text contains `text` (case-insensitive)
    async fn by_text(&self, text: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Elements matching a CSS selector
    async fn by_css(&self, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Elements with an ARIA role, optionally filtered by accessible name
    async fn by_role(&self, role: &str, name: Option<&str>) -> DriverResult<Vec<ElementHandle>>;

    /// Elements whose text matches a regular expression
    async fn by_regex(&self, pattern: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Whether the element is rendered and visible
    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool>;

    /// Text content of the element
    async fn text_content(&self, element: &ElementHandle) -> DriverResult<String>;

    /// Click the element
    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Replace the value of an input element
    async fn fill(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Press a key while the element has focus
    async fn press(&mut self, element: &ElementHandle, key: &str) -> DriverResult<()>;

    /// Scroll the element's content by the given offsets
    async fn scroll(&mut self, element: &ElementHandle, dx: i32, dy: i32) -> DriverResult<()>;

    /// Evaluate a JavaScript expression in the page
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Resize the viewport
    async fn set_viewport_size(&mut self, width: u32, height: u32) -> DriverResult<()>;

    /// Whether the page currently has no network activity in flight
    async fn network_idle(&self) -> DriverResult<bool>;

    /// Capture the viewport as PNG bytes
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Install a request interception route
    async fn route(&mut self, route: Route) -> DriverResult<()>;

    /// Requests and responses observed so far
    async fn network_log(&self) -> DriverResult<Vec<NetworkEvent>>;

    /// Release the browser context
    async fn close(&mut self) -> DriverResult<()>;
}

/// Opens isolated browser contexts, one per concurrently running scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Driver type produced by this factory
    type Driver: BrowserDriver + 'static;

    /// Open a fresh, isolated driver
    async fn open(&self, config: &DriverConfig) -> DriverResult<Self::Driver>;
}
