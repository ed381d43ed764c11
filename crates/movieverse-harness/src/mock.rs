//! Scripted driver for tests.
//!
//! `MockDriver` simulates just enough of a browser to exercise every harness
//! path without Chromium: pages keyed by URL pattern, elements with text,
//! roles and CSS selectors, click/Enter reactions, changes scheduled on a
//! shared [`Clock`], interception routes feeding a network log, and
//! one-shot injected faults.
//!
//! Clones share state, so a test can keep a clone while the runner owns
//! the driver.

use crate::clock::{Clock, ManualClock};
use crate::driver::{BrowserDriver, ElementHandle, INNER_WIDTH_SCRIPT, SCROLL_WIDTH_SCRIPT};
use crate::network::{NetworkEvent, Route, RouteAction, RouteTable, UrlPattern};
use crate::result::{DriverError, DriverResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// PNG signature returned as screenshot payload
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// What happens when an element is clicked or receives Enter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReaction {
    /// Load another page
    Navigate(String),
    /// Load a page built from a template; `{value}` is the input's value
    NavigateWithValue(String),
    /// Make elements answering the key visible
    Show(String),
    /// Hide elements answering the key
    Hide(String),
}

/// A change applied to the live document
#[derive(Debug, Clone)]
pub enum MockChange {
    /// Make elements answering the key visible
    Show(String),
    /// Hide elements answering the key
    Hide(String),
    /// Append an element
    Insert(MockElement),
    /// Remove elements answering the key
    Remove(String),
    /// Load another page
    Navigate(String),
    /// Change the URL without reloading the document
    SetUrl(String),
    /// Flip the network-idle signal
    NetworkIdle(bool),
}

/// Element template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    tag: String,
    text: String,
    selectors: Vec<String>,
    role: Option<String>,
    name: Option<String>,
    visible: bool,
    on_click: Vec<MockReaction>,
    on_key: Vec<(String, MockReaction)>,
}

impl MockElement {
    /// Visible element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: String::new(),
            selectors: Vec::new(),
            role: None,
            name: None,
            visible: true,
            on_click: Vec::new(),
            on_key: Vec::new(),
        }
    }

    /// Set text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a CSS selector this element answers to
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Set the ARIA role
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the accessible name (defaults to the text)
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// React to clicks
    #[must_use]
    pub fn on_click(mut self, reaction: MockReaction) -> Self {
        self.on_click.push(reaction);
        self
    }

    /// Clicking loads `url`
    #[must_use]
    pub fn navigates_to(self, url: impl Into<String>) -> Self {
        self.on_click(MockReaction::Navigate(url.into()))
    }

    /// React to a key press while focused
    #[must_use]
    pub fn on_key(mut self, key: impl Into<String>, reaction: MockReaction) -> Self {
        self.on_key.push((key.into(), reaction));
        self
    }

    /// React to Enter
    #[must_use]
    pub fn on_enter(self, reaction: MockReaction) -> Self {
        self.on_key("Enter", reaction)
    }

    fn answers(&self, key: &str) -> bool {
        self.tag == key
            || self.selectors.iter().any(|s| s == key)
            || (!self.text.is_empty() && contains_ignore_case(&self.text, key))
    }

    fn accessible_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.text)
    }
}

/// Page template served for URLs matching a pattern
#[derive(Debug, Clone)]
pub struct MockPage {
    pattern: UrlPattern,
    title: String,
    elements: Vec<MockElement>,
    requests: Vec<String>,
    delayed: Vec<(Duration, MockChange)>,
    busy_for: Duration,
    min_width: u32,
}

impl MockPage {
    /// Empty page for URLs matching `pattern`
    #[must_use]
    pub fn new(pattern: UrlPattern) -> Self {
        Self {
            pattern,
            title: String::new(),
            elements: Vec::new(),
            requests: Vec::new(),
            delayed: Vec::new(),
            busy_for: Duration::ZERO,
            min_width: 0,
        }
    }

    /// Document title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Element present at load
    #[must_use]
    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Request issued while loading
    #[must_use]
    pub fn request(mut self, url: impl Into<String>) -> Self {
        self.requests.push(url.into());
        self
    }

    /// Change applied `after` the page loaded
    #[must_use]
    pub fn after(mut self, after: Duration, change: MockChange) -> Self {
        self.delayed.push((after, change));
        self
    }

    /// Network stays busy for `duration` after load
    #[must_use]
    pub const fn busy_for(mut self, duration: Duration) -> Self {
        self.busy_for = duration;
        self
    }

    /// Content width that does not shrink below `px`
    #[must_use]
    pub const fn min_width(mut self, px: u32) -> Self {
        self.min_width = px;
        self
    }
}

#[derive(Debug, Clone)]
struct LiveElement {
    id: String,
    template: MockElement,
    visible: bool,
    value: String,
    scroll: (i64, i64),
}

#[derive(Debug)]
struct MockState {
    pages: Vec<MockPage>,
    url: String,
    title: String,
    min_width: u32,
    elements: Vec<LiveElement>,
    next_id: u64,
    /// `(due, change, tied to the current document)`
    scheduled: Vec<(Duration, MockChange, bool)>,
    routes: RouteTable,
    log: Vec<NetworkEvent>,
    idle: bool,
    viewport: (u32, u32),
    scripts: HashMap<String, serde_json::Value>,
    faults: HashMap<String, DriverError>,
    history: Vec<String>,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            url: "about:blank".to_string(),
            title: String::new(),
            min_width: 0,
            elements: Vec::new(),
            next_id: 0,
            scheduled: Vec::new(),
            routes: RouteTable::new(),
            log: Vec::new(),
            idle: true,
            viewport: (1920, 1080),
            scripts: HashMap::new(),
            faults: HashMap::new(),
            history: Vec::new(),
            closed: false,
        }
    }
}

impl MockState {
    fn apply_due(&mut self, now: Duration) {
        loop {
            let due = self
                .scheduled
                .iter()
                .enumerate()
                .filter(|(_, (at, _, _))| *at <= now)
                .min_by_key(|(_, (at, _, _))| *at)
                .map(|(index, _)| index);
            match due {
                Some(index) => {
                    let (_, change, _) = self.scheduled.remove(index);
                    self.apply(change, now);
                }
                None => break,
            }
        }
    }

    fn apply(&mut self, change: MockChange, now: Duration) {
        match change {
            MockChange::Show(key) => self.set_visible(&key, true),
            MockChange::Hide(key) => self.set_visible(&key, false),
            MockChange::Insert(template) => {
                let live = self.materialize(template);
                self.elements.push(live);
            }
            MockChange::Remove(key) => self.elements.retain(|e| !e.template.answers(&key)),
            MockChange::Navigate(url) => self.load(&url, now),
            MockChange::SetUrl(url) => self.url = url,
            MockChange::NetworkIdle(idle) => self.idle = idle,
        }
    }

    fn set_visible(&mut self, key: &str, visible: bool) {
        for element in self.elements.iter_mut().filter(|e| e.template.answers(key)) {
            element.visible = visible;
        }
    }

    fn materialize(&mut self, template: MockElement) -> LiveElement {
        self.next_id += 1;
        LiveElement {
            id: format!("el-{}", self.next_id),
            visible: template.visible,
            template,
            value: String::new(),
            scroll: (0, 0),
        }
    }

    fn load(&mut self, url: &str, now: Duration) {
        self.url = url.to_string();
        // pending document changes belong to the previous document
        self.scheduled.retain(|(_, _, document)| !document);
        let page = self.pages.iter().find(|p| p.pattern.matches(url)).cloned();
        let Some(page) = page else {
            self.title = String::new();
            self.min_width = 0;
            self.elements.clear();
            self.idle = true;
            return;
        };

        self.title = page.title.clone();
        self.min_width = page.min_width;
        let mut elements = Vec::with_capacity(page.elements.len());
        for template in page.elements {
            elements.push(self.materialize(template));
        }
        self.elements = elements;
        for (after, change) in page.delayed {
            self.scheduled.push((now + after, change, true));
        }
        if page.busy_for.is_zero() {
            self.idle = true;
        } else {
            self.idle = false;
            self.scheduled
                .push((now + page.busy_for, MockChange::NetworkIdle(true), true));
        }
        for request in page.requests {
            self.issue_request(&request);
        }
    }

    fn issue_request(&mut self, url: &str) {
        self.log.push(NetworkEvent::Request {
            url: url.to_string(),
            method: "GET".to_string(),
        });
        let event = match self.routes.decide(url) {
            RouteAction::Continue => NetworkEvent::Response {
                url: url.to_string(),
                status: 200,
            },
            RouteAction::Abort(reason) => NetworkEvent::Failed {
                url: url.to_string(),
                reason,
            },
            RouteAction::Fulfill(response) => NetworkEvent::Response {
                url: url.to_string(),
                status: response.status,
            },
        };
        self.log.push(event);
    }

    fn element(&self, handle: &ElementHandle) -> DriverResult<&LiveElement> {
        self.elements
            .iter()
            .find(|e| e.id == handle.id)
            .ok_or_else(|| DriverError::Detached {
                id: handle.id.clone(),
            })
    }

    fn element_mut(&mut self, handle: &ElementHandle) -> DriverResult<&mut LiveElement> {
        self.elements
            .iter_mut()
            .find(|e| e.id == handle.id)
            .ok_or_else(|| DriverError::Detached {
                id: handle.id.clone(),
            })
    }

    fn handles<F>(&self, predicate: F) -> Vec<ElementHandle>
    where
        F: Fn(&MockElement) -> bool,
    {
        self.elements
            .iter()
            .filter(|e| predicate(&e.template))
            .map(|e| ElementHandle::new(e.id.clone(), e.template.tag.clone()))
            .collect()
    }

    fn react(&mut self, reactions: Vec<MockReaction>, value: &str, now: Duration) {
        for reaction in reactions {
            let change = match reaction {
                MockReaction::Navigate(url) => MockChange::Navigate(url),
                MockReaction::NavigateWithValue(template) => {
                    MockChange::Navigate(template.replace("{value}", &value.replace(' ', "%20")))
                }
                MockReaction::Show(key) => MockChange::Show(key),
                MockReaction::Hide(key) => MockChange::Hide(key),
            };
            self.apply(change, now);
        }
    }
}

/// Scripted browser driver for unit and integration tests
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Blank driver with its own manual clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            clock: Arc::new(ManualClock::new()),
        }
    }

    /// Share a clock with the runner so scheduled changes follow its time
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serve `page` for matching URLs
    #[must_use]
    pub fn page(self, page: MockPage) -> Self {
        self.lock().pages.push(page);
        self
    }

    /// Answer `script` with `value`
    #[must_use]
    pub fn script(self, script: impl Into<String>, value: serde_json::Value) -> Self {
        self.set_script_result(script, value);
        self
    }

    /// Answer `script` with `value`
    pub fn set_script_result(&self, script: impl Into<String>, value: serde_json::Value) {
        self.lock().scripts.insert(script.into(), value);
    }

    /// Apply `change` once the clock reaches `at`
    pub fn schedule(&self, at: Duration, change: MockChange) {
        self.lock().scheduled.push((at, change, false));
    }

    /// Make the next call to `operation` fail with `error`
    pub fn fail_next(&self, operation: &str, error: DriverError) {
        self.lock().faults.insert(operation.to_string(), error);
    }

    /// Issue a request from the current page (e.g. lazy-loaded content)
    pub fn fire_request(&self, url: &str) {
        self.lock().issue_request(url);
    }

    /// Recorded calls, e.g. `"goto:http://..."`, `"click:el-3"`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(method))
    }

    /// Value last filled into the first element answering `key`
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.template.answers(key))
            .map(|e| e.value.clone())
    }

    /// Scroll offset of the first element answering `key`
    #[must_use]
    pub fn scroll_of(&self, key: &str) -> Option<(i64, i64)> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.template.answers(key))
            .map(|e| e.scroll)
    }

    /// Current viewport size
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        self.lock().viewport
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock, apply due changes, record the call and consume any injected fault
    fn enter(&self, operation: &str, detail: &str) -> DriverResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.apply_due(self.clock.now());
        state.history.push(if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}:{detail}")
        });
        if let Some(error) = state.faults.remove(operation) {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        let now = self.clock.now();
        let mut state = self.enter("goto", url)?;
        state.load(url, now);
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let mut state = self.lock();
        state.apply_due(self.clock.now());
        Ok(state.url.clone())
    }

    async fn title(&self) -> DriverResult<String> {
        let state = self.enter("title", "")?;
        Ok(state.title.clone())
    }

    async fn by_text(&self, text: &str) -> DriverResult<Vec<ElementHandle>> {
        let state = self.enter("by_text", text)?;
        Ok(state.handles(|e| contains_ignore_case(&e.text, text)))
    }

    async fn by_css(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let state = self.enter("by_css", selector)?;
        Ok(state.handles(|e| e.tag == selector || e.selectors.iter().any(|s| s == selector)))
    }

    async fn by_role(&self, role: &str, name: Option<&str>) -> DriverResult<Vec<ElementHandle>> {
        let state = self.enter("by_role", role)?;
        Ok(state.handles(|e| {
            e.role.as_deref() == Some(role)
                && name.map_or(true, |n| contains_ignore_case(e.accessible_name(), n))
        }))
    }

    async fn by_regex(&self, pattern: &str) -> DriverResult<Vec<ElementHandle>> {
        let state = self.enter("by_regex", pattern)?;
        let re = regex::Regex::new(pattern).map_err(|e| DriverError::ScriptFailed {
            message: e.to_string(),
        })?;
        Ok(state.handles(|e| re.is_match(&e.text)))
    }

    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool> {
        let state = self.enter("is_visible", &element.id)?;
        Ok(state.element(element)?.visible)
    }

    async fn text_content(&self, element: &ElementHandle) -> DriverResult<String> {
        let state = self.enter("text_content", &element.id)?;
        Ok(state.element(element)?.template.text.clone())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let now = self.clock.now();
        let mut state = self.enter("click", &element.id)?;
        let target = state.element(element)?;
        let reactions = target.template.on_click.clone();
        let value = target.value.clone();
        state.react(reactions, &value, now);
        Ok(())
    }

    async fn fill(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        let mut state = self.enter("fill", &element.id)?;
        state.element_mut(element)?.value = text.to_string();
        Ok(())
    }

    async fn press(&mut self, element: &ElementHandle, key: &str) -> DriverResult<()> {
        let now = self.clock.now();
        let mut state = self.enter("press", key)?;
        let target = state.element(element)?;
        let reactions: Vec<MockReaction> = target
            .template
            .on_key
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, reaction)| reaction.clone())
            .collect();
        let value = target.value.clone();
        state.react(reactions, &value, now);
        Ok(())
    }

    async fn scroll(&mut self, element: &ElementHandle, dx: i32, dy: i32) -> DriverResult<()> {
        let mut state = self.enter("scroll", &element.id)?;
        let target = state.element_mut(element)?;
        target.scroll.0 += i64::from(dx);
        target.scroll.1 += i64::from(dy);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        let state = self.enter("evaluate", script)?;
        if let Some(value) = state.scripts.get(script) {
            return Ok(value.clone());
        }
        match script {
            INNER_WIDTH_SCRIPT => Ok(serde_json::json!(state.viewport.0)),
            SCROLL_WIDTH_SCRIPT => Ok(serde_json::json!(state.viewport.0.max(state.min_width))),
            "document.title" => Ok(serde_json::json!(state.title)),
            _ => Err(DriverError::ScriptFailed {
                message: format!("no scripted result for {script:?}"),
            }),
        }
    }

    async fn set_viewport_size(&mut self, width: u32, height: u32) -> DriverResult<()> {
        let mut state = self.enter("set_viewport_size", &format!("{width}x{height}"))?;
        state.viewport = (width, height);
        Ok(())
    }

    async fn network_idle(&self) -> DriverResult<bool> {
        let state = self.enter("network_idle", "")?;
        Ok(state.idle)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let state = self.enter("screenshot", "")?;
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(&state.viewport.0.to_be_bytes());
        png.extend_from_slice(&state.viewport.1.to_be_bytes());
        Ok(png)
    }

    async fn route(&mut self, route: Route) -> DriverResult<()> {
        let mut state = self.enter("route", &route.pattern.to_string())?;
        state.routes.add(route);
        Ok(())
    }

    async fn network_log(&self) -> DriverResult<Vec<NetworkEvent>> {
        let state = self.enter("network_log", "")?;
        Ok(state.log.clone())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let mut state = self.enter("close", "")?;
        state.closed = true;
        Ok(())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AbortReason, RoutePolicy};

    const HOME: &str = "http://localhost:5173/";

    fn home() -> MockPage {
        MockPage::new(UrlPattern::Exact(HOME.into()))
            .title("MovieVerse")
            .element(MockElement::new("span").text("MovIA").selector(".logo"))
            .element(
                MockElement::new("input")
                    .selector(r#"input[placeholder*="Buscar"]"#)
                    .role("searchbox")
                    .name("Buscar películas")
                    .on_enter(MockReaction::NavigateWithValue(
                        "http://localhost:5173/search?q={value}".into(),
                    )),
            )
            .element(MockElement::new("div").text("Trailer").selector(".modal").hidden())
            .element(
                MockElement::new("button")
                    .text("Ver tráiler")
                    .role("button")
                    .on_click(MockReaction::Show(".modal".into())),
            )
    }

    #[tokio::test]
    async fn test_goto_loads_matching_page() {
        let mut driver = MockDriver::new().page(home());
        driver.goto(HOME).await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), HOME);
        assert_eq!(driver.title().await.unwrap(), "MovieVerse");
        assert_eq!(driver.by_text("movia").await.unwrap().len(), 1);
        assert!(driver.was_called("goto"));
    }

    #[tokio::test]
    async fn test_unknown_url_is_blank() {
        let mut driver = MockDriver::new().page(home());
        driver.goto("http://localhost:5173/nowhere").await.unwrap();
        assert!(driver.by_css("span").await.unwrap().is_empty());
        assert_eq!(driver.title().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_role_lookup_uses_accessible_name() {
        let mut driver = MockDriver::new().page(home());
        driver.goto(HOME).await.unwrap();
        assert_eq!(
            driver
                .by_role("searchbox", Some("buscar"))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(driver
            .by_role("searchbox", Some("series"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(driver.by_role("button", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fill_and_enter_navigates_with_value() {
        let mut driver = MockDriver::new().page(home());
        driver.goto(HOME).await.unwrap();
        let input = driver.by_css("input").await.unwrap().remove(0);
        driver.fill(&input, "Spider Man").await.unwrap();
        assert_eq!(driver.value_of("input").as_deref(), Some("Spider Man"));
        driver.press(&input, "Enter").await.unwrap();
        assert_eq!(
            driver.current_url().await.unwrap(),
            "http://localhost:5173/search?q=Spider%20Man"
        );
    }

    #[tokio::test]
    async fn test_click_shows_modal() {
        let mut driver = MockDriver::new().page(home());
        driver.goto(HOME).await.unwrap();
        let modal = driver.by_css(".modal").await.unwrap().remove(0);
        assert!(!driver.is_visible(&modal).await.unwrap());
        let button = driver.by_text("Ver tráiler").await.unwrap().remove(0);
        driver.click(&button).await.unwrap();
        assert!(driver.is_visible(&modal).await.unwrap());
    }

    #[tokio::test]
    async fn test_handles_detach_after_navigation() {
        let mut driver = MockDriver::new().page(home());
        driver.goto(HOME).await.unwrap();
        let logo = driver.by_text("MovIA").await.unwrap().remove(0);
        driver.goto(HOME).await.unwrap();
        let err = driver.is_visible(&logo).await.unwrap_err();
        assert!(matches!(err, DriverError::Detached { .. }));
    }

    #[tokio::test]
    async fn test_delayed_change_follows_shared_clock() {
        let clock = ManualClock::new();
        let mut driver = MockDriver::new()
            .with_clock(Arc::new(clock.clone()))
            .page(home().after(
                Duration::from_millis(300),
                MockChange::Insert(MockElement::new("img").selector("img")),
            ));
        driver.goto(HOME).await.unwrap();
        assert!(driver.by_css("img").await.unwrap().is_empty());
        clock.advance_ms(299);
        assert!(driver.by_css("img").await.unwrap().is_empty());
        clock.advance_ms(1);
        assert_eq!(driver.by_css("img").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_page_becomes_idle() {
        let clock = ManualClock::new();
        let mut driver = MockDriver::new()
            .with_clock(Arc::new(clock.clone()))
            .page(home().busy_for(Duration::from_millis(500)));
        driver.goto(HOME).await.unwrap();
        assert!(!driver.network_idle().await.unwrap());
        clock.advance_ms(500);
        assert!(driver.network_idle().await.unwrap());
    }

    #[tokio::test]
    async fn test_routes_shape_network_log() {
        let mut driver = MockDriver::new().page(
            home()
                .request("https://api.themoviedb.org/3/trending/movie/week?api_key=k")
                .request("https://api.themoviedb.org/3/movie/popular?api_key=k"),
        );
        driver
            .route(Route::new(
                UrlPattern::glob("**/api.themoviedb.org/**"),
                RoutePolicy::AbortEveryNth {
                    n: 2,
                    reason: AbortReason::Failed,
                },
            ))
            .await
            .unwrap();
        driver.goto(HOME).await.unwrap();
        let log = driver.network_log().await.unwrap();
        assert_eq!(log.len(), 4);
        assert!(matches!(log[1], NetworkEvent::Response { status: 200, .. }));
        assert!(matches!(log[3], NetworkEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn test_layout_scripts_follow_viewport() {
        let mut driver = MockDriver::new().page(home().min_width(400));
        driver.goto(HOME).await.unwrap();
        driver.set_viewport_size(390, 844).await.unwrap();
        assert_eq!(
            driver.evaluate(INNER_WIDTH_SCRIPT).await.unwrap(),
            serde_json::json!(390)
        );
        assert_eq!(
            driver.evaluate(SCROLL_WIDTH_SCRIPT).await.unwrap(),
            serde_json::json!(400)
        );
        assert!(driver.evaluate("window.foo").await.is_err());
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let mut driver = MockDriver::new().page(home());
        driver.fail_next(
            "goto",
            DriverError::Disconnected {
                message: "crashed".into(),
            },
        );
        assert!(driver.goto(HOME).await.is_err());
        assert!(driver.goto(HOME).await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mut driver = MockDriver::new().page(home());
        let shared = driver.clone();
        driver.goto(HOME).await.unwrap();
        driver.close().await.unwrap();
        assert!(shared.is_closed());
        assert!(shared.history().iter().any(|c| c == &format!("goto:{HOME}")));
    }

    #[tokio::test]
    async fn test_screenshot_is_png() {
        let driver = MockDriver::new();
        let png = driver.screenshot().await.unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }
}
