//! Chromium driver over the DevTools protocol (feature `browser`).
//!
//! Each [`ChromiumDriver`] launches its own browser process, so drivers
//! opened by [`ChromiumFactory`] never share cookies, storage or routes.
//!
//! Elements are located with small page scripts that tag every match with
//! a `data-mv-id` attribute; the attribute value is the handle id. Ids
//! carry a per-document token, so a handle from an earlier document never
//! resolves against a new one.
//!
//! Network traffic is observed through the `Network` domain. Routes are
//! enforced through the `Fetch` domain, enabled on the first `route` call,
//! with decisions taken by the same [`RouteTable`] the mock driver uses.

use crate::driver::{BrowserDriver, DriverConfig, DriverFactory, ElementHandle};
use crate::network::{AbortReason, NetworkEvent, Route, RouteAction, RouteTable};
use crate::result::{DriverError, DriverResult};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams, FulfillRequestParams, HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, ErrorReason, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Helpers every locator script starts with
const PRELUDE: &str = r#"
const mv = window.__mv || (window.__mv = { doc: Math.random().toString(36).slice(2), next: 0 });
const mark = (e) => {
  if (!e.dataset.mvId) { mv.next += 1; e.dataset.mvId = mv.doc + '-' + mv.next; }
  return { id: e.dataset.mvId, tag: e.tagName.toLowerCase() };
};
const smallest = (test) => [...document.querySelectorAll('body *')]
  .filter((e) => test(e.textContent || '')
    && ![...e.children].some((c) => test(c.textContent || '')));
const byId = (id) => document.querySelector('[data-mv-id="' + id + '"]');
"#;

const BY_TEXT: &str =
    "return smallest((t) => t.toLowerCase().includes(arg.toLowerCase())).map(mark);";

const BY_CSS: &str = "return [...document.querySelectorAll(arg)].map(mark);";

const BY_ROLE: &str = r#"
const implicit = {
  button: 'button,input[type=button],input[type=submit]',
  link: 'a[href]',
  heading: 'h1,h2,h3,h4,h5,h6',
  textbox: 'input:not([type]),input[type=text],input[type=search],textarea',
  searchbox: 'input[type=search]',
  img: 'img',
  navigation: 'nav',
  dialog: 'dialog',
};
const selector = '[role="' + arg.role + '"]' + (implicit[arg.role] ? ',' + implicit[arg.role] : '');
const label = (e) => (e.getAttribute('aria-label') || e.getAttribute('alt')
  || e.getAttribute('placeholder') || e.textContent || '').toLowerCase();
return [...document.querySelectorAll(selector)]
  .filter((e) => arg.name === null || label(e).includes(arg.name.toLowerCase()))
  .map(mark);
"#;

const BY_REGEX: &str =
    "const re = new RegExp(arg.source, arg.flags); return smallest((t) => re.test(t)).map(mark);";

const IS_VISIBLE: &str = r#"
const e = byId(arg);
if (!e) return null;
const style = getComputedStyle(e);
return style.visibility !== 'hidden' && style.display !== 'none' && e.getClientRects().length > 0;
"#;

const TEXT_CONTENT: &str =
    "const e = byId(arg); return e ? (e.innerText ?? e.textContent ?? '') : null;";

const FILL: &str = r#"
const e = byId(arg.id);
if (!e) return null;
const proto = e instanceof HTMLTextAreaElement
  ? HTMLTextAreaElement.prototype
  : HTMLInputElement.prototype;
Object.getOwnPropertyDescriptor(proto, 'value').set.call(e, arg.text);
e.dispatchEvent(new Event('input', { bubbles: true }));
e.dispatchEvent(new Event('change', { bubbles: true }));
return true;
"#;

const SCROLL: &str = r#"
const e = byId(arg.id);
if (!e) return null;
e.scrollLeft += arg.dx;
e.scrollTop += arg.dy;
return true;
"#;

const READY_STATE: &str = "document.readyState";

fn script(body: &str, arg: &Value) -> String {
    format!("(() => {{ {PRELUDE} const arg = {arg}; {body} }})()")
}

/// Split a leading `(?i)` into a JavaScript flag
fn js_regex(pattern: &str) -> Value {
    match pattern.strip_prefix("(?i)") {
        Some(source) => json!({ "source": source, "flags": "i" }),
        None => json!({ "source": pattern, "flags": "" }),
    }
}

fn error_reason(reason: AbortReason) -> ErrorReason {
    match reason {
        AbortReason::Failed => ErrorReason::Failed,
        AbortReason::Aborted => ErrorReason::Aborted,
        AbortReason::TimedOut => ErrorReason::TimedOut,
        AbortReason::ConnectionRefused => ErrorReason::ConnectionRefused,
        AbortReason::InternetDisconnected => ErrorReason::InternetDisconnected,
        AbortReason::BlockedByClient => ErrorReason::BlockedByClient,
    }
}

fn abort_reason(error_text: &str) -> AbortReason {
    [
        AbortReason::Aborted,
        AbortReason::TimedOut,
        AbortReason::ConnectionRefused,
        AbortReason::InternetDisconnected,
        AbortReason::BlockedByClient,
    ]
    .into_iter()
    .find(|reason| error_text.contains(reason.message()))
    .unwrap_or(AbortReason::Failed)
}

fn script_error(e: impl std::fmt::Display) -> DriverError {
    DriverError::ScriptFailed {
        message: e.to_string(),
    }
}

fn input_error(e: impl std::fmt::Display) -> DriverError {
    DriverError::InputFailed {
        message: e.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Traffic seen by the `Network` listeners
#[derive(Debug, Default)]
struct NetworkState {
    log: Vec<NetworkEvent>,
    /// request id to URL
    in_flight: HashMap<String, String>,
}

/// Browser driver backed by a dedicated Chromium process
#[derive(Debug)]
pub struct ChromiumDriver {
    config: DriverConfig,
    browser: CdpBrowser,
    page: Option<CdpPage>,
    network: Arc<Mutex<NetworkState>>,
    routes: Arc<Mutex<RouteTable>>,
    intercepting: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page
    pub async fn launch(config: &DriverConfig) -> DriverResult<Self> {
        let launch_failed = |e: &dyn std::fmt::Display| DriverError::LaunchFailed {
            message: e.to_string(),
        };

        let mut builder = CdpConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .request_timeout(config.navigation_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ua) = &config.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        let cdp_config = builder.build().map_err(|e| launch_failed(&e))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| launch_failed(&e))?;
        let mut tasks = vec![tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        })];

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| launch_failed(&e))?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.viewport_width),
            i64::from(config.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| launch_failed(&e))?;
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(|e| launch_failed(&e))?;

        let network = Arc::new(Mutex::new(NetworkState::default()));
        tasks.extend(Self::observe(&page, &network).await?);
        tracing::info!(
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            "chromium launched"
        );

        Ok(Self {
            config: config.clone(),
            browser,
            page: Some(page),
            network,
            routes: Arc::new(Mutex::new(RouteTable::new())),
            intercepting: false,
            tasks,
        })
    }

    /// Configuration the browser was launched with
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Spawn the listeners feeding the network log
    async fn observe(
        page: &CdpPage,
        network: &Arc<Mutex<NetworkState>>,
    ) -> DriverResult<Vec<JoinHandle<()>>> {
        let listen_failed = |e: &dyn std::fmt::Display| DriverError::LaunchFailed {
            message: format!("network listener: {e}"),
        };
        let mut sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| listen_failed(&e))?;
        let mut received = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| listen_failed(&e))?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| listen_failed(&e))?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| listen_failed(&e))?;

        let state = Arc::clone(network);
        let on_sent = tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                let mut state = lock(&state);
                state
                    .in_flight
                    .insert(event.request_id.inner().clone(), event.request.url.clone());
                state.log.push(NetworkEvent::Request {
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                });
            }
        });
        let state = Arc::clone(network);
        let on_received = tokio::spawn(async move {
            while let Some(event) = received.next().await {
                lock(&state).log.push(NetworkEvent::Response {
                    url: event.response.url.clone(),
                    status: u16::try_from(event.response.status).unwrap_or(0),
                });
            }
        });
        let state = Arc::clone(network);
        let on_failed = tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                let mut state = lock(&state);
                let url = state
                    .in_flight
                    .remove(event.request_id.inner())
                    .unwrap_or_default();
                state.log.push(NetworkEvent::Failed {
                    url,
                    reason: abort_reason(&event.error_text),
                });
            }
        });
        let state = Arc::clone(network);
        let on_finished = tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                lock(&state).in_flight.remove(event.request_id.inner());
            }
        });
        Ok(vec![on_sent, on_received, on_failed, on_finished])
    }

    /// Turn on request interception and answer paused requests from the route table
    async fn intercept(&mut self) -> DriverResult<()> {
        let page = self.page()?.clone();
        page.execute(FetchEnableParams::default())
            .await
            .map_err(|e| DriverError::Unsupported {
                operation: format!("route: {e}"),
            })?;
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(script_error)?;
        let routes = Arc::clone(&self.routes);
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let action = lock(&routes).decide(&event.request.url);
                let id = event.request_id.clone();
                let outcome = match action {
                    RouteAction::Continue => {
                        page.execute(ContinueRequestParams::new(id)).await.map(|_| ())
                    }
                    RouteAction::Abort(reason) => page
                        .execute(FailRequestParams::new(id, error_reason(reason)))
                        .await
                        .map(|_| ()),
                    RouteAction::Fulfill(response) => {
                        let params = FulfillRequestParams::builder()
                            .request_id(id)
                            .response_code(i64::from(response.status))
                            .response_header(HeaderEntry::new(
                                "Content-Type",
                                response.content_type.clone(),
                            ))
                            .body(base64::engine::general_purpose::STANDARD.encode(&response.body))
                            .build();
                        match params {
                            Ok(params) => page.execute(params).await.map(|_| ()),
                            Err(message) => {
                                tracing::warn!(%message, "invalid fulfil response");
                                continue;
                            }
                        }
                    }
                };
                if let Err(error) = outcome {
                    tracing::warn!(url = %event.request.url, %error, "paused request not answered");
                }
            }
        }));
        self.intercepting = true;
        Ok(())
    }

    fn page(&self) -> DriverResult<&CdpPage> {
        self.page.as_ref().ok_or_else(|| DriverError::Disconnected {
            message: "page already closed".to_string(),
        })
    }

    async fn eval(&self, expression: String) -> DriverResult<Value> {
        let result = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(script_error)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn query(&self, body: &str, arg: Value) -> DriverResult<Vec<ElementHandle>> {
        let value = self.eval(script(body, &arg)).await?;
        serde_json::from_value(value).map_err(script_error)
    }

    /// Run an element script; `null` means the element is gone
    async fn on_element(
        &self,
        element: &ElementHandle,
        body: &str,
        arg: Value,
    ) -> DriverResult<Value> {
        match self.eval(script(body, &arg)).await? {
            Value::Null => Err(DriverError::Detached {
                id: element.id.clone(),
            }),
            value => Ok(value),
        }
    }

    async fn find(&self, element: &ElementHandle) -> DriverResult<chromiumoxide::element::Element> {
        self.page()?
            .find_element(format!("[data-mv-id=\"{}\"]", element.id))
            .await
            .map_err(|_| DriverError::Detached {
                id: element.id.clone(),
            })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        let page = self.page()?;
        let navigation = page.goto(url);
        match tokio::time::timeout(self.config.navigation_timeout, navigation).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(DriverError::NavigationFailed {
                url: url.to_string(),
                message: format!(
                    "timed out after {}ms",
                    self.config.navigation_timeout.as_millis()
                ),
            }),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        let url = self.page()?.url().await.map_err(script_error)?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> DriverResult<String> {
        let title = self.page()?.get_title().await.map_err(script_error)?;
        Ok(title.unwrap_or_default())
    }

    async fn by_text(&self, text: &str) -> DriverResult<Vec<ElementHandle>> {
        self.query(BY_TEXT, json!(text)).await
    }

    async fn by_css(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        self.query(BY_CSS, json!(selector)).await
    }

    async fn by_role(&self, role: &str, name: Option<&str>) -> DriverResult<Vec<ElementHandle>> {
        self.query(BY_ROLE, json!({ "role": role, "name": name })).await
    }

    async fn by_regex(&self, pattern: &str) -> DriverResult<Vec<ElementHandle>> {
        self.query(BY_REGEX, js_regex(pattern)).await
    }

    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool> {
        let value = self.on_element(element, IS_VISIBLE, json!(element.id)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, element: &ElementHandle) -> DriverResult<String> {
        let value = self.on_element(element, TEXT_CONTENT, json!(element.id)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let target = self.find(element).await?;
        target.click().await.map_err(input_error)?;
        Ok(())
    }

    async fn fill(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        self.on_element(element, FILL, json!({ "id": element.id, "text": text }))
            .await
            .map(|_| ())
    }

    async fn press(&mut self, element: &ElementHandle, key: &str) -> DriverResult<()> {
        let target = self.find(element).await?;
        target.focus().await.map_err(input_error)?;
        target.press_key(key).await.map_err(input_error)?;
        Ok(())
    }

    async fn scroll(&mut self, element: &ElementHandle, dx: i32, dy: i32) -> DriverResult<()> {
        self.on_element(element, SCROLL, json!({ "id": element.id, "dx": dx, "dy": dy }))
            .await
            .map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.eval(script.to_string()).await
    }

    async fn set_viewport_size(&mut self, width: u32, height: u32) -> DriverResult<()> {
        self.page()?
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(width),
                i64::from(height),
                1.0,
                false,
            ))
            .await
            .map_err(input_error)?;
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        Ok(())
    }

    async fn network_idle(&self) -> DriverResult<bool> {
        if !lock(&self.network).in_flight.is_empty() {
            return Ok(false);
        }
        let ready = self.eval(READY_STATE.to_string()).await?;
        Ok(ready.as_str() == Some("complete"))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot = self
            .page()?
            .execute(params)
            .await
            .map_err(|e| DriverError::ScreenshotFailed {
                message: e.to_string(),
            })?;
        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| DriverError::ScreenshotFailed {
                message: e.to_string(),
            })
    }

    async fn route(&mut self, route: Route) -> DriverResult<()> {
        tracing::debug!(pattern = %route.pattern, "route installed");
        lock(&self.routes).add(route);
        if !self.intercepting {
            self.intercept().await?;
        }
        Ok(())
    }

    async fn network_log(&self) -> DriverResult<Vec<NetworkEvent>> {
        Ok(lock(&self.network).log.clone())
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let Some(page) = self.page.take() {
            if let Err(error) = page.close().await {
                tracing::debug!(%error, "page close failed");
            }
        }
        let closed = self.browser.close().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed.map(|_| ()).map_err(|e| DriverError::Disconnected {
            message: e.to_string(),
        })
    }
}

/// Opens one Chromium process per driver
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumFactory;

#[async_trait]
impl DriverFactory for ChromiumFactory {
    type Driver = ChromiumDriver;

    async fn open(&self, config: &DriverConfig) -> DriverResult<ChromiumDriver> {
        ChromiumDriver::launch(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_regex_flags() {
        assert_eq!(
            js_regex(r"(?i)\d+.*temporada"),
            json!({ "source": r"\d+.*temporada", "flags": "i" })
        );
        assert_eq!(js_regex("season"), json!({ "source": "season", "flags": "" }));
    }

    #[test]
    fn test_abort_reason_from_error_text() {
        assert_eq!(abort_reason("net::ERR_CONNECTION_REFUSED"), AbortReason::ConnectionRefused);
        assert_eq!(abort_reason("net::ERR_NAME_NOT_RESOLVED"), AbortReason::Failed);
    }

    #[test]
    fn test_script_embeds_argument() {
        let source = script(BY_CSS, &json!("input[placeholder*=\"Buscar\"]"));
        assert!(source.starts_with("(() => {"));
        assert!(source.contains(r#"const arg = "input[placeholder*=\"Buscar\"]";"#));
        assert!(source.ends_with("})()"));
    }
}
