//! W3C WebDriver backend over fantoccini.
//!
//! Used for Firefox, Edge and Safari locally (through a spawned
//! [`DriverService`]) and for every backend when a remote endpoint is set.

#![allow(clippy::missing_errors_doc)]

use super::service::DriverService;
use super::{
    ensure_uncovered, Driver, ElementHandle, HandleRegistry, KeyInput, ScrollBlock, HIT_TEST_JS,
    SET_VALUE_JS,
};
use crate::locator::{NativeQuery, Query};
use crate::result::{HarnessError, HarnessResult};
use crate::session::{Backend, SessionConfig, WINDOW_SIZE};
use fantoccini::actions::{InputSource, MouseActions, PointerAction, MOUSE_BUTTON_LEFT};
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Browser driven through a WebDriver endpoint
pub struct WebDriverDriver {
    runtime: Runtime,
    client: Client,
    endpoint: String,
    elements: HandleRegistry<Element>,
    service: Option<DriverService>,
}

impl fmt::Debug for WebDriverDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDriverDriver")
            .field("endpoint", &self.endpoint)
            .field("elements", &self.elements.len())
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

fn wd_error(err: impl fmt::Display) -> HarnessError {
    HarnessError::driver(format!("webdriver: {err}"))
}

/// Whether the endpoint rejected a click because another element would receive it
fn is_intercepted(err: &CmdError) -> bool {
    err.to_string().to_lowercase().contains("intercepted")
}

/// Empty list for no-such-element; every other failure is a driver error
fn found_or_error(found: Result<Vec<Element>, CmdError>) -> HarnessResult<Vec<Element>> {
    match found {
        Ok(found) => Ok(found),
        Err(err) if err.is_no_such_element() => Ok(Vec::new()),
        Err(err) => Err(wd_error(err)),
    }
}

/// Result of a pointer press followed by `release_actions`.
///
/// A failed release leaves input state on the session, so it fails the
/// action; when the press already failed, the press error wins.
fn pointer_outcome(
    performed: Result<(), CmdError>,
    released: Result<(), CmdError>,
) -> HarnessResult<()> {
    match (performed, released) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(err)) => Err(wd_error(format!("releasing pointer state: {err}"))),
        (Err(err), released) => {
            if let Err(release_err) = released {
                tracing::warn!(error = %release_err, "pointer release after failed press");
            }
            if is_intercepted(&err) {
                Err(HarnessError::intercepted(err.to_string()))
            } else {
                Err(wd_error(err))
            }
        }
    }
}

fn runtime(backend: Backend) -> HarnessResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("staycheck-webdriver")
        .enable_all()
        .build()
        .map_err(|e| HarnessError::SessionStartup {
            backend: backend.to_string(),
            message: e.to_string(),
        })
}

/// Capabilities requesting `config.backend`, headless when asked
#[must_use]
pub fn capabilities(config: &SessionConfig) -> Map<String, Value> {
    let (width, height) = WINDOW_SIZE;
    let mut caps = Map::new();
    let browser_name = match config.backend {
        Backend::Chrome => "chrome",
        Backend::Firefox => "firefox",
        Backend::Edge => "MicrosoftEdge",
        Backend::Safari => "safari",
    };
    caps.insert("browserName".to_string(), json!(browser_name));

    match config.backend {
        Backend::Chrome | Backend::Edge => {
            let mut args = vec![
                format!("--window-size={width},{height}"),
                "--disable-dev-shm-usage".to_string(),
            ];
            if config.headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
            }
            let key = if config.backend == Backend::Chrome {
                "goog:chromeOptions"
            } else {
                "ms:edgeOptions"
            };
            caps.insert(key.to_string(), json!({ "args": args }));
        }
        Backend::Firefox => {
            let mut args = vec![format!("--width={width}"), format!("--height={height}")];
            if config.headless {
                args.push("-headless".to_string());
            }
            caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
        }
        Backend::Safari => {}
    }
    caps
}

impl WebDriverDriver {
    /// Start the local driver executable for `config.backend` and connect to it
    pub fn launch(config: &SessionConfig) -> HarnessResult<Self> {
        let runtime = runtime(config.backend)?;
        let service = DriverService::start(config.backend, &runtime)?;
        let endpoint = service.endpoint();
        Self::open(runtime, &endpoint, config, Some(service)).map_err(|err| match err {
            HarnessError::RemoteConnection { message, .. } => HarnessError::SessionStartup {
                backend: config.backend.to_string(),
                message,
            },
            other => other,
        })
    }

    /// Open a session on an existing endpoint, taking ownership of `service` if given
    pub fn connect(
        endpoint: &str,
        config: &SessionConfig,
        service: Option<DriverService>,
    ) -> HarnessResult<Self> {
        let runtime = runtime(config.backend)?;
        Self::open(runtime, endpoint, config, service)
    }

    fn open(
        runtime: Runtime,
        endpoint: &str,
        config: &SessionConfig,
        service: Option<DriverService>,
    ) -> HarnessResult<Self> {
        let caps = capabilities(config);
        let client = runtime
            .block_on(ClientBuilder::rustls()?.capabilities(caps).connect(endpoint))
            .map_err(|e| HarnessError::RemoteConnection {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(
            endpoint,
            backend = %config.backend,
            headless = config.headless,
            "webdriver session opened"
        );
        Ok(Self {
            runtime,
            client,
            endpoint: endpoint.to_string(),
            elements: HandleRegistry::default(),
            service,
        })
    }

    fn hit_test(&self, element: &ElementHandle) -> HarnessResult<()> {
        let covering = self.script(element, HIT_TEST_JS, Vec::new())?;
        ensure_uncovered(element, &covering)
    }

    fn block<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn element(&self, handle: &ElementHandle) -> HarnessResult<&Element> {
        self.elements
            .get(handle)
            .ok_or_else(|| wd_error(format!("stale element {} ({})", handle.id, handle.source)))
    }

    /// Execute `body` with the element bound to `el` and extra arguments after it
    fn script(&self, handle: &ElementHandle, body: &str, extra: Vec<Value>) -> HarnessResult<Value> {
        let element = self.element(handle)?;
        let mut args = vec![serde_json::to_value(element)?];
        args.extend(extra);
        let script = format!("const el = arguments[0]; {body}");
        self.block(self.client.execute(&script, args)).map_err(wd_error)
    }
}

impl Driver for WebDriverDriver {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.elements.clear();
        self.block(self.client.goto(url))
            .map_err(|e| HarnessError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn current_url(&mut self) -> HarnessResult<String> {
        Ok(self
            .block(self.client.current_url())
            .map_err(wd_error)?
            .to_string())
    }

    fn title(&mut self) -> HarnessResult<String> {
        self.block(self.client.title()).map_err(wd_error)
    }

    fn page_source(&mut self) -> HarnessResult<String> {
        self.block(self.client.source()).map_err(wd_error)
    }

    fn find_all(
        &mut self,
        query: &Query,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Vec<ElementHandle>> {
        let native = query.to_native();
        let locator = match &native {
            NativeQuery::Css(css) => Locator::Css(css),
            NativeQuery::XPath(xpath) => Locator::XPath(xpath),
        };
        let found = match within {
            None => self.block(self.client.find_all(locator)),
            Some(parent) => {
                let parent = self.element(parent)?;
                self.block(parent.find_all(locator))
            }
        };
        let found = found_or_error(found)?;
        Ok(self.elements.register(query, within, found))
    }

    fn is_displayed(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        let element = self.element(element)?;
        self.block(element.is_displayed()).map_err(wd_error)
    }

    fn is_enabled(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        let element = self.element(element)?;
        self.block(element.is_enabled()).map_err(wd_error)
    }

    fn text(&mut self, element: &ElementHandle) -> HarnessResult<String> {
        let element = self.element(element)?;
        self.block(element.text()).map_err(wd_error)
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> HarnessResult<Option<String>> {
        let element = self.element(element)?;
        if name == "value" {
            return self.block(element.prop(name)).map_err(wd_error);
        }
        self.block(element.attr(name)).map_err(wd_error)
    }

    fn click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.hit_test(element)?;
        let target = self.element(element)?;
        match self.block(target.click()) {
            Ok(()) => Ok(()),
            Err(err) if is_intercepted(&err) => Err(HarnessError::intercepted(err.to_string())),
            Err(err) => Err(wd_error(err)),
        }
    }

    fn pointer_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.scroll_into_view(element, ScrollBlock::End)?;
        self.hit_test(element)?;
        let target = self.element(element)?.clone();
        let actions = MouseActions::new("mouse".to_string())
            .then(PointerAction::MoveToElement {
                element: target,
                duration: None,
                x: Default::default(),
                y: Default::default(),
            })
            .then(PointerAction::Down {
                button: MOUSE_BUTTON_LEFT,
            })
            .then(PointerAction::Up {
                button: MOUSE_BUTTON_LEFT,
            });
        let performed = self.block(self.client.perform_actions(actions));
        let released = self.block(self.client.release_actions());
        pointer_outcome(performed, released)
    }

    fn dom_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.script(element, "el.click();", Vec::new()).map(|_| ())
    }

    fn send_keys(&mut self, element: &ElementHandle, keys: &[KeyInput]) -> HarnessResult<()> {
        let encoded: String = keys.iter().map(KeyInput::to_webdriver).collect();
        let target = self.element(element)?;
        match self.block(target.send_keys(&encoded)) {
            Ok(()) => Ok(()),
            Err(err) if is_intercepted(&err) => Err(HarnessError::intercepted(err.to_string())),
            Err(err) => Err(wd_error(err)),
        }
    }

    fn clear(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        let target = self.element(element)?;
        self.block(target.clear()).map_err(wd_error)
    }

    fn dom_set_value(&mut self, element: &ElementHandle, value: &str) -> HarnessResult<()> {
        self.script(
            element,
            &format!("const value = arguments[1]; {SET_VALUE_JS}"),
            vec![json!(value)],
        )
        .map(|_| ())
    }

    fn scroll_into_view(&mut self, element: &ElementHandle, block: ScrollBlock) -> HarnessResult<()> {
        self.script(
            element,
            "el.scrollIntoView({ block: arguments[1] });",
            vec![json!(block.as_js())],
        )
        .map(|_| ())
    }

    fn scroll_by(&mut self, dx: i64, dy: i64) -> HarnessResult<()> {
        self.block(
            self.client
                .execute("window.scrollBy(arguments[0], arguments[1]);", vec![json!(dx), json!(dy)]),
        )
        .map_err(wd_error)?;
        Ok(())
    }

    fn set_window_size(&mut self, width: u32, height: u32) -> HarnessResult<()> {
        self.block(self.client.set_window_size(width, height))
            .map_err(wd_error)
    }

    fn set_timeouts(&mut self, implicit: Duration, page_load: Duration) -> HarnessResult<()> {
        let timeouts = TimeoutConfiguration::new(None, Some(page_load), Some(implicit));
        self.block(self.client.update_timeouts(timeouts))
            .map_err(wd_error)
    }

    fn quit(&mut self) -> HarnessResult<()> {
        self.elements.clear();
        let client = self.client.clone();
        let closed = self.block(client.close()).map_err(wd_error);
        if let Some(mut service) = self.service.take() {
            service.stop();
        }
        tracing::info!(endpoint = %self.endpoint, "webdriver session closed");
        closed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_headless_capabilities() {
        let caps = capabilities(&SessionConfig::new(Backend::Chrome).with_headless(true));
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().cloned().unwrap_or_default();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--window-size=1920,1080")));
    }

    #[test]
    fn test_firefox_headed_capabilities() {
        let caps = capabilities(&SessionConfig::new(Backend::Firefox));
        let args = caps["moz:firefoxOptions"]["args"].as_array().cloned().unwrap_or_default();
        assert!(!args.contains(&json!("-headless")));
    }

    #[test]
    fn test_lookup_failures_are_not_empty_matches() {
        assert!(found_or_error(Ok(Vec::new())).unwrap().is_empty());
        let err = found_or_error(Err(CmdError::NotJson("session gone".to_string()))).unwrap_err();
        assert!(matches!(err, HarnessError::Driver { .. }));
        assert!(err.to_string().contains("session gone"));
    }

    #[test]
    fn test_failed_pointer_release_fails_the_action() {
        assert!(pointer_outcome(Ok(()), Ok(())).is_ok());
        let err = pointer_outcome(Ok(()), Err(CmdError::NotJson("reset".to_string()))).unwrap_err();
        assert!(err.to_string().contains("releasing pointer state"));
        assert!(!err.is_interception());

        let err = pointer_outcome(
            Err(CmdError::NotJson("element click intercepted".to_string())),
            Err(CmdError::NotJson("reset".to_string())),
        )
        .unwrap_err();
        assert!(err.is_interception());
    }

    #[test]
    fn test_edge_and_safari_capabilities() {
        let edge = capabilities(&SessionConfig::new(Backend::Edge).with_headless(true));
        assert_eq!(edge["browserName"], "MicrosoftEdge");
        assert!(edge.contains_key("ms:edgeOptions"));
        let safari = capabilities(&SessionConfig::new(Backend::Safari));
        assert_eq!(safari.len(), 1);
    }
}
