//! Local Chrome over the DevTools protocol.
//!
//! Element handles are opaque ids mapped to chromiumoxide [`Element`]s in a
//! [`HandleRegistry`]; the table is dropped on every navigation so stale ids
//! fail instead of acting on a detached node.

#![allow(clippy::missing_errors_doc)]

use super::{
    ensure_uncovered, Driver, ElementHandle, HandleRegistry, KeyInput, Modifier, ScrollBlock,
    HIT_TEST_JS, SET_VALUE_JS,
};
use crate::locator::{NativeQuery, Query};
use crate::result::{HarnessError, HarnessResult};
use crate::session::SessionConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

const SCOPE_ATTR: &str = "data-staycheck-scope";

const DISPLAYED_FN: &str = "function() {
    const s = window.getComputedStyle(this);
    const r = this.getBoundingClientRect();
    return s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0;
}";

/// Chrome driven through chromiumoxide
pub struct CdpDriver {
    runtime: Runtime,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    elements: HandleRegistry<Element>,
    page_load: Duration,
}

impl fmt::Debug for CdpDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpDriver")
            .field("elements", &self.elements.len())
            .field("page_load", &self.page_load)
            .finish_non_exhaustive()
    }
}

fn startup(message: impl fmt::Display) -> HarnessError {
    HarnessError::SessionStartup {
        backend: "chrome".to_string(),
        message: message.to_string(),
    }
}

fn cdp_error(message: impl fmt::Display) -> HarnessError {
    HarnessError::driver(format!("cdp: {message}"))
}

/// Empty result for "no node matched"; every other failure is a driver error
fn no_match(err: CdpError) -> HarnessResult<Vec<Element>> {
    match err {
        CdpError::NotFound => Ok(Vec::new()),
        other => Err(cdp_error(other)),
    }
}

impl CdpDriver {
    /// Launch Chrome and open a blank tab
    pub fn launch(config: &SessionConfig) -> HarnessResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("staycheck-cdp")
            .enable_all()
            .build()
            .map_err(startup)?;

        let (width, height) = crate::session::WINDOW_SIZE;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .request_timeout(config.page_load_timeout())
            .arg("--disable-dev-shm-usage");
        if !config.headless {
            builder = builder.with_head();
        }
        if std::env::var_os("CI").is_some() {
            builder = builder.no_sandbox();
        }
        let browser_config = builder.build().map_err(startup)?;

        let (browser, page, handler) = runtime.block_on(async {
            let (browser, mut handler) = Browser::launch(browser_config).await.map_err(startup)?;
            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(err) = event {
                        tracing::warn!(error = %err, "cdp handler stopped");
                        break;
                    }
                }
            });
            let page = browser.new_page("about:blank").await.map_err(startup)?;
            Ok::<_, HarnessError>((browser, page, handle))
        })?;

        tracing::info!(headless = config.headless, "chrome launched over cdp");
        Ok(Self {
            runtime,
            browser,
            page,
            handler,
            elements: HandleRegistry::default(),
            page_load: config.page_load_timeout(),
        })
    }

    fn block<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn element(&self, handle: &ElementHandle) -> HarnessResult<&Element> {
        self.elements
            .get(handle)
            .ok_or_else(|| cdp_error(format!("stale element {} ({})", handle.id, handle.source)))
    }

    /// Run `body` as a function with `this` bound to the element
    fn call(&self, handle: &ElementHandle, body: &str) -> HarnessResult<serde_json::Value> {
        let element = self.element(handle)?;
        let returned = self
            .block(element.call_js_fn(format!("function() {{ {body} }}"), false))
            .map_err(cdp_error)?;
        Ok(returned.result.value.unwrap_or(serde_json::Value::Null))
    }

    /// XPath against the document or an element: tag the hits, then collect
    /// them by CSS. An empty snapshot is an empty list, never an error.
    fn tagged_xpath(
        &self,
        parent: Option<&ElementHandle>,
        xpath: &str,
    ) -> HarnessResult<Vec<Element>> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let expr = serde_json::to_string(xpath)?;
        let tag = |context: &str| {
            format!(
                "const r = document.evaluate({expr}, {context}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                 for (let i = 0; i < r.snapshotLength; i++) {{
                     const n = r.snapshotItem(i);
                     if (n.nodeType === 1) {{ n.setAttribute('{SCOPE_ATTR}', '{token}'); }}
                 }}"
            )
        };
        match parent {
            Some(parent) => {
                self.call(parent, &tag("this"))?;
            }
            None => {
                self.block(self.page.evaluate(format!("(() => {{ {} }})()", tag("document"))))
                    .map_err(cdp_error)?;
            }
        }
        let selector = format!("[{SCOPE_ATTR}=\"{token}\"]");
        let found = self
            .block(self.page.find_elements(selector.as_str()))
            .or_else(no_match)?;
        self.block(self.page.evaluate(format!(
            "document.querySelectorAll('{selector}').forEach(n => n.removeAttribute('{SCOPE_ATTR}'))"
        )))
        .map_err(cdp_error)?;
        Ok(found)
    }

    fn hit_test(&self, element: &ElementHandle) -> HarnessResult<()> {
        let covering = self.call(element, &format!("const el = this; {HIT_TEST_JS}"))?;
        ensure_uncovered(element, &covering)
    }

    /// Mouse press at the element centre
    fn press(&self, element: &ElementHandle) -> HarnessResult<()> {
        let target = self.element(element)?;
        self.block(target.click()).map_err(cdp_error)?;
        Ok(())
    }

    fn chord(&self, modifier: Modifier, ch: char) -> HarnessResult<()> {
        let upper = ch.to_ascii_uppercase();
        for (kind, down) in [
            (DispatchKeyEventType::KeyDown, true),
            (DispatchKeyEventType::KeyUp, false),
        ] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .modifiers(modifier.cdp_bit())
                .key(ch.to_string())
                .code(format!("Key{upper}"))
                .windows_virtual_key_code(i64::from(u32::from(upper)));
            if down && ch == 'a' {
                builder = builder.commands(vec!["selectAll".to_string()]);
            }
            let params = builder.build().map_err(cdp_error)?;
            self.block(self.page.execute(params)).map_err(cdp_error)?;
        }
        Ok(())
    }
}

impl Driver for CdpDriver {
    fn name(&self) -> &'static str {
        "cdp"
    }

    fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.elements.clear();
        let timeout = self.page_load;
        let page = &self.page;
        self.runtime
            .block_on(async { tokio::time::timeout(timeout, page.goto(url)).await })
            .map_err(|_| HarnessError::Navigation {
                url: url.to_string(),
                message: format!("page load exceeded {}s", timeout.as_secs()),
            })?
            .map_err(|e| HarnessError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn current_url(&mut self) -> HarnessResult<String> {
        Ok(self
            .block(self.page.url())
            .map_err(cdp_error)?
            .unwrap_or_default())
    }

    fn title(&mut self) -> HarnessResult<String> {
        Ok(self
            .block(self.page.get_title())
            .map_err(cdp_error)?
            .unwrap_or_default())
    }

    fn page_source(&mut self) -> HarnessResult<String> {
        self.block(self.page.content()).map_err(cdp_error)
    }

    fn find_all(
        &mut self,
        query: &Query,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Vec<ElementHandle>> {
        let found = match (query.to_native(), within) {
            (NativeQuery::Css(css), None) => self
                .block(self.page.find_elements(css.as_str()))
                .or_else(no_match)?,
            (NativeQuery::XPath(xpath), None) => self.tagged_xpath(None, &xpath)?,
            (NativeQuery::Css(css), Some(parent)) => {
                let parent = self.element(parent)?;
                self.block(parent.find_elements(css.as_str()))
                    .or_else(no_match)?
            }
            (NativeQuery::XPath(xpath), Some(parent)) => self.tagged_xpath(Some(parent), &xpath)?,
        };
        Ok(self.elements.register(query, within, found))
    }

    fn is_displayed(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        let element = self.element(element)?;
        let returned = self
            .block(element.call_js_fn(DISPLAYED_FN, false))
            .map_err(cdp_error)?;
        Ok(returned
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    fn is_enabled(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        Ok(self
            .call(element, "return !this.disabled;")?
            .as_bool()
            .unwrap_or(true))
    }

    fn text(&mut self, element: &ElementHandle) -> HarnessResult<String> {
        let element = self.element(element)?;
        Ok(self
            .block(element.inner_text())
            .map_err(cdp_error)?
            .unwrap_or_default())
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> HarnessResult<Option<String>> {
        if name == "value" {
            let value = self.call(element, "return this.value === undefined ? null : String(this.value);")?;
            return Ok(value.as_str().map(str::to_string));
        }
        let element = self.element(element)?;
        self.block(element.attribute(name)).map_err(cdp_error)
    }

    fn click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.hit_test(element)?;
        self.press(element)
    }

    fn pointer_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.scroll_into_view(element, ScrollBlock::End)?;
        self.hit_test(element)?;
        self.press(element)
    }

    fn dom_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.call(element, "this.click();").map(|_| ())
    }

    fn send_keys(&mut self, element: &ElementHandle, keys: &[KeyInput]) -> HarnessResult<()> {
        let target = self.element(element)?;
        self.block(target.focus()).map_err(cdp_error)?;
        for input in keys {
            match input {
                KeyInput::Text(text) => {
                    let target = self.element(element)?;
                    self.block(target.type_str(text)).map_err(cdp_error)?;
                }
                KeyInput::Key(key) => {
                    let target = self.element(element)?;
                    self.block(target.press_key(key.dom_name())).map_err(cdp_error)?;
                }
                KeyInput::Chord(modifier, ch) => self.chord(*modifier, *ch)?,
            }
        }
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.call(
            element,
            "if ('value' in this) { this.value = ''; }
             this.dispatchEvent(new Event('change', { bubbles: true }));",
        )
        .map(|_| ())
    }

    fn dom_set_value(&mut self, element: &ElementHandle, value: &str) -> HarnessResult<()> {
        let literal = serde_json::to_string(value)?;
        self.call(
            element,
            &format!("const el = this; const value = {literal}; {SET_VALUE_JS}"),
        )
        .map(|_| ())
    }

    fn scroll_into_view(&mut self, element: &ElementHandle, block: ScrollBlock) -> HarnessResult<()> {
        self.call(
            element,
            &format!("this.scrollIntoView({{ block: '{}' }});", block.as_js()),
        )
        .map(|_| ())
    }

    fn scroll_by(&mut self, dx: i64, dy: i64) -> HarnessResult<()> {
        self.block(self.page.evaluate(format!("window.scrollBy({dx}, {dy})")))
            .map_err(cdp_error)?;
        Ok(())
    }

    fn set_window_size(&mut self, width: u32, height: u32) -> HarnessResult<()> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.block(self.page.execute(params)).map_err(cdp_error)?;
        Ok(())
    }

    fn set_timeouts(&mut self, _implicit: Duration, page_load: Duration) -> HarnessResult<()> {
        self.page_load = page_load;
        Ok(())
    }

    fn quit(&mut self) -> HarnessResult<()> {
        self.elements.clear();
        let browser = &mut self.browser;
        let closed = self.runtime.block_on(async {
            let closed = browser.close().await.map(|_| ());
            if let Err(err) = browser.wait().await {
                tracing::warn!(error = %err, "chrome process did not exit cleanly");
            }
            closed
        });
        self.handler.abort();
        tracing::info!("chrome closed");
        closed.map_err(cdp_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_an_empty_match() {
        assert!(no_match(CdpError::NotFound).unwrap().is_empty());
        let err = no_match(CdpError::Timeout).unwrap_err();
        assert!(matches!(err, HarnessError::Driver { .. }));
        assert!(err.to_string().contains("cdp"));
    }
}
