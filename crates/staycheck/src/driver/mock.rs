//! In-memory driver for tests.
//!
//! Elements are registered up front and bound to the queries that should
//! find them. Behaviour that makes real pages flaky (late rendering,
//! overlays, fields that keep stale text after a plain clear) is switched on
//! per element so the action engine and page façades can be exercised
//! without a browser.

use super::{Driver, ElementHandle, Key, KeyInput, ScrollBlock};
use crate::action::Strategy;
use crate::locator::Query;
use crate::result::{HarnessError, HarnessResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    parent: Option<String>,
    query: String,
}

/// Element in the mock DOM
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    id: String,
    bindings: Vec<Binding>,
    text: String,
    value: String,
    attributes: HashMap<String, String>,
    hidden: bool,
    hidden_checks: u32,
    disabled: bool,
    blocked: Vec<Strategy>,
    keys_blocked: bool,
    keys_dropped: bool,
    sticky: bool,
    selected_all: bool,
    reveals: Vec<String>,
    navigates_to: Option<String>,
    events: Vec<String>,
}

impl MockElement {
    /// Create an element with the given id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Make `query` find this element at document level
    #[must_use]
    pub fn bind(mut self, query: Query) -> Self {
        self.bindings.push(Binding {
            parent: None,
            query: query.to_string(),
        });
        self
    }

    /// Make `query` find this element when scoped to `parent`
    #[must_use]
    pub fn bind_within(mut self, parent: impl Into<String>, query: Query) -> Self {
        self.bindings.push(Binding {
            parent: Some(parent.into()),
            query: query.to_string(),
        });
        self
    }

    /// Visible text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Initial input value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Never visible until revealed by another element's click
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Report invisible for the first `checks` visibility checks
    #[must_use]
    pub const fn visible_after(mut self, checks: u32) -> Self {
        self.hidden_checks = checks;
        self
    }

    /// Report as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Accept keyboard input without changing the value, like a controlled
    /// input that re-renders its old state
    #[must_use]
    pub const fn drops_keys(mut self) -> Self {
        self.keys_dropped = true;
        self
    }

    /// Intercept interactions made with `strategy`
    #[must_use]
    pub fn block(mut self, strategy: Strategy) -> Self {
        self.blocked.push(strategy);
        self
    }

    /// Intercept keyboard input
    #[must_use]
    pub const fn block_keys(mut self) -> Self {
        self.keys_blocked = true;
        self
    }

    /// Keep the value under a structural clear; only select-all + backspace empties it
    #[must_use]
    pub const fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    /// Clicking this element makes `id` visible
    #[must_use]
    pub fn reveals(mut self, id: impl Into<String>) -> Self {
        self.reveals.push(id.into());
        self
    }

    /// Clicking this element changes the current URL
    #[must_use]
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    /// Element id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current input value
    #[must_use]
    pub fn current_value(&self) -> &str {
        &self.value
    }

    /// DOM events dispatched to this element ("input", "change")
    #[must_use]
    pub fn events(&self) -> &[String] {
        &self.events
    }

    fn is_blocked(&self, strategy: Strategy) -> bool {
        self.blocked.contains(&strategy)
    }
}

#[derive(Debug, Default)]
struct MockState {
    elements: Vec<MockElement>,
    url: String,
    title: String,
    source: String,
    history: Vec<String>,
    window: Option<(u32, u32)>,
    timeouts: Option<(Duration, Duration)>,
    scroll_y: i64,
    quit_count: u32,
}

impl MockState {
    fn element_mut(&mut self, handle: &ElementHandle) -> HarnessResult<&mut MockElement> {
        self.elements
            .iter_mut()
            .find(|e| e.id == handle.id)
            .ok_or_else(|| HarnessError::driver(format!("stale element reference: {}", handle.id)))
    }

    fn activate(&mut self, handle: &ElementHandle) -> HarnessResult<()> {
        let (reveals, target) = {
            let element = self.element_mut(handle)?;
            (element.reveals.clone(), element.navigates_to.clone())
        };
        for id in reveals {
            if let Some(el) = self.elements.iter_mut().find(|e| e.id == id) {
                el.hidden = false;
                el.hidden_checks = 0;
            }
        }
        if let Some(url) = target {
            self.url = url;
        }
        Ok(())
    }

    fn interact(&mut self, handle: &ElementHandle, strategy: Strategy) -> HarnessResult<()> {
        self.history.push(format!("{strategy}_click:{}", handle.id));
        if self.element_mut(handle)?.is_blocked(strategy) {
            return Err(HarnessError::intercepted(format!(
                "element {} is covered by div.overlay",
                handle.id
            )));
        }
        self.activate(handle)
    }
}

/// In-memory [`Driver`]
///
/// Clones share the same DOM, so a test can keep one clone for inspection
/// while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create an empty mock on `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let driver = Self::default();
        driver.lock().url = "about:blank".to_string();
        driver
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an element
    pub fn add(&self, element: MockElement) {
        self.lock().elements.push(element);
    }

    /// Set the current URL without recording a navigation
    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    /// Set the document title
    pub fn set_title(&self, title: impl Into<String>) {
        self.lock().title = title.into();
    }

    /// Set the serialized page source
    pub fn set_source(&self, source: impl Into<String>) {
        self.lock().source = source.into();
    }

    /// Make a registered element visible or hidden
    pub fn set_hidden(&self, id: &str, hidden: bool) {
        if let Some(el) = self.lock().elements.iter_mut().find(|e| e.id == id) {
            el.hidden = hidden;
        }
    }

    /// Replace a registered element's text
    pub fn set_text(&self, id: &str, text: impl Into<String>) {
        if let Some(el) = self.lock().elements.iter_mut().find(|e| e.id == id) {
            el.text = text.into();
        }
    }

    /// Snapshot of an element
    #[must_use]
    pub fn element(&self, id: &str) -> Option<MockElement> {
        self.lock().elements.iter().find(|e| e.id == id).cloned()
    }

    /// Current value of an input
    #[must_use]
    pub fn value_of(&self, id: &str) -> Option<String> {
        self.element(id).map(|e| e.value)
    }

    /// Calls made so far
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check whether a call whose record starts with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|h| h.starts_with(prefix))
    }

    /// Number of times `quit` ran
    #[must_use]
    pub fn quit_count(&self) -> u32 {
        self.lock().quit_count
    }

    /// Window size applied by the session
    #[must_use]
    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.lock().window
    }

    /// Timeouts applied by the session
    #[must_use]
    pub fn timeouts(&self) -> Option<(Duration, Duration)> {
        self.lock().timeouts
    }

    /// Accumulated vertical scroll from `scroll_by`
    #[must_use]
    pub fn scroll_y(&self) -> i64 {
        self.lock().scroll_y
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        state.url = url.to_string();
        Ok(())
    }

    fn current_url(&mut self) -> HarnessResult<String> {
        Ok(self.lock().url.clone())
    }

    fn title(&mut self) -> HarnessResult<String> {
        Ok(self.lock().title.clone())
    }

    fn page_source(&mut self) -> HarnessResult<String> {
        Ok(self.lock().source.clone())
    }

    fn find_all(
        &mut self,
        query: &Query,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Vec<ElementHandle>> {
        let key = query.to_string();
        let parent = within.map(|w| w.id.clone());
        let state = self.lock();
        Ok(state
            .elements
            .iter()
            .filter(|e| {
                e.bindings
                    .iter()
                    .any(|b| b.query == key && b.parent == parent)
            })
            .map(|e| ElementHandle::new(e.id.clone(), key.clone()))
            .collect())
    }

    fn is_displayed(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        let mut state = self.lock();
        let el = state.element_mut(element)?;
        if el.hidden {
            return Ok(false);
        }
        if el.hidden_checks > 0 {
            el.hidden_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn is_enabled(&mut self, element: &ElementHandle) -> HarnessResult<bool> {
        Ok(!self.lock().element_mut(element)?.disabled)
    }

    fn text(&mut self, element: &ElementHandle) -> HarnessResult<String> {
        Ok(self.lock().element_mut(element)?.text.clone())
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> HarnessResult<Option<String>> {
        let mut state = self.lock();
        let el = state.element_mut(element)?;
        if name == "value" {
            return Ok(Some(el.value.clone()));
        }
        Ok(el.attributes.get(name).cloned())
    }

    fn click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.lock().interact(element, Strategy::Direct)
    }

    fn pointer_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.scroll_into_view(element, ScrollBlock::End)?;
        self.lock().interact(element, Strategy::Pointer)
    }

    fn dom_click(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        self.lock().interact(element, Strategy::Forced)
    }

    fn send_keys(&mut self, element: &ElementHandle, keys: &[KeyInput]) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("send_keys:{}", element.id));
        let el = state.element_mut(element)?;
        if el.keys_blocked {
            return Err(HarnessError::intercepted(format!(
                "keyboard input to {} is covered by an overlay",
                element.id
            )));
        }
        for key in keys {
            match key {
                KeyInput::Text(_) if el.keys_dropped => {}
                KeyInput::Text(text) => {
                    if el.selected_all {
                        el.value.clear();
                        el.selected_all = false;
                    }
                    el.value.push_str(text);
                }
                KeyInput::Chord(_, 'a') => el.selected_all = true,
                KeyInput::Chord(_, _) => {}
                KeyInput::Key(Key::Backspace) => {
                    if el.selected_all {
                        el.value.clear();
                        el.selected_all = false;
                    } else {
                        el.value.pop();
                    }
                }
                KeyInput::Key(_) => el.selected_all = false,
            }
        }
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("clear:{}", element.id));
        let el = state.element_mut(element)?;
        if !el.sticky {
            el.value.clear();
        }
        Ok(())
    }

    fn dom_set_value(&mut self, element: &ElementHandle, value: &str) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("dom_set_value:{}", element.id));
        let el = state.element_mut(element)?;
        if el.is_blocked(Strategy::Forced) {
            return Err(HarnessError::intercepted(format!(
                "value assignment on {} rejected",
                element.id
            )));
        }
        el.value = value.to_string();
        el.events.push("input".to_string());
        el.events.push("change".to_string());
        Ok(())
    }

    fn scroll_into_view(
        &mut self,
        element: &ElementHandle,
        block: ScrollBlock,
    ) -> HarnessResult<()> {
        let mut state = self.lock();
        state.element_mut(element)?;
        state
            .history
            .push(format!("scroll_into_view:{}:{}", element.id, block.as_js()));
        Ok(())
    }

    fn scroll_by(&mut self, dx: i64, dy: i64) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("scroll_by:{dx}:{dy}"));
        state.scroll_y += dy;
        Ok(())
    }

    fn set_window_size(&mut self, width: u32, height: u32) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push(format!("set_window_size:{width}x{height}"));
        state.window = Some((width, height));
        Ok(())
    }

    fn set_timeouts(&mut self, implicit: Duration, page_load: Duration) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push("set_timeouts".to_string());
        state.timeouts = Some((implicit, page_load));
        Ok(())
    }

    fn quit(&mut self) -> HarnessResult<()> {
        let mut state = self.lock();
        state.history.push("quit".to_string());
        state.quit_count += 1;
        Ok(())
    }
}
