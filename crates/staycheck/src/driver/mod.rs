//! Browser driver abstraction.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Driver (synchronous trait)                                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │ CdpDriver    │  │ WebDriverDriver  │  │ MockDriver     │  │
//! │  │ chromiumoxide│  │ fantoccini       │  │ in-memory DOM  │  │
//! │  │ local Chrome │  │ FF/Edge/Safari/  │  │ (tests)        │  │
//! │  │              │  │ remote           │  │                │  │
//! │  └──────────────┘  └──────────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The trait is blocking. Async backends own a private runtime and block on
//! it, so callers see a plain function call that suspends the current thread.

#[cfg(feature = "cdp")]
pub mod cdp;
pub mod mock;
#[cfg(feature = "webdriver")]
pub mod service;
#[cfg(feature = "webdriver")]
pub mod webdriver;

use crate::locator::Query;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Opaque reference to an element held by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Backend-assigned identifier
    pub id: String,
    /// Query that produced this handle
    pub source: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

/// Non-printable keys the harness presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Backspace
    Backspace,
    /// Tab (blurs the field)
    Tab,
    /// Escape (closes overlays)
    Escape,
    /// Enter
    Enter,
}

impl Key {
    /// W3C WebDriver code point for the key
    #[must_use]
    pub const fn webdriver_char(self) -> char {
        match self {
            Self::Backspace => '\u{E003}',
            Self::Tab => '\u{E004}',
            Self::Enter => '\u{E007}',
            Self::Escape => '\u{E00C}',
        }
    }

    /// DOM `KeyboardEvent.key` name
    #[must_use]
    pub const fn dom_name(self) -> &'static str {
        match self {
            Self::Backspace => "Backspace",
            Self::Tab => "Tab",
            Self::Enter => "Enter",
            Self::Escape => "Escape",
        }
    }
}

/// Modifier keys used in chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    /// Control
    Control,
    /// Command on macOS
    Meta,
}

impl Modifier {
    /// Modifier the host platform uses for select-all
    #[must_use]
    pub const fn select_all() -> Self {
        if cfg!(target_os = "macos") {
            Self::Meta
        } else {
            Self::Control
        }
    }

    /// W3C WebDriver code point for the modifier
    #[must_use]
    pub const fn webdriver_char(self) -> char {
        match self {
            Self::Control => '\u{E009}',
            Self::Meta => '\u{E03D}',
        }
    }

    /// CDP `Input.dispatchKeyEvent` modifier bit
    #[must_use]
    pub const fn cdp_bit(self) -> i64 {
        match self {
            Self::Control => 2,
            Self::Meta => 4,
        }
    }
}

/// One unit of keyboard input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyInput {
    /// Printable text typed character by character
    Text(String),
    /// Single special key press
    Key(Key),
    /// Modifier held while pressing a character
    Chord(Modifier, char),
}

impl KeyInput {
    /// Platform-aware select-all chord
    #[must_use]
    pub const fn select_all() -> Self {
        Self::Chord(Modifier::select_all(), 'a')
    }

    /// Typed text
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Encode as a WebDriver "send keys" string.
    ///
    /// Chords release the modifier with the NULL key afterwards.
    #[must_use]
    pub fn to_webdriver(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Key(key) => key.webdriver_char().to_string(),
            Self::Chord(modifier, ch) => {
                format!("{}{ch}\u{E000}", modifier.webdriver_char())
            }
        }
    }
}

/// Where `scroll_into_view` aligns the element vertically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScrollBlock {
    /// Align to the top edge
    Start,
    /// Centre in the viewport
    #[default]
    Center,
    /// Align to the bottom edge
    End,
}

impl ScrollBlock {
    /// Value for `scrollIntoView({block})`
    #[must_use]
    pub const fn as_js(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
        }
    }
}

/// Synchronous browser driver
///
/// Every method blocks until the backend answers. `click` and
/// `pointer_click` must report an overlapping element as
/// [`crate::HarnessError::Intercepted`] instead of pressing on it, so the
/// action engine can move on to the next strategy.
pub trait Driver: Send {
    /// Short backend label for logs ("cdp", "webdriver", "mock")
    fn name(&self) -> &'static str;

    /// Navigate the current tab
    fn navigate(&mut self, url: &str) -> HarnessResult<()>;

    /// Current address
    fn current_url(&mut self) -> HarnessResult<String>;

    /// Document title
    fn title(&mut self) -> HarnessResult<String>;

    /// Serialized DOM
    fn page_source(&mut self) -> HarnessResult<String>;

    /// All elements matching `query`, in document order, optionally inside `within`
    fn find_all(
        &mut self,
        query: &Query,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Vec<ElementHandle>>;

    /// Whether the element is rendered and visible
    fn is_displayed(&mut self, element: &ElementHandle) -> HarnessResult<bool>;

    /// Whether the element accepts interaction
    fn is_enabled(&mut self, element: &ElementHandle) -> HarnessResult<bool>;

    /// Visible text
    fn text(&mut self, element: &ElementHandle) -> HarnessResult<String>;

    /// Attribute or property value (`value` reads the live property)
    fn attribute(&mut self, element: &ElementHandle, name: &str) -> HarnessResult<Option<String>>;

    /// Native click
    fn click(&mut self, element: &ElementHandle) -> HarnessResult<()>;

    /// Re-align the element away from sticky headers, hit-test its centre,
    /// then move the pointer there and press
    fn pointer_click(&mut self, element: &ElementHandle) -> HarnessResult<()>;

    /// `HTMLElement.click()` bypassing pointer hit-testing
    fn dom_click(&mut self, element: &ElementHandle) -> HarnessResult<()>;

    /// Send keyboard input to the element
    fn send_keys(&mut self, element: &ElementHandle, keys: &[KeyInput]) -> HarnessResult<()>;

    /// Structural clear of an editable element
    fn clear(&mut self, element: &ElementHandle) -> HarnessResult<()>;

    /// Assign `value` directly and dispatch `input` and `change` events
    fn dom_set_value(&mut self, element: &ElementHandle, value: &str) -> HarnessResult<()>;

    /// Scroll the element into view
    fn scroll_into_view(&mut self, element: &ElementHandle, block: ScrollBlock)
        -> HarnessResult<()>;

    /// Scroll the window by a pixel offset
    fn scroll_by(&mut self, dx: i64, dy: i64) -> HarnessResult<()>;

    /// Resize the browser window
    fn set_window_size(&mut self, width: u32, height: u32) -> HarnessResult<()>;

    /// Apply implicit-wait and page-load timeouts
    fn set_timeouts(&mut self, implicit: Duration, page_load: Duration) -> HarnessResult<()>;

    /// End the browser session and release backend resources
    fn quit(&mut self) -> HarnessResult<()>;
}

/// Backend element table.
///
/// Handles are grouped by the resolution that produced them: the query and
/// the parent it was scoped to. Resolving the same query again replaces the
/// previous group, and groups scoped to a parent that is gone are dropped
/// with it, so polling loops keep the table bounded.
#[derive(Debug)]
#[cfg_attr(not(any(feature = "cdp", feature = "webdriver")), allow(dead_code))]
pub(crate) struct HandleRegistry<E> {
    elements: HashMap<String, E>,
    groups: HashMap<(Option<String>, String), Vec<String>>,
}

impl<E> Default for HandleRegistry<E> {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
            groups: HashMap::new(),
        }
    }
}

#[cfg_attr(not(any(feature = "cdp", feature = "webdriver")), allow(dead_code))]
impl<E> HandleRegistry<E> {
    /// Backend element behind `handle`, if it is still registered
    pub(crate) fn get(&self, handle: &ElementHandle) -> Option<&E> {
        self.elements.get(&handle.id)
    }

    /// Number of live handles
    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    /// Forget every handle
    pub(crate) fn clear(&mut self) {
        self.elements.clear();
        self.groups.clear();
    }

    /// Register the result of one resolution, superseding the previous one
    pub(crate) fn register(
        &mut self,
        query: &Query,
        within: Option<&ElementHandle>,
        found: Vec<E>,
    ) -> Vec<ElementHandle> {
        let source = query.to_string();
        let key = (within.map(|parent| parent.id.clone()), source.clone());
        if let Some(stale) = self.groups.remove(&key) {
            for id in stale {
                self.elements.remove(&id);
            }
            self.drop_orphans();
        }
        let mut ids = Vec::with_capacity(found.len());
        let handles = found
            .into_iter()
            .map(|element| {
                let id = uuid::Uuid::new_v4().to_string();
                self.elements.insert(id.clone(), element);
                ids.push(id.clone());
                ElementHandle::new(id, source.clone())
            })
            .collect();
        self.groups.insert(key, ids);
        handles
    }

    fn drop_orphans(&mut self) {
        loop {
            let orphaned: Vec<(Option<String>, String)> = self
                .groups
                .keys()
                .filter(|(parent, _)| {
                    parent
                        .as_ref()
                        .is_some_and(|id| !self.elements.contains_key(id))
                })
                .cloned()
                .collect();
            if orphaned.is_empty() {
                return;
            }
            for key in orphaned {
                if let Some(ids) = self.groups.remove(&key) {
                    for id in ids {
                        self.elements.remove(&id);
                    }
                }
            }
        }
    }
}

/// Script that reports whether something other than the element (or its
/// descendants) sits at the element's centre point.
#[cfg_attr(not(any(feature = "cdp", feature = "webdriver")), allow(dead_code))]
pub(crate) const HIT_TEST_JS: &str = r"
const r = el.getBoundingClientRect();
const x = r.left + r.width / 2;
const y = r.top + r.height / 2;
const hit = document.elementFromPoint(x, y);
if (!hit || hit === el || el.contains(hit)) { return null; }
const id = hit.id ? '#' + hit.id : '';
const cls = typeof hit.className === 'string' && hit.className ? '.' + hit.className.trim().split(/\s+/).join('.') : '';
return hit.tagName.toLowerCase() + id + cls;
";

/// Turn the [`HIT_TEST_JS`] result into `Intercepted` when the centre is covered
#[cfg_attr(not(any(feature = "cdp", feature = "webdriver")), allow(dead_code))]
pub(crate) fn ensure_uncovered(
    element: &ElementHandle,
    covering: &serde_json::Value,
) -> HarnessResult<()> {
    match covering.as_str() {
        Some(other) => Err(HarnessError::intercepted(format!(
            "element {} covered by {other}",
            element.source
        ))),
        None => Ok(()),
    }
}

/// Script that assigns a value and notifies listeners
#[cfg_attr(not(any(feature = "cdp", feature = "webdriver")), allow(dead_code))]
pub(crate) const SET_VALUE_JS: &str = r"
const proto = Object.getPrototypeOf(el);
const desc = Object.getOwnPropertyDescriptor(proto, 'value');
if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod key_tests {
        use super::*;

        #[test]
        fn test_select_all_uses_platform_modifier() {
            let chord = KeyInput::select_all();
            if cfg!(target_os = "macos") {
                assert_eq!(chord, KeyInput::Chord(Modifier::Meta, 'a'));
            } else {
                assert_eq!(chord, KeyInput::Chord(Modifier::Control, 'a'));
            }
        }

        #[test]
        fn test_webdriver_encoding() {
            assert_eq!(KeyInput::text("abc").to_webdriver(), "abc");
            assert_eq!(KeyInput::Key(Key::Tab).to_webdriver(), "\u{E004}");
            assert_eq!(
                KeyInput::Chord(Modifier::Control, 'a').to_webdriver(),
                "\u{E009}a\u{E000}"
            );
        }

        #[test]
        fn test_cdp_modifier_bits() {
            assert_eq!(Modifier::Control.cdp_bit(), 2);
            assert_eq!(Modifier::Meta.cdp_bit(), 4);
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn test_repeated_resolution_replaces_handles() {
            let mut registry = HandleRegistry::default();
            let query = Query::css("#reserve");
            let first = registry.register(&query, None, vec!["a", "b"]);
            for _ in 0..50 {
                registry.register(&query, None, vec!["a", "b"]);
            }
            assert_eq!(registry.len(), 2);
            assert!(registry.get(&first[0]).is_none());
        }

        #[test]
        fn test_scoped_handles_follow_their_parent() {
            let mut registry = HandleRegistry::default();
            let cards = Query::css(".room-card");
            let title = Query::css("h5.card-title");
            let parents = registry.register(&cards, None, vec!["card-1", "card-2"]);
            let titles = registry.register(&title, Some(&parents[0]), vec!["t1"]);
            registry.register(&title, Some(&parents[1]), vec!["t2"]);
            assert_eq!(registry.get(&titles[0]), Some(&"t1"));
            assert_eq!(registry.len(), 4);

            let fresh = registry.register(&cards, None, vec!["card-1", "card-2"]);
            assert_eq!(registry.len(), 2);
            assert!(registry.get(&titles[0]).is_none());
            assert_eq!(registry.get(&fresh[1]), Some(&"card-2"));
        }

        #[test]
        fn test_other_queries_keep_their_handles() {
            let mut registry = HandleRegistry::default();
            let section = registry.register(&Query::css("#contact"), None, vec!["section"]);
            registry.register(&Query::css("h3"), None, vec!["heading"]);
            registry.register(&Query::css("h3"), None, vec!["heading"]);
            assert_eq!(registry.get(&section[0]), Some(&"section"));
            registry.clear();
            assert_eq!(registry.len(), 0);
        }
    }

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("el-1", "css=#name");
            assert_eq!(elem.id, "el-1");
            assert_eq!(elem.source, "css=#name");
        }

        #[test]
        fn test_covered_centre_is_an_interception() {
            let elem = ElementHandle::new("el-1", "css=#reserve");
            let err = ensure_uncovered(&elem, &serde_json::json!("header.sticky-top"))
                .unwrap_err();
            assert!(err.is_interception());
            assert!(err.to_string().contains("header.sticky-top"));
            assert!(ensure_uncovered(&elem, &serde_json::Value::Null).is_ok());
        }

        #[test]
        fn test_scroll_block_js() {
            assert_eq!(ScrollBlock::default().as_js(), "center");
            assert_eq!(ScrollBlock::Start.as_js(), "start");
        }
    }
}
