//! Resilient action engine.
//!
//! Every UI mutation runs the same sequence:
//!
//! ```text
//! Idle -> WaitingVisible -> BringIntoView -> Attempt(direct)
//!                                              | intercepted
//!                                              v
//!                                           Attempt(pointer)
//!                                              | intercepted
//!                                              v
//!                                           Attempt(forced) -> Success | Failed
//! ```
//!
//! Strategies are an explicit ordered list. Only an interception moves the
//! engine to the next strategy; any other driver error ends the action. The
//! strategy that succeeded is part of the returned [`ActionOutcome`] and
//! forced successes are kept in a journal for reporting.

use crate::driver::{ElementHandle, Key, KeyInput, ScrollBlock};
use crate::locator::{ElementIntent, LocatorResolver};
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;
use crate::wait::{self, WaitOptions, Waiter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Interaction technique, ordered from most to least user-faithful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Native click / keyboard input
    Direct,
    /// Pointer moved to the element centre, then pressed
    Pointer,
    /// DOM-level invocation bypassing hit-testing
    Forced,
}

impl Strategy {
    /// Default cascade
    pub const CASCADE: [Self; 3] = [Self::Direct, Self::Pointer, Self::Forced];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Pointer => "pointer",
            Self::Forced => "forced",
        })
    }
}

/// Kind of UI mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Click
    Click,
    /// Replace a field's text
    Type,
    /// Empty a field
    Clear,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Clear => "clear",
        })
    }
}

/// States an action passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    /// Not started
    Idle,
    /// Waiting for the target to become visible
    WaitingVisible,
    /// Scrolling the target toward the viewport centre
    BringIntoView,
    /// Trying one strategy
    Attempt(Strategy),
    /// Finished with the given strategy
    Success(Strategy),
    /// Every strategy was intercepted
    Failed,
}

/// One strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    /// Strategy tried
    pub strategy: Strategy,
    /// Interception message, `None` on success
    pub intercepted_by: Option<String>,
}

impl StrategyAttempt {
    /// Whether this attempt succeeded
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.intercepted_by.is_none()
    }
}

/// Result of a completed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Intent acted upon
    pub intent: String,
    /// Kind of action
    pub kind: ActionKind,
    /// Strategy that succeeded
    pub strategy: Strategy,
    /// Attempts in order, the last one successful
    pub attempts: Vec<StrategyAttempt>,
    /// States visited
    pub path: Vec<ActionState>,
}

impl ActionOutcome {
    /// Whether the forced strategy was needed
    #[must_use]
    pub fn was_forced(&self) -> bool {
        self.strategy == Strategy::Forced
    }
}

/// Action engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Visibility wait timeout
    pub visible_timeout_ms: u64,
    /// Visibility poll interval
    pub poll_interval_ms: u64,
    /// Pause after scrolling
    pub settle_ms: u64,
    /// Upward scroll applied after centring, to clear sticky headers
    pub sticky_header_offset_px: i64,
    /// Strategies tried in order
    pub strategies: Vec<Strategy>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            visible_timeout_ms: 10_000,
            poll_interval_ms: wait::DEFAULT_POLL_INTERVAL_MS,
            settle_ms: 200,
            sticky_header_offset_px: 120,
            strategies: Strategy::CASCADE.to_vec(),
        }
    }
}

impl ActionConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the visibility timeout
    #[must_use]
    pub const fn with_visible_timeout(mut self, ms: u64) -> Self {
        self.visible_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the sticky header offset
    #[must_use]
    pub const fn with_sticky_offset(mut self, px: i64) -> Self {
        self.sticky_header_offset_px = px;
        self
    }

    /// Replace the strategy list; an empty list keeps the current one
    #[must_use]
    pub fn with_strategies(mut self, strategies: &[Strategy]) -> Self {
        if !strategies.is_empty() {
            self.strategies = strategies.to_vec();
        }
        self
    }

    /// Fast config for tests (no settle, short timeout)
    #[must_use]
    pub fn fast() -> Self {
        Self::default()
            .with_visible_timeout(300)
            .with_poll_interval(5)
            .with_settle(0)
    }

    fn wait_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.visible_timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }
}

/// Executes wait, scroll and strategy cascade for every UI mutation
#[derive(Debug)]
pub struct ActionEngine<'s> {
    session: &'s Session,
    config: ActionConfig,
    journal: Mutex<Vec<ActionOutcome>>,
}

impl<'s> ActionEngine<'s> {
    /// Create an engine with default config
    #[must_use]
    pub fn new(session: &'s Session) -> Self {
        Self::with_config(session, ActionConfig::default())
    }

    /// Create an engine with explicit config
    #[must_use]
    pub const fn with_config(session: &'s Session, config: ActionConfig) -> Self {
        Self {
            session,
            config,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Session this engine drives
    #[must_use]
    pub const fn session(&self) -> &'s Session {
        self.session
    }

    /// Engine config
    #[must_use]
    pub const fn config(&self) -> &ActionConfig {
        &self.config
    }

    /// Resolver bound to the same session
    #[must_use]
    pub const fn resolver(&self) -> LocatorResolver<'s> {
        LocatorResolver::new(self.session)
    }

    /// Every completed action, oldest first
    #[must_use]
    pub fn journal(&self) -> Vec<ActionOutcome> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Completed actions that needed the forced strategy
    #[must_use]
    pub fn forced_actions(&self) -> Vec<ActionOutcome> {
        self.journal()
            .into_iter()
            .filter(ActionOutcome::was_forced)
            .collect()
    }

    /// Wait until the intent resolves to a displayed element.
    ///
    /// Among several matches the first displayed one is taken, unless the
    /// intent is strict, in which case more than one match is an error.
    pub fn wait_visible(&self, intent: &ElementIntent) -> HarnessResult<ElementHandle> {
        self.wait_visible_within(intent, None)
    }

    /// [`Self::wait_visible`] scoped to a parent element
    pub fn wait_visible_within(
        &self,
        intent: &ElementIntent,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<ElementHandle> {
        let resolver = self.resolver();
        let waiter = Waiter::new(self.config.wait_options());
        let outcome = waiter.poll(|| {
            let resolution = resolver.find_all(intent, within)?;
            if intent.is_strict() && resolution.elements.len() > 1 {
                return Err(HarnessError::AmbiguousMatch {
                    intent: intent.name().to_string(),
                    query: resolution.query,
                    count: resolution.elements.len(),
                });
            }
            for element in resolution.elements {
                if self.session.with_driver(|d| d.is_displayed(&element))? {
                    return Ok(Some(element));
                }
            }
            Ok(None)
        })?;
        match outcome {
            Ok(found) => {
                tracing::debug!(
                    intent = intent.name(),
                    polls = found.polls,
                    elapsed_ms = u64::try_from(found.elapsed.as_millis()).unwrap_or(u64::MAX),
                    "visible"
                );
                Ok(found.value)
            }
            Err(timed_out) => Err(HarnessError::ElementNotVisible {
                intent: intent.name().to_string(),
                timeout_ms: u64::try_from(timed_out.elapsed.as_millis()).unwrap_or(u64::MAX),
                attempted: intent.describe_queries(),
            }),
        }
    }

    /// Centre the element, nudge up past sticky headers, then settle
    pub fn bring_into_view(&self, element: &ElementHandle) -> HarnessResult<()> {
        self.session.with_driver(|d| {
            d.scroll_into_view(element, ScrollBlock::Center)?;
            if self.config.sticky_header_offset_px != 0 {
                d.scroll_by(0, -self.config.sticky_header_offset_px)?;
            }
            Ok(())
        })?;
        wait::settle(Duration::from_millis(self.config.settle_ms));
        Ok(())
    }

    /// Wait for the intent and scroll it into view without interacting
    pub fn scroll_to(&self, intent: &ElementIntent) -> HarnessResult<ElementHandle> {
        let element = self.wait_visible(intent)?;
        self.bring_into_view(&element)?;
        Ok(element)
    }

    /// Click the intent
    pub fn click(&self, intent: &ElementIntent) -> HarnessResult<ActionOutcome> {
        self.perform(ActionKind::Click, intent, None, |session, strategy, element| {
            session.with_driver(|d| match strategy {
                Strategy::Direct => d.click(element),
                Strategy::Pointer => d.pointer_click(element),
                Strategy::Forced => d.dom_click(element),
            })
        })
    }

    /// Click an intent scoped to a parent element
    pub fn click_within(
        &self,
        intent: &ElementIntent,
        within: &ElementHandle,
    ) -> HarnessResult<ActionOutcome> {
        self.perform(ActionKind::Click, intent, Some(within), |session, strategy, element| {
            session.with_driver(|d| match strategy {
                Strategy::Direct => d.click(element),
                Strategy::Pointer => d.pointer_click(element),
                Strategy::Forced => d.dom_click(element),
            })
        })
    }

    /// Replace the field's content with `text`
    pub fn type_text(&self, intent: &ElementIntent, text: &str) -> HarnessResult<ActionOutcome> {
        self.type_and_commit(intent, text, &[])
    }

    /// Replace the field's content with `text`, then press `commit` keys
    /// (Tab to blur, Escape to close a picker).
    ///
    /// Keyboard strategies read the value back and count a field that does
    /// not hold `text` as intercepted. Under the forced strategy the value is
    /// assigned directly and input and change events stand in for the commit
    /// keys.
    pub fn type_and_commit(
        &self,
        intent: &ElementIntent,
        text: &str,
        commit: &[Key],
    ) -> HarnessResult<ActionOutcome> {
        self.perform(ActionKind::Type, intent, None, |session, strategy, element| {
            if strategy == Strategy::Forced {
                return session.with_driver(|d| d.dom_set_value(element, text));
            }
            session.with_driver(|d| {
                focus(d, strategy, element)?;
                wipe(d, element)?;
                let mut keys = vec![KeyInput::text(text)];
                keys.extend(commit.iter().copied().map(KeyInput::Key));
                d.send_keys(element, &keys)?;
                verify_value(d, element, text)
            })
        })
    }

    /// Empty the field
    pub fn clear(&self, intent: &ElementIntent) -> HarnessResult<ActionOutcome> {
        self.perform(ActionKind::Clear, intent, None, |session, strategy, element| {
            if strategy == Strategy::Forced {
                return session.with_driver(|d| d.dom_set_value(element, ""));
            }
            session.with_driver(|d| {
                focus(d, strategy, element)?;
                wipe(d, element)?;
                verify_value(d, element, "")
            })
        })
    }

    /// Current `value` of a visible field
    pub fn read_value(&self, intent: &ElementIntent) -> HarnessResult<String> {
        let element = self.wait_visible(intent)?;
        Ok(self
            .session
            .with_driver(|d| d.attribute(&element, "value"))?
            .unwrap_or_default())
    }

    /// Trimmed visible text of the intent
    pub fn read_text(&self, intent: &ElementIntent) -> HarnessResult<String> {
        let element = self.wait_visible(intent)?;
        Ok(self.session.with_driver(|d| d.text(&element))?.trim().to_string())
    }

    /// Trimmed text of every displayed match, in document order
    pub fn visible_texts(
        &self,
        intent: &ElementIntent,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Vec<String>> {
        let resolution = self.resolver().find_all(intent, within)?;
        self.session.with_driver(|d| {
            let mut texts = Vec::with_capacity(resolution.elements.len());
            for element in &resolution.elements {
                if d.is_displayed(element)? {
                    texts.push(d.text(element)?.trim().to_string());
                }
            }
            Ok(texts)
        })
    }

    /// Whether any match is displayed right now (no waiting)
    pub fn is_visible(&self, intent: &ElementIntent) -> HarnessResult<bool> {
        let resolution = self.resolver().find_all(intent, None)?;
        self.session.with_driver(|d| {
            for element in &resolution.elements {
                if d.is_displayed(element)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Whether the intent becomes visible before the timeout
    pub fn becomes_visible(&self, intent: &ElementIntent) -> HarnessResult<bool> {
        match self.wait_visible(intent) {
            Ok(_) => Ok(true),
            Err(HarnessError::ElementNotVisible { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Number of matches of the winning query
    pub fn count(&self, intent: &ElementIntent) -> HarnessResult<usize> {
        self.resolver().count(intent)
    }

    fn perform<F>(
        &self,
        kind: ActionKind,
        intent: &ElementIntent,
        within: Option<&ElementHandle>,
        mut attempt: F,
    ) -> HarnessResult<ActionOutcome>
    where
        F: FnMut(&Session, Strategy, &ElementHandle) -> HarnessResult<()>,
    {
        let mut path = vec![ActionState::Idle, ActionState::WaitingVisible];
        let element = self.wait_visible_within(intent, within)?;

        path.push(ActionState::BringIntoView);
        self.bring_into_view(&element)?;

        let mut attempts = Vec::with_capacity(self.config.strategies.len());
        let mut last_message = String::new();
        for &strategy in &self.config.strategies {
            path.push(ActionState::Attempt(strategy));
            match attempt(self.session, strategy, &element) {
                Ok(()) => {
                    attempts.push(StrategyAttempt {
                        strategy,
                        intercepted_by: None,
                    });
                    path.push(ActionState::Success(strategy));
                    let outcome = ActionOutcome {
                        intent: intent.name().to_string(),
                        kind,
                        strategy,
                        attempts,
                        path,
                    };
                    self.record(&outcome);
                    return Ok(outcome);
                }
                Err(err) if err.is_interception() => {
                    tracing::debug!(
                        intent = intent.name(),
                        %kind,
                        %strategy,
                        error = %err,
                        "strategy intercepted"
                    );
                    last_message = err.to_string();
                    attempts.push(StrategyAttempt {
                        strategy,
                        intercepted_by: Some(last_message.clone()),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        path.push(ActionState::Failed);
        let attempted: Vec<Strategy> = attempts.iter().map(|a| a.strategy).collect();
        Err(HarnessError::ActionBlocked {
            intent: intent.name().to_string(),
            last_strategy: attempted.last().copied().unwrap_or(Strategy::Direct),
            attempted,
            message: last_message,
        })
    }

    fn record(&self, outcome: &ActionOutcome) {
        if outcome.was_forced() {
            tracing::warn!(
                intent = %outcome.intent,
                kind = %outcome.kind,
                "action needed the forced strategy"
            );
        } else {
            tracing::debug!(
                intent = %outcome.intent,
                kind = %outcome.kind,
                strategy = %outcome.strategy,
                "action done"
            );
        }
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
    }
}

fn focus(
    driver: &mut dyn crate::driver::Driver,
    strategy: Strategy,
    element: &ElementHandle,
) -> HarnessResult<()> {
    match strategy {
        Strategy::Pointer => driver.pointer_click(element),
        _ => driver.click(element),
    }
}

/// Intercepted unless the field now holds `expected`
fn verify_value(
    driver: &mut dyn crate::driver::Driver,
    element: &ElementHandle,
    expected: &str,
) -> HarnessResult<()> {
    let actual = driver.attribute(element, "value")?.unwrap_or_default();
    if actual.trim() == expected.trim() {
        return Ok(());
    }
    Err(HarnessError::intercepted(format!(
        "field {} holds '{actual}' after typing '{expected}'",
        element.source
    )))
}

/// Select-all + backspace, then a structural clear
fn wipe(driver: &mut dyn crate::driver::Driver, element: &ElementHandle) -> HarnessResult<()> {
    driver.send_keys(element, &[KeyInput::select_all(), KeyInput::Key(Key::Backspace)])?;
    driver.clear(element)
}
