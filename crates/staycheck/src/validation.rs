//! Validation message aggregation.
//!
//! After a rejected submission a form renders its complaints in several
//! overlapping regions (inline feedback, an alert block, the alert's list
//! items). [`ValidationAggregator::collect`] polls those regions until one
//! has text and returns the deduplicated messages in first-seen order.

use crate::action::ActionEngine;
use crate::locator::ElementIntent;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{WaitOptions, Waiter};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default validation wait
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Regions that carry validation text in bootstrap-style forms
#[must_use]
pub fn form_validation_intent() -> ElementIntent {
    ElementIntent::new("Form validation messages").css(
        "form .invalid-feedback, form .text-danger, form .alert-danger, \
         form .alert-danger li, form small.text-danger",
    )
}

/// Trimmed, non-blank, deduplicated messages in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessageSet {
    messages: Vec<String>,
}

impl ValidationMessageSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment; blanks and repeats (after trimming) are ignored
    pub fn push(&mut self, fragment: &str) -> bool {
        let trimmed = fragment.trim();
        if trimmed.is_empty() || self.messages.iter().any(|m| m == trimmed) {
            return false;
        }
        self.messages.push(trimmed.to_string());
        true
    }

    /// Messages in order
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of distinct messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages joined with newlines
    #[must_use]
    pub fn joined(&self) -> String {
        self.messages.join("\n")
    }

    /// Case-insensitive substring check against the joined messages
    #[must_use]
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.joined()
            .to_lowercase()
            .contains(&phrase.trim().to_lowercase())
    }

    /// Expected phrases that are not present
    #[must_use]
    pub fn missing_phrases<'p>(&self, phrases: &[&'p str]) -> Vec<&'p str> {
        phrases
            .iter()
            .copied()
            .filter(|p| !self.contains_phrase(p))
            .collect()
    }

    /// Fail unless every phrase is present
    pub fn assert_contains_all(&self, phrases: &[&str]) -> HarnessResult<()> {
        let missing = self.missing_phrases(phrases);
        if missing.is_empty() {
            return Ok(());
        }
        Err(HarnessError::assertion(format!(
            "validation messages missing [{}]; shown: [{}]",
            missing.join(", "),
            self.messages.join(" | ")
        )))
    }
}

impl<S: AsRef<str>> FromIterator<S> for ValidationMessageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for fragment in iter {
            set.push(fragment.as_ref());
        }
        set
    }
}

/// Polls a form's validation regions
#[derive(Debug)]
pub struct ValidationAggregator<'e, 's> {
    actions: &'e ActionEngine<'s>,
    intent: ElementIntent,
}

impl<'e, 's> ValidationAggregator<'e, 's> {
    /// Aggregator over the standard form regions
    #[must_use]
    pub fn new(actions: &'e ActionEngine<'s>) -> Self {
        Self::with_intent(actions, form_validation_intent())
    }

    /// Aggregator over custom regions
    #[must_use]
    pub const fn with_intent(actions: &'e ActionEngine<'s>, intent: ElementIntent) -> Self {
        Self { actions, intent }
    }

    /// Poll until any region shows text, then return every visible message.
    ///
    /// Fails with [`HarnessError::NoValidationShown`] when nothing appears
    /// before `timeout`.
    pub fn collect(&self, timeout: Duration) -> HarnessResult<ValidationMessageSet> {
        let poll_ms = self.actions.config().poll_interval_ms;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let waiter = Waiter::new(
            WaitOptions::new()
                .with_timeout(timeout_ms)
                .with_poll_interval(poll_ms),
        );
        let outcome = waiter.poll(|| {
            let set: ValidationMessageSet =
                self.actions.visible_texts(&self.intent, None)?.into_iter().collect();
            Ok((!set.is_empty()).then_some(set))
        })?;
        match outcome {
            Ok(found) => {
                tracing::debug!(
                    count = found.value.len(),
                    polls = found.polls,
                    "validation messages collected"
                );
                Ok(found.value)
            }
            Err(_) => Err(HarnessError::NoValidationShown {
                timeout_ms,
                watched: self.intent.describe_queries(),
            }),
        }
    }
}
