//! Result and error types for staycheck.

use crate::action::Strategy;
use thiserror::Error;

/// Result type for staycheck operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving the application under test
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Backend could not be started for the requested configuration
    #[error("Failed to start {backend} session: {message}")]
    SessionStartup {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Remote WebDriver endpoint refused or never answered
    #[error("Failed to connect to remote WebDriver {endpoint}: {message}")]
    RemoteConnection {
        /// Endpoint URL
        endpoint: String,
        /// Error message
        message: String,
    },

    /// Operation attempted on a session that was already released
    #[error("Browser session is closed")]
    SessionClosed,

    /// Element never became visible
    #[error("'{intent}' not visible after {timeout_ms}ms (tried: {})", attempted.join(" | "))]
    ElementNotVisible {
        /// Intent name
        intent: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
        /// Queries that were tried
        attempted: Vec<String>,
    },

    /// No query of the intent matched anything
    #[error("'{intent}' not found (tried: {})", attempted.join(" | "))]
    NotFound {
        /// Intent name
        intent: String,
        /// Queries that were tried
        attempted: Vec<String>,
    },

    /// Strict intent matched more than one element
    #[error("'{intent}' matched {count} elements via {query}, expected exactly one")]
    AmbiguousMatch {
        /// Intent name
        intent: String,
        /// Winning query
        query: String,
        /// Number of matches
        count: usize,
    },

    /// Every interaction strategy was blocked
    #[error("Action on '{intent}' blocked; last strategy {last_strategy} (tried: {})", format_strategies(attempted))]
    ActionBlocked {
        /// Intent name
        intent: String,
        /// Last strategy attempted
        last_strategy: Strategy,
        /// Strategies tried, in order
        attempted: Vec<Strategy>,
        /// Last driver message
        message: String,
    },

    /// Driver reported that another element received the interaction
    #[error("Interaction intercepted: {message}")]
    Intercepted {
        /// Driver message
        message: String,
    },

    /// Date range request was rejected before any UI work
    #[error("Invalid date range: nights must be at least 1 (got {nights})")]
    InvalidRange {
        /// Requested number of nights
        nights: i64,
    },

    /// Offset arithmetic left the representable calendar
    #[error("Date out of range: {base} shifted by {days} days")]
    DateOutOfRange {
        /// Base date (ISO)
        base: String,
        /// Requested shift in days
        days: i64,
    },

    /// Form never rendered any validation text
    #[error("No validation message shown within {timeout_ms}ms (watched: {})", watched.join(" | "))]
    NoValidationShown {
        /// Timeout in milliseconds
        timeout_ms: u64,
        /// Queries that were polled
        watched: Vec<String>,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Backend command failed
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration could not be resolved
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms: {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was waited for
        waited_for: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

fn format_strategies(strategies: &[Strategy]) -> String {
    strategies
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl HarnessError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create an interception signal
    #[must_use]
    pub fn intercepted(message: impl Into<String>) -> Self {
        Self::Intercepted {
            message: message.into(),
        }
    }

    /// Whether the action engine should move on to the next strategy
    #[must_use]
    pub const fn is_interception(&self) -> bool {
        matches!(self, Self::Intercepted { .. })
    }

    /// Whether this failure must abort the whole run rather than one scenario
    #[must_use]
    pub const fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Self::SessionStartup { .. }
                | Self::RemoteConnection { .. }
                | Self::Config { .. }
                | Self::Yaml(_)
        )
    }
}
