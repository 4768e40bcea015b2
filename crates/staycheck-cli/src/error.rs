//! Error types for the CLI

use staycheck::HarnessError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Logging could not be installed
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// A scenario ran to completion but its verdict was negative
    #[error("Scenario '{scenario}' failed: {message}")]
    ScenarioFailed {
        /// Scenario name
        scenario: String,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Harness library error
    #[error("{0}")]
    Harness(#[from] HarnessError),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a logging error
    #[must_use]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Create a scenario failure
    #[must_use]
    pub fn scenario_failed(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScenarioFailed {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    /// Process exit status: 2 when the run could not start at all, 1 otherwise
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Harness(err) if err.is_fatal_to_run() => 2,
            Self::InvalidArgument { .. } | Self::Logging { .. } => 2,
            _ => 1,
        }
    }
}
