//! Blocking wait primitives.
//!
//! Every suspend point in the harness goes through [`Waiter`]: the calling
//! thread sleeps between polls and gives up once the timeout elapses. There is
//! no external cancellation; the timeout is the only way out.

use crate::result::{HarnessError, HarnessResult};
use std::time::{Duration, Instant};

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult<T> {
    /// Value produced by the condition
    pub value: T,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of polls performed
    pub polls: u32,
}

/// Outcome of a wait that ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimedOut {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of polls performed
    pub polls: u32,
}

/// Blocking poller
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a waiter with the given options
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Get the options
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Poll `check` until it yields a value or the timeout elapses.
    ///
    /// The check is always evaluated at least once, and once more after the
    /// deadline passes so a condition that becomes true during the last sleep
    /// is not missed. Errors from the check abort the wait immediately.
    pub fn poll<T, F>(&self, mut check: F) -> HarnessResult<Result<WaitResult<T>, WaitTimedOut>>
    where
        F: FnMut() -> HarnessResult<Option<T>>,
    {
        let start = Instant::now();
        let timeout = self.options.timeout();
        let mut polls = 0;

        loop {
            polls += 1;
            if let Some(value) = check()? {
                return Ok(Ok(WaitResult {
                    value,
                    elapsed: start.elapsed(),
                    polls,
                }));
            }
            if start.elapsed() >= timeout {
                return Ok(Err(WaitTimedOut {
                    elapsed: start.elapsed(),
                    polls,
                }));
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            std::thread::sleep(self.options.poll_interval().min(remaining));
        }
    }

    /// Poll until the check yields a value, mapping timeout to [`HarnessError::Timeout`]
    pub fn until<T, F>(&self, waited_for: &str, check: F) -> HarnessResult<T>
    where
        F: FnMut() -> HarnessResult<Option<T>>,
    {
        match self.poll(check)? {
            Ok(result) => Ok(result.value),
            Err(_) => Err(HarnessError::Timeout {
                ms: self.options.timeout_ms,
                waited_for: waited_for.to_string(),
            }),
        }
    }
}

/// Fixed pause for layout settling. Not a synchronisation mechanism.
pub fn settle(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
