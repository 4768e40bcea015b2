//! Browser session lifecycle.
//!
//! A [`SessionManager`] owns at most one live [`Session`]. `acquire` is
//! idempotent while a session is live, `release` is idempotent always, and
//! both may race with the shutdown hook without double-quitting the backend.
//! Pages and the action engine borrow a [`Session`] for a call and never
//! keep it.

use crate::driver::Driver;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Window size applied after startup
pub const WINDOW_SIZE: (u32, u32) = (1920, 1080);

/// Browser backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Chrome / Chromium
    #[default]
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl Backend {
    /// All supported backends
    pub const ALL: [Self; 4] = [Self::Chrome, Self::Firefox, Self::Edge, Self::Safari];

    /// Whether the backend can run without a visible window
    #[must_use]
    pub const fn supports_headless(self) -> bool {
        !matches!(self, Self::Safari)
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "edge",
            Self::Safari => "safari",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "edge" | "msedge" => Ok(Self::Edge),
            "safari" => Ok(Self::Safari),
            other => Err(HarnessError::config(format!(
                "unsupported browser '{other}' (expected chrome, firefox, edge or safari)"
            ))),
        }
    }
}

/// Options recognised by [`SessionManager::acquire`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend kind
    pub backend: Backend,
    /// Run without a visible window
    pub headless: bool,
    /// Remote WebDriver endpoint; `None` runs locally
    pub remote_endpoint: Option<String>,
    /// Implicit element wait in seconds
    pub implicit_wait_secs: u64,
    /// Page load timeout in seconds
    pub page_load_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Chrome,
            headless: false,
            remote_endpoint: None,
            implicit_wait_secs: 10,
            page_load_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Create config for a backend with defaults
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the remote endpoint (blank means local)
    #[must_use]
    pub fn with_remote(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.remote_endpoint = (!endpoint.trim().is_empty()).then(|| endpoint.trim().to_string());
        self
    }

    /// Set implicit wait
    #[must_use]
    pub const fn with_implicit_wait(mut self, secs: u64) -> Self {
        self.implicit_wait_secs = secs;
        self
    }

    /// Set page load timeout
    #[must_use]
    pub const fn with_page_load_timeout(mut self, secs: u64) -> Self {
        self.page_load_timeout_secs = secs;
        self
    }

    /// Implicit wait as Duration
    #[must_use]
    pub const fn implicit_wait(&self) -> Duration {
        Duration::from_secs(self.implicit_wait_secs)
    }

    /// Page load timeout as Duration
    #[must_use]
    pub const fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    /// Whether a remote endpoint is configured
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.remote_endpoint.is_some()
    }

    /// Copy with headless dropped when the backend cannot honour it
    #[must_use]
    pub fn effective(&self) -> Self {
        let mut config = self.clone();
        if config.headless && !config.backend.supports_headless() {
            tracing::warn!(
                backend = %config.backend,
                "headless mode is not supported; starting with a visible window"
            );
            config.headless = false;
        }
        config
    }
}

struct SessionInner {
    id: Uuid,
    config: SessionConfig,
    driver: Mutex<Option<Box<dyn Driver>>>,
}

/// Handle to a live browser session
///
/// Clones refer to the same browser. Once the session is closed every
/// operation fails with [`HarnessError::SessionClosed`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.config.backend)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Session {
    /// Wrap an already started driver
    #[must_use]
    pub fn from_driver(driver: Box<dyn Driver>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                config,
                driver: Mutex::new(Some(driver)),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Box<dyn Driver>>> {
        self.inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Config the session was started with
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether the backend is still attached
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    /// Whether two handles refer to the same session
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with exclusive access to the driver
    pub fn with_driver<T, F>(&self, f: F) -> HarnessResult<T>
    where
        F: FnOnce(&mut dyn Driver) -> HarnessResult<T>,
    {
        let mut slot = self.slot();
        let driver = slot.as_mut().ok_or(HarnessError::SessionClosed)?;
        f(driver.as_mut())
    }

    /// Navigate to `url`
    pub fn navigate(&self, url: &str) -> HarnessResult<()> {
        tracing::debug!(url, "navigate");
        self.with_driver(|d| d.navigate(url))
            .map_err(|err| match err {
                HarnessError::Driver { message } => HarnessError::Navigation {
                    url: url.to_string(),
                    message,
                },
                other => other,
            })
    }

    /// Current address
    pub fn current_url(&self) -> HarnessResult<String> {
        self.with_driver(|d| d.current_url())
    }

    /// Document title
    pub fn title(&self) -> HarnessResult<String> {
        self.with_driver(|d| d.title())
    }

    /// Serialized DOM
    pub fn page_source(&self) -> HarnessResult<String> {
        self.with_driver(|d| d.page_source())
    }

    /// Quit the backend. Returns `false` if it was already closed.
    pub fn close(&self) -> HarnessResult<bool> {
        let driver = self.slot().take();
        match driver {
            Some(mut driver) => {
                tracing::info!(session = %self.inner.id, backend = %self.inner.config.backend, "closing session");
                driver.quit()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Creates drivers for a resolved config
pub trait DriverFactory: Send + Sync {
    /// Start a backend session
    fn create(&self, config: &SessionConfig) -> HarnessResult<Box<dyn Driver>>;
}

impl<F> DriverFactory for F
where
    F: Fn(&SessionConfig) -> HarnessResult<Box<dyn Driver>> + Send + Sync,
{
    fn create(&self, config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
        self(config)
    }
}

/// Factory for real browsers.
///
/// Remote endpoints and non-Chrome local backends go through WebDriver;
/// local Chrome uses the DevTools protocol, or chromedriver when only the
/// `webdriver` feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserFactory;

impl DriverFactory for BrowserFactory {
    fn create(&self, config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
        if let Some(endpoint) = &config.remote_endpoint {
            return remote(endpoint, config);
        }
        match config.backend {
            Backend::Chrome => local_chrome(config),
            Backend::Firefox | Backend::Edge | Backend::Safari => local_webdriver(config),
        }
    }
}

#[cfg(feature = "webdriver")]
fn remote(endpoint: &str, config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    Ok(Box::new(crate::driver::webdriver::WebDriverDriver::connect(
        endpoint, config, None,
    )?))
}

#[cfg(not(feature = "webdriver"))]
fn remote(endpoint: &str, config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    Err(HarnessError::SessionStartup {
        backend: config.backend.to_string(),
        message: format!("remote endpoint {endpoint} requires the `webdriver` feature"),
    })
}

#[cfg(feature = "cdp")]
fn local_chrome(config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    Ok(Box::new(crate::driver::cdp::CdpDriver::launch(config)?))
}

#[cfg(not(feature = "cdp"))]
fn local_chrome(config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    local_webdriver(config)
}

#[cfg(feature = "webdriver")]
fn local_webdriver(config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    Ok(Box::new(crate::driver::webdriver::WebDriverDriver::launch(
        config,
    )?))
}

#[cfg(not(feature = "webdriver"))]
fn local_webdriver(config: &SessionConfig) -> HarnessResult<Box<dyn Driver>> {
    Err(HarnessError::SessionStartup {
        backend: config.backend.to_string(),
        message: "this build has no backend for it; enable the `webdriver` feature".to_string(),
    })
}

/// Owns the process's single browser session
pub struct SessionManager {
    factory: Box<dyn DriverFactory>,
    current: Mutex<Option<Session>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(BrowserFactory)
    }
}

impl SessionManager {
    /// Create a manager using `factory` to start sessions
    #[must_use]
    pub fn new(factory: impl DriverFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live session, starting one if none exists.
    ///
    /// While a session is live `config` is ignored and the existing handle
    /// is returned.
    pub fn acquire(&self, config: &SessionConfig) -> HarnessResult<Session> {
        let mut current = self.lock();
        if let Some(session) = current.as_ref().filter(|s| s.is_open()) {
            if session.config() != config {
                tracing::debug!(session = %session.id(), "session already live; requested config ignored");
            }
            return Ok(session.clone());
        }

        let effective = config.effective();
        tracing::info!(
            backend = %effective.backend,
            headless = effective.headless,
            remote = effective.remote_endpoint.as_deref().unwrap_or("local"),
            "starting browser session"
        );
        let mut driver = self.factory.create(&effective)?;
        if let Err(err) = prepare(driver.as_mut(), &effective) {
            if let Err(quit_err) = driver.quit() {
                tracing::warn!(error = %quit_err, "quit after failed setup also failed");
            }
            return Err(err);
        }
        let session = Session::from_driver(driver, effective);
        tracing::info!(session = %session.id(), "browser session ready");
        *current = Some(session.clone());
        Ok(session)
    }

    /// Quit the live session, if any. Safe to call repeatedly.
    pub fn release(&self) -> HarnessResult<()> {
        let session = self.lock().take();
        if let Some(session) = session {
            session.close()?;
        }
        Ok(())
    }

    /// Live session, if any
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.lock().as_ref().filter(|s| s.is_open()).cloned()
    }

    /// Whether a session is live
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.current().is_some()
    }

    /// Acquire and release on drop of the returned guard
    pub fn scoped(&self, config: &SessionConfig) -> HarnessResult<SessionGuard<'_>> {
        let session = self.acquire(config)?;
        Ok(SessionGuard {
            manager: self,
            session,
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to release session on drop");
        }
    }
}

fn prepare(driver: &mut dyn Driver, config: &SessionConfig) -> HarnessResult<()> {
    driver.set_timeouts(config.implicit_wait(), config.page_load_timeout())?;
    driver.set_window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
}

/// Scoped session that is released when dropped
#[derive(Debug)]
pub struct SessionGuard<'m> {
    manager: &'m SessionManager,
    session: Session,
}

impl SessionGuard<'_> {
    /// Borrow the session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl std::ops::Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.release() {
            tracing::warn!(error = %err, "failed to release scoped session");
        }
    }
}

/// Handle to the background signal listener
#[cfg(unix)]
#[derive(Debug)]
pub struct ShutdownHook {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl ShutdownHook {
    /// Stop listening for signals
    pub fn uninstall(mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("shutdown hook thread panicked");
            }
        }
    }
}

/// Release the manager's session on `SIGINT`/`SIGTERM`, then exit.
///
/// The hook only calls [`SessionManager::release`], which is idempotent, so
/// it is harmless if the caller has already released.
#[cfg(unix)]
pub fn install_shutdown_hook(manager: &Arc<SessionManager>) -> HarnessResult<ShutdownHook> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    let manager = Arc::clone(manager);
    let thread = std::thread::Builder::new()
        .name("staycheck-shutdown".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::warn!(signal, "signal received; releasing browser session");
                if let Err(err) = manager.release() {
                    tracing::error!(error = %err, "release during shutdown failed");
                }
                std::process::exit(128 + signal);
            }
        })?;
    Ok(ShutdownHook {
        handle,
        thread: Some(thread),
    })
}
