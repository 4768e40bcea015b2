//! Local WebDriver executables.
//!
//! A [`DriverService`] spawns `geckodriver`, `msedgedriver`, `safaridriver` or
//! `chromedriver` on a free loopback port and waits for its `/status`
//! endpoint to report ready. The child is killed on [`DriverService::stop`]
//! or drop.

use crate::result::{HarnessError, HarnessResult};
use crate::session::Backend;
use crate::wait::{WaitOptions, Waiter};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use tokio::runtime::Runtime;

/// How long a freshly spawned driver gets to answer `/status`
pub const SERVICE_READY_TIMEOUT_MS: u64 = 20_000;

/// Executable serving WebDriver for `backend`
#[must_use]
pub const fn executable(backend: Backend) -> &'static str {
    match backend {
        Backend::Chrome => "chromedriver",
        Backend::Firefox => "geckodriver",
        Backend::Edge => "msedgedriver",
        Backend::Safari => "safaridriver",
    }
}

fn port_args(backend: Backend, port: u16) -> Vec<String> {
    match backend {
        Backend::Firefox => vec!["--port".to_string(), port.to_string()],
        Backend::Safari => vec!["-p".to_string(), port.to_string()],
        Backend::Chrome | Backend::Edge => vec![format!("--port={port}")],
    }
}

fn free_port() -> HarnessResult<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Running driver executable
#[derive(Debug)]
pub struct DriverService {
    backend: Backend,
    port: u16,
    child: Option<Child>,
}

impl DriverService {
    /// Spawn the driver for `backend` and wait until it is ready
    pub fn start(backend: Backend, runtime: &Runtime) -> HarnessResult<Self> {
        let program = executable(backend);
        let port = free_port()?;
        let child = Command::new(program)
            .args(port_args(backend, port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarnessError::SessionStartup {
                backend: backend.to_string(),
                message: format!("cannot start {program}: {e}"),
            })?;
        let mut service = Self {
            backend,
            port,
            child: Some(child),
        };
        tracing::debug!(program, port, "driver service spawned");

        if let Err(err) = service.wait_ready(runtime) {
            service.stop();
            return Err(err);
        }
        tracing::info!(program, port, "driver service ready");
        Ok(service)
    }

    /// Loopback URL of the service
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn wait_ready(&mut self, runtime: &Runtime) -> HarnessResult<()> {
        let status_url = format!("{}/status", self.endpoint());
        let client = reqwest::Client::new();
        let waiter = Waiter::new(
            WaitOptions::new()
                .with_timeout(SERVICE_READY_TIMEOUT_MS)
                .with_poll_interval(250),
        );
        let backend = self.backend;
        let mut child = self.child.as_mut();
        let outcome = waiter.poll(|| {
            if let Some(child) = child.as_deref_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(HarnessError::SessionStartup {
                        backend: backend.to_string(),
                        message: format!("{} exited early ({status})", executable(backend)),
                    });
                }
            }
            let ready = runtime.block_on(async {
                client
                    .get(&status_url)
                    .send()
                    .await
                    .is_ok_and(|r| r.status().is_success())
            });
            Ok(ready.then_some(()))
        })?;
        outcome.map(|_| ()).map_err(|_| HarnessError::SessionStartup {
            backend: backend.to_string(),
            message: format!(
                "{} did not answer {status_url} within {SERVICE_READY_TIMEOUT_MS}ms",
                executable(backend)
            ),
        })
    }

    /// Kill the child; idempotent
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(program = executable(self.backend), "driver service stopped");
        }
    }
}

impl Drop for DriverService {
    fn drop(&mut self) {
        self.stop();
    }
}
