//! Command handlers
//!
//! Browser scenarios share [`Context::run_scenario`]: one session per invocation,
//! released on return, on drop and on `SIGINT`/`SIGTERM`.

pub mod availability;
pub mod book;
pub mod contact;
pub mod data;
pub mod dates;
pub mod validation;

use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use staycheck::temporal::compute_range;
use staycheck::{ActionConfig, ActionEngine, Clock, DateRange, HarnessConfig, SessionManager, SystemClock};
use std::sync::Arc;

pub use availability::execute_availability;
pub use book::execute_book;
pub use contact::execute_contact;
pub use dates::execute_dates;
pub use validation::execute_booking_validation;

/// Hero heading on the home page
pub const EXPECTED_HEADER: &str = "Welcome to Shady Meadows B&B";

/// Title of the availability section
pub const EXPECTED_BOOKING_TITLE: &str = "Check Availability & Book Your Stay";

/// Heading above the room cards
pub const EXPECTED_ROOMS_HEADER: &str = "Our Rooms";

/// Range starting `offset` days after the clock's today
pub fn stay_range(clock: &dyn Clock, offset: i64, nights: i64) -> CliResult<DateRange> {
    Ok(compute_range(clock.today(), offset, nights)?)
}

/// Everything a browser scenario needs
#[derive(Debug)]
pub struct Context {
    /// Owner of the single browser session
    pub manager: Arc<SessionManager>,
    /// Resolved configuration
    pub config: HarnessConfig,
    /// Verdict output
    pub reporter: Reporter,
    /// Source of "today"
    pub clock: Box<dyn Clock>,
    /// Timeouts and strategies for every action
    pub action_config: ActionConfig,
}

impl Context {
    /// Real browsers and the system clock
    #[must_use]
    pub fn new(config: HarnessConfig, reporter: Reporter) -> Self {
        Self {
            manager: Arc::new(SessionManager::default()),
            config,
            reporter,
            clock: Box::new(SystemClock),
            action_config: ActionConfig::default(),
        }
    }

    /// Use `manager` to start sessions
    #[must_use]
    pub fn with_manager(mut self, manager: SessionManager) -> Self {
        self.manager = Arc::new(manager);
        self
    }

    /// Pin "today"
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Override action timeouts
    #[must_use]
    pub fn with_action_config(mut self, action_config: ActionConfig) -> Self {
        self.action_config = action_config;
        self
    }

    /// Range starting `offset` days after today
    pub fn stay(&self, offset: i64, nights: i64) -> CliResult<DateRange> {
        stay_range(self.clock.as_ref(), offset, nights)
    }

    /// Acquire a session, run `scenario` against it and report the verdict.
    ///
    /// `scenario` returns whether every soft check passed; an `Err` aborts
    /// the scenario at the failing step.
    pub fn run_scenario<F>(&self, name: &str, scenario: F) -> CliResult<()>
    where
        F: FnOnce(&ActionEngine<'_>, &Reporter) -> CliResult<bool>,
    {
        let reporter = &self.reporter;
        reporter.header(name);
        tracing::info!(
            scenario = name,
            browser = %self.config.browser,
            base_url = %self.config.base_url,
            "scenario starting"
        );

        #[cfg(unix)]
        let hook = staycheck::install_shutdown_hook(&self.manager)?;

        let verdict = self.drive(scenario);

        #[cfg(unix)]
        hook.uninstall();
        self.manager.release()?;

        match verdict {
            Ok(true) => {
                reporter.success(&format!("{name}: passed"));
                Ok(())
            }
            Ok(false) => {
                reporter.failure(&format!("{name}: failed"));
                Err(CliError::scenario_failed(name, "one or more checks failed"))
            }
            Err(err) => {
                reporter.failure(&format!("{name}: aborted"));
                Err(err)
            }
        }
    }

    fn drive<F>(&self, scenario: F) -> CliResult<bool>
    where
        F: FnOnce(&ActionEngine<'_>, &Reporter) -> CliResult<bool>,
    {
        let guard = self.manager.scoped(&self.config.session_config())?;
        let actions = ActionEngine::with_config(guard.session(), self.action_config.clone());
        let verdict = scenario(&actions, &self.reporter);
        let forced = actions.forced_actions();
        if !forced.is_empty() {
            tracing::warn!(count = forced.len(), "actions needed the forced strategy");
            self.reporter.forced_actions(&forced);
        }
        verdict
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::output::ColorChoice;
    use chrono::NaiveDate;
    use staycheck::driver::mock::{MockDriver, MockElement};
    use staycheck::{
        Driver, ElementIntent, FixedClock, HarnessError, HarnessResult, Query, SessionConfig,
        Strategy,
    };

    fn mock_context(mock: &MockDriver) -> Context {
        let driver = mock.clone();
        let manager = SessionManager::new(
            move |_: &SessionConfig| -> HarnessResult<Box<dyn Driver>> {
                Ok(Box::new(driver.clone()))
            },
        );
        Context::new(HarnessConfig::default(), Reporter::new(ColorChoice::Never))
            .with_manager(manager)
            .with_clock(FixedClock::new(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
            .with_action_config(ActionConfig::fast())
    }

    #[test]
    fn test_stay_range_from_clock() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2026, 12, 30).unwrap());
        let range = stay_range(&clock, 1, 3).unwrap();
        assert_eq!(range.iso(), ("2026-12-31".to_string(), "2027-01-03".to_string()));
    }

    #[test]
    fn test_stay_range_rejects_zero_nights() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let err = stay_range(&clock, 0, 0).unwrap_err();
        assert!(matches!(
            err,
            CliError::Harness(staycheck::HarnessError::InvalidRange { nights: 0 })
        ));
    }

    mod runner_tests {
        use super::*;

        #[test]
        fn test_passing_scenario_releases_session() {
            let mock = MockDriver::new();
            let ctx = mock_context(&mock);
            ctx.run_scenario("smoke", |actions, _| {
                actions.session().navigate("https://example.test/")?;
                Ok(true)
            })
            .unwrap();
            assert!(mock.was_called("navigate:https://example.test/"));
            assert_eq!(mock.quit_count(), 1);
            assert!(!ctx.manager.is_live());
        }

        #[test]
        fn test_soft_failure_is_scenario_failed() {
            let mock = MockDriver::new();
            let ctx = mock_context(&mock);
            let err = ctx.run_scenario("smoke", |_, _| Ok(false)).unwrap_err();
            assert!(matches!(err, CliError::ScenarioFailed { ref scenario, .. } if scenario == "smoke"));
            assert_eq!(mock.quit_count(), 1);
        }

        #[test]
        fn test_step_error_aborts_and_releases() {
            let mock = MockDriver::new();
            let ctx = mock_context(&mock);
            let err = ctx
                .run_scenario("smoke", |actions, _| {
                    actions.click(&ElementIntent::new("Missing button").css("#missing"))?;
                    Ok(true)
                })
                .unwrap_err();
            assert!(matches!(
                err,
                CliError::Harness(HarnessError::ElementNotVisible { .. })
            ));
            assert_eq!(err.exit_status(), 1);
            assert_eq!(mock.quit_count(), 1);
        }

        #[test]
        fn test_forced_actions_do_not_fail_the_scenario() {
            let mock = MockDriver::new();
            mock.add(
                MockElement::new("reserve")
                    .bind(Query::css("#reserve"))
                    .block(Strategy::Direct)
                    .block(Strategy::Pointer),
            );
            let ctx = mock_context(&mock);
            ctx.run_scenario("smoke", |actions, _| {
                let outcome = actions.click(&ElementIntent::new("Reserve").css("#reserve"))?;
                Ok(outcome.was_forced())
            })
            .unwrap();
        }

        #[test]
        fn test_startup_failure_is_fatal() {
            let manager = SessionManager::new(
                |config: &SessionConfig| -> HarnessResult<Box<dyn Driver>> {
                    Err(HarnessError::SessionStartup {
                        backend: config.backend.to_string(),
                        message: "no chrome".to_string(),
                    })
                },
            );
            let ctx = Context::new(HarnessConfig::default(), Reporter::new(ColorChoice::Never))
                .with_manager(manager);
            let err = ctx.run_scenario("smoke", |_, _| Ok(true)).unwrap_err();
            assert_eq!(err.exit_status(), 2);
        }

        #[test]
        fn test_context_stay_uses_pinned_clock() {
            let ctx = mock_context(&MockDriver::new());
            let range = ctx.stay(2, 1).unwrap();
            assert_eq!(range.iso(), ("2026-03-03".to_string(), "2026-03-04".to_string()));
        }
    }
}
