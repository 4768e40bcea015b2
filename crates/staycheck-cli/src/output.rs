//! Verdict and diagnostic output

use console::{style, Term};
use serde::{Deserialize, Serialize};
use staycheck::temporal::MatchResult;
use staycheck::ActionOutcome;

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

/// Line-oriented reporter for scenario verdicts
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

impl Reporter {
    /// Reporter on stdout
    #[must_use]
    pub fn new(color: ColorChoice) -> Self {
        Self {
            term: Term::stdout(),
            use_color: color.should_color(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn prefixed(&self, symbol: &str, plain: &str, message: &str, paint: fn(&str) -> String) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a plain line
    pub fn plain(&self, message: &str) {
        self.line(message);
    }

    /// Print a passed check
    pub fn success(&self, message: &str) {
        self.prefixed("✓", "PASS", message, |s| style(s).green().bold().to_string());
    }

    /// Print a failed check
    pub fn failure(&self, message: &str) {
        self.prefixed("✗", "FAIL", message, |s| style(s).red().bold().to_string());
    }

    /// Print a warning
    pub fn warning(&self, message: &str) {
        self.prefixed("⚠", "WARN", message, |s| style(s).yellow().bold().to_string());
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        self.prefixed("ℹ", "INFO", message, |s| style(s).blue().bold().to_string());
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.line("");
        self.line(&styled);
    }

    /// Pass or fail line for a boolean check
    pub fn check(&self, passed: bool, message: &str) -> bool {
        if passed {
            self.success(message);
        } else {
            self.failure(message);
        }
        passed
    }

    /// Reconciliation verdict with every surface reading
    pub fn reconciliation(&self, label: &str, result: &MatchResult) {
        match result.matched {
            Some(source) => self.success(&format!("{label}: {} via {source}", result.expected)),
            None => self.failure(&format!("{label}: {} not reflected", result.expected)),
        }
        for line in result.diagnostic().lines().skip(1) {
            self.line(&format!("    {}", line.trim_start()));
        }
    }

    /// Warn about every action that needed the forced strategy
    pub fn forced_actions(&self, forced: &[ActionOutcome]) {
        for outcome in forced {
            self.warning(&forced_summary(outcome));
        }
    }
}

/// One-line description of a forced action
#[must_use]
pub fn forced_summary(outcome: &ActionOutcome) -> String {
    let blocked: Vec<String> = outcome
        .attempts
        .iter()
        .filter_map(|a| {
            a.intercepted_by
                .as_ref()
                .map(|by| format!("{} blocked by {by}", a.strategy))
        })
        .collect();
    format!(
        "{} on '{}' needed the {} strategy ({})",
        outcome.kind,
        outcome.intent,
        outcome.strategy,
        blocked.join("; ")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use staycheck::action::{ActionKind, StrategyAttempt};
    use staycheck::Strategy;

    #[test]
    fn test_color_choice_explicit() {
        assert!(ColorChoice::Always.should_color());
        assert!(!ColorChoice::Never.should_color());
    }

    #[test]
    fn test_forced_summary_lists_blockers() {
        let outcome = ActionOutcome {
            intent: "Reserve Now button".to_string(),
            kind: ActionKind::Click,
            strategy: Strategy::Forced,
            attempts: vec![
                StrategyAttempt {
                    strategy: Strategy::Direct,
                    intercepted_by: Some("<nav class=\"navbar\">".to_string()),
                },
                StrategyAttempt {
                    strategy: Strategy::Pointer,
                    intercepted_by: Some("<nav class=\"navbar\">".to_string()),
                },
                StrategyAttempt {
                    strategy: Strategy::Forced,
                    intercepted_by: None,
                },
            ],
            path: Vec::new(),
        };
        let text = forced_summary(&outcome);
        assert!(text.starts_with("click on 'Reserve Now button' needed the forced strategy"));
        assert!(text.contains("direct blocked by"));
        assert!(text.contains("pointer blocked by"));
    }

    #[test]
    fn test_check_returns_verdict() {
        let reporter = Reporter::new(ColorChoice::Never);
        assert!(reporter.check(true, "header visible"));
        assert!(!reporter.check(false, "rooms listed"));
    }
}
