//! Recording of timed checks

use crate::models::{CheckCategory, CheckOutcome, CheckStatus};
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

/// What a check concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass(String),
    Warn(String),
    Fail(String),
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Verdict::Pass(message.into())
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Verdict::Warn(message.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Verdict::Fail(message.into())
    }

    pub fn status(&self) -> CheckStatus {
        match self {
            Verdict::Pass(_) => CheckStatus::Pass,
            Verdict::Warn(_) => CheckStatus::Warning,
            Verdict::Fail(_) => CheckStatus::Fail,
        }
    }
}

/// Ordered outcomes of one service's checks
#[derive(Debug, Default)]
pub struct Checklist {
    outcomes: Vec<CheckOutcome>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run and time one check
    ///
    /// Returns `false` when the check failed, so dependent checks can be skipped.
    pub async fn record<F>(&mut self, name: &str, category: CheckCategory, check: F) -> bool
    where
        F: Future<Output = anyhow::Result<Verdict>>,
    {
        let start = Instant::now();
        let verdict = match check.await {
            Ok(verdict) => verdict,
            Err(e) => Verdict::Fail(format!("{:#}", e)),
        };
        let elapsed = start.elapsed();

        let outcome = match verdict {
            Verdict::Pass(message) => {
                debug!("{}: passed in {}ms", name, elapsed.as_millis());
                CheckOutcome::pass(name, category, message)
            }
            Verdict::Warn(message) => {
                warn!("{}: {}", name, message);
                CheckOutcome::warning(name, category, message)
            }
            Verdict::Fail(error) => {
                warn!("{}: failed: {}", name, error);
                CheckOutcome::fail(name, category, error)
            }
        }
        .with_duration(elapsed);

        let passed = outcome.status != CheckStatus::Fail;
        self.outcomes.push(outcome);
        passed
    }

    /// Record a check that was not run
    pub fn skip(&mut self, name: &str, category: CheckCategory, reason: impl Into<String>) {
        self.outcomes
            .push(CheckOutcome::skipped(name, category, reason));
    }

    /// Record a failure detected before any check ran
    pub fn fail(&mut self, name: &str, category: CheckCategory, error: impl Into<String>) {
        self.outcomes.push(CheckOutcome::fail(name, category, error));
    }

    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<CheckOutcome> {
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let mut checks = Checklist::new();
        let passed = checks
            .record("ping", CheckCategory::Connectivity, async {
                Err::<Verdict, _>(anyhow::anyhow!("connection refused"))
            })
            .await;

        assert!(!passed);
        let outcome = &checks.outcomes()[0];
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_warning_counts_as_passed() {
        let mut checks = Checklist::new();
        let passed = checks
            .record("health", CheckCategory::Health, async {
                Ok::<_, anyhow::Error>(Verdict::warn("yellow"))
            })
            .await;
        checks.skip("cleanup", CheckCategory::Cleanup, "skipped");

        assert!(passed);
        let outcomes = checks.into_outcomes();
        assert_eq!(outcomes[0].status, CheckStatus::Warning);
        assert_eq!(outcomes[1].status, CheckStatus::Skipped);
    }
}
