//! Per-service reports and the aggregated run summary

use super::{CheckCategory, CheckOutcome, CheckStatus, ServiceKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Process exit code for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunExit {
    Success,
    Warning,
    Failure,
    Unknown,
}

impl RunExit {
    pub fn code(&self) -> i32 {
        match self {
            RunExit::Success => 0,
            RunExit::Warning => 1,
            RunExit::Failure => 2,
            RunExit::Unknown => 3,
        }
    }
}

/// Counters over a set of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl Tally {
    pub fn add(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Warning => self.warnings += 1,
            CheckStatus::Fail => self.failed += 1,
            CheckStatus::Skipped => self.skipped += 1,
        }
        self.total += 1;
    }

    /// Checks that actually ran
    pub fn executed(&self) -> usize {
        self.total - self.skipped
    }

    /// Percentage of executed checks that passed (warnings count as passed)
    pub fn pass_rate(&self) -> f64 {
        let executed = self.executed();
        if executed == 0 {
            return 0.0;
        }
        (self.passed + self.warnings) as f64 * 100.0 / executed as f64
    }

    pub fn merge(&mut self, other: &Tally) {
        self.passed += other.passed;
        self.warnings += other.warnings;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.total += other.total;
    }
}

/// All outcomes for one service (or one image/cert target)
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    /// Display name of what was tested
    pub name: String,
    /// Stack service, when the report belongs to one
    pub service: Option<ServiceKind>,
    /// Individual checks, in execution order
    pub checks: Vec<CheckOutcome>,
    /// Error that stopped the whole service (timeout, panic)
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ServiceReport {
    /// Create an empty report for a stack service
    pub fn for_service(service: ServiceKind) -> Self {
        Self::named(service.display_name()).with_service(service)
    }

    /// Create an empty report with an arbitrary name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
            checks: vec![],
            error: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn with_service(mut self, service: ServiceKind) -> Self {
        self.service = Some(service);
        self
    }

    /// Mark the whole service as failed
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for check in &self.checks {
            tally.add(check.status);
        }
        tally
    }

    /// Overall status of the service
    pub fn status(&self) -> CheckStatus {
        let tally = self.tally();
        if self.error.is_some() || tally.failed > 0 {
            CheckStatus::Fail
        } else if tally.warnings > 0 {
            CheckStatus::Warning
        } else if tally.passed > 0 {
            CheckStatus::Pass
        } else {
            CheckStatus::Skipped
        }
    }
}

/// Aggregated results of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub reports: Vec<ServiceReport>,
}

impl RunSummary {
    /// Build a summary from finished reports
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>, reports: Vec<ServiceReport>) -> Self {
        let finished_at = Utc::now();
        let duration_ms = u64::try_from((finished_at - started_at).num_milliseconds()).unwrap_or(0);
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at,
            duration_ms,
            reports,
        }
    }

    /// Counters over every check in the run
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for report in &self.reports {
            tally.merge(&report.tally());
        }
        tally
    }

    /// Counters grouped by check category
    pub fn tally_by_category(&self) -> BTreeMap<CheckCategory, Tally> {
        let mut by_category: BTreeMap<CheckCategory, Tally> = BTreeMap::new();
        for check in self.reports.iter().flat_map(|r| &r.checks) {
            by_category.entry(check.category).or_default().add(check.status);
        }
        by_category
    }

    /// Worst status across services
    pub fn overall_status(&self) -> CheckStatus {
        let statuses: Vec<CheckStatus> = self.reports.iter().map(|r| r.status()).collect();

        if statuses.contains(&CheckStatus::Fail) {
            CheckStatus::Fail
        } else if statuses.contains(&CheckStatus::Warning) {
            CheckStatus::Warning
        } else if statuses.contains(&CheckStatus::Pass) {
            CheckStatus::Pass
        } else {
            CheckStatus::Skipped
        }
    }

    pub fn exit_code(&self) -> RunExit {
        match self.overall_status() {
            CheckStatus::Pass => RunExit::Success,
            CheckStatus::Warning => RunExit::Warning,
            CheckStatus::Fail => RunExit::Failure,
            CheckStatus::Skipped => RunExit::Unknown,
        }
    }
}
