//! Check result types

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Status of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
    Skipped,
}

impl CheckStatus {
    /// Get the icon for this status
    pub fn icon(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Fail => "✗",
            CheckStatus::Skipped => "-",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warning => "WARN",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "SKIP",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}

/// Grouping used for the category breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    Connectivity,
    Health,
    Security,
    Write,
    Read,
    Messaging,
    Cleanup,
    Configuration,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::Connectivity => "Connectivity",
            CheckCategory::Health => "Health",
            CheckCategory::Security => "Security",
            CheckCategory::Write => "Write",
            CheckCategory::Read => "Read",
            CheckCategory::Messaging => "Messaging",
            CheckCategory::Cleanup => "Cleanup",
            CheckCategory::Configuration => "Configuration",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single executed (or skipped) check
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    /// Check name, e.g. "cluster health"
    pub name: String,
    /// Category for the breakdown table
    pub category: CheckCategory,
    /// Result
    pub status: CheckStatus,
    /// Wall time spent in the check
    pub duration_ms: u64,
    /// Informational detail on success or warning
    pub message: Option<String>,
    /// Error text on failure
    pub error: Option<String>,
}

impl CheckOutcome {
    fn new(name: impl Into<String>, category: CheckCategory, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            category,
            status,
            duration_ms: 0,
            message: None,
            error: None,
        }
    }

    /// Create a passing outcome
    pub fn pass(name: impl Into<String>, category: CheckCategory, message: impl Into<String>) -> Self {
        Self::new(name, category, CheckStatus::Pass).with_message(message)
    }

    /// Create a warning outcome
    pub fn warning(
        name: impl Into<String>,
        category: CheckCategory,
        message: impl Into<String>,
    ) -> Self {
        Self::new(name, category, CheckStatus::Warning).with_message(message)
    }

    /// Create a failing outcome
    pub fn fail(name: impl Into<String>, category: CheckCategory, error: impl Into<String>) -> Self {
        let mut outcome = Self::new(name, category, CheckStatus::Fail);
        outcome.error = Some(error.into());
        outcome
    }

    /// Create a skipped outcome
    pub fn skipped(
        name: impl Into<String>,
        category: CheckCategory,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(name, category, CheckStatus::Skipped).with_message(reason)
    }

    /// Create an outcome from a computed status; `detail` becomes the
    /// error for failures and the message otherwise
    pub fn from_status(
        name: impl Into<String>,
        category: CheckCategory,
        status: CheckStatus,
        detail: impl Into<String>,
    ) -> Self {
        match status {
            CheckStatus::Fail => Self::fail(name, category, detail),
            status => Self::new(name, category, status).with_message(detail),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.is_empty()).then_some(message);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Message or error, whichever explains the outcome
    pub fn detail(&self) -> &str {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("")
    }
}
