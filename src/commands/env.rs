//! Env check command implementation

use super::{finish, App};
use crate::config::environment::{OPTIONAL_VARS, REQUIRED_VARS};
use crate::config::Environment;
use crate::models::{CheckCategory, CheckOutcome, RunExit, RunSummary, ServiceReport};
use chrono::Utc;
use std::path::Path;

/// Kibana refuses encryption keys shorter than this
pub const MIN_ENCRYPTION_KEY_LEN: usize = 32;

const ENCRYPTION_KEY_VAR: &str = "KIBANA_ENCRYPTION_KEY";

/// Which variables are set and where they come from; values are never included
pub fn env_report(env: &Environment, env_file: &Path) -> ServiceReport {
    let mut report = ServiceReport::named("Environment");

    let file_check = if env_file.exists() {
        CheckOutcome::pass(
            "env file",
            CheckCategory::Configuration,
            format!("{} found", env_file.display()),
        )
    } else {
        CheckOutcome::warning(
            "env file",
            CheckCategory::Configuration,
            format!("{} not found, using process environment only", env_file.display()),
        )
    };
    report.checks.push(file_check);

    for key in REQUIRED_VARS {
        let outcome = if env.is_set(key) {
            CheckOutcome::pass(*key, CheckCategory::Configuration, source(env, key))
        } else {
            CheckOutcome::fail(*key, CheckCategory::Configuration, "not set")
        };
        report.checks.push(outcome);
    }

    for key in OPTIONAL_VARS {
        let outcome = if env.is_set(key) {
            CheckOutcome::pass(*key, CheckCategory::Configuration, source(env, key))
        } else {
            CheckOutcome::skipped(*key, CheckCategory::Configuration, "not set (optional)")
        };
        report.checks.push(outcome);
    }

    if let Some(key) = env.get(ENCRYPTION_KEY_VAR) {
        let length = key.chars().count();
        if length < MIN_ENCRYPTION_KEY_LEN {
            report.checks.push(CheckOutcome::warning(
                "encryption key length",
                CheckCategory::Security,
                format!(
                    "{} has {} characters, Kibana expects at least {}",
                    ENCRYPTION_KEY_VAR, length, MIN_ENCRYPTION_KEY_LEN
                ),
            ));
        } else {
            report.checks.push(CheckOutcome::pass(
                "encryption key length",
                CheckCategory::Security,
                format!("{} characters", length),
            ));
        }
    }

    report
}

fn source(env: &Environment, key: &str) -> &'static str {
    if env.defined_in_file(key) {
        "set (env file)"
    } else {
        "set (process)"
    }
}

/// Check the environment file and variables
pub async fn run_env_check(app: &App) -> anyhow::Result<RunExit> {
    let started_at = Utc::now();
    let report = env_report(&app.env, &app.env_file);
    let summary = RunSummary::new("env", started_at, vec![report]);
    finish(app.output, &summary)
}
