//! Status command implementation

use super::{finish, App};
use crate::cli::StatusArgs;
use crate::compose::{container_report, ComposeCli};
use crate::models::{RunExit, RunSummary, ServiceKind};
use crate::utils::print_warning;
use crate::utils::ComposeError;
use chrono::Utc;
use std::time::Duration;

/// Show container health, optionally waiting for it
pub async fn run_status(app: &App, args: &StatusArgs) -> anyhow::Result<RunExit> {
    let started_at = Utc::now();
    let compose = ComposeCli::new(&app.settings.compose);
    let services = if args.services.is_empty() {
        ServiceKind::ALL.to_vec()
    } else {
        args.services.clone()
    };

    let states = match args.wait {
        Some(secs) => {
            let waited = compose
                .wait_healthy(
                    app.runner.as_ref(),
                    &services,
                    Duration::from_secs(secs),
                    app.settings.compose.health_poll_interval(),
                )
                .await;
            match waited {
                Ok(states) => states,
                Err(e @ ComposeError::NotHealthy { .. }) => {
                    if app.output.text() {
                        print_warning(&e.to_string());
                    }
                    compose.ps(app.runner.as_ref()).await?
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => compose.ps(app.runner.as_ref()).await?,
    };

    let report = container_report(&states, &services);
    let summary = RunSummary::new("status", started_at, vec![report]);
    finish(app.output, &summary)
}
