//! Test command implementation

use super::{finish, App};
use crate::cli::TestArgs;
use crate::compose::ComposeCli;
use crate::models::RunExit;
use crate::output::{service_line, write_json_file};
use crate::runner::{preflight, run_all, select_services, RunConfig, RunEvent};
use crate::services::{testers_for, TestContext};
use crate::utils::ProgressTracker;
use anyhow::Context;
use std::time::Duration;

/// Run the functional tests
pub async fn run_test(app: &App, args: &TestArgs) -> anyhow::Result<RunExit> {
    let services = select_services(&args.include_services, &args.exclude_services)?;

    let ctx = TestContext::new(
        app.runner.clone(),
        app.settings.clone(),
        app.env.clone(),
        args.skip_cleanup,
    )?;

    let mut config = RunConfig::new(services, &app.settings);
    config.parallel = args.parallel;
    config.skip_cleanup = args.skip_cleanup;
    if let Some(max) = args.max_parallel {
        config.max_parallel = usize::from(max);
    }
    if let Some(secs) = args.timeout {
        config.service_timeout = Duration::from_secs(secs);
    }

    if args.preflight {
        let compose = ComposeCli::new(&app.settings.compose);
        preflight(&ctx, &compose, &mut config)
            .await
            .context("Preflight container check failed")?;
    }

    let tracker = ProgressTracker::new(config.services.len(), app.output.progress());
    let on_event = |event: RunEvent| match event {
        RunEvent::ServiceStarted { service, .. } => {
            tracker.set_message(&format!("Testing {}...", service));
        }
        RunEvent::ServiceFinished {
            service,
            status,
            tally,
            duration_ms,
        } => {
            tracker.complete_step(&service_line(
                service.display_name(),
                status,
                &tally,
                duration_ms,
            ));
        }
    };

    let testers = testers_for(&config.services);
    let summary = run_all(&ctx, &config, testers, &on_event).await;
    tracker.finish_and_clear();

    if let Some(path) = &args.output {
        write_json_file(&summary, path)?;
    }
    finish(app.output, &summary)
}
