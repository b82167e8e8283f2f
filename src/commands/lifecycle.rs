//! Up and down command implementations

use super::{run_status, App};
use crate::cli::{DownArgs, StatusArgs, UpArgs};
use crate::compose::ComposeCli;
use crate::models::RunExit;
use crate::utils::{create_spinner, print_pass};

/// Start the stack, optionally waiting for healthy containers
pub async fn run_up(app: &App, args: &UpArgs) -> anyhow::Result<RunExit> {
    let compose = ComposeCli::new(&app.settings.compose);

    let spinner = create_spinner("Starting containers...", app.output.progress());
    let result = compose.up(app.runner.as_ref()).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    result?;

    if app.output.text() {
        print_pass("Stack started");
    }

    match args.wait {
        Some(secs) => {
            let status = StatusArgs {
                wait: Some(secs),
                services: vec![],
            };
            run_status(app, &status).await
        }
        None => Ok(RunExit::Success),
    }
}

/// Stop the stack
pub async fn run_down(app: &App, args: &DownArgs) -> anyhow::Result<RunExit> {
    let compose = ComposeCli::new(&app.settings.compose);
    compose.down(app.runner.as_ref(), args.volumes).await?;

    if app.output.text() {
        if args.volumes {
            print_pass("Stack stopped and volumes removed");
        } else {
            print_pass("Stack stopped");
        }
    }
    Ok(RunExit::Success)
}
