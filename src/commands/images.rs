//! Images command implementation

use super::{finish, App};
use crate::cli::ImagesBuildArgs;
use crate::images::{ImageOptions, ImagePipeline};
use crate::models::{RunExit, RunSummary};
use crate::utils::{create_spinner, print_warning};
use chrono::Utc;

/// Build (and optionally push) service images
pub async fn run_images_build(app: &App, args: &ImagesBuildArgs) -> anyhow::Result<RunExit> {
    let started_at = Utc::now();
    let options = ImageOptions {
        registry_prefix: args.registry_prefix.clone(),
        tag: args.image_tag.clone(),
        push: args.push_images,
        services: args.include_services.clone(),
    };
    let pipeline = ImagePipeline::new(app.runner.as_ref(), &app.settings.images, &app.env, options);

    let message = if args.push_images {
        "Building and pushing images..."
    } else {
        "Building images..."
    };
    let spinner = create_spinner(message, app.output.progress());
    let reports = pipeline.run().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if reports.is_empty() && app.output.text() {
        print_warning("No images configured for the selected services");
    }

    let summary = RunSummary::new("images", started_at, reports);
    finish(app.output, &summary)
}
