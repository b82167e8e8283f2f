//! Certificate command implementations

use super::App;
use crate::certs::{inspect_dir, inspection_report, CertPlan, PlanRequest, StepAction};
use crate::cli::{CertsGenerateArgs, CertsInspectArgs};
use crate::config::CertSettings;
use crate::models::{RunExit, RunSummary};
use crate::output::{overall_line, print_cert_summaries, print_header, print_json};
use crate::utils::{print_info, print_pass, print_warning, ProgressTracker};
use chrono::Utc;
use serde_json::json;

/// Generate the CA and service certificates
pub async fn run_certs_generate(app: &App, args: &CertsGenerateArgs) -> anyhow::Result<RunExit> {
    let mut settings: CertSettings = app.settings.certs.clone();
    if let Some(dir) = &args.out_dir {
        settings.out_dir = dir.clone();
    }
    let services = if args.services.is_empty() {
        settings.services.clone()
    } else {
        args.services.clone()
    };

    let password = app.env.get(&settings.keystore_password_env);
    let request = PlanRequest {
        services: &services,
        keystore_password: password.as_deref(),
        force: args.force,
    };
    let plan = CertPlan::build(&settings, &request, |p| p.exists())?;

    if args.dry_run {
        if app.output.json {
            print_json(&plan_json(&plan))?;
        } else if app.output.text() {
            print_header("Certificate plan (dry run)");
            print!("{}", plan);
        }
        return Ok(RunExit::Success);
    }

    if plan.is_empty() {
        if app.output.text() {
            print_info(&format!(
                "All certificates present in {} (use --force to regenerate)",
                settings.out_dir.display()
            ));
        }
        return Ok(RunExit::Success);
    }

    let tracker = ProgressTracker::new(plan.steps.len(), app.output.progress());
    let result = plan
        .execute(app.runner.as_ref(), &|_, step| {
            tracker.complete_step(&format!("  {}", step.description));
        })
        .await;
    tracker.finish_and_clear();
    let written = result?;

    if app.output.json {
        print_json(&json!({
            "out_dir": settings.out_dir,
            "steps": written,
            "kept": plan.skipped,
        }))?;
    } else if app.output.text() {
        print_pass(&format!(
            "Generated certificates in {} ({} steps)",
            settings.out_dir.display(),
            written
        ));
    }
    Ok(RunExit::Success)
}

fn plan_json(plan: &CertPlan) -> serde_json::Value {
    let steps: Vec<serde_json::Value> = plan
        .steps
        .iter()
        .map(|step| {
            let command = match &step.action {
                StepAction::Tool(invocation) => Some(invocation.display()),
                _ => None,
            };
            json!({
                "description": step.description,
                "output": step.output,
                "command": command,
            })
        })
        .collect();
    json!({ "steps": steps, "kept": plan.skipped })
}

/// Report validity of the generated certificates
pub async fn run_certs_inspect(app: &App, args: &CertsInspectArgs) -> anyhow::Result<RunExit> {
    let started_at = Utc::now();
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| app.settings.certs.out_dir.clone());

    let summaries = inspect_dir(&dir)?;
    if summaries.is_empty() {
        if app.output.text() {
            print_warning(&format!("No certificates found in {}", dir.display()));
        }
        return Ok(RunExit::Unknown);
    }

    let report = inspection_report(&summaries, &dir);
    let summary = RunSummary::new("certs", started_at, vec![report]);

    if app.output.json {
        print_json(&json!({
            "certificates": summaries,
            "status": summary.overall_status(),
        }))?;
    } else if app.output.text() {
        print_cert_summaries(&summaries);
        println!();
        println!("  {}", overall_line(&summary));
    }
    Ok(summary.exit_code())
}
