//! Test orchestration engine
//!
//! Runs service testers sequentially or with bounded parallelism, isolates
//! each one in its own task under a timeout, and aggregates their outcomes
//! into a `RunSummary`. Progress is reported through `RunEvent`s so any
//! frontend can drive it.

use crate::compose::{find_service, ComposeCli};
use crate::config::Settings;
use crate::models::{
    CheckCategory, CheckOutcome, CheckStatus, RunSummary, ServiceKind, ServiceReport, Tally,
};
use crate::services::{ServiceTester, TestContext};
use crate::utils::{ComposeError, ConfigError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configuration for a test run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub services: Vec<ServiceKind>,
    pub parallel: bool,
    pub max_parallel: usize,
    pub service_timeout: Duration,
    pub skip_cleanup: bool,
    /// Services found not running by the preflight, with the reason
    pub blocked: BTreeMap<ServiceKind, String>,
}

impl RunConfig {
    pub fn new(services: Vec<ServiceKind>, settings: &Settings) -> Self {
        Self {
            services,
            parallel: false,
            max_parallel: settings.runner.max_parallel,
            service_timeout: settings.runner.service_timeout(),
            skip_cleanup: false,
            blocked: BTreeMap::new(),
        }
    }
}

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum RunEvent {
    ServiceStarted {
        service: ServiceKind,
        index: usize,
        total: usize,
    },
    ServiceFinished {
        service: ServiceKind,
        status: CheckStatus,
        tally: Tally,
        duration_ms: u64,
    },
}

/// Resolve the services to test, in canonical order
///
/// An empty `include` means every service.
pub fn select_services(
    include: &[ServiceKind],
    exclude: &[ServiceKind],
) -> Result<Vec<ServiceKind>, ConfigError> {
    let selected: Vec<ServiceKind> = ServiceKind::ALL
        .into_iter()
        .filter(|s| include.is_empty() || include.contains(s))
        .filter(|s| !exclude.contains(s))
        .collect();

    if selected.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "services".to_string(),
            message: "no services left to test after include/exclude filters".to_string(),
        });
    }
    Ok(selected)
}

/// Check container state before testing and block services that are not running
pub async fn preflight(
    ctx: &TestContext,
    compose: &ComposeCli,
    config: &mut RunConfig,
) -> Result<(), ComposeError> {
    let states = compose.ps(ctx.runner.as_ref()).await?;
    for service in &config.services {
        let reason = match find_service(&states, *service) {
            Some(state) if state.is_running() => continue,
            Some(state) => state.status().1,
            None => "no container for service".to_string(),
        };
        warn!("{} is not running: {}", service, reason);
        config.blocked.insert(*service, reason);
    }
    Ok(())
}

/// Run every tester and aggregate the results
///
/// Reports come back in the order of `testers`, whatever the completion order.
pub async fn run_all(
    ctx: &TestContext,
    config: &RunConfig,
    testers: Vec<Arc<dyn ServiceTester>>,
    on_event: &dyn Fn(RunEvent),
) -> RunSummary {
    let started_at = Utc::now();
    let total = testers.len();
    let ctx = ctx.clone().with_skip_cleanup(config.skip_cleanup);

    info!(
        "Run {} testing {} service(s){}",
        ctx.run_id,
        total,
        if config.parallel { " in parallel" } else { "" }
    );

    let reports = if config.parallel {
        let mut indexed: Vec<(usize, ServiceReport)> = stream::iter(testers.into_iter().enumerate())
            .map(|(index, tester)| {
                let ctx = ctx.clone();
                async move {
                    let report = run_service(ctx, config, tester, index, total, on_event).await;
                    (index, report)
                }
            })
            .buffer_unordered(config.max_parallel.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, report)| report).collect()
    } else {
        let mut reports = Vec::with_capacity(total);
        for (index, tester) in testers.into_iter().enumerate() {
            reports.push(run_service(ctx.clone(), config, tester, index, total, on_event).await);
        }
        reports
    };

    RunSummary::new(ctx.run_id.clone(), started_at, reports)
}

async fn run_service(
    ctx: TestContext,
    config: &RunConfig,
    tester: Arc<dyn ServiceTester>,
    index: usize,
    total: usize,
    on_event: &dyn Fn(RunEvent),
) -> ServiceReport {
    let service = tester.kind();
    on_event(RunEvent::ServiceStarted {
        service,
        index,
        total,
    });

    let report = match config.blocked.get(&service) {
        Some(reason) => blocked_report(service, reason),
        None => isolate(ctx, tester, config.service_timeout).await,
    };

    info!(
        "{} finished: {} in {}ms",
        service,
        report.status().label(),
        report.duration_ms
    );
    on_event(RunEvent::ServiceFinished {
        service,
        status: report.status(),
        tally: report.tally(),
        duration_ms: report.duration_ms,
    });
    report
}

fn blocked_report(service: ServiceKind, reason: &str) -> ServiceReport {
    let mut report = ServiceReport::for_service(service);
    report.checks.push(CheckOutcome::fail(
        "container",
        CheckCategory::Connectivity,
        format!("container not running: {}", reason),
    ));
    report
}

/// Run one tester in its own task, bounded by `limit`
async fn isolate(ctx: TestContext, tester: Arc<dyn ServiceTester>, limit: Duration) -> ServiceReport {
    let service = tester.kind();
    let mut report = ServiceReport::for_service(service);
    let start = Instant::now();

    let handle = tokio::spawn(async move { tester.run(&ctx).await });
    let abort = handle.abort_handle();

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(checks)) => report.checks = checks,
        Ok(Err(e)) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            warn!("{} tester panicked: {}", service, message);
            report = report.with_error(format!("tester panicked: {}", message));
        }
        Ok(Err(e)) => {
            report = report.with_error(format!("tester task failed: {}", e));
        }
        Err(_) => {
            // dropping the task kills any child process it was waiting on
            abort.abort();
            warn!("{} timed out after {}s", service, limit.as_secs());
            report = report.with_error(format!("timed out after {}s", limit.as_secs()));
        }
    }

    report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    report
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
