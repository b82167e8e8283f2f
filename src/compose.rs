//! Docker Compose wrapper
//!
//! Lifecycle (`up -d`, `down`) and container state (`ps --format json`) for
//! the stack. All commands go through `CommandRunner`.

use crate::config::ComposeSettings;
use crate::exec::{CommandRunner, ToolInvocation, ToolOutput};
use crate::models::{CheckCategory, CheckOutcome, CheckStatus, ServiceKind, ServiceReport};
use crate::utils::ComposeError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(600);

/// One container as reported by `ps --format json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContainerState {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: String,
    /// Human readable status, e.g. `Up 2 minutes (healthy)`
    #[serde(rename = "Status", default)]
    pub status_text: String,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i32,
}

impl ContainerState {
    /// Health from the `Health` field, falling back to the status text
    pub fn health(&self) -> Option<&str> {
        if !self.health.is_empty() {
            return Some(self.health.as_str());
        }
        [
            ("(unhealthy)", "unhealthy"),
            ("(healthy)", "healthy"),
            ("(health: starting)", "starting"),
        ]
        .into_iter()
        .find(|(marker, _)| self.status_text.contains(marker))
        .map(|(_, health)| health)
    }

    pub fn status(&self) -> (CheckStatus, String) {
        match (self.state.as_str(), self.health()) {
            ("running", Some("healthy")) => (CheckStatus::Pass, "running (healthy)".to_string()),
            ("running", None) => (CheckStatus::Pass, "running (no health check)".to_string()),
            ("running", Some("starting")) => {
                (CheckStatus::Warning, "running (health: starting)".to_string())
            }
            ("running", Some(health)) => (CheckStatus::Fail, format!("running ({})", health)),
            ("exited", _) => (
                CheckStatus::Fail,
                format!("exited with code {}", self.exit_code),
            ),
            (state, _) => (CheckStatus::Fail, state.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Parse `ps --format json`: a JSON array (older Compose v2) or one object per line
pub fn parse_ps(stdout: &str) -> Result<Vec<ContainerState>, ComposeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| ComposeError::ParseError {
            message: e.to_string(),
        });
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| ComposeError::ParseError {
                message: format!("{}: {}", e, line),
            })
        })
        .collect()
}

/// State of one stack service, if a container exists for it
pub fn find_service<'a>(
    states: &'a [ContainerState],
    service: ServiceKind,
) -> Option<&'a ContainerState> {
    states.iter().find(|s| s.service == service.as_str())
}

/// Per-service container checks, for `status` and the test preflight
pub fn container_report(states: &[ContainerState], services: &[ServiceKind]) -> ServiceReport {
    let mut report = ServiceReport::named("Containers");
    for service in services {
        let outcome = match find_service(states, *service) {
            Some(state) => {
                let (status, message) = state.status();
                CheckOutcome::from_status(service.as_str(), CheckCategory::Health, status, message)
            }
            None => CheckOutcome::fail(service.as_str(), CheckCategory::Health, "no container"),
        };
        report.checks.push(outcome);
    }
    report
}

/// Docker Compose invocation
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
}

impl ComposeCli {
    pub fn new(settings: &ComposeSettings) -> Self {
        let mut base_args = settings.args.clone();
        if let Some(file) = &settings.file {
            base_args.push("-f".to_string());
            base_args.push(file.display().to_string());
        }
        if let Some(project) = &settings.project {
            base_args.push("-p".to_string());
            base_args.push(project.clone());
        }
        Self {
            program: settings.program.clone(),
            base_args,
        }
    }

    pub fn invocation<I, S>(&self, args: I) -> ToolInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolInvocation::new(&self.program)
            .args(self.base_args.iter().cloned())
            .args(args)
    }

    async fn run_checked(
        &self,
        runner: &dyn CommandRunner,
        action: &str,
        invocation: ToolInvocation,
    ) -> Result<ToolOutput, ComposeError> {
        let output = runner.run(&invocation).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ComposeError::CommandFailed {
                action: action.to_string(),
                message: output.error_text(),
            })
        }
    }

    pub async fn ps(&self, runner: &dyn CommandRunner) -> Result<Vec<ContainerState>, ComposeError> {
        let output = self
            .run_checked(runner, "ps", self.invocation(["ps", "--all", "--format", "json"]))
            .await?;
        let states = parse_ps(&output.stdout)?;
        debug!("compose ps reported {} container(s)", states.len());
        Ok(states)
    }

    pub async fn up(&self, runner: &dyn CommandRunner) -> Result<(), ComposeError> {
        info!("Starting the stack");
        self.run_checked(
            runner,
            "up",
            self.invocation(["up", "-d"]).timeout(LIFECYCLE_TIMEOUT),
        )
        .await?;
        Ok(())
    }

    pub async fn down(&self, runner: &dyn CommandRunner, volumes: bool) -> Result<(), ComposeError> {
        info!("Stopping the stack (volumes: {})", volumes);
        let mut invocation = self.invocation(["down"]);
        if volumes {
            invocation = invocation.arg("-v");
        }
        self.run_checked(runner, "down", invocation.timeout(LIFECYCLE_TIMEOUT))
            .await?;
        Ok(())
    }

    /// Poll `ps` until every service passes, or fail after `timeout`
    pub async fn wait_healthy(
        &self,
        runner: &dyn CommandRunner,
        services: &[ServiceKind],
        timeout: Duration,
        interval: Duration,
    ) -> Result<Vec<ContainerState>, ComposeError> {
        let start = Instant::now();
        loop {
            let states = self.ps(runner).await?;
            let pending = pending_services(&states, services);
            if pending.is_empty() {
                info!("All services healthy after {}s", start.elapsed().as_secs());
                return Ok(states);
            }

            if start.elapsed() + interval > timeout {
                return Err(ComposeError::NotHealthy {
                    secs: timeout.as_secs(),
                    services: pending
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            debug!("Waiting for: {:?}", pending);
            tokio::time::sleep(interval).await;
        }
    }
}

/// Services whose container is missing or not yet passing
pub fn pending_services(states: &[ContainerState], services: &[ServiceKind]) -> Vec<ServiceKind> {
    services
        .iter()
        .copied()
        .filter(|service| {
            find_service(states, *service)
                .map(|s| s.status().0 != CheckStatus::Pass)
                .unwrap_or(true)
        })
        .collect()
}
