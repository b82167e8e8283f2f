//! External tool invocation
//!
//! Every check that talks to a container goes through `CommandRunner`, so
//! tests can substitute scripted output for real processes.

use crate::utils::ExecError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Flags whose following argument is a secret
const SECRET_FLAGS: &[&str] = &[
    "-P",
    "--password",
    "-storepass",
    "-srcstorepass",
    "-deststorepass",
    "-keypass",
];

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,
    pub envs: BTreeMap<String, String>,
    /// Falls back to the runner's default when unset
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            stdin: None,
            envs: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command line for logs, with secret values masked
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("****".to_string());
                mask_next = false;
                continue;
            }
            if arg.starts_with("pass:") {
                parts.push("pass:****".to_string());
                continue;
            }
            mask_next = SECRET_FLAGS.contains(&arg.as_str());
            if arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg.lines().next().unwrap_or_default()));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// Most useful error text: stderr when present, otherwise stdout
    pub fn error_text(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        if text.is_empty() {
            format!("exited with status {}", self.exit_code.map_or("signal".to_string(), |c| c.to_string()))
        } else {
            text.to_string()
        }
    }

    /// Last non-empty stdout line
    pub fn last_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).rev().find(|l| !l.is_empty())
    }
}

/// Runs external tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ExecError>;
}

/// Runs tools as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ExecError> {
        debug!("Running {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.envs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            // A timed-out child is dropped together with the wait future
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| ExecError::Spawn {
            program: invocation.program.clone(),
            message: e.to_string(),
        })?;

        if let (Some(payload), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            let program = invocation.program.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    warn!("Failed to write stdin for {}: {}", program, e);
                }
            });
        }

        let limit = invocation.timeout.unwrap_or(DEFAULT_TIMEOUT);
        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration: start.elapsed(),
                };
                debug!(
                    "{} exited with {:?} in {}ms",
                    invocation.program,
                    result.exit_code,
                    result.duration.as_millis()
                );
                Ok(result)
            }
            Ok(Err(e)) => Err(ExecError::Io {
                program: invocation.program.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(ExecError::Timeout {
                program: invocation.program.clone(),
                secs: limit.as_secs(),
            }),
        }
    }
}

/// `docker exec -i <container> <command...>`
pub fn docker_exec<I, S>(container: &str, command: I) -> ToolInvocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ToolInvocation::new("docker")
        .args(["exec", "-i", container])
        .args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_passwords() {
        let inv = ToolInvocation::new("sqlcmd")
            .args(["-U", "sa", "-P", "Secret123!", "-Q", "SELECT 1"])
            .arg("pass:hunter2");
        let shown = inv.display();
        assert!(!shown.contains("Secret123!"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("'SELECT 1'"));
    }

    #[test]
    fn test_docker_exec_prefix() {
        let inv = docker_exec("kafka", ["kafka-topics.sh", "--list"]);
        assert_eq!(inv.program, "docker");
        assert_eq!(inv.args, vec!["exec", "-i", "kafka", "kafka-topics.sh", "--list"]);
    }

    #[test]
    fn test_output_helpers() {
        let output = ToolOutput {
            exit_code: Some(1),
            stdout: "line one\n{\"ok\":1}\n\n".to_string(),
            stderr: "  ".to_string(),
            duration: Duration::ZERO,
        };
        assert!(!output.success());
        assert_eq!(output.last_line(), Some("{\"ok\":1}"));
        assert_eq!(output.error_text(), "line one\n{\"ok\":1}");
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&ToolInvocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_system_runner_feeds_stdin() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&ToolInvocation::new("cat").stdin("hello from stdin"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello from stdin");
    }

    #[tokio::test]
    async fn test_system_runner_times_out() {
        let runner = SystemRunner::new();
        let start = Instant::now();
        let err = runner
            .run(
                &ToolInvocation::new("sleep")
                    .arg("10")
                    .timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&ToolInvocation::new("definitely-not-a-real-binary-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
