//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use stack_doctor::config::{Environment, Settings};
use stack_doctor::exec::{CommandRunner, ToolInvocation, ToolOutput};
use stack_doctor::services::TestContext;
use stack_doctor::utils::ExecError;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const RUN_ID: &str = "abcd1234";

pub fn ok(stdout: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(5),
    }
}

pub fn failed(stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(5),
    }
}

struct Rule {
    needle: String,
    replies: VecDeque<ToolOutput>,
}

/// Answers invocations by substring match on the command line
///
/// Each rule replays its replies in order and repeats the last one.
/// Unmatched invocations get `fallback`.
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ToolInvocation>>,
    fallback: ToolOutput,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fallback: failed("no scripted reply"),
        }
    }

    /// Unmatched invocations succeed with empty output
    pub fn succeeding() -> Self {
        Self {
            fallback: ok(""),
            ..Self::new()
        }
    }

    pub fn on(self, needle: &str, replies: Vec<ToolOutput>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| command_line(c).contains(needle))
            .count()
    }
}

fn command_line(invocation: &ToolInvocation) -> String {
    let mut parts = vec![invocation.program.clone()];
    parts.extend(invocation.args.iter().cloned());
    parts.join(" ")
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = command_line(invocation);

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if line.contains(&rule.needle) {
                let reply = if rule.replies.len() > 1 {
                    rule.replies.pop_front()
                } else {
                    rule.replies.front().cloned()
                };
                return Ok(reply.unwrap_or_else(|| ok("")));
            }
        }
        Ok(self.fallback.clone())
    }
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.elasticsearch.ca_cert = None;
    settings.retry.delay_ms = 1;
    settings
}

pub fn context(runner: Arc<ScriptedRunner>, settings: Settings, env: &[(&str, &str)]) -> TestContext {
    TestContext::new(
        runner,
        Arc::new(settings),
        Arc::new(Environment::from_pairs(env.iter().copied())),
        false,
    )
    .unwrap()
    .with_run_id(RUN_ID)
}

pub type Route = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

/// Minimal HTTP/1.1 responder; `route(method, path)` gives status and JSON body
pub async fn serve_http(route: Arc<Route>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let route = route.clone();
            tokio::spawn(async move {
                let Some((method, path)) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = route(&method, &path);
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    Some((method, path))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
