//! Kafka tester
//!
//! Uses the CLI tools bundled in the broker container: create a topic,
//! produce one message, consume it back and delete the topic.

use super::{Checklist, ServiceTester, TestContext, Verdict, SKIP_CLEANUP_REASON};
use crate::config::KafkaSettings;
use crate::exec::{classify, docker_exec, retry, ErrorKind, RetryPolicy, ToolInvocation, ToolOutput};
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

static PROCESSED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Processed a total of (\d+) messages?").ok());

pub struct KafkaTester;

#[async_trait]
impl ServiceTester for KafkaTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Kafka
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let cli = KafkaCli {
            ctx,
            settings: &ctx.settings.kafka,
        };
        let topic = topic_name(&ctx.run_id);
        let payload = format!("stack-doctor message {}", ctx.run_id);
        let mut checks = Checklist::new();

        if !checks
            .record("list topics", CheckCategory::Connectivity, cli.list_topics())
            .await
        {
            for (name, category) in [
                ("create topic", CheckCategory::Write),
                ("produce message", CheckCategory::Messaging),
                ("consume message", CheckCategory::Messaging),
                ("delete topic", CheckCategory::Cleanup),
            ] {
                checks.skip(name, category, "broker unreachable");
            }
            return checks.into_outcomes();
        }

        let created = checks
            .record("create topic", CheckCategory::Write, cli.create_topic(&topic))
            .await;

        if created {
            let produced = checks
                .record(
                    "produce message",
                    CheckCategory::Messaging,
                    cli.produce(&topic, &payload),
                )
                .await;
            if produced {
                checks
                    .record(
                        "consume message",
                        CheckCategory::Messaging,
                        cli.consume(&topic, &payload),
                    )
                    .await;
            } else {
                checks.skip("consume message", CheckCategory::Messaging, "produce failed");
            }
        } else {
            checks.skip("produce message", CheckCategory::Messaging, "topic not created");
            checks.skip("consume message", CheckCategory::Messaging, "topic not created");
        }

        if ctx.skip_cleanup {
            checks.skip("delete topic", CheckCategory::Cleanup, SKIP_CLEANUP_REASON);
        } else if created {
            let policy = RetryPolicy::from(&ctx.settings.retry);
            checks
                .record(
                    "delete topic",
                    CheckCategory::Cleanup,
                    cli.delete_topic(&topic, policy),
                )
                .await;
        } else {
            checks.skip("delete topic", CheckCategory::Cleanup, "topic not created");
        }

        checks.into_outcomes()
    }
}

/// Topic used by one run
pub fn topic_name(run_id: &str) -> String {
    format!("doctor-{}", run_id)
}

struct KafkaCli<'a> {
    ctx: &'a TestContext,
    settings: &'a KafkaSettings,
}

impl KafkaCli<'_> {
    fn tool(&self, name: &str, config_flag: &str) -> Vec<String> {
        let mut args = vec![
            self.settings.script(name),
            "--bootstrap-server".to_string(),
            self.settings.bootstrap_server.clone(),
        ];
        if let Some(config) = &self.settings.command_config {
            args.push(config_flag.to_string());
            args.push(config.clone());
        }
        args
    }

    fn topics<I, S>(&self, extra: I) -> ToolInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        docker_exec(
            &self.settings.container,
            self.tool("kafka-topics", "--command-config"),
        )
        .args(extra)
    }

    async fn exec(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        self.ctx
            .exec(invocation)
            .await
            .context("Kafka CLI did not complete")
    }

    async fn list_topics(&self) -> Result<Verdict> {
        let output = self.exec(self.topics(["--list"])).await?;
        if !output.success() {
            return Err(anyhow!(output.error_text()));
        }
        let count = parse_topic_list(&output.stdout).len();
        Ok(Verdict::pass(format!("{} topics visible", count)))
    }

    async fn create_topic(&self, topic: &str) -> Result<Verdict> {
        let output = self
            .exec(self.topics([
                "--create".to_string(),
                "--topic".to_string(),
                topic.to_string(),
                "--partitions".to_string(),
                self.settings.partitions.to_string(),
                "--replication-factor".to_string(),
                self.settings.replication_factor.to_string(),
            ]))
            .await?;

        if output.success() {
            Ok(Verdict::pass(format!("created {}", topic)))
        } else if classify(&output.combined()) == ErrorKind::AlreadyExists {
            Ok(Verdict::pass(format!("{} already existed", topic)))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }

    async fn produce(&self, topic: &str, payload: &str) -> Result<Verdict> {
        let invocation = docker_exec(
            &self.settings.container,
            self.tool("kafka-console-producer", "--producer.config"),
        )
        .args(["--topic", topic])
        .stdin(format!("{}\n", payload));

        let output = self.exec(invocation).await?;
        if output.success() {
            Ok(Verdict::pass("1 message produced"))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }

    async fn consume(&self, topic: &str, payload: &str) -> Result<Verdict> {
        let consume_timeout = Duration::from_millis(self.settings.consume_timeout_ms);
        let invocation = docker_exec(
            &self.settings.container,
            self.tool("kafka-console-consumer", "--consumer.config"),
        )
        .args([
            "--topic".to_string(),
            topic.to_string(),
            "--from-beginning".to_string(),
            "--max-messages".to_string(),
            "1".to_string(),
            "--timeout-ms".to_string(),
            self.settings.consume_timeout_ms.to_string(),
        ])
        .timeout(self.ctx.command_timeout() + consume_timeout);

        let output = self.exec(invocation).await?;
        Ok(consume_verdict(&output, payload))
    }

    async fn delete_topic(&self, topic: &str, policy: RetryPolicy) -> Result<Verdict> {
        let retried = retry(
            policy,
            |result: &Result<ToolOutput>| match result {
                Ok(output) => {
                    !output.success() && classify(&output.combined()) == ErrorKind::AccessDenied
                }
                Err(_) => false,
            },
            move |attempt| {
                info!("Deleting topic {} (attempt {})", topic, attempt);
                self.exec(self.topics(["--delete", "--topic", topic]))
            },
        )
        .await;

        let output = retried.value?;
        let suffix = if retried.attempts > 1 {
            format!(" after {} attempts", retried.attempts)
        } else {
            String::new()
        };

        if output.success() {
            Ok(Verdict::pass(format!("deleted {}{}", topic, suffix)))
        } else {
            match classify(&output.combined()) {
                ErrorKind::NotFound => Ok(Verdict::pass(format!("{} already gone", topic))),
                // known cleanup race; the topic is removed once the broker catches up
                ErrorKind::AccessDenied => Ok(Verdict::warn(format!(
                    "AccessDeniedException persisted{}: {}",
                    suffix,
                    output.error_text()
                ))),
                _ => Err(anyhow!(output.error_text())),
            }
        }
    }
}

/// Topic names from `kafka-topics --list`
pub fn parse_topic_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("WARN") && !l.contains(' '))
        .map(str::to_string)
        .collect()
}

/// Count reported by the console consumer on stderr
pub fn processed_count(stderr: &str) -> Option<u64> {
    PROCESSED
        .as_ref()?
        .captures(stderr)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether the consumer saw the payload that was produced
pub fn consume_verdict(output: &ToolOutput, payload: &str) -> Verdict {
    let found = output.stdout.lines().any(|l| l.trim() == payload);
    let processed = processed_count(&output.stderr);

    match (found, processed) {
        (true, _) => Verdict::pass("produced message consumed from the same topic"),
        (false, Some(0)) => Verdict::fail("consumer timed out without receiving a message"),
        (false, Some(n)) => Verdict::fail(format!(
            "consumed {} message(s) but not the produced payload",
            n
        )),
        (false, None) => Verdict::fail(if output.success() {
            "consumer output did not contain the produced payload".to_string()
        } else {
            output.error_text()
        }),
    }
}
