//! Per-service functional testers
//!
//! Each tester exercises one service of the compose stack through its native
//! CLI (inside the container) or its HTTP API, and returns one outcome per
//! check. Testers never return errors: every failure is a `CheckOutcome`.

pub mod checklist;
pub mod elasticsearch;
pub mod kafka;
pub mod kibana;
pub mod mongodb;
pub mod sqlserver;
pub mod zookeeper;

pub use checklist::{Checklist, Verdict};
pub use elasticsearch::ElasticsearchTester;
pub use kafka::KafkaTester;
pub use kibana::KibanaTester;
pub use mongodb::MongoTester;
pub use sqlserver::SqlServerTester;
pub use zookeeper::ZookeeperTester;

use crate::config::{Environment, Settings};
use crate::exec::{CommandRunner, ToolInvocation, ToolOutput};
use crate::models::{CheckOutcome, ServiceKind};
use crate::utils::ExecError;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Reason recorded on cleanup checks when artifacts are kept
pub const SKIP_CLEANUP_REASON: &str = "cleanup disabled (--skip-cleanup)";

/// Tests one service
#[async_trait]
pub trait ServiceTester: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome>;
}

/// Shared, read-only state for one test run
#[derive(Clone)]
pub struct TestContext {
    pub runner: Arc<dyn CommandRunner>,
    pub settings: Arc<Settings>,
    pub env: Arc<Environment>,
    pub http: reqwest::Client,
    /// Short identifier used to name indices, topics, tables and collections
    pub run_id: String,
    pub skip_cleanup: bool,
}

impl TestContext {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        settings: Arc<Settings>,
        env: Arc<Environment>,
        skip_cleanup: bool,
    ) -> anyhow::Result<Self> {
        let http = build_http_client(&settings)?;
        Ok(Self {
            runner,
            settings,
            env,
            http,
            run_id: new_run_id(),
            skip_cleanup,
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_skip_cleanup(mut self, skip_cleanup: bool) -> Self {
        self.skip_cleanup = skip_cleanup;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        self.settings.runner.command_timeout()
    }

    /// Run a tool with the default command timeout unless one was set
    pub async fn exec(&self, invocation: ToolInvocation) -> Result<ToolOutput, ExecError> {
        let invocation = match invocation.timeout {
            Some(_) => invocation,
            None => invocation.timeout(self.command_timeout()),
        };
        self.runner.run(&invocation).await
    }
}

/// Eight hex characters, safe in index, topic and table names
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn build_http_client(settings: &Settings) -> anyhow::Result<reqwest::Client> {
    let es = &settings.elasticsearch;
    let mut builder = reqwest::Client::builder()
        .timeout(es.request_timeout())
        .danger_accept_invalid_certs(es.accept_invalid_certs)
        .user_agent(concat!("stack-doctor/", env!("CARGO_PKG_VERSION")));

    if let Some(ca_path) = &es.ca_cert {
        if ca_path.exists() {
            let pem = std::fs::read(ca_path)
                .with_context(|| format!("Failed to read CA certificate {}", ca_path.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA certificate {}", ca_path.display()))?;
            builder = builder.add_root_certificate(cert);
        } else {
            tracing::debug!(
                "CA certificate {} not found, using system roots",
                ca_path.display()
            );
        }
    }

    builder.build().context("Failed to build HTTP client")
}

/// Tester for a service
pub fn tester_for(kind: ServiceKind) -> Arc<dyn ServiceTester> {
    match kind {
        ServiceKind::Elasticsearch => Arc::new(ElasticsearchTester),
        ServiceKind::Kibana => Arc::new(KibanaTester),
        ServiceKind::Mongodb => Arc::new(MongoTester),
        ServiceKind::Kafka => Arc::new(KafkaTester),
        ServiceKind::Zookeeper => Arc::new(ZookeeperTester),
        ServiceKind::Sqlserver => Arc::new(SqlServerTester),
    }
}

/// Testers for the given services, in the same order
pub fn testers_for(kinds: &[ServiceKind]) -> Vec<Arc<dyn ServiceTester>> {
    kinds.iter().copied().map(tester_for).collect()
}
