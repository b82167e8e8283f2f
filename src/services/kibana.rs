//! Kibana tester

use super::{Checklist, ServiceTester, TestContext, Verdict};
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub struct KibanaTester;

#[async_trait]
impl ServiceTester for KibanaTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Kibana
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let mut checks = Checklist::new();
        let mut body = None;

        checks
            .record("status", CheckCategory::Health, async {
                let status = fetch_status(ctx).await?;
                let verdict = status_verdict(&status);
                body = Some(status);
                Ok::<_, anyhow::Error>(verdict)
            })
            .await;

        match body {
            Some(status) => {
                checks
                    .record("version", CheckCategory::Health, async {
                        Ok::<_, anyhow::Error>(version_verdict(&status))
                    })
                    .await;
            }
            None => checks.skip("version", CheckCategory::Health, "status unavailable"),
        }

        checks.into_outcomes()
    }
}

async fn fetch_status(ctx: &TestContext) -> Result<Value> {
    let settings = &ctx.settings.kibana;
    let url = format!("{}/api/status", settings.url.trim_end_matches('/'));
    let mut request = ctx.http.get(&url);
    if let Some(password) = ctx.env.get(&settings.password_env) {
        request = request.basic_auth(&settings.username, Some(password));
    }

    // Kibana answers 503 with a JSON body while degraded, so the body is
    // parsed regardless of the status code.
    let response = request
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text)
        .with_context(|| format!("HTTP {} with non-JSON body from /api/status", status))
}

/// Overall level: `status.overall.level` (8.x) or `status.overall.state` (7.x)
pub fn overall_level(body: &Value) -> Option<&str> {
    let overall = &body["status"]["overall"];
    overall["level"].as_str().or_else(|| overall["state"].as_str())
}

pub fn status_verdict(body: &Value) -> Verdict {
    match overall_level(body) {
        Some(level @ ("available" | "green")) => Verdict::pass(format!("overall {}", level)),
        Some(level @ ("degraded" | "yellow")) => Verdict::warn(format!(
            "overall {}: {}",
            level,
            body["status"]["overall"]["summary"]
                .as_str()
                .unwrap_or("some plugins degraded")
        )),
        Some(level) => Verdict::fail(format!("overall {}", level)),
        None => Verdict::fail("status response has no overall level"),
    }
}

pub fn version_verdict(body: &Value) -> Verdict {
    match body["version"]["number"].as_str() {
        Some(version) => Verdict::pass(format!("Kibana {}", version)),
        None => Verdict::warn("version not reported"),
    }
}
