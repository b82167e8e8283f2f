//! MongoDB tester
//!
//! Runs short mongosh scripts inside the MongoDB container. Every script
//! prints a single `JSON.stringify(...)` line, which is read back as the
//! last line of stdout.

use super::{Checklist, ServiceTester, TestContext, Verdict, SKIP_CLEANUP_REASON};
use crate::config::MongoSettings;
use crate::exec::docker_exec;
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub struct MongoTester;

#[async_trait]
impl ServiceTester for MongoTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Mongodb
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let settings = &ctx.settings.mongodb;
        let mut checks = Checklist::new();

        let password = match ctx.env.require(&settings.password_env) {
            Ok(password) => password,
            Err(e) => {
                checks.fail("credentials", CheckCategory::Security, e.to_string());
                return checks.into_outcomes();
            }
        };
        let shell = MongoShell {
            ctx,
            settings,
            password: &password,
        };
        let collection = collection_name(&ctx.run_id);

        if !checks
            .record("ping", CheckCategory::Connectivity, shell.ping())
            .await
        {
            for (name, category) in [
                ("insert document", CheckCategory::Write),
                ("find document", CheckCategory::Read),
                ("drop collection", CheckCategory::Cleanup),
            ] {
                checks.skip(name, category, "ping failed");
            }
            return checks.into_outcomes();
        }

        let inserted = checks
            .record(
                "insert document",
                CheckCategory::Write,
                shell.insert(&collection, &ctx.run_id),
            )
            .await;

        if inserted {
            checks
                .record(
                    "find document",
                    CheckCategory::Read,
                    shell.find(&collection, &ctx.run_id),
                )
                .await;
        } else {
            checks.skip("find document", CheckCategory::Read, "insert failed");
        }

        if ctx.skip_cleanup {
            checks.skip("drop collection", CheckCategory::Cleanup, SKIP_CLEANUP_REASON);
        } else {
            checks
                .record(
                    "drop collection",
                    CheckCategory::Cleanup,
                    shell.drop(&collection),
                )
                .await;
        }

        checks.into_outcomes()
    }
}

/// Collection used by one run
pub fn collection_name(run_id: &str) -> String {
    format!("doctor_{}", run_id)
}

struct MongoShell<'a> {
    ctx: &'a TestContext,
    settings: &'a MongoSettings,
    password: &'a str,
}

impl MongoShell<'_> {
    fn collection_expr(&self, collection: &str) -> String {
        format!(
            "db.getSiblingDB('{}').getCollection('{}')",
            self.settings.database, collection
        )
    }

    async fn eval(&self, script: &str) -> Result<Value> {
        let invocation = docker_exec(
            &self.settings.container,
            shell_args(self.settings, self.password, script),
        );
        let output = self
            .ctx
            .exec(invocation)
            .await
            .context("mongosh did not complete")?;

        if !output.success() {
            return Err(anyhow!(output.error_text()));
        }
        parse_script_output(output.last_line().unwrap_or_default())
    }

    async fn ping(&self) -> Result<Verdict> {
        let result = self
            .eval("JSON.stringify(db.adminCommand({ ping: 1 }))")
            .await?;
        if result["ok"].as_f64() == Some(1.0) {
            Ok(Verdict::pass("ping ok"))
        } else {
            Ok(Verdict::fail(format!("unexpected ping reply: {}", result)))
        }
    }

    async fn insert(&self, collection: &str, marker: &str) -> Result<Verdict> {
        let script = format!(
            "JSON.stringify({}.insertOne({{ marker: '{}', source: 'stack-doctor', createdAt: new Date() }}))",
            self.collection_expr(collection),
            marker
        );
        let result = self.eval(&script).await?;
        if result["acknowledged"].as_bool() == Some(true) {
            Ok(Verdict::pass(format!(
                "inserted into {}.{}",
                self.settings.database, collection
            )))
        } else {
            Ok(Verdict::fail(format!("insert not acknowledged: {}", result)))
        }
    }

    async fn find(&self, collection: &str, marker: &str) -> Result<Verdict> {
        let script = format!(
            "JSON.stringify({}.findOne({{ marker: '{}' }}, {{ _id: 0, marker: 1 }}))",
            self.collection_expr(collection),
            marker
        );
        let result = self.eval(&script).await?;
        match result["marker"].as_str() {
            Some(found) if found == marker => Ok(Verdict::pass("document retrieved by query")),
            _ => Ok(Verdict::fail(format!(
                "document with marker {} not found (got {})",
                marker, result
            ))),
        }
    }

    async fn drop(&self, collection: &str) -> Result<Verdict> {
        let script = format!("JSON.stringify({}.drop())", self.collection_expr(collection));
        let result = self.eval(&script).await?;
        if result.as_bool() == Some(true) {
            Ok(Verdict::pass(format!("dropped {}", collection)))
        } else {
            Ok(Verdict::warn(format!("drop returned {}", result)))
        }
    }
}

/// mongosh arguments for a script
pub fn shell_args(settings: &MongoSettings, password: &str, script: &str) -> Vec<String> {
    let mut args = vec![
        settings.shell.clone(),
        "--quiet".to_string(),
        "--host".to_string(),
        "localhost".to_string(),
        "--port".to_string(),
        settings.port.to_string(),
    ];

    if settings.tls {
        args.push("--tls".to_string());
        if let Some(ca) = &settings.tls_ca_file {
            args.push("--tlsCAFile".to_string());
            args.push(ca.clone());
        }
    }

    args.extend([
        "--username".to_string(),
        settings.username.clone(),
        "--password".to_string(),
        password.to_string(),
        "--authenticationDatabase".to_string(),
        settings.auth_database.clone(),
        "--eval".to_string(),
        script.to_string(),
    ]);
    args
}

/// Parse the JSON line printed by a script
pub fn parse_script_output(line: &str) -> Result<Value> {
    let line = line.trim();
    if line.is_empty() {
        return Err(anyhow!("mongosh produced no output"));
    }
    serde_json::from_str(line).with_context(|| format!("unexpected mongosh output: {}", line))
}
