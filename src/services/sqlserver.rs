//! SQL Server tester
//!
//! Runs sqlcmd inside the SQL Server container and reads the plain text
//! result sets (`-h -1 -W` removes headers and padding).

use super::{Checklist, ServiceTester, TestContext, Verdict, SKIP_CLEANUP_REASON};
use crate::config::SqlServerSettings;
use crate::exec::{classify, docker_exec, ErrorKind, ToolOutput};
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Microsoft SQL Server (\d{4})").ok());
static ROWS_AFFECTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\((\d+) rows? affected\)").ok());

pub struct SqlServerTester;

#[async_trait]
impl ServiceTester for SqlServerTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Sqlserver
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let settings = &ctx.settings.sqlserver;
        let mut checks = Checklist::new();

        let password = match ctx.env.require(&settings.password_env) {
            Ok(password) => password,
            Err(e) => {
                checks.fail("credentials", CheckCategory::Security, e.to_string());
                return checks.into_outcomes();
            }
        };
        let sql = SqlCmd {
            ctx,
            settings,
            password: &password,
        };
        let table = table_name(&ctx.run_id);

        if !checks
            .record("version", CheckCategory::Connectivity, sql.version())
            .await
        {
            for (name, category) in [
                ("create table", CheckCategory::Write),
                ("insert row", CheckCategory::Write),
                ("select row", CheckCategory::Read),
                ("drop table", CheckCategory::Cleanup),
            ] {
                checks.skip(name, category, "server unreachable");
            }
            return checks.into_outcomes();
        }

        let created = checks
            .record("create table", CheckCategory::Write, sql.create_table(&table))
            .await;

        if created {
            let inserted = checks
                .record(
                    "insert row",
                    CheckCategory::Write,
                    sql.insert_row(&table, &ctx.run_id),
                )
                .await;
            if inserted {
                checks
                    .record(
                        "select row",
                        CheckCategory::Read,
                        sql.select_row(&table, &ctx.run_id),
                    )
                    .await;
            } else {
                checks.skip("select row", CheckCategory::Read, "insert failed");
            }
        } else {
            checks.skip("insert row", CheckCategory::Write, "table not created");
            checks.skip("select row", CheckCategory::Read, "table not created");
        }

        if ctx.skip_cleanup {
            checks.skip("drop table", CheckCategory::Cleanup, SKIP_CLEANUP_REASON);
        } else if created {
            checks
                .record("drop table", CheckCategory::Cleanup, sql.drop_table(&table))
                .await;
        } else {
            checks.skip("drop table", CheckCategory::Cleanup, "table not created");
        }

        checks.into_outcomes()
    }
}

/// Table used by one run
pub fn table_name(run_id: &str) -> String {
    format!("dbo.doctor_{}", run_id)
}

struct SqlCmd<'a> {
    ctx: &'a TestContext,
    settings: &'a SqlServerSettings,
    password: &'a str,
}

impl SqlCmd<'_> {
    async fn query(&self, sql: &str) -> Result<ToolOutput> {
        let invocation = docker_exec(
            &self.settings.container,
            sqlcmd_args(self.settings, self.password, sql),
        );
        self.ctx
            .exec(invocation)
            .await
            .context("sqlcmd did not complete")
    }

    async fn version(&self) -> Result<Verdict> {
        let output = self.query("SET NOCOUNT ON; SELECT @@VERSION").await?;
        if !output.success() {
            return Err(anyhow!(output.error_text()));
        }
        match parse_version(&output.stdout) {
            Some(year) => Ok(Verdict::pass(format!("SQL Server {}", year))),
            None => Ok(Verdict::warn("connected, but version string not recognised")),
        }
    }

    async fn create_table(&self, table: &str) -> Result<Verdict> {
        let output = self
            .query(&format!(
                "CREATE TABLE {} (id INT PRIMARY KEY, marker NVARCHAR(64) NOT NULL)",
                table
            ))
            .await?;
        if output.success() {
            Ok(Verdict::pass(format!("created {}", table)))
        } else if classify(&output.combined()) == ErrorKind::AlreadyExists {
            Ok(Verdict::pass(format!("{} already existed", table)))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }

    async fn insert_row(&self, table: &str, marker: &str) -> Result<Verdict> {
        let output = self
            .query(&format!(
                "INSERT INTO {} (id, marker) VALUES (1, N'{}')",
                table, marker
            ))
            .await?;
        if !output.success() {
            return Err(anyhow!(output.error_text()));
        }
        match rows_affected(&output.stdout) {
            Some(1) => Ok(Verdict::pass("1 row inserted")),
            Some(n) => Ok(Verdict::fail(format!("expected 1 row affected, got {}", n))),
            None => Ok(Verdict::warn("insert succeeded without a row count")),
        }
    }

    async fn select_row(&self, table: &str, marker: &str) -> Result<Verdict> {
        let output = self
            .query(&format!(
                "SET NOCOUNT ON; SELECT marker FROM {} WHERE id = 1",
                table
            ))
            .await?;
        if !output.success() {
            return Err(anyhow!(output.error_text()));
        }
        if result_lines(&output.stdout).iter().any(|l| *l == marker) {
            Ok(Verdict::pass("row retrieved by query"))
        } else {
            Ok(Verdict::fail(format!(
                "row with marker {} not returned",
                marker
            )))
        }
    }

    async fn drop_table(&self, table: &str) -> Result<Verdict> {
        let output = self.query(&format!("DROP TABLE {}", table)).await?;
        if output.success() {
            Ok(Verdict::pass(format!("dropped {}", table)))
        } else if classify(&output.combined()) == ErrorKind::NotFound {
            Ok(Verdict::pass(format!("{} already gone", table)))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }
}

/// sqlcmd arguments for one batch
pub fn sqlcmd_args(settings: &SqlServerSettings, password: &str, sql: &str) -> Vec<String> {
    let mut args = vec![
        settings.sqlcmd.clone(),
        "-S".to_string(),
        settings.server.clone(),
        "-U".to_string(),
        settings.username.clone(),
        "-P".to_string(),
        password.to_string(),
        "-d".to_string(),
        settings.database.clone(),
    ];
    if settings.trust_server_certificate {
        args.push("-C".to_string());
    }
    // no headers, trimmed columns, non-zero exit on SQL errors
    args.extend(["-h", "-1", "-W", "-b", "-Q"].map(str::to_string));
    args.push(sql.to_string());
    args
}

/// Release year from `SELECT @@VERSION`
pub fn parse_version(stdout: &str) -> Option<u16> {
    VERSION
        .as_ref()?
        .captures(stdout)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Row count from `(N rows affected)`
pub fn rows_affected(stdout: &str) -> Option<u64> {
    ROWS_AFFECTED
        .as_ref()?
        .captures(stdout)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Non-empty result lines
pub fn result_lines(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}
