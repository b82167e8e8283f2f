//! Zookeeper tester
//!
//! Sends four-letter words over a plain TCP connection.

use super::{Checklist, ServiceTester, TestContext, Verdict};
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

static MODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^Mode:\s*(\S+)").ok());
static VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^Zookeeper version:\s*([^,\s]+)").ok());

const WHITELIST_HINT: &str =
    "command refused; add it to 4lw.commands.whitelist to enable it";

/// Empty reply (3.4) or the explicit refusal sent by 3.5+
fn not_whitelisted(reply: &str) -> bool {
    let reply = reply.trim();
    reply.is_empty() || reply.contains("not in the whitelist")
}

pub struct ZookeeperTester;

#[async_trait]
impl ServiceTester for ZookeeperTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Zookeeper
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let settings = &ctx.settings.zookeeper;
        let words = FourLetter {
            host: &settings.host,
            port: settings.port,
            timeout: settings.timeout(),
        };
        let mut checks = Checklist::new();

        if !checks
            .record("ruok", CheckCategory::Health, words.ruok())
            .await
        {
            checks.skip("srvr", CheckCategory::Connectivity, "ruok failed");
            return checks.into_outcomes();
        }

        checks
            .record("srvr", CheckCategory::Connectivity, words.srvr())
            .await;

        checks.into_outcomes()
    }
}

struct FourLetter<'a> {
    host: &'a str,
    port: u16,
    timeout: Duration,
}

impl FourLetter<'_> {
    async fn ruok(&self) -> Result<Verdict> {
        let reply = four_letter(self.host, self.port, "ruok", self.timeout).await?;
        Ok(ruok_verdict(&reply))
    }

    async fn srvr(&self) -> Result<Verdict> {
        let reply = four_letter(self.host, self.port, "srvr", self.timeout).await?;
        Ok(srvr_verdict(&reply))
    }
}

/// Send a four-letter word and read the reply until the server closes
pub async fn four_letter(host: &str, port: u16, word: &str, limit: Duration) -> Result<String> {
    let exchange = async {
        let mut stream = TcpStream::connect((host, port)).await?;
        stream.write_all(word.as_bytes()).await?;
        stream.flush().await?;
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        Ok::<_, std::io::Error>(reply)
    };

    match tokio::time::timeout(limit, exchange).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => Err(anyhow!("{}:{} {}: {}", host, port, word, e)),
        Err(_) => Err(anyhow!(
            "{}:{} {} timed out after {}s",
            host,
            port,
            word,
            limit.as_secs()
        )),
    }
}

pub fn ruok_verdict(reply: &str) -> Verdict {
    if not_whitelisted(reply) {
        return Verdict::warn(WHITELIST_HINT);
    }
    match reply.trim() {
        "imok" => Verdict::pass("imok"),
        other => Verdict::fail(format!("unexpected reply '{}'", other)),
    }
}

/// Parsed `srvr` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub mode: Option<String>,
    pub version: Option<String>,
}

pub fn parse_srvr(reply: &str) -> ServerInfo {
    let capture = |re: &LazyLock<Option<Regex>>| {
        re.as_ref()
            .and_then(|re| re.captures(reply))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    ServerInfo {
        mode: capture(&MODE),
        version: capture(&VERSION),
    }
}

pub fn srvr_verdict(reply: &str) -> Verdict {
    if not_whitelisted(reply) {
        return Verdict::warn(WHITELIST_HINT);
    }
    let info = parse_srvr(reply);
    match (info.mode, info.version) {
        (Some(mode), Some(version)) => Verdict::pass(format!("{} mode, version {}", mode, version)),
        (Some(mode), None) => Verdict::pass(format!("{} mode", mode)),
        (None, _) => Verdict::warn("srvr reply has no Mode line"),
    }
}
