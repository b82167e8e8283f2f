//! Elasticsearch tester
//!
//! Talks to the REST API with basic auth as the bootstrap `elastic` user:
//! cluster health, authentication, the Kibana service token, and an
//! index/search/delete round trip on a throwaway index.

use super::{Checklist, ServiceTester, TestContext, Verdict, SKIP_CLEANUP_REASON};
use crate::exec::{classify, ErrorKind};
use crate::models::{CheckCategory, CheckOutcome, ServiceKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

pub struct ElasticsearchTester;

#[async_trait]
impl ServiceTester for ElasticsearchTester {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Elasticsearch
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        let settings = &ctx.settings.elasticsearch;
        let mut checks = Checklist::new();

        let password = match ctx.env.require(&settings.password_env) {
            Ok(password) => password,
            Err(e) => {
                checks.fail("credentials", CheckCategory::Security, e.to_string());
                return checks.into_outcomes();
            }
        };
        let api = EsApi {
            ctx,
            base_url: settings.url.trim_end_matches('/'),
            username: &settings.username,
            password: &password,
        };
        let index = index_name(&settings.index_prefix, &ctx.run_id);

        if !checks
            .record("cluster health", CheckCategory::Health, api.cluster_health())
            .await
        {
            for (name, category) in [
                ("authenticate", CheckCategory::Security),
                ("kibana service token", CheckCategory::Security),
                ("create index", CheckCategory::Write),
                ("index document", CheckCategory::Write),
                ("search document", CheckCategory::Read),
                ("delete index", CheckCategory::Cleanup),
            ] {
                checks.skip(name, category, "cluster unreachable");
            }
            return checks.into_outcomes();
        }

        checks
            .record("authenticate", CheckCategory::Security, api.authenticate())
            .await;
        checks
            .record(
                "kibana service token",
                CheckCategory::Security,
                api.kibana_service_token(),
            )
            .await;

        let created = checks
            .record("create index", CheckCategory::Write, api.create_index(&index))
            .await;

        if created {
            let indexed = checks
                .record(
                    "index document",
                    CheckCategory::Write,
                    api.index_document(&index, &ctx.run_id),
                )
                .await;
            if indexed {
                checks
                    .record(
                        "search document",
                        CheckCategory::Read,
                        api.search_document(&index, &ctx.run_id),
                    )
                    .await;
            } else {
                checks.skip("search document", CheckCategory::Read, "indexing failed");
            }
        } else {
            checks.skip("index document", CheckCategory::Write, "index not created");
            checks.skip("search document", CheckCategory::Read, "index not created");
        }

        if ctx.skip_cleanup {
            checks.skip("delete index", CheckCategory::Cleanup, SKIP_CLEANUP_REASON);
        } else if created {
            checks
                .record("delete index", CheckCategory::Cleanup, api.delete_index(&index))
                .await;
        } else {
            checks.skip("delete index", CheckCategory::Cleanup, "index not created");
        }

        checks.into_outcomes()
    }
}

/// Index used by one run
pub fn index_name(prefix: &str, run_id: &str) -> String {
    format!("{}-{}", prefix.to_ascii_lowercase(), run_id)
}

struct EsApi<'a> {
    ctx: &'a TestContext,
    base_url: &'a str,
    username: &'a str,
    password: &'a str,
}

impl EsApi<'_> {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .ctx
            .http
            .request(method.clone(), &url)
            .basic_auth(self.username, Some(self.password));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, path))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, value))
    }

    async fn cluster_health(&self) -> Result<Verdict> {
        let (status, body) = self.request(Method::GET, "/_cluster/health", None).await?;
        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status, error_reason(&body)));
        }
        Ok(health_verdict(&body))
    }

    async fn authenticate(&self) -> Result<Verdict> {
        let (status, body) = self
            .request(Method::GET, "/_security/_authenticate", None)
            .await?;
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Verdict::fail(format!(
                "authentication failed for {}",
                self.username
            )));
        }
        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status, error_reason(&body)));
        }
        let user = body["username"].as_str().unwrap_or(self.username);
        Ok(Verdict::pass(format!("authenticated as {}", user)))
    }

    async fn kibana_service_token(&self) -> Result<Verdict> {
        let (status, body) = self
            .request(
                Method::GET,
                "/_security/service/elastic/kibana/credential",
                None,
            )
            .await?;
        if !status.is_success() {
            return Ok(Verdict::warn(format!(
                "could not list Kibana service tokens (HTTP {})",
                status
            )));
        }
        Ok(service_token_verdict(&body))
    }

    async fn create_index(&self, index: &str) -> Result<Verdict> {
        let body = json!({
            "settings": { "number_of_shards": 1, "number_of_replicas": 0 }
        });
        let (status, body) = self
            .request(Method::PUT, &format!("/{}", index), Some(body))
            .await?;
        if status.is_success() {
            Ok(Verdict::pass(format!("created {}", index)))
        } else if classify(&body.to_string()) == ErrorKind::AlreadyExists {
            Ok(Verdict::pass(format!("{} already existed", index)))
        } else {
            Err(anyhow!("HTTP {}: {}", status, error_reason(&body)))
        }
    }

    async fn index_document(&self, index: &str, marker: &str) -> Result<Verdict> {
        let doc = json!({
            "marker": marker,
            "source": "stack-doctor",
            "created_at": chrono::Utc::now().to_rfc3339(),
        });
        let (status, body) = self
            .request(
                Method::PUT,
                &format!("/{}/_doc/1?refresh=true", index),
                Some(doc),
            )
            .await?;
        if status.is_success() {
            let result = body["result"].as_str().unwrap_or("indexed");
            Ok(Verdict::pass(format!("document {}", result)))
        } else {
            Err(anyhow!("HTTP {}: {}", status, error_reason(&body)))
        }
    }

    async fn search_document(&self, index: &str, marker: &str) -> Result<Verdict> {
        let query = marker_query(marker);
        let (status, body) = self
            .request(Method::POST, &format!("/{}/_search", index), Some(query))
            .await?;
        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status, error_reason(&body)));
        }
        match total_hits(&body) {
            Some(0) | None => Ok(Verdict::fail("indexed document not found by search")),
            Some(n) => Ok(Verdict::pass(format!("{} hit(s)", n))),
        }
    }

    async fn delete_index(&self, index: &str) -> Result<Verdict> {
        let (status, body) = self
            .request(Method::DELETE, &format!("/{}", index), None)
            .await?;
        if status.is_success() {
            Ok(Verdict::pass(format!("deleted {}", index)))
        } else if status == StatusCode::NOT_FOUND {
            Ok(Verdict::pass(format!("{} already gone", index)))
        } else {
            Err(anyhow!("HTTP {}: {}", status, error_reason(&body)))
        }
    }
}

/// green passes, yellow warns (expected on a single node), red fails
pub fn health_verdict(body: &Value) -> Verdict {
    let nodes = body["number_of_nodes"].as_u64().unwrap_or(0);
    match body["status"].as_str() {
        Some("green") => Verdict::pass(format!("green, {} node(s)", nodes)),
        Some("yellow") => Verdict::warn(format!(
            "yellow, {} unassigned shard(s)",
            body["unassigned_shards"].as_u64().unwrap_or(0)
        )),
        Some("red") => Verdict::fail("cluster status red"),
        Some(other) => Verdict::fail(format!("unknown cluster status '{}'", other)),
        None => Verdict::fail("health response has no status"),
    }
}

/// Kibana needs at least one service token
pub fn service_token_verdict(body: &Value) -> Verdict {
    match body["count"].as_u64() {
        Some(0) => Verdict::warn("no service tokens for elastic/kibana"),
        Some(n) => Verdict::pass(format!("{} service token(s) for elastic/kibana", n)),
        None => Verdict::warn("unexpected service credential response"),
    }
}

/// `hits.total.value`, or the bare number on old clusters
pub fn total_hits(body: &Value) -> Option<u64> {
    let total = &body["hits"]["total"];
    total["value"].as_u64().or_else(|| total.as_u64())
}

/// Best error text from an Elasticsearch error body
pub fn error_reason(body: &Value) -> String {
    body["error"]["reason"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Exact match on the dynamically mapped keyword subfield
pub fn marker_query(marker: &str) -> Value {
    json!({ "query": { "term": { "marker.keyword": marker } } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;

    #[test]
    fn test_marker_query_is_exact_term() {
        let query = marker_query("doctor-abcd1234");
        assert_eq!(query["query"]["term"]["marker.keyword"], "doctor-abcd1234");
        assert!(query["query"].get("match").is_none());
    }

    #[test]
    fn test_health_verdict() {
        let green = json!({"status": "green", "number_of_nodes": 1});
        let yellow = json!({"status": "yellow", "unassigned_shards": 3});
        let red = json!({"status": "red"});

        assert_eq!(health_verdict(&green).status(), CheckStatus::Pass);
        assert_eq!(health_verdict(&yellow).status(), CheckStatus::Warning);
        assert_eq!(health_verdict(&red).status(), CheckStatus::Fail);
        assert_eq!(health_verdict(&json!({})).status(), CheckStatus::Fail);
    }

    #[test]
    fn test_total_hits_shapes() {
        assert_eq!(total_hits(&json!({"hits": {"total": {"value": 2}}})), Some(2));
        assert_eq!(total_hits(&json!({"hits": {"total": 5}})), Some(5));
        assert_eq!(total_hits(&json!({})), None);
    }

    #[test]
    fn test_service_token_verdict() {
        assert_eq!(
            service_token_verdict(&json!({"count": 0})).status(),
            CheckStatus::Warning
        );
        assert_eq!(
            service_token_verdict(&json!({"count": 1, "tokens": {}})).status(),
            CheckStatus::Pass
        );
    }

    #[test]
    fn test_error_reason() {
        let body = json!({"error": {"type": "x", "reason": "boom"}, "status": 400});
        assert_eq!(error_reason(&body), "boom");
        assert_eq!(error_reason(&json!({"error": "plain"})), "plain");
    }

    #[test]
    fn test_index_name_lowercase() {
        assert_eq!(index_name("Doctor", "ab12"), "doctor-ab12");
    }
}
