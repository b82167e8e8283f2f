mod common;

use common::{context, serve_http, settings, ScriptedRunner};
use serde_json::json;
use stack_doctor::models::CheckStatus;
use stack_doctor::services::{ElasticsearchTester, KibanaTester, ServiceTester, ZookeeperTester};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const PASSWORD: (&str, &str) = ("LOCAL_BACKEND_BOOTSTRAP_PASSWORD", "changeme");

fn es_route(seen: Arc<Mutex<Vec<String>>>) -> Arc<common::Route> {
    Arc::new(move |method: &str, path: &str| -> (u16, String) {
        seen.lock().unwrap().push(format!("{} {}", method, path));
        let (status, body) = match (method, path) {
            ("GET", "/_cluster/health") => (
                200,
                json!({"status": "yellow", "number_of_nodes": 1, "unassigned_shards": 3}),
            ),
            ("GET", "/_security/_authenticate") => (200, json!({"username": "elastic"})),
            ("GET", "/_security/service/elastic/kibana/credential") => {
                (200, json!({"service_account": "elastic/kibana", "count": 1}))
            }
            ("PUT", "/doctor-abcd1234") => (200, json!({"acknowledged": true})),
            ("PUT", "/doctor-abcd1234/_doc/1?refresh=true") => (201, json!({"result": "created"})),
            ("POST", "/doctor-abcd1234/_search") => {
                (200, json!({"hits": {"total": {"value": 1, "relation": "eq"}}}))
            }
            ("DELETE", "/doctor-abcd1234") => (200, json!({"acknowledged": true})),
            _ => (404, json!({"error": {"reason": "no route"}})),
        };
        (status, body.to_string())
    })
}

#[tokio::test]
async fn test_elasticsearch_round_trip() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let addr = serve_http(es_route(seen.clone())).await;

    let mut settings = settings();
    settings.elasticsearch.url = format!("http://{}", addr);
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[PASSWORD]);

    let outcomes = ElasticsearchTester.run(&ctx).await;
    let statuses: Vec<_> = outcomes.iter().map(|o| (o.name.as_str(), o.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("cluster health", CheckStatus::Warning),
            ("authenticate", CheckStatus::Pass),
            ("kibana service token", CheckStatus::Pass),
            ("create index", CheckStatus::Pass),
            ("index document", CheckStatus::Pass),
            ("search document", CheckStatus::Pass),
            ("delete index", CheckStatus::Pass),
        ]
    );
    assert!(outcomes[0].detail().contains("3 unassigned"));
    assert_eq!(seen.lock().unwrap().last().unwrap(), "DELETE /doctor-abcd1234");
}

#[tokio::test]
async fn test_elasticsearch_unreachable() {
    let mut settings = settings();
    settings.elasticsearch.url = "http://127.0.0.1:1".to_string();
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[PASSWORD]);

    let outcomes = ElasticsearchTester.run(&ctx).await;
    assert_eq!(outcomes.len(), 7);
    assert_eq!(outcomes[0].status, CheckStatus::Fail);
    assert!(outcomes[1..]
        .iter()
        .all(|o| o.status == CheckStatus::Skipped));
}

#[tokio::test]
async fn test_kibana_degraded_still_reports_version() {
    let addr = serve_http(Arc::new(|_: &str, path: &str| -> (u16, String) {
        if path == "/api/status" {
            let body = json!({
                "version": {"number": "8.13.4"},
                "status": {"overall": {"level": "degraded", "summary": "1 service is degraded"}}
            });
            (503, body.to_string())
        } else {
            (404, "{}".to_string())
        }
    }))
    .await;

    let mut settings = settings();
    settings.kibana.url = format!("http://{}/", addr);
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[PASSWORD]);

    let outcomes = KibanaTester.run(&ctx).await;
    assert_eq!(outcomes[0].status, CheckStatus::Warning);
    assert!(outcomes[0].detail().contains("1 service is degraded"));
    assert_eq!(outcomes[1].status, CheckStatus::Pass);
    assert_eq!(outcomes[1].detail(), "Kibana 8.13.4");
}

#[tokio::test]
async fn test_kibana_non_json_body() {
    let addr = serve_http(Arc::new(|_: &str, _: &str| -> (u16, String) {
        (200, "Kibana server is not ready yet".to_string())
    }))
    .await;

    let mut settings = settings();
    settings.kibana.url = format!("http://{}", addr);
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[]);

    let outcomes = KibanaTester.run(&ctx).await;
    assert_eq!(outcomes[0].status, CheckStatus::Fail);
    assert_eq!(outcomes[1].status, CheckStatus::Skipped);
}

/// Answers one four-letter word per connection
async fn fake_zookeeper(srvr: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut word = [0u8; 4];
            if socket.read_exact(&mut word).await.is_err() {
                continue;
            }
            let reply = match &word {
                b"ruok" => "imok",
                b"srvr" => srvr,
                _ => "",
            };
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    port
}

#[tokio::test]
async fn test_zookeeper_standalone() {
    let port = fake_zookeeper(
        "Zookeeper version: 3.8.4-9316c2a7a97e1666d8f4593f34dd6fc36ecc436c, built on 2024-02-12 22:16 UTC\nLatency min/avg/max: 0/0.0/0\nMode: standalone\nNode count: 5\n",
    )
    .await;

    let mut settings = settings();
    settings.zookeeper.host = "127.0.0.1".to_string();
    settings.zookeeper.port = port;
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[]);

    let outcomes = ZookeeperTester.run(&ctx).await;
    assert_eq!(outcomes[0].status, CheckStatus::Pass);
    assert_eq!(outcomes[1].status, CheckStatus::Pass);
    assert_eq!(outcomes[1].detail(), "standalone mode, version 3.8.4-9316c2a7a97e1666d8f4593f34dd6fc36ecc436c");
}

#[tokio::test]
async fn test_zookeeper_srvr_not_whitelisted() {
    let port = fake_zookeeper("").await;

    let mut settings = settings();
    settings.zookeeper.host = "127.0.0.1".to_string();
    settings.zookeeper.port = port;
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[]);

    let outcomes = ZookeeperTester.run(&ctx).await;
    assert_eq!(outcomes[0].status, CheckStatus::Pass);
    assert_eq!(outcomes[1].status, CheckStatus::Warning);
    assert!(outcomes[1].detail().contains("4lw.commands.whitelist"));
}

#[tokio::test]
async fn test_zookeeper_srvr_refused_by_whitelist() {
    let port = fake_zookeeper("srvr is not executed because it is not in the whitelist.\n").await;

    let mut settings = settings();
    settings.zookeeper.host = "127.0.0.1".to_string();
    settings.zookeeper.port = port;
    let ctx = context(Arc::new(ScriptedRunner::new()), settings, &[]);

    let outcomes = ZookeeperTester.run(&ctx).await;
    assert_eq!(outcomes[0].status, CheckStatus::Pass);
    assert_eq!(outcomes[1].status, CheckStatus::Warning);
    assert!(outcomes[1].detail().contains("4lw.commands.whitelist"));
}
