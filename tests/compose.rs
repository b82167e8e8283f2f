mod common;

use common::{context, failed, ok, settings, ScriptedRunner};
use stack_doctor::compose::ComposeCli;
use stack_doctor::config::ComposeSettings;
use stack_doctor::models::{CheckStatus, ServiceKind};
use stack_doctor::runner::{preflight, RunConfig};
use stack_doctor::utils::ComposeError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const HEALTHY: &str = r#"{"Name":"elasticsearch","Service":"elasticsearch","State":"running","Health":"healthy","Status":"Up 3 minutes (healthy)","ExitCode":0}
{"Name":"kafka","Service":"kafka","State":"running","Health":"healthy","Status":"Up 3 minutes (healthy)","ExitCode":0}"#;

const STARTING: &str = r#"{"Name":"elasticsearch","Service":"elasticsearch","State":"running","Health":"starting","Status":"Up 5 seconds (health: starting)","ExitCode":0}
{"Name":"kafka","Service":"kafka","State":"running","Health":"healthy","Status":"Up 5 seconds (healthy)","ExitCode":0}"#;

const KAFKA_EXITED: &str = r#"[{"Name":"elasticsearch","Service":"elasticsearch","State":"running","Health":"healthy","Status":"Up","ExitCode":0},
{"Name":"kafka","Service":"kafka","State":"exited","Health":"","Status":"Exited (1) 2 seconds ago","ExitCode":1}]"#;

fn compose() -> ComposeCli {
    ComposeCli::new(&ComposeSettings {
        program: "docker".to_string(),
        args: vec!["compose".to_string()],
        file: Some(PathBuf::from("docker-compose.yml")),
        project: Some("local-backend".to_string()),
        ..ComposeSettings::default()
    })
}

const SERVICES: [ServiceKind; 2] = [ServiceKind::Elasticsearch, ServiceKind::Kafka];

#[tokio::test]
async fn test_ps_invocation() {
    let runner = ScriptedRunner::new().on(" ps ", vec![ok(HEALTHY)]);
    let states = compose().ps(&runner).await.unwrap();

    assert_eq!(states.len(), 2);
    let call = &runner.calls()[0];
    assert_eq!(call.program, "docker");
    assert_eq!(
        call.args,
        vec![
            "compose",
            "-f",
            "docker-compose.yml",
            "-p",
            "local-backend",
            "ps",
            "--all",
            "--format",
            "json"
        ]
    );
}

#[tokio::test]
async fn test_wait_healthy_polls_until_ready() {
    let runner = ScriptedRunner::new().on(" ps ", vec![ok(STARTING), ok(STARTING), ok(HEALTHY)]);
    let states = compose()
        .wait_healthy(&runner, &SERVICES, Duration::from_secs(5), Duration::from_millis(10))
        .await
        .unwrap();

    assert!(states.iter().all(|s| s.health() == Some("healthy")));
    assert_eq!(runner.count(" ps "), 3);
}

#[tokio::test]
async fn test_wait_healthy_times_out_with_pending_services() {
    let runner = ScriptedRunner::new().on(" ps ", vec![ok(STARTING)]);
    let err = compose()
        .wait_healthy(
            &runner,
            &SERVICES,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

    match err {
        ComposeError::NotHealthy { services, .. } => assert_eq!(services, "elasticsearch"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_up_failure_is_reported() {
    let runner = ScriptedRunner::new().on(
        " up -d",
        vec![failed("Error response from daemon: port is already allocated")],
    );
    let err = compose().up(&runner).await.unwrap_err();
    assert!(err.to_string().contains("port is already allocated"));
}

#[tokio::test]
async fn test_down_with_volumes() {
    let runner = ScriptedRunner::succeeding();
    compose().down(&runner, true).await.unwrap();
    let call = &runner.calls()[0];
    assert_eq!(&call.args[call.args.len() - 2..], &["down", "-v"]);
}

#[tokio::test]
async fn test_preflight_blocks_stopped_services() {
    let runner = Arc::new(ScriptedRunner::new().on(" ps ", vec![ok(KAFKA_EXITED)]));
    let ctx = context(runner, settings(), &[]);
    let mut config = RunConfig::new(
        vec![
            ServiceKind::Elasticsearch,
            ServiceKind::Kafka,
            ServiceKind::Sqlserver,
        ],
        &settings(),
    );

    preflight(&ctx, &compose(), &mut config).await.unwrap();

    assert!(!config.blocked.contains_key(&ServiceKind::Elasticsearch));
    assert_eq!(
        config.blocked.get(&ServiceKind::Kafka).map(String::as_str),
        Some("exited with code 1")
    );
    assert_eq!(
        config.blocked.get(&ServiceKind::Sqlserver).map(String::as_str),
        Some("no container for service")
    );
}

#[tokio::test]
async fn test_container_report_from_ps() {
    let runner = ScriptedRunner::new().on(" ps ", vec![ok(STARTING)]);
    let states = compose().ps(&runner).await.unwrap();
    let report = stack_doctor::compose::container_report(
        &states,
        &[ServiceKind::Elasticsearch, ServiceKind::Kafka, ServiceKind::Mongodb],
    );

    let statuses: Vec<_> = report.checks.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![CheckStatus::Warning, CheckStatus::Pass, CheckStatus::Fail]
    );
}
