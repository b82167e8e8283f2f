mod common;

use async_trait::async_trait;
use common::{context, settings, ScriptedRunner};
use stack_doctor::models::{CheckCategory, CheckOutcome, CheckStatus, RunExit, ServiceKind};
use stack_doctor::runner::{run_all, RunConfig, RunEvent};
use stack_doctor::services::{ServiceTester, TestContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Behaviour {
    Pass,
    Warn,
    Panic,
    Hang,
}

struct FakeTester {
    kind: ServiceKind,
    delay: Duration,
    behaviour: Behaviour,
    runs: Arc<AtomicUsize>,
}

impl FakeTester {
    fn new(kind: ServiceKind, delay_ms: u64, behaviour: Behaviour) -> Self {
        Self {
            kind,
            delay: Duration::from_millis(delay_ms),
            behaviour,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ServiceTester for FakeTester {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn run(&self, ctx: &TestContext) -> Vec<CheckOutcome> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.behaviour {
            Behaviour::Pass => vec![CheckOutcome::pass(
                "ping",
                CheckCategory::Connectivity,
                format!("run {}", ctx.run_id),
            )],
            Behaviour::Warn => vec![CheckOutcome::warning(
                "ping",
                CheckCategory::Health,
                "degraded",
            )],
            Behaviour::Panic => panic!("broker exploded"),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                vec![]
            }
        }
    }
}

fn config(services: Vec<ServiceKind>, parallel: bool) -> RunConfig {
    let mut config = RunConfig::new(services, &settings());
    config.parallel = parallel;
    config.max_parallel = 3;
    config.service_timeout = Duration::from_secs(5);
    config
}

#[tokio::test]
async fn test_parallel_results_keep_selection_order() {
    let ctx = context(Arc::new(ScriptedRunner::new()), settings(), &[]);
    let services = vec![
        ServiceKind::Elasticsearch,
        ServiceKind::Mongodb,
        ServiceKind::Kafka,
    ];
    // the first service finishes last
    let testers: Vec<Arc<dyn ServiceTester>> = vec![
        Arc::new(FakeTester::new(ServiceKind::Elasticsearch, 150, Behaviour::Pass)),
        Arc::new(FakeTester::new(ServiceKind::Mongodb, 50, Behaviour::Pass)),
        Arc::new(FakeTester::new(ServiceKind::Kafka, 1, Behaviour::Warn)),
    ];

    let finished = Mutex::new(Vec::new());
    let on_event = |event: RunEvent| {
        if let RunEvent::ServiceFinished { service, .. } = event {
            finished.lock().unwrap().push(service);
        }
    };

    let summary = run_all(&ctx, &config(services.clone(), true), testers, &on_event).await;

    let order: Vec<_> = summary.reports.iter().map(|r| r.service).collect();
    assert_eq!(
        order,
        services.iter().copied().map(Some).collect::<Vec<_>>()
    );
    assert_eq!(finished.lock().unwrap().first(), Some(&ServiceKind::Kafka));
    assert_eq!(summary.run_id, "abcd1234");
    assert_eq!(summary.exit_code(), RunExit::Warning);
}

#[tokio::test]
async fn test_sequential_emits_events_in_order() {
    let ctx = context(Arc::new(ScriptedRunner::new()), settings(), &[]);
    let testers: Vec<Arc<dyn ServiceTester>> = vec![
        Arc::new(FakeTester::new(ServiceKind::Zookeeper, 1, Behaviour::Pass)),
        Arc::new(FakeTester::new(ServiceKind::Sqlserver, 1, Behaviour::Pass)),
    ];

    let events = Mutex::new(Vec::new());
    let on_event = |event: RunEvent| {
        let line = match event {
            RunEvent::ServiceStarted { service, index, total } => {
                format!("start {} {}/{}", service.as_str(), index + 1, total)
            }
            RunEvent::ServiceFinished { service, status, .. } => {
                format!("finish {} {}", service.as_str(), status.label())
            }
        };
        events.lock().unwrap().push(line);
    };

    let summary = run_all(
        &ctx,
        &config(vec![ServiceKind::Zookeeper, ServiceKind::Sqlserver], false),
        testers,
        &on_event,
    )
    .await;

    assert_eq!(summary.exit_code(), RunExit::Success);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], "start zookeeper 1/2");
    assert!(events[1].starts_with("finish zookeeper"));
    assert_eq!(events[2], "start sqlserver 2/2");
}

#[tokio::test]
async fn test_panic_is_isolated() {
    let ctx = context(Arc::new(ScriptedRunner::new()), settings(), &[]);
    let testers: Vec<Arc<dyn ServiceTester>> = vec![
        Arc::new(FakeTester::new(ServiceKind::Kafka, 1, Behaviour::Panic)),
        Arc::new(FakeTester::new(ServiceKind::Mongodb, 1, Behaviour::Pass)),
    ];

    let summary = run_all(
        &ctx,
        &config(vec![ServiceKind::Kafka, ServiceKind::Mongodb], true),
        testers,
        &|_| {},
    )
    .await;

    let kafka = &summary.reports[0];
    assert_eq!(kafka.status(), CheckStatus::Fail);
    assert!(kafka
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("broker exploded"));
    assert_eq!(summary.reports[1].status(), CheckStatus::Pass);
    assert_eq!(summary.exit_code(), RunExit::Failure);
}

#[tokio::test]
async fn test_timeout_is_isolated() {
    let ctx = context(Arc::new(ScriptedRunner::new()), settings(), &[]);
    let testers: Vec<Arc<dyn ServiceTester>> = vec![
        Arc::new(FakeTester::new(ServiceKind::Elasticsearch, 1, Behaviour::Hang)),
        Arc::new(FakeTester::new(ServiceKind::Kibana, 1, Behaviour::Pass)),
    ];
    let mut config = config(vec![ServiceKind::Elasticsearch, ServiceKind::Kibana], false);
    config.service_timeout = Duration::from_millis(100);

    let summary = run_all(&ctx, &config, testers, &|_| {}).await;

    let es = &summary.reports[0];
    assert_eq!(es.status(), CheckStatus::Fail);
    assert!(es.error.as_deref().unwrap_or_default().contains("timed out"));
    assert!(es.duration_ms < 5_000);
    assert_eq!(summary.reports[1].status(), CheckStatus::Pass);
}

#[tokio::test]
async fn test_blocked_service_is_not_tested() {
    let ctx = context(Arc::new(ScriptedRunner::new()), settings(), &[]);
    let tester = FakeTester::new(ServiceKind::Sqlserver, 1, Behaviour::Pass);
    let runs = tester.runs.clone();

    let mut config = config(vec![ServiceKind::Sqlserver], false);
    config
        .blocked
        .insert(ServiceKind::Sqlserver, "exited with code 1".to_string());

    let summary = run_all(&ctx, &config, vec![Arc::new(tester)], &|_| {}).await;

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let check = &summary.reports[0].checks[0];
    assert_eq!(check.name, "container");
    assert_eq!(check.status, CheckStatus::Fail);
    assert!(check.detail().contains("exited with code 1"));
}
