//! End-to-end tests over loopback TCP
//!
//! Each test starts its own coordinator on an ephemeral port, registers real
//! workers with it and submits jobs through the client.

use std::sync::Arc;
use std::time::Duration;

use jobrelay_client::JobRelayClient;
use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::transport::TcpTransport;
use jobrelay_common::{ConnectivityInfo, Envelope, FailureKind, Job, JobOutcome, ToolParameter, ToolResult};
use jobrelay_coordinator::{Coordinator, CoordinatorConfig, CoordinatorServer, RotationPolicy};
use jobrelay_worker::{factory, BuiltinSource, CodeLoader, DirectorySource, LayeredSource, WorkerConfig, WorkerServer};
use serde_json::json;

async fn start_coordinator(config: CoordinatorConfig) -> (Arc<Coordinator>, u16) {
    let server = CoordinatorServer::bind(&config.with_bind_host("127.0.0.1"))
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let coordinator = server.coordinator();
    tokio::spawn(server.run());
    (coordinator, port)
}

/// Built-in tools plus `WhoAmI`, which answers with the worker's name.
fn source_for(name: &str) -> BuiltinSource {
    let name = name.to_string();
    BuiltinSource::with_defaults().with_tool(
        "WhoAmI",
        factory(move || {
            let name = name.clone();
            move |_: ToolParameter| -> Result<ToolResult> { Ok(json!(name)) }
        }),
    )
}

/// Starts a worker and waits until the coordinator has registered it.
async fn start_worker(coordinator: &Coordinator, coordinator_port: u16, name: &str, source: LayeredSource) {
    let before = coordinator.worker_count().await;
    let config = WorkerConfig::new(name, 0, ConnectivityInfo::endpoint("127.0.0.1", coordinator_port))
        .with_bind_host("127.0.0.1");
    let loader = Arc::new(CodeLoader::new(Arc::new(source)));

    let server = WorkerServer::bind(config, loader).await.unwrap();
    tokio::spawn(server.run());

    for _ in 0..200 {
        if coordinator.worker_count().await > before {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker {} never registered", name);
}

async fn start_cluster(names: &[&str]) -> (Arc<Coordinator>, JobRelayClient) {
    let (coordinator, port) = start_coordinator(CoordinatorConfig::new(0)).await;
    for name in names {
        start_worker(&coordinator, port, name, LayeredSource::new().with(source_for(name))).await;
    }
    (coordinator, JobRelayClient::new(format!("127.0.0.1:{}", port)))
}

#[tokio::test]
async fn test_echo_passes_result_through() {
    let (_coordinator, client) = start_cluster(&["alpha"]).await;

    assert_eq!(client.submit("Echo", json!(42)).await.unwrap(), json!(42));
    assert_eq!(
        client.submit("Echo", json!({"nested": [1, "two", null]})).await.unwrap(),
        json!({"nested": [1, "two", null]})
    );
    assert_eq!(client.submit("Fibonacci", json!(10)).await.unwrap(), json!(55));
}

#[tokio::test]
async fn test_round_robin_across_workers() {
    let (coordinator, client) = start_cluster(&["A", "B", "C"]).await;
    assert_eq!(coordinator.workers().await, vec!["A", "B", "C"]);

    let mut order = Vec::new();
    for _ in 0..5 {
        order.push(client.submit("WhoAmI", json!(null)).await.unwrap());
    }

    assert_eq!(order, vec![json!("A"), json!("B"), json!("C"), json!("A"), json!("B")]);
}

#[tokio::test]
async fn test_concurrent_jobs_share_fairly() {
    let (_coordinator, client) = start_cluster(&["A", "B", "C"]).await;

    let jobs = (0..30).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.submit("WhoAmI", json!(null)).await.unwrap() })
    });
    let answers: Vec<_> = futures::future::join_all(jobs)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    for name in ["A", "B", "C"] {
        let count = answers.iter().filter(|a| **a == json!(name)).count();
        assert_eq!(count, 10, "worker {} got {} jobs", name, count);
    }
}

#[tokio::test]
async fn test_unknown_tool_is_reported() {
    let (_coordinator, client) = start_cluster(&["alpha"]).await;

    match client.submit("NoSuchTool", json!(1)).await {
        Err(JobRelayError::JobFailed { kind, message }) => {
            assert_eq!(kind, FailureKind::UnknownTool);
            assert!(message.contains("NoSuchTool"));
        }
        other => panic!("Expected JobFailed, got {:?}", other),
    }

    // The worker is still serving
    assert_eq!(client.submit("Echo", json!("ok")).await.unwrap(), json!("ok"));
}

#[tokio::test]
async fn test_tool_failure_is_reported() {
    let (_coordinator, client) = start_cluster(&["alpha"]).await;

    let outcome = client
        .submit_job(Job::new("Fibonacci", json!(1000)))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        JobOutcome::Failure { kind: FailureKind::ToolExecution, .. }
    ));
}

#[tokio::test]
async fn test_script_tool_loaded_once_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Square.js"),
        "function execute(x) { return x * x; }",
    )
    .unwrap();

    let (coordinator, port) = start_coordinator(CoordinatorConfig::new(0)).await;
    let source = LayeredSource::new()
        .with(BuiltinSource::with_defaults())
        .with(DirectorySource::new(dir.path()));
    start_worker(&coordinator, port, "scripts", source).await;

    let client = JobRelayClient::new(format!("127.0.0.1:{}", port));
    for n in 1..=4 {
        assert_eq!(client.submit("Square", json!(n)).await.unwrap(), json!(n * n));
    }
}

#[tokio::test]
async fn test_no_workers_available() {
    let (_coordinator, client) = start_cluster(&[]).await;

    match client.submit("Echo", json!(1)).await {
        Err(JobRelayError::JobFailed { kind, .. }) => assert_eq!(kind, FailureKind::NoWorkersAvailable),
        other => panic!("Expected JobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_worker_is_reported() {
    let (coordinator, port) = start_coordinator(CoordinatorConfig::new(0)).await;

    let dead_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    coordinator
        .register_worker(ConnectivityInfo::worker("ghost", "127.0.0.1", dead_port))
        .await
        .unwrap();

    let client = JobRelayClient::new(format!("127.0.0.1:{}", port));
    match client.submit("Echo", json!(1)).await {
        Err(JobRelayError::JobFailed { kind, .. }) => assert_eq!(kind, FailureKind::WorkerUnreachable),
        other => panic!("Expected JobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_kind_does_not_disturb_other_connections() {
    let (coordinator, client) = start_cluster(&["alpha"]).await;
    let addr = client.coordinator_addr().to_string();

    // Unknown kind: the coordinator drops the connection without replying
    let mut stream = TcpTransport::connect(&addr).await.unwrap();
    TcpTransport::send_message(&mut stream, br#"{"kind":"HEARTBEAT","payload":{}}"#)
        .await
        .unwrap();
    assert!(TcpTransport::receive_message(&mut stream).await.is_err());

    assert_eq!(client.submit("Echo", json!(7)).await.unwrap(), json!(7));
    assert_eq!(coordinator.worker_count().await, 1);

    // A registration on a second connection still lands
    let late = ConnectivityInfo::worker("late", "127.0.0.1", 9200);
    let mut stream = TcpTransport::connect(&addr).await.unwrap();
    TcpTransport::send_envelope(&mut stream, &Envelope::RegisterWorker(late.clone()))
        .await
        .unwrap();

    for _ in 0..200 {
        if coordinator.lookup("late").await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(coordinator.lookup("late").await, Some(late));
    assert_eq!(coordinator.workers().await, vec!["alpha", "late"]);
}

#[tokio::test]
async fn test_reregistration_policies() {
    for (policy, expected) in [
        (RotationPolicy::Deduplicate, vec!["A", "B"]),
        (RotationPolicy::Append, vec!["A", "B", "A"]),
    ] {
        let (coordinator, port) =
            start_coordinator(CoordinatorConfig::new(0).with_rotation(policy)).await;
        for name in ["A", "B"] {
            start_worker(&coordinator, port, name, LayeredSource::new().with(source_for(name))).await;
        }

        // A second process claiming "A" replaces the first one's endpoint
        let replacement = WorkerServer::bind(
            WorkerConfig::new("A", 0, ConnectivityInfo::endpoint("127.0.0.1", port))
                .with_bind_host("127.0.0.1"),
            Arc::new(CodeLoader::new(Arc::new(source_for("A")))),
        )
        .await
        .unwrap();
        let replacement_port = replacement.identity().port();
        replacement.register().await.unwrap();
        tokio::spawn(replacement.serve());

        for _ in 0..200 {
            if coordinator.lookup("A").await.map(|info| info.port()) == Some(replacement_port) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            coordinator.lookup("A").await.map(|info| info.port()),
            Some(replacement_port)
        );
        assert_eq!(coordinator.workers().await, expected, "policy {}", policy);
    }
}
