use std::sync::Arc;

use axum::{routing::get, Router};
use hatchetest_config::AppConfig;
use hatchetest_testing_utils::{get_or_create_global_shared, teardown_global_shared, RouteModule};
use hatchetest_worker::{HatchetClient, Worker, WorkerOptions};

fn worker_status_module(router: Router, client: &HatchetClient, config: &AppConfig) -> Router {
    let body = format!("{} via {}", client.host_port(), config.host);
    router.route("/worker-status", get(move || async move { body }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker"]
async fn test_global_shared_suite_lifecycle() {
    // concurrent first callers share one startup
    let mut callers = Vec::new();
    for _ in 0..4 {
        callers.push(tokio::spawn(get_or_create_global_shared()));
    }
    let mut suites = Vec::new();
    for caller in callers {
        suites.push(
            caller
                .await
                .unwrap()
                .expect("Failed to set up global shared suite"),
        );
    }
    for suite in &suites {
        assert!(Arc::ptr_eq(&suites[0], suite));
    }

    // later calls reuse the same instance
    let again = get_or_create_global_shared().await.unwrap();
    assert!(Arc::ptr_eq(&suites[0], &again));

    let suite = Arc::clone(&suites[0]);
    assert!(suite.postgres_url.starts_with("postgres://hatchet:hatchet@"));
    assert!(suite.hatchet_url.starts_with("http://"));
    assert!(!suite.hatchet_grpc_url.is_empty());
    assert!(suite.hatchet_token.starts_with("eyJ"));
    assert_eq!(
        std::env::var("HATCHET_CLIENT_TOKEN").unwrap(),
        suite.hatchet_token
    );
    assert_eq!(
        std::env::var("HATCHET_CLIENT_TLS_STRATEGY").unwrap(),
        "none"
    );

    // the engine answers through the shared client
    suite.hatchet_client.health().await.unwrap();

    // route modules mount on the running test server
    let modules: [RouteModule; 1] = [worker_status_module];
    suite.register_modules(&modules).await.unwrap();
    let base = suite.test_server_url().await.unwrap();
    let status = reqwest::get(format!("{base}/worker-status"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(
        status,
        format!("{} via localhost", suite.hatchet_client.host_port())
    );

    // a worker can be built from the shared client
    let worker = Worker::new(
        suite.hatchet_client.clone(),
        WorkerOptions::new("test-worker"),
    )
    .unwrap();
    assert_eq!(worker.name(), "test-worker");
    let handle = worker.start().await.unwrap();
    assert!(handle.is_running());
    handle.stop().await.unwrap();

    // teardown refuses while handles are alive
    assert!(teardown_global_shared().await.is_err());

    let kept = get_or_create_global_shared().await.unwrap();
    assert!(Arc::ptr_eq(&suite, &kept));

    drop(kept);
    drop(suites);
    drop(again);
    drop(suite);
    teardown_global_shared().await.unwrap();
}
