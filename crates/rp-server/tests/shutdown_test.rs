// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end drain tests over a real listener.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use rp_database::api::SubscriptionState;
use rp_database::{Database, OperationStatus, ProvisioningState};
use rp_server::metrics::NoopEmitter;
use rp_server::reconciler::MockReconciler;
use rp_server::runtime::RpRuntime;

async fn start(db: &Database, reconciler: Arc<MockReconciler>) -> RpRuntime {
    RpRuntime::builder()
        .database(db.clone())
        .reconciler(reconciler)
        .metrics(Arc::new(NoopEmitter))
        .bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
        .backend_config(fast_backend())
        .build()
        .unwrap()
        .start()
        .await
        .unwrap()
}

fn url(runtime: &RpRuntime, path: &str) -> String {
    format!("http://{}{}", runtime.local_addr(), path)
}

#[tokio::test]
async fn test_builder_requires_database_and_reconciler() {
    assert!(RpRuntime::builder().build().is_err());
    assert!(
        RpRuntime::builder()
            .database(memory_database())
            .build()
            .is_err()
    );
}

#[tokio::test]
async fn test_request_to_completion() {
    let db = memory_database();
    register_subscription(&db, SubscriptionState::Registered).await;
    let runtime = start(&db, Arc::new(MockReconciler::new())).await;
    assert!(runtime.is_running());

    let client = reqwest::Client::new();
    let response = client
        .put(url(&runtime, &cluster_path("c1")))
        .json(&cluster_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let status_url = response.headers()["azure-asyncoperation"]
        .to_str()
        .unwrap()
        .to_string();

    let (client_ref, status_ref) = (&client, url(&runtime, &status_url));
    let status_ref = status_ref.as_str();
    eventually("operation to succeed", || async move {
        let body: serde_json::Value = client_ref
            .get(status_ref)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["status"] == "Succeeded"
    })
    .await;

    let cluster: serde_json::Value = client
        .get(url(&runtime, &cluster_path("c1")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cluster["properties"]["provisioningState"], "Succeeded");

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_completes_in_flight_work() {
    let db = memory_database();
    register_subscription(&db, SubscriptionState::Registered).await;
    let reconciler = Arc::new(MockReconciler::gated());
    let runtime = start(&db, reconciler.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .put(url(&runtime, &cluster_path("c1")))
        .json(&cluster_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let operation = operation_id(
        response.headers()["azure-asyncoperation"]
            .to_str()
            .unwrap(),
    );

    tokio::time::timeout(Duration::from_secs(5), reconciler.wait_started())
        .await
        .unwrap();

    let ready_url = url(&runtime, "/healthz/ready");
    let cluster_url = url(&runtime, &cluster_path("c2"));
    let stop = runtime.stop_signal();
    let shutdown = tokio::spawn(runtime.shutdown());
    tokio::time::timeout(Duration::from_secs(5), stop.stopped())
        .await
        .unwrap();

    // Drain has begun: new requests are refused, readiness is down.
    let refused = client
        .put(&cluster_url)
        .json(&cluster_body())
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let ready = client.get(&ready_url).send().await.unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    // The admitted request's reconcile is still running, so the process stays up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!shutdown.is_finished());
    assert_eq!(
        db.async_operations.get(&operation).await.unwrap().status(),
        OperationStatus::InProgress
    );

    reconciler.release();
    tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(
        db.async_operations.get(&operation).await.unwrap().status(),
        OperationStatus::Succeeded
    );
    let cluster = db
        .open_shift_clusters
        .get(&cluster_key("c1"))
        .await
        .unwrap();
    assert_eq!(cluster.provisioning_state(), ProvisioningState::Succeeded);
    assert!(
        db.open_shift_clusters
            .get(&cluster_key("c2"))
            .await
            .unwrap_err()
            .is_not_found()
    );

    // The listener is closed once both loops have drained.
    assert!(client.get(&ready_url).send().await.is_err());
}

#[tokio::test]
async fn test_idle_shutdown_is_prompt() {
    let db = memory_database();
    let runtime = start(&db, Arc::new(MockReconciler::new())).await;
    assert!(runtime.trigger());
    assert!(!runtime.trigger());
    assert!(!runtime.health().is_ready());

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .unwrap()
        .unwrap();
}
