// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend loop tests against the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use rp_database::api::{
    AsyncOperationDocument, Billing, BillingDocument, OperationKind, SubscriptionState,
};
use rp_database::{Cipher, Database, OperationStatus, ProvisioningState};
use rp_server::backend::Backend;
use rp_server::health::Health;
use rp_server::metrics::{NoopEmitter, RecordingEmitter};
use rp_server::reconciler::{MockReconciler, ReconcileAction, Reconciler};
use rp_server::shutdown::ShutdownCoordinator;
use tokio::task::JoinHandle;

struct Running {
    coordinator: ShutdownCoordinator,
    health: Health,
    handle: JoinHandle<()>,
}

fn start(db: &Database, reconciler: Arc<dyn Reconciler>) -> Running {
    let (coordinator, reporters) = ShutdownCoordinator::new();
    let health = Health::new(coordinator.stop_signal());
    let backend = Backend::new(
        db.clone(),
        reconciler,
        Arc::new(NoopEmitter),
        health.clone(),
        fast_backend(),
    );
    let handle = tokio::spawn(backend.run(coordinator.stop_signal(), reporters.backend));
    Running {
        coordinator,
        health,
        handle,
    }
}

/// Wait until the cluster no longer needs work.
async fn settled(db: &Database, key: &str) {
    eventually("cluster to settle", || async move {
        db.open_shift_clusters
            .get(key)
            .await
            .map(|doc| !doc.needs_work())
            .unwrap_or(false)
    })
    .await;
}

async fn operation_status(db: &Database, id: &str) -> OperationStatus {
    db.async_operations.get(id).await.unwrap().status()
}

#[tokio::test]
async fn test_create_succeeds() {
    let db = memory_database();
    register_subscription(&db, SubscriptionState::Registered).await;
    let (key, op) = submit(&db, "c1", ProvisioningState::Creating).await;

    let running = start(&db, Arc::new(MockReconciler::new()));
    settled(&db, &key).await;

    assert_eq!(operation_status(&db, &op).await, OperationStatus::Succeeded);
    let cluster = db.open_shift_clusters.get(&key).await.unwrap();
    assert_eq!(cluster.provisioning_state(), ProvisioningState::Succeeded);
    assert!(cluster.async_operation_id.is_none());
    assert!(cluster.lease_owner.is_none());
    assert_eq!(cluster.dequeues, 1);

    let billing = db.billing.get(&key).await.unwrap();
    assert_eq!(billing.billing.tenant_id, TENANT);
    assert_eq!(billing.billing.location, "eastus");
    assert_eq!(billing.key, cluster_path("c1"));

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
    running.handle.await.unwrap();
}

#[tokio::test]
async fn test_operation_resolves_before_cluster() {
    let db = memory_database();
    let (key, op) = submit(&db, "c1", ProvisioningState::Updating).await;

    let running = start(&db, Arc::new(MockReconciler::new()));
    settled(&db, &key).await;

    let operation = db.async_operations.get(&op).await.unwrap();
    let cluster = db.open_shift_clusters.get(&key).await.unwrap();
    assert_eq!(operation.status(), OperationStatus::Succeeded);
    assert_eq!(cluster.provisioning_state(), ProvisioningState::Succeeded);
    // Updates never create billing records.
    assert!(db.billing.get(&key).await.unwrap_err().is_not_found());

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
}

#[tokio::test]
async fn test_failed_reconcile() {
    let db = memory_database();
    let (key, op) = submit(&db, "c1", ProvisioningState::Creating).await;

    let running = start(&db, Arc::new(MockReconciler::failing()));
    settled(&db, &key).await;

    let operation = db.async_operations.get(&op).await.unwrap();
    assert_eq!(operation.status(), OperationStatus::Failed);
    let error = operation.async_operation.error.unwrap();
    assert_eq!(error.code, "InternalServerError");
    assert!(error.message.contains("c1"));

    let cluster = db.open_shift_clusters.get(&key).await.unwrap();
    let properties = &cluster.open_shift_cluster.properties;
    assert_eq!(properties.provisioning_state, ProvisioningState::Failed);
    assert_eq!(
        properties.failed_provisioning_state,
        Some(ProvisioningState::Creating)
    );

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
}

#[tokio::test]
async fn test_delete_removes_cluster() {
    let db = memory_database();
    let (key, op) = submit(&db, "c1", ProvisioningState::Deleting).await;
    db.billing
        .ensure(&BillingDocument::new(
            key.clone(),
            cluster_path("c1"),
            Billing {
                creation_date: 1_700_000_000,
                deletion_time: None,
                last_billing_timestamp: None,
                location: "eastus".into(),
                tenant_id: TENANT.into(),
            },
        ))
        .await
        .unwrap();

    let reconciler = Arc::new(MockReconciler::new());
    let running = start(&db, reconciler.clone());
    let (db_ref, key_ref) = (&db, key.as_str());
    eventually("cluster to be deleted", || async move {
        db_ref
            .open_shift_clusters
            .get(key_ref)
            .await
            .is_err_and(|e| e.is_not_found())
    })
    .await;

    assert_eq!(operation_status(&db, &op).await, OperationStatus::Succeeded);
    assert!(db.billing.get(&key).await.unwrap().billing.deletion_time.is_some());
    assert_eq!(
        reconciler.calls().await,
        vec![(key.clone(), ReconcileAction::Delete)]
    );

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
}

#[tokio::test]
async fn test_stale_create_yields_to_superseding_delete() {
    let db = memory_database();
    register_subscription(&db, SubscriptionState::Registered).await;
    let (key, create_op) = submit(&db, "c1", ProvisioningState::Creating).await;

    let reconciler = Arc::new(MockReconciler::gated());
    let running = start(&db, reconciler.clone());
    tokio::time::timeout(Duration::from_secs(5), reconciler.wait_started())
        .await
        .unwrap();

    // A delete arrives while the create is still reconciling.
    let delete_op = "op-c1-delete";
    db.async_operations
        .create(&AsyncOperationDocument::new(
            delete_op,
            &key,
            OperationKind::Delete,
        ))
        .await
        .unwrap();
    db.open_shift_clusters
        .patch(&key, |doc| {
            doc.open_shift_cluster.properties.provisioning_state = ProvisioningState::Deleting;
            doc.async_operation_id = Some(delete_op.to_string());
            Ok(())
        })
        .await
        .unwrap();
    db.async_operations.cancel(&create_op).await.unwrap();

    reconciler.release();
    let (db_ref, key_ref) = (&db, key.as_str());
    eventually("cluster to be deleted", || async move {
        db_ref
            .open_shift_clusters
            .get(key_ref)
            .await
            .is_err_and(|e| e.is_not_found())
    })
    .await;

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
    running.handle.await.unwrap();

    // The stale create never overwrote the cancellation.
    assert_eq!(
        operation_status(&db, &create_op).await,
        OperationStatus::Canceled
    );
    assert_eq!(
        operation_status(&db, delete_op).await,
        OperationStatus::Succeeded
    );
    assert!(db.billing.get(&key).await.unwrap().billing.deletion_time.is_some());
    assert_eq!(
        reconciler.calls().await,
        vec![
            (key.clone(), ReconcileAction::CreateOrUpdate),
            (key.clone(), ReconcileAction::Delete),
        ]
    );
}

#[tokio::test]
async fn test_drain_waits_for_in_flight_reconcile() {
    let db = memory_database();
    let (key, op) = submit(&db, "c1", ProvisioningState::Creating).await;

    let reconciler = Arc::new(MockReconciler::gated());
    let running = start(&db, reconciler.clone());
    tokio::time::timeout(Duration::from_secs(5), reconciler.wait_started())
        .await
        .unwrap();

    running.coordinator.trigger();
    let drained = tokio::spawn(running.coordinator.wait_drained());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!drained.is_finished());
    assert_eq!(operation_status(&db, &op).await, OperationStatus::InProgress);

    reconciler.release();
    tokio::time::timeout(Duration::from_secs(5), drained)
        .await
        .unwrap()
        .unwrap();
    running.handle.await.unwrap();

    assert_eq!(operation_status(&db, &op).await, OperationStatus::Succeeded);
    let cluster = db.open_shift_clusters.get(&key).await.unwrap();
    assert_eq!(cluster.provisioning_state(), ProvisioningState::Succeeded);
}

#[tokio::test]
async fn test_no_new_work_after_drain() {
    let db = memory_database();
    let running = start(&db, Arc::new(MockReconciler::new()));

    running.coordinator.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.coordinator.wait_drained())
        .await
        .unwrap();
    running.handle.await.unwrap();

    let (key, _) = submit(&db, "late", ProvisioningState::Creating).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cluster = db.open_shift_clusters.get(&key).await.unwrap();
    assert_eq!(cluster.dequeues, 0);
    assert!(cluster.needs_work());
}

#[tokio::test]
async fn test_store_failures_mark_backend_unhealthy() {
    let store = Arc::new(FlakyStore::new());
    store.set_broken(true);
    let db = Database::new(store.clone(), "rp-test", Arc::new(Cipher::generate()));

    let running = start(&db, Arc::new(MockReconciler::new()));
    let health = running.health.clone();
    eventually("backend to report not live", || {
        let health = health.clone();
        async move { !health.is_live() }
    })
    .await;
    assert!(running.health.is_ready());

    store.set_broken(false);
    eventually("backend to recover", || {
        let health = health.clone();
        async move { health.is_live() }
    })
    .await;

    running.coordinator.trigger();
    running.coordinator.wait_drained().await;
}

#[tokio::test]
async fn test_backend_emits_worker_metrics() {
    let db = memory_database();
    let (key, _) = submit(&db, "c1", ProvisioningState::Creating).await;

    let (coordinator, reporters) = ShutdownCoordinator::new();
    let metrics = Arc::new(RecordingEmitter::new());
    let backend = Backend::new(
        db.clone(),
        Arc::new(MockReconciler::new()),
        metrics.clone(),
        Health::new(coordinator.stop_signal()),
        fast_backend(),
    );
    let handle = tokio::spawn(backend.run(coordinator.stop_signal(), reporters.backend));
    // No frontend runs in this test.
    reporters.frontend.drained();

    settled(&db, &key).await;
    coordinator.trigger();
    coordinator.wait_drained().await;
    handle.await.unwrap();

    let points = metrics.points();
    assert!(
        points
            .iter()
            .any(|p| p.name == "backend.workers.active" && p.value == 1)
    );
    assert_eq!(
        metrics.latest("backend.reconcile.count", "outcome", "Succeeded"),
        Some(1)
    );
}
