// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for rp-server integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rp_database::api::{
    AsyncOperationDocument, ClusterProperties, OpenShiftCluster, OpenShiftClusterDocument,
    OperationKind, Subscription, SubscriptionProperties, SubscriptionState,
};
use rp_database::store::{Collection, DocumentStore, MemoryStore, RawDocument};
use rp_database::{Cipher, Database, DatabaseError, ProvisioningState, Result};
use rp_server::backend::BackendConfig;
use rp_server::frontend::{AppState, InFlight, router};
use rp_server::health::Health;
use rp_server::shutdown::ShutdownCoordinator;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
pub const TENANT: &str = "11111111-1111-1111-1111-111111111111";

pub fn memory_database() -> Database {
    Database::new(
        Arc::new(MemoryStore::new()),
        "rp-test",
        Arc::new(Cipher::generate()),
    )
}

pub async fn register_subscription(db: &Database, state: SubscriptionState) {
    db.subscriptions
        .put(
            SUBSCRIPTION,
            Subscription {
                state,
                properties: SubscriptionProperties {
                    tenant_id: TENANT.into(),
                    registered_features: Vec::new(),
                },
            },
        )
        .await
        .unwrap();
}

/// Resource ID of a cluster in the test subscription, in API casing.
pub fn cluster_path(name: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/rg-test/providers/Microsoft.RedHatOpenShift/openShiftClusters/{name}"
    )
}

pub fn cluster_key(name: &str) -> String {
    cluster_path(name).to_lowercase()
}

pub fn cluster_body() -> Value {
    json!({
        "location": "eastus",
        "tags": { "env": "test" },
        "properties": {
            "version": "4.15.2",
            "pullSecret": "{\"auths\":{\"registry.example.com\":{}}}"
        }
    })
}

/// Last path segment of an operation status URL.
pub fn operation_id(url: &str) -> String {
    url.rsplit('/').next().unwrap_or_default().to_string()
}

/// Record work for the backend the way the frontend does: operation first,
/// then the cluster pointing at it.
pub async fn submit(db: &Database, name: &str, state: ProvisioningState) -> (String, String) {
    let key = cluster_key(name);
    let operation_id = format!("op-{name}");
    let kind = match state {
        ProvisioningState::Deleting => OperationKind::Delete,
        ProvisioningState::Updating => OperationKind::Update,
        _ => OperationKind::Create,
    };
    db.async_operations
        .create(&AsyncOperationDocument::new(&operation_id, &key, kind))
        .await
        .unwrap();

    let mut doc = OpenShiftClusterDocument::new(OpenShiftCluster {
        id: cluster_path(name),
        name: name.into(),
        location: "eastus".into(),
        tags: BTreeMap::new(),
        properties: ClusterProperties {
            provisioning_state: state,
            failed_provisioning_state: None,
            version: "4.15.2".into(),
            pull_secret: None,
        },
    });
    doc.async_operation_id = Some(operation_id.clone());
    db.open_shift_clusters.create(&doc).await.unwrap();

    (key, operation_id)
}

pub fn fast_backend() -> BackendConfig {
    BackendConfig {
        poll_interval: Duration::from_millis(10),
        max_workers: 4,
        lease_duration: Duration::from_secs(60),
        max_backoff: Duration::from_millis(20),
        unhealthy_after: 2,
    }
}

/// In-process frontend for request-level tests.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub coordinator: ShutdownCoordinator,
    pub health: Health,
}

impl TestApp {
    pub fn new(db: Database) -> Self {
        let (coordinator, _reporters) = ShutdownCoordinator::new();
        let health = Health::new(coordinator.stop_signal());
        let state = AppState {
            db: db.clone(),
            health: health.clone(),
            stop: coordinator.stop_signal(),
            in_flight: InFlight::default(),
        };
        Self {
            app: router(state),
            db,
            coordinator,
            health,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Store whose every call fails until healed.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    broken: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DatabaseError::Infrastructure {
                operation: operation.into(),
                details: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        self.check("create")?;
        self.inner.create(collection, doc).await
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument> {
        self.check("get")?;
        self.inner.get(collection, id).await
    }

    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        self.check("replace")?;
        self.inner.replace(collection, doc).await
    }

    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()> {
        self.check("delete")?;
        self.inner.delete(collection, id, etag).await
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>> {
        self.check("list")?;
        self.inner.list(collection).await
    }

    async fn health_check(&self) -> Result<()> {
        self.check("health_check")
    }
}
