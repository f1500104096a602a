// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for rp-database integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rp_database::api::{ClusterProperties, OpenShiftCluster, OpenShiftClusterDocument};
use rp_database::store::{Collection, DocumentStore, MemoryStore, RawDocument};
use rp_database::{Cipher, Database, Document, ProvisioningState, Result};

/// Store wrapper that counts calls per primitive.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub creates: AtomicUsize,
    pub gets: AtomicUsize,
    pub replaces: AtomicUsize,
    pub deletes: AtomicUsize,
    pub lists: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
            + self.replaces.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.lists.load(Ordering::SeqCst)
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(collection, doc).await
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(collection, id).await
    }

    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        self.inner.replace(collection, doc).await
    }

    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(collection, id, etag).await
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(collection).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

/// A document with a single counter, for concurrency tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDocument {
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub counter: u64,
}

impl CounterDocument {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            etag: None,
            counter: 0,
        }
    }
}

impl Document for CounterDocument {
    const COLLECTION: &'static str = "Counters";

    fn id(&self) -> &str {
        &self.id
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

pub fn cipher() -> Arc<Cipher> {
    Arc::new(Cipher::generate())
}

pub fn memory_database() -> Database {
    Database::new(Arc::new(MemoryStore::new()), "test", cipher())
}

pub fn cluster_id(name: &str) -> String {
    format!(
        "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/{name}"
    )
}

/// A cluster document in `state`, driven by `operation_id`.
pub fn cluster(name: &str, state: ProvisioningState, operation_id: &str) -> OpenShiftClusterDocument {
    let mut doc = OpenShiftClusterDocument::new(OpenShiftCluster {
        id: cluster_id(name),
        name: name.to_string(),
        location: "eastus".to_string(),
        tags: BTreeMap::new(),
        properties: ClusterProperties {
            provisioning_state: state,
            failed_provisioning_state: None,
            version: "4.15.0".to_string(),
            pull_secret: Some(format!("{{\"auths\":{{\"{name}\":{{}}}}}}")),
        },
    });
    doc.async_operation_id = Some(operation_id.to_string());
    doc
}
