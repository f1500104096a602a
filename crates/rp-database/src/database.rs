// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! All typed repositories over one store.

use std::sync::Arc;

use crate::async_operations::AsyncOperations;
use crate::billing::Billings;
use crate::encryption::Cipher;
use crate::error::{DatabaseError, Result};
use crate::open_shift_clusters::OpenShiftClusters;
use crate::portal::Portals;
use crate::repository::Repository;
use crate::retry::RetryPolicy;
use crate::store::DocumentStore;
use crate::subscriptions::Subscriptions;

/// Database name used outside local development.
pub const PRODUCTION_DATABASE_NAME: &str = "rp";

/// Resolve the database name.
///
/// Local development needs an explicit name so developers sharing a store
/// do not collide; production always uses [`PRODUCTION_DATABASE_NAME`].
pub fn database_name(local_development: bool, configured: Option<&str>) -> Result<String> {
    match (local_development, configured) {
        (true, Some(name)) if !name.is_empty() => Ok(name.to_string()),
        (true, _) => Err(DatabaseError::rejected(
            "a database name is required in local development mode",
        )),
        (false, _) => Ok(PRODUCTION_DATABASE_NAME.to_string()),
    }
}

/// The resource provider's repositories, sharing one store and cipher.
#[derive(Clone)]
pub struct Database {
    pub async_operations: AsyncOperations,
    pub billing: Billings,
    pub open_shift_clusters: OpenShiftClusters,
    pub portal: Portals,
    pub subscriptions: Subscriptions,
    store: Arc<dyn DocumentStore>,
    name: String,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, name: &str, cipher: Arc<Cipher>) -> Self {
        Self {
            async_operations: Repository::new(store.clone(), name, cipher.clone()),
            billing: Repository::new(store.clone(), name, cipher.clone()),
            open_shift_clusters: Repository::new(store.clone(), name, cipher.clone()),
            portal: Repository::new(store.clone(), name, cipher.clone()),
            subscriptions: Repository::new(store.clone(), name, cipher),
            store,
            name: name.to_string(),
        }
    }

    /// Apply one retry policy to every repository.
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self {
            async_operations: self.async_operations.with_retry_policy(retry.clone()),
            billing: self.billing.with_retry_policy(retry.clone()),
            open_shift_clusters: self.open_shift_clusters.with_retry_policy(retry.clone()),
            portal: self.portal.with_retry_policy(retry.clone()),
            subscriptions: self.subscriptions.with_retry_policy(retry),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Check the store is reachable.
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}
