// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic typed repository.
//!
//! Every document kind gets the same three core operations:
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `create` | validate the ID, store, remap a create conflict to `PreconditionFailed` |
//! | `get` | validate the ID, fetch |
//! | `patch` | read-modify-write, retried on `PreconditionFailed` |
//!
//! The named repositories ([`crate::AsyncOperations`],
//! [`crate::OpenShiftClusters`], ...) are this type instantiated per kind,
//! with kind-specific operations added in their own modules.

use std::sync::Arc;

use tracing::debug;

use crate::client::DocumentClient;
use crate::document::{Document, validate_id};
use crate::encryption::Cipher;
use crate::error::{Result, remap_create_conflict};
use crate::retry::{RetryPolicy, retry_on_precondition_failed};
use crate::store::DocumentStore;

/// Typed repository over one document kind.
pub struct Repository<D> {
    client: DocumentClient<D>,
    retry: RetryPolicy,
}

impl<D> Clone for Repository<D> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<D: Document> Repository<D> {
    /// Create a repository for `D` in the given database.
    pub fn new(store: Arc<dyn DocumentStore>, database: &str, cipher: Arc<Cipher>) -> Self {
        Self::with_provided_client(DocumentClient::new(store, database, cipher))
    }

    /// Create a repository over an already constructed client.
    pub fn with_provided_client(client: DocumentClient<D>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used by [`Repository::patch`].
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy used by [`Repository::patch`].
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The underlying typed client.
    pub fn client(&self) -> &DocumentClient<D> {
        &self.client
    }

    /// Store a new document.
    ///
    /// A same-ID conflict is reported as `PreconditionFailed`, not
    /// `AlreadyExists`: callers creating with a derived ID treat "someone else
    /// created it" as contention and decide themselves whether to retry.
    pub async fn create(&self, doc: &D) -> Result<D> {
        validate_id(doc.id())?;
        self.client.create(doc).await.map_err(remap_create_conflict)
    }

    /// Fetch a document by ID.
    pub async fn get(&self, id: &str) -> Result<D> {
        validate_id(id)?;
        self.client.get(id).await
    }

    /// Read-modify-write a document under optimistic concurrency.
    ///
    /// The mutator always sees the latest committed revision. If it fails,
    /// nothing is written and its error is returned. If the conditional
    /// replace loses a race, the copy is discarded and the whole cycle runs
    /// again, as often as the retry policy allows.
    pub async fn patch<F>(&self, id: &str, f: F) -> Result<D>
    where
        F: Fn(&mut D) -> Result<()> + Send + Sync,
    {
        validate_id(id)?;
        let f = &f;

        retry_on_precondition_failed(&self.retry, || async move {
            let mut doc = self.client.get(id).await?;
            f(&mut doc)?;
            self.client.replace(&doc).await
        })
        .await
    }

    /// Delete a document, conditioned on the version token it carries.
    pub async fn delete(&self, doc: &D) -> Result<()> {
        validate_id(doc.id())?;
        debug!(collection = D::COLLECTION, id = doc.id(), "Deleting document");
        self.client.delete(doc).await
    }

    /// All active documents of this kind.
    pub async fn list(&self) -> Result<Vec<D>> {
        self.client.list().await
    }
}
