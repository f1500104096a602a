// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repository contract tests: ID validation, create remapping and the patch
//! retry protocol.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use common::{CounterDocument, CountingStore, cipher};
use rp_database::api::{AsyncOperationDocument, OperationKind};
use rp_database::store::{Collection, DocumentStore, MemoryStore, RawDocument};
use rp_database::{
    AsyncOperations, DatabaseError, DocumentClient, OperationStatus, Repository, Result,
    RetryPolicy,
};

fn counters(store: Arc<dyn DocumentStore>) -> Repository<CounterDocument> {
    Repository::new(store, "test", cipher())
}

#[tokio::test]
async fn test_uppercase_ids_fail_without_store_io() {
    let store = Arc::new(CountingStore::new());
    let repo = counters(store.clone());

    for id in ["Counter", "COUNTER", "counter-A", "/Subscriptions/x"] {
        let err = repo.create(&CounterDocument::new(id)).await.unwrap_err();
        assert_eq!(err, DatabaseError::Validation { id: id.to_string() });

        let err = repo.get(id).await.unwrap_err();
        assert_eq!(err, DatabaseError::Validation { id: id.to_string() });

        let err = repo
            .patch(id, |doc| {
                doc.counter += 1;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, DatabaseError::Validation { id: id.to_string() });
    }

    assert_eq!(store.total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_patches_lose_no_updates() {
    const N: u64 = 50;

    let repo = counters(Arc::new(MemoryStore::new()));
    let mut initial = CounterDocument::new("counter");
    initial.counter = 7;
    repo.create(&initial).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..N {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.patch("counter", |doc| {
                doc.counter += 1;
                Ok(())
            })
            .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(repo.get("counter").await.unwrap().counter, 7 + N);
}

#[tokio::test]
async fn test_failing_mutator_writes_nothing() {
    let store = Arc::new(CountingStore::new());
    let repo = counters(store.clone());
    let created = repo.create(&CounterDocument::new("counter")).await.unwrap();

    let err = repo
        .patch("counter", |doc| {
            doc.counter = 99;
            Err(DatabaseError::rejected("not today"))
        })
        .await
        .unwrap_err();

    assert_eq!(err, DatabaseError::rejected("not today"));
    assert_eq!(store.replaces(), 0);

    let stored = repo.get("counter").await.unwrap();
    assert_eq!(stored.counter, 0);
    assert_eq!(stored.etag, created.etag);
}

#[tokio::test]
async fn test_create_conflict_is_remapped() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let client: DocumentClient<CounterDocument> =
        DocumentClient::new(store.clone(), "test", cipher());
    let repo = Repository::with_provided_client(client.clone());

    client.create(&CounterDocument::new("raw")).await.unwrap();
    let err = client.create(&CounterDocument::new("raw")).await.unwrap_err();
    assert_eq!(err, DatabaseError::AlreadyExists { id: "raw".into() });
    assert_eq!(err.status_code(), 409);

    repo.create(&CounterDocument::new("typed")).await.unwrap();
    let err = repo.create(&CounterDocument::new("typed")).await.unwrap_err();
    assert_eq!(err, DatabaseError::PreconditionFailed { id: "typed".into() });
    assert_eq!(err.status_code(), 412);
}

#[tokio::test]
async fn test_patch_on_missing_document() {
    let repo = counters(Arc::new(MemoryStore::new()));
    let err = repo.patch("missing", |_| Ok(())).await.unwrap_err();
    assert!(err.is_not_found());
}

/// Store that lets a competing writer commit just before the first replace.
struct RacingStore {
    inner: MemoryStore,
    interloper: Mutex<Option<Box<dyn FnOnce(&mut Value) + Send>>>,
}

impl RacingStore {
    fn new(interloper: impl FnOnce(&mut Value) + Send + 'static) -> Self {
        Self {
            inner: MemoryStore::new(),
            interloper: Mutex::new(Some(Box::new(interloper))),
        }
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        self.inner.create(collection, doc).await
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument> {
        self.inner.get(collection, id).await
    }

    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        let interloper = self.interloper.lock().unwrap().take();
        if let Some(interloper) = interloper {
            let mut current = self.inner.get(collection, &doc.id).await?;
            interloper(&mut current.body);
            self.inner.replace(collection, current).await?;
        }
        self.inner.replace(collection, doc).await
    }

    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()> {
        self.inner.delete(collection, id, etag).await
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>> {
        self.inner.list(collection).await
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_patch_retries_against_latest_revision() {
    let store = Arc::new(RacingStore::new(|body| {
        body["counter"] = Value::from(100);
    }));
    let repo = counters(store);
    repo.create(&CounterDocument::new("counter")).await.unwrap();

    let seen = Mutex::new(Vec::new());
    let patched = repo
        .patch("counter", |doc| {
            seen.lock().unwrap().push(doc.counter);
            doc.counter += 1;
            Ok(())
        })
        .await
        .unwrap();

    // First attempt read 0 and lost the race; the retry read the winner's 100.
    assert_eq!(*seen.lock().unwrap(), vec![0, 100]);
    assert_eq!(patched.counter, 101);
}

#[tokio::test]
async fn test_bounded_policy_surfaces_precondition_failed() {
    let store = Arc::new(RacingStore::new(|body| {
        body["counter"] = Value::from(1);
    }));
    let repo = counters(store).with_retry_policy(RetryPolicy::bounded(1));
    repo.create(&CounterDocument::new("counter")).await.unwrap();

    let err = repo.patch("counter", |_| Ok(())).await.unwrap_err();
    assert!(err.is_precondition_failed());
    assert_eq!(repo.get("counter").await.unwrap().counter, 1);
}

#[tokio::test]
async fn test_async_operation_scenario() {
    let repo: AsyncOperations = Repository::new(Arc::new(MemoryStore::new()), "test", cipher());

    let created = repo
        .create(&AsyncOperationDocument::new("op-1", "cluster", OperationKind::Create))
        .await
        .unwrap();
    assert_eq!(created.status(), OperationStatus::InProgress);

    let succeeded = repo
        .transition("op-1", OperationStatus::Succeeded, None)
        .await
        .unwrap();
    assert_ne!(succeeded.etag, created.etag);
    assert!(succeeded.async_operation.end_time.is_some());

    let fetched = repo.get("op-1").await.unwrap();
    assert_eq!(fetched.status(), OperationStatus::Succeeded);
    assert_eq!(fetched.etag, succeeded.etag);
}

#[tokio::test]
async fn test_stale_transition_never_overwrites_terminal_status() {
    // The backend commits Succeeded between our read and our replace.
    let store = Arc::new(RacingStore::new(|body| {
        body["asyncOperation"]["status"] = Value::from("Succeeded");
    }));
    let repo: AsyncOperations = Repository::new(store, "test", cipher());
    repo.create(&AsyncOperationDocument::new("op-1", "cluster", OperationKind::Create))
        .await
        .unwrap();

    let err = repo
        .transition("op-1", OperationStatus::Failed, None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DatabaseError::InvalidTransition {
            id: "op-1".into(),
            from: "Succeeded".into(),
            to: "Failed".into(),
        }
    );
    assert_eq!(
        repo.get("op-1").await.unwrap().status(),
        OperationStatus::Succeeded
    );
}
