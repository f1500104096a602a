//! In-memory document store for local development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};

use super::{Collection, DocumentStore, RawDocument};

#[derive(Debug, Clone)]
struct Entry {
    etag: String,
    body: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn to_raw(&self, id: &str) -> RawDocument {
        RawDocument {
            id: id.to_string(),
            etag: Some(self.etag.clone()),
            ttl: None,
            body: self.body.clone(),
        }
    }
}

type Documents = BTreeMap<String, Entry>;

/// Process-local document store.
///
/// The internal lock only makes each primitive atomic; it is never held
/// across an await point and gives callers no extra guarantees beyond the
/// version-token contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Documents>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<T>(
        &self,
        collection: &Collection,
        f: impl FnOnce(&mut Documents) -> Result<T>,
    ) -> Result<T> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| DatabaseError::Infrastructure {
                operation: "lock".to_string(),
                details: "memory store lock poisoned".to_string(),
            })?;
        f(collections.entry(collection.clone()).or_default())
    }
}

fn new_etag() -> String {
    Uuid::new_v4().to_string()
}

fn expiry(ttl: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ttl.map(|secs| now + chrono::Duration::seconds(secs))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        let now = Utc::now();
        self.with_collection(collection, |docs| {
            if docs.get(&doc.id).is_some_and(|e| e.is_active(now)) {
                return Err(DatabaseError::AlreadyExists { id: doc.id });
            }

            let entry = Entry {
                etag: new_etag(),
                body: doc.body,
                expires_at: expiry(doc.ttl, now),
            };
            let raw = entry.to_raw(&doc.id);
            docs.insert(doc.id, entry);
            Ok(raw)
        })
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument> {
        let now = Utc::now();
        self.with_collection(collection, |docs| match docs.get(id) {
            Some(entry) if entry.is_active(now) => Ok(entry.to_raw(id)),
            _ => Err(DatabaseError::NotFound { id: id.to_string() }),
        })
    }

    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        let now = Utc::now();
        let Some(expected) = doc.etag.clone() else {
            return Err(DatabaseError::rejected(format!(
                "replace of '{}' requires a version token",
                doc.id
            )));
        };

        self.with_collection(collection, |docs| {
            let entry = match docs.get_mut(&doc.id) {
                Some(entry) if entry.is_active(now) => entry,
                _ => return Err(DatabaseError::NotFound { id: doc.id }),
            };

            if entry.etag != expected {
                return Err(DatabaseError::PreconditionFailed { id: doc.id });
            }

            entry.etag = new_etag();
            entry.body = doc.body;
            entry.expires_at = expiry(doc.ttl, now);
            Ok(entry.to_raw(&doc.id))
        })
    }

    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()> {
        let now = Utc::now();
        self.with_collection(collection, |docs| {
            match docs.get(id) {
                Some(entry) if entry.is_active(now) => {
                    if entry.etag != etag {
                        return Err(DatabaseError::PreconditionFailed { id: id.to_string() });
                    }
                }
                _ => return Err(DatabaseError::NotFound { id: id.to_string() }),
            }
            docs.remove(id);
            Ok(())
        })
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>> {
        let now = Utc::now();
        self.with_collection(collection, |docs| {
            docs.retain(|_, entry| entry.is_active(now));
            Ok(docs.iter().map(|(id, entry)| entry.to_raw(id)).collect())
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
