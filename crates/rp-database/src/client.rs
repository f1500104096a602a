// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed document client.
//!
//! [`DocumentClient`] binds the raw [`DocumentStore`] to one document kind:
//! it serializes, seals the kind's sensitive fields on the way in, opens them
//! on the way out, and carries the version token between the store and the
//! typed document. Store errors are passed through unchanged.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::document::Document;
use crate::encryption::Cipher;
use crate::error::Result;
use crate::store::{Collection, DocumentStore, RawDocument};

/// Field name the version token is serialized under. Never persisted in the body.
const ETAG_FIELD: &str = "_etag";

/// Store client for a single document kind.
pub struct DocumentClient<D> {
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    cipher: Arc<Cipher>,
    _kind: PhantomData<fn() -> D>,
}

impl<D> Clone for DocumentClient<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            cipher: self.cipher.clone(),
            _kind: PhantomData,
        }
    }
}

impl<D: Document> DocumentClient<D> {
    /// Create a client for `D` in the given database.
    pub fn new(store: Arc<dyn DocumentStore>, database: &str, cipher: Arc<Cipher>) -> Self {
        Self {
            store,
            collection: Collection::new(database, D::COLLECTION),
            cipher,
            _kind: PhantomData,
        }
    }

    /// The collection this client reads and writes.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Store a new document.
    pub async fn create(&self, doc: &D) -> Result<D> {
        let raw = self.encode(doc)?;
        let stored = self.store.create(&self.collection, raw).await?;
        self.decode(stored)
    }

    /// Fetch a document by ID.
    pub async fn get(&self, id: &str) -> Result<D> {
        let raw = self.store.get(&self.collection, id).await?;
        self.decode(raw)
    }

    /// Replace a document, conditioned on the version token it carries.
    pub async fn replace(&self, doc: &D) -> Result<D> {
        let raw = self.encode(doc)?;
        let stored = self.store.replace(&self.collection, raw).await?;
        self.decode(stored)
    }

    /// Delete a document, conditioned on the version token it carries.
    pub async fn delete(&self, doc: &D) -> Result<()> {
        let etag = doc.etag().unwrap_or_default();
        self.store.delete(&self.collection, doc.id(), etag).await
    }

    /// All active documents of this kind.
    pub async fn list(&self) -> Result<Vec<D>> {
        self.store
            .list(&self.collection)
            .await?
            .into_iter()
            .map(|raw| self.decode(raw))
            .collect()
    }

    fn encode(&self, doc: &D) -> Result<RawDocument> {
        let mut body = serde_json::to_value(doc)?;
        if let Value::Object(map) = &mut body {
            map.remove(ETAG_FIELD);
        }

        for pointer in D::SENSITIVE_FIELDS {
            if let Some(field) = body.pointer_mut(pointer)
                && let Value::String(plaintext) = field
            {
                *field = Value::String(self.cipher.seal_string(plaintext)?);
            }
        }

        Ok(RawDocument {
            id: doc.id().to_string(),
            etag: doc.etag().map(str::to_string),
            ttl: doc.ttl(),
            body,
        })
    }

    fn decode(&self, raw: RawDocument) -> Result<D> {
        let mut body = raw.body;
        for pointer in D::SENSITIVE_FIELDS {
            if let Some(field) = body.pointer_mut(pointer)
                && let Value::String(sealed) = field
            {
                *field = Value::String(self.cipher.open_string(sealed)?);
            }
        }

        let mut doc: D = serde_json::from_value(body)?;
        doc.set_etag(raw.etag);
        Ok(doc)
    }
}
