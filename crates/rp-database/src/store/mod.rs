//! Document store interface and backends.
//!
//! A store keeps opaque JSON bodies keyed by `(database, collection, id)` and
//! assigns a fresh version token on every successful write. It knows nothing
//! about document kinds, ID casing or encryption; those live in
//! [`crate::client`] and [`crate::repository`].

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;

use async_trait::async_trait;

use crate::error::Result;

/// Address of a collection inside a named database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    /// Database name (see [`crate::database::database_name`]).
    pub database: String,
    /// Collection name, one per document kind.
    pub name: String,
}

impl Collection {
    /// Create a collection address.
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }
}

/// A document as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Document ID.
    pub id: String,
    /// Version token. Assigned by the store; required on replace and delete.
    pub etag: Option<String>,
    /// Time-to-live in seconds, counted from the write. Only read on writes.
    pub ttl: Option<i64>,
    /// Serialized body.
    pub body: serde_json::Value,
}

/// Key-addressed document storage with per-document version tokens.
///
/// Expired documents are invisible to every method, and `create` over an
/// expired document succeeds.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document.
    ///
    /// Fails with `AlreadyExists` if an active document with the same ID exists.
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument>;

    /// Fetch a document. Fails with `NotFound` if absent.
    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument>;

    /// Overwrite a document, conditioned on `doc.etag` still being current.
    ///
    /// Fails with `PreconditionFailed` if the stored version changed and with
    /// `NotFound` if the document is gone.
    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument>;

    /// Remove a document, conditioned on `etag` still being current.
    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()>;

    /// All active documents of a collection, ordered by ID.
    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> Result<()>;
}
