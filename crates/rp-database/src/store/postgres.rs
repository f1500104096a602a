// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed document store.
//!
//! All kinds share one `documents` table keyed by
//! `(database_name, collection, id)`. Conditional writes compare the `etag`
//! column inside the same statement that performs the write, so the version
//! check and the update are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};

use super::{Collection, DocumentStore, RawDocument};

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether an active row exists, used to classify a failed conditional write.
    async fn exists(&self, collection: &Collection, id: &str) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1
            FROM documents
            WHERE database_name = $1 AND collection = $2 AND id = $3
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    etag: String,
    body: serde_json::Value,
}

impl From<DocumentRow> for RawDocument {
    fn from(row: DocumentRow) -> Self {
        RawDocument {
            id: row.id,
            etag: Some(row.etag),
            ttl: None,
            body: row.body,
        }
    }
}

fn new_etag() -> String {
    Uuid::new_v4().to_string()
}

fn expiry(ttl: Option<i64>) -> Option<DateTime<Utc>> {
    ttl.map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn create(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        let etag = new_etag();

        // An expired row with the same key is overwritten; an active one wins.
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO documents (database_name, collection, id, etag, body, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (database_name, collection, id) DO UPDATE
                SET etag = EXCLUDED.etag,
                    body = EXCLUDED.body,
                    expires_at = EXCLUDED.expires_at,
                    updated_at = NOW()
                WHERE documents.expires_at IS NOT NULL AND documents.expires_at <= NOW()
            RETURNING etag
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .bind(&doc.id)
        .bind(&etag)
        .bind(&doc.body)
        .bind(expiry(doc.ttl))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((etag,)) => Ok(RawDocument {
                etag: Some(etag),
                ..doc
            }),
            None => Err(DatabaseError::AlreadyExists { id: doc.id }),
        }
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<RawDocument> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, etag, body
            FROM documents
            WHERE database_name = $1 AND collection = $2 AND id = $3
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RawDocument::from)
            .ok_or_else(|| DatabaseError::NotFound { id: id.to_string() })
    }

    async fn replace(&self, collection: &Collection, doc: RawDocument) -> Result<RawDocument> {
        let Some(expected) = doc.etag.as_deref() else {
            return Err(DatabaseError::rejected(format!(
                "replace of '{}' requires a version token",
                doc.id
            )));
        };

        let row: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE documents
            SET etag = $4, body = $5, expires_at = $6, updated_at = NOW()
            WHERE database_name = $1 AND collection = $2 AND id = $3
              AND etag = $7
              AND (expires_at IS NULL OR expires_at > NOW())
            RETURNING etag
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .bind(&doc.id)
        .bind(new_etag())
        .bind(&doc.body)
        .bind(expiry(doc.ttl))
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((etag,)) => Ok(RawDocument {
                etag: Some(etag),
                ..doc
            }),
            None if self.exists(collection, &doc.id).await? => {
                Err(DatabaseError::PreconditionFailed { id: doc.id })
            }
            None => Err(DatabaseError::NotFound { id: doc.id }),
        }
    }

    async fn delete(&self, collection: &Collection, id: &str, etag: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE database_name = $1 AND collection = $2 AND id = $3
              AND etag = $4
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .bind(id)
        .bind(etag)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(())
        } else if self.exists(collection, id).await? {
            Err(DatabaseError::PreconditionFailed { id: id.to_string() })
        } else {
            Err(DatabaseError::NotFound { id: id.to_string() })
        }
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<RawDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, etag, body
            FROM documents
            WHERE database_name = $1 AND collection = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY id
            "#,
        )
        .bind(&collection.database)
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RawDocument::from).collect())
    }

    async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
