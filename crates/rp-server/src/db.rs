// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Opening the document store selected by configuration.

use std::sync::Arc;

use rp_database::{Cipher, Database, DocumentStore, MemoryStore, PostgresStore, migrations};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Connect to PostgreSQL and apply migrations, or fall back to the in-memory
/// store when no URL is configured (local development only).
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            info!("Connected to database");

            migrations::run_postgres(&pool).await?;
            info!("Database migrations applied");

            Ok(Arc::new(PostgresStore::new(pool)))
        }
        None if config.local_development => {
            warn!("RP_DATABASE_URL not set, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        None => Err(Error::Other(
            "a database URL is required outside local development".to_string(),
        )),
    }
}

/// Build the repositories over `store` with the configured key and retry policy.
pub fn open_database(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Database> {
    let cipher = Arc::new(Cipher::new(&config.encryption_key)?);
    let db = Database::new(store, &config.database_name, cipher)
        .with_retry_policy(config.retry_policy.clone());
    Ok(db)
}
