// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use base64::Engine;
use rp_database::encryption::KEY_LEN;
use rp_database::{RetryPolicy, database_name};

/// Resource provider configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local development mode: in-memory store allowed, explicit database name.
    pub local_development: bool,
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Database name collections are namespaced under.
    pub database_name: String,
    /// Key for sensitive document fields (32 bytes).
    pub encryption_key: Vec<u8>,
    /// Frontend HTTP address.
    pub http_addr: SocketAddr,
    /// How often the backend scans for claimable work.
    pub backend_poll_interval: Duration,
    /// Maximum concurrent reconciliations.
    pub backend_max_workers: usize,
    /// Length of a backend lease.
    pub lease_duration: Duration,
    /// Retry policy for read-modify-write patches.
    pub retry_policy: RetryPolicy,
    /// How often document counts are emitted.
    pub metrics_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `RP_DB_ENCRYPTION_KEY`: base64 encoded 32-byte key
    /// - `RP_DATABASE_URL`: PostgreSQL URL (optional in local development)
    /// - `RP_DATABASE_NAME`: in local development only; must be unset otherwise
    ///
    /// Optional (with defaults):
    /// - `RP_LOCAL_DEVELOPMENT`: `true`/`1` to enable (default: false)
    /// - `RP_HTTP_PORT`: frontend port (default: 8443)
    /// - `RP_BACKEND_POLL_INTERVAL_MS`: backend scan interval (default: 1000)
    /// - `RP_BACKEND_MAX_WORKERS`: parallel reconciliations (default: 8)
    /// - `RP_LEASE_DURATION_SECS`: backend lease length (default: 60)
    /// - `RP_PATCH_MAX_ATTEMPTS`: patch retry cap (default: unbounded)
    /// - `RP_PATCH_BACKOFF_MS`: patch retry backoff base (default: 0)
    /// - `RP_METRICS_INTERVAL_SECS`: metrics interval (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let local_development = std::env::var("RP_LOCAL_DEVELOPMENT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let configured_name = std::env::var("RP_DATABASE_NAME").ok();
        if !local_development && configured_name.is_some() {
            return Err(ConfigError::Forbidden("RP_DATABASE_NAME"));
        }
        let database_name = database_name(local_development, configured_name.as_deref())
            .map_err(|_| ConfigError::Missing("RP_DATABASE_NAME"))?;

        let database_url = std::env::var("RP_DATABASE_URL").ok();
        if !local_development && database_url.is_none() {
            return Err(ConfigError::Missing("RP_DATABASE_URL"));
        }

        let encryption_key = std::env::var("RP_DB_ENCRYPTION_KEY")
            .map_err(|_| ConfigError::Missing("RP_DB_ENCRYPTION_KEY"))?;
        let encryption_key = decode_key(&encryption_key)?;

        let http_port: u16 = parse_var("RP_HTTP_PORT", "8443", "must be a valid port number")?;

        let poll_ms: u64 = parse_var(
            "RP_BACKEND_POLL_INTERVAL_MS",
            "1000",
            "must be a positive integer",
        )?;
        if poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "RP_BACKEND_POLL_INTERVAL_MS",
                "must be a positive integer",
            ));
        }

        let backend_max_workers: usize =
            parse_var("RP_BACKEND_MAX_WORKERS", "8", "must be a positive integer")?;
        if backend_max_workers == 0 {
            return Err(ConfigError::Invalid(
                "RP_BACKEND_MAX_WORKERS",
                "must be a positive integer",
            ));
        }

        let lease_secs: u64 =
            parse_var("RP_LEASE_DURATION_SECS", "60", "must be a positive integer")?;
        if lease_secs == 0 {
            return Err(ConfigError::Invalid(
                "RP_LEASE_DURATION_SECS",
                "must be a positive integer",
            ));
        }

        let retry_policy = match std::env::var("RP_PATCH_MAX_ATTEMPTS") {
            Ok(v) => RetryPolicy::bounded(v.parse().map_err(|_| {
                ConfigError::Invalid("RP_PATCH_MAX_ATTEMPTS", "must be a positive integer")
            })?),
            Err(_) => RetryPolicy::unbounded(),
        };
        let backoff_ms: u64 = parse_var("RP_PATCH_BACKOFF_MS", "0", "must be an integer")?;
        let retry_policy = retry_policy.with_backoff(
            Duration::from_millis(backoff_ms),
            retry_policy_max_backoff(backoff_ms),
        );

        let metrics_secs: u64 =
            parse_var("RP_METRICS_INTERVAL_SECS", "60", "must be a positive integer")?;

        Ok(Self {
            local_development,
            database_url,
            database_name,
            encryption_key,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            backend_poll_interval: Duration::from_millis(poll_ms),
            backend_max_workers,
            lease_duration: Duration::from_secs(lease_secs),
            retry_policy,
            metrics_interval: Duration::from_secs(metrics_secs.max(1)),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    key: &'static str,
    default: &str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid(key, reason))
}

fn decode_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let key = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| ConfigError::Invalid("RP_DB_ENCRYPTION_KEY", "must be valid base64"))?;
    if key.len() != KEY_LEN {
        return Err(ConfigError::Invalid(
            "RP_DB_ENCRYPTION_KEY",
            "must be base64 encoding of 32 bytes",
        ));
    }
    Ok(key)
}

/// Cap single backoff delays at 100x the base, and at least one second.
fn retry_policy_max_backoff(backoff_ms: u64) -> Duration {
    Duration::from_millis(backoff_ms.saturating_mul(100).max(1000))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// An environment variable is set where it must not be.
    #[error("environment variable {0} must not be set outside local development")]
    Forbidden(&'static str),
}
