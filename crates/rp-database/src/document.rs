// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The capability every stored document kind implements.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DatabaseError, Result};

/// A versioned, uniquely identified record kept in the document store.
///
/// Implementors hold their own ID and the version token (ETag) they were
/// last read with. The token is assigned by the store; callers never invent
/// one.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the kind is stored in.
    const COLLECTION: &'static str;

    /// JSON pointers (into the serialized document) of string fields that
    /// are encrypted at rest.
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];

    /// Canonical (lowercase) document ID.
    fn id(&self) -> &str;

    /// Version token of the revision this copy was read from.
    fn etag(&self) -> Option<&str>;

    /// Replace the version token. Only the document client calls this.
    fn set_etag(&mut self, etag: Option<String>);

    /// Seconds after the last write at which the store forgets the document.
    fn ttl(&self) -> Option<i64> {
        None
    }
}

/// Returns true when `id` is already in canonical lowercase form.
pub fn is_canonical_id(id: &str) -> bool {
    id == id.to_lowercase()
}

/// Fail fast on a non-canonical ID instead of normalizing it silently.
pub fn validate_id(id: &str) -> Result<()> {
    if is_canonical_id(id) {
        Ok(())
    } else {
        Err(DatabaseError::Validation { id: id.to_string() })
    }
}
