// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Async operation documents.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Seconds an async operation stays visible after its last write.
pub const ASYNC_OPERATION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Lifecycle of an async operation.
///
/// `InProgress` is the only non-terminal state; nothing leaves a terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    pub const ALL: [OperationStatus; 4] = [
        OperationStatus::InProgress,
        OperationStatus::Succeeded,
        OperationStatus::Failed,
        OperationStatus::Canceled,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::InProgress => "InProgress",
            OperationStatus::Succeeded => "Succeeded",
            OperationStatus::Failed => "Failed",
            OperationStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a long-running request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "Create",
            OperationKind::Update => "Update",
            OperationKind::Delete => "Delete",
        }
    }
}

/// Error detail attached to a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: String,
    pub message: String,
}

impl OperationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Status snapshot returned to polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperation {
    pub id: String,
    pub name: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

/// Stored async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperationDocument {
    /// Operation ID.
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Key of the resource document this operation targets.
    pub resource_key: String,
    pub async_operation: AsyncOperation,
}

impl AsyncOperationDocument {
    /// A new `InProgress` operation against `resource_key`.
    pub fn new(id: impl Into<String>, resource_key: impl Into<String>, kind: OperationKind) -> Self {
        let id = id.into();
        Self {
            async_operation: AsyncOperation {
                id: id.clone(),
                name: id.clone(),
                kind,
                status: OperationStatus::InProgress,
                start_time: Utc::now(),
                end_time: None,
                error: None,
            },
            id,
            etag: None,
            resource_key: resource_key.into(),
        }
    }

    pub fn status(&self) -> OperationStatus {
        self.async_operation.status
    }
}

impl Document for AsyncOperationDocument {
    const COLLECTION: &'static str = "AsyncOperations";

    fn id(&self) -> &str {
        &self.id
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }

    fn ttl(&self) -> Option<i64> {
        Some(ASYNC_OPERATION_TTL_SECS)
    }
}
