// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Seconds a portal session stays valid after its last write.
pub const PORTAL_SESSION_TTL_SECS: i64 = 60 * 60;

/// Portal session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portal {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub elevated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalDocument {
    /// Session key.
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub portal: Portal,
}

impl PortalDocument {
    pub fn new(id: impl Into<String>, portal: Portal) -> Self {
        Self {
            id: id.into(),
            etag: None,
            portal,
        }
    }
}

impl Document for PortalDocument {
    const COLLECTION: &'static str = "Portal";

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
        Some(PORTAL_SESSION_TTL_SECS)
    }
}
