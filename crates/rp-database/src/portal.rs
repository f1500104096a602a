// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::api::PortalDocument;
use crate::error::Result;
use crate::repository::Repository;

/// Repository of [`PortalDocument`]s.
pub type Portals = Repository<PortalDocument>;

impl Repository<PortalDocument> {
    /// Rewrite the session so its time-to-live starts over.
    pub async fn touch(&self, id: &str) -> Result<PortalDocument> {
        self.patch(id, |_| Ok(())).await
    }
}
