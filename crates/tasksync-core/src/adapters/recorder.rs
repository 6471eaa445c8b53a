//! Persists identity mappings after successful creates

use std::fmt;

use crate::db::{IdentityRepository, LibSqlIdentityRepository};
use crate::error::Result;
use crate::models::{IdentityMapping, Service, TaskRecord, TenantId};

/// Writes the Notion/Google id link once a create made both ids known
#[derive(Clone)]
pub struct MappingRecorder {
    identity: LibSqlIdentityRepository,
    tenant: TenantId,
}

impl fmt::Debug for MappingRecorder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MappingRecorder")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl MappingRecorder {
    pub const fn new(identity: LibSqlIdentityRepository, tenant: TenantId) -> Self {
        Self { identity, tenant }
    }

    pub const fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Store the mapping for `record` if it carries both ids.
    ///
    /// Returns `None` when one side is still unknown.
    pub async fn record(&self, record: &TaskRecord) -> Result<Option<IdentityMapping>> {
        let (Some(notion_id), Some(google_task_id)) = (
            record.id_for(Service::Notion),
            record.id_for(Service::GoogleTasks),
        ) else {
            return Ok(None);
        };

        let mapping = self
            .identity
            .create(notion_id, google_task_id, &self.tenant)
            .await?;
        tracing::debug!(
            tenant = %self.tenant,
            notion_id = %mapping.notion_id,
            google_task_id = %mapping.google_task_id,
            "Recorded identity mapping"
        );
        Ok(Some(mapping))
    }
}
