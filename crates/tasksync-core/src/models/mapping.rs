//! Identity mapping between a Notion page and a Google task

use serde::{Deserialize, Serialize};

use super::{Service, TenantId};

/// Durable link between one Notion page id and one Google task id.
///
/// Append-only: rows are never updated and disappear only with their
/// relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    /// Row id
    pub id: i64,
    /// Owning relationship
    pub relationship_id: TenantId,
    pub notion_id: String,
    pub google_task_id: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl IdentityMapping {
    /// The mapped id in the given service
    pub fn id_for(&self, service: Service) -> &str {
        match service {
            Service::Notion => &self.notion_id,
            Service::GoogleTasks => &self.google_task_id,
        }
    }
}
