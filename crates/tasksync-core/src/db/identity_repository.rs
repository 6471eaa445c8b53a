//! Identity mapping repository

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{IdentityMapping, Service, TenantId};

const MAPPING_COLUMNS: &str = "id, relationship_id, notion_id, google_task_id, created_at";

/// Storage for the Notion page id / Google task id links of a relationship
#[allow(async_fn_in_trait)]
pub trait IdentityRepository {
    /// Find the mapping that holds `id` on the `service` side
    async fn get_by_id(
        &self,
        tenant: &TenantId,
        service: Service,
        id: &str,
    ) -> Result<Option<IdentityMapping>>;

    /// Record a new link. Fails if either id is already mapped for the tenant.
    async fn create(
        &self,
        notion_id: &str,
        google_task_id: &str,
        tenant: &TenantId,
    ) -> Result<IdentityMapping>;

    /// All mappings of a tenant, oldest first
    async fn list(&self, tenant: &TenantId) -> Result<Vec<IdentityMapping>>;
}

/// libSQL implementation of `IdentityRepository`.
///
/// Owns a connection handle so sync tasks can carry it across `.await`s.
#[derive(Clone)]
pub struct LibSqlIdentityRepository {
    conn: Connection,
}

impl LibSqlIdentityRepository {
    /// Create a new repository with the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl IdentityRepository for LibSqlIdentityRepository {
    async fn get_by_id(
        &self,
        tenant: &TenantId,
        service: Service,
        id: &str,
    ) -> Result<Option<IdentityMapping>> {
        let column = match service {
            Service::Notion => "notion_id",
            Service::GoogleTasks => "google_task_id",
        };
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MAPPING_COLUMNS} FROM synced_items
                     WHERE relationship_id = ? AND {column} = ?"
                ),
                params![tenant.as_str(), id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_mapping(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        notion_id: &str,
        google_task_id: &str,
        tenant: &TenantId,
    ) -> Result<IdentityMapping> {
        let notion_id = notion_id.trim();
        let google_task_id = google_task_id.trim();
        if notion_id.is_empty() || google_task_id.is_empty() {
            return Err(Error::InvalidInput(
                "Identity mapping needs both a Notion id and a Google task id".to_string(),
            ));
        }

        let created_at = crate::util::now_millis();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO synced_items (relationship_id, notion_id, google_task_id, created_at)
                 VALUES (?, ?, ?, ?)
                 RETURNING id",
                params![tenant.as_str(), notion_id, google_task_id, created_at],
            )
            .await?;
        let id: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(Error::Database("Insert returned no mapping id".to_string())),
        };

        Ok(IdentityMapping {
            id,
            relationship_id: *tenant,
            notion_id: notion_id.to_string(),
            google_task_id: google_task_id.to_string(),
            created_at,
        })
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<IdentityMapping>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MAPPING_COLUMNS} FROM synced_items
                     WHERE relationship_id = ? ORDER BY id ASC"
                ),
                params![tenant.as_str()],
            )
            .await?;

        let mut mappings = Vec::new();
        while let Some(row) = rows.next().await? {
            mappings.push(row_to_mapping(&row)?);
        }
        Ok(mappings)
    }
}

fn row_to_mapping(row: &Row) -> Result<IdentityMapping> {
    let relationship_id: String = row.get(1)?;
    Ok(IdentityMapping {
        id: row.get(0)?,
        relationship_id: relationship_id
            .parse()
            .map_err(|e| Error::Database(format!("Invalid relationship ID: {e}")))?,
        notion_id: row.get(2)?,
        google_task_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}
