//! Sync relationship repository

use libsql::{params, Connection, Row, Value};
use serde::Deserialize;

use crate::codec::CredentialCodec;
use crate::error::{Error, Result};
use crate::models::{
    GoogleCredentials, GoogleTasksConnection, NotionConnection, NotionCredentials,
    SyncRelationship, TenantId,
};
use crate::util::normalize_text_option;

const RELATIONSHIP_COLUMNS: &str =
    "id, user_id, notion_data, google_tasks_data, ready, is_active, created_at, updated_at";

/// User-chosen list, database, and title property.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListSelection {
    #[serde(default)]
    pub task_list_id: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub title_property: Option<String>,
}

/// Trait for relationship storage operations (async)
#[allow(async_fn_in_trait)]
pub trait RelationshipRepository {
    async fn get(&self, id: &TenantId) -> Result<Option<SyncRelationship>>;

    async fn get_by_user(&self, user_id: &str) -> Result<Option<SyncRelationship>>;

    /// Load the user's relationship, creating an empty one if needed
    async fn get_or_create_for_user(&self, user_id: &str) -> Result<SyncRelationship>;

    /// All relationships, oldest first
    async fn list(&self) -> Result<Vec<SyncRelationship>>;

    /// Relationships whose loops should run after a restart
    async fn list_ready(&self) -> Result<Vec<SyncRelationship>>;

    /// Store fresh Notion credentials, creating the relationship if needed
    async fn connect_notion(
        &self,
        user_id: &str,
        credentials: NotionCredentials,
    ) -> Result<SyncRelationship>;

    /// Store fresh Google credentials, creating the relationship if needed
    async fn connect_google_tasks(
        &self,
        user_id: &str,
        credentials: GoogleCredentials,
    ) -> Result<SyncRelationship>;

    /// Apply the user's list/database/title selection
    async fn configure(
        &self,
        id: &TenantId,
        selection: &ListSelection,
    ) -> Result<SyncRelationship>;

    async fn set_active(&self, id: &TenantId, active: bool) -> Result<()>;

    /// Delete a relationship and, through the foreign key, its mappings
    async fn delete(&self, id: &TenantId) -> Result<bool>;
}

/// libSQL implementation of `RelationshipRepository`
#[derive(Clone)]
pub struct LibSqlRelationshipRepository {
    conn: Connection,
}

impl LibSqlRelationshipRepository {
    /// Create a new repository with the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    async fn query_one(&self, filter: &str, value: String) -> Result<Option<SyncRelationship>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM sync_relationships WHERE {filter} = ?"),
                params![value],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_relationship(&row)?)),
            None => Ok(None),
        }
    }

    async fn query_many(&self, sql: &str) -> Result<Vec<SyncRelationship>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next().await? {
            relationships.push(row_to_relationship(&row)?);
        }
        Ok(relationships)
    }

    /// Upsert the whole row. Readiness is re-evaluated first and never lowered.
    async fn save(&self, relationship: &mut SyncRelationship) -> Result<()> {
        relationship.refresh_readiness();
        relationship.touch();

        let notion_data = CredentialCodec::encode_optional(relationship.notion.as_ref())?;
        let google_data = CredentialCodec::encode_optional(relationship.google_tasks.as_ref())?;

        self.conn
            .execute(
                "INSERT INTO sync_relationships
                    (id, user_id, notion_data, google_tasks_data, ready, is_active, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    notion_data = excluded.notion_data,
                    google_tasks_data = excluded.google_tasks_data,
                    ready = MAX(sync_relationships.ready, excluded.ready),
                    updated_at = excluded.updated_at",
                params![
                    relationship.id.as_str(),
                    relationship.user_id.clone(),
                    optional_text(notion_data),
                    optional_text(google_data),
                    i64::from(relationship.ready),
                    i64::from(relationship.is_active),
                    relationship.created_at,
                    relationship.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn require(&self, id: &TenantId) -> Result<SyncRelationship> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sync relationship {id}")))
    }
}

impl RelationshipRepository for LibSqlRelationshipRepository {
    async fn get(&self, id: &TenantId) -> Result<Option<SyncRelationship>> {
        self.query_one("id", id.as_str()).await
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Option<SyncRelationship>> {
        self.query_one("user_id", user_id.to_string()).await
    }

    async fn get_or_create_for_user(&self, user_id: &str) -> Result<SyncRelationship> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidInput("User id cannot be empty".to_string()));
        }
        if let Some(existing) = self.get_by_user(user_id).await? {
            return Ok(existing);
        }

        let mut relationship = SyncRelationship::new(user_id);
        self.save(&mut relationship).await?;
        tracing::info!(tenant = %relationship.id, "Created sync relationship");
        Ok(relationship)
    }

    async fn list(&self) -> Result<Vec<SyncRelationship>> {
        self.query_many(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM sync_relationships ORDER BY created_at ASC, id ASC"
        ))
        .await
    }

    async fn list_ready(&self) -> Result<Vec<SyncRelationship>> {
        self.query_many(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM sync_relationships
             WHERE ready = 1 ORDER BY created_at ASC, id ASC"
        ))
        .await
    }

    async fn connect_notion(
        &self,
        user_id: &str,
        credentials: NotionCredentials,
    ) -> Result<SyncRelationship> {
        let mut relationship = self.get_or_create_for_user(user_id).await?;
        match relationship.notion.as_mut() {
            Some(connection) => connection.credentials = credentials,
            None => relationship.notion = Some(NotionConnection::new(credentials)),
        }
        self.save(&mut relationship).await?;
        Ok(relationship)
    }

    async fn connect_google_tasks(
        &self,
        user_id: &str,
        credentials: GoogleCredentials,
    ) -> Result<SyncRelationship> {
        let mut relationship = self.get_or_create_for_user(user_id).await?;
        match relationship.google_tasks.as_mut() {
            Some(connection) => connection.credentials = credentials,
            None => relationship.google_tasks = Some(GoogleTasksConnection::new(credentials)),
        }
        self.save(&mut relationship).await?;
        Ok(relationship)
    }

    async fn configure(
        &self,
        id: &TenantId,
        selection: &ListSelection,
    ) -> Result<SyncRelationship> {
        let mut relationship = self.require(id).await?;

        let task_list_id = normalize_text_option(selection.task_list_id.clone());
        let database_id = normalize_text_option(selection.database_id.clone());
        let title_property = normalize_text_option(selection.title_property.clone());

        if let Some(task_list_id) = task_list_id {
            let google = relationship.google_tasks.as_mut().ok_or_else(|| {
                Error::InvalidInput("Connect Google Tasks before choosing a task list".to_string())
            })?;
            google.task_list_id = Some(task_list_id);
        }
        if database_id.is_some() || title_property.is_some() {
            let notion = relationship.notion.as_mut().ok_or_else(|| {
                Error::InvalidInput("Connect Notion before choosing a database".to_string())
            })?;
            if database_id.is_some() {
                notion.database_id = database_id;
            }
            if title_property.is_some() {
                notion.title_property = title_property;
            }
        }

        self.save(&mut relationship).await?;
        Ok(relationship)
    }

    async fn set_active(&self, id: &TenantId, active: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_relationships SET is_active = ?, updated_at = ? WHERE id = ?",
                params![i64::from(active), crate::util::now_millis(), id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &TenantId) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM sync_relationships WHERE id = ?",
                params![id.as_str()],
            )
            .await?;
        Ok(affected > 0)
    }
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn row_to_relationship(row: &Row) -> Result<SyncRelationship> {
    let id: String = row.get(0)?;
    let notion_data: Option<String> = row.get(2).ok();
    let google_data: Option<String> = row.get(3).ok();
    let ready: i64 = row.get(4)?;
    let is_active: i64 = row.get(5)?;

    Ok(SyncRelationship {
        id: id
            .parse()
            .map_err(|e| Error::Database(format!("Invalid relationship ID: {e}")))?,
        user_id: row.get(1)?,
        notion: CredentialCodec::decode_optional(notion_data.as_deref())?,
        google_tasks: CredentialCodec::decode_optional(google_data.as_deref())?,
        ready: ready != 0,
        is_active: is_active != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
