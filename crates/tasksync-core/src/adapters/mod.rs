//! Vendor adapters.
//!
//! Each adapter translates between one vendor's API and [`TaskRecord`] and
//! exposes the same [`TaskService`] capability set. Token refresh lives in
//! [`AuthorizedClient`], shared by both.

mod google_tasks;
pub(crate) mod http;
mod notion;
mod recorder;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AdapterSettings;
use crate::db::LibSqlIdentityRepository;
use crate::error::{Error, Result};
use crate::models::{Service, SyncRelationship, TaskRecord};

pub use google_tasks::{list_task_lists, GoogleTaskCodec, GoogleTasksList};
pub use http::{parse_api_error, AuthorizedClient, RefreshGrant};
pub use notion::{list_databases, NotionDatabase, NotionPageCodec};
pub use recorder::MappingRecorder;

/// One side of a sync relationship
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Which vendor this adapter talks to
    fn service(&self) -> Service;

    /// Every task currently in the remote list or database
    async fn fetch_all(&self) -> Result<Vec<TaskRecord>>;

    async fn fetch_one(&self, id: &str) -> Result<TaskRecord>;

    /// Create the task remotely and return it with its new vendor id.
    ///
    /// When the record already carries the counterpart id, the identity
    /// mapping is persisted before returning.
    async fn create(&self, record: &TaskRecord) -> Result<TaskRecord>;

    /// Push name and status to the existing remote task
    async fn update(&self, record: &TaskRecord) -> Result<()>;
}

/// A database or task list the user may pick during configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableList {
    pub id: String,
    pub title: String,
}

/// Build both adapters for a relationship.
///
/// Fails with `Error::NotConfigured` when either side lacks credentials or a
/// selected list.
pub fn build_services(
    relationship: &SyncRelationship,
    settings: &AdapterSettings,
    identity: LibSqlIdentityRepository,
) -> Result<(NotionDatabase, GoogleTasksList)> {
    let notion = relationship
        .notion
        .as_ref()
        .ok_or_else(|| Error::NotConfigured("Notion is not connected".to_string()))?;
    let google = relationship
        .google_tasks
        .as_ref()
        .ok_or_else(|| Error::NotConfigured("Google Tasks is not connected".to_string()))?;

    let database_id = notion
        .database_id
        .clone()
        .ok_or_else(|| Error::NotConfigured("No Notion database selected".to_string()))?;
    let title_property = notion
        .title_property
        .clone()
        .ok_or_else(|| Error::NotConfigured("No Notion title property selected".to_string()))?;
    let task_list_id = google
        .task_list_id
        .clone()
        .ok_or_else(|| Error::NotConfigured("No Google task list selected".to_string()))?;

    let recorder = MappingRecorder::new(identity, relationship.id);
    let codec = NotionPageCodec {
        database_id,
        title_property,
        status_property: settings.notion_status_property.clone(),
    };

    let notion_service = NotionDatabase::new(
        &notion.credentials.access_token,
        codec,
        settings,
        recorder.clone(),
    )?;
    let google_service =
        GoogleTasksList::new(&google.credentials, task_list_id, settings, recorder)?;
    Ok((notion_service, google_service))
}
