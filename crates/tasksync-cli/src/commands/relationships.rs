use std::path::Path;

use serde::Serialize;
use tasksync_core::db::{LibSqlRelationshipRepository, RelationshipRepository};
use tasksync_core::SyncRelationship;

use crate::commands::common::{flag, format_timestamp, open_database};
use crate::error::CliError;

/// Credential-free view of a relationship
#[derive(Debug, Serialize)]
pub struct RelationshipItem {
    pub id: String,
    pub user_id: String,
    pub ready: bool,
    pub is_active: bool,
    pub notion_connected: bool,
    pub notion_database_id: Option<String>,
    pub notion_title_property: Option<String>,
    pub google_tasks_connected: bool,
    pub google_task_list_id: Option<String>,
    pub updated_at: i64,
}

pub async fn run_relationships(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let relationships = list_relationships(db_path).await?;

    if as_json {
        let items = relationships
            .iter()
            .map(relationship_to_item)
            .collect::<Vec<RelationshipItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if relationships.is_empty() {
        println!("No sync relationships yet.");
        return Ok(());
    }
    for line in format_relationship_lines(&relationships) {
        println!("{line}");
    }
    Ok(())
}

pub async fn list_relationships(db_path: &Path) -> Result<Vec<SyncRelationship>, CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlRelationshipRepository::new(db.connection().clone());
    Ok(repo.list().await?)
}

pub fn relationship_to_item(relationship: &SyncRelationship) -> RelationshipItem {
    let notion = relationship.notion.as_ref();
    let google = relationship.google_tasks.as_ref();
    RelationshipItem {
        id: relationship.id.to_string(),
        user_id: relationship.user_id.clone(),
        ready: relationship.ready,
        is_active: relationship.is_active,
        notion_connected: notion.is_some(),
        notion_database_id: notion.and_then(|notion| notion.database_id.clone()),
        notion_title_property: notion.and_then(|notion| notion.title_property.clone()),
        google_tasks_connected: google.is_some(),
        google_task_list_id: google.and_then(|google| google.task_list_id.clone()),
        updated_at: relationship.updated_at,
    }
}

pub fn format_relationship_lines(relationships: &[SyncRelationship]) -> Vec<String> {
    relationships
        .iter()
        .map(|relationship| {
            format!(
                "{}  {:<5}  {:<6}  notion={} google={}  user={}  updated {}",
                relationship.id,
                flag(relationship.ready, "ready"),
                flag(relationship.is_active, "active"),
                connection_label(
                    relationship.notion.is_some(),
                    relationship
                        .notion
                        .as_ref()
                        .and_then(|notion| notion.database_id.as_deref())
                ),
                connection_label(
                    relationship.google_tasks.is_some(),
                    relationship
                        .google_tasks
                        .as_ref()
                        .and_then(|google| google.task_list_id.as_deref())
                ),
                relationship.user_id,
                format_timestamp(relationship.updated_at)
            )
        })
        .collect()
}

fn connection_label(connected: bool, selection: Option<&str>) -> String {
    match (connected, selection) {
        (false, _) => "none".to_string(),
        (true, None) => "connected".to_string(),
        (true, Some(id)) => id.to_string(),
    }
}
