use std::path::Path;

use serde::Serialize;
use tasksync_core::db::{IdentityRepository, LibSqlIdentityRepository};
use tasksync_core::models::IdentityMapping;

use crate::commands::common::{format_timestamp, open_database, parse_tenant, require_relationship};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MappingItem {
    pub id: i64,
    pub notion_id: String,
    pub google_task_id: String,
    pub created_at: i64,
}

pub async fn run_mappings(tenant: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let mappings = list_mappings(tenant, db_path).await?;

    if as_json {
        let items = mappings
            .iter()
            .map(mapping_to_item)
            .collect::<Vec<MappingItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if mappings.is_empty() {
        println!("No synced items for this relationship.");
        return Ok(());
    }
    for line in format_mapping_lines(&mappings) {
        println!("{line}");
    }
    Ok(())
}

pub async fn list_mappings(tenant: &str, db_path: &Path) -> Result<Vec<IdentityMapping>, CliError> {
    let tenant = parse_tenant(tenant)?;
    let db = open_database(db_path).await?;
    require_relationship(&db, &tenant).await?;
    let identity = LibSqlIdentityRepository::new(db.connection().clone());
    Ok(identity.list(&tenant).await?)
}

pub fn mapping_to_item(mapping: &IdentityMapping) -> MappingItem {
    MappingItem {
        id: mapping.id,
        notion_id: mapping.notion_id.clone(),
        google_task_id: mapping.google_task_id.clone(),
        created_at: mapping.created_at,
    }
}

pub fn format_mapping_lines(mappings: &[IdentityMapping]) -> Vec<String> {
    mappings
        .iter()
        .map(|mapping| {
            format!(
                "{}  notion={}  google={}",
                format_timestamp(mapping.created_at),
                mapping.notion_id,
                mapping.google_task_id
            )
        })
        .collect()
}
