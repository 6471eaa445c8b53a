use std::env;
use std::path::{Path, PathBuf};

use tasksync_core::db::{Database, LibSqlRelationshipRepository, RelationshipRepository};
use tasksync_core::{SyncRelationship, TenantId};

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TASKSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasksync")
        .join("tasksync.db")
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Database::open(path).await?)
}

pub fn parse_tenant(raw: &str) -> Result<TenantId, CliError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<TenantId>()
        .map_err(|_| CliError::InvalidTenant(trimmed.to_string()))
}

/// Load a relationship or fail with `TenantNotFound`
pub async fn require_relationship(
    db: &Database,
    tenant: &TenantId,
) -> Result<SyncRelationship, CliError> {
    LibSqlRelationshipRepository::new(db.connection().clone())
        .get(tenant)
        .await?
        .ok_or_else(|| CliError::TenantNotFound(tenant.to_string()))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub const fn flag(value: bool, label: &'static str) -> &'static str {
    if value {
        label
    } else {
        "-"
    }
}
