use std::io;

use tasksync_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tasksync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid relationship id: {0}")]
    InvalidTenant(String),
    #[error("Relationship not found: {0}")]
    TenantNotFound(String),
}
