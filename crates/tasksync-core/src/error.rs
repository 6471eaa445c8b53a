//! Error types for tasksync-core

use thiserror::Error;

use crate::models::Service;

/// Result type alias using tasksync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tasksync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Record, relationship, or mapping not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored credentials could not be decoded
    #[error("Credential codec error: {0}")]
    Codec(String),

    /// Network-level failure talking to a vendor API
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Vendor API answered with a non-success status
    #[error("{service} API error ({status}): {message}")]
    Api {
        service: Service,
        status: u16,
        message: String,
    },

    /// Access token rejected even after the refresh attempt
    #[error("{service} rejected the credentials: {message}")]
    Unauthorized { service: Service, message: String },

    /// Tried to update a remote task without knowing its id
    #[error("Cannot update {0} task without a remote id")]
    MissingRemoteId(Service),

    /// A relationship lacks the configuration a sync loop needs
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// `start` was requested for a relationship that is not ready
    #[error("Not all services are connected")]
    NotReady,
}

impl Error {
    /// Whether the sync loop should simply retry on its next cycle.
    ///
    /// Vendor outages, rate limits, and failed refreshes are transient;
    /// configuration and storage-shape problems are not.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::Unauthorized { .. } | Self::LibSql(_)
        )
    }
}
