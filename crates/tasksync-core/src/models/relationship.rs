//! Sync relationship (tenant) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a sync relationship, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Create a new unique tenant ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// OAuth credentials for a Notion integration.
///
/// Notion access tokens do not expire, so there is no refresh token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionCredentials {
    pub access_token: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl fmt::Debug for NotionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionCredentials")
            .field("access_token", &"[REDACTED]")
            .field("workspace_id", &self.workspace_id)
            .field("workspace_name", &self.workspace_name)
            .field("bot_id", &self.bot_id)
            .finish()
    }
}

/// OAuth2 credentials for Google Tasks
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleCredentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Unix seconds, informational only
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Notion side of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionConnection {
    pub credentials: NotionCredentials,
    /// Database whose rows are synced
    #[serde(default)]
    pub database_id: Option<String>,
    /// Name of the title property in that database
    #[serde(default)]
    pub title_property: Option<String>,
}

impl NotionConnection {
    pub const fn new(credentials: NotionCredentials) -> Self {
        Self {
            credentials,
            database_id: None,
            title_property: None,
        }
    }

    /// Database and title property are both chosen
    pub const fn is_configured(&self) -> bool {
        self.database_id.is_some() && self.title_property.is_some()
    }
}

/// Google Tasks side of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleTasksConnection {
    pub credentials: GoogleCredentials,
    /// Task list that mirrors the Notion database
    #[serde(default)]
    pub task_list_id: Option<String>,
}

impl GoogleTasksConnection {
    pub const fn new(credentials: GoogleCredentials) -> Self {
        Self {
            credentials,
            task_list_id: None,
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.task_list_id.is_some()
    }
}

/// One user's pairing of a Notion database with a Google Tasks list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRelationship {
    /// Unique identifier
    pub id: TenantId,
    /// Owner (the authenticated user's id)
    pub user_id: String,
    pub notion: Option<NotionConnection>,
    pub google_tasks: Option<GoogleTasksConnection>,
    /// Both sides connected and configured. Never reset once set.
    pub ready: bool,
    /// A sync loop is currently running
    pub is_active: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncRelationship {
    /// Create an empty relationship for a user
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: TenantId::new(),
            user_id: user_id.into(),
            notion: None,
            google_tasks: None,
            ready: false,
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether both sides currently carry everything a sync loop needs
    pub fn meets_readiness(&self) -> bool {
        self.notion
            .as_ref()
            .is_some_and(NotionConnection::is_configured)
            && self
                .google_tasks
                .as_ref()
                .is_some_and(GoogleTasksConnection::is_configured)
    }

    /// Latch `ready` once the configuration is complete. Never clears it.
    pub fn refresh_readiness(&mut self) {
        if !self.ready && self.meets_readiness() {
            self.ready = true;
        }
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
