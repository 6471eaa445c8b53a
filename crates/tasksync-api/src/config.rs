use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use tasksync_core::config::{
    bounded_u64, http_url_or_default, optional_trimmed, required_trimmed, value_or_default,
    AdapterSettings, ConfigError,
};
use tasksync_core::util::is_http_url;

pub const DEFAULT_NOTION_AUTHORIZATION_URL: &str = "https://api.notion.com/v1/oauth/authorize";
pub const DEFAULT_NOTION_TOKEN_URL: &str = "https://api.notion.com/v1/oauth/token";
pub const DEFAULT_GOOGLE_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub jwt_secret: String,
    pub sync_interval: Duration,
    pub oauth_state_ttl: Duration,
    /// Base URL the OAuth providers redirect back to
    pub public_base_url: String,
    /// Where the browser lands after a successful connection
    pub frontend_url: Option<String>,
    pub notion_oauth: OAuthClientConfig,
    /// Title property assumed for a freshly connected Notion database
    pub notion_title_property: String,
    pub google_oauth: OAuthClientConfig,
    pub adapter: AdapterSettings,
}

/// One OAuth provider's client registration and endpoints
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_url: String,
    pub token_url: String,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("sync_interval", &self.sync_interval)
            .field("oauth_state_ttl", &self.oauth_state_ttl)
            .field("public_base_url", &self.public_base_url)
            .field("frontend_url", &self.frontend_url)
            .field("notion_oauth", &self.notion_oauth)
            .field("notion_title_property", &self.notion_title_property)
            .field("google_oauth", &self.google_oauth)
            .field("adapter", &self.adapter)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TASKSYNC_BIND_ADDR", "127.0.0.1:8080");
        let db_path = value_or_default(&lookup, "TASKSYNC_DB_PATH", "tasksync.db");
        let jwt_secret = required_trimmed(&lookup, "TASKSYNC_JWT_SECRET")?;

        let sync_interval_secs = bounded_u64(&lookup, "SYNC_INTERVAL_SECS", 10, 1..=3_600)?;
        let oauth_state_ttl_secs = bounded_u64(&lookup, "OAUTH_STATE_TTL_SECS", 600, 30..=3_600)?;

        let public_base_url = required_trimmed(&lookup, "PUBLIC_BASE_URL")?;
        if !is_http_url(&public_base_url) {
            return Err(ConfigError::Invalid(
                "PUBLIC_BASE_URL must start with http:// or https://".to_string(),
            ));
        }
        let public_base_url = trim_trailing(&public_base_url).to_string();

        let frontend_url = optional_trimmed(&lookup, "FRONTEND_URL");
        if let Some(url) = frontend_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "FRONTEND_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let notion_oauth = OAuthClientConfig {
            client_id: required_trimmed(&lookup, "NOTION_OAUTH_CLIENT_ID")?,
            client_secret: required_trimmed(&lookup, "NOTION_OAUTH_CLIENT_SECRET")?,
            authorization_url: http_url_or_default(
                &lookup,
                "NOTION_AUTHORIZATION_URL",
                DEFAULT_NOTION_AUTHORIZATION_URL,
            )?,
            token_url: http_url_or_default(&lookup, "NOTION_TOKEN_URL", DEFAULT_NOTION_TOKEN_URL)?,
        };
        let notion_title_property = value_or_default(&lookup, "NOTION_TITLE_PROPERTY", "Name");

        let google_oauth = OAuthClientConfig {
            client_id: required_trimmed(&lookup, "GOOGLE_CLIENT_ID")?,
            client_secret: required_trimmed(&lookup, "GOOGLE_CLIENT_SECRET")?,
            authorization_url: http_url_or_default(
                &lookup,
                "GOOGLE_AUTHORIZATION_URL",
                DEFAULT_GOOGLE_AUTHORIZATION_URL,
            )?,
            token_url: http_url_or_default(&lookup, "GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL)?,
        };

        let adapter = AdapterSettings::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            db_path,
            jwt_secret,
            sync_interval: Duration::from_secs(sync_interval_secs),
            oauth_state_ttl: Duration::from_secs(oauth_state_ttl_secs),
            public_base_url,
            frontend_url,
            notion_oauth,
            notion_title_property,
            google_oauth,
            adapter,
        })
    }
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}
