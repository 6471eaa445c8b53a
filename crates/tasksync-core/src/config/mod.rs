//! Environment-driven configuration shared by the API server and the CLI.
//!
//! Every constructor goes through a `lookup` closure so tests can inject a
//! map instead of touching the process environment.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::is_http_url;

pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-02-22";
pub const DEFAULT_NOTION_STATUS_PROPERTY: &str = "Checkbox";
pub const DEFAULT_GOOGLE_TASKS_API_URL: &str = "https://tasks.googleapis.com/tasks/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Vendor endpoints and HTTP behaviour for the task adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub notion_api_url: String,
    pub notion_version: String,
    /// Checkbox property holding the done flag
    pub notion_status_property: String,
    pub google_tasks_api_url: String,
    /// Per-request ceiling for every vendor call
    pub http_timeout: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            notion_api_url: DEFAULT_NOTION_API_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            notion_status_property: DEFAULT_NOTION_STATUS_PROPERTY.to_string(),
            google_tasks_api_url: DEFAULT_GOOGLE_TASKS_API_URL.to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl AdapterSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let notion_api_url = http_url_or_default(&lookup, "NOTION_API_URL", DEFAULT_NOTION_API_URL)?;
        let notion_version = value_or_default(&lookup, "NOTION_VERSION", DEFAULT_NOTION_VERSION);
        let notion_status_property = value_or_default(
            &lookup,
            "NOTION_STATUS_PROPERTY",
            DEFAULT_NOTION_STATUS_PROPERTY,
        );
        let google_tasks_api_url = http_url_or_default(
            &lookup,
            "GOOGLE_TASKS_API_URL",
            DEFAULT_GOOGLE_TASKS_API_URL,
        )?;
        let timeout_secs = bounded_u64(&lookup, "SYNC_HTTP_TIMEOUT_SECS", 30, 1..=300)?;

        Ok(Self {
            notion_api_url,
            notion_version,
            notion_status_property,
            google_tasks_api_url,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Read `name`, falling back to `default` when unset or blank
pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Parse an integer variable and check it against an inclusive range
pub fn bounded_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let raw = value_or_default(lookup, name, &default.to_string());
    let value = raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

/// Read an http(s) URL, trimming any trailing slash
pub fn http_url_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let value = value_or_default(lookup, name, default);
    if !is_http_url(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must start with http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}
