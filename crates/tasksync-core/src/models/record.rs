//! Canonical task record shared by both services

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One of the two task services a relationship pairs together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// A Notion database whose rows are tasks
    Notion,
    /// A single Google Tasks list
    GoogleTasks,
}

impl Service {
    /// Stable label used in URLs, storage, and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notion => "notion",
            Self::GoogleTasks => "google_tasks",
        }
    }

    /// The other side of the pairing
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Notion => Self::GoogleTasks,
            Self::GoogleTasks => Self::Notion,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "notion" => Ok(Self::Notion),
            "google_tasks" => Ok(Self::GoogleTasks),
            other => Err(Error::InvalidInput(format!("Unknown service '{other}'"))),
        }
    }
}

/// Vendor-neutral representation of one task.
///
/// Rebuilt from scratch on every fetch. Only `name` and `completed` take part
/// in content comparison, see [`TaskRecord::content_eq`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task title
    pub name: String,
    /// Whether the task is done
    pub completed: bool,
    /// Last edit time as reported by the vendor
    pub updated_at: DateTime<Utc>,
    /// Page id in Notion, if the task exists there
    pub notion_id: Option<String>,
    /// Task id in Google Tasks, if the task exists there
    pub google_task_id: Option<String>,
}

impl TaskRecord {
    /// Create a record that has not been written to either service yet
    pub fn new(name: impl Into<String>, completed: bool, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            completed,
            updated_at,
            notion_id: None,
            google_task_id: None,
        }
    }

    /// Builder-style helper to attach a vendor id
    #[must_use]
    pub fn with_id(mut self, service: Service, id: impl Into<String>) -> Self {
        self.set_id(service, id);
        self
    }

    /// Compare the synchronised content only (name and status)
    pub fn content_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.completed == other.completed
    }

    /// The record's id in the given service
    pub fn id_for(&self, service: Service) -> Option<&str> {
        match service {
            Service::Notion => self.notion_id.as_deref(),
            Service::GoogleTasks => self.google_task_id.as_deref(),
        }
    }

    /// Set the record's id in the given service. Blank ids clear the slot.
    pub fn set_id(&mut self, service: Service, id: impl Into<String>) {
        let id = normalize_id(Some(id.into()));
        match service {
            Service::Notion => self.notion_id = id,
            Service::GoogleTasks => self.google_task_id = id,
        }
    }

    /// True when the record has not been created in `service` yet
    pub fn is_new_for(&self, service: Service) -> bool {
        self.id_for(service).is_none()
    }
}

/// Treat empty or whitespace-only vendor ids as missing
pub fn normalize_id(id: Option<String>) -> Option<String> {
    crate::util::normalize_text_option(id)
}

/// Parse a vendor timestamp.
///
/// Accepts RFC 3339 (`2024-01-01T10:00:00.000Z`, `+02:00` offsets), naive
/// ISO-8601 date-times, and bare dates. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(Error::InvalidInput(format!("Invalid timestamp '{value}'")))
}

/// Format a timestamp the way both vendors emit them
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Format a timestamp keeping every sub-second digit it carries
pub fn format_precise_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
