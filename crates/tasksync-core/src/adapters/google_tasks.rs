//! Google Tasks list adapter

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::http::{AuthorizedClient, RefreshGrant};
use super::recorder::MappingRecorder;
use super::{AvailableList, TaskService};
use crate::config::AdapterSettings;
use crate::error::{Error, Result};
use crate::models::{
    format_precise_timestamp, normalize_id, parse_timestamp, GoogleCredentials, Service,
    TaskRecord,
};

const STATUS_COMPLETED: &str = "completed";
const STATUS_NEEDS_ACTION: &str = "needsAction";
const MAX_RESULTS: &str = "100";

/// Subset of the Tasks API `Task` resource the sync cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GoogleTaskWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTaskList {
    id: String,
    #[serde(default)]
    title: String,
}

/// Converts between Google task resources and [`TaskRecord`]s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoogleTaskCodec;

impl GoogleTaskCodec {
    /// Request body for inserts and patches
    pub fn write_body(record: &TaskRecord) -> Value {
        json!({
            "title": record.name,
            "status": status_label(record.completed),
        })
    }

    /// Full task representation of a record
    pub fn record_to_value(record: &TaskRecord) -> Value {
        let wire = GoogleTaskWire {
            id: record.google_task_id.clone(),
            title: Some(record.name.clone()),
            status: Some(status_label(record.completed).to_string()),
            updated: Some(format_precise_timestamp(&record.updated_at)),
            deleted: false,
        };
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }

    /// Read a task into a record. Returns `None` for deleted tasks.
    pub fn value_to_record(value: &Value) -> Result<Option<TaskRecord>> {
        let wire: GoogleTaskWire = serde_json::from_value(value.clone())
            .map_err(|error| invalid(&error.to_string()))?;
        Self::wire_to_record(wire)
    }

    fn wire_to_record(wire: GoogleTaskWire) -> Result<Option<TaskRecord>> {
        if wire.deleted {
            return Ok(None);
        }
        let updated = wire
            .updated
            .as_deref()
            .ok_or_else(|| invalid("task has no updated timestamp"))?;

        Ok(Some(TaskRecord {
            name: wire.title.unwrap_or_default(),
            completed: wire.status.as_deref() == Some(STATUS_COMPLETED),
            updated_at: parse_timestamp(updated)?,
            notion_id: None,
            google_task_id: normalize_id(wire.id),
        }))
    }
}

const fn status_label(completed: bool) -> &'static str {
    if completed {
        STATUS_COMPLETED
    } else {
        STATUS_NEEDS_ACTION
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput(format!("Invalid Google task: {message}"))
}

/// Google Tasks list acting as one side of a relationship
#[derive(Debug)]
pub struct GoogleTasksList {
    client: AuthorizedClient,
    api_url: String,
    task_list_id: String,
    recorder: MappingRecorder,
}

impl GoogleTasksList {
    pub fn new(
        credentials: &GoogleCredentials,
        task_list_id: impl Into<String>,
        settings: &AdapterSettings,
        recorder: MappingRecorder,
    ) -> Result<Self> {
        Ok(Self {
            client: google_client(credentials, settings)?,
            api_url: settings.google_tasks_api_url.clone(),
            task_list_id: task_list_id.into(),
            recorder,
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/lists/{}/tasks", self.api_url, self.task_list_id)
    }
}

#[async_trait]
impl TaskService for GoogleTasksList {
    fn service(&self) -> Service {
        Service::GoogleTasks
    }

    async fn fetch_all(&self) -> Result<Vec<TaskRecord>> {
        let url = self.tasks_url();
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("maxResults", MAX_RESULTS.to_string()),
                ("showCompleted", "true".to_string()),
                ("showHidden", "true".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let value = self.client.send_json(Method::GET, &url, &query, None).await?;
            let page: GooglePage<GoogleTaskWire> = serde_json::from_value(value)?;
            for wire in page.items {
                match GoogleTaskCodec::wire_to_record(wire) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(error) => tracing::warn!(%error, "Skipping unreadable Google task"),
                }
            }

            page_token = page.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn fetch_one(&self, id: &str) -> Result<TaskRecord> {
        let url = format!("{}/{id}", self.tasks_url());
        let value = self.client.send_json(Method::GET, &url, &[], None).await?;
        GoogleTaskCodec::value_to_record(&value)?
            .ok_or_else(|| Error::NotFound(format!("Google task {id} is deleted")))
    }

    async fn create(&self, record: &TaskRecord) -> Result<TaskRecord> {
        let body = GoogleTaskCodec::write_body(record);
        let value = self
            .client
            .send_json(Method::POST, &self.tasks_url(), &[], Some(&body))
            .await?;

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("insert response has no id"))?;
        let mut created = record.clone();
        created.set_id(Service::GoogleTasks, id);
        self.recorder.record(&created).await?;
        Ok(created)
    }

    async fn update(&self, record: &TaskRecord) -> Result<()> {
        let id = record
            .id_for(Service::GoogleTasks)
            .ok_or(Error::MissingRemoteId(Service::GoogleTasks))?;
        let url = format!("{}/{id}", self.tasks_url());
        let body = GoogleTaskCodec::write_body(record);
        self.client
            .send_json(Method::PATCH, &url, &[], Some(&body))
            .await?;
        Ok(())
    }
}

fn google_client(
    credentials: &GoogleCredentials,
    settings: &AdapterSettings,
) -> Result<AuthorizedClient> {
    AuthorizedClient::new(
        Service::GoogleTasks,
        credentials.access_token.clone(),
        RefreshGrant::from_google(credentials),
        settings.http_timeout,
        HeaderMap::new(),
    )
}

/// Task lists of the connected account, for the configuration screen
pub async fn list_task_lists(
    credentials: &GoogleCredentials,
    settings: &AdapterSettings,
) -> Result<Vec<AvailableList>> {
    let client = google_client(credentials, settings)?;
    let url = format!("{}/users/@me/lists", settings.google_tasks_api_url);
    let mut lists = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut query = vec![("maxResults", MAX_RESULTS.to_string())];
        if let Some(token) = page_token.take() {
            query.push(("pageToken", token));
        }
        let value = client.send_json(Method::GET, &url, &query, None).await?;
        let page: GooglePage<GoogleTaskList> = serde_json::from_value(value)?;
        lists.extend(page.items.into_iter().map(|list| AvailableList {
            id: list.id,
            title: list.title,
        }));

        page_token = page.next_page_token.filter(|token| !token.is_empty());
        if page_token.is_none() {
            break;
        }
    }

    Ok(lists)
}
