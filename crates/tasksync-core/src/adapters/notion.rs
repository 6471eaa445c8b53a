//! Notion database adapter

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};

use super::http::AuthorizedClient;
use super::recorder::MappingRecorder;
use super::{AvailableList, TaskService};
use crate::config::AdapterSettings;
use crate::error::{Error, Result};
use crate::models::{
    format_precise_timestamp, normalize_id, parse_timestamp, Service, TaskRecord,
};

const PAGE_SIZE: u64 = 100;

/// Converts between Notion page objects and [`TaskRecord`]s.
///
/// Pure: no I/O, so the wire mapping can be tested on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionPageCodec {
    pub database_id: String,
    pub title_property: String,
    pub status_property: String,
}

impl NotionPageCodec {
    /// `properties` object for create and update requests
    pub fn properties(&self, record: &TaskRecord) -> Value {
        let mut properties = Map::new();
        properties.insert(
            self.title_property.clone(),
            json!({ "title": [{ "type": "text", "text": { "content": record.name } }] }),
        );
        properties.insert(
            self.status_property.clone(),
            json!({ "checkbox": record.completed }),
        );
        Value::Object(properties)
    }

    /// Request body for creating a page in the configured database
    pub fn create_body(&self, record: &TaskRecord) -> Value {
        json!({
            "parent": { "type": "database_id", "database_id": self.database_id },
            "properties": self.properties(record),
        })
    }

    /// Full page representation of a record
    pub fn record_to_value(&self, record: &TaskRecord) -> Value {
        let mut page = self.create_body(record);
        if let Value::Object(fields) = &mut page {
            fields.insert("object".to_string(), json!("page"));
            fields.insert(
                "last_edited_time".to_string(),
                json!(format_precise_timestamp(&record.updated_at)),
            );
            if let Some(id) = record.notion_id.as_deref() {
                fields.insert("id".to_string(), json!(id));
            }
        }
        page
    }

    /// Read a page into a record. The Google id is left for annotation.
    pub fn value_to_record(&self, value: &Value) -> Result<TaskRecord> {
        let properties = value
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("page has no properties"))?;

        let title = properties
            .get(&self.title_property)
            .and_then(|property| property.get("title"))
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(&format!("missing title property '{}'", self.title_property)))?;
        let name: String = title.iter().map(rich_text_content).collect();

        let completed = properties
            .get(&self.status_property)
            .and_then(|property| property.get("checkbox"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let edited = value
            .get("last_edited_time")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("page has no last_edited_time"))?;

        Ok(TaskRecord {
            name,
            completed,
            updated_at: parse_timestamp(edited)?,
            notion_id: normalize_id(value.get("id").and_then(Value::as_str).map(str::to_string)),
            google_task_id: None,
        })
    }
}

fn rich_text_content(fragment: &Value) -> &str {
    fragment
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| fragment.pointer("/text/content").and_then(Value::as_str))
        .unwrap_or_default()
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput(format!("Invalid Notion page: {message}"))
}

/// Notion database acting as one side of a relationship
#[derive(Debug)]
pub struct NotionDatabase {
    client: AuthorizedClient,
    api_url: String,
    codec: NotionPageCodec,
    recorder: MappingRecorder,
}

impl NotionDatabase {
    pub fn new(
        access_token: &str,
        codec: NotionPageCodec,
        settings: &AdapterSettings,
        recorder: MappingRecorder,
    ) -> Result<Self> {
        let client = notion_client(access_token, settings)?;
        Ok(Self {
            client,
            api_url: settings.notion_api_url.clone(),
            codec,
            recorder,
        })
    }

    pub const fn codec(&self) -> &NotionPageCodec {
        &self.codec
    }

    fn decode_pages(&self, results: &[Value]) -> Vec<TaskRecord> {
        results
            .iter()
            .filter_map(|page| match self.codec.value_to_record(page) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!(%error, "Skipping unreadable Notion page");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl TaskService for NotionDatabase {
    fn service(&self) -> Service {
        Service::Notion
    }

    async fn fetch_all(&self) -> Result<Vec<TaskRecord>> {
        let url = format!("{}/databases/{}/query", self.api_url, self.codec.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = cursor.as_deref() {
                body["start_cursor"] = json!(cursor);
            }
            let page = self
                .client
                .send_json(Method::POST, &url, &[], Some(&body))
                .await?;

            if let Some(results) = page.get("results").and_then(Value::as_array) {
                records.extend(self.decode_pages(results));
            }

            let has_more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = page
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn fetch_one(&self, id: &str) -> Result<TaskRecord> {
        let url = format!("{}/pages/{id}", self.api_url);
        let page = self.client.send_json(Method::GET, &url, &[], None).await?;
        self.codec.value_to_record(&page)
    }

    async fn create(&self, record: &TaskRecord) -> Result<TaskRecord> {
        let url = format!("{}/pages", self.api_url);
        let body = self.codec.create_body(record);
        let page = self
            .client
            .send_json(Method::POST, &url, &[], Some(&body))
            .await?;

        let id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("create response has no id"))?;
        let mut created = record.clone();
        created.set_id(Service::Notion, id);
        self.recorder.record(&created).await?;
        Ok(created)
    }

    async fn update(&self, record: &TaskRecord) -> Result<()> {
        let id = record
            .id_for(Service::Notion)
            .ok_or(Error::MissingRemoteId(Service::Notion))?;
        let url = format!("{}/pages/{id}", self.api_url);
        let body = json!({ "properties": self.codec.properties(record) });
        self.client
            .send_json(Method::PATCH, &url, &[], Some(&body))
            .await?;
        Ok(())
    }
}

fn notion_client(access_token: &str, settings: &AdapterSettings) -> Result<AuthorizedClient> {
    let mut headers = HeaderMap::new();
    let version = HeaderValue::from_str(&settings.notion_version)
        .map_err(|_| Error::InvalidInput("NOTION_VERSION is not a valid header value".to_string()))?;
    headers.insert(HeaderName::from_static("notion-version"), version);
    AuthorizedClient::new(
        Service::Notion,
        access_token,
        None,
        settings.http_timeout,
        headers,
    )
}

/// Databases the integration can see, for the configuration screen
pub async fn list_databases(
    access_token: &str,
    settings: &AdapterSettings,
) -> Result<Vec<AvailableList>> {
    let client = notion_client(access_token, settings)?;
    let url = format!("{}/search", settings.notion_api_url);
    let mut lists = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut body = json!({
            "filter": { "property": "object", "value": "database" },
            "page_size": PAGE_SIZE,
        });
        if let Some(cursor) = cursor.as_deref() {
            body["start_cursor"] = json!(cursor);
        }
        let page = client.send_json(Method::POST, &url, &[], Some(&body)).await?;

        for database in page
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let Some(id) = database.get("id").and_then(Value::as_str) else {
                continue;
            };
            let title: String = database
                .get("title")
                .and_then(Value::as_array)
                .map(|fragments| fragments.iter().map(rich_text_content).collect())
                .unwrap_or_default();
            lists.push(AvailableList {
                id: id.to_string(),
                title,
            });
        }

        let has_more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        cursor = page
            .get("next_cursor")
            .and_then(Value::as_str)
            .map(str::to_string);
        if !has_more || cursor.is_none() {
            break;
        }
    }

    Ok(lists)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::adapters::http::test_server;
    use crate::db::{
        Database, IdentityRepository, LibSqlIdentityRepository, LibSqlRelationshipRepository,
        RelationshipRepository,
    };
    use crate::models::TenantId;

    fn codec() -> NotionPageCodec {
        NotionPageCodec {
            database_id: "db-1".to_string(),
            title_property: "Task".to_string(),
            status_property: "Done".to_string(),
        }
    }

    fn page(id: &str, name: &str, done: bool, edited: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "last_edited_time": edited,
            "properties": {
                "Task": { "id": "title", "type": "title", "title": [
                    { "type": "text", "text": { "content": name }, "plain_text": name }
                ] },
                "Done": { "id": "abc", "type": "checkbox", "checkbox": done }
            }
        })
    }

    #[test]
    fn value_to_record_reads_configured_properties() {
        let record = codec()
            .value_to_record(&page("p1", "Buy milk", true, "2024-01-01T10:00:00.000Z"))
            .unwrap();
        assert_eq!(
            record,
            TaskRecord {
                name: "Buy milk".to_string(),
                completed: true,
                updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                notion_id: Some("p1".to_string()),
                google_task_id: None,
            }
        );
    }

    #[test]
    fn title_fragments_are_concatenated() {
        let value = json!({
            "id": "p1",
            "last_edited_time": "2024-01-01T10:00:00.000Z",
            "properties": {
                "Task": { "title": [ { "plain_text": "Buy " }, { "plain_text": "milk" } ] }
            }
        });
        let record = codec().value_to_record(&value).unwrap();
        assert_eq!(record.name, "Buy milk");
        assert!(!record.completed);
    }

    #[test]
    fn missing_title_property_is_an_error() {
        let mut other = codec();
        other.title_property = "Name".to_string();
        let err = other
            .value_to_record(&page("p1", "X", false, "2024-01-01T00:00:00Z"))
            .unwrap_err();
        assert!(err.to_string().contains("Name"));
    }

    #[test]
    fn record_round_trips_through_page_value() {
        let record = TaskRecord::new(
            "Write report",
            true,
            Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap(),
        )
        .with_id(Service::Notion, "page-9");
        let codec = codec();
        assert_eq!(
            codec
                .value_to_record(&codec.record_to_value(&record))
                .unwrap(),
            record
        );
    }

    #[test]
    fn record_round_trip_keeps_sub_millisecond_time() {
        let record = TaskRecord::new(
            "Write report",
            false,
            Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap()
                + chrono::Duration::microseconds(1_234),
        )
        .with_id(Service::Notion, "page-9");
        let codec = codec();
        assert_eq!(
            codec
                .value_to_record(&codec.record_to_value(&record))
                .unwrap(),
            record
        );
    }

    #[test]
    fn create_body_targets_the_database() {
        let record = TaskRecord::new("X", false, Utc::now());
        let body = codec().create_body(&record);
        assert_eq!(body["parent"]["database_id"], json!("db-1"));
        assert_eq!(body["properties"]["Done"]["checkbox"], json!(false));
        assert_eq!(
            body["properties"]["Task"]["title"][0]["text"]["content"],
            json!("X")
        );
    }

    #[derive(Clone, Default)]
    struct Captured {
        created: Arc<Mutex<Vec<Value>>>,
        versions: Arc<Mutex<Vec<String>>>,
    }

    fn notion_router(captured: Captured) -> Router {
        Router::new()
            .route(
                "/v1/databases/{id}/query",
                post(
                    |State(captured): State<Captured>,
                     headers: AxumHeaders,
                     Path(id): Path<String>,
                     Json(body): Json<Value>| async move {
                        assert_eq!(id, "db-1");
                        if let Some(version) = headers.get("notion-version") {
                            captured
                                .versions
                                .lock()
                                .unwrap()
                                .push(version.to_str().unwrap().to_string());
                        }
                        if body.get("start_cursor").is_none() {
                            Json(json!({
                                "object": "list",
                                "results": [page("p1", "One", false, "2024-01-01T00:00:00.000Z")],
                                "has_more": true,
                                "next_cursor": "cursor-2"
                            }))
                        } else {
                            Json(json!({
                                "object": "list",
                                "results": [
                                    page("p2", "Two", true, "2024-01-02T00:00:00.000Z"),
                                    { "id": "broken", "properties": {} }
                                ],
                                "has_more": false,
                                "next_cursor": null
                            }))
                        }
                    },
                ),
            )
            .route(
                "/v1/pages",
                post(
                    |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                        captured.created.lock().unwrap().push(body);
                        Json(page("new-page", "Created", false, "2024-01-05T00:00:00.000Z"))
                    },
                ),
            )
            .route(
                "/v1/pages/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(page(&id, "Fetched", true, "2024-01-03T00:00:00.000Z"))
                }),
            )
            .route(
                "/v1/search",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["filter"]["value"], json!("database"));
                    Json(json!({
                        "results": [
                            { "object": "database", "id": "db-1", "title": [ { "plain_text": "Tasks" } ] },
                            { "object": "database", "id": "db-2", "title": [] }
                        ],
                        "has_more": false
                    }))
                }),
            )
            .with_state(captured)
    }

    async fn setup(base: &str) -> (Database, TenantId, NotionDatabase) {
        let db = Database::open_in_memory().await.unwrap();
        let tenant = LibSqlRelationshipRepository::new(db.connection().clone())
            .get_or_create_for_user("user-1")
            .await
            .unwrap()
            .id;
        let settings = AdapterSettings {
            notion_api_url: format!("{base}/v1"),
            ..AdapterSettings::default()
        };
        let recorder =
            MappingRecorder::new(LibSqlIdentityRepository::new(db.connection().clone()), tenant);
        let adapter = NotionDatabase::new("secret_token", codec(), &settings, recorder).unwrap();
        (db, tenant, adapter)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_follows_cursors_and_skips_unreadable_pages() {
        let captured = Captured::default();
        let base = test_server::spawn(notion_router(captured.clone())).await;
        let (_db, _tenant, adapter) = setup(&base).await;

        let records = adapter.fetch_all().await.unwrap();
        let names: Vec<&str> = records.iter().map(|record| record.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);
        assert_eq!(
            captured.versions.lock().unwrap().clone(),
            vec!["2022-02-22".to_string(), "2022-02-22".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_one_reads_a_single_page() {
        let base = test_server::spawn(notion_router(Captured::default())).await;
        let (_db, _tenant, adapter) = setup(&base).await;

        let record = adapter.fetch_one("p7").await.unwrap();
        assert_eq!(record.notion_id.as_deref(), Some("p7"));
        assert!(record.completed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_records_mapping_for_google_origin_task() {
        let captured = Captured::default();
        let base = test_server::spawn(notion_router(captured.clone())).await;
        let (db, tenant, adapter) = setup(&base).await;

        let incoming = TaskRecord::new("From Google", false, Utc::now())
            .with_id(Service::GoogleTasks, "task-1");
        let created = adapter.create(&incoming).await.unwrap();
        assert_eq!(created.notion_id.as_deref(), Some("new-page"));
        assert_eq!(created.google_task_id.as_deref(), Some("task-1"));

        let sent = captured.created.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["parent"]["database_id"], json!("db-1"));

        let mapping = LibSqlIdentityRepository::new(db.connection().clone())
            .get_by_id(&tenant, Service::Notion, "new-page")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.google_task_id, "task-1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_without_id_is_rejected_before_any_request() {
        let base = test_server::spawn(notion_router(Captured::default())).await;
        let (_db, _tenant, adapter) = setup(&base).await;

        let record = TaskRecord::new("X", false, Utc::now());
        let err = adapter.update(&record).await.unwrap_err();
        assert!(matches!(err, Error::MissingRemoteId(Service::Notion)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_databases_returns_titles() {
        let base = test_server::spawn(notion_router(Captured::default())).await;
        let settings = AdapterSettings {
            notion_api_url: format!("{base}/v1"),
            ..AdapterSettings::default()
        };
        let lists = list_databases("secret_token", &settings).await.unwrap();
        assert_eq!(
            lists,
            vec![
                AvailableList {
                    id: "db-1".to_string(),
                    title: "Tasks".to_string()
                },
                AvailableList {
                    id: "db-2".to_string(),
                    title: String::new()
                },
            ]
        );
    }
}
