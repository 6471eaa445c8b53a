use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tasksync_core::config::AdapterSettings;
use tasksync_core::db::{
    Database, IdentityRepository, LibSqlIdentityRepository, LibSqlRelationshipRepository,
    ListSelection, RelationshipRepository,
};
use tasksync_core::models::{GoogleCredentials, NotionCredentials};
use tasksync_core::sync::CycleReport;
use tasksync_core::{SyncPlan, TaskRecord, TenantId};

use crate::commands::common::{flag, format_timestamp, parse_tenant, resolve_db_path};
use crate::commands::mappings::{format_mapping_lines, list_mappings};
use crate::commands::relationships::{
    format_relationship_lines, list_relationships, relationship_to_item,
};
use crate::commands::sync_once::{format_plan_lines, format_report_line, sync_once};
use crate::error::CliError;

#[test]
fn explicit_db_path_wins() {
    let path = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(path.clone())), path);
}

#[test]
fn parse_tenant_trims_and_rejects_garbage() {
    let tenant = TenantId::new();
    assert_eq!(
        parse_tenant(&format!("  {tenant} ")).unwrap(),
        tenant
    );
    assert!(matches!(
        parse_tenant("not-a-uuid"),
        Err(CliError::InvalidTenant(_))
    ));
}

#[test]
fn format_timestamp_renders_utc() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    assert_eq!(flag(true, "ready"), "ready");
    assert_eq!(flag(false, "ready"), "-");
}

#[test]
fn plan_lines_group_writes_by_target() {
    let updated_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let plan = SyncPlan {
        create_in_google: vec![TaskRecord::new("Buy milk", false, updated_at)],
        update_in_notion: vec![TaskRecord::new("Call mom", true, updated_at)],
        ..SyncPlan::default()
    };

    assert_eq!(
        format_plan_lines(&plan),
        vec![
            "create in Google Tasks (1):".to_string(),
            "  [ ] Buy milk  (2024-05-01T12:00:00.000Z)".to_string(),
            "update in Notion (1):".to_string(),
            "  [x] Call mom  (2024-05-01T12:00:00.000Z)".to_string(),
        ]
    );
    assert_eq!(
        format_plan_lines(&SyncPlan::default()),
        vec!["Nothing to do: both sides agree.".to_string()]
    );
}

#[test]
fn report_line_marks_failed_fetches() {
    let report = CycleReport {
        notion_fetched: Some(3),
        google_fetched: None,
        created_in_google: 2,
        failures: 1,
        ..CycleReport::default()
    };
    let line = format_report_line(&report, false);
    assert!(line.contains("notion=3 google=failed"));
    assert!(line.contains("created 2 / updated 0 in Google Tasks"));
    assert!(line.contains("1 failures"));

    assert!(format_report_line(&report, true).starts_with("Dry run"));
}

#[tokio::test(flavor = "current_thread")]
async fn list_relationships_hides_credentials() {
    let db_path = unique_test_db_path();
    {
        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlRelationshipRepository::new(db.connection().clone());
        repo.connect_notion("user-1", notion_credentials())
            .await
            .unwrap();
        repo.get_or_create_for_user("user-2").await.unwrap();
    }

    let relationships = list_relationships(&db_path).await.unwrap();
    assert_eq!(relationships.len(), 2);

    let item = relationship_to_item(&relationships[0]);
    assert_eq!(item.user_id, "user-1");
    assert!(item.notion_connected);
    assert!(!item.google_tasks_connected);
    let json = serde_json::to_string(&item).unwrap();
    assert!(!json.contains("notion-secret"));

    let lines = format_relationship_lines(&relationships);
    assert!(lines[0].contains("notion=connected google=none"));
    assert!(lines[1].contains("user=user-2"));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn list_mappings_is_scoped_to_the_tenant() {
    let db_path = unique_test_db_path();
    let (tenant, other) = {
        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlRelationshipRepository::new(db.connection().clone());
        let identity = LibSqlIdentityRepository::new(db.connection().clone());
        let tenant = repo.get_or_create_for_user("user-1").await.unwrap().id;
        let other = repo.get_or_create_for_user("user-2").await.unwrap().id;
        identity.create("page-1", "task-1", &tenant).await.unwrap();
        identity.create("page-2", "task-2", &other).await.unwrap();
        (tenant, other)
    };

    let mappings = list_mappings(&tenant.to_string(), &db_path).await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].notion_id, "page-1");
    assert!(format_mapping_lines(&mappings)[0].contains("notion=page-1  google=task-1"));

    let other_mappings = list_mappings(&other.to_string(), &db_path).await.unwrap();
    assert_eq!(other_mappings[0].google_task_id, "task-2");

    let missing = list_mappings(&TenantId::new().to_string(), &db_path).await;
    assert!(matches!(missing, Err(CliError::TenantNotFound(_))));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn sync_once_refuses_unconfigured_relationship() {
    let db_path = unique_test_db_path();
    let tenant = {
        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlRelationshipRepository::new(db.connection().clone());
        repo.connect_notion("user-1", notion_credentials())
            .await
            .unwrap()
            .id
    };

    let result = sync_once(&tenant.to_string(), true, &unreachable_settings(), &db_path).await;
    assert!(matches!(
        result,
        Err(CliError::Core(tasksync_core::Error::NotConfigured(_)))
    ));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn dry_run_with_unreachable_vendors_plans_nothing() {
    let db_path = unique_test_db_path();
    let tenant = {
        let db = Database::open(&db_path).await.unwrap();
        ready_relationship(&db).await
    };

    let output = sync_once(&tenant.to_string(), true, &unreachable_settings(), &db_path)
        .await
        .unwrap();
    assert!(output.dry_run);
    assert_eq!(output.plan, Some(SyncPlan::default()));
    assert_eq!(output.report.notion_fetched, None);
    assert_eq!(output.report.google_fetched, None);

    let output = sync_once(&tenant.to_string(), false, &unreachable_settings(), &db_path)
        .await
        .unwrap();
    assert_eq!(output.plan, None);
    assert_eq!(output.report.writes(), 0);

    cleanup_db_files(&db_path);
}

fn notion_credentials() -> NotionCredentials {
    NotionCredentials {
        access_token: "notion-secret".to_string(),
        workspace_id: None,
        workspace_name: Some("Home".to_string()),
        bot_id: None,
    }
}

async fn ready_relationship(db: &Database) -> TenantId {
    let repo = LibSqlRelationshipRepository::new(db.connection().clone());
    repo.connect_notion("user-1", notion_credentials())
        .await
        .unwrap();
    let relationship = repo
        .connect_google_tasks(
            "user-1",
            GoogleCredentials {
                access_token: "google-secret".to_string(),
                refresh_token: None,
                token_uri: "http://127.0.0.1:9/token".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                expires_at: None,
            },
        )
        .await
        .unwrap();
    repo.configure(
        &relationship.id,
        &ListSelection {
            task_list_id: Some("list-1".to_string()),
            database_id: Some("db-1".to_string()),
            title_property: Some("Name".to_string()),
        },
    )
    .await
    .unwrap()
    .id
}

/// Vendor endpoints on a closed local port so every call fails fast
fn unreachable_settings() -> AdapterSettings {
    AdapterSettings {
        notion_api_url: "http://127.0.0.1:9/v1".to_string(),
        google_tasks_api_url: "http://127.0.0.1:9/tasks/v1".to_string(),
        http_timeout: Duration::from_secs(1),
        ..AdapterSettings::default()
    }
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tasksync-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
