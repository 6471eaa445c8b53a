use std::path::Path;

use serde::Serialize;
use tasksync_core::adapters::build_services;
use tasksync_core::config::AdapterSettings;
use tasksync_core::db::LibSqlIdentityRepository;
use tasksync_core::models::format_timestamp as format_record_time;
use tasksync_core::sync::{CycleReport, SyncCycle};
use tasksync_core::{SyncPlan, TaskRecord};

use crate::commands::common::{open_database, parse_tenant, require_relationship};
use crate::error::CliError;

/// What a `sync-once` invocation produced
#[derive(Debug, Serialize)]
pub struct SyncOnceOutput {
    pub tenant: String,
    pub dry_run: bool,
    /// Present only for dry runs
    pub plan: Option<SyncPlan>,
    pub report: CycleReport,
}

pub async fn run_sync_once(
    tenant: &str,
    dry_run: bool,
    as_json: bool,
    settings: &AdapterSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let output = sync_once(tenant, dry_run, settings, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(plan) = output.plan.as_ref() {
        for line in format_plan_lines(plan) {
            println!("{line}");
        }
    }
    println!("{}", format_report_line(&output.report, output.dry_run));
    Ok(())
}

pub async fn sync_once(
    tenant: &str,
    dry_run: bool,
    settings: &AdapterSettings,
    db_path: &Path,
) -> Result<SyncOnceOutput, CliError> {
    let tenant = parse_tenant(tenant)?;
    let db = open_database(db_path).await?;
    let relationship = require_relationship(&db, &tenant).await?;

    let identity = LibSqlIdentityRepository::new(db.connection().clone());
    let (notion, google) = build_services(&relationship, settings, identity.clone())?;
    let cycle = SyncCycle::new(tenant, notion, google, identity);

    if dry_run {
        let (plan, report) = cycle.plan().await;
        return Ok(SyncOnceOutput {
            tenant: tenant.to_string(),
            dry_run,
            plan: Some(plan),
            report,
        });
    }

    let report = cycle.run_once().await;
    tracing::info!(
        tenant = %tenant,
        writes = report.writes(),
        failures = report.failures,
        "Ran one sync cycle"
    );
    Ok(SyncOnceOutput {
        tenant: tenant.to_string(),
        dry_run,
        plan: None,
        report,
    })
}

pub fn format_plan_lines(plan: &SyncPlan) -> Vec<String> {
    if plan.is_empty() {
        return vec!["Nothing to do: both sides agree.".to_string()];
    }

    let sections: [(&str, &[TaskRecord]); 4] = [
        ("create in Google Tasks", &plan.create_in_google),
        ("update in Google Tasks", &plan.update_in_google),
        ("create in Notion", &plan.create_in_notion),
        ("update in Notion", &plan.update_in_notion),
    ];

    let mut lines = Vec::new();
    for (label, records) in sections {
        if records.is_empty() {
            continue;
        }
        lines.push(format!("{label} ({}):", records.len()));
        lines.extend(records.iter().map(format_record_line));
    }
    lines
}

fn format_record_line(record: &TaskRecord) -> String {
    format!(
        "  [{}] {}  ({})",
        if record.completed { "x" } else { " " },
        record.name,
        format_record_time(&record.updated_at)
    )
}

pub fn format_report_line(report: &CycleReport, dry_run: bool) -> String {
    let fetched = |count: Option<usize>| count.map_or_else(|| "failed".to_string(), |n| n.to_string());
    if dry_run {
        return format!(
            "Dry run: fetched notion={} google={}, {} unresolved; nothing written",
            fetched(report.notion_fetched),
            fetched(report.google_fetched),
            report.unresolved
        );
    }
    format!(
        "Fetched notion={} google={}; created {} / updated {} in Notion, created {} / updated {} in Google Tasks; {} failures",
        fetched(report.notion_fetched),
        fetched(report.google_fetched),
        report.created_in_notion,
        report.updated_in_notion,
        report.created_in_google,
        report.updated_in_google,
        report.failures
    )
}
