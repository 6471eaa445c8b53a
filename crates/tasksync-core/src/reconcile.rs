//! Two-way reconciliation of Notion and Google Tasks snapshots.
//!
//! Both inputs must already be annotated with their counterpart ids from the
//! identity store. The reconciler is pure: it only classifies records into
//! work lists and never talks to a vendor or the database.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Service, TaskRecord};

/// Work produced by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Notion records that do not exist in Google Tasks yet
    pub create_in_google: Vec<TaskRecord>,
    /// Notion records whose content should overwrite their Google task
    pub update_in_google: Vec<TaskRecord>,
    /// Google tasks that do not exist in Notion yet
    pub create_in_notion: Vec<TaskRecord>,
    /// Google tasks whose content should overwrite their Notion page
    pub update_in_notion: Vec<TaskRecord>,
}

impl SyncPlan {
    /// Total number of writes the plan asks for
    pub fn len(&self) -> usize {
        self.create_in_google.len()
            + self.update_in_google.len()
            + self.create_in_notion.len()
            + self.update_in_notion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates targeted at `service`
    pub fn creates_for(&self, service: Service) -> &[TaskRecord] {
        match service {
            Service::Notion => &self.create_in_notion,
            Service::GoogleTasks => &self.create_in_google,
        }
    }

    /// Updates targeted at `service`
    pub fn updates_for(&self, service: Service) -> &[TaskRecord] {
        match service {
            Service::Notion => &self.update_in_notion,
            Service::GoogleTasks => &self.update_in_google,
        }
    }
}

/// Classify two annotated snapshots into create and update work.
///
/// A matched pair whose content differs is resolved by `updated_at`: the
/// Google side wins only when the Notion side is strictly older. Equal
/// timestamps push the Notion version to Google.
pub fn reconcile(notion: &[TaskRecord], google: &[TaskRecord]) -> SyncPlan {
    let mut plan = SyncPlan::default();

    plan.create_in_google = notion
        .iter()
        .filter(|record| record.is_new_for(Service::GoogleTasks))
        .cloned()
        .collect();
    plan.create_in_notion = google
        .iter()
        .filter(|record| record.is_new_for(Service::Notion))
        .cloned()
        .collect();

    let by_notion_id: HashMap<&str, &TaskRecord> = notion
        .iter()
        .filter_map(|record| record.notion_id.as_deref().map(|id| (id, record)))
        .collect();

    for google_record in google {
        let Some(notion_id) = google_record.notion_id.as_deref() else {
            continue;
        };
        // Mapped, but the page is gone from this snapshot (deleted or a failed fetch).
        let Some(notion_record) = by_notion_id.get(notion_id) else {
            continue;
        };
        if notion_record.content_eq(google_record) {
            continue;
        }

        if notion_record.updated_at < google_record.updated_at {
            plan.update_in_notion.push(google_record.clone());
        } else {
            let mut outgoing = (*notion_record).clone();
            if outgoing.google_task_id.is_none() {
                outgoing.google_task_id.clone_from(&google_record.google_task_id);
            }
            plan.update_in_google.push(outgoing);
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn notion(id: &str, name: &str, completed: bool, updated: &str) -> TaskRecord {
        TaskRecord::new(name, completed, parse_timestamp(updated).unwrap())
            .with_id(Service::Notion, id)
    }

    fn google(id: &str, name: &str, completed: bool, updated: &str) -> TaskRecord {
        TaskRecord::new(name, completed, parse_timestamp(updated).unwrap())
            .with_id(Service::GoogleTasks, id)
    }

    fn linked(mut record: TaskRecord, service: Service, id: &str) -> TaskRecord {
        record.set_id(service, id);
        record
    }

    #[test]
    fn new_notion_record_is_created_in_google() {
        let a1 = notion("a1", "Buy milk", false, "2024-01-01T00:00:00");
        let plan = reconcile(std::slice::from_ref(&a1), &[]);
        assert_eq!(
            plan,
            SyncPlan {
                create_in_google: vec![a1],
                ..SyncPlan::default()
            }
        );
    }

    #[test]
    fn unrelated_records_are_created_on_the_other_side() {
        let notion_records = vec![
            notion("a1", "One", false, "2024-01-01"),
            notion("a2", "Two", true, "2024-01-02"),
        ];
        let google_records = vec![google("b1", "Three", false, "2024-01-03")];

        let plan = reconcile(&notion_records, &google_records);
        assert_eq!(plan.create_in_google, notion_records);
        assert_eq!(plan.create_in_notion, google_records);
        assert!(plan.update_in_google.is_empty());
        assert!(plan.update_in_notion.is_empty());
    }

    #[test]
    fn newer_notion_record_updates_google() {
        let a = linked(
            notion("a1", "X", true, "2024-02-01"),
            Service::GoogleTasks,
            "b1",
        );
        let b = linked(
            google("b1", "X", false, "2024-01-01"),
            Service::Notion,
            "a1",
        );

        let plan = reconcile(std::slice::from_ref(&a), &[b]);
        assert_eq!(plan.update_in_google, vec![a]);
        assert!(plan.update_in_notion.is_empty());
        assert!(plan.create_in_google.is_empty());
        assert!(plan.create_in_notion.is_empty());
    }

    #[test]
    fn newer_google_record_updates_notion() {
        let a = linked(
            notion("a1", "X", false, "2024-01-01"),
            Service::GoogleTasks,
            "b1",
        );
        let b = linked(
            google("b1", "X", true, "2024-02-01"),
            Service::Notion,
            "a1",
        );

        let plan = reconcile(&[a], std::slice::from_ref(&b));
        assert_eq!(plan.update_in_notion, vec![b]);
        assert!(plan.update_in_google.is_empty());
    }

    #[test]
    fn equal_timestamps_push_notion_to_google() {
        let a = linked(
            notion("a1", "Notion title", false, "2024-01-01T12:00:00Z"),
            Service::GoogleTasks,
            "b1",
        );
        let b = linked(
            google("b1", "Google title", false, "2024-01-01T12:00:00Z"),
            Service::Notion,
            "a1",
        );

        let plan = reconcile(std::slice::from_ref(&a), &[b]);
        assert_eq!(plan.update_in_google, vec![a]);
        assert!(plan.update_in_notion.is_empty());
    }

    #[test]
    fn identical_content_produces_no_work_regardless_of_skew() {
        let a = linked(
            notion("a1", "Same", true, "2020-01-01"),
            Service::GoogleTasks,
            "b1",
        );
        let b = linked(
            google("b1", "Same", true, "2024-06-01"),
            Service::Notion,
            "a1",
        );

        let plan = reconcile(&[a], &[b]);
        assert!(plan.is_empty());
    }

    #[test]
    fn mapped_google_record_without_notion_page_is_skipped() {
        let b = linked(
            google("b1", "Orphan", false, "2024-01-01"),
            Service::Notion,
            "gone",
        );
        let plan = reconcile(&[], &[b]);
        assert!(plan.is_empty());
    }

    #[test]
    fn update_carries_the_google_id_from_the_pair() {
        let a = notion("a1", "X", true, "2024-02-01");
        let b = linked(
            google("b1", "X", false, "2024-01-01"),
            Service::Notion,
            "a1",
        );

        // The Notion side was not annotated, so it is also queued as new.
        let plan = reconcile(&[a], &[b]);
        assert_eq!(plan.update_in_google.len(), 1);
        assert_eq!(
            plan.update_in_google[0].id_for(Service::GoogleTasks),
            Some("b1")
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let notion_records = vec![
            linked(notion("a1", "X", true, "2024-02-01"), Service::GoogleTasks, "b1"),
            notion("a2", "New", false, "2024-02-01"),
        ];
        let google_records = vec![
            linked(google("b1", "X", false, "2024-01-01"), Service::Notion, "a1"),
            google("b2", "Fresh", false, "2024-01-01"),
        ];

        let first = reconcile(&notion_records, &google_records);
        let second = reconcile(&notion_records, &google_records);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.creates_for(Service::GoogleTasks).len(), 1);
        assert_eq!(first.creates_for(Service::Notion).len(), 1);
        assert_eq!(first.updates_for(Service::GoogleTasks).len(), 1);
    }
}
