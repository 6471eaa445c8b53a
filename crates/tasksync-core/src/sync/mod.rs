//! Sync cycle and per-tenant scheduling.
//!
//! A cycle fetches both sides, annotates records with their counterpart ids,
//! reconciles, and dispatches the resulting writes. Failures on one side never
//! stop the other side's work; they are logged, counted, and retried on the
//! next cycle.

mod scheduler;

use futures::future::join_all;
use serde::Serialize;

use crate::adapters::TaskService;
use crate::db::{IdentityRepository, LibSqlIdentityRepository};
use crate::error::Result;
use crate::models::{Service, TaskRecord, TenantId};
use crate::reconcile::{reconcile, SyncPlan};

pub use scheduler::{RunId, SyncScheduler};

/// Outcome of one cycle (or of a dry-run plan)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Records fetched from Notion, `None` when the fetch failed
    pub notion_fetched: Option<usize>,
    /// Records fetched from Google Tasks, `None` when the fetch failed
    pub google_fetched: Option<usize>,
    /// Records left out because their mapping lookup failed
    pub unresolved: usize,
    pub created_in_notion: usize,
    pub updated_in_notion: usize,
    pub created_in_google: usize,
    pub updated_in_google: usize,
    /// Adapter writes that failed
    pub failures: usize,
}

impl CycleReport {
    /// Number of successful writes
    pub const fn writes(&self) -> usize {
        self.created_in_notion + self.updated_in_notion + self.created_in_google + self.updated_in_google
    }
}

/// One tenant's fetch-reconcile-write pass over a pair of adapters
pub struct SyncCycle<N, G> {
    tenant: TenantId,
    notion: N,
    google: G,
    identity: LibSqlIdentityRepository,
}

#[derive(Debug, Default)]
struct SideOutcome {
    created: usize,
    updated: usize,
    failures: usize,
}

impl<N, G> SyncCycle<N, G>
where
    N: TaskService,
    G: TaskService,
{
    pub const fn new(
        tenant: TenantId,
        notion: N,
        google: G,
        identity: LibSqlIdentityRepository,
    ) -> Self {
        Self {
            tenant,
            notion,
            google,
            identity,
        }
    }

    pub const fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Fetch, annotate, and reconcile without writing anything
    pub async fn plan(&self) -> (SyncPlan, CycleReport) {
        let (notion_result, google_result) =
            tokio::join!(self.notion.fetch_all(), self.google.fetch_all());

        let mut report = CycleReport::default();
        let notion_records = self.snapshot(Service::Notion, notion_result, &mut report.notion_fetched);
        let google_records = self.snapshot(Service::GoogleTasks, google_result, &mut report.google_fetched);

        let (notion_records, notion_unresolved) = self.annotate(Service::Notion, notion_records).await;
        let (google_records, google_unresolved) =
            self.annotate(Service::GoogleTasks, google_records).await;
        report.unresolved = notion_unresolved + google_unresolved;

        (reconcile(&notion_records, &google_records), report)
    }

    /// Run one full cycle. Never fails as a whole.
    pub async fn run_once(&self) -> CycleReport {
        let (plan, mut report) = self.plan().await;

        let (notion_outcome, google_outcome) = tokio::join!(
            self.apply(&self.notion, &plan.create_in_notion, &plan.update_in_notion),
            self.apply(&self.google, &plan.create_in_google, &plan.update_in_google),
        );

        report.created_in_notion = notion_outcome.created;
        report.updated_in_notion = notion_outcome.updated;
        report.created_in_google = google_outcome.created;
        report.updated_in_google = google_outcome.updated;
        report.failures = notion_outcome.failures + google_outcome.failures;

        tracing::debug!(
            tenant = %self.tenant,
            notion_fetched = ?report.notion_fetched,
            google_fetched = ?report.google_fetched,
            writes = report.writes(),
            failures = report.failures,
            "Sync cycle finished"
        );
        report
    }

    fn snapshot(
        &self,
        service: Service,
        fetched: Result<Vec<TaskRecord>>,
        count: &mut Option<usize>,
    ) -> Vec<TaskRecord> {
        match fetched {
            Ok(records) => {
                *count = Some(records.len());
                records
            }
            Err(error) => {
                tracing::warn!(
                    tenant = %self.tenant,
                    service = %service,
                    transient = error.is_transient(),
                    %error,
                    "Fetch failed, treating snapshot as empty"
                );
                Vec::new()
            }
        }
    }

    /// Attach counterpart ids from the identity store.
    ///
    /// Records whose lookup fails are dropped so they are not mistaken for
    /// new ones.
    async fn annotate(&self, origin: Service, records: Vec<TaskRecord>) -> (Vec<TaskRecord>, usize) {
        let counterpart = origin.counterpart();
        let mut annotated = Vec::with_capacity(records.len());
        let mut unresolved = 0;

        for mut record in records {
            let Some(own_id) = record.id_for(origin).map(str::to_string) else {
                annotated.push(record);
                continue;
            };
            match self.identity.get_by_id(&self.tenant, origin, &own_id).await {
                Ok(Some(mapping)) => {
                    record.set_id(counterpart, mapping.id_for(counterpart));
                    annotated.push(record);
                }
                Ok(None) => annotated.push(record),
                Err(error) => {
                    unresolved += 1;
                    tracing::warn!(
                        tenant = %self.tenant,
                        service = %origin,
                        id = %own_id,
                        %error,
                        "Identity lookup failed, skipping record this cycle"
                    );
                }
            }
        }

        (annotated, unresolved)
    }

    async fn apply<S: TaskService>(
        &self,
        target: &S,
        creates: &[TaskRecord],
        updates: &[TaskRecord],
    ) -> SideOutcome {
        let (created, updated) = tokio::join!(
            join_all(creates.iter().map(|record| target.create(record))),
            join_all(updates.iter().map(|record| target.update(record))),
        );

        let mut outcome = SideOutcome::default();
        for result in created {
            match result {
                Ok(_) => outcome.created += 1,
                Err(error) => {
                    outcome.failures += 1;
                    tracing::warn!(tenant = %self.tenant, service = %target.service(), %error, "Create failed");
                }
            }
        }
        for result in updated {
            match result {
                Ok(()) => outcome.updated += 1,
                Err(error) => {
                    outcome.failures += 1;
                    tracing::warn!(tenant = %self.tenant, service = %target.service(), %error, "Update failed");
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::adapters::{MappingRecorder, TaskService};
    use crate::error::{Error, Result};
    use crate::models::{Service, TaskRecord};

    /// In-memory `TaskService` that behaves like a vendor list
    pub struct FakeService {
        service: Service,
        records: Mutex<Vec<TaskRecord>>,
        recorder: MappingRecorder,
        next_id: AtomicUsize,
        pub fail_fetch: bool,
        pub fail_writes: bool,
        pub creates: Mutex<Vec<TaskRecord>>,
        pub updates: Mutex<Vec<TaskRecord>>,
    }

    impl FakeService {
        pub fn new(service: Service, records: Vec<TaskRecord>, recorder: MappingRecorder) -> Self {
            Self {
                service,
                records: Mutex::new(records),
                recorder,
                next_id: AtomicUsize::new(1),
                fail_fetch: false,
                fail_writes: false,
                creates: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
            }
        }

        fn unavailable(&self) -> Error {
            Error::Api {
                service: self.service,
                status: 503,
                message: "unavailable".to_string(),
            }
        }

        pub fn stored(&self) -> Vec<TaskRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskService for FakeService {
        fn service(&self) -> Service {
            self.service
        }

        async fn fetch_all(&self) -> Result<Vec<TaskRecord>> {
            if self.fail_fetch {
                return Err(self.unavailable());
            }
            Ok(self.stored())
        }

        async fn fetch_one(&self, id: &str) -> Result<TaskRecord> {
            self.stored()
                .into_iter()
                .find(|record| record.id_for(self.service) == Some(id))
                .ok_or_else(|| Error::NotFound(id.to_string()))
        }

        async fn create(&self, record: &TaskRecord) -> Result<TaskRecord> {
            if self.fail_writes {
                return Err(self.unavailable());
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = format!("{}-new-{n}", self.service);

            let mut created = record.clone();
            created.set_id(self.service, &id);
            self.recorder.record(&created).await?;

            // The vendor only knows its own id.
            let stored = TaskRecord::new(record.name.clone(), record.completed, record.updated_at)
                .with_id(self.service, id);
            self.records.lock().unwrap().push(stored);
            self.creates.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update(&self, record: &TaskRecord) -> Result<()> {
            if self.fail_writes {
                return Err(self.unavailable());
            }
            let id = record
                .id_for(self.service)
                .ok_or(Error::MissingRemoteId(self.service))?
                .to_string();
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records
                .iter_mut()
                .find(|existing| existing.id_for(self.service) == Some(id.as_str()))
            {
                existing.name.clone_from(&record.name);
                existing.completed = record.completed;
            }
            drop(records);
            self.updates.lock().unwrap().push(record.clone());
            Ok(())
        }
    }
}
