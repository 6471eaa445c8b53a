//! Per-tenant sync loops

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use libsql::Connection;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::SyncCycle;
use crate::adapters::{build_services, TaskService};
use crate::config::AdapterSettings;
use crate::db::{
    LibSqlIdentityRepository, LibSqlRelationshipRepository, RelationshipRepository,
};
use crate::error::{Error, Result};
use crate::models::TenantId;

/// Identifies one run of a tenant's loop
pub type RunId = Uuid;

struct RunningSync {
    run_id: RunId,
    handle: JoinHandle<()>,
}

/// Starts, tracks, and stops the sync loop of every tenant.
///
/// Each tenant has at most one loop. The loop's task handle is kept here so a
/// stop request can cancel it directly.
#[derive(Clone)]
pub struct SyncScheduler {
    relationships: LibSqlRelationshipRepository,
    identity: LibSqlIdentityRepository,
    settings: Arc<AdapterSettings>,
    interval: Duration,
    running: Arc<Mutex<HashMap<TenantId, RunningSync>>>,
}

impl SyncScheduler {
    pub fn new(conn: Connection, settings: AdapterSettings, interval: Duration) -> Self {
        Self {
            relationships: LibSqlRelationshipRepository::new(conn.clone()),
            identity: LibSqlIdentityRepository::new(conn),
            settings: Arc::new(settings),
            interval,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start the tenant's loop, or return the id of the loop already running.
    ///
    /// Fails with `Error::NotReady` unless both services are connected and
    /// configured.
    pub async fn start(&self, tenant: &TenantId) -> Result<RunId> {
        let mut running = self.running.lock().await;
        if let Some(existing) = running.get(tenant) {
            if !existing.handle.is_finished() {
                return Ok(existing.run_id);
            }
        }

        let relationship = self
            .relationships
            .get(tenant)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sync relationship {tenant}")))?;
        if !relationship.ready {
            return Err(Error::NotReady);
        }

        let (notion, google) =
            build_services(&relationship, &self.settings, self.identity.clone())?;
        let cycle = SyncCycle::new(relationship.id, notion, google, self.identity.clone());

        let run_id = Uuid::new_v4();
        let handle = tokio::spawn(run_loop(
            cycle,
            self.relationships.clone(),
            self.interval,
            run_id,
        ));
        running.insert(*tenant, RunningSync { run_id, handle });
        drop(running);

        tracing::info!(tenant = %tenant, run_id = %run_id, "Started sync loop");
        Ok(run_id)
    }

    /// Cancel the tenant's loop and mark it inactive.
    ///
    /// Returns whether a loop was running. Stopping an idle tenant is a no-op.
    pub async fn stop(&self, tenant: &TenantId) -> Result<bool> {
        let entry = self.running.lock().await.remove(tenant);
        let stopped = match entry {
            Some(entry) => {
                cancel(entry).await;
                tracing::info!(tenant = %tenant, "Stopped sync loop");
                true
            }
            None => false,
        };
        self.relationships.set_active(tenant, false).await?;
        Ok(stopped)
    }

    /// Rebuild the tenant's loop if one is running, so it picks up new
    /// credentials or list selections.
    ///
    /// Returns the new run id, or `None` when no loop was running.
    pub async fn restart(&self, tenant: &TenantId) -> Result<Option<RunId>> {
        let entry = self.running.lock().await.remove(tenant);
        let Some(entry) = entry else {
            return Ok(None);
        };
        let previous = entry.run_id;
        cancel(entry).await;

        let run_id = match self.start(tenant).await {
            Ok(run_id) => run_id,
            Err(error) => {
                self.relationships.set_active(tenant, false).await?;
                return Err(error);
            }
        };
        tracing::info!(
            tenant = %tenant,
            previous_run_id = %previous,
            run_id = %run_id,
            "Restarted sync loop with current settings"
        );
        Ok(Some(run_id))
    }

    /// Start a loop for every ready relationship. Returns how many started.
    pub async fn restart_ready(&self) -> Result<usize> {
        let ready = self.relationships.list_ready().await?;
        let mut started = 0;
        for relationship in ready {
            match self.start(&relationship.id).await {
                Ok(_) => started += 1,
                Err(error) => {
                    tracing::warn!(tenant = %relationship.id, %error, "Could not restart sync loop");
                }
            }
        }
        tracing::info!(started, "Restarted sync loops for ready relationships");
        Ok(started)
    }

    pub async fn is_running(&self, tenant: &TenantId) -> bool {
        self.running
            .lock()
            .await
            .get(tenant)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    pub async fn running_count(&self) -> usize {
        self.running
            .lock()
            .await
            .values()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Stop every loop
    pub async fn shutdown(&self) {
        let entries: Vec<(TenantId, RunningSync)> = self.running.lock().await.drain().collect();
        for (tenant, entry) in entries {
            cancel(entry).await;
            if let Err(error) = self.relationships.set_active(&tenant, false).await {
                tracing::warn!(tenant = %tenant, %error, "Failed to mark relationship inactive");
            }
        }
    }
}

async fn cancel(entry: RunningSync) {
    entry.handle.abort();
    if let Err(error) = entry.handle.await {
        if !error.is_cancelled() {
            tracing::warn!(run_id = %entry.run_id, %error, "Sync loop ended abnormally");
        }
    }
}

async fn run_loop<N, G>(
    cycle: SyncCycle<N, G>,
    relationships: LibSqlRelationshipRepository,
    interval: Duration,
    run_id: RunId,
) where
    N: TaskService,
    G: TaskService,
{
    let tenant = *cycle.tenant();
    loop {
        let report = cycle.run_once().await;
        if report.failures > 0 {
            tracing::warn!(
                tenant = %tenant,
                run_id = %run_id,
                failures = report.failures,
                "Sync cycle finished with failures"
            );
        }
        if let Err(error) = relationships.set_active(&tenant, true).await {
            tracing::warn!(tenant = %tenant, %error, "Failed to mark relationship active");
        }
        tokio::time::sleep(interval).await;
    }
}
