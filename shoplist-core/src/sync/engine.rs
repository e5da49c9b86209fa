use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::retry::{PeriodicSyncWorker, RetryScheduler, SyncWorker};
use crate::connectivity::Connectivity;
use crate::error::{RemoteError, Result, ShoppingListError};
use crate::models::{Item, ItemId, ListQuery, RemoteItem, StoredItem};
use crate::remote::RemoteService;
use crate::resolver::resolve;
use crate::settings::SyncSettings;
use crate::store::{ItemStore, ItemStream};
use crate::work::{EnqueueOutcome, JobInfo, JobScheduler};

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ItemStore>,
    pub remote: Arc<dyn RemoteService>,
    pub connectivity: Arc<dyn Connectivity>,
    pub jobs: Arc<dyn JobScheduler>,
}

/// Counts from one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Items in the remote snapshot
    pub pulled: usize,
    /// Items written back locally after merging
    pub merged: usize,
    pub pushed: usize,
    pub push_failures: usize,
}

/// Offline-first sync orchestrator.
///
/// Every mutation commits locally first and succeeds once that commit does.
/// Remote propagation is best effort: when offline, or when the immediate
/// push fails, a single deferred sync job is scheduled instead.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn ItemStore>,
    remote: Arc<dyn RemoteService>,
    connectivity: Arc<dyn Connectivity>,
    retry: RetryScheduler,
    settings: SyncSettings,
    sync_lock: Mutex<()>,
}

enum Change<'a> {
    Add(&'a Item),
    Update(&'a Item),
    Delete(&'a ItemId),
}

impl SyncEngine {
    pub fn new(collaborators: Collaborators, settings: SyncSettings) -> Self {
        let Collaborators {
            store,
            remote,
            connectivity,
            jobs,
        } = collaborators;

        Self {
            inner: Arc::new(EngineInner {
                store,
                remote,
                connectivity,
                retry: RetryScheduler::new(jobs, settings.clone()),
                settings,
                sync_lock: Mutex::new(()),
            }),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connectivity.is_connected()
    }

    /// Live view of the local items. When connected this also starts a
    /// background sync; the stream never waits for it.
    pub fn list(&self, query: ListQuery) -> ItemStream {
        if self.is_connected() {
            self.spawn_opportunistic_sync();
        }
        self.inner.store.read_filtered(query)
    }

    pub async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        Ok(self.inner.store.get(id).await?.map(|stored| stored.item))
    }

    pub async fn add(&self, item: Item) -> Result<()> {
        self.inner
            .store
            .insert(&StoredItem::unsynced(item.clone()))
            .await?;
        tracing::debug!(id = %item.id, "Item added locally");

        self.propagate(Change::Add(&item)).await;
        Ok(())
    }

    /// Replaces a stored item. The caller sets `updated_at`.
    pub async fn update(&self, item: Item) -> Result<()> {
        let updated = self
            .inner
            .store
            .update(&StoredItem::unsynced(item.clone()))
            .await?;
        if !updated {
            return Err(ShoppingListError::NotFound(item.id));
        }
        tracing::debug!(id = %item.id, "Item updated locally");

        self.propagate(Change::Update(&item)).await;
        Ok(())
    }

    pub async fn delete(&self, id: &ItemId) -> Result<()> {
        if !self.inner.store.delete(id).await? {
            return Err(ShoppingListError::NotFound(id.clone()));
        }
        tracing::debug!(%id, "Item deleted locally");

        self.propagate(Change::Delete(id)).await;
        Ok(())
    }

    pub async fn mark_bought(&self, id: &ItemId, is_bought: bool) -> Result<()> {
        let current = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or_else(|| ShoppingListError::NotFound(id.clone()))?;

        let timestamp = current.item.next_update_time();
        let updated = self
            .inner
            .store
            .update_bought_status(id, is_bought, timestamp)
            .await?;
        if !updated {
            return Err(ShoppingListError::NotFound(id.clone()));
        }

        let item = current
            .item
            .with_bought(is_bought)
            .with_updated_at(timestamp);
        self.propagate(Change::Update(&item)).await;
        Ok(())
    }

    /// Pulls the remote snapshot, merges it with the local one, persists the
    /// result and pushes whatever is still unsynced.
    ///
    /// Fails fast with [`ShoppingListError::NotConnected`] when offline.
    /// Individual push failures are counted in the report and schedule a
    /// retry; they do not fail the sync.
    pub async fn sync_with_remote(&self) -> Result<SyncReport> {
        if !self.is_connected() {
            return Err(ShoppingListError::NotConnected);
        }
        let _guard = self.inner.sync_lock.lock().await;
        self.sync_locked().await
    }

    /// Registers the periodic background sync, replacing any existing one.
    pub fn schedule_periodic_sync(&self) -> EnqueueOutcome {
        let worker = Arc::new(PeriodicSyncWorker::new(self.clone()));
        self.inner.retry.schedule_periodic(worker)
    }

    /// State of the deferred retry job, if one was ever scheduled.
    pub fn retry_status(&self) -> Option<JobInfo> {
        self.inner.retry.status()
    }

    pub fn periodic_sync_status(&self) -> Option<JobInfo> {
        self.inner.retry.periodic_status()
    }

    /// Number of local items not yet confirmed by the remote.
    pub async fn pending_count(&self) -> Result<usize> {
        let items = self.inner.store.read_all().await?;
        Ok(items.iter().filter(|s| !s.synced_with_remote).count())
    }

    fn schedule_retry(&self) -> EnqueueOutcome {
        let worker = SyncWorker::new(self.clone(), self.inner.settings.max_attempts);
        self.inner.retry.schedule(Arc::new(worker))
    }

    fn spawn_opportunistic_sync(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, skipping opportunistic sync");
            return;
        };

        let engine = self.clone();
        handle.spawn(async move {
            let Ok(_guard) = engine.inner.sync_lock.try_lock() else {
                tracing::debug!("Sync already in progress, skipping opportunistic sync");
                return;
            };
            match engine.sync_locked().await {
                Ok(report) => tracing::debug!(?report, "Opportunistic sync completed"),
                Err(e) => tracing::warn!(error = %e, "Opportunistic sync failed"),
            }
        });
    }

    async fn sync_locked(&self) -> Result<SyncReport> {
        let remote_items = self.inner.remote.list().await?;
        let local_items = self.inner.store.read_all().await?;

        let merged = resolve(&local_items, &remote_items);
        self.inner.store.batch_upsert(&merged).await?;

        let on_remote: HashSet<&ItemId> = remote_items.iter().map(|r| &r.id).collect();
        let mut report = SyncReport {
            pulled: remote_items.len(),
            merged: merged.len(),
            ..SyncReport::default()
        };

        for stored in merged.iter().filter(|s| !s.synced_with_remote) {
            match self
                .push_item(&stored.item, on_remote.contains(stored.id()))
                .await
            {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    tracing::warn!(id = %stored.id(), error = %e, "Failed to push item");
                    report.push_failures += 1;
                }
            }
        }

        if report.push_failures > 0 {
            self.schedule_retry();
        }

        tracing::info!(
            pulled = report.pulled,
            merged = report.merged,
            pushed = report.pushed,
            push_failures = report.push_failures,
            "Sync completed"
        );
        Ok(report)
    }

    async fn propagate(&self, change: Change<'_>) {
        if !self.is_connected() {
            tracing::debug!("Offline, deferring push to background sync");
            self.schedule_retry();
            return;
        }

        let result = match change {
            Change::Add(item) => self.push_item(item, false).await,
            Change::Update(item) => self.push_item(item, true).await,
            Change::Delete(id) => self.push_delete(id).await,
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Immediate push failed, scheduling retry");
            self.schedule_retry();
        }
    }

    /// Pushes one item and marks it synced if it has not changed since.
    async fn push_item(&self, item: &Item, on_remote: bool) -> Result<()> {
        let remote = &self.inner.remote;
        let payload = RemoteItem::from(item);

        if on_remote {
            match remote.update(&item.id, &payload).await {
                Err(RemoteError::NotFound(_)) => {
                    tracing::debug!(id = %item.id, "Item missing on remote, adding it");
                    remote.add(&payload).await?;
                }
                other => {
                    other?;
                }
            }
        } else {
            remote.add(&payload).await?;
        }

        let marked = self
            .inner
            .store
            .mark_synced(&item.id, item.updated_at)
            .await?;
        if !marked {
            tracing::debug!(id = %item.id, "Item changed during push, leaving it unsynced");
        }
        Ok(())
    }

    async fn push_delete(&self, id: &ItemId) -> Result<()> {
        match self.inner.remote.delete(id).await {
            Ok(()) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
