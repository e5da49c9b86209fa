//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::connectivity::NetworkMonitor;
use crate::models::{ItemId, StoredItem};
use crate::remote::InMemoryRemote;
use crate::settings::SyncSettings;
use crate::store::{ItemStore, MemoryItemStore};
use crate::sync::{Collaborators, SyncEngine};
use crate::work::{
    EnqueueOutcome, JobInfo, JobScheduler, JobState, PeriodicWorkRequest, TokioWorkScheduler,
    WorkRequest,
};

/// Records requests without running anything. Unique work stays pending
/// until cancelled, so keep-existing requests after the first are kept.
#[derive(Default)]
pub struct RecordingScheduler {
    requests: Mutex<Vec<String>>,
    pending: Mutex<HashSet<String>>,
}

impl RecordingScheduler {
    /// Names of every unique work request, in order, including kept ones.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn active(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pending.lock().unwrap().iter().cloned().collect();
        names.sort();
        names
    }
}

impl JobScheduler for RecordingScheduler {
    fn enqueue_unique(&self, request: WorkRequest) -> EnqueueOutcome {
        self.requests.lock().unwrap().push(request.name.clone());
        if self.pending.lock().unwrap().insert(request.name) {
            EnqueueOutcome::Enqueued
        } else {
            EnqueueOutcome::Kept
        }
    }

    fn enqueue_periodic(&self, request: PeriodicWorkRequest) -> EnqueueOutcome {
        if self.pending.lock().unwrap().insert(request.name) {
            EnqueueOutcome::Enqueued
        } else {
            EnqueueOutcome::Replaced
        }
    }

    fn job_state(&self, name: &str) -> Option<JobInfo> {
        self.pending
            .lock()
            .unwrap()
            .contains(name)
            .then_some(JobInfo {
                state: JobState::Enqueued,
                attempts: 0,
            })
    }

    fn cancel(&self, name: &str) -> bool {
        self.pending.lock().unwrap().remove(name)
    }
}

pub struct TestContext {
    pub store: MemoryItemStore,
    pub remote: InMemoryRemote,
    pub monitor: Arc<NetworkMonitor>,
    pub engine: SyncEngine,
}

impl TestContext {
    pub fn build(connected: bool, jobs: Arc<dyn JobScheduler>) -> Self {
        Self::build_with_monitor(Arc::new(NetworkMonitor::new(connected)), jobs)
    }

    fn build_with_monitor(monitor: Arc<NetworkMonitor>, jobs: Arc<dyn JobScheduler>) -> Self {
        let store = MemoryItemStore::new();
        let remote = InMemoryRemote::new();
        let engine = SyncEngine::new(
            Collaborators {
                store: Arc::new(store.clone()),
                remote: Arc::new(remote.clone()),
                connectivity: monitor.clone(),
                jobs,
            },
            SyncSettings::default(),
        );
        Self {
            store,
            remote,
            monitor,
            engine,
        }
    }

    pub fn recording(connected: bool) -> (Self, Arc<RecordingScheduler>) {
        let jobs = Arc::new(RecordingScheduler::default());
        (Self::build(connected, jobs.clone()), jobs)
    }

    /// Must be called inside a runtime.
    pub fn with_tokio_scheduler(connected: bool) -> (Self, TokioWorkScheduler) {
        let monitor = Arc::new(NetworkMonitor::new(connected));
        let scheduler = TokioWorkScheduler::new(monitor.clone());
        let ctx = Self::build_with_monitor(monitor, Arc::new(scheduler.clone()));
        (ctx, scheduler)
    }

    pub async fn stored(&self, id: &ItemId) -> StoredItem {
        self.store
            .get(id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("item {} not stored", id))
    }
}
