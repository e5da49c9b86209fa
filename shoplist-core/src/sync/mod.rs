//! Synchronization between the local store and the remote service.
//!
//! [`SyncEngine`] performs local-first mutations with an opportunistic push,
//! and full pull-merge-push cycles. [`RetryScheduler`] turns failed pushes
//! into a single deferred sync job with bounded exponential backoff.

mod engine;
mod retry;

pub use engine::{Collaborators, SyncEngine, SyncReport};
pub use retry::{
    PeriodicSyncWorker, RetryScheduler, SyncWorker, PERIODIC_SYNC_WORK_NAME, SYNC_WORK_NAME,
};
