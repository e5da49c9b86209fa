use std::sync::Arc;

use async_trait::async_trait;

use super::SyncEngine;
use crate::settings::SyncSettings;
use crate::work::{
    Backoff, EnqueueOutcome, ExistingWorkPolicy, JobInfo, JobScheduler, PeriodicWorkRequest,
    WorkContext, WorkOutcome, WorkRequest, Worker,
};

/// Unique name of the deferred retry job.
pub const SYNC_WORK_NAME: &str = "shopping_list_sync_work";

/// Unique name of the periodic background sync.
pub const PERIODIC_SYNC_WORK_NAME: &str = "periodic_shopping_list_sync";

/// Schedules the deferred sync job. Idempotent: while a retry job is pending
/// or running, further requests are dropped.
#[derive(Clone)]
pub struct RetryScheduler {
    jobs: Arc<dyn JobScheduler>,
    settings: SyncSettings,
}

impl RetryScheduler {
    pub fn new(jobs: Arc<dyn JobScheduler>, settings: SyncSettings) -> Self {
        Self { jobs, settings }
    }

    pub fn schedule(&self, worker: Arc<dyn Worker>) -> EnqueueOutcome {
        let request = WorkRequest::new(SYNC_WORK_NAME, worker)
            .with_policy(ExistingWorkPolicy::Keep)
            .with_backoff(Backoff::exponential(
                self.settings.retry_backoff(),
                self.settings.max_backoff(),
            ))
            .requires_network();

        let outcome = self.jobs.enqueue_unique(request);
        tracing::debug!(?outcome, "Sync retry requested");
        outcome
    }

    pub fn schedule_periodic(&self, worker: Arc<dyn Worker>) -> EnqueueOutcome {
        let request = PeriodicWorkRequest::new(
            PERIODIC_SYNC_WORK_NAME,
            self.settings.periodic_interval(),
            worker,
        )
        .with_initial_delay(self.settings.periodic_initial_delay())
        .requires_network();

        self.jobs.enqueue_periodic(request)
    }

    /// State of the retry job, if one was ever scheduled.
    pub fn status(&self) -> Option<JobInfo> {
        self.jobs.job_state(SYNC_WORK_NAME)
    }

    pub fn periodic_status(&self) -> Option<JobInfo> {
        self.jobs.job_state(PERIODIC_SYNC_WORK_NAME)
    }
}

/// One full sync per attempt, retried up to `max_attempts` times.
pub struct SyncWorker {
    engine: SyncEngine,
    max_attempts: u32,
}

impl SyncWorker {
    pub fn new(engine: SyncEngine, max_attempts: u32) -> Self {
        Self {
            engine,
            max_attempts,
        }
    }

    fn retry_or_give_up(&self, attempt: u32) -> WorkOutcome {
        if attempt < self.max_attempts {
            WorkOutcome::Retry
        } else {
            tracing::warn!(attempt, "Sync retries exhausted");
            WorkOutcome::Failure
        }
    }
}

#[async_trait]
impl Worker for SyncWorker {
    async fn do_work(&self, ctx: WorkContext) -> WorkOutcome {
        match self.engine.sync_with_remote().await {
            Ok(report) if report.push_failures == 0 => WorkOutcome::Success,
            Ok(report) => {
                tracing::warn!(
                    attempt = ctx.attempt,
                    push_failures = report.push_failures,
                    "Sync attempt left items unpushed"
                );
                self.retry_or_give_up(ctx.attempt)
            }
            Err(e) => {
                tracing::warn!(attempt = ctx.attempt, error = %e, "Sync attempt failed");
                self.retry_or_give_up(ctx.attempt)
            }
        }
    }
}

/// Runs a sync on every period. Failures are logged and otherwise ignored.
pub struct PeriodicSyncWorker {
    engine: SyncEngine,
}

impl PeriodicSyncWorker {
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Worker for PeriodicSyncWorker {
    async fn do_work(&self, ctx: WorkContext) -> WorkOutcome {
        match self.engine.sync_with_remote().await {
            Ok(report) => {
                tracing::info!(run = ctx.attempt, ?report, "Periodic sync completed");
                WorkOutcome::Success
            }
            Err(e) => {
                tracing::warn!(run = ctx.attempt, error = %e, "Periodic sync failed");
                WorkOutcome::Failure
            }
        }
    }
}
