//! In-process job scheduler on tokio.
//!
//! Jobs live as long as the process. Constraints are checked before every
//! attempt; a network-constrained job parks on
//! [`Connectivity::wait_until_connected`] rather than polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::{
    EnqueueOutcome, ExistingWorkPolicy, JobInfo, JobScheduler, JobState, PeriodicWorkRequest,
    WorkContext, WorkOutcome, WorkRequest,
};
use crate::connectivity::Connectivity;

#[derive(Clone)]
pub struct TokioWorkScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    handle: Handle,
    connectivity: Arc<dyn Connectivity>,
    jobs: Mutex<HashMap<String, JobRecord>>,
    next_id: AtomicU64,
}

struct JobRecord {
    id: u64,
    state: JobState,
    attempts: u32,
    task: AbortHandle,
}

impl TokioWorkScheduler {
    /// Creates a scheduler that spawns its jobs on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(connectivity: Arc<dyn Connectivity>) -> Self {
        let handle = Handle::current();
        Self {
            inner: Arc::new(Inner {
                handle,
                connectivity,
                jobs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Names of jobs that have not finished yet.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock_jobs()
            .iter()
            .filter(|(_, job)| !job.state.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Aborts every job.
    pub fn shutdown(&self) {
        let mut jobs = self.inner.lock_jobs();
        for (name, job) in jobs.iter_mut() {
            if !job.state.is_finished() {
                job.task.abort();
                job.state = JobState::Cancelled;
                tracing::debug!(job = %name, "Job cancelled on shutdown");
            }
        }
    }
}

impl Inner {
    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `f` to the job only if it is still the instance `id`, so a
    /// replaced job's task cannot overwrite its successor's state.
    fn update(&self, name: &str, id: u64, f: impl FnOnce(&mut JobRecord)) {
        if let Some(job) = self.lock_jobs().get_mut(name) {
            if job.id == id {
                f(job);
            }
        }
    }

    async fn wait_for_constraints(&self, requires_network: bool) {
        if requires_network {
            self.connectivity.wait_until_connected().await;
        }
    }
}

impl JobScheduler for TokioWorkScheduler {
    fn enqueue_unique(&self, request: WorkRequest) -> EnqueueOutcome {
        let inner = Arc::clone(&self.inner);
        let mut jobs = self.inner.lock_jobs();

        let mut outcome = EnqueueOutcome::Enqueued;
        if let Some(existing) = jobs.get(&request.name) {
            if !existing.state.is_finished() {
                match request.policy {
                    ExistingWorkPolicy::Keep => {
                        tracing::debug!(job = %request.name, "Unique work already pending, keeping it");
                        return EnqueueOutcome::Kept;
                    }
                    ExistingWorkPolicy::Replace => {
                        existing.task.abort();
                        outcome = EnqueueOutcome::Replaced;
                    }
                }
            }
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let WorkRequest {
            name,
            constraints,
            backoff,
            worker,
            ..
        } = request;
        let job_name = name.clone();

        let task = self.inner.handle.spawn(async move {
            let mut attempt = 1;
            loop {
                inner.wait_for_constraints(constraints.requires_network).await;
                inner.update(&name, id, |job| {
                    job.state = JobState::Running;
                    job.attempts = attempt;
                });
                tracing::debug!(job = %name, attempt, "Running job");

                let ctx = WorkContext {
                    name: name.clone(),
                    attempt,
                };
                match worker.do_work(ctx).await {
                    WorkOutcome::Success => {
                        inner.update(&name, id, |job| job.state = JobState::Succeeded);
                        tracing::debug!(job = %name, attempt, "Job succeeded");
                        return;
                    }
                    WorkOutcome::Failure => {
                        inner.update(&name, id, |job| job.state = JobState::Failed);
                        tracing::warn!(job = %name, attempt, "Job failed, giving up");
                        return;
                    }
                    WorkOutcome::Retry => {
                        let delay = backoff.delay_for(attempt);
                        inner.update(&name, id, |job| job.state = JobState::Enqueued);
                        tracing::info!(
                            job = %name,
                            attempt,
                            delay_secs = delay.as_secs(),
                            "Job will be retried"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        });

        jobs.insert(
            job_name.clone(),
            JobRecord {
                id,
                state: JobState::Enqueued,
                attempts: 0,
                task: task.abort_handle(),
            },
        );
        tracing::debug!(job = %job_name, ?outcome, "Unique work enqueued");
        outcome
    }

    fn enqueue_periodic(&self, request: PeriodicWorkRequest) -> EnqueueOutcome {
        let inner = Arc::clone(&self.inner);
        let mut jobs = self.inner.lock_jobs();

        let outcome = match jobs.get(&request.name) {
            Some(existing) if !existing.state.is_finished() => {
                existing.task.abort();
                EnqueueOutcome::Replaced
            }
            _ => EnqueueOutcome::Enqueued,
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let PeriodicWorkRequest {
            name,
            interval,
            initial_delay,
            constraints,
            worker,
        } = request;
        let job_name = name.clone();

        let task = self.inner.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut run = 1;
            loop {
                inner.wait_for_constraints(constraints.requires_network).await;
                inner.update(&name, id, |job| {
                    job.state = JobState::Running;
                    job.attempts = run;
                });

                let ctx = WorkContext {
                    name: name.clone(),
                    attempt: run,
                };
                let result = worker.do_work(ctx).await;
                tracing::debug!(job = %name, run, ?result, "Periodic job ran");

                inner.update(&name, id, |job| job.state = JobState::Enqueued);
                tokio::time::sleep(interval).await;
                run += 1;
            }
        });

        jobs.insert(
            job_name.clone(),
            JobRecord {
                id,
                state: JobState::Enqueued,
                attempts: 0,
                task: task.abort_handle(),
            },
        );
        tracing::info!(
            job = %job_name,
            interval_secs = interval.as_secs(),
            "Periodic work scheduled"
        );
        outcome
    }

    fn job_state(&self, name: &str) -> Option<JobInfo> {
        self.inner.lock_jobs().get(name).map(|job| JobInfo {
            state: job.state,
            attempts: job.attempts,
        })
    }

    fn cancel(&self, name: &str) -> bool {
        match self.inner.lock_jobs().get_mut(name) {
            Some(job) if !job.state.is_finished() => {
                job.task.abort();
                job.state = JobState::Cancelled;
                tracing::debug!(job = %name, "Job cancelled");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::NetworkMonitor;
    use crate::work::{Backoff, Worker};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Retries until `succeed_on`, recording when each attempt started.
    struct FlakyWorker {
        succeed_on: u32,
        runs: AtomicU32,
        started: Mutex<Vec<Instant>>,
    }

    impl FlakyWorker {
        fn new(succeed_on: u32) -> Arc<Self> {
            Arc::new(Self {
                succeed_on,
                runs: AtomicU32::new(0),
                started: Mutex::new(Vec::new()),
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Worker for FlakyWorker {
        async fn do_work(&self, ctx: WorkContext) -> WorkOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.lock().unwrap().push(Instant::now());
            if ctx.attempt >= self.succeed_on {
                WorkOutcome::Success
            } else {
                WorkOutcome::Retry
            }
        }
    }

    struct PendingWorker;

    #[async_trait]
    impl Worker for PendingWorker {
        async fn do_work(&self, _ctx: WorkContext) -> WorkOutcome {
            std::future::pending().await
        }
    }

    struct TestContext {
        monitor: Arc<NetworkMonitor>,
        scheduler: TokioWorkScheduler,
    }

    impl TestContext {
        fn new(connected: bool) -> Self {
            let monitor = Arc::new(NetworkMonitor::new(connected));
            let scheduler = TokioWorkScheduler::new(monitor.clone());
            Self { monitor, scheduler }
        }

        async fn wait_finished(&self, name: &str) -> JobInfo {
            for _ in 0..100_000 {
                if let Some(info) = self.scheduler.job_state(name) {
                    if info.state.is_finished() {
                        return info;
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            panic!("job {} never finished", name);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_to_success() {
        let ctx = TestContext::new(true);
        let worker = FlakyWorker::new(1);

        let outcome = ctx
            .scheduler
            .enqueue_unique(WorkRequest::new("job", worker.clone()));
        assert_eq!(outcome, EnqueueOutcome::Enqueued);

        let info = ctx.wait_finished("job").await;
        assert_eq!(info.state, JobState::Succeeded);
        assert_eq!(info.attempts, 1);
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_follow_backoff() {
        let ctx = TestContext::new(true);
        let worker = FlakyWorker::new(3);
        let request = WorkRequest::new("job", worker.clone()).with_backoff(Backoff::exponential(
            Duration::from_secs(30),
            Duration::from_secs(3600),
        ));

        ctx.scheduler.enqueue_unique(request);
        let info = ctx.wait_finished("job").await;

        assert_eq!(info.state, JobState::Succeeded);
        assert_eq!(info.attempts, 3);

        let started = worker.started.lock().unwrap().clone();
        assert_eq!(started.len(), 3);
        let first_gap = started[1] - started[0];
        let second_gap = started[2] - started[1];
        assert!(first_gap >= Duration::from_secs(30) && first_gap < Duration::from_secs(31));
        assert!(second_gap >= Duration::from_secs(60) && second_gap < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_policy_is_idempotent() {
        let ctx = TestContext::new(false);
        let worker = FlakyWorker::new(1);

        let outcomes: Vec<_> = (0..10)
            .map(|_| {
                ctx.scheduler.enqueue_unique(
                    WorkRequest::new("job", worker.clone()).with_policy(ExistingWorkPolicy::Keep),
                )
            })
            .collect();

        assert_eq!(outcomes[0], EnqueueOutcome::Enqueued);
        assert!(outcomes[1..].iter().all(|o| *o == EnqueueOutcome::Kept));
        assert_eq!(ctx.scheduler.active_jobs(), vec!["job".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_enqueues_yield_one_job() {
        let ctx = TestContext::new(false);
        let worker = FlakyWorker::new(1);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let scheduler = ctx.scheduler.clone();
                let worker = worker.clone();
                tokio::spawn(async move {
                    scheduler.enqueue_unique(WorkRequest::new("job", worker).requires_network())
                })
            })
            .collect();

        let mut enqueued = 0;
        for handle in handles {
            if handle.await.unwrap() == EnqueueOutcome::Enqueued {
                enqueued += 1;
            }
        }
        assert_eq!(enqueued, 1);

        ctx.monitor.set_connected(true);
        ctx.wait_finished("job").await;
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_job_does_not_block() {
        let ctx = TestContext::new(true);
        let worker = FlakyWorker::new(1);

        ctx.scheduler
            .enqueue_unique(WorkRequest::new("job", worker.clone()));
        ctx.wait_finished("job").await;

        let outcome = ctx
            .scheduler
            .enqueue_unique(WorkRequest::new("job", worker.clone()));
        assert_eq!(outcome, EnqueueOutcome::Enqueued);
        ctx.wait_finished("job").await;
        assert_eq!(worker.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_policy() {
        let ctx = TestContext::new(true);

        ctx.scheduler
            .enqueue_unique(WorkRequest::new("job", Arc::new(PendingWorker)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            ctx.scheduler.job_state("job").unwrap().state,
            JobState::Running
        );

        let worker = FlakyWorker::new(1);
        let outcome = ctx.scheduler.enqueue_unique(
            WorkRequest::new("job", worker.clone()).with_policy(ExistingWorkPolicy::Replace),
        );
        assert_eq!(outcome, EnqueueOutcome::Replaced);

        let info = ctx.wait_finished("job").await;
        assert_eq!(info.state, JobState::Succeeded);
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_constraint_waits_for_connection() {
        let ctx = TestContext::new(false);
        let worker = FlakyWorker::new(1);

        ctx.scheduler
            .enqueue_unique(WorkRequest::new("job", worker.clone()).requires_network());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(worker.runs(), 0);
        assert_eq!(
            ctx.scheduler.job_state("job").unwrap().state,
            JobState::Enqueued
        );

        ctx.monitor.set_connected(true);
        let info = ctx.wait_finished("job").await;
        assert_eq!(info.state, JobState::Succeeded);
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let ctx = TestContext::new(false);
        let worker = FlakyWorker::new(1);

        ctx.scheduler
            .enqueue_unique(WorkRequest::new("job", worker.clone()).requires_network());
        assert!(ctx.scheduler.cancel("job"));
        assert!(!ctx.scheduler.cancel("job"));
        assert!(!ctx.scheduler.cancel("missing"));

        ctx.monitor.set_connected(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(worker.runs(), 0);
        assert_eq!(
            ctx.scheduler.job_state("job").unwrap().state,
            JobState::Cancelled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_work() {
        let ctx = TestContext::new(true);
        let worker = FlakyWorker::new(1);
        let request = PeriodicWorkRequest::new("tick", Duration::from_secs(900), worker.clone())
            .with_initial_delay(Duration::from_secs(300));

        assert_eq!(
            ctx.scheduler.enqueue_periodic(request.clone()),
            EnqueueOutcome::Enqueued
        );

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(worker.runs(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(worker.runs(), 1);

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(worker.runs(), 2);

        let info = ctx.scheduler.job_state("tick").unwrap();
        assert_eq!(info.state, JobState::Enqueued);
        assert_eq!(info.attempts, 2);

        assert_eq!(
            ctx.scheduler.enqueue_periodic(request),
            EnqueueOutcome::Replaced
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let ctx = TestContext::new(false);
        let worker = FlakyWorker::new(1);

        ctx.scheduler
            .enqueue_unique(WorkRequest::new("a", worker.clone()).requires_network());
        ctx.scheduler.enqueue_periodic(PeriodicWorkRequest::new(
            "b",
            Duration::from_secs(60),
            worker.clone(),
        ));
        assert_eq!(ctx.scheduler.active_jobs().len(), 2);

        ctx.scheduler.shutdown();
        assert!(ctx.scheduler.active_jobs().is_empty());

        ctx.monitor.set_connected(true);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(worker.runs(), 0);
    }
}
