//! Deferred background work.
//!
//! A small model of a host job scheduler: unique named one-time work with
//! backoff and a network constraint, and unique named periodic work. The
//! retry scheduler is written against [`JobScheduler`]; the in-process
//! implementation is [`TokioWorkScheduler`].

mod scheduler;

pub use scheduler::TokioWorkScheduler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// What a worker asks the scheduler to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    /// Run again after the request's backoff delay.
    Retry,
    /// Give up. No further automatic attempts.
    Failure,
}

/// Passed to every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkContext {
    pub name: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn do_work(&self, ctx: WorkContext) -> WorkOutcome;
}

/// What to do when unique work with the same name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingWorkPolicy {
    /// Leave the existing unfinished job alone and drop the new request.
    #[default]
    Keep,
    /// Cancel the existing job and start the new one.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub requires_network: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Exponential,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub policy: BackoffPolicy,
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            policy: BackoffPolicy::Exponential,
            base,
            max,
        }
    }

    pub fn linear(base: Duration, max: Duration) -> Self {
        Self {
            policy: BackoffPolicy::Linear,
            base,
            max,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Exponential: `base * 2^(attempt-1)`. Linear: `base * attempt`.
    /// Both are capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.policy {
            BackoffPolicy::Exponential => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                self.base.checked_mul(factor)
            }
            BackoffPolicy::Linear => self.base.checked_mul(attempt),
        };
        delay.map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(30), Duration::from_secs(5 * 60 * 60))
    }
}

/// A unique named one-time job.
#[derive(Clone)]
pub struct WorkRequest {
    pub name: String,
    pub policy: ExistingWorkPolicy,
    pub constraints: Constraints,
    pub backoff: Backoff,
    pub worker: Arc<dyn Worker>,
}

impl WorkRequest {
    pub fn new(name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            name: name.into(),
            policy: ExistingWorkPolicy::default(),
            constraints: Constraints::default(),
            backoff: Backoff::default(),
            worker,
        }
    }

    pub fn with_policy(mut self, policy: ExistingWorkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn requires_network(mut self) -> Self {
        self.constraints.requires_network = true;
        self
    }
}

impl fmt::Debug for WorkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRequest")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("constraints", &self.constraints)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// A unique named job run repeatedly. Always replaces an existing periodic
/// job of the same name; the worker's outcome is ignored.
#[derive(Clone)]
pub struct PeriodicWorkRequest {
    pub name: String,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub constraints: Constraints,
    pub worker: Arc<dyn Worker>,
}

impl PeriodicWorkRequest {
    pub fn new(name: impl Into<String>, interval: Duration, worker: Arc<dyn Worker>) -> Self {
        Self {
            name: name.into(),
            interval,
            initial_delay: Duration::ZERO,
            constraints: Constraints::default(),
            worker,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn requires_network(mut self) -> Self {
        self.constraints.requires_network = true;
        self
    }
}

impl fmt::Debug for PeriodicWorkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicWorkRequest")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("initial_delay", &self.initial_delay)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for its constraint, its backoff or its next period.
    Enqueued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Enqueued => "enqueued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobInfo {
    pub state: JobState,
    /// Attempts started so far (runs, for periodic jobs).
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// An unfinished job with the same name was kept.
    Kept,
    /// An unfinished job with the same name was cancelled in favour of this one.
    Replaced,
}

/// Host job scheduler.
pub trait JobScheduler: Send + Sync {
    fn enqueue_unique(&self, request: WorkRequest) -> EnqueueOutcome;

    fn enqueue_periodic(&self, request: PeriodicWorkRequest) -> EnqueueOutcome;

    fn job_state(&self, name: &str) -> Option<JobInfo>;

    /// Returns false if no unfinished job has that name.
    fn cancel(&self, name: &str) -> bool;
}
