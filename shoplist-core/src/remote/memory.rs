//! In-process remote service.
//!
//! Behaves like the real item API (upsert on add, not-found on update or
//! delete of unknown ids) and can simulate a slow, flaky network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::RemoteService;
use crate::error::RemoteError;
use crate::models::{ItemId, RemoteItem};

/// Simulated network behaviour applied before every call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkConditions {
    /// Fixed delay per call
    pub latency: Duration,
    /// Extra random delay, up to this much
    pub jitter: Duration,
    /// Probability in `[0, 1]` that a call fails
    pub failure_rate: f32,
}

impl NetworkConditions {
    /// A slow, occasionally failing mobile-style connection.
    pub fn flaky() -> Self {
        Self {
            latency: Duration::from_millis(500),
            jitter: Duration::from_millis(100),
            failure_rate: 0.1,
        }
    }

    fn sample_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };
        self.latency + Duration::from_millis(extra)
    }

    fn sample_failure(&self) -> bool {
        self.failure_rate > 0.0 && rand::rng().random::<f32>() < self.failure_rate
    }
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteCalls {
    pub list: usize,
    pub add: usize,
    pub update: usize,
    pub delete: usize,
}

impl RemoteCalls {
    pub fn total(&self) -> usize {
        self.list + self.add + self.update + self.delete
    }
}

#[derive(Clone)]
pub struct InMemoryRemote {
    inner: Arc<Inner>,
}

struct Inner {
    items: Mutex<Vec<RemoteItem>>,
    calls: Mutex<RemoteCalls>,
    conditions: Mutex<NetworkConditions>,
    available: AtomicBool,
    reject_writes: AtomicBool,
    fail_next: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_conditions(NetworkConditions::default())
    }

    pub fn with_conditions(conditions: NetworkConditions) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(Vec::new()),
                calls: Mutex::new(RemoteCalls::default()),
                conditions: Mutex::new(conditions),
                available: AtomicBool::new(true),
                reject_writes: AtomicBool::new(false),
                fail_next: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_items(items: impl IntoIterator<Item = RemoteItem>) -> Self {
        let remote = Self::new();
        if let Ok(mut stored) = remote.inner.items.lock() {
            stored.extend(items);
        }
        remote
    }

    pub fn set_conditions(&self, conditions: NetworkConditions) {
        if let Ok(mut current) = self.inner.conditions.lock() {
            *current = conditions;
        }
    }

    /// While unavailable every call fails with [`RemoteError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// While set, `add`, `update` and `delete` fail but `list` still works.
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Current remote contents, in insertion order.
    pub fn items(&self) -> Vec<RemoteItem> {
        self.lock_items().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn get(&self, id: &ItemId) -> Option<RemoteItem> {
        self.items().into_iter().find(|i| &i.id == id)
    }

    pub fn calls(&self) -> RemoteCalls {
        self.inner
            .calls
            .lock()
            .map(|calls| *calls)
            .unwrap_or_default()
    }

    fn lock_items(&self) -> Result<MutexGuard<'_, Vec<RemoteItem>>, RemoteError> {
        self.inner
            .items
            .lock()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }

    fn record(&self, op: fn(&mut RemoteCalls)) {
        if let Ok(mut calls) = self.inner.calls.lock() {
            op(&mut calls);
        }
    }

    fn conditions(&self) -> NetworkConditions {
        self.inner
            .conditions
            .lock()
            .map(|c| *c)
            .unwrap_or_default()
    }

    async fn simulate_network(&self) -> Result<(), RemoteError> {
        let conditions = self.conditions();
        let delay = conditions.sample_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("remote is offline".to_string()));
        }

        let forced = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced || conditions.sample_failure() {
            return Err(RemoteError::Transport("Network error".to_string()));
        }

        Ok(())
    }

    async fn simulate_write(&self) -> Result<(), RemoteError> {
        self.simulate_network().await?;
        if self.inner.reject_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Server {
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        self.record(|c| c.list += 1);
        self.simulate_network().await?;
        Ok(self.lock_items()?.clone())
    }

    async fn add(&self, item: &RemoteItem) -> Result<RemoteItem, RemoteError> {
        self.record(|c| c.add += 1);
        self.simulate_write().await?;
        let mut items = self.lock_items()?;
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(item.clone())
    }

    async fn update(&self, id: &ItemId, item: &RemoteItem) -> Result<RemoteItem, RemoteError> {
        self.record(|c| c.update += 1);
        self.simulate_write().await?;
        let mut items = self.lock_items()?;
        match items.iter_mut().find(|i| &i.id == id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(item.clone())
            }
            None => Err(RemoteError::NotFound(id.clone())),
        }
    }

    async fn delete(&self, id: &ItemId) -> Result<(), RemoteError> {
        self.record(|c| c.delete += 1);
        self.simulate_write().await?;
        let mut items = self.lock_items()?;
        let before = items.len();
        items.retain(|i| &i.id != id);
        if items.len() == before {
            return Err(RemoteError::NotFound(id.clone()));
        }
        Ok(())
    }
}
