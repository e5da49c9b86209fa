//! In-memory item store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use super::{ItemStore, ItemStream};
use crate::error::StoreError;
use crate::models::{ItemId, ListQuery, StoredItem};

/// Item store kept entirely in memory.
///
/// Cloning is cheap and clones share the same rows. Writes can be made to
/// fail on demand, which is how store errors are exercised in tests.
#[derive(Clone)]
pub struct MemoryItemStore {
    inner: Arc<Inner>,
}

struct Inner {
    items: RwLock<HashMap<ItemId, StoredItem>>,
    changes: watch::Sender<u64>,
    fail_writes: AtomicBool,
    fail_mark_synced: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(HashMap::new()),
                changes,
                fail_writes: AtomicBool::new(false),
                fail_mark_synced: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a store pre-populated with `items`.
    pub fn with_items(items: impl IntoIterator<Item = StoredItem>) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.inner.items.write() {
            for item in items {
                rows.insert(item.id().clone(), item);
            }
        }
        store
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes only `mark_synced` fail.
    pub fn set_fail_mark_synced(&self, fail: bool) {
        self.inner.fail_mark_synced.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn read_rows(&self) -> Result<RwLockReadGuard<'_, HashMap<ItemId, StoredItem>>, StoreError> {
        self.inner
            .items
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write_rows(&self) -> Result<RwLockWriteGuard<'_, HashMap<ItemId, StoredItem>>, StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        self.inner
            .items
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn committed(&self) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.changes.send_modify(|version| *version += 1);
    }

    fn snapshot(&self) -> Result<Vec<StoredItem>, StoreError> {
        Ok(self.read_rows()?.values().cloned().collect())
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn read_all(&self) -> Result<Vec<StoredItem>, StoreError> {
        self.snapshot()
    }

    async fn get(&self, id: &ItemId) -> Result<Option<StoredItem>, StoreError> {
        Ok(self.read_rows()?.get(id).cloned())
    }

    fn read_filtered(&self, query: ListQuery) -> ItemStream {
        let mut changes = self.inner.changes.subscribe();
        changes.borrow_and_update();

        stream::unfold(
            (self.clone(), changes, query, true),
            |(store, mut changes, query, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                let result = store
                    .snapshot()
                    .map(|rows| query.apply(rows.into_iter().map(|s| s.item)));
                Some((result, (store, changes, query, false)))
            },
        )
        .boxed()
    }

    async fn insert(&self, item: &StoredItem) -> Result<(), StoreError> {
        self.write_rows()?.insert(item.id().clone(), item.clone());
        self.committed();
        Ok(())
    }

    async fn update(&self, item: &StoredItem) -> Result<bool, StoreError> {
        let updated = {
            let mut rows = self.write_rows()?;
            match rows.get_mut(item.id()) {
                Some(row) => {
                    *row = item.clone();
                    true
                }
                None => false,
            }
        };
        if updated {
            self.committed();
        }
        Ok(updated)
    }

    async fn delete(&self, id: &ItemId) -> Result<bool, StoreError> {
        let removed = self.write_rows()?.remove(id).is_some();
        if removed {
            self.committed();
        }
        Ok(removed)
    }

    async fn batch_upsert(&self, items: &[StoredItem]) -> Result<(), StoreError> {
        {
            let mut rows = self.write_rows()?;
            for item in items {
                let is_stale = rows
                    .get(item.id())
                    .is_some_and(|existing| existing.item.updated_at > item.item.updated_at);
                if !is_stale {
                    rows.insert(item.id().clone(), item.clone());
                }
            }
        }
        self.committed();
        Ok(())
    }

    async fn update_bought_status(
        &self,
        id: &ItemId,
        is_bought: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated = {
            let mut rows = self.write_rows()?;
            match rows.get_mut(id) {
                Some(row) => {
                    row.item.is_bought = is_bought;
                    row.item.updated_at = timestamp;
                    row.synced_with_remote = false;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.committed();
        }
        Ok(updated)
    }

    async fn mark_synced(
        &self,
        id: &ItemId,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.inner.fail_mark_synced.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated mark_synced failure".to_string()));
        }
        let marked = {
            let mut rows = self.write_rows()?;
            match rows.get_mut(id) {
                Some(row) if row.item.updated_at == updated_at => {
                    row.synced_with_remote = true;
                    true
                }
                _ => false,
            }
        };
        if marked {
            self.committed();
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::from_millis;
    use crate::models::{FilterType, Item, SortOrder};
    use std::time::Duration;

    fn stored(name: &str, updated: i64) -> StoredItem {
        StoredItem::unsynced(Item::new(name, 1).with_updated_at(from_millis(updated)))
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = MemoryItemStore::new();
        let item = stored("Milk", 10);

        store.insert(&item).await.unwrap();
        assert_eq!(store.get(item.id()).await.unwrap(), Some(item.clone()));

        assert!(store.delete(item.id()).await.unwrap());
        assert!(!store.delete(item.id()).await.unwrap());
        assert!(store.get(item.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_returns_false() {
        let store = MemoryItemStore::new();
        assert!(!store.update(&stored("Ghost", 1)).await.unwrap());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_upsert_does_not_regress_updated_at() {
        let newer = stored("Newer", 200);
        let store = MemoryItemStore::with_items([newer.clone()]);

        let mut older = newer.clone();
        older.item.name = "Older".into();
        older.item.updated_at = from_millis(100);
        let fresh = stored("Fresh", 50);

        store.batch_upsert(&[older, fresh.clone()]).await.unwrap();

        assert_eq!(store.get(newer.id()).await.unwrap().unwrap().item.name, "Newer");
        assert!(store.get(fresh.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_bought_status_clears_synced_flag() {
        let item = stored("Eggs", 10).with_synced(true);
        let store = MemoryItemStore::with_items([item.clone()]);

        assert!(store
            .update_bought_status(item.id(), true, from_millis(20))
            .await
            .unwrap());

        let row = store.get(item.id()).await.unwrap().unwrap();
        assert!(row.item.is_bought);
        assert_eq!(row.item.updated_millis(), 20);
        assert!(!row.synced_with_remote);
    }

    #[tokio::test]
    async fn test_mark_synced_requires_matching_timestamp() {
        let item = stored("Tea", 10);
        let store = MemoryItemStore::with_items([item.clone()]);

        assert!(!store.mark_synced(item.id(), from_millis(9)).await.unwrap());
        assert!(store.mark_synced(item.id(), from_millis(10)).await.unwrap());
        assert!(store.get(item.id()).await.unwrap().unwrap().synced_with_remote);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryItemStore::new();
        store.set_fail_writes(true);
        let result = store.insert(&stored("Milk", 1)).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_filtered_emits_on_every_write() {
        let store = MemoryItemStore::new();
        let query = ListQuery::new(FilterType::NotBought, SortOrder::DateAsc, "");
        let mut stream = store.read_filtered(query);

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.is_empty());

        let milk = stored("Milk", 1);
        store.insert(&milk).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second.len(), 1);

        store
            .update_bought_status(milk.id(), true, from_millis(2))
            .await
            .unwrap();
        let third = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(third.is_empty());
    }
}
