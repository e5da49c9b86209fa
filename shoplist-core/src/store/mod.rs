//! Local durable item store.
//!
//! The store owns per-row atomicity. The engine relies on three guarantees:
//! every write is all-or-nothing, `batch_upsert` never replaces a row with
//! one carrying an older `updated_at`, and `mark_synced` only flips the flag
//! when the row still has the `updated_at` that was pushed.

mod memory;

pub use memory::MemoryItemStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::StoreError;
use crate::models::{Item, ItemId, ListQuery, StoredItem};

/// Live view over the store: yields the current matching items immediately,
/// then again after every write.
pub type ItemStream = BoxStream<'static, Result<Vec<Item>, StoreError>>;

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Snapshot of every stored item.
    async fn read_all(&self) -> Result<Vec<StoredItem>, StoreError>;

    async fn get(&self, id: &ItemId) -> Result<Option<StoredItem>, StoreError>;

    /// Live filtered, searched and sorted view.
    fn read_filtered(&self, query: ListQuery) -> ItemStream;

    /// Inserts or replaces the row with the same id.
    async fn insert(&self, item: &StoredItem) -> Result<(), StoreError>;

    /// Replaces an existing row. Returns false if the id is unknown.
    async fn update(&self, item: &StoredItem) -> Result<bool, StoreError>;

    /// Returns false if the id is unknown.
    async fn delete(&self, id: &ItemId) -> Result<bool, StoreError>;

    /// Inserts or replaces every item in one transaction, skipping rows
    /// whose stored `updated_at` is newer than the incoming one.
    async fn batch_upsert(&self, items: &[StoredItem]) -> Result<(), StoreError>;

    /// Sets the bought state and `updated_at`, clearing the synced flag.
    /// Returns false if the id is unknown.
    async fn update_bought_status(
        &self,
        id: &ItemId,
        is_bought: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Marks the row synced if its `updated_at` still equals `updated_at`.
    /// Returns false if the row is gone or has changed since.
    async fn mark_synced(
        &self,
        id: &ItemId,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
