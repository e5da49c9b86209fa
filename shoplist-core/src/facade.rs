//! Public entry point for front ends.

use crate::error::{Result, ShoppingListError, ValidationError};
use crate::models::{FilterType, Item, ItemId, ListQuery, SortOrder};
use crate::store::ItemStream;
use crate::sync::{SyncEngine, SyncReport};

/// Validating wrapper over [`SyncEngine`].
///
/// Inputs are checked before any I/O: names are trimmed and must not be
/// empty, quantities must be positive and blank notes are dropped.
#[derive(Clone)]
pub struct ShoppingList {
    engine: SyncEngine,
}

impl ShoppingList {
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Live, filtered and sorted view. `search` matches name or note,
    /// ignoring case; an empty search matches everything.
    pub fn get_list(&self, filter: FilterType, sort: SortOrder, search: &str) -> ItemStream {
        self.engine.list(ListQuery::new(filter, sort, search))
    }

    pub async fn get_item(&self, id: &ItemId) -> Result<Option<Item>> {
        self.engine.get(id).await
    }

    pub async fn add_item(&self, name: &str, quantity: i32, note: Option<&str>) -> Result<Item> {
        let name = validate(name, quantity)?;
        let mut item = Item::new(name, quantity);
        item.note = normalize_note(note);

        self.engine.add(item.clone()).await?;
        Ok(item)
    }

    /// Replaces name, quantity and note. Creation time and bought state are
    /// kept; `updated_at` is refreshed.
    pub async fn update_item(
        &self,
        id: &ItemId,
        name: &str,
        quantity: i32,
        note: Option<&str>,
    ) -> Result<Item> {
        let name = validate(name, quantity)?;
        let current = self
            .engine
            .get(id)
            .await?
            .ok_or_else(|| ShoppingListError::NotFound(id.clone()))?;

        let item = current.edited(name, quantity, normalize_note(note));
        self.engine.update(item.clone()).await?;
        Ok(item)
    }

    pub async fn delete_item(&self, id: &ItemId) -> Result<()> {
        self.engine.delete(id).await
    }

    pub async fn mark_bought(&self, id: &ItemId, is_bought: bool) -> Result<()> {
        self.engine.mark_bought(id, is_bought).await
    }

    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.engine.sync_with_remote().await
    }
}

fn validate(name: &str, quantity: i32) -> std::result::Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if quantity <= 0 {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    Ok(name.to_string())
}

fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ItemStore;
    use crate::sync::SYNC_WORK_NAME;
    use crate::testing::{RecordingScheduler, TestContext};
    use futures::StreamExt;
    use std::sync::Arc;

    fn setup(connected: bool) -> (TestContext, Arc<RecordingScheduler>, ShoppingList) {
        let (ctx, jobs) = TestContext::recording(connected);
        let list = ShoppingList::new(ctx.engine.clone());
        (ctx, jobs, list)
    }

    #[tokio::test]
    async fn test_add_item_trims_and_normalizes() {
        let (ctx, _jobs, list) = setup(true);

        let item = list.add_item("  Milk ", 2, Some("   ")).await.unwrap();

        assert_eq!(item.name, "Milk");
        assert_eq!(item.quantity, 2);
        assert!(item.note.is_none());
        assert!(!item.is_bought);
        assert_eq!(ctx.stored(&item.id).await.item, item);
    }

    #[tokio::test]
    async fn test_add_item_offline_succeeds_unsynced() {
        let (ctx, jobs, list) = setup(false);

        let item = list.add_item("Eggs", 12, Some("free range")).await.unwrap();

        let stored = ctx.stored(&item.id).await;
        assert!(!stored.synced_with_remote);
        assert_eq!(stored.item.note.as_deref(), Some("free range"));
        assert_eq!(jobs.requests(), vec![SYNC_WORK_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_add_item_empty_name_rejected_without_io() {
        let (ctx, jobs, list) = setup(true);

        let result = list.add_item("   ", 1, None).await;

        assert_eq!(
            result,
            Err(ShoppingListError::Validation(ValidationError::EmptyName))
        );
        assert_eq!(ctx.store.write_count(), 0);
        assert_eq!(ctx.remote.calls().total(), 0);
        assert!(jobs.requests().is_empty());
    }

    #[tokio::test]
    async fn test_add_item_non_positive_quantity_rejected() {
        let (ctx, _jobs, list) = setup(true);

        for quantity in [0, -3] {
            assert_eq!(
                list.add_item("Milk", quantity, None).await,
                Err(ShoppingListError::Validation(
                    ValidationError::NonPositiveQuantity(quantity)
                ))
            );
        }
        assert_eq!(ctx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_item_keeps_identity() {
        let (_ctx, _jobs, list) = setup(true);
        let item = list.add_item("Bread", 1, None).await.unwrap();
        list.mark_bought(&item.id, true).await.unwrap();

        let updated = list
            .update_item(&item.id, " Rye bread ", 2, Some(" sliced "))
            .await
            .unwrap();

        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, item.created_at);
        assert!(updated.is_bought);
        assert_eq!(updated.name, "Rye bread");
        assert_eq!(updated.note.as_deref(), Some("sliced"));
        assert!(updated.updated_at >= item.updated_at);
        assert_eq!(list.get_item(&item.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_item_validates_before_lookup() {
        let (_ctx, _jobs, list) = setup(true);
        let missing = ItemId::new();

        assert_eq!(
            list.update_item(&missing, "", 1, None).await,
            Err(ShoppingListError::Validation(ValidationError::EmptyName))
        );
        assert_eq!(
            list.update_item(&missing, "Milk", 1, None).await,
            Err(ShoppingListError::NotFound(missing.clone()))
        );
    }

    #[tokio::test]
    async fn test_delete_and_mark_bought_unknown_id() {
        let (_ctx, _jobs, list) = setup(true);
        let missing = ItemId::new();

        assert_eq!(
            list.delete_item(&missing).await,
            Err(ShoppingListError::NotFound(missing.clone()))
        );
        assert_eq!(
            list.mark_bought(&missing, true).await,
            Err(ShoppingListError::NotFound(missing.clone()))
        );
    }

    #[tokio::test]
    async fn test_delete_item() {
        let (ctx, _jobs, list) = setup(true);
        let item = list.add_item("Cheese", 1, None).await.unwrap();

        list.delete_item(&item.id).await.unwrap();

        assert!(list.get_item(&item.id).await.unwrap().is_none());
        assert!(ctx.remote.get(&item.id).is_none());
    }

    #[tokio::test]
    async fn test_get_list_filters_and_searches() {
        let (_ctx, _jobs, list) = setup(false);
        let apples = list.add_item("Apples", 6, Some("green")).await.unwrap();
        let pears = list.add_item("Pears", 2, None).await.unwrap();
        list.add_item("Grapes", 1, Some("Green seedless"))
            .await
            .unwrap();
        list.mark_bought(&pears.id, true).await.unwrap();

        let mut bought = list.get_list(FilterType::Bought, SortOrder::DateDesc, "");
        let items = bought.next().await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, pears.id);

        let mut search = list.get_list(FilterType::All, SortOrder::DateAsc, "GREEN");
        let items = search.next().await.unwrap().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.id == apples.id));
    }

    #[tokio::test]
    async fn test_sync_now_offline() {
        let (_ctx, _jobs, list) = setup(false);
        assert_eq!(list.sync_now().await, Err(ShoppingListError::NotConnected));
    }

    #[tokio::test]
    async fn test_sync_now_reports_counts() {
        let (ctx, _jobs, list) = setup(false);
        list.add_item("Milk", 1, None).await.unwrap();
        ctx.monitor.set_connected(true);

        let report = list.sync_now().await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.push_failures, 0);
        assert_eq!(ctx.store.read_all().await.unwrap().len(), 1);
        assert_eq!(ctx.remote.items().len(), 1);
    }
}
