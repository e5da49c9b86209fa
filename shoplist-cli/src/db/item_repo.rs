use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use shoplist_core::models::item::from_millis;
use shoplist_core::{
    FilterType, Item, ItemId, ItemStore, ItemStream, ListQuery, SortOrder, StoreError, StoredItem,
};
use sqlx::SqlitePool;
use tokio::sync::watch;

/// SQLite-backed item store.
///
/// Live views are driven by a change counter bumped after every committed
/// write made through this store (and its clones).
#[derive(Clone)]
pub struct SqliteItemStore {
    pool: SqlitePool,
    changes: Arc<watch::Sender<u64>>,
}

// Row type for database queries
#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    name: String,
    quantity: i32,
    note: Option<String>,
    is_bought: bool,
    created_at: i64,
    updated_at: i64,
    synced_with_remote: bool,
}

impl From<ItemRow> for StoredItem {
    fn from(row: ItemRow) -> Self {
        StoredItem::new(
            Item {
                id: ItemId::from(row.id),
                name: row.name,
                quantity: row.quantity,
                note: row.note,
                is_bought: row.is_bought,
                created_at: from_millis(row.created_at),
                updated_at: from_millis(row.updated_at),
            },
            row.synced_with_remote,
        )
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO items (id, name, quantity, note, is_bought, created_at, updated_at, synced_with_remote)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        quantity = excluded.quantity,
        note = excluded.note,
        is_bought = excluded.is_bought,
        created_at = excluded.created_at,
        updated_at = excluded.updated_at,
        synced_with_remote = excluded.synced_with_remote
    WHERE excluded.updated_at >= items.updated_at
"#;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            pool,
            changes: Arc::new(changes),
        }
    }

    fn committed(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    async fn query(&self, query: &ListQuery) -> Result<Vec<Item>, StoreError> {
        let order = match query.sort {
            SortOrder::DateAsc => "ASC",
            SortOrder::DateDesc => "DESC",
        };
        let sql = match query.filter {
            FilterType::All => format!(
                "SELECT * FROM items ORDER BY updated_at {order}, id {order}"
            ),
            FilterType::Bought | FilterType::NotBought => format!(
                "SELECT * FROM items WHERE is_bought = ? ORDER BY updated_at {order}, id {order}"
            ),
        };

        let mut q = sqlx::query_as::<_, ItemRow>(&sql);
        if let Some(bought) = query.filter.bought_state() {
            q = q.bind(bought);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(backend)?;

        // Search is matched in Rust: SQLite LIKE only folds ASCII case.
        Ok(query.apply(rows.into_iter().map(|row| StoredItem::from(row).item)))
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn read_all(&self) -> Result<Vec<StoredItem>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as("SELECT * FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(StoredItem::from).collect())
    }

    async fn get(&self, id: &ItemId) -> Result<Option<StoredItem>, StoreError> {
        let row: Option<ItemRow> = sqlx::query_as("SELECT * FROM items WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(StoredItem::from))
    }

    fn read_filtered(&self, query: ListQuery) -> ItemStream {
        let mut changes = self.changes.subscribe();
        changes.borrow_and_update();

        stream::unfold(
            (self.clone(), changes, query, true),
            |(store, mut changes, query, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                let result = store.query(&query).await;
                Some((result, (store, changes, query, false)))
            },
        )
        .boxed()
    }

    async fn insert(&self, stored: &StoredItem) -> Result<(), StoreError> {
        let item = &stored.item;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO items (id, name, quantity, note, is_bought, created_at, updated_at, synced_with_remote)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.as_str())
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.note)
        .bind(item.is_bought)
        .bind(item.created_at.timestamp_millis())
        .bind(item.updated_millis())
        .bind(stored.synced_with_remote)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.committed();
        Ok(())
    }

    async fn update(&self, stored: &StoredItem) -> Result<bool, StoreError> {
        let item = &stored.item;
        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = ?, quantity = ?, note = ?, is_bought = ?, created_at = ?, updated_at = ?, synced_with_remote = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.note)
        .bind(item.is_bought)
        .bind(item.created_at.timestamp_millis())
        .bind(item.updated_millis())
        .bind(stored.synced_with_remote)
        .bind(item.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.committed();
        }
        Ok(updated)
    }

    async fn delete(&self, id: &ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.committed();
        }
        Ok(deleted)
    }

    async fn batch_upsert(&self, items: &[StoredItem]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for stored in items {
            let item = &stored.item;
            sqlx::query(UPSERT_SQL)
                .bind(item.id.as_str())
                .bind(&item.name)
                .bind(item.quantity)
                .bind(&item.note)
                .bind(item.is_bought)
                .bind(item.created_at.timestamp_millis())
                .bind(item.updated_millis())
                .bind(stored.synced_with_remote)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        self.committed();
        Ok(())
    }

    async fn update_bought_status(
        &self,
        id: &ItemId,
        is_bought: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE items SET is_bought = ?, updated_at = ?, synced_with_remote = 0 WHERE id = ?",
        )
        .bind(is_bought)
        .bind(timestamp.timestamp_millis())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let updated = result.rows_affected() > 0;
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
        let result = sqlx::query(
            "UPDATE items SET synced_with_remote = 1 WHERE id = ? AND updated_at = ?",
        )
        .bind(id.as_str())
        .bind(updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let marked = result.rows_affected() > 0;
        if marked {
            self.committed();
        }
        Ok(marked)
    }
}
