//! Last-write-wins reconciliation of a local and a remote snapshot.
//!
//! For every remote item:
//! - not present locally: adopt the remote copy, synced
//! - remote `updated_at` newer: remote wins, synced
//! - local `updated_at` newer: local wins, unsynced (will be pushed)
//! - equal: already reconciled, synced
//!
//! Local items without a remote counterpart are kept untouched, including
//! their sync flag. Deletions are not tracked: an item removed locally while
//! offline comes back if the remote still has it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{ItemId, RemoteItem, StoredItem};

/// Merges `local` and `remote` into one snapshot keyed by id.
///
/// Pure and deterministic; the result is ordered by id and has no duplicate
/// ids. If either input repeats an id, the last occurrence wins.
pub fn resolve(local: &[StoredItem], remote: &[RemoteItem]) -> Vec<StoredItem> {
    let mut merged: BTreeMap<ItemId, StoredItem> = local
        .iter()
        .map(|stored| (stored.id().clone(), stored.clone()))
        .collect();

    for remote_item in remote {
        let resolved = match merged.get(&remote_item.id) {
            None => StoredItem::synced(remote_item.clone().into_item()),
            Some(local_item) => resolve_pair(local_item, remote_item),
        };
        merged.insert(remote_item.id.clone(), resolved);
    }

    merged.into_values().collect()
}

fn resolve_pair(local: &StoredItem, remote: &RemoteItem) -> StoredItem {
    match remote.updated_at.cmp(&local.item.updated_millis()) {
        Ordering::Greater => StoredItem::synced(remote.clone().into_item()),
        Ordering::Less => local.clone().with_synced(false),
        Ordering::Equal => local.clone().with_synced(true),
    }
}
