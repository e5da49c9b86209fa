//! Shoplist Core Library
//!
//! Offline-first shopping list: item model, conflict resolver, sync engine,
//! retry scheduling and the collaborator traits front ends plug into.

pub mod connectivity;
pub mod error;
pub mod facade;
pub mod models;
pub mod remote;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod sync;
pub mod work;

#[cfg(test)]
mod testing;

pub use connectivity::{Connectivity, NetworkMonitor};
pub use error::{RemoteError, Result, ShoppingListError, StoreError, ValidationError};
pub use facade::ShoppingList;
pub use models::{FilterType, Item, ItemId, ListQuery, RemoteItem, SortOrder, StoredItem};
pub use remote::{InMemoryRemote, NetworkConditions, RemoteService};
pub use resolver::resolve;
pub use settings::SyncSettings;
pub use store::{ItemStore, ItemStream, MemoryItemStore};
pub use sync::{Collaborators, RetryScheduler, SyncEngine, SyncReport, SyncWorker};
pub use work::{JobInfo, JobScheduler, JobState, TokioWorkScheduler};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
