pub mod item;
mod query;

pub use item::{Item, ItemId, RemoteItem, StoredItem};
pub use query::{FilterType, ListQuery, SortOrder};
