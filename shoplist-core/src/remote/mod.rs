//! Remote item service.

mod memory;

pub use memory::{InMemoryRemote, NetworkConditions, RemoteCalls};

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{ItemId, RemoteItem};

/// Network API holding the remote copy of the list. Any call may fail.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError>;

    /// Adds the item, replacing any remote item with the same id.
    async fn add(&self, item: &RemoteItem) -> Result<RemoteItem, RemoteError>;

    /// Fails with [`RemoteError::NotFound`] if the id is absent.
    async fn update(&self, id: &ItemId, item: &RemoteItem) -> Result<RemoteItem, RemoteError>;

    /// Fails with [`RemoteError::NotFound`] if the id is absent.
    async fn delete(&self, id: &ItemId) -> Result<(), RemoteError>;
}
