//! Wiring of the sync engine to the SQLite store and the HTTP server.

mod client;
mod health;

pub use client::HttpRemote;
pub use health::{check_once, spawn_health_check};

use std::sync::Arc;

use shoplist_core::{
    Collaborators, NetworkMonitor, ShoppingList, SyncEngine, TokioWorkScheduler,
};

use crate::config::Config;
use crate::db::{init_db, SqliteItemStore};

/// Everything a command needs, built once per invocation.
pub struct App {
    pub list: ShoppingList,
    pub store: SqliteItemStore,
    pub remote: HttpRemote,
    pub monitor: Arc<NetworkMonitor>,
    pub scheduler: TokioWorkScheduler,
}

impl App {
    /// Opens the database, checks the server once and builds the engine.
    pub async fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = init_db(&config.database_path.value).await?;
        let store = SqliteItemStore::new(pool);

        let remote = HttpRemote::new(&config.sync.server_url.value, config.sync.request_timeout())?;
        let monitor = Arc::new(NetworkMonitor::new(false));
        check_once(&remote, &monitor).await;

        let scheduler = TokioWorkScheduler::new(monitor.clone());
        let engine = SyncEngine::new(
            Collaborators {
                store: Arc::new(store.clone()),
                remote: Arc::new(remote.clone()),
                connectivity: monitor.clone(),
                jobs: Arc::new(scheduler.clone()),
            },
            config.sync.settings.clone(),
        );

        Ok(Self {
            list: ShoppingList::new(engine),
            store,
            remote,
            monitor,
            scheduler,
        })
    }

    pub fn engine(&self) -> &SyncEngine {
        self.list.engine()
    }

    /// Best-effort sync; failures are only logged.
    pub async fn try_sync(&self) {
        if !self.engine().is_connected() {
            return;
        }
        match self.list.sync_now().await {
            Ok(report) => tracing::debug!(?report, "Auto-sync completed"),
            Err(e) => tracing::warn!(error = %e, "Auto-sync failed"),
        }
    }
}
