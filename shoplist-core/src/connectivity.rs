//! Reachability of the remote service.

use async_trait::async_trait;
use tokio::sync::watch;

/// Reports whether the remote service is currently reachable.
///
/// `is_connected` is synchronous and best-effort: the answer may be stale.
#[async_trait]
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Resolves once the remote is believed to be reachable.
    async fn wait_until_connected(&self);
}

/// Connectivity state shared between whatever checks the network and the
/// engine and scheduler that consume it.
#[derive(Debug)]
pub struct NetworkMonitor {
    state: watch::Sender<bool>,
}

impl NetworkMonitor {
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self { state }
    }

    /// Records the latest connectivity check. Returns the previous value.
    pub fn set_connected(&self, connected: bool) -> bool {
        let previous = self.state.send_replace(connected);
        if previous != connected {
            tracing::info!(connected, "Connectivity changed");
        }
        previous
    }

    /// Subscribe to connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Connectivity for NetworkMonitor {
    fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    async fn wait_until_connected(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only ends when connected.
        let _ = rx.wait_for(|connected| *connected).await;
    }
}
