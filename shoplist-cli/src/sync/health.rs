//! Connectivity health check feeding the engine's network monitor.

use std::sync::Arc;
use std::time::Duration;

use shoplist_core::NetworkMonitor;
use tokio::task::JoinHandle;

use super::HttpRemote;

/// Checks the server once and records the result. Returns the new state.
pub async fn check_once(remote: &HttpRemote, monitor: &NetworkMonitor) -> bool {
    let connected = match remote.health().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(url = remote.base_url(), error = %e, "Server unreachable");
            false
        }
    };
    monitor.set_connected(connected);
    connected
}

/// Checks the server every `interval` until the task is aborted.
pub fn spawn_health_check(
    remote: HttpRemote,
    monitor: Arc<NetworkMonitor>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            check_once(&remote, &monitor).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist::server::{serve, ServerConfig, ServerState};
    use shoplist_core::Connectivity;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_health_check_detects_server() {
        let temp_dir = TempDir::new().unwrap();
        let state = ServerState::open(ServerConfig::new(temp_dir.path().to_path_buf())).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        let remote = HttpRemote::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let monitor = NetworkMonitor::new(false);

        assert!(check_once(&remote, &monitor).await);
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn test_health_check_marks_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = HttpRemote::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let monitor = NetworkMonitor::new(true);

        assert!(!check_once(&remote, &monitor).await);
        assert!(!monitor.is_connected());
    }

    #[tokio::test]
    async fn test_spawned_health_check_updates_monitor() {
        let temp_dir = TempDir::new().unwrap();
        let state = ServerState::open(ServerConfig::new(temp_dir.path().to_path_buf())).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        let remote = HttpRemote::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let monitor = Arc::new(NetworkMonitor::new(false));
        let handle = spawn_health_check(remote, monitor.clone(), Duration::from_millis(50));

        tokio::time::timeout(Duration::from_secs(5), monitor.wait_until_connected())
            .await
            .unwrap();
        handle.abort();
    }
}
