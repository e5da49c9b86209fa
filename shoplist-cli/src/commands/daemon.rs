//! Long-running background sync.

use clap::Args;

use super::CommandError;
use crate::config::Config;
use crate::sync::{spawn_health_check, App};

/// Keep the list in sync in the background until interrupted
#[derive(Debug, Args)]
pub struct DaemonCommand {}

impl DaemonCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), CommandError> {
        let health = spawn_health_check(
            app.remote.clone(),
            app.monitor.clone(),
            config.sync.health_check_interval(),
        );
        let outcome = app.engine().schedule_periodic_sync();
        tracing::info!(?outcome, server = app.remote.base_url(), "Background sync started");

        println!(
            "Syncing with {} in the background (Ctrl-C to stop)",
            app.remote.base_url()
        );

        // Anything left unsynced by earlier runs goes out now.
        app.try_sync().await;

        let mut connectivity = app.monitor.subscribe();
        loop {
            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let connected = *connectivity.borrow_and_update();
                    if connected {
                        app.try_sync().await;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        health.abort();
        app.scheduler.shutdown();
        tracing::info!("Background sync stopped");
        println!("Stopped.");
        Ok(())
    }
}
