//! Sync CLI commands for synchronizing with the server.

use clap::{Args, Subcommand};
use shoplist_core::{JobInfo, ShoppingListError, SyncReport};

use super::CommandError;
use crate::config::Config;
use crate::sync::App;

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and server status
    Status,
}

impl SyncCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            None => self.sync(app).await,
            Some(SyncSubcommand::Status) => self.status(app, config).await,
        }
    }

    async fn sync(&self, app: &App) -> Result<(), CommandError> {
        println!("Syncing with {}...", app.remote.base_url());

        match app.list.sync_now().await {
            Ok(report) => {
                println!("{}", format_report(&report));
                if report.push_failures > 0 {
                    println!("Some changes could not be pushed; run sync again later.");
                }
                Ok(())
            }
            Err(ShoppingListError::NotConnected) => {
                println!("Server unreachable, nothing synced.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn status(&self, app: &App, config: &Config) -> Result<(), CommandError> {
        let settings = &config.sync.settings;
        let pending = app.engine().pending_count().await?;

        println!("Sync Status");
        println!("===========");
        println!();
        println!("Server:        {}", config.sync.server_url.value);
        println!(
            "Server status: {}",
            if app.engine().is_connected() {
                "connected"
            } else {
                "unreachable"
            }
        );
        println!("Pending items: {}", pending);
        println!("Retry job:     {}", format_job(app.engine().retry_status()));
        println!();
        println!(
            "Retry: {} attempts, backoff {}s doubling up to {}s",
            settings.max_attempts, settings.retry_backoff_secs, settings.max_backoff_secs
        );
        println!(
            "Periodic sync (daemon): every {}s after {}s",
            settings.periodic_interval_secs, settings.periodic_initial_delay_secs
        );
        Ok(())
    }
}

fn format_report(report: &SyncReport) -> String {
    format!(
        "Pulled {}, merged {}, pushed {}, failed {}",
        report.pulled, report.merged, report.pushed, report.push_failures
    )
}

fn format_job(info: Option<JobInfo>) -> String {
    match info {
        Some(info) => format!("{} (attempt {})", info.state, info.attempts),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist_core::JobState;

    #[test]
    fn test_format_report() {
        let report = SyncReport {
            pulled: 3,
            merged: 4,
            pushed: 1,
            push_failures: 0,
        };
        assert_eq!(
            format_report(&report),
            "Pulled 3, merged 4, pushed 1, failed 0"
        );
    }

    #[test]
    fn test_format_job() {
        assert_eq!(format_job(None), "none");
        let info = JobInfo {
            state: JobState::Enqueued,
            attempts: 2,
        };
        assert_eq!(format_job(Some(info)), "enqueued (attempt 2)");
    }
}
