//! Tunables for the sync engine and its background jobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sync engine settings.
///
/// Every field is optional when deserializing; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Delay after the first failed retry attempt; doubles per attempt.
    pub retry_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Attempts a retry job makes before giving up.
    pub max_attempts: u32,
    pub periodic_interval_secs: u64,
    pub periodic_initial_delay_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_backoff_secs: 30,
            max_backoff_secs: 5 * 60 * 60,
            max_attempts: 3,
            periodic_interval_secs: 15 * 60,
            periodic_initial_delay_secs: 5 * 60,
        }
    }
}

impl SyncSettings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_secs)
    }

    pub fn periodic_initial_delay(&self) -> Duration {
        Duration::from_secs(self.periodic_initial_delay_secs)
    }
}
