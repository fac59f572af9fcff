use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Tunables for one reconciliation run. Passed explicitly into the pipeline
/// constructor; there is no process-global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of variant groups reconciled concurrently per batch.
    pub batch_size: usize,
    /// Fixed pause between batches, to respect remote rate limits.
    pub inter_batch_delay_ms: u64,
    /// Retry ceiling for transport failures on remote calls.
    pub retry_count: u32,
    /// Base delay for the capped exponential backoff (base * 2^(attempt-1)).
    pub retry_base_delay_ms: u64,
    /// Cache search query results for the duration of the run.
    pub cache_enabled: bool,
    /// Remove remote products whose mapping is no longer present in the feed.
    pub auto_delete: bool,
    /// Optional cap on groups processed in a single run.
    pub max_groups: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            inter_batch_delay_ms: 1000,
            retry_count: 3,
            retry_base_delay_ms: 500,
            cache_enabled: true,
            auto_delete: false,
            max_groups: None,
        }
    }
}

impl SyncConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn trace_loaded(&self) {
        info!(
            batch_size = self.batch_size,
            retry_count = self.retry_count,
            auto_delete = self.auto_delete,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
