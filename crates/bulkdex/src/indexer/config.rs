//! 🔧 Indexer knobs: how many workers, how big a batch, how long to wait.
//!
//! ```toml
//! [indexer]
//! num_workers = 4
//! action = "create"
//!
//! [indexer.flush]
//! max_bytes = 5000000
//! interval_ms = 30000
//! max_docs = 1000
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::document::BulkAction;
use crate::error::IndexerError;

/// 📦 Everything the indexer needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    /// 🧵 Concurrent flush workers, each with its own buffer. At least 1.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// 📬 Slots in the shared document queue. Defaults to `num_workers`.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// 🎬 Bulk operation used for every document.
    #[serde(default)]
    pub action: BulkAction,
    #[serde(default)]
    pub flush: FlushSettings,
}

/// 🚽 When a worker decides its buffer has waited long enough.
#[derive(Debug, Deserialize, Clone)]
pub struct FlushSettings {
    /// 📏 Flush once a buffer holds at least this many bytes.
    #[serde(default = "default_max_bytes", alias = "bytes")]
    pub max_bytes: usize,
    /// ⏱️ Flush non-empty buffers on this period. 0 turns the timer off.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 📄 Optional extra trigger on document count.
    #[serde(default)]
    pub max_docs: Option<usize>,
}

// a small fixed pool; bulk requests are I/O bound, not CPU bound
fn default_num_workers() -> usize {
    4
}

// 5MB, the size the cluster docs keep recommending for bulk bodies
fn default_max_bytes() -> usize {
    5_000_000
}

fn default_interval_ms() -> u64 {
    30_000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            queue_capacity: None,
            action: BulkAction::default(),
            flush: FlushSettings::default(),
        }
    }
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            interval_ms: default_interval_ms(),
            max_docs: None,
        }
    }
}

impl FlushSettings {
    /// ⏱️ The timer period, or `None` when timer-triggered flushing is off.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

impl IndexerConfig {
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.num_workers)
    }

    /// 🔒 Reject configs that would build an indexer that can never flush.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.num_workers == 0 {
            return Err(IndexerError::Config(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(IndexerError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.flush.max_bytes == 0 {
            return Err(IndexerError::Config(
                "flush.max_bytes must be at least 1".to_string(),
            ));
        }
        if self.flush.max_docs == Some(0) {
            return Err(IndexerError::Config(
                "flush.max_docs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
