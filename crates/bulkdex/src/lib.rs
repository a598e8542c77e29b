//! 📦 bulkdex: an asynchronous bulk indexer for Elasticsearch-style `_bulk` endpoints.
//!
//! Producers open a [`Session`] and `add` documents. A fixed pool of workers packs them
//! into NDJSON batches, flushes each batch on size, count, timer or shutdown, and sorts
//! every per-item verdict into five counters. Producers never see flush results; they
//! see [`stats`](AsyncBulkIndexer::stats).
//!
//! ```text
//!   records ─▶ DocumentEncoder ─▶ Session::add ─▶ queue ─▶ FlushWorker ─▶ BulkTransport
//!                                                              │
//!                                                     classify ─▶ BulkIndexerStats
//! ```

pub mod app_config;
pub mod buffer;
pub mod classify;
pub mod document;
pub mod encoder;
pub mod error;
pub mod exporter;
pub mod indexer;
pub mod stats;
pub mod transport;

pub use document::{BulkAction, Document, DocumentMetadata};
pub use encoder::{DocumentEncoder, JsonLineEncoder};
pub use error::{ExportError, IndexerError, TransportError};
pub use exporter::BulkExporter;
pub use indexer::{AsyncBulkIndexer, FlushSettings, IndexerConfig, Session};
pub use stats::{BulkIndexerStats, StatsSnapshot};
pub use transport::{BulkTransport, TransportBackend, TransportConfig};
