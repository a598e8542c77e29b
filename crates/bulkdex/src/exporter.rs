//! 📤 The exporter: encoder + indexer, wrapped into "here are some records, index them".
//!
//! One `push` is one export call: one session, every record encoded and added in order.
//! Bad records are collected and reported together at the end. A cancelled call stops at
//! the first record it could not hand over, and says so.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::encoder::DocumentEncoder;
use crate::error::{ExportError, IndexerError};
use crate::indexer::AsyncBulkIndexer;
use crate::stats::StatsSnapshot;

/// 🚚 Owns an indexer and the encoder that feeds it.
#[derive(Debug)]
pub struct BulkExporter<E> {
    indexer: AsyncBulkIndexer,
    encoder: E,
}

impl<E: DocumentEncoder> BulkExporter<E> {
    pub fn new(indexer: AsyncBulkIndexer, encoder: E) -> Self {
        Self { indexer, encoder }
    }

    /// 📤 Encode and admit every record. Returns once each one is accepted or rejected.
    ///
    /// "Accepted" means queued, not indexed: the cluster's verdict shows up in
    /// [`stats`](Self::stats), never here.
    pub async fn push<I>(&self, records: I, cancel: CancellationToken) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = E::Record>,
    {
        let session = self.indexer.start_session(cancel)?;
        let mut total = 0usize;
        let mut accepted = 0usize;
        let mut messages = Vec::new();

        for record in records {
            total += 1;
            let admitted = match self.encoder.encode(record) {
                Ok(document) => session.add_document(document).await,
                Err(err) => Err(err),
            };
            match admitted {
                Ok(()) => accepted += 1,
                Err(IndexerError::Cancelled) => {
                    debug!(accepted, "🛑 export cancelled mid-flight");
                    return Err(ExportError::Cancelled { accepted });
                }
                Err(IndexerError::Closed) => return Err(IndexerError::Closed.into()),
                Err(err) => {
                    warn!(error = %err, "🧺 record rejected");
                    messages.push(err.to_string());
                }
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ExportError::Rejected { total, messages })
        }
    }

    /// 🛑 Close the indexer and wait (up to `timeout`) for everything to drain.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), IndexerError> {
        self.indexer.close(timeout).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.indexer.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::encoder::JsonLineEncoder;
    use crate::indexer::IndexerConfig;
    use crate::transport::InMemoryTransport;

    fn exporter(transport: InMemoryTransport) -> BulkExporter<JsonLineEncoder> {
        let indexer = AsyncBulkIndexer::new(IndexerConfig::default(), Arc::new(transport))
            .expect("💀 default config should build");
        BulkExporter::new(indexer, JsonLineEncoder::new("logs-generic-default"))
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[tokio::test]
    async fn the_one_where_a_clean_batch_goes_all_the_way_through() -> Result<(), ExportError> {
        let transport = InMemoryTransport::new();
        let exporter = exporter(transport.clone());

        exporter
            .push(
                lines(&[r#"{"a":1}"#, r#"{"_index":"other","b":2}"#]),
                CancellationToken::new(),
            )
            .await?;
        exporter.shutdown(None).await?;

        assert_eq!(exporter.stats().docs_indexed, 2);
        assert_eq!(transport.documents_received().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_bad_records_are_listed_but_good_ones_still_ship()
    -> Result<(), ExportError> {
        let transport = InMemoryTransport::new();
        let exporter = exporter(transport.clone());

        let result = exporter
            .push(
                lines(&[r#"{"ok":1}"#, "not json", r#"{"ok":2}"#, "[]"]),
                CancellationToken::new(),
            )
            .await;
        match result {
            Err(ExportError::Rejected { total, messages }) => {
                assert_eq!(total, 4);
                assert_eq!(messages.len(), 2);
            }
            other => panic!("💀 expected a rejection summary, got {other:?}"),
        }

        exporter.shutdown(None).await?;
        assert_eq!(exporter.stats().docs_indexed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_cancelled_export_bails_immediately() {
        let exporter = exporter(InMemoryTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = exporter.push(lines(&[r#"{"a":1}"#]), cancel).await;
        assert!(matches!(result, Err(ExportError::Cancelled { accepted: 0 })));
    }

    #[tokio::test]
    async fn the_one_where_pushing_after_shutdown_is_refused() -> Result<(), IndexerError> {
        let exporter = exporter(InMemoryTransport::new());
        exporter.shutdown(None).await?;

        let result = exporter
            .push(lines(&[r#"{"a":1}"#]), CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(ExportError::Indexer(IndexerError::Closed))
        ));
        Ok(())
    }
}
