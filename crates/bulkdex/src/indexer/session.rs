//! 🎫 Sessions: a producer's handle on the indexer, with its own cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::IndexerShared;
use crate::document::{BulkEntry, Document, DocumentMetadata};
use crate::error::IndexerError;

/// 📥 Submits documents to the indexer's queue.
///
/// Cheap to create, one per producer or per request. Dropping a session releases nothing
/// but its references; documents already accepted are the indexer's problem now.
#[derive(Debug, Clone)]
pub struct Session {
    shared: Arc<IndexerShared>,
    cancel: CancellationToken,
}

impl Session {
    pub(super) fn new(shared: Arc<IndexerShared>, cancel: CancellationToken) -> Self {
        Self { shared, cancel }
    }

    /// ➕ Frame one document and hand it to the worker pool.
    ///
    /// Waits while the queue is full. `Ok(())` means accepted: the document will be
    /// flushed and counted in stats, whatever the cluster thinks of it.
    ///
    /// # Errors
    /// - [`IndexerError::Closed`] once the indexer is closing or closed
    /// - [`IndexerError::Cancelled`] when this session's token fires before a slot frees up
    /// - [`IndexerError::Serialization`] when the body is not a single JSON object
    pub async fn add(
        &self,
        index: &str,
        body: impl Into<Vec<u8>>,
        metadata: &DocumentMetadata,
    ) -> Result<(), IndexerError> {
        if self.shared.is_closed() {
            return Err(IndexerError::Closed);
        }
        if self.cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        let entry = BulkEntry::frame(self.shared.action, index, body.into(), metadata)?;
        trace!("📥 queueing {} bytes for {}", entry.encoded_len(), index);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IndexerError::Cancelled),
            sent = self.shared.tx.send(entry) => sent.map_err(|_| IndexerError::Closed),
        }
    }

    /// ➕ [`add`](Self::add) for an owned [`Document`].
    pub async fn add_document(&self, document: Document) -> Result<(), IndexerError> {
        self.add(&document.index, document.body, &document.metadata)
            .await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::indexer::{AsyncBulkIndexer, FlushSettings, IndexerConfig};
    use crate::transport::InMemoryTransport;

    // one worker stuck in a slow flush plus a one-slot queue: the third add has to wait
    fn jammed_indexer(transport: InMemoryTransport) -> Result<AsyncBulkIndexer, IndexerError> {
        AsyncBulkIndexer::new(
            IndexerConfig {
                num_workers: 1,
                queue_capacity: Some(1),
                flush: FlushSettings {
                    max_bytes: 1,
                    interval_ms: 0,
                    max_docs: None,
                },
                ..IndexerConfig::default()
            },
            Arc::new(transport.with_latency(Duration::from_secs(2))),
        )
    }

    #[tokio::test]
    async fn the_one_where_a_cancelled_session_stops_waiting() -> Result<(), IndexerError> {
        let indexer = jammed_indexer(InMemoryTransport::new())?;
        let cancel = CancellationToken::new();
        let session = indexer.start_session(cancel.clone())?;
        let meta = DocumentMetadata::default();

        session.add("foo", r#"{"n":1}"#, &meta).await?;
        // let the worker pick up the first doc and get stuck flushing it
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.add("foo", r#"{"n":2}"#, &meta).await?;

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let blocked = session.add("foo", r#"{"n":3}"#, &meta).await;
        assert!(matches!(blocked, Err(IndexerError::Cancelled)));
        assert!(session.is_cancelled());
        canceller.await.expect("💀 canceller should not panic");

        // an already cancelled session refuses up front
        assert!(matches!(
            session.add("foo", r#"{"n":4}"#, &meta).await,
            Err(IndexerError::Cancelled)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_cancelling_one_session_leaves_the_others_alone()
    -> Result<(), IndexerError> {
        let transport = InMemoryTransport::new();
        let indexer = AsyncBulkIndexer::new(
            IndexerConfig::default(),
            Arc::new(transport.clone()),
        )?;
        let doomed = CancellationToken::new();
        let first = indexer.start_session(doomed.clone())?;
        let second = indexer.start_session(CancellationToken::new())?;

        first
            .add_document(Document::new("foo", r#"{"accepted":"before cancel"}"#))
            .await?;
        doomed.cancel();
        second
            .add_document(Document::new("foo", r#"{"still":"welcome"}"#))
            .await?;

        indexer.close(None).await?;
        assert_eq!(indexer.stats().docs_indexed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_malformed_bodies_never_reach_the_queue() -> Result<(), IndexerError> {
        let transport = InMemoryTransport::new();
        let indexer = AsyncBulkIndexer::new(
            IndexerConfig::default(),
            Arc::new(transport.clone()),
        )?;
        let session = indexer.start_session(CancellationToken::new())?;
        let meta = DocumentMetadata::default();

        for bad in ["", "not json", "[1,2,3]", "{\"a\":1}\n{\"b\":2}"] {
            assert!(
                matches!(
                    session.add("foo", bad, &meta).await,
                    Err(IndexerError::Serialization(_))
                ),
                "{bad:?} should be refused"
            );
        }
        assert!(matches!(
            session.add("", r#"{"a":1}"#, &meta).await,
            Err(IndexerError::Serialization(_))
        ));

        indexer.close(None).await?;
        assert_eq!(indexer.stats().total_settled(), 0);
        assert!(transport.received().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_metadata_rides_along_in_the_header() -> Result<(), IndexerError> {
        let transport = InMemoryTransport::new();
        let indexer = AsyncBulkIndexer::new(
            IndexerConfig::default(),
            Arc::new(transport.clone()),
        )?;
        let session = indexer.start_session(CancellationToken::new())?;
        let meta = DocumentMetadata {
            id: Some("abc".to_string()),
            pipeline: Some("geoip".to_string()),
            routing: None,
        };
        session.add("logs", r#"{"msg":"hi"}"#, &meta).await?;
        indexer.close(None).await?;

        let payloads = transport.received().await;
        let payload = String::from_utf8_lossy(&payloads[0]);
        assert_eq!(
            payload,
            "{\"create\":{\"_id\":\"abc\",\"_index\":\"logs\",\"pipeline\":\"geoip\"}}\n{\"msg\":\"hi\"}\n"
        );
        Ok(())
    }
}
