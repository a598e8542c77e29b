//! 🚽 The FlushWorker: owns one buffer, fills it from the shared queue, empties it into `_bulk`.
//!
//! Each loop iteration waits on three things, checked in this order when several are ready:
//!
//! 1. 🛑 shutdown: drain whatever is still queued, flush, exit
//! 2. ⏱️ timer tick: flush if there is anything to flush
//! 3. 📥 next document: append, flush if a threshold was crossed
//!
//! While a flush is in flight the worker is not pulling from the queue. That is the whole
//! backpressure story: when every worker is busy and the queue is full, producers wait.

use std::sync::Arc;

use async_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::Worker;
use crate::buffer::BatchBuffer;
use crate::classify::{FlushReport, ItemOutcome, KNOWN_ISSUES_HINT, classify_response};
use crate::document::BulkEntry;
use crate::error::IndexerError;
use crate::stats::BulkIndexerStats;
use crate::transport::{BulkResponse, BulkTransport};

/// 📏 Size and count limits that force a flush.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlushThresholds {
    pub(crate) max_bytes: usize,
    pub(crate) max_docs: Option<usize>,
}

impl FlushThresholds {
    fn reached(&self, buffer: &BatchBuffer) -> bool {
        buffer.size_bytes() >= self.max_bytes
            || self.max_docs.is_some_and(|max_docs| buffer.len() >= max_docs)
    }
}

/// Why a flush happened; only used for log context.
#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Threshold,
    Interval,
    Drain,
}

#[derive(Debug)]
pub(crate) struct FlushWorker {
    id: usize,
    rx: Receiver<BulkEntry>,
    ticks: Option<watch::Receiver<u64>>,
    shutdown: CancellationToken,
    buffer: BatchBuffer,
    thresholds: FlushThresholds,
    transport: Arc<dyn BulkTransport>,
    stats: Arc<BulkIndexerStats>,
}

impl FlushWorker {
    pub(crate) fn new(
        id: usize,
        rx: Receiver<BulkEntry>,
        ticks: Option<watch::Receiver<u64>>,
        shutdown: CancellationToken,
        thresholds: FlushThresholds,
        transport: Arc<dyn BulkTransport>,
        stats: Arc<BulkIndexerStats>,
    ) -> Self {
        Self {
            id,
            rx,
            ticks,
            shutdown,
            buffer: BatchBuffer::new(),
            thresholds,
            transport,
            stats,
        }
    }

    async fn run(mut self) -> Result<(), IndexerError> {
        debug!("📥 FlushWorker {} started", self.id);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.drain().await;
                    debug!("🏁 FlushWorker {}: drained after shutdown signal", self.id);
                    return Ok(());
                }
                tick = next_tick(&mut self.ticks) => {
                    match tick {
                        Ok(()) => self.flush(FlushTrigger::Interval).await,
                        // -- the timer went away; keep serving documents without it
                        Err(_) => self.ticks = None,
                    }
                }
                received = self.rx.recv() => {
                    match received {
                        Ok(entry) => self.append(entry).await,
                        Err(_) => {
                            // -- queue closed and empty
                            self.flush(FlushTrigger::Drain).await;
                            debug!("🏁 FlushWorker {}: queue closed, shutting down", self.id);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn append(&mut self, entry: BulkEntry) {
        match self.buffer.append(&entry) {
            Ok(_) => {
                if self.thresholds.reached(&self.buffer) {
                    self.flush(FlushTrigger::Threshold).await;
                }
            }
            Err(err) => {
                // -- sessions frame before enqueueing, so this is a framing bug rather than bad input
                error!(
                    worker = self.id,
                    index = entry.index(),
                    error = %err,
                    "💀 dropping a document the buffer refused"
                );
                self.stats.record(&FlushReport {
                    failed: 1,
                    ..FlushReport::default()
                });
            }
        }
    }

    /// 🧹 Pull everything still queued, flushing as thresholds fill, then flush the rest.
    async fn drain(&mut self) {
        while let Ok(entry) = self.rx.try_recv() {
            self.append(entry).await;
        }
        self.flush(FlushTrigger::Drain).await;
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        if self.buffer.is_empty() {
            return;
        }

        let doc_count = self.buffer.len();
        let payload = self.buffer.take_payload();
        debug!(
            "🚽 FlushWorker {} flushing {} docs ({} bytes), trigger={:?}",
            self.id,
            doc_count,
            payload.len(),
            trigger
        );

        let report = match self.transport.submit(payload).await {
            Ok(response) => self.report_items(&response, doc_count),
            Err(err) => {
                error!(
                    worker = self.id,
                    docs = doc_count,
                    retryable = err.is_retryable(),
                    error = %err,
                    "bulk indexer flush error"
                );
                FlushReport::for_transport_failure(&err, doc_count)
            }
        };

        trace!("📊 FlushWorker {} flush settled: {:?}", self.id, report);
        self.stats.record(&report);
        self.buffer.reset();
    }

    /// 🧾 Classify every item, log the unhappy ones, return the tally.
    fn report_items(&self, response: &BulkResponse, doc_count: usize) -> FlushReport {
        let verdict = classify_response(response, doc_count);

        for (position, (item, outcome)) in response
            .items
            .iter()
            .zip(verdict.outcomes.iter())
            .enumerate()
        {
            if *outcome == ItemOutcome::Success {
                continue;
            }
            let index = item
                .index
                .as_deref()
                .or_else(|| self.buffer.targets().get(position).map(String::as_str))
                .unwrap_or_default();
            let (error_type, error_reason) = item
                .error
                .as_ref()
                .map(|e| (e.kind.as_str(), e.reason.as_deref().unwrap_or_default()))
                .unwrap_or_default();

            match outcome {
                ItemOutcome::Benign => info!(
                    index,
                    status = item.status,
                    error_type,
                    error_reason,
                    hint = KNOWN_ISSUES_HINT,
                    "failed to index document"
                ),
                ItemOutcome::Retry => warn!(
                    index,
                    status = item.status,
                    error_type,
                    error_reason,
                    "failed to index document"
                ),
                _ => error!(
                    index,
                    status = item.status,
                    error_type,
                    error_reason,
                    "failed to index document"
                ),
            }
        }

        if verdict.missing > 0 {
            error!(
                worker = self.id,
                missing = verdict.missing,
                docs = doc_count,
                "💀 bulk response is missing item results; counting them as failed"
            );
        }

        verdict.report
    }
}

/// ⏱️ Resolves on the next shared tick; pends forever when there is no timer.
async fn next_tick(
    ticks: &mut Option<watch::Receiver<u64>>,
) -> Result<(), watch::error::RecvError> {
    match ticks {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

impl Worker for FlushWorker {
    fn start(self) -> JoinHandle<Result<(), IndexerError>> {
        tokio::spawn(self.run())
    }
}
