//! 🏭 The AsyncBulkIndexer: a fixed pool of flush workers behind a bounded queue.
//!
//! ```text
//!   Session ─┐                         ┌─ FlushWorker 0 ─ BatchBuffer ─┐
//!   Session ─┼──▶ bounded queue ──────▶├─ FlushWorker 1 ─ BatchBuffer ─┼──▶ BulkTransport
//!   Session ─┘   (async-channel MPMC)  └─ FlushWorker N ─ BatchBuffer ─┘
//!                                              ▲
//!                                  shared ticker (watch) + shutdown token
//! ```
//!
//! Whoever is free pulls the next document. A document lands in exactly one buffer, each
//! buffer belongs to exactly one worker, and a worker never runs two flushes at once.
//!
//! ⚠️ The workers are private. Callers see sessions, stats, and `close`.

mod config;
mod session;
mod workers;


pub use config::{FlushSettings, IndexerConfig};
pub use session::Session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_channel::Sender;
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::document::{BulkAction, BulkEntry};
use crate::error::IndexerError;
use crate::stats::{BulkIndexerStats, StatsSnapshot};
use crate::transport::BulkTransport;
use workers::{FlushThresholds, FlushWorker, Worker};

type WorkerHandle = JoinHandle<Result<(), IndexerError>>;

/// 🔗 What every session needs from its indexer, and nothing more.
#[derive(Debug)]
pub(crate) struct IndexerShared {
    pub(crate) tx: Sender<BulkEntry>,
    pub(crate) closed: AtomicBool,
    pub(crate) action: BulkAction,
}

impl IndexerShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// 📦 The bulk indexer. Create one per target cluster, share it by reference or `Arc`.
#[derive(Debug)]
pub struct AsyncBulkIndexer {
    shared: Arc<IndexerShared>,
    stats: Arc<BulkIndexerStats>,
    shutdown: CancellationToken,
    workers: Mutex<Option<Vec<WorkerHandle>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncBulkIndexer {
    /// 🚀 Validate the config and spawn the workers (plus the ticker, if flushing on a timer).
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new(
        config: IndexerConfig,
        transport: Arc<dyn BulkTransport>,
    ) -> Result<Self, IndexerError> {
        config.validate()?;

        let (tx, rx) = async_channel::bounded(config.queue_capacity());
        let shutdown = CancellationToken::new();
        let stats = Arc::new(BulkIndexerStats::new());
        let thresholds = FlushThresholds {
            max_bytes: config.flush.max_bytes,
            max_docs: config.flush.max_docs,
        };

        let (ticks, ticker) = match config.flush.interval() {
            Some(period) => {
                let (ticks, handle) = spawn_ticker(period, shutdown.clone());
                (Some(ticks), Some(handle))
            }
            None => (None, None),
        };

        let workers = (0..config.num_workers)
            .map(|id| {
                FlushWorker::new(
                    id,
                    rx.clone(),
                    ticks.clone(),
                    shutdown.clone(),
                    thresholds,
                    transport.clone(),
                    stats.clone(),
                )
                .start()
            })
            .collect::<Vec<_>>();

        info!(
            workers = config.num_workers,
            queue_capacity = config.queue_capacity(),
            max_bytes = config.flush.max_bytes,
            interval_ms = config.flush.interval_ms,
            "🏭 bulk indexer started"
        );

        Ok(Self {
            shared: Arc::new(IndexerShared {
                tx,
                closed: AtomicBool::new(false),
                action: config.action,
            }),
            stats,
            shutdown,
            workers: Mutex::new(Some(workers)),
            ticker: Mutex::new(ticker),
        })
    }

    /// 🎫 Open a producer session bound to `cancel`.
    ///
    /// Cancelling the token aborts that session's blocked `add` calls. It does not touch
    /// documents already accepted, and it does not touch any other session.
    pub fn start_session(&self, cancel: CancellationToken) -> Result<Session, IndexerError> {
        if self.shared.is_closed() {
            return Err(IndexerError::Closed);
        }
        Ok(Session::new(self.shared.clone(), cancel))
    }

    /// 🛑 Stop accepting documents, drain every queue and buffer, wait for the workers.
    ///
    /// With `Some(timeout)` the wait is bounded. On expiry this returns
    /// [`IndexerError::DrainTimeout`]; the workers keep draining in the background and their
    /// results still reach [`stats`](Self::stats). A second call returns
    /// [`IndexerError::Closed`].
    pub async fn close(&self, timeout: Option<Duration>) -> Result<(), IndexerError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Err(IndexerError::Closed);
        }
        debug!("🛑 closing bulk indexer");

        // -- producers blocked in send wake up with an error, workers start draining
        self.shared.tx.close();
        self.shutdown.cancel();

        let mut handles = take(&self.workers).unwrap_or_default();
        let ticker = take(&self.ticker);

        let drain = async {
            if let Some(ticker) = ticker {
                // ticker panics are not worth failing close over
                let _ = ticker.await;
            }
            let mut first_failure = None;
            for joined in join_all(handles.iter_mut()).await {
                let outcome = match joined {
                    Ok(result) => result,
                    Err(join_error) => Err(IndexerError::Worker(join_error.to_string())),
                };
                if let Err(err) = outcome {
                    error!(error = %err, "💀 flush worker failed during drain");
                    first_failure.get_or_insert(err);
                }
            }
            first_failure.map_or(Ok(()), Err)
        };

        let waited = match timeout {
            None => Ok(drain.await),
            Some(limit) => tokio::time::timeout(limit, drain).await,
        };
        let Ok(result) = waited else {
            let unfinished_workers = handles.iter().filter(|h| !h.is_finished()).count();
            warn!(
                unfinished_workers,
                timeout_ms = timeout.unwrap_or_default().as_millis() as u64,
                "⏰ bulk indexer drain timed out"
            );
            return Err(IndexerError::DrainTimeout { unfinished_workers });
        };

        let snapshot = self.stats.snapshot();
        info!(
            docs_indexed = snapshot.docs_indexed,
            docs_failed = snapshot.docs_failed,
            docs_retried = snapshot.docs_retried,
            docs_benign = snapshot.docs_benign,
            "🏁 bulk indexer closed"
        );
        result
    }

    /// 📸 Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 📊 The live counters, for a metrics reporter that outlives a borrow.
    pub fn stats_handle(&self) -> Arc<BulkIndexerStats> {
        self.stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for AsyncBulkIndexer {
    fn drop(&mut self) {
        // -- dropped without close: workers still drain what they hold, nobody waits for them
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            debug!("🗑️ bulk indexer dropped without close; draining in the background");
        }
        self.shared.tx.close();
        self.shutdown.cancel();
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// ⏱️ One timer for the whole pool. Each tick bumps a counter every worker is watching.
fn spawn_ticker(
    period: Duration,
    shutdown: CancellationToken,
) -> (watch::Receiver<u64>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(0u64);
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // a slow flush should not earn a burst of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => tx.send_modify(|tick| *tick = tick.wrapping_add(1)),
            }
        }
    });
    (rx, handle)
}
