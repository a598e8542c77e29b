//! 🧵 Workers: the ones who actually carry the bulk requests while the indexer takes the credit.
//!
//! ⚠️ Private to the indexer. Producers talk to sessions, sessions talk to the queue, and the
//! queue is the only thing a worker listens to besides the clock and the shutdown bell.

use tokio::task::JoinHandle;

use crate::error::IndexerError;

mod flush_worker;
pub(super) use flush_worker::{FlushThresholds, FlushWorker};

/// 🏗️ A background worker, that does work. duh.
pub(super) trait Worker {
    /// 🚀 Spawn onto the runtime. The handle resolves once the worker has drained and exited.
    fn start(self) -> JoinHandle<Result<(), IndexerError>>;
}
