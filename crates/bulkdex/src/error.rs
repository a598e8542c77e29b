//! 💀 Errors: the taxonomy of things that go wrong on the way to `_bulk`.
//!
//! Two families live here, and they never meet at parties:
//!
//! - **Admission errors** ([`IndexerError`]) come back synchronously from `Session::add`,
//!   `start_session` and `close`. The producer caused them, or is at least present for them.
//! - **Transport errors** ([`TransportError`]) describe a whole bulk request going sideways.
//!   Those are never returned to a producer. The worker logs them, bumps a counter, moves on.
//!
//! [`ExportError`] sits on top of the first family and sums up one export call.
//!
//! Per-item rejections are not errors at all here. They are outcomes, see `classify`. 🦆

use thiserror::Error;

/// 🚫 Everything a caller of the indexer can be told "no" about.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// 📦 The document could not be framed as a bulk (header, body) pair.
    /// Caller's fault, fails fast, no buffer was touched.
    #[error("document could not be framed for the bulk request: {0}")]
    Serialization(String),

    /// 🔒 Shutdown already began. The doors are locked, the chairs are on the tables.
    #[error("bulk indexer is closed")]
    Closed,

    /// 🛑 The caller's cancellation fired while waiting for a queue slot.
    #[error("document admission was cancelled")]
    Cancelled,

    /// ⏱️ `close` gave up waiting. In-flight flushes keep going on their own tasks.
    #[error("bulk indexer drain timed out with {unfinished_workers} worker(s) still flushing")]
    DrainTimeout { unfinished_workers: usize },

    /// 🔧 The config asked for something impossible, like zero workers.
    #[error("invalid bulk indexer configuration: {0}")]
    Config(String),

    /// 💥 A worker task died in a way that was not a flush outcome (panic, runtime shutdown).
    #[error("bulk indexer worker failed: {0}")]
    Worker(String),
}

impl IndexerError {
    pub(crate) fn serialization(what: impl std::fmt::Display) -> Self {
        IndexerError::Serialization(what.to_string())
    }
}

/// 📡 A bulk request that failed as a whole: no per-item results exist.
#[derive(Debug, Error)]
pub enum TransportError {
    /// 🔌 Connection refused, TLS drama, timeout. The request never got an answer.
    #[error("bulk request could not be sent: {0}")]
    Request(#[from] reqwest::Error),

    /// 🧾 The cluster answered, but with a non-2xx status for the whole request.
    #[error("bulk request rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 🤷 The cluster answered 2xx with something that is not a bulk response.
    #[error("bulk response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    /// 🗜️ Building the request body failed before anything hit the wire.
    #[error("bulk request body could not be encoded: {0}")]
    Encode(#[from] std::io::Error),
}

impl TransportError {
    /// 🔄 Whether the whole batch counts as retry-class rather than a permanent failure.
    ///
    /// Connection failures, unreadable responses, 429 and 5xx are transient from where we stand.
    /// Any other status for the whole request means the request itself was wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(_) | TransportError::Decode(_) => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Encode(_) => false,
        }
    }

    /// 🐢 True when the cluster explicitly told us to slow down.
    pub fn is_too_many_requests(&self) -> bool {
        matches!(self, TransportError::Status { status: 429, .. })
    }
}

/// 📤 What an export call reports back about the records it was handed.
#[derive(Debug, Error)]
pub enum ExportError {
    /// 🛑 The caller's token fired mid-export. Records accepted before that still get indexed.
    #[error("export was cancelled after {accepted} record(s) were accepted")]
    Cancelled { accepted: usize },

    /// 🔒 The indexer stopped accepting documents.
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// 🧺 Some records could not be encoded or framed. The rest were accepted.
    #[error("{} of {total} record(s) were rejected: {}", .messages.len(), .messages.join("; "))]
    Rejected { total: usize, messages: Vec<String> },
}
