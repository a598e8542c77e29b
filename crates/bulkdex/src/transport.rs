//! 🔌 Transports: the thing that actually carries a bulk payload somewhere.
//!
//! Transports are I/O and nothing else. They do not buffer, classify, or retry. They take
//! a fully rendered NDJSON payload, send it, and hand back either per-item results or a
//! whole-request [`TransportError`].
//!
//! Same shape as the rest of the crate: trait → concrete impls → enum dispatcher resolved
//! from config.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;

pub mod elasticsearch;
pub mod in_mem;
mod response;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchTransport, RequestCompression};
pub use in_mem::InMemoryTransport;
pub use response::{BulkItemError, BulkItemResult, BulkResponse};

/// 📡 Submits one bulk payload and reports what happened to each document in it.
///
/// # Contract 📜
/// - `Ok(response)` means the request completed and produced a decodable bulk response.
/// - `Err(..)` means no per-item detail exists: connection trouble, a whole-request
///   error status, or a body that is not a bulk response.
/// - Never retries. Never buffers.
#[async_trait]
pub trait BulkTransport: std::fmt::Debug + Send + Sync {
    async fn submit(&self, payload: Vec<u8>) -> Result<BulkResponse, TransportError>;
}

/// 🔧 Which transport to build, as written in config.
///
/// ```toml
/// [transport.Elasticsearch]
/// url = "http://localhost:9200"
/// ```
/// or, for a dry run that talks to nobody:
/// ```toml
/// transport = "InMemory"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum TransportConfig {
    Elasticsearch(ElasticsearchConfig),
    InMemory,
}

/// 🎭 The many faces of a transport, dispatched by match.
#[derive(Debug, Clone)]
pub enum TransportBackend {
    Elasticsearch(ElasticsearchTransport),
    InMemory(InMemoryTransport),
}

impl TransportBackend {
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        match config {
            TransportConfig::Elasticsearch(es) => Ok(Self::Elasticsearch(
                ElasticsearchTransport::new(es.clone())?,
            )),
            TransportConfig::InMemory => Ok(Self::InMemory(InMemoryTransport::new())),
        }
    }

    /// 🏓 Make sure somebody is listening before we start producing.
    pub async fn ping(&self) -> Result<(), TransportError> {
        match self {
            Self::Elasticsearch(es) => es.ping().await,
            Self::InMemory(_) => Ok(()),
        }
    }
}

#[async_trait]
impl BulkTransport for TransportBackend {
    async fn submit(&self, payload: Vec<u8>) -> Result<BulkResponse, TransportError> {
        match self {
            Self::Elasticsearch(es) => es.submit(payload).await,
            Self::InMemory(mem) => mem.submit(payload).await,
        }
    }
}
