//! 🧠 An in-memory transport: remembers every payload, answers with whatever you script.
//!
//! No network calls. No disk I/O. Used by the test suite and by `transport = "InMemory"`
//! dry runs. By default every document comes back `201 create`, which is the happiest
//! cluster you will ever meet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BulkItemResult, BulkResponse, BulkTransport};
use crate::error::TransportError;

type Responder = Arc<dyn Fn(&[u8]) -> Result<BulkResponse, TransportError> + Send + Sync>;

/// 📦 A transport that never forgets.
///
/// Clone-able so tests can keep a handle after giving one to the indexer. All clones share
/// the same `received` log.
#[derive(Clone)]
pub struct InMemoryTransport {
    /// 🔒 Every payload submitted, in submission order.
    pub received: Arc<Mutex<Vec<Vec<u8>>>>,
    responder: Responder,
    latency: Option<Duration>,
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- the responder is a closure and closures keep their secrets
        f.debug_struct("InMemoryTransport")
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(|payload: &[u8]| {
                let items = payload_targets(payload)
                    .iter()
                    .map(|index| BulkItemResult::new("create", index, 201))
                    .collect();
                Ok(BulkResponse {
                    errors: false,
                    items,
                })
            }),
            latency: None,
        }
    }

    /// 🎭 Script the answer to every submission.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[u8]) -> Result<BulkResponse, TransportError> + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// 🐢 Pretend the network is slow.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 📸 Copy of every payload received so far.
    pub async fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().await.clone()
    }

    /// 📄 Total documents across every payload received so far.
    pub async fn documents_received(&self) -> usize {
        self.received
            .lock()
            .await
            .iter()
            .map(|payload| payload_targets(payload).len())
            .sum()
    }
}

/// 🔍 Target index of every (header, body) pair in an NDJSON bulk payload.
///
/// Headers that do not parse still count as a document, with an empty index.
pub fn payload_targets(payload: &[u8]) -> Vec<String> {
    payload
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.is_empty())
        .step_by(2)
        .map(|header| {
            serde_json::from_slice::<serde_json::Value>(header)
                .ok()
                .and_then(|value| {
                    value.as_object().and_then(|envelope| {
                        envelope
                            .values()
                            .next()
                            .and_then(|meta| meta.get("_index"))
                            .and_then(|index| index.as_str())
                            .map(str::to_string)
                    })
                })
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl BulkTransport for InMemoryTransport {
    async fn submit(&self, payload: Vec<u8>) -> Result<BulkResponse, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let answer = (self.responder)(&payload);
        // 🔒 recorded whatever the answer, the payload did leave the building
        self.received.lock().await.push(payload);
        answer
    }
}
