//! ⚖️ Classification: turning bulk results into verdicts and verdicts into counters.
//!
//! | what came back | verdict | counter |
//! |---|---|---|
//! | item 2xx | `Success` | indexed |
//! | item 429 | `Retry` | retried + too_many_requests |
//! | item 400/409 with a known benign error type | `Benign` | benign |
//! | any other item status | `PermanentFailure` | failed |
//! | whole request failed, retryable | (batch) | retried × n |
//! | whole request failed, not retryable | (batch) | failed × n |
//!
//! Everything here is pure. Logging happens in the worker that owns the flush.

use crate::error::TransportError;
use crate::transport::{BulkItemError, BulkItemResult, BulkResponse};

/// 🤝 Error types that mean "already there", not "broken".
///
/// A `create` for a document that already exists comes back as a version conflict.
/// With at-least-once producers upstream, that is business as usual.
pub const KNOWN_BENIGN_ERROR_TYPES: &[&str] = &["version_conflict_engine_exception"];

/// 📚 Remediation hint attached to benign-condition log records.
pub const KNOWN_ISSUES_HINT: &str =
    "check the \"Known issues\" section of Elasticsearch Exporter docs";

/// 🎯 The verdict for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Retry,
    Benign,
    PermanentFailure,
}

/// 🧮 Tally of one flush attempt, in the same shape as the stats counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub indexed: u64,
    pub failed: u64,
    pub retried: u64,
    pub too_many_requests: u64,
    pub benign: u64,
}

/// 📋 A classified response: per-item verdicts plus the tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseVerdict {
    pub report: FlushReport,
    /// verdicts for the first `min(items, doc_count)` items, in request order
    pub outcomes: Vec<ItemOutcome>,
    /// documents the response never mentioned; counted as failed
    pub missing: usize,
}

pub fn is_known_benign(error: Option<&BulkItemError>) -> bool {
    error.is_some_and(|error| KNOWN_BENIGN_ERROR_TYPES.contains(&error.kind.as_str()))
}

/// ⚖️ Classify one item.
pub fn classify_item(item: &BulkItemResult) -> ItemOutcome {
    match item.status {
        200..=299 => ItemOutcome::Success,
        429 => ItemOutcome::Retry,
        400 | 409 if is_known_benign(item.error.as_ref()) => ItemOutcome::Benign,
        _ => ItemOutcome::PermanentFailure,
    }
}

/// 📋 Classify a whole response for a batch of `doc_count` documents.
pub fn classify_response(response: &BulkResponse, doc_count: usize) -> ResponseVerdict {
    let mut report = FlushReport::default();
    let outcomes: Vec<ItemOutcome> = response
        .items
        .iter()
        .take(doc_count)
        .map(|item| {
            let outcome = classify_item(item);
            report.record(outcome);
            outcome
        })
        .collect();

    let missing = doc_count.saturating_sub(outcomes.len());
    report.failed += missing as u64;

    ResponseVerdict {
        report,
        outcomes,
        missing,
    }
}

impl FlushReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success => self.indexed += 1,
            ItemOutcome::Retry => {
                self.retried += 1;
                self.too_many_requests += 1;
            }
            ItemOutcome::Benign => self.benign += 1,
            ItemOutcome::PermanentFailure => self.failed += 1,
        }
    }

    /// 💥 Every document in the batch shares the fate of the request.
    pub fn for_transport_failure(error: &TransportError, doc_count: usize) -> Self {
        let doc_count = doc_count as u64;
        if error.is_retryable() {
            Self {
                retried: doc_count,
                too_many_requests: u64::from(error.is_too_many_requests()),
                ..Self::default()
            }
        } else {
            Self {
                failed: doc_count,
                ..Self::default()
            }
        }
    }

    /// 🎯 Documents accounted for by this report.
    pub fn settled(&self) -> u64 {
        self.indexed + self.failed + self.retried + self.benign
    }
}
