//! 🔄 Encoders: turn whatever a caller has into a [`Document`] the indexer can take.
//!
//! The indexer treats bodies as opaque bytes, so everything format-specific lives here.
//! One trait, one reference implementation for newline-delimited JSON. Bring your own for
//! anything fancier.

use serde_json::{Map, Value};

use crate::document::{Document, DocumentMetadata};
use crate::error::IndexerError;

/// 📥 Encodes one caller-side record into a document with a target index.
///
/// Implementations must be pure: same record in, same document out. The exporter calls
/// `encode` once per record and never retries it.
pub trait DocumentEncoder: Send + Sync {
    type Record;

    fn encode(&self, record: Self::Record) -> Result<Document, IndexerError>;
}

/// 📄 One JSON object per record, with optional routing keys riding inside the object.
///
/// `_index` and `_id` (string values only) are lifted out of the body into the target index
/// and the document id. Everything else passes through untouched. Records without either
/// key go to `default_index` byte-for-byte.
#[derive(Debug, Clone)]
pub struct JsonLineEncoder {
    default_index: String,
}

impl JsonLineEncoder {
    pub fn new(default_index: impl Into<String>) -> Self {
        Self {
            default_index: default_index.into(),
        }
    }
}

const INDEX_KEY: &str = "_index";
const ID_KEY: &str = "_id";

impl DocumentEncoder for JsonLineEncoder {
    type Record = String;

    fn encode(&self, record: String) -> Result<Document, IndexerError> {
        let line = record.trim();
        let mut object: Map<String, Value> = serde_json::from_str(line)
            .map_err(|err| IndexerError::serialization(format!("failed to encode record: {err}")))?;

        let index = take_string(&mut object, INDEX_KEY);
        let id = take_string(&mut object, ID_KEY);

        let body = if index.is_none() && id.is_none() {
            // nothing lifted, keep the caller's bytes as they were
            line.as_bytes().to_vec()
        } else {
            serde_json::to_vec(&object).map_err(IndexerError::serialization)?
        };

        Ok(Document::new(index.unwrap_or_else(|| self.default_index.clone()), body)
            .with_metadata(DocumentMetadata {
                id,
                ..DocumentMetadata::default()
            }))
    }
}

/// 🪝 Remove `key` only when it holds a non-empty string; other shapes stay in the body.
fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(value)) if !value.is_empty() => {}
        _ => return None,
    }
    match object.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}
