//! 📄 Documents and their bulk framing.
//!
//! A [`Document`] is what a producer hands over: a target index, an opaque JSON body, and a
//! little optional metadata. A [`BulkEntry`] is the same document after it has been dressed
//! for the `_bulk` API: one action line, one body line, both guaranteed newline-free.
//!
//! ```text
//! {"create":{"_index":"logs-generic-default","_id":"abc"}}
//! {"@timestamp":"2026-10-19T03:47:00Z","message":"the cluster is fine. probably."}
//! ```
//!
//! Framing is the only step where a document can be refused as malformed, and it happens
//! before anything touches a buffer.

use memchr::memchr2;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::IndexerError;

/// 🎬 Which bulk operation each document is sent with.
///
/// `create` is the default because data streams only accept `create`, and a duplicate
/// `create` is exactly the version conflict that `classify` treats as benign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    #[default]
    Create,
    Index,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Create => "create",
            BulkAction::Index => "index",
        }
    }
}

/// 🏷️ Optional per-document action metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// `_id`; absent means the cluster picks one.
    pub id: Option<String>,
    /// Ingest pipeline to run on the way in.
    pub pipeline: Option<String>,
    /// Shard routing key.
    pub routing: Option<String>,
}

/// 📦 One already-serialized document bound for one index.
#[derive(Debug, Clone)]
pub struct Document {
    pub index: String,
    pub body: Vec<u8>,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(index: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            index: index.into(),
            body: body.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 🎁 A framed (action header, body) pair, ready to be appended to a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEntry {
    pub(crate) index: String,
    pub(crate) header: String,
    pub(crate) body: Vec<u8>,
}

impl BulkEntry {
    /// 🔧 Build the action line and normalize the body into a single compact JSON line.
    ///
    /// Fails with [`IndexerError::Serialization`] when the index is empty or the body is not a
    /// single JSON object.
    pub fn frame(
        action: BulkAction,
        index: &str,
        body: Vec<u8>,
        metadata: &DocumentMetadata,
    ) -> Result<Self, IndexerError> {
        if index.is_empty() {
            return Err(IndexerError::serialization("document has no target index"));
        }

        let header = action_header(action, index, metadata)?;
        let body = single_line_body(body)?;

        Ok(Self {
            index: index.to_string(),
            header,
            body,
        })
    }

    /// 📏 Bytes this entry occupies in a bulk payload, both newlines included.
    pub fn encoded_len(&self) -> usize {
        self.header.len() + self.body.len() + 2
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

fn action_header(
    action: BulkAction,
    index: &str,
    metadata: &DocumentMetadata,
) -> Result<String, IndexerError> {
    // 🏗️ absent fields are omitted, not nulled. the cluster fills in what we leave out.
    let mut the_action_metadata = serde_json::Map::new();
    the_action_metadata.insert(
        "_index".to_string(),
        serde_json::Value::String(index.to_string()),
    );
    if let Some(ref id) = metadata.id {
        the_action_metadata.insert("_id".to_string(), serde_json::Value::String(id.clone()));
    }
    if let Some(ref pipeline) = metadata.pipeline {
        the_action_metadata.insert(
            "pipeline".to_string(),
            serde_json::Value::String(pipeline.clone()),
        );
    }
    if let Some(ref routing) = metadata.routing {
        the_action_metadata.insert(
            "routing".to_string(),
            serde_json::Value::String(routing.clone()),
        );
    }

    let mut the_envelope = serde_json::Map::new();
    the_envelope.insert(
        action.as_str().to_string(),
        serde_json::Value::Object(the_action_metadata),
    );
    serde_json::to_string(&the_envelope).map_err(IndexerError::serialization)
}

fn single_line_body(body: Vec<u8>) -> Result<Vec<u8>, IndexerError> {
    if body.is_empty() {
        return Err(IndexerError::serialization("document body is empty"));
    }

    // 🔍 fast path: already one line, just make sure it is exactly one JSON object
    if memchr2(b'\n', b'\r', &body).is_none() {
        let raw: &RawValue = serde_json::from_slice(&body).map_err(IndexerError::serialization)?;
        if !raw.get().starts_with('{') {
            return Err(IndexerError::serialization(
                "document body must be a JSON object",
            ));
        }
        return Ok(body);
    }

    // 🧹 pretty-printed input: re-encode compactly so the newlines stop tearing NDJSON apart.
    // key order follows serde_json's map, which is fine for the cluster.
    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(IndexerError::serialization)?;
    if !value.is_object() {
        return Err(IndexerError::serialization(
            "document body must be a JSON object",
        ));
    }
    serde_json::to_vec(&value).map_err(IndexerError::serialization)
}
