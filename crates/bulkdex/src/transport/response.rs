//! 🧾 Just enough of the `_bulk` response to know what happened to each document.
//!
//! ```json
//! {"took":30,"errors":true,"items":[
//!   {"create":{"_index":"foo","status":201}},
//!   {"create":{"_index":"foo","status":400,"error":{"type":"version_conflict_engine_exception","reason":"..."}}}
//! ]}
//! ```
//!
//! Each item is a one-key object keyed by the operation. We keep the operation name and the
//! inner result, and ignore the rest of the wire schema.

use std::collections::HashMap;

use serde::Deserialize;

/// Error type given to an item result that came back as `{}`.
pub const EMPTY_ITEM_ERROR: &str = "empty_item_result";

/// 📋 Decoded bulk response, items in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

/// 🎯 The fate of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BulkItemResult {
    /// `create`, `index`, ... Filled in from the enclosing key.
    #[serde(skip)]
    pub operation: String,
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

/// 💀 Why the cluster said no.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
struct RawBulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemResult>>,
}

impl BulkResponse {
    /// 🔍 Decode a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawBulkResponse = serde_json::from_slice(body)?;
        let items = raw
            .items
            .into_iter()
            .map(|item| match item.into_iter().next() {
                Some((operation, mut result)) => {
                    result.operation = operation;
                    result
                }
                // -- an empty object still holds its document's slot
                None => BulkItemResult::empty(),
            })
            .collect();
        Ok(Self {
            errors: raw.errors,
            items,
        })
    }

    /// ✅ A response claiming every one of `count` documents landed with `201`.
    pub fn all_created(index: &str, count: usize) -> Self {
        Self {
            errors: false,
            items: (0..count)
                .map(|_| BulkItemResult::new("create", index, 201))
                .collect(),
        }
    }
}

impl BulkItemResult {
    pub fn new(operation: &str, index: &str, status: u16) -> Self {
        Self {
            operation: operation.to_string(),
            index: Some(index.to_string()),
            status,
            error: None,
        }
    }

    /// 🕳️ Stand-in for an item object with no operation key. Status 0 is never a success.
    pub fn empty() -> Self {
        Self::default().with_error(EMPTY_ITEM_ERROR, "bulk response item carried no result")
    }

    pub fn with_error(mut self, kind: &str, reason: &str) -> Self {
        self.error = Some(BulkItemError {
            kind: kind.to_string(),
            reason: Some(reason.to_string()),
        });
        self
    }
}
