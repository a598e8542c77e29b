//! 🪣 BatchBuffer: one worker's pile of NDJSON waiting for its ride to `_bulk`.
//!
//! Bytes are laid out exactly as they will be sent, so flushing is a `mem::take` away.
//! The buffer never decides when to flush. It only reports its size and lets the owning
//! worker do the math.

use memchr::memchr2;

use crate::document::BulkEntry;
use crate::error::IndexerError;

/// 📦 Contiguous (header, body) pairs plus the bookkeeping needed to report on them.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    payload: Vec<u8>,
    /// target index per appended doc, in append order, for per-item log context
    targets: Vec<String>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            payload: Vec::with_capacity(bytes),
            targets: Vec::new(),
        }
    }

    /// ➕ Append one framed entry. Returns the new size in bytes.
    ///
    /// A line that would break NDJSON framing is refused and the buffer is left as it was.
    pub fn append(&mut self, entry: &BulkEntry) -> Result<usize, IndexerError> {
        if memchr2(b'\n', b'\r', entry.header().as_bytes()).is_some() {
            return Err(IndexerError::serialization(
                "bulk action header spans more than one line",
            ));
        }
        if memchr2(b'\n', b'\r', entry.body()).is_some() {
            return Err(IndexerError::serialization(
                "document body spans more than one line",
            ));
        }

        self.payload.reserve(entry.encoded_len());
        self.payload.extend_from_slice(entry.header().as_bytes());
        self.payload.push(b'\n');
        self.payload.extend_from_slice(entry.body());
        self.payload.push(b'\n');
        self.targets.push(entry.index().to_string());
        Ok(self.payload.len())
    }

    /// 🗑️ Forget everything. Capacity is kept for the next round.
    pub fn reset(&mut self) {
        self.payload.clear();
        self.targets.clear();
    }

    /// 🚚 Hand the payload bytes to the transport, leaving an empty payload behind.
    ///
    /// Doc count and targets stay until [`reset`](Self::reset), so the flush can still
    /// attribute per-item results.
    pub fn take_payload(&mut self) -> Vec<u8> {
        let capacity = self.payload.capacity();
        std::mem::replace(&mut self.payload, Vec::with_capacity(capacity))
    }

    /// 📄 Number of documents appended since the last reset.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 📏 Bytes currently buffered.
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    #[cfg(test)]
    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BulkAction, DocumentMetadata};

    fn entry(index: &str, body: &str) -> BulkEntry {
        BulkEntry::frame(
            BulkAction::Create,
            index,
            body.as_bytes().to_vec(),
            &DocumentMetadata::default(),
        )
        .expect("💀 test fixtures should frame cleanly")
    }

    #[test]
    fn the_one_where_size_accounting_matches_the_actual_bytes() -> Result<(), IndexerError> {
        let mut buffer = BatchBuffer::new();
        let first = entry("foo", r#"{"doc":1}"#);
        let second = entry("bar", r#"{"doc":2}"#);

        let after_first = buffer.append(&first)?;
        assert_eq!(after_first, first.encoded_len());
        let after_second = buffer.append(&second)?;
        assert_eq!(after_second, first.encoded_len() + second.encoded_len());
        assert_eq!(buffer.size_bytes(), buffer.payload().len());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.targets(), &["foo".to_string(), "bar".to_string()]);
        Ok(())
    }

    #[test]
    fn the_one_where_the_payload_is_valid_ndjson_in_append_order() -> Result<(), IndexerError> {
        let mut buffer = BatchBuffer::new();
        for n in 1..=3 {
            buffer.append(&entry("foo", &format!(r#"{{"doc":{n}}}"#)))?;
        }

        let payload = String::from_utf8(buffer.payload().to_vec()).expect("💀 utf8 please");
        assert!(payload.ends_with('\n'));
        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], r#"{"doc":1}"#);
        assert_eq!(lines[3], r#"{"doc":2}"#);
        assert_eq!(lines[5], r#"{"doc":3}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_a_sneaky_newline_leaves_no_trace() -> Result<(), IndexerError> {
        let mut buffer = BatchBuffer::new();
        buffer.append(&entry("foo", r#"{"doc":1}"#))?;
        let before = buffer.size_bytes();

        let mut sneaky = entry("foo", r#"{"doc":2}"#);
        sneaky.body = b"{\"doc\":\n2}".to_vec();
        let result = buffer.append(&sneaky);

        assert!(matches!(result, Err(IndexerError::Serialization(_))));
        assert_eq!(buffer.size_bytes(), before);
        assert_eq!(buffer.len(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_take_then_reset_leaves_an_empty_bucket() -> Result<(), IndexerError> {
        let mut buffer = BatchBuffer::with_capacity(128);
        buffer.append(&entry("foo", r#"{"doc":1}"#))?;

        let payload = buffer.take_payload();
        assert!(!payload.is_empty());
        assert_eq!(buffer.size_bytes(), 0);
        assert_eq!(buffer.len(), 1, "targets survive until reset");

        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 0);
        Ok(())
    }
}
