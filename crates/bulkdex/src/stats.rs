//! 📊 Stats: five atomic counters and a snapshot type for whoever is emitting metrics.
//!
//! Owned by one indexer instance and shared with its workers through an `Arc`.
//! There is no process-wide singleton. Two indexers, two scoreboards.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::classify::FlushReport;

/// 🧮 Monotonic counters, written by any worker, read by anyone.
#[derive(Debug, Default)]
pub struct BulkIndexerStats {
    docs_indexed: AtomicU64,
    docs_failed: AtomicU64,
    docs_retried: AtomicU64,
    too_many_requests: AtomicU64,
    docs_benign: AtomicU64,
}

/// 📸 A point-in-time copy of [`BulkIndexerStats`].
///
/// Each field is read atomically, the set as a whole is not. Good enough for dashboards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub docs_indexed: u64,
    pub docs_failed: u64,
    pub docs_retried: u64,
    pub too_many_requests: u64,
    pub docs_benign: u64,
}

impl BulkIndexerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// ➕ Fold one flush's tally into the running totals.
    pub(crate) fn record(&self, report: &FlushReport) {
        // -- Relaxed is fine: every counter stands alone, nobody reads two and expects a relationship
        self.docs_indexed.fetch_add(report.indexed, Ordering::Relaxed);
        self.docs_failed.fetch_add(report.failed, Ordering::Relaxed);
        self.docs_retried.fetch_add(report.retried, Ordering::Relaxed);
        self.too_many_requests
            .fetch_add(report.too_many_requests, Ordering::Relaxed);
        self.docs_benign.fetch_add(report.benign, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            docs_indexed: self.docs_indexed.load(Ordering::Relaxed),
            docs_failed: self.docs_failed.load(Ordering::Relaxed),
            docs_retried: self.docs_retried.load(Ordering::Relaxed),
            too_many_requests: self.too_many_requests.load(Ordering::Relaxed),
            docs_benign: self.docs_benign.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// 🎯 Documents that reached a terminal outcome of any kind.
    pub fn total_settled(&self) -> u64 {
        self.docs_indexed + self.docs_failed + self.docs_retried + self.docs_benign
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_reports_pile_up_like_laundry() {
        let stats = BulkIndexerStats::new();
        stats.record(&FlushReport {
            indexed: 3,
            failed: 1,
            retried: 2,
            too_many_requests: 1,
            benign: 0,
        });
        stats.record(&FlushReport {
            indexed: 1,
            benign: 4,
            ..FlushReport::default()
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.docs_indexed, 4);
        assert_eq!(snapshot.docs_failed, 1);
        assert_eq!(snapshot.docs_retried, 2);
        assert_eq!(snapshot.too_many_requests, 1);
        assert_eq!(snapshot.docs_benign, 4);
        assert_eq!(snapshot.total_settled(), 11);
    }

    #[test]
    fn the_one_where_two_indexers_do_not_share_a_scoreboard() {
        let left = BulkIndexerStats::new();
        let right = BulkIndexerStats::new();
        left.record(&FlushReport {
            indexed: 7,
            ..FlushReport::default()
        });
        assert_eq!(left.snapshot().docs_indexed, 7);
        assert_eq!(right.snapshot(), StatsSnapshot::default());
    }
}
