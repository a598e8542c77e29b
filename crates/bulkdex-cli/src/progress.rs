//! 📊 progress.rs: "are we there yet?", answered with a spinner and a comfy table.
//!
//! The input is a stream, so there is no total and no ETA. What we can show is how fast
//! records are going in and what the cluster has said about them so far.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bulkdex::StatsSnapshot;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

const MIB: f64 = 1024.0 * 1024.0;

// sliding window for rates, so one slow flush does not make the numbers jump around
const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 🔢 Digits grouped in threes: 1234567 reads as 1,234,567.
fn grouped(n: u64) -> String {
    let digits = n.to_string();
    digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|group| std::str::from_utf8(group).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

/// ⏱️ Largest units only: "42s", "3m 07s", "1h 01m 01s".
fn spoken_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, s) => format!("{h}h {m:02}m {s:02}s"),
    }
}

fn right(text: impl Into<String>) -> Cell {
    Cell::new(text.into()).set_alignment(CellAlignment::Right)
}

/// 📡 Records in, plus whatever the indexer has settled, redrawn on a spinner.
pub(crate) struct ExportProgress {
    source_name: String,
    total_records: u64,
    total_bytes: u64,
    spinner: ProgressBar,
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ExportProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- ProgressBar has no Debug, and printing a terminal widget is not useful anyway
        f.debug_struct("ExportProgress")
            .field("source_name", &self.source_name)
            .field("total_records", &self.total_records)
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl ExportProgress {
    pub(crate) fn new(source_name: String) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            source_name,
            total_records: 0,
            total_bytes: 0,
            spinner,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Count a batch of records handed to the exporter and redraw.
    pub(crate) fn update(&mut self, records: u64, bytes: u64, stats: StatsSnapshot) {
        self.total_records += records;
        self.total_bytes += bytes;
        let (records_per_sec, mib_per_sec) = self.rates();
        self.render(records_per_sec, mib_per_sec, stats);
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub(crate) fn total_records(&self) -> u64 {
        self.total_records
    }

    fn rates(&mut self) -> (f64, f64) {
        let now = Instant::now();
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.total_bytes, self.total_records));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_bytes, oldest_records)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed <= 0.0 {
                    return (0.0, 0.0);
                }
                let records_delta = self.total_records.saturating_sub(oldest_records);
                let bytes_delta = self.total_bytes.saturating_sub(oldest_bytes);
                (
                    records_delta as f64 / elapsed,
                    bytes_delta as f64 / elapsed / MIB,
                )
            }
            None => (0.0, 0.0),
        }
    }

    fn render(&self, records_per_sec: f64, mib_per_sec: f64, stats: StatsSnapshot) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            right(format!("{} Records/s", grouped(records_per_sec as u64))),
            right(format!("{} Records", grouped(self.total_records))),
        ]);
        table.add_row(vec![
            right(format!("{:.2} MiB/s", mib_per_sec)),
            right(format!("{:.2} MiB", self.total_bytes as f64 / MIB)),
        ]);
        table.add_row(vec![
            right(format!("{} indexed", grouped(stats.docs_indexed))),
            right(format!("{} failed", grouped(stats.docs_failed))),
        ]);
        table.add_row(vec![
            right(format!("{} elapsed", spoken_duration(self.elapsed()))),
            right(format!("{} retried", grouped(stats.docs_retried))),
        ]);
        self.spinner
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}

/// 🏁 The end-of-run report card.
pub(crate) fn summary_table(stats: &StatsSnapshot, rejected: u64, elapsed: Duration) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Outcome", "Documents"]);
    let rows = [
        ("indexed", stats.docs_indexed),
        ("failed", stats.docs_failed),
        ("retried", stats.docs_retried),
        ("benign", stats.docs_benign),
        ("too many requests", stats.too_many_requests),
        ("rejected before queueing", rejected),
    ];
    for (label, count) in rows {
        table.add_row(vec![Cell::new(label), right(grouped(count))]);
    }
    table.add_row(vec![
        Cell::new("elapsed"),
        right(spoken_duration(elapsed)),
    ]);
    table
}
