//! 🚀 bulkdex-cli: pipe NDJSON in, get it bulk-indexed, get a report card out.
//!
//! Thin on purpose. Loads config, sets up logging, streams lines through the exporter,
//! then lets the indexer drain and prints what happened. 🦆

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bulkdex::app_config::{ExporterConfig, load_config};
use bulkdex::{
    AsyncBulkIndexer, BulkExporter, ExportError, JsonLineEncoder, TransportBackend, TransportError,
};
use clap::Parser;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::{ExportProgress, summary_table};

/// 📦 Bulk-index newline-delimited JSON into Elasticsearch.
#[derive(Debug, Parser)]
#[command(name = "bulkdex", version, about)]
struct Cli {
    /// TOML config file. Without one, config comes from BULKDEX_* env vars only.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// NDJSON input file. Reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

type InputReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// 🧮 Running totals the exporter does not keep for us.
#[derive(Debug, Default)]
struct RunTally {
    rejected: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so the summary table on stdout stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {:#}", err);
        if let Some(hint) = unreachable_cluster_hint(&err) {
            error!("🔧 hint: {}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// 🔌 A hint when the failure is the `_bulk` endpoint not answering at all.
fn unreachable_cluster_hint(err: &anyhow::Error) -> Option<&'static str> {
    let unreachable = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<TransportError>(),
            Some(TransportError::Request(request)) if request.is_connect() || request.is_timeout()
        )
    });
    unreachable.then_some(
        "nothing answered at transport.Elasticsearch.url. Start the cluster or fix the URL; \
         transport = \"InMemory\" does a dry run with no cluster at all.",
    )
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(ref path) = cli.config {
        let exists = path.try_exists().with_context(|| {
            format!("💀 Could not check whether '{}' exists", path.display())
        })?;
        anyhow::ensure!(
            exists,
            "💀 Configuration file '{}' does not exist. Relative paths resolve against the \
             current directory; an absolute path removes the guesswork.",
            path.display()
        );
    }

    let app_config = load_config(cli.config.as_deref())
        .context("💀 Could not load the configuration, see the cause below")?;

    let backend = TransportBackend::from_config(&app_config.transport)
        .context("💀 Could not build the transport")?;
    backend
        .ping()
        .await
        .context("💀 The transport did not answer the connectivity check")?;

    let indexer = AsyncBulkIndexer::new(app_config.indexer.clone(), Arc::new(backend))
        .context("💀 Could not start the bulk indexer")?;
    let exporter = BulkExporter::new(
        indexer,
        JsonLineEncoder::new(app_config.exporter.index.clone()),
    );

    let (reader, source_name) = match cli.input {
        Some(ref path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("💀 Could not open input '{}'", path.display()))?;
            (Box::new(BufReader::new(file)) as InputReader, path.display().to_string())
        }
        None => (
            Box::new(BufReader::new(tokio::io::stdin())) as InputReader,
            "stdin".to_string(),
        ),
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut progress = ExportProgress::new(source_name);
    let outcome = export_then_drain(
        reader,
        &exporter,
        &app_config.exporter,
        &cancel,
        &mut progress,
    )
    .await;
    progress.finish();
    let tally = outcome?;

    println!(
        "{}",
        summary_table(&exporter.stats(), tally.rejected, progress.elapsed())
    );
    Ok(())
}

/// 🛑 First Ctrl-C stops reading and admitting; what was accepted still drains.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 interrupted, draining what was already accepted");
            cancel.cancel();
        }
    });
}

/// 🚰 Stream every record, then drain the indexer however the streaming ended.
///
/// A streaming error outranks a drain error, but the drain always runs first.
async fn export_then_drain(
    reader: InputReader,
    exporter: &BulkExporter<JsonLineEncoder>,
    config: &ExporterConfig,
    cancel: &CancellationToken,
    progress: &mut ExportProgress,
) -> Result<RunTally> {
    let streamed = stream_records(reader, exporter, config, cancel, progress).await;
    match &streamed {
        Ok(_) => info!(
            records = progress.total_records(),
            "📤 input exhausted, draining the indexer"
        ),
        Err(err) => warn!(
            records = progress.total_records(),
            error = %err,
            "📤 input stopped early, draining the indexer anyway"
        ),
    }

    let drained = exporter
        .shutdown(config.shutdown_timeout())
        .await
        .context("💀 The indexer did not drain cleanly");
    let tally = streamed?;
    drained?;
    Ok(tally)
}

/// 📥 Read lines, hand them over `records_per_export` at a time.
async fn stream_records(
    reader: InputReader,
    exporter: &BulkExporter<JsonLineEncoder>,
    config: &ExporterConfig,
    cancel: &CancellationToken,
    progress: &mut ExportProgress,
) -> Result<RunTally> {
    let per_export = config.records_per_export.max(1);
    let mut tally = RunTally::default();
    let mut chunk = Vec::with_capacity(per_export);
    let mut chunk_bytes = 0u64;
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("🛑 Interrupted before the input ran out"),
            line = lines.next_line() => line.context("💀 Failed to read a line of input")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        chunk_bytes += line.len() as u64 + 1;
        chunk.push(line);
        if chunk.len() >= per_export {
            export_chunk(exporter, &mut chunk, cancel, &mut tally).await?;
            progress.update(per_export as u64, chunk_bytes, exporter.stats());
            chunk_bytes = 0;
        }
    }

    if !chunk.is_empty() {
        let remaining = chunk.len() as u64;
        export_chunk(exporter, &mut chunk, cancel, &mut tally).await?;
        progress.update(remaining, chunk_bytes, exporter.stats());
    }
    Ok(tally)
}

async fn export_chunk(
    exporter: &BulkExporter<JsonLineEncoder>,
    chunk: &mut Vec<String>,
    cancel: &CancellationToken,
    tally: &mut RunTally,
) -> Result<()> {
    let records = std::mem::take(chunk);
    match exporter.push(records, cancel.clone()).await {
        Ok(()) => Ok(()),
        Err(ExportError::Rejected { total, messages }) => {
            warn!(
                rejected = messages.len(),
                total, "🧺 some records in this chunk were rejected"
            );
            tally.rejected += messages.len() as u64;
            Ok(())
        }
        Err(other) => Err(other).context("💀 Export stopped early"),
    }
}
