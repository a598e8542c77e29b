//! 🧪 Framing and buffering throughput: the per-document cost every producer pays.

use bulkdex::buffer::BatchBuffer;
use bulkdex::document::{BulkAction, BulkEntry, DocumentMetadata};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

const COMPACT: &str = r#"{"@timestamp":"2026-10-19T03:47:00Z","service":"checkout","level":"info","message":"order placed","order_id":1234567}"#;
const PRETTY: &str = "{\n  \"@timestamp\": \"2026-10-19T03:47:00Z\",\n  \"service\": \"checkout\",\n  \"message\": \"order placed\"\n}";

fn framing(c: &mut Criterion) {
    let metadata = DocumentMetadata {
        id: Some("doc-1".to_string()),
        ..DocumentMetadata::default()
    };

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(COMPACT.len() as u64));
    group.bench_function("compact_body", |b| {
        b.iter(|| {
            BulkEntry::frame(
                BulkAction::Create,
                black_box("logs-generic-default"),
                COMPACT.as_bytes().to_vec(),
                &metadata,
            )
        })
    });
    group.bench_function("pretty_body", |b| {
        b.iter(|| {
            BulkEntry::frame(
                BulkAction::Create,
                black_box("logs-generic-default"),
                PRETTY.as_bytes().to_vec(),
                &metadata,
            )
        })
    });
    group.finish();
}

fn appending(c: &mut Criterion) {
    let entry = BulkEntry::frame(
        BulkAction::Create,
        "logs-generic-default",
        COMPACT.as_bytes().to_vec(),
        &DocumentMetadata::default(),
    )
    .expect("💀 bench fixture should frame");

    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("1000_docs", |b| {
        b.iter_batched(
            || BatchBuffer::with_capacity(entry.encoded_len() * 1_000),
            |mut buffer| {
                for _ in 0..1_000 {
                    let _ = buffer.append(black_box(&entry));
                }
                buffer
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, framing, appending);
criterion_main!(benches);
