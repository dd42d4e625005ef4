use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use linetally::render::BatchRenderer;
use linetally::{BatchConfig, BatchError, BatchProcessor, Classification, Record};

fn sample_records(n: u64) -> Vec<Record> {
    (1..=n)
        .map(|i| {
            if i % 10 == 0 {
                Record::new(i, "error")
            } else {
                Record::new(i, format!("request {} served in {}ms", i, i % 97))
            }
        })
        .collect()
}

fn classification_of(record: &Record) -> Classification {
    if record.text == "error" {
        Classification::Marker
    } else {
        Classification::Normal
    }
}

fn bench_render_buffered(c: &mut Criterion) {
    let records = sample_records(1_000);
    let payload: usize = records.iter().map(|r| r.raw_len).sum();
    c.bench_function("render_buffered", |b| {
        b.iter(|| {
            let mut renderer = BatchRenderer::with_capacity(records.len(), payload);
            for record in &records {
                renderer.push(record, &classification_of(record));
            }
            black_box(renderer.finish());
        });
    });
}

fn bench_render_naive(c: &mut Criterion) {
    let records = sample_records(1_000);
    c.bench_function("render_naive_concat", |b| {
        b.iter(|| {
            let mut out = String::new();
            for record in &records {
                let line = match classification_of(record) {
                    Classification::Marker => {
                        format!("error detected at line {}\n", record.ordinal)
                    }
                    _ => format!("processing {}\n", record.text),
                };
                out = out + &line;
            }
            black_box(out);
        });
    });
}

fn bench_process_concurrency(c: &mut Criterion) {
    let records = sample_records(50_000);
    let mut group = c.benchmark_group("process");
    for workers in [1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                let mut config = BatchConfig::default();
                config.performance.concurrency = w;
                let input: Vec<Result<Record, BatchError>> =
                    records.iter().cloned().map(Ok).collect();
                let outcome = BatchProcessor::new(config)
                    .process(input.into_iter())
                    .expect("benchmark input is well formed");
                black_box(outcome.summary.records);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_render_buffered,
    bench_render_naive,
    bench_process_concurrency
);
criterion_main!(benches);
