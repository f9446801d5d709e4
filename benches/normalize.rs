//! Header normalization and row materialization on wide and tall tabs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sheet_import::ingestion::{classify, materialize_rows, normalize_headers};
use sheet_import::types::TabFeatures;

/// A header row where every third name repeats and every tenth is blank.
fn header(width: usize) -> Vec<String> {
    (0..width)
        .map(|i| match i {
            i if i % 10 == 0 => String::new(),
            i if i % 3 == 0 => "dup".to_string(),
            i => format!("col{i}"),
        })
        .collect()
}

fn data(rows: usize, width: usize) -> Vec<Vec<String>> {
    (0..rows)
        .map(|r| (0..width).map(|c| format!("{r}:{c}")).collect())
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_headers");
    for width in [10, 100, 1000] {
        let raw = header(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &raw, |b, raw| {
            b.iter(|| normalize_headers(black_box(raw)))
        });
    }
    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize_rows");
    for rows in [10, 1000, 10_000] {
        let names = normalize_headers(&header(20));
        let values = data(rows, 20);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &values, |b, values| {
            b.iter(|| materialize_rows(black_box(values), &names, 1000))
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let features = TabFeatures {
        has_merges: true,
        ..Default::default()
    };
    let values = data(1000, 20);
    c.bench_function("classify_merged_1000x20", |b| {
        b.iter(|| classify(black_box(&features), black_box(&values), 0.5))
    });
}

criterion_group!(benches, bench_normalize, bench_materialize, bench_classify);
criterion_main!(benches);
