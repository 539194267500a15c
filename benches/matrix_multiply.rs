//! Benchmarks for masked sparse matrix multiplication

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use saxpy3::{AxbMethod, Mask, Saxpy3, SaxpyConfig, Semiring, SparseMatrix};
use std::hint::black_box;

/// Banded matrix with a few long-range entries per column
fn generate_banded_matrix(n: usize, band: usize) -> SparseMatrix<f64> {
    let triplets: Vec<_> = (0..n)
        .flat_map(|j| {
            let lo = j.saturating_sub(band);
            let hi = (j + band + 1).min(n);
            (lo..hi)
                .chain([(j * 7 + 3) % n, (j * 13 + 5) % n])
                .map(move |i| (i, j, 1.0 + (i + j) as f64 / n as f64))
        })
        .collect();
    SparseMatrix::from_triplets(n, n, &triplets, |x, _| *x).unwrap()
}

/// One dense column that every fine team has to share
fn generate_arrow_matrix(n: usize) -> SparseMatrix<f64> {
    let triplets: Vec<_> = (0..n).map(|i| (i, 0, 1.0)).chain((1..n).map(|j| (j, j, 2.0))).collect();
    SparseMatrix::from_triplets(n, n, &triplets, |x, _| *x).unwrap()
}

fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("method");
    let semiring = Semiring::<f64, f64, f64>::plus_times();

    for &n in &[1_000usize, 10_000] {
        let a = generate_banded_matrix(n, 4);
        let b = generate_banded_matrix(n, 4);
        for method in [AxbMethod::Default, AxbMethod::Gustavson, AxbMethod::Hash] {
            let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_method(method));
            group.bench_with_input(BenchmarkId::new(format!("{method:?}"), n), &n, |bench, _| {
                bench.iter(|| black_box(engine.multiply(None, &a, &b).unwrap()))
            });
        }
    }
    group.finish();
}

fn bench_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("tier");
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let a = generate_banded_matrix(5_000, 4);
    let b = generate_banded_matrix(5_000, 4);

    let specialized = Saxpy3::new(&semiring, SaxpyConfig::default());
    group.bench_function("specialized", |bench| {
        bench.iter(|| black_box(specialized.multiply(None, &a, &b).unwrap()))
    });

    let mut config = SaxpyConfig::default();
    config.dispatch.specialized = false;
    let generic = Saxpy3::new(&semiring, config);
    group.bench_function("generic", |bench| {
        bench.iter(|| black_box(generic.multiply(None, &a, &b).unwrap()))
    });
    group.finish();
}

fn bench_fine_teams(c: &mut Criterion) {
    let mut group = c.benchmark_group("fine_team");
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let a = generate_arrow_matrix(20_000);
    let b = a.clone();

    for atomics in [true, false] {
        let mut config = SaxpyConfig::default().with_chunk(4096.0);
        config.atomics = atomics;
        let engine = Saxpy3::new(&semiring, config);
        let name = if atomics { "atomic" } else { "serialized" };
        group.bench_function(name, |bench| bench.iter(|| black_box(engine.multiply(None, &a, &b).unwrap())));
    }
    group.finish();
}

fn bench_masks(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask");
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let a = generate_banded_matrix(5_000, 8);
    let b = generate_banded_matrix(5_000, 8);
    let m = generate_banded_matrix(5_000, 1);
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default());

    group.bench_function("unmasked", |bench| bench.iter(|| black_box(engine.multiply(None, &a, &b).unwrap())));
    group.bench_function("masked", |bench| {
        bench.iter(|| black_box(engine.multiply(Some(Mask::new(&m).structural()), &a, &b).unwrap()))
    });
    group.bench_function("complemented", |bench| {
        bench.iter(|| black_box(engine.multiply(Some(Mask::new(&m).complement()), &a, &b).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_methods, bench_tiers, bench_fine_teams, bench_masks);
criterion_main!(benches);
