//! Benchmarks for harmonic fitting and synthesis.
//!
//! Run with: `cargo bench --bench harmonic_bench`
//!
//! Compares fit cost across record lengths and constituent counts, and
//! synthesis cost across query lengths (enable `parallel` to compare the
//! rayon path).

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tide_harmonics::io::{ReaderConfig, read_series};
use tide_harmonics::{ConstituentTable, HarmonicAnalysis, HarmonicModel, synthesize};

/// Hourly record from a fixed multi-constituent model.
fn generate_record(table: &ConstituentTable, hours: usize) -> (Vec<f64>, Vec<f64>) {
    let n = table.len();
    let amplitudes: Vec<f64> = (0..n).map(|i| 1.0 / (i + 1) as f64).collect();
    let phases: Vec<f64> = (0..n).map(|i| 0.37 * i as f64).collect();
    let model = HarmonicModel::new(table.pulsations(), amplitudes, phases, 1.0).unwrap();

    let times: Vec<f64> = (0..hours).map(|i| i as f64).collect();
    let heights = synthesize(&times, &model).unwrap();
    (times, heights)
}

/// Benchmark the least-squares fit.
fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("harmonic_fit");

    let tables = [
        ("principal", ConstituentTable::principal()),
        ("standard", ConstituentTable::standard()),
    ];

    for (label, table) in &tables {
        let analysis = HarmonicAnalysis::from_table(table);
        for hours in [720, 8760] {
            let (times, heights) = generate_record(table, hours);
            group.bench_with_input(
                BenchmarkId::new(*label, hours),
                &(times, heights),
                |b, (times, heights)| {
                    b.iter(|| {
                        analysis
                            .fit(black_box(times), black_box(heights), black_box(1.0))
                            .unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

/// Benchmark synthesis over query vectors of increasing length.
fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");

    let table = ConstituentTable::standard();
    let model = HarmonicModel::new(
        table.pulsations(),
        vec![0.1; table.len()],
        vec![0.0; table.len()],
        0.0,
    )
    .unwrap();

    for n in [1_000, 10_000, 100_000] {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &times, |b, times| {
            b.iter(|| synthesize(black_box(times), black_box(&model)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark ingestion of ~11 months of hourly timestamped rows.
fn bench_ingest(c: &mut Criterion) {
    let mut text = String::new();
    for h in 0..(12 * 28 * 24) {
        let day = 1 + (h / 24) % 28;
        let month = 1 + (h / 24) / 28;
        text.push_str(&format!(
            "{:02}/{:02}/2023 {:02}:00:00;{:.3}\n",
            day,
            month,
            h % 24,
            (h as f64 * 0.5).sin()
        ));
    }
    let config = ReaderConfig::default();

    c.bench_function("read_series_pattern", |b| {
        b.iter(|| read_series(black_box(&text), &config).unwrap())
    });
}

criterion_group!(benches, bench_fit, bench_synthesis, bench_ingest);
criterion_main!(benches);
