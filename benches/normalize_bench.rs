//! Criterion benchmarks for the quantile and normalization paths

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use hpitrack::services::{normalize, reshape};
use hpitrack::store::{percentile_disc, quantile_row};
use hpitrack::types::{
    EconomicData, EconomicSeries, NormalizationMode, PriceObservation, PriceQuery, SeriesKind,
};

const REGIONS: [&str; 10] = [
    "London",
    "South East",
    "East of England",
    "South West",
    "West Midlands",
    "East Midlands",
    "Yorkshire and The Humber",
    "North West",
    "North East",
    "Wales",
];

const START_YEAR: i32 = 1995;
const END_YEAR: i32 = 2024;

/// p25/p50/p75 triples for every (year, region) in range
fn synthetic_observations() -> Vec<PriceObservation> {
    let mut observations = Vec::new();
    for year in START_YEAR..=END_YEAR {
        for (i, region) in REGIONS.iter().enumerate() {
            let median =
                60_000.0 * (1.0 + 0.05 * (year - START_YEAR) as f64) * (1.0 + i as f64 / 10.0);
            let prices = [median * 0.7, median, median * 1.5];
            if let Some(row) = quantile_row(year, region.to_string(), &prices) {
                observations.extend(row.into_observations());
            }
        }
    }
    observations
}

fn synthetic_econ() -> EconomicData {
    let series = |kind: SeriesKind, start: f64, step: f64| {
        EconomicSeries::new(
            kind,
            (START_YEAR..=END_YEAR)
                .map(|y| (y, start + step * (y - START_YEAR) as f64))
                .collect(),
        )
    };
    let mut econ = EconomicData::empty(END_YEAR);
    econ.cpi = series(SeriesKind::Cpi, 60.0, 2.0);
    econ.rpi = series(SeriesKind::Rpi, 150.0, 5.0);
    econ.fx = series(SeriesKind::Fx, 1.6, -0.01);
    econ.real_fx = series(SeriesKind::RealFx, 1.1, 0.005);
    econ
}

fn bench_reshape(c: &mut Criterion) {
    let observations = synthetic_observations();
    let query = PriceQuery::new(REGIONS, START_YEAR, END_YEAR).unwrap();

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(observations.len() as u64));
    group.bench_function("reshape", |b| {
        b.iter(|| reshape(black_box(&observations), black_box(&query)));
    });
    group.finish();
}

fn bench_modes(c: &mut Criterion) {
    let observations = synthetic_observations();
    let query = PriceQuery::new(REGIONS, START_YEAR, END_YEAR).unwrap();
    let econ = synthetic_econ();

    let mut group = c.benchmark_group("normalize");
    for mode in [
        NormalizationMode::Nominal,
        NormalizationMode::RealCpi,
        NormalizationMode::UsdReal,
    ] {
        group.bench_with_input(
            BenchmarkId::new("normalize_rebased", format!("{:?}", mode)),
            &mode,
            |b, mode| {
                b.iter(|| normalize(&query, black_box(&observations), &econ, *mode, true));
            },
        );
    }
    group.finish();
}

fn bench_percentile(c: &mut Criterion) {
    let mut prices: Vec<f64> = (0..100_000).map(|i| ((i * 7919) % 1_000_000) as f64).collect();
    prices.sort_by(|a, b| a.total_cmp(b));

    let mut group = c.benchmark_group("percentile");
    group.throughput(Throughput::Elements(prices.len() as u64));
    group.bench_function("quantile_row_100k", |b| {
        b.iter(|| quantile_row(2024, "London".to_string(), black_box(&prices)));
    });
    group.bench_function("percentile_disc_median", |b| {
        b.iter(|| percentile_disc(black_box(&prices), 0.5));
    });
    group.finish();
}

criterion_group!(benches, bench_reshape, bench_modes, bench_percentile);
criterion_main!(benches);
