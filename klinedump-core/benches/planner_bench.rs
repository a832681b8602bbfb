//! Criterion benchmarks for the planning hot path.
//!
//! Benchmarks:
//! 1. Coverage planning over a multi-year range against a full manifest
//! 2. Re-planning against a complete local tree (the common incremental case)
//! 3. Listing key decoding

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use klinedump_core::codec::remote_key;
use klinedump_core::domain::{ArchiveRef, Dataset, Frequency, Granularity, Period, PeriodSet, YearMonth};
use klinedump_core::manifest::periods_from_keys;
use klinedump_core::planner::{plan, PlanRequest};

// ── Helpers ──────────────────────────────────────────────────────────

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 8, 1).unwrap()
}

/// Monthly archives for every elapsed month and daily archives for every day.
fn full_manifest(years: u32, today: NaiveDate) -> PeriodSet {
    let mut set = PeriodSet::new();
    let mut month = YearMonth::of(start());
    let end = start() + Days::new(u64::from(years) * 365);
    while month.first_day() <= end && month < YearMonth::of(today) {
        set.insert(Period::Month(month));
        month = month.succ();
    }
    for day in start().iter_days().take_while(|d| *d <= end && *d < today) {
        set.insert(Period::Day(day));
    }
    set
}

// ── 1-2. Planning ────────────────────────────────────────────────────

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for years in [1u32, 4, 8] {
        let today = start() + Days::new(u64::from(years) * 365 + 20);
        let remote = full_manifest(years, today);
        let req = PlanRequest::new("BTCUSDT", Dataset::spot_klines(Frequency::Min1), today);

        group.bench_with_input(BenchmarkId::new("empty_tree", years), &years, |b, _| {
            b.iter(|| plan(black_box(&req), black_box(&PeriodSet::new()), black_box(&remote)))
        });

        let mut local = PeriodSet::new();
        local.extend(plan(&req, &PeriodSet::new(), &remote).fetch.iter().map(|a| a.period));
        group.bench_with_input(BenchmarkId::new("up_to_date", years), &years, |b, _| {
            b.iter(|| plan(black_box(&req), black_box(&local), black_box(&remote)))
        });
    }
    group.finish();
}

// ── 3. Listing decode ────────────────────────────────────────────────

fn bench_decode_keys(c: &mut Criterion) {
    let dataset = Dataset::spot_klines(Frequency::Hour1);
    let keys: Vec<String> = start()
        .iter_days()
        .take(2000)
        .flat_map(|d| {
            let archive = ArchiveRef::new("BTCUSDT", dataset, Period::Day(d));
            let key = remote_key(&archive);
            [format!("{key}.CHECKSUM"), key]
        })
        .collect();

    c.bench_function("periods_from_keys_4000", |b| {
        b.iter(|| periods_from_keys(black_box(&keys), "BTCUSDT", &dataset, Granularity::Daily))
    });
}

criterion_group!(benches, bench_plan, bench_decode_keys);
criterion_main!(benches);
