//! Multi-ticker dumps against an in-memory source and a temp tree.

use std::fs;
use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use klinedump_core::codec::remote_key;
use klinedump_core::domain::{
    ArchiveRef, AssetClass, Dataset, Frequency, Granularity, Period, YearMonth,
};
use klinedump_core::logging::LogContext;
use klinedump_core::remote::{MemorySource, SymbolInfo};
use klinedump_runner::{DumpOptions, DumpStatistics, Dumper, DumperConfig};

// ── Helpers ──────────────────────────────────────────────────────────

const ROW: &str = "1622505600000,1,2,0.5,1.5,10,1622509199999,15,3,4,6,0\n";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

fn dataset() -> Dataset {
    Dataset::spot_klines(Frequency::Hour1)
}

fn publish(source: &MemorySource, ticker: &str, period: Period) {
    let archive = ArchiveRef::new(ticker, dataset(), period);
    source.publish(&archive, ROW.as_bytes()).unwrap();
}

fn publish_days(source: &MemorySource, ticker: &str, from: NaiveDate, to: NaiveDate) {
    for day in from.iter_days().take_while(|x| *x <= to) {
        publish(source, ticker, Period::Day(day));
    }
}

fn config(tmp: &TempDir) -> DumperConfig {
    DumperConfig {
        root: tmp.path().join("spot"),
        frequency: Frequency::Hour1,
        threads: Some(2),
        ..DumperConfig::default()
    }
}

fn dumper(tmp: &TempDir, source: &Arc<MemorySource>, today: NaiveDate) -> Dumper {
    Dumper::new(config(tmp), source.clone(), LogContext::detached())
        .unwrap()
        .with_today(today)
}

fn june(tickers: &[&str]) -> DumpOptions {
    DumpOptions {
        tickers: Some(tickers.iter().map(|t| t.to_string()).collect()),
        date_start: Some(d(2021, 6, 1)),
        date_end: Some(d(2021, 6, 30)),
        update_existing: None,
    }
}

// ── Dumps ────────────────────────────────────────────────────────────

#[test]
fn second_dump_fetches_nothing() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    for ticker in ["BTCUSDT", "ETHUSDT"] {
        publish(&source, ticker, Period::Month(ym(2021, 5)));
        publish_days(&source, ticker, d(2021, 5, 1), d(2021, 7, 10));
    }
    let dumper = dumper(&tmp, &source, d(2021, 7, 11));
    let opts = DumpOptions {
        tickers: Some(vec!["BTCUSDT".into(), "ETHUSDT".into()]),
        date_start: Some(d(2021, 5, 1)),
        ..DumpOptions::default()
    };

    let first = dumper.plan_and_fetch(&opts).unwrap();
    assert!(first.all_succeeded());
    for (_, report) in &first.reports {
        // May as one monthly, June and July 1..10 as daily.
        assert_eq!(report.monthly_written(), 1);
        assert_eq!(report.daily_written(), 40);
    }
    let fetched = source.fetch_count();

    let second = dumper.plan_and_fetch(&opts).unwrap();
    assert!(second.reports.iter().all(|(_, r)| r.written.is_empty()));
    assert_eq!(source.fetch_count(), fetched);
    match second.statistics() {
        DumpStatistics::Full { per_ticker } => {
            assert_eq!(per_ticker.len(), 2);
            assert!(per_ticker.iter().all(|s| !s.has_new_data()));
        }
        other => panic!("unexpected statistics {other:?}"),
    }
}

#[test]
fn unknown_ticker_yields_empty_report() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    let dumper = dumper(&tmp, &source, d(2021, 7, 11));

    let summary = dumper.plan_and_fetch(&june(&["NOPEUSDT"])).unwrap();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.reports.len(), 1);
    assert!(summary.reports[0].1.written.is_empty());
    assert!(!tmp.path().join("spot").join("NOPEUSDT").exists());
}

#[test]
fn failed_monthly_falls_back_to_daily() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    publish(&source, "BTCUSDT", Period::Month(ym(2021, 6)));
    publish_days(&source, "BTCUSDT", d(2021, 6, 1), d(2021, 6, 30));
    source.fail(remote_key(&ArchiveRef::new(
        "BTCUSDT",
        dataset(),
        Period::Month(ym(2021, 6)),
    )));
    let dumper = dumper(&tmp, &source, d(2021, 7, 11));

    let summary = dumper.plan_and_fetch(&june(&["BTCUSDT"])).unwrap();
    let report = &summary.reports[0].1;
    assert_eq!(report.fallback_months, vec![ym(2021, 6)]);
    assert_eq!(report.monthly_written(), 0);
    assert_eq!(report.daily_written(), 30);
    assert!(report.failed.is_empty());
    assert_eq!(
        dumper.list_local_periods("BTCUSDT", Granularity::Daily).unwrap().len(),
        30
    );
}

#[test]
fn discovery_dumps_listed_symbols_only() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    let listed = |symbol: &str, quote: &str| SymbolInfo {
        symbol: symbol.into(),
        quote_asset: quote.into(),
        tradable: true,
    };
    source.set_symbols(
        AssetClass::Spot,
        vec![
            listed("BTCUSDT", "USDT"),
            listed("ETHBTC", "BTC"),
            listed("BNBUSDT", "USDT"),
        ],
    );
    for ticker in ["BTCUSDT", "ETHBTC", "BNBUSDT"] {
        publish_days(&source, ticker, d(2021, 6, 1), d(2021, 6, 3));
    }
    let dumper = dumper(&tmp, &source, d(2021, 6, 4));

    let summary = dumper.plan_and_fetch(&DumpOptions::default()).unwrap();
    let mut tickers: Vec<&str> = summary.reports.iter().map(|(t, _)| t.as_str()).collect();
    tickers.sort_unstable();
    assert_eq!(tickers, vec!["BNBUSDT", "BTCUSDT"]);
    assert_eq!(
        dumper.list_local_tickers(Granularity::Daily).unwrap(),
        vec!["BNBUSDT", "BTCUSDT"]
    );
}

// ── Pruning ──────────────────────────────────────────────────────────

#[test]
fn monthly_publication_then_prune_removes_june_dailies() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    publish_days(&source, "BTCUSDT", d(2021, 6, 1), d(2021, 6, 30));

    // Dumped mid-July: June is only available daily.
    let early = dumper(&tmp, &source, d(2021, 7, 2));
    let summary = early.plan_and_fetch(&june(&["BTCUSDT"])).unwrap();
    assert_eq!(summary.reports[0].1.daily_written(), 30);

    // The monthly archive appears later and supersedes the dailies.
    publish(&source, "BTCUSDT", Period::Month(ym(2021, 6)));
    let later = dumper(&tmp, &source, d(2021, 7, 20));
    let plan = later.plan("BTCUSDT", &june(&["BTCUSDT"])).unwrap();
    assert_eq!(plan.monthly_count(), 1);
    assert_eq!(plan.superseded_daily.len(), 30);

    let summary = later.plan_and_fetch(&june(&["BTCUSDT"])).unwrap();
    assert_eq!(summary.reports[0].1.monthly_written(), 1);
    assert!(summary.deletion.is_none());

    let deletion = later.delete_outdated_daily().unwrap();
    assert_eq!(deletion.deleted.get("BTCUSDT"), Some(&30));
    assert!(deletion.failed.is_empty());
    assert!(later
        .list_local_periods("BTCUSDT", Granularity::Daily)
        .unwrap()
        .is_empty());
    assert_eq!(
        later.list_local_periods("BTCUSDT", Granularity::Monthly).unwrap(),
        vec![Period::Month(ym(2021, 6))]
    );
    // Directories stay in place.
    assert!(later
        .layout()
        .granularity_dir("BTCUSDT", &dataset(), Granularity::Daily)
        .is_dir());

    // Nothing left to prune.
    assert_eq!(later.delete_outdated_daily().unwrap().total_deleted(), 0);
}

#[test]
fn configured_prune_runs_after_dump() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    publish_days(&source, "BTCUSDT", d(2021, 6, 1), d(2021, 6, 30));
    dumper(&tmp, &source, d(2021, 7, 2))
        .plan_and_fetch(&june(&["BTCUSDT"]))
        .unwrap();

    publish(&source, "BTCUSDT", Period::Month(ym(2021, 6)));
    let pruning = Dumper::new(
        DumperConfig {
            delete_outdated: true,
            ..config(&tmp)
        },
        source.clone(),
        LogContext::detached(),
    )
    .unwrap()
    .with_today(d(2021, 7, 20));

    let summary = pruning.plan_and_fetch(&june(&["BTCUSDT"])).unwrap();
    assert_eq!(summary.deletion.unwrap().total_deleted(), 30);
}

#[test]
fn daily_without_monthly_is_never_pruned() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    publish_days(&source, "BTCUSDT", d(2021, 6, 1), d(2021, 6, 30));
    let dumper = dumper(&tmp, &source, d(2021, 7, 2));
    dumper.plan_and_fetch(&june(&["BTCUSDT"])).unwrap();

    // A stray file that is not a valid archive name survives too.
    let daily_dir = dumper
        .layout()
        .granularity_dir("BTCUSDT", &dataset(), Granularity::Daily);
    fs::write(daily_dir.join("notes.txt"), b"keep").unwrap();

    assert_eq!(dumper.delete_outdated_daily().unwrap().total_deleted(), 0);
    assert_eq!(
        dumper.list_local_periods("BTCUSDT", Granularity::Daily).unwrap().len(),
        30
    );
    assert!(daily_dir.join("notes.txt").exists());
}

// ── Construction ─────────────────────────────────────────────────────

#[test]
fn root_that_is_a_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("spot");
    fs::write(&root, b"not a directory").unwrap();
    let result = Dumper::new(
        DumperConfig {
            root,
            ..DumperConfig::default()
        },
        Arc::new(MemorySource::new()),
        LogContext::detached(),
    );
    assert!(result.is_err());
}
