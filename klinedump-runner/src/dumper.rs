//! `Dumper`: the public operation surface over one local tree.
//!
//! Each ticker runs its own scan → manifest → plan → execute cycle. Tickers
//! partition the tree, so they run in parallel on a rayon pool without locks.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;

use klinedump_core::codec::LocalLayout;
use klinedump_core::domain::{
    validate_ticker, Dataset, Granularity, Period, YearMonth,
};
use klinedump_core::executor::{ExecutionReport, Executor, FetchProgress, PlanInputs, TracingProgress};
use klinedump_core::inventory::LocalInventory;
use klinedump_core::logging::LogContext;
use klinedump_core::manifest::ManifestReader;
use klinedump_core::planner::{outdated_daily, plan, CoveragePlan, PlanRequest};
use klinedump_core::remote::{ArchiveSource, CircuitBreaker, VisionSource};
use klinedump_core::DumpError;

use crate::config::DumperConfig;
use crate::stats::{DumpStatistics, TickerStats};
use crate::tickers::{discover, TickerFilter};

/// Options of one dump run; unset fields fall back to the config.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub tickers: Option<Vec<String>>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub update_existing: Option<bool>,
}

/// Outcome of a multi-ticker dump.
#[derive(Debug, Default)]
pub struct DumpSummary {
    pub reports: Vec<(String, ExecutionReport)>,
    /// Tickers that could not be planned at all (listing failed, breaker open).
    pub failures: Vec<(String, DumpError)>,
    pub deletion: Option<DeletionSummary>,
}

impl DumpSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.reports.iter().all(|(_, r)| r.failed.is_empty())
    }

    pub fn statistics(&self) -> DumpStatistics {
        let mut stats: Vec<TickerStats> = self
            .reports
            .iter()
            .map(|(ticker, report)| TickerStats {
                ticker: ticker.clone(),
                months: report.monthly_written(),
                days: report.daily_written(),
            })
            .collect();
        stats.extend(self.failures.iter().map(|(ticker, _)| TickerStats {
            ticker: ticker.clone(),
            months: 0,
            days: 0,
        }));
        DumpStatistics::from_tickers(stats)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionSummary {
    pub deleted: BTreeMap<String, usize>,
    /// Files that matched but could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl DeletionSummary {
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }
}

pub struct Dumper {
    config: DumperConfig,
    dataset: Dataset,
    layout: LocalLayout,
    source: Arc<dyn ArchiveSource>,
    progress: Arc<dyn FetchProgress>,
    log: LogContext,
    today: Option<NaiveDate>,
}

impl Dumper {
    /// Fails fast on an illegal dataset or a root that is not a directory.
    pub fn new(
        config: DumperConfig,
        source: Arc<dyn ArchiveSource>,
        log: LogContext,
    ) -> Result<Self, DumpError> {
        config.validate()?;
        let dataset = config.dataset()?;
        if config.root.exists() && !config.root.is_dir() {
            return Err(DumpError::InvalidArgument(format!(
                "root {} exists and is not a directory",
                config.root.display()
            )));
        }
        Ok(Self {
            layout: LocalLayout::new(&config.root),
            dataset,
            config,
            source,
            progress: Arc::new(TracingProgress),
            log,
            today: None,
        })
    }

    /// A dumper talking to the public bucket with the configured settings.
    pub fn from_config(config: DumperConfig, log: LogContext) -> Result<Self, DumpError> {
        let breaker = Arc::new(CircuitBreaker::default_remote());
        let source = VisionSource::new(config.remote.clone(), breaker)?;
        Self::new(config, Arc::new(source), log)
    }

    /// Pin "today" instead of reading the UTC clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &DumperConfig {
        &self.config
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn filter(&self) -> TickerFilter {
        TickerFilter {
            quote_asset: self.config.quote_asset.clone(),
            exclude: self.config.exclude.clone(),
            max_tickers: self.config.max_tickers,
        }
    }

    /// Explicit tickers are used as given (delisted pairs still have history);
    /// otherwise every listed symbol in the quote asset.
    pub fn resolve_tickers(&self, tickers: Option<&[String]>) -> Result<Vec<String>, DumpError> {
        let filter = self.filter();
        let explicit = tickers
            .filter(|t| !t.is_empty())
            .or(self.config.tickers.as_deref().filter(|t| !t.is_empty()));

        if let Some(list) = explicit {
            for ticker in list {
                validate_ticker(ticker)?;
            }
            return Ok(filter.apply(list.iter().cloned()));
        }

        let symbols = self.source.list_symbols(self.dataset.asset_class())?;
        tracing::info!("found {} listed symbols", symbols.len());
        let selected = discover(&symbols, &filter);
        tracing::info!(quote = %filter.quote_asset, "{} tickers selected", selected.len());
        Ok(selected)
    }

    fn request(&self, ticker: &str, opts: &DumpOptions) -> PlanRequest {
        PlanRequest::new(ticker, self.dataset, self.today())
            .with_range(opts.date_start, opts.date_end)
            .with_update_existing(opts.update_existing.unwrap_or(self.config.update_existing))
    }

    /// Dry run for one ticker.
    pub fn plan(&self, ticker: &str, opts: &DumpOptions) -> Result<CoveragePlan, DumpError> {
        validate_ticker(ticker)?;
        let req = self.request(ticker, opts);
        let local = LocalInventory::new(&self.layout).scan(ticker, &self.dataset)?;
        let remote = ManifestReader::new(self.source.as_ref()).read(ticker, &self.dataset)?;
        Ok(plan(&req, &local, &remote))
    }

    /// Plan and fetch every selected ticker. Per-ticker failures are collected.
    pub fn plan_and_fetch(&self, opts: &DumpOptions) -> Result<DumpSummary, DumpError> {
        let tickers = self.resolve_tickers(opts.tickers.as_deref())?;
        tracing::info!(
            dataset = %self.dataset,
            start = ?opts.date_start,
            end = ?opts.date_end,
            "dumping data for {} tickers",
            tickers.len()
        );

        let threads = self.config.thread_count();
        let run = || -> Vec<(String, Result<ExecutionReport, DumpError>)> {
            tickers
                .par_iter()
                .map(|ticker| (ticker.clone(), self.dump_ticker(ticker, opts)))
                .collect()
        };
        let results = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!("worker pool unavailable ({e}), running on the global pool");
                run()
            }
        };

        let mut summary = DumpSummary::default();
        for (ticker, result) in results {
            match result {
                Ok(report) => summary.reports.push((ticker, report)),
                Err(e) => {
                    tracing::error!(ticker = %ticker, "{e}");
                    summary.failures.push((ticker, e));
                }
            }
        }

        if self.config.delete_outdated {
            summary.deletion = Some(self.delete_outdated_daily()?);
        }
        Ok(summary)
    }

    fn dump_ticker(&self, ticker: &str, opts: &DumpOptions) -> Result<ExecutionReport, DumpError> {
        let span = self.log.ticker_span(ticker);
        let _guard = span.enter();

        if !self.source.is_available() {
            return Err(DumpError::CircuitBreakerTripped);
        }

        let req = self.request(ticker, opts);
        let local = LocalInventory::new(&self.layout).scan(ticker, &self.dataset)?;
        let remote = ManifestReader::new(self.source.as_ref()).read(ticker, &self.dataset)?;
        let coverage = plan(&req, &local, &remote);
        match coverage.window {
            Some(w) => tracing::info!(
                start = %w.start,
                end = %w.end,
                monthly = coverage.monthly_count(),
                daily = coverage.daily_count(),
                "planned"
            ),
            None => tracing::info!("nothing published in the requested range"),
        }

        let report = Executor::new(self.source.as_ref(), &self.layout)
            .with_progress(self.progress.as_ref())
            .execute(
                &coverage,
                PlanInputs {
                    request: &req,
                    local: &local,
                    remote: &remote,
                },
            );
        tracing::info!(
            months = report.monthly_written(),
            days = report.daily_written(),
            failed = report.failed.len(),
            "done"
        );
        Ok(report)
    }

    /// Remove daily files whose whole month is present as a monthly file.
    ///
    /// The monthly file is checked on disk right before each removal; only
    /// files are removed, never directories.
    pub fn delete_outdated_daily(&self) -> Result<DeletionSummary, DumpError> {
        tracing::info!("deleting daily files covered by monthly files");
        let inventory = LocalInventory::new(&self.layout);
        let mut summary = DeletionSummary::default();

        for ticker in inventory.list_tickers(&self.dataset, Granularity::Daily)? {
            let local = inventory.scan(&ticker, &self.dataset)?;
            for day in outdated_daily(&local) {
                let monthly = self
                    .layout
                    .path(&ticker, &self.dataset, Period::Month(YearMonth::of(day)));
                if !monthly.is_file() {
                    continue;
                }
                let path = self.layout.path(&ticker, &self.dataset, Period::Day(day));
                match fs::remove_file(&path) {
                    Ok(()) => *summary.deleted.entry(ticker.clone()).or_default() += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "unable to delete file: {e}");
                        summary.failed.push((path, e.to_string()));
                    }
                }
            }
        }

        tracing::info!(
            "daily files deleted for {} tickers ({} files)",
            summary.deleted.len(),
            summary.total_deleted()
        );
        Ok(summary)
    }

    pub fn list_local_tickers(&self, granularity: Granularity) -> Result<Vec<String>, DumpError> {
        LocalInventory::new(&self.layout).list_tickers(&self.dataset, granularity)
    }

    pub fn list_local_periods(
        &self,
        ticker: &str,
        granularity: Granularity,
    ) -> Result<Vec<Period>, DumpError> {
        validate_ticker(ticker)?;
        LocalInventory::new(&self.layout).scan_granularity(ticker, &self.dataset, granularity)
    }

    /// Canonical local path of a period, whether or not it exists.
    pub fn local_path_for(&self, ticker: &str, period: Period) -> Result<PathBuf, DumpError> {
        validate_ticker(ticker)?;
        if period.granularity() == Granularity::Monthly && !self.dataset.data_type().has_monthly() {
            return Err(DumpError::InvalidArgument(format!(
                "{} is only published daily",
                self.dataset.data_type()
            )));
        }
        Ok(self.layout.path(ticker, &self.dataset, period))
    }
}
