//! Fetch-and-materialize executor.
//!
//! Runs a [`CoveragePlan`] entry by entry: download, decompress the single
//! payload, write it to `<path>.part`, then rename into place. A failed
//! monthly archive is re-expanded into daily archives for that month; any
//! other failure is recorded and the executor moves on.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::codec::{remote_key, upstream_stem, LocalLayout};
use crate::domain::{ArchiveRef, Period, PeriodSet, YearMonth};
use crate::error::DumpError;
use crate::planner::{CoveragePlan, PlanRequest};
use crate::remote::{extract_single, ArchiveSource};

/// Outcome of a single archive, as reported to [`FetchProgress`].
#[derive(Debug)]
pub enum FetchOutcome {
    Written { path: PathBuf, bytes: usize },
    NotFound,
    Failed(DumpError),
}

/// Progress callback for plan execution.
pub trait FetchProgress: Send + Sync {
    fn on_start(&self, archive: &ArchiveRef, index: usize, total: usize);
    fn on_complete(&self, archive: &ArchiveRef, outcome: &FetchOutcome);
    /// A monthly archive failed and `days` daily archives replace it.
    fn on_fallback(&self, ticker: &str, month: YearMonth, days: usize);
}

/// Silent progress.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_start(&self, _archive: &ArchiveRef, _index: usize, _total: usize) {}
    fn on_complete(&self, _archive: &ArchiveRef, _outcome: &FetchOutcome) {}
    fn on_fallback(&self, _ticker: &str, _month: YearMonth, _days: usize) {}
}

/// Progress as `tracing` events.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, archive: &ArchiveRef, index: usize, total: usize) {
        tracing::debug!("[{}/{total}] fetching {archive}", index + 1);
    }

    fn on_complete(&self, archive: &ArchiveRef, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Written { path, bytes } => {
                tracing::debug!(bytes, path = %path.display(), "saved {archive}");
            }
            FetchOutcome::NotFound => tracing::info!("not published upstream: {archive}"),
            FetchOutcome::Failed(e) => tracing::warn!("failed {archive}: {e}"),
        }
    }

    fn on_fallback(&self, ticker: &str, month: YearMonth, days: usize) {
        tracing::info!(ticker, %month, days, "monthly archive unavailable, using daily archives");
    }
}

static NO_PROGRESS: NoProgress = NoProgress;

#[derive(Debug, Clone, Serialize)]
pub struct FailedFetch {
    pub archive: ArchiveRef,
    pub error: String,
}

/// What one plan execution achieved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub written: Vec<ArchiveRef>,
    /// Monthly archives replaced by daily archives after failing.
    pub fallback_months: Vec<YearMonth>,
    pub not_found: Vec<ArchiveRef>,
    pub failed: Vec<FailedFetch>,
}

impl ExecutionReport {
    pub fn monthly_written(&self) -> usize {
        self.written
            .iter()
            .filter(|a| matches!(a.period, Period::Month(_)))
            .count()
    }

    pub fn daily_written(&self) -> usize {
        self.written.len() - self.monthly_written()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_found.is_empty()
    }
}

/// Inventories the plan was computed from; fallback expansion consults them.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub request: &'a PlanRequest,
    pub local: &'a PeriodSet,
    pub remote: &'a PeriodSet,
}

pub struct Executor<'a> {
    source: &'a dyn ArchiveSource,
    layout: &'a LocalLayout,
    progress: &'a dyn FetchProgress,
}

impl<'a> Executor<'a> {
    pub fn new(source: &'a dyn ArchiveSource, layout: &'a LocalLayout) -> Self {
        Self {
            source,
            layout,
            progress: &NO_PROGRESS,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn FetchProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn execute(&self, plan: &CoveragePlan, inputs: PlanInputs<'_>) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let total = plan.fetch.len();

        for (i, archive) in plan.fetch.iter().enumerate() {
            self.progress.on_start(archive, i, total);
            let outcome = self.fetch_one(archive);
            self.progress.on_complete(archive, &outcome);

            match (outcome, archive.period) {
                (FetchOutcome::Written { .. }, _) => report.written.push(archive.clone()),
                (failure, Period::Month(month)) => {
                    if let FetchOutcome::Failed(DumpError::CircuitBreakerTripped) = failure {
                        abandon(&mut report, &plan.fetch[i..]);
                        break;
                    }
                    if self.fall_back(archive, month, plan, inputs, &mut report) {
                        abandon(&mut report, &plan.fetch[i + 1..]);
                        break;
                    }
                }
                (FetchOutcome::NotFound, Period::Day(_)) => report.not_found.push(archive.clone()),
                (FetchOutcome::Failed(e), Period::Day(_)) => {
                    let tripped = matches!(e, DumpError::CircuitBreakerTripped);
                    report.failed.push(FailedFetch {
                        archive: archive.clone(),
                        error: e.to_string(),
                    });
                    if tripped {
                        abandon(&mut report, &plan.fetch[i + 1..]);
                        break;
                    }
                }
            }
        }

        report
    }

    /// Replace a failed monthly archive with the daily archives of that month.
    ///
    /// Returns true when the circuit breaker opened mid-month; the days not
    /// yet attempted are then reported as abandoned.
    fn fall_back(
        &self,
        archive: &ArchiveRef,
        month: YearMonth,
        plan: &CoveragePlan,
        inputs: PlanInputs<'_>,
        report: &mut ExecutionReport,
    ) -> bool {
        let days = fallback_days(month, plan, inputs);
        self.progress.on_fallback(&archive.ticker, month, days.len());
        report.fallback_months.push(month);

        if days.is_empty() {
            report.failed.push(FailedFetch {
                archive: archive.clone(),
                error: format!("monthly archive {month} unavailable and no daily archives cover it"),
            });
            return false;
        }

        let dailies: Vec<ArchiveRef> = days
            .into_iter()
            .map(|day| ArchiveRef::new(archive.ticker.clone(), archive.dataset, Period::Day(day)))
            .collect();
        let total = dailies.len();
        for (i, daily) in dailies.iter().enumerate() {
            self.progress.on_start(daily, i, total);
            let outcome = self.fetch_one(daily);
            self.progress.on_complete(daily, &outcome);
            match outcome {
                FetchOutcome::Written { .. } => report.written.push(daily.clone()),
                FetchOutcome::NotFound => report.not_found.push(daily.clone()),
                FetchOutcome::Failed(e) => {
                    let tripped = matches!(e, DumpError::CircuitBreakerTripped);
                    report.failed.push(FailedFetch {
                        archive: daily.clone(),
                        error: e.to_string(),
                    });
                    if tripped {
                        abandon(report, &dailies[i + 1..]);
                        return true;
                    }
                }
            }
        }
        false
    }

    fn fetch_one(&self, archive: &ArchiveRef) -> FetchOutcome {
        match self.materialize(archive) {
            Ok((path, bytes)) => FetchOutcome::Written { path, bytes },
            Err(e) if e.is_not_found() => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    /// Download, decompress and atomically write one archive.
    pub fn materialize(&self, archive: &ArchiveRef) -> Result<(PathBuf, usize), DumpError> {
        let key = remote_key(archive);
        let compressed = self.source.fetch(&key)?;
        let payload = extract_single(&compressed)?;

        let expected = upstream_stem(&archive.ticker, &archive.dataset, archive.period);
        if !payload.name.starts_with(&expected) {
            tracing::debug!(key, entry = %payload.name, "archive entry has an unexpected name");
        }

        let path = self.layout.path_for(archive);
        let partial = self.layout.partial_path_for(archive);
        write_atomic(&partial, &path, &payload.bytes)?;
        Ok((path, payload.bytes.len()))
    }
}

/// Days of `month` a fallback should fetch: inside the plan window, before
/// today, published upstream, and missing locally unless updating.
fn fallback_days(month: YearMonth, plan: &CoveragePlan, inputs: PlanInputs<'_>) -> Vec<NaiveDate> {
    let req = inputs.request;
    month
        .days()
        .filter(|d| plan.window.map_or(true, |w| w.contains(*d)))
        .filter(|d| *d < req.today)
        .filter(|d| inputs.remote.daily.contains(d))
        .filter(|d| req.update_existing || !inputs.local.daily.contains(d))
        .collect()
}

fn abandon(report: &mut ExecutionReport, rest: &[ArchiveRef]) {
    for archive in rest {
        report.failed.push(FailedFetch {
            archive: archive.clone(),
            error: DumpError::CircuitBreakerTripped.to_string(),
        });
    }
}

fn write_atomic(partial: &Path, path: &Path, bytes: &[u8]) -> Result<(), DumpError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| DumpError::io(dir, e))?;
    }

    let written = fs::File::create(partial)
        .and_then(|mut f| f.write_all(bytes).and_then(|_| f.sync_all()));
    if let Err(e) = written {
        let _ = fs::remove_file(partial);
        return Err(DumpError::io(partial, e));
    }

    fs::rename(partial, path).map_err(|e| {
        let _ = fs::remove_file(partial);
        DumpError::io(path, e)
    })
}
