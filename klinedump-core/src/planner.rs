//! Coverage planner: which archives to fetch for a requested date range.
//!
//! Pure computation over the local inventory and the remote manifest. Full,
//! elapsed calendar months are covered by monthly archives when upstream
//! publishes them; everything else (partial months at the range edges, the
//! running month, months upstream never published) is covered day by day.
//!
//! The plan is ordered chronologically with a month ahead of its own days, and
//! carries a separate set of local daily files made redundant by monthly
//! coverage. Nothing is deleted here.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{ArchiveRef, Dataset, Period, PeriodSet, YearMonth};

/// Inputs of one planning call for one ticker.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub ticker: String,
    pub dataset: Dataset,
    /// Inclusive. Defaults to the earliest period upstream publishes.
    pub date_start: Option<NaiveDate>,
    /// Inclusive. Defaults to, and is clamped to, the day before `today`.
    pub date_end: Option<NaiveDate>,
    /// Re-fetch periods already present locally.
    pub update_existing: bool,
    /// Current UTC date.
    pub today: NaiveDate,
}

impl PlanRequest {
    pub fn new(ticker: impl Into<String>, dataset: Dataset, today: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            dataset,
            date_start: None,
            date_end: None,
            update_existing: false,
            today,
        }
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn with_update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }

    /// The single skip-if-present predicate used for every period.
    fn wants(&self, present_locally: bool) -> bool {
        !present_locally || self.update_existing
    }
}

/// Inclusive date range after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoveragePlan {
    pub ticker: String,
    pub dataset: Dataset,
    /// `None` when the request resolved to no dates at all.
    pub window: Option<DateWindow>,
    /// Archives to fetch, in execution order.
    pub fetch: Vec<ArchiveRef>,
    /// Local daily files superseded by a local or planned monthly file.
    pub superseded_daily: Vec<ArchiveRef>,
}

impl CoveragePlan {
    fn empty(req: &PlanRequest) -> Self {
        Self {
            ticker: req.ticker.clone(),
            dataset: req.dataset,
            window: None,
            fetch: Vec::new(),
            superseded_daily: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.superseded_daily.is_empty()
    }

    pub fn monthly_count(&self) -> usize {
        self.fetch
            .iter()
            .filter(|a| matches!(a.period, Period::Month(_)))
            .count()
    }

    pub fn daily_count(&self) -> usize {
        self.fetch.len() - self.monthly_count()
    }
}

/// Resolve the request's dates against defaults. `None` means nothing to plan.
pub fn resolve_window(req: &PlanRequest, remote: &PeriodSet) -> Option<DateWindow> {
    let yesterday = req.today.pred_opt()?;
    let end = req.date_end.map_or(yesterday, |end| end.min(yesterday));
    let start = match req.date_start {
        Some(start) => start,
        None => remote.earliest_day()?,
    };
    (start <= end).then_some(DateWindow { start, end })
}

/// How one calendar month of the window gets covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonthCoverage {
    Monthly,
    Daily,
}

pub fn plan(req: &PlanRequest, local: &PeriodSet, remote: &PeriodSet) -> CoveragePlan {
    let Some(window) = resolve_window(req, remote) else {
        return CoveragePlan {
            superseded_daily: superseded(req, local, &[]),
            ..CoveragePlan::empty(req)
        };
    };

    let current = YearMonth::of(req.today);
    let mut fetch = Vec::new();
    let mut month = YearMonth::of(window.start);
    let last = YearMonth::of(window.end);

    while month <= last {
        let span_start = month.first_day().max(window.start);
        let span_end = month.last_day().min(window.end);
        let days = || span_start.iter_days().take_while(move |d| *d <= span_end);

        let coverage = month_coverage(req, month, current, window, local, remote, days());
        match coverage {
            MonthCoverage::Monthly => {
                let period = Period::Month(month);
                if remote.contains(period) && req.wants(local.contains(period)) {
                    fetch.push(ArchiveRef::new(req.ticker.clone(), req.dataset, period));
                }
            }
            MonthCoverage::Daily => {
                for day in days() {
                    let period = Period::Day(day);
                    if remote.contains(period) && req.wants(local.contains(period)) {
                        fetch.push(ArchiveRef::new(req.ticker.clone(), req.dataset, period));
                    }
                }
            }
        }

        month = month.succ();
    }

    fetch.sort_by(|a, b| a.period.cmp(&b.period));

    let planned_months: Vec<YearMonth> = fetch
        .iter()
        .filter_map(|a| match a.period {
            Period::Month(m) => Some(m),
            Period::Day(_) => None,
        })
        .collect();

    CoveragePlan {
        ticker: req.ticker.clone(),
        dataset: req.dataset,
        window: Some(window),
        superseded_daily: superseded(req, local, &planned_months),
        fetch,
    }
}

/// An elapsed month only partly inside the window is covered daily, unless
/// some requested day has no daily archive; then the monthly archive is used.
fn month_coverage(
    req: &PlanRequest,
    month: YearMonth,
    current: YearMonth,
    window: DateWindow,
    local: &PeriodSet,
    remote: &PeriodSet,
    mut days: impl Iterator<Item = NaiveDate>,
) -> MonthCoverage {
    // The running month never has a monthly archive, whatever the flags say.
    if month >= current || !req.dataset.data_type().has_monthly() {
        return MonthCoverage::Daily;
    }

    let period = Period::Month(month);
    if local.contains(period) {
        return MonthCoverage::Monthly;
    }
    if !remote.contains(period) {
        return MonthCoverage::Daily;
    }
    if window.contains(month.first_day()) && window.contains(month.last_day()) {
        return MonthCoverage::Monthly;
    }

    // Partial month: daily unless some requested day is only reachable monthly.
    let gap = days.any(|d| !remote.daily.contains(&d) && !local.daily.contains(&d));
    if gap {
        MonthCoverage::Monthly
    } else {
        MonthCoverage::Daily
    }
}

fn superseded(req: &PlanRequest, local: &PeriodSet, planned: &[YearMonth]) -> Vec<ArchiveRef> {
    local
        .daily
        .iter()
        .filter(|d| {
            let month = YearMonth::of(**d);
            local.monthly.contains(&month) || planned.contains(&month)
        })
        .map(|d| ArchiveRef::new(req.ticker.clone(), req.dataset, Period::Day(*d)))
        .collect()
}

/// Local daily days whose containing month is present locally as a monthly file.
pub fn outdated_daily(local: &PeriodSet) -> Vec<NaiveDate> {
    local
        .daily
        .iter()
        .copied()
        .filter(|d| local.monthly.contains(&YearMonth::of(*d)))
        .collect()
}
