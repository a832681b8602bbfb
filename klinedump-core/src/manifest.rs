//! Remote manifest reader: which archives the source currently publishes.

use crate::codec::{decode_remote_name, remote_dir};
use crate::domain::{Dataset, Granularity, Period, PeriodSet};
use crate::error::DumpError;
use crate::remote::ArchiveSource;

pub struct ManifestReader<'a> {
    source: &'a dyn ArchiveSource,
}

impl<'a> ManifestReader<'a> {
    pub fn new(source: &'a dyn ArchiveSource) -> Self {
        Self { source }
    }

    /// Published periods for one granularity, sorted and deduplicated.
    ///
    /// A ticker or dataset the source has never heard of lists as empty.
    pub fn list_available(
        &self,
        ticker: &str,
        dataset: &Dataset,
        granularity: Granularity,
    ) -> Result<Vec<Period>, DumpError> {
        if granularity == Granularity::Monthly && !dataset.data_type().has_monthly() {
            return Ok(Vec::new());
        }
        let prefix = remote_dir(ticker, dataset, granularity);
        let keys = self.source.list_keys(&prefix)?;
        Ok(periods_from_keys(&keys, ticker, dataset, granularity))
    }

    /// Both granularities at once.
    pub fn read(&self, ticker: &str, dataset: &Dataset) -> Result<PeriodSet, DumpError> {
        let mut set = PeriodSet::new();
        for granularity in [Granularity::Monthly, Granularity::Daily] {
            set.extend(self.list_available(ticker, dataset, granularity)?);
        }
        tracing::debug!(
            ticker,
            monthly = set.monthly.len(),
            daily = set.daily.len(),
            "remote manifest read"
        );
        Ok(set)
    }
}

/// Decode listing keys, keeping archives of this ticker, dataset and granularity.
pub fn periods_from_keys(
    keys: &[String],
    ticker: &str,
    dataset: &Dataset,
    granularity: Granularity,
) -> Vec<Period> {
    let tag = dataset.upstream_tag();
    let mut periods: Vec<Period> = keys
        .iter()
        .filter_map(|key| {
            let name = key.rsplit('/').next().unwrap_or(key.as_str());
            decode_remote_name(name).ok()
        })
        .filter(|n| n.ticker == ticker && n.tag == tag && n.period.granularity() == granularity)
        .map(|n| n.period)
        .collect();
    periods.sort();
    periods.dedup();
    periods
}
