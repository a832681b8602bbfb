//! Local inventory scanner: which files already exist under the tree root.
//!
//! Only existence is tracked. Files whose names do not decode, or decode to a
//! different ticker/dataset/granularity than their directory implies, are
//! treated as foreign: logged and ignored, never deleted.

use std::fs;
use std::path::Path;

use crate::codec::{decode_local_filename, LocalLayout, PARTIAL_SUFFIX};
use crate::domain::{validate_ticker, Dataset, Granularity, Period, PeriodSet};
use crate::error::DumpError;

pub struct LocalInventory<'a> {
    layout: &'a LocalLayout,
}

impl<'a> LocalInventory<'a> {
    pub fn new(layout: &'a LocalLayout) -> Self {
        Self { layout }
    }

    /// Periods present on disk for one granularity, in chronological order.
    pub fn scan_granularity(
        &self,
        ticker: &str,
        dataset: &Dataset,
        granularity: Granularity,
    ) -> Result<Vec<Period>, DumpError> {
        let dir = self.layout.granularity_dir(ticker, dataset, granularity);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut periods = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| DumpError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| DumpError::io(&dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let os_name = entry.file_name();
            let Some(name) = os_name.to_str() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };

            if name.ends_with(PARTIAL_SUFFIX) {
                tracing::debug!(name, "ignoring partially written file");
                continue;
            }

            match decode_local_filename(name) {
                Ok(decoded)
                    if decoded.matches(ticker, dataset) && decoded.granularity() == granularity =>
                {
                    periods.push(decoded.period);
                }
                Ok(_) => {
                    tracing::debug!(name, dir = %dir.display(), "ignoring file of another dataset");
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), "{e}; file ignored");
                }
            }
        }

        periods.sort();
        Ok(periods)
    }

    /// Both granularities for a ticker.
    pub fn scan(&self, ticker: &str, dataset: &Dataset) -> Result<PeriodSet, DumpError> {
        let mut set = PeriodSet::new();
        for granularity in [Granularity::Monthly, Granularity::Daily] {
            set.extend(self.scan_granularity(ticker, dataset, granularity)?);
        }
        Ok(set)
    }

    /// Tickers with a directory for this dataset and granularity, sorted.
    pub fn list_tickers(
        &self,
        dataset: &Dataset,
        granularity: Granularity,
    ) -> Result<Vec<String>, DumpError> {
        let root = self.layout.root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut tickers = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| DumpError::io(root, e))? {
            let entry = entry.map_err(|e| DumpError::io(root, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_ticker(&name).is_err() {
                continue;
            }
            if is_dir(&self.layout.granularity_dir(&name, dataset, granularity)) {
                tickers.push(name);
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

fn is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
