//! Path/name codec: (ticker, dataset, period) ⇄ remote keys and local paths.
//!
//! Remote layout (upstream naming):
//! `data/{asset}/{granularity}/{dataType}/{TICKER}/[{freq}/]{TICKER}-{freq|dataType}-{date}.zip`
//!
//! Local layout: `{root}/{TICKER}/{dataType}/[{freq}/]{granularity}/{TICKER}-{dataType}[-{freq}]-{date}.csv`
//!
//! Dates are zero-padded (`YYYY-MM-DD` daily, `YYYY-MM` monthly), so within one
//! directory lexicographic file order is chronological order.

use std::path::{Path, PathBuf};

use crate::domain::{
    parse_day, validate_ticker, ArchiveRef, DataType, Dataset, Frequency, Granularity, Period,
    YearMonth,
};
use crate::error::DumpError;

pub const LOCAL_EXTENSION: &str = "csv";
pub const ARCHIVE_EXTENSION: &str = "zip";
/// Suffix appended to a local path while it is being materialized.
pub const PARTIAL_SUFFIX: &str = "part";

// ── Names ───────────────────────────────────────────────────────────

/// Everything a local file name encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalName {
    pub ticker: String,
    pub data_type: DataType,
    pub frequency: Option<Frequency>,
    pub period: Period,
}

impl LocalName {
    pub fn granularity(&self) -> Granularity {
        self.period.granularity()
    }

    /// Whether this name belongs to the given ticker and dataset.
    pub fn matches(&self, ticker: &str, dataset: &Dataset) -> bool {
        self.ticker == ticker
            && self.data_type == dataset.data_type()
            && self.frequency == dataset.frequency()
    }
}

/// Everything an upstream archive name encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteName {
    pub ticker: String,
    /// Frequency for kline variants, data type otherwise.
    pub tag: String,
    pub period: Period,
}

pub fn local_filename(ticker: &str, dataset: &Dataset, period: Period) -> String {
    match dataset.frequency() {
        Some(freq) => format!(
            "{ticker}-{}-{freq}-{period}.{LOCAL_EXTENSION}",
            dataset.data_type()
        ),
        None => format!("{ticker}-{}-{period}.{LOCAL_EXTENSION}", dataset.data_type()),
    }
}

/// Inverse of [`local_filename`].
pub fn decode_local_filename(name: &str) -> Result<LocalName, DumpError> {
    let malformed = || DumpError::malformed(name);

    let stem = name
        .strip_suffix(LOCAL_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(malformed)?;
    let tokens: Vec<&str> = stem.split('-').collect();
    if tokens.len() < 4 {
        return Err(malformed());
    }

    let ticker = tokens[0];
    validate_ticker(ticker).map_err(|_| malformed())?;
    let data_type: DataType = tokens[1].parse().map_err(|_| malformed())?;

    let (frequency, date_tokens) = if data_type.requires_frequency() {
        let freq: Frequency = tokens[2].parse().map_err(|_| malformed())?;
        (Some(freq), &tokens[3..])
    } else {
        (None, &tokens[2..])
    };

    let period = parse_date_tokens(date_tokens).ok_or_else(malformed)?;

    Ok(LocalName {
        ticker: ticker.to_string(),
        data_type,
        frequency,
        period,
    })
}

/// `{TICKER}-{tag}-{date}`, the stem of upstream archive and payload names.
pub fn upstream_stem(ticker: &str, dataset: &Dataset, period: Period) -> String {
    format!("{ticker}-{}-{period}", dataset.upstream_tag())
}

/// Decode the final segment of a listing key, e.g. `BTCUSDT-1m-2021-01.zip`.
///
/// Only `.zip` entries decode; checksum siblings and anything else fail.
pub fn decode_remote_name(name: &str) -> Result<RemoteName, DumpError> {
    let malformed = || DumpError::malformed(name);

    let stem = name
        .strip_suffix(ARCHIVE_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(malformed)?;
    let tokens: Vec<&str> = stem.split('-').collect();
    let n = tokens.len();
    if n < 4 {
        return Err(malformed());
    }

    // A daily name ends in three date tokens, a monthly name in two.
    let (head, period) = if n >= 5 {
        match parse_date_tokens(&tokens[n - 3..]) {
            Some(p) => (&tokens[..n - 3], p),
            None => (
                &tokens[..n - 2],
                parse_date_tokens(&tokens[n - 2..]).ok_or_else(malformed)?,
            ),
        }
    } else {
        (
            &tokens[..n - 2],
            parse_date_tokens(&tokens[n - 2..]).ok_or_else(malformed)?,
        )
    };

    match head {
        [ticker, tag] if validate_ticker(ticker).is_ok() && !tag.is_empty() => Ok(RemoteName {
            ticker: ticker.to_string(),
            tag: tag.to_string(),
            period,
        }),
        _ => Err(malformed()),
    }
}

fn parse_date_tokens(tokens: &[&str]) -> Option<Period> {
    match tokens.len() {
        3 => parse_day(&tokens.join("-")).ok().map(Period::Day),
        2 => tokens.join("-").parse::<YearMonth>().ok().map(Period::Month),
        _ => None,
    }
}

// ── Remote keys ─────────────────────────────────────────────────────

/// Listing prefix for one ticker/dataset/granularity, with trailing `/`.
pub fn remote_dir(ticker: &str, dataset: &Dataset, granularity: Granularity) -> String {
    let mut dir = format!(
        "data/{}/{granularity}/{}/{ticker}/",
        dataset.asset_class().remote_prefix(),
        dataset.data_type()
    );
    if let Some(freq) = dataset.frequency() {
        dir.push_str(freq.as_str());
        dir.push('/');
    }
    dir
}

pub fn remote_key(archive: &ArchiveRef) -> String {
    format!(
        "{}{}.{ARCHIVE_EXTENSION}",
        remote_dir(&archive.ticker, &archive.dataset, archive.granularity()),
        upstream_stem(&archive.ticker, &archive.dataset, archive.period)
    )
}

// ── Local layout ────────────────────────────────────────────────────

/// Canonical local tree rooted at a caller-supplied directory.
///
/// One root holds one asset class; the asset class is not part of local paths.
#[derive(Debug, Clone)]
pub struct LocalLayout {
    root: PathBuf,
}

impl LocalLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.root.join(ticker)
    }

    /// `{root}/{TICKER}/{dataType}/[{freq}/]{granularity}`
    pub fn granularity_dir(
        &self,
        ticker: &str,
        dataset: &Dataset,
        granularity: Granularity,
    ) -> PathBuf {
        let mut dir = self
            .ticker_dir(ticker)
            .join(dataset.data_type().as_str());
        if let Some(freq) = dataset.frequency() {
            dir.push(freq.as_str());
        }
        dir.join(granularity.as_str())
    }

    pub fn path(&self, ticker: &str, dataset: &Dataset, period: Period) -> PathBuf {
        self.granularity_dir(ticker, dataset, period.granularity())
            .join(local_filename(ticker, dataset, period))
    }

    pub fn path_for(&self, archive: &ArchiveRef) -> PathBuf {
        self.path(&archive.ticker, &archive.dataset, archive.period)
    }

    /// Temporary sibling used while writing `path_for(archive)`.
    pub fn partial_path_for(&self, archive: &ArchiveRef) -> PathBuf {
        let mut name = local_filename(&archive.ticker, &archive.dataset, archive.period);
        name.push('.');
        name.push_str(PARTIAL_SUFFIX);
        self.granularity_dir(&archive.ticker, &archive.dataset, archive.granularity())
            .join(name)
    }
}
