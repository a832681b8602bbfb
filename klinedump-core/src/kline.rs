//! Reader for materialized kline files.
//!
//! Files are the upstream payload verbatim: twelve columns, no header for
//! spot, a header row for futures.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};

use crate::error::DumpError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineRow {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
    pub ignore: String,
}

pub const KLINE_COLUMNS: usize = 12;

/// A header row has a non-numeric first column.
fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|first| first.trim().parse::<i64>().is_err())
        .unwrap_or(false)
}

pub fn read_klines(path: &Path) -> Result<Vec<KlineRow>, DumpError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        if i == 0 && is_header(&record) {
            continue;
        }
        if record.len() != KLINE_COLUMNS {
            return Err(DumpError::InvalidArgument(format!(
                "{}: row {} has {} columns, expected {KLINE_COLUMNS}",
                path.display(),
                i + 1,
                record.len()
            )));
        }
        let row: KlineRow = record
            .deserialize(None)
            .map_err(|e| csv_error(path, e))?;
        rows.push(row);
    }
    Ok(rows)
}

fn csv_error(path: &Path, e: csv::Error) -> DumpError {
    match e.into_kind() {
        csv::ErrorKind::Io(source) => DumpError::io(path, source),
        other => DumpError::InvalidArgument(format!("{}: {other:?}", path.display())),
    }
}

/// Short description of a kline file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KlineSummary {
    pub rows: usize,
    pub first_open_time: i64,
    pub last_close_time: i64,
    pub low: f64,
    pub high: f64,
    pub volume: f64,
    pub trades: u64,
}

pub fn summarize(rows: &[KlineRow]) -> Option<KlineSummary> {
    let first = rows.first()?;
    let last = rows.last()?;
    Some(KlineSummary {
        rows: rows.len(),
        first_open_time: first.open_time,
        last_close_time: last.close_time,
        low: rows.iter().map(|r| r.low).fold(f64::INFINITY, f64::min),
        high: rows.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max),
        volume: rows.iter().map(|r| r.volume).sum(),
        trades: rows.iter().map(|r| r.trade_count).sum(),
    })
}
