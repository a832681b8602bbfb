#![allow(dead_code)]

use chrono::NaiveDate;
use klinedump_core::domain::{ArchiveRef, Dataset, Period, YearMonth};
use klinedump_core::remote::MemorySource;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

pub fn row_for(period: Period) -> Vec<u8> {
    format!("{period},1,2,0.5,1.5,10,{period},15,3,4,6,0\n").into_bytes()
}

pub fn publish_month(source: &MemorySource, ticker: &str, dataset: Dataset, month: YearMonth) {
    let archive = ArchiveRef::new(ticker, dataset, Period::Month(month));
    source.publish(&archive, &row_for(archive.period)).unwrap();
}

pub fn publish_days(
    source: &MemorySource,
    ticker: &str,
    dataset: Dataset,
    from: NaiveDate,
    to: NaiveDate,
) {
    for day in from.iter_days().take_while(|x| *x <= to) {
        let archive = ArchiveRef::new(ticker, dataset, Period::Day(day));
        source.publish(&archive, &row_for(archive.period)).unwrap();
    }
}
