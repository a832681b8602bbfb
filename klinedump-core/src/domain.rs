//! Domain types: what an archive is about and which period it covers.
//!
//! A [`Dataset`] fixes the asset class, data type and (for kline variants)
//! candle frequency. Together with a ticker and a [`Period`] it identifies
//! exactly one remote archive ([`ArchiveRef`]) and one local file.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::DumpError;

// ── Asset class ─────────────────────────────────────────────────────

/// Market segment the archives belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Spot,
    /// USD-M futures.
    Um,
    /// COIN-M futures.
    Cm,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Spot, AssetClass::Um, AssetClass::Cm];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Spot => "spot",
            AssetClass::Um => "um",
            AssetClass::Cm => "cm",
        }
    }

    /// Segment under `data/` in remote object keys.
    pub fn remote_prefix(self) -> &'static str {
        match self {
            AssetClass::Spot => "spot",
            AssetClass::Um => "futures/um",
            AssetClass::Cm => "futures/cm",
        }
    }

    /// Data types published for this asset class.
    pub fn data_types(self) -> &'static [DataType] {
        use DataType::*;
        match self {
            AssetClass::Spot => &[AggTrades, Klines, Trades],
            AssetClass::Cm => &[
                AggTrades,
                Klines,
                Trades,
                IndexPriceKlines,
                MarkPriceKlines,
                PremiumIndexKlines,
            ],
            AssetClass::Um => &[
                AggTrades,
                Klines,
                Trades,
                IndexPriceKlines,
                MarkPriceKlines,
                PremiumIndexKlines,
                Metrics,
            ],
        }
    }

    pub fn supports(self, data_type: DataType) -> bool {
        self.data_types().contains(&data_type)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetClass::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DumpError::InvalidArgument(format!("unknown asset class: {s}")))
    }
}

// ── Data type ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    AggTrades,
    Klines,
    Trades,
    IndexPriceKlines,
    MarkPriceKlines,
    PremiumIndexKlines,
    Metrics,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        DataType::AggTrades,
        DataType::Klines,
        DataType::Trades,
        DataType::IndexPriceKlines,
        DataType::MarkPriceKlines,
        DataType::PremiumIndexKlines,
        DataType::Metrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::AggTrades => "aggTrades",
            DataType::Klines => "klines",
            DataType::Trades => "trades",
            DataType::IndexPriceKlines => "indexPriceKlines",
            DataType::MarkPriceKlines => "markPriceKlines",
            DataType::PremiumIndexKlines => "premiumIndexKlines",
            DataType::Metrics => "metrics",
        }
    }

    /// Kline variants are published per candle interval.
    pub fn requires_frequency(self) -> bool {
        matches!(
            self,
            DataType::Klines
                | DataType::IndexPriceKlines
                | DataType::MarkPriceKlines
                | DataType::PremiumIndexKlines
        )
    }

    /// `metrics` is only ever published as daily archives.
    pub fn has_monthly(self) -> bool {
        !matches!(self, DataType::Metrics)
    }

    /// Trade-level archives are large; callers use fewer workers for them.
    pub fn is_trade_level(self) -> bool {
        matches!(self, DataType::AggTrades | DataType::Trades)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| DumpError::InvalidArgument(format!("unknown data type: {s}")))
    }
}

// ── Frequency ───────────────────────────────────────────────────────

/// Candle interval of a kline archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "3m")]
    Min3,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "8h")]
    Hour8,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "3d")]
    Day3,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
}

impl Frequency {
    pub const ALL: [Frequency; 15] = [
        Frequency::Min1,
        Frequency::Min3,
        Frequency::Min5,
        Frequency::Min15,
        Frequency::Min30,
        Frequency::Hour1,
        Frequency::Hour2,
        Frequency::Hour4,
        Frequency::Hour6,
        Frequency::Hour8,
        Frequency::Hour12,
        Frequency::Day1,
        Frequency::Day3,
        Frequency::Week1,
        Frequency::Month1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Min1 => "1m",
            Frequency::Min3 => "3m",
            Frequency::Min5 => "5m",
            Frequency::Min15 => "15m",
            Frequency::Min30 => "30m",
            Frequency::Hour1 => "1h",
            Frequency::Hour2 => "2h",
            Frequency::Hour4 => "4h",
            Frequency::Hour6 => "6h",
            Frequency::Hour8 => "8h",
            Frequency::Hour12 => "12h",
            Frequency::Day1 => "1d",
            Frequency::Day3 => "3d",
            Frequency::Week1 => "1w",
            Frequency::Month1 => "1mo",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DumpError::InvalidArgument(format!("unknown data frequency: {s}")))
    }
}

// ── Granularity ─────────────────────────────────────────────────────

/// The date unit one archive covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Granularity::Daily),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(DumpError::InvalidArgument(format!("unknown granularity: {s}"))),
        }
    }
}

// ── Calendar month ──────────────────────────────────────────────────

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(YearMonth)
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        YearMonth(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn last_day(self) -> NaiveDate {
        self.0 + Months::new(1) - Days::new(1)
    }

    pub fn succ(self) -> Self {
        YearMonth(self.0 + Months::new(1))
    }

    pub fn pred(self) -> Self {
        YearMonth(self.0 - Months::new(1))
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        YearMonth::of(date) == self
    }

    pub fn num_days(self) -> u32 {
        self.last_day().day()
    }

    /// Every day of the month in ascending order.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.0.iter_days().take_while(move |d| *d <= last)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for YearMonth {
    type Err = DumpError;

    /// Strict `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DumpError::InvalidArgument(format!("expected YYYY-MM, got '{s}'"));
        let (y, m) = s.split_once('-').ok_or_else(bad)?;
        if y.len() != 4 || m.len() != 2 || !is_digits(y) || !is_digits(m) {
            return Err(bad());
        }
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        YearMonth::new(year, month).ok_or_else(bad)
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = DumpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Strict `YYYY-MM-DD`.
pub fn parse_day(s: &str) -> Result<NaiveDate, DumpError> {
    let bad = || DumpError::InvalidArgument(format!("expected YYYY-MM-DD, got '{s}'"));
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [y, m, d] if y.len() == 4 && m.len() == 2 && d.len() == 2 => {
            if !is_digits(y) || !is_digits(m) || !is_digits(d) {
                return Err(bad());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| bad())
        }
        _ => Err(bad()),
    }
}

pub(crate) fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ── Period ──────────────────────────────────────────────────────────

/// The date span one archive covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day(NaiveDate),
    Month(YearMonth),
}

impl Period {
    pub fn granularity(self) -> Granularity {
        match self {
            Period::Day(_) => Granularity::Daily,
            Period::Month(_) => Granularity::Monthly,
        }
    }

    pub fn first_day(self) -> NaiveDate {
        match self {
            Period::Day(d) => d,
            Period::Month(m) => m.first_day(),
        }
    }

    pub fn last_day(self) -> NaiveDate {
        match self {
            Period::Day(d) => d,
            Period::Month(m) => m.last_day(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.first_day() <= date && date <= self.last_day()
    }

    /// Parse `YYYY-MM-DD` as a day or `YYYY-MM` as a month.
    pub fn parse(s: &str) -> Result<Self, DumpError> {
        match s.len() {
            10 => parse_day(s).map(Period::Day),
            7 => s.parse().map(Period::Month),
            _ => Err(DumpError::InvalidArgument(format!(
                "expected YYYY-MM-DD or YYYY-MM, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Period::Month(m) => m.fmt(f),
        }
    }
}

/// Chronological by first day; a month sorts before the days it contains.
impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = |p: &Period| match p {
            Period::Month(_) => 0u8,
            Period::Day(_) => 1u8,
        };
        self.first_day()
            .cmp(&other.first_day())
            .then_with(|| rank(self).cmp(&rank(other)))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Period sets ─────────────────────────────────────────────────────

/// Daily and monthly periods held somewhere: on disk or upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodSet {
    pub daily: BTreeSet<NaiveDate>,
    pub monthly: BTreeSet<YearMonth>,
}

impl PeriodSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, period: Period) -> bool {
        match period {
            Period::Day(d) => self.daily.insert(d),
            Period::Month(m) => self.monthly.insert(m),
        }
    }

    pub fn contains(&self, period: Period) -> bool {
        match period {
            Period::Day(d) => self.daily.contains(&d),
            Period::Month(m) => self.monthly.contains(&m),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.monthly.is_empty()
    }

    pub fn len(&self) -> usize {
        self.daily.len() + self.monthly.len()
    }

    /// First day covered by any period in the set.
    pub fn earliest_day(&self) -> Option<NaiveDate> {
        let first_month = self.monthly.first().map(|m| m.first_day());
        let first_day = self.daily.first().copied();
        match (first_month, first_day) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Periods of one granularity in chronological order.
    pub fn periods(&self, granularity: Granularity) -> Vec<Period> {
        match granularity {
            Granularity::Daily => self.daily.iter().copied().map(Period::Day).collect(),
            Granularity::Monthly => self.monthly.iter().copied().map(Period::Month).collect(),
        }
    }
}

impl Extend<Period> for PeriodSet {
    fn extend<I: IntoIterator<Item = Period>>(&mut self, iter: I) {
        for period in iter {
            self.insert(period);
        }
    }
}

impl FromIterator<Period> for PeriodSet {
    fn from_iter<I: IntoIterator<Item = Period>>(iter: I) -> Self {
        let mut set = PeriodSet::new();
        set.extend(iter);
        set
    }
}

// ── Dataset ─────────────────────────────────────────────────────────

/// A validated (asset class, data type, frequency) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    asset_class: AssetClass,
    data_type: DataType,
    frequency: Option<Frequency>,
}

impl Dataset {
    /// Fails with `InvalidArgument` on any combination the remote never publishes.
    pub fn new(
        asset_class: AssetClass,
        data_type: DataType,
        frequency: Option<Frequency>,
    ) -> Result<Self, DumpError> {
        if !asset_class.supports(data_type) {
            return Err(DumpError::InvalidArgument(format!(
                "data type {data_type} is not published for asset class {asset_class}"
            )));
        }
        match (data_type.requires_frequency(), frequency) {
            (true, None) => Err(DumpError::InvalidArgument(format!(
                "data type {data_type} requires a frequency"
            ))),
            (false, Some(f)) => Err(DumpError::InvalidArgument(format!(
                "data type {data_type} does not take a frequency (got {f})"
            ))),
            _ => Ok(Self {
                asset_class,
                data_type,
                frequency,
            }),
        }
    }

    /// Spot klines at the given frequency.
    pub fn spot_klines(frequency: Frequency) -> Self {
        Self {
            asset_class: AssetClass::Spot,
            data_type: DataType::Klines,
            frequency: Some(frequency),
        }
    }

    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    /// Middle token of upstream archive names: the frequency for kline
    /// variants, the data type otherwise.
    pub fn upstream_tag(&self) -> &'static str {
        match self.frequency {
            Some(f) => f.as_str(),
            None => self.data_type.as_str(),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_class, self.data_type)?;
        if let Some(freq) = self.frequency {
            write!(f, "/{freq}")?;
        }
        Ok(())
    }
}

/// Binance symbols are ASCII alphanumerics, with `_` in delivery contracts.
pub fn validate_ticker(ticker: &str) -> Result<(), DumpError> {
    if !ticker.is_empty()
        && ticker
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        Ok(())
    } else {
        Err(DumpError::InvalidArgument(format!(
            "invalid ticker symbol: '{ticker}'"
        )))
    }
}

// ── Archive reference ───────────────────────────────────────────────

/// One remote archive: a ticker's dataset over one period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveRef {
    pub ticker: String,
    pub dataset: Dataset,
    pub period: Period,
}

impl ArchiveRef {
    pub fn new(ticker: impl Into<String>, dataset: Dataset, period: Period) -> Self {
        Self {
            ticker: ticker.into(),
            dataset,
            period,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.period.granularity()
    }
}

impl fmt::Display for ArchiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.ticker,
            self.dataset,
            self.granularity(),
            self.period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn year_month_boundaries() {
        let feb = YearMonth::new(2024, 2).unwrap();
        assert_eq!(feb.last_day(), d(2024, 2, 29));
        assert_eq!(feb.num_days(), 29);
        assert_eq!(feb.days().count(), 29);
        assert_eq!(feb.succ(), YearMonth::new(2024, 3).unwrap());
        assert_eq!(YearMonth::new(2024, 1).unwrap().pred(), YearMonth::new(2023, 12).unwrap());
        assert_eq!(YearMonth::of(d(2021, 12, 31)), YearMonth::new(2021, 12).unwrap());
        assert!(feb.contains(d(2024, 2, 1)));
        assert!(!feb.contains(d(2024, 3, 1)));
    }

    #[test]
    fn year_month_parse_is_strict() {
        assert_eq!("2021-06".parse::<YearMonth>().unwrap().to_string(), "2021-06");
        assert!("2021-6".parse::<YearMonth>().is_err());
        assert!("2021-13".parse::<YearMonth>().is_err());
        assert!("21-06".parse::<YearMonth>().is_err());
        assert!("2021-0a".parse::<YearMonth>().is_err());
    }

    #[test]
    fn parse_day_is_strict() {
        assert_eq!(parse_day("2021-02-28").unwrap(), d(2021, 2, 28));
        assert!(parse_day("2021-02-30").is_err());
        assert!(parse_day("2021-2-28").is_err());
        assert!(parse_day("2021-02-28x").is_err());
    }

    #[test]
    fn month_sorts_before_its_days() {
        let month = Period::Month(YearMonth::new(2021, 3).unwrap());
        let first = Period::Day(d(2021, 3, 1));
        let earlier = Period::Day(d(2021, 2, 28));
        let mut v = vec![first, month, earlier];
        v.sort();
        assert_eq!(v, vec![earlier, month, first]);
    }

    #[test]
    fn dataset_rejects_illegal_combinations() {
        assert!(Dataset::new(AssetClass::Spot, DataType::Klines, None).is_err());
        assert!(Dataset::new(AssetClass::Spot, DataType::Trades, Some(Frequency::Min1)).is_err());
        assert!(Dataset::new(AssetClass::Spot, DataType::Metrics, None).is_err());
        assert!(Dataset::new(AssetClass::Um, DataType::Metrics, None).is_ok());
        assert!(Dataset::new(AssetClass::Cm, DataType::MarkPriceKlines, Some(Frequency::Hour1)).is_ok());
    }

    #[test]
    fn upstream_tag_prefers_frequency() {
        assert_eq!(Dataset::spot_klines(Frequency::Min15).upstream_tag(), "15m");
        let trades = Dataset::new(AssetClass::Spot, DataType::AggTrades, None).unwrap();
        assert_eq!(trades.upstream_tag(), "aggTrades");
    }

    #[test]
    fn enums_parse_from_their_wire_names() {
        for f in Frequency::ALL {
            assert_eq!(f.as_str().parse::<Frequency>().unwrap(), f);
        }
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert_eq!("um".parse::<AssetClass>().unwrap(), AssetClass::Um);
        assert!("futures".parse::<AssetClass>().is_err());
    }

    #[test]
    fn period_set_earliest_day_spans_granularities() {
        let mut set = PeriodSet::new();
        assert_eq!(set.earliest_day(), None);
        set.insert(Period::Day(d(2021, 3, 5)));
        set.insert(Period::Month(YearMonth::new(2021, 2).unwrap()));
        assert_eq!(set.earliest_day(), Some(d(2021, 2, 1)));
        assert_eq!(set.len(), 2);
        assert!(set.contains(Period::Day(d(2021, 3, 5))));
        assert!(!set.contains(Period::Month(YearMonth::new(2021, 3).unwrap())));
    }

    #[test]
    fn ticker_validation() {
        assert!(validate_ticker("BTCUSDT").is_ok());
        assert!(validate_ticker("BTCUSD_PERP").is_ok());
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("../etc").is_err());
        assert!(validate_ticker("BTC-USDT").is_err());
    }
}
