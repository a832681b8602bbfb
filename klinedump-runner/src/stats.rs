//! Post-dump statistics: how much new data each ticker received.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Below this many tickers every ticker gets its own line.
pub const FULL_REPORT_LIMIT: usize = 50;
const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerStats {
    pub ticker: String,
    pub months: usize,
    pub days: usize,
}

impl TickerStats {
    pub fn has_new_data(&self) -> bool {
        self.months > 0 || self.days > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DumpStatistics {
    Full { per_ticker: Vec<TickerStats> },
    Short {
        tickers: usize,
        with_new_data: usize,
        without_new_data: usize,
        /// (months saved, tickers) most common first.
        top_months: Vec<(usize, usize)>,
        /// (days saved, tickers) most common first.
        top_days: Vec<(usize, usize)>,
    },
}

impl DumpStatistics {
    pub fn from_tickers(stats: Vec<TickerStats>) -> Self {
        if stats.len() < FULL_REPORT_LIMIT {
            return DumpStatistics::Full { per_ticker: stats };
        }
        let with_new_data = stats.iter().filter(|s| s.has_new_data()).count();
        DumpStatistics::Short {
            tickers: stats.len(),
            with_new_data,
            without_new_data: stats.len() - with_new_data,
            top_months: most_common(stats.iter().map(|s| s.months)),
            top_days: most_common(stats.iter().map(|s| s.days)),
        }
    }

    pub fn log(&self) {
        for line in self.to_string().lines() {
            tracing::info!("{line}");
        }
    }
}

/// Value frequencies, highest count first, ties broken by smaller value.
fn most_common(values: impl Iterator<Item = usize>) -> Vec<(usize, usize)> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut pairs: Vec<(usize, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    pairs.truncate(TOP_N);
    pairs
}

impl fmt::Display for DumpStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpStatistics::Full { per_ticker: stats } => {
                writeln!(f, "Tried to dump data for {} tickers:", stats.len())?;
                for s in stats {
                    writeln!(
                        f,
                        "  {}: new data saved for {} months {} days",
                        s.ticker, s.months, s.days
                    )?;
                }
                Ok(())
            }
            DumpStatistics::Short {
                tickers,
                with_new_data,
                without_new_data,
                top_months,
                top_days,
            } => {
                writeln!(f, "Tried to dump data for {tickers} tickers:")?;
                writeln!(f, "  new data saved for {with_new_data} tickers")?;
                writeln!(f, "  no new data for {without_new_data} tickers")?;
                writeln!(f, "  most common months saved (months: tickers):")?;
                for (months, count) in top_months {
                    writeln!(f, "    {months}: {count}")?;
                }
                writeln!(f, "  most common days saved (days: tickers):")?;
                for (days, count) in top_days {
                    writeln!(f, "    {days}: {count}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(n: usize) -> Vec<TickerStats> {
        (0..n)
            .map(|i| TickerStats {
                ticker: format!("T{i}USDT"),
                months: if i % 10 == 0 { 0 } else { 12 },
                days: i % 3,
            })
            .collect()
    }

    #[test]
    fn few_tickers_get_full_report() {
        let report = DumpStatistics::from_tickers(stats(3));
        let text = report.to_string();
        assert!(matches!(report, DumpStatistics::Full { ref per_ticker } if per_ticker.len() == 3));
        assert!(text.contains("T1USDT: new data saved for 12 months 1 days"));
    }

    #[test]
    fn many_tickers_get_short_report() {
        let report = DumpStatistics::from_tickers(stats(60));
        match report {
            DumpStatistics::Short {
                tickers,
                with_new_data,
                without_new_data,
                ref top_months,
                ref top_days,
            } => {
                assert_eq!(tickers, 60);
                // Tickers 0 and 30 get neither months nor days.
                assert_eq!(without_new_data, 2);
                assert_eq!(with_new_data, 58);
                assert_eq!(top_months[0], (12, 54));
                assert_eq!(top_days.len(), 3);
            }
            DumpStatistics::Full { .. } => panic!("expected short report"),
        }
    }

    #[test]
    fn statistics_serialize_with_kind_tag() {
        let json = serde_json::to_value(DumpStatistics::from_tickers(stats(2))).unwrap();
        assert_eq!(json["kind"], "full");
        assert_eq!(json["per_ticker"][1]["months"], 12);

        let json = serde_json::to_value(DumpStatistics::from_tickers(stats(50))).unwrap();
        assert_eq!(json["kind"], "short");
        assert_eq!(json["tickers"], 50);
    }
}
