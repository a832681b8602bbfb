//! Which tickers a dump covers.

use klinedump_core::remote::SymbolInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerFilter {
    pub quote_asset: String,
    pub exclude: Vec<String>,
    pub max_tickers: Option<usize>,
}

impl TickerFilter {
    /// Drop excluded tickers, then truncate, keeping input order.
    pub fn apply(&self, tickers: impl IntoIterator<Item = String>) -> Vec<String> {
        let kept = tickers
            .into_iter()
            .filter(|t| !self.exclude.iter().any(|e| e == t));
        match self.max_tickers {
            Some(max) => kept.take(max).collect(),
            None => kept.collect(),
        }
    }
}

/// Currently tradable symbols quoted in the filter's quote asset, in listing order.
pub fn discover(symbols: &[SymbolInfo], filter: &TickerFilter) -> Vec<String> {
    let quoted = symbols
        .iter()
        .filter(|s| s.tradable && s.quote_asset == filter.quote_asset)
        .map(|s| s.symbol.clone());
    let mut seen = std::collections::HashSet::new();
    filter.apply(quoted.filter(|s| seen.insert(s.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn symbol(name: &str, quote: &str) -> SymbolInfo {
        SymbolInfo {
            symbol: name.to_string(),
            quote_asset: quote.to_string(),
            tradable: true,
        }
    }

    #[test]
    fn discovery_filters_quote_exclude_and_max() {
        let symbols = vec![
            symbol("BTCUSDT", "USDT"),
            symbol("ETHBTC", "BTC"),
            symbol("ETHUSDT", "USDT"),
            symbol("BNBUSDT", "USDT"),
            symbol("XRPUSDT", "USDT"),
        ];
        let filter = TickerFilter {
            quote_asset: "USDT".into(),
            exclude: vec!["ETHUSDT".into()],
            max_tickers: Some(2),
        };
        assert_eq!(discover(&symbols, &filter), vec!["BTCUSDT", "BNBUSDT"]);
    }

    #[test]
    fn discovery_skips_halted_symbols() {
        let mut halted = symbol("LUNAUSDT", "USDT");
        halted.tradable = false;
        let symbols = vec![symbol("BTCUSDT", "USDT"), halted];
        let filter = TickerFilter {
            quote_asset: "USDT".into(),
            ..TickerFilter::default()
        };
        assert_eq!(discover(&symbols, &filter), vec!["BTCUSDT"]);
    }

    #[test]
    fn explicit_lists_keep_their_order() {
        let filter = TickerFilter {
            quote_asset: "USDT".into(),
            exclude: vec!["B".into()],
            max_tickers: None,
        };
        let kept = filter.apply(["C", "B", "A"].map(String::from));
        assert_eq!(kept, vec!["C", "A"]);
    }

    proptest! {
        #[test]
        fn filter_respects_exclude_and_max(
            tickers in prop::collection::vec("[A-C]{1,2}USDT", 0..20),
            exclude in prop::collection::vec("[A-C]{1,2}USDT", 0..4),
            max in prop::option::of(0usize..10),
        ) {
            let filter = TickerFilter { quote_asset: "USDT".into(), exclude: exclude.clone(), max_tickers: max };
            let kept = filter.apply(tickers.clone());
            prop_assert!(kept.iter().all(|t| !exclude.contains(t)));
            if let Some(max) = max {
                prop_assert!(kept.len() <= max);
            }
            let expected: Vec<&String> = tickers.iter().filter(|t| !exclude.contains(t)).collect();
            prop_assert!(kept.iter().zip(expected).all(|(a, b)| a == b));
        }
    }
}
