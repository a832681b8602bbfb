//! klinedump runner: multi-ticker dumps over `klinedump-core`.
//!
//! - TOML configuration with validated defaults
//! - Ticker selection (explicit lists or exchange discovery)
//! - Parallel per-ticker plan/fetch on a rayon pool
//! - Pruning of daily files superseded by monthly files
//! - Post-dump statistics

pub mod config;
pub mod dumper;
pub mod stats;
pub mod tickers;

pub use config::{ConfigError, DumperConfig};
pub use dumper::{DeletionSummary, DumpOptions, DumpSummary, Dumper};
pub use stats::{DumpStatistics, TickerStats};
pub use tickers::{discover, TickerFilter};
