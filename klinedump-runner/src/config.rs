//! Dumper configuration, loaded from TOML.
//!
//! Every field is optional; a missing file section falls back to defaults:
//!
//! ```toml
//! root = "data/spot"
//! asset_class = "spot"
//! data_type = "klines"
//! frequency = "1h"
//! exclude = ["USDCUSDT"]
//! max_tickers = 20
//!
//! [remote]
//! max_retries = 5
//!
//! [logging]
//! verbose = true
//! log_dir = "data"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use klinedump_core::domain::{validate_ticker, AssetClass, DataType, Dataset, Frequency};
use klinedump_core::logging::LogConfig;
use klinedump_core::remote::VisionSettings;
use klinedump_core::DumpError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] DumpError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumperConfig {
    /// Root of the local tree for this asset class.
    pub root: PathBuf,
    pub asset_class: AssetClass,
    pub data_type: DataType,
    /// Only used by kline data types.
    pub frequency: Frequency,
    /// Quote asset for ticker discovery when no tickers are given.
    pub quote_asset: String,
    pub tickers: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub max_tickers: Option<usize>,
    /// Worker threads across tickers. Defaults by data type.
    pub threads: Option<usize>,
    pub update_existing: bool,
    /// Prune superseded daily files after each dump.
    pub delete_outdated: bool,
    pub remote: VisionSettings,
    pub logging: LogConfig,
}

impl Default for DumperConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data").join(AssetClass::Spot.as_str()),
            asset_class: AssetClass::Spot,
            data_type: DataType::Klines,
            frequency: Frequency::Min1,
            quote_asset: "USDT".to_string(),
            tickers: None,
            exclude: Vec::new(),
            max_tickers: None,
            threads: None,
            update_existing: false,
            delete_outdated: false,
            remote: VisionSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl DumperConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DumperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The configured dataset; the frequency is dropped for non-kline types.
    pub fn dataset(&self) -> Result<Dataset, DumpError> {
        let frequency = self
            .data_type
            .requires_frequency()
            .then_some(self.frequency);
        Dataset::new(self.asset_class, self.data_type, frequency)
    }

    /// Trade-level archives are large, so they default to a single worker.
    pub fn thread_count(&self) -> usize {
        match self.threads {
            Some(n) => n.max(1),
            None if self.data_type.is_trade_level() => 1,
            None => 4,
        }
    }

    pub fn validate(&self) -> Result<(), DumpError> {
        self.dataset()?;
        if self.threads == Some(0) {
            return Err(DumpError::InvalidArgument("threads must be at least 1".into()));
        }
        for ticker in self.tickers.iter().flatten() {
            validate_ticker(ticker)?;
        }
        if self.quote_asset.is_empty() {
            return Err(DumpError::InvalidArgument("quote_asset must not be empty".into()));
        }
        Ok(())
    }
}
