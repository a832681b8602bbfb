//! Archive source trait.
//!
//! The ArchiveSource trait abstracts over where archives come from (the public
//! bucket, a mirror, an in-memory fake) so the planner and executor can be
//! exercised without network access. Sources know nothing about the local tree.

use serde::{Deserialize, Serialize};

use crate::domain::AssetClass;
use crate::error::DumpError;

/// A listed trading pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub quote_asset: String,
    /// Currently trading (not halted, settled or delisted).
    pub tradable: bool,
}

pub trait ArchiveSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Every object key under `prefix`, in listing order.
    ///
    /// An unknown prefix is an empty listing, not an error.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, DumpError>;

    /// Raw archive bytes for `key`. Absent objects yield `RemoteNotFound`.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, DumpError>;

    /// All symbols listed for the asset class.
    fn list_symbols(&self, asset_class: AssetClass) -> Result<Vec<SymbolInfo>, DumpError>;

    /// Whether the source currently accepts requests (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
