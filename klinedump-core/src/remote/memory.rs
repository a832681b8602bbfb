//! In-memory archive source.
//!
//! Holds archives keyed exactly like the public bucket, so the manifest reader,
//! planner and executor run against it unchanged. Keys can be marked as
//! failing to simulate transport errors.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::archive::pack;
use super::provider::{ArchiveSource, SymbolInfo};
use crate::codec::{remote_key, upstream_stem};
use crate::domain::{ArchiveRef, AssetClass};
use crate::error::DumpError;

#[derive(Default)]
struct Store {
    objects: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<String>,
    symbols: BTreeMap<AssetClass, Vec<SymbolInfo>>,
}

#[derive(Default)]
pub struct MemorySource {
    store: Mutex<Store>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store raw bytes under `key`.
    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.store().objects.insert(key.into(), bytes);
    }

    /// Publish `archive` with a single CSV payload named like upstream's.
    pub fn publish(&self, archive: &ArchiveRef, payload: &[u8]) -> Result<(), DumpError> {
        let stem = upstream_stem(&archive.ticker, &archive.dataset, archive.period);
        let bytes = pack(&[(&format!("{stem}.csv"), payload)])?;
        self.insert(remote_key(archive), bytes);
        Ok(())
    }

    /// Make fetches of `key` fail with a transport error.
    pub fn fail(&self, key: impl Into<String>) {
        self.store().failing.insert(key.into());
    }

    pub fn set_symbols(&self, asset_class: AssetClass, symbols: Vec<SymbolInfo>) {
        self.store().symbols.insert(asset_class, symbols);
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.store().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    /// Keys directly under `prefix`, like a delimited bucket listing.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, DumpError> {
        let store = self.store();
        Ok(store
            .objects
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .filter(|k| !k[prefix.len()..].contains('/'))
            .cloned()
            .collect())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, DumpError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let store = self.store();
        if store.failing.contains(key) {
            return Err(DumpError::TransportFailure(format!("simulated failure for {key}")));
        }
        store
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| DumpError::RemoteNotFound { key: key.to_string() })
    }

    fn list_symbols(&self, asset_class: AssetClass) -> Result<Vec<SymbolInfo>, DumpError> {
        Ok(self
            .store()
            .symbols
            .get(&asset_class)
            .cloned()
            .unwrap_or_default())
    }

    fn is_available(&self) -> bool {
        true
    }
}
