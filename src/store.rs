//! [`Store`]: owns the [`KvBackend`] lifecycle and the registry of collections opened against it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::backend::KvBackend;
use crate::codec::Codec;
use crate::collection::Collection;
use crate::error::{Result, StoreError};

/// Persistence and runtime knobs for a [`Store`], per `SPEC_FULL.md` §4.6.
///
/// Constructed with [`StoreConfig::new`] (an alias for [`Default::default`]) and a chain of
/// `with_*` builder calls, in preference to config-file parsing.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// `None` selects an in-memory backend; `Some(path)` a persisted one.
    pub filename: Option<PathBuf>,
    /// Enable the backend's page compression.
    pub compressed: bool,
    /// Size of the backend's read cache, in MiB.
    pub read_cache_mb: u32,
    /// Write-buffer high-water mark triggering autocommit, in KiB.
    pub autocommit_buffer_kb: u32,
    /// Maximum dwell time before autocommit fires, in milliseconds. Settable at runtime.
    pub autocommit_delay_ms: u32,
    /// If present, pages are encrypted with this key.
    pub encryption_key: Option<Vec<u8>>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            filename: None,
            compressed: false,
            read_cache_mb: 16,
            autocommit_buffer_kb: 1024,
            autocommit_delay_ms: 1000,
            encryption_key: None,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.filename = Some(path.into());
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn with_read_cache_mb(mut self, mb: u32) -> Self {
        self.read_cache_mb = mb;
        self
    }

    pub fn with_autocommit_buffer_kb(mut self, kb: u32) -> Self {
        self.autocommit_buffer_kb = kb;
        self
    }

    pub fn with_autocommit_delay_ms(mut self, ms: u32) -> Self {
        self.autocommit_delay_ms = ms;
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }
}

/// Owns a [`KvBackend`]'s lifecycle and tracks the names of collections opened against it.
pub struct Store<B: KvBackend> {
    backend: B,
    config: StoreConfig,
    collections: RwLock<HashSet<String>>,
    /// Reserved hook for the open-transaction count `close()` must refuse against
    /// (`SPEC_FULL.md` §4.6, §9). This core defines no multi-statement transactions of its own,
    /// so nothing increments it today; it exists for embedders layering transactions on top.
    open_transactions: AtomicUsize,
}

impl<B: KvBackend> Store<B> {
    /// Open a store over `backend` with `config`.
    #[tracing::instrument(level = "debug", skip(backend, config))]
    pub fn open(backend: B, config: StoreConfig) -> Result<Self> {
        Ok(Store {
            backend,
            config,
            collections: RwLock::new(HashSet::new()),
            open_transactions: AtomicUsize::new(0),
        })
    }

    /// Alias for [`Store::open`].
    pub fn new(backend: B, config: StoreConfig) -> Result<Self> {
        Self::open(backend, config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open (or logically create) a named collection bound to this store's backend.
    pub fn collection<C: Codec>(&self, name: impl Into<String>, codec: C) -> Result<Collection<B, C>> {
        let name = name.into();
        let collection = Collection::new(self.backend.clone(), name.clone(), codec)?;
        self.collections.write().insert(name);
        Ok(collection)
    }

    /// Flush any buffered backend writes.
    pub fn commit(&self) -> Result<()> {
        self.backend.commit()
    }

    /// Flush and mark the store closed. Fails with [`StoreError::OpenTransactions`] while any
    /// long-running transaction is outstanding.
    pub fn close(&self) -> Result<()> {
        let open = self.open_transactions.load(Ordering::SeqCst);
        if open > 0 {
            return Err(StoreError::OpenTransactions(open));
        }
        self.backend.commit()
    }

    /// Irrevocably drop a named map (collection primary, secondary, or spatial) and its entries.
    pub fn delete_map(&self, name: &str) -> Result<()> {
        self.backend.delete_map(name)
    }

    /// Revert the backend to a previously committed version.
    pub fn rollback_to(&self, version: u64) -> Result<()> {
        self.backend.rollback_to(version)
    }

    /// Names of every collection opened through this store since construction.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().iter().cloned().collect();
        names.sort();
        names
    }

    /// Current count of outstanding long-running transactions (always `0` in this core; see
    /// [`Store::open_transactions`]).
    pub fn open_transaction_count(&self) -> usize {
        self.open_transactions.load(Ordering::SeqCst)
    }
}
