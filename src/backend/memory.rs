//! An in-memory reference [`KvBackend`], analogous to the teacher crate's `MockStorage`: used
//! by this crate's own tests, and suitable for embedders with no persistence requirement.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{KvBackend, KvMap};
use crate::error::Result;

type Table = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// `BTreeMap`-backed, `RwLock`-guarded [`KvBackend`] with no persistence: everything lives in
/// process memory and is lost on drop. Does not support [`KvBackend::rollback_to`]; `commit`
/// is a no-op since there is nothing to flush.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    maps: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryBackend {
    /// A fresh, empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    type Map = MemoryMap;

    fn open_map(&self, name: &str) -> Result<Self::Map> {
        if let Some(table) = self.maps.read().get(name) {
            return Ok(MemoryMap {
                table: table.clone(),
            });
        }
        let table = self
            .maps
            .write()
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new())))
            .clone();
        Ok(MemoryMap { table })
    }

    fn delete_map(&self, name: &str) -> Result<()> {
        self.maps.write().remove(name);
        Ok(())
    }

    fn list_maps(&self) -> Result<Vec<String>> {
        Ok(self.maps.read().keys().cloned().collect())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback_to(&self, version: u64) -> Result<()> {
        Err(crate::error::StoreError::backend(RollbackUnsupported(version)))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("MemoryBackend does not support rollback (requested version {0})")]
struct RollbackUnsupported(u64);

/// A single named table within a [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryMap {
    table: Table,
}

impl KvMap for MemoryMap {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.table.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.table.write().remove(key);
        Ok(())
    }

    fn first_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.table.read().keys().next().cloned())
    }

    fn last_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.table.read().keys().next_back().cloned())
    }

    fn floor(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .table
            .read()
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(k, _)| k.clone()))
    }

    fn ceiling(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .table
            .read()
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone()))
    }

    fn higher(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .table
            .read()
            .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone()))
    }

    fn lower(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .table
            .read()
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
            .next_back()
            .map(|(k, _)| k.clone()))
    }
}
