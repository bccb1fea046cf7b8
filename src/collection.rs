//! [`Collection`]: owns one primary map and N secondary/spatial maps for a single codec, and
//! implements cross-index-consistent insert/update/delete plus query/count/containment.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{KvBackend, KvMap};
use crate::codec::{Codec, IndexDef, SpatialIndexDef};
use crate::counter;
use crate::cursor::Cursor;
use crate::error::{Result, StoreError};
use crate::key::{suffixed, Key};
use crate::rect::Rect;
use crate::spatial::SpatialIndex;

fn stored_key_bytes<T>(index: &IndexDef<T>, logical: &Key, pk: &Key) -> Vec<u8> {
    if index.unique {
        logical.bytes().to_vec()
    } else {
        suffixed(logical, pk)
    }
}

/// Summary of a [`Collection::reconcile`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Secondary/spatial entries that were missing and have been (re-)written from the primary.
    pub repaired_missing: u64,
    /// Secondary/spatial entries removed because they pointed at a primary key no longer present.
    pub removed_dangling: u64,
}

/// A named collection of objects of type `C::Item`, backed by one primary map and the ordered
/// and spatial indices its [`Codec`] declares.
pub struct Collection<B: KvBackend, C: Codec> {
    name: String,
    backend: B,
    codec: Arc<C>,
    maps: RwLock<HashMap<String, B::Map>>,
    spatial: RwLock<HashMap<String, Arc<SpatialIndex<B::Map>>>>,
}

impl<B: KvBackend, C: Codec> Collection<B, C> {
    /// Open (or logically create) a collection. Validates the codec's declared indices per
    /// `SPEC_FULL.md` §4.3; backing maps themselves open lazily on first reference.
    pub fn new(backend: B, name: impl Into<String>, codec: C) -> Result<Self> {
        let name = name.into();
        if name.contains('.') {
            return Err(StoreError::BadName(name));
        }
        let indices = codec.indices();
        if indices.is_empty() {
            return Err(StoreError::NoIndex(name));
        }
        if !indices[0].unique {
            return Err(StoreError::NonUniquePrimary(indices[0].name.clone(), name));
        }
        let mut seen = HashSet::new();
        for idx in indices {
            if !seen.insert(idx.name.as_str()) {
                return Err(StoreError::DuplicateIndexName(idx.name.clone(), name));
            }
        }
        for idx in codec.spatial_indices() {
            if !seen.insert(idx.name.as_str()) {
                return Err(StoreError::DuplicateIndexName(idx.name.clone(), name));
            }
        }

        Ok(Collection {
            name,
            backend,
            codec: Arc::new(codec),
            maps: RwLock::new(HashMap::new()),
            spatial: RwLock::new(HashMap::new()),
        })
    }

    /// The collection's name (also the primary map's backend name).
    pub fn name(&self) -> &str {
        &self.name
    }

    fn map(&self, full_name: &str) -> Result<B::Map> {
        if let Some(m) = self.maps.read().get(full_name) {
            return Ok(m.clone());
        }
        let mut guard = self.maps.write();
        if let Some(m) = guard.get(full_name) {
            return Ok(m.clone());
        }
        let opened = self.backend.open_map(full_name)?;
        guard.insert(full_name.to_owned(), opened.clone());
        Ok(opened)
    }

    fn primary_map(&self) -> Result<B::Map> {
        self.map(&self.name)
    }

    fn secondary_map_name(&self, index_name: &str) -> String {
        format!("{}.{}", self.name, index_name)
    }

    fn secondary_map(&self, index_name: &str) -> Result<B::Map> {
        let full = self.secondary_map_name(index_name);
        self.map(&full)
    }

    fn spatial_index(&self, index_name: &str) -> Result<Arc<SpatialIndex<B::Map>>> {
        if let Some(s) = self.spatial.read().get(index_name) {
            return Ok(s.clone());
        }
        let mut guard = self.spatial.write();
        if let Some(s) = guard.get(index_name) {
            return Ok(s.clone());
        }
        let full = self.secondary_map_name(index_name);
        let map = self.backend.open_map(&full)?;
        let idx = Arc::new(SpatialIndex::new(map));
        guard.insert(index_name.to_owned(), idx.clone());
        Ok(idx)
    }

    fn find_index(&self, name: &str) -> Result<&IndexDef<C::Item>> {
        self.codec
            .indices()
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.name.clone(),
                index: name.to_owned(),
            })
    }

    fn find_spatial(&self, name: &str) -> Result<&SpatialIndexDef<C::Item>> {
        self.codec
            .spatial_indices()
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.name.clone(),
                index: name.to_owned(),
            })
    }

    fn is_primary_index(&self, name: &str) -> bool {
        self.codec.indices()[0].name == name
    }

    fn map_for_index(&self, index_name: &str) -> Result<B::Map> {
        if self.is_primary_index(index_name) {
            self.primary_map()
        } else {
            self.secondary_map(index_name)
        }
    }

    /// Insert `data`, maintaining every declared index. Fails with
    /// [`StoreError::Duplicate`] (checked before any write) if the primary key or any unique
    /// secondary key is already present.
    #[tracing::instrument(level = "debug", skip(self, data), fields(collection = %self.name))]
    pub fn insert(&self, data: C::Item) -> Result<Key> {
        let indices = self.codec.indices();
        let primary_index = &indices[0];
        let pk = primary_index.key_for(&data);
        let primary = self.primary_map()?;
        if primary.get(pk.bytes())?.is_some() {
            return Err(StoreError::Duplicate {
                collection: self.name.clone(),
                index: primary_index.name.clone(),
            });
        }

        let mut secondary_writes = Vec::with_capacity(indices.len().saturating_sub(1));
        for idx in &indices[1..] {
            let logical = idx.key_for(&data);
            let stored = stored_key_bytes(idx, &logical, &pk);
            let map = self.secondary_map(&idx.name)?;
            if idx.unique && map.get(&stored)?.is_some() {
                return Err(StoreError::Duplicate {
                    collection: self.name.clone(),
                    index: idx.name.clone(),
                });
            }
            secondary_writes.push((map, stored));
        }

        let mut spatial_writes = Vec::with_capacity(self.codec.spatial_indices().len());
        for sidx in self.codec.spatial_indices() {
            let rect = sidx.rect_for(&data);
            spatial_writes.push((self.spatial_index(&sidx.name)?, rect));
        }

        primary.put(pk.bytes(), &self.codec.encode(&data, Some(&pk)))?;
        for (map, stored) in secondary_writes {
            map.put(&stored, pk.bytes())?;
        }
        for (index, rect) in spatial_writes {
            index.insert(rect, &pk)?;
        }
        tracing::debug!(primary_key = ?pk, "inserted");
        Ok(pk)
    }

    /// Read by primary key.
    pub fn read(&self, pk: &Key) -> Result<Option<C::Item>> {
        match self.primary_map()?.get(pk.bytes())? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes, Some(pk))?)),
            None => Ok(None),
        }
    }

    /// Read by primary key, inserting the result of `default` if absent. The core does not
    /// verify `default()`'s own primary key matches `pk`.
    pub fn read_or_create(&self, pk: &Key, default: impl FnOnce() -> C::Item) -> Result<C::Item> {
        if let Some(existing) = self.read(pk)? {
            return Ok(existing);
        }
        let data = default();
        self.insert(data.clone())?;
        Ok(data)
    }

    /// Update the row whose primary key is `primaryIndex.keyGen(data)`, falling back to
    /// [`Collection::insert`] if it does not yet exist.
    #[tracing::instrument(level = "debug", skip(self, data), fields(collection = %self.name))]
    pub fn update(&self, data: C::Item) -> Result<Key> {
        let indices = self.codec.indices();
        let primary_index = &indices[0];
        let pk = primary_index.key_for(&data);
        let primary = self.primary_map()?;
        let Some(old_bytes) = primary.get(pk.bytes())? else {
            return self.insert(data);
        };

        let needs_old = indices.len() > 1 || !self.codec.spatial_indices().is_empty();
        let old_data = if needs_old {
            Some(self.codec.decode(&old_bytes, Some(&pk))?)
        } else {
            None
        };

        struct PendingWrite<M> {
            map: M,
            old_key: Vec<u8>,
            new_key: Vec<u8>,
        }
        let mut pending = Vec::new();
        if let Some(old_data) = &old_data {
            for idx in &indices[1..] {
                let old_logical = idx.key_for(old_data);
                let new_logical = idx.key_for(&data);
                let old_key = stored_key_bytes(idx, &old_logical, &pk);
                let new_key = stored_key_bytes(idx, &new_logical, &pk);
                if old_key == new_key {
                    continue;
                }
                let map = self.secondary_map(&idx.name)?;
                if idx.unique {
                    if let Some(existing) = map.get(&new_key)? {
                        if existing != pk.bytes() {
                            return Err(StoreError::Duplicate {
                                collection: self.name.clone(),
                                index: idx.name.clone(),
                            });
                        }
                    }
                }
                pending.push(PendingWrite { map, old_key, new_key });
            }
        }

        primary.put(pk.bytes(), &self.codec.encode(&data, Some(&pk)))?;

        for write in pending {
            write.map.remove(&write.old_key)?;
            write.map.put(&write.new_key, pk.bytes())?;
        }

        if let Some(old_data) = &old_data {
            for sidx in self.codec.spatial_indices() {
                let old_rect = sidx.rect_for(old_data);
                let new_rect = sidx.rect_for(&data);
                if old_rect != new_rect {
                    let index = self.spatial_index(&sidx.name)?;
                    index.remove(old_rect, &pk)?;
                    index.insert(new_rect, &pk)?;
                }
            }
        }

        tracing::debug!(primary_key = ?pk, "updated");
        Ok(pk)
    }

    /// Delete the row at `pk`, if any, from every index. A missing `pk` is a no-op.
    #[tracing::instrument(level = "debug", skip(self), fields(collection = %self.name))]
    pub fn delete(&self, pk: &Key) -> Result<()> {
        let primary = self.primary_map()?;
        let Some(bytes) = primary.get(pk.bytes())? else {
            return Ok(());
        };
        let data = self.codec.decode(&bytes, Some(pk))?;
        for idx in &self.codec.indices()[1..] {
            let logical = idx.key_for(&data);
            let stored = stored_key_bytes(idx, &logical, pk);
            self.secondary_map(&idx.name)?.remove(&stored)?;
        }
        for sidx in self.codec.spatial_indices() {
            let rect = sidx.rect_for(&data);
            self.spatial_index(&sidx.name)?.remove(rect, pk)?;
        }
        primary.remove(pk.bytes())?;
        tracing::debug!(primary_key = ?pk, "deleted");
        Ok(())
    }

    /// Count physical entries of `index_name` within `[lo, hi]`.
    pub fn count(&self, index_name: &str, lo: &Key, hi: &Key) -> Result<u64> {
        self.find_index(index_name)?;
        let map = self.map_for_index(index_name)?;
        counter::count(&map, lo, hi)
    }

    /// Construct a range-scan cursor over `index_name` within `[lo, hi]`.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(level = "debug", skip(self), fields(collection = %self.name, index = index_name))]
    pub fn query(
        &self,
        index_name: &str,
        lo: Key,
        hi: Key,
        start: u64,
        count: Option<u64>,
        reverse: bool,
        stride: i64,
    ) -> Result<Cursor<B::Map, C>> {
        self.find_index(index_name)?;
        let map = self.map_for_index(index_name)?;
        let primary = if self.is_primary_index(index_name) {
            None
        } else {
            Some(self.primary_map()?)
        };
        Cursor::new(map, primary, self.codec.clone(), lo, hi, start, count, reverse, stride)
    }

    /// Construct a bulk-delete cursor: each element is removed from every index as it is pulled.
    pub fn delete_range<'a>(
        &'a self,
        index_name: &str,
        lo: Key,
        hi: Key,
        start: u64,
        count: Option<u64>,
        reverse: bool,
    ) -> Result<DeleteCursor<'a, B, C>> {
        let inner = self.query(index_name, lo, hi, start, count, reverse, 1)?;
        Ok(DeleteCursor { collection: self, inner })
    }

    /// Every `(rect, primary_key)` entry of `spatial_index_name` fully contained by `rect`.
    pub fn contained_by(&self, spatial_index_name: &str, rect: &Rect) -> Result<Vec<(Rect, Key)>> {
        self.find_spatial(spatial_index_name)?;
        let index = self.spatial_index(spatial_index_name)?;
        Ok(index
            .contained_by(rect)?
            .into_iter()
            .map(|(r, pk)| (r, Key::from_bytes(pk)))
            .collect())
    }

    /// Offline repair pass reconciling secondary/spatial maps against the primary map
    /// (`SPEC_FULL.md` §9: the open multi-index-write transaction boundary). Re-writes any
    /// secondary/spatial entry implied by a primary row but missing, then drops any secondary
    /// entry whose value points at a primary key that no longer exists.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let primary = self.primary_map()?;
        let mut live_pks: HashSet<Vec<u8>> = HashSet::new();
        let mut repaired_missing = 0u64;

        let mut cursor = primary.first_key()?;
        while let Some(k) = cursor {
            live_pks.insert(k.clone());
            if let Some(bytes) = primary.get(&k)? {
                let pk = Key::from_bytes(k.clone());
                let data = self.codec.decode(&bytes, Some(&pk))?;
                for idx in &self.codec.indices()[1..] {
                    let logical = idx.key_for(&data);
                    let stored = stored_key_bytes(idx, &logical, &pk);
                    let map = self.secondary_map(&idx.name)?;
                    if map.get(&stored)?.is_none() {
                        map.put(&stored, pk.bytes())?;
                        repaired_missing += 1;
                    }
                }
                for sidx in self.codec.spatial_indices() {
                    let rect = sidx.rect_for(&data);
                    self.spatial_index(&sidx.name)?.insert(rect, &pk)?;
                }
            }
            cursor = primary.higher(&k)?;
        }

        let mut removed_dangling = 0u64;
        for idx in &self.codec.indices()[1..] {
            let map = self.secondary_map(&idx.name)?;
            removed_dangling += purge_dangling(&map, &live_pks)?;
        }
        for sidx in self.codec.spatial_indices() {
            removed_dangling += self.spatial_index(&sidx.name)?.retain_live(&live_pks)?;
        }

        Ok(ReconcileReport {
            repaired_missing,
            removed_dangling,
        })
    }
}

fn purge_dangling<M: KvMap>(map: &M, live_pks: &HashSet<Vec<u8>>) -> Result<u64> {
    let mut stale = Vec::new();
    let mut cursor = map.first_key()?;
    while let Some(k) = cursor {
        if let Some(v) = map.get(&k)? {
            if !live_pks.contains(&v) {
                stale.push(k.clone());
            }
        }
        cursor = map.higher(&k)?;
    }
    let removed = stale.len() as u64;
    for k in stale {
        map.remove(&k)?;
    }
    Ok(removed)
}

/// A bulk-delete cursor returned by [`Collection::delete_range`]: each pulled element has
/// already been removed from every index of the collection.
pub struct DeleteCursor<'a, B: KvBackend, C: Codec> {
    collection: &'a Collection<B, C>,
    inner: Cursor<B::Map, C>,
}

impl<'a, B: KvBackend, C: Codec> DeleteCursor<'a, B, C> {
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    pub fn next(&mut self) -> Result<C::Item> {
        let item = self.inner.next()?;
        let pk = self.collection.codec.indices()[0].key_for(&item);
        self.collection.delete(&pk)?;
        Ok(item)
    }
}
