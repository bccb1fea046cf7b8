//! Spatial index glue: insert/remove/contained-by over an in-memory R-tree, backed durably by
//! a `rect ‖ primary_key -> primary_key` map on the [`crate::backend::KvBackend`] — the same
//! suffix-with-pk scheme non-unique ordered indices use ([`crate::key::suffixed`]), so two rows
//! that happen to share a rect get distinct stored entries instead of colliding.
//!
//! The backend only gives us ordered-neighbor lookups, not 2D containment, so containment
//! queries are answered by an `rstar::RTree` kept in memory and rebuilt (once, lazily) by
//! walking the backend map with the same `first_key`/`higher` stepping the ordered [`crate::cursor::Cursor`]
//! uses internally.

use parking_lot::RwLock;
use rstar::{RTree, RTreeObject, AABB};

use crate::backend::KvMap;
use crate::error::Result;
use crate::key::Key;
use crate::rect::Rect;

const RECT_BYTES: usize = 32;

#[derive(Clone, Debug, PartialEq)]
struct SpatialEntry {
    rect: Rect,
    pk: Vec<u8>,
}

impl rstar::RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.rect.envelope()
    }
}

fn encode_rect(rect: &Rect) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECT_BYTES);
    for v in [rect.min[0], rect.min[1], rect.max[0], rect.max[1]] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

fn decode_rect(bytes: &[u8]) -> Rect {
    let mut coords = [0.0f64; 4];
    for (i, chunk) in bytes[..RECT_BYTES].chunks_exact(8).enumerate().take(4) {
        coords[i] = f64::from_be_bytes(chunk.try_into().expect("8-byte chunk"));
    }
    Rect::new([coords[0], coords[1]], [coords[2], coords[3]])
}

/// The stored map key for one `(rect, pk)` entry: the fixed-width rect encoding followed by the
/// primary key's raw bytes, mirroring [`crate::key::suffixed`].
fn stored_key(rect: &Rect, pk_bytes: &[u8]) -> Vec<u8> {
    let mut out = encode_rect(rect);
    out.extend_from_slice(pk_bytes);
    out
}

/// Split a stored map key back into its rect prefix and primary-key suffix.
fn decode_stored_key(bytes: &[u8]) -> (Rect, Vec<u8>) {
    (decode_rect(bytes), bytes[RECT_BYTES..].to_vec())
}

/// One named spatial index on a collection.
pub struct SpatialIndex<M: KvMap> {
    map: M,
    tree: RwLock<Option<RTree<SpatialEntry>>>,
}

impl<M: KvMap> SpatialIndex<M> {
    pub fn new(map: M) -> Self {
        SpatialIndex {
            map,
            tree: RwLock::new(None),
        }
    }

    fn ensure_tree(&self) -> Result<()> {
        if self.tree.read().is_some() {
            return Ok(());
        }
        let mut guard = self.tree.write();
        if guard.is_some() {
            return Ok(());
        }
        let mut entries = Vec::new();
        let mut cursor = self.map.first_key()?;
        while let Some(key_bytes) = cursor {
            let (rect, pk) = decode_stored_key(&key_bytes);
            entries.push(SpatialEntry { rect, pk });
            cursor = self.map.higher(&key_bytes)?;
        }
        *guard = Some(RTree::bulk_load(entries));
        Ok(())
    }

    /// Insert `rect -> pk`, maintaining both the backend map and the in-memory tree.
    pub fn insert(&self, rect: Rect, pk: &Key) -> Result<()> {
        self.ensure_tree()?;
        self.map.put(&stored_key(&rect, pk.bytes()), pk.bytes())?;
        self.tree
            .write()
            .as_mut()
            .expect("tree populated by ensure_tree")
            .insert(SpatialEntry {
                rect,
                pk: pk.bytes().to_vec(),
            });
        Ok(())
    }

    /// Remove `rect -> pk`.
    pub fn remove(&self, rect: Rect, pk: &Key) -> Result<()> {
        self.ensure_tree()?;
        self.map.remove(&stored_key(&rect, pk.bytes()))?;
        self.tree
            .write()
            .as_mut()
            .expect("tree populated by ensure_tree")
            .remove(&SpatialEntry {
                rect,
                pk: pk.bytes().to_vec(),
            });
        Ok(())
    }

    /// Every `(rect, primary_key_bytes)` entry fully contained by `query`.
    pub fn contained_by(&self, query: &Rect) -> Result<Vec<(Rect, Vec<u8>)>> {
        self.ensure_tree()?;
        let guard = self.tree.read();
        let tree = guard.as_ref().expect("tree populated by ensure_tree");
        Ok(tree
            .locate_in_envelope_intersecting(&query.envelope())
            .filter(|entry| entry.rect.contained_by(query))
            .map(|entry| (entry.rect, entry.pk.clone()))
            .collect())
    }

    /// Drop every entry whose primary key is not in `live_pks`, from both the backend map and
    /// the in-memory tree. Used by [`crate::collection::Collection::reconcile`].
    pub fn retain_live(&self, live_pks: &std::collections::HashSet<Vec<u8>>) -> Result<u64> {
        self.ensure_tree()?;
        let mut stale = Vec::new();
        let mut cursor = self.map.first_key()?;
        while let Some(key_bytes) = cursor {
            let (rect, pk) = decode_stored_key(&key_bytes);
            if !live_pks.contains(&pk) {
                stale.push((key_bytes.clone(), rect, pk));
            }
            cursor = self.map.higher(&key_bytes)?;
        }
        let removed = stale.len() as u64;
        let mut tree_guard = self.tree.write();
        let tree = tree_guard.as_mut().expect("tree populated by ensure_tree");
        for (key_bytes, rect, pk) in stale {
            self.map.remove(&key_bytes)?;
            tree.remove(&SpatialEntry { rect, pk });
        }
        Ok(removed)
    }
}
