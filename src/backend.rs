//! [`KvBackend`]: the black-box ordered key–value engine the store is layered over.
//!
//! This crate never assumes anything about on-disk format, compression, encryption, or
//! autocommit buffering — those are entirely the backend's concern (`SPEC_FULL.md` §1). The
//! trait exposes exactly the primitives the collection engine and cursor need: point
//! get/put/remove, and the five ordered-neighbor lookups a range-scan cursor is built from.

use crate::error::Result;

/// A single named, ordered map of `bytes -> bytes` within a [`KvBackend`].
///
/// Implementations must guarantee that `first_key`/`last_key`/`floor`/`ceiling`/`higher`/`lower`
/// agree with unsigned lexicographic byte ordering on keys — the same order [`crate::key::Key`]
/// implements, since the collection engine seeds these calls with key bytes it produced itself.
pub trait KvMap: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Point insert/overwrite.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Point removal. Removing an absent key is a no-op.
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// The smallest key in the map, if any.
    fn first_key(&self) -> Result<Option<Vec<u8>>>;

    /// The largest key in the map, if any.
    fn last_key(&self) -> Result<Option<Vec<u8>>>;

    /// The largest key `k` with `k <= key`.
    fn floor(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// The smallest key `k` with `k >= key`.
    fn ceiling(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// The smallest key `k` with `k > key`.
    fn higher(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// The largest key `k` with `k < key`.
    fn lower(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// The external, persistent ordered KV engine a [`crate::store::Store`] owns the lifecycle of.
///
/// A backend hands out independent, by-name [`KvMap`] handles; opening a name already open is
/// idempotent (§5). Implementations are expected to be cheap to clone (e.g. an `Arc` inside)
/// since every [`crate::collection::Collection`] holds its own copy.
pub trait KvBackend: Clone + Send + Sync {
    /// Concrete map handle type returned by [`KvBackend::open_map`].
    type Map: KvMap + Clone;

    /// Open (creating if absent) the named map. Safe to call concurrently; must not race with
    /// itself (`SPEC_FULL.md` §5: "concurrent compute-if-absent").
    fn open_map(&self, name: &str) -> Result<Self::Map>;

    /// Irrevocably drop a named map and all of its entries.
    fn delete_map(&self, name: &str) -> Result<()>;

    /// Names of every map ever opened (and not since deleted) on this backend.
    fn list_maps(&self) -> Result<Vec<String>>;

    /// Flush any buffered writes.
    fn commit(&self) -> Result<()>;

    /// Revert the backend to a previously committed version.
    fn rollback_to(&self, version: u64) -> Result<()>;
}

pub mod memory;
