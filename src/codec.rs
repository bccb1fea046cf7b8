//! [`Codec`]: the client-supplied contract for (de)serializing a collection's objects and
//! deriving index keys from them. The core never interprets the object type itself — it only
//! ever calls through a `Codec`.

use std::sync::Arc;

use crate::key::Key;
use crate::rect::Rect;

/// One declared ordered index on a collection. The first element of [`Codec::indices`] is the
/// primary index and must be `unique`.
#[derive(Clone)]
pub struct IndexDef<T> {
    pub name: String,
    pub unique: bool,
    key_gen: Arc<dyn Fn(&T) -> Key + Send + Sync>,
}

impl<T> IndexDef<T> {
    pub fn new(
        name: impl Into<String>,
        unique: bool,
        key_gen: impl Fn(&T) -> Key + Send + Sync + 'static,
    ) -> Self {
        IndexDef {
            name: name.into(),
            unique,
            key_gen: Arc::new(key_gen),
        }
    }

    /// Convenience constructor for a unique index (the only legal shape for the primary index).
    pub fn unique(name: impl Into<String>, key_gen: impl Fn(&T) -> Key + Send + Sync + 'static) -> Self {
        Self::new(name, true, key_gen)
    }

    /// Convenience constructor for a non-unique secondary index.
    pub fn multi(name: impl Into<String>, key_gen: impl Fn(&T) -> Key + Send + Sync + 'static) -> Self {
        Self::new(name, false, key_gen)
    }

    /// Derive this index's logical key for `data`.
    pub fn key_for(&self, data: &T) -> Key {
        (self.key_gen)(data)
    }
}

/// One declared spatial index on a collection.
#[derive(Clone)]
pub struct SpatialIndexDef<T> {
    pub name: String,
    key_gen: Arc<dyn Fn(&T) -> Rect + Send + Sync>,
}

impl<T> SpatialIndexDef<T> {
    pub fn new(name: impl Into<String>, key_gen: impl Fn(&T) -> Rect + Send + Sync + 'static) -> Self {
        SpatialIndexDef {
            name: name.into(),
            key_gen: Arc::new(key_gen),
        }
    }

    /// Derive this spatial index's rectangle for `data`.
    pub fn rect_for(&self, data: &T) -> Rect {
        (self.key_gen)(data)
    }
}

/// Client-supplied (de)serializer and key-generator for a collection.
///
/// `primary_key` passed to [`Codec::encode`]/[`Codec::decode`] is advisory: a codec may use it
/// to key objects in its own cache. A `None` primary key in `decode` means "the result must not
/// be cached" — the core itself never caches.
pub trait Codec: Send + Sync {
    /// The object type this codec (de)serializes.
    type Item: Clone;

    /// Serialize `data` to bytes for storage in the primary map.
    fn encode(&self, data: &Self::Item, primary_key: Option<&Key>) -> Vec<u8>;

    /// Deserialize bytes previously produced by [`Codec::encode`].
    fn decode(&self, bytes: &[u8], primary_key: Option<&Key>) -> crate::error::Result<Self::Item>;

    /// Ordered indices, primary first. Must be non-empty; the first must be unique.
    fn indices(&self) -> &[IndexDef<Self::Item>];

    /// Spatial indices, if any. Defaults to none.
    fn spatial_indices(&self) -> &[SpatialIndexDef<Self::Item>] {
        &[]
    }
}
