//! An embedded document store layered over an external ordered key-value engine.
//!
//! A [`Store`](store::Store) owns a [`KvBackend`](backend::KvBackend)'s lifecycle and hands out
//! [`Collection`](collection::Collection)s, each of which maintains a primary map plus the
//! secondary (ordered) and spatial indices its [`Codec`](codec::Codec) declares, automatically
//! and consistently across `insert`/`update`/`delete`. Reads go through a bound-aware, paginated
//! [`Cursor`](cursor::Cursor) that tolerates concurrent deletion of the rows it scans.

pub mod backend;
pub mod codec;
pub mod collection;
pub mod counter;
pub mod cursor;
pub mod error;
pub mod key;
pub mod rect;
pub mod spatial;
pub mod store;

pub mod prelude {
    //! Common imports for embedders of this crate.
    pub use crate::backend::{memory::MemoryBackend, KvBackend, KvMap};
    pub use crate::codec::{Codec, IndexDef, SpatialIndexDef};
    pub use crate::collection::{Collection, DeleteCursor, ReconcileReport};
    pub use crate::cursor::Cursor;
    pub use crate::error::{StoreError, Result};
    pub use crate::key::{Key, KeyPart};
    pub use crate::rect::Rect;
    pub use crate::store::{Store, StoreConfig};
}

pub use prelude::*;
