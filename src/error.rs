//! Error taxonomy for the store.
//!
//! Every fallible operation in this crate returns [`StoreError`] rather than panicking on
//! caller-triggered conditions. Backend failures are chained through `#[source]` so callers
//! keep the original cause instead of losing it behind an opaque string.

use std::fmt;

/// The single error type returned by every fallible operation in this crate.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A collection name contained a `'.'`, which is reserved for `<collection>.<index>` map names.
    #[error("collection name {0:?} must not contain '.'")]
    BadName(String),

    /// A codec declared zero ordered indices; at least the primary index is required.
    #[error("codec for collection {0:?} declared no ordered indices")]
    NoIndex(String),

    /// The first declared ordered index was not marked unique.
    #[error("primary index {0:?} of collection {1:?} must be unique")]
    NonUniquePrimary(String, String),

    /// Two indices (ordered or spatial) on the same collection share a name.
    #[error("index name {0:?} is used more than once on collection {1:?}")]
    DuplicateIndexName(String, String),

    /// A uniqueness constraint was violated on insert/update.
    #[error("duplicate entry for unique index {index:?} on collection {collection:?}")]
    Duplicate { collection: String, index: String },

    /// `query`/`delete`/`count`/`contained_by` named an index that does not exist.
    #[error("collection {collection:?} has no index named {index:?}")]
    UnknownIndex { collection: String, index: String },

    /// A cursor was constructed with `stride <= 0`.
    #[error("cursor stride must be >= 1, got {0}")]
    BadStride(i64),

    /// `Cursor::next` was called after the cursor was exhausted.
    #[error("no more elements in cursor")]
    NoSuchElement,

    /// `Store::close` was attempted while long-running transactions are outstanding.
    #[error("cannot close store: {0} transaction(s) still open")]
    OpenTransactions(usize),

    /// A composite key's variable-length (string/bytes) part was not the final part.
    #[error("composite key part {index} is variable-length but is not the last part")]
    AmbiguousComposite { index: usize },

    /// Any I/O or invariant failure surfaced by the KV backend, propagated opaquely.
    #[error("backend failure: {0}")]
    BackendFailure(#[source] BackendError),
}

/// Opaque wrapper around whatever error type a [`crate::backend::KvBackend`] implementation
/// produces. The store never interprets backend errors beyond propagating them.
#[derive(Debug)]
pub struct BackendError(pub Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl StoreError {
    /// Wrap an arbitrary backend error as a [`StoreError::BackendFailure`].
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BackendFailure(BackendError(Box::new(err)))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
