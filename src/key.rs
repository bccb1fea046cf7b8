//! The ordered byte-key contract: [`Key`], its sentinels, prefix relation, and composite
//! construction from typed parts.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, StoreError};

/// One part of a composite key, as accepted by [`Key::compose`].
///
/// Fixed-width parts (`Int32`, `Int64`, `Instant`) may appear anywhere in a composite; a
/// variable-length part (`Str`, `Bytes`) may only appear as the final part, since the encoding
/// concatenates parts without length prefixes (see `SPEC_FULL.md` §3, §9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyPart {
    /// Big-endian signed 32-bit integer (4 bytes).
    Int32(i32),
    /// Big-endian signed 64-bit integer (8 bytes).
    Int64(i64),
    /// Big-endian epoch-millis instant (8 bytes).
    Instant(i64),
    /// Raw UTF-8 bytes, unprefixed. Variable-length.
    Str(String),
    /// Raw bytes, unprefixed. Variable-length.
    Bytes(Vec<u8>),
}

impl KeyPart {
    fn is_variable_length(&self) -> bool {
        matches!(self, KeyPart::Str(_) | KeyPart::Bytes(_))
    }

    fn append_to(&self, out: &mut Vec<u8>) {
        match self {
            KeyPart::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            KeyPart::Int64(v) => out.extend_from_slice(&v.to_be_bytes()),
            KeyPart::Instant(v) => out.extend_from_slice(&v.to_be_bytes()),
            KeyPart::Str(s) => out.extend_from_slice(s.as_bytes()),
            KeyPart::Bytes(b) => out.extend_from_slice(b),
        }
    }
}

impl From<i32> for KeyPart {
    fn from(v: i32) -> Self {
        KeyPart::Int32(v)
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        KeyPart::Int64(v)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        KeyPart::Str(v.to_owned())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        KeyPart::Str(v)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(v: Vec<u8>) -> Self {
        KeyPart::Bytes(v)
    }
}

/// An immutable byte sequence ordered lexicographically (unsigned byte comparison, shorter
/// prefix sorts first), plus the two sentinels `START` and `END` used to mean "no bound".
#[derive(Clone, Eq)]
pub enum Key {
    /// Strictly less than every real key.
    Start,
    /// Strictly greater than every real key.
    End,
    /// A real key, backed by concrete bytes.
    Real(Vec<u8>),
}

impl Key {
    /// The sentinel that is less than every real key and equal only to itself.
    pub const START: Key = Key::Start;
    /// The sentinel that is greater than every real key and equal only to itself.
    pub const END: Key = Key::End;

    /// Build a real key from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Key::Real(bytes.into())
    }

    /// Concatenate big-endian encodings of each part, most-significant part first.
    ///
    /// Fails with [`StoreError::AmbiguousComposite`] if a variable-length part (`Str`/`Bytes`)
    /// appears anywhere but last — such a key cannot be unambiguously parsed or range-bounded.
    pub fn compose(parts: &[KeyPart]) -> Result<Self> {
        let last = parts.len().saturating_sub(1);
        for (i, part) in parts.iter().enumerate() {
            if i != last && part.is_variable_length() {
                return Err(StoreError::AmbiguousComposite { index: i });
            }
        }
        let mut out = Vec::new();
        for part in parts {
            part.append_to(&mut out);
        }
        Ok(Key::Real(out))
    }

    /// Whether this is the `START` sentinel.
    pub fn is_start(&self) -> bool {
        matches!(self, Key::Start)
    }

    /// Whether this is the `END` sentinel.
    pub fn is_end(&self) -> bool {
        matches!(self, Key::End)
    }

    /// The raw bytes of a real key.
    ///
    /// # Panics
    /// Panics if called on a sentinel; sentinels have no byte representation. Callers that
    /// might hold a sentinel should check [`Key::is_start`]/[`Key::is_end`] first.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Key::Real(b) => b,
            Key::Start | Key::End => {
                panic!("Key::bytes called on a sentinel (START/END have no byte representation)")
            }
        }
    }

    /// True iff `self` is a prefix of `other`: `|self| <= |other|` and the leading bytes match.
    /// Sentinels are never a prefix of anything, real or otherwise, and nothing is a prefix of
    /// a sentinel.
    pub fn is_prefix_of(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Real(p), Key::Real(k)) => p.len() <= k.len() && k[..p.len()] == p[..],
            _ => false,
        }
    }

    /// Total order consistent with lexicographic unsigned-byte comparison, with `START`/`END`
    /// sorting below/above every real key and equal only to themselves.
    pub fn compare(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Start, Key::Start) => Ordering::Equal,
            (Key::End, Key::End) => Ordering::Equal,
            (Key::Start, _) => Ordering::Less,
            (_, Key::Start) => Ordering::Greater,
            (Key::End, _) => Ordering::Greater,
            (_, Key::End) => Ordering::Less,
            (Key::Real(a), Key::Real(b)) => a.as_slice().cmp(b.as_slice()),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Start => write!(f, "Key::START"),
            Key::End => write!(f, "Key::END"),
            Key::Real(b) => write!(f, "Key({b:02x?})"),
        }
    }
}

/// Concatenate a secondary index's logical key with a primary key, for the non-unique
/// stored-key scheme of `SPEC_FULL.md` §3: `storedKey(I, data, pk) = keyGen(data).bytes ‖ pk.bytes`.
pub fn suffixed(logical: &Key, primary: &Key) -> Vec<u8> {
    let mut out = Vec::with_capacity(logical.bytes().len() + primary.bytes().len());
    out.extend_from_slice(logical.bytes());
    out.extend_from_slice(primary.bytes());
    out
}
