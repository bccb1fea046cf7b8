//! [`Cursor`]: the single-pass, bound-aware, reverse/stride/paginated range scan over an index
//! map, with indirection through the primary map and robustness to concurrent deletion.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::backend::KvMap;
use crate::codec::Codec;
use crate::error::{Result, StoreError};
use crate::key::Key;

/// The largest physical key `k` such that `k <= upper.bytes()` or `upper.is_prefix_of(k)`.
///
/// `START`/`END` resolve to `first_key`/`last_key` respectively, per `SPEC_FULL.md` §4.4.
fn resolve_upper<M: KvMap>(map: &M, upper: &Key) -> Result<Option<Vec<u8>>> {
    if upper.is_end() {
        return map.last_key();
    }
    if upper.is_start() {
        return map.first_key();
    }
    let bound = upper.bytes();
    let mut candidate = map.floor(bound)?;
    let mut probe = map.ceiling(bound)?;
    while let Some(k) = probe {
        if upper.is_prefix_of(&Key::from_bytes(k.clone())) {
            probe = map.higher(&k)?;
            candidate = Some(k);
        } else {
            break;
        }
    }
    Ok(candidate)
}

/// The smallest physical key `k` such that `k >= lower.bytes()`.
fn resolve_lower<M: KvMap>(map: &M, lower: &Key) -> Result<Option<Vec<u8>>> {
    if lower.is_end() {
        return map.last_key();
    }
    if lower.is_start() {
        return map.first_key();
    }
    map.ceiling(lower.bytes())
}

/// A lazy, ordered, bound-checked scan over one index map, yielding decoded [`Codec::Item`]s.
///
/// Construct via [`crate::collection::Collection::query`]; never directly.
pub struct Cursor<M: KvMap, C: Codec> {
    index_map: M,
    /// `Some(primary_map)` when `index_map` is a secondary/spatial map whose values are primary
    /// keys needing dereference; `None` when `index_map` *is* the primary map.
    primary_map: Option<M>,
    codec: Arc<C>,
    lower_bound: Key,
    upper_bound: Key,
    reverse: bool,
    stride: u64,
    /// The resolved physical endpoint this scan must not step past (`upper_key` ascending,
    /// `lower_key` reverse). Checked by physical-key identity as a belt-and-suspenders guard
    /// alongside the bound comparison in `single_step` (`SPEC_FULL.md` §4.4.1 point 2).
    last_key: Option<Vec<u8>>,
    cursor_key: Option<Vec<u8>>,
    remaining: Option<u64>,
    exhausted: bool,
}

impl<M: KvMap, C: Codec> Cursor<M, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        index_map: M,
        primary_map: Option<M>,
        codec: Arc<C>,
        lower_bound: Key,
        upper_bound: Key,
        start: u64,
        count: Option<u64>,
        reverse: bool,
        stride: i64,
    ) -> Result<Self> {
        if stride <= 0 {
            return Err(StoreError::BadStride(stride));
        }
        let lower_key = resolve_lower(&index_map, &lower_bound)?;
        let upper_key = resolve_upper(&index_map, &upper_bound)?;
        let (mut first_key, last_key) = if reverse {
            (upper_key, lower_key)
        } else {
            (lower_key, upper_key)
        };

        // `resolve_lower`/`resolve_upper` each independently find the nearest physical key to
        // their own bound; if the bounds are sparse enough that `lo`'s ceiling lands past `hi`'s
        // floor (e.g. map {"a", "z"}, range ["e", "m"]), the scan is empty, not a one-element
        // scan starting past its own endpoint.
        if let (Some(first), Some(last)) = (&first_key, &last_key) {
            let out_of_order = if reverse { first < last } else { first > last };
            if out_of_order {
                first_key = None;
            }
        }

        tracing::debug!(
            reverse,
            stride,
            start,
            has_range = first_key.is_some(),
            "cursor constructed"
        );

        let mut cursor = Cursor {
            index_map,
            primary_map,
            codec,
            lower_bound,
            upper_bound,
            reverse,
            stride: stride as u64,
            last_key,
            cursor_key: first_key,
            remaining: count,
            exhausted: false,
        };
        for _ in 0..start {
            if cursor.cursor_key.is_none() {
                break;
            }
            cursor.single_step()?;
        }
        Ok(cursor)
    }

    /// One raw physical-key advance (the §4.4 "advance rule"), independent of stride/count/skip.
    fn single_step(&mut self) -> Result<()> {
        let Some(k) = self.cursor_key.clone() else {
            return Ok(());
        };
        if self.last_key.as_ref() == Some(&k) {
            self.cursor_key = None;
            return Ok(());
        }
        let next = if self.reverse {
            self.index_map.lower(&k)?
        } else {
            self.index_map.higher(&k)?
        };
        self.cursor_key = match next {
            None => None,
            Some(n) => {
                let candidate = Key::from_bytes(n.clone());
                let out_of_bounds = if self.reverse {
                    self.lower_bound.compare(&candidate) == Ordering::Greater
                        && !self.lower_bound.is_prefix_of(&candidate)
                } else {
                    self.upper_bound.compare(&candidate) == Ordering::Less
                        && !self.upper_bound.is_prefix_of(&candidate)
                };
                if out_of_bounds {
                    None
                } else {
                    Some(n)
                }
            }
        };
        Ok(())
    }

    fn dereference(&self, physical_key: &[u8], value: &[u8]) -> Result<Option<C::Item>> {
        match &self.primary_map {
            None => Ok(Some(
                self.codec
                    .decode(value, Some(&Key::from_bytes(physical_key.to_vec())))?,
            )),
            Some(primary) => match primary.get(value)? {
                None => Ok(None),
                Some(bytes) => Ok(Some(
                    self.codec
                        .decode(&bytes, Some(&Key::from_bytes(value.to_vec())))?,
                )),
            },
        }
    }

    /// Whether a subsequent [`Cursor::next`] call could succeed, without side effects. Does not
    /// guarantee success: a dangling entry discovered inside `next` can still exhaust the cursor.
    pub fn has_next(&self) -> bool {
        !self.exhausted && self.cursor_key.is_some() && self.remaining != Some(0)
    }

    /// Pull the next decoded element, skipping (and not charging against `count`) any physical
    /// entries whose dereferenced row has been concurrently deleted (`SPEC_FULL.md` §4.4.1).
    pub fn next(&mut self) -> Result<C::Item> {
        loop {
            if self.exhausted || self.remaining == Some(0) {
                return Err(StoreError::NoSuchElement);
            }
            let Some(k) = self.cursor_key.clone() else {
                self.exhausted = true;
                return Err(StoreError::NoSuchElement);
            };
            let value = self.index_map.get(&k)?;
            let decoded = match value {
                Some(v) => self.dereference(&k, &v)?,
                None => None,
            };
            match decoded {
                Some(item) => {
                    for _ in 0..self.stride {
                        self.single_step()?;
                        if self.cursor_key.is_none() {
                            break;
                        }
                    }
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Ok(item);
                }
                None => {
                    tracing::warn!("cursor skipped a dangling entry (row deleted concurrently)");
                    self.single_step()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::KvBackend;
    use crate::codec::IndexDef;

    #[derive(Clone)]
    struct Identity;

    impl Codec for Identity {
        type Item = String;

        fn encode(&self, data: &Self::Item, _primary_key: Option<&Key>) -> Vec<u8> {
            data.as_bytes().to_vec()
        }

        fn decode(&self, bytes: &[u8], _primary_key: Option<&Key>) -> Result<Self::Item> {
            Ok(String::from_utf8(bytes.to_vec()).unwrap())
        }

        fn indices(&self) -> &[IndexDef<Self::Item>] {
            &[]
        }
    }

    fn seeded_map() -> <MemoryBackend as KvBackend>::Map {
        let backend = MemoryBackend::new();
        let map = backend.open_map("strings").unwrap();
        for i in 0..11 {
            let s = format!("String {i}");
            map.put(s.as_bytes(), s.as_bytes()).unwrap();
        }
        map
    }

    fn drain(cursor: &mut Cursor<<MemoryBackend as KvBackend>::Map, Identity>) -> Vec<String> {
        let mut out = Vec::new();
        while cursor.has_next() {
            out.push(cursor.next().unwrap());
        }
        out
    }

    #[test]
    fn full_scan_is_lexicographic() {
        let map = seeded_map();
        let mut cursor = Cursor::new(
            map,
            None,
            Arc::new(Identity),
            Key::START,
            Key::END,
            0,
            None,
            false,
            1,
        )
        .unwrap();
        let items = drain(&mut cursor);
        assert_eq!(
            items,
            vec![
                "String 0", "String 1", "String 10", "String 2", "String 3", "String 4",
                "String 5", "String 6", "String 7", "String 8", "String 9",
            ]
        );
    }

    #[test]
    fn reverse_with_start_and_count() {
        let map = seeded_map();
        let mut cursor = Cursor::new(
            map,
            None,
            Arc::new(Identity),
            Key::START,
            Key::END,
            2,
            Some(2),
            true,
            1,
        )
        .unwrap();
        let items = drain(&mut cursor);
        assert_eq!(items, vec!["String 7", "String 6"]);
    }

    #[test]
    fn exhausted_cursor_errors_on_next() {
        let map = seeded_map();
        let mut cursor = Cursor::new(
            map,
            None,
            Arc::new(Identity),
            Key::START,
            Key::END,
            0,
            Some(0),
            false,
            1,
        )
        .unwrap();
        assert!(!cursor.has_next());
        assert!(matches!(cursor.next(), Err(StoreError::NoSuchElement)));
    }

    #[test]
    fn skips_concurrently_deleted_row_without_charging_count() {
        let backend = MemoryBackend::new();
        let map = backend.open_map("strings").unwrap();
        for i in 0..10 {
            let s = format!("p{i}");
            map.put(s.as_bytes(), s.as_bytes()).unwrap();
        }
        let mut cursor = Cursor::new(
            map.clone(),
            None,
            Arc::new(Identity),
            Key::START,
            Key::from_bytes(b"p7".to_vec()),
            0,
            None,
            false,
            1,
        )
        .unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(cursor.next().unwrap());
        }
        map.remove(b"p7").unwrap();
        while cursor.has_next() {
            seen.push(cursor.next().unwrap());
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last().unwrap(), "p6");
    }

    #[test]
    fn sparse_bounds_with_no_keys_between_them_yield_nothing() {
        let backend = MemoryBackend::new();
        let map = backend.open_map("sparse").unwrap();
        map.put(b"a", b"a").unwrap();
        map.put(b"z", b"z").unwrap();

        let mut forward = Cursor::new(
            map.clone(),
            None,
            Arc::new(Identity),
            Key::from_bytes(b"e".to_vec()),
            Key::from_bytes(b"m".to_vec()),
            0,
            None,
            false,
            1,
        )
        .unwrap();
        assert!(!forward.has_next());
        assert!(matches!(forward.next(), Err(StoreError::NoSuchElement)));

        let mut reverse = Cursor::new(
            map,
            None,
            Arc::new(Identity),
            Key::from_bytes(b"e".to_vec()),
            Key::from_bytes(b"m".to_vec()),
            0,
            None,
            true,
            1,
        )
        .unwrap();
        assert!(!reverse.has_next());
        assert!(matches!(reverse.next(), Err(StoreError::NoSuchElement)));
    }
}
