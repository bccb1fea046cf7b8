//! [`count`]: a degenerate cursor — no limit, no stride, no dereference — that walks physical
//! keys between two bounds and counts them.

use crate::backend::KvMap;
use crate::error::Result;
use crate::key::Key;

use std::cmp::Ordering;

/// Count the physical entries of `map` in `[lo, hi]`, inclusive, per `SPEC_FULL.md` §4.5.
///
/// Uses the same bound-resolution and advance rule as [`crate::cursor::Cursor`], but never
/// dereferences a value through the primary map — dangling secondary entries still count here,
/// since counting is a property of the index map alone.
pub fn count<M: KvMap>(map: &M, lo: &Key, hi: &Key) -> Result<u64> {
    let lower_key = if lo.is_end() {
        map.last_key()?
    } else if lo.is_start() {
        map.first_key()?
    } else {
        map.ceiling(lo.bytes())?
    };

    let Some(mut current) = lower_key else {
        return Ok(0);
    };

    let upper_key = if hi.is_end() {
        map.last_key()?
    } else if hi.is_start() {
        map.first_key()?
    } else {
        let mut candidate = map.floor(hi.bytes())?;
        let mut probe = map.ceiling(hi.bytes())?;
        while let Some(k) = probe {
            if hi.is_prefix_of(&Key::from_bytes(k.clone())) {
                probe = map.higher(&k)?;
                candidate = Some(k);
            } else {
                break;
            }
        }
        candidate
    };

    let Some(last) = upper_key else {
        return Ok(0);
    };

    // `current` (nearest to `lo`) and `last` (nearest to `hi`) are each resolved independently;
    // on a sparse map they can land in the wrong order (e.g. {"a", "z"} with lo="e", hi="m"
    // resolves current="z", last="a"), meaning the range is actually empty.
    if current.as_slice() > last.as_slice() {
        return Ok(0);
    }

    let mut total: u64 = 1;
    loop {
        if current == last {
            break;
        }
        let Some(next) = map.higher(&current)? else {
            break;
        };
        let candidate = Key::from_bytes(next.clone());
        if hi.compare(&candidate) == Ordering::Less && !hi.is_prefix_of(&candidate) {
            break;
        }
        total += 1;
        current = next;
    }
    Ok(total)
}
