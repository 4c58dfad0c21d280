//! Shaped-text caching.
//!
//! Shaping is the most expensive step of the text path, so shaped runs are
//! memoized in a fixed-size LRU keyed by a 64-bit hash of `(font, text)`.
//! Storage for the runs is preallocated up front; an evicted entry's storage
//! slot is handed to its replacement, so steady-state frames shape only text
//! they have not seen recently.

use crate::cache::lru::Lru;
use crate::font::text::ShapedRun;
use crate::font::FontId;

/// Number of shaped runs kept.
pub(crate) const SHAPE_CACHE_SIZE: usize = 256;

/// Initial per-run reservation (codepoints and positions).
pub(crate) const SHAPE_CACHE_RESERVE: usize = 64;

const SHAPE_HASH_SEED: u64 = 0x9f8e00d51d263c24;

/// ELF-style rolling hash, folded over `bytes` into `hash`.
pub(crate) fn elf_hash64(hash: &mut u64, bytes: &[u8]) {
    for &byte in bytes {
        *hash = (*hash << 4).wrapping_add(byte as u64);
        let x = *hash & 0xF000_0000_0000_0000;
        if x != 0 {
            *hash ^= x >> 24;
        }
        *hash &= !x;
    }
}

/// Cache key for a `(font, text)` pair.
pub(crate) fn shape_key(font: FontId, text: &str) -> u64 {
    let mut hash = SHAPE_HASH_SEED;
    elf_hash64(&mut hash, text.as_bytes());
    elf_hash64(&mut hash, &(font.0 as u64).to_le_bytes());
    hash
}

/// Result of a cache lookup: either a resident run or the storage slot the
/// caller must shape into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ShapeSlot {
    Hit(usize),
    Miss(usize),
}

impl ShapeSlot {
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            ShapeSlot::Hit(idx) | ShapeSlot::Miss(idx) => idx,
        }
    }
}

#[derive(Debug)]
struct ShapeEntry {
    /// Which font shaped this run; lets font removal invalidate its runs.
    font: FontId,
    hash: u64,
    run: ShapedRun,
}

/// LRU-managed storage of shaped runs.
#[derive(Debug)]
pub(crate) struct ShapeCache {
    storage: Vec<ShapeEntry>,
    state: Lru,
    next_slot: u32,
    reclaimed: Vec<u32>,
}

impl ShapeCache {
    pub(crate) fn new() -> Self {
        Self {
            storage: (0..SHAPE_CACHE_SIZE)
                .map(|_| ShapeEntry {
                    font: FontId(u32::MAX),
                    hash: 0,
                    run: ShapedRun::with_capacity(SHAPE_CACHE_RESERVE),
                })
                .collect(),
            state: Lru::with_capacity(SHAPE_CACHE_SIZE),
            next_slot: 0,
            reclaimed: Vec::new(),
        }
    }

    /// Find the storage slot for `(font, text)`, claiming one (fresh,
    /// reclaimed, or recycled from the least-recently-used entry) on a miss.
    pub(crate) fn lookup(&mut self, font: FontId, text: &str) -> ShapeSlot {
        let hash = shape_key(font, text);
        if let Some(idx) = self.state.get(hash) {
            return ShapeSlot::Hit(idx as usize);
        }

        let idx = if let Some(idx) = self.reclaimed.pop() {
            idx as usize
        } else if (self.next_slot as usize) < SHAPE_CACHE_SIZE {
            let idx = self.next_slot;
            self.next_slot += 1;
            idx as usize
        } else {
            self.state
                .next_evicted()
                .and_then(|victim| self.state.peek(victim))
                .unwrap_or_default() as usize
        };
        self.state.put(hash, idx as i32);

        let entry = &mut self.storage[idx];
        entry.font = font;
        entry.hash = hash;
        ShapeSlot::Miss(idx)
    }

    /// Invalidate every run shaped with `font`, handing their storage slots
    /// back for reuse.
    pub(crate) fn purge_font(&mut self, font: FontId) {
        for idx in 0..self.storage.len() {
            let entry = &self.storage[idx];
            if entry.font != font {
                continue;
            }
            // Guard against stale metadata left behind by LRU recycling.
            if self.state.peek(entry.hash) == Some(idx as i32) {
                self.state.remove(entry.hash);
                self.reclaimed.push(idx as u32);
            }
        }
    }

    #[inline]
    pub(crate) fn run(&self, idx: usize) -> &ShapedRun {
        &self.storage[idx].run
    }

    #[inline]
    pub(crate) fn run_mut(&mut self, idx: usize) -> &mut ShapedRun {
        &mut self.storage[idx].run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_input_sensitive() {
        let a = shape_key(FontId(0), "hello");
        let b = shape_key(FontId(0), "hello");
        let c = shape_key(FontId(0), "hellp");
        let d = shape_key(FontId(1), "hello");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn lookup_misses_then_hits() {
        let mut cache = ShapeCache::new();
        let slot = cache.lookup(FontId(0), "abc");
        assert_eq!(slot, ShapeSlot::Miss(0));
        cache.run_mut(slot.index()).codepoints.push('a');

        let slot = cache.lookup(FontId(0), "abc");
        assert_eq!(slot, ShapeSlot::Hit(0));
        assert_eq!(cache.run(slot.index()).codepoints, vec!['a']);
    }

    #[test]
    fn distinct_texts_get_distinct_slots() {
        let mut cache = ShapeCache::new();
        assert_eq!(cache.lookup(FontId(0), "a"), ShapeSlot::Miss(0));
        assert_eq!(cache.lookup(FontId(0), "b"), ShapeSlot::Miss(1));
    }

    #[test]
    fn saturated_cache_recycles_lru_slot() {
        let mut cache = ShapeCache::new();
        for i in 0..SHAPE_CACHE_SIZE as u32 {
            cache.lookup(FontId(i), "x");
        }
        // Promote the first entry; the second becomes the victim.
        assert!(matches!(cache.lookup(FontId(0), "x"), ShapeSlot::Hit(0)));

        let fresh = cache.lookup(FontId(9999), "x");
        assert_eq!(fresh, ShapeSlot::Miss(1));
        // The recycled entry is gone; looking it up claims a slot anew.
        assert!(matches!(cache.lookup(FontId(1), "x"), ShapeSlot::Miss(_)));
    }

    #[test]
    fn purge_invalidates_only_that_fonts_runs() {
        let mut cache = ShapeCache::new();
        cache.lookup(FontId(7), "alpha");
        cache.lookup(FontId(7), "beta");
        cache.lookup(FontId(8), "alpha");

        cache.purge_font(FontId(7));
        assert!(matches!(cache.lookup(FontId(8), "alpha"), ShapeSlot::Hit(_)));
        assert!(matches!(cache.lookup(FontId(7), "alpha"), ShapeSlot::Miss(_)));
        assert!(matches!(cache.lookup(FontId(7), "beta"), ShapeSlot::Miss(_)));
    }
}
