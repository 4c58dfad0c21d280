//! Atlas slot allocation.
//!
//! One `4096 x 2048` single-channel texture is partitioned statically into
//! four regions, each a fixed grid of equal-size slots:
//!
//! ```text
//!         2k
//!   +---------+--------+----------------+
//!   |    A    |        |                |
//!   |  32x32  |   C    |                |
//!   +---------+ 64x64  |       D        |
//!   |    B    |        |    128x128     |
//!   |  32x64  |        |                |
//!   +---------+--------+----------------+
//!
//!   A: 1024 slots   B: 512   C: 512   D: 256
//! ```
//!
//! A glyph is classified into the smallest region whose slot fits its padded,
//! size-scaled bounds. Each region runs its own LRU over composite
//! `(font, codepoint)` keys; slots fill monotonically until the region is at
//! capacity, after which the least-recently-used key is evicted and its slot
//! reused. Glyphs too big for region D fall back to the uncached path as long
//! as they fit the scratch glyph buffer at reduced oversampling.

use glam::{vec2, Vec2};
use log::debug;

use crate::cache::lru::Lru;
use crate::font::outline::GlyphBounds;

pub const ATLAS_WIDTH: u32 = 4096;
pub const ATLAS_HEIGHT: u32 = 2048;

/// Empty border kept around every glyph in its slot.
pub const GLYPH_PADDING: u32 = 1;

/// Oversampling factors applied when rasterizing into the scratch buffer.
pub const OVERSAMPLE_X: u32 = 4;
pub const OVERSAMPLE_Y: u32 = 4;

/// How many region-D-sized glyphs the scratch buffer packs per flush. Tighter
/// regions pack more in practice.
pub const GLYPH_BUFFER_BATCH: u32 = 4;

pub const GLYPH_BUFFER_WIDTH: u32 = Region::D.slot_width() * OVERSAMPLE_X * GLYPH_BUFFER_BATCH;
pub const GLYPH_BUFFER_HEIGHT: u32 = Region::D.slot_height() * OVERSAMPLE_Y;

/// One of the four cached atlas regions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Region {
    A,
    B,
    C,
    D,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::A, Region::B, Region::C, Region::D];

    /// Region tag carried by pass-2 blit draw calls.
    #[inline]
    pub const fn index(self) -> u32 {
        match self {
            Region::A => 0,
            Region::B => 1,
            Region::C => 2,
            Region::D => 3,
        }
    }

    #[inline]
    pub const fn slot_width(self) -> u32 {
        match self {
            Region::A | Region::B => 32,
            Region::C => 64,
            Region::D => 128,
        }
    }

    #[inline]
    pub const fn slot_height(self) -> u32 {
        match self {
            Region::A => 32,
            Region::B | Region::C => 64,
            Region::D => 128,
        }
    }

    /// Extent of the region's rectangle within the atlas.
    #[inline]
    pub const fn extent(self) -> (u32, u32) {
        match self {
            Region::A | Region::B => (ATLAS_WIDTH / 4, ATLAS_HEIGHT / 2),
            Region::C => (ATLAS_WIDTH / 4, ATLAS_HEIGHT),
            Region::D => (ATLAS_WIDTH / 2, ATLAS_HEIGHT),
        }
    }

    /// Pixel offset of the region's rectangle within the atlas.
    #[inline]
    pub const fn offset(self) -> (u32, u32) {
        match self {
            Region::A => (0, 0),
            Region::B => (0, ATLAS_HEIGHT / 2),
            Region::C => (ATLAS_WIDTH / 4, 0),
            Region::D => (ATLAS_WIDTH / 2, 0),
        }
    }

    /// Slots per row.
    #[inline]
    pub const fn x_capacity(self) -> u32 {
        self.extent().0 / self.slot_width()
    }

    /// Total slot count.
    #[inline]
    pub const fn capacity(self) -> u32 {
        self.x_capacity() * (self.extent().1 / self.slot_height())
    }

    /// On-atlas pixel rectangle (origin, extent) of a slot.
    pub fn slot_rect(self, slot: u32) -> (Vec2, Vec2) {
        let (w, h) = (self.slot_width(), self.slot_height());
        let (ox, oy) = self.offset();
        let x = (slot % self.x_capacity()) * w + ox;
        let y = (slot / self.x_capacity()) * h + oy;
        (vec2(x as f32, y as f32), vec2(w as f32, h as f32))
    }
}

// Packing-strategy sanity checks; update these if region geometry changes.
const _: () = assert!(Region::A.capacity() == 1024);
const _: () = assert!(Region::B.capacity() == 512);
const _: () = assert!(Region::C.capacity() == 512);
const _: () = assert!(Region::D.capacity() == 256);
const _: () = assert!(GLYPH_BUFFER_WIDTH == 2048 && GLYPH_BUFFER_HEIGHT == 512);

/// Where a glyph's pixels will live for the current frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegionClass {
    /// Cached in an atlas region slot.
    Cached(Region),
    /// Too big for region D: rendered per-use from the scratch buffer at the
    /// given (reduced) oversample factor.
    Uncached { oversample: f32 },
}

/// Classify a glyph by its padded on-atlas size, choosing the smallest region
/// that fits. Returns `None` when the glyph cannot even fit the scratch
/// buffer un-oversampled; such glyphs are skipped.
pub fn classify(bounds: &GlyphBounds, size_scale: f32) -> Option<RegionClass> {
    let pad = 2.0 * GLYPH_PADDING as f32;
    let bw = bounds.width() * size_scale + pad;
    let bh = bounds.height() * size_scale + pad;

    let class = if bw <= Region::A.slot_width() as f32 && bh <= Region::A.slot_height() as f32 {
        // Small glyphs: punctuation and the like.
        RegionClass::Cached(Region::A)
    } else if bw <= Region::B.slot_width() as f32 && bh <= Region::B.slot_height() as f32 {
        // Tall glyphs: most european alphabets at text sizes.
        RegionClass::Cached(Region::B)
    } else if bw <= Region::C.slot_width() as f32 && bh <= Region::C.slot_height() as f32 {
        // Big glyphs: asian typography.
        RegionClass::Cached(Region::C)
    } else if bw <= Region::D.slot_width() as f32 && bh <= Region::D.slot_height() as f32 {
        // Huge glyphs: titles, 4k.
        RegionClass::Cached(Region::D)
    } else if bw <= (GLYPH_BUFFER_WIDTH / 2) as f32 && bh <= (GLYPH_BUFFER_HEIGHT / 2) as f32 {
        RegionClass::Uncached { oversample: 2.0 }
    } else if bw <= GLYPH_BUFFER_WIDTH as f32 && bh <= GLYPH_BUFFER_HEIGHT as f32 {
        RegionClass::Uncached { oversample: 1.0 }
    } else {
        return None;
    };
    Some(class)
}

/// Slot bookkeeping for one region: an LRU over composite keys, the
/// monotonic high-water mark of never-used slots, and slots handed back by
/// font removal.
#[derive(Debug)]
pub struct AtlasRegion {
    region: Region,
    lru: Lru,
    next_free: u32,
    reclaimed: Vec<u32>,
}

impl AtlasRegion {
    fn new(region: Region) -> Self {
        Self {
            region,
            lru: Lru::with_capacity(region.capacity() as usize),
            next_free: 0,
            reclaimed: Vec::new(),
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.lru.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    /// Whether no unoccupied slot remains; from here on, new keys evict.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.reclaimed.is_empty() && self.next_free >= self.region.capacity()
    }

    /// Slot for `key` if resident, promoting it to most-recently-used.
    #[inline]
    pub fn get(&mut self, key: u64) -> Option<u32> {
        self.lru.get(key).map(|slot| slot as u32)
    }

    /// Slot for `key` if resident, without touching recency.
    #[inline]
    pub fn peek(&self, key: u64) -> Option<u32> {
        self.lru.peek(key).map(|slot| slot as u32)
    }

    /// The key the next [`AtlasRegion::assign`] of an unknown key would
    /// evict, if the region is saturated.
    #[inline]
    pub fn next_evicted(&self) -> Option<u64> {
        self.lru.next_evicted()
    }

    /// Assign a slot to a new key, evicting the least-recently-used key when
    /// no unoccupied slot remains.
    pub fn assign(&mut self, key: u64) -> u32 {
        if let Some(slot) = self.reclaimed.pop() {
            self.lru.put(key, slot as i32);
            return slot;
        }
        if self.next_free < self.region.capacity() {
            let slot = self.next_free;
            self.next_free += 1;
            self.lru.put(key, slot as i32);
            return slot;
        }

        let slot = match self.lru.next_evicted() {
            Some(victim) => {
                let slot = self.lru.peek(victim).unwrap_or_default();
                debug!(
                    "atlas region {:?}: evicting key {victim:#018x} from slot {slot}",
                    self.region
                );
                slot
            }
            None => 0,
        };
        self.lru.put(key, slot);
        slot as u32
    }

    /// Drop every key belonging to `font_id`, handing their slots back for
    /// reuse. Called when a font is removed so a later registration that
    /// recycles the id cannot hit another font's pixels.
    pub fn purge_font(&mut self, font_id: u32) {
        let stale: Vec<u64> = self
            .lru
            .keys()
            .filter(|key| (key >> 32) as u32 == font_id)
            .collect();
        for key in stale {
            if let Some(slot) = self.lru.remove(key) {
                self.reclaimed.push(slot as u32);
            }
        }
    }
}

/// The four per-region LRU states.
#[derive(Debug)]
pub struct Atlas {
    regions: [AtlasRegion; 4],
}

impl Default for Atlas {
    fn default() -> Self {
        Self::new()
    }
}

impl Atlas {
    pub fn new() -> Self {
        Self {
            regions: Region::ALL.map(AtlasRegion::new),
        }
    }

    #[inline]
    pub fn region(&self, region: Region) -> &AtlasRegion {
        &self.regions[region.index() as usize]
    }

    #[inline]
    pub fn region_mut(&mut self, region: Region) -> &mut AtlasRegion {
        &mut self.regions[region.index() as usize]
    }
}
