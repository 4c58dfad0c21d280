//! The glyph cache and its public facade.
//!
//! [`FontCache`] owns every piece of state the text path needs: the font
//! registry, the four-region atlas, the scratch-buffer batch, the shape cache
//! and the per-frame draw list. It is a plain value; create one, thread it
//! through your frame loop, drop it when done. No globals.
//!
//! Per frame:
//! 1. call [`FontCache::draw_text`] any number of times;
//! 2. optionally [`FontCache::optimise_drawlist`];
//! 3. execute [`FontCache::drawlist`] on your backend (see [`crate::render`]);
//! 4. call [`FontCache::flush_drawlist`] to clear for the next frame.
//!
//! `draw_text` walks the shaped run keeping a *batch window*: the span of
//! codepoints whose atlas slots are all still valid. Uncached glyphs are
//! staged into the scratch batch as the window grows. The window must break
//! when staging one more glyph would evict a slot the window already
//! references (the eviction predictor catches this), when an oversize glyph
//! needs the scratch buffer for itself, or when the window grows degenerate.
//! Breaking the window flushes the pending batch and composites the
//! windowed glyphs before the walk continues.

pub mod atlas;
pub mod lru;

pub(crate) mod batch;
pub(crate) mod shape;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use glam::{vec2, Vec2};
use log::{debug, warn};

use crate::cache::atlas::{classify, Atlas, RegionClass, ATLAS_HEIGHT, ATLAS_WIDTH, GLYPH_PADDING};
use crate::cache::batch::GlyphBatch;
use crate::cache::shape::{ShapeCache, ShapeSlot};
use crate::font::outline::{OutlineFont, TtfFont};
use crate::font::tessellate::TessellateOptions;
use crate::font::text::{shape_fallback, ShapedRun};
use crate::font::{FontEntry, FontError, FontId, FontStore};
use crate::render::drawlist::{to_texture_space, DrawCall, DrawList, Pass};

/// Ceiling on distinct codepoints per batch window; beyond it the window is
/// broken rather than letting the seen-set grow without bound.
const MAX_BATCH_CODEPOINTS: usize = 1024;

/// Composite LRU key for a glyph: font id in the high half, codepoint low.
#[inline]
fn composite_key(font: FontId, codepoint: char) -> u64 {
    ((font.0 as u64) << 32) | codepoint as u64
}

/// GPU-resident glyph cache.
///
/// See the [module docs](self) for the per-frame protocol.
pub struct FontCache {
    fonts: FontStore,
    atlas: Atlas,
    batch: GlyphBatch,
    shapes: ShapeCache,
    drawlist: DrawList,
    /// Composite keys drawn by the current batch window.
    seen: HashSet<u64>,
    /// Contour scratch reused across glyph rasterizations.
    contour: Vec<Vec2>,
    tess: TessellateOptions,
    snap_width: u32,
    snap_height: u32,
    colour: [f32; 4],
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FontCache {
    pub fn new() -> Self {
        Self {
            fonts: FontStore::new(),
            atlas: Atlas::new(),
            batch: GlyphBatch::new(),
            shapes: ShapeCache::new(),
            drawlist: DrawList::with_capacity(4096, 8192, 512),
            seen: HashSet::with_capacity(256),
            contour: Vec::with_capacity(256),
            tess: TessellateOptions::default(),
            snap_width: 0,
            snap_height: 0,
            colour: [1.0; 4],
        }
    }

    /// Register a font held in memory (ttf/otf; face 0 for collections).
    ///
    /// The byte buffer is shared, not copied; registering the same buffer at
    /// several sizes is cheap.
    pub fn load(&mut self, data: Arc<[u8]>, size_px: f32) -> Result<FontId, FontError> {
        self.load_face(data, 0, size_px)
    }

    /// Register one face of a font collection held in memory.
    pub fn load_face(
        &mut self,
        data: Arc<[u8]>,
        index: u32,
        size_px: f32,
    ) -> Result<FontId, FontError> {
        let font = TtfFont::from_bytes(data, index)?;
        Ok(self.fonts.insert(Box::new(font), size_px))
    }

    /// Register a font from a file on disk.
    pub fn load_file(&mut self, path: impl AsRef<Path>, size_px: f32) -> Result<FontId, FontError> {
        let data: Arc<[u8]> = Arc::from(std::fs::read(path)?);
        self.load(data, size_px)
    }

    /// Register a custom outline backend.
    pub fn load_outline(&mut self, font: Box<dyn OutlineFont>, size_px: f32) -> FontId {
        self.fonts.insert(font, size_px)
    }

    /// Remove a font registration, recycling its id. The font's atlas slots
    /// and cached shaped runs are invalidated so a later registration that
    /// reuses the id starts clean.
    pub fn unload(&mut self, font: FontId) {
        self.fonts.remove(font);
        for region in atlas::Region::ALL {
            self.atlas.region_mut(region).purge_font(font.0);
        }
        self.shapes.purge_font(font);
    }

    /// Snap composite positions to a virtual pixel grid (typically the target
    /// surface size). May affect perceived kerning; zero disables snapping.
    pub fn configure_snap(&mut self, snap_width: u32, snap_height: u32) {
        self.snap_width = snap_width;
        self.snap_height = snap_height;
    }

    /// Colour applied to subsequent composite draw calls.
    pub fn set_colour(&mut self, colour: [f32; 4]) {
        self.colour = colour;
    }

    /// Tessellation options for glyph rasterization.
    pub fn set_tessellate_options(&mut self, opts: TessellateOptions) {
        self.tess = opts;
    }

    /// The draw list accumulated since the last [`FontCache::flush_drawlist`].
    pub fn drawlist(&self) -> &DrawList {
        &self.drawlist
    }

    /// Merge adjacent compatible draw calls; see [`DrawList::optimise`].
    pub fn optimise_drawlist(&mut self) {
        self.drawlist.optimise();
    }

    /// Clear the draw list. Call once per frame, after the backend has
    /// executed it; draw calls accumulate without bound otherwise.
    pub fn flush_drawlist(&mut self) {
        self.drawlist.clear();
    }

    /// Append everything needed to render `text` to the draw list.
    ///
    /// `pos` is the baseline origin and `scale` the per-axis size of one
    /// pixel, both in the target's normalized space (a reasonable choice is
    /// `scale = (1 / width, 1 / height)`). Shaping is cached per
    /// `(font, text)`; glyphs already resident in the atlas cost one quad.
    ///
    /// Per-glyph problems (no glyph in the font, too large to rasterize)
    /// skip the glyph and never fail the call.
    pub fn draw_text(
        &mut self,
        font: FontId,
        text: &str,
        pos: Vec2,
        scale: Vec2,
    ) -> Result<(), FontError> {
        self.fonts.get(font)?;

        // Shape (or fetch) the run up front; the walk borrows it immutably.
        let run_idx = {
            let slot = self.shapes.lookup(font, text);
            if let ShapeSlot::Miss(idx) = slot {
                let entry = self.fonts.get(font)?;
                let run = self.shapes.run_mut(idx);
                shape_fallback(run, entry.font.as_ref(), entry.size, entry.size_scale, text);
            }
            slot.index()
        };

        let mut pos = pos;
        if self.snap_width > 0 {
            pos.x = (pos.x * self.snap_width as f32 + 0.5).trunc() / self.snap_width as f32;
        }
        if self.snap_height > 0 {
            pos.y = (pos.y * self.snap_height as f32 + 0.5).trunc() / self.snap_height as f32;
        }

        let FontCache {
            fonts,
            atlas,
            batch,
            shapes,
            drawlist,
            seen,
            contour,
            tess,
            colour,
            ..
        } = self;
        let entry = fonts.get(font)?;
        let run = shapes.run(run_idx);

        let mut window_start = 0;
        for i in 0..run.len() {
            let ch = run.codepoints[i];
            if glyph_missing_or_empty(entry, ch) {
                continue;
            }
            if can_batch(atlas, batch, drawlist, contour, seen, entry, font, ch, *tess) {
                continue;
            }

            // The window can no longer grow: draw it, then start a new one
            // at the offending codepoint.
            draw_window(
                atlas,
                batch,
                drawlist,
                contour,
                entry,
                font,
                run,
                window_start..i,
                pos,
                scale,
                *colour,
                *tess,
            );
            seen.clear();

            stage_codepoint(atlas, batch, drawlist, contour, entry, font, ch, *tess);
            seen.insert(composite_key(font, ch));
            window_start = i;
        }
        draw_window(
            atlas,
            batch,
            drawlist,
            contour,
            entry,
            font,
            run,
            window_start..run.len(),
            pos,
            scale,
            *colour,
            *tess,
        );
        seen.clear();
        Ok(())
    }
}

fn glyph_missing_or_empty(entry: &FontEntry, codepoint: char) -> bool {
    match entry.font.glyph_index(codepoint) {
        None => true,
        Some(glyph) => entry.font.is_glyph_empty(glyph),
    }
}

/// Try to extend the current batch window with `codepoint`.
///
/// Returns `false` when the window must break first: the glyph is oversize
/// (or unclassifiable), the window is degenerate, or staging the glyph would
/// evict a slot the window still references. On success the glyph is resident
/// (staged now if it was not) and recorded in the seen-set.
#[allow(clippy::too_many_arguments)]
fn can_batch(
    atlas: &mut Atlas,
    batch: &mut GlyphBatch,
    main: &mut DrawList,
    contour: &mut Vec<Vec2>,
    seen: &mut HashSet<u64>,
    entry: &FontEntry,
    font: FontId,
    codepoint: char,
    tess: TessellateOptions,
) -> bool {
    let Some(glyph) = entry.font.glyph_index(codepoint) else {
        return false;
    };
    let Some(bounds) = entry.font.glyph_bounds(glyph) else {
        return false;
    };
    let Some(RegionClass::Cached(region)) = classify(&bounds, entry.size_scale) else {
        return false;
    };
    if seen.len() > MAX_BATCH_CODEPOINTS {
        return false;
    }

    let key = composite_key(font, codepoint);
    let state = atlas.region_mut(region);
    if state.get(key).is_none() {
        if state.is_full() {
            if let Some(victim) = state.next_evicted() {
                if seen.contains(&victim) {
                    // Staging now would invalidate a slot the window has
                    // already drawn from.
                    debug!(
                        "batch window break: predicted evictee {victim:#018x} \
                         is referenced by the current window"
                    );
                    return false;
                }
            }
        }
        let slot = state.assign(key);
        batch.stage(
            main,
            contour,
            entry.font.as_ref(),
            glyph,
            &bounds,
            entry.size_scale,
            region,
            slot,
            tess,
        );
    }
    seen.insert(key);
    true
}

/// Stage `codepoint` into its atlas region if it is cacheable and not already
/// resident. Oversize and unclassifiable glyphs are left alone; they never
/// live in the atlas.
#[allow(clippy::too_many_arguments)]
fn stage_codepoint(
    atlas: &mut Atlas,
    batch: &mut GlyphBatch,
    main: &mut DrawList,
    contour: &mut Vec<Vec2>,
    entry: &FontEntry,
    font: FontId,
    codepoint: char,
    tess: TessellateOptions,
) {
    let Some(glyph) = entry.font.glyph_index(codepoint) else {
        return;
    };
    if entry.font.is_glyph_empty(glyph) {
        return;
    }
    let Some(bounds) = entry.font.glyph_bounds(glyph) else {
        return;
    };
    let Some(RegionClass::Cached(region)) = classify(&bounds, entry.size_scale) else {
        return;
    };

    let key = composite_key(font, codepoint);
    let state = atlas.region_mut(region);
    if state.get(key).is_some() {
        return;
    }
    let slot = state.assign(key);
    batch.stage(
        main,
        contour,
        entry.font.as_ref(),
        glyph,
        &bounds,
        entry.size_scale,
        region,
        slot,
        tess,
    );
}

/// Flush the pending batch, then composite every glyph in the window.
#[allow(clippy::too_many_arguments)]
fn draw_window(
    atlas: &mut Atlas,
    batch: &mut GlyphBatch,
    main: &mut DrawList,
    contour: &mut Vec<Vec2>,
    entry: &FontEntry,
    font: FontId,
    run: &ShapedRun,
    window: std::ops::Range<usize>,
    pos: Vec2,
    scale: Vec2,
    colour: [f32; 4],
    tess: TessellateOptions,
) {
    batch.flush(main);
    for i in window {
        let codepoint = run.codepoints[i];
        let translate = pos + run.positions[i] * scale;
        draw_resident_codepoint(
            atlas, batch, main, contour, entry, font, codepoint, translate, scale, colour, tess,
        );
    }
}

/// Composite one glyph at `translate`: a pass-3 quad against its atlas slot,
/// or the direct pass-4 path for oversize glyphs.
#[allow(clippy::too_many_arguments)]
fn draw_resident_codepoint(
    atlas: &mut Atlas,
    batch: &mut GlyphBatch,
    main: &mut DrawList,
    contour: &mut Vec<Vec2>,
    entry: &FontEntry,
    font: FontId,
    codepoint: char,
    translate: Vec2,
    scale: Vec2,
    colour: [f32; 4],
    tess: TessellateOptions,
) {
    let Some(glyph) = entry.font.glyph_index(codepoint) else {
        return;
    };
    if entry.font.is_glyph_empty(glyph) {
        return;
    }
    let Some(bounds) = entry.font.glyph_bounds(glyph) else {
        return;
    };

    let region = match classify(&bounds, entry.size_scale) {
        Some(RegionClass::Cached(region)) => region,
        Some(RegionClass::Uncached { oversample }) => {
            batch.draw_uncached(
                main,
                contour,
                entry.font.as_ref(),
                glyph,
                &bounds,
                entry.size_scale,
                oversample,
                translate,
                scale,
                colour,
                tess,
            );
            return;
        }
        None => {
            warn!("glyph for {codepoint:?} too large to rasterize; skipped");
            return;
        }
    };

    let key = composite_key(font, codepoint);
    let Some(slot) = atlas.region_mut(region).get(key) else {
        // The batching walk guarantees residency for everything it windows.
        debug_assert!(false, "windowed codepoint lost its atlas slot");
        return;
    };

    let pad = GLYPH_PADDING as f32;
    let (slot_pos, _) = region.slot_rect(slot);
    let mut uv_pos = slot_pos;
    let mut uv_size = vec2(
        bounds.width() * entry.size_scale + 2.0 * pad,
        bounds.height() * entry.size_scale + 2.0 * pad,
    );

    let bounds_scaled = vec2(
        (bounds.x_min * entry.size_scale - 0.5).trunc(),
        (bounds.y_min * entry.size_scale - 0.5).trunc(),
    );
    let dest = translate + scale * bounds_scaled - scale * pad;
    let dest_size = scale * uv_size;
    to_texture_space(&mut uv_pos, &mut uv_size, ATLAS_WIDTH as f32, ATLAS_HEIGHT as f32);

    let mut call = DrawCall {
        pass: Pass::CompositeCached,
        colour,
        start_index: main.index_mark(),
        ..DrawCall::default()
    };
    main.push_quad(dest, dest + dest_size, uv_pos, uv_pos + uv_size);
    call.end_index = main.index_mark();
    main.calls.push(call);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::atlas::Region;
    use crate::font::outline::testing::SquareFont;

    fn cache_with_font(size_px: f32) -> (FontCache, FontId) {
        let mut cache = FontCache::new();
        let font = cache.load_outline(Box::new(SquareFont::new()), size_px);
        (cache, font)
    }

    fn passes(cache: &FontCache) -> Vec<Pass> {
        cache.drawlist().calls.iter().map(|c| c.pass).collect()
    }

    #[test]
    fn unknown_font_is_an_error() {
        let mut cache = FontCache::new();
        assert!(matches!(
            cache.draw_text(FontId(0), "hi", Vec2::ZERO, Vec2::ONE),
            Err(FontError::InvalidFontId(FontId(0)))
        ));
    }

    #[test]
    fn unloaded_font_is_an_error_and_id_is_recycled() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.unload(font);
        assert!(cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).is_err());
        let again = cache.load_outline(Box::new(SquareFont::new()), 24.0);
        assert_eq!(again, font);
        assert!(cache.draw_text(again, "a", Vec2::ZERO, Vec2::ONE).is_ok());
    }

    #[test]
    fn recycled_id_does_not_serve_the_old_fonts_glyphs() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        cache.flush_drawlist();

        cache.unload(font);
        let recycled = cache.load_outline(
            Box::new(SquareFont {
                side: 1200.0,
                ..SquareFont::new()
            }),
            24.0,
        );
        assert_eq!(recycled, font);

        // Same id, same codepoint, different font: the glyph must be staged
        // anew instead of compositing the old pixels.
        cache.draw_text(recycled, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        assert!(passes(&cache).contains(&Pass::BlitAtlas));
    }

    #[test]
    fn first_draw_rasterizes_blits_then_composites() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        assert_eq!(
            passes(&cache),
            vec![
                Pass::RasterizeGlyph,
                Pass::BlitAtlas,
                Pass::BlitAtlas,
                Pass::RasterizeGlyph,
                Pass::CompositeCached,
            ]
        );
        // The wipe marker is the empty pass-1 call.
        let marker = cache.drawlist().calls[3];
        assert!(marker.clear_before_draw);
        assert_eq!(marker.start_index, marker.end_index);
    }

    #[test]
    fn resident_glyphs_cost_one_quad() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        cache.flush_drawlist();
        cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        assert_eq!(passes(&cache), vec![Pass::CompositeCached]);
    }

    #[test]
    fn empty_and_unmapped_codepoints_are_skipped() {
        let (mut cache, font) = cache_with_font(24.0);
        cache
            .draw_text(font, " \u{FFFD} ", Vec2::ZERO, Vec2::ONE)
            .unwrap();
        assert!(cache.drawlist().is_empty());
    }

    #[test]
    fn repeat_draws_leave_atlas_state_fixed() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.draw_text(font, "abc", Vec2::ZERO, Vec2::ONE).unwrap();
        let occupied = cache.atlas.region(Region::A).len();
        cache.flush_drawlist();
        cache.draw_text(font, "abc", Vec2::ZERO, Vec2::ONE).unwrap();
        assert_eq!(cache.atlas.region(Region::A).len(), occupied);
    }

    #[test]
    fn oversize_glyph_takes_uncached_path() {
        // 600 units * 0.4 = 240px: past region D, fits the scratch at 2x.
        let (mut cache, font) = cache_with_font(400.0);
        cache.draw_text(font, "A", Vec2::ZERO, Vec2::ONE).unwrap();
        assert_eq!(
            passes(&cache),
            vec![
                Pass::RasterizeGlyph,
                Pass::CompositeUncached,
                Pass::RasterizeGlyph,
            ]
        );
    }

    #[test]
    fn window_breaks_when_staging_would_evict_a_seen_glyph() {
        let (mut cache, font) = cache_with_font(24.0);
        let cap = Region::A.capacity() as usize;

        // One more distinct codepoint than region A holds, in one draw.
        let text: String = (0..=cap as u32)
            .map(|i| char::from_u32(0x4E00 + i).unwrap())
            .collect();
        cache.draw_text(font, &text, Vec2::ZERO, Vec2::ONE).unwrap();

        let region = cache.atlas.region(Region::A);
        assert_eq!(region.len(), cap);

        // The overflow evicted the first codepoint of the frame.
        assert_eq!(region.peek(composite_key(font, '\u{4E00}')), None);
        assert!(region
            .peek(composite_key(font, char::from_u32(0x4E00 + cap as u32).unwrap()))
            .is_some());

        // The forced window break composites the first window before the
        // last glyph's rasterization enters the list.
        let calls = &cache.drawlist().calls;
        let first_composite = calls
            .iter()
            .position(|c| c.pass == Pass::CompositeCached)
            .unwrap();
        let last_raster = calls
            .iter()
            .rposition(|c| c.pass == Pass::RasterizeGlyph && c.end_index > c.start_index)
            .unwrap();
        assert!(first_composite < last_raster);
    }

    #[test]
    fn colour_flows_into_composites() {
        let (mut cache, font) = cache_with_font(24.0);
        cache.set_colour([0.2, 0.4, 0.6, 0.8]);
        cache.draw_text(font, "a", Vec2::ZERO, Vec2::ONE).unwrap();
        let composite = cache
            .drawlist()
            .calls
            .iter()
            .find(|c| c.pass == Pass::CompositeCached)
            .unwrap();
        assert_eq!(composite.colour, [0.2, 0.4, 0.6, 0.8]);
    }

    #[test]
    fn snap_quantizes_target_position() {
        let (mut snapped, font) = cache_with_font(24.0);
        snapped.configure_snap(100, 100);
        snapped
            .draw_text(font, "a", vec2(0.123, 0.456), Vec2::ONE)
            .unwrap();

        let (mut direct, font2) = cache_with_font(24.0);
        direct
            .draw_text(font2, "a", vec2(0.12, 0.46), Vec2::ONE)
            .unwrap();

        // The composite quad is the last geometry emitted in both frames.
        let verts_snapped = &snapped.drawlist().vertices;
        let verts_direct = &direct.drawlist().vertices;
        assert_eq!(
            verts_snapped[verts_snapped.len() - 4..],
            verts_direct[verts_direct.len() - 4..]
        );
    }
}
