//! Glyph-update batching.
//!
//! New glyphs are not rasterized straight into the atlas: at atlas resolution
//! the fans alias badly, and rasterizing 4x4 oversampled *in place* would
//! waste sixteen times the atlas area. Instead every new glyph is drawn
//! oversampled into a shared scratch texture and a 16-tap box downsample
//! blits it into its final slot.
//!
//! Glyphs pack left-to-right into the scratch buffer and flush as one batch:
//! - pass-1 fan geometry goes straight into the main draw list as each glyph
//!   is staged;
//! - the matching pass-2 atlas work (a slot clear, then the downsample blit)
//!   queues up in two intermediate draw lists, merged into the main list
//!   clear-first on flush;
//! - after a flush that staged anything, an empty pass-1 call with
//!   `clear_before_draw` tells the backend to wipe the scratch texture before
//!   it is drawn into again.
//!
//! Oversize glyphs that fit no region skip the atlas entirely: the batch is
//! flushed, the glyph is rasterized alone at reduced oversampling, and a
//! pass-4 quad composites it straight from the scratch buffer.

use glam::{vec2, Vec2};
use log::trace;

use crate::cache::atlas::{
    Region, ATLAS_HEIGHT, ATLAS_WIDTH, GLYPH_BUFFER_BATCH, GLYPH_BUFFER_HEIGHT, GLYPH_BUFFER_WIDTH,
    GLYPH_PADDING, OVERSAMPLE_X, OVERSAMPLE_Y,
};
use crate::font::outline::{GlyphBounds, GlyphIndex, OutlineFont};
use crate::font::tessellate::{rasterize_glyph, TessellateOptions};
use crate::render::drawlist::{
    to_clip_space, to_texture_space, DrawCall, DrawList, Pass, REGION_CLEAR,
};

/// Pending scratch-buffer work for the current glyph-update batch.
pub(crate) struct GlyphBatch {
    /// Horizontal fill cursor into the scratch texture, in pixels.
    pub(crate) next_x: u32,
    clear_list: DrawList,
    blit_list: DrawList,
}

impl GlyphBatch {
    pub(crate) fn new() -> Self {
        let calls = GLYPH_BUFFER_BATCH as usize * 2;
        Self {
            next_x: 0,
            clear_list: DrawList::with_capacity(calls * 4, calls * 6, calls),
            blit_list: DrawList::with_capacity(calls * 4, calls * 6, calls),
        }
    }

    /// Merge the pending atlas work into `main` (clears first, then blits)
    /// and reset the batch. If anything was staged, append the scratch-wipe
    /// marker so the backend clears the buffer before the next batch.
    pub(crate) fn flush(&mut self, main: &mut DrawList) {
        main.merge(&self.clear_list);
        main.merge(&self.blit_list);
        self.clear_list.clear();
        self.blit_list.clear();

        if self.next_x != 0 {
            trace!("glyph batch flushed at cursor {}", self.next_x);
            main.calls.push(DrawCall {
                pass: Pass::RasterizeGlyph,
                clear_before_draw: true,
                ..DrawCall::default()
            });
            self.next_x = 0;
        }
    }

    /// Stage one glyph into the scratch buffer and queue its atlas update.
    ///
    /// Flushes first when the glyph's packed width would overflow the
    /// remaining scratch row. Emits, in order: pass-1 fan geometry into
    /// `main`, a pending slot clear, and a pending downsample blit targeting
    /// `(region, slot)`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn stage(
        &mut self,
        main: &mut DrawList,
        contour: &mut Vec<Vec2>,
        font: &dyn OutlineFont,
        glyph: GlyphIndex,
        bounds: &GlyphBounds,
        size_scale: f32,
        region: Region,
        slot: u32,
        opts: TessellateOptions,
    ) {
        let pad = GLYPH_PADDING as f32;
        let (ox, oy) = (OVERSAMPLE_X as f32, OVERSAMPLE_Y as f32);

        let mut draw_scale = vec2(size_scale * ox, size_scale * oy);
        let mut draw_translate = vec2(
            -bounds.x_min * draw_scale.x + pad,
            -bounds.y_min * draw_scale.y + pad,
        );
        // Whole-pixel placement in the scratch buffer keeps the downsample
        // taps aligned with the rasterized footprint.
        draw_translate.x = (draw_translate.x + 0.999_999_9).trunc();
        draw_translate.y = (draw_translate.y + 0.999_999_9).trunc();

        let width_px = (bounds.width() * draw_scale.x + 1.0) as u32
            + 2 * OVERSAMPLE_X * GLYPH_PADDING;
        if self.next_x + width_px >= GLYPH_BUFFER_WIDTH {
            self.flush(main);
        }

        // Destination rects on the atlas: the whole slot for the clear, the
        // padded glyph footprint for the blit.
        let (slot_pos, slot_size) = region.slot_rect(slot);
        let mut dest = slot_pos;
        let mut dest_size = slot_size;
        let mut glyph_dest = slot_pos;
        let mut glyph_dest_size = vec2(
            bounds.width() * size_scale + 2.0 * pad,
            bounds.height() * size_scale + 2.0 * pad,
        );
        to_clip_space(&mut dest, &mut dest_size, ATLAS_WIDTH as f32, ATLAS_HEIGHT as f32);
        to_clip_space(
            &mut glyph_dest,
            &mut glyph_dest_size,
            ATLAS_WIDTH as f32,
            ATLAS_HEIGHT as f32,
        );

        // Source rect: the oversampled footprint at the current cursor.
        let mut src = vec2(self.next_x as f32, 0.0);
        let mut src_size = vec2(
            bounds.width() * draw_scale.x + 2.0 * ox * pad,
            bounds.height() * draw_scale.y + 2.0 * oy * pad,
        );
        to_texture_space(
            &mut src,
            &mut src_size,
            GLYPH_BUFFER_WIDTH as f32,
            GLYPH_BUFFER_HEIGHT as f32,
        );

        draw_translate.x += self.next_x as f32;
        self.next_x += width_px;
        to_clip_space(
            &mut draw_translate,
            &mut draw_scale,
            GLYPH_BUFFER_WIDTH as f32,
            GLYPH_BUFFER_HEIGHT as f32,
        );

        let mut clear = DrawCall {
            pass: Pass::BlitAtlas,
            region: REGION_CLEAR,
            start_index: self.clear_list.index_mark(),
            ..DrawCall::default()
        };
        self.clear_list
            .push_quad(dest, dest + dest_size, Vec2::ONE, Vec2::ONE);
        clear.end_index = self.clear_list.index_mark();
        self.clear_list.calls.push(clear);

        let mut blit = DrawCall {
            pass: Pass::BlitAtlas,
            region: region.index(),
            start_index: self.blit_list.index_mark(),
            ..DrawCall::default()
        };
        self.blit_list.push_quad(
            glyph_dest,
            glyph_dest + glyph_dest_size,
            src,
            src + src_size,
        );
        blit.end_index = self.blit_list.index_mark();
        self.blit_list.calls.push(blit);

        rasterize_glyph(font, glyph, main, contour, opts, draw_scale, draw_translate);
    }

    /// Draw an oversize glyph straight from the scratch buffer, bypassing the
    /// atlas. Whatever the batch held is flushed first; the glyph then owns
    /// the scratch buffer alone until the trailing wipe marker.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn draw_uncached(
        &mut self,
        main: &mut DrawList,
        contour: &mut Vec<Vec2>,
        font: &dyn OutlineFont,
        glyph: GlyphIndex,
        bounds: &GlyphBounds,
        size_scale: f32,
        oversample: f32,
        pos: Vec2,
        scale: Vec2,
        colour: [f32; 4],
        opts: TessellateOptions,
    ) {
        self.flush(main);

        let pad = GLYPH_PADDING as f32;
        let mut draw_scale = Vec2::splat(size_scale * oversample);
        let mut draw_translate = vec2(
            -bounds.x_min * draw_scale.x + pad,
            -bounds.y_min * draw_scale.y + pad,
        );
        to_clip_space(
            &mut draw_translate,
            &mut draw_scale,
            GLYPH_BUFFER_WIDTH as f32,
            GLYPH_BUFFER_HEIGHT as f32,
        );
        rasterize_glyph(font, glyph, main, contour, opts, draw_scale, draw_translate);

        let mut src = Vec2::ZERO;
        let mut src_size = vec2(
            bounds.width() * size_scale * oversample + 2.0 * pad,
            bounds.height() * size_scale * oversample + 2.0 * pad,
        );
        let dest_px = vec2(
            bounds.width() * size_scale + 2.0 * pad,
            bounds.height() * size_scale + 2.0 * pad,
        );
        let bounds_scaled = vec2(
            (bounds.x_min * size_scale - 0.5).trunc(),
            (bounds.y_min * size_scale - 0.5).trunc(),
        );
        let dest = pos + scale * bounds_scaled - scale * pad;
        let dest_size = scale * dest_px;
        to_texture_space(
            &mut src,
            &mut src_size,
            GLYPH_BUFFER_WIDTH as f32,
            GLYPH_BUFFER_HEIGHT as f32,
        );

        let mut call = DrawCall {
            pass: Pass::CompositeUncached,
            colour,
            start_index: main.index_mark(),
            ..DrawCall::default()
        };
        main.push_quad(dest, dest + dest_size, src, src + src_size);
        call.end_index = main.index_mark();
        main.calls.push(call);

        main.calls.push(DrawCall {
            pass: Pass::RasterizeGlyph,
            clear_before_draw: true,
            ..DrawCall::default()
        });
    }
}
