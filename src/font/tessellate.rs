//! Glyph tessellation.
//!
//! Converts a glyph outline into raw triangle-fan geometry the GPU can crunch
//! directly, following the "draw everything from one outside point and let
//! XOR blending sort out coverage" approach:
//!
//! 1. Walk the outline edges, flattening each Bezier into a fixed number of
//!    samples and accumulating points into the current contour.
//! 2. When a contour closes (explicitly, at the next move, or at outline
//!    end), emit a triangle fan from a point strictly outside the glyph's
//!    bounding box to every consecutive point pair.
//! 3. The backend draws the fan with an XOR-parity blend function; triangles
//!    covering a pixel an even number of times cancel out, leaving exact
//!    coverage for convex, concave and self-overlapping contours.
//!
//! No fragment-shader curve evaluation is involved; curve fidelity comes from
//! the flattening step and the oversampled scratch target the fans are
//! rendered into.

use glam::{vec2, Vec2};

use crate::font::outline::{GlyphIndex, OutlineEdge, OutlineFont};
use crate::render::drawlist::{DrawCall, DrawList, Pass};

/// Tessellation options for glyph outlines.
///
/// `curve_quality` is the number of line segments each Bezier flattens into;
/// higher values give smoother curves and more triangles.
#[derive(Debug, Copy, Clone)]
pub struct TessellateOptions {
    pub curve_quality: u32,
}

impl Default for TessellateOptions {
    fn default() -> Self {
        Self { curve_quality: 6 }
    }
}

/// Evaluate a quadratic Bezier at `t`.
#[inline]
pub fn eval_quad_bezier(p0: Vec2, p1: Vec2, p2: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
}

/// Evaluate a cubic Bezier at `t`.
#[inline]
pub fn eval_cubic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

/// Rasterize one glyph as pass-1 geometry appended to `list`.
///
/// Every path vertex is transformed by `scale`/`translate` at emit time; this
/// is how a glyph lands in its assigned scratch-buffer column. `contour` is a
/// caller-owned scratch buffer reused across glyphs to avoid per-glyph
/// allocation.
///
/// Returns `false` when the font has no usable shape for the glyph. Empty
/// glyphs succeed without emitting geometry.
pub(crate) fn rasterize_glyph(
    font: &dyn OutlineFont,
    glyph: GlyphIndex,
    list: &mut DrawList,
    contour: &mut Vec<Vec2>,
    opts: TessellateOptions,
    scale: Vec2,
    translate: Vec2,
) -> bool {
    if font.is_glyph_empty(glyph) {
        return true;
    }
    let edges = font.glyph_outline(glyph);
    if edges.is_empty() {
        return false;
    }
    let Some(bounds) = font.glyph_bounds(glyph) else {
        return false;
    };

    // Any point strictly outside the bounding box works as the fan apex; it
    // is transformed alongside the path so the offsets stay in font units.
    let outside = vec2(bounds.x_min - 21.0, bounds.y_min - 33.0);

    let mut draw = DrawCall {
        pass: Pass::RasterizeGlyph,
        start_index: list.index_mark(),
        ..DrawCall::default()
    };

    let step = 1.0 / opts.curve_quality as f32;
    contour.clear();
    for edge in &edges {
        match *edge {
            OutlineEdge::MoveTo(p) => {
                if !contour.is_empty() {
                    list.push_filled_path(outside, contour, scale, translate);
                    contour.clear();
                }
                contour.push(p);
            }
            OutlineEdge::LineTo(p) => contour.push(p),
            OutlineEdge::QuadTo { ctrl, to } => {
                let Some(&p0) = contour.last() else { continue };
                for i in 1..=opts.curve_quality {
                    contour.push(eval_quad_bezier(p0, ctrl, to, i as f32 * step));
                }
            }
            OutlineEdge::CubicTo { ctrl0, ctrl1, to } => {
                let Some(&p0) = contour.last() else { continue };
                for i in 1..=opts.curve_quality {
                    contour.push(eval_cubic_bezier(p0, ctrl0, ctrl1, to, i as f32 * step));
                }
            }
            OutlineEdge::Close => {
                if !contour.is_empty() {
                    list.push_filled_path(outside, contour, scale, translate);
                    contour.clear();
                }
            }
        }
    }
    if !contour.is_empty() {
        list.push_filled_path(outside, contour, scale, translate);
        contour.clear();
    }

    draw.end_index = list.index_mark();
    if draw.end_index > draw.start_index {
        list.calls.push(draw);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::outline::{GlyphBounds, HMetrics, VMetrics};

    /// Minimal outline backend serving one fixed edge list.
    struct EdgeFont {
        edges: Vec<OutlineEdge>,
        bounds: GlyphBounds,
    }

    impl OutlineFont for EdgeFont {
        fn glyph_index(&self, _codepoint: char) -> Option<GlyphIndex> {
            Some(1)
        }
        fn is_glyph_empty(&self, _glyph: GlyphIndex) -> bool {
            self.edges.is_empty()
        }
        fn glyph_bounds(&self, _glyph: GlyphIndex) -> Option<GlyphBounds> {
            Some(self.bounds)
        }
        fn glyph_outline(&self, _glyph: GlyphIndex) -> Vec<OutlineEdge> {
            self.edges.clone()
        }
        fn v_metrics(&self) -> VMetrics {
            VMetrics::default()
        }
        fn h_metrics(&self, _codepoint: char) -> HMetrics {
            HMetrics::default()
        }
        fn kern(&self, _prev: char, _next: char) -> f32 {
            0.0
        }
        fn scale_for_pixel_height(&self, _px: f32) -> f32 {
            1.0
        }
        fn scale_for_em(&self, _px: f32) -> f32 {
            1.0
        }
    }

    fn square_edges() -> Vec<OutlineEdge> {
        vec![
            OutlineEdge::MoveTo(vec2(0.0, 0.0)),
            OutlineEdge::LineTo(vec2(100.0, 0.0)),
            OutlineEdge::LineTo(vec2(100.0, 100.0)),
            OutlineEdge::LineTo(vec2(0.0, 100.0)),
        ]
    }

    #[test]
    fn quad_bezier_samples() {
        let p0 = vec2(0.0, 0.0);
        let p1 = vec2(10.0, 10.0);
        let p2 = vec2(20.0, 0.0);
        assert_eq!(eval_quad_bezier(p0, p1, p2, 0.25), vec2(5.0, 3.75));
        assert_eq!(eval_quad_bezier(p0, p1, p2, 0.5), vec2(10.0, 5.0));
        assert_eq!(eval_quad_bezier(p0, p1, p2, 0.75), vec2(15.0, 3.75));
        assert_eq!(eval_quad_bezier(p0, p1, p2, 1.0), vec2(20.0, 0.0));
    }

    #[test]
    fn cubic_bezier_endpoints() {
        let p0 = vec2(0.0, 0.0);
        let p3 = vec2(30.0, 0.0);
        let mid = eval_cubic_bezier(p0, vec2(10.0, 10.0), vec2(20.0, 10.0), p3, 0.5);
        assert_eq!(eval_cubic_bezier(p0, vec2(10.0, 10.0), vec2(20.0, 10.0), p3, 1.0), p3);
        assert_eq!(mid, vec2(15.0, 7.5));
    }

    #[test]
    fn square_emits_single_fan() {
        let font = EdgeFont {
            edges: square_edges(),
            bounds: GlyphBounds {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 100.0,
                y_max: 100.0,
            },
        };
        let mut list = DrawList::default();
        let mut contour = Vec::new();
        let ok = rasterize_glyph(
            &font,
            1,
            &mut list,
            &mut contour,
            TessellateOptions::default(),
            Vec2::ONE,
            Vec2::ZERO,
        );
        assert!(ok);
        // 4 path points + apex; 3 triangles.
        assert_eq!(list.vertices.len(), 5);
        assert_eq!(list.indices.len(), 9);
        assert_eq!(list.calls.len(), 1);
        let call = list.calls[0];
        assert_eq!(call.pass, Pass::RasterizeGlyph);
        assert_eq!(call.start_index, 0);
        assert_eq!(call.end_index, 9);
        // Apex sits outside the bbox.
        assert_eq!(list.vertices[4].pos, [-21.0, -33.0]);
    }

    #[test]
    fn curve_flattening_respects_quality() {
        let font = EdgeFont {
            edges: vec![
                OutlineEdge::MoveTo(vec2(0.0, 0.0)),
                OutlineEdge::QuadTo {
                    ctrl: vec2(10.0, 10.0),
                    to: vec2(20.0, 0.0),
                },
            ],
            bounds: GlyphBounds {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 20.0,
                y_max: 5.0,
            },
        };
        let mut list = DrawList::default();
        let mut contour = Vec::new();
        rasterize_glyph(
            &font,
            1,
            &mut list,
            &mut contour,
            TessellateOptions { curve_quality: 4 },
            Vec2::ONE,
            Vec2::ZERO,
        );
        // Move point + 4 samples + apex.
        assert_eq!(list.vertices.len(), 6);
        assert_eq!(list.vertices[1].pos, [5.0, 3.75]);
        assert_eq!(list.vertices[2].pos, [10.0, 5.0]);
        assert_eq!(list.vertices[3].pos, [15.0, 3.75]);
        assert_eq!(list.vertices[4].pos, [20.0, 0.0]);
    }

    #[test]
    fn contours_flush_on_move_and_close() {
        let mut edges = square_edges();
        edges.push(OutlineEdge::Close);
        edges.push(OutlineEdge::MoveTo(vec2(200.0, 200.0)));
        edges.push(OutlineEdge::LineTo(vec2(300.0, 200.0)));
        edges.push(OutlineEdge::LineTo(vec2(300.0, 300.0)));
        let font = EdgeFont {
            edges,
            bounds: GlyphBounds {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 300.0,
                y_max: 300.0,
            },
        };
        let mut list = DrawList::default();
        let mut contour = Vec::new();
        rasterize_glyph(
            &font,
            1,
            &mut list,
            &mut contour,
            TessellateOptions::default(),
            Vec2::ONE,
            Vec2::ZERO,
        );
        // Two fans: (4 + apex) + (3 + apex) vertices, one shared draw call.
        assert_eq!(list.vertices.len(), 9);
        assert_eq!(list.calls.len(), 1);
        // The close must not double-emit at the following move.
        assert_eq!(list.indices.len(), 9 + 6);
    }

    #[test]
    fn empty_glyph_emits_nothing() {
        let font = EdgeFont {
            edges: Vec::new(),
            bounds: GlyphBounds::default(),
        };
        let mut list = DrawList::default();
        let mut contour = Vec::new();
        let ok = rasterize_glyph(
            &font,
            1,
            &mut list,
            &mut contour,
            TessellateOptions::default(),
            Vec2::ONE,
            Vec2::ZERO,
        );
        assert!(ok);
        assert!(list.calls.is_empty());
        assert!(list.vertices.is_empty());
    }

    #[test]
    fn transform_applies_to_apex_and_path() {
        let font = EdgeFont {
            edges: square_edges(),
            bounds: GlyphBounds {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 100.0,
                y_max: 100.0,
            },
        };
        let mut list = DrawList::default();
        let mut contour = Vec::new();
        rasterize_glyph(
            &font,
            1,
            &mut list,
            &mut contour,
            TessellateOptions::default(),
            vec2(2.0, 2.0),
            vec2(50.0, 60.0),
        );
        assert_eq!(list.vertices[0].pos, [50.0, 60.0]);
        assert_eq!(list.vertices[1].pos, [250.0, 60.0]);
        assert_eq!(list.vertices[4].pos, [50.0 - 42.0, 60.0 - 66.0]);
    }
}
