//! Glyph outline access.
//!
//! The cache binds to font files through the [`OutlineFont`] trait rather
//! than a concrete parser, so shapers and the rasterizer can run against any
//! backend (including synthetic fonts in tests). [`TtfFont`] is the built-in
//! implementation over `ttf-parser`.
//!
//! Coordinate conventions:
//! - All outline points and metrics are in **font units** (Y+ up). Callers
//!   scale with [`OutlineFont::scale_for_pixel_height`] /
//!   [`OutlineFont::scale_for_em`].
//! - A glyph may contain multiple contours; [`OutlineEdge::MoveTo`] starts a
//!   new one and [`OutlineEdge::Close`] ends the current one. Fonts that omit
//!   explicit closes still terminate contours at the next move.

use std::sync::Arc;

use glam::{vec2, Vec2};

use crate::font::FontError;

/// Index of a glyph within a font. `ttf-parser` and friends use `u16`.
pub type GlyphIndex = u16;

/// One segment of a glyph outline, endpoints in font units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum OutlineEdge {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { ctrl: Vec2, to: Vec2 },
    CubicTo { ctrl0: Vec2, ctrl1: Vec2, to: Vec2 },
    Close,
}

/// Glyph bounding box in font units.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GlyphBounds {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl GlyphBounds {
    #[inline]
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        vec2(self.x_min, self.y_min)
    }
}

/// Vertical font metrics in font units.
#[derive(Debug, Copy, Clone, Default)]
pub struct VMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl VMetrics {
    /// Baseline-to-baseline distance.
    #[inline]
    pub fn line_advance(&self) -> f32 {
        self.ascent - self.descent + self.line_gap
    }
}

/// Horizontal metrics for one glyph, in font units.
#[derive(Debug, Copy, Clone, Default)]
pub struct HMetrics {
    pub advance: f32,
    pub left_side_bearing: f32,
}

/// The outline-provider operations the cache needs from a font backend.
///
/// Implementations must be cheap to call repeatedly; the cache queries
/// metrics and bounds on every frame a glyph is drawn.
pub trait OutlineFont {
    /// Glyph index for a codepoint, or `None` when the font has no mapping.
    fn glyph_index(&self, codepoint: char) -> Option<GlyphIndex>;

    /// Whether the glyph has no outline (e.g. space).
    fn is_glyph_empty(&self, glyph: GlyphIndex) -> bool;

    /// Bounding box of the glyph outline, if it has one.
    fn glyph_bounds(&self, glyph: GlyphIndex) -> Option<GlyphBounds>;

    /// The glyph outline as a flat edge sequence; empty for empty glyphs.
    fn glyph_outline(&self, glyph: GlyphIndex) -> Vec<OutlineEdge>;

    fn v_metrics(&self) -> VMetrics;

    fn h_metrics(&self, codepoint: char) -> HMetrics;

    /// Horizontal kerning between two codepoints, in font units.
    fn kern(&self, prev: char, next: char) -> f32;

    /// Scale factor mapping font units so `ascent - descent` spans `px`.
    fn scale_for_pixel_height(&self, px: f32) -> f32;

    /// Scale factor mapping one em to `px` pixels.
    fn scale_for_em(&self, px: f32) -> f32;
}

/// `ttf-parser`-backed [`OutlineFont`].
///
/// Holds the raw font bytes behind an `Arc` and re-parses the face per call;
/// parsing is table-directory validation only and is cheap. Sharing one byte
/// buffer between several `TtfFont`s at different sizes is fine.
pub struct TtfFont {
    data: Arc<[u8]>,
    index: u32,
}

impl TtfFont {
    /// Wrap a font file (ttf/otf) held in memory. Fails if the bytes do not
    /// parse as a font face.
    pub fn from_bytes(data: Arc<[u8]>, index: u32) -> Result<Self, FontError> {
        ttf_parser::Face::parse(&data, index).map_err(|_| FontError::ParseFailed)?;
        Ok(Self { data, index })
    }

    #[inline]
    fn face(&self) -> ttf_parser::Face<'_> {
        // Validated in `from_bytes`; parsing the same bytes cannot fail.
        ttf_parser::Face::parse(&self.data, self.index).expect("font bytes validated at load")
    }
}

impl OutlineFont for TtfFont {
    fn glyph_index(&self, codepoint: char) -> Option<GlyphIndex> {
        self.face().glyph_index(codepoint).map(|id| id.0)
    }

    fn is_glyph_empty(&self, glyph: GlyphIndex) -> bool {
        self.face()
            .glyph_bounding_box(ttf_parser::GlyphId(glyph))
            .is_none()
    }

    fn glyph_bounds(&self, glyph: GlyphIndex) -> Option<GlyphBounds> {
        let rect = self.face().glyph_bounding_box(ttf_parser::GlyphId(glyph))?;
        Some(GlyphBounds {
            x_min: rect.x_min as f32,
            y_min: rect.y_min as f32,
            x_max: rect.x_max as f32,
            y_max: rect.y_max as f32,
        })
    }

    fn glyph_outline(&self, glyph: GlyphIndex) -> Vec<OutlineEdge> {
        let mut builder = EdgeCollector::default();
        if self
            .face()
            .outline_glyph(ttf_parser::GlyphId(glyph), &mut builder)
            .is_none()
        {
            return Vec::new();
        }
        builder.edges
    }

    fn v_metrics(&self) -> VMetrics {
        let face = self.face();
        VMetrics {
            ascent: face.ascender() as f32,
            descent: face.descender() as f32,
            line_gap: face.line_gap() as f32,
        }
    }

    fn h_metrics(&self, codepoint: char) -> HMetrics {
        let face = self.face();
        let Some(gid) = face.glyph_index(codepoint) else {
            return HMetrics::default();
        };
        HMetrics {
            advance: face.glyph_hor_advance(gid).unwrap_or(0) as f32,
            left_side_bearing: face.glyph_hor_side_bearing(gid).unwrap_or(0) as f32,
        }
    }

    fn kern(&self, prev: char, next: char) -> f32 {
        let face = self.face();
        let (Some(left), Some(right)) = (face.glyph_index(prev), face.glyph_index(next)) else {
            return 0.0;
        };
        let Some(kern) = face.tables().kern else {
            return 0.0;
        };
        for subtable in kern.subtables {
            if !subtable.horizontal || subtable.variable {
                continue;
            }
            if let Some(value) = subtable.glyphs_kerning(left, right) {
                return value as f32;
            }
        }
        0.0
    }

    fn scale_for_pixel_height(&self, px: f32) -> f32 {
        let face = self.face();
        let height = (face.ascender() - face.descender()) as f32;
        if height > 0.0 {
            px / height
        } else {
            0.0
        }
    }

    fn scale_for_em(&self, px: f32) -> f32 {
        let upm = self.face().units_per_em() as f32;
        if upm > 0.0 {
            px / upm
        } else {
            0.0
        }
    }
}

/// Converts `ttf-parser` outline callbacks into an [`OutlineEdge`] sequence.
#[derive(Default)]
struct EdgeCollector {
    edges: Vec<OutlineEdge>,
}


impl ttf_parser::OutlineBuilder for EdgeCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.edges.push(OutlineEdge::MoveTo(vec2(x, y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.edges.push(OutlineEdge::LineTo(vec2(x, y)));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.edges.push(OutlineEdge::QuadTo {
            ctrl: vec2(x1, y1),
            to: vec2(x, y),
        });
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.edges.push(OutlineEdge::CubicTo {
            ctrl0: vec2(x1, y1),
            ctrl1: vec2(x2, y2),
            to: vec2(x, y),
        });
    }

    fn close(&mut self) {
        self.edges.push(OutlineEdge::Close);
    }
}
