//! Text shaping.
//!
//! Shaping turns UTF-8 text into a [`ShapedRun`]: parallel arrays of
//! codepoints and baseline pen positions, in size-scaled font pixels. A real
//! shaper (HarfBuzz and friends) slots in by producing the same contract;
//! the built-in fallback below handles kerning, linebreaks and a pixel snap
//! for small sizes, and nothing more.
//!
//! The fallback is fine for latin UI text. It does no ligatures, no
//! right-to-left, no complex scripts; internationalized rendering needs a
//! real shaper behind the same output contract.

use glam::{vec2, Vec2};

use crate::font::outline::OutlineFont;

/// A shaped piece of text: one codepoint and one pen position per glyph.
#[derive(Debug, Clone, Default)]
pub struct ShapedRun {
    pub codepoints: Vec<char>,
    pub positions: Vec<Vec2>,
}

impl ShapedRun {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            codepoints: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    pub fn clear(&mut self) {
        self.codepoints.clear();
        self.positions.clear();
    }
}

/// Shape `text` into `output` using simple pen-advance layout.
///
/// Behavior, per codepoint:
/// - kerning against the previous codepoint is applied first;
/// - `\n` carriage-returns the pen and drops it one scaled line advance
///   (`ascent - descent + line_gap`), rounded to a whole pixel;
/// - for small nominal sizes (`|size| <= 12`) the pen x is expanded to the
///   next whole pixel so narrow text stays crisp;
/// - the emitted x position is rounded to the nearest pixel, y is left as
///   the current line's baseline.
pub(crate) fn shape_fallback(
    output: &mut ShapedRun,
    font: &dyn OutlineFont,
    size: f32,
    size_scale: f32,
    text: &str,
) {
    output.clear();
    output.codepoints.reserve(text.len());
    output.positions.reserve(text.len());

    let vmetrics = font.v_metrics();
    let mut pen = 0.0f32;
    let mut vpos = 0.0f32;
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        if let Some(p) = prev {
            pen += font.kern(p, ch) * size_scale;
        }
        if ch == '\n' {
            pen = 0.0;
            vpos -= vmetrics.line_advance() * size_scale;
            vpos = (vpos + 0.5).trunc();
            prev = None;
            continue;
        }
        if size.abs() <= 12.0 {
            // Expand the advance to the next pixel at small sizes.
            pen = pen.ceil();
        }

        output.codepoints.push(ch);
        output.positions.push(vec2((pen + 0.5).trunc(), vpos));

        pen += font.h_metrics(ch).advance * size_scale;
        prev = Some(ch);
    }
}
