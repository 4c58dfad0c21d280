//! `stencil`: a GPU-resident font glyph cache.
//!
//! Turns Unicode text into an ordered list of draw calls over a shared
//! vertex/index buffer, consumable by any modern graphics API. Glyphs are
//! rasterized on the GPU itself (triangle fans + XOR-parity blending),
//! oversampled into a scratch texture, downsampled into a long-lived atlas,
//! and composited from there — so steady-state text costs one textured quad
//! per glyph.
//!
//! What this crate does:
//! - shape text (built-in fallback shaper; real shapers plug in via the same
//!   run contract) and cache shaped runs;
//! - manage a four-region atlas with per-region LRU eviction;
//! - batch newly needed glyphs through the scratch buffer per frame;
//! - emit the per-frame [`render::drawlist::DrawList`].
//!
//! What it deliberately does not do: windowing, GPU execution (see
//! [`render`] for the backend contract), font file parsing beyond the
//! [`font::outline::OutlineFont`] seam, or complex-script shaping.
//!
//! Typical frame:
//!
//! ```no_run
//! use std::sync::Arc;
//! use glam::vec2;
//! use stencil::FontCache;
//!
//! # fn main() -> Result<(), stencil::FontError> {
//! let mut cache = FontCache::new();
//! let data: Arc<[u8]> = std::fs::read("DejaVuSans.ttf")?.into();
//! let font = cache.load(data, 24.0)?;
//!
//! // Each frame:
//! cache.draw_text(font, "hello", vec2(0.1, 0.5), vec2(1.0 / 1920.0, 1.0 / 1080.0))?;
//! cache.optimise_drawlist();
//! // ... hand cache.drawlist() to the backend ...
//! cache.flush_drawlist();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod font;
pub mod render;

pub use cache::FontCache;
pub use font::db::{FontDatabase, FontQuery};
pub use font::outline::{GlyphBounds, HMetrics, OutlineEdge, OutlineFont, VMetrics};
pub use font::tessellate::TessellateOptions;
pub use font::text::ShapedRun;
pub use font::{FontError, FontId};
pub use render::drawlist::{DrawCall, DrawList, Pass, Vertex, REGION_CLEAR};
