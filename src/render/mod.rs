//! Render output types and the backend contract.
//!
//! The cache emits a fully self-describing [`drawlist::DrawList`]; the GPU
//! backend is a pure interpreter of it. This module documents everything a
//! backend needs to implement.
//!
//! ## Render targets
//!
//! Two single-channel (R8) textures, both owned by the backend:
//! - the **scratch glyph buffer**, `2048 x 512`
//!   ([`crate::cache::atlas::GLYPH_BUFFER_WIDTH`] x
//!   [`crate::cache::atlas::GLYPH_BUFFER_HEIGHT`]), nearest filtering;
//! - the **atlas**, `4096 x 2048` ([`crate::cache::atlas::ATLAS_WIDTH`] x
//!   [`crate::cache::atlas::ATLAS_HEIGHT`]), nearest filtering.
//!
//! ## Shaders
//!
//! Three pipelines over the shared `{pos: vec2, uv: vec2}` vertex layout:
//! - **glyph**: passthrough position, constant white output. Blended with an
//!   XOR-parity function (`ONE_MINUS_DST_COLOR, ONE_MINUS_SRC_COLOR` in GL
//!   terms) so overlapping fan triangles cancel.
//! - **blit**: samples the scratch buffer with a 16-tap box filter
//!   (downsampling the 4x4 oversampled glyph) and writes coverage; when the
//!   draw call's region tag is [`drawlist::REGION_CLEAR`] it writes an opaque
//!   fill instead, ignoring the source. Alpha blended.
//! - **composite**: samples coverage (atlas for pass 3, scratch buffer with a
//!   4-tap filter for pass 4) and multiplies with the draw call's colour.
//!   Alpha blended.
//!
//! ## Draw loop
//!
//! For each [`drawlist::DrawCall`] in order:
//! 1. select pipeline and target from [`drawlist::Pass`]:
//!    pass 1 -> glyph shader into the scratch buffer, pass 2 -> blit shader
//!    into the atlas, passes 3/4 -> composite shader into the caller's
//!    target;
//! 2. if `clear_before_draw`, clear the bound target to transparent black —
//!    **including when the index range is empty**; an empty pass-1 clearing
//!    call is the cache's "wipe the scratch buffer" marker and skipping it
//!    corrupts the next batch;
//! 3. if the range is non-empty, draw indexed triangles over
//!    `[start_index, end_index)`.
//!
//! In-list order is the only synchronization: a pass-3 quad may reference an
//! atlas slot written by a pass-1/pass-2 pair earlier in the same list, so
//! calls must execute in sequence.

pub mod drawlist;
