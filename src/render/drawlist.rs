//! Draw-list containers and emitters.
//!
//! The cache's only output is a [`DrawList`]: shared vertex/index buffers plus
//! an ordered sequence of [`DrawCall`]s, each tagged with the logical render
//! pass it belongs to. The backend interprets the list; this crate never
//! touches a texture or a device.
//!
//! Coordinate conventions:
//! - Pass 1 (glyph rasterization) and pass 2 (atlas blit) destinations are in
//!   clip space (`[-1, 1]`), mapped from texture pixels via [`to_clip_space`].
//! - UVs are in texture space (`[0, 1]`), mapped via [`to_texture_space`].
//! - Pass 3/4 (composite) destinations are in whatever normalized space the
//!   caller's position/scale establish.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Region tag carried by pass-2 clear quads. The blit shader fills opaque
/// instead of downsampling when it sees this tag.
pub const REGION_CLEAR: u32 = u32::MAX;

/// A textured 2D vertex, laid out for direct GPU upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

/// Logical render pass a draw call belongs to.
///
/// The numeric values are part of the backend contract; see [`crate::render`]
/// for the full execution recipe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Pass {
    /// XOR-fill triangle fans into the scratch glyph buffer.
    RasterizeGlyph = 1,
    /// Downsample-blit (or clear) scratch buffer content into the atlas.
    BlitAtlas = 2,
    /// Composite a cached glyph quad from the atlas onto the target.
    CompositeCached = 3,
    /// Composite an oversize glyph quad straight from the scratch buffer.
    CompositeUncached = 4,
}

/// One draw call over the shared index buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub pass: Pass,
    /// Index range `[start_index, end_index)`; triangles.
    pub start_index: u32,
    pub end_index: u32,
    /// Backends must honor this even when the index range is empty; an empty
    /// clearing call is how the scratch buffer gets wiped between batches.
    pub clear_before_draw: bool,
    /// Pass-2 region tag: the target region index, or [`REGION_CLEAR`].
    pub region: u32,
    /// Composite colour for passes 3/4.
    pub colour: [f32; 4],
}

impl Default for DrawCall {
    fn default() -> Self {
        Self {
            pass: Pass::RasterizeGlyph,
            start_index: 0,
            end_index: 0,
            clear_before_draw: false,
            region: 0,
            colour: [1.0; 4],
        }
    }
}

/// Shared vertex/index/draw-call buffers.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub calls: Vec<DrawCall>,
}

impl DrawList {
    /// An empty list with preallocated buffers.
    pub fn with_capacity(vertices: usize, indices: usize, calls: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
            calls: Vec::with_capacity(calls),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Current index-buffer length; draw calls bracket their range with this.
    #[inline]
    pub fn index_mark(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.calls.clear();
    }

    /// Emit an axis-aligned textured quad (4 vertices, 6 indices).
    ///
    /// The caller brackets this with a [`DrawCall`]; no call is appended here.
    pub fn push_quad(&mut self, min: Vec2, max: Vec2, uv_min: Vec2, uv_max: Vec2) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[
            Vertex {
                pos: [min.x, min.y],
                uv: [uv_min.x, uv_min.y],
            },
            Vertex {
                pos: [min.x, max.y],
                uv: [uv_min.x, uv_max.y],
            },
            Vertex {
                pos: [max.x, min.y],
                uv: [uv_max.x, uv_min.y],
            },
            Vertex {
                pos: [max.x, max.y],
                uv: [uv_max.x, uv_max.y],
            },
        ]);
        const QUAD: [u32; 6] = [0, 1, 2, 2, 1, 3];
        self.indices.extend(QUAD.iter().map(|i| base + i));
    }

    /// Emit one closed contour as a triangle fan around `outside`, a point
    /// strictly outside the glyph's bounding box.
    ///
    /// Fan triangles overlap; rendered with XOR-parity blending the overlaps
    /// cancel and exact coverage remains, for convex and concave contours
    /// alike. `scale`/`translate` place the contour into its target space.
    ///
    /// The caller brackets this with a [`DrawCall`]; no call is appended here.
    pub fn push_filled_path(&mut self, outside: Vec2, path: &[Vec2], scale: Vec2, translate: Vec2) {
        if path.len() < 2 {
            return;
        }
        let base = self.vertices.len() as u32;
        for p in path {
            let v = *p * scale + translate;
            self.vertices.push(Vertex {
                pos: [v.x, v.y],
                uv: [0.0, 0.0],
            });
        }
        let apex = self.vertices.len() as u32;
        let o = outside * scale + translate;
        self.vertices.push(Vertex {
            pos: [o.x, o.y],
            uv: [0.0, 0.0],
        });
        for i in 1..path.len() as u32 {
            self.indices.extend_from_slice(&[apex, base + i - 1, base + i]);
        }
    }

    /// Append `src` into `self`, rebasing `src`'s indices by the current
    /// vertex count and its draw-call ranges by the current index count.
    pub fn merge(&mut self, src: &DrawList) {
        let vertex_base = self.vertices.len() as u32;
        let index_base = self.indices.len() as u32;

        self.vertices.extend_from_slice(&src.vertices);
        self.indices.extend(src.indices.iter().map(|i| i + vertex_base));
        self.calls.extend(src.calls.iter().map(|call| DrawCall {
            start_index: call.start_index + index_base,
            end_index: call.end_index + index_base,
            ..*call
        }));
    }

    /// Merge adjacent draw calls with identical state and contiguous index
    /// ranges. A call that clears its target never merges into its
    /// predecessor. Significantly reduces draw-call overhead; run it once per
    /// frame before handing the list to the backend.
    pub fn optimise(&mut self) {
        if self.calls.len() < 2 {
            return;
        }
        let mut write = 0;
        for i in 1..self.calls.len() {
            let cur = self.calls[i];
            let prev = self.calls[write];
            let merge = prev.pass == cur.pass
                && prev.end_index == cur.start_index
                && prev.region == cur.region
                && !cur.clear_before_draw
                && prev.colour == cur.colour;
            if merge {
                self.calls[write].end_index = cur.end_index;
            } else {
                write += 1;
                self.calls[write] = cur;
            }
        }
        self.calls.truncate(write + 1);
    }
}

/// Map a pixel-space rect (origin + extent) into clip space `[-1, 1]` for a
/// `width x height` render target.
#[inline]
pub(crate) fn to_clip_space(pos: &mut Vec2, extent: &mut Vec2, width: f32, height: f32) {
    *extent = *extent / Vec2::new(width, height) * 2.0;
    *pos = *pos * Vec2::new(2.0 / width, 2.0 / height) - 1.0;
}

/// Map a pixel-space rect into `[0, 1]` texture space.
#[inline]
pub(crate) fn to_texture_space(pos: &mut Vec2, extent: &mut Vec2, width: f32, height: f32) {
    let size = Vec2::new(width, height);
    *pos /= size;
    *extent /= size;
}
