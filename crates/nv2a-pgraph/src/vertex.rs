//! Vertex records and buffers.
//!
//! A [`VertexBuffer`] holds a fixed number of [`Vertex`] records in two
//! parallel storages: the canonical one keeps texture coordinates normalized
//! to 0..1, and an optional linearized copy keeps them in pixel units for
//! sampling pitched-linear textures. Which storage feeds the hardware is
//! decided at bind time from texture unit 0's addressing mode.
//!
//! The hardware caches vertex array contents; a buffer starts (and returns
//! to, on any mutable access) the cache-invalid state, which forces exactly
//! one cache-break command before its next use.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use nv2a_regs::nv097;

bitflags! {
    /// The 16 hardware vertex attribute slots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexAttribute: u32 {
        const POSITION = 1 << nv097::VERTEX_ATTR_POSITION;
        const WEIGHT = 1 << nv097::VERTEX_ATTR_WEIGHT;
        const NORMAL = 1 << nv097::VERTEX_ATTR_NORMAL;
        const DIFFUSE = 1 << nv097::VERTEX_ATTR_DIFFUSE;
        const SPECULAR = 1 << nv097::VERTEX_ATTR_SPECULAR;
        const FOG_COORD = 1 << nv097::VERTEX_ATTR_FOG_COORD;
        const POINT_SIZE = 1 << nv097::VERTEX_ATTR_POINT_SIZE;
        const BACK_DIFFUSE = 1 << nv097::VERTEX_ATTR_BACK_DIFFUSE;
        const BACK_SPECULAR = 1 << nv097::VERTEX_ATTR_BACK_SPECULAR;
        const TEXCOORD0 = 1 << nv097::VERTEX_ATTR_TEXTURE0;
        const TEXCOORD1 = 1 << nv097::VERTEX_ATTR_TEXTURE1;
        const TEXCOORD2 = 1 << nv097::VERTEX_ATTR_TEXTURE2;
        const TEXCOORD3 = 1 << nv097::VERTEX_ATTR_TEXTURE3;
        const V13 = 1 << nv097::VERTEX_ATTR_13;
        const V14 = 1 << nv097::VERTEX_ATTR_14;
        const V15 = 1 << nv097::VERTEX_ATTR_15;
    }
}

impl VertexAttribute {
    /// The attribute set most draws use.
    pub const DEFAULT: Self = Self::POSITION.union(Self::DIFFUSE).union(Self::TEXCOORD0);

    /// Slot index when the set names exactly one attribute.
    pub fn slot(self) -> Option<u32> {
        if self.bits().count_ones() == 1 {
            Some(self.bits().trailing_zeros())
        } else {
            None
        }
    }
}

/// One vertex record. Every field is a float4 regardless of how many
/// components the bound layout exposes, so per-field component counts can
/// vary without re-packing the buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 4],
    pub weight: [f32; 4],
    pub normal: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub fog_coord: [f32; 4],
    pub point_size: [f32; 4],
    pub back_diffuse: [f32; 4],
    pub back_specular: [f32; 4],
    pub texcoord0: [f32; 4],
    pub texcoord1: [f32; 4],
    pub texcoord2: [f32; 4],
    pub texcoord3: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn set_position(&mut self, p: Vec3) {
        self.pos = [p.x, p.y, p.z, 1.0];
    }

    pub fn set_position4(&mut self, p: Vec4) {
        self.pos = p.to_array();
    }

    pub fn set_normal(&mut self, n: Vec3) {
        self.normal = [n.x, n.y, n.z, 0.0];
    }

    pub fn set_diffuse(&mut self, rgba: Vec4) {
        self.diffuse = rgba.to_array();
    }

    pub fn set_specular(&mut self, rgba: Vec4) {
        self.specular = rgba.to_array();
    }

    pub fn set_texcoord0(&mut self, u: f32, v: f32) {
        self.texcoord0 = [u, v, 0.0, 0.0];
    }

    pub fn set_texcoord1(&mut self, u: f32, v: f32) {
        self.texcoord1 = [u, v, 0.0, 0.0];
    }

    pub fn set_texcoord2(&mut self, u: f32, v: f32) {
        self.texcoord2 = [u, v, 0.0, 0.0];
    }

    pub fn set_texcoord3(&mut self, u: f32, v: f32) {
        self.texcoord3 = [u, v, 0.0, 0.0];
    }

    pub fn set_fog_coord(&mut self, f: f32) {
        self.fog_coord[0] = f;
    }

    pub fn set_point_size(&mut self, s: f32) {
        self.point_size[0] = s;
    }
}

/// Per-field component counts for a buffer's bound layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentCounts {
    pub position: u32,
    pub weight: u32,
    pub normal: u32,
    pub diffuse: u32,
    pub specular: u32,
    pub fog_coord: u32,
    pub point_size: u32,
    pub back_diffuse: u32,
    pub back_specular: u32,
    pub texcoord: [u32; 4],
}

impl Default for ComponentCounts {
    fn default() -> Self {
        Self {
            position: 3,
            weight: 1,
            normal: 3,
            diffuse: 4,
            specular: 4,
            fog_coord: 1,
            point_size: 1,
            back_diffuse: 4,
            back_specular: 4,
            texcoord: [2; 4],
        }
    }
}

/// Fixed-size vertex storage shared between the caller and the bound state.
pub struct VertexBuffer {
    vertices: Vec<Vertex>,
    /// Pixel-unit texcoord copy, present once `linearize` has run.
    linear: Option<Vec<Vertex>>,
    counts: ComponentCounts,
    vram_base: u32,
    cache_valid: bool,
}

impl VertexBuffer {
    /// Creates a zero-initialized buffer of `len` vertices whose storage
    /// starts at `vram_base` in GPU-visible memory.
    pub fn new(len: u32, vram_base: u32) -> Self {
        Self {
            vertices: vec![Vertex::default(); len as usize],
            linear: None,
            counts: ComponentCounts::default(),
            vram_base,
            cache_valid: false,
        }
    }

    pub fn len(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn counts(&self) -> &ComponentCounts {
        &self.counts
    }

    /// Marks whether the position field carries an explicit W component.
    pub fn set_position_includes_w(&mut self, includes_w: bool) {
        self.counts.position = if includes_w { 4 } else { 3 };
    }

    pub fn set_weight_count(&mut self, count: u32) {
        self.counts.weight = count;
    }

    /// Sets the component count (2 or 4) the given texcoord set feeds to the
    /// hardware. Validated at draw time.
    pub fn set_texcoord_count(&mut self, set: usize, count: u32) {
        self.counts.texcoord[set] = count;
    }

    /// Read-only view of the canonical (normalized-texcoord) vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Mutable view of the canonical vertices. Any mutable access may move
    /// contents beneath the hardware cache, so the buffer drops back to the
    /// cache-invalid state and discards a stale linearized copy.
    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        self.cache_valid = false;
        self.linear = None;
        &mut self.vertices
    }

    pub fn is_cache_valid(&self) -> bool {
        self.cache_valid
    }

    pub fn set_cache_valid(&mut self) {
        self.cache_valid = true;
    }

    pub fn invalidate_cache(&mut self) {
        self.cache_valid = false;
    }

    /// Builds the pixel-unit texcoord storage by scaling the canonical
    /// texcoords by the sampled texture's dimensions.
    pub fn linearize(&mut self, texture_width: f32, texture_height: f32) {
        let mut linear = self.vertices.clone();
        for v in &mut linear {
            for tc in [
                &mut v.texcoord0,
                &mut v.texcoord1,
                &mut v.texcoord2,
                &mut v.texcoord3,
            ] {
                tc[0] *= texture_width;
                tc[1] *= texture_height;
            }
        }
        self.linear = Some(linear);
        self.cache_valid = false;
    }

    /// The storage the hardware fetches for the given addressing mode:
    /// linearized texcoords for pitched-linear sampling, falling back to the
    /// canonical storage when no linearized copy exists.
    pub fn storage(&self, linear: bool) -> &[Vertex] {
        if linear {
            self.linear.as_deref().unwrap_or(&self.vertices)
        } else {
            &self.vertices
        }
    }

    /// GPU-visible base address of the selected storage.
    pub(crate) fn storage_base(&self, linear: bool) -> u32 {
        let block = self.vertices.len() as u32 * Vertex::STRIDE;
        if linear && self.linear.is_some() {
            self.vram_base + block
        } else {
            self.vram_base
        }
    }

    /// Bytes occupied by both storages; used by the allocator.
    pub fn footprint(len: u32) -> u32 {
        len * Vertex::STRIDE * 2
    }

    /// Writes one triangle, computing a face normal from the winding.
    pub fn define_triangle(&mut self, start_index: usize, corners: [Vec3; 3]) {
        let normal = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
        for (i, corner) in corners.into_iter().enumerate() {
            let v = &mut self.vertices_mut()[start_index + i];
            v.set_position(corner);
            v.set_normal(normal);
        }
    }

    /// Writes one triangle with the winding reversed.
    pub fn define_triangle_ccw(&mut self, start_index: usize, corners: [Vec3; 3]) {
        self.define_triangle(start_index, [corners[0], corners[2], corners[1]]);
    }

    /// Writes an axis-aligned quad as two triangles (6 vertices) at constant
    /// depth, with texcoords spanning 0..1.
    pub fn define_quad(
        &mut self,
        start_index: usize,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        z: f32,
    ) {
        let ul = Vec3::new(left, top, z);
        let ll = Vec3::new(left, bottom, z);
        let lr = Vec3::new(right, bottom, z);
        let ur = Vec3::new(right, top, z);
        let uv = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0), (1.0, 1.0), (1.0, 0.0)];
        let positions = [ul, ll, lr, ul, lr, ur];

        let vertices = self.vertices_mut();
        for (i, (p, (u, v))) in positions.into_iter().zip(uv).enumerate() {
            let vert = &mut vertices[start_index + i];
            vert.set_position(p);
            vert.set_normal(Vec3::new(0.0, 0.0, -1.0));
            vert.set_texcoord0(u, v);
            vert.set_diffuse(Vec4::ONE);
            vert.set_specular(Vec4::ONE);
        }
    }

    pub fn set_diffuse(&mut self, index: usize, rgba: Vec4) {
        self.vertices_mut()[index].set_diffuse(rgba);
    }

    pub fn set_specular(&mut self, index: usize, rgba: Vec4) {
        self.vertices_mut()[index].set_specular(rgba);
    }

    /// Offsets every vertex position.
    pub fn translate(&mut self, delta: Vec3) {
        for v in self.vertices_mut() {
            v.pos[0] += delta.x;
            v.pos[1] += delta.y;
            v.pos[2] += delta.z;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_slots() {
        assert_eq!(VertexAttribute::POSITION.slot(), Some(0));
        assert_eq!(VertexAttribute::TEXCOORD3.slot(), Some(12));
        assert_eq!(VertexAttribute::DEFAULT.slot(), None);
    }

    #[test]
    fn new_buffers_start_cache_invalid() {
        let buffer = VertexBuffer::new(16, 0);
        assert!(!buffer.is_cache_valid());
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn mutable_access_invalidates_cache_and_linear_copy() {
        let mut buffer = VertexBuffer::new(4, 0);
        buffer.linearize(256.0, 256.0);
        buffer.set_cache_valid();
        assert!(buffer.linear.is_some());

        buffer.vertices_mut()[0].set_position(Vec3::ZERO);
        assert!(!buffer.is_cache_valid());
        assert!(buffer.linear.is_none());
    }

    #[test]
    fn linearize_scales_texcoords_without_touching_canonical_storage() {
        let mut buffer = VertexBuffer::new(1, 0);
        buffer.vertices_mut()[0].set_texcoord0(0.5, 0.25);
        buffer.linearize(256.0, 128.0);

        assert_eq!(buffer.storage(false)[0].texcoord0[0], 0.5);
        assert_eq!(buffer.storage(true)[0].texcoord0[0], 128.0);
        assert_eq!(buffer.storage(true)[0].texcoord0[1], 32.0);
    }

    #[test]
    fn storage_bases_are_disjoint() {
        let mut buffer = VertexBuffer::new(8, 0x4000);
        assert_eq!(buffer.storage_base(false), 0x4000);
        // Without a linear copy, linear binds fall back to canonical storage.
        assert_eq!(buffer.storage_base(true), 0x4000);

        buffer.linearize(64.0, 64.0);
        assert_eq!(buffer.storage_base(true), 0x4000 + 8 * Vertex::STRIDE);
    }

    #[test]
    fn define_quad_fills_six_vertices() {
        let mut buffer = VertexBuffer::new(6, 0);
        buffer.define_quad(0, -1.0, -1.0, 1.0, 1.0, 0.5);
        let verts = buffer.vertices();
        assert_eq!(verts[0].pos[..3], [-1.0, -1.0, 0.5]);
        assert_eq!(verts[2].pos[..3], [1.0, 1.0, 0.5]);
        assert_eq!(verts[5].texcoord0[..2], [1.0, 0.0]);
    }
}
