//! Texture memory arena.
//!
//! One contiguous allocation backs all texture sampling: four equal texture
//! regions (one per unit) followed by a trailing palette region subdivided
//! into one 256-entry palette per unit. The partition is computed once at
//! construction and never changes; units address their regions by index, and
//! every write is bounds-checked against the owning region.

use tracing::trace;

use crate::error::PgraphError;

/// Number of parallel texture units.
pub const TEXTURE_UNITS: usize = 4;

/// Entries in one palette.
pub const PALETTE_ENTRIES: usize = 256;

const PALETTE_BYTES: usize = PALETTE_ENTRIES * 4;

pub struct TextureArena {
    bytes: Vec<u8>,
    region_len: usize,
}

impl TextureArena {
    /// Allocates the arena for the given per-texture maxima. The per-unit
    /// region is sized for the worst case of a 32bpp volume texture.
    pub fn new(max_width: u32, max_height: u32, max_depth: u32) -> Self {
        let region_len = max_width as usize * 4 * max_height as usize * max_depth as usize;
        let bytes = vec![0u8; region_len * TEXTURE_UNITS + PALETTE_BYTES * TEXTURE_UNITS];
        Self { bytes, region_len }
    }

    /// Size in bytes of one unit's texture region.
    pub fn region_len(&self) -> usize {
        self.region_len
    }

    /// Total size of the texture portion of the arena (all four regions,
    /// excluding palettes).
    pub fn texture_len(&self) -> usize {
        self.region_len * TEXTURE_UNITS
    }

    /// Byte offset of `unit`'s texture region from the arena base.
    pub fn texture_offset(&self, unit: usize) -> usize {
        debug_assert!(unit < TEXTURE_UNITS);
        unit * self.region_len
    }

    /// Byte offset of `unit`'s palette from the palette region base.
    pub fn palette_offset(&self, unit: usize) -> usize {
        debug_assert!(unit < TEXTURE_UNITS);
        unit * PALETTE_BYTES
    }

    fn palette_base(&self) -> usize {
        self.region_len * TEXTURE_UNITS
    }

    /// Read-only view of `unit`'s texture region.
    pub fn texture_bytes(&self, unit: usize) -> &[u8] {
        let base = self.texture_offset(unit);
        &self.bytes[base..base + self.region_len]
    }

    /// Read-only view of `unit`'s palette.
    pub fn palette_bytes(&self, unit: usize) -> &[u8] {
        let base = self.palette_base() + self.palette_offset(unit);
        &self.bytes[base..base + PALETTE_BYTES]
    }

    /// Copies a texture image into `unit`'s region, optionally swizzling to
    /// Morton order. Rejects images that do not fit the region without
    /// touching arena memory.
    #[allow(clippy::too_many_arguments)]
    pub fn write_texture(
        &mut self,
        unit: usize,
        data: &[u8],
        width: u32,
        height: u32,
        depth: u32,
        pitch: u32,
        bytes_per_pixel: u32,
        swizzle: bool,
    ) -> Result<(), PgraphError> {
        let required = pitch as usize * height as usize * depth as usize;
        if required > self.region_len {
            return Err(PgraphError::TextureTooLarge {
                required,
                available: self.region_len,
            });
        }
        debug_assert!(data.len() >= required);

        trace!(unit, width, height, depth, pitch, swizzle, "texture upload");

        let base = self.texture_offset(unit);
        let region = &mut self.bytes[base..base + self.region_len];
        if swizzle {
            swizzle_box(data, width, height, depth, pitch, bytes_per_pixel, region);
        } else {
            region[..required].copy_from_slice(&data[..required]);
        }
        Ok(())
    }

    /// Copies palette entries into `unit`'s palette. Rejects palettes larger
    /// than the per-unit palette region without touching arena memory.
    pub fn write_palette(&mut self, unit: usize, entries: &[u32]) -> Result<(), PgraphError> {
        let required = entries.len() * 4;
        if required > PALETTE_BYTES {
            return Err(PgraphError::PaletteTooLarge {
                required,
                available: PALETTE_BYTES,
            });
        }

        let base = self.palette_base() + self.palette_offset(unit);
        for (i, &entry) in entries.iter().enumerate() {
            self.bytes[base + i * 4..base + i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
        }
        Ok(())
    }
}

/// Morton (Z-order) offset of texel `(x, y)` within a `width` x `height`
/// image. X occupies the even bit positions; once the smaller dimension is
/// exhausted the remaining bits of the larger one follow linearly.
pub fn swizzle_index(mut x: u32, mut y: u32, mut width: u32, mut height: u32) -> u32 {
    let mut offset = 0;
    let mut shift = 0;
    while width > 1 || height > 1 {
        if width > 1 {
            offset |= (x & 1) << shift;
            x >>= 1;
            shift += 1;
            width >>= 1;
        }
        if height > 1 {
            offset |= (y & 1) << shift;
            y >>= 1;
            shift += 1;
            height >>= 1;
        }
    }
    offset
}

fn swizzle_box(
    src: &[u8],
    width: u32,
    height: u32,
    depth: u32,
    pitch: u32,
    bytes_per_pixel: u32,
    dst: &mut [u8],
) {
    let bpp = bytes_per_pixel as usize;
    let layer_texels = width as usize * height as usize;
    for z in 0..depth as usize {
        let src_layer = z * pitch as usize * height as usize;
        let dst_layer = z * layer_texels * bpp;
        for y in 0..height {
            let row = src_layer + y as usize * pitch as usize;
            for x in 0..width {
                let src_off = row + x as usize * bpp;
                let dst_off = dst_layer + swizzle_index(x, y, width, height) as usize * bpp;
                dst[dst_off..dst_off + bpp].copy_from_slice(&src[src_off..src_off + bpp]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_partition_the_arena() {
        let arena = TextureArena::new(256, 256, 1);
        let region = arena.region_len();
        assert_eq!(region, 256 * 256 * 4);
        for unit in 0..TEXTURE_UNITS {
            assert_eq!(arena.texture_offset(unit), unit * region);
        }
        assert_eq!(arena.texture_len(), 4 * region);
    }

    #[test]
    fn oversized_texture_is_rejected_without_mutation() {
        let mut arena = TextureArena::new(64, 64, 1);
        let too_big = vec![0xAAu8; arena.region_len() + 64];
        let err = arena
            .write_texture(1, &too_big, 64, 65, 1, 64 * 4, 4, false)
            .unwrap_err();
        assert!(matches!(err, PgraphError::TextureTooLarge { .. }));
        assert!(arena.texture_bytes(1).iter().all(|&b| b == 0));
    }

    #[test]
    fn linear_upload_lands_in_the_unit_region() {
        let mut arena = TextureArena::new(64, 64, 1);
        let data = vec![0x5Au8; 64 * 64 * 4];
        arena.write_texture(2, &data, 64, 64, 1, 64 * 4, 4, false).unwrap();
        assert!(arena.texture_bytes(2).iter().all(|&b| b == 0x5A));
        assert!(arena.texture_bytes(1).iter().all(|&b| b == 0));
        assert!(arena.texture_bytes(3).iter().all(|&b| b == 0));
    }

    #[test]
    fn swizzle_index_interleaves_for_square_images() {
        // 4x4: offset = y1 x1 y0 x0.
        assert_eq!(swizzle_index(0, 0, 4, 4), 0);
        assert_eq!(swizzle_index(1, 0, 4, 4), 1);
        assert_eq!(swizzle_index(0, 1, 4, 4), 2);
        assert_eq!(swizzle_index(1, 1, 4, 4), 3);
        assert_eq!(swizzle_index(2, 0, 4, 4), 4);
        assert_eq!(swizzle_index(3, 3, 4, 4), 15);
    }

    #[test]
    fn swizzle_index_handles_non_square_images() {
        // 8x2: only the first y bit interleaves, remaining x bits are linear.
        assert_eq!(swizzle_index(0, 1, 8, 2), 2);
        assert_eq!(swizzle_index(7, 1, 8, 2), 15);
        // Every texel maps uniquely.
        let mut seen = vec![false; 16];
        for y in 0..2 {
            for x in 0..8 {
                let i = swizzle_index(x, y, 8, 2) as usize;
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
    }

    #[test]
    fn palettes_are_per_unit_and_bounded() {
        let mut arena = TextureArena::new(16, 16, 1);
        arena.write_palette(0, &[0x11111111; 32]).unwrap();
        arena.write_palette(3, &[0x22222222; 256]).unwrap();
        assert_eq!(&arena.palette_bytes(0)[..4], &[0x11, 0x11, 0x11, 0x11]);
        assert_eq!(&arena.palette_bytes(3)[..4], &[0x22, 0x22, 0x22, 0x22]);

        let err = arena.write_palette(0, &[0; 257]).unwrap_err();
        assert!(matches!(err, PgraphError::PaletteTooLarge { .. }));
    }
}
