//! Per-unit texture sampling state.
//!
//! Each of the four texture units tracks its format, dimensions, addressing,
//! filtering and palette state on the CPU side. Nothing reaches the hardware
//! until [`TextureStage::commit`] emits the unit's full register block;
//! state changes before that are free.

use nv2a_regs::{mask, nv097};
use tracing::debug;

use crate::arena::TextureArena;
use crate::error::PgraphError;
use crate::push::Pushbuffer;
use crate::texture_format::{TextureFormatInfo, TEXTURE_FORMATS};

/// Texture coordinate wrap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum WrapMode {
    #[default]
    Wrap = nv097::TEXTURE_ADDRESS_WRAP,
    Mirror = nv097::TEXTURE_ADDRESS_MIRROR,
    ClampToEdge = nv097::TEXTURE_ADDRESS_CLAMP_TO_EDGE,
    Border = nv097::TEXTURE_ADDRESS_BORDER,
    Clamp = nv097::TEXTURE_ADDRESS_CLAMP_OGL,
}

/// Texture minification/magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TextureFilter {
    Nearest = nv097::TEXTURE_FILTER_NEAREST,
    Linear = nv097::TEXTURE_FILTER_LINEAR,
    NearestMipmapNearest = nv097::TEXTURE_FILTER_NEAREST_MIPMAP_NEAREST,
    LinearMipmapNearest = nv097::TEXTURE_FILTER_LINEAR_MIPMAP_NEAREST,
    NearestMipmapLinear = nv097::TEXTURE_FILTER_NEAREST_MIPMAP_LINEAR,
    LinearMipmapLinear = nv097::TEXTURE_FILTER_LINEAR_MIPMAP_LINEAR,
}

/// Palette sizes supported by indexed-color formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteSize {
    Entries32,
    Entries64,
    Entries128,
    #[default]
    Entries256,
}

impl PaletteSize {
    pub fn entries(self) -> usize {
        match self {
            Self::Entries32 => 32,
            Self::Entries64 => 64,
            Self::Entries128 => 128,
            Self::Entries256 => 256,
        }
    }

    fn length_field(self) -> u32 {
        match self {
            Self::Entries32 => nv097::TEXTURE_PALETTE_LENGTH_32,
            Self::Entries64 => nv097::TEXTURE_PALETTE_LENGTH_64,
            Self::Entries128 => nv097::TEXTURE_PALETTE_LENGTH_128,
            Self::Entries256 => nv097::TEXTURE_PALETTE_LENGTH_256,
        }
    }
}

/// Swizzled A8R8G8B8, the catalog's first entry.
const DEFAULT_FORMAT: TextureFormatInfo = TEXTURE_FORMATS[0];

/// CPU-side state of one texture unit.
#[derive(Debug, Clone)]
pub struct TextureStage {
    unit: u32,
    enabled: bool,
    format: TextureFormatInfo,

    // Power-of-two texture dimensions; the image may be smaller or padded
    // larger for mip chains.
    width: u32,
    height: u32,
    depth: u32,
    image_width: u32,
    image_height: u32,
    mipmap_levels: u32,

    texture_offset: u32,
    palette_offset: u32,
    palette_size: PaletteSize,

    wrap_u: WrapMode,
    wrap_v: WrapMode,
    wrap_p: WrapMode,
    cylwrap_u: bool,
    cylwrap_v: bool,
    cylwrap_p: bool,
    cylwrap_q: bool,

    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    lod_bias: u32,
    lod_min: u32,
    lod_max: u32,
    border_color: u32,
}

impl TextureStage {
    pub(crate) fn new(unit: u32, texture_offset: u32, palette_offset: u32) -> Self {
        Self {
            unit,
            enabled: false,
            format: DEFAULT_FORMAT,
            width: 0,
            height: 0,
            depth: 1,
            image_width: 0,
            image_height: 0,
            mipmap_levels: 1,
            texture_offset,
            palette_offset,
            palette_size: PaletteSize::default(),
            wrap_u: WrapMode::default(),
            wrap_v: WrapMode::default(),
            wrap_p: WrapMode::default(),
            cylwrap_u: false,
            cylwrap_v: false,
            cylwrap_p: false,
            cylwrap_q: false,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            lod_bias: 0,
            lod_min: 0,
            lod_max: 0xFFF,
            border_color: 0,
        }
    }

    /// Restores default sampling state, keeping the unit's arena regions.
    pub fn reset(&mut self) {
        *self = Self::new(self.unit, self.texture_offset, self.palette_offset);
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_format(&mut self, format: TextureFormatInfo) {
        self.format = format;
    }

    pub fn format(&self) -> &TextureFormatInfo {
        &self.format
    }

    /// True when the active format is stored pitched-linear rather than
    /// swizzled; linear addressing samples texels in pixel units.
    pub fn is_linear(&self) -> bool {
        self.format.linear()
    }

    /// True when sampling the active format needs the CRYCB-to-RGB
    /// conversion flag set in `control0`.
    pub fn requires_colorspace_conversion(&self) -> bool {
        self.format.requires_colorspace_conversion
    }

    /// Sets the (power-of-two) texture dimensions.
    pub fn set_texture_dimensions(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Sets the image dimensions. The image may exceed the texture
    /// dimensions, e.g. for mipmap-style padding.
    pub fn set_image_dimensions(&mut self, width: u32, height: u32) {
        self.image_width = width;
        self.image_height = height;
    }

    pub fn set_mipmap_levels(&mut self, levels: u32) {
        self.mipmap_levels = levels;
    }

    pub fn set_wrap(&mut self, u: WrapMode, v: WrapMode, p: WrapMode) {
        self.wrap_u = u;
        self.wrap_v = v;
        self.wrap_p = p;
    }

    pub fn set_cylinder_wrap(&mut self, u: bool, v: bool, p: bool, q: bool) {
        self.cylwrap_u = u;
        self.cylwrap_v = v;
        self.cylwrap_p = p;
        self.cylwrap_q = q;
    }

    pub fn set_filter(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.min_filter = min;
        self.mag_filter = mag;
    }

    pub fn set_lod(&mut self, bias: u32, min: u32, max: u32) {
        self.lod_bias = bias;
        self.lod_min = min;
        self.lod_max = max;
    }

    pub fn set_border_color(&mut self, argb: u32) {
        self.border_color = argb;
    }

    pub fn set_palette_size(&mut self, size: PaletteSize) {
        self.palette_size = size;
    }

    /// Byte offset of this unit's texture data from the texture DMA base.
    pub fn texture_offset(&self) -> u32 {
        self.texture_offset
    }

    /// Byte offset of this unit's palette from the palette DMA base.
    pub fn palette_offset(&self) -> u32 {
        self.palette_offset
    }

    /// Copies raw texel data into the unit's arena region and adopts the
    /// image's dimensions. Fails without copying if the image does not fit
    /// the region.
    #[allow(clippy::too_many_arguments)]
    pub fn set_raw_texture(
        &mut self,
        arena: &mut TextureArena,
        data: &[u8],
        width: u32,
        height: u32,
        depth: u32,
        pitch: u32,
        bytes_per_pixel: u32,
        swizzle: bool,
    ) -> Result<(), PgraphError> {
        arena.write_texture(
            self.unit as usize,
            data,
            width,
            height,
            depth,
            pitch,
            bytes_per_pixel,
            swizzle,
        )?;
        self.width = width;
        self.height = height;
        self.depth = depth;
        self.image_width = width;
        self.image_height = height;
        Ok(())
    }

    /// Copies palette entries into the unit's palette region and records the
    /// palette length.
    pub fn set_palette(
        &mut self,
        arena: &mut TextureArena,
        entries: &[u32],
        size: PaletteSize,
    ) -> Result<(), PgraphError> {
        arena.write_palette(self.unit as usize, &entries[..size.entries().min(entries.len())])?;
        self.palette_size = size;
        Ok(())
    }

    fn format_word(&self) -> u32 {
        let dimensionality = if self.depth > 1 { 3 } else { 2 };
        mask(
            nv097::SET_TEXTURE_FORMAT_CONTEXT_DMA,
            nv097::SET_TEXTURE_FORMAT_CONTEXT_DMA_A,
        ) | mask(
            nv097::SET_TEXTURE_FORMAT_BORDER_SOURCE,
            nv097::SET_TEXTURE_FORMAT_BORDER_SOURCE_COLOR,
        ) | mask(nv097::SET_TEXTURE_FORMAT_DIMENSIONALITY, dimensionality)
            | mask(nv097::SET_TEXTURE_FORMAT_COLOR, self.format.format)
            | mask(nv097::SET_TEXTURE_FORMAT_MIPMAP_LEVELS, self.mipmap_levels)
            | mask(nv097::SET_TEXTURE_FORMAT_BASE_SIZE_U, log2(self.width))
            | mask(nv097::SET_TEXTURE_FORMAT_BASE_SIZE_V, log2(self.height))
            | mask(nv097::SET_TEXTURE_FORMAT_BASE_SIZE_P, log2(self.depth))
    }

    fn address_word(&self) -> u32 {
        mask(nv097::SET_TEXTURE_ADDRESS_U, self.wrap_u as u32)
            | if self.cylwrap_u {
                nv097::SET_TEXTURE_ADDRESS_CYLWRAP_U
            } else {
                0
            }
            | mask(nv097::SET_TEXTURE_ADDRESS_V, self.wrap_v as u32)
            | if self.cylwrap_v {
                nv097::SET_TEXTURE_ADDRESS_CYLWRAP_V
            } else {
                0
            }
            | mask(nv097::SET_TEXTURE_ADDRESS_P, self.wrap_p as u32)
            | if self.cylwrap_p {
                nv097::SET_TEXTURE_ADDRESS_CYLWRAP_P
            } else {
                0
            }
            | if self.cylwrap_q {
                nv097::SET_TEXTURE_ADDRESS_CYLWRAP_Q
            } else {
                0
            }
    }

    fn control0_word(&self) -> u32 {
        let mut word = mask(nv097::SET_TEXTURE_CONTROL0_MIN_LOD_CLAMP, self.lod_min)
            | mask(nv097::SET_TEXTURE_CONTROL0_MAX_LOD_CLAMP, self.lod_max);
        if self.enabled {
            word |= nv097::SET_TEXTURE_CONTROL0_ENABLE;
        }
        word
    }

    fn filter_word(&self) -> u32 {
        mask(nv097::SET_TEXTURE_FILTER_MIPMAP_LOD_BIAS, self.lod_bias)
            | mask(nv097::SET_TEXTURE_FILTER_MIN, self.min_filter as u32)
            | mask(nv097::SET_TEXTURE_FILTER_MAG, self.mag_filter as u32)
    }

    /// Emits the unit's register block. A disabled unit only clears its
    /// enable bit; every other register keeps its previous contents.
    pub fn commit(&self, pb: &mut Pushbuffer, texture_base: u32, palette_base: u32) {
        let reg = |method| nv097::set_texture(self.unit, method);

        pb.begin();
        pb.push(reg(nv097::SET_TEXTURE_CONTROL0), &[self.control0_word()]);
        if !self.enabled {
            pb.end();
            return;
        }

        debug!(
            unit = self.unit,
            format = self.format.name,
            width = self.width,
            height = self.height,
            "texture stage commit"
        );

        pb.push(
            reg(nv097::SET_TEXTURE_OFFSET),
            &[texture_base + self.texture_offset],
        );
        pb.push(reg(nv097::SET_TEXTURE_FORMAT), &[self.format_word()]);
        pb.push(reg(nv097::SET_TEXTURE_ADDRESS), &[self.address_word()]);
        if self.is_linear() {
            let pitch = self.image_width * self.format.bytes_per_pixel;
            pb.push(
                reg(nv097::SET_TEXTURE_CONTROL1),
                &[mask(nv097::SET_TEXTURE_CONTROL1_IMAGE_PITCH, pitch)],
            );
        }
        pb.push(reg(nv097::SET_TEXTURE_FILTER), &[self.filter_word()]);
        pb.push(
            reg(nv097::SET_TEXTURE_IMAGE_RECT),
            &[
                mask(nv097::SET_TEXTURE_IMAGE_RECT_WIDTH, self.image_width)
                    | mask(nv097::SET_TEXTURE_IMAGE_RECT_HEIGHT, self.image_height),
            ],
        );
        if self.format.palettized {
            let palette_word = mask(nv097::SET_TEXTURE_PALETTE_CONTEXT_DMA, 0)
                | mask(
                    nv097::SET_TEXTURE_PALETTE_LENGTH,
                    self.palette_size.length_field(),
                )
                | ((palette_base + self.palette_offset) & nv097::SET_TEXTURE_PALETTE_OFFSET);
            pb.push(reg(nv097::SET_TEXTURE_PALETTE), &[palette_word]);
        }
        pb.push(reg(nv097::SET_TEXTURE_BORDER_COLOR), &[self.border_color]);
        pb.end();
    }
}

fn log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        31 - value.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{CommandLog, RecordingTransport};
    use crate::texture_format::texture_format_info;

    fn recording_pushbuffer() -> (Pushbuffer, CommandLog) {
        let (transport, log) = RecordingTransport::new();
        (Pushbuffer::new(Box::new(transport)), log)
    }

    #[test]
    fn disabled_stage_only_clears_enable() {
        let (mut pb, log) = recording_pushbuffer();
        let stage = TextureStage::new(2, 0x20000, 0x200);
        stage.commit(&mut pb, 0, 0);

        let writes = log.register_writes();
        assert_eq!(writes.len(), 1);
        let (reg, value) = writes[0];
        assert_eq!(reg, nv097::set_texture(2, nv097::SET_TEXTURE_CONTROL0));
        assert_eq!(value & nv097::SET_TEXTURE_CONTROL0_ENABLE, 0);
    }

    #[test]
    fn commit_addresses_follow_the_unit_stride() {
        for unit in 0..4 {
            let (mut pb, log) = recording_pushbuffer();
            let mut stage = TextureStage::new(unit, unit * 0x10000, unit * 0x400);
            stage.set_enabled(true);
            stage.set_texture_dimensions(256, 256);
            stage.set_image_dimensions(256, 256);
            stage.commit(&mut pb, 0x0100_0000, 0x0200_0000);

            assert_eq!(
                log.last_write_to(nv097::set_texture(unit, nv097::SET_TEXTURE_OFFSET)),
                Some(0x0100_0000 + unit * 0x10000)
            );
        }
    }

    #[test]
    fn format_word_encodes_log2_sizes() {
        let (mut pb, log) = recording_pushbuffer();
        let mut stage = TextureStage::new(0, 0, 0);
        stage.set_enabled(true);
        stage.set_texture_dimensions(256, 64);
        stage.set_image_dimensions(256, 64);
        stage.commit(&mut pb, 0, 0);

        let word = log
            .last_write_to(nv097::SET_TEXTURE_FORMAT)
            .expect("format word");
        assert_eq!(nv2a_regs::unmask(nv097::SET_TEXTURE_FORMAT_BASE_SIZE_U, word), 8);
        assert_eq!(nv2a_regs::unmask(nv097::SET_TEXTURE_FORMAT_BASE_SIZE_V, word), 6);
        assert_eq!(
            nv2a_regs::unmask(nv097::SET_TEXTURE_FORMAT_COLOR, word),
            nv097::TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8
        );
        assert_eq!(nv2a_regs::unmask(nv097::SET_TEXTURE_FORMAT_DIMENSIONALITY, word), 2);
    }

    #[test]
    fn linear_formats_emit_an_image_pitch() {
        let (mut pb, log) = recording_pushbuffer();
        let mut stage = TextureStage::new(0, 0, 0);
        stage.set_enabled(true);
        stage.set_format(
            *texture_format_info(nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_A8R8G8B8).unwrap(),
        );
        stage.set_texture_dimensions(128, 128);
        stage.set_image_dimensions(128, 128);
        stage.commit(&mut pb, 0, 0);

        let control1 = log.last_write_to(nv097::SET_TEXTURE_CONTROL1).unwrap();
        assert_eq!(
            nv2a_regs::unmask(nv097::SET_TEXTURE_CONTROL1_IMAGE_PITCH, control1),
            128 * 4
        );
    }
}
