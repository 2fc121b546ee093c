//! Texture format catalog.
//!
//! Each entry pairs a hardware color-format code with the properties the
//! state tracker needs: storage layout (swizzled vs linear), bytes per pixel,
//! whether sampling requires the YUV-to-RGB conversion flag in `control0`,
//! and whether the format indexes a palette.

use nv2a_regs::nv097;

use crate::surface::SurfaceColorFormat;

/// Static description of one texture color format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFormatInfo {
    /// `SET_TEXTURE_FORMAT` color field value.
    pub format: u32,
    /// Bytes per texel as stored in memory.
    pub bytes_per_pixel: u32,
    /// True for Morton-order (swizzled) storage, false for pitched linear.
    pub swizzled: bool,
    /// Sampling this format needs the CRYCB-to-RGB colorspace conversion.
    pub requires_colorspace_conversion: bool,
    /// Texels index a 256-entry palette instead of encoding color directly.
    pub palettized: bool,
    pub name: &'static str,
}

impl TextureFormatInfo {
    pub const fn new(
        format: u32,
        bytes_per_pixel: u32,
        swizzled: bool,
        name: &'static str,
    ) -> Self {
        Self {
            format,
            bytes_per_pixel,
            swizzled,
            requires_colorspace_conversion: false,
            palettized: false,
            name,
        }
    }

    const fn palettized(format: u32, bytes_per_pixel: u32, swizzled: bool, name: &'static str) -> Self {
        let mut info = Self::new(format, bytes_per_pixel, swizzled, name);
        info.palettized = true;
        info
    }

    const fn yuv(format: u32, bytes_per_pixel: u32, name: &'static str) -> Self {
        let mut info = Self::new(format, bytes_per_pixel, false, name);
        info.requires_colorspace_conversion = true;
        info
    }

    pub fn linear(&self) -> bool {
        !self.swizzled
    }
}

pub const TEXTURE_FORMATS: &[TextureFormatInfo] = &[
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8, 4, true, "SZ_A8R8G8B8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_X8R8G8B8, 4, true, "SZ_X8R8G8B8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A8B8G8R8, 4, true, "SZ_A8B8G8R8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_R5G6B5, 2, true, "SZ_R5G6B5"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A1R5G5B5, 2, true, "SZ_A1R5G5B5"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_X1R5G5B5, 2, true, "SZ_X1R5G5B5"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A4R4G4B4, 2, true, "SZ_A4R4G4B4"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A8, 1, true, "SZ_A8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_Y8, 1, true, "SZ_Y8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_A8Y8, 2, true, "SZ_A8Y8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_G8B8, 2, true, "SZ_G8B8"),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_SZ_R8B8, 2, true, "SZ_R8B8"),
    TextureFormatInfo::palettized(
        nv097::TEXTURE_FORMAT_COLOR_SZ_I8_A8R8G8B8,
        1,
        true,
        "SZ_I8_A8R8G8B8",
    ),
    TextureFormatInfo::new(
        nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_A8R8G8B8,
        4,
        false,
        "LU_IMAGE_A8R8G8B8",
    ),
    TextureFormatInfo::new(
        nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_X8R8G8B8,
        4,
        false,
        "LU_IMAGE_X8R8G8B8",
    ),
    TextureFormatInfo::new(
        nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_A8B8G8R8,
        4,
        false,
        "LU_IMAGE_A8B8G8R8",
    ),
    TextureFormatInfo::new(
        nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_R5G6B5,
        2,
        false,
        "LU_IMAGE_R5G6B5",
    ),
    TextureFormatInfo::new(
        nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_X1R5G5B5,
        2,
        false,
        "LU_IMAGE_X1R5G5B5",
    ),
    TextureFormatInfo::new(nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_Y8, 1, false, "LU_IMAGE_Y8"),
    TextureFormatInfo::yuv(
        nv097::TEXTURE_FORMAT_COLOR_LC_IMAGE_CR8YB8CB8YA8,
        2,
        "LC_IMAGE_CR8YB8CB8YA8",
    ),
    TextureFormatInfo::yuv(
        nv097::TEXTURE_FORMAT_COLOR_LC_IMAGE_YB8CR8YA8CB8,
        2,
        "LC_IMAGE_YB8CR8YA8CB8",
    ),
];

/// Looks up the catalog entry for a hardware color-format code.
pub fn texture_format_info(format: u32) -> Option<&'static TextureFormatInfo> {
    TEXTURE_FORMATS.iter().find(|info| info.format == format)
}

/// Maps a render surface format to a compatible texture format, used when
/// re-sampling a previously rendered surface.
pub fn texture_format_for_surface(surface: SurfaceColorFormat, linear: bool) -> u32 {
    match surface {
        SurfaceColorFormat::X1R5G5B5Z1R5G5B5 | SurfaceColorFormat::X1R5G5B5O1R5G5B5 => {
            if linear {
                nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_X1R5G5B5
            } else {
                nv097::TEXTURE_FORMAT_COLOR_SZ_X1R5G5B5
            }
        }
        SurfaceColorFormat::R5G6B5 => {
            if linear {
                nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_R5G6B5
            } else {
                nv097::TEXTURE_FORMAT_COLOR_SZ_R5G6B5
            }
        }
        SurfaceColorFormat::X8R8G8B8Z8R8G8B8 | SurfaceColorFormat::X8R8G8B8O8R8G8B8 => {
            if linear {
                nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_X8R8G8B8
            } else {
                nv097::TEXTURE_FORMAT_COLOR_SZ_X8R8G8B8
            }
        }
        SurfaceColorFormat::X1A7R8G8B8Z1A7R8G8B8
        | SurfaceColorFormat::X1A7R8G8B8O1A7R8G8B8
        | SurfaceColorFormat::A8R8G8B8 => {
            if linear {
                nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_A8R8G8B8
            } else {
                nv097::TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8
            }
        }
        SurfaceColorFormat::B8 => {
            if linear {
                nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_Y8
            } else {
                nv097::TEXTURE_FORMAT_COLOR_SZ_Y8
            }
        }
        SurfaceColorFormat::G8B8 => nv097::TEXTURE_FORMAT_COLOR_SZ_G8B8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup() {
        let info = texture_format_info(nv097::TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8).unwrap();
        assert_eq!(info.bytes_per_pixel, 4);
        assert!(info.swizzled);
        assert!(!info.requires_colorspace_conversion);

        let yuv = texture_format_info(nv097::TEXTURE_FORMAT_COLOR_LC_IMAGE_CR8YB8CB8YA8).unwrap();
        assert!(yuv.requires_colorspace_conversion);
        assert!(yuv.linear());

        assert!(texture_format_info(0xFF).is_none());
    }

    #[test]
    fn surface_mapping_respects_layout_choice() {
        assert_eq!(
            texture_format_for_surface(SurfaceColorFormat::A8R8G8B8, false),
            nv097::TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8
        );
        assert_eq!(
            texture_format_for_surface(SurfaceColorFormat::A8R8G8B8, true),
            nv097::TEXTURE_FORMAT_COLOR_LU_IMAGE_A8R8G8B8
        );
    }
}
