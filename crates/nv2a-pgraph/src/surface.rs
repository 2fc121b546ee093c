//! Render surface formats and the depth-range values derived from them.

use nv2a_regs::nv097;

/// Color layouts a render surface can take.
///
/// The discriminants are the `SET_SURFACE_FORMAT` color field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SurfaceColorFormat {
    X1R5G5B5Z1R5G5B5 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X1R5G5B5_Z1R5G5B5,
    X1R5G5B5O1R5G5B5 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X1R5G5B5_O1R5G5B5,
    R5G6B5 = nv097::SET_SURFACE_FORMAT_COLOR_LE_R5G6B5,
    X8R8G8B8Z8R8G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X8R8G8B8_Z8R8G8B8,
    X8R8G8B8O8R8G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X8R8G8B8_O8R8G8B8,
    X1A7R8G8B8Z1A7R8G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X1A7R8G8B8_Z1A7R8G8B8,
    X1A7R8G8B8O1A7R8G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_X1A7R8G8B8_O1A7R8G8B8,
    A8R8G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_A8R8G8B8,
    // Alpha blending must be disabled while rendering to the two formats
    // below; leaving it on faults the hardware.
    B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_B8,
    G8B8 = nv097::SET_SURFACE_FORMAT_COLOR_LE_G8B8,
}

impl SurfaceColorFormat {
    /// Whether the format carries an alpha channel usable for blending.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::R5G6B5 | Self::B8 | Self::G8B8)
    }

    /// Bytes per row for `width` pixels.
    pub fn pitch(self, width: u32) -> u32 {
        match self {
            Self::X1R5G5B5Z1R5G5B5 | Self::X1R5G5B5O1R5G5B5 | Self::R5G6B5 | Self::G8B8 => {
                width * 2
            }
            Self::X8R8G8B8Z8R8G8B8
            | Self::X8R8G8B8O8R8G8B8
            | Self::X1A7R8G8B8Z1A7R8G8B8
            | Self::X1A7R8G8B8O1A7R8G8B8
            | Self::A8R8G8B8 => width * 4,
            Self::B8 => width,
        }
    }
}

/// Depth/stencil layouts a render surface can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SurfaceZetaFormat {
    Z16 = nv097::SET_SURFACE_FORMAT_ZETA_Z16,
    Z24S8 = nv097::SET_SURFACE_FORMAT_ZETA_Z24S8,
}

/// Surface antialiasing sample layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum AntiAliasing {
    #[default]
    Center1 = nv097::SET_SURFACE_FORMAT_ANTI_ALIASING_CENTER_1,
    CenterCorner2 = nv097::SET_SURFACE_FORMAT_ANTI_ALIASING_CENTER_CORNER_2,
    SquareOffset4 = nv097::SET_SURFACE_FORMAT_ANTI_ALIASING_SQUARE_OFFSET_4,
}

/// Largest value representable in the depth surface for the given format and
/// numeric mode.
///
/// The float-mode values are exact hardware bit patterns: the 16-bit float
/// maximum is 0x43FFF800, and the 24-bit float maximum is 0x7149F2CA (1e30,
/// which the hardware also uses as "infinity" for directional light ranges).
pub fn max_depth_value(zeta: SurfaceZetaFormat, float_mode: bool) -> f32 {
    match (zeta, float_mode) {
        (SurfaceZetaFormat::Z16, false) => 65535.0,
        (SurfaceZetaFormat::Z16, true) => f32::from_bits(0x43FF_F800),
        (SurfaceZetaFormat::Z24S8, false) => 16777215.0,
        (SurfaceZetaFormat::Z24S8, true) => f32::from_bits(0x7149_F2CA),
    }
}
