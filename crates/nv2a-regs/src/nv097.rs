//! Method addresses and field layouts for the `0x97` (Kelvin) object class.
//!
//! Methods are 32-bit words written through the pushbuffer. Per-instance
//! register blocks repeat at a fixed stride: combiner stages at `+ 4 * stage`,
//! vertex attribute slots at `+ 4 * slot`, texture units at `+ 0x40 * unit`,
//! lights at `+ 0x80 * light` (back-side lights at `+ 0x40 * light`).
//!
//! Field masks follow the reference-header convention: the field value is
//! shifted to the mask's lowest set bit (see [`crate::mask`]).

// --- Synchronization -------------------------------------------------------

pub const NO_OPERATION: u32 = 0x0100;
pub const WAIT_FOR_IDLE: u32 = 0x0110;

// --- DMA context selectors -------------------------------------------------

pub const SET_CONTEXT_DMA_A: u32 = 0x0184;
pub const SET_CONTEXT_DMA_B: u32 = 0x0188;
pub const SET_CONTEXT_DMA_COLOR: u32 = 0x0194;
pub const SET_CONTEXT_DMA_ZETA: u32 = 0x0198;
pub const SET_CONTEXT_DMA_VERTEX_A: u32 = 0x019C;
pub const SET_CONTEXT_DMA_VERTEX_B: u32 = 0x01A0;

// --- Surface configuration -------------------------------------------------

pub const SET_SURFACE_CLIP_HORIZONTAL: u32 = 0x0200;
pub const SET_SURFACE_CLIP_VERTICAL: u32 = 0x0204;

pub const SET_SURFACE_FORMAT: u32 = 0x0208;
pub const SET_SURFACE_FORMAT_COLOR: u32 = 0x0000000F;
pub const SET_SURFACE_FORMAT_COLOR_LE_X1R5G5B5_Z1R5G5B5: u32 = 0x01;
pub const SET_SURFACE_FORMAT_COLOR_LE_X1R5G5B5_O1R5G5B5: u32 = 0x02;
pub const SET_SURFACE_FORMAT_COLOR_LE_R5G6B5: u32 = 0x03;
pub const SET_SURFACE_FORMAT_COLOR_LE_X8R8G8B8_Z8R8G8B8: u32 = 0x04;
pub const SET_SURFACE_FORMAT_COLOR_LE_X8R8G8B8_O8R8G8B8: u32 = 0x05;
pub const SET_SURFACE_FORMAT_COLOR_LE_X1A7R8G8B8_Z1A7R8G8B8: u32 = 0x06;
pub const SET_SURFACE_FORMAT_COLOR_LE_X1A7R8G8B8_O1A7R8G8B8: u32 = 0x07;
pub const SET_SURFACE_FORMAT_COLOR_LE_A8R8G8B8: u32 = 0x08;
pub const SET_SURFACE_FORMAT_COLOR_LE_B8: u32 = 0x09;
pub const SET_SURFACE_FORMAT_COLOR_LE_G8B8: u32 = 0x0A;
pub const SET_SURFACE_FORMAT_ZETA: u32 = 0x000000F0;
pub const SET_SURFACE_FORMAT_ZETA_Z16: u32 = 0x01;
pub const SET_SURFACE_FORMAT_ZETA_Z24S8: u32 = 0x02;
pub const SET_SURFACE_FORMAT_TYPE: u32 = 0x00000F00;
pub const SET_SURFACE_FORMAT_TYPE_PITCH: u32 = 0x01;
pub const SET_SURFACE_FORMAT_TYPE_SWIZZLE: u32 = 0x02;
pub const SET_SURFACE_FORMAT_ANTI_ALIASING: u32 = 0x0000F000;
pub const SET_SURFACE_FORMAT_ANTI_ALIASING_CENTER_1: u32 = 0x00;
pub const SET_SURFACE_FORMAT_ANTI_ALIASING_CENTER_CORNER_2: u32 = 0x01;
pub const SET_SURFACE_FORMAT_ANTI_ALIASING_SQUARE_OFFSET_4: u32 = 0x02;
pub const SET_SURFACE_FORMAT_WIDTH: u32 = 0x00FF0000;
pub const SET_SURFACE_FORMAT_HEIGHT: u32 = 0xFF000000;

pub const SET_SURFACE_PITCH: u32 = 0x020C;
pub const SET_SURFACE_PITCH_COLOR: u32 = 0x0000FFFF;
pub const SET_SURFACE_PITCH_ZETA: u32 = 0xFFFF0000;

pub const SET_SURFACE_COLOR_OFFSET: u32 = 0x0210;
pub const SET_SURFACE_ZETA_OFFSET: u32 = 0x0214;

// --- Combiner input words (alpha pipe) + final combiner --------------------

/// Alpha input combiner words, one per stage (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_ALPHA_ICW: u32 = 0x0260;

/// Final combiner word 0 (channels A..D).
pub const SET_COMBINER_SPECULAR_FOG_CW0: u32 = 0x0288;
/// Final combiner word 1 (channels E..G + specular sum flags).
pub const SET_COMBINER_SPECULAR_FOG_CW1: u32 = 0x028C;
pub const SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_ADD_INVERT_R0: u32 = 1 << 5;
pub const SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_ADD_INVERT_V1: u32 = 1 << 6;
pub const SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_CLAMP: u32 = 1 << 7;

// --- control0 --------------------------------------------------------------

pub const SET_CONTROL0: u32 = 0x0290;
pub const SET_CONTROL0_STENCIL_WRITE_ENABLE: u32 = 1 << 0;
pub const SET_CONTROL0_Z_PERSPECTIVE_ENABLE: u32 = 1 << 8;
pub const SET_CONTROL0_Z_FORMAT: u32 = 1 << 12;
pub const SET_CONTROL0_Z_FORMAT_FIXED: u32 = 0;
pub const SET_CONTROL0_Z_FORMAT_FLOAT: u32 = 1 << 12;
pub const SET_CONTROL0_TEXTURE_PERSPECTIVE_ENABLE: u32 = 1 << 20;
pub const SET_CONTROL0_COLOR_SPACE_CONVERT: u32 = 0xF0000000;
pub const SET_CONTROL0_COLOR_SPACE_CONVERT_CRYCB_TO_RGB: u32 = 0x1;

// --- Window clip -----------------------------------------------------------

pub const SET_WINDOW_CLIP_TYPE: u32 = 0x02B4;
/// Clip regions repeat at `+ 4 * region`.
pub const SET_WINDOW_CLIP_HORIZONTAL: u32 = 0x02C0;
pub const SET_WINDOW_CLIP_VERTICAL: u32 = 0x02E0;

// --- Render state toggles --------------------------------------------------

pub const SET_ALPHA_TEST_ENABLE: u32 = 0x0300;
pub const SET_BLEND_ENABLE: u32 = 0x0304;
pub const SET_CULL_FACE_ENABLE: u32 = 0x0308;
pub const SET_DEPTH_TEST_ENABLE: u32 = 0x030C;
pub const SET_DITHER_ENABLE: u32 = 0x0310;
pub const SET_LIGHTING_ENABLE: u32 = 0x0314;
pub const SET_STENCIL_TEST_ENABLE: u32 = 0x032C;

pub const SET_ALPHA_FUNC: u32 = 0x033C;
pub const SET_ALPHA_FUNC_V_ALWAYS: u32 = 0x0207;
pub const SET_ALPHA_REF: u32 = 0x0340;

pub const SET_BLEND_FUNC_SFACTOR: u32 = 0x0344;
pub const SET_BLEND_FUNC_SFACTOR_V_ZERO: u32 = 0x0000;
pub const SET_BLEND_FUNC_SFACTOR_V_ONE: u32 = 0x0001;
pub const SET_BLEND_FUNC_SFACTOR_V_SRC_ALPHA: u32 = 0x0302;
pub const SET_BLEND_FUNC_SFACTOR_V_ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
pub const SET_BLEND_FUNC_DFACTOR: u32 = 0x0348;
pub const SET_BLEND_FUNC_DFACTOR_V_ZERO: u32 = 0x0000;
pub const SET_BLEND_FUNC_DFACTOR_V_ONE: u32 = 0x0001;
pub const SET_BLEND_FUNC_DFACTOR_V_SRC_ALPHA: u32 = 0x0302;
pub const SET_BLEND_FUNC_DFACTOR_V_ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
pub const SET_BLEND_COLOR: u32 = 0x034C;
pub const SET_BLEND_EQUATION: u32 = 0x0350;
pub const SET_BLEND_EQUATION_V_FUNC_ADD: u32 = 0x8006;

pub const SET_DEPTH_FUNC: u32 = 0x0354;

pub const SET_COLOR_MASK: u32 = 0x0358;
pub const SET_COLOR_MASK_BLUE_WRITE_ENABLE: u32 = 1 << 0;
pub const SET_COLOR_MASK_GREEN_WRITE_ENABLE: u32 = 1 << 8;
pub const SET_COLOR_MASK_RED_WRITE_ENABLE: u32 = 1 << 16;
pub const SET_COLOR_MASK_ALPHA_WRITE_ENABLE: u32 = 1 << 24;

pub const SET_DEPTH_MASK: u32 = 0x035C;
pub const SET_STENCIL_MASK: u32 = 0x0360;

// --- Depth clip ------------------------------------------------------------

pub const SET_CLIP_MIN: u32 = 0x0394;
pub const SET_CLIP_MAX: u32 = 0x0398;

// --- Lighting master switches ---------------------------------------------

pub const SET_SPECULAR_ENABLE: u32 = 0x03B8;
/// Two mode bits per light, 8 lights.
pub const SET_LIGHT_ENABLE_MASK: u32 = 0x03BC;
pub const LIGHT_MODE_OFF: u32 = 0;
pub const LIGHT_MODE_INFINITE: u32 = 1;
pub const LIGHT_MODE_LOCAL: u32 = 2;
pub const LIGHT_MODE_SPOT: u32 = 3;

/// Mode bits for `light` shifted into [`SET_LIGHT_ENABLE_MASK`] position.
#[inline]
pub const fn light_mode(light: u32, mode: u32) -> u32 {
    (mode & 0x3) << (2 * light)
}

pub const SET_POINT_SIZE: u32 = 0x043C;

// --- Fixed-function transform matrices -------------------------------------

/// 4x4, 16 consecutive words, hardware (column) order.
pub const SET_MODEL_VIEW_MATRIX: u32 = 0x0480;
/// 4x3, 12 consecutive words.
pub const SET_INVERSE_MODEL_VIEW_MATRIX: u32 = 0x0580;
/// 4x4, 16 consecutive words, hardware (column) order.
pub const SET_COMPOSITE_MATRIX: u32 = 0x0680;

// --- Back-side light colors (`+ 0x40 * light`) -----------------------------

pub const SET_BACK_LIGHT_AMBIENT_COLOR: u32 = 0x0C00;
pub const SET_BACK_LIGHT_DIFFUSE_COLOR: u32 = 0x0C0C;
pub const SET_BACK_LIGHT_SPECULAR_COLOR: u32 = 0x0C18;

/// Stride between back-side light register blocks.
pub const BACK_LIGHT_STRIDE: u32 = 0x40;

#[inline]
pub const fn set_back_light(light: u32, method: u32) -> u32 {
    method + light * BACK_LIGHT_STRIDE
}

// --- Per-light state (`+ 0x80 * light`) ------------------------------------

pub const SET_LIGHT_AMBIENT_COLOR: u32 = 0x1000;
pub const SET_LIGHT_DIFFUSE_COLOR: u32 = 0x100C;
pub const SET_LIGHT_SPECULAR_COLOR: u32 = 0x1018;
pub const SET_LIGHT_LOCAL_RANGE: u32 = 0x1024;
pub const SET_LIGHT_INFINITE_HALF_VECTOR: u32 = 0x1028;
pub const SET_LIGHT_INFINITE_DIRECTION: u32 = 0x1034;
pub const SET_LIGHT_SPOT_FALLOFF: u32 = 0x1040;
pub const SET_LIGHT_SPOT_DIRECTION: u32 = 0x104C;
pub const SET_LIGHT_LOCAL_POSITION: u32 = 0x105C;
pub const SET_LIGHT_LOCAL_ATTENUATION: u32 = 0x1068;

/// Stride between front light register blocks.
pub const LIGHT_STRIDE: u32 = 0x80;

#[inline]
pub const fn set_light(light: u32, method: u32) -> u32 {
    method + light * LIGHT_STRIDE
}

// --- Viewport --------------------------------------------------------------

/// 4 consecutive float words.
pub const SET_VIEWPORT_OFFSET: u32 = 0x0A20;
/// 4 consecutive float words.
pub const SET_VIEWPORT_SCALE: u32 = 0x0AF0;

// --- Combiner factors and output/input words -------------------------------

/// Per-stage constant 0 (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_FACTOR0: u32 = 0x0A60;
/// Per-stage constant 1 (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_FACTOR1: u32 = 0x0A80;
/// Alpha output combiner words (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_ALPHA_OCW: u32 = 0x0AA0;
/// Color input combiner words (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_COLOR_ICW: u32 = 0x0AC0;

// --- Immediate-mode vertex attributes --------------------------------------

pub const SET_VERTEX3F: u32 = 0x1500;
pub const SET_VERTEX4F: u32 = 0x1518;
pub const SET_NORMAL3F: u32 = 0x1530;
pub const SET_NORMAL3S: u32 = 0x1540;
pub const SET_DIFFUSE_COLOR4F: u32 = 0x1550;
pub const SET_DIFFUSE_COLOR3F: u32 = 0x1560;
pub const SET_DIFFUSE_COLOR4I: u32 = 0x156C;
pub const SET_SPECULAR_COLOR4F: u32 = 0x1570;
pub const SET_SPECULAR_COLOR3F: u32 = 0x1580;
pub const SET_SPECULAR_COLOR4I: u32 = 0x158C;

pub const SET_TEXCOORD0_2F: u32 = 0x1590;
pub const SET_TEXCOORD0_2S: u32 = 0x1598;
pub const SET_TEXCOORD0_4F: u32 = 0x15A0;
pub const SET_TEXCOORD0_4S: u32 = 0x15B0;
pub const SET_TEXCOORD1_2F: u32 = 0x15B8;
pub const SET_TEXCOORD1_2S: u32 = 0x15C0;
pub const SET_TEXCOORD1_4F: u32 = 0x15C8;
pub const SET_TEXCOORD1_4S: u32 = 0x15D8;
pub const SET_TEXCOORD2_2F: u32 = 0x15E0;
pub const SET_TEXCOORD2_2S: u32 = 0x15E8;
pub const SET_TEXCOORD2_4F: u32 = 0x15F0;
pub const SET_TEXCOORD2_4S: u32 = 0x1600;
pub const SET_TEXCOORD3_2F: u32 = 0x1608;
pub const SET_TEXCOORD3_2S: u32 = 0x1610;
pub const SET_TEXCOORD3_4F: u32 = 0x1620;
pub const SET_TEXCOORD3_4S: u32 = 0x1630;

pub const SET_WEIGHT1F: u32 = 0x1680;
pub const SET_WEIGHT2F: u32 = 0x1688;
pub const SET_WEIGHT3F: u32 = 0x1690;
pub const SET_WEIGHT4F: u32 = 0x16A0;
pub const SET_FOG_COORD: u32 = 0x16B0;

// --- Vertex attribute arrays -----------------------------------------------

pub const BREAK_VERTEX_BUFFER_CACHE: u32 = 0x1710;

/// Per-slot array offsets (`+ 4 * slot`, 16 slots).
pub const SET_VERTEX_DATA_ARRAY_OFFSET: u32 = 0x1720;

/// Per-slot array formats (`+ 4 * slot`, 16 slots).
pub const SET_VERTEX_DATA_ARRAY_FORMAT: u32 = 0x1760;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE: u32 = 0x0000000F;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_UB_D3D: u32 = 0x0;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_S1: u32 = 0x1;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_F: u32 = 0x2;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_UB_OGL: u32 = 0x4;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_S32K: u32 = 0x5;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_CMP: u32 = 0x6;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_SIZE: u32 = 0x000000F0;
pub const SET_VERTEX_DATA_ARRAY_FORMAT_STRIDE: u32 = 0xFFFFFF00;

// --- Primitive assembly ----------------------------------------------------

pub const SET_BEGIN_END: u32 = 0x17FC;
pub const SET_BEGIN_END_OP_END: u32 = 0x00;
pub const SET_BEGIN_END_OP_POINTS: u32 = 0x01;
pub const SET_BEGIN_END_OP_LINES: u32 = 0x02;
pub const SET_BEGIN_END_OP_LINE_LOOP: u32 = 0x03;
pub const SET_BEGIN_END_OP_LINE_STRIP: u32 = 0x04;
pub const SET_BEGIN_END_OP_TRIANGLES: u32 = 0x05;
pub const SET_BEGIN_END_OP_TRIANGLE_STRIP: u32 = 0x06;
pub const SET_BEGIN_END_OP_TRIANGLE_FAN: u32 = 0x07;
pub const SET_BEGIN_END_OP_QUADS: u32 = 0x08;
pub const SET_BEGIN_END_OP_QUAD_STRIP: u32 = 0x09;
pub const SET_BEGIN_END_OP_POLYGON: u32 = 0x0A;

/// Two 16-bit indices per word, low half first.
pub const ARRAY_ELEMENT16: u32 = 0x1800;
/// One 32-bit index per word.
pub const ARRAY_ELEMENT32: u32 = 0x1808;

pub const DRAW_ARRAYS: u32 = 0x1810;
pub const DRAW_ARRAYS_COUNT: u32 = 0xFF000000;
pub const DRAW_ARRAYS_START_INDEX: u32 = 0x00FFFFFF;

/// Non-incrementing stream of packed vertex data.
pub const INLINE_ARRAY: u32 = 0x1818;

/// Per-slot packed-byte immediate data (`+ 4 * slot`, 16 slots).
pub const SET_VERTEX_DATA4UB: u32 = 0x1940;

// --- Texture units (`+ 0x40 * unit`, 4 units) ------------------------------

pub const SET_TEXTURE_OFFSET: u32 = 0x1B00;

pub const SET_TEXTURE_FORMAT: u32 = 0x1B04;
pub const SET_TEXTURE_FORMAT_CONTEXT_DMA: u32 = 0x00000003;
pub const SET_TEXTURE_FORMAT_CONTEXT_DMA_A: u32 = 0x1;
pub const SET_TEXTURE_FORMAT_CONTEXT_DMA_B: u32 = 0x2;
pub const SET_TEXTURE_FORMAT_CUBEMAP_ENABLE: u32 = 1 << 2;
pub const SET_TEXTURE_FORMAT_BORDER_SOURCE: u32 = 0x00000008;
pub const SET_TEXTURE_FORMAT_BORDER_SOURCE_TEXTURE: u32 = 0x0;
pub const SET_TEXTURE_FORMAT_BORDER_SOURCE_COLOR: u32 = 0x1;
pub const SET_TEXTURE_FORMAT_DIMENSIONALITY: u32 = 0x000000F0;
pub const SET_TEXTURE_FORMAT_COLOR: u32 = 0x0000FF00;
pub const SET_TEXTURE_FORMAT_MIPMAP_LEVELS: u32 = 0x000F0000;
pub const SET_TEXTURE_FORMAT_BASE_SIZE_U: u32 = 0x00F00000;
pub const SET_TEXTURE_FORMAT_BASE_SIZE_V: u32 = 0x0F000000;
pub const SET_TEXTURE_FORMAT_BASE_SIZE_P: u32 = 0xF0000000;

pub const SET_TEXTURE_ADDRESS: u32 = 0x1B08;
pub const SET_TEXTURE_ADDRESS_U: u32 = 0x0000000F;
pub const SET_TEXTURE_ADDRESS_CYLWRAP_U: u32 = 1 << 4;
pub const SET_TEXTURE_ADDRESS_V: u32 = 0x00000F00;
pub const SET_TEXTURE_ADDRESS_CYLWRAP_V: u32 = 1 << 12;
pub const SET_TEXTURE_ADDRESS_P: u32 = 0x000F0000;
pub const SET_TEXTURE_ADDRESS_CYLWRAP_P: u32 = 1 << 20;
pub const SET_TEXTURE_ADDRESS_CYLWRAP_Q: u32 = 1 << 24;
pub const TEXTURE_ADDRESS_WRAP: u32 = 0x1;
pub const TEXTURE_ADDRESS_MIRROR: u32 = 0x2;
pub const TEXTURE_ADDRESS_CLAMP_TO_EDGE: u32 = 0x3;
pub const TEXTURE_ADDRESS_BORDER: u32 = 0x4;
pub const TEXTURE_ADDRESS_CLAMP_OGL: u32 = 0x5;

pub const SET_TEXTURE_CONTROL0: u32 = 0x1B0C;
pub const SET_TEXTURE_CONTROL0_ALPHA_KILL_ENABLE: u32 = 1 << 2;
pub const SET_TEXTURE_CONTROL0_MAX_LOD_CLAMP: u32 = 0x0003FFC0;
pub const SET_TEXTURE_CONTROL0_MIN_LOD_CLAMP: u32 = 0x3FFC0000;
pub const SET_TEXTURE_CONTROL0_ENABLE: u32 = 1 << 30;

pub const SET_TEXTURE_CONTROL1: u32 = 0x1B10;
pub const SET_TEXTURE_CONTROL1_IMAGE_PITCH: u32 = 0xFFFF0000;

pub const SET_TEXTURE_FILTER: u32 = 0x1B14;
pub const SET_TEXTURE_FILTER_MIPMAP_LOD_BIAS: u32 = 0x00001FFF;
pub const SET_TEXTURE_FILTER_MIN: u32 = 0x00FF0000;
pub const SET_TEXTURE_FILTER_MAG: u32 = 0x0F000000;
pub const TEXTURE_FILTER_NEAREST: u32 = 0x1;
pub const TEXTURE_FILTER_LINEAR: u32 = 0x2;
pub const TEXTURE_FILTER_NEAREST_MIPMAP_NEAREST: u32 = 0x3;
pub const TEXTURE_FILTER_LINEAR_MIPMAP_NEAREST: u32 = 0x4;
pub const TEXTURE_FILTER_NEAREST_MIPMAP_LINEAR: u32 = 0x5;
pub const TEXTURE_FILTER_LINEAR_MIPMAP_LINEAR: u32 = 0x6;

pub const SET_TEXTURE_IMAGE_RECT: u32 = 0x1B1C;
pub const SET_TEXTURE_IMAGE_RECT_WIDTH: u32 = 0xFFFF0000;
pub const SET_TEXTURE_IMAGE_RECT_HEIGHT: u32 = 0x0000FFFF;

pub const SET_TEXTURE_PALETTE: u32 = 0x1B20;
pub const SET_TEXTURE_PALETTE_CONTEXT_DMA: u32 = 0x00000001;
pub const SET_TEXTURE_PALETTE_LENGTH: u32 = 0x0000000C;
pub const TEXTURE_PALETTE_LENGTH_256: u32 = 0x0;
pub const TEXTURE_PALETTE_LENGTH_128: u32 = 0x1;
pub const TEXTURE_PALETTE_LENGTH_64: u32 = 0x2;
pub const TEXTURE_PALETTE_LENGTH_32: u32 = 0x3;
pub const SET_TEXTURE_PALETTE_OFFSET: u32 = 0xFFFFFFC0;

pub const SET_TEXTURE_BORDER_COLOR: u32 = 0x1B24;

/// Stride between texture unit register blocks.
pub const TEXTURE_STRIDE: u32 = 0x40;

#[inline]
pub const fn set_texture(unit: u32, method: u32) -> u32 {
    method + unit * TEXTURE_STRIDE
}

// --- Texture color formats (SET_TEXTURE_FORMAT_COLOR field values) ---------

pub const TEXTURE_FORMAT_COLOR_SZ_Y8: u32 = 0x00;
pub const TEXTURE_FORMAT_COLOR_SZ_A1R5G5B5: u32 = 0x02;
pub const TEXTURE_FORMAT_COLOR_SZ_X1R5G5B5: u32 = 0x03;
pub const TEXTURE_FORMAT_COLOR_SZ_A4R4G4B4: u32 = 0x04;
pub const TEXTURE_FORMAT_COLOR_SZ_R5G6B5: u32 = 0x05;
pub const TEXTURE_FORMAT_COLOR_SZ_A8R8G8B8: u32 = 0x06;
pub const TEXTURE_FORMAT_COLOR_SZ_X8R8G8B8: u32 = 0x07;
pub const TEXTURE_FORMAT_COLOR_SZ_I8_A8R8G8B8: u32 = 0x0B;
pub const TEXTURE_FORMAT_COLOR_L_DXT1_A1R5G5B5: u32 = 0x0C;
pub const TEXTURE_FORMAT_COLOR_L_DXT23_A8R8G8B8: u32 = 0x0E;
pub const TEXTURE_FORMAT_COLOR_L_DXT45_A8R8G8B8: u32 = 0x0F;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_X1R5G5B5: u32 = 0x10;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_R5G6B5: u32 = 0x11;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_A8R8G8B8: u32 = 0x12;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_Y8: u32 = 0x13;
pub const TEXTURE_FORMAT_COLOR_SZ_A8: u32 = 0x19;
pub const TEXTURE_FORMAT_COLOR_SZ_A8Y8: u32 = 0x1A;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_X8R8G8B8: u32 = 0x1E;
pub const TEXTURE_FORMAT_COLOR_LC_IMAGE_CR8YB8CB8YA8: u32 = 0x24;
pub const TEXTURE_FORMAT_COLOR_LC_IMAGE_YB8CR8YA8CB8: u32 = 0x25;
pub const TEXTURE_FORMAT_COLOR_SZ_R8B8: u32 = 0x28;
pub const TEXTURE_FORMAT_COLOR_SZ_G8B8: u32 = 0x29;
pub const TEXTURE_FORMAT_COLOR_SZ_A8B8G8R8: u32 = 0x3A;
pub const TEXTURE_FORMAT_COLOR_LU_IMAGE_A8B8G8R8: u32 = 0x3F;

// --- Clears ----------------------------------------------------------------

pub const SET_ZSTENCIL_CLEAR_VALUE: u32 = 0x1D8C;
pub const SET_COLOR_CLEAR_VALUE: u32 = 0x1D90;

pub const CLEAR_SURFACE: u32 = 0x1D94;
pub const CLEAR_SURFACE_Z: u32 = 1 << 0;
pub const CLEAR_SURFACE_STENCIL: u32 = 1 << 1;
pub const CLEAR_SURFACE_R: u32 = 1 << 4;
pub const CLEAR_SURFACE_G: u32 = 1 << 5;
pub const CLEAR_SURFACE_B: u32 = 1 << 6;
pub const CLEAR_SURFACE_A: u32 = 1 << 7;
pub const CLEAR_SURFACE_COLOR: u32 =
    CLEAR_SURFACE_R | CLEAR_SURFACE_G | CLEAR_SURFACE_B | CLEAR_SURFACE_A;

pub const SET_CLEAR_RECT_HORIZONTAL: u32 = 0x1D98;
pub const SET_CLEAR_RECT_VERTICAL: u32 = 0x1D9C;

// --- Final combiner factors ------------------------------------------------

/// Final combiner constants C0/C1 (`+ 4 * n`, 2 words).
pub const SET_SPECULAR_FOG_FACTOR: u32 = 0x1E20;

// --- Combiner output words (color pipe) and control ------------------------

/// Color output combiner words (`+ 4 * stage`, 8 stages).
pub const SET_COMBINER_COLOR_OCW: u32 = 0x1E40;

pub const SET_COMBINER_CONTROL: u32 = 0x1E60;
pub const SET_COMBINER_CONTROL_ITERATION_COUNT: u32 = 0x000000FF;
pub const SET_COMBINER_CONTROL_MUX_SELECT: u32 = 0x00000F00;
pub const SET_COMBINER_CONTROL_MUX_SELECT_LSB: u32 = 0x0;
pub const SET_COMBINER_CONTROL_MUX_SELECT_MSB: u32 = 0x1;
pub const SET_COMBINER_CONTROL_FACTOR0: u32 = 0x0000F000;
pub const SET_COMBINER_CONTROL_FACTOR0_SAME_FACTOR_ALL: u32 = 0x0;
pub const SET_COMBINER_CONTROL_FACTOR0_EACH_STAGE: u32 = 0x1;
pub const SET_COMBINER_CONTROL_FACTOR1: u32 = 0x000F0000;
pub const SET_COMBINER_CONTROL_FACTOR1_SAME_FACTOR_ALL: u32 = 0x0;
pub const SET_COMBINER_CONTROL_FACTOR1_EACH_STAGE: u32 = 0x1;

// --- Texture shader stages -------------------------------------------------

pub const SET_SHADER_STAGE_PROGRAM: u32 = 0x1E70;
pub const SET_SHADER_STAGE_PROGRAM_STAGE0: u32 = 0x0000001F;
pub const SET_SHADER_STAGE_PROGRAM_STAGE1: u32 = 0x000003E0;
pub const SET_SHADER_STAGE_PROGRAM_STAGE2: u32 = 0x00007C00;
pub const SET_SHADER_STAGE_PROGRAM_STAGE3: u32 = 0x000F8000;

pub const SET_SHADER_CLIP_PLANE_MODE: u32 = 0x1E74;

pub const SET_SHADER_OTHER_STAGE_INPUT: u32 = 0x1E78;
pub const SET_SHADER_OTHER_STAGE_INPUT_STAGE1: u32 = 0x0000000F;
pub const SET_SHADER_OTHER_STAGE_INPUT_STAGE2: u32 = 0x000000F0;
pub const SET_SHADER_OTHER_STAGE_INPUT_STAGE3: u32 = 0x00000F00;

// --- Transform engine mode -------------------------------------------------

pub const SET_TRANSFORM_EXECUTION_MODE: u32 = 0x1E94;
pub const SET_TRANSFORM_EXECUTION_MODE_MODE: u32 = 0x00000003;
pub const SET_TRANSFORM_EXECUTION_MODE_MODE_FIXED: u32 = 0x0;
pub const SET_TRANSFORM_EXECUTION_MODE_MODE_PROGRAM: u32 = 0x2;
pub const SET_TRANSFORM_EXECUTION_MODE_RANGE_MODE: u32 = 0xFFFFFFFC;
pub const SET_TRANSFORM_EXECUTION_MODE_RANGE_MODE_USER: u32 = 0x0;
pub const SET_TRANSFORM_EXECUTION_MODE_RANGE_MODE_PRIV: u32 = 0x1;

pub const SET_TRANSFORM_PROGRAM_CXT_WRITE_EN: u32 = 0x1E98;
pub const SET_TRANSFORM_PROGRAM_LOAD: u32 = 0x1E9C;
pub const SET_TRANSFORM_PROGRAM_START: u32 = 0x1EA0;
pub const SET_TRANSFORM_CONSTANT_LOAD: u32 = 0x1EA4;

// --- Vertex attribute slot indices -----------------------------------------

pub const VERTEX_ATTR_POSITION: u32 = 0;
pub const VERTEX_ATTR_WEIGHT: u32 = 1;
pub const VERTEX_ATTR_NORMAL: u32 = 2;
pub const VERTEX_ATTR_DIFFUSE: u32 = 3;
pub const VERTEX_ATTR_SPECULAR: u32 = 4;
pub const VERTEX_ATTR_FOG_COORD: u32 = 5;
pub const VERTEX_ATTR_POINT_SIZE: u32 = 6;
pub const VERTEX_ATTR_BACK_DIFFUSE: u32 = 7;
pub const VERTEX_ATTR_BACK_SPECULAR: u32 = 8;
pub const VERTEX_ATTR_TEXTURE0: u32 = 9;
pub const VERTEX_ATTR_TEXTURE1: u32 = 10;
pub const VERTEX_ATTR_TEXTURE2: u32 = 11;
pub const VERTEX_ATTR_TEXTURE3: u32 = 12;
pub const VERTEX_ATTR_13: u32 = 13;
pub const VERTEX_ATTR_14: u32 = 14;
pub const VERTEX_ATTR_15: u32 = 15;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask;

    #[test]
    fn per_instance_addressing() {
        assert_eq!(set_texture(0, SET_TEXTURE_OFFSET), 0x1B00);
        assert_eq!(set_texture(3, SET_TEXTURE_OFFSET), 0x1BC0);
        assert_eq!(set_light(2, SET_LIGHT_AMBIENT_COLOR), 0x1100);
        assert_eq!(set_back_light(2, SET_BACK_LIGHT_DIFFUSE_COLOR), 0x0C8C);
    }

    #[test]
    fn light_mode_bits() {
        assert_eq!(light_mode(0, LIGHT_MODE_SPOT), 0x3);
        assert_eq!(light_mode(3, LIGHT_MODE_INFINITE), 0x40);
        assert_eq!(light_mode(7, LIGHT_MODE_LOCAL), 0x8000);
    }

    #[test]
    fn draw_arrays_field_packing() {
        // 255-vertex chunk starting at index 510.
        let word = mask(DRAW_ARRAYS_COUNT, 254) | mask(DRAW_ARRAYS_START_INDEX, 510);
        assert_eq!(word, 0xFE00_01FE);
    }

    #[test]
    fn surface_format_packing() {
        let word = mask(SET_SURFACE_FORMAT_COLOR, SET_SURFACE_FORMAT_COLOR_LE_A8R8G8B8)
            | mask(SET_SURFACE_FORMAT_ZETA, SET_SURFACE_FORMAT_ZETA_Z24S8)
            | mask(SET_SURFACE_FORMAT_TYPE, SET_SURFACE_FORMAT_TYPE_PITCH);
        assert_eq!(word, 0x0000_0128);
    }
}
