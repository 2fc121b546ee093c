//! PGRAPH state tracker and draw orchestrator.
//!
//! [`PgraphContext`] owns the pushbuffer and every piece of tracked render
//! state: surface configuration, the four texture units and their memory
//! arena, fixed-function transforms, combiner snapshot words, the bound
//! vertex buffer and the bound vertex program. Draw submission comes in four
//! mutually exclusive strategies over the same bound buffer (indexed-range
//! arrays, immediate per-field commands, packed inline arrays, and explicit
//! 16/32-bit element lists), each with its own throughput and FIFO-pressure
//! tradeoffs.
//!
//! Precondition violations reject the operation before any command word is
//! emitted; previously committed GPU state is never left half-written.

use std::cell::RefCell;
use std::mem::offset_of;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use nv2a_regs::{mask, nv097};
use tracing::debug;

use crate::arena::{TextureArena, TEXTURE_UNITS};
use crate::combiner::{
    encode_color_output_word, encode_combiner_control, encode_final_combiner0,
    encode_final_combiner1, encode_input_word, encode_output_word, pack_bgra, ChannelInput,
    CombinerDest, CombinerOutOp, FinalChannelInput, FinalCombinerState, SumMuxMode,
};
use crate::error::PgraphError;
use crate::light::Light;
use crate::push::{Pushbuffer, Transport};
use crate::surface::{max_depth_value, AntiAliasing, SurfaceColorFormat, SurfaceZetaFormat};
use crate::texture_format::TextureFormatInfo;
use crate::texture_stage::{PaletteSize, TextureStage};
use crate::vertex::{ComponentCounts, Vertex, VertexAttribute, VertexBuffer};
use crate::xform::{
    derive_defaults, DefaultMatrixParams, DefaultProfile, MatrixMode, TransformState,
};
use crate::shader::VertexProgram;

/// DMA context bound to channel A at initialization; used to retarget color
/// output at arbitrary memory.
const DMA_CHANNEL_A: u32 = 3;
/// DMA context the framebuffer color target is bound to.
const DMA_CHANNEL_COLOR: u32 = 9;

/// GPU-visible addresses wrap within the 64MiB aperture.
const VRAM_ADDR_MASK: u32 = 0x03FF_FFFF;

/// `DRAW_ARRAYS` limit: start index is 24 bits and each range covers at most
/// 255 vertices, so the last addressable vertex is 0xFFFF + 0xFF.
const MAX_ARRAY_VERTICES: u32 = 0x100FE;

/// Vertices per `DRAW_ARRAYS` range command (8-bit count field).
const VERTICES_PER_RANGE: u32 = 255;

/// Inline-buffer draws flush the FIFO every this many vertices to bound
/// memory pressure during long iterations.
const INLINE_FLUSH_INTERVAL: usize = 0x1000;

/// Hardware begin/end primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DrawPrimitive {
    Points = nv097::SET_BEGIN_END_OP_POINTS,
    Lines = nv097::SET_BEGIN_END_OP_LINES,
    LineLoop = nv097::SET_BEGIN_END_OP_LINE_LOOP,
    LineStrip = nv097::SET_BEGIN_END_OP_LINE_STRIP,
    Triangles = nv097::SET_BEGIN_END_OP_TRIANGLES,
    TriangleStrip = nv097::SET_BEGIN_END_OP_TRIANGLE_STRIP,
    TriangleFan = nv097::SET_BEGIN_END_OP_TRIANGLE_FAN,
    Quads = nv097::SET_BEGIN_END_OP_QUADS,
    QuadStrip = nv097::SET_BEGIN_END_OP_QUAD_STRIP,
    Polygon = nv097::SET_BEGIN_END_OP_POLYGON,
}

impl DrawPrimitive {
    pub fn name(self) -> &'static str {
        match self {
            Self::Points => "Points",
            Self::Lines => "Lines",
            Self::LineLoop => "LineLoop",
            Self::LineStrip => "LineStrip",
            Self::Triangles => "Triangles",
            Self::TriangleStrip => "TriStrip",
            Self::TriangleFan => "TriFan",
            Self::Quads => "Quads",
            Self::QuadStrip => "QuadStrip",
            Self::Polygon => "Polygon",
        }
    }
}

/// Texture sampling modes for the four shader stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ShaderStage {
    #[default]
    None = 0,
    TwoDProjective = 1,
    ThreeDProjective = 2,
    CubeMap = 3,
    PassThrough = 4,
    ClipPlane = 5,
    BumpEnvMap = 6,
    BumpEnvMapLuminance = 7,
    Brdf = 8,
    DotSt = 9,
    DotZw = 10,
    DotReflectDiffuse = 11,
    DotReflectSpecular = 12,
    DotStr3d = 13,
    DotStrCube = 14,
    DependentAr = 15,
    DependentGb = 16,
    DotProduct = 17,
    DotReflectSpecularConst = 18,
}

/// One-time construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub max_texture_width: u32,
    pub max_texture_height: u32,
    pub max_texture_depth: u32,
    /// GPU-visible base of the texture arena.
    pub texture_memory_base: u32,
    /// GPU-visible base of vertex buffer storage.
    pub vertex_memory_base: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            framebuffer_width: 640,
            framebuffer_height: 480,
            max_texture_width: 256,
            max_texture_height: 256,
            max_texture_depth: 4,
            texture_memory_base: 0x0040_0000,
            vertex_memory_base: 0x00C0_0000,
        }
    }
}

/// State tracker for one PGRAPH channel.
pub struct PgraphContext {
    pb: Pushbuffer,
    config: ContextConfig,

    arena: TextureArena,
    stages: [TextureStage; TEXTURE_UNITS],

    surface_color_format: SurfaceColorFormat,
    depth_format: SurfaceZetaFormat,
    depth_float_mode: bool,
    surface_swizzle: bool,
    surface_width: u32,
    surface_height: u32,
    clip_x: u32,
    clip_y: u32,
    clip_width: u32,
    clip_height: u32,
    antialiasing: AntiAliasing,

    transforms: TransformState,

    stride_overrides: [Option<u32>; 16],
    clip_plane_modes: [u32; TEXTURE_UNITS],
    final_combiner: FinalCombinerState,

    vertex_buffer: Option<Rc<RefCell<VertexBuffer>>>,
    vertex_program: Option<Rc<dyn VertexProgram>>,
    vertex_alloc_next: u32,

    /// Color format to restore after render-to-surface redirection.
    framebuffer_color_format: SurfaceColorFormat,
}

impl PgraphContext {
    pub fn new(transport: Box<dyn Transport>, config: ContextConfig) -> Self {
        let arena = TextureArena::new(
            config.max_texture_width,
            config.max_texture_height,
            config.max_texture_depth,
        );
        let stages = std::array::from_fn(|unit| {
            let mut stage = TextureStage::new(
                unit as u32,
                arena.texture_offset(unit) as u32,
                arena.palette_offset(unit) as u32,
            );
            stage.set_texture_dimensions(config.max_texture_width, config.max_texture_height);
            stage.set_image_dimensions(config.max_texture_width, config.max_texture_height);
            stage
        });

        let mut ctx = Self {
            pb: Pushbuffer::new(transport),
            config,
            arena,
            stages,
            surface_color_format: SurfaceColorFormat::A8R8G8B8,
            depth_format: SurfaceZetaFormat::Z24S8,
            depth_float_mode: false,
            surface_swizzle: false,
            surface_width: config.framebuffer_width,
            surface_height: config.framebuffer_height,
            clip_x: 0,
            clip_y: 0,
            clip_width: 0,
            clip_height: 0,
            antialiasing: AntiAliasing::Center1,
            transforms: TransformState::default(),
            stride_overrides: [None; 16],
            clip_plane_modes: [0; TEXTURE_UNITS],
            final_combiner: FinalCombinerState::default(),
            vertex_buffer: None,
            vertex_program: None,
            vertex_alloc_next: config.vertex_memory_base,
            framebuffer_color_format: SurfaceColorFormat::A8R8G8B8,
        };
        ctx.set_surface_format(
            SurfaceColorFormat::A8R8G8B8,
            SurfaceZetaFormat::Z24S8,
            config.framebuffer_width,
            config.framebuffer_height,
            false,
            0,
            0,
            0,
            0,
            AntiAliasing::Center1,
        );
        ctx
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn framebuffer_width(&self) -> u32 {
        self.config.framebuffer_width
    }

    pub fn framebuffer_height(&self) -> u32 {
        self.config.framebuffer_height
    }

    /// Direct access to the pushbuffer, for collaborators (vertex programs,
    /// lights) that emit their own register blocks.
    pub fn pushbuffer(&mut self) -> &mut Pushbuffer {
        &mut self.pb
    }

    pub fn transforms(&self) -> &TransformState {
        &self.transforms
    }

    // --- Surface configuration ---------------------------------------------

    /// Records the surface configuration without committing it. With
    /// swizzled surfaces, width and height must be powers of two; with
    /// pitched surfaces they become the clip dimensions.
    #[allow(clippy::too_many_arguments)]
    pub fn set_surface_format(
        &mut self,
        color: SurfaceColorFormat,
        zeta: SurfaceZetaFormat,
        width: u32,
        height: u32,
        swizzle: bool,
        clip_x: u32,
        clip_y: u32,
        clip_width: u32,
        clip_height: u32,
        aa: AntiAliasing,
    ) {
        self.surface_color_format = color;
        self.depth_format = zeta;
        self.surface_swizzle = swizzle;
        self.surface_width = width;
        self.surface_height = height;
        self.clip_x = clip_x;
        self.clip_y = clip_y;
        self.clip_width = clip_width;
        self.clip_height = clip_height;
        self.antialiasing = aa;

        self.handle_depth_format_change();
    }

    /// Records the surface configuration and commits it immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn set_surface_format_immediate(
        &mut self,
        color: SurfaceColorFormat,
        zeta: SurfaceZetaFormat,
        width: u32,
        height: u32,
        swizzle: bool,
        clip_x: u32,
        clip_y: u32,
        clip_width: u32,
        clip_height: u32,
        aa: AntiAliasing,
    ) {
        self.set_surface_format(
            color, zeta, width, height, swizzle, clip_x, clip_y, clip_width, clip_height, aa,
        );
        self.commit_surface_format();
    }

    pub fn surface_color_format(&self) -> SurfaceColorFormat {
        self.surface_color_format
    }

    pub fn depth_format(&self) -> SurfaceZetaFormat {
        self.depth_format
    }

    pub fn depth_float_mode(&self) -> bool {
        self.depth_float_mode
    }

    /// Switches the depth buffer between fixed-point and floating-point
    /// interpretation, re-deriving default matrices when applicable.
    pub fn set_depth_float_mode(&mut self, enabled: bool) {
        if enabled == self.depth_float_mode {
            return;
        }
        self.depth_float_mode = enabled;
        self.handle_depth_format_change();
    }

    /// Maximum storable value for the current depth format and mode.
    pub fn max_depth_value(&self) -> f32 {
        max_depth_value(self.depth_format, self.depth_float_mode)
    }

    /// Emits the surface format block and re-derives the depth clip range.
    pub fn commit_surface_format(&mut self) {
        let mut value = mask(nv097::SET_SURFACE_FORMAT_COLOR, self.surface_color_format as u32)
            | mask(nv097::SET_SURFACE_FORMAT_ZETA, self.depth_format as u32)
            | mask(nv097::SET_SURFACE_FORMAT_ANTI_ALIASING, self.antialiasing as u32)
            | mask(
                nv097::SET_SURFACE_FORMAT_TYPE,
                if self.surface_swizzle {
                    nv097::SET_SURFACE_FORMAT_TYPE_SWIZZLE
                } else {
                    nv097::SET_SURFACE_FORMAT_TYPE_PITCH
                },
            );
        if self.surface_swizzle {
            value |= mask(nv097::SET_SURFACE_FORMAT_WIDTH, log2(self.surface_width));
            value |= mask(nv097::SET_SURFACE_FORMAT_HEIGHT, log2(self.surface_height));
        }

        self.pb.begin();
        self.pb.push(nv097::SET_SURFACE_FORMAT, &[value]);
        if !self.surface_swizzle {
            let width = if self.clip_width != 0 {
                self.clip_width
            } else {
                self.surface_width
            };
            let height = if self.clip_height != 0 {
                self.clip_height
            } else {
                self.surface_height
            };
            self.pb.push(
                nv097::SET_SURFACE_CLIP_HORIZONTAL,
                &[(width << 16) + self.clip_x],
            );
            self.pb.push(
                nv097::SET_SURFACE_CLIP_VERTICAL,
                &[(height << 16) + self.clip_y],
            );
        }
        self.pb.end();

        let max_depth = self.max_depth_value();
        self.set_depth_clip(0.0, max_depth);
    }

    /// Sets the depth clipping range.
    pub fn set_depth_clip(&mut self, min: f32, max: f32) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_CLIP_MIN, &[min]);
        self.pb.push_f(nv097::SET_CLIP_MAX, &[max]);
        self.pb.end();
    }

    // --- control0 and clears ------------------------------------------------

    /// Emits `control0`: stencil writability, depth numeric format, W
    /// buffering, texture perspective correction and the colorspace
    /// conversion flag required by unit 0's format.
    pub fn setup_control0(
        &mut self,
        stencil_write: bool,
        w_buffered: bool,
        texture_perspective: bool,
    ) {
        let mut control0 = if stencil_write {
            nv097::SET_CONTROL0_STENCIL_WRITE_ENABLE
        } else {
            0
        };
        control0 |= if self.depth_float_mode {
            nv097::SET_CONTROL0_Z_FORMAT_FLOAT
        } else {
            nv097::SET_CONTROL0_Z_FORMAT_FIXED
        };
        if w_buffered {
            control0 |= nv097::SET_CONTROL0_Z_PERSPECTIVE_ENABLE;
        }
        if texture_perspective {
            control0 |= nv097::SET_CONTROL0_TEXTURE_PERSPECTIVE_ENABLE;
        }
        if self.stages[0].requires_colorspace_conversion() {
            control0 |= mask(
                nv097::SET_CONTROL0_COLOR_SPACE_CONVERT,
                nv097::SET_CONTROL0_COLOR_SPACE_CONVERT_CRYCB_TO_RGB,
            );
        }

        self.pb.begin();
        self.pb.push(nv097::SET_CONTROL0, &[control0]);
        self.pb.end();
    }

    fn clamp_clear_rect(&self, left: u32, top: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let width = if width == 0 || width > self.config.framebuffer_width {
            self.config.framebuffer_width
        } else {
            width
        };
        let height = if height == 0 || height > self.config.framebuffer_height {
            self.config.framebuffer_height
        } else {
            height
        };
        (left, top, width, height)
    }

    fn emit_clear(&mut self, left: u32, top: u32, width: u32, height: u32, flags: u32) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_CLEAR_RECT_HORIZONTAL,
            &[((left + width - 1) << 16) | left],
        );
        self.pb.push(
            nv097::SET_CLEAR_RECT_VERTICAL,
            &[((top + height - 1) << 16) | top],
        );
        self.pb.push(nv097::CLEAR_SURFACE, &[flags]);
        self.pb.end();
    }

    /// Fills a rectangle of the color surface. Zero or oversized extents
    /// select the full framebuffer.
    pub fn clear_color_region(&mut self, argb: u32, left: u32, top: u32, width: u32, height: u32) {
        let (left, top, width, height) = self.clamp_clear_rect(left, top, width, height);
        self.pb.begin();
        self.pb.push(nv097::SET_COLOR_CLEAR_VALUE, &[argb]);
        self.pb.end();
        self.emit_clear(left, top, width, height, nv097::CLEAR_SURFACE_COLOR);
    }

    /// Fills a rectangle of the depth/stencil surface.
    pub fn clear_depth_stencil_region(
        &mut self,
        depth: u32,
        stencil: u8,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) {
        let (left, top, width, height) = self.clamp_clear_rect(left, top, width, height);
        let (value, flags) = match self.depth_format {
            SurfaceZetaFormat::Z16 => (depth & 0xFFFF, nv097::CLEAR_SURFACE_Z),
            SurfaceZetaFormat::Z24S8 => (
                (depth << 8) | stencil as u32,
                nv097::CLEAR_SURFACE_Z | nv097::CLEAR_SURFACE_STENCIL,
            ),
        };
        self.pb.begin();
        self.pb.push(nv097::SET_ZSTENCIL_CLEAR_VALUE, &[value]);
        self.pb.end();
        self.emit_clear(left, top, width, height, flags);
    }

    /// Clears the full color and depth/stencil surfaces.
    pub fn clear(&mut self, argb: u32, depth: u32, stencil: u8) {
        self.setup_control0(true, false, true);
        self.clear_color_region(argb, 0, 0, 0, 0);
        self.clear_depth_stencil_region(depth, stencil, 0, 0, 0, 0);
    }

    // --- Frame sequencing ---------------------------------------------------

    /// Emits an idle-wait and blocks until the GPU has consumed everything.
    pub fn wait_for_gpu_idle(&mut self) -> Result<(), PgraphError> {
        self.pb.begin();
        self.pb.push(nv097::NO_OPERATION, &[0]);
        self.pb.push(nv097::WAIT_FOR_IDLE, &[0]);
        self.pb.end();
        self.pb.flush()?;
        Ok(())
    }

    /// Per-frame setup: waits for the vertical blank, flushes the FIFO,
    /// commits texture and surface state, clears, runs the bound program's
    /// pre-draw hook and waits for idle. The ordering is deliberate: the
    /// clears must observe the committed surface format, and the idle wait
    /// keeps the caller's subsequent draws from racing the clear.
    pub fn prepare_draw(&mut self, argb: u32, depth: u32, stencil: u8) -> Result<(), PgraphError> {
        self.pb.wait_vblank()?;
        self.pb.flush()?;

        self.commit_texture_stages();
        self.commit_surface_format();
        self.clear(argb, depth, stencil);

        if let Some(program) = self.vertex_program.clone() {
            program.prepare_draw(&mut self.pb);
        }

        self.wait_for_gpu_idle()
    }

    /// Ends the frame: drains the FIFO and waits for the buffer swap.
    pub fn finish_draw(&mut self) -> Result<(), PgraphError> {
        self.pb.flush()?;
        self.pb.wait_swap()?;
        Ok(())
    }

    // --- Texture stages -----------------------------------------------------

    pub fn texture_stage(&self, unit: usize) -> &TextureStage {
        &self.stages[unit]
    }

    pub fn texture_stage_mut(&mut self, unit: usize) -> &mut TextureStage {
        &mut self.stages[unit]
    }

    pub fn set_texture_format(&mut self, format: TextureFormatInfo, unit: usize) {
        self.stages[unit].set_format(format);
    }

    pub fn set_texture_stage_enabled(&mut self, unit: usize, enabled: bool) {
        self.stages[unit].set_enabled(enabled);
    }

    /// Disables all four texture units and their shader stages.
    pub fn disable_texture_stages(&mut self) {
        for stage in &mut self.stages {
            stage.set_enabled(false);
        }
        self.set_shader_stage_program(
            ShaderStage::None,
            ShaderStage::None,
            ShaderStage::None,
            ShaderStage::None,
        );
    }

    /// Restores a unit's default sampling parameters and dimensions.
    pub fn set_default_texture_params(&mut self, unit: usize) {
        let stage = &mut self.stages[unit];
        stage.reset();
        stage.set_texture_dimensions(self.config.max_texture_width, self.config.max_texture_height);
        stage.set_image_dimensions(self.config.max_texture_width, self.config.max_texture_height);
    }

    /// Copies raw texel data into a unit's arena region. Fails without
    /// copying when the image exceeds the region.
    #[allow(clippy::too_many_arguments)]
    pub fn set_raw_texture(
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
        self.stages[unit].set_raw_texture(
            &mut self.arena,
            data,
            width,
            height,
            depth,
            pitch,
            bytes_per_pixel,
            swizzle,
        )
    }

    /// Copies palette entries into a unit's palette region.
    pub fn set_palette(
        &mut self,
        unit: usize,
        entries: &[u32],
        size: PaletteSize,
    ) -> Result<(), PgraphError> {
        self.stages[unit].set_palette(&mut self.arena, entries, size)
    }

    /// Largest single texture any one unit can hold.
    pub fn max_single_texture_size(&self) -> usize {
        self.arena.region_len()
    }

    pub fn texture_arena(&self) -> &TextureArena {
        &self.arena
    }

    /// Commits every unit's register block. Called from `prepare_draw`, but
    /// useful on its own for scenes with multiple draws per clear.
    pub fn commit_texture_stages(&mut self) {
        let texture_base = self.config.texture_memory_base;
        let palette_base = self.config.texture_memory_base + self.arena.texture_len() as u32;
        for stage in &self.stages {
            stage.commit(&mut self.pb, texture_base, palette_base);
        }
    }

    // --- Shader stage selection --------------------------------------------

    /// Selects the texture sampling mode for each of the four shader stages.
    pub fn set_shader_stage_program(
        &mut self,
        s0: ShaderStage,
        s1: ShaderStage,
        s2: ShaderStage,
        s3: ShaderStage,
    ) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_SHADER_STAGE_PROGRAM,
            &[mask(nv097::SET_SHADER_STAGE_PROGRAM_STAGE0, s0 as u32)
                | mask(nv097::SET_SHADER_STAGE_PROGRAM_STAGE1, s1 as u32)
                | mask(nv097::SET_SHADER_STAGE_PROGRAM_STAGE2, s2 as u32)
                | mask(nv097::SET_SHADER_STAGE_PROGRAM_STAGE3, s3 as u32)],
        );
        self.pb.end();
    }

    /// Routes the outputs feeding shader stages 2 and 3 (0-based stage
    /// indices of the producing stage).
    pub fn set_shader_stage_input(&mut self, stage2_input: u32, stage3_input: u32) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_SHADER_OTHER_STAGE_INPUT,
            &[mask(nv097::SET_SHADER_OTHER_STAGE_INPUT_STAGE1, 0)
                | mask(nv097::SET_SHADER_OTHER_STAGE_INPUT_STAGE2, stage2_input)
                | mask(nv097::SET_SHADER_OTHER_STAGE_INPUT_STAGE3, stage3_input)],
        );
        self.pb.end();
    }

    /// Sets a unit's clip-plane comparator signs. The packed mode word is
    /// cached and only re-emitted when a sign actually changes.
    pub fn set_shader_clip_plane_comparator(
        &mut self,
        unit: usize,
        s_ge_zero: bool,
        t_ge_zero: bool,
        r_ge_zero: bool,
        q_ge_zero: bool,
    ) {
        let mode = s_ge_zero as u32
            | (t_ge_zero as u32) << 1
            | (r_ge_zero as u32) << 2
            | (q_ge_zero as u32) << 3;
        if self.clip_plane_modes[unit] == mode {
            return;
        }
        self.clip_plane_modes[unit] = mode;

        let packed = self.clip_plane_modes[0]
            | self.clip_plane_modes[1] << 4
            | self.clip_plane_modes[2] << 8
            | self.clip_plane_modes[3] << 12;
        self.pb.begin();
        self.pb.push(nv097::SET_SHADER_CLIP_PLANE_MODE, &[packed]);
        self.pb.end();
    }

    // --- Lighting -----------------------------------------------------------

    /// Emits one light's register block. Local-light positions are
    /// transformed by the current model-view matrix; `look_direction` feeds
    /// the half-vector derivation of directional lights.
    pub fn commit_light(&mut self, light: &Light, look_direction: Vec3) -> Result<(), PgraphError> {
        let model_view = *self.transforms.model_view();
        light.commit(&mut self.pb, &model_view, look_direction)
    }

    /// Writes the packed per-light mode mask and the master lighting toggle.
    pub fn set_light_enable_mask(&mut self, mask_bits: u32) {
        self.pb.begin();
        self.pb
            .push(nv097::SET_LIGHTING_ENABLE, &[(mask_bits != 0) as u32]);
        self.pb.push(nv097::SET_LIGHT_ENABLE_MASK, &[mask_bits]);
        self.pb.end();
    }

    // --- Render state helpers ----------------------------------------------

    /// Enables writes for the given color channels.
    pub fn set_color_mask(&mut self, mask_bits: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_COLOR_MASK, &[mask_bits]);
        self.pb.end();
    }

    /// Configures alpha blending. Equation and factors are only emitted when
    /// blending is enabled.
    pub fn set_blend(&mut self, enable: bool, equation: u32, sfactor: u32, dfactor: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_BLEND_ENABLE, &[enable as u32]);
        if enable {
            self.pb.push(nv097::SET_BLEND_EQUATION, &[equation]);
            self.pb.push(nv097::SET_BLEND_FUNC_SFACTOR, &[sfactor]);
            self.pb.push(nv097::SET_BLEND_FUNC_DFACTOR, &[dfactor]);
        }
        self.pb.end();
    }

    /// Standard src-alpha over blending, or blending off.
    pub fn set_blend_enabled(&mut self, enable: bool) {
        self.set_blend(
            enable,
            nv097::SET_BLEND_EQUATION_V_FUNC_ADD,
            nv097::SET_BLEND_FUNC_SFACTOR_V_SRC_ALPHA,
            nv097::SET_BLEND_FUNC_DFACTOR_V_ONE_MINUS_SRC_ALPHA,
        );
    }

    /// Constant color used by the constant-color/alpha blend factors.
    pub fn set_blend_color(&mut self, color: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_BLEND_COLOR, &[color]);
        self.pb.end();
    }

    /// Reference value for the alpha test.
    pub fn set_alpha_reference(&mut self, alpha: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_ALPHA_REF, &[alpha]);
        self.pb.end();
    }

    /// Enables the alpha test with the given comparison function.
    pub fn set_alpha_func(&mut self, enable: bool, func: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_ALPHA_TEST_ENABLE, &[enable as u32]);
        self.pb.push(nv097::SET_ALPHA_FUNC, &[func]);
        self.pb.end();
    }

    // --- Combiners ----------------------------------------------------------

    /// Configures the number of active combiner stages and the factor/mux
    /// sharing flags.
    pub fn set_combiner_control(
        &mut self,
        stage_count: u32,
        same_factor0: bool,
        same_factor1: bool,
        mux_msb: bool,
    ) -> Result<(), PgraphError> {
        let word = encode_combiner_control(stage_count, same_factor0, same_factor1, mux_msb)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_CONTROL, &[word]);
        self.pb.end();
        Ok(())
    }

    fn check_combiner_stage(stage: u32) -> Result<(), PgraphError> {
        if stage >= crate::combiner::COMBINER_STAGES {
            return Err(PgraphError::InvalidCombinerStage(stage));
        }
        Ok(())
    }

    /// Wires one color-pipe stage's A/B/C/D inputs.
    pub fn set_input_color_combiner(
        &mut self,
        stage: u32,
        a: ChannelInput,
        b: ChannelInput,
        c: ChannelInput,
        d: ChannelInput,
    ) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        let word = encode_input_word(a, b, c, d);
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_ICW + stage * 4, &[word]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_input_color_combiner(&mut self, stage: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_ICW + stage * 4, &[0]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_input_color_combiners(&mut self) {
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_ICW, &[0, 0, 0, 0]);
        self.pb.push(nv097::SET_COMBINER_COLOR_ICW + 0x0C, &[0, 0, 0, 0]);
        self.pb.end();
    }

    /// Wires one alpha-pipe stage's A/B/C/D inputs.
    pub fn set_input_alpha_combiner(
        &mut self,
        stage: u32,
        a: ChannelInput,
        b: ChannelInput,
        c: ChannelInput,
        d: ChannelInput,
    ) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        let word = encode_input_word(a, b, c, d);
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_ICW + stage * 4, &[word]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_input_alpha_combiner(&mut self, stage: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_ICW + stage * 4, &[0]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_input_alpha_combiners(&mut self) {
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_ICW, &[0, 0, 0, 0]);
        self.pb.push(nv097::SET_COMBINER_ALPHA_ICW + 0x0C, &[0, 0, 0, 0]);
        self.pb.end();
    }

    /// Routes one color-pipe stage's outputs.
    #[allow(clippy::too_many_arguments)]
    pub fn set_output_color_combiner(
        &mut self,
        stage: u32,
        ab_dst: CombinerDest,
        cd_dst: CombinerDest,
        sum_dst: CombinerDest,
        ab_dot: bool,
        cd_dot: bool,
        sum_or_mux: SumMuxMode,
        op: CombinerOutOp,
        alpha_from_ab_blue: bool,
        alpha_from_cd_blue: bool,
    ) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        let word = encode_color_output_word(
            ab_dst,
            cd_dst,
            sum_dst,
            ab_dot,
            cd_dot,
            sum_or_mux,
            op,
            alpha_from_ab_blue,
            alpha_from_cd_blue,
        );
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_OCW + stage * 4, &[word]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_output_color_combiner(&mut self, stage: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_OCW + stage * 4, &[0]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_output_color_combiners(&mut self) {
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_COLOR_OCW, &[0, 0, 0, 0]);
        self.pb.push(nv097::SET_COMBINER_COLOR_OCW + 0x0C, &[0, 0, 0, 0]);
        self.pb.end();
    }

    /// Routes one alpha-pipe stage's outputs.
    #[allow(clippy::too_many_arguments)]
    pub fn set_output_alpha_combiner(
        &mut self,
        stage: u32,
        ab_dst: CombinerDest,
        cd_dst: CombinerDest,
        sum_dst: CombinerDest,
        ab_dot: bool,
        cd_dot: bool,
        sum_or_mux: SumMuxMode,
        op: CombinerOutOp,
    ) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        let word = encode_output_word(ab_dst, cd_dst, sum_dst, ab_dot, cd_dot, sum_or_mux, op);
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_OCW + stage * 4, &[word]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_output_alpha_combiner(&mut self, stage: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_OCW + stage * 4, &[0]);
        self.pb.end();
        Ok(())
    }

    pub fn clear_output_alpha_combiners(&mut self) {
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_ALPHA_OCW, &[0, 0, 0, 0]);
        self.pb.push(nv097::SET_COMBINER_ALPHA_OCW + 0x0C, &[0, 0, 0, 0]);
        self.pb.end();
    }

    /// Configures final combiner word 0 (channels A..D).
    pub fn set_final_combiner0(
        &mut self,
        a: FinalChannelInput,
        b: FinalChannelInput,
        c: FinalChannelInput,
        d: FinalChannelInput,
    ) {
        let word = encode_final_combiner0(a, b, c, d);
        self.final_combiner.cw0 = word;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_SPECULAR_FOG_CW0, &[word]);
        self.pb.end();
    }

    /// Word 0 with only the D channel wired.
    pub fn set_final_combiner0_just(&mut self, d: FinalChannelInput) {
        self.set_final_combiner0(
            FinalChannelInput::zero(),
            FinalChannelInput::zero(),
            FinalChannelInput::zero(),
            d,
        );
    }

    /// Configures final combiner word 1 (channels E..G plus specular-sum
    /// flags). The specular+R0 sum source is rejected here.
    pub fn set_final_combiner1(
        &mut self,
        e: FinalChannelInput,
        f: FinalChannelInput,
        g: FinalChannelInput,
        specular_add_invert_r0: bool,
        specular_add_invert_v1: bool,
        specular_clamp: bool,
    ) -> Result<(), PgraphError> {
        let word = encode_final_combiner1(
            e,
            f,
            g,
            specular_add_invert_r0,
            specular_add_invert_v1,
            specular_clamp,
        )?;
        self.final_combiner.cw1 = word;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_SPECULAR_FOG_CW1, &[word]);
        self.pb.end();
        Ok(())
    }

    /// Word 1 with only the G channel wired.
    pub fn set_final_combiner1_just(&mut self, g: FinalChannelInput) -> Result<(), PgraphError> {
        self.set_final_combiner1(
            FinalChannelInput::zero(),
            FinalChannelInput::zero(),
            g,
            false,
            false,
            false,
        )
    }

    /// Snapshot of the final combiner words, restorable bit-identically.
    pub fn final_combiner_state(&self) -> FinalCombinerState {
        self.final_combiner
    }

    /// Re-emits a snapshot taken by [`Self::final_combiner_state`].
    pub fn restore_final_combiner_state(&mut self, state: FinalCombinerState) {
        self.final_combiner = state;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_SPECULAR_FOG_CW0, &[state.cw0]);
        self.pb.push(nv097::SET_COMBINER_SPECULAR_FOG_CW1, &[state.cw1]);
        self.pb.end();
    }

    /// Per-stage combiner constant 0.
    pub fn set_combiner_factor0(&mut self, stage: u32, value: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_FACTOR0 + stage * 4, &[value]);
        self.pb.end();
        Ok(())
    }

    pub fn set_combiner_factor0_rgba(
        &mut self,
        stage: u32,
        rgba: [f32; 4],
    ) -> Result<(), PgraphError> {
        self.set_combiner_factor0(stage, pack_bgra(rgba))
    }

    /// Per-stage combiner constant 1.
    pub fn set_combiner_factor1(&mut self, stage: u32, value: u32) -> Result<(), PgraphError> {
        Self::check_combiner_stage(stage)?;
        self.pb.begin();
        self.pb.push(nv097::SET_COMBINER_FACTOR1 + stage * 4, &[value]);
        self.pb.end();
        Ok(())
    }

    pub fn set_combiner_factor1_rgba(
        &mut self,
        stage: u32,
        rgba: [f32; 4],
    ) -> Result<(), PgraphError> {
        self.set_combiner_factor1(stage, pack_bgra(rgba))
    }

    /// Final combiner constant 0.
    pub fn set_final_combiner_factor0(&mut self, value: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_SPECULAR_FOG_FACTOR, &[value]);
        self.pb.end();
    }

    /// Final combiner constant 1.
    pub fn set_final_combiner_factor1(&mut self, value: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_SPECULAR_FOG_FACTOR + 4, &[value]);
        self.pb.end();
    }

    // --- Transforms and viewport -------------------------------------------

    /// Supplies a user model-view matrix; emits it with its inverse, then
    /// recomputes and re-emits the composite.
    pub fn set_model_view_matrix(&mut self, m: Mat4) {
        self.transforms.set_model_view(m);
        self.emit_model_view();
        self.emit_composite();
    }

    /// Supplies a user projection matrix; recomputes and re-emits the
    /// composite and the W range.
    pub fn set_projection_matrix(&mut self, m: Mat4) {
        self.transforms.set_projection(m);
        self.emit_composite();
    }

    fn emit_model_view(&mut self) {
        let mv = *self.transforms.model_view();
        self.pb.begin();
        self.pb.push_matrix(nv097::SET_MODEL_VIEW_MATRIX, &mv);
        self.pb
            .push_matrix_4x3(nv097::SET_INVERSE_MODEL_VIEW_MATRIX, &mv.inverse());
        self.pb.end();
    }

    fn emit_composite(&mut self) {
        let composite = *self.transforms.composite();
        self.pb.begin();
        self.pb.push_matrix(nv097::SET_COMPOSITE_MATRIX, &composite);
        self.pb.end();
    }

    /// Loads one of the built-in viewport/matrix conventions: window clip,
    /// viewport vectors and both matrices. Stays in default mode, so later
    /// depth-format changes re-derive automatically.
    pub fn load_default_matrices(&mut self, profile: DefaultProfile) {
        let params = DefaultMatrixParams {
            framebuffer_width: self.config.framebuffer_width as f32,
            framebuffer_height: self.config.framebuffer_height as f32,
            max_depth: self.max_depth_value(),
        };
        let defaults = derive_defaults(profile, &params);

        self.set_window_clip(
            self.config.framebuffer_width,
            self.config.framebuffer_height,
            0,
            0,
            0,
        );
        self.set_viewport_offset(defaults.viewport_offset);
        self.set_viewport_scale(defaults.viewport_scale);

        self.transforms.load_defaults(profile, &defaults);
        self.emit_model_view();
        self.emit_composite();
    }

    fn handle_depth_format_change(&mut self) {
        match self.transforms.mode() {
            MatrixMode::User => {}
            MatrixMode::Default(profile) => self.load_default_matrices(profile),
        }
    }

    /// Projects a world-space point to screen coordinates on the CPU.
    pub fn project_point(&self, world: Vec3) -> Vec3 {
        self.transforms.project_point(world)
    }

    /// Unprojects a screen-space point into world space.
    pub fn unproject_point(&self, screen: Vec3) -> Vec3 {
        self.transforms.unproject_point(screen)
    }

    /// Unprojects a screen-space point onto the plane `z = world_z`.
    pub fn unproject_point_at_z(&self, screen: Vec3, world_z: f32) -> Vec3 {
        self.transforms.unproject_point_at_z(screen, world_z)
    }

    /// Toggles whether the window clip rectangles are inclusive or
    /// exclusive.
    pub fn set_window_clip_exclusive(&mut self, exclusive: bool) {
        self.pb.begin();
        self.pb
            .push(nv097::SET_WINDOW_CLIP_TYPE, &[exclusive as u32]);
        self.pb.end();
    }

    /// Sets one of the window clipping regions.
    pub fn set_window_clip(&mut self, right: u32, bottom: u32, left: u32, top: u32, region: u32) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_WINDOW_CLIP_HORIZONTAL + region * 4,
            &[left + (right << 16)],
        );
        self.pb.push(
            nv097::SET_WINDOW_CLIP_VERTICAL + region * 4,
            &[top + (bottom << 16)],
        );
        self.pb.end();
    }

    pub fn set_viewport_offset(&mut self, offset: [f32; 4]) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_VIEWPORT_OFFSET, &offset);
        self.pb.end();
    }

    pub fn set_viewport_scale(&mut self, scale: [f32; 4]) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_VIEWPORT_SCALE, &scale);
        self.pb.end();
    }

    // --- Vertex program binding --------------------------------------------

    /// Binds a vertex program, or `None` to return to the fixed-function
    /// pipeline. A bound program's `activate` hook runs once here.
    pub fn set_vertex_program(&mut self, program: Option<Rc<dyn VertexProgram>>) {
        self.vertex_program = program;
        match self.vertex_program.clone() {
            Some(program) => program.activate(&mut self.pb),
            None => {
                self.pb.begin();
                self.pb.push(
                    nv097::SET_TRANSFORM_EXECUTION_MODE,
                    &[mask(
                        nv097::SET_TRANSFORM_EXECUTION_MODE_MODE,
                        nv097::SET_TRANSFORM_EXECUTION_MODE_MODE_FIXED,
                    ) | mask(
                        nv097::SET_TRANSFORM_EXECUTION_MODE_RANGE_MODE,
                        nv097::SET_TRANSFORM_EXECUTION_MODE_RANGE_MODE_PRIV,
                    )],
                );
                self.pb.push(nv097::SET_TRANSFORM_PROGRAM_CXT_WRITE_EN, &[0]);
                self.pb.push(nv097::SET_TRANSFORM_CONSTANT_LOAD, &[0]);
                self.pb.end();
            }
        }
    }

    pub fn vertex_program(&self) -> Option<Rc<dyn VertexProgram>> {
        self.vertex_program.clone()
    }

    fn run_program_pre_draw(&mut self) {
        if let Some(program) = self.vertex_program.clone() {
            program.prepare_draw(&mut self.pb);
        }
    }

    // --- Vertex buffers ----------------------------------------------------

    /// Allocates a vertex buffer and binds it, replacing any previous
    /// binding. The returned handle is shared with the context.
    pub fn allocate_vertex_buffer(&mut self, len: u32) -> Rc<RefCell<VertexBuffer>> {
        let base = self.vertex_alloc_next;
        self.vertex_alloc_next += VertexBuffer::footprint(len);
        let buffer = Rc::new(RefCell::new(VertexBuffer::new(len, base)));
        self.vertex_buffer = Some(buffer.clone());
        buffer
    }

    pub fn set_vertex_buffer(&mut self, buffer: Rc<RefCell<VertexBuffer>>) {
        self.vertex_buffer = Some(buffer);
    }

    pub fn vertex_buffer(&self) -> Option<Rc<RefCell<VertexBuffer>>> {
        self.vertex_buffer.clone()
    }

    pub fn clear_vertex_buffer(&mut self) {
        self.vertex_buffer = None;
    }

    /// Overrides the stride used when binding an attribute slot. Stride 0 is
    /// special-cased by the hardware to broadcast the first element.
    pub fn override_vertex_attribute_stride(
        &mut self,
        attribute: VertexAttribute,
        stride: u32,
    ) -> Result<(), PgraphError> {
        let slot = attribute.slot().ok_or(PgraphError::InvalidAttribute)?;
        self.stride_overrides[slot as usize] = Some(stride);
        Ok(())
    }

    pub fn clear_vertex_attribute_stride_override(
        &mut self,
        attribute: VertexAttribute,
    ) -> Result<(), PgraphError> {
        let slot = attribute.slot().ok_or(PgraphError::InvalidAttribute)?;
        self.stride_overrides[slot as usize] = None;
        Ok(())
    }

    pub fn clear_all_vertex_attribute_stride_overrides(&mut self) {
        self.stride_overrides = [None; 16];
    }

    fn push_vertex_attribute(&mut self, slot: u32, size: u32, stride: u32, address: Option<u32>) {
        let format = mask(
            nv097::SET_VERTEX_DATA_ARRAY_FORMAT_TYPE,
            nv097::SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_F,
        ) | mask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_SIZE, size)
            | mask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_STRIDE, stride);
        self.pb.begin();
        self.pb
            .push(nv097::SET_VERTEX_DATA_ARRAY_FORMAT + slot * 4, &[format]);
        if let Some(address) = address {
            self.pb.push(
                nv097::SET_VERTEX_DATA_ARRAY_OFFSET + slot * 4,
                &[address & VRAM_ADDR_MASK],
            );
        }
        self.pb.end();
    }

    fn clear_vertex_attribute(&mut self, slot: u32) {
        // A zero-size float format is accepted for any slot, which makes it
        // the safe encoding for "nothing bound here".
        self.push_vertex_attribute(slot, 0, 0, None);
    }

    /// Binds the active buffer's fields to the hardware attribute slots.
    ///
    /// Emits the buffer's one-time cache-break command if its cache is
    /// invalid. The linear or normalized storage is selected by texture
    /// unit 0's addressing mode; slots outside `fields` are cleared.
    pub fn set_vertex_buffer_attributes(
        &mut self,
        fields: VertexAttribute,
    ) -> Result<(), PgraphError> {
        let buffer_rc = self.vertex_buffer.clone().ok_or(PgraphError::NoVertexBuffer)?;
        let mut buffer = buffer_rc.borrow_mut();

        if !buffer.is_cache_valid() {
            debug!("vertex buffer cache break");
            self.pb.begin();
            self.pb.push(nv097::BREAK_VERTEX_BUFFER_CACHE, &[0]);
            self.pb.end();
            buffer.set_cache_valid();
        }

        let linear = self.stages[0].enabled() && self.stages[0].is_linear();
        let base = buffer.storage_base(linear);
        let counts = *buffer.counts();
        drop(buffer);

        let stride_for = |overrides: &[Option<u32>; 16], slot: u32| {
            overrides[slot as usize].unwrap_or(Vertex::STRIDE)
        };

        let slots: [(VertexAttribute, u32, u32, usize); 13] = [
            (
                VertexAttribute::POSITION,
                nv097::VERTEX_ATTR_POSITION,
                counts.position,
                offset_of!(Vertex, pos),
            ),
            (
                VertexAttribute::WEIGHT,
                nv097::VERTEX_ATTR_WEIGHT,
                counts.weight,
                offset_of!(Vertex, weight),
            ),
            (
                VertexAttribute::NORMAL,
                nv097::VERTEX_ATTR_NORMAL,
                counts.normal,
                offset_of!(Vertex, normal),
            ),
            (
                VertexAttribute::DIFFUSE,
                nv097::VERTEX_ATTR_DIFFUSE,
                counts.diffuse,
                offset_of!(Vertex, diffuse),
            ),
            (
                VertexAttribute::SPECULAR,
                nv097::VERTEX_ATTR_SPECULAR,
                counts.specular,
                offset_of!(Vertex, specular),
            ),
            (
                VertexAttribute::FOG_COORD,
                nv097::VERTEX_ATTR_FOG_COORD,
                counts.fog_coord,
                offset_of!(Vertex, fog_coord),
            ),
            (
                VertexAttribute::POINT_SIZE,
                nv097::VERTEX_ATTR_POINT_SIZE,
                counts.point_size,
                offset_of!(Vertex, point_size),
            ),
            (
                VertexAttribute::BACK_DIFFUSE,
                nv097::VERTEX_ATTR_BACK_DIFFUSE,
                counts.back_diffuse,
                offset_of!(Vertex, back_diffuse),
            ),
            (
                VertexAttribute::BACK_SPECULAR,
                nv097::VERTEX_ATTR_BACK_SPECULAR,
                counts.back_specular,
                offset_of!(Vertex, back_specular),
            ),
            (
                VertexAttribute::TEXCOORD0,
                nv097::VERTEX_ATTR_TEXTURE0,
                counts.texcoord[0],
                offset_of!(Vertex, texcoord0),
            ),
            (
                VertexAttribute::TEXCOORD1,
                nv097::VERTEX_ATTR_TEXTURE1,
                counts.texcoord[1],
                offset_of!(Vertex, texcoord1),
            ),
            (
                VertexAttribute::TEXCOORD2,
                nv097::VERTEX_ATTR_TEXTURE2,
                counts.texcoord[2],
                offset_of!(Vertex, texcoord2),
            ),
            (
                VertexAttribute::TEXCOORD3,
                nv097::VERTEX_ATTR_TEXTURE3,
                counts.texcoord[3],
                offset_of!(Vertex, texcoord3),
            ),
        ];

        for (attribute, slot, size, field_offset) in slots {
            if fields.contains(attribute) {
                let stride = stride_for(&self.stride_overrides, slot);
                self.push_vertex_attribute(slot, size, stride, Some(base + field_offset as u32));
            } else {
                self.clear_vertex_attribute(slot);
            }
        }
        for slot in [nv097::VERTEX_ATTR_13, nv097::VERTEX_ATTR_14, nv097::VERTEX_ATTR_15] {
            self.clear_vertex_attribute(slot);
        }
        Ok(())
    }

    // --- Draw submission ----------------------------------------------------

    fn validate_texcoord_counts(
        fields: VertexAttribute,
        counts: &ComponentCounts,
    ) -> Result<(), PgraphError> {
        let sets = [
            (VertexAttribute::TEXCOORD0, 0),
            (VertexAttribute::TEXCOORD1, 1),
            (VertexAttribute::TEXCOORD2, 2),
            (VertexAttribute::TEXCOORD3, 3),
        ];
        for (attribute, set) in sets {
            let count = counts.texcoord[set];
            if fields.contains(attribute) && count != 2 && count != 4 {
                return Err(PgraphError::InvalidTexcoordCount { set, count });
            }
        }
        Ok(())
    }

    fn bound_buffer(&self) -> Result<Rc<RefCell<VertexBuffer>>, PgraphError> {
        self.vertex_buffer.clone().ok_or(PgraphError::NoVertexBuffer)
    }

    /// Array draw: binds attributes once, then submits the whole buffer as
    /// indexed ranges of at most 255 vertices each.
    pub fn draw_arrays(
        &mut self,
        fields: VertexAttribute,
        primitive: DrawPrimitive,
    ) -> Result<(), PgraphError> {
        let buffer_rc = self.bound_buffer()?;
        let len = buffer_rc.borrow().len();
        if len > MAX_ARRAY_VERTICES {
            return Err(PgraphError::VertexCountOverflow(len));
        }

        self.run_program_pre_draw();
        self.set_vertex_buffer_attributes(fields)?;

        debug!(primitive = primitive.name(), vertices = len, "draw arrays");

        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[primitive as u32]);
        let mut start = 0;
        while start < len {
            let count = (len - start).min(VERTICES_PER_RANGE);
            self.pb.push(
                nv097::DRAW_ARRAYS,
                &[mask(nv097::DRAW_ARRAYS_COUNT, count - 1)
                    | mask(nv097::DRAW_ARRAYS_START_INDEX, start)],
            );
            start += count;
        }
        self.pb.push(nv097::SET_BEGIN_END, &[nv097::SET_BEGIN_END_OP_END]);
        self.pb.end();
        Ok(())
    }

    /// Immediate draw: walks the buffer on the CPU, emitting one command per
    /// enabled field and the position last — setting the position is what
    /// latches a vertex, so attribute commands must precede it. Flushes the
    /// FIFO periodically to bound memory pressure.
    pub fn draw_inline_buffer(
        &mut self,
        fields: VertexAttribute,
        primitive: DrawPrimitive,
    ) -> Result<(), PgraphError> {
        let buffer_rc = self.bound_buffer()?;
        let counts = *buffer_rc.borrow().counts();
        Self::validate_texcoord_counts(fields, &counts)?;

        self.run_program_pre_draw();
        self.pb.flush()?;
        self.begin_primitive(primitive);

        let len = buffer_rc.borrow().len() as usize;
        for i in 0..len {
            if i % INLINE_FLUSH_INTERVAL == 0 {
                self.pb.flush()?;
            }
            let vertex = buffer_rc.borrow().vertices()[i];

            if fields.contains(VertexAttribute::WEIGHT) {
                self.set_weights(&vertex.weight[..counts.weight as usize]);
            }
            if fields.contains(VertexAttribute::NORMAL) {
                self.set_normal(Vec3::from_slice(&vertex.normal[..3]));
            }
            if fields.contains(VertexAttribute::DIFFUSE) {
                self.set_diffuse(Vec4::from_array(vertex.diffuse));
            }
            if fields.contains(VertexAttribute::SPECULAR) {
                self.set_specular(Vec4::from_array(vertex.specular));
            }
            if fields.contains(VertexAttribute::FOG_COORD) {
                self.set_fog_coord(vertex.fog_coord[0]);
            }
            if fields.contains(VertexAttribute::POINT_SIZE) {
                self.set_point_size(vertex.point_size[0]);
            }
            if fields.contains(VertexAttribute::BACK_DIFFUSE) {
                self.set_back_diffuse(pack_rgba(vertex.back_diffuse));
            }
            if fields.contains(VertexAttribute::BACK_SPECULAR) {
                self.set_back_specular(pack_rgba(vertex.back_specular));
            }

            let texcoords = [
                (VertexAttribute::TEXCOORD0, 0usize, vertex.texcoord0),
                (VertexAttribute::TEXCOORD1, 1, vertex.texcoord1),
                (VertexAttribute::TEXCOORD2, 2, vertex.texcoord2),
                (VertexAttribute::TEXCOORD3, 3, vertex.texcoord3),
            ];
            for (attribute, set, tc) in texcoords {
                if fields.contains(attribute) {
                    if counts.texcoord[set] == 2 {
                        self.set_texcoord(set, tc[0], tc[1]);
                    } else {
                        self.set_texcoord4(set, tc[0], tc[1], tc[2], tc[3]);
                    }
                }
            }

            if fields.contains(VertexAttribute::POSITION) {
                if counts.position == 3 {
                    self.set_vertex(Vec3::from_slice(&vertex.pos[..3]));
                } else {
                    self.set_vertex4(Vec4::from_array(vertex.pos));
                }
            }
        }

        buffer_rc.borrow_mut().set_cache_valid();
        self.end_primitive();
        Ok(())
    }

    /// Packed inline draw: binds attributes, then streams every enabled
    /// field of every vertex through `INLINE_ARRAY` in the fixed channel
    /// order position, weight, normal, diffuse, specular, fog, point size,
    /// back diffuse, back specular, texcoord0..3.
    pub fn draw_inline_array(
        &mut self,
        fields: VertexAttribute,
        primitive: DrawPrimitive,
    ) -> Result<(), PgraphError> {
        let buffer_rc = self.bound_buffer()?;
        let counts = *buffer_rc.borrow().counts();
        Self::validate_texcoord_counts(fields, &counts)?;

        self.run_program_pre_draw();
        self.set_vertex_buffer_attributes(fields)?;
        self.pb.flush()?;

        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[primitive as u32]);

        let buffer = buffer_rc.borrow();
        for vertex in buffer.vertices() {
            if fields.contains(VertexAttribute::POSITION) {
                self.pb
                    .push_f_no_inc(nv097::INLINE_ARRAY, &vertex.pos[..counts.position as usize]);
            }
            if fields.contains(VertexAttribute::WEIGHT) {
                self.pb
                    .push_f_no_inc(nv097::INLINE_ARRAY, &vertex.weight[..counts.weight as usize]);
            }
            if fields.contains(VertexAttribute::NORMAL) {
                self.pb.push_f_no_inc(nv097::INLINE_ARRAY, &vertex.normal[..3]);
            }
            if fields.contains(VertexAttribute::DIFFUSE) {
                self.pb.push_f_no_inc(nv097::INLINE_ARRAY, &vertex.diffuse);
            }
            if fields.contains(VertexAttribute::SPECULAR) {
                self.pb.push_f_no_inc(nv097::INLINE_ARRAY, &vertex.specular);
            }
            if fields.contains(VertexAttribute::FOG_COORD) {
                self.pb
                    .push_f_no_inc(nv097::INLINE_ARRAY, &vertex.fog_coord[..1]);
            }
            if fields.contains(VertexAttribute::POINT_SIZE) {
                self.pb
                    .push_f_no_inc(nv097::INLINE_ARRAY, &vertex.point_size[..1]);
            }
            if fields.contains(VertexAttribute::BACK_DIFFUSE) {
                self.pb.push_f_no_inc(nv097::INLINE_ARRAY, &vertex.back_diffuse);
            }
            if fields.contains(VertexAttribute::BACK_SPECULAR) {
                self.pb
                    .push_f_no_inc(nv097::INLINE_ARRAY, &vertex.back_specular);
            }

            let texcoords = [
                (VertexAttribute::TEXCOORD0, 0usize, &vertex.texcoord0),
                (VertexAttribute::TEXCOORD1, 1, &vertex.texcoord1),
                (VertexAttribute::TEXCOORD2, 2, &vertex.texcoord2),
                (VertexAttribute::TEXCOORD3, 3, &vertex.texcoord3),
            ];
            for (attribute, set, tc) in texcoords {
                if fields.contains(attribute) {
                    self.pb
                        .push_f_no_inc(nv097::INLINE_ARRAY, &tc[..counts.texcoord[set] as usize]);
                }
            }
        }
        drop(buffer);

        self.pb.push(nv097::SET_BEGIN_END, &[nv097::SET_BEGIN_END_OP_END]);
        self.pb.end();

        buffer_rc.borrow_mut().set_cache_valid();
        Ok(())
    }

    /// Indexed draw with 16-bit indices: two per command word, low half
    /// first; an odd trailing index goes out as a lone 32-bit element.
    pub fn draw_inline_elements_u16(
        &mut self,
        indices: &[u32],
        fields: VertexAttribute,
        primitive: DrawPrimitive,
    ) -> Result<(), PgraphError> {
        self.bound_buffer()?;
        self.run_program_pre_draw();
        self.set_vertex_buffer_attributes(fields)?;

        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[primitive as u32]);

        let mut chunks = indices.chunks_exact(2);
        for pair in &mut chunks {
            let word = (pair[0] & 0xFFFF) | (pair[1] << 16);
            self.pb.push(nv097::ARRAY_ELEMENT16, &[word]);
        }
        if let [last] = chunks.remainder() {
            self.pb.push(nv097::ARRAY_ELEMENT32, &[*last]);
        }

        self.pb.push(nv097::SET_BEGIN_END, &[nv097::SET_BEGIN_END_OP_END]);
        self.pb.end();
        Ok(())
    }

    /// Indexed draw with 32-bit indices, one per command word.
    pub fn draw_inline_elements_u32(
        &mut self,
        indices: &[u32],
        fields: VertexAttribute,
        primitive: DrawPrimitive,
    ) -> Result<(), PgraphError> {
        self.bound_buffer()?;
        self.run_program_pre_draw();
        self.set_vertex_buffer_attributes(fields)?;

        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[primitive as u32]);
        for &index in indices {
            self.pb.push(nv097::ARRAY_ELEMENT32, &[index]);
        }
        self.pb.push(nv097::SET_BEGIN_END, &[nv097::SET_BEGIN_END_OP_END]);
        self.pb.end();
        Ok(())
    }

    // --- Immediate-mode vertex commands ------------------------------------

    /// Opens an immediate-mode primitive. Vertices are latched by
    /// [`Self::set_vertex`]; [`Self::end_primitive`] triggers rendering.
    pub fn begin_primitive(&mut self, primitive: DrawPrimitive) {
        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[primitive as u32]);
        self.pb.end();
    }

    pub fn end_primitive(&mut self) {
        self.pb.begin();
        self.pb.push(nv097::SET_BEGIN_END, &[nv097::SET_BEGIN_END_OP_END]);
        self.pb.end();
    }

    /// Latches a vertex with the attributes set since the previous one.
    pub fn set_vertex(&mut self, p: Vec3) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_VERTEX3F, &[p.x, p.y, p.z]);
        self.pb.end();
    }

    pub fn set_vertex4(&mut self, p: Vec4) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_VERTEX4F, &p.to_array());
        self.pb.end();
    }

    /// Unprojects screen coordinates at the given world depth and latches
    /// the resulting vertex.
    pub fn set_screen_vertex(&mut self, x: f32, y: f32, world_z: f32) {
        let world = self.unproject_point_at_z(Vec3::new(x, y, world_z), world_z);
        self.set_vertex(world);
    }

    /// Draws a quad covering the given screen rectangle at a fixed world
    /// depth by unprojecting its corners.
    pub fn draw_screen_quad(
        &mut self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        world_z: f32,
    ) {
        self.begin_primitive(DrawPrimitive::Quads);
        self.set_screen_vertex(left, top, world_z);
        self.set_screen_vertex(right, top, world_z);
        self.set_screen_vertex(right, bottom, world_z);
        self.set_screen_vertex(left, bottom, world_z);
        self.end_primitive();
    }

    /// Sets 1 to 4 blend weights for the current vertex.
    pub fn set_weights(&mut self, weights: &[f32]) {
        let method = match weights.len() {
            1 => nv097::SET_WEIGHT1F,
            2 => nv097::SET_WEIGHT2F,
            3 => nv097::SET_WEIGHT3F,
            4 => nv097::SET_WEIGHT4F,
            n => panic!("unsupported weight count {n}"),
        };
        self.pb.begin();
        self.pb.push_f(method, weights);
        self.pb.end();
    }

    pub fn set_normal(&mut self, n: Vec3) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_NORMAL3F, &[n.x, n.y, n.z]);
        self.pb.end();
    }

    /// Packed 16-bit normal.
    pub fn set_normal_s(&mut self, x: i16, y: i16, z: i16) {
        let xy = (x as u16 as u32) | ((y as u16 as u32) << 16);
        let z0 = z as u16 as u32;
        self.pb.begin();
        self.pb.push(nv097::SET_NORMAL3S, &[xy, z0]);
        self.pb.end();
    }

    pub fn set_diffuse(&mut self, rgba: Vec4) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_DIFFUSE_COLOR4F, &rgba.to_array());
        self.pb.end();
    }

    pub fn set_diffuse_rgb(&mut self, rgb: Vec3) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_DIFFUSE_COLOR3F, &[rgb.x, rgb.y, rgb.z]);
        self.pb.end();
    }

    pub fn set_diffuse_packed(&mut self, rgba: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_DIFFUSE_COLOR4I, &[rgba]);
        self.pb.end();
    }

    pub fn set_specular(&mut self, rgba: Vec4) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_SPECULAR_COLOR4F, &rgba.to_array());
        self.pb.end();
    }

    pub fn set_specular_rgb(&mut self, rgb: Vec3) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_SPECULAR_COLOR3F, &[rgb.x, rgb.y, rgb.z]);
        self.pb.end();
    }

    pub fn set_specular_packed(&mut self, rgba: u32) {
        self.pb.begin();
        self.pb.push(nv097::SET_SPECULAR_COLOR4I, &[rgba]);
        self.pb.end();
    }

    pub fn set_fog_coord(&mut self, fog: f32) {
        self.pb.begin();
        self.pb.push_f(nv097::SET_FOG_COORD, &[fog]);
        self.pb.end();
    }

    /// Point size in pixels, converted to the hardware's 9.3 fixed point.
    pub fn set_point_size(&mut self, size: f32) {
        let fixed = ((size * 8.0) as u32).min(0x1FF);
        self.pb.begin();
        self.pb.push(nv097::SET_POINT_SIZE, &[fixed]);
        self.pb.end();
    }

    /// Back-face diffuse color. There is no dedicated command for this
    /// attribute, so it goes through the packed-byte slot data method.
    pub fn set_back_diffuse(&mut self, rgba: u32) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_VERTEX_DATA4UB + 4 * nv097::VERTEX_ATTR_BACK_DIFFUSE,
            &[rgba],
        );
        self.pb.end();
    }

    /// Back-face specular color, via the packed-byte slot data method.
    pub fn set_back_specular(&mut self, rgba: u32) {
        self.pb.begin();
        self.pb.push(
            nv097::SET_VERTEX_DATA4UB + 4 * nv097::VERTEX_ATTR_BACK_SPECULAR,
            &[rgba],
        );
        self.pb.end();
    }

    /// Two-component texcoord for the given set.
    pub fn set_texcoord(&mut self, set: usize, u: f32, v: f32) {
        const METHODS: [u32; 4] = [
            nv097::SET_TEXCOORD0_2F,
            nv097::SET_TEXCOORD1_2F,
            nv097::SET_TEXCOORD2_2F,
            nv097::SET_TEXCOORD3_2F,
        ];
        self.pb.begin();
        self.pb.push_f(METHODS[set], &[u, v]);
        self.pb.end();
    }

    /// Packed 16-bit two-component texcoord.
    pub fn set_texcoord_s(&mut self, set: usize, u: i16, v: i16) {
        const METHODS: [u32; 4] = [
            nv097::SET_TEXCOORD0_2S,
            nv097::SET_TEXCOORD1_2S,
            nv097::SET_TEXCOORD2_2S,
            nv097::SET_TEXCOORD3_2S,
        ];
        let uv = (u as u16 as u32) | ((v as u16 as u32) << 16);
        self.pb.begin();
        self.pb.push(METHODS[set], &[uv]);
        self.pb.end();
    }

    /// Four-component (projective) texcoord for the given set.
    pub fn set_texcoord4(&mut self, set: usize, s: f32, t: f32, p: f32, q: f32) {
        const METHODS: [u32; 4] = [
            nv097::SET_TEXCOORD0_4F,
            nv097::SET_TEXCOORD1_4F,
            nv097::SET_TEXCOORD2_4F,
            nv097::SET_TEXCOORD3_4F,
        ];
        self.pb.begin();
        self.pb.push_f(METHODS[set], &[s, t, p, q]);
        self.pb.end();
    }

    /// Packed 16-bit four-component texcoord.
    pub fn set_texcoord4_s(&mut self, set: usize, s: i16, t: i16, p: i16, q: i16) {
        const METHODS: [u32; 4] = [
            nv097::SET_TEXCOORD0_4S,
            nv097::SET_TEXCOORD1_4S,
            nv097::SET_TEXCOORD2_4S,
            nv097::SET_TEXCOORD3_4S,
        ];
        let st = (s as u16 as u32) | ((t as u16 as u32) << 16);
        let pq = (p as u16 as u32) | ((q as u16 as u32) << 16);
        self.pb.begin();
        self.pb.push(METHODS[set], &[st, pq]);
        self.pb.end();
    }

    // --- Render-to-surface redirection --------------------------------------

    /// Redirects color output to an arbitrary memory target. Alpha blending
    /// is force-disabled for formats without an alpha channel — the hardware
    /// faults otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn render_to_surface_start(
        &mut self,
        color_offset: u32,
        color_format: SurfaceColorFormat,
        width: u32,
        height: u32,
        swizzle: bool,
        clip_x: u32,
        clip_y: u32,
        clip_width: u32,
        clip_height: u32,
        aa: AntiAliasing,
    ) {
        let framebuffer_pitch = self.config.framebuffer_width * 4;
        let surface_pitch = color_format.pitch(width);

        debug!(
            offset = color_offset,
            width, height, "render-to-surface start"
        );

        self.pb.begin();
        self.pb.push(nv097::SET_CONTEXT_DMA_COLOR, &[DMA_CHANNEL_A]);
        self.pb.push(
            nv097::SET_SURFACE_PITCH,
            &[mask(nv097::SET_SURFACE_PITCH_COLOR, surface_pitch)
                | mask(nv097::SET_SURFACE_PITCH_ZETA, framebuffer_pitch)],
        );
        self.pb.push(
            nv097::SET_SURFACE_COLOR_OFFSET,
            &[color_offset & VRAM_ADDR_MASK],
        );
        self.pb.end();

        self.framebuffer_color_format = self.surface_color_format;

        self.set_blend_enabled(color_format.supports_alpha());

        self.set_surface_format_immediate(
            color_format,
            self.depth_format,
            width,
            height,
            swizzle,
            clip_x,
            clip_y,
            clip_width,
            clip_height,
            aa,
        );
    }

    /// Restores the framebuffer as the color target and re-enables blending.
    pub fn render_to_surface_end(&mut self) {
        let framebuffer_pitch = self.config.framebuffer_width * 4;

        self.pb.begin();
        self.pb.push(nv097::SET_CONTEXT_DMA_COLOR, &[DMA_CHANNEL_COLOR]);
        self.pb.push(nv097::SET_SURFACE_COLOR_OFFSET, &[0]);
        self.pb.push(
            nv097::SET_SURFACE_PITCH,
            &[mask(nv097::SET_SURFACE_PITCH_COLOR, framebuffer_pitch)
                | mask(nv097::SET_SURFACE_PITCH_ZETA, framebuffer_pitch)],
        );
        self.pb.end();

        self.set_surface_format_immediate(
            self.framebuffer_color_format,
            self.depth_format,
            self.config.framebuffer_width,
            self.config.framebuffer_height,
            false,
            0,
            0,
            0,
            0,
            AntiAliasing::Center1,
        );

        self.set_blend_enabled(true);
    }
}

/// Rounds like the rasterizer does: only fractions of at least 9/16 round
/// up.
pub fn nv2a_round(input: f32) -> f32 {
    let fraction = input - (input as u32) as f32;
    if fraction >= 0.5625 {
        input.ceil()
    } else {
        input.floor()
    }
}

/// Packs floating color components into the A-B-G-R byte order the packed
/// vertex color methods take (red in the low byte).
pub fn pack_rgba(rgba: [f32; 4]) -> u32 {
    let channel = |v: f32| (v * 255.0) as u32;
    channel(rgba[3]) << 24 | channel(rgba[2]) << 16 | channel(rgba[1]) << 8 | channel(rgba[0])
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

    #[test]
    fn nv2a_rounding_boundary() {
        assert_eq!(nv2a_round(1.5), 1.0);
        assert_eq!(nv2a_round(1.5624), 1.0);
        assert_eq!(nv2a_round(1.5625), 2.0);
        assert_eq!(nv2a_round(2.9), 3.0);
        assert_eq!(nv2a_round(2.1), 2.0);
    }

    #[test]
    fn rgba_packing_is_red_low() {
        assert_eq!(pack_rgba([1.0, 0.0, 0.0, 0.0]), 0x0000_00FF);
        assert_eq!(pack_rgba([0.0, 0.0, 0.0, 1.0]), 0xFF00_0000);
    }

    #[test]
    fn primitive_names() {
        assert_eq!(DrawPrimitive::Triangles.name(), "Triangles");
        assert_eq!(DrawPrimitive::TriangleStrip.name(), "TriStrip");
    }
}
