//! Surface format commits, depth-clip derivation and render-to-surface
//! redirection.

use nv2a_pgraph::push::{CommandLog, RecordingTransport};
use nv2a_pgraph::{
    AntiAliasing, ContextConfig, PgraphContext, SurfaceColorFormat, SurfaceZetaFormat,
};
use nv2a_regs::{nv097, unmask};

fn new_context() -> (PgraphContext, CommandLog) {
    let (transport, log) = RecordingTransport::new();
    let ctx = PgraphContext::new(Box::new(transport), ContextConfig::default());
    log.clear();
    (ctx, log)
}

fn committed_clip_max(ctx: &mut PgraphContext, log: &CommandLog) -> u32 {
    ctx.commit_surface_format();
    log.last_write_to(nv097::SET_CLIP_MAX).expect("clip max")
}

#[test]
fn depth_clip_max_is_bit_exact_per_format_and_mode() {
    let (mut ctx, log) = new_context();

    // 24-bit fixed (the default).
    assert_eq!(
        committed_clip_max(&mut ctx, &log),
        16777215.0f32.to_bits()
    );

    // 24-bit float: the observed 1e30 pattern, not an approximation.
    ctx.set_depth_float_mode(true);
    assert_eq!(committed_clip_max(&mut ctx, &log), 0x7149_F2CA);

    // 16-bit float.
    ctx.set_surface_format(
        SurfaceColorFormat::A8R8G8B8,
        SurfaceZetaFormat::Z16,
        640,
        480,
        false,
        0,
        0,
        0,
        0,
        AntiAliasing::Center1,
    );
    assert_eq!(committed_clip_max(&mut ctx, &log), 0x43FF_F800);

    // 16-bit fixed.
    ctx.set_depth_float_mode(false);
    assert_eq!(committed_clip_max(&mut ctx, &log), 65535.0f32.to_bits());

    // The minimum is always zero.
    assert_eq!(log.last_write_to(nv097::SET_CLIP_MIN), Some(0));
}

#[test]
fn pitched_surfaces_emit_clip_rect_swizzled_emit_log2_dims() {
    let (mut ctx, log) = new_context();

    ctx.set_surface_format_immediate(
        SurfaceColorFormat::A8R8G8B8,
        SurfaceZetaFormat::Z24S8,
        640,
        480,
        false,
        8,
        4,
        320,
        240,
        AntiAliasing::Center1,
    );
    let format = log.last_write_to(nv097::SET_SURFACE_FORMAT).unwrap();
    assert_eq!(
        unmask(nv097::SET_SURFACE_FORMAT_TYPE, format),
        nv097::SET_SURFACE_FORMAT_TYPE_PITCH
    );
    assert_eq!(
        log.last_write_to(nv097::SET_SURFACE_CLIP_HORIZONTAL),
        Some((320 << 16) + 8)
    );
    assert_eq!(
        log.last_write_to(nv097::SET_SURFACE_CLIP_VERTICAL),
        Some((240 << 16) + 4)
    );

    log.clear();
    ctx.set_surface_format_immediate(
        SurfaceColorFormat::A8R8G8B8,
        SurfaceZetaFormat::Z24S8,
        256,
        128,
        true,
        0,
        0,
        0,
        0,
        AntiAliasing::Center1,
    );
    let format = log.last_write_to(nv097::SET_SURFACE_FORMAT).unwrap();
    assert_eq!(
        unmask(nv097::SET_SURFACE_FORMAT_TYPE, format),
        nv097::SET_SURFACE_FORMAT_TYPE_SWIZZLE
    );
    assert_eq!(unmask(nv097::SET_SURFACE_FORMAT_WIDTH, format), 8);
    assert_eq!(unmask(nv097::SET_SURFACE_FORMAT_HEIGHT, format), 7);
    assert!(
        log.last_write_to(nv097::SET_SURFACE_CLIP_HORIZONTAL).is_none(),
        "swizzled surfaces carry no clip rect"
    );
}

#[test]
fn clears_follow_the_depth_format() {
    let (mut ctx, log) = new_context();

    ctx.clear_depth_stencil_region(0x00FF_FFFF, 0xAB, 0, 0, 0, 0);
    assert_eq!(
        log.last_write_to(nv097::SET_ZSTENCIL_CLEAR_VALUE),
        Some((0x00FF_FFFF << 8) | 0xAB)
    );
    let flags = log.last_write_to(nv097::CLEAR_SURFACE).unwrap();
    assert_eq!(
        flags,
        nv097::CLEAR_SURFACE_Z | nv097::CLEAR_SURFACE_STENCIL
    );

    // Z16 has no stencil plane.
    ctx.set_surface_format(
        SurfaceColorFormat::A8R8G8B8,
        SurfaceZetaFormat::Z16,
        640,
        480,
        false,
        0,
        0,
        0,
        0,
        AntiAliasing::Center1,
    );
    ctx.clear_depth_stencil_region(0xFFFF, 0xAB, 0, 0, 0, 0);
    assert_eq!(
        log.last_write_to(nv097::SET_ZSTENCIL_CLEAR_VALUE),
        Some(0xFFFF)
    );
    assert_eq!(
        log.last_write_to(nv097::CLEAR_SURFACE),
        Some(nv097::CLEAR_SURFACE_Z)
    );
}

#[test]
fn clear_color_region_defaults_to_the_full_framebuffer() {
    let (mut ctx, log) = new_context();
    ctx.clear_color_region(0xFF112233, 0, 0, 0, 0);

    assert_eq!(
        log.last_write_to(nv097::SET_COLOR_CLEAR_VALUE),
        Some(0xFF112233)
    );
    assert_eq!(
        log.last_write_to(nv097::SET_CLEAR_RECT_HORIZONTAL),
        Some((639 << 16) | 0)
    );
    assert_eq!(
        log.last_write_to(nv097::SET_CLEAR_RECT_VERTICAL),
        Some((479 << 16) | 0)
    );
    assert_eq!(
        log.last_write_to(nv097::CLEAR_SURFACE),
        Some(nv097::CLEAR_SURFACE_COLOR)
    );
}

#[test]
fn render_to_surface_disables_blending_for_alphaless_formats() {
    let (mut ctx, log) = new_context();

    ctx.render_to_surface_start(
        0x0030_0000,
        SurfaceColorFormat::B8,
        128,
        128,
        false,
        0,
        0,
        0,
        0,
        AntiAliasing::Center1,
    );

    // Redirection: DMA channel A, surface pitch for the new format, offset.
    assert_eq!(log.writes_to(nv097::SET_CONTEXT_DMA_COLOR), vec![3]);
    assert_eq!(
        log.last_write_to(nv097::SET_SURFACE_COLOR_OFFSET),
        Some(0x0030_0000)
    );
    let pitch = log.last_write_to(nv097::SET_SURFACE_PITCH).unwrap();
    assert_eq!(unmask(nv097::SET_SURFACE_PITCH_COLOR, pitch), 128);
    assert_eq!(unmask(nv097::SET_SURFACE_PITCH_ZETA, pitch), 640 * 4);

    // B8 has no alpha channel; blending must be forced off.
    assert_eq!(log.last_write_to(nv097::SET_BLEND_ENABLE), Some(0));

    log.clear();
    ctx.render_to_surface_end();

    // Restoration: framebuffer DMA channel, offset 0, original format,
    // blending back on.
    assert_eq!(log.writes_to(nv097::SET_CONTEXT_DMA_COLOR), vec![9]);
    assert_eq!(log.last_write_to(nv097::SET_SURFACE_COLOR_OFFSET), Some(0));
    let format = log.last_write_to(nv097::SET_SURFACE_FORMAT).unwrap();
    assert_eq!(
        unmask(nv097::SET_SURFACE_FORMAT_COLOR, format),
        SurfaceColorFormat::A8R8G8B8 as u32
    );
    assert_eq!(log.last_write_to(nv097::SET_BLEND_ENABLE), Some(1));
}
