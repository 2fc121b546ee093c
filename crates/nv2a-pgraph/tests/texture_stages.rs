//! Texture unit commits, arena partitioning and the colorspace-conversion
//! plumbing into `control0`.

use nv2a_pgraph::push::{CommandLog, RecordingTransport};
use nv2a_pgraph::{
    texture_format_info, ContextConfig, PgraphContext, PgraphError,
};
use nv2a_regs::{nv097, unmask};

fn new_context() -> (PgraphContext, CommandLog) {
    let (transport, log) = RecordingTransport::new();
    let ctx = PgraphContext::new(Box::new(transport), ContextConfig::default());
    log.clear();
    (ctx, log)
}

#[test]
fn arena_regions_partition_without_overlap() {
    let (ctx, _log) = new_context();
    let region = ctx.max_single_texture_size();
    assert_eq!(region, 256 * 256 * 4 * 4); // 256x256, 32bpp, depth 4

    for unit in 0..4 {
        assert_eq!(
            ctx.texture_stage(unit).texture_offset(),
            (unit * region) as u32
        );
    }
}

#[test]
fn oversized_textures_are_rejected_without_copying() {
    let (mut ctx, _log) = new_context();
    let region = ctx.max_single_texture_size();

    // One row too many at full pitch.
    let pitch = 256 * 4;
    let height = (region as u32 / pitch) + 1;
    let data = vec![0x77u8; (pitch * height) as usize];
    let err = ctx
        .set_raw_texture(0, &data, 256, height, 1, pitch, 4, false)
        .unwrap_err();
    assert!(matches!(err, PgraphError::TextureTooLarge { .. }));
    assert!(ctx.texture_arena().texture_bytes(0).iter().all(|&b| b == 0));

    // The same image one row shorter fits.
    ctx.set_raw_texture(0, &data, 256, height - 1, 1, pitch, 4, false)
        .unwrap();
    assert!(ctx.texture_arena().texture_bytes(0).iter().any(|&b| b == 0x77));
}

#[test]
fn volume_textures_count_every_layer_against_the_region() {
    let (mut ctx, _log) = new_context();
    let region = ctx.max_single_texture_size() as u32;
    let pitch = 256 * 4;
    let layer_rows = region / pitch / 4;

    // depth 4 exactly fills the region; depth 5 exceeds it.
    let data = vec![0u8; (pitch * layer_rows * 5) as usize];
    ctx.set_raw_texture(1, &data, 256, layer_rows, 4, pitch, 4, false)
        .unwrap();
    let err = ctx
        .set_raw_texture(1, &data, 256, layer_rows, 5, pitch, 4, false)
        .unwrap_err();
    assert!(matches!(err, PgraphError::TextureTooLarge { .. }));
}

#[test]
fn commits_cover_all_units_at_their_register_stride() {
    let (mut ctx, log) = new_context();
    for unit in 0..4 {
        ctx.set_texture_stage_enabled(unit, true);
    }
    ctx.commit_texture_stages();

    let texture_base = ctx.config().texture_memory_base;
    let region = ctx.max_single_texture_size() as u32;
    for unit in 0..4u32 {
        let offset_reg = nv097::set_texture(unit, nv097::SET_TEXTURE_OFFSET);
        assert_eq!(
            log.last_write_to(offset_reg),
            Some(texture_base + unit * region)
        );

        let control0 = log
            .last_write_to(nv097::set_texture(unit, nv097::SET_TEXTURE_CONTROL0))
            .unwrap();
        assert_ne!(control0 & nv097::SET_TEXTURE_CONTROL0_ENABLE, 0);
    }
}

#[test]
fn disabled_units_commit_only_their_enable_bit() {
    let (mut ctx, log) = new_context();
    ctx.commit_texture_stages();

    for unit in 0..4u32 {
        let control0 = log
            .last_write_to(nv097::set_texture(unit, nv097::SET_TEXTURE_CONTROL0))
            .unwrap();
        assert_eq!(control0 & nv097::SET_TEXTURE_CONTROL0_ENABLE, 0);
        assert!(log
            .last_write_to(nv097::set_texture(unit, nv097::SET_TEXTURE_FORMAT))
            .is_none());
    }
}

#[test]
fn yuv_formats_set_the_colorspace_conversion_flag() {
    let (mut ctx, log) = new_context();

    ctx.setup_control0(true, false, true);
    let control0 = log.last_write_to(nv097::SET_CONTROL0).unwrap();
    assert_eq!(unmask(nv097::SET_CONTROL0_COLOR_SPACE_CONVERT, control0), 0);

    let yuv = *texture_format_info(nv097::TEXTURE_FORMAT_COLOR_LC_IMAGE_CR8YB8CB8YA8).unwrap();
    ctx.set_texture_format(yuv, 0);
    ctx.set_texture_stage_enabled(0, true);
    assert!(ctx.texture_stage(0).requires_colorspace_conversion());

    ctx.setup_control0(true, false, true);
    let control0 = log.last_write_to(nv097::SET_CONTROL0).unwrap();
    assert_eq!(
        unmask(nv097::SET_CONTROL0_COLOR_SPACE_CONVERT, control0),
        nv097::SET_CONTROL0_COLOR_SPACE_CONVERT_CRYCB_TO_RGB
    );
}

#[test]
fn palettized_commits_emit_the_palette_register() {
    let (mut ctx, log) = new_context();

    let indexed = *texture_format_info(nv097::TEXTURE_FORMAT_COLOR_SZ_I8_A8R8G8B8).unwrap();
    ctx.set_texture_format(indexed, 2);
    ctx.set_texture_stage_enabled(2, true);
    ctx.set_palette(2, &[0xFF00FF00; 256], nv2a_pgraph::PaletteSize::Entries256)
        .unwrap();
    ctx.commit_texture_stages();

    let palette_reg = nv097::set_texture(2, nv097::SET_TEXTURE_PALETTE);
    let word = log.last_write_to(palette_reg).expect("palette register");
    let palette_base = ctx.config().texture_memory_base + 4 * ctx.max_single_texture_size() as u32;
    assert_eq!(
        word & nv097::SET_TEXTURE_PALETTE_OFFSET,
        (palette_base + ctx.texture_stage(2).palette_offset()) & nv097::SET_TEXTURE_PALETTE_OFFSET
    );

    // Non-palettized units do not write the register.
    assert!(log
        .last_write_to(nv097::set_texture(0, nv097::SET_TEXTURE_PALETTE))
        .is_none());
}
