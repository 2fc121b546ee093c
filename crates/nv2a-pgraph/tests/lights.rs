//! Light commits through the context: eye-space transforms and the enable
//! mask.

use glam::{Mat4, Vec3};
use nv2a_pgraph::push::{CommandLog, RecordingTransport};
use nv2a_pgraph::{ContextConfig, Light, PgraphContext, PgraphError};
use nv2a_regs::nv097;

fn new_context() -> (PgraphContext, CommandLog) {
    let (transport, log) = RecordingTransport::new();
    let ctx = PgraphContext::new(Box::new(transport), ContextConfig::default());
    log.clear();
    (ctx, log)
}

#[test]
fn point_lights_commit_through_the_current_model_view() {
    let (mut ctx, log) = new_context();
    ctx.set_model_view_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)));
    log.clear();

    let light = Light::point(3, Vec3::new(1.0, 2.0, 3.0), 25.0, [1.0, 0.0, 0.0]);
    ctx.commit_light(&light, Vec3::Z).unwrap();

    let pos_reg = nv097::set_light(3, nv097::SET_LIGHT_LOCAL_POSITION);
    let z = log.last_write_to(pos_reg + 8).map(f32::from_bits).unwrap();
    assert_eq!(z, 13.0);
    assert_eq!(
        log.last_write_to(nv097::set_light(3, nv097::SET_LIGHT_LOCAL_RANGE)),
        Some(25.0f32.to_bits())
    );
}

#[test]
fn committing_twice_emits_the_same_block_twice() {
    let (mut ctx, log) = new_context();
    let light = Light::directional(0, Vec3::new(0.0, -1.0, 0.0));

    ctx.commit_light(&light, Vec3::Z).unwrap();
    let first = log.words();
    log.clear();
    ctx.commit_light(&light, Vec3::Z).unwrap();
    assert_eq!(log.words(), first, "light commit is idempotent");
}

#[test]
fn enable_mask_aggregates_per_light_modes() {
    let (mut ctx, log) = new_context();
    let key = Light::directional(0, Vec3::Z);
    let fill = Light::point(1, Vec3::ZERO, 10.0, [1.0, 0.0, 0.0]);

    let mask_bits = key.enable_mask_bits() | fill.enable_mask_bits();
    ctx.set_light_enable_mask(mask_bits);

    assert_eq!(
        log.last_write_to(nv097::SET_LIGHT_ENABLE_MASK),
        Some(nv097::LIGHT_MODE_INFINITE | (nv097::LIGHT_MODE_LOCAL << 2))
    );
    assert_eq!(log.last_write_to(nv097::SET_LIGHTING_ENABLE), Some(1));

    ctx.set_light_enable_mask(0);
    assert_eq!(log.last_write_to(nv097::SET_LIGHTING_ENABLE), Some(0));
}

#[test]
fn out_of_range_lights_are_rejected() {
    let (mut ctx, log) = new_context();
    let light = Light::point(9, Vec3::ZERO, 1.0, [1.0, 0.0, 0.0]);
    assert_eq!(
        ctx.commit_light(&light, Vec3::Z),
        Err(PgraphError::InvalidLightIndex(9))
    );
    assert!(log.words().is_empty());
}
