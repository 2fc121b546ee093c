//! Draw submission strategies: range chunking, element packing, channel
//! ordering and vertex-cache maintenance.

use glam::{Vec3, Vec4};
use nv2a_pgraph::push::{CommandLog, RecordingTransport};
use nv2a_pgraph::{
    ContextConfig, DrawPrimitive, PgraphContext, PgraphError, VertexAttribute,
};
use nv2a_regs::{nv097, unmask};

fn new_context() -> (PgraphContext, CommandLog) {
    let (transport, log) = RecordingTransport::new();
    let ctx = PgraphContext::new(Box::new(transport), ContextConfig::default());
    // Drop the construction-time default state emission.
    log.clear();
    (ctx, log)
}

fn draw_arrays_ranges(n: u32) -> Vec<(u32, u32)> {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(n);
    ctx.draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
        .unwrap();
    log.writes_to(nv097::DRAW_ARRAYS)
        .into_iter()
        .map(|word| {
            (
                unmask(nv097::DRAW_ARRAYS_START_INDEX, word),
                unmask(nv097::DRAW_ARRAYS_COUNT, word) + 1,
            )
        })
        .collect()
}

#[test]
fn draw_arrays_chunks_to_255_vertex_ranges() {
    for n in [1u32, 100, 255, 256, 510, 600, 1021] {
        let ranges = draw_arrays_ranges(n);
        let expected_chunks = n.div_ceil(255) as usize;
        assert_eq!(ranges.len(), expected_chunks, "n = {n}");

        // Starts accumulate in 255 steps and the ranges cover [0, n) exactly.
        let mut covered = 0;
        for (i, &(start, count)) in ranges.iter().enumerate() {
            assert_eq!(start, 255 * i as u32, "n = {n}");
            assert_eq!(start, covered);
            assert!(count <= 255);
            covered += count;
        }
        assert_eq!(covered, n);

        let last_count = ranges.last().unwrap().1;
        if n % 255 == 0 {
            assert_eq!(last_count, 255);
        } else {
            assert_eq!(last_count, n % 255);
        }
    }
}

#[test]
fn draw_arrays_brackets_ranges_in_begin_end() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(10);
    ctx.draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::TriangleStrip)
        .unwrap();

    let begin_end = log.writes_to(nv097::SET_BEGIN_END);
    assert_eq!(
        begin_end,
        vec![
            nv097::SET_BEGIN_END_OP_TRIANGLE_STRIP,
            nv097::SET_BEGIN_END_OP_END
        ]
    );
}

#[test]
fn draw_arrays_rejects_overflowing_vertex_counts() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(0x100FF);
    log.clear();
    let err = ctx
        .draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
        .unwrap_err();
    assert_eq!(err, PgraphError::VertexCountOverflow(0x100FF));
    assert!(log.words().is_empty(), "rejected draw must not emit");
}

#[test]
fn draws_require_a_bound_buffer() {
    let (mut ctx, _log) = new_context();
    assert_eq!(
        ctx.draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::Triangles),
        Err(PgraphError::NoVertexBuffer)
    );
    assert_eq!(
        ctx.draw_inline_array(VertexAttribute::DEFAULT, DrawPrimitive::Triangles),
        Err(PgraphError::NoVertexBuffer)
    );
    assert_eq!(
        ctx.draw_inline_elements_u16(&[0], VertexAttribute::DEFAULT, DrawPrimitive::Triangles),
        Err(PgraphError::NoVertexBuffer)
    );
}

#[test]
fn element16_packs_pairs_low_half_first() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(16);
    ctx.draw_inline_elements_u16(&[5, 9, 3], VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
        .unwrap();

    assert_eq!(log.writes_to(nv097::ARRAY_ELEMENT16), vec![(9 << 16) | 5]);
    // The odd trailing index goes out as a standalone 32-bit element.
    assert_eq!(log.writes_to(nv097::ARRAY_ELEMENT32), vec![3]);
}

#[test]
fn element16_with_even_count_has_no_trailing_element32() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(16);
    ctx.draw_inline_elements_u16(
        &[0, 1, 2, 0xFFFF],
        VertexAttribute::DEFAULT,
        DrawPrimitive::Triangles,
    )
    .unwrap();

    assert_eq!(
        log.writes_to(nv097::ARRAY_ELEMENT16),
        vec![(1 << 16), (0xFFFF << 16) | 2]
    );
    assert!(log.writes_to(nv097::ARRAY_ELEMENT32).is_empty());
}

#[test]
fn element32_emits_one_index_per_word() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(16);
    ctx.draw_inline_elements_u32(
        &[7, 0x12345, 2],
        VertexAttribute::DEFAULT,
        DrawPrimitive::Lines,
    )
    .unwrap();

    assert_eq!(log.writes_to(nv097::ARRAY_ELEMENT32), vec![7, 0x12345, 2]);
}

#[test]
fn cache_break_is_emitted_once_per_invalidation_not_per_draw() {
    let (mut ctx, log) = new_context();
    let buffer = ctx.allocate_vertex_buffer(12);

    for _ in 0..4 {
        ctx.draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
            .unwrap();
    }
    assert_eq!(log.writes_to(nv097::BREAK_VERTEX_BUFFER_CACHE).len(), 1);

    // Touching the contents invalidates the hardware cache once more.
    buffer.borrow_mut().vertices_mut()[0].set_position(Vec3::ONE);
    for _ in 0..3 {
        ctx.draw_arrays(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
            .unwrap();
    }
    assert_eq!(log.writes_to(nv097::BREAK_VERTEX_BUFFER_CACHE).len(), 2);
}

#[test]
fn inline_array_streams_fields_in_channel_order() {
    let (mut ctx, log) = new_context();
    let buffer = ctx.allocate_vertex_buffer(1);
    {
        let mut buffer = buffer.borrow_mut();
        let v = &mut buffer.vertices_mut()[0];
        v.set_position(Vec3::new(1.0, 2.0, 3.0));
        v.set_diffuse(Vec4::new(0.1, 0.2, 0.3, 0.4));
        v.set_texcoord0(0.5, 0.75);
    }
    ctx.draw_inline_array(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
        .unwrap();

    let stream: Vec<f32> = log
        .writes_to(nv097::INLINE_ARRAY)
        .into_iter()
        .map(f32::from_bits)
        .collect();
    // Position (3), then diffuse (4), then texcoord0 (2).
    assert_eq!(stream, vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.75]);
}

#[test]
fn inline_array_rejects_bad_texcoord_counts_before_emitting() {
    let (mut ctx, log) = new_context();
    let buffer = ctx.allocate_vertex_buffer(4);
    buffer.borrow_mut().set_texcoord_count(0, 3);
    log.clear();

    let err = ctx
        .draw_inline_array(VertexAttribute::DEFAULT, DrawPrimitive::Triangles)
        .unwrap_err();
    assert_eq!(err, PgraphError::InvalidTexcoordCount { set: 0, count: 3 });
    assert!(log.words().is_empty());
}

#[test]
fn inline_buffer_emits_attributes_before_the_position() {
    let (mut ctx, log) = new_context();
    let buffer = ctx.allocate_vertex_buffer(1);
    {
        let mut buffer = buffer.borrow_mut();
        let v = &mut buffer.vertices_mut()[0];
        v.set_position(Vec3::new(4.0, 5.0, 6.0));
        v.set_diffuse(Vec4::ONE);
        v.set_texcoord0(0.0, 1.0);
    }
    ctx.draw_inline_buffer(VertexAttribute::DEFAULT, DrawPrimitive::Quads)
        .unwrap();

    let methods: Vec<u32> = log.packets().into_iter().map(|p| p.method).collect();
    let diffuse_at = methods
        .iter()
        .position(|&m| m == nv097::SET_DIFFUSE_COLOR4F)
        .expect("diffuse command");
    let texcoord_at = methods
        .iter()
        .position(|&m| m == nv097::SET_TEXCOORD0_2F)
        .expect("texcoord command");
    let position_at = methods
        .iter()
        .position(|&m| m == nv097::SET_VERTEX3F)
        .expect("position command");

    // The position latches the vertex, so it must come last.
    assert!(diffuse_at < position_at);
    assert!(texcoord_at < position_at);

    assert!(log.flush_count() > 0, "inline buffer draws flush the FIFO");
    assert!(buffer.borrow().is_cache_valid());
}

#[test]
fn attribute_binding_clears_unused_slots() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(4);
    ctx.set_vertex_buffer_attributes(VertexAttribute::POSITION)
        .unwrap();

    // Position slot gets a real format with the buffer stride.
    let position_format = log
        .last_write_to(nv097::SET_VERTEX_DATA_ARRAY_FORMAT)
        .unwrap();
    assert_eq!(
        unmask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_SIZE, position_format),
        3
    );
    assert_eq!(
        unmask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_TYPE, position_format),
        nv097::SET_VERTEX_DATA_ARRAY_FORMAT_TYPE_F
    );
    assert!(unmask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_STRIDE, position_format) > 0);

    // Every other slot is cleared with a zero-size format and no offset.
    for slot in 1..16u32 {
        let format = log
            .last_write_to(nv097::SET_VERTEX_DATA_ARRAY_FORMAT + slot * 4)
            .unwrap();
        assert_eq!(unmask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_SIZE, format), 0);
        assert!(log
            .last_write_to(nv097::SET_VERTEX_DATA_ARRAY_OFFSET + slot * 4)
            .is_none());
    }
}

#[test]
fn stride_overrides_apply_to_their_slot() {
    let (mut ctx, log) = new_context();
    ctx.allocate_vertex_buffer(4);
    ctx.override_vertex_attribute_stride(VertexAttribute::POSITION, 0)
        .unwrap();
    ctx.set_vertex_buffer_attributes(VertexAttribute::POSITION)
        .unwrap();

    let format = log
        .last_write_to(nv097::SET_VERTEX_DATA_ARRAY_FORMAT)
        .unwrap();
    assert_eq!(unmask(nv097::SET_VERTEX_DATA_ARRAY_FORMAT_STRIDE, format), 0);

    assert_eq!(
        ctx.override_vertex_attribute_stride(VertexAttribute::DEFAULT, 0),
        Err(PgraphError::InvalidAttribute)
    );
}
