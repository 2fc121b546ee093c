//! Register combiner configuration.
//!
//! The color and alpha pipes each run up to eight `A*B + C*D` stages over
//! bit-packed input/output control words, followed by the two-word final
//! combiner that folds in specular and fog. Every logical setting here packs
//! into exactly one 32-bit register; partial words are meaningless to the
//! hardware, so encoders always produce the whole word.

use nv2a_regs::{mask, nv097};

use crate::error::PgraphError;

pub const COMBINER_STAGES: u32 = 8;

/// Value sources a combiner channel can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CombinerSource {
    Zero = 0,
    Constant0 = 1,
    Constant1 = 2,
    Fog = 3,
    Diffuse = 4,
    Specular = 5,
    Texture0 = 8,
    Texture1 = 9,
    Texture2 = 10,
    Texture3 = 11,
    R0 = 12,
    R1 = 13,
    /// Specular + R0 sum; only valid in final combiner word 0.
    SpecularR0Sum = 14,
    /// Product of final-combiner channels E and F.
    EfProduct = 15,
}

/// Writable destinations for combiner stage outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CombinerDest {
    Discard = 0,
    Constant0 = 1,
    Constant1 = 2,
    Fog = 3,
    Diffuse = 4,
    Specular = 5,
    Texture0 = 8,
    Texture1 = 9,
    Texture2 = 10,
    Texture3 = 11,
    R0 = 12,
    R1 = 13,
    SpecularR0Sum = 14,
    EfProduct = 15,
}

/// Input mapping functions applied before a stage computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CombinerMapping {
    /// max(0, x)
    UnsignedIdentity = 0,
    /// 1 - max(0, x)
    UnsignedInvert = 1,
    /// 2*max(0, x) - 1
    ExpandNormal = 2,
    /// 1 - 2*max(0, x)
    ExpandNegate = 3,
    /// max(0, x) - 1/2
    HalfBiasNormal = 4,
    /// 1/2 - max(0, x)
    HalfBiasNegate = 5,
    /// x
    SignedIdentity = 6,
    /// -x
    SignedNegate = 7,
}

/// Whether the third stage output is `ab + cd` or a mux on r0.alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SumMuxMode {
    Sum = 0,
    Mux = 1,
}

/// Post-op applied to stage outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CombinerOutOp {
    /// y = x
    Identity = 0,
    /// y = x - 0.5
    Bias = 1,
    /// y = x * 2
    ShiftLeft1 = 2,
    /// y = (x - 0.5) * 2
    ShiftLeft1Bias = 3,
    /// y = x * 4
    ShiftLeft2 = 4,
    /// y = x / 2
    ShiftRight1 = 6,
}

/// One combiner input channel: a source, the alpha-select bit and an input
/// mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInput {
    pub source: CombinerSource,
    pub alpha: bool,
    pub mapping: CombinerMapping,
}

impl ChannelInput {
    /// RGB side of `source` with the given mapping.
    pub fn color(source: CombinerSource) -> Self {
        Self {
            source,
            alpha: false,
            mapping: CombinerMapping::UnsignedIdentity,
        }
    }

    /// Alpha side of `source`.
    pub fn alpha(source: CombinerSource) -> Self {
        Self {
            source,
            alpha: true,
            mapping: CombinerMapping::UnsignedIdentity,
        }
    }

    /// Constant 0.
    pub fn zero() -> Self {
        Self::color(CombinerSource::Zero)
    }

    /// Constant 1 (zero, unsigned-inverted).
    pub fn one() -> Self {
        Self::color(CombinerSource::Zero).with_mapping(CombinerMapping::UnsignedInvert)
    }

    /// Constant -1 (zero, expand-normal).
    pub fn negative_one() -> Self {
        Self::color(CombinerSource::Zero).with_mapping(CombinerMapping::ExpandNormal)
    }

    pub fn with_mapping(mut self, mapping: CombinerMapping) -> Self {
        self.mapping = mapping;
        self
    }

    fn encode(self) -> u32 {
        self.source as u32 | (self.alpha as u32) << 4 | (self.mapping as u32) << 5
    }
}

/// One final-combiner channel: a source, the alpha-select bit and an invert
/// flag (the final combiner supports only identity/invert mappings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalChannelInput {
    pub source: CombinerSource,
    pub alpha: bool,
    pub invert: bool,
}

impl FinalChannelInput {
    pub fn color(source: CombinerSource) -> Self {
        Self {
            source,
            alpha: false,
            invert: false,
        }
    }

    pub fn alpha(source: CombinerSource) -> Self {
        Self {
            source,
            alpha: true,
            invert: false,
        }
    }

    pub fn zero() -> Self {
        Self::color(CombinerSource::Zero)
    }

    /// Constant 1 (zero alpha, inverted) — the idiom for "full" G channels.
    pub fn one() -> Self {
        Self {
            source: CombinerSource::Zero,
            alpha: true,
            invert: true,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    fn encode(self) -> u32 {
        self.source as u32 | (self.alpha as u32) << 4 | (self.invert as u32) << 5
    }
}

/// Packs four input channels into one input control word (A high byte, D low
/// byte).
pub fn encode_input_word(
    a: ChannelInput,
    b: ChannelInput,
    c: ChannelInput,
    d: ChannelInput,
) -> u32 {
    a.encode() << 24 | b.encode() << 16 | c.encode() << 8 | d.encode()
}

/// Packs an output control word.
pub fn encode_output_word(
    ab_dst: CombinerDest,
    cd_dst: CombinerDest,
    sum_dst: CombinerDest,
    ab_dot: bool,
    cd_dot: bool,
    sum_or_mux: SumMuxMode,
    op: CombinerOutOp,
) -> u32 {
    let mut word = cd_dst as u32 | (ab_dst as u32) << 4 | (sum_dst as u32) << 8;
    if cd_dot {
        word |= 1 << 12;
    }
    if ab_dot {
        word |= 1 << 13;
    }
    if let SumMuxMode::Mux = sum_or_mux {
        word |= 1 << 14;
    }
    word | (op as u32) << 15
}

/// Alpha-from-blue flags valid only in the color pipe's output word.
pub fn encode_color_output_word(
    ab_dst: CombinerDest,
    cd_dst: CombinerDest,
    sum_dst: CombinerDest,
    ab_dot: bool,
    cd_dot: bool,
    sum_or_mux: SumMuxMode,
    op: CombinerOutOp,
    alpha_from_ab_blue: bool,
    alpha_from_cd_blue: bool,
) -> u32 {
    let mut word = encode_output_word(ab_dst, cd_dst, sum_dst, ab_dot, cd_dot, sum_or_mux, op);
    if alpha_from_ab_blue {
        word |= 1 << 19;
    }
    if alpha_from_cd_blue {
        word |= 1 << 18;
    }
    word
}

/// Packs final combiner word 0 from channels A..D.
pub fn encode_final_combiner0(
    a: FinalChannelInput,
    b: FinalChannelInput,
    c: FinalChannelInput,
    d: FinalChannelInput,
) -> u32 {
    a.encode() << 24 | b.encode() << 16 | c.encode() << 8 | d.encode()
}

/// Packs final combiner word 1 from channels E..G and the specular-sum
/// flags. The specular+R0 sum is not a legal source here.
pub fn encode_final_combiner1(
    e: FinalChannelInput,
    f: FinalChannelInput,
    g: FinalChannelInput,
    specular_add_invert_r0: bool,
    specular_add_invert_v1: bool,
    specular_clamp: bool,
) -> Result<u32, PgraphError> {
    for channel in [e, f, g] {
        if channel.source == CombinerSource::SpecularR0Sum {
            return Err(PgraphError::IllegalFinalCombinerSource(channel.source));
        }
    }

    let mut word = e.encode() << 24 | f.encode() << 16 | g.encode() << 8;
    if specular_add_invert_r0 {
        word |= nv097::SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_ADD_INVERT_R0;
    }
    if specular_add_invert_v1 {
        word |= nv097::SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_ADD_INVERT_V1;
    }
    if specular_clamp {
        word |= nv097::SET_COMBINER_SPECULAR_FOG_CW1_SPECULAR_CLAMP;
    }
    Ok(word)
}

/// Packs the combiner control word.
pub fn encode_combiner_control(
    stage_count: u32,
    same_factor0: bool,
    same_factor1: bool,
    mux_msb: bool,
) -> Result<u32, PgraphError> {
    if stage_count == 0 || stage_count >= COMBINER_STAGES {
        return Err(PgraphError::InvalidCombinerStageCount(stage_count));
    }

    let mut word = mask(nv097::SET_COMBINER_CONTROL_ITERATION_COUNT, stage_count);
    if !same_factor0 {
        word |= mask(
            nv097::SET_COMBINER_CONTROL_FACTOR0,
            nv097::SET_COMBINER_CONTROL_FACTOR0_EACH_STAGE,
        );
    }
    if !same_factor1 {
        word |= mask(
            nv097::SET_COMBINER_CONTROL_FACTOR1,
            nv097::SET_COMBINER_CONTROL_FACTOR1_EACH_STAGE,
        );
    }
    if mux_msb {
        word |= mask(
            nv097::SET_COMBINER_CONTROL_MUX_SELECT,
            nv097::SET_COMBINER_CONTROL_MUX_SELECT_MSB,
        );
    }
    Ok(word)
}

/// Opaque snapshot of the two final-combiner control words.
///
/// Lets a caller nest a throwaway rendering operation inside unrelated
/// combiner state: snapshot, reconfigure freely, restore bit-identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalCombinerState {
    pub(crate) cw0: u32,
    pub(crate) cw1: u32,
}

/// Packs floating color components into the BGRA byte order the combiner
/// factor registers take.
pub fn pack_bgra(rgba: [f32; 4]) -> u32 {
    let channel = |v: f32| (v * 255.0) as u32;
    channel(rgba[3]) << 24 | channel(rgba[0]) << 16 | channel(rgba[1]) << 8 | channel(rgba[2])
}
