//! Error taxonomy for the state tracker.
//!
//! Precondition violations reject the operation and leave previously
//! committed GPU state untouched; nothing is retried automatically. Transport
//! failures (a device that stops draining the FIFO) propagate from the
//! underlying [`crate::push::Transport`].

use thiserror::Error;

use crate::combiner::CombinerSource;
use crate::push::TransportError;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PgraphError {
    #[error("no vertex buffer is bound")]
    NoVertexBuffer,

    #[error("vertex count {0} exceeds the draw-arrays addressable range")]
    VertexCountOverflow(u32),

    #[error("texcoord set {set} has component count {count}, expected 2 or 4")]
    InvalidTexcoordCount { set: usize, count: u32 },

    #[error("texture upload of {required} bytes exceeds the {available}-byte stage region")]
    TextureTooLarge { required: usize, available: usize },

    #[error("palette of {required} bytes exceeds the {available}-byte palette region")]
    PaletteTooLarge { required: usize, available: usize },

    #[error("{0:?} cannot feed final combiner stage 1")]
    IllegalFinalCombinerSource(CombinerSource),

    #[error("combiner stage count {0} is outside 1..=7")]
    InvalidCombinerStageCount(u32),

    #[error("combiner stage index {0} is outside 0..8")]
    InvalidCombinerStage(u32),

    #[error("texture unit index {0} is outside 0..4")]
    InvalidTextureUnit(u32),

    #[error("light index {0} is outside 0..8")]
    InvalidLightIndex(u32),

    #[error("vertex attribute selector does not name exactly one slot")]
    InvalidAttribute,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
