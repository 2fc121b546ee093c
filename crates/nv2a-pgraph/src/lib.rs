//! State-tracking command encoder for the NV2A fixed-function +
//! register-combiner pipeline.
//!
//! The GPU consumes 32-bit method/data words from a bounded FIFO; this crate
//! turns high-level render state — surfaces, texture units, combiner wiring,
//! vertex layouts, transforms, lights — into bit-exact word sequences with
//! the ordering the hardware requires, while tracking enough CPU-side state
//! (vertex-cache validity, final-combiner words, matrix derivations) to elide
//! redundant commands.
//!
//! The crate drives any [`push::Transport`]; the bundled
//! [`push::RecordingTransport`] captures streams for tests and tooling.
//! Method addresses and field layouts live in the `nv2a-regs` crate.

pub mod arena;
pub mod combiner;
pub mod context;
pub mod error;
pub mod light;
pub mod push;
pub mod shader;
pub mod surface;
pub mod texture_format;
pub mod texture_stage;
pub mod vertex;
pub mod xform;

pub use arena::{TextureArena, TEXTURE_UNITS};
pub use combiner::{
    ChannelInput, CombinerDest, CombinerMapping, CombinerOutOp, CombinerSource, FinalChannelInput,
    FinalCombinerState, SumMuxMode,
};
pub use context::{nv2a_round, ContextConfig, DrawPrimitive, PgraphContext, ShaderStage};
pub use error::PgraphError;
pub use light::{FalloffPreset, Light, LightColors, LightKind};
pub use push::{CommandLog, Pushbuffer, RecordingTransport, Transport, TransportError};
pub use shader::VertexProgram;
pub use surface::{max_depth_value, AntiAliasing, SurfaceColorFormat, SurfaceZetaFormat};
pub use texture_format::{texture_format_info, TextureFormatInfo};
pub use texture_stage::{PaletteSize, TextureFilter, TextureStage, WrapMode};
pub use vertex::{Vertex, VertexAttribute, VertexBuffer};
pub use xform::{DefaultProfile, MatrixMode, TransformState};
