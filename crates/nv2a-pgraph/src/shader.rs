//! Vertex program boundary.
//!
//! The transform engine either runs the fixed-function pipeline or a caller
//! supplied program; program creation and bytecode loading live outside this
//! crate. The context only needs two hooks: one when the program is bound and
//! one before each draw-triggering operation.

use crate::push::Pushbuffer;

/// A bound vertex program. The fixed-function pipeline is represented by the
/// absence of a program, not by an implementation of this trait.
pub trait VertexProgram {
    /// Called once when the program becomes the active one.
    fn activate(&self, pb: &mut Pushbuffer);

    /// Called once per draw-triggering operation, before any primitive
    /// commands are emitted.
    fn prepare_draw(&self, pb: &mut Pushbuffer);
}
