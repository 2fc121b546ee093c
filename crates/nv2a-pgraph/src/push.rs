//! Pushbuffer batch writer over an abstract command transport.
//!
//! Command words reach the GPU through a bounded FIFO that is consumed
//! asynchronously; the only ordering guarantee is that words are delivered in
//! emission order. [`Pushbuffer`] provides the scoped batch discipline on top
//! of a [`Transport`]: a batch is opened, filled with method writes and
//! closed. Batches may not nest, and the FIFO must not be flushed while a
//! batch is open — both are programming errors, not runtime conditions.
//!
//! Each register write is encoded as a method header word followed by its
//! data words. The header carries the method address, subchannel and data
//! count; the non-incrementing form (bit 30) streams every data word to the
//! same method, which is how `INLINE_ARRAY` vertex data is submitted.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Mat4;
use thiserror::Error;
use tracing::trace;

const HEADER_COUNT_SHIFT: u32 = 18;
const HEADER_SUBCHANNEL_SHIFT: u32 = 13;
const HEADER_NO_INCREMENT: u32 = 1 << 30;
const HEADER_METHOD_MASK: u32 = 0x1FFC;
const MAX_WORDS_PER_HEADER: u32 = 0x7FF;

/// Subchannel the 3D object class is bound to.
pub const SUBCHANNEL_3D: u32 = 0;

/// Errors surfaced by the command transport.
///
/// A wait that never resolves is a development-time defect on real hardware;
/// transports bound every wait with a deadline instead of spinning forever.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("device did not respond within {0:?}")]
    DeviceUnresponsive(Duration),
}

/// Contract between the state tracker and the command FIFO.
///
/// Emission order is delivery order. `flush` blocks until the FIFO has
/// drained; `wait_vblank` and `wait_swap` block on the display engine. All
/// blocking operations are deadline-bounded by the implementation.
pub trait Transport {
    /// Enqueues one command word, waiting for FIFO space if necessary.
    fn emit(&mut self, word: u32);
    /// Blocks until the FIFO has drained.
    fn flush(&mut self) -> Result<(), TransportError>;
    /// Reports whether the GPU is still consuming previously emitted words.
    fn is_busy(&self) -> bool;
    /// Blocks until the next vertical blanking interval.
    fn wait_vblank(&mut self) -> Result<(), TransportError>;
    /// Blocks until the pending present/swap has completed.
    fn wait_swap(&mut self) -> Result<(), TransportError>;
}

/// Scoped, strictly ordered method writer.
pub struct Pushbuffer {
    transport: Box<dyn Transport>,
    in_batch: bool,
}

impl Pushbuffer {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            in_batch: false,
        }
    }

    /// Opens a batch of register writes. Batches may not nest.
    pub fn begin(&mut self) {
        assert!(!self.in_batch, "pushbuffer batches may not nest");
        self.in_batch = true;
    }

    /// Closes the current batch.
    pub fn end(&mut self) {
        assert!(self.in_batch, "no pushbuffer batch is open");
        self.in_batch = false;
    }

    fn header(&mut self, method: u32, count: u32, flags: u32) {
        debug_assert!(self.in_batch, "method write outside a pushbuffer batch");
        debug_assert!(count >= 1 && count <= MAX_WORDS_PER_HEADER);
        self.transport.emit(
            (count << HEADER_COUNT_SHIFT)
                | (SUBCHANNEL_3D << HEADER_SUBCHANNEL_SHIFT)
                | (method & HEADER_METHOD_MASK)
                | flags,
        );
    }

    /// Writes `values` to consecutive registers starting at `method`.
    pub fn push(&mut self, method: u32, values: &[u32]) {
        self.header(method, values.len() as u32, 0);
        for &v in values {
            self.transport.emit(v);
        }
    }

    /// Writes float `values` (as IEEE-754 bit patterns) to consecutive
    /// registers starting at `method`.
    pub fn push_f(&mut self, method: u32, values: &[f32]) {
        self.header(method, values.len() as u32, 0);
        for &v in values {
            self.transport.emit(v.to_bits());
        }
    }

    /// Streams float `values` to `method` without address increment.
    pub fn push_f_no_inc(&mut self, method: u32, values: &[f32]) {
        self.header(method, values.len() as u32, HEADER_NO_INCREMENT);
        for &v in values {
            self.transport.emit(v.to_bits());
        }
    }

    /// Writes a full 4x4 transform in the order the transform engine consumes
    /// it (matrix rows for our column-vector matrices).
    pub fn push_matrix(&mut self, method: u32, m: &Mat4) {
        self.push_f(method, &m.transpose().to_cols_array());
    }

    /// Writes the 4x3 submatrix form used by the inverse model-view
    /// registers: the first three columns, column by column.
    pub fn push_matrix_4x3(&mut self, method: u32, m: &Mat4) {
        self.push_f(method, &m.to_cols_array()[..12]);
    }

    /// Blocks until the FIFO has drained. Must not be called with a batch
    /// open; the hardware behavior for that case is undefined.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        assert!(!self.in_batch, "flush while a pushbuffer batch is open");
        trace!("pushbuffer flush");
        self.transport.flush()
    }

    pub fn is_busy(&self) -> bool {
        self.transport.is_busy()
    }

    pub fn wait_vblank(&mut self) -> Result<(), TransportError> {
        self.transport.wait_vblank()
    }

    pub fn wait_swap(&mut self) -> Result<(), TransportError> {
        self.transport.wait_swap()
    }
}

/// One decoded method packet: the method address and its data words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub method: u32,
    /// False for non-incrementing (streamed) packets.
    pub increment: bool,
    pub data: Vec<u32>,
}

/// Decodes a raw word stream back into method packets.
///
/// Intended for tests and host-side tooling that need to assert on emitted
/// state packet by packet.
pub fn decode_packets(words: &[u32]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let header = words[i];
        let count = ((header >> HEADER_COUNT_SHIFT) & MAX_WORDS_PER_HEADER) as usize;
        let method = header & HEADER_METHOD_MASK;
        let increment = header & HEADER_NO_INCREMENT == 0;
        let data = words[i + 1..i + 1 + count].to_vec();
        packets.push(Packet {
            method,
            increment,
            data,
        });
        i += 1 + count;
    }
    packets
}

/// Expands a decoded stream into `(register, value)` pairs, applying the
/// per-word address increment of incrementing packets.
pub fn decode_register_writes(words: &[u32]) -> Vec<(u32, u32)> {
    let mut writes = Vec::new();
    for packet in decode_packets(words) {
        for (i, &value) in packet.data.iter().enumerate() {
            let reg = if packet.increment {
                packet.method + 4 * i as u32
            } else {
                packet.method
            };
            writes.push((reg, value));
        }
    }
    writes
}

#[derive(Default)]
struct LogInner {
    words: Vec<u32>,
    flushes: usize,
    vblank_waits: usize,
    swap_waits: usize,
}

/// Shared view of the words captured by a [`RecordingTransport`].
#[derive(Clone, Default)]
pub struct CommandLog(Rc<RefCell<LogInner>>);

impl CommandLog {
    pub fn words(&self) -> Vec<u32> {
        self.0.borrow().words.clone()
    }

    pub fn packets(&self) -> Vec<Packet> {
        decode_packets(&self.0.borrow().words)
    }

    pub fn register_writes(&self) -> Vec<(u32, u32)> {
        decode_register_writes(&self.0.borrow().words)
    }

    /// Data words written to `register`, in emission order.
    pub fn writes_to(&self, register: u32) -> Vec<u32> {
        self.register_writes()
            .into_iter()
            .filter(|&(reg, _)| reg == register)
            .map(|(_, value)| value)
            .collect()
    }

    /// Last value written to `register`, if any.
    pub fn last_write_to(&self, register: u32) -> Option<u32> {
        self.writes_to(register).pop()
    }

    pub fn flush_count(&self) -> usize {
        self.0.borrow().flushes
    }

    pub fn vblank_wait_count(&self) -> usize {
        self.0.borrow().vblank_waits
    }

    pub fn swap_wait_count(&self) -> usize {
        self.0.borrow().swap_waits
    }

    /// Discards everything captured so far.
    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.words.clear();
        inner.flushes = 0;
        inner.vblank_waits = 0;
        inner.swap_waits = 0;
    }
}

/// Transport double that records the emitted stream instead of driving
/// hardware. Intended for tests and host-side tooling; every wait resolves
/// immediately.
#[derive(Default)]
pub struct RecordingTransport {
    log: CommandLog,
}

impl RecordingTransport {
    /// Creates the transport and a shared handle to its capture log.
    pub fn new() -> (Self, CommandLog) {
        let transport = Self::default();
        let log = transport.log.clone();
        (transport, log)
    }
}

impl Transport for RecordingTransport {
    fn emit(&mut self, word: u32) {
        self.log.0.borrow_mut().words.push(word);
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.log.0.borrow_mut().flushes += 1;
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn wait_vblank(&mut self) -> Result<(), TransportError> {
        self.log.0.borrow_mut().vblank_waits += 1;
        Ok(())
    }

    fn wait_swap(&mut self) -> Result<(), TransportError> {
        self.log.0.borrow_mut().swap_waits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv2a_regs::nv097;

    fn recording_pushbuffer() -> (Pushbuffer, CommandLog) {
        let (transport, log) = RecordingTransport::new();
        (Pushbuffer::new(Box::new(transport)), log)
    }

    #[test]
    fn incrementing_packet_round_trips() {
        let (mut pb, log) = recording_pushbuffer();
        pb.begin();
        pb.push(nv097::SET_VIEWPORT_OFFSET, &[1, 2, 3, 4]);
        pb.end();

        let packets = log.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].method, nv097::SET_VIEWPORT_OFFSET);
        assert!(packets[0].increment);
        assert_eq!(packets[0].data, vec![1, 2, 3, 4]);

        assert_eq!(
            log.register_writes(),
            vec![
                (nv097::SET_VIEWPORT_OFFSET, 1),
                (nv097::SET_VIEWPORT_OFFSET + 4, 2),
                (nv097::SET_VIEWPORT_OFFSET + 8, 3),
                (nv097::SET_VIEWPORT_OFFSET + 12, 4),
            ]
        );
    }

    #[test]
    fn float_pushes_emit_bit_patterns() {
        let (mut pb, log) = recording_pushbuffer();
        pb.begin();
        pb.push_f(nv097::SET_CLIP_MAX, &[16777215.0]);
        pb.end();

        assert_eq!(
            log.last_write_to(nv097::SET_CLIP_MAX),
            Some(16777215.0f32.to_bits())
        );
    }

    #[test]
    fn non_incrementing_stream_stays_on_one_method() {
        let (mut pb, log) = recording_pushbuffer();
        pb.begin();
        pb.push_f_no_inc(nv097::INLINE_ARRAY, &[0.0, 1.0, 2.0]);
        pb.end();

        let packets = log.packets();
        assert_eq!(packets.len(), 1);
        assert!(!packets[0].increment);
        assert_eq!(log.writes_to(nv097::INLINE_ARRAY).len(), 3);
    }

    #[test]
    fn matrix_push_emits_rows() {
        let (mut pb, log) = recording_pushbuffer();
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, // col 0
            5.0, 6.0, 7.0, 8.0, // col 1
            9.0, 10.0, 11.0, 12.0, // col 2
            13.0, 14.0, 15.0, 16.0, // col 3
        ]);
        pb.begin();
        pb.push_matrix(nv097::SET_COMPOSITE_MATRIX, &m);
        pb.end();

        let data = log.writes_to(nv097::SET_COMPOSITE_MATRIX);
        assert_eq!(data[0], 1.0f32.to_bits());
        let all: Vec<u32> = log.register_writes().iter().map(|&(_, v)| v).collect();
        // Row 0 of the matrix is (1, 5, 9, 13).
        assert_eq!(
            &all[..4],
            &[
                1.0f32.to_bits(),
                5.0f32.to_bits(),
                9.0f32.to_bits(),
                13.0f32.to_bits()
            ]
        );
    }

    #[test]
    #[should_panic(expected = "may not nest")]
    fn nested_batches_are_rejected() {
        let (mut pb, _log) = recording_pushbuffer();
        pb.begin();
        pb.begin();
    }

    #[test]
    #[should_panic(expected = "batch is open")]
    fn flush_inside_batch_is_rejected() {
        let (mut pb, _log) = recording_pushbuffer();
        pb.begin();
        let _ = pb.flush();
    }
}
