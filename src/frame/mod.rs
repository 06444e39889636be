//! Frame assembly: turns the connected byte stream into whole frames.
//!
//! Bytes go through a per-strategy decoder one at a time. Decoded pixels are
//! written in place into a fixed [`FrameBuffer`]; when the buffer fills (or the
//! ASCII end-of-frame marker arrives) it is handed to the [`StripSink`]
//! before the next byte is looked at. All state survives between calls, so a
//! frame may arrive across any number of reads.

mod accumulator;
mod ascii;
mod raw;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{FramingConfig, FramingStrategy};
use crate::output::StripSink;
use crate::pixel_format::Pixel;

pub use accumulator::ACCUMULATOR_CAPACITY;
pub use ascii::{is_channel_delimiter, AsciiDecoder};
pub use raw::RawDecoder;

pub const BYTES_PER_PIXEL: usize = 3;

/// Why a piece of input was thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Desync {
    #[error("channel longer than {limit} bytes")]
    AccumulatorOverflow { limit: usize },
    #[error("channel value {0} out of range")]
    ChannelOutOfRange(u32),
    #[error("pixel record with {0} channels")]
    ChannelCount(usize),
    #[error("unexpected byte 0x{0:02x}")]
    UnexpectedByte(u8),
}

/// Result of pushing one byte through a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pending,
    Pixel(Pixel),
    /// Flush request. A complete record cut short by the marker comes along
    /// as `trailing`; an incomplete one is reported in `dropped`.
    EndOfFrame {
        trailing: Option<Pixel>,
        dropped: Option<Desync>,
    },
    Desync(Desync),
}

/// Fixed-length pixel storage with a write cursor in `0..=len`
#[derive(Debug)]
pub struct FrameBuffer {
    pixels: Box<[Pixel]>,
    cursor: usize,
    dirty: bool,
}

impl FrameBuffer {
    pub fn new(len: usize) -> Self {
        FrameBuffer {
            pixels: vec![Pixel::BLACK; len].into_boxed_slice(),
            cursor: 0,
            dirty: false,
        }
    }

    /// Store `pixel` at the cursor. Returns true once the frame is full.
    pub fn push(&mut self, pixel: Pixel) -> bool {
        debug_assert!(self.cursor < self.pixels.len());
        self.pixels[self.cursor] = pixel;
        self.cursor += 1;
        self.dirty = true;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.pixels.len()
    }

    /// Whether any pixel was written since the last rewind
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.dirty = false;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }
}

/// Decoder selected at startup
#[derive(Debug, Clone)]
enum Framing {
    Raw(RawDecoder),
    Ascii(AsciiDecoder),
}

impl Framing {
    fn from_config(config: &FramingConfig) -> Self {
        match config.strategy {
            FramingStrategy::Raw => Framing::Raw(RawDecoder::new(config.channel_order)),
            FramingStrategy::Ascii => Framing::Ascii(AsciiDecoder::new(
                config.channel_order,
                config.max_accumulator,
                config.pixel_terminator_byte(),
                config.frame_terminator_byte(),
            )),
        }
    }

    fn step(&mut self, byte: u8) -> Step {
        match self {
            Framing::Raw(decoder) => decoder.step(byte),
            Framing::Ascii(decoder) => decoder.step(byte),
        }
    }

    fn reset(&mut self) {
        match self {
            Framing::Raw(decoder) => decoder.reset(),
            Framing::Ascii(decoder) => decoder.reset(),
        }
    }
}

/// Running totals kept by the assembler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_shown: u64,
    pub frames_failed: u64,
    pub pixels_decoded: u64,
    pub desyncs: u64,
    pub partial_frames_discarded: u64,
}

/// Owns the frame buffer and cursor; the only thing that flushes the strip
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: FrameBuffer,
    framing: Framing,
    stats: AssemblerStats,
}

impl FrameAssembler {
    pub fn new(led_count: usize, config: &FramingConfig) -> Self {
        FrameAssembler {
            buffer: FrameBuffer::new(led_count),
            framing: Framing::from_config(config),
            stats: AssemblerStats::default(),
        }
    }

    /// Consume `bytes`, flushing every frame that completes along the way.
    ///
    /// Never waits for more input. Returns the number of frames shown. A
    /// failed flush drops that frame but the remaining bytes are still
    /// consumed, so positional framing stays aligned; the first sink error is
    /// returned once all of `bytes` has been processed.
    pub fn feed<S: StripSink + ?Sized>(&mut self, bytes: &[u8], sink: &mut S) -> Result<usize> {
        let mut shown = 0;
        let mut first_error = None;

        for &byte in bytes {
            match self.framing.step(byte) {
                Step::Pending => {}
                Step::Pixel(pixel) => {
                    if self.store(pixel) {
                        self.flush_into(sink, &mut shown, &mut first_error);
                    }
                }
                Step::EndOfFrame { trailing, dropped } => {
                    if let Some(desync) = dropped {
                        self.note_desync(desync);
                    }
                    if let Some(pixel) = trailing {
                        if self.store(pixel) {
                            self.flush_into(sink, &mut shown, &mut first_error);
                        }
                    }
                    // Nothing new since an automatic flush: nothing to show
                    if self.buffer.is_dirty() {
                        if !self.buffer.is_complete() {
                            debug!(
                                "Short frame: {} of {} pixels, keeping stale remainder",
                                self.buffer.cursor(),
                                self.buffer.len()
                            );
                        }
                        self.flush_into(sink, &mut shown, &mut first_error);
                    }
                }
                Step::Desync(desync) => self.note_desync(desync),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(shown),
        }
    }

    /// Drop the in-flight frame and any half-decoded pixel
    pub fn reset(&mut self) {
        if self.buffer.is_dirty() || self.has_partial_pixel() {
            self.stats.partial_frames_discarded += 1;
            debug!(
                "Discarding partial frame at pixel {} of {}",
                self.buffer.cursor(),
                self.buffer.len()
            );
        }
        self.buffer.rewind();
        self.framing.reset();
    }

    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    pub fn led_count(&self) -> usize {
        self.buffer.len()
    }

    #[cfg(test)]
    pub fn frame(&self) -> &[Pixel] {
        self.buffer.pixels()
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    fn has_partial_pixel(&self) -> bool {
        match &self.framing {
            Framing::Raw(decoder) => decoder.pending_bytes() > 0,
            Framing::Ascii(decoder) => decoder.in_record(),
        }
    }

    fn store(&mut self, pixel: Pixel) -> bool {
        self.stats.pixels_decoded += 1;
        self.buffer.push(pixel)
    }

    /// Hand the buffer to the sink. The cursor goes back to 0 either way.
    fn flush<S: StripSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let result = sink.show(self.buffer.pixels());
        self.buffer.rewind();
        match result {
            Ok(()) => self.stats.frames_shown += 1,
            Err(_) => self.stats.frames_failed += 1,
        }
        result
    }

    fn flush_into<S: StripSink + ?Sized>(
        &mut self,
        sink: &mut S,
        shown: &mut usize,
        first_error: &mut Option<anyhow::Error>,
    ) {
        match self.flush(sink) {
            Ok(()) => *shown += 1,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    fn note_desync(&mut self, desync: Desync) {
        self.stats.desyncs += 1;
        trace!("Dropping malformed pixel data: {}", desync);
    }
}
