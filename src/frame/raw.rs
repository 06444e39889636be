use super::accumulator::Accumulator;
use super::{Step, BYTES_PER_PIXEL};
use crate::pixel_format::ChannelOrder;

/// Positional decoder: every three bytes are one pixel, no delimiters.
#[derive(Debug, Clone)]
pub struct RawDecoder {
    pending: Accumulator,
    order: ChannelOrder,
}

impl RawDecoder {
    pub fn new(order: ChannelOrder) -> Self {
        RawDecoder {
            pending: Accumulator::new(BYTES_PER_PIXEL),
            order,
        }
    }

    pub fn step(&mut self, byte: u8) -> Step {
        // Never full here: the pixel is emitted and cleared as soon as it completes
        if self.pending.push(byte).is_err() {
            self.pending.clear();
            return Step::Pending;
        }
        if !self.pending.is_full() {
            return Step::Pending;
        }

        let channels = [
            self.pending.as_slice()[0],
            self.pending.as_slice()[1],
            self.pending.as_slice()[2],
        ];
        self.pending.clear();
        Step::Pixel(self.order.decode(channels))
    }

    /// Bytes of the pixel currently in flight
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
