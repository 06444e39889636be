use super::Desync;

/// Hard upper bound on bytes held for a single channel or pixel
pub const ACCUMULATOR_CAPACITY: usize = 8;

/// Fixed-capacity byte collector for one channel value or one pixel.
///
/// Storage is inline; `limit` may be configured lower than
/// [`ACCUMULATOR_CAPACITY`] but never higher.
#[derive(Debug, Clone)]
pub struct Accumulator {
    bytes: [u8; ACCUMULATOR_CAPACITY],
    len: usize,
    limit: usize,
}

impl Accumulator {
    pub fn new(limit: usize) -> Self {
        Accumulator {
            bytes: [0; ACCUMULATOR_CAPACITY],
            len: 0,
            limit: limit.clamp(1, ACCUMULATOR_CAPACITY),
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Desync> {
        if self.len == self.limit {
            return Err(Desync::AccumulatorOverflow { limit: self.limit });
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.limit
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
