use super::accumulator::Accumulator;
use super::{Desync, Step, BYTES_PER_PIXEL};
use crate::pixel_format::{ChannelOrder, Pixel};

/// Bytes that separate the decimal channels of one pixel record
pub const CHANNEL_DELIMITERS: &[u8] = b" ,\t\r";

pub fn is_channel_delimiter(byte: u8) -> bool {
    CHANNEL_DELIMITERS.contains(&byte)
}

/// Decoder for `r g b;` records with a frame terminator between frames.
///
/// A record that goes wrong anywhere is marked corrupt and the rest of it is
/// skipped up to the next pixel or frame terminator.
///
/// Every pixel needs its own terminator. In a bare `r g b r g b` run the
/// fourth channel is a desync and the rest is skipped up to the next
/// terminator.
#[derive(Debug, Clone)]
pub struct AsciiDecoder {
    digits: Accumulator,
    channels: [u8; BYTES_PER_PIXEL],
    filled: usize,
    corrupt: bool,
    pixel_terminator: u8,
    frame_terminator: u8,
    order: ChannelOrder,
}

impl AsciiDecoder {
    pub fn new(
        order: ChannelOrder,
        max_digits: usize,
        pixel_terminator: u8,
        frame_terminator: u8,
    ) -> Self {
        AsciiDecoder {
            digits: Accumulator::new(max_digits),
            channels: [0; BYTES_PER_PIXEL],
            filled: 0,
            corrupt: false,
            pixel_terminator,
            frame_terminator,
            order,
        }
    }

    pub fn step(&mut self, byte: u8) -> Step {
        if byte == self.pixel_terminator {
            return match self.finish_record() {
                Ok(pixel) => pixel.map_or(Step::Pending, Step::Pixel),
                Err(desync) => Step::Desync(desync),
            };
        }

        if byte == self.frame_terminator {
            return match self.finish_record() {
                Ok(trailing) => Step::EndOfFrame { trailing, dropped: None },
                Err(desync) => Step::EndOfFrame { trailing: None, dropped: Some(desync) },
            };
        }

        if self.corrupt {
            return Step::Pending;
        }

        let result = if byte.is_ascii_digit() {
            self.digits.push(byte)
        } else if is_channel_delimiter(byte) {
            self.end_channel()
        } else {
            Err(Desync::UnexpectedByte(byte))
        };

        match result {
            Ok(()) => Step::Pending,
            Err(desync) => {
                self.corrupt = true;
                Step::Desync(desync)
            }
        }
    }

    /// Close the record at a terminator.
    ///
    /// An empty record is not an error. A corrupt record was already reported
    /// when it went bad, so it is dropped silently here.
    fn finish_record(&mut self) -> Result<Option<Pixel>, Desync> {
        let was_corrupt = self.corrupt;
        let closed = if was_corrupt { Ok(()) } else { self.end_channel() };
        let filled = self.filled;
        let channels = self.channels;
        self.reset();

        if was_corrupt {
            return Ok(None);
        }
        closed?;

        match filled {
            0 => Ok(None),
            BYTES_PER_PIXEL => Ok(Some(self.order.decode(channels))),
            n => Err(Desync::ChannelCount(n)),
        }
    }

    fn end_channel(&mut self) -> Result<(), Desync> {
        if self.digits.is_empty() {
            return Ok(());
        }

        let value = self
            .digits
            .as_slice()
            .iter()
            .fold(0u32, |acc, &digit| acc * 10 + u32::from(digit - b'0'));
        self.digits.clear();

        let value = u8::try_from(value).map_err(|_| Desync::ChannelOutOfRange(value))?;
        if self.filled == BYTES_PER_PIXEL {
            return Err(Desync::ChannelCount(self.filled + 1));
        }

        self.channels[self.filled] = value;
        self.filled += 1;
        Ok(())
    }

    /// Whether part of a record has been seen since the last terminator
    pub fn in_record(&self) -> bool {
        self.corrupt || self.filled > 0 || !self.digits.is_empty()
    }

    pub fn reset(&mut self) {
        self.digits.clear();
        self.filled = 0;
        self.corrupt = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> AsciiDecoder {
        AsciiDecoder::new(ChannelOrder::Rgb, 3, b';', b'\n')
    }

    fn run(decoder: &mut AsciiDecoder, input: &[u8]) -> Vec<Step> {
        input
            .iter()
            .map(|&b| decoder.step(b))
            .filter(|step| *step != Step::Pending)
            .collect()
    }

    #[test]
    fn test_single_record() {
        let mut d = decoder();
        assert_eq!(run(&mut d, b"12 34 56;"), vec![Step::Pixel(Pixel::new(12, 34, 56))]);
    }

    #[test]
    fn test_delimiters_collapse() {
        let mut d = decoder();
        assert_eq!(run(&mut d, b" 1,  2,\t3 ;"), vec![Step::Pixel(Pixel::new(1, 2, 3))]);
    }

    #[test]
    fn test_channel_extremes_exact() {
        let mut d = decoder();
        assert_eq!(run(&mut d, b"0 255 0;"), vec![Step::Pixel(Pixel::new(0, 255, 0))]);
        assert_eq!(run(&mut d, b"255 0 255;"), vec![Step::Pixel(Pixel::new(255, 0, 255))]);
    }

    #[test]
    fn test_out_of_range_rejects_record() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"256 0 0;1 2 3;"),
            vec![
                Step::Desync(Desync::ChannelOutOfRange(256)),
                Step::Pixel(Pixel::new(1, 2, 3)),
            ]
        );
    }

    #[test]
    fn test_too_many_digits_overflows() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"1000 1 1;"),
            vec![Step::Desync(Desync::AccumulatorOverflow { limit: 3 })]
        );
    }

    #[test]
    fn test_leading_zeros_with_wider_limit() {
        let mut d = AsciiDecoder::new(ChannelOrder::Rgb, 5, b';', b'\n');
        assert_eq!(run(&mut d, b"00255 007 0;"), vec![Step::Pixel(Pixel::new(255, 7, 0))]);
    }

    #[test]
    fn test_unexpected_byte_skips_to_terminator() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"1 x2 3 4 5;7 8 9;"),
            vec![
                Step::Desync(Desync::UnexpectedByte(b'x')),
                Step::Pixel(Pixel::new(7, 8, 9)),
            ]
        );
    }

    #[test]
    fn test_wrong_channel_count() {
        let mut d = decoder();
        assert_eq!(run(&mut d, b"1 2;"), vec![Step::Desync(Desync::ChannelCount(2))]);
        assert_eq!(run(&mut d, b"1 2 3 4;"), vec![Step::Desync(Desync::ChannelCount(4))]);
    }

    #[test]
    fn test_in_record_tracks_partial_input() {
        let mut d = decoder();
        assert!(!d.in_record());
        run(&mut d, b"12");
        assert!(d.in_record());
        run(&mut d, b" 3 4;");
        assert!(!d.in_record());
    }

    #[test]
    fn test_empty_record_ignored() {
        let mut d = decoder();
        assert!(run(&mut d, b";;  ;").is_empty());
    }

    #[test]
    fn test_frame_terminator_closes_complete_record() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"1 2 3\n"),
            vec![Step::EndOfFrame { trailing: Some(Pixel::new(1, 2, 3)), dropped: None }]
        );
    }

    #[test]
    fn test_frame_terminator_reports_short_record() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"1 2\n"),
            vec![Step::EndOfFrame { trailing: None, dropped: Some(Desync::ChannelCount(2)) }]
        );
    }

    #[test]
    fn test_frame_terminator_clears_corruption() {
        let mut d = decoder();
        assert_eq!(
            run(&mut d, b"1 ? 3\n4 5 6;"),
            vec![
                Step::Desync(Desync::UnexpectedByte(b'?')),
                Step::EndOfFrame { trailing: None, dropped: None },
                Step::Pixel(Pixel::new(4, 5, 6)),
            ]
        );
    }

    #[test]
    fn test_channel_order_applied() {
        let mut d = AsciiDecoder::new(ChannelOrder::Bgr, 3, b';', b'\n');
        assert_eq!(run(&mut d, b"1 2 3;"), vec![Step::Pixel(Pixel::new(3, 2, 1))]);
    }
}
