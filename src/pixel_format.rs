use serde::{Deserialize, Serialize};

/// One LED's target color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    r: u8,
    g: u8,
    b: u8,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Pixel { r, g, b }
    }

    pub fn r(&self) -> u8 {
        self.r
    }

    pub fn g(&self) -> u8 {
        self.g
    }

    pub fn b(&self) -> u8 {
        self.b
    }
}

impl From<(u8, u8, u8)> for Pixel {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Pixel::new(r, g, b)
    }
}

/// Order in which the three channels of a pixel appear on a wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ChannelOrder {
    /// Build a pixel from three channel values as they arrived on the wire
    pub fn decode(self, [a, b, c]: [u8; 3]) -> Pixel {
        match self {
            ChannelOrder::Rgb => Pixel::new(a, b, c),
            ChannelOrder::Rbg => Pixel::new(a, c, b),
            ChannelOrder::Grb => Pixel::new(b, a, c),
            ChannelOrder::Gbr => Pixel::new(c, a, b),
            ChannelOrder::Brg => Pixel::new(b, c, a),
            ChannelOrder::Bgr => Pixel::new(c, b, a),
        }
    }

    /// Lay a pixel out in this order for transmission
    pub fn encode(self, pixel: Pixel) -> [u8; 3] {
        let Pixel { r, g, b } = pixel;
        match self {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Rbg => [r, b, g],
            ChannelOrder::Grb => [g, r, b],
            ChannelOrder::Gbr => [g, b, r],
            ChannelOrder::Brg => [b, r, g],
            ChannelOrder::Bgr => [b, g, r],
        }
    }
}

/// Serialize a frame into `out` using the given channel order.
///
/// `out` is cleared first; its capacity is kept so repeated frames of the
/// same length do not reallocate.
pub fn encode_frame(frame: &[Pixel], order: ChannelOrder, out: &mut Vec<u8>) {
    out.clear();
    for &pixel in frame {
        out.extend_from_slice(&order.encode(pixel));
    }
}
