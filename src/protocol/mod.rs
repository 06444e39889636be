//! Wire formats spoken to the downstream LED controller

mod adalight;
mod awa;

use serde::{Deserialize, Serialize};

pub use adalight::write_adalight_frame;
pub use awa::write_awa_frame;

/// Framing used on the strip output port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StripProtocol {
    Adalight,
    Awa,
}

impl StripProtocol {
    /// Wrap already ordered pixel bytes in this protocol's envelope
    pub fn write_frame(self, pixel_data: &[u8], out: &mut Vec<u8>) {
        match self {
            StripProtocol::Adalight => write_adalight_frame(pixel_data, out),
            StripProtocol::Awa => write_awa_frame(pixel_data, out),
        }
    }
}
