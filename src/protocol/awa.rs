use crate::frame::BYTES_PER_PIXEL;

/// Write an AWA frame (HyperSerial format) for `pixel_data` into `out`.
pub fn write_awa_frame(pixel_data: &[u8], out: &mut Vec<u8>) {
    let led_count = pixel_data.len() / BYTES_PER_PIXEL;
    let wire_count = led_count.saturating_sub(1);

    let count_hi = (wire_count >> 8) as u8;
    let count_lo = wire_count as u8;
    let crc = count_hi ^ count_lo ^ 0x55;

    out.clear();
    out.reserve(6 + pixel_data.len() + 3);
    out.extend_from_slice(b"Awa");
    out.push(count_hi);
    out.push(count_lo);
    out.push(crc);
    out.extend_from_slice(pixel_data);

    let (fletcher1, fletcher2, fletcher_ext) = fletcher(pixel_data);
    out.push(fletcher1);
    out.push(fletcher2);
    out.push(fletcher_ext);
}

/// Fletcher sums over the payload plus the position-mixed extension byte
fn fletcher(pixel_data: &[u8]) -> (u8, u8, u8) {
    let mut fletcher1: u16 = 0;
    let mut fletcher2: u16 = 0;
    let mut fletcher_ext: u16 = 0;

    for (position, &byte) in pixel_data.iter().enumerate() {
        fletcher1 = (fletcher1 + byte as u16) % 255;
        fletcher2 = (fletcher2 + fletcher1) % 255;
        fletcher_ext = (fletcher_ext + ((byte as u16) ^ (position as u16))) % 255;
    }

    // 'A' would read as the start of the next header
    if fletcher_ext == 0x41 {
        fletcher_ext = 0xaa;
    }

    (fletcher1 as u8, fletcher2 as u8, fletcher_ext as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awa_layout() {
        let mut out = Vec::new();
        write_awa_frame(&[255, 0, 0], &mut out);
        assert_eq!(&out[..3], b"Awa");
        assert_eq!(&out[3..6], &[0, 0, 0x55]);
        assert_eq!(&out[6..9], &[255, 0, 0]);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn test_fletcher_sums() {
        // f1: 1, 3, 6 / f2: 1, 4, 10 / ext: 1^0, +2^1, +3^2 = 1 + 3 + 1
        assert_eq!(fletcher(&[1, 2, 3]), (6, 10, 5));
    }

    #[test]
    fn test_fletcher_ext_avoids_header_byte() {
        assert_eq!(fletcher(&[0x41]).2, 0xaa);
    }

    #[test]
    fn test_empty_frame_does_not_underflow() {
        let mut out = Vec::new();
        write_awa_frame(&[], &mut out);
        assert_eq!(&out[3..6], &[0, 0, 0x55]);
        assert_eq!(out.len(), 9);
    }
}
