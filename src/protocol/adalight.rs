use crate::frame::BYTES_PER_PIXEL;

/// Write an Adalight frame for `pixel_data` into `out`.
///
/// Header is `Ada`, the LED count minus one (big endian) and
/// `hi ^ lo ^ 0x55`.
pub fn write_adalight_frame(pixel_data: &[u8], out: &mut Vec<u8>) {
    let led_count = pixel_data.len() / BYTES_PER_PIXEL;
    let wire_count = led_count.saturating_sub(1);

    let count_hi = (wire_count >> 8) as u8;
    let count_lo = wire_count as u8;
    let checksum = count_hi ^ count_lo ^ 0x55;

    out.clear();
    out.reserve(6 + pixel_data.len());
    out.extend_from_slice(b"Ada");
    out.push(count_hi);
    out.push(count_lo);
    out.push(checksum);
    out.extend_from_slice(pixel_data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adalight_header() {
        let mut out = Vec::new();
        write_adalight_frame(&[1, 2, 3, 4, 5, 6], &mut out);
        assert_eq!(&out[..3], b"Ada");
        assert_eq!(out[3], 0);
        assert_eq!(out[4], 1);
        assert_eq!(out[5], 0x54);
        assert_eq!(&out[6..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_adalight_large_count() {
        let data = vec![0u8; 300 * 3];
        let mut out = Vec::new();
        write_adalight_frame(&data, &mut out);
        // 299 = 0x012B
        assert_eq!(out[3], 0x01);
        assert_eq!(out[4], 0x2B);
        assert_eq!(out[5], 0x01 ^ 0x2B ^ 0x55);
        assert_eq!(out.len(), 6 + 900);
    }
}
