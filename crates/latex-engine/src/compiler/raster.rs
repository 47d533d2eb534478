//! PNG checks for rasterized output

/// The eight-byte PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Whether `bytes` start with the PNG signature
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Width and height of a PNG image in pixels
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32), png::DecodingError> {
    let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    let reader = decoder.read_info()?;
    let info = reader.info();
    Ok((info.width, info.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&vec![0u8; (width * height * 4) as usize])
                .unwrap();
        }
        bytes
    }

    #[test]
    fn test_is_png() {
        assert!(is_png(&encode(1, 1)));
        assert!(!is_png(b"%PDF-1.5"));
        assert!(!is_png(&PNG_SIGNATURE[..4]));
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(png_dimensions(&encode(12, 7)).unwrap(), (12, 7));
    }

    #[test]
    fn test_png_dimensions_rejects_garbage() {
        assert!(png_dimensions(b"not a png").is_err());
    }
}
