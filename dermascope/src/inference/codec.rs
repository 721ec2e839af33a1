//! Transport codec
//!
//! Converts between the base64 transport encoding and raw image bytes, and
//! between raw bytes and a decoded in-memory image. Mask encoding is a
//! lossless structural conversion to nested numeric arrays for the JSON
//! response body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::DynamicImage;
use thiserror::Error;

use crate::inference::explain::SaliencyMask;

/// Two-stage decode failure: transport text first, image bytes second.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The transport text is not valid base64
    #[error("invalid base64 payload: {0}")]
    BadEncoding(String),

    /// The decoded bytes do not form a supported image
    #[error("unsupported or corrupt image bytes: {0}")]
    BadImage(String),
}

/// Decode transport text into an in-memory image.
pub fn decode_image(transport_text: &str) -> Result<DynamicImage, DecodeError> {
    let bytes = STANDARD
        .decode(transport_text)
        .map_err(|e| DecodeError::BadEncoding(e.to_string()))?;

    image::load_from_memory(&bytes).map_err(|e| DecodeError::BadImage(e.to_string()))
}

/// Encode raw bytes into transport text.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode transport text into raw bytes without image interpretation.
pub fn decode_bytes(transport_text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD
        .decode(transport_text)
        .map_err(|e| DecodeError::BadEncoding(e.to_string()))
}

/// Convert a saliency mask to nested arrays ([H][W][3]) for JSON transport.
pub fn encode_mask(mask: &SaliencyMask) -> Vec<Vec<Vec<f32>>> {
    mask.to_nested()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_bytes_round_trip() {
        let raw: Vec<u8> = (0..=255).collect();
        let text = encode_bytes(&raw);
        assert_eq!(decode_bytes(&text).unwrap(), raw);
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_image("not valid base64!!!").unwrap_err();
        assert!(matches!(err, DecodeError::BadEncoding(_)));
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let text = encode_bytes(b"these bytes are not an image");
        let err = decode_image(&text).unwrap_err();
        assert!(matches!(err, DecodeError::BadImage(_)));
    }

    #[test]
    fn test_decode_valid_image() {
        let img = RgbImage::new(5, 3);
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let decoded = decode_image(&encode_bytes(&bytes)).unwrap();
        assert_eq!(decoded.width(), 5);
        assert_eq!(decoded.height(), 3);
    }

    #[test]
    fn test_encode_mask_shape() {
        let mask = SaliencyMask::new(2, 3);
        let nested = encode_mask(&mask);
        assert_eq!(nested.len(), 2); // rows
        assert_eq!(nested[0].len(), 3); // columns
        assert_eq!(nested[0][0].len(), 3); // channels
    }
}
