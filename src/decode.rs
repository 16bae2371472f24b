use image::DynamicImage;

use crate::error::Result;

/// Decode an encoded image (format sniffed from the bytes).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}
