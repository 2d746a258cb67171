//! PNG encoding for page serving.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder};
use partbook_core::Result;

/// Encode a grayscale page as PNG bytes for the HTTP surface.
///
/// # Errors
///
/// Returns [`partbook_core::PartbookError::Image`] when encoding fails.
pub fn encode_png(page: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        page.as_raw(),
        page.width(),
        page.height(),
        ExtendedColorType::L8,
    )?;
    Ok(bytes)
}
