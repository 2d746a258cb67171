//! PDF emission for rendered part-books.
//!
//! Output pages are embedded as JPEG image XObjects (one per page) so the
//! raster survives at full quality; no text is rasterised into the PDF
//! layer. Page size in points is the pixel size at the rasterisation DPI.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use partbook_core::{PartbookError, Result, RASTER_DPI};

/// JPEG quality for embedded page images.
const JPEG_QUALITY: u8 = 92;

/// Encode one grayscale page as JPEG bytes.
fn encode_jpeg(page: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .write_image(
            page.as_raw(),
            page.width(),
            page.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| PartbookError::Image(e.to_string()))?;
    Ok(bytes)
}

/// Assemble the rendered pages of one part into a PDF document.
///
/// # Errors
///
/// [`PartbookError::Pdf`] when document assembly fails and
/// [`PartbookError::Image`] when JPEG encoding fails. An empty page list is
/// a programmer error upstream and reported as [`PartbookError::Internal`].
pub fn pages_to_pdf(pages: &[GrayImage]) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(PartbookError::Internal(
            "cannot build a PDF from zero pages".to_string(),
        ));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (w_px, h_px) = page.dimensions();
        let w_pt = w_px as f32 * 72.0 / RASTER_DPI as f32;
        let h_pt = h_px as f32 * 72.0 / RASTER_DPI as f32;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(w_px),
                "Height" => i64::from(h_px),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            encode_jpeg(page)?,
        ));

        // Scale the unit image square to the full page and draw it.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        w_pt.into(),
                        0.into(),
                        0.into(),
                        h_pt.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content
                .encode()
                .map_err(|e| PartbookError::Pdf(e.to_string()))?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PartbookError::Pdf(e.to_string()))?;
    Ok(bytes)
}
