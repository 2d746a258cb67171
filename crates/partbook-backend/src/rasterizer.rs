//! The pdfium-backed raster source.
//!
//! PDF bytes are parsed once at ingest to collect page dimensions and
//! enforce the raster budget; actual rasterisation happens lazily on first
//! page access and is cached per page. Pdfium is re-bound per operation,
//! which keeps the source free of borrowed document state.

// Pdfium exposes page geometry as f32 points and page indices as u16; the
// conversions below are exact for real-world documents.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use image::GrayImage;
use log::{debug, warn};
use pdfium_render::prelude::*;

use partbook_core::{PartbookError, RasterSource, Result, RASTER_DPI};

use crate::gray::rgba_to_gray;

/// Default per-page raster budget: 128 MiB of grayscale pixels.
pub const DEFAULT_MAX_PAGE_BYTES: u64 = 128 * 1024 * 1024;

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizerConfig {
    /// Rasterisation resolution.
    pub dpi: u32,
    /// Maximum bytes a single page raster may occupy.
    pub max_page_bytes: u64,
}

impl Default for RasterizerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            dpi: RASTER_DPI,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }
}

/// PDF media-box points to pixels at the given DPI.
#[inline]
fn points_to_px(points: f32, dpi: u32) -> u32 {
    (f64::from(points) * f64::from(dpi) / 72.0).round() as u32
}

/// Bind the pdfium library: system install first, then a local copy next to
/// the binary.
fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_system_library()
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")))
        .map_err(|e| PartbookError::Internal(format!("failed to bind pdfium library: {e}")))?;
    Ok(Pdfium::new(bindings))
}

/// Lazy, cached raster source over an in-memory PDF.
pub struct PdfRasterSource {
    pdf_bytes: Vec<u8>,
    sizes: Vec<(u32, u32)>,
    config: RasterizerConfig,
    cache: Mutex<HashMap<usize, Arc<GrayImage>>>,
}

impl std::fmt::Debug for PdfRasterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfRasterSource")
            .field("pages", &self.sizes.len())
            .field("pdf_bytes", &self.pdf_bytes.len())
            .finish_non_exhaustive()
    }
}

impl PdfRasterSource {
    /// Parse the PDF, collect page dimensions at the configured DPI, and
    /// reject pages over the raster budget.
    ///
    /// # Errors
    ///
    /// [`PartbookError::InvalidInput`] for unreadable or empty documents,
    /// [`PartbookError::PageTooLarge`] when a raster would exceed the budget.
    pub fn new(pdf_bytes: Vec<u8>, config: RasterizerConfig) -> Result<Self> {
        if pdf_bytes.is_empty() {
            return Err(PartbookError::InvalidInput("empty PDF payload".to_string()));
        }
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&pdf_bytes, None)
            .map_err(|e| PartbookError::InvalidInput(format!("not a readable PDF: {e}")))?;

        let mut sizes = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let width_px = points_to_px(page.width().value, config.dpi);
            let height_px = points_to_px(page.height().value, config.dpi);
            let bytes = u64::from(width_px) * u64::from(height_px);
            if bytes > config.max_page_bytes {
                return Err(PartbookError::PageTooLarge {
                    page_index: index,
                    bytes,
                    budget: config.max_page_bytes,
                });
            }
            sizes.push((width_px, height_px));
        }
        drop(document);

        if sizes.is_empty() {
            return Err(PartbookError::InvalidInput("PDF has no pages".to_string()));
        }
        debug!("ingested PDF with {} pages at {} DPI", sizes.len(), config.dpi);
        Ok(Self {
            pdf_bytes,
            sizes,
            config,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Render one page to grayscale at the configured DPI.
    fn render_page(&self, index: usize) -> Result<GrayImage> {
        let (width_px, height_px) = self.sizes[index];
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.pdf_bytes, None)
            .map_err(|e| PartbookError::InvalidInput(format!("not a readable PDF: {e}")))?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| PartbookError::Internal(format!("page {index} vanished: {e}")))?;
        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width_px as i32)
                    .set_target_height(height_px as i32),
            )
            .map_err(|e| PartbookError::Internal(format!("failed to render page {index}: {e}")))?;
        let rgba = bitmap.as_rgba_bytes();
        Ok(rgba_to_gray(width_px, height_px, &rgba))
    }
}

impl RasterSource for PdfRasterSource {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: usize) -> Option<(u32, u32)> {
        self.sizes.get(index).copied()
    }

    fn raster(&self, index: usize) -> Result<Arc<GrayImage>> {
        if index >= self.sizes.len() {
            return Err(PartbookError::InvalidInput(format!(
                "page {index} out of range (score has {} pages)",
                self.sizes.len()
            )));
        }
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
        {
            return Ok(Arc::clone(hit));
        }

        // Rasterise outside the lock; the critical section only holds the
        // map insert.
        let raster = Arc::new(self.render_page(index)?);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, Arc::clone(&raster));
        Ok(raster)
    }

    fn cached_bytes(&self) -> u64 {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|p| u64::from(p.width()) * u64::from(p.height()))
            .sum()
    }

    fn release_rasters(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if !cache.is_empty() {
            warn!("releasing {} cached page rasters", cache.len());
            cache.clear();
        }
    }
}
