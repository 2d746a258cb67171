//! Scores, pages, and the raster-source seam.
//!
//! A [`Score`] is an immutable collection of rasterised pages plus metadata.
//! Rasters are produced through the [`RasterSource`] trait so the planner,
//! detector, and renderer never care whether pages came from pdfium or from
//! pre-rendered images (tests, PNG input).

use std::fmt;
use std::sync::Arc;

use image::GrayImage;

use crate::error::{PartbookError, Result};
use crate::sanitize::sanitize_name;

/// Canonical rasterisation resolution for score pages.
pub const RASTER_DPI: u32 = 300;

/// Opaque score identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreId(String);

impl ScoreId {
    /// Wrap an identifier string.
    #[inline]
    #[must_use = "constructors return a new instance"]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[inline]
    #[must_use = "returns the identifier string"]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel dimensions of one rasterised page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    /// Zero-based page index.
    pub index: usize,
    /// Raster width in backend pixels.
    pub width_px: u32,
    /// Raster height in backend pixels.
    pub height_px: u32,
}

/// Provider of page rasters for one score.
///
/// Implementations are expected to rasterise lazily and cache per page; the
/// store queries [`RasterSource::cached_bytes`] when enforcing the
/// process-wide raster budget.
pub trait RasterSource: Send + Sync {
    /// Number of pages in the score.
    fn page_count(&self) -> usize;

    /// Pixel dimensions of the page, or `None` when out of range.
    fn page_size(&self, index: usize) -> Option<(u32, u32)>;

    /// The 8-bit grayscale raster for the page (white = 255, black = 0).
    ///
    /// # Errors
    ///
    /// Returns [`PartbookError::InvalidInput`] for out-of-range indices and
    /// implementation-specific errors for rasterisation failures.
    fn raster(&self, index: usize) -> Result<Arc<GrayImage>>;

    /// Bytes currently held by cached rasters.
    fn cached_bytes(&self) -> u64;

    /// Drop any cached rasters, keeping metadata intact.
    fn release_rasters(&self);
}

/// A raster source over pre-rendered page images.
///
/// Used by tests and by the CLI's direct-image input path; everything is
/// "cached" from the start.
#[derive(Debug)]
pub struct ImageRasterSource {
    pages: Vec<Arc<GrayImage>>,
}

impl ImageRasterSource {
    /// Wrap a list of page images.
    #[must_use = "constructors return a new instance"]
    pub fn new(pages: Vec<GrayImage>) -> Self {
        Self {
            pages: pages.into_iter().map(Arc::new).collect(),
        }
    }
}

impl RasterSource for ImageRasterSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Option<(u32, u32)> {
        self.pages.get(index).map(|p| (p.width(), p.height()))
    }

    fn raster(&self, index: usize) -> Result<Arc<GrayImage>> {
        self.pages.get(index).cloned().ok_or_else(|| {
            PartbookError::InvalidInput(format!(
                "page {index} out of range (score has {} pages)",
                self.pages.len()
            ))
        })
    }

    fn cached_bytes(&self) -> u64 {
        self.pages
            .iter()
            .map(|p| u64::from(p.width()) * u64::from(p.height()))
            .sum()
    }

    fn release_rasters(&self) {
        // Pre-rendered pages are the source of truth; nothing to release.
    }
}

/// An ingested score: metadata plus the raster source for its pages.
pub struct Score {
    id: ScoreId,
    title: String,
    composer: String,
    pages: Vec<PageMeta>,
    source: Arc<dyn RasterSource>,
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Score")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("composer", &self.composer)
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}

impl Score {
    /// Build a score over a raster source. Title and composer are sanitised;
    /// missing values fall back to placeholders.
    #[must_use = "constructors return a new instance"]
    pub fn new(
        id: ScoreId,
        source: Arc<dyn RasterSource>,
        title: Option<&str>,
        composer: Option<&str>,
    ) -> Self {
        let pages = (0..source.page_count())
            .filter_map(|index| {
                source.page_size(index).map(|(width_px, height_px)| PageMeta {
                    index,
                    width_px,
                    height_px,
                })
            })
            .collect();
        Self {
            id,
            title: title
                .map(sanitize_name)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            composer: composer
                .map(sanitize_name)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            pages,
            source,
        }
    }

    /// The score identifier.
    #[inline]
    #[must_use = "returns the score identifier"]
    pub fn id(&self) -> &ScoreId {
        &self.id
    }

    /// Sanitised score title.
    #[inline]
    #[must_use = "returns the score title"]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sanitised composer name.
    #[inline]
    #[must_use = "returns the composer name"]
    pub fn composer(&self) -> &str {
        &self.composer
    }

    /// Number of pages.
    #[inline]
    #[must_use = "returns the page count"]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Metadata for every page, in order.
    #[inline]
    #[must_use = "returns the page metadata"]
    pub fn pages(&self) -> &[PageMeta] {
        &self.pages
    }

    /// Metadata for one page.
    ///
    /// # Errors
    ///
    /// Returns [`PartbookError::InvalidInput`] for out-of-range indices.
    pub fn page(&self, index: usize) -> Result<PageMeta> {
        self.pages.get(index).copied().ok_or_else(|| {
            PartbookError::InvalidInput(format!(
                "page {index} out of range (score has {} pages)",
                self.pages.len()
            ))
        })
    }

    /// The raster for one page, rasterising on first access.
    ///
    /// # Errors
    ///
    /// Propagates raster-source failures.
    pub fn raster(&self, index: usize) -> Result<Arc<GrayImage>> {
        self.source.raster(index)
    }

    /// Bytes currently held by this score's cached rasters.
    #[inline]
    #[must_use = "returns the cached raster byte count"]
    pub fn cached_raster_bytes(&self) -> u64 {
        self.source.cached_bytes()
    }

    /// Drop cached rasters (called on store eviction).
    #[inline]
    pub fn release_rasters(&self) {
        self.source.release_rasters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_page(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, image::Luma([255]))
    }

    fn test_score() -> Score {
        let source = Arc::new(ImageRasterSource::new(vec![
            blank_page(100, 150),
            blank_page(120, 180),
        ]));
        Score::new(
            ScoreId::new("s1"),
            source,
            Some("Bella mia fiamma"),
            Some("W. A. Mozart"),
        )
    }

    #[test]
    fn pages_carry_source_dimensions() {
        let score = test_score();
        assert_eq!(score.page_count(), 2);
        let meta = score.page(1).unwrap();
        assert_eq!((meta.width_px, meta.height_px), (120, 180));
    }

    #[test]
    fn out_of_range_page_is_invalid_input() {
        let score = test_score();
        assert!(matches!(
            score.page(2),
            Err(PartbookError::InvalidInput(_))
        ));
        assert!(score.raster(5).is_err());
    }

    #[test]
    fn metadata_defaults_and_sanitisation() {
        let source = Arc::new(ImageRasterSource::new(vec![blank_page(10, 10)]));
        let score = Score::new(ScoreId::new("s2"), source, None, Some("  J.\x00S./Bach "));
        assert_eq!(score.title(), "Untitled");
        assert_eq!(score.composer(), "J.S.Bach");
    }

    #[test]
    fn cached_bytes_counts_all_pages() {
        let score = test_score();
        assert_eq!(score.cached_raster_bytes(), 100 * 150 + 120 * 180);
    }
}
