//! Binarisation of rasterised score pages.
//!
//! Pages arrive as 8-bit grayscale (white = 255). Otsu's threshold separates
//! ink from paper; the binarised image stores ink as 1 so projection sums are
//! plain pixel counts.

use image::GrayImage;
use imageproc::contrast::otsu_level;

/// A binarised page: row-major bytes, 1 = ink, 0 = paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryImage {
    /// Binarise with Otsu's automatic threshold.
    ///
    /// Pixels strictly darker than the threshold count as ink.
    #[must_use = "returns the binarised image"]
    pub fn binarize(gray: &GrayImage) -> Self {
        let level = otsu_level(gray);
        Self::with_threshold(gray, level)
    }

    /// Binarise with an explicit threshold (exposed for tests and tuning).
    #[must_use = "returns the binarised image"]
    pub fn with_threshold(gray: &GrayImage, level: u8) -> Self {
        let (width, height) = gray.dimensions();
        let data = gray.as_raw().iter().map(|&p| u8::from(p < level)).collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Image width in pixels.
    #[inline]
    #[must_use = "returns the width"]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    #[must_use = "returns the height"]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at (x, y) is ink. Out-of-bounds reads are paper.
    #[inline]
    #[must_use = "returns whether the pixel is ink"]
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y * self.width + x) as usize] != 0
    }

    /// One row of the image as a byte slice (1 = ink).
    #[inline]
    #[must_use = "returns the row slice"]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Ink pixels in row `y` between columns `x0` (inclusive) and `x1`
    /// (exclusive), clamped to the image.
    #[must_use = "returns the ink count"]
    pub fn row_ink(&self, y: u32, x0: u32, x1: u32) -> u32 {
        if y >= self.height {
            return 0;
        }
        let x0 = x0.min(self.width) as usize;
        let x1 = x1.min(self.width) as usize;
        if x0 >= x1 {
            return 0;
        }
        let row = self.row(y);
        row[x0..x1].iter().map(|&v| u32::from(v)).sum()
    }

    /// Ink pixels in column `x` between rows `y0` (inclusive) and `y1`
    /// (exclusive), clamped to the image.
    #[must_use = "returns the ink count"]
    pub fn column_ink(&self, x: u32, y0: u32, y1: u32) -> u32 {
        if x >= self.width {
            return 0;
        }
        let y0 = y0.min(self.height);
        let y1 = y1.min(self.height);
        (y0..y1).map(|y| u32::from(self.is_ink(x, y))).sum()
    }

    /// Fraction of pixels that are ink, in [0, 1].
    #[must_use = "returns the ink fraction"]
    pub fn ink_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let ink: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        ink as f64 / self.data.len() as f64
    }
}
