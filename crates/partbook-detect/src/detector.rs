//! The staff detector: the full per-page pipeline.
//!
//! Given one rasterised page, produce the tentative divider positions,
//! system flags, suggested (empty) strip names, and a confidence value. The
//! detector never fails: adversarial input lowers the confidence instead of
//! raising an error, so the UI can route the page to human review.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::bands::{segment_bands, Band};
use crate::binary::BinaryImage;
use crate::confidence::compute_confidence;
use crate::projection::{find_peaks, mean_std, row_projection, smooth, smoothing_kernel_for};
use crate::staves::{
    cluster_into_staves, has_almost_stave, typical_line_spacing, StaffCandidate,
};
use crate::systems::{assemble_systems, confirm_systems, dividers_from_systems};

/// Detection result for one page, in the caller's display-pixel space.
///
/// Always well-formed: `system_flags.len() == dividers.len()` and
/// `strip_names.len() == dividers.len() - 1` (zero for an empty result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Ascending divider Y-coordinates, display pixels, rounded once.
    pub dividers: Vec<i32>,
    /// Parallel flags; true marks a system-top divider.
    pub system_flags: Vec<bool>,
    /// Suggested strip names (all empty; naming is the editor's job).
    pub strip_names: Vec<String>,
    /// Blended confidence in [0, 1].
    pub confidence: f64,
    /// True when the result should be reviewed by a human (0.3 ≤ c < 0.7).
    pub warning: bool,
    /// Per-signal explanations of the confidence value.
    pub reasons: Vec<String>,
    /// Staves found (diagnostic; survives even when dividers are withheld).
    pub stave_count: usize,
    /// Systems found (diagnostic).
    pub system_count: usize,
}

impl Detection {
    /// An empty result with the given confidence and explanations.
    #[must_use = "constructors return a new instance"]
    pub fn empty(confidence: f64, reasons: Vec<String>) -> Self {
        Self {
            dividers: Vec::new(),
            system_flags: Vec::new(),
            strip_names: Vec::new(),
            confidence,
            warning: false,
            reasons,
            stave_count: 0,
            system_count: 0,
        }
    }
}

/// Tuning knobs for the detector. The defaults match scanned orchestral
/// scores at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Peak threshold: `mean + k · stddev` of the smoothed projection.
    pub peak_threshold_k: f64,
    /// Relative tolerance when clustering peaks into staves.
    pub cluster_tolerance: f64,
    /// Multiplier applied to the tolerance for the squint-rescue retry.
    pub squint_relaxation: f64,
    /// Ink fraction under which the page counts as blank.
    pub min_ink_fraction: f64,
    /// Below this confidence the dividers are withheld entirely.
    pub min_confidence: f64,
    /// Below this confidence the result carries a review warning.
    pub review_confidence: f64,
}

impl Default for DetectorConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorConfig {
    /// Default configuration.
    #[must_use = "constructors return a new instance"]
    pub const fn new() -> Self {
        Self {
            peak_threshold_k: 1.0,
            cluster_tolerance: 0.3,
            squint_relaxation: 2.0,
            min_ink_fraction: 1e-4,
            min_confidence: 0.3,
            review_confidence: 0.7,
        }
    }
}

/// Projection-profile staff detector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StaffDetector {
    config: DetectorConfig,
}

impl StaffDetector {
    /// Detector with default tuning.
    #[inline]
    #[must_use = "constructors return a new instance"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector with explicit tuning.
    #[inline]
    #[must_use = "constructors return a new instance"]
    pub const fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Run detection on one page and scale the result to `display_width`.
    ///
    /// Never fails; degenerate input produces an empty result with
    /// confidence 0.
    #[must_use = "returns the detection result"]
    pub fn detect(&self, page: &GrayImage, display_width: f64) -> Detection {
        let (width, height) = page.dimensions();
        if width == 0 || height == 0 {
            return Detection::empty(0.0, vec!["Empty page image".to_string()]);
        }
        let scale = if display_width > 0.0 {
            display_width / f64::from(width)
        } else {
            1.0
        };

        let bin = BinaryImage::binarize(page);
        if bin.ink_fraction() < self.config.min_ink_fraction {
            return Detection::empty(0.0, vec!["Near-empty page after binarisation".to_string()]);
        }

        // Coarse full-page pass: estimate line spacing and seed the
        // band segmentation.
        let projection = row_projection(&bin, 0, width);
        let smoothed = smooth(&projection, smoothing_kernel_for(height as usize)).to_vec();
        let (mean, std) = mean_std(&smoothed);
        let threshold = mean + self.config.peak_threshold_k * std;
        let min_distance = (height as usize / 300).max(3);
        let prelim: Vec<f64> = find_peaks(&smoothed, threshold, min_distance)
            .into_iter()
            .map(|i| i as f64)
            .collect();
        if prelim.is_empty() {
            return Detection::empty(0.0, vec!["No staff-line peaks found".to_string()]);
        }
        let spacing = typical_line_spacing(&prelim).max(1.0);

        // Split the page into system bands.
        let bands = segment_bands(&bin, &prelim, spacing);

        // Per-band stave detection with squint rescue.
        let mut band_staves: Vec<Vec<StaffCandidate>> = Vec::with_capacity(bands.len());
        let mut orphan_peaks = 0;
        let mut total_peaks = 0;
        for band in &bands {
            let (staves, orphans, peaks) = self.detect_band(&smoothed, band, spacing);
            orphan_peaks += orphans;
            total_peaks += peaks;
            band_staves.push(staves);
        }
        let stave_count: usize = band_staves.iter().map(Vec::len).sum();
        if stave_count == 0 {
            return Detection::empty(0.0, vec!["No staves found".to_string()]);
        }

        // Assemble systems and confirm barlines.
        let groups = assemble_systems(&bands, band_staves);
        let systems = confirm_systems(&bin, groups);
        let (dividers, system_flags) = dividers_from_systems(&systems, height);

        // Blend the confidence signals.
        let confidence = compute_confidence(&systems, orphan_peaks, total_peaks);
        debug!(
            "detected {stave_count} staves in {} systems, confidence {:.2}",
            systems.len(),
            confidence.value
        );

        if confidence.value < self.config.min_confidence {
            let mut result = Detection::empty(confidence.value, confidence.reasons);
            result.stave_count = stave_count;
            result.system_count = systems.len();
            return result;
        }

        // Single rounding site: backend-pixel floats scale to display pixels
        // and become integers here.
        let dividers: Vec<i32> = dividers.iter().map(|&y| (y * scale).round() as i32).collect();
        let strip_names = vec![String::new(); dividers.len().saturating_sub(1)];
        Detection {
            warning: confidence.value < self.config.review_confidence,
            system_flags,
            strip_names,
            confidence: confidence.value,
            reasons: confidence.reasons,
            stave_count,
            system_count: systems.len(),
            dividers,
        }
    }

    /// Stave detection for one band: peaks, clustering, the squint retry.
    /// Returns (staves in page space, orphan peak count, total peak count).
    fn detect_band(
        &self,
        smoothed: &[f64],
        band: &Band,
        spacing: f64,
    ) -> (Vec<StaffCandidate>, usize, usize) {
        let slice = &smoothed[band.top as usize..band.bottom as usize];
        let (mean, std) = mean_std(slice);
        let threshold = mean + self.config.peak_threshold_k * std;
        // Half the inter-line distance keeps double detections of one line
        // apart while never suppressing a true neighbour.
        let min_distance = ((spacing / 2.0) as usize).max(3);
        let peaks: Vec<f64> = find_peaks(slice, threshold, min_distance)
            .into_iter()
            .map(|i| i as f64 + f64::from(band.top))
            .collect();
        let total = peaks.len();

        let tolerance = self.config.cluster_tolerance;
        let mut outcome = cluster_into_staves(&peaks, spacing, tolerance);
        if outcome.staves.is_empty() && has_almost_stave(&peaks, spacing, tolerance) {
            debug!(
                "band [{}, {}): squint rescue with relaxed tolerance",
                band.top, band.bottom
            );
            outcome =
                cluster_into_staves(&peaks, spacing, tolerance * self.config.squint_relaxation);
        }
        (outcome.staves, outcome.orphans.len(), total)
    }
}
