//! System-band segmentation.
//!
//! The leftmost barline of every system is a continuous vertical stroke, so
//! the per-row ink count of a narrow strip around the barline column (the
//! *barline vertical signal*) is high inside systems and collapses in the
//! gaps between them. Low-signal runs split the page into candidate system
//! bands; runs that contain staff-line peaks are intra-system gaps and are
//! discarded.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use log::debug;

use crate::barline;
use crate::binary::BinaryImage;

/// A horizontal band of the page believed to hold one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// First row of the band (inclusive).
    pub top: u32,
    /// One past the last row of the band.
    pub bottom: u32,
}

impl Band {
    /// Band height in rows.
    #[inline]
    #[must_use = "returns the band height"]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Whether a page-space Y coordinate falls inside the band.
    #[inline]
    #[must_use = "returns whether y lies in the band"]
    pub fn contains(&self, y: f64) -> bool {
        y >= f64::from(self.top) && y < f64::from(self.bottom)
    }
}

/// Fraction of the signal maximum under which a row counts as "no barline".
const LOW_SIGNAL_FRACTION: f64 = 0.05;

/// Fraction of the page width used for the fallback left-margin strip when
/// no barline column can be located.
const FALLBACK_STRIP_FRACTION: f64 = 0.10;

/// Split the page into system bands.
///
/// `peaks` are the preliminary staff-line peaks from the coarse full-page
/// projection; `line_spacing` their typical separation. The estimated stave
/// span (4 line gaps) controls run merging and the minimum useful band
/// height. Falls back to a single full-page band when segmentation finds
/// nothing usable.
#[must_use = "returns the system bands"]
pub fn segment_bands(bin: &BinaryImage, peaks: &[f64], line_spacing: f64) -> Vec<Band> {
    let height = bin.height();
    let full_page = vec![Band {
        top: 0,
        bottom: height,
    }];
    let stave_span = line_spacing * 4.0;
    if height == 0 || stave_span <= 0.0 {
        return full_page;
    }

    // Locate the strip holding the leftmost barlines. When no dense column
    // exists (no bracket or barline reaches the left margin) fall back to a
    // fixed left-margin strip; the signal will then be flat and gap
    // clustering takes over via the full-page band.
    let (x0, x1) = match barline::find_rough_barline_x(bin, 0, height) {
        Some(rough_x) => {
            let fine = barline::find_fine_barline_x(bin, rough_x, 0, height)
                .map_or(rough_x, |(x, _)| x);
            (fine.saturating_sub(3), (fine + 4).min(bin.width()))
        }
        None => (0, (f64::from(bin.width()) * FALLBACK_STRIP_FRACTION) as u32),
    };

    let signal: Vec<f64> = (0..height)
        .map(|y| f64::from(bin.row_ink(y, x0, x1)))
        .collect();
    let max = signal.iter().fold(0.0_f64, |a, &b| a.max(b));
    if max <= 0.0 {
        return full_page;
    }
    let low_threshold = max * LOW_SIGNAL_FRACTION;

    // Contiguous low-signal runs, as (start, end) half-open row ranges.
    let mut runs: Vec<(u32, u32)> = Vec::new();
    let mut start: Option<u32> = None;
    for (y, &v) in signal.iter().enumerate() {
        if v < low_threshold {
            if start.is_none() {
                start = Some(y as u32);
            }
        } else if let Some(s) = start.take() {
            runs.push((s, y as u32));
        }
    }
    if let Some(s) = start {
        runs.push((s, height));
    }

    // Merge runs separated by less than 1.5 stave spans: tapered barline
    // ends leave thin ink islands inside a real inter-system gap.
    let merge_limit = (stave_span * 1.5) as u32;
    let mut merged: Vec<(u32, u32)> = Vec::new();
    for run in runs {
        match merged.last_mut() {
            Some(prev) if run.0 - prev.1 < merge_limit => prev.1 = run.1,
            _ => merged.push(run),
        }
    }

    // Runs containing staff-line peaks are intra-system gaps, not
    // between-system gaps.
    merged.retain(|&(s, e)| {
        !peaks
            .iter()
            .any(|&p| p >= f64::from(s) && p < f64::from(e))
    });

    // The complement of the surviving runs is the band set.
    let mut bands: Vec<Band> = Vec::new();
    let mut cursor = 0;
    for &(s, e) in &merged {
        if s > cursor {
            bands.push(Band {
                top: cursor,
                bottom: s,
            });
        }
        cursor = cursor.max(e);
    }
    if cursor < height {
        bands.push(Band {
            top: cursor,
            bottom: height,
        });
    }

    // Too-short bands cannot hold a system.
    let min_band = (stave_span * 2.0) as u32;
    bands.retain(|b| b.height() >= min_band);
    if bands.is_empty() {
        debug!("band segmentation found no usable bands, using full page");
        return full_page;
    }

    // Pad each band by half a stave span so smoothing does not clip the
    // first and last staff-line peaks, without crossing into a neighbour.
    let pad = (stave_span / 2.0) as u32;
    let padded: Vec<Band> = bands
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let lo = if i == 0 { 0 } else { bands[i - 1].bottom };
            let hi = bands.get(i + 1).map_or(height, |n| n.top);
            Band {
                top: b.top.saturating_sub(pad).max(lo),
                bottom: (b.bottom + pad).min(hi),
            }
        })
        .collect();
    debug!(
        "band segmentation: {} bands over strip x [{x0}, {x1})",
        padded.len()
    );
    padded
}
