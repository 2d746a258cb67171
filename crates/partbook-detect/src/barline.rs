//! Barline location and confirmation.
//!
//! The leftmost barline joins all staves of one system and is the key
//! structural signal: finding it confirms a candidate system, and its column
//! anchors the band-segmentation strip. Location is two-phase: a rough pass
//! picks the first dense column cluster (which lands on the bracket/barline
//! complex), a fine pass scans right for the thin continuous stroke.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::binary::BinaryImage;

/// Only the left fraction of the page is searched for barlines.
const SEARCH_RATIO: f64 = 0.6;

/// Minimum ink fraction of the band height for a column to qualify.
const MIN_INK_RATIO: f64 = 0.15;

/// Maximum column gap inside one candidate cluster.
const CLUSTER_GAP: u32 = 5;

/// How far right of the rough X the fine pass scans.
const FINE_SEARCH_RIGHT: u32 = 30;

/// Half-width of the jitter strip used for confirmation.
pub const JITTER: u32 = 3;

/// Minimum fraction of the band height a confirmed barline must span.
pub const MIN_SPAN_RATIO: f64 = 0.8;

/// Rough barline X for the row band `[y0, y1)`: the peak column of the first
/// cluster of dense columns in the left part of the page.
#[must_use = "returns the rough barline column if found"]
pub fn find_rough_barline_x(bin: &BinaryImage, y0: u32, y1: u32) -> Option<u32> {
    let y1 = y1.min(bin.height());
    if y0 >= y1 {
        return None;
    }
    let band_h = y1 - y0;
    let search_w = (f64::from(bin.width()) * SEARCH_RATIO) as u32;
    let min_ink = (f64::from(band_h) * MIN_INK_RATIO) as u32;

    let counts: Vec<(u32, u32)> = (0..search_w)
        .map(|x| (x, bin.column_ink(x, y0, y1)))
        .filter(|&(_, ink)| ink >= min_ink.max(1))
        .collect();
    let first = counts.first()?.0;

    // Walk the first cluster of adjacent candidates and take its peak.
    let mut best = *counts.first()?;
    let mut prev = first;
    for &(x, ink) in counts.iter().skip(1) {
        if x - prev > CLUSTER_GAP {
            break;
        }
        if ink > best.1 {
            best = (x, ink);
        }
        prev = x;
    }
    Some(best.0)
}

/// Fine barline X: the column within [`FINE_SEARCH_RIGHT`] px right of the
/// rough X with the longest unbroken vertical ink run. The barline is thin
/// and continuous; brackets are wider but break where they curve.
#[must_use = "returns (column, longest run) if any ink is present"]
pub fn find_fine_barline_x(
    bin: &BinaryImage,
    rough_x: u32,
    y0: u32,
    y1: u32,
) -> Option<(u32, u32)> {
    let y1 = y1.min(bin.height());
    let x_end = (rough_x + FINE_SEARCH_RIGHT + 1).min(bin.width());

    let mut best: Option<(u32, u32)> = None;
    for x in rough_x..x_end {
        let mut run = 0;
        let mut max_run = 0;
        for y in y0..y1 {
            if bin.is_ink(x, y) {
                run += 1;
                max_run = max_run.max(run);
            } else {
                run = 0;
            }
        }
        if max_run > 0 && best.map_or(true, |(_, r)| max_run > r) {
            best = Some((x, max_run));
        }
    }
    best
}

/// Confirm a system barline: within a ±[`JITTER`] px strip around `fine_x`,
/// a row counts as inky when any strip column is inky (bridging 1–2 px
/// wobble); the longest contiguous inky run must span at least
/// [`MIN_SPAN_RATIO`] of the band height.
///
/// Returns the run's `(top, bottom)` rows when it qualifies.
#[must_use = "returns the confirmed span if the barline qualifies"]
pub fn confirm_barline(bin: &BinaryImage, fine_x: u32, y0: u32, y1: u32) -> Option<(u32, u32)> {
    let y1 = y1.min(bin.height());
    if y0 >= y1 {
        return None;
    }
    let band_h = y1 - y0;
    let x0 = fine_x.saturating_sub(JITTER);
    let x1 = (fine_x + JITTER + 1).min(bin.width());

    let mut best: Option<(u32, u32)> = None;
    let mut run_start: Option<u32> = None;
    for y in y0..=y1 {
        let inky = y < y1 && (x0..x1).any(|x| bin.is_ink(x, y));
        match (inky, run_start) {
            (true, None) => run_start = Some(y),
            (false, Some(s)) => {
                if best.map_or(true, |(bs, be)| y - s > be - bs) {
                    best = Some((s, y));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let (top, bottom) = best?;
    if f64::from(bottom - top) < f64::from(band_h) * MIN_SPAN_RATIO {
        return None;
    }
    Some((top, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Page with a 2px barline at x=60 spanning rows 100..500, and a wider
    /// broken "bracket" at x=40.
    fn barline_page() -> BinaryImage {
        let mut img = GrayImage::from_pixel(400, 600, Luma([255]));
        for y in 100..500 {
            for x in 60..62 {
                img.put_pixel(x, y, Luma([0]));
            }
            // Bracket: thick but with gaps where it curves.
            if !(280..320).contains(&y) {
                for x in 40..46 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        BinaryImage::with_threshold(&img, 128)
    }

    #[test]
    fn rough_x_lands_on_bracket_cluster() {
        let bin = barline_page();
        let rough = find_rough_barline_x(&bin, 100, 500).unwrap();
        assert!((40..46).contains(&rough), "rough x = {rough}");
    }

    #[test]
    fn fine_x_prefers_continuous_stroke() {
        let bin = barline_page();
        let rough = find_rough_barline_x(&bin, 100, 500).unwrap();
        let (fine, run) = find_fine_barline_x(&bin, rough, 100, 500).unwrap();
        assert!((60..62).contains(&fine), "fine x = {fine}");
        assert_eq!(run, 400);
    }

    #[test]
    fn full_span_barline_is_confirmed() {
        let bin = barline_page();
        let span = confirm_barline(&bin, 60, 100, 500).unwrap();
        assert_eq!(span, (100, 500));
    }

    #[test]
    fn broken_barline_is_rejected() {
        // The bracket column alone has a 40-row hole: under the 80% span.
        let bin = barline_page();
        assert!(confirm_barline(&bin, 40, 100, 500).is_none());
    }

    #[test]
    fn jitter_strip_bridges_wobble() {
        let mut img = GrayImage::from_pixel(200, 300, Luma([255]));
        // A barline that drifts one column halfway down.
        for y in 20..160 {
            img.put_pixel(90, y, Luma([0]));
        }
        for y in 160..280 {
            img.put_pixel(91, y, Luma([0]));
        }
        let bin = BinaryImage::with_threshold(&img, 128);
        let span = confirm_barline(&bin, 90, 20, 280).unwrap();
        assert_eq!(span, (20, 280));
    }

    #[test]
    fn blank_band_has_no_barline() {
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        let bin = BinaryImage::with_threshold(&img, 128);
        assert!(find_rough_barline_x(&bin, 0, 100).is_none());
        assert!(find_fine_barline_x(&bin, 0, 0, 100).is_none());
        assert!(confirm_barline(&bin, 50, 0, 100).is_none());
    }
}
