//! Projection profiles and peak detection.
//!
//! The detector's primitive signal is the projection profile: the per-row
//! (or per-column) ink count of the binarised page. Staff lines span nearly
//! the full page width, so their rows stand out as sharp peaks in the
//! horizontal projection; everything else (noteheads, text, whitespace)
//! stays low.

// Signal indices and pixel counts fit comfortably in f64; the casts are
// lossless for practical page sizes.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use ndarray::Array1;

use crate::binary::BinaryImage;

/// Horizontal projection: ink count per row, over the given column range.
#[must_use = "returns the projection signal"]
pub fn row_projection(bin: &BinaryImage, x0: u32, x1: u32) -> Array1<f64> {
    Array1::from_iter((0..bin.height()).map(|y| f64::from(bin.row_ink(y, x0, x1))))
}

/// Vertical projection: ink count per column over the given row range,
/// restricted to columns `[x0, x1)`.
#[must_use = "returns the projection signal"]
pub fn column_projection(bin: &BinaryImage, y0: u32, y1: u32, x0: u32, x1: u32) -> Array1<f64> {
    let x1 = x1.min(bin.width());
    let x0 = x0.min(x1);
    Array1::from_iter((x0..x1).map(|x| f64::from(bin.column_ink(x, y0, y1))))
}

/// Moving-average smoothing kernel size for a page of the given height:
/// roughly height/500, odd, at least 3. Suppresses notehead and text noise
/// without flattening staff-line peaks.
#[must_use = "returns the kernel size"]
pub fn smoothing_kernel_for(height: usize) -> usize {
    let k = (height / 500).max(3);
    if k % 2 == 0 {
        k + 1
    } else {
        k
    }
}

/// Moving-average smoothing with a centred window, edges truncated.
#[must_use = "returns the smoothed signal"]
pub fn smooth(signal: &Array1<f64>, kernel: usize) -> Array1<f64> {
    let n = signal.len();
    if n == 0 || kernel <= 1 {
        return signal.clone();
    }
    let half = kernel / 2;
    let mut out = Array1::zeros(n);
    // Prefix sums keep this O(n) even for the heavy squint-rescue kernel.
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in signal {
        acc += v;
        prefix.push(acc);
    }
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        out[i] = (prefix[hi] - prefix[lo]) / kernel as f64;
    }
    out
}

/// Mean and standard deviation of a signal slice.
#[must_use = "returns (mean, stddev)"]
pub fn mean_std(signal: &[f64]) -> (f64, f64) {
    if signal.is_empty() {
        return (0.0, 0.0);
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let var = signal.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// The value at the given fraction (0–1) of the sorted sequence; 0 when empty.
#[must_use = "returns the percentile value"]
pub fn percentile(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() as f64 - 1.0) * fraction.clamp(0.0, 1.0)).floor() as usize;
    sorted[idx]
}

/// Local maxima of `signal` above `threshold`, separated by at least
/// `min_distance` samples.
///
/// Plateaus (runs of equal values, common after box smoothing) report their
/// centre. When two candidates violate the separation, the taller one wins.
/// Returned indices are ascending.
#[must_use = "returns the peak indices"]
pub fn find_peaks(signal: &[f64], threshold: f64, min_distance: usize) -> Vec<usize> {
    let n = signal.len();
    let mut candidates: Vec<(usize, f64)> = Vec::new();

    let mut i = 0;
    while i < n {
        let v = signal[i];
        if v <= threshold {
            i += 1;
            continue;
        }
        // Extend over the plateau of equal values.
        let mut j = i;
        while j + 1 < n && signal[j + 1] == v {
            j += 1;
        }
        let rises = i == 0 || signal[i - 1] < v;
        let falls = j + 1 == n || signal[j + 1] < v;
        if rises && falls {
            candidates.push(((i + j) / 2, v));
        }
        i = j + 1;
    }

    // Greedy suppression by height, as scipy's find_peaks does for distance.
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<usize> = Vec::new();
    for (idx, _) in candidates {
        if kept
            .iter()
            .all(|&k| idx.abs_diff(k) >= min_distance.max(1))
        {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn row_projection_counts_line_pixels() {
        let mut img = GrayImage::from_pixel(30, 10, Luma([255]));
        for x in 0..30 {
            img.put_pixel(x, 6, Luma([0]));
        }
        let bin = BinaryImage::with_threshold(&img, 128);
        let proj = row_projection(&bin, 0, 30);
        assert_eq!(proj[6], 30.0);
        assert_eq!(proj[5], 0.0);
    }

    #[test]
    fn smoothing_spreads_an_impulse() {
        let signal = Array1::from(vec![0.0, 0.0, 9.0, 0.0, 0.0]);
        let smoothed = smooth(&signal, 3);
        assert_eq!(smoothed[1], 3.0);
        assert_eq!(smoothed[2], 3.0);
        assert_eq!(smoothed[3], 3.0);
        // Edge windows are truncated but still divided by the kernel.
        assert_eq!(smoothed[0], 0.0);
        assert_eq!(smoothed[4], 0.0);
    }

    #[test]
    fn kernel_is_odd_and_at_least_three() {
        assert_eq!(smoothing_kernel_for(100), 3);
        assert_eq!(smoothing_kernel_for(3508), 7);
        assert_eq!(smoothing_kernel_for(5000), 11);
    }

    #[test]
    fn peaks_found_above_threshold() {
        let signal = vec![0.0, 5.0, 0.0, 0.0, 8.0, 0.0, 1.0];
        let peaks = find_peaks(&signal, 2.0, 1);
        assert_eq!(peaks, vec![1, 4]);
    }

    #[test]
    fn plateau_reports_centre() {
        let signal = vec![0.0, 2.0, 7.0, 7.0, 7.0, 2.0, 0.0];
        let peaks = find_peaks(&signal, 1.0, 1);
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    fn min_distance_keeps_taller_peak() {
        let signal = vec![0.0, 6.0, 0.0, 9.0, 0.0];
        let peaks = find_peaks(&signal, 1.0, 4);
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    fn rising_plateau_is_not_a_peak() {
        let signal = vec![0.0, 5.0, 5.0, 8.0, 0.0];
        let peaks = find_peaks(&signal, 1.0, 1);
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    fn percentile_picks_lower_quartile() {
        let values = vec![40.0, 40.0, 40.0, 300.0, 40.0, 40.0, 300.0, 40.0];
        assert_eq!(percentile(&values, 0.25), 40.0);
        assert_eq!(percentile(&values, 1.0), 300.0);
    }

    #[test]
    fn mean_std_of_constant_signal() {
        let (mean, std) = mean_std(&[4.0, 4.0, 4.0]);
        assert_eq!(mean, 4.0);
        assert_eq!(std, 0.0);
    }
}
