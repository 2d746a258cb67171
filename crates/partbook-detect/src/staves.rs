//! Clustering staff-line peaks into staves.
//!
//! A staff is a group of five approximately-equidistant peaks. Raw peak
//! groups are accepted, repaired (3–4 peaks refilled by interpolation),
//! trimmed (6 peaks drop the worst-fitting line), or split (oversized groups
//! cut at large gaps). Peaks that fit nowhere become orphans and feed the
//! confidence penalty.

#![allow(clippy::cast_precision_loss)]

use crate::projection::percentile;

/// Lines per staff.
pub const STAFF_LINES: usize = 5;

/// One detected staff: five line Y-coordinates (page space, ascending) and
/// the number of real peaks that produced it (repaired staves keep their
/// original count, which the confidence scoring penalises).
#[derive(Debug, Clone, PartialEq)]
pub struct StaffCandidate {
    /// The five staff-line Y-coordinates.
    pub lines: Vec<f64>,
    /// Real peaks behind the candidate (≤ 5 for repaired staves).
    pub peak_count: usize,
}

impl StaffCandidate {
    /// Y of the top staff line.
    #[inline]
    #[must_use = "returns the top line"]
    pub fn top(&self) -> f64 {
        self.lines[0]
    }

    /// Y of the bottom staff line.
    #[inline]
    #[must_use = "returns the bottom line"]
    pub fn bottom(&self) -> f64 {
        self.lines[self.lines.len() - 1]
    }

    /// Vertical centre of the staff.
    #[inline]
    #[must_use = "returns the centre"]
    pub fn center(&self) -> f64 {
        (self.top() + self.bottom()) / 2.0
    }

    /// Top-to-bottom span of the staff.
    #[inline]
    #[must_use = "returns the span"]
    pub fn span(&self) -> f64 {
        self.bottom() - self.top()
    }
}

/// Result of clustering one peak list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterOutcome {
    /// Accepted staves, ascending by top line.
    pub staves: Vec<StaffCandidate>,
    /// Peaks that fit no staff.
    pub orphans: Vec<f64>,
}

/// Typical spacing between adjacent staff lines: the 25th percentile of all
/// inter-peak gaps, which is robust against the much larger inter-stave gaps.
#[must_use = "returns the typical line spacing"]
pub fn typical_line_spacing(peaks: &[f64]) -> f64 {
    let gaps: Vec<f64> = peaks.windows(2).map(|w| w[1] - w[0]).collect();
    percentile(&gaps, 0.25)
}

/// Group peaks into staves.
///
/// Peaks are walked top to bottom; a new group starts whenever the gap to
/// the next peak exceeds twice the typical spacing or the group's span would
/// exceed one stave's maximum span. Each raw group is then accepted,
/// repaired, trimmed, or split.
#[must_use = "returns the clustering outcome"]
pub fn cluster_into_staves(peaks: &[f64], typical_spacing: f64, tolerance: f64) -> ClusterOutcome {
    // Three peaks is the smallest repairable group.
    if peaks.len() < 3 || typical_spacing <= 0.0 {
        return ClusterOutcome {
            staves: Vec::new(),
            orphans: peaks.to_vec(),
        };
    }

    let mut outcome = ClusterOutcome::default();
    for group in raw_groups(peaks, typical_spacing, tolerance) {
        classify_group(&group, typical_spacing, tolerance, &mut outcome);
    }
    outcome
        .staves
        .sort_by(|a, b| a.top().partial_cmp(&b.top()).unwrap_or(std::cmp::Ordering::Equal));
    outcome
}

/// Whether the peak list contains an "almost-stave" worth a squint retry:
/// a group of four peaks, or five peaks with exactly one outlier gap.
#[must_use = "returns whether a relaxed retry could rescue a stave"]
pub fn has_almost_stave(peaks: &[f64], typical_spacing: f64, tolerance: f64) -> bool {
    if typical_spacing <= 0.0 {
        return false;
    }
    for group in raw_groups(peaks, typical_spacing, tolerance) {
        match group.len() {
            4 => return true,
            5 => {
                let outliers = group
                    .windows(2)
                    .filter(|w| {
                        let gap = w[1] - w[0];
                        (gap - typical_spacing).abs() / typical_spacing > tolerance
                    })
                    .count();
                if outliers == 1 {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split peaks into candidate groups by gap and span limits.
fn raw_groups(peaks: &[f64], typical_spacing: f64, tolerance: f64) -> Vec<Vec<f64>> {
    let max_line_gap = typical_spacing * 2.0;
    let max_span = typical_spacing * (STAFF_LINES - 1) as f64 * (1.0 + tolerance);

    let mut groups = Vec::new();
    let mut current = vec![peaks[0]];
    for pair in peaks.windows(2) {
        let gap = pair[1] - pair[0];
        let span_with_next = pair[1] - current[0];
        if gap > max_line_gap || span_with_next > max_span {
            groups.push(std::mem::take(&mut current));
            current.push(pair[1]);
        } else {
            current.push(pair[1]);
        }
    }
    groups.push(current);
    groups
}

/// Accept, repair, trim, or split one raw group into the outcome.
fn classify_group(
    group: &[f64],
    typical_spacing: f64,
    tolerance: f64,
    outcome: &mut ClusterOutcome,
) {
    match group.len() {
        n if n == STAFF_LINES => outcome.staves.push(StaffCandidate {
            lines: group.to_vec(),
            peak_count: n,
        }),
        n if (STAFF_LINES - 2..STAFF_LINES).contains(&n) => {
            match repair_stave(group, typical_spacing, tolerance) {
                Some(lines) => outcome.staves.push(StaffCandidate {
                    lines,
                    peak_count: n,
                }),
                None => outcome.orphans.extend_from_slice(group),
            }
        }
        n if n == STAFF_LINES + 1 => outcome.staves.push(StaffCandidate {
            lines: trim_stave(group),
            peak_count: STAFF_LINES,
        }),
        n if n > STAFF_LINES => split_oversized(group, typical_spacing, tolerance, outcome),
        _ => outcome.orphans.extend_from_slice(group),
    }
}

/// Refill a 3–4 peak group to five evenly-spaced lines across its span.
/// Succeeds only when the implied spacing stays within tolerance of the
/// typical spacing.
fn repair_stave(group: &[f64], typical_spacing: f64, tolerance: f64) -> Option<Vec<f64>> {
    let span = group[group.len() - 1] - group[0];
    let implied = span / (STAFF_LINES - 1) as f64;
    if typical_spacing > 0.0 && (implied - typical_spacing).abs() / typical_spacing > tolerance {
        return None;
    }
    Some(
        (0..STAFF_LINES)
            .map(|i| group[0] + i as f64 * implied)
            .collect(),
    )
}

/// Drop the one line whose removal yields the most uniform spacing.
fn trim_stave(group: &[f64]) -> Vec<f64> {
    let mut best: Vec<f64> = Vec::new();
    let mut best_var = f64::INFINITY;
    for skip in 0..group.len() {
        let candidate: Vec<f64> = group
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, &v)| v)
            .collect();
        let gaps: Vec<f64> = candidate.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let var = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>();
        if var < best_var {
            best_var = var;
            best = candidate;
        }
    }
    best
}

/// Cut an oversized group into stave-sized chunks, flushing early at gaps
/// larger than 1.8× the group's median gap.
fn split_oversized(
    group: &[f64],
    typical_spacing: f64,
    tolerance: f64,
    outcome: &mut ClusterOutcome,
) {
    let gaps: Vec<f64> = group.windows(2).map(|w| w[1] - w[0]).collect();
    let local_median = percentile(&gaps, 0.5);

    let mut sub: Vec<f64> = vec![group[0]];
    for (i, &gap) in gaps.iter().enumerate() {
        if sub.len() == STAFF_LINES {
            outcome.staves.push(StaffCandidate {
                lines: std::mem::take(&mut sub),
                peak_count: STAFF_LINES,
            });
            sub.push(group[i + 1]);
        } else if gap > local_median * 1.8 {
            flush_sub_group(&mut sub, typical_spacing, tolerance, outcome);
            sub.push(group[i + 1]);
        } else {
            sub.push(group[i + 1]);
        }
    }
    flush_sub_group(&mut sub, typical_spacing, tolerance, outcome);
}

/// Turn a leftover sub-group into a stave (exact or repaired) or orphans.
fn flush_sub_group(
    sub: &mut Vec<f64>,
    typical_spacing: f64,
    tolerance: f64,
    outcome: &mut ClusterOutcome,
) {
    let group = std::mem::take(sub);
    if group.is_empty() {
        return;
    }
    match group.len() {
        n if n == STAFF_LINES => outcome.staves.push(StaffCandidate {
            lines: group,
            peak_count: STAFF_LINES,
        }),
        n if (STAFF_LINES - 2..STAFF_LINES).contains(&n) => {
            match repair_stave(&group, typical_spacing, tolerance) {
                Some(lines) => outcome.staves.push(StaffCandidate {
                    lines,
                    peak_count: n,
                }),
                None => outcome.orphans.extend(group),
            }
        }
        _ => outcome.orphans.extend(group),
    }
}
