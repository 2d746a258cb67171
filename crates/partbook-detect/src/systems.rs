//! System assembly and divider placement.
//!
//! Detected staves are grouped into systems, each candidate system is
//! checked for a confirming barline, and the groups are translated into the
//! divider/flag arrays the user edits.

#![allow(clippy::cast_precision_loss)]

use crate::barline;
use crate::bands::Band;
use crate::binary::BinaryImage;
use crate::projection::percentile;
use crate::staves::StaffCandidate;

/// One assembled system: its staves plus the barline-confirmation result.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    /// Staves of the system, ascending.
    pub staves: Vec<StaffCandidate>,
    /// Barline column when one was located.
    pub barline_x: Option<u32>,
    /// Confirmed barline span, `None` when unconfirmed.
    pub barline_span: Option<(u32, u32)>,
}

impl System {
    /// Top line of the first stave.
    #[inline]
    #[must_use = "returns the system top"]
    pub fn top(&self) -> f64 {
        self.staves[0].top()
    }

    /// Bottom line of the last stave.
    #[inline]
    #[must_use = "returns the system bottom"]
    pub fn bottom(&self) -> f64 {
        self.staves[self.staves.len() - 1].bottom()
    }

    /// Whether the barline confirmation succeeded.
    #[inline]
    #[must_use = "returns whether the system is barline-confirmed"]
    pub const fn confirmed(&self) -> bool {
        self.barline_span.is_some()
    }
}

/// Group staves into systems.
///
/// The band assembly is trusted when every band holds the same number of
/// staves and that number is at least two. Anything else (straggler bands,
/// single-stave bands, a short final system) falls back to gap clustering
/// over the flat stave list.
#[must_use = "returns the grouped staves"]
pub fn assemble_systems(
    bands: &[Band],
    band_staves: Vec<Vec<StaffCandidate>>,
) -> Vec<Vec<StaffCandidate>> {
    debug_assert_eq!(bands.len(), band_staves.len());
    let non_empty: Vec<Vec<StaffCandidate>> =
        band_staves.into_iter().filter(|b| !b.is_empty()).collect();
    if non_empty.is_empty() {
        return Vec::new();
    }

    let first_count = non_empty[0].len();
    let balanced = first_count >= 2 && non_empty.iter().all(|b| b.len() == first_count);
    if balanced {
        return non_empty;
    }

    let mut all: Vec<StaffCandidate> = non_empty.into_iter().flatten().collect();
    all.sort_by(|a, b| a.top().partial_cmp(&b.top()).unwrap_or(std::cmp::Ordering::Equal));
    cluster_by_gap(all)
}

/// Split a flat stave list into systems wherever the gap between consecutive
/// stave centres exceeds twice the median gap.
#[must_use = "returns the grouped staves"]
pub fn cluster_by_gap(staves: Vec<StaffCandidate>) -> Vec<Vec<StaffCandidate>> {
    if staves.len() <= 1 {
        return if staves.is_empty() {
            Vec::new()
        } else {
            vec![staves]
        };
    }

    let gaps: Vec<f64> = staves
        .windows(2)
        .map(|w| w[1].center() - w[0].center())
        .collect();
    let threshold = percentile(&gaps, 0.5) * 2.0;

    let mut systems: Vec<Vec<StaffCandidate>> = Vec::new();
    let mut current: Vec<StaffCandidate> = Vec::new();
    for (i, stave) in staves.into_iter().enumerate() {
        if i > 0 && gaps[i - 1] > threshold {
            systems.push(std::mem::take(&mut current));
        }
        current.push(stave);
    }
    systems.push(current);
    systems
}

/// Attach barline confirmation to each candidate system.
#[must_use = "returns the confirmed systems"]
pub fn confirm_systems(bin: &BinaryImage, groups: Vec<Vec<StaffCandidate>>) -> Vec<System> {
    groups
        .into_iter()
        .map(|staves| {
            let y0 = staves[0].top().floor().max(0.0) as u32;
            let y1 = staves[staves.len() - 1].bottom().ceil() as u32 + 1;
            let barline_x = barline::find_rough_barline_x(bin, y0, y1)
                .and_then(|rough| barline::find_fine_barline_x(bin, rough, y0, y1))
                .map(|(x, _)| x);
            let barline_span = barline_x.and_then(|x| barline::confirm_barline(bin, x, y0, y1));
            System {
                staves,
                barline_x,
                barline_span,
            }
        })
        .collect()
}

/// Divider positions and system flags synthesised from the systems.
///
/// Each system contributes a top divider, a part divider at every
/// inter-stave midpoint, and a bottom divider. Boundary dividers around the
/// page edges sit one typical half-gap away from the staff; across an
/// inter-system gap the outgoing system closes a third of the way in and the
/// incoming system opens at the midpoint, which keeps the sequence strictly
/// increasing and leaves the dead strip between them.
///
/// System flags mark every system-top divider, but only on pages holding at
/// least two systems; a lone system has no dead space to delimit.
#[must_use = "returns (dividers, system_flags)"]
pub fn dividers_from_systems(systems: &[System], page_height: u32) -> (Vec<f64>, Vec<bool>) {
    let mut dividers: Vec<f64> = Vec::new();
    let mut flags: Vec<bool> = Vec::new();
    if systems.is_empty() {
        return (dividers, flags);
    }

    let margin = typical_margin(systems);
    let flag_tops = systems.len() >= 2;

    for (s, system) in systems.iter().enumerate() {
        let first_top = system.top();
        let last_bottom = system.bottom();

        let top_y = if s == 0 {
            (first_top - margin).max(0.0)
        } else {
            let prev_bottom = systems[s - 1].bottom();
            prev_bottom + (first_top - prev_bottom) / 2.0
        };
        dividers.push(top_y);
        flags.push(flag_tops);

        for pair in system.staves.windows(2) {
            dividers.push((pair[0].bottom() + pair[1].top()) / 2.0);
            flags.push(false);
        }

        let bottom_y = if let Some(next) = systems.get(s + 1) {
            last_bottom + (next.top() - last_bottom) / 3.0
        } else {
            (last_bottom + margin).min(f64::from(page_height.saturating_sub(1)))
        };
        dividers.push(bottom_y);
        flags.push(false);
    }

    (dividers, flags)
}

/// Median half-gap between adjacent staves across all systems: the natural
/// breathing room boundary dividers replicate. Falls back to half the median
/// stave span for single-stave systems.
fn typical_margin(systems: &[System]) -> f64 {
    let mut half_gaps: Vec<f64> = Vec::new();
    for system in systems {
        for pair in system.staves.windows(2) {
            half_gaps.push((pair[1].top() - pair[0].bottom()) / 2.0);
        }
    }
    if !half_gaps.is_empty() {
        return percentile(&half_gaps, 0.5);
    }
    let spans: Vec<f64> = systems
        .iter()
        .flat_map(|s| s.staves.iter().map(StaffCandidate::span))
        .collect();
    if spans.is_empty() {
        50.0
    } else {
        percentile(&spans, 0.5) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stave(top: f64, spacing: f64) -> StaffCandidate {
        StaffCandidate {
            lines: (0..5).map(|i| top + f64::from(i) * spacing).collect(),
            peak_count: 5,
        }
    }

    fn system(tops: &[f64]) -> System {
        System {
            staves: tops.iter().map(|&t| stave(t, 40.0)).collect(),
            barline_x: None,
            barline_span: None,
        }
    }

    #[test]
    fn balanced_bands_are_trusted() {
        let bands = vec![
            Band { top: 0, bottom: 500 },
            Band {
                top: 500,
                bottom: 1000,
            },
        ];
        let groups = assemble_systems(
            &bands,
            vec![
                vec![stave(100.0, 40.0), stave(300.0, 40.0)],
                vec![stave(600.0, 40.0), stave(800.0, 40.0)],
            ],
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn unbalanced_bands_fall_back_to_gap_clustering() {
        // A 2-stave band and a 1-stave band: the balance check fails, and
        // gap clustering regroups the flat list.
        let bands = vec![
            Band { top: 0, bottom: 600 },
            Band {
                top: 600,
                bottom: 1200,
            },
        ];
        let groups = assemble_systems(
            &bands,
            vec![
                vec![stave(100.0, 40.0), stave(360.0, 40.0)],
                vec![stave(900.0, 40.0)],
            ],
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn gap_clustering_splits_on_double_median() {
        let staves = vec![
            stave(100.0, 40.0),
            stave(400.0, 40.0),
            stave(700.0, 40.0),
            // 900px jump: a new system.
            stave(1600.0, 40.0),
            stave(1900.0, 40.0),
        ];
        let systems = cluster_by_gap(staves);
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].len(), 3);
        assert_eq!(systems[1].len(), 2);
    }

    #[test]
    fn single_stave_clusters_alone() {
        let systems = cluster_by_gap(vec![stave(100.0, 40.0)]);
        assert_eq!(systems.len(), 1);
        assert!(cluster_by_gap(Vec::new()).is_empty());
    }

    #[test]
    fn one_system_dividers_and_flags() {
        // Four staves, 160px span, 300px between staves.
        let sys = system(&[1000.0, 1460.0, 1920.0, 2380.0]);
        let (dividers, flags) = dividers_from_systems(&[sys], 3508);
        assert_eq!(dividers.len(), 5);
        assert_eq!(flags, vec![false; 5]);
        // Margin = half the 300px inter-stave gap.
        assert_eq!(dividers[0], 850.0);
        assert_eq!(dividers[1], 1310.0); // midpoint of 1160..1460
        assert_eq!(dividers[4], 2690.0);
        assert!(dividers.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn two_system_dividers_and_flags() {
        let sys1 = system(&[1000.0, 1460.0, 1920.0]);
        let sys2 = system(&[2680.0, 3140.0, 3600.0]); // 600px after sys1 bottom
        let (dividers, flags) = dividers_from_systems(&[sys1, sys2], 4000);
        assert_eq!(dividers.len(), 8);
        assert_eq!(
            flags,
            vec![true, false, false, false, true, false, false, false]
        );
        // Sys1 closes a third into the gap, sys2 opens at the midpoint.
        assert_eq!(dividers[3], 2280.0);
        assert_eq!(dividers[4], 2380.0);
        assert!(dividers.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn empty_systems_yield_no_dividers() {
        let (dividers, flags) = dividers_from_systems(&[], 1000);
        assert!(dividers.is_empty());
        assert!(flags.is_empty());
    }
}
