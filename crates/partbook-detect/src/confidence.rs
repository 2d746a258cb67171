//! Confidence scoring.
//!
//! Three independent quality signals are blended: how many systems a
//! continuous barline confirms, how consistent the inter-system gaps are,
//! and how many staves look structurally sound. The weights are tuning
//! knobs, not contracts.

#![allow(clippy::cast_precision_loss)]

use crate::projection::mean_std;
use crate::staves::STAFF_LINES;
use crate::systems::System;

/// Weight of the barline-confirmation fraction.
const W_BARLINE: f64 = 0.50;
/// Weight of the inter-system gap consistency.
const W_GAPS: f64 = 0.25;
/// Weight of the per-stave integrity score.
const W_STAVES: f64 = 0.25;

/// Blended confidence plus the per-signal explanations.
#[derive(Debug, Clone, PartialEq)]
pub struct Confidence {
    /// Overall confidence in [0, 1].
    pub value: f64,
    /// Human-readable explanations, one or more per signal.
    pub reasons: Vec<String>,
}

/// Blend the three sub-scores for an assembled page.
///
/// `orphan_peaks` and `total_peaks` describe the clustering residue and only
/// feed the explanation text; the stave-quality score counts structural
/// orphans (repaired staves and singleton systems).
#[must_use = "returns the blended confidence"]
pub fn compute_confidence(
    systems: &[System],
    orphan_peaks: usize,
    total_peaks: usize,
) -> Confidence {
    let total_staves: usize = systems.iter().map(|s| s.staves.len()).sum();
    if total_staves == 0 {
        return Confidence {
            value: 0.0,
            reasons: vec!["No staves detected".to_string()],
        };
    }

    let mut reasons = Vec::new();

    // Barline fraction: confirmed systems over total.
    let confirmed = systems.iter().filter(|s| s.confirmed()).count();
    let barline_score = confirmed as f64 / systems.len() as f64;
    reasons.push(match confirmed {
        c if c == systems.len() => format!("All {c} systems confirmed by barlines"),
        0 => format!("No barlines found (0/{} systems)", systems.len()),
        c => format!("Barlines found for {c}/{} systems", systems.len()),
    });

    // Gap consistency: one minus the coefficient of variation of the
    // inter-system gaps. Fewer than two gaps is trivially consistent.
    let gaps: Vec<f64> = systems
        .windows(2)
        .map(|w| w[1].top() - w[0].bottom())
        .collect();
    let gap_score = if gaps.len() < 2 {
        1.0
    } else {
        let (mean, std) = mean_std(&gaps);
        if mean <= 0.0 {
            0.0
        } else {
            (1.0 - std / mean).clamp(0.0, 1.0)
        }
    };
    if gaps.len() >= 2 && gap_score < 1.0 {
        reasons.push(format!("Inter-system gap consistency {gap_score:.2}"));
    }

    // Stave quality: orphans are repaired staves (fewer than five real
    // peaks) and staves stranded alone in a system.
    let orphan_staves = systems
        .iter()
        .flat_map(|sys| {
            let singleton = sys.staves.len() == 1;
            sys.staves
                .iter()
                .map(move |st| singleton || st.peak_count < STAFF_LINES)
        })
        .filter(|&o| o)
        .count();
    let stave_score = (1.0 - orphan_staves as f64 / total_staves as f64).clamp(0.0, 1.0);
    if orphan_staves > 0 {
        reasons.push(format!(
            "{orphan_staves} of {total_staves} staves look incomplete or stranded"
        ));
    }
    if orphan_peaks > 0 && total_peaks > 0 {
        reasons.push(format!(
            "{orphan_peaks} orphan lines ({:.0}% of detected)",
            orphan_peaks as f64 / total_peaks as f64 * 100.0
        ));
    }

    let value =
        (W_BARLINE * barline_score + W_GAPS * gap_score + W_STAVES * stave_score).clamp(0.0, 1.0);
    Confidence { value, reasons }
}
