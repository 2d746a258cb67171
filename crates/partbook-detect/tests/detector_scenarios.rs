//! End-to-end detector scenarios on synthetic score pages.
//!
//! Pages are drawn the way a clean 300-DPI scan looks: five-line staves with
//! 40px line spacing, 300px between staves, and a continuous left barline
//! joining each system's staves.

use image::{GrayImage, Luma};
use partbook_detect::StaffDetector;

const PAGE_W: u32 = 2480;
const PAGE_H: u32 = 3508;
const LINE_SPACING: u32 = 40;
const STAVE_GAP: u32 = 300;
const LINE_THICKNESS: u32 = 3;
const BARLINE_X: u32 = 150;

/// Draw one system: `stave_count` staves starting at `top`, joined by a
/// barline at `BARLINE_X`. Returns the Y one past the system's bottom line.
fn draw_system(page: &mut GrayImage, top: u32, stave_count: u32) -> u32 {
    let mut stave_top = top;
    let mut bottom = top;
    for _ in 0..stave_count {
        for line in 0..5 {
            let y = stave_top + line * LINE_SPACING;
            for dy in 0..LINE_THICKNESS {
                for x in 200..2300 {
                    page.put_pixel(x, y + dy, Luma([0]));
                }
            }
            bottom = y + LINE_THICKNESS;
        }
        stave_top += 4 * LINE_SPACING + STAVE_GAP;
    }
    for y in top..bottom {
        for x in BARLINE_X..BARLINE_X + 3 {
            page.put_pixel(x, y, Luma([0]));
        }
    }
    bottom
}

fn blank_page() -> GrayImage {
    GrayImage::from_pixel(PAGE_W, PAGE_H, Luma([255]))
}

fn assert_invariants(detection: &partbook_detect::Detection) {
    assert_eq!(detection.system_flags.len(), detection.dividers.len());
    assert_eq!(
        detection.strip_names.len(),
        detection.dividers.len().saturating_sub(1)
    );
    assert!(
        detection.dividers.windows(2).all(|w| w[1] > w[0]),
        "dividers not strictly increasing: {:?}",
        detection.dividers
    );
    assert!((0.0..=1.0).contains(&detection.confidence));
}

#[test]
fn single_system_four_staves() {
    let mut page = blank_page();
    draw_system(&mut page, 1000, 4);

    let detection = StaffDetector::new().detect(&page, f64::from(PAGE_W));
    assert_invariants(&detection);

    assert_eq!(detection.stave_count, 4, "reasons: {:?}", detection.reasons);
    assert_eq!(detection.system_count, 1);
    assert_eq!(detection.dividers.len(), 5);
    assert!(
        detection.system_flags.iter().all(|&f| !f),
        "a lone system has no system-boundary dividers"
    );
    assert!(
        detection.confidence >= 0.9,
        "confidence {} too low ({:?})",
        detection.confidence,
        detection.reasons
    );
    assert!(!detection.warning);

    // The first divider sits one typical half-gap above the first stave and
    // the part dividers land mid-gap.
    assert!((detection.dividers[0] - 850).abs() <= 8);
    assert!((detection.dividers[1] - 1310).abs() <= 8);
    assert!((detection.dividers[4] - 2690).abs() <= 8);
}

#[test]
fn two_systems_three_staves_each() {
    let mut page = blank_page();
    let sys1_bottom = draw_system(&mut page, 600, 3);
    // 600px inter-system gap.
    draw_system(&mut page, sys1_bottom + 600, 3);

    let detection = StaffDetector::new().detect(&page, f64::from(PAGE_W));
    assert_invariants(&detection);

    assert_eq!(detection.stave_count, 6, "reasons: {:?}", detection.reasons);
    assert_eq!(detection.system_count, 2);
    assert_eq!(detection.dividers.len(), 8);
    assert_eq!(
        detection.system_flags,
        vec![true, false, false, false, true, false, false, false]
    );
    assert!(
        detection.confidence >= 0.9,
        "confidence {} too low ({:?})",
        detection.confidence,
        detection.reasons
    );
}

#[test]
fn blank_page_yields_empty_result() {
    let detection = StaffDetector::new().detect(&blank_page(), f64::from(PAGE_W));
    assert!(detection.dividers.is_empty());
    assert!(detection.system_flags.is_empty());
    assert!(detection.strip_names.is_empty());
    assert_eq!(detection.confidence, 0.0);
}

#[test]
fn detection_is_bit_for_bit_deterministic() {
    let mut page = blank_page();
    draw_system(&mut page, 1000, 4);

    let detector = StaffDetector::new();
    let first = detector.detect(&page, 800.0);
    let second = detector.detect(&page, 800.0);
    assert_eq!(first, second);
}

#[test]
fn dividers_scale_to_display_width() {
    let mut page = blank_page();
    draw_system(&mut page, 1000, 4);

    let detector = StaffDetector::new();
    let backend = detector.detect(&page, f64::from(PAGE_W));
    let display = detector.detect(&page, 800.0);

    assert_eq!(backend.dividers.len(), display.dividers.len());
    let scale = 800.0 / f64::from(PAGE_W);
    for (b, d) in backend.dividers.iter().zip(&display.dividers) {
        let expected = (f64::from(*b) * scale).round() as i32;
        assert!(
            (expected - d).abs() <= 1,
            "backend {b} scaled to {d}, expected ~{expected}"
        );
    }
}

#[test]
fn faint_page_with_missing_line_still_detects() {
    // One stave lacks its middle line; the cluster repair fills it in and
    // the confidence drops below perfect but detection still succeeds.
    let mut page = blank_page();
    draw_system(&mut page, 1000, 4);
    let erased = 1000 + 2 * LINE_SPACING + (4 * LINE_SPACING + STAVE_GAP);
    for y in erased..erased + LINE_THICKNESS {
        for x in 200..2300 {
            page.put_pixel(x, y, Luma([255]));
        }
    }

    let detection = StaffDetector::new().detect(&page, f64::from(PAGE_W));
    assert_invariants(&detection);
    assert_eq!(detection.stave_count, 4, "reasons: {:?}", detection.reasons);
    assert_eq!(detection.dividers.len(), 5);
    assert!(detection.confidence < 1.0);
}
