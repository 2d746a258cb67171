//! Partition-planner behaviour on synthetic scores.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::{GrayImage, Luma};
use partbook_core::{
    protocol::PartitionRequest, DividerSet, ImageRasterSource, PartbookError, Rect, Score,
    ScoreId,
};
use partbook_pipeline::plan_parts;

const PAGE_W: u32 = 2480;
const PAGE_H: u32 = 3508;

fn score_with_pages(count: usize) -> Score {
    let pages = (0..count)
        .map(|_| GrayImage::from_pixel(PAGE_W, PAGE_H, Luma([255])))
        .collect();
    Score::new(
        ScoreId::new("plan-test"),
        Arc::new(ImageRasterSource::new(pages)),
        Some("Fantasia"),
        None,
    )
}

fn dividers(ys: &[f64], names: &[&str]) -> DividerSet {
    DividerSet {
        dividers: ys.to_vec(),
        system_flags: vec![false; ys.len()],
        strip_names: names.iter().map(|n| (*n).to_string()).collect(),
    }
}

/// Two pages, two staves each; page 0 named, page 1 left blank.
fn two_page_request() -> PartitionRequest {
    let mut pages = BTreeMap::new();
    pages.insert(0, dividers(&[100.0, 300.0, 500.0], &["Vln", "Vc"]));
    pages.insert(1, dividers(&[120.0, 320.0, 520.0], &["", ""]));
    PartitionRequest {
        display_width: f64::from(PAGE_W),
        header: None,
        markings: Vec::new(),
        pages,
    }
}

#[test]
fn partition_round_trip_groups_across_pages() {
    let score = score_with_pages(2);
    let parts = plan_parts(&score, &two_page_request()).unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "Vln");
    assert_eq!(parts[1].name, "Vc");
    for part in &parts {
        assert_eq!(part.staves.len(), 2);
        assert_eq!(part.staves[0].page_index, 0);
        assert_eq!(part.staves[1].page_index, 1);
    }
    // The unnamed page-1 strips were resolved from the page-0 sequence.
    assert_eq!(parts[0].staves[1].top_y, 120);
    assert_eq!(parts[1].staves[1].top_y, 320);
}

#[test]
fn partition_is_idempotent() {
    let score = score_with_pages(2);
    let request = two_page_request();
    let first = plan_parts(&score, &request).unwrap();
    let second = plan_parts(&score, &request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn staves_of_one_part_never_overlap_on_a_page() {
    let score = score_with_pages(2);
    let parts = plan_parts(&score, &two_page_request()).unwrap();
    for part in &parts {
        for (i, a) in part.staves.iter().enumerate() {
            for b in &part.staves[i + 1..] {
                assert!(!a.overlaps(b), "part {} has overlapping staves", part.name);
            }
        }
    }
}

#[test]
fn pages_without_dividers_contribute_nothing() {
    let score = score_with_pages(2);
    let mut request = two_page_request();
    // Page 1: no dividers at all. Legal, contributes no staves.
    request.pages.insert(1, DividerSet::default());
    let parts = plan_parts(&score, &request).unwrap();
    assert_eq!(parts.len(), 2);
    assert!(parts.iter().all(|p| p.staves.len() == 1));
}

#[test]
fn single_divider_yields_no_strips() {
    let score = score_with_pages(1);
    let mut pages = BTreeMap::new();
    pages.insert(
        0,
        DividerSet {
            dividers: vec![400.0],
            system_flags: vec![false],
            strip_names: vec![],
        },
    );
    let request = PartitionRequest {
        display_width: f64::from(PAGE_W),
        header: None,
        markings: Vec::new(),
        pages,
    };
    // No strips anywhere means no parts: a client fault.
    assert!(matches!(
        plan_parts(&score, &request),
        Err(PartbookError::BadRequest(_))
    ));
}

#[test]
fn all_system_dividers_yield_no_parts() {
    let score = score_with_pages(1);
    let mut pages = BTreeMap::new();
    pages.insert(
        0,
        DividerSet {
            dividers: vec![100.0, 300.0, 500.0],
            system_flags: vec![true, true, true],
            strip_names: vec!["Vln".into(), "Vc".into()],
        },
    );
    let request = PartitionRequest {
        display_width: f64::from(PAGE_W),
        header: None,
        markings: Vec::new(),
        pages,
    };
    assert!(plan_parts(&score, &request).is_err());
}

#[test]
fn unknown_page_is_a_bad_request() {
    let score = score_with_pages(1);
    let mut request = two_page_request(); // references page 1
    request.pages.remove(&0);
    let err = plan_parts(&score, &request).unwrap_err();
    assert!(matches!(err, PartbookError::BadRequest(_)));
    assert_eq!(err.http_status(), 400);
}

#[test]
fn display_coordinates_are_rescaled() {
    // The browser rendered the 2480px page at 620px: a 4x scale.
    let score = score_with_pages(1);
    let mut pages = BTreeMap::new();
    pages.insert(0, dividers(&[25.0, 75.0], &["Fl"]));
    let request = PartitionRequest {
        display_width: 620.0,
        header: None,
        markings: Vec::new(),
        pages,
    };
    let parts = plan_parts(&score, &request).unwrap();
    assert_eq!(parts[0].staves[0].top_y, 100);
    assert_eq!(parts[0].staves[0].bottom_y, 300);
}

#[test]
fn zero_area_header_is_no_header() {
    let score = score_with_pages(2);
    let mut request = two_page_request();
    request.header = Some(Rect {
        page: 0,
        x: 10,
        y: 10,
        w: 0,
        h: 50,
    });
    let parts = plan_parts(&score, &request).unwrap();
    assert!(parts.iter().all(|p| p.header.is_none()));
}

#[test]
fn header_attaches_to_every_part() {
    let score = score_with_pages(2);
    let mut request = two_page_request();
    request.header = Some(Rect {
        page: 0,
        x: 0,
        y: 0,
        w: 1000,
        h: 80,
    });
    let parts = plan_parts(&score, &request).unwrap();
    for part in &parts {
        let header = part.header.as_ref().expect("header missing");
        assert_eq!(header.region.page, 0);
        assert!(header.scaled_height > 0);
    }
}

#[test]
fn marking_attaches_by_maximum_overlap() {
    let score = score_with_pages(2);
    let mut request = two_page_request();
    // Backend strips on page 0: Vln 100..300, Vc 300..500. This marking
    // overlaps Vc far more.
    request.markings = vec![Rect {
        page: 0,
        x: 50,
        y: 280.min(PAGE_H as i32),
        w: 120,
        h: 100,
    }];
    let parts = plan_parts(&score, &request).unwrap();
    // Both parts have a stave on page 0, so both carry the marking; each
    // attaches it to its own most-overlapping stave.
    let vln = &parts[0];
    let vc = &parts[1];
    assert_eq!(vc.staves[0].markings.len(), 1);
    // 20px of the marking hang above the Vc stave top.
    assert_eq!(vc.staves[0].markings[0].y_offset, -20);
    assert!(vc.staves[0].overhead_above > 0);
    assert_eq!(vc.staves[0].overhead_below, 0);
    // Within the Vln part the marking overlaps its only page-0 stave and
    // hangs 80px past its bottom.
    assert_eq!(vln.staves[0].markings.len(), 1);
    assert_eq!(vln.staves[0].markings[0].y_offset, 180);
    assert!(vln.staves[0].overhead_below > 0);
}

#[test]
fn out_of_range_marking_decorates_first_stave() {
    let score = score_with_pages(2);
    let mut request = two_page_request();
    // Far below both strips on page 0.
    request.markings = vec![Rect {
        page: 0,
        x: 50,
        y: 2000,
        w: 120,
        h: 40,
    }];
    let parts = plan_parts(&score, &request).unwrap();
    // No stave's range contains it: it decorates the first stave on the
    // page, in every part that has one there.
    assert_eq!(parts[0].staves[0].markings.len(), 1);
    assert_eq!(parts[1].staves[0].markings.len(), 1);
}

#[test]
fn names_are_trimmed_and_matched_case_sensitively() {
    let score = score_with_pages(1);
    let mut pages = BTreeMap::new();
    pages.insert(
        0,
        dividers(&[0.0, 200.0, 400.0, 600.0], &["  Vln ", "vln", "Vln"]),
    );
    let request = PartitionRequest {
        display_width: f64::from(PAGE_W),
        header: None,
        markings: Vec::new(),
        pages,
    };
    let parts = plan_parts(&score, &request).unwrap();
    // "Vln" (trimmed) and "vln" stay distinct; the third strip joins the
    // first part.
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "Vln");
    assert_eq!(parts[0].staves.len(), 2);
    assert_eq!(parts[1].name, "vln");
}
