//! Wire-protocol types for the external surface.
//!
//! These structs mirror the JSON payloads exchanged with the HTTP and
//! browser collaborators. Page maps use `BTreeMap` so serialisation order is
//! deterministic; JSON object keys round-trip to the integer page indices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::divider::DividerSet;
use crate::geometry::Rect;

/// Metadata returned after a score upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreMeta {
    /// Opaque score identifier for subsequent calls.
    pub score_id: String,
    /// Sanitised title.
    pub title: String,
    /// Sanitised composer.
    pub composer: String,
    /// Number of rasterised pages.
    pub page_count: usize,
    /// Per-page raster dimensions at 300 DPI.
    pub pages: Vec<PageSize>,
}

/// Raster dimensions of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    /// Width in backend pixels.
    pub width_px: u32,
    /// Height in backend pixels.
    pub height_px: u32,
}

/// Full partition payload: the user-confirmed strip map for every annotated
/// page, plus optional header and marking rectangles, all in display pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionRequest {
    /// Display width the browser rendered pages at.
    pub display_width: f64,
    /// Optional header rectangle (title block).
    #[serde(default)]
    pub header: Option<Rect>,
    /// Marking rectangles (tempo text, rehearsal marks, ...).
    #[serde(default)]
    pub markings: Vec<Rect>,
    /// Divider annotations keyed by page index.
    pub pages: BTreeMap<usize, DividerSet>,
}

/// Fixed layout numbers the browser needs for its preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    /// Default stride between stave tops.
    pub default_spacing_px: u32,
    /// Title strip height on the first output page (0 without a header).
    pub title_area_px: u32,
    /// Usable page height between the margins.
    pub available_height_px: u32,
}

/// Preview of one planned stave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StavePreview {
    /// Source page the stave is cropped from.
    pub source_page: usize,
    /// Height at the part's output scale.
    pub scaled_height: u32,
    /// Reserved overhead for overhanging markings.
    pub markings_overhead_px: u32,
}

/// Preview of the part's header slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPreview {
    /// Height at the part's output scale.
    pub scaled_height: u32,
}

/// Preview of one planned part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartPreview {
    /// Sanitised part name.
    pub name: String,
    /// Short display name.
    pub short_name: String,
    /// Number of staves aggregated across pages.
    pub staves_count: usize,
    /// Layout numbers for the preview pagination.
    pub layout: LayoutInfo,
    /// Per-stave previews in part order.
    pub staves: Vec<StavePreview>,
    /// Header preview when a header rectangle was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderPreview>,
}

/// Partition response: previews for every planned part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResponse {
    /// Planned parts in first-encountered order.
    pub parts: Vec<PartPreview>,
}

/// Per-part layout adjustments for generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    /// Stride between stave tops in millimetres (2–30); default when absent.
    #[serde(default)]
    pub spacing_mm: Option<f64>,
    /// Per-stave stride perturbations; length must equal the stave count.
    #[serde(default)]
    pub offsets: Option<Vec<i32>>,
    /// Stave indices after which a page break is forced (set semantics).
    #[serde(default)]
    pub page_breaks_after: Option<Vec<usize>>,
}

/// Generation request: adjustments keyed by part name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Per-part configuration; parts absent from the map use defaults.
    #[serde(default)]
    pub parts: BTreeMap<String, PartConfig>,
}

/// Summary of one generated part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPart {
    /// Part name.
    pub name: String,
    /// Short display name.
    pub short_name: String,
    /// Output pages rendered.
    pub page_count: usize,
    /// Staves in the part.
    pub staves_count: usize,
}

/// Generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated parts in partition order.
    pub parts: Vec<GeneratedPart>,
}

/// Error body for failed calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_request_round_trips() {
        let mut pages = BTreeMap::new();
        pages.insert(
            0,
            DividerSet {
                dividers: vec![10.0, 60.0, 110.0],
                system_flags: vec![false, false, false],
                strip_names: vec!["Vln".into(), "Vc".into()],
            },
        );
        let req = PartitionRequest {
            display_width: 800.0,
            header: Some(Rect {
                page: 0,
                x: 10,
                y: 5,
                w: 300,
                h: 60,
            }),
            markings: vec![],
            pages,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: PartitionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn page_keys_round_trip_as_integers() {
        let json = r#"{
            "display_width": 800,
            "pages": {
                "2": {"dividers": [1.0, 2.0], "system_flags": [false, false], "strip_names": ["Fl"]}
            }
        }"#;
        let req: PartitionRequest = serde_json::from_str(json).unwrap();
        assert!(req.pages.contains_key(&2));
        assert!(req.header.is_none());
        assert!(req.markings.is_empty());
    }

    #[test]
    fn generate_request_defaults_are_empty() {
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.parts.is_empty());

        let req: GenerateRequest = serde_json::from_str(
            r#"{"parts": {"Vln": {"spacing_mm": 10, "page_breaks_after": [3]}}}"#,
        )
        .unwrap();
        let cfg = &req.parts["Vln"];
        assert_eq!(cfg.spacing_mm, Some(10.0));
        assert_eq!(cfg.page_breaks_after.as_deref(), Some(&[3][..]));
        assert!(cfg.offsets.is_none());
    }

    #[test]
    fn header_preview_omitted_when_absent() {
        let preview = PartPreview {
            name: "Vc".into(),
            short_name: "Vc".into(),
            staves_count: 1,
            layout: LayoutInfo {
                default_spacing_px: 480,
                title_area_px: 0,
                available_height_px: 3300,
            },
            staves: vec![StavePreview {
                source_page: 0,
                scaled_height: 400,
                markings_overhead_px: 0,
            }],
            header: None,
        };
        let json = serde_json::to_string(&preview).unwrap();
        assert!(!json.contains("header"));
    }
}
