//! A4 page geometry and the two-pass pagination algorithm.
//!
//! Output part-books are portrait A4 at 300 DPI. Pass 1 assigns staves to
//! pages with a top-to-top stride (`spacing_px` plus the per-stave offset),
//! breaking to a new page when a stave's slot would cross the bottom margin
//! and after every forced break. Pass 2 vertically justifies pages that end
//! in a forced break so a short page does not look ragged.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use partbook_core::{LayoutParams, Part, PartbookError, Result};

/// A4 portrait width at 300 DPI.
pub const A4_WIDTH_PX: u32 = 2480;
/// A4 portrait height at 300 DPI.
pub const A4_HEIGHT_PX: u32 = 3508;
/// Page margin on every side.
pub const MARGIN_PX: u32 = 104;
/// Usable content width between the side margins.
pub const AVAILABLE_WIDTH_PX: u32 = A4_WIDTH_PX - 2 * MARGIN_PX;
/// Usable content height between the top and bottom margins.
pub const AVAILABLE_HEIGHT_PX: u32 = A4_HEIGHT_PX - 2 * MARGIN_PX;
/// Title strip reserved at the top of the first page when a header exists
/// (30 mm).
pub const TITLE_AREA_PX: u32 = 354;

/// One stave's final slot: output page index and slot top in content-box
/// coordinates (0 = just under the top margin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedStave {
    /// Index into the part's stave list.
    pub stave_index: usize,
    /// Slot top within the content box.
    pub y: u32,
}

/// The assembled output pages of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Stave placements per output page.
    pub pages: Vec<Vec<PlacedStave>>,
    /// Title strip height on the first page.
    pub title_area_px: u32,
}

/// Title strip height for a part: reserved only when a header exists.
#[inline]
#[must_use = "returns the title area height"]
pub fn title_area_for(part: &Part) -> u32 {
    if part.header.is_some() {
        TITLE_AREA_PX
    } else {
        0
    }
}

/// Run both pagination passes.
///
/// # Errors
///
/// [`PartbookError::EmptyPart`] for a part without staves,
/// [`PartbookError::BadRequest`] when the offsets length does not match, and
/// [`PartbookError::LayoutOverflow`] when a single stave cannot fit a page.
pub fn paginate(part: &Part, params: &LayoutParams) -> Result<Pagination> {
    if part.staves.is_empty() {
        return Err(PartbookError::EmptyPart(part.name.clone()));
    }
    if params.offsets.len() != part.staves.len() {
        return Err(PartbookError::BadRequest(format!(
            "offsets length ({}) != stave count ({}) for '{}'",
            params.offsets.len(),
            part.staves.len(),
            part.name
        )));
    }

    let available = f64::from(AVAILABLE_HEIGHT_PX);
    let title_area = title_area_for(part);

    // Pass 1: assignment. The cursor tracks the current stave's slot top;
    // consecutive staves advance by the stride.
    let mut pages: Vec<Vec<(usize, f64)>> = Vec::new();
    let mut current: Vec<(usize, f64)> = Vec::new();
    let mut cursor = f64::from(title_area);

    for (i, stave) in part.staves.iter().enumerate() {
        let total_h = f64::from(stave.total_height());
        if total_h > available {
            return Err(PartbookError::LayoutOverflow {
                part: part.name.clone(),
                stave_index: i,
                total_h: stave.total_height(),
                available: AVAILABLE_HEIGHT_PX,
            });
        }

        let mut y = if current.is_empty() {
            cursor
        } else {
            cursor + f64::from(params.spacing_px) + f64::from(params.offsets[i])
        };
        if y + total_h > available {
            if current.is_empty() {
                // Only the title strip can push a lone stave past the page.
                return Err(PartbookError::LayoutOverflow {
                    part: part.name.clone(),
                    stave_index: i,
                    total_h: stave.total_height(),
                    available: AVAILABLE_HEIGHT_PX - title_area,
                });
            }
            pages.push(std::mem::take(&mut current));
            y = 0.0;
        }
        current.push((i, y));
        cursor = y;

        if params.page_breaks_after.contains(&i) {
            pages.push(std::mem::take(&mut current));
            cursor = 0.0;
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }

    // Pass 2: positioning. Pages terminated by a forced break distribute
    // their leftover height evenly into the inter-stave gaps.
    let justified: Vec<Vec<PlacedStave>> = pages
        .into_iter()
        .map(|page| {
            let ends_in_break = page
                .last()
                .is_some_and(|&(i, _)| params.page_breaks_after.contains(&i));
            let add = if ends_in_break && page.len() >= 2 {
                let (last_index, last_y) = page[page.len() - 1];
                let last_bottom = last_y + f64::from(part.staves[last_index].total_height());
                (available - last_bottom).max(0.0) / (page.len() - 1) as f64
            } else {
                0.0
            };
            page.iter()
                .enumerate()
                .map(|(j, &(stave_index, y))| PlacedStave {
                    stave_index,
                    y: (y + add * j as f64).round() as u32,
                })
                .collect()
        })
        .collect();

    Ok(Pagination {
        pages: justified,
        title_area_px: title_area,
    })
}
