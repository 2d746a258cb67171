//! The partition planner: user strip map in, Parts out.
//!
//! Every Y-coordinate in the request arrives in display-pixel space and is
//! normalised to backend pixels here, exactly once. Live strips become
//! [`StaffRegion`]s, regions group into [`Part`]s by trimmed strip name
//! (case-sensitive), and header/marking rectangles are rescaled, clamped,
//! and attached.
//!
//! Strips the user left unnamed are resolved against the instrument
//! sequence of the first fully-named page, restarting at every system
//! boundary; strips that remain unnamed after resolution are dropped.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;

use log::debug;

use partbook_core::{
    median_u32, protocol::PartitionRequest, sanitize_name, short_name, AttachedMarking,
    DisplayScale, Part, PartHeader, PartbookError, Rect, Result, Score, StaffRegion,
};

use crate::layout::AVAILABLE_WIDTH_PX;

/// One live strip after coordinate normalisation.
#[derive(Debug, Clone)]
struct LiveStrip {
    top_y: u32,
    bottom_y: u32,
    name: String,
    is_system_start: bool,
}

/// Plan the parts for a score from the user-confirmed partition request.
///
/// Deterministic: identical inputs produce identical part ordering, which is
/// first-encountered strip position (page, then strip index).
///
/// # Errors
///
/// [`PartbookError::BadRequest`] for structural problems (bad page indices,
/// inconsistent divider arrays, no usable strips at all).
pub fn plan_parts(score: &Score, request: &PartitionRequest) -> Result<Vec<Part>> {
    if request.display_width <= 0.0 {
        return Err(PartbookError::BadRequest(
            "display_width must be a positive number".to_string(),
        ));
    }

    // Phase 1: validate, normalise coordinates, extract live strips.
    let mut pages: Vec<(usize, Vec<LiveStrip>)> = Vec::new();
    for (&page_index, divider_set) in &request.pages {
        let page = score.page(page_index).map_err(|_| {
            PartbookError::BadRequest(format!("page {page_index} does not exist"))
        })?;
        divider_set.validate(page_index)?;
        let scale = DisplayScale::new(request.display_width, page.width_px).ok_or_else(|| {
            PartbookError::BadRequest(format!("page {page_index} has zero width"))
        })?;

        let mut strips = Vec::new();
        for strip in divider_set.strips() {
            let top = scale
                .to_backend(strip.top)
                .round()
                .clamp(0.0, f64::from(page.height_px)) as u32;
            let bottom = scale
                .to_backend(strip.bottom)
                .round()
                .clamp(0.0, f64::from(page.height_px)) as u32;
            if bottom <= top {
                continue;
            }
            strips.push(LiveStrip {
                top_y: top,
                bottom_y: bottom,
                name: sanitize_name(&strip.name),
                is_system_start: strip.is_system_start,
            });
        }
        pages.push((page_index, strips));
    }

    // Phase 2: resolve unnamed strips against the known instrument
    // sequence; still-unnamed strips are dropped during grouping.
    resolve_strip_names(&mut pages);

    // Phase 3: group strips into parts by name, first-encountered order.
    let mut builders: Vec<PartBuilder> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    for (page_index, strips) in &pages {
        let page = score.page(*page_index)?;
        for strip in strips {
            if strip.name.is_empty() {
                continue;
            }
            let builder_index = *index_by_name.entry(strip.name.clone()).or_insert_with(|| {
                builders.push(PartBuilder::new(strip.name.clone()));
                builders.len() - 1
            });
            builders[builder_index].staves.push(StaffRegion {
                page_index: *page_index,
                top_y: strip.top_y,
                bottom_y: strip.bottom_y,
                source_width: page.width_px,
                scaled_height: scale_to_output(strip.bottom_y - strip.top_y, page.width_px),
                overhead_above: 0,
                overhead_below: 0,
                markings: Vec::new(),
            });
        }
    }
    if builders.is_empty() {
        return Err(PartbookError::BadRequest(
            "no named strips found across all pages".to_string(),
        ));
    }

    // Phase 4: header slice, shared by every part.
    let header = request
        .header
        .as_ref()
        .and_then(|rect| backend_header(score, request.display_width, rect));

    // Phase 5: marking attachment.
    let markings = backend_markings(score, request.display_width, &request.markings);
    for builder in &mut builders {
        builder.attach_markings(&markings);
    }

    let parts: Vec<Part> = builders
        .into_iter()
        .map(|b| b.finish(header.clone()))
        .collect();
    debug!(
        "planned {} parts: {:?}",
        parts.len(),
        parts.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
    );
    Ok(parts)
}

/// The instrument sequence of the first page that has one: consecutive
/// unique non-empty names from the top, stopping at the first repeat, empty
/// name, or later system boundary.
fn known_sequence(pages: &[(usize, Vec<LiveStrip>)]) -> Vec<String> {
    for (_, strips) in pages {
        let mut known: Vec<String> = Vec::new();
        for strip in strips {
            if strip.is_system_start && !known.is_empty() {
                break;
            }
            if strip.name.is_empty() || known.contains(&strip.name) {
                break;
            }
            known.push(strip.name.clone());
        }
        if !known.is_empty() {
            return known;
        }
    }
    Vec::new()
}

/// Fill unnamed strips from the known sequence, cycling and restarting at
/// system boundaries. Named strips re-sync the sequence position.
fn resolve_strip_names(pages: &mut [(usize, Vec<LiveStrip>)]) {
    let known = known_sequence(pages);
    if known.is_empty() {
        return;
    }
    for (_, strips) in pages.iter_mut() {
        let mut seq_idx = 0_usize;
        for strip in strips.iter_mut() {
            if strip.is_system_start {
                seq_idx = 0;
            }
            if strip.name.is_empty() {
                strip.name = known[seq_idx % known.len()].clone();
                seq_idx += 1;
            } else {
                seq_idx = known
                    .iter()
                    .position(|n| n == &strip.name)
                    .map_or(seq_idx + 1, |pos| pos + 1);
            }
        }
    }
}

/// Scale a source height to the part output scale (content-box width over
/// the source page width).
fn scale_to_output(height: u32, source_width: u32) -> u32 {
    if source_width == 0 {
        return height;
    }
    (f64::from(height) * f64::from(AVAILABLE_WIDTH_PX) / f64::from(source_width)).round() as u32
}

/// Rescale and clamp the header rectangle; zero-area headers vanish.
fn backend_header(score: &Score, display_width: f64, rect: &Rect) -> Option<PartHeader> {
    let page = score.page(rect.page).ok()?;
    let scale = DisplayScale::new(display_width, page.width_px)?;
    let backend = scale.rect_to_backend(rect, page.width_px, page.height_px);
    if backend.is_empty() {
        return None;
    }
    Some(PartHeader {
        scaled_height: scale_to_output(backend.h as u32, page.width_px),
        region: backend,
    })
}

/// Rescale and clamp marking rectangles, dropping the degenerate ones.
fn backend_markings(score: &Score, display_width: f64, markings: &[Rect]) -> Vec<Rect> {
    markings
        .iter()
        .filter_map(|rect| {
            let page = score.page(rect.page).ok()?;
            let scale = DisplayScale::new(display_width, page.width_px)?;
            let backend = scale.rect_to_backend(rect, page.width_px, page.height_px);
            (!backend.is_empty()).then_some(backend)
        })
        .collect()
}

/// Accumulates one part while strips stream in.
struct PartBuilder {
    name: String,
    staves: Vec<StaffRegion>,
}

impl PartBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            staves: Vec::new(),
        }
    }

    /// Attach each marking to the stave on its page whose Y-range overlaps
    /// it most; ties break on the smaller centre distance. Markings outside
    /// every stave's range decorate the page's first stave.
    fn attach_markings(&mut self, markings: &[Rect]) {
        for marking in markings {
            let candidates: Vec<usize> = self
                .staves
                .iter()
                .enumerate()
                .filter(|(_, s)| s.page_index == marking.page)
                .map(|(i, _)| i)
                .collect();
            let Some(&first_on_page) = candidates.first() else {
                continue;
            };

            let m_top = f64::from(marking.y);
            let m_bottom = f64::from(marking.y + marking.h);
            let m_center = marking.y_center();

            let best = candidates
                .iter()
                .copied()
                .map(|i| {
                    let stave = &self.staves[i];
                    let overlap = (m_bottom.min(f64::from(stave.bottom_y))
                        - m_top.max(f64::from(stave.top_y)))
                    .max(0.0);
                    let center = (f64::from(stave.top_y) + f64::from(stave.bottom_y)) / 2.0;
                    (i, overlap, (m_center - center).abs())
                })
                .max_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        // Ties on overlap prefer the smaller centre distance.
                        .then_with(|| {
                            b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal)
                        })
                });

            let target = match best {
                Some((i, overlap, _)) if overlap > 0.0 => i,
                _ => first_on_page,
            };
            let stave = &mut self.staves[target];
            stave.markings.push(AttachedMarking {
                region: *marking,
                y_offset: marking.y - stave.top_y as i32,
            });
        }
    }

    fn finish(mut self, header: Option<PartHeader>) -> Part {
        // Reserve scaled overhead for markings that overhang their stave.
        for stave in &mut self.staves {
            let height = stave.source_height() as i32;
            let mut above = 0_i32;
            let mut below = 0_i32;
            for marking in &stave.markings {
                above = above.max(-marking.y_offset);
                below = below.max(marking.y_offset + marking.region.h - height);
            }
            stave.overhead_above = scale_to_output(above.max(0) as u32, stave.source_width);
            stave.overhead_below = scale_to_output(below.max(0) as u32, stave.source_width);
        }

        let reference_height = median_u32(self.staves.iter().map(StaffRegion::source_height));
        Part {
            short_name: short_name(&self.name),
            name: self.name,
            staves: self.staves,
            reference_height,
            header,
        }
    }
}
