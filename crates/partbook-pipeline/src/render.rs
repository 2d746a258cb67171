//! Rendering planned parts onto output pages.
//!
//! Each stave is cropped from its source page raster, scaled to the content
//! width, and blitted at the Y the pagination chose. Markings overlay at an
//! offset preserving their position relative to the host stave; the header
//! slice lands in the title strip of the first page.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use log::debug;

use partbook_core::{Part, Result, Score, StaffRegion};

use crate::layout::{Pagination, A4_HEIGHT_PX, A4_WIDTH_PX, AVAILABLE_WIDTH_PX, MARGIN_PX};

/// Render every output page of a paginated part.
///
/// # Errors
///
/// Propagates raster-source failures for the involved source pages.
pub fn render_part(score: &Score, part: &Part, pagination: &Pagination) -> Result<Vec<GrayImage>> {
    let mut pages = Vec::with_capacity(pagination.pages.len());
    for (page_number, placements) in pagination.pages.iter().enumerate() {
        let mut output = GrayImage::from_pixel(A4_WIDTH_PX, A4_HEIGHT_PX, Luma([255]));

        if page_number == 0 {
            if let Some(header) = &part.header {
                blit_header(score, header, &mut output)?;
            }
        }

        for placed in placements {
            let stave = &part.staves[placed.stave_index];
            blit_stave(score, stave, placed.y, &mut output)?;
        }
        pages.push(output);
    }
    debug!(
        "rendered part '{}': {} output pages",
        part.name,
        pages.len()
    );
    Ok(pages)
}

/// Output scale factor for content from a source page of the given width.
fn output_scale(source_width: u32) -> f64 {
    if source_width == 0 {
        1.0
    } else {
        f64::from(AVAILABLE_WIDTH_PX) / f64::from(source_width)
    }
}

/// Crop a region from a source raster, clamped to the image.
fn crop(
    score: &Score,
    page_index: usize,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Result<GrayImage> {
    let raster = score.raster(page_index)?;
    let x = x.min(raster.width());
    let y = y.min(raster.height());
    let w = w.min(raster.width() - x);
    let h = h.min(raster.height() - y);
    Ok(imageops::crop_imm(raster.as_ref(), x, y, w, h).to_image())
}

/// Place the header slice inside the title strip.
fn blit_header(
    score: &Score,
    header: &partbook_core::PartHeader,
    output: &mut GrayImage,
) -> Result<()> {
    let region = &header.region;
    let page = score.page(region.page)?;
    let scale = output_scale(page.width_px);
    let crop_img = crop(
        score,
        region.page,
        region.x.max(0) as u32,
        region.y.max(0) as u32,
        region.w.max(0) as u32,
        region.h.max(0) as u32,
    )?;
    if crop_img.width() == 0 || crop_img.height() == 0 {
        return Ok(());
    }
    let w = (f64::from(crop_img.width()) * scale).round().max(1.0) as u32;
    let scaled = imageops::resize(&crop_img, w, header.scaled_height.max(1), FilterType::Triangle);
    imageops::replace(
        output,
        &scaled,
        i64::from(MARGIN_PX),
        i64::from(MARGIN_PX),
    );
    Ok(())
}

/// One stave cropped from its source page and scaled to the content width.
///
/// # Errors
///
/// Propagates raster-source failures.
pub fn stave_image(score: &Score, stave: &StaffRegion) -> Result<GrayImage> {
    let crop_img = crop(
        score,
        stave.page_index,
        0,
        stave.top_y,
        stave.source_width,
        stave.source_height(),
    )?;
    if crop_img.width() == 0 || crop_img.height() == 0 {
        return Ok(GrayImage::from_pixel(
            AVAILABLE_WIDTH_PX,
            stave.scaled_height.max(1),
            Luma([255]),
        ));
    }
    Ok(imageops::resize(
        &crop_img,
        AVAILABLE_WIDTH_PX,
        stave.scaled_height.max(1),
        FilterType::Triangle,
    ))
}

/// Place one stave (and its markings) at the given slot top.
fn blit_stave(score: &Score, stave: &StaffRegion, slot_y: u32, output: &mut GrayImage) -> Result<()> {
    let scale = output_scale(stave.source_width);
    let scaled = stave_image(score, stave)?;

    // The stave sits below its reserved above-overhead inside the slot.
    let stave_y = i64::from(MARGIN_PX) + i64::from(slot_y) + i64::from(stave.overhead_above);
    imageops::replace(output, &scaled, i64::from(MARGIN_PX), stave_y);

    for marking in &stave.markings {
        let region = &marking.region;
        let m_img = crop(
            score,
            region.page,
            region.x.max(0) as u32,
            region.y.max(0) as u32,
            region.w.max(0) as u32,
            region.h.max(0) as u32,
        )?;
        if m_img.width() == 0 || m_img.height() == 0 {
            continue;
        }
        let w = (f64::from(m_img.width()) * scale).round().max(1.0) as u32;
        let h = (f64::from(m_img.height()) * scale).round().max(1.0) as u32;
        let scaled_marking = imageops::resize(&m_img, w, h, FilterType::Triangle);
        let x = i64::from(MARGIN_PX) + (f64::from(region.x) * scale).round() as i64;
        let y = stave_y + (f64::from(marking.y_offset) * scale).round() as i64;
        imageops::replace(output, &scaled_marking, x, y.max(0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::paginate;
    use partbook_core::{
        AttachedMarking, ImageRasterSource, LayoutParams, Rect, Score, ScoreId,
    };
    use std::sync::Arc;

    /// Source page with an all-black band so crops are visible.
    fn source_score(band_top: u32, band_h: u32) -> Score {
        let mut page = GrayImage::from_pixel(1000, 1500, Luma([255]));
        for y in band_top..band_top + band_h {
            for x in 0..1000 {
                page.put_pixel(x, y, Luma([0]));
            }
        }
        Score::new(
            ScoreId::new("render-test"),
            Arc::new(ImageRasterSource::new(vec![page])),
            None,
            None,
        )
    }

    fn stave(top: u32, bottom: u32) -> StaffRegion {
        StaffRegion {
            page_index: 0,
            top_y: top,
            bottom_y: bottom,
            source_width: 1000,
            scaled_height: ((bottom - top) as f64 * f64::from(AVAILABLE_WIDTH_PX) / 1000.0)
                .round() as u32,
            overhead_above: 0,
            overhead_below: 0,
            markings: Vec::new(),
        }
    }

    fn part_of(staves: Vec<StaffRegion>) -> Part {
        Part {
            name: "Vln".into(),
            short_name: "Vln".into(),
            reference_height: staves
                .first()
                .map(StaffRegion::source_height)
                .unwrap_or_default(),
            staves,
            header: None,
        }
    }

    #[test]
    fn stave_band_lands_at_its_slot() {
        let score = source_score(200, 100);
        let part = part_of(vec![stave(200, 300)]);
        let params = LayoutParams::defaults_for(&part);
        let pagination = paginate(&part, &params).unwrap();
        let pages = render_part(&score, &part, &pagination).unwrap();
        assert_eq!(pages.len(), 1);

        let page = &pages[0];
        // The black band fills the content width at the top of the content
        // box.
        let mid_band = MARGIN_PX + part.staves[0].scaled_height / 2;
        assert_eq!(page.get_pixel(MARGIN_PX + 10, mid_band).0[0], 0);
        assert_eq!(page.get_pixel(A4_WIDTH_PX - MARGIN_PX - 10, mid_band).0[0], 0);
        // Margins stay white.
        assert_eq!(page.get_pixel(MARGIN_PX / 2, mid_band).0[0], 255);
        // Below the stave the page is white again.
        let below = MARGIN_PX + part.staves[0].scaled_height + 20;
        assert_eq!(page.get_pixel(MARGIN_PX + 10, below).0[0], 255);
    }

    #[test]
    fn marking_overlays_above_the_stave() {
        let score = source_score(500, 80);
        let mut region = stave(500, 580);
        // A marking 40px above the stave top in source space.
        region.markings.push(AttachedMarking {
            region: Rect {
                page: 0,
                x: 100,
                y: 460,
                w: 200,
                h: 30,
            },
            y_offset: -40,
        });
        let scale = f64::from(AVAILABLE_WIDTH_PX) / 1000.0;
        region.overhead_above = (40.0 * scale).round() as u32;
        let part = part_of(vec![region]);
        let params = LayoutParams::defaults_for(&part);
        let pagination = paginate(&part, &params).unwrap();
        let pages = render_part(&score, &part, &pagination).unwrap();

        // The stave itself sits under its overhead.
        let stave_top = MARGIN_PX + part.staves[0].overhead_above;
        assert_eq!(pages[0].get_pixel(MARGIN_PX + 10, stave_top + 5).0[0], 0);
        // The marking crop (white source area) was blitted above it, which
        // leaves the slot area written (white-on-white here, so just check
        // no panic and dimensions).
        assert_eq!(pages[0].dimensions(), (A4_WIDTH_PX, A4_HEIGHT_PX));
    }

    #[test]
    fn multi_page_parts_render_every_page() {
        let score = source_score(0, 1500);
        let tall: Vec<StaffRegion> = (0..6).map(|_| stave(0, 1400)).collect();
        let part = part_of(tall);
        let params = LayoutParams::defaults_for(&part);
        let pagination = paginate(&part, &params).unwrap();
        let pages = render_part(&score, &part, &pagination).unwrap();
        assert_eq!(pages.len(), pagination.pages.len());
        assert!(pages.len() > 1);
    }
}
