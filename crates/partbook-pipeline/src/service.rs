//! The score service: the typed surface external collaborators call.
//!
//! One method per wire operation: upload, page serving, detection,
//! partition, generation, and part download. Each request is self-contained
//! and single-threaded; the only shared state is the mutex-guarded score
//! store.

use std::sync::{Arc, PoisonError};

use image::GrayImage;
use log::error;
use uuid::Uuid;

use partbook_backend::encode_png;
#[cfg(feature = "pdf")]
use partbook_backend::{PdfRasterSource, RasterizerConfig};
use partbook_core::{
    mm_to_px,
    protocol::{
        GenerateRequest, GenerateResponse, GeneratedPart, HeaderPreview, LayoutInfo, PageSize,
        PartPreview, PartitionRequest, PartitionResponse, ScoreMeta, StavePreview,
    },
    sanitize_name, ImageRasterSource, LayoutParams, PartbookError, Result, Score, ScoreId,
    RASTER_DPI,
};
use partbook_detect::{Detection, DetectorConfig, StaffDetector};

use crate::cancel::CancelToken;
use crate::layout::{paginate, title_area_for, AVAILABLE_HEIGHT_PX};
use crate::pdf::pages_to_pdf;
use crate::planner::plan_parts;
use crate::render::{render_part, stave_image};
use crate::store::{PlannedPart, ScoreSession, ScoreStore, StoreConfig};

/// Bounds for the wire-side spacing parameter, in millimetres.
const SPACING_MM_RANGE: std::ops::RangeInclusive<f64> = 2.0..=30.0;

/// Service configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    /// Store limits (raster budget, session TTL).
    pub store: StoreConfig,
    /// Detector tuning.
    pub detector: DetectorConfig,
    /// Rasterizer limits.
    #[cfg(feature = "pdf")]
    pub rasterizer: RasterizerConfig,
}

/// The facade over store, detector, planner, and renderer.
#[derive(Debug)]
pub struct ScoreService {
    store: ScoreStore,
    detector: StaffDetector,
    #[cfg(feature = "pdf")]
    rasterizer: RasterizerConfig,
}

impl Default for ScoreService {
    #[inline]
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl ScoreService {
    /// Service with the given limits and tuning.
    #[must_use = "constructors return a new instance"]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            store: ScoreStore::new(config.store),
            detector: StaffDetector::with_config(config.detector),
            #[cfg(feature = "pdf")]
            rasterizer: config.rasterizer,
        }
    }

    /// Ingest a PDF score.
    ///
    /// # Errors
    ///
    /// [`PartbookError::InvalidInput`] for unreadable PDFs and
    /// [`PartbookError::PageTooLarge`] for pages over the raster budget.
    #[cfg(feature = "pdf")]
    pub fn upload(
        &self,
        pdf_bytes: Vec<u8>,
        title: Option<&str>,
        composer: Option<&str>,
    ) -> Result<ScoreMeta> {
        let source = PdfRasterSource::new(pdf_bytes, self.rasterizer)?;
        self.install_score(Arc::new(source), title, composer)
    }

    /// Ingest a score from pre-rendered page images (tests, PNG input).
    ///
    /// # Errors
    ///
    /// [`PartbookError::InvalidInput`] when no pages are supplied.
    pub fn upload_images(
        &self,
        pages: Vec<GrayImage>,
        title: Option<&str>,
        composer: Option<&str>,
    ) -> Result<ScoreMeta> {
        if pages.is_empty() {
            return Err(PartbookError::InvalidInput(
                "score has no pages".to_string(),
            ));
        }
        self.install_score(Arc::new(ImageRasterSource::new(pages)), title, composer)
    }

    fn install_score(
        &self,
        source: Arc<dyn partbook_core::RasterSource>,
        title: Option<&str>,
        composer: Option<&str>,
    ) -> Result<ScoreMeta> {
        let id = ScoreId::new(Uuid::new_v4().to_string());
        let score = Score::new(id, source, title, composer);
        let meta = Self::meta_of(&score);
        self.store.insert(Arc::new(ScoreSession::new(score)));
        Ok(meta)
    }

    fn meta_of(score: &Score) -> ScoreMeta {
        ScoreMeta {
            score_id: score.id().to_string(),
            title: score.title().to_string(),
            composer: score.composer().to_string(),
            page_count: score.page_count(),
            pages: score
                .pages()
                .iter()
                .map(|p| PageSize {
                    width_px: p.width_px,
                    height_px: p.height_px,
                })
                .collect(),
        }
    }

    /// Metadata for an ingested score.
    ///
    /// # Errors
    ///
    /// [`PartbookError::UnknownScoreId`] for dead or unknown sessions.
    pub fn score_meta(&self, score_id: &ScoreId) -> Result<ScoreMeta> {
        let session = self.store.get(score_id)?;
        Ok(Self::meta_of(&session.score))
    }

    /// One page as PNG bytes.
    ///
    /// # Errors
    ///
    /// Unknown score/page, raster failures, or encoding failures.
    pub fn page_png(&self, score_id: &ScoreId, page_index: usize) -> Result<Vec<u8>> {
        let session = self.store.get(score_id)?;
        let raster = session.score.raster(page_index)?;
        let png = encode_png(&raster)?;
        self.store.enforce_budget(score_id)?;
        Ok(png)
    }

    /// Staff detection for one page, cached per (page, display width).
    ///
    /// Detection itself never fails; only unknown ids and raster failures
    /// produce errors.
    ///
    /// # Errors
    ///
    /// [`PartbookError::UnknownScoreId`] and raster-source failures.
    pub fn detect(
        &self,
        score_id: &ScoreId,
        page_index: usize,
        display_width: f64,
    ) -> Result<Detection> {
        let session = self.store.get(score_id)?;
        if let Some((cached_width, detection)) =
            session.detections.lock().unwrap_or_else(PoisonError::into_inner).get(&page_index)
        {
            if *cached_width == display_width {
                return Ok(detection.clone());
            }
        }

        let raster = session.score.raster(page_index)?;
        let detection = self.detector.detect(&raster, display_width);
        session
            .detections
            .lock().unwrap_or_else(PoisonError::into_inner)
            .insert(page_index, (display_width, detection.clone()));
        self.store.enforce_budget(score_id)?;
        Ok(detection)
    }

    /// Detection over every page, checking the cancellation token between
    /// pages. Returns the pages completed before cancellation.
    ///
    /// # Errors
    ///
    /// Same as [`ScoreService::detect`].
    pub fn detect_all(
        &self,
        score_id: &ScoreId,
        display_width: f64,
        token: &CancelToken,
    ) -> Result<Vec<(usize, Detection)>> {
        let session = self.store.get(score_id)?;
        let mut results = Vec::new();
        for page_index in 0..session.score.page_count() {
            if token.is_cancelled() {
                break;
            }
            results.push((page_index, self.detect(score_id, page_index, display_width)?));
        }
        Ok(results)
    }

    /// Plan the parts from the user-confirmed strip map.
    ///
    /// # Errors
    ///
    /// [`PartbookError::BadRequest`] for structural payload problems.
    pub fn partition(
        &self,
        score_id: &ScoreId,
        request: &PartitionRequest,
    ) -> Result<PartitionResponse> {
        let session = self.store.get(score_id)?;
        let parts = plan_parts(&session.score, request)?;

        let previews: Vec<PartPreview> = parts
            .iter()
            .map(|part| PartPreview {
                name: part.name.clone(),
                short_name: part.short_name.clone(),
                staves_count: part.staves.len(),
                layout: LayoutInfo {
                    default_spacing_px: part.default_spacing_px(),
                    title_area_px: title_area_for(part),
                    available_height_px: AVAILABLE_HEIGHT_PX,
                },
                staves: part
                    .staves
                    .iter()
                    .map(|s| StavePreview {
                        source_page: s.page_index,
                        scaled_height: s.scaled_height,
                        markings_overhead_px: s.markings_overhead(),
                    })
                    .collect(),
                header: part.header.as_ref().map(|h| HeaderPreview {
                    scaled_height: h.scaled_height,
                }),
            })
            .collect();

        *session.parts.lock().unwrap_or_else(PoisonError::into_inner) = parts
            .into_iter()
            .map(|part| PlannedPart {
                part,
                params: None,
                rendered: None,
            })
            .collect();
        Ok(PartitionResponse { parts: previews })
    }

    /// Render every part with its layout adjustments.
    ///
    /// # Errors
    ///
    /// [`PartbookError::BadRequest`] for out-of-range parameters, layout
    /// errors from pagination, and raster failures from rendering.
    pub fn generate(
        &self,
        score_id: &ScoreId,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let session = self.store.get(score_id)?;
        let mut planned = session.parts.lock().unwrap_or_else(PoisonError::into_inner);
        if planned.is_empty() {
            return Err(PartbookError::BadRequest(
                "no parts planned yet; call partition first".to_string(),
            ));
        }

        let mut summaries = Vec::with_capacity(planned.len());
        for slot in planned.iter_mut() {
            let config = request.parts.get(&slot.part.name);
            let params = Self::layout_params(&slot.part, config)?;
            let pagination = paginate(&slot.part, &params)?;
            let rendered = render_part(&session.score, &slot.part, &pagination)?;
            summaries.push(GeneratedPart {
                name: slot.part.name.clone(),
                short_name: slot.part.short_name.clone(),
                page_count: rendered.len(),
                staves_count: slot.part.staves.len(),
            });
            slot.params = Some(params);
            slot.rendered = Some(rendered);
        }
        drop(planned);
        self.store.enforce_budget(score_id)?;
        Ok(GenerateResponse { parts: summaries })
    }

    /// The generated PDF for one part.
    ///
    /// # Errors
    ///
    /// [`PartbookError::UnknownPart`] for unknown names and
    /// [`PartbookError::BadRequest`] before generation ran.
    pub fn part_pdf(&self, score_id: &ScoreId, part_name: &str) -> Result<Vec<u8>> {
        let session = self.store.get(score_id)?;
        let planned = session.parts.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = Self::find_part(&planned, part_name)?;
        let rendered = slot.rendered.as_ref().ok_or_else(|| {
            PartbookError::BadRequest(format!(
                "part '{part_name}' has no output pages; call generate first"
            ))
        })?;
        pages_to_pdf(rendered)
    }

    /// One stave of a part, scaled to the output width, as PNG bytes.
    ///
    /// # Errors
    ///
    /// Unknown part names, out-of-range indices, raster failures.
    pub fn part_stave_png(
        &self,
        score_id: &ScoreId,
        part_name: &str,
        stave_index: usize,
    ) -> Result<Vec<u8>> {
        let session = self.store.get(score_id)?;
        let planned = session.parts.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = Self::find_part(&planned, part_name)?;
        let stave = slot.part.staves.get(stave_index).ok_or_else(|| {
            PartbookError::BadRequest(format!(
                "stave index {stave_index} out of range for part '{part_name}'"
            ))
        })?;
        let image = stave_image(&session.score, stave)?;
        encode_png(&image)
    }

    fn find_part<'a>(planned: &'a [PlannedPart], name: &str) -> Result<&'a PlannedPart> {
        let wanted = sanitize_name(name);
        planned
            .iter()
            .find(|p| p.part.name == wanted)
            .ok_or_else(|| PartbookError::UnknownPart(wanted))
    }

    /// Resolve wire-side layout parameters for one part.
    fn layout_params(
        part: &partbook_core::Part,
        config: Option<&partbook_core::protocol::PartConfig>,
    ) -> Result<LayoutParams> {
        let Some(config) = config else {
            return Ok(LayoutParams::defaults_for(part));
        };

        let spacing_px = match config.spacing_mm {
            Some(mm) => {
                if !SPACING_MM_RANGE.contains(&mm) {
                    return Err(PartbookError::BadRequest(format!(
                        "spacing_mm must be between 2 and 30 for '{}'",
                        part.name
                    )));
                }
                mm_to_px(mm, RASTER_DPI)
            }
            None => part.default_spacing_px(),
        };
        let offsets = match &config.offsets {
            Some(offsets) => {
                if offsets.len() != part.staves.len() {
                    return Err(PartbookError::BadRequest(format!(
                        "offsets length ({}) != stave count ({}) for '{}'",
                        offsets.len(),
                        part.staves.len(),
                        part.name
                    )));
                }
                offsets.clone()
            }
            None => vec![0; part.staves.len()],
        };
        let breaks = config.page_breaks_after.clone().unwrap_or_default();
        Ok(LayoutParams::new(spacing_px, offsets, &breaks))
    }

    /// Log an internal error with full detail and return the generic shape
    /// the wire exposes.
    #[must_use = "returns the wire-safe error"]
    pub fn internal_error(context: &str, err: &PartbookError) -> PartbookError {
        error!("{context}: {err}");
        PartbookError::Internal("internal error".to_string())
    }
}
