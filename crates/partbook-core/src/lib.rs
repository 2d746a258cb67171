//! # partbook-core
//!
//! Core data model for the partbook score-splitting pipeline: scores and
//! pages, the user-authoritative divider model, parts and staff regions,
//! pixel geometry, the error taxonomy, and the serde wire protocol shared
//! with the external HTTP/browser collaborators.
//!
//! The crates build on each other strictly forward:
//!
//! ```text
//! partbook-backend (rasterize) → partbook-detect (staff detection)
//!        → partbook-pipeline (partition, layout, render) → partbook-cli
//! ```
//!
//! This crate holds everything those layers share and nothing they do not.

pub mod divider;
pub mod error;
pub mod geometry;
pub mod part;
pub mod protocol;
pub mod sanitize;
pub mod score;

pub use divider::{DividerSet, Strip};
pub use error::{PartbookError, Result};
pub use geometry::{mm_to_px, px_to_mm, DisplayScale, Rect};
pub use part::{median_u32, AttachedMarking, LayoutParams, Part, PartHeader, StaffRegion};
pub use sanitize::{sanitize_name, short_name};
pub use score::{ImageRasterSource, PageMeta, RasterSource, Score, ScoreId, RASTER_DPI};
