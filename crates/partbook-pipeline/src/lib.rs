//! # partbook-pipeline
//!
//! The back half of the score-splitting pipeline: turning the
//! user-confirmed per-page strip map into paginated per-instrument
//! part-books.
//!
//! - [`planner`] normalises display-pixel annotations into [`partbook_core::Part`]s
//! - [`layout`] paginates a part's staves onto A4 pages (two passes)
//! - [`render`] blits staves, header, and markings onto output rasters
//! - [`pdf`] assembles the rasters into a PDF with embedded JPEG images
//! - [`store`] is the process-wide, mutex-guarded score map with TTL and
//!   LRU-by-raster-bytes eviction
//! - [`service`] is the typed surface external collaborators call
//!
//! Data flows strictly forward; there is no feedback loop inside the core.

pub mod cancel;
pub mod layout;
pub mod pdf;
pub mod planner;
pub mod render;
pub mod service;
pub mod store;

pub use cancel::CancelToken;
pub use layout::{paginate, Pagination, PlacedStave};
pub use pdf::pages_to_pdf;
pub use planner::plan_parts;
pub use render::render_part;
pub use service::{ScoreService, ServiceConfig};
pub use store::{ScoreSession, ScoreStore, StoreConfig};
