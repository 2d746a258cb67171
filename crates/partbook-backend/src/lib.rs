//! # partbook-backend
//!
//! Rasterization backend: PDF bytes in, 300-DPI grayscale page rasters out.
//!
//! The pdfium integration lives behind the default-on `pdf` feature;
//! without it the crate still offers grayscale conversion and PNG encoding,
//! and scores can be built from pre-rendered images through
//! [`partbook_core::ImageRasterSource`].

pub mod gray;
pub mod png;
#[cfg(feature = "pdf")]
pub mod rasterizer;

pub use gray::rgba_to_gray;
pub use png::encode_png;
#[cfg(feature = "pdf")]
pub use rasterizer::{PdfRasterSource, RasterizerConfig, DEFAULT_MAX_PAGE_BYTES};
