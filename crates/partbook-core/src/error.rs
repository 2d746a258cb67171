//! Error types for the partbook pipeline.
//!
//! Every fallible operation in the workspace returns the [`Result`] alias
//! defined here. Errors fall into three categories:
//!
//! - **Input faults** (`InvalidInput`, `UnknownScoreId`, `UnknownPart`,
//!   `EmptyPart`, `BadRequest`): the caller supplied something the core
//!   cannot act on. Surfaced verbatim with a 4xx status.
//! - **Resource limits** (`PageTooLarge`, `CacheExhausted`): the request was
//!   well-formed but exceeds the configured budgets. Surfaced with 5xx; the
//!   caller may retry after reducing input or waiting.
//! - Everything else is an internal fault and maps to 5xx with a generic
//!   message; full detail is logged at the failure site.
//!
//! Detection uncertainty is deliberately *not* an error: the detector always
//! returns a structured result with a confidence value.

use thiserror::Error;

/// Errors that can occur across the partbook pipeline.
#[derive(Error, Debug)]
pub enum PartbookError {
    /// The supplied bytes are not a readable PDF (or otherwise malformed input).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The score identifier does not name a live session.
    #[error("Score not found: {0}")]
    UnknownScoreId(String),

    /// The part name does not exist in the current partition.
    #[error("Part not found: {0}")]
    UnknownPart(String),

    /// A part with zero live staff regions was submitted for rendering.
    #[error("Part '{0}' has no staves")]
    EmptyPart(String),

    /// A structurally invalid request payload (divider invariants, bad page
    /// keys, out-of-range layout parameters).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rasterising a page would exceed the configured memory budget.
    #[error("Page {page_index} raster ({bytes} bytes) exceeds the {budget} byte budget")]
    PageTooLarge {
        /// Zero-based page index that was rejected.
        page_index: usize,
        /// Bytes the raster would occupy.
        bytes: u64,
        /// The configured per-raster budget.
        budget: u64,
    },

    /// The raster cache cannot admit the score even after eviction.
    #[error("Raster cache exhausted ({in_use} of {budget} bytes in use)")]
    CacheExhausted {
        /// Bytes currently held by cached rasters.
        in_use: u64,
        /// The configured process-wide budget.
        budget: u64,
    },

    /// A single stave is taller than the usable page height.
    #[error("Stave {stave_index} of part '{part}' ({total_h}px) exceeds the available page height ({available}px)")]
    LayoutOverflow {
        /// The part being rendered.
        part: String,
        /// Index of the offending stave.
        stave_index: usize,
        /// Stave height including markings overhead.
        total_h: u32,
        /// Usable page height.
        available: u32,
    },

    /// Image encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(String),

    /// PDF emission failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Catch-all for programmer bugs; logged with full detail at the site.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PartbookError {
    /// Whether this error is the caller's fault.
    #[inline]
    #[must_use = "this method inspects the error without modifying it"]
    pub const fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnknownScoreId(_)
                | Self::UnknownPart(_)
                | Self::EmptyPart(_)
                | Self::BadRequest(_)
        )
    }

    /// HTTP status the external surface should attach to this error.
    ///
    /// Input faults map to 4xx; resource limits and internal faults map to
    /// 5xx per the error-handling design.
    #[must_use = "this method inspects the error without modifying it"]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::BadRequest(_) | Self::EmptyPart(_) => 400,
            Self::UnknownScoreId(_) | Self::UnknownPart(_) => 404,
            Self::PageTooLarge { .. }
            | Self::CacheExhausted { .. }
            | Self::LayoutOverflow { .. }
            | Self::Image(_)
            | Self::Pdf(_)
            | Self::Internal(_) => 500,
        }
    }
}

impl From<image::ImageError> for PartbookError {
    #[inline]
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

/// Type alias for [`Result<T, PartbookError>`], used throughout the workspace.
pub type Result<T> = std::result::Result<T, PartbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_map_to_4xx() {
        let errors = [
            PartbookError::InvalidInput("not a pdf".into()),
            PartbookError::UnknownScoreId("abc".into()),
            PartbookError::UnknownPart("Vln".into()),
            PartbookError::EmptyPart("Vln".into()),
            PartbookError::BadRequest("dividers not increasing".into()),
        ];
        for err in errors {
            assert!(err.is_client_fault(), "{err} should be a client fault");
            assert!((400..500).contains(&err.http_status()), "{err}");
        }
    }

    #[test]
    fn resource_and_internal_map_to_5xx() {
        let errors = [
            PartbookError::PageTooLarge {
                page_index: 3,
                bytes: 1 << 30,
                budget: 1 << 28,
            },
            PartbookError::CacheExhausted {
                in_use: 100,
                budget: 50,
            },
            PartbookError::Internal("bug".into()),
        ];
        for err in errors {
            assert!(!err.is_client_fault());
            assert_eq!(err.http_status(), 500, "{err}");
        }
    }

    #[test]
    fn unknown_score_is_404() {
        let err = PartbookError::UnknownScoreId("deadbeef".into());
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn page_too_large_display() {
        let err = PartbookError::PageTooLarge {
            page_index: 2,
            bytes: 2048,
            budget: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("Page 2"));
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}
