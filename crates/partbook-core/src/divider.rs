//! The user-authoritative divider model.
//!
//! A page is annotated with an ascending list of divider Y-coordinates, a
//! parallel list of system-boundary flags, and one strip name per consecutive
//! divider pair. The paired-array representation mirrors the wire contract
//! exposed to browser callers; [`DividerSet::strips`] layers the typed view
//! on top.

use serde::{Deserialize, Serialize};

use crate::error::{PartbookError, Result};

/// Per-page divider annotations in display-pixel space.
///
/// Invariants (checked by [`DividerSet::validate`]):
/// - `dividers` strictly increasing
/// - `system_flags.len() == dividers.len()`
/// - `strip_names.len() == dividers.len() - 1` (or both empty)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividerSet {
    /// Ascending divider Y-coordinates.
    pub dividers: Vec<f64>,
    /// Entry *i* is true when divider *i* marks the top of a new system.
    pub system_flags: Vec<bool>,
    /// One name per consecutive divider pair; empty string means unnamed.
    pub strip_names: Vec<String>,
}

/// One region between two consecutive dividers.
#[derive(Debug, Clone, PartialEq)]
pub struct Strip {
    /// Index of the strip's upper divider.
    pub index: usize,
    /// Upper divider Y.
    pub top: f64,
    /// Lower divider Y.
    pub bottom: f64,
    /// Trimmed strip name; empty when the user left it blank.
    pub name: String,
    /// True when the upper divider starts a new system.
    pub is_system_start: bool,
}

impl DividerSet {
    /// Check the structural invariants, naming the offending page in the
    /// error message.
    ///
    /// # Errors
    ///
    /// Returns [`PartbookError::BadRequest`] when the arrays are inconsistent
    /// or the dividers are not strictly increasing.
    pub fn validate(&self, page_index: usize) -> Result<()> {
        if self.system_flags.len() != self.dividers.len() {
            return Err(PartbookError::BadRequest(format!(
                "page {page_index}: system_flags length ({}) != dividers length ({})",
                self.system_flags.len(),
                self.dividers.len()
            )));
        }
        let expected_names = self.dividers.len().saturating_sub(1);
        if self.strip_names.len() != expected_names {
            return Err(PartbookError::BadRequest(format!(
                "page {page_index}: strip_names length ({}) != dividers - 1 ({expected_names})",
                self.strip_names.len()
            )));
        }
        for pair in self.dividers.windows(2) {
            if pair[1] <= pair[0] {
                return Err(PartbookError::BadRequest(format!(
                    "page {page_index}: dividers not strictly increasing ({} then {})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }

    /// Iterate the *live* strips: every consecutive divider pair except the
    /// dead gaps whose lower divider is flagged as a system boundary.
    ///
    /// Names are trimmed; the `is_system_start` flag is taken from the
    /// strip's upper divider. Call [`DividerSet::validate`] first; this
    /// method assumes consistent arrays.
    pub fn strips(&self) -> impl Iterator<Item = Strip> + '_ {
        self.dividers.windows(2).enumerate().filter_map(|(i, pair)| {
            // A strip is dead when the next divider opens a new system: the
            // region is the inter-system gap, not a staff.
            if self.system_flags.get(i + 1).copied().unwrap_or(false) {
                return None;
            }
            Some(Strip {
                index: i,
                top: pair[0],
                bottom: pair[1],
                name: self
                    .strip_names
                    .get(i)
                    .map(|n| n.trim().to_string())
                    .unwrap_or_default(),
                is_system_start: self.system_flags.get(i).copied().unwrap_or(false),
            })
        })
    }
}
