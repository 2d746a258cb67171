//! # partbook-detect
//!
//! Projection-profile staff and system detection for scanned scores.
//!
//! Given one rasterised page, [`StaffDetector::detect`] returns the
//! tentative strip boundaries, system-boundary flags, and a confidence
//! value the UI uses to decide between auto-accept, human review, and
//! "no useful detection". The pipeline runs in four phases:
//!
//! 1. **Band segmentation**: the barline vertical signal (per-row ink in a
//!    narrow strip around the leftmost barline column) splits the page into
//!    system bands ([`bands`]).
//! 2. **Per-band stave detection**: horizontal-projection peaks are
//!    clustered into five-line staves, with repair/trim/split handling and
//!    a relaxed-tolerance "squint" retry ([`projection`], [`staves`]).
//! 3. **System assembly**: a balance check across bands, a gap-clustering
//!    fallback, and per-system barline confirmation ([`systems`],
//!    [`barline`]).
//! 4. **Confidence**: barline fraction, gap consistency, and stave quality
//!    blended into one score ([`confidence`]).
//!
//! The detector is deterministic and never raises: bad input yields an
//! empty result with confidence 0.

pub mod bands;
pub mod barline;
pub mod binary;
pub mod confidence;
pub mod detector;
pub mod projection;
pub mod staves;
pub mod systems;

pub use binary::BinaryImage;
pub use confidence::Confidence;
pub use detector::{Detection, DetectorConfig, StaffDetector};
pub use staves::{StaffCandidate, STAFF_LINES};
pub use systems::System;
