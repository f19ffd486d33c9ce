//! eyefeat: pupil and corneal-reflection (CR) feature finding for video eye
//! tracking.
//!
//! The finder works in two stages:
//!
//! 1. **Coarse** – a fast radial symmetry transform over the (downsampled)
//!    frame; its global minimum seeds the pupil, its global maximum the CR.
//! 2. **Refine** – starburst rays from each seed collect edge points on the
//!    gradient-magnitude image; a circle (or ellipse) fit gives subpixel
//!    center and radius.
//!
//! [`CompositeFeatureFinder`] chains both, keeps tracking state across frames
//! and decides when to re-run the coarse stage.
//!
//! # Public API
//! - [`CompositeFeatureFinder`], [`FeatureFinderConfig`] and
//!   [`FeatureRecord`] as primary entry points
//! - [`Frame`] input adapters for 8-bit and float images
//! - the individual stages in [`gradient`], [`radial`], [`starburst`] and
//!   [`fit`], usable on their own
//! - [`ImageBackend`] for substituting the numeric kernels

mod backend;
mod error;
pub mod fit;
mod frame;
pub mod gradient;
pub mod radial;
pub mod starburst;
mod synth;
mod tracker;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{ImageBackend, ReferenceBackend};
pub use error::{AnalyzeError, FeatureFailure};
pub use fit::{EllipseAxes, FitAlgorithm, FitConfig, FitResult};
pub use frame::{Frame, Plane};
pub use gradient::GradientField;
pub use radial::{ExtremumStrategy, RadiusSet, RestrictRegion, SymmetryMap};
pub use starburst::{BoundaryPointSet, RayFanParams, RaySampling};
pub use synth::{Disk, SyntheticEye};
pub use tracker::{
    AnalysisPath, CoarseSeeds, CompositeFeatureFinder, DiagnosticsConfig, Fallback, Feature,
    FeatureFinderConfig, FeatureRecord, FinderStats, RadialConfig, RecordStatus, ReseedReason,
    StarburstConfig, StarburstDiagnostics, TrackerState, TrackingConfig, TrackingMode,
};
