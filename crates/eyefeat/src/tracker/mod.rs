//! Composite pupil / CR finder.
//!
//! Each frame is either *reseeded* (coarse radial-symmetry pass over the
//! downsampled frame, then starburst refinement at full resolution) or
//! *tracked* (starburst refinement straight from the previous record). The
//! CR is refined first so its disk can be excluded from the pupil rays.
//!
//! A feature that fails refinement walks a fallback ladder: widened patch
//! around the failed seed, whole-frame coarse pass, then absent. Absence is
//! reported in the [`FeatureRecord`]; only malformed frames and unusable
//! configuration are errors.

mod config;
mod finder;
mod record;
mod state;

pub use config::{DiagnosticsConfig, FeatureFinderConfig, RadialConfig, StarburstConfig, TrackingConfig};
pub use finder::{CompositeFeatureFinder, FinderStats};
pub use record::{
    AnalysisPath, CoarseSeeds, Fallback, Feature, FeatureRecord, RecordStatus, StarburstDiagnostics,
};
pub use state::{ReseedReason, TrackerState, TrackingMode};
