use serde::{Deserialize, Serialize};

use crate::fit::EllipseAxes;
use crate::radial::SymmetryMap;
use crate::starburst::BoundaryPointSet;

use super::state::ReseedReason;

/// Which rung of the fallback ladder produced a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Refined directly from the frame's seed.
    #[default]
    None,
    /// Refined from a seed re-detected in a widened patch around the failed one.
    Patch,
    /// Refined from a seed of a whole-frame coarse pass.
    FullFrame,
}

/// A refined pupil or CR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Center `[x, y]` in full-resolution pixels.
    pub position: [f64; 2],
    pub radius: f64,
    /// Residual of the shape fit; always finite.
    pub fit_error: f64,
    pub fallback: Fallback,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ellipse: Option<EllipseAxes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Pupil and CR both found.
    Complete,
    /// Exactly one feature found.
    Partial,
    /// Neither feature found.
    Failed,
}

impl RecordStatus {
    pub fn from_presence(pupil: bool, cr: bool) -> Self {
        match (pupil, cr) {
            (true, true) => Self::Complete,
            (false, false) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

/// How the frame was seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AnalysisPath {
    /// The coarse radial-symmetry pass ran first.
    Reseeded { reason: ReseedReason },
    /// Refined from the previous record's positions.
    Tracked,
}

impl AnalysisPath {
    #[inline]
    pub fn is_reseed(&self) -> bool {
        matches!(self, Self::Reseeded { .. })
    }
}

/// Coarse-pass candidates, full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoarseSeeds {
    pub pupil: Option<[f64; 2]>,
    pub cr: Option<[f64; 2]>,
}

/// Boundary points of the final successful (or last failed) starburst pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StarburstDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pupil: Option<BoundaryPointSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr: Option<BoundaryPointSet>,
}

/// Output of one `analyze` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub frame_number: u64,
    pub timestamp: f64,
    pub is_calibrating: bool,
    pub status: RecordStatus,
    pub path: AnalysisPath,
    /// Stride of the coarse pass; 1 when it did not run.
    pub downsample_factor: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pupil: Option<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr: Option<Feature>,
    /// Candidates of the coarse pass, when one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coarse: Option<CoarseSeeds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_gradient_magnitude: Option<f64>,
    #[serde(skip)]
    pub symmetry_map: Option<SymmetryMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starburst: Option<StarburstDiagnostics>,
}

impl FeatureRecord {
    #[inline]
    pub fn pupil_position(&self) -> Option<[f64; 2]> {
        self.pupil.map(|f| f.position)
    }

    #[inline]
    pub fn pupil_radius(&self) -> Option<f64> {
        self.pupil.map(|f| f.radius)
    }

    #[inline]
    pub fn cr_position(&self) -> Option<[f64; 2]> {
        self.cr.map(|f| f.position)
    }

    #[inline]
    pub fn cr_radius(&self) -> Option<f64> {
        self.cr.map(|f| f.radius)
    }

    /// True when a feature is missing or fits worse than `threshold`.
    pub fn is_poor(&self, threshold: f64) -> bool {
        match (self.pupil, self.cr) {
            (Some(p), Some(c)) => p.fit_error > threshold || c.fit_error > threshold,
            _ => true,
        }
    }

    /// Seed-only record, e.g. to start tracking from known positions.
    pub fn from_positions(pupil: [f64; 2], cr: [f64; 2]) -> Self {
        let feature = |position| Feature {
            position,
            radius: 0.0,
            fit_error: 0.0,
            fallback: Fallback::None,
            ellipse: None,
        };
        Self {
            frame_number: 0,
            timestamp: 0.0,
            is_calibrating: false,
            status: RecordStatus::Complete,
            path: AnalysisPath::Tracked,
            downsample_factor: 1,
            pupil: Some(feature(pupil)),
            cr: Some(feature(cr)),
            coarse: None,
            mean_gradient_magnitude: None,
            symmetry_map: None,
            starburst: None,
        }
    }
}
