//! Error types.
//!
//! [`AnalyzeError`] is the only error that leaves
//! [`CompositeFeatureFinder::analyze`](crate::CompositeFeatureFinder::analyze).
//! Per-feature problems (too few edge points, a degenerate conic) are
//! [`FeatureFailure`] values: they are logged, drive the fallback ladder and
//! end up as an absent feature in the record, never as an `Err`.

/// Fatal errors for a single `analyze` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeError {
    /// Zero-sized or malformed frame.
    InvalidInput {
        /// Human-readable description of what was wrong.
        reason: String,
    },
    /// Configuration values that cannot be used.
    InvalidConfig {
        /// Human-readable description of the offending field.
        reason: String,
    },
}

impl AnalyzeError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { reason } => write!(f, "invalid input frame: {}", reason),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for AnalyzeError {}

/// Why a single feature (pupil or CR) could not be refined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureFailure {
    /// The starburst pass produced fewer boundary points than required.
    TooFewBoundaryPoints {
        /// Required minimum.
        needed: usize,
        /// Points actually found.
        got: usize,
    },
    /// The fit returned the "no fit" sentinel.
    NoReliableFit,
    /// The ellipse fitter hit a parabola or hyperbola.
    DegenerateFit,
    /// The fit is finite but geometrically implausible for the ray fan.
    Implausible {
        /// Fitted radius.
        radius: f64,
        /// Distance between fitted center and the seed.
        drift: f64,
    },
}

impl std::fmt::Display for FeatureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewBoundaryPoints { needed, got } => {
                write!(f, "too few boundary points: need {}, got {}", needed, got)
            }
            Self::NoReliableFit => write!(f, "no reliable fit"),
            Self::DegenerateFit => write!(f, "degenerate conic (not an ellipse)"),
            Self::Implausible { radius, drift } => write!(
                f,
                "implausible fit: radius {:.2}, center drift {:.2}",
                radius, drift
            ),
        }
    }
}

impl std::error::Error for FeatureFailure {}
