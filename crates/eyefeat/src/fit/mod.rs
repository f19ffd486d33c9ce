//! Circle / ellipse fitting of starburst boundary points.
//!
//! Implements:
//! - Algebraic least-squares circle fit (`x² + y² + ax + by + c = 0`).
//! - Mean-centered conic least-squares ellipse fit with de-rotation and
//!   ellipse/parabola/hyperbola classification.
//! - A RANSAC consensus layer over the circle fit.
//! - A centroid + mean-radius estimate used for tiny point sets.
//!
//! Every public fit returns a [`FitResult`]; `fit_error == +∞` is the
//! "no fit" sentinel and must never be used as a feature.

mod circle;
mod ellipse;
mod ransac;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::FeatureFailure;

pub use circle::{fit_circle, try_fit_circle};
pub use ellipse::{fit_ellipse, try_fit_ellipse};
pub use ransac::{fit_circle_ransac, CircleRansacConfig};

/// Geometry of an ellipse fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseAxes {
    /// Semi-major axis (pixels).
    pub semi_major: f64,
    /// Semi-minor axis (pixels).
    pub semi_minor: f64,
    /// Major-axis angle from +x in radians, in `(-π/2, π/2]`.
    pub angle: f64,
}

/// Center, radius and residual of a shape fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Center `[x, y]`.
    pub center: [f64; 2],
    /// Circle radius or ellipse semi-major axis; never negative.
    pub radius: f64,
    /// Fit residual; `+∞` marks "no reliable fit".
    pub fit_error: f64,
    /// Axes and orientation when the ellipse fitter produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ellipse: Option<EllipseAxes>,
}

impl FitResult {
    /// The "no fit" sentinel: center `(-1, -1)`, radius 0, error `+∞`.
    pub const NO_FIT: FitResult = FitResult {
        center: [-1.0, -1.0],
        radius: 0.0,
        fit_error: f64::INFINITY,
        ellipse: None,
    };

    #[inline]
    pub fn is_reliable(&self) -> bool {
        self.fit_error.is_finite()
    }
}

/// Shape model used for starburst points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitAlgorithm {
    CircleLeastSquares,
    CircleLeastSquaresRansac,
    EllipseLeastSquares,
    /// Centroid and mean distance only.
    Mean,
}

impl Default for FitAlgorithm {
    fn default() -> Self {
        Self::CircleLeastSquares
    }
}

/// Fitting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub algorithm: FitAlgorithm,
    /// Used by [`FitAlgorithm::CircleLeastSquaresRansac`] only.
    pub ransac: CircleRansacConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            algorithm: FitAlgorithm::CircleLeastSquares,
            ransac: CircleRansacConfig::default(),
        }
    }
}

/// Fit `points` with the configured model, reporting why a fit failed.
pub fn try_fit_points(points: &[[f64; 2]], config: &FitConfig) -> Result<FitResult, FeatureFailure> {
    match config.algorithm {
        FitAlgorithm::CircleLeastSquares => try_fit_circle(points),
        FitAlgorithm::CircleLeastSquaresRansac => {
            let fit = fit_circle_ransac(points, &config.ransac);
            if fit.is_reliable() {
                Ok(fit)
            } else {
                Err(FeatureFailure::NoReliableFit)
            }
        }
        FitAlgorithm::EllipseLeastSquares => try_fit_ellipse(points),
        FitAlgorithm::Mean => try_fit_mean(points),
    }
}

/// Like [`try_fit_points`], collapsing failures to [`FitResult::NO_FIT`].
pub fn fit_points(points: &[[f64; 2]], config: &FitConfig) -> FitResult {
    try_fit_points(points, config).unwrap_or(FitResult::NO_FIT)
}

/// Centroid plus mean distance; residual is `Σ (dᵢ - r̄)²`.
///
/// Three or more collinear (or coincident) points have no meaningful circle
/// and return [`FeatureFailure::DegenerateFit`].
pub fn try_fit_mean(points: &[[f64; 2]]) -> Result<FitResult, FeatureFailure> {
    if points.is_empty() {
        return Err(FeatureFailure::TooFewBoundaryPoints { needed: 1, got: 0 });
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = points.iter().map(|p| p[1]).sum::<f64>() / n;
    if points.len() >= 3 && is_collinear(points, [cx, cy]) {
        return Err(FeatureFailure::DegenerateFit);
    }
    let dists: Vec<f64> = points
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .collect();
    let radius = dists.iter().sum::<f64>() / n;
    let fit_error = dists.iter().map(|d| (d - radius).powi(2)).sum::<f64>();
    if !(radius.is_finite() && fit_error.is_finite()) {
        return Err(FeatureFailure::NoReliableFit);
    }
    Ok(FitResult {
        center: [cx, cy],
        radius,
        fit_error,
        ellipse: None,
    })
}

pub fn fit_mean(points: &[[f64; 2]]) -> FitResult {
    try_fit_mean(points).unwrap_or(FitResult::NO_FIT)
}

/// True when the scatter of `points` around `mean` has no second dimension.
pub(crate) fn is_collinear(points: &[[f64; 2]], mean: [f64; 2]) -> bool {
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p[0] - mean[0];
        let dy = p[1] - mean[1];
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let half_trace = 0.5 * (sxx + syy);
    let root = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
    let major = half_trace + root;
    let minor = half_trace - root;
    major <= f64::EPSILON || minor <= 1e-10 * major
}

/// Translation and isotropic scale that map `points` to zero mean and unit RMS radius.
pub(crate) fn normalization(points: &[[f64; 2]]) -> Option<([f64; 2], f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let ms = points
        .iter()
        .map(|p| (p[0] - mx).powi(2) + (p[1] - my).powi(2))
        .sum::<f64>()
        / n;
    let s = ms.sqrt();
    (s.is_finite() && s > f64::EPSILON).then_some(([mx, my], s))
}

/// Least-squares solve of `design · x = rhs` through SVD.
///
/// `None` when the design matrix is rank deficient (smallest singular value
/// below `1e-10` of the largest).
pub(crate) fn solve_full_rank(design: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if design.nrows() < design.ncols() {
        return None;
    }
    let svd = design.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();
    if !(max_sv.is_finite() && max_sv > 0.0) || min_sv <= 1e-10 * max_sv {
        return None;
    }
    let x = svd.solve(rhs, 1e-12 * max_sv).ok()?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
pub(crate) fn circle_points(center: [f64; 2], radius: f64, n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|i| {
            let t = std::f64::consts::TAU * i as f64 / n as f64;
            [center[0] + radius * t.cos(), center[1] + radius * t.sin()]
        })
        .collect()
}
