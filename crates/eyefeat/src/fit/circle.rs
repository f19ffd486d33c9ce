//! Algebraic least-squares circle fit.

use nalgebra::{DMatrix, DVector};

use super::{normalization, solve_full_rank, try_fit_mean, FitResult};
use crate::error::FeatureFailure;

/// Fit `x² + y² + ax + by + c = 0` to `points`.
///
/// Points are mean-centered and scaled to unit RMS radius before the SVD
/// solve. The reported `fit_error` is the sum of squared algebraic residuals
/// `(dᵢ² - r²)²` in pixel units. Fewer than three points fall back to
/// [`try_fit_mean`].
pub fn try_fit_circle(points: &[[f64; 2]]) -> Result<FitResult, FeatureFailure> {
    let n = points.len();
    if n < 3 {
        return try_fit_mean(points);
    }
    let (mean, scale) = normalization(points).ok_or(FeatureFailure::DegenerateFit)?;

    let mut design = DMatrix::<f64>::zeros(n, 3);
    let mut rhs = DVector::<f64>::zeros(n);
    for (i, p) in points.iter().enumerate() {
        let u = (p[0] - mean[0]) / scale;
        let v = (p[1] - mean[1]) / scale;
        design[(i, 0)] = u;
        design[(i, 1)] = v;
        design[(i, 2)] = 1.0;
        rhs[i] = -(u * u + v * v);
    }
    let sol = solve_full_rank(&design, &rhs).ok_or(FeatureFailure::DegenerateFit)?;
    let (a, b, c) = (sol[0], sol[1], sol[2]);

    let r2 = 0.25 * (a * a + b * b) - c;
    if !(r2.is_finite() && r2 > 0.0) {
        return Err(FeatureFailure::NoReliableFit);
    }
    let center = [mean[0] - 0.5 * a * scale, mean[1] - 0.5 * b * scale];
    let radius = r2.sqrt() * scale;

    let rr = radius * radius;
    let fit_error = points
        .iter()
        .map(|p| {
            let d2 = (p[0] - center[0]).powi(2) + (p[1] - center[1]).powi(2);
            (d2 - rr).powi(2)
        })
        .sum::<f64>();
    if !fit_error.is_finite() {
        return Err(FeatureFailure::NoReliableFit);
    }
    Ok(FitResult {
        center,
        radius,
        fit_error,
        ellipse: None,
    })
}

/// [`try_fit_circle`] with failures mapped to [`FitResult::NO_FIT`].
pub fn fit_circle(points: &[[f64; 2]]) -> FitResult {
    try_fit_circle(points).unwrap_or(FitResult::NO_FIT)
}
