//! Least-squares ellipse fit.
//!
//! Solves `a·u² + b·uv + c·v² + d·u + e·v = 1` on mean-centered, RMS-scaled
//! coordinates, removes the cross term by rotation and completes the square.
//! Parabolas and hyperbolas are rejected as [`FeatureFailure::DegenerateFit`].

use nalgebra::{DMatrix, DVector};

use super::{normalization, solve_full_rank, try_fit_mean, EllipseAxes, FitResult};
use crate::error::FeatureFailure;

/// Cross-term ratio above which the conic is de-rotated.
const ROTATION_TOLERANCE: f64 = 1e-3;

pub fn try_fit_ellipse(points: &[[f64; 2]]) -> Result<FitResult, FeatureFailure> {
    let n = points.len();
    if n < 5 {
        return try_fit_mean(points);
    }
    let (mean, scale) = normalization(points).ok_or(FeatureFailure::DegenerateFit)?;

    let mut design = DMatrix::<f64>::zeros(n, 5);
    for (i, p) in points.iter().enumerate() {
        let u = (p[0] - mean[0]) / scale;
        let v = (p[1] - mean[1]) / scale;
        design[(i, 0)] = u * u;
        design[(i, 1)] = u * v;
        design[(i, 2)] = v * v;
        design[(i, 3)] = u;
        design[(i, 4)] = v;
    }
    let rhs = DVector::<f64>::from_element(n, 1.0);
    let sol = solve_full_rank(&design, &rhs).ok_or(FeatureFailure::DegenerateFit)?;
    let (a, b, c, d, e) = (sol[0], sol[1], sol[2], sol[3], sol[4]);

    let phi = if (b / a).abs() > ROTATION_TOLERANCE || (b / c).abs() > ROTATION_TOLERANCE {
        0.5 * b.atan2(a - c)
    } else {
        0.0
    };
    let (sin, cos) = phi.sin_cos();
    let ar = a * cos * cos + b * sin * cos + c * sin * sin;
    let cr = a * sin * sin - b * sin * cos + c * cos * cos;
    let dr = d * cos + e * sin;
    let er = -d * sin + e * cos;

    let det = ar * cr;
    if det <= 1e-12 * ar.abs().max(cr.abs()).powi(2) {
        tracing::trace!(ar, cr, "conic is not an ellipse");
        return Err(FeatureFailure::DegenerateFit);
    }

    // a'(u' - u0')² + c'(v' - v0')² = F
    let u0 = -dr / (2.0 * ar);
    let v0 = -er / (2.0 * cr);
    let f = 1.0 + dr * dr / (4.0 * ar) + er * er / (4.0 * cr);
    let (qa, qc) = (f / ar, f / cr);
    if !(qa > 0.0 && qc > 0.0 && qa.is_finite() && qc.is_finite()) {
        return Err(FeatureFailure::DegenerateFit);
    }
    let axis_u = qa.sqrt() * scale;
    let axis_v = qc.sqrt() * scale;

    let center = [
        mean[0] + scale * (cos * u0 - sin * v0),
        mean[1] + scale * (sin * u0 + cos * v0),
    ];

    let fit_error = points
        .iter()
        .map(|p| {
            let dx = p[0] - center[0];
            let dy = p[1] - center[1];
            let xr = cos * dx + sin * dy;
            let yr = -sin * dx + cos * dy;
            let theta = yr.atan2(xr);
            let r_fit = axis_u * axis_v
                / ((axis_v * theta.cos()).powi(2) + (axis_u * theta.sin()).powi(2)).sqrt();
            (r_fit - dx.hypot(dy)).powi(2)
        })
        .sum::<f64>();
    if !fit_error.is_finite() {
        return Err(FeatureFailure::NoReliableFit);
    }

    let (semi_major, semi_minor, angle) = if axis_u >= axis_v {
        (axis_u, axis_v, phi)
    } else {
        (axis_v, axis_u, phi + std::f64::consts::FRAC_PI_2)
    };
    Ok(FitResult {
        center,
        radius: semi_major,
        fit_error,
        ellipse: Some(EllipseAxes {
            semi_major,
            semi_minor,
            angle: wrap_half_turn(angle),
        }),
    })
}

/// [`try_fit_ellipse`] with failures mapped to [`FitResult::NO_FIT`].
pub fn fit_ellipse(points: &[[f64; 2]]) -> FitResult {
    try_fit_ellipse(points).unwrap_or(FitResult::NO_FIT)
}

/// Map an axis angle into `(-π/2, π/2]`.
fn wrap_half_turn(angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    let mut a = angle % PI;
    if a > FRAC_PI_2 {
        a -= PI;
    } else if a <= -FRAC_PI_2 {
        a += PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ellipse_points(center: [f64; 2], a: f64, b: f64, angle: f64, n: usize) -> Vec<[f64; 2]> {
        let (s, c) = angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let (x, y) = (a * t.cos(), b * t.sin());
                [center[0] + c * x - s * y, center[1] + s * x + c * y]
            })
            .collect()
    }

    #[test]
    fn rotated_ellipse_is_recovered() {
        let pts = ellipse_points([50.0, 30.0], 12.0, 6.0, 0.4, 36);
        let fit = try_fit_ellipse(&pts).unwrap();
        let axes = fit.ellipse.unwrap();
        assert_relative_eq!(fit.center[0], 50.0, epsilon = 1e-6);
        assert_relative_eq!(fit.center[1], 30.0, epsilon = 1e-6);
        assert_relative_eq!(axes.semi_major, 12.0, epsilon = 1e-6);
        assert_relative_eq!(axes.semi_minor, 6.0, epsilon = 1e-6);
        assert_relative_eq!(axes.angle, 0.4, epsilon = 1e-6);
        assert_relative_eq!(fit.radius, 12.0, epsilon = 1e-6);
        assert!(fit.fit_error < 1e-8);
    }

    #[test]
    fn tall_ellipse_reports_major_axis_angle() {
        let pts = ellipse_points([10.0, 10.0], 4.0, 9.0, 0.0, 24);
        let fit = fit_ellipse(&pts);
        let axes = fit.ellipse.unwrap();
        assert_relative_eq!(axes.semi_major, 9.0, epsilon = 1e-6);
        assert_relative_eq!(axes.semi_minor, 4.0, epsilon = 1e-6);
        assert_relative_eq!(axes.angle, std::f64::consts::FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn hyperbola_is_rejected() {
        let mut pts = Vec::new();
        for i in -3..=3 {
            let t = i as f64 * 0.4;
            pts.push([3.0 * t.cosh(), 2.0 * t.sinh()]);
            pts.push([-3.0 * t.cosh(), 2.0 * t.sinh()]);
        }
        assert_eq!(try_fit_ellipse(&pts), Err(FeatureFailure::DegenerateFit));
        assert!(!fit_ellipse(&pts).is_reliable());
    }

    #[test]
    fn parabola_is_rejected() {
        let pts: Vec<[f64; 2]> = (-4..=4).map(|x| [x as f64, (x * x) as f64 / 4.0]).collect();
        assert_eq!(try_fit_ellipse(&pts), Err(FeatureFailure::DegenerateFit));
    }

    #[test]
    fn collinear_points_have_no_ellipse() {
        let three = [[0.0, 0.0], [1.0, 2.0], [2.0, 4.0]];
        assert_eq!(try_fit_ellipse(&three), Err(FeatureFailure::DegenerateFit));
        assert_eq!(fit_ellipse(&three), FitResult::NO_FIT);

        let sloped: Vec<[f64; 2]> = (0..6).map(|i| [i as f64, 3.0 - 0.5 * i as f64]).collect();
        assert_eq!(try_fit_ellipse(&sloped), Err(FeatureFailure::DegenerateFit));
        assert_eq!(fit_ellipse(&sloped), FitResult::NO_FIT);

        let horizontal: Vec<[f64; 2]> = (0..9).map(|i| [10.0 + 2.0 * i as f64, 7.0]).collect();
        assert_eq!(fit_ellipse(&horizontal), FitResult::NO_FIT);
    }

    #[test]
    fn few_points_use_mean_fallback() {
        let pts = [[0.0, 1.0], [1.0, 0.0], [0.0, -1.0], [-1.0, 0.0]];
        let fit = fit_ellipse(&pts);
        assert!(fit.ellipse.is_none());
        assert_relative_eq!(fit.radius, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn angle_wrapping() {
        use std::f64::consts::{FRAC_PI_2, PI};
        assert_relative_eq!(wrap_half_turn(0.3 + PI), 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_half_turn(-FRAC_PI_2), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(wrap_half_turn(FRAC_PI_2 + 0.1), -FRAC_PI_2 + 0.1, epsilon = 1e-12);
    }
}
