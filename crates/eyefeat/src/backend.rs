//! Numeric backend seam.
//!
//! The hot kernels (gradient, separable convolution, radial transform,
//! extremum scan) sit behind [`ImageBackend`] so a vectorized or GPU
//! implementation can replace [`ReferenceBackend`] without touching the
//! finder. Alternate backends must match the reference numerically within
//! floating-point tolerance.

use crate::error::AnalyzeError;
use crate::frame::Plane;
use crate::gradient::{self, GradientField};
use crate::radial::{self, Extrema, RadiusSet, SymmetryMap};

pub trait ImageBackend {
    /// Separable 3×3 Sobel gradient; rejects zero-sized planes.
    fn sobel(&self, plane: &Plane) -> Result<GradientField, AnalyzeError>;

    /// Row-then-column correlation with mirrored borders.
    fn separable_convolve(&self, plane: &Plane, row_kernel: &[f32], col_kernel: &[f32]) -> Plane;

    /// Fast radial symmetry map averaged over `radii`.
    fn radial_transform(&self, gradient: &GradientField, radii: &RadiusSet, alpha: f32) -> SymmetryMap;

    /// Global minimum (pupil) and maximum (CR), first occurrence wins.
    fn find_extrema(&self, map: &SymmetryMap) -> Option<Extrema>;
}

/// Portable single-threaded implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl ImageBackend for ReferenceBackend {
    fn sobel(&self, plane: &Plane) -> Result<GradientField, AnalyzeError> {
        gradient::sobel3x3(plane)
    }

    fn separable_convolve(&self, plane: &Plane, row_kernel: &[f32], col_kernel: &[f32]) -> Plane {
        gradient::separable_filter(plane, row_kernel, col_kernel)
    }

    fn radial_transform(&self, gradient: &GradientField, radii: &RadiusSet, alpha: f32) -> SymmetryMap {
        radial::fast_radial_transform(gradient, radii, alpha)
    }

    fn find_extrema(&self, map: &SymmetryMap) -> Option<Extrema> {
        radial::find_global_extrema(map)
    }
}

impl<B: ImageBackend + ?Sized> ImageBackend for &B {
    fn sobel(&self, plane: &Plane) -> Result<GradientField, AnalyzeError> {
        (**self).sobel(plane)
    }

    fn separable_convolve(&self, plane: &Plane, row_kernel: &[f32], col_kernel: &[f32]) -> Plane {
        (**self).separable_convolve(plane, row_kernel, col_kernel)
    }

    fn radial_transform(&self, gradient: &GradientField, radii: &RadiusSet, alpha: f32) -> SymmetryMap {
        (**self).radial_transform(gradient, radii, alpha)
    }

    fn find_extrema(&self, map: &SymmetryMap) -> Option<Extrema> {
        (**self).find_extrema(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radial::gaussian_window;

    #[test]
    fn reference_convolution_matches_free_function() {
        let p = Plane::from_fn(9, 7, |x, y| ((x * 13 + y * 7) % 11) as f32);
        let g = gaussian_window(5);
        let a = ReferenceBackend.separable_convolve(&p, &g, &g);
        let b = gradient::separable_filter(&p, &g, &g);
        assert_eq!(a, b);
    }

    #[test]
    fn backend_usable_through_reference() {
        fn run(b: impl ImageBackend) -> Option<Extrema> {
            let p = Plane::from_fn(5, 5, |x, y| (x + y) as f32);
            let g = b.sobel(&p).ok()?;
            let s = b.radial_transform(&g, &RadiusSet::from_radii(&[1]), 1.0);
            b.find_extrema(&s)
        }
        let backend = ReferenceBackend;
        assert!(run(&backend).is_some());
    }
}
