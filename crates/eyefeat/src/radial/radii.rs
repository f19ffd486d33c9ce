//! Radius sets and coarse-pass downsampling.

use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated, strictly positive pixel radii.
///
/// Construction never yields an empty set: degenerate inputs collapse to `[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadiusSet(Vec<u32>);

impl RadiusSet {
    /// `unique(int(linspace(lo, hi, steps)))`, every value clamped to at least 1.
    pub fn spanning(lo: f64, hi: f64, steps: usize) -> Self {
        let steps = steps.max(1);
        let mut radii: Vec<u32> = (0..steps)
            .map(|k| {
                let t = if steps == 1 {
                    0.0
                } else {
                    k as f64 / (steps - 1) as f64
                };
                let v = lo + (hi - lo) * t;
                if v.is_finite() && v >= 1.0 {
                    v.trunc() as u32
                } else {
                    1
                }
            })
            .collect();
        radii.sort_unstable();
        radii.dedup();
        Self(radii)
    }

    /// Radii from fractions of the (downsampled) image height.
    ///
    /// Endpoints are `ceil(fraction * height)`.
    pub fn from_fractions(height: usize, min_fraction: f64, max_fraction: f64, steps: usize) -> Self {
        let h = height as f64;
        Self::spanning((min_fraction * h).ceil(), (max_fraction * h).ceil(), steps)
    }

    /// Explicit radii; zeros are dropped, order and duplicates normalized.
    pub fn from_radii(radii: &[u32]) -> Self {
        let mut v: Vec<u32> = radii.iter().copied().filter(|&r| r > 0).collect();
        v.sort_unstable();
        v.dedup();
        if v.is_empty() {
            v.push(1);
        }
        Self(v)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> u32 {
        self.0.last().copied().unwrap_or(1)
    }
}

/// Stride chosen so that `w * h / factor²` is close to `target_kpixels * 1000`.
///
/// Always at least 1; frames already under budget are not downsampled.
pub fn downsample_factor(width: usize, height: usize, target_kpixels: f64) -> usize {
    let budget = (target_kpixels * 1000.0).trunc();
    if !(budget >= 1.0) {
        return 1;
    }
    let pixels = (width * height) as f64;
    let factor = (pixels / budget).sqrt().floor();
    if factor >= 1.0 {
        factor as usize
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fractions_on_120_rows() {
        let r = RadiusSet::from_fractions(120, 0.0126, 0.12, 6);
        assert_eq!(r.as_slice(), &[2, 4, 7, 9, 12, 15]);
    }

    #[test]
    fn duplicates_collapse() {
        let r = RadiusSet::from_fractions(20, 0.0126, 0.12, 6);
        // linspace(1, 3, 6) -> 1.0 1.4 1.8 2.2 2.6 3.0
        assert_eq!(r.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn never_empty_and_positive() {
        let r = RadiusSet::from_fractions(0, 0.0, 0.0, 0);
        assert_eq!(r.as_slice(), &[1]);
        let r = RadiusSet::spanning(f64::NAN, -4.0, 3);
        assert_eq!(r.as_slice(), &[1]);
        let r = RadiusSet::from_radii(&[0, 0]);
        assert_eq!(r.as_slice(), &[1]);
        assert!(!r.is_empty());
    }

    #[test]
    fn explicit_radii_are_sorted_and_deduplicated() {
        let r = RadiusSet::from_radii(&[5, 2, 0, 5, 3]);
        assert_eq!(r.as_slice(), &[2, 3, 5]);
        assert_eq!(r.max(), 5);
    }

    #[test]
    fn downsample_factor_tracks_pixel_budget() {
        assert_eq!(downsample_factor(160, 120, 80.0), 1);
        assert_eq!(downsample_factor(640, 480, 80.0), 1);
        assert_eq!(downsample_factor(640, 480, 50.0), 2);
        assert_eq!(downsample_factor(1280, 960, 80.0), 3);
        assert_eq!(downsample_factor(1280, 960, 0.0), 1);
    }
}
