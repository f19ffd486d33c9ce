//! Loy–Zelinski fast radial symmetry transform.
//!
//! Every pixel projects its unit gradient `n` pixels forward (positively
//! affected pixel) and backward (negatively affected pixel). Orientation
//! (`O`) and magnitude (`M`) projections are combined into
//! `F = (M / κ) · (|O| / κ)^α`, smoothed with a Gaussian of scale `n`, and
//! averaged over all radii. Bright radially symmetric blobs collect positive
//! votes at their center, dark ones negative votes.

use crate::frame::Plane;
use crate::gradient::{separable_filter, GradientField};

use super::extrema::RestrictRegion;
use super::radii::RadiusSet;

/// Accumulated radial symmetry score, same shape as the analyzed plane.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryMap {
    pub scores: Plane,
    allowed: Option<RestrictRegion>,
}

impl SymmetryMap {
    /// Unrestricted map over `scores`.
    pub fn from_scores(scores: Plane) -> Self {
        Self {
            scores,
            allowed: None,
        }
    }

    /// Region extrema are confined to, once [`RestrictRegion::apply`] ran.
    #[inline]
    pub fn allowed_region(&self) -> Option<RestrictRegion> {
        self.allowed
    }

    pub(crate) fn set_allowed_region(&mut self, region: RestrictRegion) {
        self.allowed = Some(region);
    }

    /// Whether `(x, y)` may hold an extremum.
    #[inline]
    pub fn is_allowed(&self, x: usize, y: usize) -> bool {
        self.allowed.map_or(true, |r| r.contains(x, y))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.scores.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.scores.h
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.scores.get(x, y)
    }
}

/// Orientation clamp κ: 8 for `n == 1`, 9.9 otherwise.
#[inline]
pub fn kappa(n: u32) -> f32 {
    if n == 1 {
        8.0
    } else {
        9.9
    }
}

/// Unnormalized Gaussian window for radius `n`.
///
/// Width is `round(n)` bumped to the next odd number, standard deviation
/// `0.25 · n`, peak value 1.
pub fn gaussian_window(n: u32) -> Vec<f32> {
    let mut width = n as usize;
    if width % 2 == 0 {
        width += 1;
    }
    let std = 0.25 * n as f64;
    let center = (width - 1) as f64 / 2.0;
    (0..width)
        .map(|i| {
            let d = (i as f64 - center) / std;
            (-0.5 * d * d).exp() as f32
        })
        .collect()
}

/// Reusable per-radius projection buffers.
#[derive(Debug, Default)]
struct Projections {
    orientation: Vec<f32>,
    magnitude: Vec<f32>,
}

impl Projections {
    fn reset(&mut self, len: usize) {
        self.orientation.clear();
        self.orientation.resize(len, 0.0);
        self.magnitude.clear();
        self.magnitude.resize(len, 0.0);
    }
}

/// Radial symmetry map of `gradient` over `radii` with sharpness `alpha`.
///
/// A pixel votes only when both of its projections land inside the image;
/// projections are rounded to the nearest pixel and never clamped.
pub fn fast_radial_transform(gradient: &GradientField, radii: &RadiusSet, alpha: f32) -> SymmetryMap {
    let (w, h) = (gradient.width(), gradient.height());
    let len = w * h;
    let mut sum = Plane::new(w, h);
    if len == 0 {
        return SymmetryMap::from_scores(sum);
    }

    // Unit gradient directions, shared by every radius.
    let mut ux = Vec::with_capacity(len);
    let mut uy = Vec::with_capacity(len);
    for i in 0..len {
        let m = gradient.mag.data[i];
        ux.push(gradient.gx.data[i] / m);
        uy.push(gradient.gy.data[i] / m);
    }

    let mut proj = Projections::default();
    let mut f = Plane::new(w, h);
    let (wf, hf) = (w as f32, h as f32);

    for &n in radii.as_slice() {
        proj.reset(len);
        let nf = n as f32;
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                let dx = nf * ux[i];
                let dy = nf * uy[i];
                let px = (x as f32 + dx).round();
                let py = (y as f32 + dy).round();
                let qx = (x as f32 - dx).round();
                let qy = (y as f32 - dy).round();
                let inside = |vx: f32, vy: f32| vx >= 0.0 && vy >= 0.0 && vx < wf && vy < hf;
                if !(inside(px, py) && inside(qx, qy)) {
                    continue;
                }
                let pos = py as usize * w + px as usize;
                let neg = qy as usize * w + qx as usize;
                let m = gradient.mag.data[i];
                proj.orientation[pos] += 1.0;
                proj.orientation[neg] -= 1.0;
                proj.magnitude[pos] += m;
                proj.magnitude[neg] -= m;
            }
        }

        let k = kappa(n);
        for ((dst, &o), &m) in f
            .data
            .iter_mut()
            .zip(&proj.orientation)
            .zip(&proj.magnitude)
        {
            let o = o.abs().min(k);
            *dst = (m / k) * (o / k).powf(alpha);
        }

        let g = gaussian_window(n);
        let smoothed = separable_filter(&f, &g, &g);
        for (s, v) in sum.data.iter_mut().zip(&smoothed.data) {
            *s += v;
        }
    }

    let count = radii.len().max(1) as f32;
    for s in &mut sum.data {
        *s /= count;
    }
    SymmetryMap::from_scores(sum)
}
