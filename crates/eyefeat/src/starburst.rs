//! Starburst boundary search on a gradient-magnitude plane.
//!
//! Rays are cast from a seed at evenly spaced angles and sampled at a fixed
//! radial spacing. Samples closer than `min_radius` are assumed to lie inside
//! the feature and set the noise level: the crossing threshold is
//! `mean + k·std` of those samples. Walking outward from `min_radius`, a ray
//! reports the sample just before the gradient peak that first rises above
//! the threshold (the trailing side of the edge response).

use serde::{Deserialize, Serialize};

use crate::frame::Plane;

/// A fan whose strongest sample is below this carries no edge at all.
const MIN_EDGE_MAGNITUDE: f64 = 1e-6;

/// How ray samples are read from the magnitude plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaySampling {
    /// Bilinear interpolation; invalid unless all four taps are in bounds.
    Interpolated,
    /// Nearest pixel; invalid outside the plane.
    Nearest,
}

impl Default for RaySampling {
    fn default() -> Self {
        Self::Interpolated
    }
}

/// Upper bound on `ray_length / sample_spacing`.
pub const MAX_SAMPLES_PER_RAY: f64 = 10_000.0;

/// Upper bound on `ray_count`.
pub const MAX_RAY_COUNT: usize = 3600;

/// Geometry and threshold of one ray fan.
///
/// All fields are required when the section appears in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayFanParams {
    /// Number of rays over `[0, 2π)`.
    pub ray_count: usize,
    /// Samples are taken strictly below this distance (pixels).
    pub ray_length: f64,
    /// Radial step between samples (pixels).
    pub sample_spacing: f64,
    /// Distance below which samples are treated as feature interior.
    pub min_radius: f64,
    /// Crossing threshold in standard deviations above the interior mean.
    pub threshold: f64,
}

impl RayFanParams {
    /// Short, finely sampled rays for the corneal reflection.
    pub fn cr() -> Self {
        Self {
            ray_count: 20,
            ray_length: 10.0,
            sample_spacing: 0.5,
            min_radius: 2.0,
            threshold: 1.0,
        }
    }

    /// Longer rays for the pupil.
    pub fn pupil() -> Self {
        Self {
            ray_count: 40,
            ray_length: 25.0,
            sample_spacing: 1.0,
            min_radius: 3.0,
            threshold: 2.5,
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), String> {
        if self.ray_count == 0 || self.ray_count > MAX_RAY_COUNT {
            return Err(format!("{}.ray_count must be in 1..={}", name, MAX_RAY_COUNT));
        }
        if !(self.sample_spacing > 0.0 && self.sample_spacing.is_finite()) {
            return Err(format!("{}.sample_spacing must be positive", name));
        }
        if !(self.ray_length > self.sample_spacing && self.ray_length.is_finite()) {
            return Err(format!("{}.ray_length must exceed sample_spacing", name));
        }
        if self.ray_length / self.sample_spacing > MAX_SAMPLES_PER_RAY {
            return Err(format!(
                "{}.ray_length / sample_spacing must not exceed {}",
                name, MAX_SAMPLES_PER_RAY
            ));
        }
        if !(self.min_radius >= 0.0 && self.min_radius.is_finite()) {
            return Err(format!("{}.min_radius must be non-negative", name));
        }
        if !self.threshold.is_finite() {
            return Err(format!("{}.threshold must be finite", name));
        }
        Ok(())
    }
}

/// Precomputed seed-relative ray geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RayFan {
    params: RayFanParams,
    directions: Vec<[f64; 2]>,
    offsets: Vec<f64>,
    cutoff: usize,
}

impl RayFan {
    pub fn new(params: RayFanParams) -> Self {
        let n = params.ray_count;
        let directions = (0..n)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / n as f64;
                [a.cos(), a.sin()]
            })
            .collect();
        let mut offsets = Vec::new();
        if params.sample_spacing > 0.0 {
            let mut k = 1usize;
            loop {
                let d = k as f64 * params.sample_spacing;
                if d >= params.ray_length || !d.is_finite() {
                    break;
                }
                offsets.push(d);
                k += 1;
            }
        }
        let cutoff = if params.sample_spacing > 0.0 {
            (params.min_radius / params.sample_spacing).round().max(0.0) as usize
        } else {
            0
        };
        Self {
            params,
            directions,
            offsets,
            cutoff,
        }
    }

    #[inline]
    pub fn params(&self) -> &RayFanParams {
        &self.params
    }

    #[inline]
    pub fn ray_count(&self) -> usize {
        self.directions.len()
    }

    #[inline]
    pub fn samples_per_ray(&self) -> usize {
        self.offsets.len()
    }

    /// Index of the first sample considered for a crossing.
    #[inline]
    pub fn cutoff_index(&self) -> usize {
        self.cutoff
    }

    #[inline]
    fn point(&self, seed: [f64; 2], ray: usize, sample: usize) -> [f64; 2] {
        let [dx, dy] = self.directions[ray];
        let r = self.offsets[sample];
        [seed[0] + r * dx, seed[1] + r * dy]
    }
}

/// Disk around an already located feature whose samples are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exclusion {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Exclusion {
    #[inline]
    fn contains(&self, p: [f64; 2]) -> bool {
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        (dx * dx + dy * dy).sqrt() <= self.radius
    }
}

/// Search options shared by both fans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySearch {
    pub sampling: RaySampling,
    /// Threshold floor as a fraction of the largest valid sample in the fan.
    pub threshold_floor_fraction: f64,
}

impl Default for BoundarySearch {
    fn default() -> Self {
        Self {
            sampling: RaySampling::Interpolated,
            threshold_floor_fraction: 0.1,
        }
    }
}

/// Boundary points of one starburst pass plus ray diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundaryPointSet {
    /// Boundary points `[x, y]`, at most one per ray.
    pub points: Vec<[f64; 2]>,
    /// Crossing threshold actually used.
    pub threshold: f64,
    /// Rays cast.
    pub rays_cast: usize,
    /// First sample position of every ray.
    pub ray_starts: Vec<[f64; 2]>,
    /// Last sample position of every ray.
    pub ray_ends: Vec<[f64; 2]>,
}

impl BoundaryPointSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sample {
    Valid(f32),
    Excluded,
    OutOfBounds,
}

/// Cast `fan` from `seed` over `mag` and collect boundary points.
///
/// Samples inside `exclusion` are left out of the threshold statistics and
/// skipped during the walk; surviving points inside it are dropped. An
/// out-of-bounds sample ends its ray.
pub fn find_boundary(
    mag: &Plane,
    seed: [f64; 2],
    fan: &RayFan,
    search: &BoundarySearch,
    exclusion: Option<Exclusion>,
) -> BoundaryPointSet {
    let n_rays = fan.ray_count();
    let n_samples = fan.samples_per_ray();
    let mut out = BoundaryPointSet {
        rays_cast: n_rays,
        ..Default::default()
    };
    if n_samples == 0 || !(seed[0].is_finite() && seed[1].is_finite()) {
        return out;
    }
    out.ray_starts = (0..n_rays).map(|r| fan.point(seed, r, 0)).collect();
    out.ray_ends = (0..n_rays).map(|r| fan.point(seed, r, n_samples - 1)).collect();

    let samples: Vec<Sample> = (0..n_rays)
        .flat_map(|r| (0..n_samples).map(move |s| (r, s)))
        .map(|(r, s)| {
            let p = fan.point(seed, r, s);
            if exclusion.is_some_and(|e| e.contains(p)) {
                return Sample::Excluded;
            }
            let v = match search.sampling {
                RaySampling::Interpolated => mag.sample_bilinear(p[0], p[1]),
                RaySampling::Nearest => mag.sample_nearest(p[0], p[1]),
            };
            v.map_or(Sample::OutOfBounds, Sample::Valid)
        })
        .collect();

    let cutoff = fan.cutoff_index().min(n_samples);
    let stats_span = if cutoff == 0 { n_samples } else { cutoff };
    let interior: Vec<f64> = samples
        .chunks(n_samples)
        .flat_map(|ray| ray[..stats_span].iter())
        .filter_map(|s| match *s {
            Sample::Valid(v) => Some(v as f64),
            _ => None,
        })
        .collect();
    let peak = samples
        .iter()
        .filter_map(|s| match *s {
            Sample::Valid(v) => Some(v as f64),
            _ => None,
        })
        .fold(f64::NEG_INFINITY, f64::max);
    if !(peak.is_finite() && peak > MIN_EDGE_MAGNITUDE) {
        return out;
    }

    let mut threshold = search.threshold_floor_fraction * peak;
    if !interior.is_empty() {
        let n = interior.len() as f64;
        let mean = interior.iter().sum::<f64>() / n;
        let var = interior.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        threshold = threshold.max(mean + fan.params().threshold * var.sqrt());
    }
    out.threshold = threshold;

    for (r, ray) in samples.chunks(n_samples).enumerate() {
        let mut crossed = false;
        for v in cutoff..n_samples {
            let val = match ray[v] {
                Sample::Excluded => continue,
                Sample::OutOfBounds => {
                    if crossed && v > 0 {
                        out.points.push(fan.point(seed, r, v - 1));
                    }
                    break;
                }
                Sample::Valid(val) => val as f64,
            };
            let slope = if v == 0 {
                2.0
            } else {
                match ray[v - 1] {
                    Sample::Valid(prev) => val - prev as f64,
                    _ => 2.0,
                }
            };
            if val > threshold {
                crossed = true;
            }
            if crossed && slope <= 0.0 {
                out.points.push(fan.point(seed, r, v - 1));
                break;
            }
        }
    }

    if let Some(e) = exclusion {
        out.points.retain(|&p| !e.contains(p));
    }
    tracing::trace!(
        seed_x = seed[0],
        seed_y = seed[1],
        threshold,
        points = out.points.len(),
        rays = n_rays,
        "starburst pass"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::sobel3x3;
    use crate::test_utils::disk_plane;

    fn disk_magnitude(center: [f32; 2], radius: f32) -> Plane {
        let p = disk_plane(80, 80, center, radius, 200.0, 50.0);
        sobel3x3(&p).unwrap().mag
    }

    #[test]
    fn fan_geometry() {
        let fan = RayFan::new(RayFanParams::cr());
        assert_eq!(fan.ray_count(), 20);
        // 0.5, 1.0, ..., 9.5
        assert_eq!(fan.samples_per_ray(), 19);
        assert_eq!(fan.cutoff_index(), 4);

        let fan = RayFan::new(RayFanParams::pupil());
        assert_eq!(fan.samples_per_ray(), 24);
        assert_eq!(fan.cutoff_index(), 3);
        let p = fan.point([10.0, 10.0], 10, 4);
        assert!((p[0] - 10.0).abs() < 1e-9 && (p[1] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn disk_boundary_is_at_radius_for_every_ray() {
        let radius = 12.0;
        let mag = disk_magnitude([40.0, 38.0], radius);
        let fan = RayFan::new(RayFanParams::pupil());
        let set = find_boundary(&mag, [40.0, 38.0], &fan, &BoundarySearch::default(), None);
        assert_eq!(set.len(), 40);
        for p in &set.points {
            let d = ((p[0] - 40.0).powi(2) + (p[1] - 38.0).powi(2)).sqrt();
            assert!((d - radius as f64).abs() <= 1.0, "boundary at {:.2}", d);
        }
    }

    #[test]
    fn nearest_sampling_also_finds_the_disk() {
        let mag = disk_magnitude([40.0, 40.0], 9.0);
        let fan = RayFan::new(RayFanParams::pupil());
        let search = BoundarySearch {
            sampling: RaySampling::Nearest,
            ..Default::default()
        };
        let set = find_boundary(&mag, [40.0, 40.0], &fan, &search, None);
        assert!(set.len() >= 36);
        for p in &set.points {
            let d = ((p[0] - 40.0).powi(2) + (p[1] - 40.0).powi(2)).sqrt();
            assert!((d - 9.0).abs() <= 1.5, "boundary at {:.2}", d);
        }
    }

    #[test]
    fn flat_plane_yields_no_points() {
        let mag = sobel3x3(&Plane::from_fn(40, 40, |_, _| 90.0)).unwrap().mag;
        let fan = RayFan::new(RayFanParams::cr());
        let set = find_boundary(&mag, [20.0, 20.0], &fan, &BoundarySearch::default(), None);
        assert!(set.is_empty());
        assert_eq!(set.threshold, 0.0);
    }

    #[test]
    fn rays_leaving_the_image_are_dropped() {
        let mag = disk_magnitude([40.0, 40.0], 9.0);
        let fan = RayFan::new(RayFanParams::pupil());
        let set = find_boundary(&mag, [-200.0, -200.0], &fan, &BoundarySearch::default(), None);
        assert!(set.is_empty());
        assert_eq!(set.rays_cast, 40);
        assert_eq!(set.ray_starts.len(), 40);
    }

    #[test]
    fn exclusion_disk_discards_points() {
        let mag = disk_magnitude([40.0, 40.0], 10.0);
        let fan = RayFan::new(RayFanParams::pupil());
        let exclusion = Exclusion {
            center: [50.0, 40.0],
            radius: 4.0,
        };
        let set = find_boundary(&mag, [40.0, 40.0], &fan, &BoundarySearch::default(), Some(exclusion));
        assert!(!set.is_empty());
        assert!(set.len() < 40);
        for p in &set.points {
            let d = ((p[0] - 50.0).powi(2) + (p[1] - 40.0).powi(2)).sqrt();
            assert!(d > 4.0);
        }
    }

    #[test]
    fn non_finite_seed_is_empty() {
        let mag = disk_magnitude([40.0, 40.0], 10.0);
        let fan = RayFan::new(RayFanParams::cr());
        let set = find_boundary(&mag, [f64::NAN, 3.0], &fan, &BoundarySearch::default(), None);
        assert!(set.is_empty());
    }

    #[test]
    fn params_validation() {
        assert!(RayFanParams::cr().validate("cr").is_ok());
        let mut p = RayFanParams::pupil();
        p.sample_spacing = 0.0;
        assert!(p.validate("pupil").is_err());
        let mut p = RayFanParams::pupil();
        p.ray_count = 0;
        assert!(p.validate("pupil").unwrap_err().contains("ray_count"));
        let mut p = RayFanParams::pupil();
        p.ray_count = MAX_RAY_COUNT + 1;
        assert!(p.validate("pupil").unwrap_err().contains("ray_count"));
    }

    #[test]
    fn samples_per_ray_are_bounded() {
        let mut p = RayFanParams::pupil();
        p.ray_length = 1e12;
        assert!(p.validate("pupil").unwrap_err().contains("ray_length / sample_spacing"));

        let mut p = RayFanParams::cr();
        p.sample_spacing = 1e-9;
        assert!(p.validate("cr").is_err());

        let mut p = RayFanParams::pupil();
        p.sample_spacing = 1.0;
        p.ray_length = MAX_SAMPLES_PER_RAY;
        assert!(p.validate("pupil").is_ok());
    }
}
