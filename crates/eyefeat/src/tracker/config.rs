use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalyzeError;
use crate::fit::FitConfig;
use crate::radial::{ExtremumStrategy, RadiusSet, RestrictRegion};
use crate::starburst::{BoundarySearch, RayFanParams, RaySampling};

/// Coarse radial-symmetry pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadialConfig {
    /// Pixel budget (thousands) of the downsampled coarse-pass frame.
    pub target_kpixels: f64,
    /// Smallest transform radius as a fraction of the downsampled height.
    pub min_radius_fraction: f64,
    /// Largest transform radius as a fraction of the downsampled height.
    pub max_radius_fraction: f64,
    /// Number of linearly spaced radii before de-duplication.
    pub radius_steps: usize,
    /// Radial strictness exponent α.
    pub alpha: f32,
    /// Optional full-resolution rectangle allowed to hold extrema.
    pub restrict_region: Option<RestrictRegion>,
    pub extremum: ExtremumStrategy,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            target_kpixels: 80.0,
            min_radius_fraction: 0.0126,
            max_radius_fraction: 0.12,
            radius_steps: 6,
            alpha: 10.0,
            restrict_region: None,
            extremum: ExtremumStrategy::GlobalMinMax,
        }
    }
}

impl RadialConfig {
    /// Radius set for a coarse pass over a map of the given height.
    pub fn radius_set(&self, height: usize) -> RadiusSet {
        if self.max_radius_fraction * height as f64 <= 1.0 {
            tracing::warn!(
                height,
                max_radius_fraction = self.max_radius_fraction,
                "radius fractions resolve below one pixel, clamped to 1"
            );
        }
        RadiusSet::from_fractions(
            height,
            self.min_radius_fraction,
            self.max_radius_fraction,
            self.radius_steps,
        )
    }
}

/// Starburst refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarburstConfig {
    pub cr: RayFanParams,
    pub pupil: RayFanParams,
    pub sampling: RaySampling,
    /// Threshold floor as a fraction of the strongest sample in a fan.
    pub threshold_floor_fraction: f64,
    /// Pupil exclusion radius as a multiple of the CR radius.
    pub exclusion_scale: f64,
    /// Fraction of rays that must report a boundary point.
    pub min_boundary_fraction: f64,
}

impl Default for StarburstConfig {
    fn default() -> Self {
        Self {
            cr: RayFanParams::cr(),
            pupil: RayFanParams::pupil(),
            sampling: RaySampling::Interpolated,
            threshold_floor_fraction: 0.1,
            exclusion_scale: 2.0,
            min_boundary_fraction: 0.5,
        }
    }
}

impl StarburstConfig {
    pub fn search(&self) -> BoundarySearch {
        BoundarySearch {
            sampling: self.sampling,
            threshold_floor_fraction: self.threshold_floor_fraction,
        }
    }

    /// Boundary points required for a fan with `ray_count` rays.
    pub fn min_boundary_points(&self, ray_count: usize) -> usize {
        let n = (self.min_boundary_fraction * ray_count as f64).ceil() as usize;
        n.max(3)
    }
}

/// Reseed scheduling and the fallback ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Fit error above which the next frame reseeds.
    pub reseed_threshold: f64,
    /// Tracked frames between forced reseeds.
    pub minimum_frames_to_reseed: u32,
    /// Fallback patch half-size as a multiple of the ray length.
    pub fallback_patch_scale: f64,
    /// Radii tried inside a fallback patch.
    pub fallback_radius_steps: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            reseed_threshold: 1.0e5,
            minimum_frames_to_reseed: 30,
            fallback_patch_scale: 2.0,
            fallback_radius_steps: 6,
        }
    }
}

/// Optional per-record diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Keep the coarse symmetry map in the record.
    pub keep_symmetry_map: bool,
    /// Keep starburst boundary points and ray extents in the record.
    pub keep_boundary_points: bool,
    /// Report the mean gradient magnitude (focus aid).
    pub compute_gradient_average: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            keep_symmetry_map: false,
            keep_boundary_points: false,
            compute_gradient_average: true,
        }
    }
}

/// Top-level finder configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFinderConfig {
    pub radial: RadialConfig,
    pub starburst: StarburstConfig,
    pub fitting: FitConfig,
    pub tracking: TrackingConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl FeatureFinderConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no pass can work with.
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let r = &self.radial;
        if !(r.target_kpixels > 0.0 && r.target_kpixels.is_finite()) {
            return Err(AnalyzeError::invalid_config("radial.target_kpixels must be positive"));
        }
        if !(r.min_radius_fraction > 0.0 && r.min_radius_fraction.is_finite()) {
            return Err(AnalyzeError::invalid_config(
                "radial.min_radius_fraction must be positive",
            ));
        }
        if !(r.max_radius_fraction >= r.min_radius_fraction && r.max_radius_fraction.is_finite()) {
            return Err(AnalyzeError::invalid_config(
                "radial.max_radius_fraction must be >= min_radius_fraction",
            ));
        }
        if r.radius_steps == 0 {
            return Err(AnalyzeError::invalid_config("radial.radius_steps must be positive"));
        }
        if !(r.alpha >= 0.0 && r.alpha.is_finite()) {
            return Err(AnalyzeError::invalid_config("radial.alpha must be non-negative"));
        }
        if let Some(region) = r.restrict_region {
            if region.left >= region.right || region.top >= region.bottom {
                return Err(AnalyzeError::invalid_config(format!(
                    "radial.restrict_region is empty: {:?}",
                    region
                )));
            }
        }
        if let ExtremumStrategy::Albino { threshold } = r.extremum {
            if !threshold.is_finite() {
                return Err(AnalyzeError::invalid_config("radial.extremum threshold must be finite"));
            }
        }

        let s = &self.starburst;
        s.cr.validate("starburst.cr").map_err(AnalyzeError::invalid_config)?;
        s.pupil
            .validate("starburst.pupil")
            .map_err(AnalyzeError::invalid_config)?;
        if !(0.0..=1.0).contains(&s.threshold_floor_fraction) {
            return Err(AnalyzeError::invalid_config(
                "starburst.threshold_floor_fraction must be in [0, 1]",
            ));
        }
        if !(s.exclusion_scale >= 0.0 && s.exclusion_scale.is_finite()) {
            return Err(AnalyzeError::invalid_config(
                "starburst.exclusion_scale must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&s.min_boundary_fraction) {
            return Err(AnalyzeError::invalid_config(
                "starburst.min_boundary_fraction must be in [0, 1]",
            ));
        }

        let ransac = &self.fitting.ransac;
        if ransac.min_consensus < 3 {
            return Err(AnalyzeError::invalid_config(
                "fitting.ransac.min_consensus must be at least 3",
            ));
        }
        if !(ransac.inlier_fraction > 0.0 && ransac.inlier_fraction.is_finite()) {
            return Err(AnalyzeError::invalid_config(
                "fitting.ransac.inlier_fraction must be positive",
            ));
        }

        let t = &self.tracking;
        if t.reseed_threshold.is_nan() || t.reseed_threshold < 0.0 {
            return Err(AnalyzeError::invalid_config(
                "tracking.reseed_threshold must be non-negative",
            ));
        }
        if t.minimum_frames_to_reseed == 0 {
            return Err(AnalyzeError::invalid_config(
                "tracking.minimum_frames_to_reseed must be positive",
            ));
        }
        if !(t.fallback_patch_scale > 0.0 && t.fallback_patch_scale.is_finite()) {
            return Err(AnalyzeError::invalid_config(
                "tracking.fallback_patch_scale must be positive",
            ));
        }
        if t.fallback_radius_steps == 0 {
            return Err(AnalyzeError::invalid_config(
                "tracking.fallback_radius_steps must be positive",
            ));
        }
        Ok(())
    }
}
