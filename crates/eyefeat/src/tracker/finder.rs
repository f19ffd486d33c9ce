use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::backend::{ImageBackend, ReferenceBackend};
use crate::error::{AnalyzeError, FeatureFailure};
use crate::fit::{try_fit_points, FitResult};
use crate::frame::{Frame, Plane};
use crate::gradient::GradientField;
use crate::radial::{downsample_factor, select_extrema, Extrema, ExtremumStrategy, RadiusSet, SymmetryMap};
use crate::starburst::{find_boundary, BoundaryPointSet, Exclusion, RayFan};

use super::config::{FeatureFinderConfig, RadialConfig};
use super::record::{
    AnalysisPath, CoarseSeeds, Fallback, Feature, FeatureRecord, RecordStatus, StarburstDiagnostics,
};
use super::state::{ReseedReason, TrackerState, TrackingMode};

/// Running counters of which sub-algorithms ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinderStats {
    pub frames_analyzed: u64,
    /// Frames that started with a coarse pass.
    pub reseeds: u64,
    /// Frames refined from the previous record.
    pub tracked_frames: u64,
    /// Coarse passes run, including whole-frame fallbacks.
    pub coarse_passes: u64,
    pub patch_fallbacks: u64,
    pub full_frame_fallbacks: u64,
    /// Features reported absent after the whole ladder failed.
    pub features_lost: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureKind {
    Pupil,
    Cr,
}

impl FeatureKind {
    fn coarse_seed(self, seeds: &CoarseSeeds) -> Option<[f64; 2]> {
        match self {
            Self::Pupil => seeds.pupil,
            Self::Cr => seeds.cr,
        }
    }

    fn extremum(self, e: &Extrema) -> [f64; 2] {
        match self {
            Self::Pupil => e.pupil,
            Self::Cr => e.cr,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RadiusKey {
    height: usize,
    min_fraction: f64,
    max_fraction: f64,
    steps: usize,
}

struct CoarsePass {
    seeds: CoarseSeeds,
    factor: usize,
    map: SymmetryMap,
}

/// Per-frame inputs shared by both features.
struct FrameContext<'a> {
    plane: &'a Plane,
    gradient: &'a GradientField,
    coarse: Option<CoarsePass>,
}

struct Refinement {
    feature: Option<Feature>,
    boundary: Option<BoundaryPointSet>,
}

/// Two-stage pupil / CR finder with cross-frame tracking state.
///
/// One instance serves one frame stream; frames must arrive in order.
///
/// # Examples
///
/// ```
/// use eyefeat::{CompositeFeatureFinder, SyntheticEye};
///
/// let frame = SyntheticEye::default().render();
/// let mut finder = CompositeFeatureFinder::new();
/// let first = finder.analyze(&frame, None).unwrap();
/// let second = finder.analyze(&frame, Some(&first)).unwrap();
/// assert!(second.pupil_position().is_some());
/// ```
pub struct CompositeFeatureFinder<B: ImageBackend = ReferenceBackend> {
    config: FeatureFinderConfig,
    backend: B,
    state: TrackerState,
    stats: FinderStats,
    is_calibrating: bool,
    radius_cache: Option<(RadiusKey, RadiusSet)>,
    cr_fan: RayFan,
    pupil_fan: RayFan,
}

impl CompositeFeatureFinder<ReferenceBackend> {
    /// Finder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(FeatureFinderConfig::default())
    }

    pub fn with_config(config: FeatureFinderConfig) -> Self {
        Self::with_backend(config, ReferenceBackend)
    }
}

impl Default for CompositeFeatureFinder<ReferenceBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ImageBackend> CompositeFeatureFinder<B> {
    /// Finder running its hot kernels on `backend`.
    pub fn with_backend(config: FeatureFinderConfig, backend: B) -> Self {
        let cr_fan = RayFan::new(config.starburst.cr);
        let pupil_fan = RayFan::new(config.starburst.pupil);
        Self {
            config,
            backend,
            state: TrackerState::default(),
            stats: FinderStats::default(),
            is_calibrating: false,
            radius_cache: None,
            cr_fan,
            pupil_fan,
        }
    }

    pub fn config(&self) -> &FeatureFinderConfig {
        &self.config
    }

    /// Mutable access; values are validated on the next `analyze`.
    pub fn config_mut(&mut self) -> &mut FeatureFinderConfig {
        &mut self.config
    }

    /// Replace the configuration after validating it.
    pub fn set_config(&mut self, config: FeatureFinderConfig) -> Result<(), AnalyzeError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn stats(&self) -> &FinderStats {
        &self.stats
    }

    /// Flag copied into every following record.
    pub fn set_calibrating(&mut self, calibrating: bool) {
        self.is_calibrating = calibrating;
    }

    pub fn is_calibrating(&self) -> bool {
        self.is_calibrating
    }

    /// Forget the tracking state; the next frame reseeds.
    pub fn reset(&mut self) {
        tracing::debug!(
            frames_since_reseed = self.state.frames_since_reseed(),
            "tracker reset"
        );
        self.state = TrackerState::default();
    }

    /// Locate pupil and CR in `frame`.
    ///
    /// `previous_guess` carries the positions to track from; `None` forces a
    /// coarse pass. Missing features are reported in the record, never as an
    /// error. On `Err` the tracking state is left untouched.
    pub fn analyze(
        &mut self,
        frame: &Frame,
        previous_guess: Option<&FeatureRecord>,
    ) -> Result<FeatureRecord, AnalyzeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(AnalyzeError::invalid_input(format!(
                "zero-sized frame {}x{}",
                frame.width(),
                frame.height()
            )));
        }
        self.config.validate()?;
        self.refresh_fans();

        let gradient = self.backend.sobel(frame.plane())?;
        let mut ctx = FrameContext {
            plane: frame.plane(),
            gradient: &gradient,
            coarse: None,
        };

        let mode = self.state.mode(previous_guess, &self.config.tracking);
        let (path, cr_seed, pupil_seed) = match (mode, previous_guess) {
            (TrackingMode::Seeded, Some(guess)) => {
                (AnalysisPath::Tracked, guess.cr_position(), guess.pupil_position())
            }
            (mode, _) => {
                let reason = match mode {
                    TrackingMode::Reseeding(reason) => reason,
                    TrackingMode::Seeded => ReseedReason::NoGuess,
                };
                tracing::debug!(frame = frame.frame_number(), ?reason, "reseeding");
                let coarse = self.coarse_pass(ctx.plane, ctx.gradient)?;
                let seeds = coarse.seeds;
                ctx.coarse = Some(coarse);
                (AnalysisPath::Reseeded { reason }, seeds.cr, seeds.pupil)
            }
        };

        let cr = self.refine_with_fallback(FeatureKind::Cr, cr_seed, None, &mut ctx)?;
        let exclusion = cr.feature.map(|f| Exclusion {
            center: f.position,
            radius: self.config.starburst.exclusion_scale * f.radius,
        });
        let pupil = self.refine_with_fallback(FeatureKind::Pupil, pupil_seed, exclusion, &mut ctx)?;

        let coarse = ctx.coarse.take();
        let diagnostics = &self.config.diagnostics;
        let record = FeatureRecord {
            frame_number: frame.frame_number(),
            timestamp: frame.timestamp(),
            is_calibrating: self.is_calibrating,
            status: RecordStatus::from_presence(pupil.feature.is_some(), cr.feature.is_some()),
            path,
            downsample_factor: coarse.as_ref().map_or(1, |c| c.factor as u32),
            pupil: pupil.feature,
            cr: cr.feature,
            coarse: coarse.as_ref().map(|c| c.seeds),
            mean_gradient_magnitude: diagnostics
                .compute_gradient_average
                .then(|| gradient.mean_magnitude()),
            symmetry_map: if diagnostics.keep_symmetry_map {
                coarse.map(|c| c.map)
            } else {
                None
            },
            starburst: diagnostics.keep_boundary_points.then(|| StarburstDiagnostics {
                pupil: pupil.boundary,
                cr: cr.boundary,
            }),
        };

        self.state.advance(&record, &self.config.tracking);
        self.stats.frames_analyzed += 1;
        if record.path.is_reseed() {
            self.stats.reseeds += 1;
        } else {
            self.stats.tracked_frames += 1;
        }
        tracing::debug!(
            frame = record.frame_number,
            status = ?record.status,
            pupil = ?record.pupil_position(),
            cr = ?record.cr_position(),
            "frame analyzed"
        );
        Ok(record)
    }

    fn refresh_fans(&mut self) {
        if self.cr_fan.params() != &self.config.starburst.cr {
            self.cr_fan = RayFan::new(self.config.starburst.cr);
        }
        if self.pupil_fan.params() != &self.config.starburst.pupil {
            self.pupil_fan = RayFan::new(self.config.starburst.pupil);
        }
    }

    fn fan(&self, kind: FeatureKind) -> &RayFan {
        match kind {
            FeatureKind::Pupil => &self.pupil_fan,
            FeatureKind::Cr => &self.cr_fan,
        }
    }

    /// Radial-symmetry pass over the (downsampled) whole frame.
    fn coarse_pass(&mut self, plane: &Plane, gradient: &GradientField) -> Result<CoarsePass, AnalyzeError> {
        let radial = &self.config.radial;
        let factor = downsample_factor(plane.w, plane.h, radial.target_kpixels);
        let (small, small_gradient): (Cow<'_, Plane>, Cow<'_, GradientField>) = if factor > 1 {
            let small = plane.subsample(factor);
            let g = self.backend.sobel(&small)?;
            (Cow::Owned(small), Cow::Owned(g))
        } else {
            (Cow::Borrowed(plane), Cow::Borrowed(gradient))
        };

        let radii = cached_radii(&mut self.radius_cache, radial, small.h);
        let mut map = self.backend.radial_transform(&small_gradient, radii, radial.alpha);
        if let Some(region) = radial.restrict_region {
            region.scaled_down(factor).apply(&mut map);
        }
        let extrema = match radial.extremum {
            ExtremumStrategy::GlobalMinMax => self.backend.find_extrema(&map),
            strategy => select_extrema(&map, &small, strategy),
        };

        let f = factor as f64;
        let scale = |p: [f64; 2]| [p[0] * f, p[1] * f];
        let seeds = CoarseSeeds {
            pupil: extrema.map(|e| scale(e.pupil)),
            cr: extrema.map(|e| scale(e.cr)),
        };
        tracing::debug!(
            factor,
            radii = ?radii.as_slice(),
            pupil = ?seeds.pupil,
            cr = ?seeds.cr,
            "coarse pass"
        );
        self.stats.coarse_passes += 1;
        Ok(CoarsePass { seeds, factor, map })
    }

    /// One starburst + fit attempt from `seed`.
    fn refine(
        &self,
        kind: FeatureKind,
        seed: [f64; 2],
        exclusion: Option<Exclusion>,
        gradient: &GradientField,
    ) -> (Result<Feature, FeatureFailure>, BoundaryPointSet) {
        let fan = self.fan(kind);
        let starburst = &self.config.starburst;
        let boundary = find_boundary(&gradient.mag, seed, fan, &starburst.search(), exclusion);
        let needed = starburst.min_boundary_points(fan.ray_count());
        if boundary.len() < needed {
            let failure = FeatureFailure::TooFewBoundaryPoints {
                needed,
                got: boundary.len(),
            };
            return (Err(failure), boundary);
        }
        let result = try_fit_points(&boundary.points, &self.config.fitting)
            .and_then(|fit| accept_fit(fit, seed, fan.params().ray_length));
        (result, boundary)
    }

    /// Direct attempt, then widened patch, then whole frame, then absent.
    fn refine_with_fallback(
        &mut self,
        kind: FeatureKind,
        seed: Option<[f64; 2]>,
        exclusion: Option<Exclusion>,
        ctx: &mut FrameContext<'_>,
    ) -> Result<Refinement, AnalyzeError> {
        let mut tried: Vec<[f64; 2]> = Vec::with_capacity(3);
        let mut last_boundary = None;

        if let Some(seed) = seed {
            tried.push(seed);
            let (result, boundary) = self.refine(kind, seed, exclusion, ctx.gradient);
            match result {
                Ok(feature) => {
                    return Ok(Refinement {
                        feature: Some(feature),
                        boundary: Some(boundary),
                    })
                }
                Err(failure) => {
                    tracing::debug!(?kind, %failure, "refinement from seed failed");
                    last_boundary = Some(boundary);
                }
            }

            if let Some(patch_seed) = self.patch_seed(kind, seed, ctx.plane)? {
                if !was_tried(&tried, patch_seed) {
                    tried.push(patch_seed);
                    let (result, boundary) = self.refine(kind, patch_seed, exclusion, ctx.gradient);
                    match result {
                        Ok(mut feature) => {
                            feature.fallback = Fallback::Patch;
                            self.stats.patch_fallbacks += 1;
                            return Ok(Refinement {
                                feature: Some(feature),
                                boundary: Some(boundary),
                            });
                        }
                        Err(failure) => {
                            tracing::debug!(?kind, %failure, "patch fallback failed");
                            last_boundary = Some(boundary);
                        }
                    }
                }
            }
        }

        if ctx.coarse.is_none() {
            ctx.coarse = Some(self.coarse_pass(ctx.plane, ctx.gradient)?);
        }
        let coarse_seed = ctx.coarse.as_ref().and_then(|c| kind.coarse_seed(&c.seeds));
        if let Some(coarse_seed) = coarse_seed.filter(|s| !was_tried(&tried, *s)) {
            let (result, boundary) = self.refine(kind, coarse_seed, exclusion, ctx.gradient);
            match result {
                Ok(mut feature) => {
                    feature.fallback = Fallback::FullFrame;
                    self.stats.full_frame_fallbacks += 1;
                    return Ok(Refinement {
                        feature: Some(feature),
                        boundary: Some(boundary),
                    });
                }
                Err(failure) => {
                    tracing::debug!(?kind, %failure, "full-frame fallback failed");
                    last_boundary = Some(boundary);
                }
            }
        }

        self.stats.features_lost += 1;
        tracing::debug!(?kind, "feature absent");
        Ok(Refinement {
            feature: None,
            boundary: last_boundary,
        })
    }

    /// Re-detect a seed with the radial transform on a patch around `seed`.
    ///
    /// The patch half-size is `fallback_patch_scale × ray_length`; radii span
    /// the fan's `[min_radius, ray_length]`.
    fn patch_seed(&self, kind: FeatureKind, seed: [f64; 2], plane: &Plane) -> Result<Option<[f64; 2]>, AnalyzeError> {
        if !(seed[0].is_finite() && seed[1].is_finite()) {
            return Ok(None);
        }
        let params = self.fan(kind).params();
        let tracking = &self.config.tracking;
        let half = (tracking.fallback_patch_scale * params.ray_length).ceil() as i64;
        let (cx, cy) = (seed[0].round() as i64, seed[1].round() as i64);
        let clamp = |v: i64, n: usize| v.clamp(0, n as i64) as usize;
        let (x0, x1) = (
            clamp(cx.saturating_sub(half), plane.w),
            clamp(cx.saturating_add(half).saturating_add(1), plane.w),
        );
        let (y0, y1) = (
            clamp(cy.saturating_sub(half), plane.h),
            clamp(cy.saturating_add(half).saturating_add(1), plane.h),
        );
        if x1 < x0 + 3 || y1 < y0 + 3 {
            return Ok(None);
        }

        let patch = plane.crop(x0, y0, x1, y1);
        let gradient = self.backend.sobel(&patch)?;
        let radii = RadiusSet::spanning(params.min_radius, params.ray_length, tracking.fallback_radius_steps);
        let map = self.backend.radial_transform(&gradient, &radii, self.config.radial.alpha);
        let Some(extrema) = self.backend.find_extrema(&map) else {
            return Ok(None);
        };
        let local = kind.extremum(&extrema);
        let found = [local[0] + x0 as f64, local[1] + y0 as f64];
        tracing::trace!(?kind, ?seed, ?found, "patch seed");
        Ok(Some(found))
    }
}

fn cached_radii<'a>(
    cache: &'a mut Option<(RadiusKey, RadiusSet)>,
    radial: &RadialConfig,
    height: usize,
) -> &'a RadiusSet {
    let key = RadiusKey {
        height,
        min_fraction: radial.min_radius_fraction,
        max_fraction: radial.max_radius_fraction,
        steps: radial.radius_steps,
    };
    if cache.as_ref().is_some_and(|(k, _)| *k != key) {
        *cache = None;
    }
    &cache.get_or_insert_with(|| (key, radial.radius_set(height))).1
}

fn was_tried(tried: &[[f64; 2]], p: [f64; 2]) -> bool {
    tried
        .iter()
        .any(|t| (t[0] - p[0]).abs() < 0.5 && (t[1] - p[1]).abs() < 0.5)
}

/// Plausibility gate: positive radius within the fan, center within reach of the seed.
fn accept_fit(fit: FitResult, seed: [f64; 2], ray_length: f64) -> Result<Feature, FeatureFailure> {
    if !fit.is_reliable() {
        return Err(FeatureFailure::NoReliableFit);
    }
    let drift = (fit.center[0] - seed[0]).hypot(fit.center[1] - seed[1]);
    if !(fit.radius > 0.0 && fit.radius <= ray_length && drift <= ray_length) {
        return Err(FeatureFailure::Implausible {
            radius: fit.radius,
            drift,
        });
    }
    Ok(Feature {
        position: fit.center,
        radius: fit.radius,
        fit_error: fit.fit_error,
        fallback: Fallback::None,
        ellipse: fit.ellipse,
    })
}
