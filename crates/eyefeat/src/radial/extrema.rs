//! Extremum selection on a symmetry map.
//!
//! Convention: the global minimum is the pupil candidate (dark symmetric
//! blob), the global maximum the CR candidate (bright glint).

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

use crate::frame::Plane;

use super::transform::SymmetryMap;

/// Value written outside the restrict region before the extremum scan.
pub const RESTRICTED_SCORE: f32 = -1.0;

/// Coarse pupil / CR candidates in map pixel coordinates, `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub pupil: [f64; 2],
    pub cr: [f64; 2],
    /// Map value at the pupil candidate.
    pub pupil_score: f32,
    /// Map value at the CR candidate.
    pub cr_score: f32,
}

/// Half-open rectangle of pixels allowed to hold an extremum.
///
/// Coordinates are full-resolution pixels: columns `[left, right)`,
/// rows `[top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictRegion {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl RestrictRegion {
    /// The same region on a map downsampled by `factor`.
    pub fn scaled_down(&self, factor: usize) -> Self {
        let f = factor.max(1);
        Self {
            top: self.top / f,
            bottom: self.bottom.div_ceil(f),
            left: self.left / f,
            right: self.right.div_ceil(f),
        }
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Confine extremum selection on `map` to this region.
    ///
    /// Scores outside are overwritten with [`RESTRICTED_SCORE`] for
    /// diagnostics; the extremum scans skip them regardless of value.
    pub fn apply(&self, map: &mut SymmetryMap) {
        let w = map.width();
        for y in 0..map.height() {
            for x in 0..w {
                if !self.contains(x, y) {
                    map.scores.data[y * w + x] = RESTRICTED_SCORE;
                }
            }
        }
        map.set_allowed_region(*self);
    }
}

/// Pluggable extremum-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremumStrategy {
    /// Global minimum ⇒ pupil, global maximum ⇒ CR.
    GlobalMinMax,
    /// Low-contrast eyes: connected components of `S > threshold`, the two
    /// best by mean score, the brighter one in the frame is the CR.
    Albino { threshold: f32 },
}

impl Default for ExtremumStrategy {
    fn default() -> Self {
        Self::GlobalMinMax
    }
}

/// Global minimum and maximum, first occurrence in row-major order.
///
/// Pixels outside the map's allowed region are never selected; `None` when
/// no pixel is allowed.
pub fn find_global_extrema(map: &SymmetryMap) -> Option<Extrema> {
    let data = &map.scores.data;
    if data.is_empty() {
        return None;
    }
    let w = map.width();
    let (mut min_i, mut max_i) = (0usize, 0usize);
    let (mut min_v, mut max_v) = (f32::INFINITY, f32::NEG_INFINITY);
    for (i, &v) in data.iter().enumerate() {
        if !map.is_allowed(i % w, i / w) {
            continue;
        }
        if v < min_v {
            min_v = v;
            min_i = i;
        }
        if v > max_v {
            max_v = v;
            max_i = i;
        }
    }
    if !min_v.is_finite() || !max_v.is_finite() {
        return None;
    }
    let at = |i: usize| [(i % w) as f64, (i / w) as f64];
    Some(Extrema {
        pupil: at(min_i),
        cr: at(max_i),
        pupil_score: min_v,
        cr_score: max_v,
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct Component {
    score_sum: f64,
    intensity_sum: f64,
    weighted_x: f64,
    weighted_y: f64,
    count: usize,
}

impl Component {
    fn mean_score(&self) -> f64 {
        self.score_sum / self.count as f64
    }

    fn mean_intensity(&self) -> f64 {
        self.intensity_sum / self.count as f64
    }

    /// Intensity-weighted centroid; plain centroid when the blob is black.
    fn center(&self, plain: [f64; 2]) -> [f64; 2] {
        if self.intensity_sum.abs() > f64::EPSILON {
            [
                self.weighted_x / self.intensity_sum,
                self.weighted_y / self.intensity_sum,
            ]
        } else {
            plain
        }
    }
}

/// Albino-mode selection.
///
/// `intensity` is the plane the map was computed from. Returns `None` when
/// fewer than two components exceed `threshold`.
pub fn find_albino_extrema(map: &SymmetryMap, intensity: &Plane, threshold: f32) -> Option<Extrema> {
    let (w, h) = (map.width(), map.height());
    if w == 0 || h == 0 || intensity.w != w || intensity.h != h {
        return None;
    }
    let mask = GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let (xu, yu) = (x as usize, y as usize);
        Luma([u8::from(map.is_allowed(xu, yu) && map.get(xu, yu) > threshold)])
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut comps: Vec<Component> = Vec::new();
    let mut plain: Vec<[f64; 2]> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let l = label[0] as usize;
        if l == 0 {
            continue;
        }
        if comps.len() < l {
            comps.resize(l, Component::default());
            plain.resize(l, [0.0, 0.0]);
        }
        let (xu, yu) = (x as usize, y as usize);
        let v = intensity.get(xu, yu) as f64;
        let c = &mut comps[l - 1];
        c.score_sum += map.get(xu, yu) as f64;
        c.intensity_sum += v;
        c.weighted_x += v * x as f64;
        c.weighted_y += v * y as f64;
        c.count += 1;
        plain[l - 1][0] += x as f64;
        plain[l - 1][1] += y as f64;
    }

    let mut ranked: Vec<usize> = (0..comps.len()).filter(|&i| comps[i].count > 0).collect();
    if ranked.len() < 2 {
        return None;
    }
    ranked.sort_by(|&a, &b| comps[b].mean_score().total_cmp(&comps[a].mean_score()));
    let (first, second) = (ranked[0], ranked[1]);
    let center = |i: usize| {
        let n = comps[i].count as f64;
        comps[i].center([plain[i][0] / n, plain[i][1] / n])
    };
    let (cr, pupil) = if comps[first].mean_intensity() > comps[second].mean_intensity() {
        (first, second)
    } else {
        (second, first)
    };
    tracing::trace!(
        components = comps.len(),
        cr_score = comps[cr].mean_score(),
        pupil_score = comps[pupil].mean_score(),
        "albino components ranked"
    );
    Some(Extrema {
        pupil: center(pupil),
        cr: center(cr),
        pupil_score: comps[pupil].mean_score() as f32,
        cr_score: comps[cr].mean_score() as f32,
    })
}

/// Apply `strategy`; albino mode falls back to the global scan when it finds
/// fewer than two components.
pub fn select_extrema(map: &SymmetryMap, intensity: &Plane, strategy: ExtremumStrategy) -> Option<Extrema> {
    match strategy {
        ExtremumStrategy::GlobalMinMax => find_global_extrema(map),
        ExtremumStrategy::Albino { threshold } => find_albino_extrema(map, intensity, threshold)
            .or_else(|| {
                tracing::debug!(threshold, "albino selection found < 2 components, using global extrema");
                find_global_extrema(map)
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from(w: usize, h: usize, f: impl FnMut(usize, usize) -> f32) -> SymmetryMap {
        SymmetryMap::from_scores(Plane::from_fn(w, h, f))
    }

    #[test]
    fn global_extrema_pick_first_occurrence() {
        let m = map_from(4, 3, |x, y| match (x, y) {
            (1, 0) | (3, 2) => 5.0,
            (2, 1) | (0, 2) => -3.0,
            _ => 0.0,
        });
        let e = find_global_extrema(&m).unwrap();
        assert_eq!(e.cr, [1.0, 0.0]);
        assert_eq!(e.pupil, [2.0, 1.0]);
        assert_eq!(e.cr_score, 5.0);
        assert_eq!(e.pupil_score, -3.0);
    }

    #[test]
    fn empty_map_has_no_extrema() {
        assert!(find_global_extrema(&map_from(0, 0, |_, _| 0.0)).is_none());
    }

    #[test]
    fn restriction_excludes_outside_pixels() {
        let mut m = map_from(6, 6, |x, y| match (x, y) {
            (0, 0) => 100.0,
            (5, 5) => -100.0,
            (3, 2) => 4.0,
            (2, 3) => -0.5,
            _ => 0.0,
        });
        let region = RestrictRegion {
            top: 1,
            bottom: 5,
            left: 1,
            right: 5,
        };
        region.apply(&mut m);
        assert_eq!(m.get(0, 0), RESTRICTED_SCORE);
        assert_eq!(m.allowed_region(), Some(region));
        let e = find_global_extrema(&m).unwrap();
        assert_eq!(e.cr, [3.0, 2.0]);
        // The sentinel is below -0.5 but lies outside the region.
        assert_eq!(e.pupil, [2.0, 3.0]);
        assert_eq!(e.pupil_score, -0.5);
    }

    #[test]
    fn restriction_holds_when_region_values_are_all_above_sentinel() {
        let mut m = map_from(8, 6, |x, y| 3.0 + (x + y) as f32);
        let region = RestrictRegion {
            top: 2,
            bottom: 6,
            left: 4,
            right: 8,
        };
        region.apply(&mut m);
        let e = find_global_extrema(&m).unwrap();
        assert_eq!(e.pupil, [4.0, 2.0]);
        assert_eq!(e.cr, [7.0, 5.0]);
        for p in [e.pupil, e.cr] {
            assert!(region.contains(p[0] as usize, p[1] as usize), "{:?}", p);
        }
    }

    #[test]
    fn region_outside_the_map_has_no_extrema() {
        let mut m = map_from(4, 4, |x, _| x as f32);
        RestrictRegion {
            top: 10,
            bottom: 12,
            left: 10,
            right: 12,
        }
        .apply(&mut m);
        assert!(find_global_extrema(&m).is_none());
    }

    #[test]
    fn albino_ignores_components_outside_region() {
        let mut m = map_from(15, 3, |x, _| match x {
            1 => 90.0,
            5 => 60.0,
            9 => 40.0,
            _ => 0.0,
        });
        let intensity = Plane::from_fn(15, 3, |x, _| if x == 9 { 200.0 } else { 50.0 });
        RestrictRegion {
            top: 0,
            bottom: 3,
            left: 3,
            right: 15,
        }
        .apply(&mut m);
        let e = find_albino_extrema(&m, &intensity, 10.0).unwrap();
        assert_eq!(e.pupil, [5.0, 1.0]);
        assert_eq!(e.cr, [9.0, 1.0]);
    }

    #[test]
    fn restriction_scales_with_downsampling() {
        let r = RestrictRegion {
            top: 3,
            bottom: 119,
            left: 10,
            right: 161,
        };
        let s = r.scaled_down(2);
        assert_eq!(
            s,
            RestrictRegion {
                top: 1,
                bottom: 60,
                left: 5,
                right: 81
            }
        );
        assert_eq!(r.scaled_down(0), r);
    }

    #[test]
    fn albino_assigns_brighter_component_to_cr() {
        // Two blobs above threshold; the left one is dark in the frame.
        let m = map_from(12, 6, |x, y| {
            if (1..=3).contains(&x) && (1..=3).contains(&y) {
                50.0
            } else if (7..=9).contains(&x) && (2..=4).contains(&y) {
                30.0
            } else {
                0.0
            }
        });
        let intensity = Plane::from_fn(12, 6, |x, _| if x < 6 { 10.0 } else { 240.0 });
        let e = find_albino_extrema(&m, &intensity, 10.0).unwrap();
        assert_eq!(e.cr, [8.0, 3.0]);
        assert_eq!(e.pupil, [2.0, 2.0]);
        assert_eq!(e.pupil_score, 50.0);
    }

    #[test]
    fn albino_keeps_two_best_components() {
        let m = map_from(15, 3, |x, _| match x {
            1 => 12.0,
            5 => 90.0,
            9 => 60.0,
            13 => 20.0,
            _ => 0.0,
        });
        let intensity = Plane::from_fn(15, 3, |x, _| if x == 9 { 200.0 } else { 50.0 });
        let e = find_albino_extrema(&m, &intensity, 10.0).unwrap();
        assert_eq!(e.pupil, [5.0, 1.0]);
        assert_eq!(e.cr, [9.0, 1.0]);
    }

    #[test]
    fn albino_falls_back_to_global_scan() {
        let m = map_from(8, 8, |x, y| match (x, y) {
            (2, 2) => 40.0,
            (6, 5) => -7.0,
            _ => 0.0,
        });
        let intensity = Plane::new(8, 8);
        assert!(find_albino_extrema(&m, &intensity, 10.0).is_none());
        let e = select_extrema(&m, &intensity, ExtremumStrategy::Albino { threshold: 10.0 }).unwrap();
        assert_eq!(e.cr, [2.0, 2.0]);
        assert_eq!(e.pupil, [6.0, 5.0]);
    }
}
