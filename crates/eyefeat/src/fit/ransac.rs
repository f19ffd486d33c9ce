//! RANSAC wrapper around the least-squares circle fit.

use serde::{Deserialize, Serialize};

use super::{fit_circle, FitResult};

/// Consensus-search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleRansacConfig {
    /// Number of random subsets tried.
    pub max_iters: usize,
    /// Subset size; inputs smaller than this get a plain least-squares fit.
    pub min_consensus: usize,
    /// Inlier band as a fraction of the candidate radius.
    pub inlier_fraction: f64,
    /// RNG seed; equal inputs and seeds give equal fits.
    pub seed: u64,
}

impl Default for CircleRansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 20,
            min_consensus: 8,
            inlier_fraction: 0.05,
            seed: 0x5EED,
        }
    }
}

/// Fit a circle robustly.
///
/// The full least-squares fit is the initial best. Each iteration fits a
/// random `min_consensus` subset, grows it with every point whose distance to
/// the candidate circle is within `inlier_fraction · r`, and, when the grown
/// set covers more than half of the input, refits it. The lowest-error
/// refit wins.
pub fn fit_circle_ransac(points: &[[f64; 2]], config: &CircleRansacConfig) -> FitResult {
    use rand::prelude::*;

    let n = points.len();
    let k = config.min_consensus.max(3);
    let mut best = fit_circle(points);
    if n < k {
        return best;
    }
    let good_consensus = (n as f64 / 2.0).round() as usize;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut subset: Vec<[f64; 2]> = Vec::with_capacity(n);
    for _ in 0..config.max_iters {
        let sample = sample_indices(&mut rng, n, k);
        subset.clear();
        subset.extend(sample.iter().map(|&i| points[i]));
        let candidate = fit_circle(&subset);
        if !candidate.is_reliable() {
            continue;
        }

        let band = config.inlier_fraction * candidate.radius;
        let mut in_sample = vec![false; n];
        for &i in &sample {
            in_sample[i] = true;
        }
        for (i, p) in points.iter().enumerate() {
            if in_sample[i] {
                continue;
            }
            let d = (p[0] - candidate.center[0]).hypot(p[1] - candidate.center[1]);
            if (d - candidate.radius).abs() < band {
                subset.push(*p);
            }
        }

        if subset.len() > good_consensus {
            let refit = fit_circle(&subset);
            if refit.fit_error < best.fit_error {
                best = refit;
            }
        }
    }
    tracing::trace!(
        points = n,
        fit_error = best.fit_error,
        radius = best.radius,
        "ransac circle fit"
    );
    best
}

/// Sample `k` distinct indices from `0..n` using Fisher–Yates partial shuffle.
fn sample_indices(rng: &mut impl rand::Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
