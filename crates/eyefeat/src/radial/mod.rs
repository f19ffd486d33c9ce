//! Coarse feature localization via radial symmetry.
//!
//! Implements:
//! - Radius-set derivation from image-height fractions and the coarse-pass
//!   downsample factor.
//! - The Loy–Zelinski fast radial symmetry transform.
//! - Extremum selection (global min/max or albino connected components) with
//!   an optional restrict region.

mod extrema;
mod radii;
mod transform;

pub use extrema::{
    find_albino_extrema, find_global_extrema, select_extrema, Extrema, ExtremumStrategy,
    RestrictRegion, RESTRICTED_SCORE,
};
pub use radii::{downsample_factor, RadiusSet};
pub use transform::{fast_radial_transform, gaussian_window, kappa, SymmetryMap};
