//! Separable 3×3 Sobel gradient.
//!
//! `gx = rows[-1, 0, 1] then cols[1, 2, 1]`, `gy = rows[1, 2, 1] then
//! cols[-1, 0, 1]`, both applied as correlation so the gradient points toward
//! brighter pixels. Borders are mirrored (`-1 → 1`, `w → w - 2`).

use crate::error::AnalyzeError;
use crate::frame::Plane;

/// Added to every magnitude so unit-vector normalization never divides by zero.
pub const MAGNITUDE_EPSILON: f32 = 1e-16;

const DERIVATIVE: [f32; 3] = [-1.0, 0.0, 1.0];
const SMOOTHING: [f32; 3] = [1.0, 2.0, 1.0];

/// Magnitude plus directional components of an image gradient.
#[derive(Clone, Debug)]
pub struct GradientField {
    pub mag: Plane,
    pub gx: Plane,
    pub gy: Plane,
}

impl GradientField {
    #[inline]
    pub fn width(&self) -> usize {
        self.mag.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.mag.h
    }

    /// Mean gradient magnitude; a cheap sharpness score.
    pub fn mean_magnitude(&self) -> f64 {
        self.mag.mean()
    }
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge sample.
#[inline]
pub fn reflect_index(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let last = n as isize - 1;
    let mut i = i;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

/// Correlate rows with `row_kernel`, then columns with `col_kernel`.
///
/// Kernels may have any odd or even length; the anchor is `len / 2`.
pub fn separable_filter(src: &Plane, row_kernel: &[f32], col_kernel: &[f32]) -> Plane {
    let (w, h) = (src.w, src.h);
    let mut tmp = Plane::new(w, h);
    let half_r = (row_kernel.len() / 2) as isize;
    for y in 0..h {
        let row = src.row(y);
        let base = y * w;
        for x in 0..w {
            let mut acc = 0.0f32;
            for (j, &k) in row_kernel.iter().enumerate() {
                let xi = reflect_index(x as isize + j as isize - half_r, w);
                acc += k * row[xi];
            }
            tmp.data[base + x] = acc;
        }
    }

    let mut out = Plane::new(w, h);
    let half_c = (col_kernel.len() / 2) as isize;
    for y in 0..h {
        let base = y * w;
        for (j, &k) in col_kernel.iter().enumerate() {
            if k == 0.0 {
                continue;
            }
            let yi = reflect_index(y as isize + j as isize - half_c, h);
            let src_row = tmp.row(yi);
            for (o, &v) in out.data[base..base + w].iter_mut().zip(src_row) {
                *o += k * v;
            }
        }
    }
    out
}

/// Sobel gradient of `plane`. Zero-sized input is [`AnalyzeError::InvalidInput`].
pub fn sobel3x3(plane: &Plane) -> Result<GradientField, AnalyzeError> {
    if plane.is_empty() {
        return Err(AnalyzeError::invalid_input(format!(
            "zero-sized frame ({}x{})",
            plane.w, plane.h
        )));
    }
    let gx = separable_filter(plane, &DERIVATIVE, &SMOOTHING);
    let gy = separable_filter(plane, &SMOOTHING, &DERIVATIVE);
    let data = gx
        .data
        .iter()
        .zip(&gy.data)
        .map(|(&dx, &dy)| (dx * dx + dy * dy).sqrt() + MAGNITUDE_EPSILON)
        .collect();
    Ok(GradientField {
        mag: Plane {
            w: plane.w,
            h: plane.h,
            data,
        },
        gx,
        gy,
    })
}
