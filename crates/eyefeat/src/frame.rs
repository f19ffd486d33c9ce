//! Frame and working-plane types.
//!
//! [`Frame`] is what callers hand to the finder: a validated intensity buffer
//! plus the stream metadata that is copied into the output record.
//! [`Plane`] is the owned row-major `f32` image every stage computes on
//! (gradients, projections, symmetry maps).

use image::{GrayImage, ImageBuffer, Luma};

use crate::error::AnalyzeError;

/// Owned single-channel `f32` image, row-major, stride equal to width.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    /// Width in pixels.
    pub w: usize,
    /// Height in pixels.
    pub h: usize,
    /// Row-major samples, `w * h` long.
    pub data: Vec<f32>,
}

impl Plane {
    /// Zero-initialized plane of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    /// Wrap an existing buffer. `None` when the length does not match.
    pub fn from_vec(w: usize, h: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == w * h).then_some(Self { w, h, data })
    }

    /// Build a plane by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self { w, h, data }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }

    /// Bilinear sample at sub-pixel `(x, y)`.
    ///
    /// Returns `None` unless `0 <= x < w - 1` and `0 <= y < h - 1`, so the
    /// four taps are always inside the plane. Never extrapolates.
    #[inline]
    pub fn sample_bilinear(&self, x: f64, y: f64) -> Option<f32> {
        if !(x >= 0.0 && y >= 0.0 && x < (self.w as f64 - 1.0) && y < (self.h as f64 - 1.0)) {
            return None;
        }
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let fx = (x - x0 as f64) as f32;
        let fy = (y - y0 as f64) as f32;
        let i = self.idx(x0, y0);
        let a = self.data[i];
        let b = self.data[i + 1];
        let c = self.data[i + self.w];
        let d = self.data[i + self.w + 1];
        Some(
            a * (1.0 - fx) * (1.0 - fy) + b * fx * (1.0 - fy) + c * (1.0 - fx) * fy + d * fx * fy,
        )
    }

    /// Nearest-neighbour sample; `None` outside `[0, w) × [0, h)`.
    #[inline]
    pub fn sample_nearest(&self, x: f64, y: f64) -> Option<f32> {
        let xr = x.round();
        let yr = y.round();
        if !(xr >= 0.0 && yr >= 0.0 && xr < self.w as f64 && yr < self.h as f64) {
            return None;
        }
        Some(self.get(xr as usize, yr as usize))
    }

    /// Stride subsampling: keeps every `factor`-th row and column.
    pub fn subsample(&self, factor: usize) -> Plane {
        if factor <= 1 {
            return self.clone();
        }
        let w = self.w.div_ceil(factor);
        let h = self.h.div_ceil(factor);
        Plane::from_fn(w, h, |x, y| self.get(x * factor, y * factor))
    }

    /// Copy of the half-open window `[x0, x1) × [y0, y1)`, clipped to the plane.
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Plane {
        let x1 = x1.min(self.w);
        let y1 = y1.min(self.h);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        Plane::from_fn(x1 - x0, y1 - y0, |x, y| self.get(x0 + x, y0 + y))
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Linear rescale of the value range onto `0..=255` (for diagnostics output).
    pub fn to_gray_normalized(&self) -> GrayImage {
        let (lo, hi) = self
            .data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = if hi > lo { hi - lo } else { 1.0 };
        GrayImage::from_fn(self.w as u32, self.h as u32, |x, y| {
            let v = (self.get(x as usize, y as usize) - lo) / span;
            Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// A grayscale camera frame plus stream metadata.
#[derive(Clone, Debug)]
pub struct Frame {
    plane: Plane,
    frame_number: u64,
    timestamp: f64,
}

impl Frame {
    /// Frame from raw row-major samples.
    ///
    /// Fails when the buffer length disagrees with `width × height` or a
    /// sample is not finite. Zero-sized frames are accepted here and rejected
    /// by `analyze`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, AnalyzeError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(AnalyzeError::invalid_input(format!(
                "buffer holds {} samples, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        if let Some(i) = data.iter().position(|v| !v.is_finite()) {
            return Err(AnalyzeError::invalid_input(format!(
                "non-finite sample at index {}",
                i
            )));
        }
        Ok(Self {
            plane: Plane {
                w: width,
                h: height,
                data,
            },
            frame_number: 0,
            timestamp: 0.0,
        })
    }

    /// 8-bit frame; intensities keep their `0..=255` scale.
    pub fn from_gray(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self {
            plane: Plane {
                w: w as usize,
                h: h as usize,
                data: img.as_raw().iter().map(|&v| v as f32).collect(),
            },
            frame_number: 0,
            timestamp: 0.0,
        }
    }

    pub(crate) fn from_plane(plane: Plane) -> Self {
        Self {
            plane,
            frame_number: 0,
            timestamp: 0.0,
        }
    }

    /// Floating-point frame.
    pub fn from_luma_f32(img: &ImageBuffer<Luma<f32>, Vec<f32>>) -> Result<Self, AnalyzeError> {
        let (w, h) = img.dimensions();
        Self::new(w as usize, h as usize, img.as_raw().clone())
    }

    pub fn with_frame_number(mut self, frame_number: u64) -> Self {
        self.frame_number = frame_number;
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.plane.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.plane.h
    }

    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn plane(&self) -> &Plane {
        &self.plane
    }
}
