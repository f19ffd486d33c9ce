//! Synthetic eye frames: a dark pupil disk and a bright CR disk on a flat
//! background, optionally Gaussian-blurred.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, Plane};

/// Filled disk: pixels with `(x-cx)² + (y-cy)² <= r²` take `intensity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub center: [f32; 2],
    pub radius: f32,
    pub intensity: f32,
}

impl Disk {
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let dx = x - self.center[0];
        let dy = y - self.center[1];
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticEye {
    pub width: usize,
    pub height: usize,
    pub background: f32,
    pub pupil: Disk,
    /// Painted after the pupil, so it can overlap it.
    pub cr: Option<Disk>,
    /// Gaussian blur sigma in pixels; `None` keeps hard edges.
    pub blur_sigma: Option<f32>,
}

impl Default for SyntheticEye {
    /// 160×120 frame, pupil r=10 at (60, 40), CR r=3 at (58, 35), gray 128.
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            background: 128.0,
            pupil: Disk {
                center: [60.0, 40.0],
                radius: 10.0,
                intensity: 0.0,
            },
            cr: Some(Disk {
                center: [58.0, 35.0],
                radius: 3.0,
                intensity: 255.0,
            }),
            blur_sigma: None,
        }
    }
}

impl SyntheticEye {
    /// Same scene with both disks shifted by `(dx, dy)`.
    pub fn shifted(&self, dx: f32, dy: f32) -> Self {
        let mut out = self.clone();
        out.pupil.center = [out.pupil.center[0] + dx, out.pupil.center[1] + dy];
        if let Some(cr) = out.cr.as_mut() {
            cr.center = [cr.center[0] + dx, cr.center[1] + dy];
        }
        out
    }

    pub fn render_plane(&self) -> Plane {
        let plane = Plane::from_fn(self.width, self.height, |x, y| {
            let (xf, yf) = (x as f32, y as f32);
            match self.cr {
                Some(cr) if cr.contains(xf, yf) => cr.intensity,
                _ if self.pupil.contains(xf, yf) => self.pupil.intensity,
                _ => self.background,
            }
        });
        match self.blur_sigma {
            Some(sigma) if sigma > 0.0 && !plane.is_empty() => blur_plane(&plane, sigma),
            _ => plane,
        }
    }

    pub fn render(&self) -> Frame {
        let plane = self.render_plane();
        Frame::from_plane(plane)
    }

    /// 8-bit rendering, values clamped to `[0, 255]`.
    pub fn render_gray(&self) -> GrayImage {
        let plane = self.render_plane();
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([plane.get(x as usize, y as usize).clamp(0.0, 255.0).round() as u8])
        })
    }
}

fn blur_plane(plane: &Plane, sigma: f32) -> Plane {
    let buf: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(plane.w as u32, plane.h as u32, |x, y| {
            Luma([plane.get(x as usize, y as usize)])
        });
    let blurred = imageproc::filter::gaussian_blur_f32(&buf, sigma);
    Plane::from_fn(plane.w, plane.h, |x, y| blurred.get_pixel(x as u32, y as u32)[0])
}
