//! Shared fixtures for image-based unit tests.

use crate::frame::{Frame, Plane};
use crate::synth::{Disk, SyntheticEye};

/// Plane holding one hard-edged disk.
///
/// Pixels with `(x-cx)² + (y-cy)² <= r²` get `inside`, every other pixel
/// `outside`.
pub(crate) fn disk_plane(
    w: usize,
    h: usize,
    center: [f32; 2],
    radius: f32,
    inside: f32,
    outside: f32,
) -> Plane {
    let disk = Disk {
        center,
        radius,
        intensity: inside,
    };
    Plane::from_fn(w, h, |x, y| {
        if disk.contains(x as f32, y as f32) {
            inside
        } else {
            outside
        }
    })
}

/// The reference scene: 160×120, pupil r=10 at (60, 40), CR r=3 at (58, 35).
pub(crate) fn eye_frame() -> Frame {
    SyntheticEye::default().render()
}

/// Reference scene with the CR painted over in pupil intensity.
pub(crate) fn blink_frame() -> Frame {
    let mut eye = SyntheticEye::default();
    if let Some(cr) = eye.cr.as_mut() {
        cr.intensity = eye.pupil.intensity;
    }
    eye.render()
}

/// Flat gray frame with no features.
pub(crate) fn blank_frame(w: usize, h: usize, value: f32) -> Frame {
    Frame::from_plane(Plane::from_fn(w, h, |_, _| value))
}
