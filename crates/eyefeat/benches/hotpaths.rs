use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use eyefeat::fit::{fit_circle, fit_circle_ransac, fit_ellipse, CircleRansacConfig};
use eyefeat::gradient::sobel3x3;
use eyefeat::radial::{fast_radial_transform, RadiusSet};
use eyefeat::starburst::{find_boundary, BoundarySearch, RayFan, RayFanParams};
use eyefeat::{CompositeFeatureFinder, Disk, SyntheticEye};

fn scene_640x480() -> SyntheticEye {
    SyntheticEye {
        width: 640,
        height: 480,
        background: 128.0,
        pupil: Disk {
            center: [300.0, 220.0],
            radius: 22.0,
            intensity: 20.0,
        },
        cr: Some(Disk {
            center: [292.0, 210.0],
            radius: 4.0,
            intensity: 250.0,
        }),
        blur_sigma: Some(1.2),
    }
}

fn bench_gradient(c: &mut Criterion) {
    let plane = scene_640x480().render_plane();
    c.bench_function("sobel_640x480", |b| {
        b.iter(|| black_box(sobel3x3(black_box(&plane)).map(|g| g.mag.data.len())))
    });
}

fn bench_radial_transform(c: &mut Criterion) {
    let eye = SyntheticEye::default();
    let gradient = sobel3x3(&eye.render_plane()).expect("non-empty fixture");
    let radii = RadiusSet::from_fractions(eye.height, 0.0126, 0.12, 6);
    c.bench_function("radial_transform_160x120_6r", |b| {
        b.iter(|| {
            let map = fast_radial_transform(black_box(&gradient), black_box(&radii), 10.0);
            black_box(map.scores.data[0])
        })
    });
}

fn bench_starburst(c: &mut Criterion) {
    let eye = scene_640x480();
    let gradient = sobel3x3(&eye.render_plane()).expect("non-empty fixture");
    let fan = RayFan::new(RayFanParams {
        ray_length: 40.0,
        ..RayFanParams::pupil()
    });
    let search = BoundarySearch::default();
    c.bench_function("starburst_pupil_40rays", |b| {
        b.iter(|| {
            let set = find_boundary(
                black_box(&gradient.mag),
                black_box([301.0, 221.0]),
                &fan,
                &search,
                None,
            );
            black_box(set.len())
        })
    });
}

fn noisy_circle(n: usize, outliers: usize) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(12345);
    let mut pts: Vec<[f64; 2]> = (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            [
                300.0 + 22.0 * t.cos() + rng.gen_range(-0.35..0.35),
                220.0 + 22.0 * t.sin() + rng.gen_range(-0.35..0.35),
            ]
        })
        .collect();
    for _ in 0..outliers {
        pts.push([rng.gen_range(270.0..330.0), rng.gen_range(190.0..250.0)]);
    }
    pts
}

fn bench_fits(c: &mut Criterion) {
    let points = noisy_circle(40, 0);
    let dirty = noisy_circle(40, 8);
    let ransac = CircleRansacConfig::default();
    c.bench_function("circle_fit_40pts", |b| b.iter(|| black_box(fit_circle(black_box(&points)))));
    c.bench_function("ellipse_fit_40pts", |b| b.iter(|| black_box(fit_ellipse(black_box(&points)))));
    c.bench_function("circle_ransac_48pts", |b| {
        b.iter(|| black_box(fit_circle_ransac(black_box(&dirty), &ransac)))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let frame = scene_640x480().render();
    c.bench_function("analyze_reseed_640x480", |b| {
        let mut finder = CompositeFeatureFinder::new();
        b.iter(|| {
            let rec = finder.analyze(black_box(&frame), None);
            black_box(rec.map(|r| r.status))
        })
    });
    c.bench_function("analyze_tracked_640x480", |b| {
        let mut finder = CompositeFeatureFinder::new();
        let first = finder.analyze(&frame, None).ok();
        b.iter(|| {
            let rec = finder.analyze(black_box(&frame), first.as_ref());
            black_box(rec.map(|r| r.status))
        })
    });
}

criterion_group!(
    hotpaths,
    bench_gradient,
    bench_radial_transform,
    bench_starburst,
    bench_fits,
    bench_analyze
);
criterion_main!(hotpaths);
