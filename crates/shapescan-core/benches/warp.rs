//! Rectification warp throughput.
//!
//! Run with: cargo bench -p shapescan-core
//! Parallel rows: cargo bench -p shapescan-core --features rayon

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::{Matrix3, Point2};
use shapescan_core::{homography_from_4pt, warp_perspective_rgb, Homography, RgbImage};

fn gradient_photo(w: usize, h: usize) -> RgbImage {
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    RgbImage::from_raw(w, h, data).expect("buffer size")
}

fn bench_warp(c: &mut Criterion) {
    let photo = gradient_photo(3000, 4000);
    let sheet = [
        Point2::new(0.0, 0.0),
        Point2::new(210.0, 0.0),
        Point2::new(210.0, 297.0),
        Point2::new(0.0, 297.0),
    ];
    let img = [
        Point2::new(420.0, 380.0),
        Point2::new(2610.0, 520.0),
        Point2::new(2750.0, 3650.0),
        Point2::new(260.0, 3480.0),
    ];
    let img_from_sheet = homography_from_4pt(&sheet, &img).expect("solvable");

    let mut group = c.benchmark_group("warp_perspective_rgb");
    group.sample_size(10);
    for px_per_mm in [4.0_f64, 10.0] {
        let w = (210.0 * px_per_mm).round() as usize;
        let h = (297.0 * px_per_mm).round() as usize;
        let img_from_canvas = img_from_sheet.compose(&Homography::scaling(1.0 / px_per_mm));
        group.throughput(Throughput::Elements((w * h) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(px_per_mm),
            &img_from_canvas,
            |b, h_map| {
                b.iter(|| warp_perspective_rgb(black_box(&photo.view()), h_map, w, h));
            },
        );
    }
    group.finish();

    let identity = Homography::new(Matrix3::identity());
    c.bench_function("warp_identity_1mp", |b| {
        b.iter(|| warp_perspective_rgb(black_box(&photo.view()), &identity, 1000, 1000));
    });
}

criterion_group!(benches, bench_warp);
criterion_main!(benches);
