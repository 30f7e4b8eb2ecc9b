use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use nalgebra::Point2;
use shapescan::core::{signed_area, HomographyTolerance, RgbImage, SheetCorner, SheetLayout};
use shapescan::fiducial::{FiducialDetector, FiducialParams};
use shapescan::load::encode_png;
use shapescan::rectify::sheet_to_photo;
use shapescan::synth::{render_scene, CameraPose, Scene, SceneRect, SceneSpec};
use shapescan::vector::{read_document, VectorFormat};
use shapescan::{ErrorKind, ScanConfig, ScanContext, ScanError, ScanPipeline};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(
            img.as_raw(),
            img.width() as u32,
            img.height() as u32,
            ExtendedColorType::Rgb8,
        )
        .expect("jpeg encode");
    out.into_inner()
}

fn rectangle_scene(w: usize, h: usize, pose: CameraPose) -> Scene {
    let layout = SheetLayout::a4_v1();
    let spec = SceneSpec::rectangle(w, h, pose, &layout, 50.0, 30.0);
    render_scene(&spec, &layout).expect("scene")
}

/// Largest distance, in sheet millimeters, between sheet points and their
/// round trip through the true camera and the solved homography.
fn sheet_residual_mm(scene: &Scene, out: &shapescan::ScanOutput, layout: &SheetLayout) -> f64 {
    let map = sheet_to_photo(&out.markers, layout, &HomographyTolerance::default()).unwrap();
    [
        Point2::new(0.0, 0.0),
        Point2::new(210.0, 0.0),
        Point2::new(210.0, 297.0),
        Point2::new(0.0, 297.0),
        Point2::new(105.0, 148.5),
    ]
    .iter()
    .map(|p| (map.inverse().apply(scene.photo_from_sheet.apply(*p)) - p).norm())
    .fold(0.0, f64::max)
}

#[test]
fn end_to_end_rectangle_at_20_degrees() {
    init_logging();
    let layout = SheetLayout::a4_v1();
    let pose = CameraPose {
        rotation_deg: 12.0,
        tilt_deg: 20.0,
        ..CameraPose::default()
    };
    let mut spec = SceneSpec::rectangle(3000, 4000, pose, &layout, 50.0, 30.0);
    spec.gradient = 0.15;
    let scene = render_scene(&spec, &layout).unwrap();
    let bytes = encode_jpeg(&scene.photo, 92);

    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let out = pipeline.run(&bytes, &ScanContext::new("e2e")).unwrap();

    assert_eq!(out.image_size, (3000, 4000));
    assert_eq!(out.load.format, "jpeg");
    assert_eq!(out.px_per_mm(), 10.0);
    for (corner, m) in out.markers.iter() {
        assert_eq!(m.id, layout.marker_id(corner));
        let truth = scene.photo_from_sheet.apply(layout.marker_center(corner));
        assert!((m.center - truth).norm() < 2.0, "{corner:?} off by {:?}", m.center - truth);
    }
    let residual = sheet_residual_mm(&scene, &out, &layout);
    assert!(residual < 0.5, "sheet residual {residual:.3} mm");

    let area = out.silhouette.area_mm2;
    assert!((area - 1500.0).abs() < 0.03 * 1500.0, "area {area:.1} mm²");
    assert_eq!(out.contours_count(), 1);
    let (w, h) = (out.geometry.width(), out.geometry.height());
    assert!((w - 50.0).abs() < 0.6, "width {w:.3}");
    assert!((h - 30.0).abs() < 0.6, "height {h:.3}");

    let b = out.silhouette.bounds_mm.unwrap();
    let center = Point2::new((b.min_x + b.max_x) / 2.0, (b.min_y + b.max_y) / 2.0);
    assert!((center - Point2::new(105.0, 148.5)).norm() < 0.5, "{center:?}");

    // both documents carry the same geometry
    for format in VectorFormat::ALL {
        let parsed = read_document(format, out.document(format)).unwrap();
        assert!(parsed.approx_eq(&out.geometry, 0.01), "{format}");
    }
}

#[test]
fn markers_found_at_any_rotation() {
    let layout = SheetLayout::a4_v1();
    let det = FiducialDetector::new(FiducialParams::default(), layout.clone()).unwrap();
    for rotation_deg in [0.0, 55.0, 90.0, 160.0, 215.0, 270.0, 330.0] {
        let scene = rectangle_scene(
            1500,
            2000,
            CameraPose {
                rotation_deg,
                tilt_deg: 15.0,
                ..CameraPose::default()
            },
        );
        let found = det
            .detect(&scene.photo)
            .unwrap_or_else(|e| panic!("rotation {rotation_deg}: {e}"));
        let map =
            sheet_to_photo(&found.markers, &layout, &HomographyTolerance::default()).unwrap();
        for corner in SheetCorner::ALL {
            let p = layout.marker_center(corner);
            let back = map.inverse().apply(scene.photo_from_sheet.apply(p));
            assert!(
                (back - p).norm() < 1.0,
                "rotation {rotation_deg}, {corner:?}: {:.3} mm",
                (back - p).norm()
            );
        }
    }
}

#[test]
fn three_visible_markers_fail_detection() {
    let layout = SheetLayout::a4_v1();
    let mut spec = SceneSpec::rectangle(1500, 2000, CameraPose::default(), &layout, 50.0, 30.0);
    spec.occluded = Some(SheetCorner::BottomLeft);
    let scene = render_scene(&spec, &layout).unwrap();

    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let err = pipeline
        .run_image(&scene.photo, &ScanContext::new("occluded"))
        .unwrap_err();
    assert!(
        matches!(err, ScanError::MarkerDetectionFailed { found: 3 }),
        "{err}"
    );
    assert!(err.kind().is_user_correctable());
}

#[test]
fn empty_sheet_has_no_object() {
    let layout = SheetLayout::a4_v1();
    let pose = CameraPose {
        rotation_deg: -8.0,
        tilt_deg: 10.0,
        ..CameraPose::default()
    };
    let mut spec = SceneSpec::empty_sheet(1500, 2000, pose);
    spec.gradient = 0.1;
    let scene = render_scene(&spec, &layout).unwrap();

    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let err = pipeline
        .run(&encode_png(&scene.photo).unwrap(), &ScanContext::new("empty"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoObjectDetected, "{err}");
}

#[test]
fn repeated_and_concurrent_runs_agree() {
    let scene = rectangle_scene(
        1500,
        2000,
        CameraPose {
            rotation_deg: 30.0,
            tilt_deg: 12.0,
            ..CameraPose::default()
        },
    );
    let bytes = encode_png(&scene.photo).unwrap();
    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let first = pipeline.run(&bytes, &ScanContext::new("a")).unwrap();
    let second = pipeline.run(&bytes, &ScanContext::new("b")).unwrap();
    assert_eq!(first.geometry, second.geometry);
    assert_eq!(first.svg, second.svg);
    assert_eq!(first.dxf, second.dxf);

    let outputs: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let (pipeline, bytes) = (&pipeline, &bytes);
                s.spawn(move || pipeline.run(bytes, &ScanContext::new(format!("t{i}"))))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });
    for out in outputs {
        assert_eq!(out.geometry, first.geometry);
    }
}

#[test]
fn scale_is_the_configured_density_at_any_resolution() {
    let mut config = ScanConfig::default();
    config.rectify.px_per_mm = 8.0;
    let pipeline = ScanPipeline::new(config).unwrap();
    let pose = CameraPose {
        tilt_deg: 10.0,
        ..CameraPose::default()
    };
    for (w, h) in [(1500, 2000), (2400, 3200)] {
        let scene = rectangle_scene(w, h, pose.clone());
        let out = pipeline
            .run_image(&scene.photo, &ScanContext::new(format!("{w}x{h}")))
            .unwrap();
        assert_eq!(out.px_per_mm(), 8.0);
        assert!(out.scale.deviation < 0.005);
        assert!(out.scale.outline_deviation < 0.05);
        let area = out.silhouette.area_mm2;
        assert!((area - 1500.0).abs() < 0.05 * 1500.0, "{w}x{h}: {area:.1} mm²");
    }
}

fn assert_box(out: &shapescan::ScanOutput, center: Point2<f64>, w: f64, h: f64, tol: f64) {
    let (gw, gh) = (out.geometry.width(), out.geometry.height());
    assert!((gw - w).abs() < tol, "width {gw:.3}");
    assert!((gh - h).abs() < tol, "height {gh:.3}");
    let b = out.silhouette.bounds_mm.unwrap();
    let c = Point2::new((b.min_x + b.max_x) / 2.0, (b.min_y + b.max_y) / 2.0);
    assert!((c - center).norm() < tol, "{c:?}");
}

#[test]
fn washer_keeps_its_hole() {
    let layout = SheetLayout::a4_v1();
    let pose = CameraPose {
        rotation_deg: 20.0,
        tilt_deg: 12.0,
        ..CameraPose::default()
    };
    let center = Point2::new(105.0, 148.5);
    let mut spec = SceneSpec::rectangle(1500, 2000, pose, &layout, 60.0, 40.0);
    let paper = spec.paper_color;
    spec.objects.push(SceneRect::centered(center, 20.0, 20.0, paper));
    let scene = render_scene(&spec, &layout).unwrap();

    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let out = pipeline
        .run_image(&scene.photo, &ScanContext::new("washer"))
        .unwrap();

    assert_eq!(out.contours_count(), 2);
    assert_eq!(out.silhouette.holes, 1);
    let area = out.silhouette.area_mm2;
    assert!((area - 2000.0).abs() < 0.05 * 2000.0, "area {area:.1} mm²");
    assert_box(&out, center, 60.0, 40.0, 0.6);

    // outer ring clockwise on the page, hole counter-clockwise
    let path = &out.geometry.paths()[0];
    assert!(signed_area(path.outer()) > 0.0);
    assert_eq!(path.holes().len(), 1);
    assert!(signed_area(&path.holes()[0]) < 0.0);
    let hole_area = -signed_area(&path.holes()[0]);
    assert!((hole_area - 400.0).abs() < 0.1 * 400.0, "hole {hole_area:.1} mm²");

    for format in VectorFormat::ALL {
        let parsed = read_document(format, out.document(format)).unwrap();
        assert_eq!(parsed.ring_count(), 2, "{format}");
        assert!(parsed.approx_eq(&out.geometry, 0.01), "{format}");
    }
}

#[test]
fn object_over_margin_patches_is_measured() {
    let layout = SheetLayout::a4_v1();
    let pose = CameraPose {
        rotation_deg: -10.0,
        tilt_deg: 15.0,
        ..CameraPose::default()
    };
    // covers every background patch on the top margin
    let center = Point2::new(105.0, 35.0);
    let mut spec = SceneSpec::empty_sheet(1500, 2000, pose);
    spec.objects
        .push(SceneRect::centered(center, 80.0, 20.0, [38, 64, 150]));
    spec.gradient = 0.1;
    let scene = render_scene(&spec, &layout).unwrap();

    let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
    let out = pipeline
        .run_image(&scene.photo, &ScanContext::new("margin"))
        .unwrap();

    assert_eq!(out.contours_count(), 1);
    let area = out.silhouette.area_mm2;
    assert!((area - 1600.0).abs() < 0.05 * 1600.0, "area {area:.1} mm²");
    assert_box(&out, center, 80.0, 20.0, 0.8);
}
