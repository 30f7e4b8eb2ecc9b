use approx::assert_relative_eq;
use nalgebra::Point2;
use shapescan_core::{has_crossings, is_simple, Mask, RgbImage, ScaleBounds, ScaleFactor, SheetLayout};
use shapescan_segment::{ObjectSegmenter, SegmentParams};

/// Rectified canvas with a sheet shaded by `light(x, y)` and object pixels
/// wherever `object(x, y)` (sheet mm) holds.
fn render(
    scale: ScaleFactor,
    light: impl Fn(f64, f64) -> f64,
    object: impl Fn(f64, f64) -> bool,
) -> (RgbImage, Mask) {
    let layout = SheetLayout::a4_v1();
    let w = scale.mm_to_px_len(layout.width_mm).round() as usize;
    let h = scale.mm_to_px_len(layout.height_mm).round() as usize;
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            let p = scale.px_to_mm(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            let l = light(p.x, p.y);
            let base = if object(p.x, p.y) {
                [150.0, 40.0, 30.0]
            } else {
                [240.0, 238.0, 232.0]
            };
            data.extend(base.map(|v: f64| (v * l).round().clamp(0.0, 255.0) as u8));
        }
    }
    (
        RgbImage::from_raw(w, h, data).unwrap(),
        Mask::from_fn(w, h, |_, _| true),
    )
}

#[test]
fn washer_keeps_its_hole_under_uneven_light() {
    let scale = ScaleFactor::new(5.0, &ScaleBounds::default()).unwrap();
    let (cx, cy) = (105.0, 150.0);
    let washer = |x: f64, y: f64| {
        let r = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        (12.0..30.0).contains(&r)
    };
    // a third darker at the bottom right than at the top left
    let light = |x: f64, y: f64| 1.0 - 0.33 * (x / 210.0 + y / 297.0) / 2.0;
    let (canvas, coverage) = render(scale, light, washer);

    let seg = ObjectSegmenter::new(SegmentParams::default(), SheetLayout::a4_v1())
        .unwrap()
        .segment(&canvas, &coverage, scale)
        .unwrap();
    let s = &seg.silhouette;
    assert_eq!(s.ring_count(), 2);
    for ring in s.rings() {
        assert!(is_simple(ring));
    }
    assert!(!has_crossings(&s.rings().collect::<Vec<_>>()));

    let expected = std::f64::consts::PI * (30.0f64.powi(2) - 12.0f64.powi(2));
    let area = scale.area_px_to_mm2(s.area_px());
    assert_relative_eq!(area, expected, max_relative = 0.02);
    assert!(seg.background.patches().iter().all(|p| p.kept));
}

#[test]
fn object_over_a_margin_patch_is_still_found() {
    let scale = ScaleFactor::new(4.0, &ScaleBounds::default()).unwrap();
    // long strip reaching over the left patches' column
    let strip = |x: f64, y: f64| (25.0..140.0).contains(&x) && (140.0..160.0).contains(&y);
    let (canvas, coverage) = render(scale, |_, _| 1.0, strip);

    let seg = ObjectSegmenter::new(SegmentParams::default(), SheetLayout::a4_v1())
        .unwrap()
        .segment(&canvas, &coverage, scale)
        .unwrap();
    assert_eq!(seg.background.patches().iter().filter(|p| !p.kept).count(), 1);
    let b = seg.silhouette.bounds().unwrap();
    assert_relative_eq!(b.min_x / 4.0, 25.0, epsilon = 0.3);
    assert_relative_eq!(b.max_x / 4.0, 140.0, epsilon = 0.3);
}

#[test]
fn identical_input_gives_identical_silhouette() {
    let scale = ScaleFactor::new(4.0, &ScaleBounds::default()).unwrap();
    let blob = |x: f64, y: f64| ((x - 100.0) / 40.0).powi(2) + ((y - 150.0) / 25.0).powi(2) < 1.0;
    let (canvas, coverage) = render(scale, |_, _| 1.0, blob);
    let seg = ObjectSegmenter::new(SegmentParams::default(), SheetLayout::a4_v1()).unwrap();
    let a = seg.segment(&canvas, &coverage, scale).unwrap();
    let b = seg.segment(&canvas, &coverage, scale).unwrap();
    assert_eq!(a.silhouette, b.silhouette);
}
