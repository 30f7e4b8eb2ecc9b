//! Synthetic photos of the reference sheet.
//!
//! The sheet is rendered at a fixed density, objects are painted onto it as
//! axis-aligned rectangles in sheet millimeters, and the result is projected
//! into a photo through a pinhole camera homography. Everything is
//! deterministic.

use nalgebra::{Matrix3, Point2, Vector2};
use shapescan_core::{warp_perspective_rgb, Homography, RgbImage, SheetCorner, SheetLayout};
use shapescan_fiducial::{render_sheet, FiducialError, SHEET_4X4_V1};

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error(transparent)]
    Sheet(#[from] FiducialError),
    #[error("camera pose does not give an invertible view of the sheet")]
    Camera,
    #[error("scene parameters are invalid: {0}")]
    Invalid(&'static str),
}

/// Pinhole camera looking at the sheet center.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraPose {
    /// In-plane rotation of the sheet, degrees.
    pub rotation_deg: f64,
    /// Rotation of the sheet plane about the photo's horizontal axis, degrees.
    pub tilt_deg: f64,
    /// Share of the shorter photo side spanned by the sheet diagonal.
    pub fill: f64,
    /// Distance from the camera to the sheet center, in sheet diagonals.
    pub distance: f64,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            rotation_deg: 0.0,
            tilt_deg: 0.0,
            fill: 0.8,
            distance: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneRect {
    pub origin_mm: Point2<f64>,
    pub size_mm: Vector2<f64>,
    pub color: [u8; 3],
}

impl SceneRect {
    /// A `w × h` mm rectangle centered on `center`.
    pub fn centered(center: Point2<f64>, w: f64, h: f64, color: [u8; 3]) -> Self {
        Self {
            origin_mm: Point2::new(center.x - w / 2.0, center.y - h / 2.0),
            size_mm: Vector2::new(w, h),
            color,
        }
    }

    fn contains(&self, p: Point2<f64>) -> bool {
        let d = p - self.origin_mm;
        d.x >= 0.0 && d.y >= 0.0 && d.x < self.size_mm.x && d.y < self.size_mm.y
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneSpec {
    pub width: usize,
    pub height: usize,
    pub camera: CameraPose,
    /// Painted in order, so later rectangles cover earlier ones.
    pub objects: Vec<SceneRect>,
    pub paper_color: [u8; 3],
    pub ink_color: [u8; 3],
    pub table_color: [u8; 3],
    /// Relative brightness lost from the left photo edge to the right one.
    pub gradient: f64,
    /// Marker hidden under a patch of `occluder_color`.
    pub occluded: Option<SheetCorner>,
    pub occluder_color: [u8; 3],
    /// Density the sheet is drawn at before projection.
    pub sheet_px_per_mm: f64,
}

impl SceneSpec {
    /// An empty sheet on a wooden table.
    pub fn empty_sheet(width: usize, height: usize, camera: CameraPose) -> Self {
        Self {
            width,
            height,
            camera,
            objects: Vec::new(),
            paper_color: [236, 234, 228],
            ink_color: [24, 24, 28],
            table_color: [112, 86, 62],
            gradient: 0.0,
            occluded: None,
            occluder_color: [196, 150, 128],
            sheet_px_per_mm: 8.0,
        }
    }

    /// A blue `w × h` mm rectangle in the middle of the sheet.
    pub fn rectangle(
        width: usize,
        height: usize,
        camera: CameraPose,
        layout: &SheetLayout,
        w_mm: f64,
        h_mm: f64,
    ) -> Self {
        let center = Point2::new(layout.width_mm / 2.0, layout.height_mm / 2.0);
        let mut spec = Self::empty_sheet(width, height, camera);
        spec.objects
            .push(SceneRect::centered(center, w_mm, h_mm, [38, 64, 150]));
        spec
    }
}

/// A rendered photo and the ground-truth map from sheet millimeters to its
/// pixels.
#[derive(Clone, Debug)]
pub struct Scene {
    pub photo: RgbImage,
    pub photo_from_sheet: Homography,
}

/// Homography from sheet millimeters to photo pixels for `pose`.
pub fn camera_homography(
    pose: &CameraPose,
    layout: &SheetLayout,
    width: usize,
    height: usize,
) -> Option<Homography> {
    let diag = layout.width_mm.hypot(layout.height_mm);
    let z0 = pose.distance * diag;
    let f = pose.fill * width.min(height) as f64 * pose.distance;
    if !(z0 > 0.0 && f > 0.0) {
        return None;
    }

    let (s, c) = pose.rotation_deg.to_radians().sin_cos();
    let rz = Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0);
    let (st, ct) = pose.tilt_deg.to_radians().sin_cos();
    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, ct, -st, 0.0, st, ct);
    let r = rx * rz;

    // [r1 r2 t] with t = (0, 0, z0)
    let mut rt = r;
    rt.set_column(2, &nalgebra::Vector3::new(0.0, 0.0, z0));
    let k = Matrix3::new(
        f,
        0.0,
        width as f64 / 2.0,
        0.0,
        f,
        height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let center = Matrix3::new(
        1.0,
        0.0,
        -layout.width_mm / 2.0,
        0.0,
        1.0,
        -layout.height_mm / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let h = Homography::new(k * rt * center);
    h.inverse().map(|_| h)
}

fn lerp(a: [u8; 3], b: [u8; 3], t: f64) -> [u8; 3] {
    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = (a[i] as f64 + (b[i] as f64 - a[i] as f64) * t).round() as u8;
    }
    out
}

fn paint_sheet(spec: &SceneSpec, layout: &SheetLayout) -> Result<RgbImage, SceneError> {
    let gray = render_sheet(layout, &SHEET_4X4_V1, spec.sheet_px_per_mm)?;
    let (w, h) = (gray.width(), gray.height());
    let d = spec.sheet_px_per_mm;
    let occluder = spec.occluded.map(|c| {
        let pad = 0.1 * layout.marker_size_mm;
        let (x0, y0, x1, y1) = layout.marker_rect(c, pad);
        SceneRect {
            origin_mm: Point2::new(x0, y0),
            size_mm: Vector2::new(x1 - x0, y1 - y0),
            color: spec.occluder_color,
        }
    });

    let mut data = Vec::with_capacity(w * h * 3);
    for (i, &v) in gray.as_raw().iter().enumerate() {
        let p = Point2::new(((i % w) as f64 + 0.5) / d, ((i / w) as f64 + 0.5) / d);
        let painted = spec
            .objects
            .iter()
            .chain(occluder.as_ref())
            .rev()
            .find(|r| r.contains(p));
        let px = match painted {
            Some(r) => r.color,
            None => lerp(spec.ink_color, spec.paper_color, v as f64 / 255.0),
        };
        data.extend_from_slice(&px);
    }
    RgbImage::from_raw(w, h, data).ok_or(SceneError::Invalid("sheet raster size"))
}

/// Render the photo described by `spec`.
pub fn render_scene(spec: &SceneSpec, layout: &SheetLayout) -> Result<Scene, SceneError> {
    if spec.width == 0 || spec.height == 0 {
        return Err(SceneError::Invalid("photo must not be empty"));
    }
    if !(0.0..1.0).contains(&spec.gradient) {
        return Err(SceneError::Invalid("gradient must be in [0, 1)"));
    }
    let photo_from_sheet =
        camera_homography(&spec.camera, layout, spec.width, spec.height).ok_or(SceneError::Camera)?;
    let sheet_from_photo = photo_from_sheet.inverse().ok_or(SceneError::Camera)?;
    let raster_from_photo = Homography::scaling(spec.sheet_px_per_mm).compose(&sheet_from_photo);

    let sheet = paint_sheet(spec, layout)?;
    let warped = warp_perspective_rgb(&sheet.view(), &raster_from_photo, spec.width, spec.height);

    let w = spec.width;
    let mut data = warped.image.into_raw();
    for (i, px) in data.chunks_exact_mut(3).enumerate() {
        let (x, y) = (i % w, i / w);
        if !warped.coverage.get(x, y) {
            // faint wood grain
            let grain = ((x / 3 + y / 11) % 4) as f64 * 3.0;
            for c in 0..3 {
                px[c] = (spec.table_color[c] as f64 + grain).min(255.0) as u8;
            }
        }
        let light = 1.0 - spec.gradient * (x as f64 + 0.5) / w as f64;
        for v in px.iter_mut() {
            *v = (*v as f64 * light).round() as u8;
        }
    }
    let photo =
        RgbImage::from_raw(w, spec.height, data).ok_or(SceneError::Invalid("photo raster size"))?;
    Ok(Scene {
        photo,
        photo_from_sheet,
    })
}
