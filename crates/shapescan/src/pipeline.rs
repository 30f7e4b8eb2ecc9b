//! End-to-end scan driver.
//!
//! A [`ScanPipeline`] is built once from a validated [`ScanConfig`] and then
//! shared by any number of concurrent requests. All per-request state lives
//! in the [`ScanContext`] passed to [`ScanPipeline::run`] and in the values
//! each stage hands to the next.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use shapescan_core::{Bounds, RgbImage};
use shapescan_fiducial::{FiducialDetector, MarkerSet};
use shapescan_segment::{ObjectSegmenter, SegmentStats, Silhouette};
use shapescan_vector::{
    DxfWriter, SvgWriter, VectorFormat, VectorGeometry, VectorWriter, Vectorizer,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::ScanConfig;
use crate::error::{ConfigError, ScanError};
use crate::load::{load_image, LoadInfo};
use crate::rectify::{rectify, sheet_to_photo};
use crate::scale::{resolve_scale, ScaleReport};

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Detect,
    Rectify,
    Scale,
    Segment,
    Vectorize,
    Export,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Detect => "detect",
            Self::Rectify => "rectify",
            Self::Scale => "scale",
            Self::Segment => "segment",
            Self::Vectorize => "vectorize",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-request context: an id for log correlation and an optional deadline
/// checked between stages.
#[derive(Clone, Debug)]
pub struct ScanContext {
    request_id: String,
    started: Instant,
    deadline: Option<Instant>,
}

impl ScanContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            started: Instant::now(),
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = self.started.checked_add(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with [`ScanError::Timeout`] if the deadline passed before `next`.
    pub fn check(&self, next: Stage) -> Result<(), ScanError> {
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(ScanError::Timeout {
                stage: next,
                elapsed: self.elapsed(),
            }),
            _ => Ok(()),
        }
    }
}

/// Millimeter summary of the segmented silhouette.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SilhouetteSummary {
    pub rings: usize,
    pub holes: usize,
    pub filled_holes: usize,
    /// Outer area minus hole areas.
    pub area_mm2: f64,
    pub outer_area_mm2: f64,
    /// Bounds in sheet millimeters.
    pub bounds_mm: Option<Bounds>,
}

impl SilhouetteSummary {
    fn new(s: &Silhouette, report: &ScaleReport) -> Self {
        let scale = report.scale;
        let d = scale.px_per_mm();
        Self {
            rings: s.ring_count(),
            holes: s.holes().len(),
            filled_holes: s.filled_holes(),
            area_mm2: scale.area_px_to_mm2(s.area_px()),
            outer_area_mm2: scale.area_px_to_mm2(s.outer_area_px()),
            bounds_mm: s.bounds().map(|b| Bounds {
                min_x: b.min_x / d,
                min_y: b.min_y / d,
                max_x: b.max_x / d,
                max_y: b.max_y / d,
            }),
        }
    }
}

/// Everything one successful run produced. Nothing is written to disk.
#[derive(Clone, Debug)]
pub struct ScanOutput {
    pub request_id: String,
    pub load: LoadInfo,
    /// Size of the photo the detector saw.
    pub image_size: (usize, usize),
    pub markers: MarkerSet,
    pub scale: ScaleReport,
    pub silhouette: SilhouetteSummary,
    pub segment: SegmentStats,
    pub geometry: VectorGeometry,
    pub svg: String,
    pub dxf: String,
}

impl ScanOutput {
    /// Number of closed rings over all paths.
    pub fn contours_count(&self) -> usize {
        self.geometry.ring_count()
    }

    pub fn px_per_mm(&self) -> f64 {
        self.scale.scale.px_per_mm()
    }

    pub fn document(&self, format: VectorFormat) -> &str {
        match format {
            VectorFormat::Svg => &self.svg,
            VectorFormat::Dxf => &self.dxf,
        }
    }

    pub fn report(&self) -> ScanReport<'_> {
        ScanReport {
            request_id: &self.request_id,
            scale: self.px_per_mm(),
            contours_count: self.contours_count(),
            width_mm: self.geometry.width(),
            height_mm: self.geometry.height(),
            area_mm2: self.geometry.area(),
            load: &self.load,
            image_size: self.image_size,
            markers: &self.markers,
            scale_check: &self.scale,
            silhouette: &self.silhouette,
            segment: &self.segment,
        }
    }
}

/// JSON report of a run.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub request_id: &'a str,
    pub scale: f64,
    pub contours_count: usize,
    pub width_mm: f64,
    pub height_mm: f64,
    pub area_mm2: f64,
    pub load: &'a LoadInfo,
    pub image_size: (usize, usize),
    pub markers: &'a MarkerSet,
    pub scale_check: &'a ScaleReport,
    pub silhouette: &'a SilhouetteSummary,
    pub segment: &'a SegmentStats,
}

/// The configured photo-to-vector pipeline.
#[derive(Clone, Debug)]
pub struct ScanPipeline {
    config: ScanConfig,
    detector: FiducialDetector,
    segmenter: ObjectSegmenter,
    vectorizer: Vectorizer,
}

impl ScanPipeline {
    pub fn new(config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = FiducialDetector::new(config.fiducial.clone(), config.sheet.clone())
            .map_err(|e| ConfigError::invalid("fiducial", e))?;
        let segmenter = ObjectSegmenter::new(config.segment.clone(), config.sheet.clone())
            .map_err(|e| ConfigError::invalid("segment", e))?;
        let vectorizer = Vectorizer::new(config.vectorize.clone())
            .map_err(|e| ConfigError::invalid("vectorize", e))?;
        Ok(Self {
            config,
            detector,
            segmenter,
            vectorizer,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run every stage on an encoded JPEG or PNG upload.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, bytes, ctx),
            fields(request_id = %ctx.request_id(), bytes = bytes.len())
        )
    )]
    pub fn run(&self, bytes: &[u8], ctx: &ScanContext) -> Result<ScanOutput, ScanError> {
        ctx.check(Stage::Load)?;
        let loaded = load_image(bytes, &self.config.load)?;
        self.process(&loaded.image, loaded.info, ctx)
    }

    /// Run every stage after loading on an already decoded photo.
    pub fn run_image(&self, photo: &RgbImage, ctx: &ScanContext) -> Result<ScanOutput, ScanError> {
        let info = LoadInfo {
            format: "raw",
            original_size: (photo.width() as u32, photo.height() as u32),
            downscale: 1.0,
        };
        self.process(photo, info, ctx)
    }

    fn process(
        &self,
        photo: &RgbImage,
        load: LoadInfo,
        ctx: &ScanContext,
    ) -> Result<ScanOutput, ScanError> {
        let cfg = &self.config;
        let id = ctx.request_id();

        ctx.check(Stage::Detect)?;
        let detection = self.detector.detect(photo)?;
        log::debug!(
            "[{id}] markers found among {} candidates",
            detection.candidates.len()
        );

        ctx.check(Stage::Rectify)?;
        let map = sheet_to_photo(&detection.markers, &cfg.sheet, &cfg.rectify.tolerance)?;
        let rectified = rectify(photo, &map, &cfg.sheet, cfg.rectify.px_per_mm);

        ctx.check(Stage::Scale)?;
        let scale = resolve_scale(
            &detection.markers,
            &map,
            &cfg.sheet,
            rectified.px_per_mm,
            &cfg.scale,
        )?;

        ctx.check(Stage::Segment)?;
        let segmentation =
            self.segmenter
                .segment(&rectified.canvas, &rectified.coverage, scale.scale)?;
        drop(rectified);

        ctx.check(Stage::Vectorize)?;
        let geometry = self
            .vectorizer
            .vectorize(&segmentation.silhouette, scale.scale)?;

        ctx.check(Stage::Export)?;
        let svg = SvgWriter.write_to_string(&geometry)?;
        let dxf = DxfWriter.write_to_string(&geometry)?;

        let silhouette = SilhouetteSummary::new(&segmentation.silhouette, &scale);
        log::info!(
            "[{id}] {:.1} x {:.1} mm, {:.1} mm², {} rings at {} px/mm in {:.2?}",
            geometry.width(),
            geometry.height(),
            geometry.area(),
            geometry.ring_count(),
            scale.scale.px_per_mm(),
            ctx.elapsed()
        );

        Ok(ScanOutput {
            request_id: id.to_string(),
            load,
            image_size: (photo.width(), photo.height()),
            markers: detection.markers,
            scale,
            silhouette,
            segment: segmentation.stats,
            geometry,
            svg,
            dxf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn pipeline_is_shareable() {
        assert_send_sync::<ScanPipeline>();
        assert_send_sync::<ScanOutput>();
        assert_send_sync::<ScanError>();
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut cfg = ScanConfig::default();
        cfg.segment.min_object_area_mm2 = -5.0;
        assert!(ScanPipeline::new(cfg).is_err());
    }

    #[test]
    fn expired_deadline_stops_before_the_first_stage() {
        let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
        let ctx = ScanContext::new("late").with_deadline(Instant::now());
        let err = pipeline.run(b"not even decoded", &ctx).unwrap_err();
        assert!(matches!(err, ScanError::Timeout { stage: Stage::Load, .. }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn context_without_deadline_never_expires() {
        let ctx = ScanContext::new("r1");
        assert!(ctx.check(Stage::Export).is_ok());
        assert_eq!(ctx.request_id(), "r1");
        let ctx = ctx.with_timeout(Duration::from_secs(3600));
        assert!(ctx.check(Stage::Segment).is_ok());
    }

    #[test]
    fn undecodable_upload_is_invalid_image() {
        let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
        let err = pipeline
            .run(b"plain text", &ScanContext::new("bad"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidImage);
    }
}
