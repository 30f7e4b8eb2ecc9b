use std::fmt;
use std::time::Duration;

use serde::Serialize;
use shapescan_core::{HomographyError, ScaleError};
use shapescan_fiducial::FiducialError;
use shapescan_segment::{NoObjectReason, SegmentError};
use shapescan_vector::{ExportError, VectorizeError};

use crate::pipeline::Stage;

/// Stable, serializable classification of a [`ScanError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidImage,
    MarkerDetectionFailed,
    DegenerateHomography,
    NoObjectDetected,
    ExportFailure,
    ImplausibleScale,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidImage => "invalid_image",
            Self::MarkerDetectionFailed => "marker_detection_failed",
            Self::DegenerateHomography => "degenerate_homography",
            Self::NoObjectDetected => "no_object_detected",
            Self::ExportFailure => "export_failure",
            Self::ImplausibleScale => "implausible_scale",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Whether a new photo can fix the failure (lighting, framing, missing
    /// sheet or object), as opposed to a fault on the processing side.
    pub fn is_user_correctable(self) -> bool {
        matches!(
            self,
            Self::InvalidImage
                | Self::MarkerDetectionFailed
                | Self::DegenerateHomography
                | Self::NoObjectDetected
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal failure of one scan request.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("reference sheet not found: {found} of 4 corner markers detected")]
    MarkerDetectionFailed { found: usize },
    #[error("detected markers are numerically unusable: {0}")]
    DegenerateHomography(HomographyError),
    #[error("no object detected: {0}")]
    NoObjectDetected(NoObjectReason),
    #[error("export failed: {0}")]
    ExportFailure(#[from] ExportError),
    #[error("implausible scale: {0}")]
    ImplausibleScale(String),
    #[error("timed out before {stage} after {elapsed:?}")]
    Timeout { stage: Stage, elapsed: Duration },
    #[error("internal error in {stage}: {message}")]
    Internal { stage: Stage, message: String },
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidImage(_) => ErrorKind::InvalidImage,
            Self::MarkerDetectionFailed { .. } => ErrorKind::MarkerDetectionFailed,
            Self::DegenerateHomography(_) => ErrorKind::DegenerateHomography,
            Self::NoObjectDetected(_) => ErrorKind::NoObjectDetected,
            Self::ExportFailure(_) => ErrorKind::ExportFailure,
            Self::ImplausibleScale(_) => ErrorKind::ImplausibleScale,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn internal(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Internal {
            stage,
            message: err.to_string(),
        }
    }
}

impl From<FiducialError> for ScanError {
    fn from(e: FiducialError) -> Self {
        match e {
            FiducialError::MarkerDetectionFailed { found } => Self::MarkerDetectionFailed { found },
            FiducialError::Degenerate(h) => Self::DegenerateHomography(h),
            other => Self::internal(Stage::Detect, other),
        }
    }
}

impl From<HomographyError> for ScanError {
    fn from(e: HomographyError) -> Self {
        Self::DegenerateHomography(e)
    }
}

impl From<ScaleError> for ScanError {
    fn from(e: ScaleError) -> Self {
        Self::ImplausibleScale(e.to_string())
    }
}

impl From<SegmentError> for ScanError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::NoObjectDetected(reason) => Self::NoObjectDetected(reason),
            other => Self::internal(Stage::Segment, other),
        }
    }
}

impl From<VectorizeError> for ScanError {
    fn from(e: VectorizeError) -> Self {
        Self::internal(Stage::Vectorize, e)
    }
}

/// Invalid or unreadable [`ScanConfig`](crate::ScanConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid {section} configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &'static str, err: impl fmt::Display) -> Self {
        Self::Invalid {
            section,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_correctable_kinds() {
        let correctable = [
            ErrorKind::InvalidImage,
            ErrorKind::MarkerDetectionFailed,
            ErrorKind::DegenerateHomography,
            ErrorKind::NoObjectDetected,
        ];
        for k in correctable {
            assert!(k.is_user_correctable(), "{k}");
        }
        for k in [
            ErrorKind::ExportFailure,
            ErrorKind::ImplausibleScale,
            ErrorKind::Timeout,
            ErrorKind::Internal,
        ] {
            assert!(!k.is_user_correctable(), "{k}");
        }
    }

    #[test]
    fn codes_match_serde_names() {
        for k in [
            ErrorKind::InvalidImage,
            ErrorKind::MarkerDetectionFailed,
            ErrorKind::NoObjectDetected,
            ErrorKind::Timeout,
        ] {
            let json = serde_json::to_string(&k).unwrap();
            assert_eq!(json, format!("\"{}\"", k.code()));
        }
    }

    #[test]
    fn stage_errors_map_onto_the_taxonomy() {
        let e: ScanError = FiducialError::MarkerDetectionFailed { found: 3 }.into();
        assert!(matches!(e, ScanError::MarkerDetectionFailed { found: 3 }));
        assert_eq!(e.kind(), ErrorKind::MarkerDetectionFailed);

        let e: ScanError = FiducialError::Degenerate(HomographyError::NoSolution).into();
        assert_eq!(e.kind(), ErrorKind::DegenerateHomography);

        let e: ScanError = FiducialError::InvalidParams("x".into()).into();
        assert_eq!(e.kind(), ErrorKind::Internal);

        let e: ScanError =
            SegmentError::NoObjectDetected(NoObjectReason::NoRegion { candidates: 0 }).into();
        assert_eq!(e.kind(), ErrorKind::NoObjectDetected);
        assert!(e.to_string().starts_with("no object detected"));

        let e: ScanError = ExportError::NonFinite.into();
        assert_eq!(e.kind(), ErrorKind::ExportFailure);
    }
}
