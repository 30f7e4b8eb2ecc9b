use shapescan_core::{HomographyError, SheetLayoutError};

/// Errors returned by the fiducial detector.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FiducialError {
    #[error("invalid fiducial parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Layout(#[from] SheetLayoutError),
    #[error("reference sheet not found: {found} of 4 corner markers detected")]
    MarkerDetectionFailed { found: usize },
    #[error("detected markers are numerically unusable: {0}")]
    Degenerate(#[from] HomographyError),
}
