use std::fmt;

use shapescan_core::SheetLayoutError;

/// Why no object silhouette was produced.
#[derive(Clone, Debug, PartialEq)]
pub enum NoObjectReason {
    /// Too few clean background patches on the sheet margins.
    BackgroundUnsampled { usable: usize, required: usize },
    /// No region passed the region policy.
    NoRegion { candidates: usize },
    /// The selected outline encloses less than the minimum object area.
    TooSmall { area_mm2: f64, min_mm2: f64 },
}

impl fmt::Display for NoObjectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackgroundUnsampled { usable, required } => write!(
                f,
                "sheet background could not be sampled ({usable} of {required} patches usable)"
            ),
            Self::NoRegion { candidates } => write!(
                f,
                "no foreground region large enough ({candidates} candidate regions rejected)"
            ),
            Self::TooSmall { area_mm2, min_mm2 } => write!(
                f,
                "object outline encloses {area_mm2:.1} mm², below the {min_mm2:.1} mm² minimum"
            ),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    #[error("invalid segmentation parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Layout(#[from] SheetLayoutError),
    #[error("canvas {canvas:?} and coverage {coverage:?} sizes differ")]
    SizeMismatch {
        canvas: (usize, usize),
        coverage: (usize, usize),
    },
    #[error("no object detected: {0}")]
    NoObjectDetected(NoObjectReason),
}
