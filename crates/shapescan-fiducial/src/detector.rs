//! End-to-end reference-sheet detection.

use shapescan_core::{GrayImageView, RgbImage, SheetLayout};

use crate::candidates::find_quads;
use crate::decode::{MarkerCandidate, MarkerDecoder};
use crate::dictionary::{Dictionary, SHEET_4X4_V1};
use crate::error::FiducialError;
use crate::matcher::Matcher;
use crate::params::FiducialParams;
use crate::select::{select_markers, MarkerSet};
use crate::threshold::{adaptive_dark_masks, window_sizes};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Result of a successful detection.
#[derive(Clone, Debug)]
pub struct FiducialDetection {
    /// The four corner markers, TL, TR, BR, BL.
    pub markers: MarkerSet,
    /// Every decoded candidate that passed the confidence filter, most
    /// confident first.
    pub candidates: Vec<MarkerCandidate>,
}

/// Finds the four corner markers of the reference sheet in a photo.
#[derive(Clone, Debug)]
pub struct FiducialDetector {
    params: FiducialParams,
    layout: SheetLayout,
    matcher: Matcher,
}

impl FiducialDetector {
    pub fn new(params: FiducialParams, layout: SheetLayout) -> Result<Self, FiducialError> {
        Self::with_dictionary(params, layout, SHEET_4X4_V1)
    }

    pub fn with_dictionary(
        params: FiducialParams,
        layout: SheetLayout,
        dict: Dictionary,
    ) -> Result<Self, FiducialError> {
        params.validate()?;
        layout.validate()?;
        for id in layout.marker_ids {
            if dict.code(id).is_none() {
                return Err(FiducialError::InvalidParams(format!(
                    "layout marker id {id} is not in dictionary {}",
                    dict.name
                )));
            }
        }
        if params.max_hamming > dict.max_correction_bits {
            return Err(FiducialError::InvalidParams(format!(
                "max_hamming {} exceeds the {} bits dictionary {} can correct",
                params.max_hamming, dict.max_correction_bits, dict.name
            )));
        }
        let matcher = Matcher::new(dict, params.max_hamming).ok_or_else(|| {
            FiducialError::InvalidParams(format!("dictionary {} has too many bits", dict.name))
        })?;
        Ok(Self {
            params,
            layout,
            matcher,
        })
    }

    #[inline]
    pub fn params(&self) -> &FiducialParams {
        &self.params
    }

    #[inline]
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn detect(&self, image: &RgbImage) -> Result<FiducialDetection, FiducialError> {
        let gray = image.to_gray();
        self.detect_gray(&gray.view())
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect_gray(
        &self,
        image: &GrayImageView<'_>,
    ) -> Result<FiducialDetection, FiducialError> {
        let candidates = self.candidates(image);
        log::debug!("{} marker candidates after filtering", candidates.len());
        let markers = select_markers(&candidates, &self.layout, &self.params)?;
        log::info!(
            "reference sheet found, marker confidences {:?}",
            markers.confidences()
        );
        Ok(FiducialDetection {
            markers,
            candidates,
        })
    }

    /// Decoded candidates above `min_confidence`, one per location, most
    /// confident first.
    pub fn candidates(&self, image: &GrayImageView<'_>) -> Vec<MarkerCandidate> {
        let p = &self.params;
        let short = image.width.min(image.height);
        let windows = window_sizes(short, &p.window_fractions, p.min_window_px, p.max_window_px);
        let masks = adaptive_dark_masks(image, &windows, p.threshold_offset);
        let quads = find_quads(&masks, p);

        let mut decoder = MarkerDecoder::new(p, &self.matcher);
        let mut found: Vec<MarkerCandidate> = quads
            .iter()
            .filter_map(|q| decoder.decode(image, q))
            .filter(|c| c.confidence >= p.min_confidence)
            .collect();
        found.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        // The same printed marker shows up once per threshold window.
        let mut kept: Vec<MarkerCandidate> = Vec::with_capacity(found.len());
        for c in found {
            let duplicate = kept.iter().any(|k| {
                let r = 0.5 * k.min_side_px.min(c.min_side_px);
                (k.center - c.center).norm() < r
            });
            if !duplicate {
                kept.push(c);
            }
        }
        kept
    }
}
