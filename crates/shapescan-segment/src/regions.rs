//! Region acceptance policy.
//!
//! All foreground-region decisions go through [`judge_region`]; ambiguous
//! pixels never make a region on their own.

use nalgebra::Point2;
use serde::Serialize;
use shapescan_core::{label_components, Components, Connectivity, Mask};

use crate::classify::{ClassMap, PixelClass};

/// Pixel statistics of one connected candidate region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RegionSummary {
    /// Index into the labeled components.
    pub index: usize,
    pub area_px: usize,
    pub foreground_px: usize,
    pub centroid: Point2<f64>,
}

impl RegionSummary {
    pub fn foreground_share(&self) -> f64 {
        if self.area_px == 0 {
            0.0
        } else {
            self.foreground_px as f64 / self.area_px as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionVerdict {
    Accepted,
    /// Only ambiguous pixels.
    NoForeground,
    LowForegroundShare,
    TooSmall,
}

pub fn judge_region(
    region: &RegionSummary,
    min_area_px: f64,
    min_foreground_share: f64,
) -> RegionVerdict {
    if region.foreground_px == 0 {
        RegionVerdict::NoForeground
    } else if region.foreground_share() < min_foreground_share {
        RegionVerdict::LowForegroundShare
    } else if (region.area_px as f64) < min_area_px {
        RegionVerdict::TooSmall
    } else {
        RegionVerdict::Accepted
    }
}

/// 4-connected regions of `mask` with their foreground counts from `classes`.
pub fn summarize_regions(mask: &Mask, classes: &ClassMap) -> (Components, Vec<RegionSummary>) {
    let comps = label_components(mask, Connectivity::Four);
    let mut fg = vec![0usize; comps.stats.len()];
    for (label, class) in comps.labels.iter().zip(&classes.classes) {
        if *label != 0 && *class == PixelClass::Foreground {
            fg[*label as usize - 1] += 1;
        }
    }
    let summaries = comps
        .stats
        .iter()
        .enumerate()
        .map(|(index, s)| RegionSummary {
            index,
            area_px: s.area,
            foreground_px: fg[index],
            centroid: s.centroid(),
        })
        .collect();
    (comps, summaries)
}

/// Largest accepted region; equal areas go to the centroid nearest `center`.
pub fn select_region<'a>(
    accepted: impl IntoIterator<Item = &'a RegionSummary>,
    center: Point2<f64>,
) -> Option<&'a RegionSummary> {
    accepted.into_iter().min_by(|a, b| {
        b.area_px.cmp(&a.area_px).then_with(|| {
            let da = (a.centroid - center).norm_squared();
            let db = (b.centroid - center).norm_squared();
            da.total_cmp(&db)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(index: usize, area_px: usize, foreground_px: usize, x: f64) -> RegionSummary {
        RegionSummary {
            index,
            area_px,
            foreground_px,
            centroid: Point2::new(x, 50.0),
        }
    }

    #[test]
    fn policy_outcomes() {
        assert_eq!(judge_region(&region(0, 500, 0, 0.0), 100.0, 0.5), RegionVerdict::NoForeground);
        assert_eq!(
            judge_region(&region(0, 500, 100, 0.0), 100.0, 0.5),
            RegionVerdict::LowForegroundShare
        );
        assert_eq!(judge_region(&region(0, 50, 50, 0.0), 100.0, 0.5), RegionVerdict::TooSmall);
        assert_eq!(judge_region(&region(0, 500, 400, 0.0), 100.0, 0.5), RegionVerdict::Accepted);
    }

    #[test]
    fn ties_go_to_the_center() {
        let regions = [region(0, 300, 300, 10.0), region(1, 300, 300, 48.0), region(2, 200, 200, 50.0)];
        let best = select_region(&regions, Point2::new(50.0, 50.0)).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn summaries_count_foreground() {
        let mask = Mask::from_fn(6, 1, |x, _| x != 3);
        let classes = ClassMap {
            width: 6,
            height: 1,
            classes: vec![
                PixelClass::Foreground,
                PixelClass::Ambiguous,
                PixelClass::Foreground,
                PixelClass::Background,
                PixelClass::Ambiguous,
                PixelClass::Ambiguous,
            ],
        };
        let (_, s) = summarize_regions(&mask, &classes);
        assert_eq!(s.len(), 2);
        assert_eq!((s[0].area_px, s[0].foreground_px), (3, 2));
        assert_eq!((s[1].area_px, s[1].foreground_px), (2, 0));
    }
}
