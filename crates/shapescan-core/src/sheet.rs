//! Printed reference sheet layout.
//!
//! Sheet coordinates are millimeters with the origin at the sheet's top-left
//! corner, x to the right and y down the page. Markers are printed upright:
//! their own x axis is parallel to the sheet's.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Cells along one side of a marker: a one-cell border around the data bits.
pub const MARKER_CELLS: usize = 6;
/// Data bits along one side of a marker.
pub const MARKER_BITS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetCorner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl SheetCorner {
    /// Clockwise order on the page, starting at the top-left.
    pub const ALL: [SheetCorner; 4] = [
        SheetCorner::TopLeft,
        SheetCorner::TopRight,
        SheetCorner::BottomRight,
        SheetCorner::BottomLeft,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SheetLayoutError {
    #[error("sheet and marker dimensions must be positive and finite")]
    NonPositive,
    #[error("{0:?} marker lies outside the sheet")]
    MarkerOutside(SheetCorner),
    #[error("markers overlap")]
    MarkersOverlap,
    #[error("marker id {0} is used more than once")]
    DuplicateId(u32),
}

/// Geometry of the printed reference sheet. Any change to the printed
/// layout must come with a new `version` string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub version: String,
    pub width_mm: f64,
    pub height_mm: f64,
    /// Side of a marker square, border cells included.
    pub marker_size_mm: f64,
    /// Distance from a marker's outer edges to the adjacent sheet edges.
    pub marker_margin_mm: f64,
    /// Marker ids in [`SheetCorner::ALL`] order.
    pub marker_ids: [u32; 4],
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::a4_v1()
    }
}

impl SheetLayout {
    /// A4 portrait, 30 mm markers 20 mm from the edges; ids TL=0, TR=1,
    /// BL=2, BR=3.
    pub fn a4_v1() -> Self {
        Self {
            version: "a4-v1".to_string(),
            width_mm: 210.0,
            height_mm: 297.0,
            marker_size_mm: 30.0,
            marker_margin_mm: 20.0,
            marker_ids: [0, 1, 3, 2],
        }
    }

    pub fn marker_id(&self, corner: SheetCorner) -> u32 {
        self.marker_ids[corner.index()]
    }

    pub fn corner_for_id(&self, id: u32) -> Option<SheetCorner> {
        SheetCorner::ALL
            .into_iter()
            .find(|c| self.marker_ids[c.index()] == id)
    }

    /// Top-left corner of the marker square.
    pub fn marker_origin(&self, corner: SheetCorner) -> Point2<f64> {
        let near = self.marker_margin_mm;
        let far_x = self.width_mm - self.marker_margin_mm - self.marker_size_mm;
        let far_y = self.height_mm - self.marker_margin_mm - self.marker_size_mm;
        match corner {
            SheetCorner::TopLeft => Point2::new(near, near),
            SheetCorner::TopRight => Point2::new(far_x, near),
            SheetCorner::BottomRight => Point2::new(far_x, far_y),
            SheetCorner::BottomLeft => Point2::new(near, far_y),
        }
    }

    pub fn marker_center(&self, corner: SheetCorner) -> Point2<f64> {
        let o = self.marker_origin(corner);
        let h = 0.5 * self.marker_size_mm;
        Point2::new(o.x + h, o.y + h)
    }

    /// Marker centers in [`SheetCorner::ALL`] order; the known physical
    /// points of the rectifying homography.
    pub fn marker_centers(&self) -> [Point2<f64>; 4] {
        SheetCorner::ALL.map(|c| self.marker_center(c))
    }

    /// Marker square grown by `padding` on every side, as
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn marker_rect(&self, corner: SheetCorner, padding: f64) -> (f64, f64, f64, f64) {
        let o = self.marker_origin(corner);
        (
            o.x - padding,
            o.y - padding,
            o.x + self.marker_size_mm + padding,
            o.y + self.marker_size_mm + padding,
        )
    }

    pub fn cell_size_mm(&self) -> f64 {
        self.marker_size_mm / MARKER_CELLS as f64
    }

    pub fn validate(&self) -> Result<(), SheetLayoutError> {
        let dims = [self.width_mm, self.height_mm, self.marker_size_mm];
        if dims.iter().any(|v| !v.is_finite() || *v <= 0.0)
            || !self.marker_margin_mm.is_finite()
            || self.marker_margin_mm < 0.0
        {
            return Err(SheetLayoutError::NonPositive);
        }
        for c in SheetCorner::ALL {
            let (x0, y0, x1, y1) = self.marker_rect(c, 0.0);
            if x0 < 0.0 || y0 < 0.0 || x1 > self.width_mm || y1 > self.height_mm {
                return Err(SheetLayoutError::MarkerOutside(c));
            }
        }
        let span = self.marker_size_mm + 2.0 * self.marker_margin_mm;
        if span >= self.width_mm || span >= self.height_mm {
            return Err(SheetLayoutError::MarkersOverlap);
        }
        for (i, id) in self.marker_ids.iter().enumerate() {
            if self.marker_ids[..i].contains(id) {
                return Err(SheetLayoutError::DuplicateId(*id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_marker_centers() {
        let s = SheetLayout::a4_v1();
        s.validate().unwrap();
        let c = s.marker_centers();
        assert_eq!(c[0], Point2::new(35.0, 35.0));
        assert_eq!(c[1], Point2::new(175.0, 35.0));
        assert_eq!(c[2], Point2::new(175.0, 262.0));
        assert_eq!(c[3], Point2::new(35.0, 262.0));
    }

    #[test]
    fn ids_follow_the_printed_sheet() {
        let s = SheetLayout::a4_v1();
        assert_eq!(s.marker_id(SheetCorner::TopLeft), 0);
        assert_eq!(s.marker_id(SheetCorner::TopRight), 1);
        assert_eq!(s.marker_id(SheetCorner::BottomLeft), 2);
        assert_eq!(s.marker_id(SheetCorner::BottomRight), 3);
        assert_eq!(s.corner_for_id(3), Some(SheetCorner::BottomRight));
        assert_eq!(s.corner_for_id(7), None);
    }

    #[test]
    fn validate_rejects_bad_layouts() {
        let mut s = SheetLayout::a4_v1();
        s.marker_size_mm = 200.0;
        assert!(s.validate().is_err());

        let mut s = SheetLayout::a4_v1();
        s.marker_ids = [0, 1, 1, 2];
        assert_eq!(s.validate(), Err(SheetLayoutError::DuplicateId(1)));

        let mut s = SheetLayout::a4_v1();
        s.width_mm = -1.0;
        assert_eq!(s.validate(), Err(SheetLayoutError::NonPositive));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let s: SheetLayout = serde_json::from_str(r#"{"marker_size_mm": 25.0}"#).unwrap();
        assert_eq!(s.marker_size_mm, 25.0);
        assert_eq!(s.width_mm, 210.0);
        assert_eq!(s.version, "a4-v1");
    }
}
