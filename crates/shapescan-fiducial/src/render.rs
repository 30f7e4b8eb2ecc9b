//! Raster rendering of the reference sheet.
//!
//! Used to produce the printable sheet and synthetic test scenes; the
//! detector never renders.

use shapescan_core::{GrayImage, SheetCorner, SheetLayout, MARKER_CELLS};

use crate::dictionary::Dictionary;
use crate::error::FiducialError;

/// Cell pattern of marker `id`, indexed `[cy][cx]`, `true` = black.
///
/// The outer ring of cells is the black border; the inner cells carry the
/// code bits in row-major order.
pub fn marker_cells(dict: &Dictionary, id: u32) -> Option<[[bool; MARKER_CELLS]; MARKER_CELLS]> {
    if dict.marker_size + 2 != MARKER_CELLS {
        return None;
    }
    let code = dict.code(id)?;
    let n = dict.marker_size;
    let mut cells = [[true; MARKER_CELLS]; MARKER_CELLS];
    for (y, row) in cells.iter_mut().enumerate().skip(1).take(n) {
        for (x, cell) in row.iter_mut().enumerate().skip(1).take(n) {
            *cell = (code >> ((y - 1) * n + (x - 1))) & 1 == 1;
        }
    }
    Some(cells)
}

/// Render the whole sheet at `px_per_mm`: white paper, black marker cells.
///
/// Pixel `(x, y)` takes the color of the sheet point under its center.
pub fn render_sheet(
    layout: &SheetLayout,
    dict: &Dictionary,
    px_per_mm: f64,
) -> Result<GrayImage, FiducialError> {
    layout.validate()?;
    if !px_per_mm.is_finite() || px_per_mm <= 0.0 {
        return Err(FiducialError::InvalidParams(format!(
            "px_per_mm must be positive, got {px_per_mm}"
        )));
    }

    let patterns = SheetCorner::ALL
        .iter()
        .map(|&c| {
            marker_cells(dict, layout.marker_id(c)).ok_or_else(|| {
                FiducialError::InvalidParams(format!(
                    "marker id {} is not in dictionary {}",
                    layout.marker_id(c),
                    dict.name
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let w = (layout.width_mm * px_per_mm).round() as usize;
    let h = (layout.height_mm * px_per_mm).round() as usize;
    let cell = layout.cell_size_mm();
    let mut data = vec![255u8; w * h];

    for (corner, cells) in SheetCorner::ALL.iter().zip(&patterns) {
        let (x0, y0, x1, y1) = layout.marker_rect(*corner, 0.0);
        let px0 = (x0 * px_per_mm).floor().max(0.0) as usize;
        let py0 = (y0 * px_per_mm).floor().max(0.0) as usize;
        let px1 = ((x1 * px_per_mm).ceil() as usize).min(w);
        let py1 = ((y1 * px_per_mm).ceil() as usize).min(h);
        for py in py0..py1 {
            let my = (py as f64 + 0.5) / px_per_mm;
            if my < y0 || my >= y1 {
                continue;
            }
            let cy = (((my - y0) / cell) as usize).min(MARKER_CELLS - 1);
            for px in px0..px1 {
                let mx = (px as f64 + 0.5) / px_per_mm;
                if mx < x0 || mx >= x1 {
                    continue;
                }
                let cx = (((mx - x0) / cell) as usize).min(MARKER_CELLS - 1);
                if cells[cy][cx] {
                    data[py * w + px] = 0;
                }
            }
        }
    }

    GrayImage::from_raw(w, h, data)
        .ok_or_else(|| FiducialError::InvalidParams("sheet raster size overflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SHEET_4X4_V1;

    #[test]
    fn marker_border_is_black() {
        let cells = marker_cells(&SHEET_4X4_V1, 2).unwrap();
        for i in 0..MARKER_CELLS {
            assert!(cells[0][i] && cells[MARKER_CELLS - 1][i]);
            assert!(cells[i][0] && cells[i][MARKER_CELLS - 1]);
        }
        // 0xB40B: lowest bits are the top data row
        assert!(cells[1][1] && cells[1][2] && !cells[1][3] && cells[1][4]);
        assert!(marker_cells(&SHEET_4X4_V1, 9).is_none());
    }

    #[test]
    fn rendered_sheet_has_markers_at_layout_positions() {
        let layout = SheetLayout::a4_v1();
        let img = render_sheet(&layout, &SHEET_4X4_V1, 2.0).unwrap();
        assert_eq!((img.width(), img.height()), (420, 594));
        // paper
        assert_eq!(img.get(200, 300), 255);
        // top-left marker border at (21 mm, 21 mm)
        assert_eq!(img.get(42, 42), 0);
        // just outside the marker
        assert_eq!(img.get(38, 38), 255);
        // bottom-right marker border
        let (_, _, x1, y1) = layout.marker_rect(SheetCorner::BottomRight, 0.0);
        assert_eq!(img.get((x1 * 2.0) as usize - 2, (y1 * 2.0) as usize - 2), 0);
    }

    #[test]
    fn rejects_bad_scale() {
        let layout = SheetLayout::a4_v1();
        assert!(render_sheet(&layout, &SHEET_4X4_V1, 0.0).is_err());
        assert!(render_sheet(&layout, &SHEET_4X4_V1, f64::NAN).is_err());
    }
}
