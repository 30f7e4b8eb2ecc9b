use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::polygon::{collinearity_ratio, min_pairwise_distance};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    /// Uniform scaling `p -> s * p`.
    pub fn scaling(s: f64) -> Self {
        Self::new(Matrix3::new(s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, 1.0))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// `self ∘ other`: first apply `other`, then `self`.
    pub fn compose(&self, other: &Homography) -> Homography {
        Homography::new(self.h * other.h)
    }

    /// Determinant of `H / ‖H‖_F`; scale-free measure of singularity.
    pub fn normalized_determinant(&self) -> f64 {
        let norm = self.h.norm();
        if norm <= 0.0 || !norm.is_finite() {
            return 0.0;
        }
        (self.h / norm).determinant()
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f64>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);

    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0], v[1])
    });
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Outcome of a 4-point solve together with the conditioning of the
/// normalized linear system (ratio of extreme singular values).
#[derive(Clone, Copy, Debug)]
pub struct FourPointSolution {
    pub homography: Homography,
    pub condition: f64,
}

/// Compute H such that `dst ~ H * src`, using exactly 4 correspondences.
///
/// Corner order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    solve_4pt(src, dst).map(|s| s.homography)
}

/// Hartley-normalized direct solve of the 8×8 system (h33 fixed to 1).
pub fn solve_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<FourPointSolution> {
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let sv = a.singular_values();
    let smax = sv.max();
    let smin = sv.min();
    let condition = if smin > 0.0 { smax / smin } else { f64::INFINITY };

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let t_dst_inv = t_dst.try_inverse()?;
    let h_den = normalize_homography(t_dst_inv * hn * t_src)?;
    let homography = Homography::new(h_den);
    if !homography.is_finite() {
        return None;
    }

    Some(FourPointSolution {
        homography,
        condition,
    })
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("points {a} and {b} are only {distance:.2}px apart")]
    CoincidentPoints { a: usize, b: usize, distance: f64 },
    #[error("three points are collinear (area ratio {ratio:.2e})")]
    Collinear { ratio: f64 },
    #[error("no projective solution for the given correspondences")]
    NoSolution,
    #[error("transform is near-singular (normalized determinant {det:.3e})")]
    NearSingular { det: f64 },
    #[error("transform is not invertible")]
    NotInvertible,
    #[error("reprojection residual {residual:.3}px exceeds {limit:.3}px")]
    Residual { residual: f64, limit: f64 },
}

/// Numeric acceptance limits for a 4-point projective map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomographyTolerance {
    /// Minimum pairwise distance of the measured points.
    pub min_separation: f64,
    /// Minimum triangle area as a fraction of the squared longest side.
    pub collinearity_tol: f64,
    pub min_normalized_det: f64,
    /// Maximum reprojection error, in measured units.
    pub max_residual: f64,
}

impl Default for HomographyTolerance {
    fn default() -> Self {
        Self {
            min_separation: 8.0,
            collinearity_tol: 1e-3,
            min_normalized_det: 1e-14,
            max_residual: 0.5,
        }
    }
}

/// A validated homography stored together with its inverse.
///
/// `forward` maps the `src` plane of the solve onto the `dst` plane
/// (sheet millimeters onto photo pixels in the pipeline); `inverse` goes back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectiveMap {
    forward: Homography,
    inverse: Homography,
    condition: f64,
}

impl ProjectiveMap {
    /// Solve `dst ~ H * src` and validate it.
    ///
    /// `dst` is the measured side: the separation check and the reprojection
    /// residual are both expressed in `dst` units.
    pub fn from_correspondences(
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
        tol: &HomographyTolerance,
    ) -> Result<Self, HomographyError> {
        check_point_spread(dst, tol)?;
        check_point_spread(src, &HomographyTolerance {
            min_separation: 0.0,
            ..*tol
        })?;

        let sol = solve_4pt(src, dst).ok_or(HomographyError::NoSolution)?;
        let forward = sol.homography;

        let det = forward.normalized_determinant();
        if det.is_nan() || det.abs() < tol.min_normalized_det {
            return Err(HomographyError::NearSingular { det });
        }
        let inverse = forward
            .inverse()
            .filter(Homography::is_finite)
            .ok_or(HomographyError::NotInvertible)?;

        let residual = src
            .iter()
            .zip(dst)
            .map(|(s, d)| (forward.apply(*s) - d).norm())
            .fold(0.0_f64, f64::max);
        if residual.is_nan() || residual > tol.max_residual {
            return Err(HomographyError::Residual {
                residual,
                limit: tol.max_residual,
            });
        }

        Ok(Self {
            forward,
            inverse,
            condition: sol.condition,
        })
    }

    #[inline]
    pub fn forward(&self) -> &Homography {
        &self.forward
    }

    #[inline]
    pub fn inverse(&self) -> &Homography {
        &self.inverse
    }

    /// Conditioning of the normalized solve; lower is better.
    #[inline]
    pub fn condition(&self) -> f64 {
        self.condition
    }
}

fn check_point_spread(
    pts: &[Point2<f64>; 4],
    tol: &HomographyTolerance,
) -> Result<(), HomographyError> {
    let (a, b, distance) = min_pairwise_distance(pts);
    if distance < tol.min_separation || distance <= 0.0 {
        return Err(HomographyError::CoincidentPoints { a, b, distance });
    }
    let ratio = collinearity_ratio(pts);
    if ratio < tol.collinearity_tol {
        return Err(HomographyError::Collinear { ratio });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!(
            (a - b).norm() < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            8.0, 0.5, 1200.0, //
            -0.2, 11.0, 800.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    fn sheet_quad() -> [Point2<f64>; 4] {
        [
            Point2::new(35.0, 35.0),
            Point2::new(175.0, 35.0),
            Point2::new(175.0, 262.0),
            Point2::new(35.0, 262.0),
        ]
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = ground_truth();
        let inv = h.inverse().expect("invertible");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-9);
        }
    }

    #[test]
    fn four_point_solve_recovers_h() {
        let gt = ground_truth();
        let rect = sheet_quad();
        let dst = rect.map(|p| gt.apply(p));
        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), gt.apply(p), 1e-6);
        }
    }

    #[test]
    fn compose_and_scaling_agree_with_sequential_apply() {
        let gt = ground_truth();
        let h = gt.compose(&Homography::scaling(0.1));
        let p = Point2::new(123.0, 456.0);
        assert_close(h.apply(p), gt.apply(Point2::new(12.3, 45.6)), 1e-9);
    }

    #[test]
    fn normalized_determinant_is_scale_free() {
        let h = ground_truth();
        let scaled = Homography::new(h.h * 1000.0);
        assert_relative_eq!(
            h.normalized_determinant(),
            scaled.normalized_determinant(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn projective_map_accepts_well_posed_quad() {
        let gt = ground_truth();
        let src = sheet_quad();
        let dst = src.map(|p| gt.apply(p));
        let map = ProjectiveMap::from_correspondences(&src, &dst, &HomographyTolerance::default())
            .expect("valid");
        let back = map.inverse().apply(dst[2]);
        assert_close(back, src[2], 1e-6);
        assert!(map.condition().is_finite());
    }

    #[test]
    fn coincident_points_are_rejected() {
        let src = sheet_quad();
        let dst = [
            Point2::new(100.0, 100.0),
            Point2::new(103.0, 101.0),
            Point2::new(900.0, 1200.0),
            Point2::new(100.0, 1200.0),
        ];
        let err = ProjectiveMap::from_correspondences(&src, &dst, &HomographyTolerance::default())
            .unwrap_err();
        assert!(matches!(err, HomographyError::CoincidentPoints { .. }));
    }

    #[test]
    fn collinear_points_are_rejected() {
        let src = sheet_quad();
        let dst = [
            Point2::new(100.0, 100.0),
            Point2::new(500.0, 100.0),
            Point2::new(900.0, 100.0),
            Point2::new(100.0, 1200.0),
        ];
        let err = ProjectiveMap::from_correspondences(&src, &dst, &HomographyTolerance::default())
            .unwrap_err();
        assert!(matches!(err, HomographyError::Collinear { .. }));
    }
}
