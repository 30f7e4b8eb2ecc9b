//! Closed-ring polygon utilities.
//!
//! Rings are stored without repeating the first vertex. All signs assume page
//! coordinates (x right, y down): a ring that runs clockwise on the page has a
//! positive shoelace area.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_points<'a>(pts: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        let mut it = pts.into_iter();
        let first = it.next()?;
        let mut b = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in it {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Shoelace area; positive for rings running clockwise on the page.
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

pub fn perimeter(ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    (0..n).map(|i| (ring[(i + 1) % n] - ring[i]).norm()).sum()
}

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// True when every turn has the same sign and no turn is degenerate.
pub fn is_convex(ring: &[Point2<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0_f64;
    for i in 0..n {
        let c = cross(ring[i], ring[(i + 1) % n], ring[(i + 2) % n]);
        if c == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Smallest pairwise distance as `(i, j, distance)`.
pub fn min_pairwise_distance(pts: &[Point2<f64>]) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::INFINITY);
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            let d = (pts[j] - pts[i]).norm();
            if d < best.2 {
                best = (i, j, d);
            }
        }
    }
    best
}

/// Smallest `|triangle area| / longest side²` over all point triplets.
///
/// Near zero when three of the points are (almost) collinear.
pub fn collinearity_ratio(pts: &[Point2<f64>]) -> f64 {
    let mut worst = f64::INFINITY;
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (a, b, c) = (pts[i], pts[j], pts[k]);
                let area = 0.5 * cross(a, b, c).abs();
                let longest = (b - a)
                    .norm_squared()
                    .max((c - b).norm_squared())
                    .max((a - c).norm_squared());
                let r = if longest > 0.0 { area / longest } else { 0.0 };
                worst = worst.min(r);
            }
        }
    }
    worst
}

#[inline]
fn on_segment(p: Point2<f64>, q: Point2<f64>, r: Point2<f64>) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

/// Closed-segment intersection test (touching counts).
pub fn segments_intersect(
    p1: Point2<f64>,
    p2: Point2<f64>,
    q1: Point2<f64>,
    q2: Point2<f64>,
) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

struct Segment {
    a: Point2<f64>,
    b: Point2<f64>,
    ring: usize,
    index: usize,
    min_x: f64,
    max_x: f64,
}

/// True when any two edges of `rings` cross or touch, other than
/// consecutive edges of the same ring meeting at their shared vertex.
///
/// A consecutive pair that folds back onto itself also counts. Rings with
/// fewer than 3 vertices are reported as crossing.
pub fn has_crossings(rings: &[&[Point2<f64>]]) -> bool {
    let mut segs = Vec::new();
    for (r, ring) in rings.iter().enumerate() {
        let n = ring.len();
        if n < 3 {
            return true;
        }
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            if a == b {
                return true;
            }
            let c = ring[(i + 2) % n];
            if cross(a, b, c) == 0.0 && (b - a).dot(&(c - b)) < 0.0 {
                return true;
            }
            segs.push(Segment {
                a,
                b,
                ring: r,
                index: i,
                min_x: a.x.min(b.x),
                max_x: a.x.max(b.x),
            });
        }
    }
    segs.sort_by(|s, t| s.min_x.total_cmp(&t.min_x));

    for i in 0..segs.len() {
        let s = &segs[i];
        let (s_min_y, s_max_y) = (s.a.y.min(s.b.y), s.a.y.max(s.b.y));
        for t in &segs[i + 1..] {
            if t.min_x > s.max_x {
                break;
            }
            if t.a.y.min(t.b.y) > s_max_y || t.a.y.max(t.b.y) < s_min_y {
                continue;
            }
            if s.ring == t.ring {
                let n = rings[s.ring].len();
                let adjacent = (s.index + 1) % n == t.index || (t.index + 1) % n == s.index;
                if adjacent {
                    continue;
                }
            }
            if segments_intersect(s.a, s.b, t.a, t.b) {
                return true;
            }
        }
    }
    false
}

pub fn is_simple(ring: &[Point2<f64>]) -> bool {
    !has_crossings(&[ring])
}

/// Even-odd point-in-ring test.
pub fn point_in_ring(p: Point2<f64>, ring: &[Point2<f64>]) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn point_segment_distance(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

fn douglas_peucker_mark(pts: &[Point2<f64>], first: usize, last: usize, eps: f64, keep: &mut [bool]) {
    let mut stack = vec![(first, last)];
    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let mut worst = (s, -1.0_f64);
        for i in (s + 1)..e {
            let d = point_segment_distance(pts[i], pts[s], pts[e]);
            if d > worst.1 {
                worst = (i, d);
            }
        }
        if worst.1 > eps {
            keep[worst.0] = true;
            stack.push((s, worst.0));
            stack.push((worst.0, e));
        }
    }
}

/// Douglas-Peucker on a closed ring.
///
/// The first vertex and the vertex farthest from it are always kept, so the
/// result of a ring with at least 3 vertices has at least 2.
pub fn simplify_closed(ring: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    let n = ring.len();
    if n <= 3 {
        return ring.to_vec();
    }
    let mut far = 0;
    let mut far_d = -1.0;
    for (i, p) in ring.iter().enumerate() {
        let d = (p - ring[0]).norm_squared();
        if d > far_d {
            far = i;
            far_d = d;
        }
    }

    let mut closed = ring.to_vec();
    closed.push(ring[0]);
    let mut keep = vec![false; n + 1];
    keep[0] = true;
    keep[far] = true;
    douglas_peucker_mark(&closed, 0, far, epsilon, &mut keep);
    douglas_peucker_mark(&closed, far, n, epsilon, &mut keep);

    ring.iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}
