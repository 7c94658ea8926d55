use nalgebra::Vector2;

/// z-component of `(b - a) × (c - a)`.
#[inline]
pub fn cross(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Signed area of a closed polygon (positive for CCW).
pub fn signed_area(poly: &[Vector2<f64>]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut a = 0.0;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        a += p.x * q.y - q.x * p.y;
    }
    0.5 * a
}

/// Closest point of segment `[a, b]` to `p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentProjection {
    pub point: Vector2<f64>,
    /// Parameter along the segment in `[0, 1]`.
    pub t: f64,
    pub dist: f64,
}

pub fn project_on_segment(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> SegmentProjection {
    let ab = b - a;
    let len2 = ab.norm_squared();
    let t = if len2 <= 0.0 {
        0.0
    } else {
        ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
    };
    let point = a + ab * t;
    SegmentProjection {
        point,
        t,
        dist: (p - point).norm(),
    }
}

/// Intersection of the infinite lines `(a0, a1)` and `(b0, b1)`.
///
/// Returns the point and the line parameters `(s, t)` with
/// `point = a0 + s (a1 - a0) = b0 + t (b1 - b0)`, or `None` when the lines are
/// (near-)parallel.
pub fn line_intersection(
    a0: Vector2<f64>,
    a1: Vector2<f64>,
    b0: Vector2<f64>,
    b1: Vector2<f64>,
    eps_det: f64,
) -> Option<(Vector2<f64>, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let det = da.x * db.y - da.y * db.x;
    let scale = da.norm() * db.norm();
    if !det.is_finite() || det.abs() <= eps_det * scale.max(1.0) {
        return None;
    }
    let w = b0 - a0;
    let s = (w.x * db.y - w.y * db.x) / det;
    let t = (w.x * da.y - w.y * da.x) / det;
    Some((a0 + da * s, s, t))
}

/// Proper intersection of two closed segments (parameters within `[0, 1]`).
pub fn segment_intersection(
    a0: Vector2<f64>,
    a1: Vector2<f64>,
    b0: Vector2<f64>,
    b1: Vector2<f64>,
    eps_det: f64,
) -> Option<(Vector2<f64>, f64, f64)> {
    let (p, s, t) = line_intersection(a0, a1, b0, b1, eps_det)?;
    if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
        Some((p, s, t))
    } else {
        None
    }
}

/// Unclipped barycentric coordinates of `p` in triangle `(a, b, c)`.
///
/// `None` for degenerate triangles.
pub fn barycentric(
    p: Vector2<f64>,
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
) -> Option<[f64; 3]> {
    let area = cross(a, b, c);
    if !area.is_finite() || area.abs() < 1e-14 {
        return None;
    }
    let wa = cross(p, b, c) / area;
    let wb = cross(a, p, c) / area;
    Some([wa, wb, 1.0 - wa - wb])
}

/// Triangle membership using unclipped barycentrics with tolerance `eps`.
pub fn in_triangle(
    p: Vector2<f64>,
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
    eps: f64,
) -> bool {
    barycentric(p, a, b, c).is_some_and(|w| w.iter().all(|&wi| wi >= -eps))
}

/// Polygon containment by crossing parity (boundary points are unspecified).
pub fn poly_contains(poly: &[Vector2<f64>], p: Vector2<f64>) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = poly[i];
        let pj = poly[j];
        if (pi.y > p.y) != (pj.y > p.y) {
            let x = pj.x + (p.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to a closed polyline, with the index of the closest edge.
pub fn distance_to_polyline(poly: &[Vector2<f64>], p: Vector2<f64>) -> Option<(f64, usize)> {
    let n = poly.len();
    if n < 2 {
        return None;
    }
    let mut best: Option<(f64, usize)> = None;
    for i in 0..n {
        let proj = project_on_segment(p, poly[i], poly[(i + 1) % n]);
        if best.map_or(true, |(d, _)| proj.dist < d) {
            best = Some((proj.dist, i));
        }
    }
    best
}

/// Result of intersecting two circles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CircleIntersection {
    /// Two intersection points; both equal the chord midpoint when tangent.
    Two(Vector2<f64>, Vector2<f64>),
    /// Circles do not meet; a fallback point on the center line, placed
    /// proportionally to the radii.
    Apart(Vector2<f64>),
}

/// Intersection of circles `(c0, r0)` and `(c1, r1)`.
///
/// Used by geodesic window propagation: it never fails, falling back to a
/// midpoint on the center line when separations exceed the radii sum or one
/// circle contains the other. Concentric circles fall back to `c0`.
pub fn circle_inter_circle(
    c0: Vector2<f64>,
    r0: f64,
    c1: Vector2<f64>,
    r1: f64,
) -> CircleIntersection {
    let d_vec = c1 - c0;
    let d = d_vec.norm();
    if d < 1e-12 {
        return CircleIntersection::Apart(c0);
    }
    let u = d_vec / d;
    if d > r0 + r1 || d < (r0 - r1).abs() {
        let total = (r0 + r1).max(1e-12);
        let along = if d > r0 + r1 {
            // gap between the circles: split it proportionally
            r0 + (d - r0 - r1) * r0 / total
        } else {
            d * r0 / total
        };
        return CircleIntersection::Apart(c0 + u * along);
    }
    let a = (r0 * r0 - r1 * r1 + d * d) / (2.0 * d);
    let h2 = r0 * r0 - a * a;
    let mid = c0 + u * a;
    if h2 <= 0.0 {
        return CircleIntersection::Two(mid, mid);
    }
    let h = h2.sqrt();
    let perp = Vector2::new(-u.y, u.x);
    CircleIntersection::Two(mid + perp * h, mid - perp * h)
}
