//! Parametric boundary segments and open constraint curves.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::geom2::{project_on_segment, Bbox2};

/// Samples used to measure cubic arc length.
const LENGTH_STEPS: usize = 64;
/// Coarse samples before refining a cubic projection.
const PROJECT_STEPS: usize = 16;

/// Closest point on a segment or curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurvePoint {
    pub point: Vector2<f64>,
    /// Parameter on the segment, in `[0, 1]`.
    pub alpha: f64,
    pub dist: f64,
}

/// One boundary piece, parametrized on `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Line {
        a: Vector2<f64>,
        b: Vector2<f64>,
    },
    Cubic {
        p0: Vector2<f64>,
        p1: Vector2<f64>,
        p2: Vector2<f64>,
        p3: Vector2<f64>,
    },
}

impl Segment {
    #[inline]
    pub fn line(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        Segment::Line { a, b }
    }

    #[inline]
    pub fn cubic(p0: Vector2<f64>, p1: Vector2<f64>, p2: Vector2<f64>, p3: Vector2<f64>) -> Self {
        Segment::Cubic { p0, p1, p2, p3 }
    }

    #[inline]
    pub fn start(&self) -> Vector2<f64> {
        match *self {
            Segment::Line { a, .. } => a,
            Segment::Cubic { p0, .. } => p0,
        }
    }

    #[inline]
    pub fn end(&self) -> Vector2<f64> {
        match *self {
            Segment::Line { b, .. } => b,
            Segment::Cubic { p3, .. } => p3,
        }
    }

    pub fn get(&self, alpha: f64) -> Vector2<f64> {
        match *self {
            Segment::Line { a, b } => a + (b - a) * alpha,
            Segment::Cubic { p0, p1, p2, p3 } => {
                let t = alpha;
                let s = 1.0 - t;
                p0 * (s * s * s) + p1 * (3.0 * s * s * t) + p2 * (3.0 * s * t * t) + p3 * (t * t * t)
            }
        }
    }

    /// Derivative with respect to `alpha`; optionally normalized.
    ///
    /// A near-singular cubic derivative (coincident control points at an end)
    /// falls back to the chord direction.
    pub fn derivative(&self, alpha: f64, normalize: bool) -> Vector2<f64> {
        let d = match *self {
            Segment::Line { a, b } => b - a,
            Segment::Cubic { p0, p1, p2, p3 } => {
                let t = alpha;
                let s = 1.0 - t;
                let d = ((p1 - p0) * (s * s) + (p2 - p1) * (2.0 * s * t) + (p3 - p2) * (t * t)) * 3.0;
                if d.norm() < 1e-12 {
                    p3 - p0
                } else {
                    d
                }
            }
        };
        if normalize {
            let n = d.norm();
            if n < 1e-12 {
                Vector2::new(1.0, 0.0)
            } else {
                d / n
            }
        } else {
            d
        }
    }

    pub fn length(&self) -> f64 {
        match *self {
            Segment::Line { a, b } => (b - a).norm(),
            Segment::Cubic { .. } => {
                let mut len = 0.0;
                let mut prev = self.start();
                for k in 1..=LENGTH_STEPS {
                    let q = self.get(k as f64 / LENGTH_STEPS as f64);
                    len += (q - prev).norm();
                    prev = q;
                }
                len
            }
        }
    }

    /// Conservative bounding box (control polygon for cubics).
    pub fn bbox(&self) -> Bbox2 {
        match *self {
            Segment::Line { a, b } => Bbox2::from_points(&[a, b]),
            Segment::Cubic { p0, p1, p2, p3 } => Bbox2::from_points(&[p0, p1, p2, p3]),
        }
    }

    pub fn reversed(&self) -> Segment {
        match *self {
            Segment::Line { a, b } => Segment::Line { a: b, b: a },
            Segment::Cubic { p0, p1, p2, p3 } => Segment::Cubic {
                p0: p3,
                p1: p2,
                p2: p1,
                p3: p0,
            },
        }
    }

    /// Closest point to `p`.
    pub fn project(&self, p: Vector2<f64>) -> CurvePoint {
        match *self {
            Segment::Line { a, b } => {
                let pr = project_on_segment(p, a, b);
                CurvePoint {
                    point: pr.point,
                    alpha: pr.t,
                    dist: pr.dist,
                }
            }
            Segment::Cubic { .. } => {
                let dist2 = |t: f64| (self.get(t) - p).norm_squared();
                let mut best_k = 0;
                let mut best_d = f64::INFINITY;
                for k in 0..=PROJECT_STEPS {
                    let d = dist2(k as f64 / PROJECT_STEPS as f64);
                    if d < best_d {
                        best_d = d;
                        best_k = k;
                    }
                }
                // golden-section refinement around the best coarse sample
                let step = 1.0 / PROJECT_STEPS as f64;
                let mut lo = (best_k as f64 * step - step).max(0.0);
                let mut hi = (best_k as f64 * step + step).min(1.0);
                let g = 0.5 * (5f64.sqrt() - 1.0);
                let mut x1 = hi - g * (hi - lo);
                let mut x2 = lo + g * (hi - lo);
                let mut f1 = dist2(x1);
                let mut f2 = dist2(x2);
                for _ in 0..48 {
                    if f1 < f2 {
                        hi = x2;
                        x2 = x1;
                        f2 = f1;
                        x1 = hi - g * (hi - lo);
                        f1 = dist2(x1);
                    } else {
                        lo = x1;
                        x1 = x2;
                        f1 = f2;
                        x2 = lo + g * (hi - lo);
                        f2 = dist2(x2);
                    }
                }
                let alpha = 0.5 * (lo + hi);
                let point = self.get(alpha);
                CurvePoint {
                    point,
                    alpha,
                    dist: (point - p).norm(),
                }
            }
        }
    }

    /// Append a polyline approximation to `out`, starting with `start()` and
    /// excluding `end()`. `tol` bounds the control-point deviation from the chord.
    pub fn flatten_into(&self, tol: f64, out: &mut Vec<Vector2<f64>>) {
        match *self {
            Segment::Line { a, .. } => out.push(a),
            Segment::Cubic { p0, p1, p2, p3 } => {
                flatten_cubic([p0, p1, p2, p3], tol.max(1e-6), 0, out);
            }
        }
    }
}

fn flatten_cubic(c: [Vector2<f64>; 4], tol: f64, depth: usize, out: &mut Vec<Vector2<f64>>) {
    let chord = project_on_segment(c[1], c[0], c[3])
        .dist
        .max(project_on_segment(c[2], c[0], c[3]).dist);
    if chord <= tol || depth >= 16 {
        out.push(c[0]);
        return;
    }
    // de Casteljau split at 1/2
    let m01 = (c[0] + c[1]) * 0.5;
    let m12 = (c[1] + c[2]) * 0.5;
    let m23 = (c[2] + c[3]) * 0.5;
    let m012 = (m01 + m12) * 0.5;
    let m123 = (m12 + m23) * 0.5;
    let mid = (m012 + m123) * 0.5;
    flatten_cubic([c[0], m01, m012, mid], tol, depth + 1, out);
    flatten_cubic([mid, m123, m23, c[3]], tol, depth + 1, out);
}

/// Open curve used as a constraint target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub segments: Vec<Segment>,
}

impl Curve {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Straight curve from `a` to `b`.
    pub fn line(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        Self {
            segments: vec![Segment::line(a, b)],
        }
    }

    /// Polyline through `pts` (at least two points).
    pub fn polyline(pts: &[Vector2<f64>]) -> Self {
        Self {
            segments: pts.windows(2).map(|w| Segment::line(w[0], w[1])).collect(),
        }
    }

    pub fn bbox(&self) -> Bbox2 {
        self.segments
            .iter()
            .fold(Bbox2::empty(), |acc, s| acc.union(&s.bbox()))
    }

    /// Closest point over all segments, with the segment index.
    pub fn project(&self, p: Vector2<f64>) -> Option<(usize, CurvePoint)> {
        let mut best: Option<(usize, CurvePoint)> = None;
        for (i, s) in self.segments.iter().enumerate() {
            if let Some((_, b)) = &best {
                if !s.bbox().expanded(b.dist).contains(p) {
                    continue;
                }
            }
            let cp = s.project(p);
            if best.as_ref().map_or(true, |(_, b)| cp.dist < b.dist) {
                best = Some((i, cp));
            }
        }
        best
    }

    /// Open polyline approximation including the final endpoint.
    pub fn flatten(&self, tol: f64) -> Vec<Vector2<f64>> {
        let mut out = Vec::new();
        for s in &self.segments {
            s.flatten_into(tol, &mut out);
        }
        if let Some(last) = self.segments.last() {
            out.push(last.end());
        }
        out
    }
}
