//! Near-boundary triangulation: bridges the regular grid to the border ring.

use nalgebra::Vector2;
use tracing::trace;

use super::delaunay;
use super::layer::MeshLayer;
use super::types::{InnerKind, SampleRef};
use crate::geom2::{cross, poly_contains, segment_intersection, GeomCfg};

/// Longest edge (grid units) of a triangle touching the border.
const MAX_BORDER_EDGE: f64 = 3.0;
/// Longest edge of an all-inner triangle (a quad diagonal).
const MAX_INNER_EDGE: f64 = std::f64::consts::SQRT_2 + 1e-9;

/// Outcome of examining one Delaunay triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangleClass {
    /// Zero (or near-zero) area.
    Degenerate,
    /// Centroid outside the border ring.
    Outside,
    /// An edge crosses the border ring.
    CrossesBorder,
    /// An edge exceeds the length cap for its kind.
    TooLong,
    /// Inner triangle inside a complete grid quad; the grid already connects it.
    RegularQuad,
    /// Kept: its vertices get connected.
    Connect,
}

/// Counters reported by `connect_near_border`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriangulationStats {
    pub triangles: usize,
    pub degenerate: usize,
    pub outside: usize,
    pub crossing: usize,
    pub too_long: usize,
    pub regular: usize,
    pub connected: usize,
}

/// Classify triangle `v` over `(sample, grid position)` vertices.
pub fn classify(
    layer: &MeshLayer,
    ring: &[Vector2<f64>],
    verts: &[(SampleRef, Vector2<f64>); 3],
    cfg: &GeomCfg,
) -> TriangleClass {
    let [(ra, a), (rb, b), (rc, c)] = *verts;
    let area = 0.5 * cross(a, b, c);
    if !area.is_finite() || area.abs() < cfg.eps_area {
        return TriangleClass::Degenerate;
    }
    let centroid = (a + b + c) / 3.0;
    if !poly_contains(ring, centroid) {
        return TriangleClass::Outside;
    }
    let borders = [ra, rb, rc].iter().filter(|r| r.is_border()).count();
    let cap = if borders == 0 {
        MAX_INNER_EDGE
    } else {
        MAX_BORDER_EDGE
    };
    let edges = [(0, 1), (1, 2), (2, 0)];
    for &(i, j) in &edges {
        if (verts[i].1 - verts[j].1).norm() > cap {
            return TriangleClass::TooLong;
        }
    }
    for &(i, j) in &edges {
        if crosses_ring(layer, ring, verts[i], verts[j], cfg) {
            return TriangleClass::CrossesBorder;
        }
    }
    if borders == 0 {
        let x = a.x.min(b.x).min(c.x) as i64;
        let y = a.y.min(b.y).min(c.y) as i64;
        if layer.full_quad(x, y).is_some() {
            return TriangleClass::RegularQuad;
        }
    }
    TriangleClass::Connect
}

/// Whether edge `(p, q)` properly crosses a ring edge it does not share a
/// border endpoint with.
fn crosses_ring(
    layer: &MeshLayer,
    ring: &[Vector2<f64>],
    (rp, p): (SampleRef, Vector2<f64>),
    (rq, q): (SampleRef, Vector2<f64>),
    cfg: &GeomCfg,
) -> bool {
    if let (Some(i), Some(j)) = (rp.border(), rq.border()) {
        let b = layer.border_sample(i);
        if b.prev == j || b.next == j {
            return false;
        }
    }
    let n = ring.len();
    let lo = p.inf(&q);
    let hi = p.sup(&q);
    for k in 0..n {
        let a = ring[k];
        let b = ring[(k + 1) % n];
        if a.x.max(b.x) < lo.x || a.x.min(b.x) > hi.x || a.y.max(b.y) < lo.y || a.y.min(b.y) > hi.y
        {
            continue;
        }
        let touches = |r: SampleRef| r == SampleRef::Border(k) || r == SampleRef::Border((k + 1) % n);
        if touches(rp) || touches(rq) {
            continue;
        }
        if let Some((_, s, t)) = segment_intersection(p, q, a, b, cfg.eps_det) {
            let e = 1e-9;
            if s > e && s < 1.0 - e && t > -e && t < 1.0 + e {
                return true;
            }
        }
    }
    false
}

/// Whether `(i, j)` is a diagonal of a complete grid quad.
fn is_regular_diagonal(layer: &MeshLayer, i: usize, j: usize) -> bool {
    let a = layer.inner_sample(i);
    let b = layer.inner_sample(j);
    let dx = b.x as i64 - a.x as i64;
    let dy = b.y as i64 - a.y as i64;
    if dx.abs() != 1 || dy.abs() != 1 {
        return false;
    }
    layer
        .full_quad(a.x.min(b.x) as i64, a.y.min(b.y) as i64)
        .is_some()
}

/// Delaunay-triangulate the border ring and the inner samples near
/// intermediates, then connect the kept triangles.
pub(crate) fn connect_near_border(layer: &mut MeshLayer, cfg: &GeomCfg) -> TriangulationStats {
    let ring = layer.ring();
    let mut verts: Vec<(SampleRef, Vector2<f64>)> = (0..layer.border().len())
        .map(|i| (SampleRef::Border(i), ring[i]))
        .collect();
    for (i, s) in layer.inner().iter().enumerate() {
        let (x, y) = (s.x as i64, s.y as i64);
        let near = s.is_intermediate()
            || (-2..=2).any(|dy| {
                (-2..=2).any(|dx| {
                    layer
                        .sample_at_grid(x + dx, y + dy)
                        .is_some_and(|j| layer.inner_sample(j).is_intermediate())
                })
            });
        if near {
            verts.push((SampleRef::Inner(i), s.pos()));
        }
    }
    let pts: Vec<Vector2<f64>> = verts.iter().map(|v| v.1).collect();
    let tris = delaunay::triangulate(&pts);

    let mut stats = TriangulationStats {
        triangles: tris.len(),
        ..Default::default()
    };
    let mut links: Vec<(SampleRef, SampleRef)> = Vec::new();
    for t in tris {
        let tv = [verts[t[0]], verts[t[1]], verts[t[2]]];
        match classify(layer, &ring, &tv, cfg) {
            TriangleClass::Degenerate => stats.degenerate += 1,
            TriangleClass::Outside => stats.outside += 1,
            TriangleClass::CrossesBorder => stats.crossing += 1,
            TriangleClass::TooLong => stats.too_long += 1,
            TriangleClass::RegularQuad => stats.regular += 1,
            TriangleClass::Connect => {
                stats.connected += 1;
                for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                    links.push((tv[i].0, tv[j].0));
                }
            }
        }
    }
    for (a, b) in links {
        if let (SampleRef::Inner(i), SampleRef::Inner(j)) = (a, b) {
            let (a, b) = (layer.inner_sample(i), layer.inner_sample(j));
            let grid_adjacent = a.x.abs_diff(b.x) + a.y.abs_diff(b.y) == 1;
            if grid_adjacent || is_regular_diagonal(layer, i, j) {
                continue;
            }
        }
        for r in [a, b] {
            if let SampleRef::Inner(i) = r {
                layer.inner[i].kind = InnerKind::Intermediate;
            }
        }
        layer.add_neighbor(a, b);
    }
    trace!(layer = layer.index, level = layer.level, ?stats, "near-border triangulation");
    stats
}
