//! Bowyer-Watson Delaunay triangulation in grid coordinates.
//!
//! Triangles are returned counter-clockwise as indices into the input slice.
//! Cocircular ties (frequent on the regular lattice) may yield zero-area
//! triangles; callers filter them by area.

use std::collections::HashMap;

use nalgebra::Vector2;

use crate::geom2::cross;

#[derive(Clone, Copy, Debug)]
struct Tri {
    v: [usize; 3],
    center: Vector2<f64>,
    radius_sq: f64,
}

impl Tri {
    fn new(pts: &[Vector2<f64>], a: usize, b: usize, c: usize) -> Self {
        let v = if cross(pts[a], pts[b], pts[c]) < 0.0 {
            [a, c, b]
        } else {
            [a, b, c]
        };
        let (center, radius_sq) = circumcircle(pts[v[0]], pts[v[1]], pts[v[2]]);
        Self {
            v,
            center,
            radius_sq,
        }
    }
}

/// Delaunay triangles of `points` (fewer than 3 points give none).
pub fn triangulate(points: &[Vector2<f64>]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let mut pts: Vec<Vector2<f64>> = points.to_vec();
    pts.extend_from_slice(&super_triangle(points));

    let mut tris = vec![Tri::new(&pts, n, n + 1, n + 2)];
    let mut edge_count: HashMap<(usize, usize), (usize, (usize, usize))> = HashMap::new();
    for i in 0..n {
        let p = pts[i];
        let (bad, good): (Vec<Tri>, Vec<Tri>) = tris
            .into_iter()
            .partition(|t| (p - t.center).norm_squared() <= t.radius_sq * (1.0 + 1e-12) + 1e-12);
        tris = good;

        // boundary of the cavity: edges owned by exactly one bad triangle
        edge_count.clear();
        for t in &bad {
            for k in 0..3 {
                let (a, b) = (t.v[k], t.v[(k + 1) % 3]);
                let key = (a.min(b), a.max(b));
                edge_count
                    .entry(key)
                    .and_modify(|e| e.0 += 1)
                    .or_insert((1, (a, b)));
            }
        }
        let mut boundary: Vec<(usize, usize)> = edge_count
            .values()
            .filter(|(c, _)| *c == 1)
            .map(|(_, e)| *e)
            .collect();
        boundary.sort_unstable();
        for (a, b) in boundary {
            tris.push(Tri::new(&pts, a, b, i));
        }
    }
    tris.into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .map(|t| t.v)
        .collect()
}

fn super_triangle(points: &[Vector2<f64>]) -> [Vector2<f64>; 3] {
    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    let delta = (max.x - min.x).max(max.y - min.y).max(1.0);
    let mid = (min + max) * 0.5;
    [
        Vector2::new(mid.x - 20.0 * delta, mid.y - delta),
        Vector2::new(mid.x + 20.0 * delta, mid.y - delta),
        Vector2::new(mid.x, mid.y + 20.0 * delta),
    ]
}

fn circumcircle(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> (Vector2<f64>, f64) {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        // collinear: enclose the three points
        let center = (a + b + c) / 3.0;
        let radius_sq = (a - center)
            .norm_squared()
            .max((b - center).norm_squared())
            .max((c - center).norm_squared());
        return (center, radius_sq);
    }
    let a2 = a.norm_squared();
    let b2 = b.norm_squared();
    let c2 = c.norm_squared();
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Vector2::new(ux, uy);
    (center, (a - center).norm_squared())
}
