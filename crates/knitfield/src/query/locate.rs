//! Point location over the sample graph of one layer.

use nalgebra::Vector2;

use super::neighborhood::{NeighborhoodKind, SampleNeighborhood};
use crate::geom2::{barycentric, cross, project_on_segment, GeomCfg};
use crate::mesh::{MeshLayer, SampleRef};

/// Samples whose cells or buckets lie around `p`, inner first.
fn candidates(layer: &MeshLayer, p: Vector2<f64>, radius: f64) -> Vec<SampleRef> {
    let mut out = Vec::new();
    let r = radius.ceil() as i64;
    let (cx, cy) = (p.x.floor() as i64, p.y.floor() as i64);
    for y in (cy - r)..=(cy + r + 1) {
        for x in (cx - r)..=(cx + r + 1) {
            if let Some(i) = layer.sample_at_grid(x, y) {
                if (layer.pos(SampleRef::Inner(i)) - p).norm() <= radius + 1.5 {
                    out.push(SampleRef::Inner(i));
                }
            }
        }
    }
    out.extend(
        layer
            .border_near(p, radius + 1.5)
            .into_iter()
            .map(SampleRef::Border),
    );
    out
}

/// Neighborhood of grid point `p`; `None` when nothing lies within `radius`.
pub fn query(
    layer: &MeshLayer,
    p: Vector2<f64>,
    radius: f64,
    cfg: &GeomCfg,
) -> Option<SampleNeighborhood> {
    let cands = candidates(layer, p, radius.max(1.0));

    // 1. sample hit
    if let Some(&s) = cands
        .iter()
        .filter(|&&s| (layer.pos(s) - p).norm() <= cfg.eps_pos)
        .min_by(|&&a, &&b| {
            let da = (layer.pos(a) - p).norm();
            let db = (layer.pos(b) - p).norm();
            da.total_cmp(&db)
        })
    {
        return Some(SampleNeighborhood::single(layer, NeighborhoodKind::Vertex, s));
    }

    // 2. edge hit
    for &a in &cands {
        let pa = layer.pos(a);
        for n in layer.neighbors(a) {
            let pr = project_on_segment(p, pa, layer.pos(n.sample));
            if pr.dist <= cfg.eps_pos && pr.t > 0.0 && pr.t < 1.0 {
                return Some(SampleNeighborhood::new(
                    layer,
                    NeighborhoodKind::Edge,
                    vec![a, n.sample],
                    vec![1.0 - pr.t, pr.t],
                ));
            }
        }
    }

    // 3a. full grid quad
    let (x0, y0) = (p.x.floor() as i64, p.y.floor() as i64);
    if let Some(q) = layer.full_quad(x0, y0) {
        let fx = p.x - x0 as f64;
        let fy = p.y - y0 as f64;
        return Some(SampleNeighborhood::new(
            layer,
            NeighborhoodKind::Quad,
            q.iter().map(|&i| SampleRef::Inner(i)).collect(),
            vec![
                (1.0 - fx) * (1.0 - fy),
                fx * (1.0 - fy),
                fx * fy,
                (1.0 - fx) * fy,
            ],
        ));
    }

    // 3b. triangle of mutually adjacent samples
    for &a in &cands {
        let pa = layer.pos(a);
        let nbrs = layer.neighbors(a);
        for (i, nb) in nbrs.iter().enumerate() {
            for nc in &nbrs[i + 1..] {
                let (b, c) = (nb.sample, nc.sample);
                if !layer.neighbors(b).iter().any(|m| m.sample == c) {
                    continue;
                }
                let (pb, pc) = (layer.pos(b), layer.pos(c));
                if cross(pa, pb, pc).abs() < cfg.eps_area {
                    continue;
                }
                let Some(w) = barycentric(p, pa, pb, pc) else {
                    continue;
                };
                if w.iter().any(|&wi| wi < -1e-12) {
                    continue;
                }
                let (samples, weights) = if cross(pa, pb, pc) > 0.0 {
                    (vec![a, b, c], w.to_vec())
                } else {
                    (vec![a, c, b], vec![w[0], w[2], w[1]])
                };
                return Some(SampleNeighborhood::new(
                    layer,
                    NeighborhoodKind::Triangle,
                    samples,
                    weights,
                ));
            }
        }
    }

    // 4. boundary projection, then the nearest sample
    let n = layer.border().len();
    let mut best: Option<(f64, usize, f64)> = None;
    for i in layer.border_near(p, radius + 1.5) {
        for j in [layer.border_sample(i).prev, i] {
            let b = layer.border_sample(j);
            let pr = project_on_segment(p, b.grid_pos, layer.border_sample(b.next).grid_pos);
            if best.map_or(true, |(d, _, _)| pr.dist < d) {
                best = Some((pr.dist, j, pr.t));
            }
        }
    }
    if let Some((d, j, t)) = best {
        if d <= radius && n > 1 {
            let next = layer.border_sample(j).next;
            return Some(SampleNeighborhood::new(
                layer,
                NeighborhoodKind::Projection,
                vec![SampleRef::Border(j), SampleRef::Border(next)],
                vec![1.0 - t, t],
            ));
        }
    }
    cands
        .iter()
        .map(|&s| (s, (layer.pos(s) - p).norm()))
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| SampleNeighborhood::single(layer, NeighborhoodKind::Projection, s))
}

/// `query` at a sketch-space point.
pub fn query_sketch(
    layer: &MeshLayer,
    p: Vector2<f64>,
    radius: f64,
    cfg: &GeomCfg,
) -> Option<SampleNeighborhood> {
    query(layer, layer.to_grid(p), radius, cfg)
}
