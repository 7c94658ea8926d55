//! Layer construction: border ring, interior raster, near-border
//! triangulation and constraint attachment.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraint::attach_constraints;
use super::layer::MeshLayer;
use super::raster::{fill_polygon, stroke_distance, Mask};
use super::triangulate::connect_near_border;
use super::types::{BorderSample, InnerKind, SampleKey};
use crate::error::{Error, Result};
use crate::geom2::{poly_contains, GeomCfg};
use crate::sketch::{Sketch, SketchSet};

/// Cells closer than this (grid units) to the outline are left to the
/// triangulation.
const BORDER_EROSION: f64 = 0.25;

/// Parameters of one layer build.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerCfg {
    pub level: usize,
    /// Sample spacing in sketch units.
    pub eta: f64,
    /// Constraint reach in grid units.
    pub constraint_support: f64,
    /// Initialize flows to `(0, 1)` instead of zero.
    pub init_up: bool,
    pub geom: GeomCfg,
}

impl LayerCfg {
    pub fn new(level: usize, eta: f64) -> Self {
        Self {
            level,
            eta,
            constraint_support: 1.5,
            init_up: true,
            geom: GeomCfg::default(),
        }
    }
}

#[inline]
fn unit_or(v: Vector2<f64>, fallback: Vector2<f64>) -> Vector2<f64> {
    let n = v.norm();
    if n < 1e-9 {
        fallback
    } else {
        v / n
    }
}

impl MeshLayer {
    /// Discretize sketch `index` of `set`.
    ///
    /// Errors
    /// - `InvalidArgument` for a missing sketch or a non-positive spacing.
    /// - `Geometry` for an empty outline or a ring too short to enclose area.
    pub fn build(set: &SketchSet, index: usize, cfg: &LayerCfg) -> Result<MeshLayer> {
        let sketch = set
            .sketches
            .get(index)
            .ok_or_else(|| Error::invalid(format!("no sketch {index}")))?;
        if !(cfg.eta.is_finite() && cfg.eta > 0.0) {
            return Err(Error::invalid(format!("sample spacing must be positive, got {}", cfg.eta)));
        }
        let bbox = sketch.bbox();
        let size = bbox.size();
        if bbox.is_empty() || size.x <= 0.0 || size.y <= 0.0 {
            return Err(Error::Geometry(format!(
                "sketch {index} ({}) has an empty outline",
                sketch.name
            )));
        }
        let mut layer = MeshLayer::empty(cfg.level, index, cfg.eta, bbox.min, bbox.max, sketch.mirror_x);
        sample_border(&mut layer, set, index)?;
        sample_interior(&mut layer, sketch);
        let stats = connect_near_border(&mut layer, &cfg.geom);
        attach_constraints(&mut layer, &sketch.constraints, cfg.constraint_support);
        layer.init_fields(cfg.init_up);
        layer.finalize();
        debug!(
            sketch = index,
            level = cfg.level,
            width = layer.width,
            height = layer.height,
            inner = layer.inner.len(),
            border = layer.border.len(),
            dropped_degenerate = stats.degenerate,
            "built mesh layer"
        );
        Ok(layer)
    }
}

/// Border ring: `⌈max(len, linked len)/η⌉ ∨ 1` samples per segment, the
/// first of each segment being a corner.
fn sample_border(layer: &mut MeshLayer, set: &SketchSet, index: usize) -> Result<()> {
    let sketch = set.get(index);
    let n_seg = sketch.seg_count();
    let orient = sketch.local_orientation();
    let mut offsets = Vec::with_capacity(n_seg + 1);
    for seg in 0..n_seg {
        offsets.push(layer.border.len());
        let len = sketch.segment(seg).length();
        let linked = set.linked_segment_length(index, seg).unwrap_or(0.0);
        let n = ((len.max(linked) / layer.eta).ceil() as usize).max(1);
        let prev = (seg + n_seg - 1) % n_seg;
        for k in 0..n {
            let alpha = k as f64 / n as f64;
            let sketch_pos = sketch.segment(seg).get(alpha);
            let t = sketch.tangent(seg, alpha, true);
            let nrm = sketch.normal_with(orient, seg, alpha, true);
            let (segs, tangent, normal) = if k == 0 {
                (
                    vec![(seg, 0.0), (prev, 1.0)],
                    unit_or(t + sketch.tangent(prev, 1.0, true), t),
                    unit_or(nrm + sketch.normal_with(orient, prev, 1.0, true), nrm),
                )
            } else {
                (vec![(seg, alpha)], t, nrm)
            };
            let data_index = layer.border.len();
            layer.border.push(BorderSample {
                segs,
                data_index,
                delta_index: k,
                prev: 0,
                next: 0,
                grid_pos: layer.to_grid(sketch_pos),
                sketch_pos,
                tangent,
                normal,
                links: Vec::new(),
                direct_link_count: 0,
                self_link: false,
                vertex: SampleKey::border(index, data_index),
                prev_open: false,
                next_open: false,
                vertex_open: false,
                inner_nbrs: Vec::new(),
                border_nbrs: Vec::new(),
                constraints: Vec::new(),
                seam_weight: 0.0,
                region: 0,
            });
        }
    }
    offsets.push(layer.border.len());
    let n = layer.border.len();
    if n < 3 {
        return Err(Error::Geometry(format!(
            "sketch {index}: border ring of {n} samples encloses no area"
        )));
    }
    for (i, b) in layer.border.iter_mut().enumerate() {
        b.prev = (i + n - 1) % n;
        b.next = (i + 1) % n;
    }
    layer.seg_offsets = offsets;
    Ok(())
}

/// Two-pass occupancy raster, then regular and intermediate inner samples.
fn sample_interior(layer: &mut MeshLayer, sketch: &Sketch) {
    let (w, h) = (layer.width, layer.height);
    let outline: Vec<Vector2<f64>> = sketch
        .outline(0.05 * layer.eta)
        .into_iter()
        .map(|p| layer.to_grid(p))
        .collect();
    let ring = layer.ring();
    let orient = sketch.local_orientation();
    let fill = fill_polygon(&outline, w, h);
    let near = stroke_distance(&outline, true, 0.5, w, h);
    let mut accepted = Mask::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if !fill.get(x, y) {
                continue;
            }
            let p = Vector2::new(x as f64, y as f64);
            let d = near[y * w + x];
            if d < 0.5 {
                // partially covered cell: the closest boundary must face it
                let Some((seg, cp)) = sketch.project(layer.to_sketch(p)) else {
                    continue;
                };
                let n = sketch.normal_with(orient, seg, cp.alpha, true);
                if (p - layer.to_grid(cp.point)).dot(&n) <= 0.0 || d < BORDER_EROSION {
                    continue;
                }
            }
            if poly_contains(&ring, p) {
                accepted.set(x, y, true);
            }
        }
    }
    for y in 0..h {
        for x in 0..w {
            if !accepted.get(x, y) {
                continue;
            }
            let (xi, yi) = (x as i64, y as i64);
            let complete = [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .all(|&(dx, dy)| accepted.get_signed(xi + dx, yi + dy));
            let kind = if complete {
                InnerKind::Regular
            } else {
                InnerKind::Intermediate
            };
            layer.push_inner(x, y, kind);
        }
    }
}
