//! Constraint rasterization onto layer samples.

use nalgebra::Vector2;

use super::layer::MeshLayer;
use super::raster::stroke_distance;
use super::types::{ConstraintData, SampleRef};
use crate::sketch::{Constraint, ConstraintDir, ConstraintType};

/// Build the constraint entry of constraint `ci` for a sample, if the
/// sample lies within `support` grid units of the curve.
///
/// The weight decays linearly from `c.weight` on the curve to zero at the
/// support radius.
pub fn constraint_data(
    layer: &MeshLayer,
    ci: usize,
    c: &Constraint,
    grid_pos: Vector2<f64>,
    support: f64,
) -> Option<ConstraintData> {
    let (seg, cp) = c.curve.project(layer.to_sketch(grid_pos))?;
    let dist = cp.dist / layer.eta;
    if dist > support || support <= 0.0 {
        return None;
    }
    let weight = c.weight * (1.0 - dist / support);
    if weight <= 0.0 {
        return None;
    }
    let t = c.curve.segments[seg].derivative(cp.alpha, true);
    let sign = c.dir.sign().unwrap_or(1.0);
    let local = match c.kind {
        ConstraintType::Direction => Some(t * sign),
        ConstraintType::Isoline => Some(Vector2::new(-t.y, t.x) * sign),
        ConstraintType::Seam => None,
    };
    let dir = local.map(|d| {
        if layer.mirror_x {
            Vector2::new(-d.x, d.y)
        } else {
            d
        }
    });
    Some(ConstraintData {
        curve: ci,
        kind: c.kind,
        project: c.dir == ConstraintDir::Unsigned && c.kind != ConstraintType::Seam,
        weight,
        dir,
        layer_pos: layer.to_grid(cp.point),
        layer_dist: dist,
        dt: f64::NAN,
    })
}

/// Attach every constraint to the samples it reaches. Inner samples are
/// pre-filtered by a stroked raster of the curve; border samples test all
/// constraints.
pub(crate) fn attach_constraints(layer: &mut MeshLayer, constraints: &[Constraint], support: f64) {
    let (w, h) = (layer.width, layer.height);
    for (ci, c) in constraints.iter().enumerate() {
        if c.kind == ConstraintType::Isoline {
            layer.has_isoline = true;
        }
        let poly: Vec<Vector2<f64>> = c
            .curve
            .flatten(0.05 * layer.eta)
            .into_iter()
            .map(|p| layer.to_grid(p))
            .collect();
        // one cell of slack for the flattening error
        let stroke = stroke_distance(&poly, false, support + 1.0, w, h);
        let mut found: Vec<(SampleRef, ConstraintData)> = Vec::new();
        for (i, s) in layer.inner().iter().enumerate() {
            if !stroke[s.y * w + s.x].is_finite() {
                continue;
            }
            if let Some(cd) = constraint_data(layer, ci, c, s.pos(), support) {
                found.push((SampleRef::Inner(i), cd));
            }
        }
        for (i, b) in layer.border().iter().enumerate() {
            if let Some(cd) = constraint_data(layer, ci, c, b.grid_pos, support) {
                found.push((SampleRef::Border(i), cd));
            }
        }
        for (r, cd) in found {
            if cd.kind == ConstraintType::Seam {
                match r {
                    SampleRef::Inner(i) => layer.inner[i].seam_weight += cd.weight,
                    SampleRef::Border(i) => layer.border[i].seam_weight += cd.weight,
                }
            }
            layer.constraints_mut(r).push(cd);
        }
    }
}
