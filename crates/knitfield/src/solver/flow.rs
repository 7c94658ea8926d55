//! Flow relaxation: one Gauss–Seidel sweep over every sample of a level.

use nalgebra::Vector2;

use super::params::SolverParams;
use super::transmission::LinkGroup;
use crate::mesh::{MeshLayer, SampleRef};

/// Norm below which a flow counts as unset.
pub(crate) const FLOW_FLOOR: f64 = 1e-6;

/// Outcome of one flow sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowSweep {
    /// Smallest `dot(old, new)` over samples outside link groups.
    pub min_dp: f64,
    /// Samples whose flow is still unset after the sweep.
    pub unset: usize,
}

#[inline]
fn unit(v: Vector2<f64>) -> Option<Vector2<f64>> {
    let n = v.norm();
    (n >= FLOW_FLOOR).then(|| v / n)
}

/// Seam-scaled neighbor average of `r`, normalized.
///
/// A sample whose whole neighborhood is blocked keeps its flow, or takes the
/// unblocked average when it has none yet.
pub fn neighborhood_flow(layer: &MeshLayer, r: SampleRef, params: &SolverParams) -> Option<Vector2<f64>> {
    let mut sum = Vector2::zeros();
    let mut unblocked = Vector2::zeros();
    let mut total = 0.0;
    for n in layer.neighbors(r) {
        if params.nh_threshold.is_some_and(|th| n.dist > th) {
            continue;
        }
        let w = if params.nh_power == 0.0 {
            1.0
        } else {
            1.0 / n.dist.max(FLOW_FLOOR).powf(params.nh_power)
        };
        let uv = layer.uv(n.sample);
        unblocked += uv * w;
        let ws = w * (1.0 - layer.seam_weight(n.sample)).max(0.0);
        sum += uv * ws;
        total += ws;
    }
    if total > 0.0 {
        if let Some(u) = unit(sum) {
            return Some(u);
        }
    }
    let own = layer.uv(r);
    if total <= 0.0 && own.norm() >= FLOW_FLOOR {
        return Some(own / own.norm());
    }
    unit(unblocked)
}

/// Weight-scaled sum of the constraint directions of `r` and their total
/// weight, given the neighborhood flow used to sign unsigned constraints.
pub fn constraint_flow(
    layer: &MeshLayer,
    r: SampleRef,
    nh: Option<Vector2<f64>>,
) -> (Vector2<f64>, f64) {
    let mut c_uv = Vector2::zeros();
    let mut c_w = 0.0;
    for c in layer.constraints(r) {
        let Some(dir) = c.dir else {
            continue;
        };
        let d = match nh {
            Some(nh) if c.project && nh.dot(&dir) < 0.0 => -dir,
            _ => dir,
        };
        c_uv += d * c.weight;
        c_w += c.weight;
    }
    (c_uv, c_w)
}

/// New flow of one sample, or `None` when it cannot be decided yet.
pub fn relax_flow(layer: &MeshLayer, r: SampleRef, params: &SolverParams) -> Option<Vector2<f64>> {
    let nh = neighborhood_flow(layer, r, params);
    let (c_uv, c_w) = constraint_flow(layer, r, nh);
    let combined = if c_w >= 1.0 {
        c_uv
    } else if c_w > 0.0 {
        nh.unwrap_or_else(Vector2::zeros) * (1.0 - c_w) + c_uv * c_w
    } else {
        nh?
    };
    unit(combined)
}

/// One flow iteration: project link groups, then relax every sample in the
/// traversal order selected by `iter`.
///
/// `grouped[layer][border]` marks group members; they are left out of `min_dp`.
pub fn flow_sweep(
    layers: &mut [MeshLayer],
    groups: &[LinkGroup],
    grouped: &[Vec<bool>],
    iter: usize,
    params: &SolverParams,
) -> FlowSweep {
    for g in groups {
        g.project_flow(layers);
    }
    let mut min_dp = 1.0f64;
    let mut unset = 0;
    for li in 0..layers.len() {
        let order: Vec<SampleRef> = layers[li].samples(iter).to_vec();
        for r in order {
            let old = layers[li].uv(r);
            let new = relax_flow(&layers[li], r, params);
            let in_group = r.border().is_some_and(|bi| grouped[li][bi]);
            match new {
                Some(uv) => {
                    let dp = if old.norm() < FLOW_FLOOR { -1.0 } else { old.dot(&uv) };
                    layers[li].set_uv(r, uv);
                    if !in_group {
                        min_dp = min_dp.min(dp);
                    }
                }
                None if old.norm() < FLOW_FLOOR => {
                    unset += 1;
                    if !in_group {
                        min_dp = -1.0;
                    }
                }
                None => {}
            }
        }
    }
    FlowSweep { min_dp, unset }
}

/// Give every still-unset flow the up direction. Used when a sweep leaves
/// samples unreachable from any constraint.
pub fn seed_unset(layers: &mut [MeshLayer]) -> usize {
    let mut seeded = 0;
    for layer in layers.iter_mut() {
        let refs: Vec<SampleRef> = (0..layer.inner().len())
            .map(SampleRef::Inner)
            .chain((0..layer.border().len()).map(SampleRef::Border))
            .collect();
        for r in refs {
            if layer.uv(r).norm() < FLOW_FLOOR {
                layer.set_uv(r, Vector2::new(0.0, 1.0));
                seeded += 1;
            }
        }
    }
    seeded
}
