//! Coarse-to-fine field transfer.

use tracing::debug;

use super::time::average_families;
use crate::geom2::GeomCfg;
use crate::mesh::{MeshLayer, SampleRef};
use crate::query::query;

/// Copy flow and time from `coarse` into `fine` (same sketches, in order).
///
/// Every fine sample reads the coarse layer at its sketch position. Times
/// are scaled by `(1/sx + 1/sy)/2` with `s = η_fine/η_coarse`, which keeps
/// the gradient per grid unit. Samples the query cannot reach keep their
/// initial fields. Returns the number of samples that were transferred.
pub fn upscale(coarse: &[MeshLayer], fine: &mut [MeshLayer], geom: &GeomCfg) -> usize {
    let mut transferred = 0;
    for (c, f) in coarse.iter().zip(fine.iter_mut()) {
        let s = f.eta / c.eta;
        let scale = 1.0 / s;
        let radius = s.ceil().max(1.0);
        let refs: Vec<SampleRef> = (0..f.inner().len())
            .map(SampleRef::Inner)
            .chain((0..f.border().len()).map(SampleRef::Border))
            .collect();
        let mut missed = 0;
        for r in refs {
            let g = c.to_grid(f.sketch_pos(r));
            let Some(nh) = query(c, g, radius, geom) else {
                missed += 1;
                continue;
            };
            let uv = nh.uv(c);
            let n = uv.norm();
            if n > 1e-6 {
                f.set_uv(r, uv / n);
            }
            let t = nh.t(c);
            if t.is_finite() {
                f.set_t(r, t * scale);
            }
            transferred += 1;
        }
        if missed > 0 {
            debug!(layer = f.index, missed, "samples outside the coarse layer");
        }
    }
    average_families(fine);
    transferred
}
