//! 2D geometry kernel.
//!
//! Purpose
//! - Vector helpers, unit-vector rotations, segment/line intersection,
//!   projections, barycentrics, polygon containment and bounding boxes used by
//!   the mesh layer, the linking pass and the solver.
//!
//! Conventions
//! - All angular operations use `Rot2` (unit complex numbers). Angles appear
//!   only when normalizing external inputs (e.g. building circles).
//! - Predicates are tolerance-aware through `GeomCfg`; ill-conditioned cases
//!   return `None` instead of panicking.

mod types;
mod util;

pub use types::{Bbox2, GeomCfg, Rot2};
pub use util::{
    barycentric, circle_inter_circle, cross, distance_to_polyline, in_triangle,
    line_intersection, poly_contains, project_on_segment, segment_intersection, signed_area,
    CircleIntersection, SegmentProjection,
};

#[cfg(test)]
mod tests;
