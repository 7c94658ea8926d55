//! Mesh layers: one discretization per (sketch, resolution level).
//!
//! Purpose
//! - Sample a sketch with regular grid samples inside, an ordered ring of
//!   border samples on the outline, and intermediate samples that connect the
//!   two through a Delaunay triangulation of the near-border band.
//! - Own the per-sample fields (curvature `K`, flow `U`/`V`, time `T`) in
//!   packed arrays and expose neighbor iteration in eight traversal orders.
//!
//! Conventions
//! - Grid space: `x' = (x − min.x)/η` (or `(max.x − x)/η` when mirrored),
//!   `y' = (y − min.y)/η`. Inner samples sit on integer positions.
//! - Samples are addressed by `SampleRef` within a layer and by `SampleKey`
//!   across the layers of a level. Neighbor lists are index sets; nothing
//!   owns another sample.
//! - Adjacency is symmetric and rebuilt by `finalize` after topology edits.

mod build;
mod constraint;
mod delaunay;
mod layer;
mod persist;
pub mod raster;
mod triangulate;
mod types;

pub use build::LayerCfg;
pub use constraint::constraint_data;
pub use delaunay::triangulate as delaunay_triangulate;
pub use layer::MeshLayer;
pub use persist::LayerData;
pub use triangulate::{classify as classify_triangle, TriangleClass, TriangulationStats};
pub use types::{
    BorderSample, ConstraintData, InnerKind, InnerSample, LinkEntry, Neighbor, SampleKey,
    SampleRef, CHANNELS, K, T, U, V,
};
