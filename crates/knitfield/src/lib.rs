//! Flow and time fields over sampled knitting sketches.
//!
//! A set of planar sketches (closed piecewise-polynomial outlines, optionally
//! linked along boundary segments) is discretized into one mesh layer per
//! sketch and resolution level. The solver then relaxes a unit flow field and
//! a scalar time field whose gradient follows the flow, coarse to fine.
//!
//! Layout
//! - `geom2`: 2D kernel (unit-vector rotations, intersections, containment).
//! - `sketch`: read-only sketch model, links, constraints, built-in scenes.
//! - `mesh`: per-layer sampling, triangulation near the boundary, persistence.
//! - `link`: border sample families across links.
//! - `query`: field reads at arbitrary points through sample neighborhoods.
//! - `solver`: flow/time relaxation, transmission and isoline groups, validation.
//! - `services`: adapters for the external planner/optimizer/geodesic modules.

pub mod api;
pub mod error;
pub mod geom2;
pub mod link;
pub mod mesh;
pub mod query;
pub mod services;
pub mod sketch;
pub mod solver;

pub use error::{Error, Result};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use nalgebra::Vector2 as Vec2;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::geom2::{Bbox2, GeomCfg, Rot2};
    pub use crate::mesh::{MeshLayer, SampleKey, SampleRef};
    pub use crate::sketch::{
        Constraint, ConstraintDir, ConstraintType, Curve, Link, Segment, Sketch, SketchSet,
        TransmissionType,
    };
    pub use crate::solver::{SolverParams, Solver, Stage};
    pub use nalgebra::Vector2 as Vec2;
}
