//! Curated surface for tools and benches (UNSTABLE).
//!
//! Important
//! - Convenience re-exports for the CLI, benches and integration tests.
//!   Names may move between modules; prefer these paths over deep imports.

// 2D kernel
pub use crate::geom2::{Bbox2, GeomCfg, Rot2};
// Sketch model and built-in scenes
pub use crate::sketch::rand::{draw_star_sketch, ReplayToken as SketchReplay, StarCfg};
pub use crate::sketch::special::{scene, SCENES};
pub use crate::sketch::{
    Constraint, ConstraintDir, ConstraintType, Curve, Link, Segment, Sketch, SketchSet,
    TransmissionType,
};
// Mesh layers
pub use crate::mesh::{LayerCfg, LayerData, MeshLayer, SampleKey, SampleRef};
// Links and families
pub use crate::link::{cross_init, designate_vertices, family, init_links, FamilyMember};
// Field queries
pub use crate::query::{query, query_sketch, SampleNeighborhood};
// Solver
pub use crate::solver::{
    validate, DTimeEquation, Issue, IssueKind, Severity, SolveSummary, Solver, SolverParams,
    Stage, StageReport, ValidationReport,
};
// External services
pub use crate::services::{
    CheckedGeodesic, CheckedPlanner, GeodesicMesh, GeodesicSolver, Needle, OptimizeRequest,
    SamplingOptimizer, TransferOptions, TransferPlanner,
};
