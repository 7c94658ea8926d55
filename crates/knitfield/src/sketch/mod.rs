//! Sketch model consumed by the mesh layer.
//!
//! Purpose
//! - A sketch is one closed outline made of parametric segments (lines and
//!   cubic Béziers, each parametrized on `[0, 1]`), an optional X mirror, one
//!   optional `Link` per segment and a list of user constraints.
//! - `SketchSet` owns several sketches and keeps links reciprocal.
//!
//! Conventions
//! - Sketch space is the user-facing coordinate system. Normals returned by
//!   `Sketch::normal` point inward; `mirror_corrected` applies the X mirror so
//!   the vector lives in the (unmirrored) layer frame.
//! - `Sketch::local_orientation` is the orientation of the outline as drawn;
//!   `Sketch::orientation` accounts for the mirror flag. The mesh layer uses
//!   the latter, sketch-space normals the former.

pub mod rand;
mod segment;
pub mod special;
mod types;

pub use segment::{Curve, CurvePoint, Segment};
pub use types::{
    Constraint, ConstraintDir, ConstraintType, Link, Orientation, Sketch, SketchSet,
    TransmissionType,
};
