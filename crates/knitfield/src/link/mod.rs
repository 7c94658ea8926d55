//! Boundary linking: border sample families across linked segments.
//!
//! Purpose
//! - Pair border samples of linked segments (`init_links`), close the pairs
//!   transitively into families with composed rotations (`cross_init`), pick
//!   one canonical vertex per family (`designate_vertices`) and mark the ring
//!   edges where linked flows oppose (`mark_openings`).
//!
//! Conventions
//! - A link entry stores `rotation` with `uv_self ≈ rotation · uv_target`,
//!   both in their layers' grid frames.
//! - Direct entries come first (`direct_link_count`), indirect ones after.
//! - All functions work on the layers of one level, indexed by sketch.

mod build;
mod family;

pub use build::{cross_init, init_links};
pub use family::{designate_vertices, family, is_representative, mark_openings, FamilyMember};

#[cfg(test)]
mod tests;
