//! Field reads at arbitrary points of a layer.
//!
//! `query` resolves a grid-space point to a `SampleNeighborhood` (1 to 4
//! samples with weights summing to one) by the first rule that applies:
//! sample hit, edge hit, enclosing quad or triangle, boundary projection.

mod locate;
mod neighborhood;

pub use locate::{query, query_sketch};
pub use neighborhood::{NeighborhoodKind, SampleNeighborhood};

#[cfg(test)]
mod tests;
