//! Flow and time relaxation over the layers of a sketch set.
//!
//! Purpose
//! - `Solver` runs, per resolution level, a flow stage (unit vector field
//!   relaxed toward constraints and across links) and a time stage (scalar
//!   field whose gradient follows the flow), then upscales to the next level.
//! - `validate` checks the finest level for flow conflicts and time defects.
//!
//! Conventions
//! - Sweeps are Gauss–Seidel: samples read values written earlier in the
//!   same sweep, in the traversal order `iteration mod 8`.
//! - Flow sweeps visit every sample; time sweeps visit family
//!   representatives only and write the result to every family member.
//! - Times are in grid units of their level. Upscaling doubles them.
//! - Non-convergence is reported in `StageReport`, never as an error.

mod flow;
mod params;
mod stage;
mod time;
mod transmission;
mod upscale;
mod validate;

pub use flow::{constraint_flow, flow_sweep, neighborhood_flow, relax_flow, FlowSweep};
pub use params::{DTimeEquation, FlowStageParams, SolverParams};
pub use stage::{SolveSummary, Solver, Stage, StageReport};
pub use time::{
    average_families, neighbor_dt, time_stretch, time_sweep, DtCache, TimeGroup, TimeGroups,
    TimeMember, TimeSweep,
};
pub use transmission::{merge_transmissions, LinkGroup};
pub use upscale::upscale;
pub use validate::{quad_curl, validate, Issue, IssueKind, Severity, ValidationReport};

#[cfg(test)]
mod tests;
