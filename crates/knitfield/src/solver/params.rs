//! Solver configuration.
//!
//! All keys have defaults, so partial JSON configs deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geom2::GeomCfg;

/// Formula for the expected time difference between neighbors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DTimeEquation {
    /// `−uv_s · d`
    Source,
    /// `−uv_n · d`
    Target,
    /// `−(κ_s uv_s · d + κ_n uv_n · d) / 2`
    #[default]
    Bidir,
}

/// Endpoints of the per-level flow tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowStageParams {
    /// Coarsest-level tolerance on `1 − minDp`; `flow_accuracy` when unset.
    pub max_dp: Option<f64>,
    /// Finest-level tolerance on `1 − minDp`.
    pub convergence_band: f64,
}

impl Default for FlowStageParams {
    fn default() -> Self {
        Self {
            max_dp: None,
            convergence_band: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Per-iteration metrics at `info` level.
    pub verbose: bool,
    pub flow_accuracy: f64,
    pub time_accuracy: f64,
    /// When positive, interior time stretch must lie in `[r, 1/r]`.
    pub time_stretch_range: f64,
    /// Momentum on time updates for levels above 0.
    pub time_moment: f64,
    pub max_time_iter: usize,
    pub max_flow_iter: usize,
    /// Neighbor weight exponent: `1 / d^p`.
    pub nh_power: f64,
    /// Neighbor distance cutoff in grid units (`None` = unbounded).
    pub nh_threshold: Option<f64>,
    pub dtime_equation: DTimeEquation,
    /// Merge distance of isoline time groups, in grid units.
    pub iso_merge_dist: f64,
    pub invert_time: bool,
    pub flow_stage: FlowStageParams,
    /// Sample spacing of the finest level, in sketch units.
    pub eta: f64,
    /// Index of the finest level; level `ℓ` has spacing `eta · 2^(max_level − ℓ)`.
    pub max_level: usize,
    /// Constraint reach in grid units.
    pub constraint_support: f64,
    /// Neighbor dot product below which flow is reported as changing too fast.
    pub flow_change_threshold: f64,
    /// Discrete curl magnitude reported as a large interior rotation.
    pub curl_threshold: f64,
    pub geom: GeomCfg,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            verbose: false,
            flow_accuracy: 1e-3,
            time_accuracy: 5e-3,
            time_stretch_range: 0.0,
            time_moment: 0.0,
            max_time_iter: 2000,
            max_flow_iter: 1000,
            nh_power: 0.0,
            nh_threshold: None,
            dtime_equation: DTimeEquation::Bidir,
            iso_merge_dist: 0.1,
            invert_time: false,
            flow_stage: FlowStageParams::default(),
            eta: 0.1,
            max_level: 1,
            constraint_support: 1.5,
            flow_change_threshold: 0.15,
            curl_threshold: 1.0,
            geom: GeomCfg::default(),
        }
    }
}

impl SolverParams {
    /// Sample spacing at `level`.
    #[inline]
    pub fn eta_at(&self, level: usize) -> f64 {
        self.eta * 2f64.powi(self.max_level.saturating_sub(level) as i32)
    }

    /// `level / max_level`, or 1 with a single level.
    #[inline]
    pub fn level_fraction(&self, level: usize) -> f64 {
        if self.max_level == 0 {
            1.0
        } else {
            level as f64 / self.max_level as f64
        }
    }

    /// Tolerance on `1 − minDp` at `level`.
    pub fn flow_tolerance(&self, level: usize) -> f64 {
        let f = self.level_fraction(level);
        let coarse = self.flow_stage.max_dp.unwrap_or(self.flow_accuracy);
        coarse * (1.0 - f) + self.flow_stage.convergence_band * f
    }

    /// Bound on the largest per-iteration time change at `level`.
    pub fn time_tolerance(&self, level: usize) -> f64 {
        let f = self.level_fraction(level);
        self.time_accuracy * f + 1e-2 * (1.0 - f)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(Error::invalid(format!("eta must be positive, got {}", self.eta)));
        }
        if self.max_time_iter == 0 || self.max_flow_iter == 0 {
            return Err(Error::invalid("iteration caps must be positive"));
        }
        if !(0.0..1.0).contains(&self.time_stretch_range) {
            return Err(Error::invalid(format!(
                "time_stretch_range must lie in [0, 1), got {}",
                self.time_stretch_range
            )));
        }
        if self.nh_power < 0.0 || self.constraint_support <= 0.0 {
            return Err(Error::invalid("nh_power and constraint_support must be non-negative"));
        }
        Ok(())
    }
}
