//! Multi-resolution stage machine.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::flow::{flow_sweep, seed_unset};
use super::params::SolverParams;
use super::time::{
    all_times_valid, pick_tref, recentre, seed_components, stretch_within, time_sweep, DtCache,
    TimeGroups,
};
use super::transmission::{grouped_samples, LinkGroup};
use super::upscale::upscale;
use super::validate::{validate, ValidationReport};
use crate::error::{Error, Result};
use crate::link::{cross_init, designate_vertices, init_links, mark_openings};
use crate::mesh::{LayerCfg, MeshLayer, SampleRef};
use crate::query::query;
use crate::sketch::SketchSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Flow,
    Time,
    Done,
}

/// How one stage of one level ended.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub level: usize,
    pub stage: Stage,
    pub iterations: usize,
    pub converged: bool,
    /// `1 − minDp` for flow, `maxDt` for time.
    pub residual: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    pub stages: Vec<StageReport>,
    pub validation: ValidationReport,
}

impl SolveSummary {
    /// Every stage reached its tolerance before its iteration cap.
    pub fn converged(&self) -> bool {
        self.stages.iter().all(|s| s.converged)
    }

    pub fn iterations(&self) -> usize {
        self.stages.iter().map(|s| s.iterations).sum()
    }
}

/// Flow/time solver over all sketches of a set, coarse to fine.
///
/// `levels[ℓ][k]` is the layer of sketch `k` at level `ℓ`. Each `iterate`
/// call performs one sweep of the current stage on the current level.
#[derive(Clone, Debug)]
pub struct Solver {
    set: SketchSet,
    params: SolverParams,
    components: Vec<Vec<usize>>,
    levels: Vec<Vec<MeshLayer>>,
    level: usize,
    stage: Stage,
    iter: usize,
    residual: f64,
    last_unset: usize,
    link_groups: Vec<LinkGroup>,
    grouped: Vec<Vec<bool>>,
    time_groups: TimeGroups,
    dt_cache: DtCache,
    reports: Vec<StageReport>,
    validation: Option<ValidationReport>,
}

impl Solver {
    /// Mesh every sketch at every level and link the layers.
    ///
    /// Errors
    /// - `InvalidArgument` for bad parameters or an empty set.
    /// - `Geometry`/`Topology` from layer construction and linking.
    pub fn new(set: SketchSet, params: SolverParams) -> Result<Solver> {
        params.validate()?;
        set.validate()?;
        if set.is_empty() {
            return Err(Error::invalid("sketch set is empty"));
        }
        let init_up = !set.has_directional_constraint();
        let mut levels = Vec::with_capacity(params.max_level + 1);
        for level in 0..=params.max_level {
            let cfg = LayerCfg {
                level,
                eta: params.eta_at(level),
                constraint_support: params.constraint_support,
                init_up,
                geom: params.geom,
            };
            let mut layers = (0..set.len())
                .map(|k| MeshLayer::build(&set, k, &cfg))
                .collect::<Result<Vec<_>>>()?;
            init_links(&mut layers, &set)?;
            cross_init(&mut layers);
            designate_vertices(&mut layers);
            debug!(
                level,
                eta = cfg.eta,
                samples = layers.iter().map(|l| l.num_samples()).sum::<usize>(),
                "level meshed"
            );
            levels.push(layers);
        }
        let components = set.components();
        let mut solver = Solver {
            set,
            params,
            components,
            levels,
            level: 0,
            stage: Stage::Flow,
            iter: 0,
            residual: f64::INFINITY,
            last_unset: usize::MAX,
            link_groups: Vec::new(),
            grouped: Vec::new(),
            time_groups: TimeGroups::default(),
            dt_cache: DtCache::default(),
            reports: Vec::new(),
            validation: None,
        };
        solver.enter_flow();
        Ok(solver)
    }

    #[inline]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    #[inline]
    pub fn sketches(&self) -> &SketchSet {
        &self.set
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Iterations spent in the current stage.
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iter
    }

    #[inline]
    pub fn levels(&self) -> &[Vec<MeshLayer>] {
        &self.levels
    }

    /// Layers of `level`, empty when out of range.
    pub fn layers(&self, level: usize) -> &[MeshLayer] {
        self.levels.get(level).map_or(&[], |l| l.as_slice())
    }

    /// Layers of the level currently being solved.
    pub fn current_layers(&self) -> &[MeshLayer] {
        self.layers(self.level)
    }

    pub fn finest(&self) -> &[MeshLayer] {
        self.layers(self.params.max_level)
    }

    pub fn link_groups(&self) -> &[LinkGroup] {
        &self.link_groups
    }

    pub fn time_groups(&self) -> &TimeGroups {
        &self.time_groups
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    /// Findings of the final validation, once `Done`.
    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    /// Fraction of the whole solve completed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let (stage, tol) = match self.stage {
            Stage::Done => return 1.0,
            Stage::Flow => (0.0, self.params.flow_tolerance(self.level)),
            Stage::Time => (1.0, self.params.time_tolerance(self.level)),
        };
        let delta = if self.residual.is_finite() && self.residual > 0.0 {
            (tol / self.residual).clamp(0.0, 1.0)
        } else if self.residual.is_finite() {
            1.0
        } else {
            0.0
        };
        let total = 2.0 * (self.params.max_level + 1) as f64;
        ((2 * self.level) as f64 + stage + delta) / total
    }

    /// One sweep of the current stage; returns the stage after it.
    pub fn iterate(&mut self) -> Stage {
        match self.stage {
            Stage::Flow => self.flow_step(),
            Stage::Time => self.time_step(),
            Stage::Done => {}
        }
        self.stage
    }

    /// Iterate until `Done`.
    pub fn run(&mut self) -> SolveSummary {
        while self.iterate() != Stage::Done {}
        SolveSummary {
            stages: self.reports.clone(),
            validation: self.validation.clone().unwrap_or_default(),
        }
    }

    /// Flow and time of the finest level at sketch-space point `p` of sketch `k`.
    pub fn sample_at(&self, k: usize, p: Vector2<f64>) -> Option<(Vector2<f64>, f64)> {
        let layer = self.finest().get(k)?;
        let nh = query(layer, layer.to_grid(p), 1.0, &self.params.geom)?;
        let uv = nh.uv(layer);
        let n = uv.norm();
        let uv = if n > 0.0 { uv / n } else { uv };
        Some((uv, nh.t(layer)))
    }

    fn log_iteration(&self, what: &str, value: f64) {
        if self.params.verbose {
            info!(level = self.level, iter = self.iter, value, "{what}");
        } else {
            trace!(level = self.level, iter = self.iter, value, "{what}");
        }
    }

    fn enter_flow(&mut self) {
        let layers = &self.levels[self.level];
        self.link_groups = LinkGroup::build_all(layers);
        self.grouped = grouped_samples(&self.link_groups, layers);
        self.stage = Stage::Flow;
        self.iter = 0;
        self.residual = f64::INFINITY;
        self.last_unset = usize::MAX;
        debug!(level = self.level, groups = self.link_groups.len(), "flow stage");
    }

    fn flow_step(&mut self) {
        let layers = &mut self.levels[self.level];
        let sweep = flow_sweep(layers, &self.link_groups, &self.grouped, self.iter, &self.params);
        if sweep.unset > 0 && sweep.unset >= self.last_unset {
            let seeded = seed_unset(layers);
            debug!(level = self.level, seeded, "seeded unreachable flows");
        }
        self.last_unset = sweep.unset;
        self.iter += 1;
        self.residual = 1.0 - sweep.min_dp;
        self.log_iteration("flow sweep", sweep.min_dp);
        let tol = self.params.flow_tolerance(self.level);
        if sweep.unset == 0 && self.residual <= tol {
            self.finish_flow(true);
        } else if self.iter >= self.params.max_flow_iter {
            warn!(level = self.level, residual = self.residual, tol, "flow stage hit the iteration cap");
            self.finish_flow(false);
        }
    }

    fn finish_flow(&mut self, converged: bool) {
        let layers = &mut self.levels[self.level];
        for g in &self.link_groups {
            g.project_flow(layers);
        }
        self.reports.push(StageReport {
            level: self.level,
            stage: Stage::Flow,
            iterations: self.iter,
            converged,
            residual: self.residual,
        });
        self.enter_time();
    }

    fn enter_time(&mut self) {
        let layers = &mut self.levels[self.level];
        mark_openings(layers);
        self.dt_cache = DtCache::new(layers);
        self.time_groups = TimeGroups::build(layers, &self.params);
        pick_tref(layers);
        self.stage = Stage::Time;
        self.iter = 0;
        self.residual = f64::INFINITY;
        debug!(level = self.level, time_groups = self.time_groups.len(), "time stage");
    }

    fn time_step(&mut self) {
        let level = self.level;
        let layers = &mut self.levels[level];
        let pinned = level == 0 && !all_times_valid(layers);
        if pinned {
            seed_components(layers, &self.components);
        }
        let sweep = time_sweep(
            layers,
            &mut self.dt_cache,
            &mut self.time_groups,
            self.iter,
            &self.params,
            level,
            pinned,
        );
        self.time_groups.settle();
        let valid = all_times_valid(layers);
        if valid || level > 0 {
            let shift = recentre(layers);
            self.time_groups.shift(shift);
        }
        let r = self.params.time_stretch_range;
        let stretched = r <= 0.0 || stretch_within(layers, r, 1.0 / r);
        self.iter += 1;
        self.residual = if valid { sweep.max_dt } else { f64::INFINITY };
        self.log_iteration("time sweep", sweep.max_dt);

        let tol = self.params.time_tolerance(level);
        if valid && sweep.max_dt <= tol && stretched {
            self.finish_time(true);
        } else if self.iter >= self.params.max_time_iter {
            warn!(level, residual = self.residual, tol, missing = sweep.missing, "time stage hit the iteration cap");
            self.finish_time(false);
        }
    }

    fn finish_time(&mut self, converged: bool) {
        let level = self.level;
        self.reports.push(StageReport {
            level,
            stage: Stage::Time,
            iterations: self.iter,
            converged,
            residual: self.residual,
        });
        pick_tref(&mut self.levels[level]);
        if level < self.params.max_level {
            let (coarse, fine) = self.levels.split_at_mut(level + 1);
            let moved = upscale(&coarse[level], &mut fine[0], &self.params.geom);
            debug!(from = level, samples = moved, "upscaled");
            self.level += 1;
            self.enter_flow();
            return;
        }
        let layers = &mut self.levels[level];
        if self.params.invert_time {
            for layer in layers.iter_mut() {
                let refs: Vec<SampleRef> = (0..layer.inner().len())
                    .map(SampleRef::Inner)
                    .chain((0..layer.border().len()).map(SampleRef::Border))
                    .collect();
                for r in refs {
                    let t = layer.t(r);
                    layer.set_t(r, -t);
                }
            }
        }
        let report = validate(layers, &self.params);
        debug!(
            warnings = report.warnings().count(),
            errors = report.errors().count(),
            "solve done"
        );
        self.validation = Some(report);
        self.stage = Stage::Done;
        self.residual = 0.0;
    }
}
