//! Post-solve checks on flow and time.

use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::params::SolverParams;
use super::time::time_stretch;
use crate::mesh::{InnerKind, MeshLayer, SampleKey, SampleRef};

/// Tolerance for time comparisons.
const TIME_EPS: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FlowChangesTooFast,
    TimeStretchPeaks,
    TwoRegionsWithoutIsoline,
    OpposingFlows,
    LargeInteriorRotation,
    LocalTimeExtrema,
    FamilyTimeMismatch,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::FlowChangesTooFast
            | IssueKind::TimeStretchPeaks
            | IssueKind::TwoRegionsWithoutIsoline => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            IssueKind::FlowChangesTooFast => "Flow changes too fast",
            IssueKind::TimeStretchPeaks => "Time stretch peaks",
            IssueKind::TwoRegionsWithoutIsoline => "Two regions without isoline in between",
            IssueKind::OpposingFlows => "Two opposing flows do not merge",
            IssueKind::LargeInteriorRotation => "Large interior flow rotation",
            IssueKind::LocalTimeExtrema => "Local internal time extrema",
            IssueKind::FamilyTimeMismatch => "Sample has different time from vertex",
        };
        f.write_str(msg)
    }
}

/// One finding, located at a sample when it has one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub layer: usize,
    pub sample: Option<SampleRef>,
    /// Sketch-space position of the finding.
    pub position: Option<Vector2<f64>>,
    /// Offending measurement (dot product, curl, stretch, time gap, region count).
    pub value: f64,
}

impl Issue {
    #[inline]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} (layer {}", self.severity(), self.kind, self.layer)?;
        if let Some(p) = self.position {
            write!(f, " at ({:.4}, {:.4})", p.x, p.y)?;
        }
        write!(f, ", value {:.4})", self.value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn count_in_layer(&self, layer: usize, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|i| i.layer == layer && i.severity() == severity)
            .count()
    }

    /// No pipeline-critical findings.
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    fn push(&mut self, layer: &MeshLayer, kind: IssueKind, sample: Option<SampleRef>, value: f64) {
        self.issues.push(Issue {
            kind,
            layer: layer.index,
            sample,
            position: sample.map(|r| layer.sketch_pos(r)),
            value,
        });
    }
}

/// Circulation of the flow around the unit grid quad with corner `(x, y)`.
pub fn quad_curl(layer: &MeshLayer, quad: [usize; 4]) -> f64 {
    let refs = quad.map(SampleRef::Inner);
    let mut c = 0.0;
    for k in 0..4 {
        let a = refs[k];
        let b = refs[(k + 1) % 4];
        let edge = layer.pos(b) - layer.pos(a);
        c += 0.5 * (layer.uv(a) + layer.uv(b)).dot(&edge);
    }
    c
}

/// Check the solved fields of one level.
pub fn validate(layers: &[MeshLayer], params: &SolverParams) -> ValidationReport {
    let mut report = ValidationReport::default();
    let (lo, hi) = if params.time_stretch_range > 0.0 {
        (params.time_stretch_range, 1.0 / params.time_stretch_range)
    } else {
        (0.5, 2.0)
    };
    for (li, layer) in layers.iter().enumerate() {
        let refs: Vec<SampleRef> = (0..layer.inner().len())
            .map(SampleRef::Inner)
            .chain((0..layer.border().len()).map(SampleRef::Border))
            .collect();

        for &r in &refs {
            let uv = layer.uv(r);
            let mut fast = 0;
            for n in layer.neighbors(r) {
                let dot = uv.dot(&layer.uv(n.sample));
                if dot < params.flow_change_threshold {
                    fast += 1;
                }
                if r >= n.sample {
                    continue;
                }
                if let (Some(ri), Some(ni)) = (r.border(), n.sample.border()) {
                    if layer.border_sample(ri).edge_open_towards(ni) {
                        continue;
                    }
                }
                if dot <= 0.0 && layer.seam_weight(r) <= 0.0 && layer.seam_weight(n.sample) <= 0.0 {
                    report.push(layer, IssueKind::OpposingFlows, Some(r), dot);
                }
            }
            if fast >= 2 {
                report.push(layer, IssueKind::FlowChangesTooFast, Some(r), fast as f64);
            }
        }

        for (i, s) in layer.inner().iter().enumerate() {
            let r = SampleRef::Inner(i);
            if s.kind == InnerKind::Regular {
                if let Some(quad) = layer.full_quad(s.x as i64, s.y as i64) {
                    let seamed = quad
                        .iter()
                        .any(|&q| layer.seam_weight(SampleRef::Inner(q)) > 0.0);
                    let curl = quad_curl(layer, quad);
                    if !seamed && curl.abs() >= params.curl_threshold {
                        report.push(layer, IssueKind::LargeInteriorRotation, Some(r), curl);
                    }
                }
                if let Some(st) = time_stretch(layer, r) {
                    if !(lo..=hi).contains(&st) {
                        report.push(layer, IssueKind::TimeStretchPeaks, Some(r), st);
                    }
                }
            }
            let t = layer.t(r);
            if !t.is_finite() {
                continue;
            }
            let ts: Vec<f64> = layer
                .neighbors(r)
                .iter()
                .map(|n| layer.t(n.sample))
                .filter(|t| t.is_finite())
                .collect();
            if ts.len() >= 3 {
                let below = ts.iter().all(|&tn| t < tn - TIME_EPS);
                let above = ts.iter().all(|&tn| t > tn + TIME_EPS);
                if below || above {
                    report.push(layer, IssueKind::LocalTimeExtrema, Some(r), t);
                }
            }
        }

        for (bi, b) in layer.border().iter().enumerate() {
            let key = SampleKey::border(li, bi);
            if b.vertex_open || b.vertex == key {
                continue;
            }
            let Some(vi) = b.vertex.sample.border() else {
                continue;
            };
            let Some(vl) = layers.get(b.vertex.layer) else {
                continue;
            };
            if vl.border_sample(vi).vertex_open {
                continue;
            }
            let gap = (layer.t(SampleRef::Border(bi)) - vl.t(SampleRef::Border(vi))).abs();
            if gap > TIME_EPS {
                report.push(layer, IssueKind::FamilyTimeMismatch, Some(SampleRef::Border(bi)), gap);
            }
        }

        let regions = layer.region_count();
        if regions >= 2 && !layer.has_isoline() {
            report.push(layer, IssueKind::TwoRegionsWithoutIsoline, None, regions as f64);
        }
    }
    report
}
