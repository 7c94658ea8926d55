//! Adapters for the external transfer planner, sampling optimizers and
//! geodesic solver.
//!
//! The services themselves are opaque; this module fixes their call shapes
//! as traits and checks inputs before they cross the boundary. Misuse is
//! reported as `Error::InvalidArgument`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Needle bed; the upper-case beds are the slider rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bed {
    Front,
    Back,
    FrontSlider,
    BackSlider,
}

impl Bed {
    pub fn from_char(c: char) -> Result<Bed> {
        match c {
            'f' => Ok(Bed::Front),
            'b' => Ok(Bed::Back),
            'F' => Ok(Bed::FrontSlider),
            'B' => Ok(Bed::BackSlider),
            _ => Err(Error::invalid(format!("invalid needle side {c:?}"))),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Bed::Front => 'f',
            Bed::Back => 'b',
            Bed::FrontSlider => 'F',
            Bed::BackSlider => 'B',
        }
    }

    #[inline]
    pub fn is_slider(self) -> bool {
        matches!(self, Bed::FrontSlider | Bed::BackSlider)
    }

    #[inline]
    pub fn is_front(self) -> bool {
        matches!(self, Bed::Front | Bed::FrontSlider)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Needle {
    pub bed: Bed,
    pub offset: i32,
}

impl Needle {
    pub fn new(bed: Bed, offset: i32) -> Self {
        Self { bed, offset }
    }

    /// Needle from its `(side, offset)` wire form.
    pub fn parse(side: char, offset: i32) -> Result<Needle> {
        Ok(Self::new(Bed::from_char(side)?, offset))
    }
}

impl fmt::Display for Needle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bed.as_char(), self.offset)
    }
}

/// Allowed stitch slack, for all pairs or per pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slack {
    Uniform(u32),
    PerPair(Vec<u32>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferOptions {
    pub slack: Slack,
    pub max_racking: u32,
    #[serde(default)]
    pub min_free: Option<i32>,
    #[serde(default)]
    pub max_free: Option<i32>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            slack: Slack::Uniform(2),
            max_racking: 4,
            min_free: None,
            max_free: None,
        }
    }
}

/// Transfer plan: ordered `(from, to)` moves.
pub type TransferPlan = Vec<(Needle, Needle)>;

pub trait TransferPlanner {
    /// Plan moving loops from `from[i]` to `to[i]`; `None` when infeasible.
    fn plan(&self, from: &[Needle], to: &[Needle], opts: &TransferOptions) -> Option<TransferPlan>;
}

/// Check a transfer request before handing it to a planner.
pub fn check_transfer(from: &[Needle], to: &[Needle], opts: &TransferOptions) -> Result<()> {
    if from.len() != to.len() {
        return Err(Error::invalid(format!(
            "transfer needs matching lists, got {} sources and {} targets",
            from.len(),
            to.len()
        )));
    }
    if let Slack::PerPair(s) = &opts.slack {
        if s.len() != from.len() {
            return Err(Error::invalid(format!(
                "slack has {} entries for {} loops",
                s.len(),
                from.len()
            )));
        }
    }
    if let (Some(lo), Some(hi)) = (opts.min_free, opts.max_free) {
        if lo > hi {
            return Err(Error::invalid(format!("free range [{lo}, {hi}] is empty")));
        }
    }
    Ok(())
}

/// Planner wrapper that checks requests and plans.
#[derive(Clone, Debug, Default)]
pub struct CheckedPlanner<P> {
    pub inner: P,
}

impl<P: TransferPlanner> CheckedPlanner<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// Errors on malformed requests and on plans that leave a loop behind.
    pub fn plan(
        &self,
        from: &[Needle],
        to: &[Needle],
        opts: &TransferOptions,
    ) -> Result<Option<TransferPlan>> {
        check_transfer(from, to, opts)?;
        let Some(plan) = self.inner.plan(from, to, opts) else {
            return Ok(None);
        };
        // every source must end at its target
        for (f, t) in from.iter().zip(to) {
            let mut at = *f;
            for (a, b) in &plan {
                if *a == at {
                    at = *b;
                }
            }
            if at != *t {
                return Err(Error::invalid(format!("plan leaves the loop of {f} at {at}, not {t}")));
            }
        }
        Ok(Some(plan))
    }
}

/// Input of a local or global sampling optimization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Per-edge costs.
    pub cdata: Vec<f64>,
    /// Global mode: per-edge widths and the node of every edge.
    #[serde(default)]
    pub wdata: Option<Vec<f64>>,
    #[serde(default)]
    pub nodes: Option<Vec<usize>>,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub weights: Vec<f64>,
    /// Algorithm options passed through untouched.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl OptimizeRequest {
    /// Whether this is a global (multi-node) request.
    pub fn is_global(&self) -> bool {
        self.wdata.is_some()
    }

    pub fn check(&self) -> Result<()> {
        let n = self.cdata.len();
        if self.start > self.end || self.end > n {
            return Err(Error::invalid(format!(
                "range {}..{} is outside {n} edges",
                self.start, self.end
            )));
        }
        match (&self.wdata, &self.nodes) {
            (Some(w), Some(nodes)) => {
                if w.len() != n || nodes.len() != n {
                    return Err(Error::invalid("wdata and nodes must match cdata"));
                }
            }
            (None, None) => {}
            _ => return Err(Error::invalid("wdata and nodes go together")),
        }
        if self.cdata.iter().chain(&self.weights).any(|v| !v.is_finite()) {
            return Err(Error::invalid("non-finite optimization data"));
        }
        Ok(())
    }
}

pub trait SamplingOptimizer {
    /// One value per edge in `start..end`.
    fn optimize(&self, req: &OptimizeRequest) -> Vec<f64>;
}

/// Check the request, run the optimizer and check the answer length.
pub fn optimize_checked<O: SamplingOptimizer + ?Sized>(opt: &O, req: &OptimizeRequest) -> Result<Vec<f64>> {
    req.check()?;
    let out = opt.optimize(req);
    let expected = req.end - req.start;
    if out.len() != expected {
        return Err(Error::invalid(format!(
            "optimizer returned {} values for {expected} edges",
            out.len()
        )));
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatOptions {
    /// Time step factor applied to the squared mean edge length.
    pub time_factor: f64,
}

impl Default for HeatOptions {
    fn default() -> Self {
        Self { time_factor: 1.0 }
    }
}

/// Triangle mesh handed to a geodesic solver: faces and their three edge
/// lengths (edge `k` is opposite vertex `k`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeodesicMesh {
    pub faces: Vec<[usize; 3]>,
    pub edges: Vec<[f64; 3]>,
    pub num_vertices: usize,
}

impl GeodesicMesh {
    pub fn new(faces: Vec<[usize; 3]>, edges: Vec<[f64; 3]>) -> Result<GeodesicMesh> {
        if faces.len() != edges.len() {
            return Err(Error::invalid(format!(
                "{} faces but {} edge triples",
                faces.len(),
                edges.len()
            )));
        }
        let num_vertices = faces.iter().flatten().max().map_or(0, |&m| m + 1);
        for (i, (f, e)) in faces.iter().zip(&edges).enumerate() {
            if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
                return Err(Error::invalid(format!("face {i} repeats a vertex: {f:?}")));
            }
            if e.iter().any(|l| !(l.is_finite() && *l > 0.0)) {
                return Err(Error::invalid(format!("face {i} has a bad edge length: {e:?}")));
            }
        }
        Ok(Self {
            faces,
            edges,
            num_vertices,
        })
    }
}

pub trait GeodesicSolver {
    fn precompute(&mut self, mesh: &GeodesicMesh, opts: &HeatOptions) -> Result<()>;
    /// Distance of every vertex to `src`.
    fn distances_to(&self, src: usize) -> Vec<f64>;
}

/// Geodesic solver wrapper that checks sources and answer sizes.
#[derive(Clone, Debug, Default)]
pub struct CheckedGeodesic<G> {
    pub inner: G,
    num_vertices: usize,
}

impl<G: GeodesicSolver> CheckedGeodesic<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            num_vertices: 0,
        }
    }

    pub fn precompute(&mut self, mesh: &GeodesicMesh, opts: &HeatOptions) -> Result<()> {
        self.inner.precompute(mesh, opts)?;
        self.num_vertices = mesh.num_vertices;
        Ok(())
    }

    pub fn distances_to(&self, src: usize) -> Result<Vec<f64>> {
        if src >= self.num_vertices {
            return Err(Error::invalid(format!(
                "source {src} outside {} vertices",
                self.num_vertices
            )));
        }
        let d = self.inner.distances_to(src);
        if d.len() != self.num_vertices {
            return Err(Error::invalid(format!(
                "solver returned {} distances for {} vertices",
                d.len(),
                self.num_vertices
            )));
        }
        Ok(d)
    }
}
