//! Sample records and identifiers of a mesh layer.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::geom2::Rot2;
use crate::sketch::{ConstraintType, TransmissionType};

/// Curvature channel.
pub const K: usize = 0;
/// Flow x channel.
pub const U: usize = 1;
/// Flow y channel.
pub const V: usize = 2;
/// Time channel.
pub const T: usize = 3;
/// Channels per sample in the packed field arrays.
pub const CHANNELS: usize = 4;

/// Index of a sample inside one layer.
///
/// Inner samples (regular and intermediate) and border samples live in two
/// separate arrays; the variant says which.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum SampleRef {
    Inner(usize),
    Border(usize),
}

impl SampleRef {
    #[inline]
    pub fn is_border(self) -> bool {
        matches!(self, SampleRef::Border(_))
    }

    #[inline]
    pub fn border(self) -> Option<usize> {
        match self {
            SampleRef::Border(i) => Some(i),
            SampleRef::Inner(_) => None,
        }
    }
}

/// Sample identifier across the layers of one level. Orders by layer first,
/// which gives the canonical "smallest id" used for family vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleKey {
    pub layer: usize,
    pub sample: SampleRef,
}

impl SampleKey {
    #[inline]
    pub fn new(layer: usize, sample: SampleRef) -> Self {
        Self { layer, sample }
    }

    #[inline]
    pub fn border(layer: usize, index: usize) -> Self {
        Self::new(layer, SampleRef::Border(index))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InnerKind {
    /// Full 4-neighborhood on the grid.
    #[default]
    Regular,
    /// Bridges the grid to the border through explicit triangle neighbors.
    Intermediate,
}

/// Constraint attached to one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintData {
    /// Index into the sketch's constraint list.
    pub curve: usize,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    /// Project the neighborhood flow onto `±dir` instead of imposing `dir`.
    pub project: bool,
    /// Weight after distance decay.
    pub weight: f64,
    /// Unit direction in the grid frame (`None` for seams).
    pub dir: Option<Vector2<f64>>,
    /// Projection of the sample onto the curve, in grid coordinates.
    pub layer_pos: Vector2<f64>,
    /// Distance to the curve in grid units.
    pub layer_dist: f64,
    /// Signed time offset to the isoline; NaN until computed.
    #[serde(with = "crate::mesh::persist::nan_as_null")]
    pub dt: f64,
}

/// One entry of a border sample's link set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub target: SampleKey,
    /// Parameter on the target's segment.
    pub alpha: f64,
    /// Maps the target's flow into this sample's frame: `uv_self ≈ rotation · uv_target`.
    pub rotation: Rot2,
    pub transmission: TransmissionType,
}

/// Interior sample at an integer grid position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InnerSample {
    pub x: usize,
    pub y: usize,
    pub kind: InnerKind,
    /// Explicit inner neighbors beyond the 4-grid (intermediates only).
    #[serde(default)]
    pub inner_nbrs: Vec<usize>,
    #[serde(default)]
    pub border_nbrs: Vec<usize>,
    #[serde(default)]
    pub constraints: Vec<ConstraintData>,
    #[serde(default)]
    pub seam_weight: f64,
    /// Seam-separated region id.
    #[serde(default)]
    pub region: u32,
}

impl InnerSample {
    #[inline]
    pub fn pos(&self) -> Vector2<f64> {
        Vector2::new(self.x as f64, self.y as f64)
    }

    #[inline]
    pub fn is_intermediate(&self) -> bool {
        self.kind == InnerKind::Intermediate
    }
}

/// Sample on the sketch boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorderSample {
    /// `(segment, alpha)`; corners carry their previous segment at `alpha = 1` second.
    pub segs: Vec<(usize, f64)>,
    /// Position along the ring.
    pub data_index: usize,
    /// Position within its primary segment.
    pub delta_index: usize,
    pub prev: usize,
    pub next: usize,
    pub grid_pos: Vector2<f64>,
    pub sketch_pos: Vector2<f64>,
    /// Unit tangent in the grid frame.
    pub tangent: Vector2<f64>,
    /// Unit inward normal in the grid frame.
    pub normal: Vector2<f64>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub direct_link_count: usize,
    #[serde(default)]
    pub self_link: bool,
    pub vertex: SampleKey,
    #[serde(default)]
    pub prev_open: bool,
    #[serde(default)]
    pub next_open: bool,
    #[serde(default)]
    pub vertex_open: bool,
    #[serde(default)]
    pub inner_nbrs: Vec<usize>,
    #[serde(default)]
    pub border_nbrs: Vec<usize>,
    #[serde(default)]
    pub constraints: Vec<ConstraintData>,
    #[serde(default)]
    pub seam_weight: f64,
    #[serde(default)]
    pub region: u32,
}

impl BorderSample {
    #[inline]
    pub fn segment(&self) -> usize {
        self.segs[0].0
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.segs[0].1
    }

    #[inline]
    pub fn is_corner(&self) -> bool {
        self.segs.len() > 1
    }

    /// Direct entries followed by the indirect closure.
    #[inline]
    pub fn direct_links(&self) -> &[LinkEntry] {
        &self.links[..self.direct_link_count.min(self.links.len())]
    }

    #[inline]
    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }

    /// Whether the ring edge toward `other` is open.
    #[inline]
    pub fn edge_open_towards(&self, other: usize) -> bool {
        (other == self.prev && self.prev_open) || (other == self.next && self.next_open)
    }
}

/// Adjacency entry: a neighbor and its grid distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub sample: SampleRef,
    pub dist: f64,
}
