//! Sketches, links, constraints and the owning `SketchSet`.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::segment::{Curve, CurvePoint, Segment};
use crate::error::{Error, Result};
use crate::geom2::{signed_area, Bbox2, Rot2};

/// Flattening tolerance (sketch units) used for areas and outlines.
const OUTLINE_TOL: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Cw,
    Ccw,
}

/// Rule relating the flows of paired samples across a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionType {
    #[default]
    Default,
    Aligned,
    Same,
    Reversed,
    Symmetric,
    Unrelated,
}

impl TransmissionType {
    /// `Default` resolves to `Aligned`, or to `Unrelated` when a seam
    /// constraint overlaps the link.
    #[inline]
    pub fn resolve(self, has_seam: bool) -> Self {
        match self {
            TransmissionType::Default if has_seam => TransmissionType::Unrelated,
            TransmissionType::Default => TransmissionType::Aligned,
            t => t,
        }
    }

    /// Pairwise merge used when folding the transmissions of a family.
    pub fn merge(self, other: Self) -> Self {
        use TransmissionType::*;
        let a = self.resolve(false);
        let b = other.resolve(false);
        if a == b {
            return a;
        }
        match (a, b) {
            (Unrelated, x) | (x, Unrelated) => x,
            (Aligned, _) | (_, Aligned) => Aligned,
            (Symmetric, x) | (x, Symmetric) => x,
            // Same with Reversed
            _ => Aligned,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Direction,
    Isoline,
    Seam,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintDir {
    Forward,
    Backward,
    /// Orientation left free: the flow is projected onto `±dir`.
    #[default]
    #[serde(rename = "none")]
    Unsigned,
}

impl ConstraintDir {
    #[inline]
    pub fn sign(self) -> Option<f64> {
        match self {
            ConstraintDir::Forward => Some(1.0),
            ConstraintDir::Backward => Some(-1.0),
            ConstraintDir::Unsigned => None,
        }
    }
}

/// User constraint on a curve inside (or on the boundary of) a sketch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub curve: Curve,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    #[serde(default)]
    pub dir: ConstraintDir,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Constraint {
    pub fn new(curve: Curve, kind: ConstraintType, dir: ConstraintDir, weight: f64) -> Self {
        Self {
            curve,
            kind,
            dir,
            weight: weight.clamp(0.0, 1.0),
        }
    }

    /// Whether this constraint implies a flow direction.
    #[inline]
    pub fn is_directional(&self) -> bool {
        !matches!(self.kind, ConstraintType::Seam)
    }
}

/// Link from one boundary segment to a segment of a peer sketch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub target_sketch: usize,
    pub target_segment: usize,
    /// Whether the target segment runs in the opposite parametric direction.
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub transmission: TransmissionType,
}

impl Link {
    /// Parameter on the target segment matching `alpha` on this one.
    #[inline]
    pub fn linked_time(&self, alpha: f64) -> f64 {
        if self.inverted {
            1.0 - alpha
        } else {
            alpha
        }
    }

    #[inline]
    pub fn resolve_transmission_type(&self, has_seam: bool) -> TransmissionType {
        self.transmission.resolve(has_seam)
    }

    #[inline]
    pub fn has_transmission(&self, has_seam: bool) -> bool {
        self.resolve_transmission_type(has_seam) != TransmissionType::Unrelated
    }
}

/// One closed outline with links and constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sketch {
    #[serde(default)]
    pub name: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default)]
    pub links: Vec<Option<Link>>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Sketch {
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> Self {
        let n = segments.len();
        Self {
            name: name.into(),
            segments,
            mirror_x: false,
            links: vec![None; n],
            constraints: Vec::new(),
        }
    }

    /// Closed polygon sketch through `pts` (last point connects back to first).
    pub fn from_polygon(name: impl Into<String>, pts: &[Vector2<f64>]) -> Self {
        let n = pts.len();
        let segs = (0..n)
            .map(|i| Segment::line(pts[i], pts[(i + 1) % n]))
            .collect();
        Self::new(name, segs)
    }

    pub fn with_constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    #[inline]
    pub fn seg_count(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn segment(&self, i: usize) -> &Segment {
        &self.segments[i]
    }

    #[inline]
    pub fn get_link(&self, seg: usize) -> Option<&Link> {
        self.links.get(seg).and_then(|l| l.as_ref())
    }

    /// Flattened closed outline in sketch space (no repeated endpoint).
    pub fn outline(&self, tol: f64) -> Vec<Vector2<f64>> {
        let mut out = Vec::new();
        for s in &self.segments {
            s.flatten_into(tol, &mut out);
        }
        out
    }

    pub fn signed_area(&self) -> f64 {
        signed_area(&self.outline(OUTLINE_TOL))
    }

    /// Orientation of the outline as drawn in sketch space.
    pub fn local_orientation(&self) -> Orientation {
        if self.signed_area() >= 0.0 {
            Orientation::Ccw
        } else {
            Orientation::Cw
        }
    }

    /// Orientation after applying the X mirror.
    pub fn orientation(&self) -> Orientation {
        match (self.local_orientation(), self.mirror_x) {
            (o, false) => o,
            (Orientation::Ccw, true) => Orientation::Cw,
            (Orientation::Cw, true) => Orientation::Ccw,
        }
    }

    /// Whether the left normal of the traversal points inward in the layer
    /// frame (i.e. the mirrored outline runs counter-clockwise).
    #[inline]
    pub fn is_inward(&self) -> bool {
        self.orientation() == Orientation::Ccw
    }

    #[inline]
    fn mirror(&self, v: Vector2<f64>, mirror_corrected: bool) -> Vector2<f64> {
        if mirror_corrected && self.mirror_x {
            Vector2::new(-v.x, v.y)
        } else {
            v
        }
    }

    /// Unit tangent of segment `seg` at `alpha`.
    pub fn tangent(&self, seg: usize, alpha: f64, mirror_corrected: bool) -> Vector2<f64> {
        self.mirror(self.segments[seg].derivative(alpha, true), mirror_corrected)
    }

    /// Unit inward normal of segment `seg` at `alpha`.
    ///
    /// Flattens the outline to find its orientation; loops over many samples
    /// should compute [`Sketch::local_orientation`] once and call
    /// [`Sketch::normal_with`].
    pub fn normal(&self, seg: usize, alpha: f64, mirror_corrected: bool) -> Vector2<f64> {
        self.normal_with(self.local_orientation(), seg, alpha, mirror_corrected)
    }

    /// [`Sketch::normal`] for a known local orientation.
    pub fn normal_with(
        &self,
        local: Orientation,
        seg: usize,
        alpha: f64,
        mirror_corrected: bool,
    ) -> Vector2<f64> {
        let t = self.segments[seg].derivative(alpha, true);
        let left = Vector2::new(-t.y, t.x);
        let n = match local {
            Orientation::Ccw => left,
            Orientation::Cw => -left,
        };
        self.mirror(n, mirror_corrected)
    }

    pub fn bbox(&self) -> Bbox2 {
        Bbox2::from_points(&self.outline(OUTLINE_TOL))
    }

    /// Segments whose bounding box lies within `radius` of `p`, with the
    /// projection of `p` when `with_data` is set (otherwise only the index and
    /// a coarse bbox distance of zero).
    pub fn nearby_segments(
        &self,
        p: Vector2<f64>,
        radius: f64,
        with_data: bool,
    ) -> Vec<(usize, Option<CurvePoint>)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.bbox().expanded(radius).contains(p))
            .filter_map(|(i, s)| {
                if with_data {
                    let cp = s.project(p);
                    (cp.dist <= radius).then_some((i, Some(cp)))
                } else {
                    Some((i, None))
                }
            })
            .collect()
    }

    /// Closest boundary point over all segments.
    pub fn project(&self, p: Vector2<f64>) -> Option<(usize, CurvePoint)> {
        Curve {
            segments: self.segments.clone(),
        }
        .project(p)
    }
}

/// Owner of all sketches of a scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SketchSet {
    pub sketches: Vec<Sketch>,
}

impl SketchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sketch; returns its index.
    pub fn add(&mut self, mut sketch: Sketch) -> usize {
        sketch.links.resize(sketch.segments.len(), None);
        self.sketches.push(sketch);
        self.sketches.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> &Sketch {
        &self.sketches[i]
    }

    /// Link `(a, seg_a)` with `(b, seg_b)` in both directions.
    pub fn link(
        &mut self,
        a: usize,
        seg_a: usize,
        b: usize,
        seg_b: usize,
        inverted: bool,
        transmission: TransmissionType,
    ) -> Result<()> {
        for (s, seg) in [(a, seg_a), (b, seg_b)] {
            let sk = self
                .sketches
                .get(s)
                .ok_or_else(|| Error::invalid(format!("no sketch {s}")))?;
            if seg >= sk.segments.len() {
                return Err(Error::invalid(format!(
                    "sketch {s} has no segment {seg} ({} segments)",
                    sk.segments.len()
                )));
            }
        }
        self.sketches[a].links[seg_a] = Some(Link {
            target_sketch: b,
            target_segment: seg_b,
            inverted,
            transmission,
        });
        self.sketches[b].links[seg_b] = Some(Link {
            target_sketch: a,
            target_segment: seg_a,
            inverted,
            transmission,
        });
        Ok(())
    }

    /// Structural checks: link arity, link targets and reciprocity.
    pub fn validate(&self) -> Result<()> {
        for (si, sk) in self.sketches.iter().enumerate() {
            if sk.segments.is_empty() {
                return Err(Error::invalid(format!("sketch {si} has no segments")));
            }
            if sk.links.len() != sk.segments.len() {
                return Err(Error::invalid(format!(
                    "sketch {si}: {} links for {} segments",
                    sk.links.len(),
                    sk.segments.len()
                )));
            }
            for (seg, l) in sk.links.iter().enumerate() {
                let Some(l) = l else { continue };
                let back = self
                    .sketches
                    .get(l.target_sketch)
                    .and_then(|t| t.get_link(l.target_segment))
                    .ok_or_else(|| {
                        Error::invalid(format!("sketch {si} segment {seg}: dangling link"))
                    })?;
                if back.target_sketch != si || back.target_segment != seg {
                    return Err(Error::invalid(format!(
                        "sketch {si} segment {seg}: link is not reciprocal"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Length of the segment linked to `(sketch, seg)`, if any.
    pub fn linked_segment_length(&self, sketch: usize, seg: usize) -> Option<f64> {
        let l = self.sketches[sketch].get_link(seg)?;
        Some(self.sketches[l.target_sketch].segments[l.target_segment].length())
    }

    /// Whether any sketch carries a direction-implying constraint.
    pub fn has_directional_constraint(&self) -> bool {
        self.sketches
            .iter()
            .any(|s| s.constraints.iter().any(|c| c.is_directional()))
    }

    /// Rotation taking the linked tangent onto this tangent at `(sketch, seg, alpha)`,
    /// both mirror-corrected. The target tangent is negated for inverted links.
    pub fn link_rotation(&self, sketch: usize, seg: usize, alpha: f64) -> Option<Rot2> {
        let l = self.sketches[sketch].get_link(seg)?;
        let this_t = self.sketches[sketch].tangent(seg, alpha, true);
        let mut tgt_t =
            self.sketches[l.target_sketch].tangent(l.target_segment, l.linked_time(alpha), true);
        if l.inverted {
            tgt_t = -tgt_t;
        }
        Some(Rot2::between(tgt_t, this_t))
    }

    /// Sketch indices grouped by link connectivity.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.sketches.len();
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], x: usize) -> usize {
            if parent[x] != x {
                parent[x] = find(parent, parent[x]);
            }
            parent[x]
        }
        for (si, sk) in self.sketches.iter().enumerate() {
            for l in sk.links.iter().flatten() {
                if l.target_sketch < n {
                    let a = find(&mut parent, si);
                    let b = find(&mut parent, l.target_sketch);
                    if a != b {
                        parent[a.max(b)] = a.min(b);
                    }
                }
            }
        }
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot = vec![usize::MAX; n];
        for i in 0..n {
            let r = find(&mut parent, i);
            if slot[r] == usize::MAX {
                slot[r] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot[r]].push(i);
        }
        groups
    }
}
