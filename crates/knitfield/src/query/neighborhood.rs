use nalgebra::Vector2;

use crate::geom2::Rot2;
use crate::mesh::{MeshLayer, SampleKey, SampleRef};

/// How a neighborhood was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborhoodKind {
    Vertex,
    Edge,
    Triangle,
    Quad,
    /// Boundary projection or nearest-sample fallback.
    Projection,
}

/// Weighted samples around a query point.
///
/// Faces are counter-clockwise. `rotations[i]` maps sample `i`'s flow into
/// the frame of `base` (identity unless the two are link partners).
#[derive(Clone, Debug, PartialEq)]
pub struct SampleNeighborhood {
    pub kind: NeighborhoodKind,
    pub samples: Vec<SampleRef>,
    pub weights: Vec<f64>,
    pub rotations: Vec<Rot2>,
    pub base: SampleRef,
}

impl SampleNeighborhood {
    pub(crate) fn new(
        layer: &MeshLayer,
        kind: NeighborhoodKind,
        samples: Vec<SampleRef>,
        weights: Vec<f64>,
    ) -> Self {
        let mut base = samples[0];
        let mut best = f64::NEG_INFINITY;
        for (s, w) in samples.iter().zip(&weights) {
            if *w > best {
                best = *w;
                base = *s;
            }
        }
        let rotations = samples
            .iter()
            .map(|&s| partner_rotation(layer, base, s))
            .collect();
        Self {
            kind,
            samples,
            weights,
            rotations,
            base,
        }
    }

    pub(crate) fn single(layer: &MeshLayer, kind: NeighborhoodKind, s: SampleRef) -> Self {
        Self::new(layer, kind, vec![s], vec![1.0])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Rotation-compensated weighted flow (not normalized).
    pub fn uv(&self, layer: &MeshLayer) -> Vector2<f64> {
        self.samples
            .iter()
            .zip(&self.weights)
            .zip(&self.rotations)
            .fold(Vector2::zeros(), |acc, ((&s, &w), r)| {
                acc + r.apply(layer.uv(s)) * w
            })
    }

    /// Weighted time over samples that have one; NaN when none does.
    pub fn t(&self, layer: &MeshLayer) -> f64 {
        let mut sum = 0.0;
        let mut wsum = 0.0;
        for (&s, &w) in self.samples.iter().zip(&self.weights) {
            let t = layer.t(s);
            if t.is_finite() {
                sum += w * t;
                wsum += w;
            }
        }
        if wsum > 0.0 {
            sum / wsum
        } else {
            f64::NAN
        }
    }
}

/// Rotation of `other` into `base`'s frame when both are linked border
/// samples of the same layer.
fn partner_rotation(layer: &MeshLayer, base: SampleRef, other: SampleRef) -> Rot2 {
    let (Some(bi), Some(_)) = (base.border(), other.border()) else {
        return Rot2::IDENTITY;
    };
    let key = SampleKey::new(layer.index, other);
    layer
        .border_sample(bi)
        .links
        .iter()
        .find(|e| e.target == key)
        .map(|e| e.rotation)
        .unwrap_or(Rot2::IDENTITY)
}
