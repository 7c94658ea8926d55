//! Transmission groups: flow projection over linked families.

use nalgebra::Vector2;
use tracing::{debug, warn};

use crate::geom2::Rot2;
use crate::link::{family, FamilyMember};
use crate::mesh::{MeshLayer, SampleKey, SampleRef};
use crate::sketch::TransmissionType;

/// Fold link transmissions into one group law. `None` for no input.
///
/// Each item is one link (a pair of samples); symmetric links from more than
/// one pair are ambiguous and fall back to `Aligned`.
pub fn merge_transmissions<I>(links: I) -> Option<TransmissionType>
where
    I: IntoIterator<Item = TransmissionType>,
{
    let mut symmetric = 0usize;
    let mut acc: Option<TransmissionType> = None;
    for t in links {
        let t = t.resolve(false);
        if t == TransmissionType::Symmetric {
            symmetric += 1;
        }
        acc = Some(match acc {
            None => t,
            Some(a) => a.merge(t),
        });
    }
    if symmetric > 1 && acc == Some(TransmissionType::Symmetric) {
        warn!(links = symmetric, "symmetric transmission over several links; using aligned");
        return Some(TransmissionType::Aligned);
    }
    acc
}

/// One family under a transmission law, rooted at its vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkGroup {
    pub root: SampleKey,
    /// Root first; rotations map member flows into the root frame.
    pub members: Vec<FamilyMember>,
    pub kind: TransmissionType,
    /// Inward normal of the root, in its grid frame.
    pub inner_normal: Vector2<f64>,
}

impl LinkGroup {
    /// Group for family root `root`, or `None` for singletons and unrelated links.
    pub fn for_root(layers: &[MeshLayer], root: SampleKey) -> Option<LinkGroup> {
        let bi = root.sample.border()?;
        let members = family(layers, root);
        if members.len() < 2 {
            return None;
        }
        // every direct link of the family once, keyed by its unordered pair
        let mut pairs: Vec<(SampleKey, SampleKey, TransmissionType)> = Vec::new();
        for m in &members {
            let Some(mi) = m.key.sample.border() else {
                continue;
            };
            for e in layers[m.key.layer].border_sample(mi).direct_links() {
                let (a, b) = if m.key < e.target {
                    (m.key, e.target)
                } else {
                    (e.target, m.key)
                };
                if !pairs.iter().any(|p| p.0 == a && p.1 == b) {
                    pairs.push((a, b, e.transmission));
                }
            }
        }
        let mut kind = merge_transmissions(pairs.iter().map(|p| p.2))?;
        match kind {
            TransmissionType::Unrelated => return None,
            TransmissionType::Reversed | TransmissionType::Symmetric if members.len() != 2 => {
                debug!(?root, ?kind, arity = members.len(), "transmission needs two members; using aligned");
                kind = TransmissionType::Aligned;
            }
            _ => {}
        }
        Some(LinkGroup {
            root,
            inner_normal: layers[root.layer].border_sample(bi).normal,
            members,
            kind,
        })
    }

    /// Groups of every family root of the level.
    pub fn build_all(layers: &[MeshLayer]) -> Vec<LinkGroup> {
        let mut out = Vec::new();
        for (li, layer) in layers.iter().enumerate() {
            for (bi, b) in layer.border().iter().enumerate() {
                let key = SampleKey::border(li, bi);
                if b.has_links() && b.vertex == key {
                    out.extend(Self::for_root(layers, key));
                }
            }
        }
        out
    }

    /// Whether `key` belongs to this group.
    pub fn contains(&self, key: SampleKey) -> bool {
        self.members.iter().any(|m| m.key == key)
    }

    /// Inactive when a member is pinned by its constraints.
    pub fn is_active(&self, layers: &[MeshLayer]) -> bool {
        self.members
            .iter()
            .all(|m| layers[m.key.layer].constraint_weight(m.key.sample) < 1.0)
    }

    fn uv(layers: &[MeshLayer], m: &FamilyMember) -> Vector2<f64> {
        m.rotation.apply(layers[m.key.layer].uv(m.key.sample))
    }

    /// Project member flows onto the group law and write them back.
    pub fn project_flow(&self, layers: &mut [MeshLayer]) {
        if !self.is_active(layers) {
            return;
        }
        let uvs: Vec<Vector2<f64>> = self.members.iter().map(|m| Self::uv(layers, m)).collect();
        let Some(reference) = uvs.iter().copied().find(|u| u.norm() > 1e-6) else {
            return;
        };
        let targets: Vec<Vector2<f64>> = match self.kind {
            TransmissionType::Reversed => {
                let Some(u) = unit(uvs[0] - uvs[1]) else {
                    return;
                };
                vec![u, -u]
            }
            TransmissionType::Symmetric => {
                let rot0 = Rot2::between(self.inner_normal, uvs[0]);
                let rot1 = Rot2::between(-self.inner_normal, uvs[1]);
                let half = (rot0.conj() * rot1).half();
                let a = unit(half.apply(uvs[0])).unwrap_or(uvs[0]);
                let b = unit(half.conj().apply(uvs[1])).unwrap_or(uvs[1]);
                vec![a, b]
            }
            TransmissionType::Same => {
                let Some(u) = unit(uvs.iter().sum::<Vector2<f64>>()) else {
                    return;
                };
                vec![u; uvs.len()]
            }
            _ => {
                let signs: Vec<f64> = uvs
                    .iter()
                    .map(|u| if u.dot(&reference) < 0.0 { -1.0 } else { 1.0 })
                    .collect();
                let sum = uvs
                    .iter()
                    .zip(&signs)
                    .fold(Vector2::zeros(), |acc, (u, s)| acc + u * *s);
                let Some(u) = unit(sum) else {
                    return;
                };
                signs.iter().map(|s| u * *s).collect()
            }
        };
        for (m, t) in self.members.iter().zip(targets) {
            let uv = m.rotation.conj().apply(t);
            layers[m.key.layer].set_uv(m.key.sample, uv);
        }
    }
}

#[inline]
fn unit(v: Vector2<f64>) -> Option<Vector2<f64>> {
    let n = v.norm();
    (n > 1e-6).then(|| v / n)
}

/// Whether `r` in layer `li` is a member of any group.
pub(crate) fn grouped_samples(groups: &[LinkGroup], layers: &[MeshLayer]) -> Vec<Vec<bool>> {
    let mut out: Vec<Vec<bool>> = layers.iter().map(|l| vec![false; l.border().len()]).collect();
    for g in groups {
        for m in &g.members {
            if let SampleRef::Border(bi) = m.key.sample {
                out[m.key.layer][bi] = true;
            }
        }
    }
    out
}
