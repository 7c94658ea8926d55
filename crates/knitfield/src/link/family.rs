//! Family iteration, vertex designation and source/sink openings.

use std::f64::consts::FRAC_1_SQRT_2;

use crate::geom2::Rot2;
use crate::mesh::{MeshLayer, SampleKey, SampleRef};

/// One sample of a family with the rotation into the root's frame:
/// `uv_root ≈ rotation · uv_member`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FamilyMember {
    pub key: SampleKey,
    pub rotation: Rot2,
}

/// The family of `key`: the sample itself first, then its linked samples.
/// Open vertices are alone in their family; open members are skipped.
pub fn family(layers: &[MeshLayer], key: SampleKey) -> Vec<FamilyMember> {
    let mut out = vec![FamilyMember {
        key,
        rotation: Rot2::IDENTITY,
    }];
    let Some(bi) = key.sample.border() else {
        return out;
    };
    let b = layers[key.layer].border_sample(bi);
    if b.vertex_open {
        return out;
    }
    for e in &b.links {
        if e.target == key || out.iter().any(|m| m.key == e.target) {
            continue;
        }
        let open = e
            .target
            .sample
            .border()
            .is_some_and(|ti| layers[e.target.layer].border_sample(ti).vertex_open);
        if !open {
            out.push(FamilyMember {
                key: e.target,
                rotation: e.rotation,
            });
        }
    }
    out
}

/// Whether `key` stands for its family in vertex-wise sweeps.
pub fn is_representative(layers: &[MeshLayer], key: SampleKey) -> bool {
    match key.sample {
        SampleRef::Inner(_) => true,
        SampleRef::Border(bi) => {
            let b = layers[key.layer].border_sample(bi);
            b.vertex_open || b.vertex == key
        }
    }
}

/// `vertex = argmin key` over the (non-open part of the) family.
pub fn designate_vertices(layers: &mut [MeshLayer]) {
    let mut vertices: Vec<(usize, usize, SampleKey)> = Vec::new();
    for (li, layer) in layers.iter().enumerate() {
        for bi in 0..layer.border().len() {
            let key = SampleKey::border(li, bi);
            let v = family(layers, key)
                .iter()
                .map(|m| m.key)
                .min()
                .unwrap_or(key);
            vertices.push((li, bi, v));
        }
    }
    for (li, bi, v) in vertices {
        layers[li].border_sample_mut(bi).vertex = v;
    }
}

/// Open ring edges between a sample and a ring neighbor that is also one of
/// its link partners when their (rotated) flows oppose by more than 135°.
/// Both edges open make the vertex open. Vertices are re-designated.
pub fn mark_openings(layers: &mut [MeshLayer]) {
    let mut flags: Vec<(usize, usize, bool, bool)> = Vec::new();
    for (li, layer) in layers.iter().enumerate() {
        for (bi, b) in layer.border().iter().enumerate() {
            let uv = layer.uv(SampleRef::Border(bi));
            let opposes = |side: usize| {
                let side_key = SampleKey::border(li, side);
                b.links.iter().any(|e| {
                    e.target == side_key
                        && uv.dot(&e.rotation.apply(layer.uv(SampleRef::Border(side))))
                            < -FRAC_1_SQRT_2
                })
            };
            let prev_open = opposes(b.prev);
            let next_open = opposes(b.next);
            flags.push((li, bi, prev_open, next_open));
        }
    }
    for (li, bi, prev_open, next_open) in flags {
        let b = layers[li].border_sample_mut(bi);
        b.prev_open = prev_open;
        b.next_open = next_open;
        b.vertex_open = prev_open && next_open;
    }
    designate_vertices(layers);
}
