use super::*;
use crate::geom2::Rot2;
use crate::mesh::{LayerCfg, MeshLayer, SampleKey, SampleRef};
use crate::sketch::special::{annulus, linked_squares, unit_square};
use crate::sketch::{SketchSet, TransmissionType};

fn level(set: &SketchSet, eta: f64) -> Vec<MeshLayer> {
    let mut layers: Vec<MeshLayer> = (0..set.len())
        .map(|i| MeshLayer::build(set, i, &LayerCfg::new(0, eta)).unwrap())
        .collect();
    init_links(&mut layers, set).unwrap();
    cross_init(&mut layers);
    designate_vertices(&mut layers);
    layers
}

fn all_border(layers: &[MeshLayer]) -> Vec<SampleKey> {
    layers
        .iter()
        .enumerate()
        .flat_map(|(li, l)| (0..l.border().len()).map(move |bi| SampleKey::border(li, bi)))
        .collect()
}

fn sample(layers: &[MeshLayer], k: SampleKey) -> &crate::mesh::BorderSample {
    layers[k.layer].border_sample(k.sample.border().unwrap())
}

#[test]
fn linked_squares_pair_coincident_samples() {
    let set = linked_squares(TransmissionType::Same);
    let layers = level(&set, 0.1);
    let mut linked = 0;
    for k in all_border(&layers) {
        let b = sample(&layers, k);
        for e in &b.links {
            linked += 1;
            let t = sample(&layers, e.target);
            assert!((b.sketch_pos - t.sketch_pos).norm() < 1e-9);
            assert!(e.rotation.distance(Rot2::IDENTITY) < 1e-12);
            assert_eq!(e.transmission, TransmissionType::Same);
        }
    }
    // 11 samples per side of the shared edge, both corners included
    assert_eq!(linked, 22);
}

#[test]
fn links_are_reciprocal() {
    let set = annulus(1.0, 0.3);
    let layers = level(&set, 0.1);
    for k in all_border(&layers) {
        for e in &sample(&layers, k).links {
            let back = sample(&layers, e.target)
                .links
                .iter()
                .find(|f| f.target == k)
                .unwrap_or_else(|| panic!("{k:?} -> {:?} is one-sided", e.target));
            assert!((back.rotation * e.rotation).distance(Rot2::IDENTITY) < 1e-9);
        }
    }
}

#[test]
fn rotations_compose_around_cycles() {
    let mut set = SketchSet::new();
    for _ in 0..3 {
        set.add(unit_square());
    }
    // the corner of square 0 at (1, 0) joins both links
    set.link(0, 0, 1, 0, true, TransmissionType::Default).unwrap();
    set.link(0, 1, 2, 3, true, TransmissionType::Default).unwrap();
    let layers = level(&set, 0.25);
    let corner = layers[0].border_sample(layers[0].border_at(1, 0.0).unwrap());
    assert_eq!(corner.direct_link_count, 2);
    assert_eq!(corner.links.len(), 2);
    assert!(layers[1].border_sample(0).links.len() == 2);
    for k in all_border(&layers) {
        let b = sample(&layers, k);
        for e in &b.links {
            for f in &sample(&layers, e.target).links {
                if f.target == k {
                    continue;
                }
                let direct = b.links.iter().find(|g| g.target == f.target).unwrap();
                let composed = e.rotation * f.rotation;
                assert!(
                    composed.distance(direct.rotation) < 1e-6,
                    "{k:?} via {:?} to {:?}",
                    e.target,
                    f.target
                );
            }
        }
    }
}

#[test]
fn vertices_agree_across_families() {
    let set = annulus(1.0, 0.3);
    let layers = level(&set, 0.1);
    for k in all_border(&layers) {
        let fam = family(&layers, k);
        let v = sample(&layers, k).vertex;
        assert_eq!(v, fam.iter().map(|m| m.key).min().unwrap());
        for m in fam {
            assert_eq!(sample(&layers, m.key).vertex, v);
        }
        assert_eq!(is_representative(&layers, k), v == k);
    }
    assert!(is_representative(
        &layers,
        SampleKey::new(0, SampleRef::Inner(0))
    ));
}

#[test]
fn folded_edge_links_to_itself() {
    let mut set = SketchSet::new();
    set.add(unit_square());
    set.link(0, 0, 0, 0, true, TransmissionType::Default).unwrap();
    let layers = level(&set, 0.1);
    let mid = layers[0].border_sample(5);
    assert!(mid.self_link);
    assert!(mid.links.is_empty());
    let b = layers[0].border_sample(2);
    assert_eq!(b.links.len(), 1);
    assert_eq!(b.links[0].target, SampleKey::border(0, 8));
    // tangents are parallel, so the fold is a half turn
    assert!(b.links[0].rotation.distance(Rot2::from_angle(std::f64::consts::PI)) < 1e-9);
}

#[test]
fn opposing_flows_open_ring_edges() {
    let mut set = SketchSet::new();
    set.add(unit_square());
    set.link(0, 0, 0, 0, true, TransmissionType::Default).unwrap();
    // five samples on the bottom edge: 0.4 and 0.6 are ring neighbors
    let mut layers = level(&set, 0.2);
    assert_eq!(layers[0].border_sample(2).links[0].target, SampleKey::border(0, 3));
    mark_openings(&mut layers);
    let (a, b) = (layers[0].border_sample(2), layers[0].border_sample(3));
    assert!(a.next_open && !a.prev_open);
    assert!(b.prev_open && !b.next_open);
    assert!(!a.vertex_open && !b.vertex_open);
    assert!(a.edge_open_towards(3));
}
