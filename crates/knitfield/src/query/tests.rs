use super::*;
use crate::geom2::GeomCfg;
use crate::mesh::{LayerCfg, MeshLayer, SampleRef};
use crate::sketch::special::{scene, unit_square};
use crate::sketch::SketchSet;
use nalgebra::vector;
use proptest::prelude::*;

fn square_layer(eta: f64) -> MeshLayer {
    let mut set = SketchSet::new();
    set.add(unit_square());
    MeshLayer::build(&set, 0, &LayerCfg::new(0, eta)).unwrap()
}

#[test]
fn sample_hit_is_a_single_vertex() {
    let layer = square_layer(0.1);
    let cfg = GeomCfg::default();
    for &r in layer.samples(0) {
        let p = layer.pos(r) + vector![0.003, -0.002];
        let nh = query(&layer, p, 1.0, &cfg).unwrap();
        assert_eq!(nh.kind, NeighborhoodKind::Vertex);
        assert_eq!(nh.samples, vec![r]);
        assert_eq!(nh.weights, vec![1.0]);
    }
}

#[test]
fn interior_point_uses_bilinear_quad() {
    let layer = square_layer(0.1);
    let nh = query(&layer, vector![4.25, 5.5], 1.0, &GeomCfg::default()).unwrap();
    assert_eq!(nh.kind, NeighborhoodKind::Quad);
    assert_eq!(nh.len(), 4);
    let expected = [0.375, 0.125, 0.125, 0.375];
    for (w, e) in nh.weights.iter().zip(expected) {
        assert!((w - e).abs() < 1e-12);
    }
    assert_eq!(nh.samples[0], SampleRef::Inner(layer.sample_at_grid(4, 5).unwrap()));
}

#[test]
fn grid_edge_point_is_an_edge() {
    let layer = square_layer(0.1);
    let nh = query(&layer, vector![3.0, 6.4], 1.0, &GeomCfg::default()).unwrap();
    assert_eq!(nh.kind, NeighborhoodKind::Edge);
    assert!((nh.weight_sum() - 1.0).abs() < 1e-12);
}

#[test]
fn near_border_point_is_covered() {
    let layer = square_layer(0.1);
    let nh = query(&layer, vector![0.45, 5.3], 1.0, &GeomCfg::default()).unwrap();
    assert!(matches!(
        nh.kind,
        NeighborhoodKind::Triangle | NeighborhoodKind::Edge
    ));
    assert!((nh.weight_sum() - 1.0).abs() < 1e-9);
    assert!(nh.weights.iter().all(|&w| w >= -1e-9));
}

#[test]
fn outside_point_projects_onto_ring() {
    let layer = square_layer(0.1);
    let cfg = GeomCfg::default();
    let nh = query(&layer, vector![-0.4, 3.5], 1.0, &cfg).unwrap();
    assert_eq!(nh.kind, NeighborhoodKind::Projection);
    assert_eq!(nh.len(), 2);
    assert!(nh.samples.iter().all(|s| s.is_border()));
    assert!((nh.weights[0] - 0.5).abs() < 1e-9);
    assert!(query(&layer, vector![-5.0, 3.5], 1.0, &cfg).is_none());
}

#[test]
fn reads_interpolate_fields() {
    let mut layer = square_layer(0.1);
    let refs: Vec<SampleRef> = layer.samples(0).to_vec();
    for &r in &refs {
        let p = layer.pos(r);
        layer.set_t(r, p.y);
    }
    let cfg = GeomCfg::default();
    let nh = query(&layer, vector![4.25, 5.5], 1.0, &cfg).unwrap();
    assert!((nh.uv(&layer) - vector![0.0, 1.0]).norm() < 1e-12);
    assert!((nh.t(&layer) - 5.5).abs() < 1e-12);
    // unset samples are skipped
    layer.set_t(nh.samples[0], f64::NAN);
    layer.set_t(nh.samples[1], f64::NAN);
    assert!((nh.t(&layer) - 6.0).abs() < 1e-12);
}

#[test]
fn sketch_space_query_on_linked_layer() {
    let set = scene("linked-squares").unwrap();
    let layer = MeshLayer::build(&set, 1, &LayerCfg::new(0, 0.1)).unwrap();
    let nh = query_sketch(&layer, vector![1.5, 0.5], 1.0, &GeomCfg::default()).unwrap();
    assert_eq!(nh.kind, NeighborhoodKind::Vertex);
    assert_eq!(layer.pos(nh.base), vector![5.0, 5.0]);
}

proptest! {
    #[test]
    fn weights_sum_to_one(x in -0.5f64..10.5, y in -0.5f64..10.5) {
        let layer = square_layer(0.1);
        if let Some(nh) = query(&layer, vector![x, y], 1.0, &GeomCfg::default()) {
            prop_assert!((nh.weight_sum() - 1.0).abs() < 1e-9);
            prop_assert_eq!(nh.samples.len(), nh.weights.len());
            prop_assert!(!nh.is_empty() && nh.len() <= 4);
        }
    }
}
