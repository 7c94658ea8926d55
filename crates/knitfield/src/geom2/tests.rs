use super::*;
use nalgebra::{vector, Vector2};
use proptest::prelude::*;

#[test]
fn rotation_between_and_apply() {
    let a = vector![1.0, 0.0];
    let b = vector![0.0, 2.0];
    let r = Rot2::between(a, b);
    assert!((r.x).abs() < 1e-12 && (r.y - 1.0).abs() < 1e-12);
    let v = r.apply(vector![3.0, 0.0]);
    assert!((v - vector![0.0, 3.0]).norm() < 1e-12);
    // inverse undoes
    let back = r.conj().apply(v);
    assert!((back - vector![3.0, 0.0]).norm() < 1e-12);
}

#[test]
fn half_rotation_branches() {
    let q = Rot2::from_angle(std::f64::consts::FRAC_PI_2);
    let h = q.half();
    assert!((h.angle() - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    let neg = Rot2::from_angle(-2.0);
    assert!((neg.half().angle() + 1.0).abs() < 1e-12);
    // half-turn picks the upper branch
    let flip = Rot2 { x: -1.0, y: 0.0 };
    assert_eq!(flip.half(), Rot2 { x: 0.0, y: 1.0 });
    let flip_low = Rot2 { x: -1.0, y: -1e-300 };
    assert!(flip_low.half().y < 0.0);
}

#[test]
fn segment_and_line_intersections() {
    let cfg = GeomCfg::default();
    let (p, s, t) = segment_intersection(
        vector![0.0, 0.0],
        vector![2.0, 2.0],
        vector![0.0, 2.0],
        vector![2.0, 0.0],
        cfg.eps_det,
    )
    .unwrap();
    assert!((p - vector![1.0, 1.0]).norm() < 1e-12);
    assert!((s - 0.5).abs() < 1e-12 && (t - 0.5).abs() < 1e-12);
    // parallel
    assert!(line_intersection(
        vector![0.0, 0.0],
        vector![1.0, 0.0],
        vector![0.0, 1.0],
        vector![1.0, 1.0],
        cfg.eps_det
    )
    .is_none());
    // lines meet outside the segments
    assert!(segment_intersection(
        vector![0.0, 0.0],
        vector![1.0, 0.0],
        vector![2.0, -1.0],
        vector![2.0, 1.0],
        cfg.eps_det
    )
    .is_none());
}

#[test]
fn projection_clamps() {
    let pr = project_on_segment(vector![-1.0, 1.0], vector![0.0, 0.0], vector![2.0, 0.0]);
    assert_eq!(pr.t, 0.0);
    assert!((pr.dist - 2f64.sqrt()).abs() < 1e-12);
    let mid = project_on_segment(vector![1.0, 3.0], vector![0.0, 0.0], vector![2.0, 0.0]);
    assert!((mid.t - 0.5).abs() < 1e-12 && (mid.dist - 3.0).abs() < 1e-12);
}

#[test]
fn barycentrics_and_containment() {
    let a = vector![0.0, 0.0];
    let b = vector![1.0, 0.0];
    let c = vector![0.0, 1.0];
    let w = barycentric(vector![0.25, 0.25], a, b, c).unwrap();
    assert!((w[0] - 0.5).abs() < 1e-12);
    assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(in_triangle(vector![0.1, 0.1], a, b, c, 1e-12));
    assert!(!in_triangle(vector![1.0, 1.0], a, b, c, 1e-12));
    // collinear triangle has no barycentrics
    assert!(barycentric(vector![0.5, 0.0], a, b, vector![2.0, 0.0]).is_none());

    let square = [a, b, vector![1.0, 1.0], c];
    assert!(poly_contains(&square, vector![0.5, 0.5]));
    assert!(!poly_contains(&square, vector![1.5, 0.5]));
    assert!((signed_area(&square) - 1.0).abs() < 1e-12);
    let (d, edge) = distance_to_polyline(&square, vector![0.5, -0.25]).unwrap();
    assert!((d - 0.25).abs() < 1e-12);
    assert_eq!(edge, 0);
}

#[test]
fn circle_intersections() {
    match circle_inter_circle(vector![0.0, 0.0], 1.0, vector![1.0, 0.0], 1.0) {
        CircleIntersection::Two(p, q) => {
            assert!((p.x - 0.5).abs() < 1e-12 && (q.x - 0.5).abs() < 1e-12);
            assert!((p.y + q.y).abs() < 1e-12 && p.y > 0.0);
        }
        other => panic!("expected two points, got {other:?}"),
    }
    match circle_inter_circle(vector![0.0, 0.0], 1.0, vector![2.0, 0.0], 1.0) {
        CircleIntersection::Two(p, q) => {
            assert!((p - vector![1.0, 0.0]).norm() < 1e-9);
            assert_eq!(p, q);
        }
        other => panic!("expected tangent point, got {other:?}"),
    }
    match circle_inter_circle(vector![0.0, 0.0], 1.0, vector![4.0, 0.0], 1.0) {
        CircleIntersection::Apart(m) => assert!((m - vector![2.0, 0.0]).norm() < 1e-12),
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[test]
fn bbox_ops() {
    let b = Bbox2::from_points(&[vector![0.0, 1.0], vector![2.0, -1.0]]);
    assert!(b.contains(vector![1.0, 0.0]));
    assert!(!b.contains(vector![3.0, 0.0]));
    assert!(b.expanded(1.0).contains(vector![3.0, 0.0]));
    assert!(Bbox2::empty().is_empty());
    let c = Bbox2::from_points(&[vector![1.5, 0.5], vector![5.0, 5.0]]);
    assert!(b.intersects(&c));
}

proptest! {
    #[test]
    fn rotation_cycle_composes_to_identity(angles in proptest::collection::vec(-3.1f64..3.1, 1..8)) {
        // a -> b -> ... -> a through random directions
        let dirs: Vec<Vector2<f64>> = angles.iter().map(|&t| vector![t.cos(), t.sin()]).collect();
        let mut acc = Rot2::IDENTITY;
        for k in 0..dirs.len() {
            let from = dirs[k];
            let to = dirs[(k + 1) % dirs.len()];
            acc = Rot2::between(from, to) * acc;
        }
        prop_assert!(acc.distance(Rot2::IDENTITY) < 1e-9);
    }

    #[test]
    fn half_squares_back(theta in -3.14f64..3.14) {
        let r = Rot2::from_angle(theta);
        let h = r.half();
        prop_assert!((h * h).distance(r) < 1e-9);
        prop_assert!(((h.x * h.x + h.y * h.y) - 1.0).abs() < 1e-12);
    }
}
