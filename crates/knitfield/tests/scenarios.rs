//! End-to-end solves of the built-in scenes.

use knitfield::api::*;
use knitfield::Vec2;
use nalgebra::vector;

fn solved(name: &str) -> (Solver, SolveSummary) {
    let set = scene(name).unwrap();
    let mut solver = Solver::new(set, SolverParams::default()).unwrap();
    let summary = solver.run();
    assert_eq!(solver.stage(), Stage::Done);
    (solver, summary)
}

fn all_refs(layer: &MeshLayer) -> Vec<SampleRef> {
    layer.samples(0).to_vec()
}

fn close(a: Vec2<f64>, b: Vec2<f64>, tol: f64) -> bool {
    (a - b).norm() <= tol
}

fn assert_unit_flows(layers: &[MeshLayer]) {
    for layer in layers {
        for r in all_refs(layer) {
            let n = layer.uv(r).norm();
            assert!((n - 1.0).abs() < 1e-6, "layer {} {r:?}: |uv| = {n}", layer.index);
        }
    }
}

fn assert_times_valid(layers: &[MeshLayer]) {
    for layer in layers {
        for r in all_refs(layer) {
            assert!(layer.t(r).is_finite(), "layer {} {r:?} has no time", layer.index);
        }
    }
}

/// Linked samples share one time, or all still lack one.
fn assert_family_times_agree(layers: &[MeshLayer]) {
    for (li, layer) in layers.iter().enumerate() {
        for bi in 0..layer.border().len() {
            let me = SampleKey::border(li, bi);
            let t = layer.t(me.sample);
            for m in family(layers, me).iter().skip(1) {
                let u = layers[m.key.layer].t(m.key.sample);
                let same = (t.is_nan() && u.is_nan()) || (t - u).abs() < 1e-9;
                assert!(same, "{me:?} vs {:?}: {t} vs {u}", m.key);
            }
        }
    }
}

/// Linked samples agree on time and, up to their rotation, on flow.
fn assert_families_coherent(layers: &[MeshLayer]) {
    assert_times_valid(layers);
    assert_family_times_agree(layers);
    for (li, layer) in layers.iter().enumerate() {
        for (bi, b) in layer.border().iter().enumerate() {
            let me = SampleKey::border(li, bi);
            for e in &b.links {
                let back = layers[e.target.layer]
                    .border_sample(e.target.sample.border().unwrap())
                    .links
                    .iter()
                    .find(|x| x.target == me);
                let back = back.unwrap_or_else(|| panic!("{me:?} -> {:?} not reciprocal", e.target));
                assert!(back.rotation.distance(e.rotation.conj()) < 1e-9);
            }
        }
    }
}

#[test]
fn square_isoline_gives_a_linear_time() {
    let (s, summary) = solved("square-isoline");
    assert!(summary.converged());
    let layer = &s.finest()[0];
    assert_unit_flows(s.finest());
    for r in all_refs(layer) {
        let y = layer.sketch_pos(r).y;
        let expected = (y - 0.5) / layer.eta;
        assert!((layer.t(r) - expected).abs() < 5e-2, "{r:?} at y = {y}: t = {}", layer.t(r));
    }
    // strictly increasing up every grid column
    for x in 0..layer.width {
        let column: Vec<f64> = (0..layer.height)
            .filter_map(|y| layer.sample_at_grid(x as i64, y as i64))
            .map(|i| layer.t(SampleRef::Inner(i)))
            .collect();
        for w in column.windows(2) {
            assert!(w[0] < w[1], "column {x}: {} then {}", w[0], w[1]);
        }
    }
    assert!(summary.validation.is_ok());
}

#[test]
fn linked_squares_carry_the_flow_across() {
    let (s, _) = solved("linked-squares");
    assert_unit_flows(s.finest());
    assert_times_valid(s.finest());
    assert_families_coherent(s.finest());
    let (left, t_left) = s.sample_at(0, vector![0.5, 0.5]).unwrap();
    let (right, t_right) = s.sample_at(1, vector![1.5, 0.5]).unwrap();
    assert!(close(left.normalize(), vector![1.0, 0.0], 0.05), "left {left:?}");
    assert!(close(right.normalize(), vector![1.0, 0.0], 0.05), "right {right:?}");
    assert!(t_left < t_right, "time must grow along the flow: {t_left} vs {t_right}");
}

#[test]
fn linked_times_agree_after_every_time_sweep() {
    let mut s = Solver::new(scene("linked-squares").unwrap(), SolverParams::default()).unwrap();
    let mut checked = 0;
    while s.iterate() != Stage::Done {
        if s.stage() == Stage::Time {
            assert_family_times_agree(s.current_layers());
            checked += 1;
        }
    }
    assert!(checked > 0);
    assert_family_times_agree(s.finest());
}

#[test]
fn reversed_squares_flip_the_flow() {
    let (s, _) = solved("reversed-squares");
    assert_unit_flows(s.finest());
    assert_families_coherent(s.finest());
    let (left, _) = s.sample_at(0, vector![0.5, 0.5]).unwrap();
    let (right, _) = s.sample_at(1, vector![1.5, 0.5]).unwrap();
    assert!(close(left.normalize(), vector![1.0, 0.0], 0.05), "left {left:?}");
    assert!(close(right.normalize(), vector![-1.0, 0.0], 0.05), "right {right:?}");
    // family flows averaged under the reversal stay unit length
    let layers = s.finest();
    let mut groups = 0;
    for g in s.link_groups() {
        if g.kind != TransmissionType::Reversed || g.members.len() != 2 {
            continue;
        }
        let uv = |i: usize| {
            let m = g.members[i];
            m.rotation.apply(layers[m.key.layer].uv(m.key.sample))
        };
        let mean = (uv(0) - uv(1)) * 0.5;
        assert!(mean.norm() >= 0.999, "{:?}: averaged flow {mean:?}", g.root);
        groups += 1;
    }
    assert!(groups > 0);
}

#[test]
fn annulus_solves_across_both_halves() {
    let (s, summary) = solved("annulus");
    assert!(summary.converged(), "{:?}", summary.stages);
    assert_eq!(s.finest().len(), 2);
    assert_unit_flows(s.finest());
    assert_families_coherent(s.finest());
    assert_eq!(summary.validation.count(IssueKind::LocalTimeExtrema), 0);
    let trefs = s.finest().iter().filter(|l| l.tref().is_some()).count();
    assert_eq!(trefs, 1);
    // time grows away from the isoline on the outer top
    let (_, t_top) = s.sample_at(0, vector![0.0, 0.9]).unwrap();
    let (_, t_mid) = s.sample_at(0, vector![0.0, 0.45]).unwrap();
    let (_, t_bottom) = s.sample_at(1, vector![0.0, -0.9]).unwrap();
    assert!(t_top < t_mid, "{t_top} vs {t_mid}");
    assert!(t_mid < t_bottom, "{t_mid} vs {t_bottom}");
}

#[test]
fn crossing_seams_warn_about_missing_isolines() {
    let (s, summary) = solved("crossing-seams");
    assert!(s.finest()[0].region_count() >= 2);
    let report = &summary.validation;
    assert!(report.count(IssueKind::TwoRegionsWithoutIsoline) >= 1);
    assert!(report
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::TwoRegionsWithoutIsoline)
        .all(|i| i.kind.severity() == Severity::Warning));
}

#[test]
fn solved_times_are_centred() {
    for name in ["square-isoline", "linked-squares", "annulus"] {
        let (s, _) = solved(name);
        let (sum, n) = s
            .finest()
            .iter()
            .flat_map(|l| all_refs(l).into_iter().map(move |r| l.t(r)))
            .fold((0.0, 0usize), |(s, n), t| (s + t, n + 1));
        let mean = sum / n as f64;
        assert!(mean.abs() < 1e-6, "{name}: mean time {mean}");
    }
}

#[test]
fn solved_layers_persist() {
    let (s, _) = solved("square-isoline");
    let layer = &s.finest()[0];
    let json = layer.to_json().unwrap();
    let back = MeshLayer::from_json(&json).unwrap();
    for r in all_refs(layer) {
        assert_eq!(back.t(r), layer.t(r));
        assert_eq!(back.uv(r), layer.uv(r));
    }
}
