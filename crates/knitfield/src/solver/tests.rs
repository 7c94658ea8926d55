use super::time::{all_times_valid, mean_time, pick_tref, recentre, seed_components};
use super::transmission::grouped_samples;
use super::*;
use crate::error::Error;
use crate::geom2::Rot2;
use crate::link::{cross_init, designate_vertices, init_links};
use crate::mesh::{ConstraintData, LayerCfg, MeshLayer, SampleKey, SampleRef};
use crate::sketch::special::{linked_squares, rectangle, scene, unit_square};
use crate::sketch::{
    Constraint, ConstraintDir, ConstraintType, Curve, SketchSet, TransmissionType,
};
use nalgebra::{vector, Vector2};

fn level(set: &SketchSet, eta: f64, init_up: bool) -> Vec<MeshLayer> {
    let cfg = LayerCfg {
        init_up,
        ..LayerCfg::new(0, eta)
    };
    let mut layers: Vec<MeshLayer> = (0..set.len())
        .map(|k| MeshLayer::build(set, k, &cfg).unwrap())
        .collect();
    init_links(&mut layers, set).unwrap();
    cross_init(&mut layers);
    designate_vertices(&mut layers);
    layers
}

fn square(eta: f64) -> Vec<MeshLayer> {
    let mut set = SketchSet::new();
    set.add(unit_square());
    level(&set, eta, true)
}

fn refs(layer: &MeshLayer) -> Vec<SampleRef> {
    layer.samples(0).to_vec()
}

fn fill_uv(layer: &mut MeshLayer, uv: Vector2<f64>) {
    for r in refs(layer) {
        layer.set_uv(r, uv);
    }
}

fn fill_t(layer: &mut MeshLayer, f: impl Fn(Vector2<f64>) -> f64) {
    for r in refs(layer) {
        let p = layer.pos(r);
        layer.set_t(r, f(p));
    }
}

fn center(layer: &MeshLayer) -> SampleRef {
    SampleRef::Inner(layer.sample_at_grid(5, 5).unwrap())
}

fn direction(dir: Vector2<f64>, weight: f64, project: bool) -> ConstraintData {
    ConstraintData {
        curve: 0,
        kind: ConstraintType::Direction,
        project,
        weight,
        dir: Some(dir),
        layer_pos: Vector2::zeros(),
        layer_dist: 0.0,
        dt: f64::NAN,
    }
}

fn close(a: Vector2<f64>, b: Vector2<f64>, tol: f64) -> bool {
    (a - b).norm() <= tol
}

// --- params ---

#[test]
fn tolerances_interpolate_between_levels() {
    let p = SolverParams::default();
    assert_eq!(p.max_level, 1);
    assert!((p.flow_tolerance(0) - 1e-3).abs() < 1e-15);
    assert!((p.flow_tolerance(1) - 0.05).abs() < 1e-15);
    assert!((p.time_tolerance(0) - 1e-2).abs() < 1e-15);
    assert!((p.time_tolerance(1) - 5e-3).abs() < 1e-15);
    assert!((p.eta_at(0) - 0.2).abs() < 1e-15);
    assert!((p.eta_at(1) - 0.1).abs() < 1e-15);
    let single = SolverParams {
        max_level: 0,
        ..SolverParams::default()
    };
    assert_eq!(single.level_fraction(0), 1.0);
}

#[test]
fn partial_json_params_keep_defaults() {
    let p: SolverParams =
        serde_json::from_str(r#"{"eta": 0.05, "dtime_equation": "source", "nh_threshold": 2.0}"#)
            .unwrap();
    assert_eq!(p.eta, 0.05);
    assert_eq!(p.dtime_equation, DTimeEquation::Source);
    assert_eq!(p.nh_threshold, Some(2.0));
    assert_eq!(p.max_time_iter, SolverParams::default().max_time_iter);
    assert_eq!(p.flow_stage, FlowStageParams::default());
}

#[test]
fn invalid_params_are_rejected() {
    let bad_eta = SolverParams {
        eta: 0.0,
        ..SolverParams::default()
    };
    assert!(matches!(bad_eta.validate(), Err(Error::InvalidArgument(_))));
    let bad_range = SolverParams {
        time_stretch_range: 1.5,
        ..SolverParams::default()
    };
    assert!(matches!(bad_range.validate(), Err(Error::InvalidArgument(_))));
}

// --- flow ---

#[test]
fn neighbor_dt_follows_equation() {
    let s = (vector![0.0, 1.0], 1.0);
    let n = (vector![1.0, 0.0], 1.0);
    let d = vector![2.0, 1.0];
    assert_eq!(neighbor_dt(DTimeEquation::Source, s, n, d), -1.0);
    assert_eq!(neighbor_dt(DTimeEquation::Target, s, n, d), -2.0);
    assert_eq!(neighbor_dt(DTimeEquation::Bidir, s, n, d), -1.5);
    assert_eq!(neighbor_dt(DTimeEquation::Bidir, (s.0, 2.0), n, d), -2.0);
}

#[test]
fn constraints_blend_with_neighborhood() {
    let mut layers = square(0.1);
    let layer = &mut layers[0];
    let c = center(layer);
    let p = SolverParams::default();

    layer.constraints_mut(c).push(direction(vector![1.0, 0.0], 0.5, false));
    // (1 - 0.5) * (0, 1) + 0.5 * (0.5 * (1, 0)) = (0.25, 0.5)
    let uv = relax_flow(layer, c, &p).unwrap();
    assert!(close(uv, vector![1.0, 2.0] / 5f64.sqrt(), 1e-12), "{uv:?}");

    layer.constraints_mut(c).clear();
    layer.constraints_mut(c).push(direction(vector![1.0, 0.0], 1.0, false));
    assert!(close(relax_flow(layer, c, &p).unwrap(), vector![1.0, 0.0], 1e-12));

    // unsigned constraints take the sign of the neighborhood
    layer.constraints_mut(c).clear();
    layer.constraints_mut(c).push(direction(vector![0.0, -1.0], 1.0, true));
    assert!(close(relax_flow(layer, c, &p).unwrap(), vector![0.0, 1.0], 1e-12));
}

#[test]
fn blocked_neighborhood_keeps_own_flow() {
    let mut layers = square(0.1);
    let layer = &mut layers[0];
    let c = center(layer);
    let nbrs: Vec<SampleRef> = layer.neighbors(c).iter().map(|n| n.sample).collect();
    for n in &nbrs {
        if let SampleRef::Inner(i) = *n {
            layer.inner[i].seam_weight = 1.0;
        }
    }
    let p = SolverParams::default();
    layer.set_uv(c, vector![1.0, 0.0]);
    assert!(close(neighborhood_flow(layer, c, &p).unwrap(), vector![1.0, 0.0], 1e-12));
    layer.set_uv(c, Vector2::zeros());
    assert!(close(neighborhood_flow(layer, c, &p).unwrap(), vector![0.0, 1.0], 1e-12));
}

#[test]
fn flow_sweeps_spread_isoline_direction() {
    let set = scene("square-isoline").unwrap();
    let mut layers = level(&set, 0.1, false);
    let grouped = grouped_samples(&[], &layers);
    let p = SolverParams::default();
    let mut last = None;
    for iter in 0..200 {
        let sweep = flow_sweep(&mut layers, &[], &grouped, iter, &p);
        if sweep.unset == 0 && sweep.min_dp >= 1.0 - 1e-12 {
            last = Some(iter);
            break;
        }
    }
    assert!(last.is_some(), "flow did not settle");
    for r in refs(&layers[0]) {
        assert!(close(layers[0].uv(r), vector![0.0, 1.0], 1e-9), "{r:?}");
    }
}

// --- transmission ---

#[test]
fn transmission_merge_folds_links() {
    use TransmissionType::*;
    assert_eq!(merge_transmissions(Vec::<TransmissionType>::new()), None);
    assert_eq!(merge_transmissions([Default]), Some(Aligned));
    assert_eq!(merge_transmissions([Same, Same]), Some(Same));
    assert_eq!(merge_transmissions([Same, Reversed]), Some(Aligned));
    assert_eq!(merge_transmissions([Unrelated, Reversed]), Some(Reversed));
    assert_eq!(merge_transmissions([Symmetric, Same]), Some(Same));
    assert_eq!(merge_transmissions([Symmetric, Symmetric]), Some(Aligned));
}

fn squares_with(t: TransmissionType) -> (Vec<MeshLayer>, Vec<LinkGroup>) {
    let layers = level(&linked_squares(t), 0.1, true);
    let groups = LinkGroup::build_all(&layers);
    (layers, groups)
}

#[test]
fn same_groups_share_one_flow() {
    let (mut layers, groups) = squares_with(TransmissionType::Same);
    assert!(groups.len() >= 11);
    for g in &groups {
        assert_eq!(g.kind, TransmissionType::Same);
        assert_eq!(g.members.len(), 2);
        assert_eq!(g.root.layer, 0);
        assert!(g.is_active(&layers));
        let m = g.members[1];
        layers[0].set_uv(g.root.sample, vector![1.0, 0.0]);
        layers[m.key.layer].set_uv(m.key.sample, Vector2::zeros());
        g.project_flow(&mut layers);
        let uv = m.rotation.apply(layers[m.key.layer].uv(m.key.sample));
        assert!(close(uv, vector![1.0, 0.0], 1e-12), "{uv:?}");
    }
}

#[test]
fn reversed_groups_flip_the_partner() {
    let (mut layers, groups) = squares_with(TransmissionType::Reversed);
    for g in &groups {
        assert_eq!(g.kind, TransmissionType::Reversed);
        let m = g.members[1];
        layers[0].set_uv(g.root.sample, vector![1.0, 0.0]);
        layers[m.key.layer].set_uv(m.key.sample, Vector2::zeros());
        g.project_flow(&mut layers);
        assert!(close(layers[0].uv(g.root.sample), vector![1.0, 0.0], 1e-12));
        let uv = m.rotation.apply(layers[m.key.layer].uv(m.key.sample));
        assert!(close(uv, vector![-1.0, 0.0], 1e-12), "{uv:?}");
    }
}

#[test]
fn symmetric_groups_split_the_discrepancy() {
    let (mut layers, groups) = squares_with(TransmissionType::Symmetric);
    let deg = std::f64::consts::PI / 180.0;
    for g in &groups {
        assert_eq!(g.kind, TransmissionType::Symmetric);
        let n0 = g.inner_normal;
        let m = g.members[1];
        layers[0].set_uv(g.root.sample, Rot2::from_angle(20.0 * deg).apply(n0));
        let other = Rot2::from_angle(40.0 * deg).apply(-n0);
        layers[m.key.layer].set_uv(m.key.sample, m.rotation.conj().apply(other));
        g.project_flow(&mut layers);
        let expected = Rot2::from_angle(30.0 * deg).apply(n0);
        assert!(close(layers[0].uv(g.root.sample), expected, 1e-9));
        let uv = m.rotation.apply(layers[m.key.layer].uv(m.key.sample));
        assert!(close(uv, -expected, 1e-9), "{uv:?}");
    }
}

#[test]
fn pinned_groups_do_not_project() {
    let mut set = linked_squares(TransmissionType::Same);
    set.sketches[0].constraints.push(Constraint::new(
        Curve::line(vector![1.0, 0.0], vector![1.0, 1.0]),
        ConstraintType::Direction,
        ConstraintDir::Forward,
        1.0,
    ));
    let mut layers = level(&set, 0.1, false);
    let groups = LinkGroup::build_all(&layers);
    assert!(!groups.is_empty());
    for g in &groups {
        assert!(!g.is_active(&layers));
        let m = g.members[1];
        layers[0].set_uv(g.root.sample, vector![0.0, 1.0]);
        g.project_flow(&mut layers);
        assert_eq!(layers[m.key.layer].uv(m.key.sample), Vector2::zeros());
    }
}

// --- time ---

#[test]
fn time_sweeps_recover_a_linear_field() {
    let mut layers = square(0.1);
    pick_tref(&mut layers);
    assert!(layers[0].tref().is_some());
    let mut cache = DtCache::new(&layers);
    let mut groups = TimeGroups::default();
    let p = SolverParams::default();
    let mut settled = false;
    for iter in 0..500 {
        let pinned = !all_times_valid(&layers);
        let sweep = time_sweep(&mut layers, &mut cache, &mut groups, iter, &p, 0, pinned);
        if !pinned {
            recentre(&mut layers);
            if sweep.max_dt < 1e-10 {
                settled = true;
                break;
            }
        }
    }
    assert!(settled);
    assert!(cache.cached() > 0);
    let layer = &layers[0];
    let all = refs(layer);
    let mean_y = all.iter().map(|&r| layer.pos(r).y).sum::<f64>() / all.len() as f64;
    for r in all {
        let expected = layer.pos(r).y - mean_y;
        assert!((layer.t(r) - expected).abs() < 1e-6, "{r:?}: {} vs {expected}", layer.t(r));
    }
}

#[test]
fn isoline_groups_hold_linear_times() {
    let set = scene("square-isoline").unwrap();
    let mut layers = level(&set, 0.1, true);
    let p = SolverParams::default();
    let mut groups = TimeGroups::build(&mut layers, &p);
    assert_eq!(groups.len(), 1);
    let below = SampleKey::new(0, SampleRef::Inner(layers[0].sample_at_grid(5, 4).unwrap()));
    let member = groups.groups[0]
        .members
        .iter()
        .find(|m| m.key == below)
        .unwrap();
    assert!((member.dt - 1.0).abs() < 1e-9);

    fill_t(&mut layers[0], |p| p.y + 3.0);
    groups.couple(&mut layers);
    assert!((groups.groups[0].time - 8.0).abs() < 1e-9);
    for r in refs(&layers[0]) {
        let y = layers[0].pos(r).y;
        assert!((layers[0].t(r) - (y + 3.0)).abs() < 1e-9);
    }
}

#[test]
fn isoline_coupling_is_a_fixed_point_of_the_sweep() {
    let set = scene("square-isoline").unwrap();
    let mut layers = level(&set, 0.1, true);
    fill_uv(&mut layers[0], vector![0.0, 1.0]);
    fill_t(&mut layers[0], |p| p.y + 3.0);
    let p = SolverParams::default();
    let mut groups = TimeGroups::build(&mut layers, &p);
    groups.couple(&mut layers);
    let mut cache = DtCache::new(&layers);

    let sweep = time_sweep(&mut layers, &mut cache, &mut groups, 0, &p, 0, false);
    assert!(sweep.max_dt < 1e-9, "max_dt = {}", sweep.max_dt);
    groups.settle();
    assert!((groups.groups[0].time - 8.0).abs() < 1e-9);

    // a moved isoline time drags the samples on the curve along in the same sweep
    groups.groups[0].time = 9.0;
    let on_curve = SampleRef::Inner(layers[0].sample_at_grid(5, 5).unwrap());
    let sweep = time_sweep(&mut layers, &mut cache, &mut groups, 1, &p, 0, false);
    assert!((layers[0].t(on_curve) - 9.0).abs() < 1e-12);
    assert!(sweep.max_dt >= 1.0 - 1e-12);

    groups.shift(2.0);
    assert!((groups.groups[0].time - 7.0).abs() < 1e-12);
    groups.settle();
    assert!(groups.groups[0].time.is_finite());
}

#[test]
fn one_reference_per_level_across_components() {
    let mut set = SketchSet::new();
    set.add(unit_square());
    set.add(rectangle("apart", vector![3.0, 0.0], 1.0, 1.0));
    let components = set.components();
    assert_eq!(components.len(), 2);
    let mut layers = level(&set, 0.1, true);

    pick_tref(&mut layers);
    assert_eq!(layers.iter().filter(|l| l.tref().is_some()).count(), 1);
    assert!(layers[0].tref().is_some());

    // the component without the reference gets a starting time
    seed_components(&mut layers, &components);
    assert!(refs(&layers[0]).iter().all(|&r| layers[0].t(r).is_nan()));
    assert_eq!(refs(&layers[1]).iter().filter(|&&r| layers[1].t(r) == 0.0).count(), 1);

    fill_t(&mut layers[0], |p| p.y);
    fill_t(&mut layers[1], |p| p.y + 10.0);
    let shift = recentre(&mut layers);
    assert!(shift > 0.0);
    assert!(mean_time(&layers).abs() < 1e-9);
    pick_tref(&mut layers);
    assert_eq!(layers.iter().filter(|l| l.tref().is_some()).count(), 1);
}

#[test]
fn unlinked_components_solve_with_one_reference() {
    let mut set = scene("square-isoline").unwrap();
    set.add(rectangle("apart", vector![3.0, 0.0], 1.0, 1.0));
    let mut s = Solver::new(set, SolverParams::default()).unwrap();
    s.run();
    for (l, layers) in s.levels().iter().enumerate() {
        let trefs = layers.iter().filter(|x| x.tref().is_some()).count();
        assert_eq!(trefs, 1, "level {l}");
        assert!(all_times_valid(layers), "level {l}");
        assert!(mean_time(layers).abs() < 1e-6, "level {l}: mean {}", mean_time(layers));
    }
}

#[test]
fn stretch_measures_gradient_per_kappa() {
    let mut layers = square(0.1);
    let layer = &mut layers[0];
    let c = center(layer);
    assert_eq!(time_stretch(layer, c), None);
    fill_t(layer, |p| 2.0 * p.y);
    assert!((time_stretch(layer, c).unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn upscaling_keeps_gradient_per_grid_unit() {
    let mut coarse = square(0.2);
    let mut fine = square(0.1);
    fill_uv(&mut coarse[0], vector![0.0, 1.0]);
    fill_t(&mut coarse[0], |p| p.y);
    fill_uv(&mut fine[0], Vector2::zeros());
    let moved = upscale(&coarse, &mut fine, &Default::default());
    assert_eq!(moved, fine[0].num_samples());
    let layer = &fine[0];
    for (i, s) in layer.inner().iter().enumerate() {
        let r = SampleRef::Inner(i);
        assert!(close(layer.uv(r), vector![0.0, 1.0], 1e-9));
        if !s.is_intermediate() {
            let st = time_stretch(layer, r).unwrap();
            assert!((st - 1.0).abs() < 0.05, "{r:?}: stretch {st}");
        }
    }
}

// --- validation ---

#[test]
fn linear_solution_validates_clean() {
    let mut layers = square(0.1);
    fill_uv(&mut layers[0], vector![0.0, 1.0]);
    fill_t(&mut layers[0], |p| p.y - 5.0);
    let report = validate(&layers, &SolverParams::default());
    assert!(report.is_ok(), "{:?}", report.issues);
    assert_eq!(report.warnings().count(), 0);
}

#[test]
fn validation_flags_defects() {
    let mut layers = square(0.1);
    let layer = &mut layers[0];
    fill_uv(layer, vector![0.0, 1.0]);
    fill_t(layer, |p| p.y - 5.0);
    let c = center(layer);
    layer.set_t(c, 100.0);
    let flipped = SampleRef::Inner(layer.sample_at_grid(3, 3).unwrap());
    layer.set_uv(flipped, vector![0.0, -1.0]);
    let report = validate(&layers, &SolverParams::default());
    assert!(report.count(IssueKind::LocalTimeExtrema) >= 1);
    assert!(report.count(IssueKind::OpposingFlows) >= 1);
    assert!(report.count(IssueKind::FlowChangesTooFast) >= 1);
    assert!(!report.is_ok());
    assert_eq!(IssueKind::OpposingFlows.to_string(), "Two opposing flows do not merge");
    assert_eq!(IssueKind::TimeStretchPeaks.severity(), Severity::Warning);
}

#[test]
fn curl_detects_rotation() {
    let mut layers = square(0.1);
    let layer = &mut layers[0];
    fill_uv(layer, vector![0.0, 1.0]);
    let quad = layer.full_quad(5, 5).unwrap();
    assert!(quad_curl(layer, quad).abs() < 1e-12);
    let mid = vector![5.5, 5.5];
    for q in quad {
        let r = SampleRef::Inner(q);
        let d = layer.pos(r) - mid;
        layer.set_uv(r, vector![-d.y, d.x].normalize());
    }
    assert!(quad_curl(layer, quad) >= 1.0);
    let report = validate(&layers, &SolverParams::default());
    assert!(report.count(IssueKind::LargeInteriorRotation) >= 1);
}

#[test]
fn family_time_gaps_are_errors() {
    let (mut layers, _) = squares_with(TransmissionType::Same);
    for layer in layers.iter_mut() {
        fill_t(layer, |_| 0.0);
    }
    let partner = (0..layers[1].border().len())
        .find(|&bi| layers[1].border_sample(bi).vertex.layer == 0)
        .unwrap();
    layers[1].set_t(SampleRef::Border(partner), 1.0);
    let report = validate(&layers, &SolverParams::default());
    assert_eq!(report.count(IssueKind::FamilyTimeMismatch), 1);
}

// --- stage machine ---

fn solver(name: &str, params: SolverParams) -> Solver {
    Solver::new(scene(name).unwrap(), params).unwrap()
}

#[test]
fn stages_advance_coarse_to_fine() {
    let mut s = solver("square-isoline", SolverParams::default());
    assert_eq!(s.stage(), Stage::Flow);
    assert_eq!(s.level(), 0);
    assert!(s.progress() <= 0.25);
    let mut seen_time = false;
    while s.iterate() != Stage::Done {
        let p = s.progress();
        assert!((0.0..=1.0).contains(&p));
        seen_time |= s.stage() == Stage::Time;
    }
    assert!(seen_time);
    assert_eq!(s.progress(), 1.0);
    let stages: Vec<(usize, Stage)> = s.reports().iter().map(|r| (r.level, r.stage)).collect();
    assert_eq!(
        stages,
        vec![(0, Stage::Flow), (0, Stage::Time), (1, Stage::Flow), (1, Stage::Time)]
    );
    assert!(s.validation().is_some());
    assert_eq!(s.finest()[0].level, 1);
}

#[test]
fn run_reports_convergence_and_samples_fields() {
    let mut s = solver("square-isoline", SolverParams::default());
    let summary = s.run();
    assert!(summary.converged(), "{:?}", summary.stages);
    assert!(summary.validation.is_ok(), "{:?}", summary.validation.issues);
    let (uv, t) = s.sample_at(0, vector![0.5, 0.75]).unwrap();
    assert!(close(uv, vector![0.0, 1.0], 1e-6));
    assert!((t - 2.5).abs() < 1e-3, "t = {t}");
    assert!(s.sample_at(0, vector![5.0, 5.0]).is_none());
}

#[test]
fn invert_time_negates_the_result() {
    let mut a = solver("square-isoline", SolverParams::default());
    a.run();
    let mut b = solver(
        "square-isoline",
        SolverParams {
            invert_time: true,
            ..SolverParams::default()
        },
    );
    b.run();
    let (la, lb) = (&a.finest()[0], &b.finest()[0]);
    for r in refs(la) {
        assert!((la.t(r) + lb.t(r)).abs() < 1e-12);
    }
}

#[test]
fn solver_rejects_bad_inputs() {
    assert!(matches!(
        Solver::new(SketchSet::new(), SolverParams::default()),
        Err(Error::InvalidArgument(_))
    ));
    let params = SolverParams {
        eta: -1.0,
        ..SolverParams::default()
    };
    assert!(matches!(
        Solver::new(scene("square-isoline").unwrap(), params),
        Err(Error::InvalidArgument(_))
    ));
}
