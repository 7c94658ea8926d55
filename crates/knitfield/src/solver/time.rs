//! Time relaxation: neighborhood sweep, isoline groups, family averaging
//! and recentring.

use std::collections::HashMap;

use nalgebra::{Matrix2, Vector2};

use super::params::{DTimeEquation, SolverParams};
use crate::link::{family, is_representative};
use crate::mesh::{InnerKind, MeshLayer, SampleKey, SampleRef};
use crate::sketch::ConstraintType;

/// Expected `t_n − t_s` is the negation of this value; `d = pos_n − pos_s`.
pub fn neighbor_dt(
    eq: DTimeEquation,
    (uv_s, k_s): (Vector2<f64>, f64),
    (uv_n, k_n): (Vector2<f64>, f64),
    d: Vector2<f64>,
) -> f64 {
    match eq {
        DTimeEquation::Source => -uv_s.dot(&d),
        DTimeEquation::Target => -uv_n.dot(&d),
        DTimeEquation::Bidir => -0.5 * (k_s * uv_s.dot(&d) + k_n * uv_n.dot(&d)),
    }
}

/// Per-sample cache of the mean neighborhood `dt`, NaN until every neighbor
/// has a time. Flows are frozen during a time stage, so entries stay valid
/// until the cache is reset.
#[derive(Clone, Debug, Default)]
pub struct DtCache {
    inner: Vec<Vec<f64>>,
    border: Vec<Vec<f64>>,
}

impl DtCache {
    pub fn new(layers: &[MeshLayer]) -> Self {
        Self {
            inner: layers.iter().map(|l| vec![f64::NAN; l.inner().len()]).collect(),
            border: layers.iter().map(|l| vec![f64::NAN; l.border().len()]).collect(),
        }
    }

    #[inline]
    pub fn get(&self, key: SampleKey) -> f64 {
        match key.sample {
            SampleRef::Inner(i) => self.inner[key.layer][i],
            SampleRef::Border(i) => self.border[key.layer][i],
        }
    }

    #[inline]
    fn set(&mut self, key: SampleKey, v: f64) {
        match key.sample {
            SampleRef::Inner(i) => self.inner[key.layer][i] = v,
            SampleRef::Border(i) => self.border[key.layer][i] = v,
        }
    }

    pub fn cached(&self) -> usize {
        self.inner
            .iter()
            .chain(&self.border)
            .flatten()
            .filter(|v| v.is_finite())
            .count()
    }
}

/// Outcome of one time sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSweep {
    /// Largest time change over representatives that already had a time.
    pub max_dt: f64,
    /// Representatives that still have no time.
    pub missing: usize,
}

/// One Gauss–Seidel pass over family representatives.
///
/// Each representative takes its neighborhood prediction, pulled toward the
/// isoline times of `groups`, so a settled field is a fixed point of the
/// sweep. The predictions are accumulated into `groups`; call
/// [`TimeGroups::settle`] after the pass.
///
/// With `pinned`, the reference sample of each layer is held at zero.
pub fn time_sweep(
    layers: &mut [MeshLayer],
    cache: &mut DtCache,
    groups: &mut TimeGroups,
    iter: usize,
    params: &SolverParams,
    level: usize,
    pinned: bool,
) -> TimeSweep {
    let moment = if level > 0 { params.time_moment } else { 0.0 };
    let mut max_dt = 0.0f64;
    let mut missing = 0;
    for li in 0..layers.len() {
        let order: Vec<SampleRef> = layers[li].samples(iter).to_vec();
        let tref = layers[li].tref();
        for r in order {
            let key = SampleKey::new(li, r);
            if !is_representative(layers, key) {
                continue;
            }
            let old = layers[li].t(r);
            if pinned && matches!(r, SampleRef::Inner(i) if Some(i) == tref) {
                if old.is_finite() {
                    max_dt = max_dt.max(old.abs());
                }
                layers[li].set_t(r, 0.0);
                continue;
            }
            let members = family(layers, key);
            let cached = cache.get(key);
            let mut sum_t = 0.0;
            let mut sum_dt = 0.0;
            let mut count = 0usize;
            let mut complete = true;
            for m in &members {
                let layer = &layers[m.key.layer];
                let s = m.key.sample;
                let (uv_s, k_s, p_s) = (layer.uv(s), layer.kappa(s), layer.pos(s));
                for n in layer.neighbors(s) {
                    if let (Some(si), Some(ni)) = (s.border(), n.sample.border()) {
                        if layer.border_sample(si).edge_open_towards(ni) {
                            continue;
                        }
                    }
                    if members.iter().any(|o| o.key == SampleKey::new(m.key.layer, n.sample)) {
                        continue;
                    }
                    let t_n = layer.t(n.sample);
                    if !t_n.is_finite() {
                        complete = false;
                        continue;
                    }
                    sum_t += t_n;
                    count += 1;
                    if cached.is_nan() {
                        let d = layer.pos(n.sample) - p_s;
                        sum_dt += neighbor_dt(
                            params.dtime_equation,
                            (uv_s, k_s),
                            (layer.uv(n.sample), layer.kappa(n.sample)),
                            d,
                        );
                    }
                }
            }
            if count == 0 {
                if !old.is_finite() {
                    missing += 1;
                }
                continue;
            }
            let nh_t = if cached.is_finite() {
                sum_t / count as f64 + cached
            } else {
                if complete {
                    cache.set(key, sum_dt / count as f64);
                }
                (sum_t + sum_dt) / count as f64
            };
            let mut coupled = 0.0;
            for m in &members {
                groups.accumulate(m.key, nh_t);
                coupled += groups.coupled(m.key, nh_t);
            }
            coupled /= members.len() as f64;
            let new = if moment > 0.0 && old.is_finite() {
                coupled + moment * (coupled - old)
            } else {
                coupled
            };
            if old.is_finite() {
                max_dt = max_dt.max((new - old).abs());
            }
            for m in &members {
                layers[m.key.layer].set_t(m.key.sample, new);
            }
        }
    }
    TimeSweep { max_dt, missing }
}

/// Whether every sample of every layer has a time.
pub fn all_times_valid(layers: &[MeshLayer]) -> bool {
    layers.iter().all(|l| all_refs(l).all(|r| l.t(r).is_finite()))
}

/// Give every non-open family the mean time of its members.
pub fn average_families(layers: &mut [MeshLayer]) {
    for li in 0..layers.len() {
        for bi in 0..layers[li].border().len() {
            let key = SampleKey::border(li, bi);
            if !layers[li].border_sample(bi).has_links() || !is_representative(layers, key) {
                continue;
            }
            let members = family(layers, key);
            if members.len() < 2 {
                continue;
            }
            let (sum, n) = members
                .iter()
                .map(|m| layers[m.key.layer].t(m.key.sample))
                .filter(|t| t.is_finite())
                .fold((0.0, 0usize), |(s, n), t| (s + t, n + 1));
            if n == 0 {
                continue;
            }
            let mean = sum / n as f64;
            for m in &members {
                layers[m.key.layer].set_t(m.key.sample, mean);
            }
        }
    }
}

fn all_refs(layer: &MeshLayer) -> impl Iterator<Item = SampleRef> {
    (0..layer.inner().len())
        .map(SampleRef::Inner)
        .chain((0..layer.border().len()).map(SampleRef::Border))
}

/// Mean time over all samples of a level, NaN when none has a time.
pub fn mean_time(layers: &[MeshLayer]) -> f64 {
    let (sum, n) = layers
        .iter()
        .flat_map(|l| all_refs(l).map(move |r| l.t(r)))
        .filter(|t| t.is_finite())
        .fold((0.0, 0usize), |(s, n), t| (s + t, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Shift every time of the level so the mean is zero. Returns the shift.
pub fn recentre(layers: &mut [MeshLayer]) -> f64 {
    let mean = mean_time(layers);
    if !mean.is_finite() || mean == 0.0 {
        return 0.0;
    }
    for layer in layers.iter_mut() {
        let refs: Vec<SampleRef> = all_refs(layer).collect();
        for r in refs {
            let t = layer.t(r);
            if t.is_finite() {
                layer.set_t(r, t - mean);
            }
        }
    }
    mean
}

fn most_central(layer: &MeshLayer) -> Option<usize> {
    let center = Vector2::new(layer.width as f64 - 1.0, layer.height as f64 - 1.0) * 0.5;
    layer
        .inner()
        .iter()
        .enumerate()
        .map(|(i, s)| ((s.pos() - center).norm(), i))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, i)| i)
}

/// Move the single time reference of the level to the inner sample closest
/// to the mean time, or to the most central inner sample of the first layer
/// before any time exists. Every other layer loses its reference.
pub fn pick_tref(layers: &mut [MeshLayer]) {
    let mean = mean_time(layers);
    let mut best: Option<(usize, usize)> = None;
    if mean.is_finite() {
        let mut best_gap = f64::INFINITY;
        for (li, layer) in layers.iter().enumerate() {
            for i in 0..layer.inner().len() {
                let gap = (layer.t(SampleRef::Inner(i)) - mean).abs();
                if gap < best_gap {
                    best_gap = gap;
                    best = Some((li, i));
                }
            }
        }
    } else {
        best = layers
            .iter()
            .enumerate()
            .find_map(|(li, l)| most_central(l).map(|i| (li, i)));
    }
    for (li, layer) in layers.iter_mut().enumerate() {
        layer.tref = match best {
            Some((bl, bi)) if bl == li => Some(bi),
            _ => None,
        };
    }
}

/// Start every component that has no time yet and no reference sample at
/// its most central inner sample, so unlinked components get times too.
pub fn seed_components(layers: &mut [MeshLayer], components: &[Vec<usize>]) {
    for comp in components {
        let timed = comp.iter().filter_map(|&li| layers.get(li)).any(|l| {
            l.tref().is_some() || all_refs(l).any(|r| l.t(r).is_finite())
        });
        if timed {
            continue;
        }
        let seed = comp
            .iter()
            .find_map(|&li| layers.get(li).and_then(most_central).map(|i| (li, i)));
        if let Some((li, i)) = seed {
            layers[li].set_t(SampleRef::Inner(i), 0.0);
        }
    }
}

/// Local time stretch `|∇t| / κ` of a sample, from a least-squares gradient
/// over its timed neighbors. `None` without a time or a well-posed fit.
pub fn time_stretch(layer: &MeshLayer, r: SampleRef) -> Option<f64> {
    let t = layer.t(r);
    if !t.is_finite() {
        return None;
    }
    let p = layer.pos(r);
    let mut a = Matrix2::zeros();
    let mut b = Vector2::zeros();
    for n in layer.neighbors(r) {
        let t_n = layer.t(n.sample);
        if !t_n.is_finite() {
            continue;
        }
        let d = layer.pos(n.sample) - p;
        a += d * d.transpose();
        b += d * (t_n - t);
    }
    if a.determinant().abs() < 1e-9 {
        return None;
    }
    let g = a.try_inverse()? * b;
    let k = layer.kappa(r);
    (k > 0.0).then(|| g.norm() / k)
}

/// Whether every regular inner sample has its stretch within `[lo, hi]`.
pub fn stretch_within(layers: &[MeshLayer], lo: f64, hi: f64) -> bool {
    layers.iter().all(|l| {
        l.inner().iter().enumerate().all(|(i, s)| {
            s.kind != InnerKind::Regular
                || time_stretch(l, SampleRef::Inner(i)).map_or(true, |st| (lo..=hi).contains(&st))
        })
    })
}

/// One isoline constraint entry of a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeMember {
    pub key: SampleKey,
    /// Index into the sample's constraint list.
    pub constraint: usize,
    pub weight: f64,
    /// `κ · uv · (layer_pos − pos)`; NaN when the sample has no flow.
    pub dt: f64,
}

/// Samples sharing one isoline time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeGroup {
    pub members: Vec<TimeMember>,
    /// Mean isoline time of the members; NaN before any member has a time.
    pub time: f64,
}

/// Isoline groups of a level, with the memberships of every sample.
#[derive(Clone, Debug, Default)]
pub struct TimeGroups {
    pub groups: Vec<TimeGroup>,
    by_sample: Vec<(SampleKey, Vec<(usize, usize)>)>,
    /// Sum and count of member predictions `t + dt` gathered during a sweep.
    acc: Vec<(f64, usize)>,
}

fn find(parent: &mut [usize], x: usize) -> usize {
    if parent[x] != x {
        parent[x] = find(parent, parent[x]);
    }
    parent[x]
}

fn union(parent: &mut [usize], rank: &mut [usize], x: usize, y: usize) {
    let px = find(parent, x);
    let py = find(parent, y);
    if px == py {
        return;
    }
    if rank[px] < rank[py] {
        parent[px] = py;
    } else if rank[px] > rank[py] {
        parent[py] = px;
    } else {
        parent[py] = px;
        rank[px] += 1;
    }
}

impl TimeGroups {
    /// Refresh the isoline offsets of every constraint entry and group the
    /// `(layer, curve)` pairs that meet on a sample or across a link.
    pub fn build(layers: &mut [MeshLayer], params: &SolverParams) -> TimeGroups {
        struct Entry {
            member: TimeMember,
            node: usize,
            layer_dist: f64,
            layer_pos: Vector2<f64>,
        }
        let mut nodes: HashMap<(usize, usize), usize> = HashMap::new();
        let mut entries: Vec<Entry> = Vec::new();
        for (li, layer) in layers.iter_mut().enumerate() {
            let refs: Vec<SampleRef> = all_refs(layer).collect();
            for r in refs {
                let uv = layer.uv(r);
                let k = layer.kappa(r);
                let p = layer.pos(r);
                for (ci, c) in layer.constraints_mut(r).iter_mut().enumerate() {
                    if c.kind != ConstraintType::Isoline {
                        continue;
                    }
                    c.dt = if uv.norm() > 0.0 {
                        k * uv.dot(&(c.layer_pos - p))
                    } else {
                        f64::NAN
                    };
                    let next = nodes.len();
                    let node = *nodes.entry((li, c.curve)).or_insert(next);
                    entries.push(Entry {
                        member: TimeMember {
                            key: SampleKey::new(li, r),
                            constraint: ci,
                            weight: c.weight,
                            dt: c.dt,
                        },
                        node,
                        layer_dist: c.layer_dist,
                        layer_pos: c.layer_pos,
                    });
                }
            }
        }

        let mut by_key: HashMap<SampleKey, Vec<usize>> = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            by_key.entry(e.member.key).or_default().push(i);
        }
        let mut parent: Vec<usize> = (0..nodes.len()).collect();
        let mut rank = vec![0usize; nodes.len()];
        for idx in by_key.values() {
            for (a, &i) in idx.iter().enumerate() {
                for &j in &idx[a + 1..] {
                    let (ei, ej) = (&entries[i], &entries[j]);
                    if (ei.layer_pos - ej.layer_pos).norm() <= params.iso_merge_dist {
                        union(&mut parent, &mut rank, ei.node, ej.node);
                    }
                }
            }
        }
        for (key, idx) in &by_key {
            if !key.sample.is_border() {
                continue;
            }
            for m in family(layers, *key).iter().skip(1) {
                let Some(other) = by_key.get(&m.key) else {
                    continue;
                };
                for &i in idx {
                    for &j in other {
                        if (entries[i].layer_dist - entries[j].layer_dist).abs() <= params.iso_merge_dist {
                            union(&mut parent, &mut rank, entries[i].node, entries[j].node);
                        }
                    }
                }
            }
        }

        let mut group_of: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<TimeGroup> = Vec::new();
        let mut memberships: HashMap<SampleKey, Vec<(usize, usize)>> = HashMap::new();
        for e in &entries {
            let root = find(&mut parent, e.node);
            let gi = *group_of.entry(root).or_insert_with(|| {
                groups.push(TimeGroup {
                    members: Vec::new(),
                    time: f64::NAN,
                });
                groups.len() - 1
            });
            memberships
                .entry(e.member.key)
                .or_default()
                .push((gi, groups[gi].members.len()));
            groups[gi].members.push(e.member);
        }
        let mut by_sample: Vec<(SampleKey, Vec<(usize, usize)>)> = memberships.into_iter().collect();
        by_sample.sort_by_key(|(k, _)| *k);
        let acc = vec![(0.0, 0); groups.len()];
        TimeGroups {
            groups,
            by_sample,
            acc,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn memberships(&self, key: SampleKey) -> &[(usize, usize)] {
        match self.by_sample.binary_search_by_key(&key, |(k, _)| *k) {
            Ok(i) => self.by_sample[i].1.as_slice(),
            Err(_) => &[],
        }
    }

    /// Time of `key` given its own estimate `t`, pulled toward the isoline
    /// times of its groups by the constraint weights. A total weight of at
    /// least 1 replaces `t` entirely.
    pub fn coupled(&self, key: SampleKey, t: f64) -> f64 {
        let mut sum_t = 0.0;
        let mut sum_w = 0.0;
        for &(gi, mi) in self.memberships(key) {
            let g = &self.groups[gi];
            let m = &g.members[mi];
            if g.time.is_finite() && m.dt.is_finite() {
                sum_t += (g.time - m.dt) * m.weight;
                sum_w += m.weight;
            }
        }
        if sum_w <= 0.0 {
            t
        } else if sum_w >= 1.0 || !t.is_finite() {
            sum_t / sum_w
        } else {
            sum_t + (1.0 - sum_w) * t
        }
    }

    /// Record the estimate `t` of `key` toward its groups' next times.
    pub fn accumulate(&mut self, key: SampleKey, t: f64) {
        let Ok(i) = self.by_sample.binary_search_by_key(&key, |(k, _)| *k) else {
            return;
        };
        for &(gi, mi) in &self.by_sample[i].1 {
            let v = t + self.groups[gi].members[mi].dt;
            if v.is_finite() {
                let a = &mut self.acc[gi];
                a.0 += v;
                a.1 += 1;
            }
        }
    }

    /// Move every group that received estimates to their mean and clear the
    /// accumulators.
    pub fn settle(&mut self) {
        for (g, a) in self.groups.iter_mut().zip(&mut self.acc) {
            if a.1 > 0 {
                g.time = a.0 / a.1 as f64;
            }
            *a = (0.0, 0);
        }
    }

    /// Apply a uniform time shift `t ← t − delta` to the group times.
    pub fn shift(&mut self, delta: f64) {
        for g in &mut self.groups {
            g.time -= delta;
        }
    }

    /// Set group times from the current member times, then pull every
    /// member toward them.
    pub fn couple(&mut self, layers: &mut [MeshLayer]) {
        for g in &mut self.groups {
            let (sum, n) = g
                .members
                .iter()
                .map(|m| layers[m.key.layer].t(m.key.sample) + m.dt)
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            g.time = if n == 0 { f64::NAN } else { sum / n as f64 };
        }
        for (key, _) in &self.by_sample {
            let layer = &mut layers[key.layer];
            let t = layer.t(key.sample);
            let new = self.coupled(*key, t);
            if new.is_finite() {
                layer.set_t(key.sample, new);
            }
        }
    }
}
