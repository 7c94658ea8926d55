//! `MeshLayer`: samples, packed fields, coordinate maps and adjacency.

use nalgebra::Vector2;

use super::types::{
    BorderSample, ConstraintData, InnerKind, InnerSample, Neighbor, SampleRef, CHANNELS, K, T, U,
    V,
};

const NONE: usize = usize::MAX;

/// Discretization of one sketch at one resolution level.
///
/// Inner samples sit on integer grid positions; border samples form one
/// ordered ring. Fields are stored in two packed arrays of `CHANNELS` floats
/// per slot (`fgrid` per grid cell, `bdata` per border sample).
#[derive(Clone, Debug)]
pub struct MeshLayer {
    pub level: usize,
    /// Sketch index, also the layer index within its level.
    pub index: usize,
    pub eta: f64,
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
    pub width: usize,
    pub height: usize,
    pub mirror_x: bool,
    pub(crate) fgrid: Vec<f64>,
    pub(crate) bdata: Vec<f64>,
    pub(crate) inner: Vec<InnerSample>,
    pub(crate) border: Vec<BorderSample>,
    /// First border sample of each segment, plus the ring length at the end.
    pub(crate) seg_offsets: Vec<usize>,
    pub(crate) tref: Option<usize>,
    pub(crate) has_isoline: bool,
    grid_index: Vec<usize>,
    adj_offsets: Vec<usize>,
    adj: Vec<Neighbor>,
    orders: Vec<Vec<SampleRef>>,
    border_buckets: Vec<Vec<usize>>,
}

impl MeshLayer {
    /// Empty layer with initialized field arrays; samples are added by the builder.
    pub(crate) fn empty(
        level: usize,
        index: usize,
        eta: f64,
        min: Vector2<f64>,
        max: Vector2<f64>,
        mirror_x: bool,
    ) -> Self {
        let size = max - min;
        let width = (size.x / eta).ceil().max(0.0) as usize + 1;
        let height = (size.y / eta).ceil().max(0.0) as usize + 1;
        Self {
            level,
            index,
            eta,
            min,
            max,
            width,
            height,
            mirror_x,
            fgrid: Vec::new(),
            bdata: Vec::new(),
            inner: Vec::new(),
            border: Vec::new(),
            seg_offsets: Vec::new(),
            tref: None,
            has_isoline: false,
            grid_index: vec![NONE; width * height],
            adj_offsets: Vec::new(),
            adj: Vec::new(),
            orders: Vec::new(),
            border_buckets: Vec::new(),
        }
    }

    /// Reset all channels: `K = 1`, flow up or zero, time NaN.
    pub(crate) fn init_fields(&mut self, init_up: bool) {
        let v = if init_up { 1.0 } else { 0.0 };
        let slot = [1.0, 0.0, v, f64::NAN];
        self.fgrid = slot.repeat(self.width * self.height);
        self.bdata = slot.repeat(self.border.len());
    }

    // --- coordinate maps ---

    /// Sketch space to grid space.
    #[inline]
    pub fn to_grid(&self, p: Vector2<f64>) -> Vector2<f64> {
        let x = if self.mirror_x {
            self.max.x - p.x
        } else {
            p.x - self.min.x
        };
        Vector2::new(x / self.eta, (p.y - self.min.y) / self.eta)
    }

    /// Grid space to sketch space.
    #[inline]
    pub fn to_sketch(&self, g: Vector2<f64>) -> Vector2<f64> {
        let x = if self.mirror_x {
            self.max.x - g.x * self.eta
        } else {
            self.min.x + g.x * self.eta
        };
        Vector2::new(x, self.min.y + g.y * self.eta)
    }

    // --- samples ---

    #[inline]
    pub fn inner(&self) -> &[InnerSample] {
        &self.inner
    }

    #[inline]
    pub fn border(&self) -> &[BorderSample] {
        &self.border
    }

    #[inline]
    pub fn inner_sample(&self, i: usize) -> &InnerSample {
        &self.inner[i]
    }

    #[inline]
    pub fn border_sample(&self, i: usize) -> &BorderSample {
        &self.border[i]
    }

    #[inline]
    pub(crate) fn border_sample_mut(&mut self, i: usize) -> &mut BorderSample {
        &mut self.border[i]
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.inner.len() + self.border.len()
    }

    /// Inner sample at grid cell `(x, y)`.
    #[inline]
    pub fn sample_at_grid(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        let i = self.grid_index[y as usize * self.width + x as usize];
        (i != NONE).then_some(i)
    }

    /// The time reference sample, if this layer carries it.
    #[inline]
    pub fn tref(&self) -> Option<usize> {
        self.tref
    }

    #[inline]
    pub fn has_isoline(&self) -> bool {
        self.has_isoline
    }

    /// Grid position.
    #[inline]
    pub fn pos(&self, r: SampleRef) -> Vector2<f64> {
        match r {
            SampleRef::Inner(i) => self.inner[i].pos(),
            SampleRef::Border(i) => self.border[i].grid_pos,
        }
    }

    #[inline]
    pub fn sketch_pos(&self, r: SampleRef) -> Vector2<f64> {
        match r {
            SampleRef::Inner(i) => self.to_sketch(self.inner[i].pos()),
            SampleRef::Border(i) => self.border[i].sketch_pos,
        }
    }

    #[inline]
    pub fn constraints(&self, r: SampleRef) -> &[ConstraintData] {
        match r {
            SampleRef::Inner(i) => &self.inner[i].constraints,
            SampleRef::Border(i) => &self.border[i].constraints,
        }
    }

    #[inline]
    pub(crate) fn constraints_mut(&mut self, r: SampleRef) -> &mut Vec<ConstraintData> {
        match r {
            SampleRef::Inner(i) => &mut self.inner[i].constraints,
            SampleRef::Border(i) => &mut self.border[i].constraints,
        }
    }

    #[inline]
    pub fn seam_weight(&self, r: SampleRef) -> f64 {
        match r {
            SampleRef::Inner(i) => self.inner[i].seam_weight,
            SampleRef::Border(i) => self.border[i].seam_weight,
        }
    }

    #[inline]
    pub fn region(&self, r: SampleRef) -> u32 {
        match r {
            SampleRef::Inner(i) => self.inner[i].region,
            SampleRef::Border(i) => self.border[i].region,
        }
    }

    /// Sum of constraint weights carrying a direction (pinned when `≥ 1`).
    pub fn constraint_weight(&self, r: SampleRef) -> f64 {
        self.constraints(r)
            .iter()
            .filter(|c| c.dir.is_some())
            .map(|c| c.weight)
            .sum()
    }

    /// Border sample at `alpha` on `seg`; `alpha = 1` maps to the next segment's corner.
    pub fn border_at(&self, seg: usize, alpha: f64) -> Option<usize> {
        let segs = self.seg_offsets.len().checked_sub(1)?;
        if seg >= segs {
            return None;
        }
        let start = self.seg_offsets[seg];
        let n = self.seg_offsets[seg + 1] - start;
        let k = (alpha.clamp(0.0, 1.0) * n as f64).round() as usize;
        if k >= n {
            Some(if seg + 1 == segs { 0 } else { self.seg_offsets[seg + 1] })
        } else {
            Some(start + k)
        }
    }

    /// Border ring in grid coordinates.
    pub fn ring(&self) -> Vec<Vector2<f64>> {
        self.border.iter().map(|b| b.grid_pos).collect()
    }

    // --- fields ---

    #[inline]
    fn slot(&self, r: SampleRef) -> (bool, usize) {
        match r {
            SampleRef::Inner(i) => {
                let s = &self.inner[i];
                (true, (s.y * self.width + s.x) * CHANNELS)
            }
            SampleRef::Border(i) => (false, i * CHANNELS),
        }
    }

    #[inline]
    pub fn field(&self, r: SampleRef, channel: usize) -> f64 {
        match self.slot(r) {
            (true, o) => self.fgrid[o + channel],
            (false, o) => self.bdata[o + channel],
        }
    }

    #[inline]
    pub(crate) fn set_field(&mut self, r: SampleRef, channel: usize, v: f64) {
        match self.slot(r) {
            (true, o) => self.fgrid[o + channel] = v,
            (false, o) => self.bdata[o + channel] = v,
        }
    }

    #[inline]
    pub fn uv(&self, r: SampleRef) -> Vector2<f64> {
        Vector2::new(self.field(r, U), self.field(r, V))
    }

    #[inline]
    pub(crate) fn set_uv(&mut self, r: SampleRef, uv: Vector2<f64>) {
        self.set_field(r, U, uv.x);
        self.set_field(r, V, uv.y);
    }

    #[inline]
    pub fn t(&self, r: SampleRef) -> f64 {
        self.field(r, T)
    }

    #[inline]
    pub(crate) fn set_t(&mut self, r: SampleRef, t: f64) {
        self.set_field(r, T, t);
    }

    #[inline]
    pub fn kappa(&self, r: SampleRef) -> f64 {
        self.field(r, K)
    }

    /// Packed grid fields, `width · height · CHANNELS` floats.
    #[inline]
    pub fn fgrid(&self) -> &[f64] {
        &self.fgrid
    }

    /// Packed border fields, `border.len() · CHANNELS` floats.
    #[inline]
    pub fn bdata(&self) -> &[f64] {
        &self.bdata
    }

    // --- topology ---

    #[inline]
    fn node(&self, r: SampleRef) -> usize {
        match r {
            SampleRef::Inner(i) => i,
            SampleRef::Border(i) => self.inner.len() + i,
        }
    }

    /// Direct neighbors of a sample (valid after `finalize`).
    #[inline]
    pub fn neighbors(&self, r: SampleRef) -> &[Neighbor] {
        let n = self.node(r);
        match (self.adj_offsets.get(n), self.adj_offsets.get(n + 1)) {
            (Some(&a), Some(&b)) => &self.adj[a..b],
            _ => &[],
        }
    }

    /// Traversal order `iter mod 8` (row/column major, optional X/Y flips).
    #[inline]
    pub fn samples(&self, iter: usize) -> &[SampleRef] {
        if self.orders.is_empty() {
            return &[];
        }
        &self.orders[iter % self.orders.len()]
    }

    /// Border samples whose grid position falls within `radius` cells of `p`.
    pub fn border_near(&self, p: Vector2<f64>, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if self.border_buckets.is_empty() {
            return out;
        }
        let r = radius.ceil() as i64 + 1;
        let cx = p.x.floor() as i64;
        let cy = p.y.floor() as i64;
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
                    continue;
                }
                for &b in &self.border_buckets[y as usize * self.width + x as usize] {
                    if (self.border[b].grid_pos - p).norm() <= radius {
                        out.push(b);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Add a symmetric explicit neighbor relation.
    pub(crate) fn add_neighbor(&mut self, a: SampleRef, b: SampleRef) {
        if a == b {
            return;
        }
        self.push_neighbor(a, b);
        self.push_neighbor(b, a);
    }

    fn push_neighbor(&mut self, a: SampleRef, b: SampleRef) {
        match (a, b) {
            (SampleRef::Inner(i), SampleRef::Inner(j)) => self.inner[i].inner_nbrs.push_unique(j),
            (SampleRef::Inner(i), SampleRef::Border(j)) => self.inner[i].border_nbrs.push_unique(j),
            (SampleRef::Border(i), SampleRef::Inner(j)) => self.border[i].inner_nbrs.push_unique(j),
            (SampleRef::Border(i), SampleRef::Border(j)) => {
                self.border[i].border_nbrs.push_unique(j)
            }
        }
    }

    /// Whether grid cells `(x, y)`..`(x+1, y+1)` all hold inner samples.
    pub fn full_quad(&self, x: i64, y: i64) -> Option<[usize; 4]> {
        Some([
            self.sample_at_grid(x, y)?,
            self.sample_at_grid(x + 1, y)?,
            self.sample_at_grid(x + 1, y + 1)?,
            self.sample_at_grid(x, y + 1)?,
        ])
    }

    /// Register an inner sample at `(x, y)`; returns its index.
    pub(crate) fn push_inner(&mut self, x: usize, y: usize, kind: InnerKind) -> usize {
        let i = self.inner.len();
        self.inner.push(InnerSample {
            x,
            y,
            kind,
            ..Default::default()
        });
        self.grid_index[y * self.width + x] = i;
        i
    }

    /// Rebuild derived indices: grid lookup, adjacency, traversal orders,
    /// border buckets and seam regions.
    pub(crate) fn finalize(&mut self) {
        self.grid_index = vec![NONE; self.width * self.height];
        for (i, s) in self.inner.iter().enumerate() {
            self.grid_index[s.y * self.width + s.x] = i;
        }
        self.build_adjacency();
        self.build_orders();
        self.border_buckets = vec![Vec::new(); self.width * self.height];
        for (i, b) in self.border.iter().enumerate() {
            let x = (b.grid_pos.x.floor().max(0.0) as usize).min(self.width - 1);
            let y = (b.grid_pos.y.floor().max(0.0) as usize).min(self.height - 1);
            self.border_buckets[y * self.width + x].push(i);
        }
        self.build_regions();
    }

    fn build_adjacency(&mut self) {
        let n_inner = self.inner.len();
        let n_border = self.border.len();
        self.adj_offsets = Vec::with_capacity(n_inner + n_border + 1);
        self.adj.clear();
        let mut refs: Vec<SampleRef> = Vec::new();
        for i in 0..n_inner {
            refs.clear();
            let s = &self.inner[i];
            let (x, y) = (s.x as i64, s.y as i64);
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                if let Some(j) = self.sample_at_grid(x + dx, y + dy) {
                    refs.push(SampleRef::Inner(j));
                }
            }
            refs.extend(s.inner_nbrs.iter().map(|&j| SampleRef::Inner(j)));
            refs.extend(s.border_nbrs.iter().map(|&j| SampleRef::Border(j)));
            self.push_adjacency(SampleRef::Inner(i), &mut refs);
        }
        for i in 0..n_border {
            refs.clear();
            let b = &self.border[i];
            if n_border > 1 {
                refs.push(SampleRef::Border(b.prev));
                refs.push(SampleRef::Border(b.next));
            }
            refs.extend(b.inner_nbrs.iter().map(|&j| SampleRef::Inner(j)));
            refs.extend(b.border_nbrs.iter().map(|&j| SampleRef::Border(j)));
            self.push_adjacency(SampleRef::Border(i), &mut refs);
        }
        self.adj_offsets.push(self.adj.len());
    }

    fn push_adjacency(&mut self, r: SampleRef, refs: &mut Vec<SampleRef>) {
        refs.sort_unstable();
        refs.dedup();
        self.adj_offsets.push(self.adj.len());
        let p = self.pos(r);
        for &n in refs.iter() {
            if n == r {
                continue;
            }
            let dist = (self.pos(n) - p).norm();
            self.adj.push(Neighbor { sample: n, dist });
        }
    }

    fn build_orders(&mut self) {
        self.orders = (0..8)
            .map(|k| {
                let col_major = k & 1 != 0;
                let flip_x = k & 2 != 0;
                let flip_y = k & 4 != 0;
                let mut idx: Vec<usize> = (0..self.inner.len()).collect();
                idx.sort_by_key(|&i| {
                    let s = &self.inner[i];
                    let x = if flip_x { self.width - 1 - s.x } else { s.x };
                    let y = if flip_y { self.height - 1 - s.y } else { s.y };
                    if col_major {
                        (x, y)
                    } else {
                        (y, x)
                    }
                });
                let mut order: Vec<SampleRef> = idx.into_iter().map(SampleRef::Inner).collect();
                if flip_x != flip_y {
                    order.extend((0..self.border.len()).rev().map(SampleRef::Border));
                } else {
                    order.extend((0..self.border.len()).map(SampleRef::Border));
                }
                order
            })
            .collect();
    }

    /// Connected components of unblocked samples (`seam_weight < 1`);
    /// blocked samples get `u32::MAX`.
    fn build_regions(&mut self) {
        let n_inner = self.inner.len();
        let total = n_inner + self.border.len();
        let as_ref = |n: usize| {
            if n < n_inner {
                SampleRef::Inner(n)
            } else {
                SampleRef::Border(n - n_inner)
            }
        };
        let mut region = vec![u32::MAX; total];
        let mut next = 0u32;
        let mut stack = Vec::new();
        for start in 0..total {
            if region[start] != u32::MAX || self.seam_weight(as_ref(start)) >= 1.0 {
                continue;
            }
            region[start] = next;
            stack.push(start);
            while let Some(n) = stack.pop() {
                for nb in self.neighbors(as_ref(n)) {
                    let m = self.node(nb.sample);
                    if region[m] == u32::MAX && self.seam_weight(nb.sample) < 1.0 {
                        region[m] = next;
                        stack.push(m);
                    }
                }
            }
            next += 1;
        }
        for (n, r) in region.into_iter().enumerate() {
            match as_ref(n) {
                SampleRef::Inner(i) => self.inner[i].region = r,
                SampleRef::Border(i) => self.border[i].region = r,
            }
        }
    }

    /// Number of seam-separated regions.
    pub fn region_count(&self) -> usize {
        let mut ids: Vec<u32> = self
            .inner
            .iter()
            .map(|s| s.region)
            .chain(self.border.iter().map(|b| b.region))
            .filter(|&r| r != u32::MAX)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

trait PushUnique {
    fn push_unique(&mut self, v: usize);
}

impl PushUnique for Vec<usize> {
    #[inline]
    fn push_unique(&mut self, v: usize) {
        if !self.contains(&v) {
            self.push(v);
        }
    }
}
