//! CPU rasterization into `W×H` cell masks.
//!
//! Cells are sampled at integer grid positions: cell `(x, y)` stands for the
//! point `(x, y)` in grid coordinates.

use nalgebra::Vector2;

use crate::geom2::project_on_segment;

/// Boolean mask over a `width × height` grid, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: bool) {
        self.bits[y * self.width + x] = v;
    }

    /// Like `get`, with out-of-range cells reading as empty.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.get(x as usize, y as usize)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Scanline parity fill of a closed polygon.
pub fn fill_polygon(poly: &[Vector2<f64>], width: usize, height: usize) -> Mask {
    let mut mask = Mask::new(width, height);
    let n = poly.len();
    if n < 3 {
        return mask;
    }
    let mut xs: Vec<f64> = Vec::new();
    for y in 0..height {
        let yf = y as f64;
        xs.clear();
        for i in 0..n {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            // half-open rule on y so shared vertices count once
            if (a.y > yf) != (b.y > yf) {
                xs.push(a.x + (yf - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        xs.sort_by(|p, q| p.total_cmp(q));
        for pair in xs.chunks_exact(2) {
            let x0 = pair[0].ceil().max(0.0);
            let x1 = pair[1].floor().min(width as f64 - 1.0);
            if x1 < x0 {
                continue;
            }
            for x in x0 as usize..=x1 as usize {
                mask.set(x, y, true);
            }
        }
    }
    mask
}

/// Distance buffer of a stroked polyline: cells within `radius` of the
/// polyline receive their distance, others `+∞`.
///
/// `closed` strokes the closing edge as well.
pub fn stroke_distance(
    poly: &[Vector2<f64>],
    closed: bool,
    radius: f64,
    width: usize,
    height: usize,
) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; width * height];
    let n = poly.len();
    if n == 0 {
        return dist;
    }
    let edges = if closed { n } else { n.saturating_sub(1) };
    let mut visit = |a: Vector2<f64>, b: Vector2<f64>| {
        let x0 = (a.x.min(b.x) - radius).floor().max(0.0) as usize;
        let y0 = (a.y.min(b.y) - radius).floor().max(0.0) as usize;
        let x1 = (a.x.max(b.x) + radius).ceil().min(width as f64 - 1.0);
        let y1 = (a.y.max(b.y) + radius).ceil().min(height as f64 - 1.0);
        if x1 < 0.0 || y1 < 0.0 {
            return;
        }
        for y in y0..=y1 as usize {
            for x in x0..=x1 as usize {
                let d = project_on_segment(Vector2::new(x as f64, y as f64), a, b).dist;
                let slot = &mut dist[y * width + x];
                if d <= radius && d < *slot {
                    *slot = d;
                }
            }
        }
    };
    if edges == 0 {
        visit(poly[0], poly[0]);
    }
    for i in 0..edges {
        visit(poly[i], poly[(i + 1) % n]);
    }
    dist
}
