//! Random star-shaped sketches (radial jitter + replay tokens).
//!
//! Purpose
//! - Deterministic, parameterizable outlines for property tests and benches.
//!
//! Model
//! - Start from `n` equally spaced angles on [0, 2π), add bounded angular and
//!   radial jitter and connect the points counter-clockwise with lines. The
//!   result is star-shaped around the origin, hence simple.
//! - Determinism uses a replay token `(seed, index)` mixed into a single RNG.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::Sketch;

/// Star sampler configuration.
#[derive(Clone, Copy, Debug)]
pub struct StarCfg {
    pub vertices: usize,
    /// Angular jitter as a fraction of the base spacing Δ=2π/n. Clamped to [0, 0.45].
    pub angle_jitter_frac: f64,
    /// Radii are `radius * (1 + u)`, `u ∈ [-radial_jitter, radial_jitter]`; clamped to [0, 0.8].
    pub radial_jitter: f64,
    pub radius: f64,
}

impl Default for StarCfg {
    fn default() -> Self {
        Self {
            vertices: 9,
            angle_jitter_frac: 0.3,
            radial_jitter: 0.3,
            radius: 1.0,
        }
    }
}

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    #[inline]
    pub fn new(seed: u64, index: u64) -> Self {
        Self { seed, index }
    }

    /// SplitMix-style mix of seed and index into one RNG seed.
    #[inline]
    fn mixed(&self) -> u64 {
        let mut z = self
            .seed
            .wrapping_add(self.index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Draw one star-shaped polygon sketch.
pub fn draw_star_sketch(cfg: &StarCfg, token: ReplayToken) -> Sketch {
    let mut rng = StdRng::seed_from_u64(token.mixed());
    let n = cfg.vertices.max(3);
    let delta = std::f64::consts::TAU / n as f64;
    let aj = cfg.angle_jitter_frac.clamp(0.0, 0.45) * delta;
    let rj = cfg.radial_jitter.clamp(0.0, 0.8);
    let pts: Vec<Vector2<f64>> = (0..n)
        .map(|k| {
            let a = k as f64 * delta + rng.gen_range(-aj..=aj);
            let r = cfg.radius * (1.0 + rng.gen_range(-rj..=rj));
            Vector2::new(r * a.cos(), r * a.sin())
        })
        .collect();
    Sketch::from_polygon(format!("star-{}-{}", token.seed, token.index), &pts)
}
