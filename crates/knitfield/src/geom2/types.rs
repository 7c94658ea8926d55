//! Basic 2D types and tolerances.
//!
//! - `GeomCfg`: centralizes epsilons for positions, areas and parallel tests.
//! - `Rot2`: rotation as a unit complex number `(x, y)`, `x² + y² = 1`.
//! - `Bbox2`: axis-aligned bounding box.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Geometry configuration (tolerances).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomCfg {
    /// Position tolerance in grid units (sample hits, on-edge tests).
    pub eps_pos: f64,
    /// Minimum absolute triangle area in grid units² before a triangle is dropped.
    pub eps_area: f64,
    /// Determinant threshold for (near-)parallel lines.
    pub eps_det: f64,
    /// Norm floor below which a vector is considered zero.
    pub eps_norm: f64,
}

impl Default for GeomCfg {
    fn default() -> Self {
        Self {
            eps_pos: 1e-2,
            eps_area: 1e-6,
            eps_det: 1e-12,
            eps_norm: 1e-6,
        }
    }
}

/// Rotation stored as a unit complex number.
///
/// Invariants:
/// - `x² + y² = 1` up to rounding; constructors normalize.
/// - Identity is `(1, 0)`; composition is complex multiplication and the
///   inverse is the conjugate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rot2 {
    pub x: f64,
    pub y: f64,
}

impl Default for Rot2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot2 {
    pub const IDENTITY: Rot2 = Rot2 { x: 1.0, y: 0.0 };

    /// Rotation from a direction vector; `None` for (near-)zero input.
    #[inline]
    pub fn from_dir(d: Vector2<f64>) -> Option<Self> {
        let n = d.norm();
        if !n.is_finite() || n < 1e-12 {
            return None;
        }
        Some(Self {
            x: d.x / n,
            y: d.y / n,
        })
    }

    /// Rotation from an angle in radians. Only used to normalize inputs.
    #[inline]
    pub fn from_angle(theta: f64) -> Self {
        Self {
            x: theta.cos(),
            y: theta.sin(),
        }
    }

    /// Rotation taking direction `a` onto direction `b`: `b · conj(a)`.
    ///
    /// Returns identity when either direction is degenerate.
    pub fn between(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        match (Self::from_dir(a), Self::from_dir(b)) {
            (Some(ra), Some(rb)) => rb * ra.conj(),
            _ => Self::IDENTITY,
        }
    }

    #[inline]
    pub fn conj(self) -> Self {
        Self {
            x: self.x,
            y: -self.y,
        }
    }

    #[inline]
    pub fn apply(self, v: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(self.x * v.x - self.y * v.y, self.y * v.x + self.x * v.y)
    }

    /// Half rotation on the principal branch (angle in (-π, π] halved).
    ///
    /// The half-turn `(-1, 0)` maps to `(0, 1)`; `(-1, -0)` style inputs with a
    /// negative `y` map to `(0, -1)`.
    pub fn half(self) -> Self {
        let mx = 1.0 + self.x;
        let my = self.y;
        let n = (mx * mx + my * my).sqrt();
        if n < 1e-12 {
            return Self {
                x: 0.0,
                y: if self.y < 0.0 { -1.0 } else { 1.0 },
            };
        }
        Self {
            x: mx / n,
            y: my / n,
        }
    }

    /// Angle in radians, for diagnostics only.
    #[inline]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    #[inline]
    pub fn as_vec(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Re-project onto the unit circle after long products.
    #[inline]
    pub fn renormalize(self) -> Self {
        Self::from_dir(self.as_vec()).unwrap_or(Self::IDENTITY)
    }

    /// Distance to another rotation on the unit circle (chord length).
    #[inline]
    pub fn distance(self, other: Rot2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::ops::Mul for Rot2 {
    type Output = Rot2;
    #[inline]
    fn mul(self, rhs: Rot2) -> Rot2 {
        Rot2 {
            x: self.x * rhs.x - self.y * rhs.y,
            y: self.x * rhs.y + self.y * rhs.x,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bbox2 {
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
}

impl Default for Bbox2 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bbox2 {
    pub fn empty() -> Self {
        Self {
            min: Vector2::new(f64::INFINITY, f64::INFINITY),
            max: Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a, I: IntoIterator<Item = &'a Vector2<f64>>>(pts: I) -> Self {
        let mut b = Self::empty();
        for p in pts {
            b.include(*p);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    #[inline]
    pub fn include(&mut self, p: Vector2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &Bbox2) -> Bbox2 {
        let mut b = *self;
        if !other.is_empty() {
            b.include(other.min);
            b.include(other.max);
        }
        b
    }

    /// Box grown by `r` on every side.
    #[inline]
    pub fn expanded(&self, r: f64) -> Bbox2 {
        Bbox2 {
            min: self.min - Vector2::new(r, r),
            max: self.max + Vector2::new(r, r),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vector2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn intersects(&self, other: &Bbox2) -> bool {
        !(other.min.x > self.max.x
            || other.max.x < self.min.x
            || other.min.y > self.max.y
            || other.max.y < self.min.y)
    }

    #[inline]
    pub fn size(&self) -> Vector2<f64> {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vector2<f64> {
        (self.min + self.max) * 0.5
    }
}
