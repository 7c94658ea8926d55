//! Built-in sketches and scenes.
//!
//! Small constructors used by tests, benches and the CLI. Scenes are complete
//! `SketchSet`s (links and constraints included) addressable by name.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Vector2;

use super::segment::{Curve, Segment};
use super::types::{Constraint, ConstraintDir, ConstraintType, Sketch, SketchSet, TransmissionType};

/// Names accepted by [`scene`].
pub const SCENES: &[&str] = &[
    "square-isoline",
    "linked-squares",
    "annulus",
    "crossing-seams",
    "reversed-squares",
];

#[inline]
fn polar(center: Vector2<f64>, r: f64, a: f64) -> Vector2<f64> {
    let snap = |v: f64| if v.abs() < 1e-12 { 0.0 } else { v };
    center + Vector2::new(snap(r * a.cos()), snap(r * a.sin()))
}

/// Cubic approximation of the arc from angle `a0` to `a1` (|a1 - a0| <= π/2).
pub fn arc(center: Vector2<f64>, r: f64, a0: f64, a1: f64) -> Segment {
    let k = 4.0 / 3.0 * ((a1 - a0) / 4.0).tan() * r;
    let p0 = polar(center, r, a0);
    let p3 = polar(center, r, a1);
    let t0 = Vector2::new(-a0.sin(), a0.cos());
    let t1 = Vector2::new(-a1.sin(), a1.cos());
    Segment::cubic(p0, p0 + t0 * k, p3 - t1 * k, p3)
}

/// Axis-aligned rectangle, counter-clockwise from `origin`.
///
/// Segment order: bottom, right, top, left.
pub fn rectangle(name: &str, origin: Vector2<f64>, w: f64, h: f64) -> Sketch {
    Sketch::from_polygon(
        name,
        &[
            origin,
            origin + Vector2::new(w, 0.0),
            origin + Vector2::new(w, h),
            origin + Vector2::new(0.0, h),
        ],
    )
}

pub fn unit_square() -> Sketch {
    rectangle("square", Vector2::zeros(), 1.0, 1.0)
}

/// Circle made of four cubic quarter arcs (counter-clockwise).
pub fn circle(center: Vector2<f64>, r: f64) -> Sketch {
    let segs = (0..4)
        .map(|k| {
            let a0 = k as f64 * FRAC_PI_2;
            arc(center, r, a0, a0 + FRAC_PI_2)
        })
        .collect();
    Sketch::new("circle", segs)
}

/// Annulus as two half-annuli linked along their radial edges.
///
/// Each half runs its outer arc counter-clockwise and its inner arc clockwise.
/// Segment order per half: outer arc ×2, radial edge, inner arc ×2, radial edge.
pub fn annulus(r_out: f64, r_in: f64) -> SketchSet {
    let c = Vector2::zeros();
    let upper = Sketch::new(
        "annulus-upper",
        vec![
            arc(c, r_out, 0.0, FRAC_PI_2),
            arc(c, r_out, FRAC_PI_2, PI),
            Segment::line(Vector2::new(-r_out, 0.0), Vector2::new(-r_in, 0.0)),
            arc(c, r_in, PI, FRAC_PI_2),
            arc(c, r_in, FRAC_PI_2, 0.0),
            Segment::line(Vector2::new(r_in, 0.0), Vector2::new(r_out, 0.0)),
        ],
    );
    let lower = Sketch::new(
        "annulus-lower",
        vec![
            arc(c, r_out, PI, PI + FRAC_PI_2),
            arc(c, r_out, PI + FRAC_PI_2, 2.0 * PI),
            Segment::line(Vector2::new(r_out, 0.0), Vector2::new(r_in, 0.0)),
            arc(c, r_in, 2.0 * PI, PI + FRAC_PI_2),
            arc(c, r_in, PI + FRAC_PI_2, PI),
            Segment::line(Vector2::new(-r_in, 0.0), Vector2::new(-r_out, 0.0)),
        ],
    );
    let mut set = SketchSet::new();
    let u = set.add(upper);
    let l = set.add(lower);
    // indices are in range by construction
    let _ = set.link(u, 2, l, 5, true, TransmissionType::Default);
    let _ = set.link(u, 5, l, 2, true, TransmissionType::Default);
    set
}

/// Two unit squares side by side, linked along the shared vertical edge.
pub fn linked_squares(transmission: TransmissionType) -> SketchSet {
    let mut set = SketchSet::new();
    let l = set.add(rectangle("left", Vector2::zeros(), 1.0, 1.0));
    let r = set.add(rectangle("right", Vector2::new(1.0, 0.0), 1.0, 1.0));
    // right edge of `left` (segment 1) against left edge of `right` (segment 3)
    let _ = set.link(l, 1, r, 3, true, transmission);
    set
}

/// Named scene, or `None` for an unknown name (see [`SCENES`]).
pub fn scene(name: &str) -> Option<SketchSet> {
    let horizontal = |x0: f64, x1: f64, y: f64| {
        Curve::line(Vector2::new(x0, y), Vector2::new(x1, y))
    };
    match name {
        "square-isoline" => {
            let mut set = SketchSet::new();
            set.add(unit_square().with_constraint(Constraint::new(
                horizontal(0.0, 1.0, 0.5),
                ConstraintType::Isoline,
                ConstraintDir::Forward,
                1.0,
            )));
            Some(set)
        }
        "linked-squares" | "reversed-squares" => {
            let t = if name == "linked-squares" {
                TransmissionType::Same
            } else {
                TransmissionType::Reversed
            };
            let mut set = linked_squares(t);
            set.sketches[0].constraints.push(Constraint::new(
                horizontal(0.1, 0.9, 0.5),
                ConstraintType::Direction,
                ConstraintDir::Forward,
                1.0,
            ));
            Some(set)
        }
        "annulus" => {
            let mut set = annulus(1.0, 0.3);
            let top = Curve::new(vec![arc(Vector2::zeros(), 1.0, PI / 3.0, 2.0 * PI / 3.0)]);
            set.sketches[0].constraints.push(Constraint::new(
                top,
                ConstraintType::Isoline,
                ConstraintDir::Forward,
                1.0,
            ));
            Some(set)
        }
        "crossing-seams" => {
            let mut set = SketchSet::new();
            let vertical = Curve::line(Vector2::new(0.5, 0.0), Vector2::new(0.5, 1.0));
            set.add(
                unit_square()
                    .with_constraint(Constraint::new(
                        horizontal(0.0, 1.0, 0.5),
                        ConstraintType::Seam,
                        ConstraintDir::Unsigned,
                        1.0,
                    ))
                    .with_constraint(Constraint::new(
                        vertical,
                        ConstraintType::Seam,
                        ConstraintDir::Unsigned,
                        1.0,
                    )),
            );
            Some(set)
        }
        _ => None,
    }
}
