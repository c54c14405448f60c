//! Solid shapes supported by the volume tree.
//!
//! Each shape is described in its own local frame, centred on the origin, with
//! lengths in millimetres. Every kind provides a closed-form volume, a signed
//! inside margin used for containment tests, and a deterministic sampling of
//! its surface used by the [`overlap`](crate::overlap) checker.
//!
//! Shapes deserialise from TOML/JSON as an internally tagged enum:
//!
//! ```toml
//! shape = { type = "tube", rmax = 33.15, dz = 25.65 }
//! ```

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::TWO_PI;

/// Angular slack when deciding whether a φ segment is a full turn.
const FULL_TURN_EPSILON: f64 = 1e-12;

/// Reasons a shape's dimensions are not physical.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("parameter '{param}' must be finite, got {value}")]
    NonFinite { param: &'static str, value: f64 },

    #[error("parameter '{param}' must be positive, got {value}")]
    NonPositive { param: &'static str, value: f64 },

    #[error("parameter '{param}' must not be negative, got {value}")]
    Negative { param: &'static str, value: f64 },

    #[error("inner radius {inner} must be smaller than outer radius {outer}")]
    InnerExceedsOuter { inner: f64, outer: f64 },

    #[error("phi span {0} rad is outside (0, 2π]")]
    PhiSpan(f64),

    #[error("degenerate shape: {0}")]
    Degenerate(&'static str),
}

/// A solid shape in its local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Box(Cuboid),
    Tube(Tube),
    Trapezoid(Trapezoid),
    Sphere(Sphere),
    Cone(Cone),
}

/// A rectangular box given by its half-lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Half-length along x (mm).
    pub dx: f64,
    /// Half-length along y (mm).
    pub dy: f64,
    /// Half-length along z (mm).
    pub dz: f64,
}

/// A cylindrical tube section along z, optionally hollow and φ-segmented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tube {
    /// Inner radius (mm).
    #[serde(default)]
    pub rmin: f64,
    /// Outer radius (mm).
    pub rmax: f64,
    /// Half-length along z (mm).
    pub dz: f64,
    /// Starting φ angle (rad).
    #[serde(default)]
    pub start_phi: f64,
    /// φ span (rad).
    #[serde(default = "full_turn")]
    pub delta_phi: f64,
}

/// A trapezoid whose x/y half-lengths vary linearly from `-dz` to `+dz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trapezoid {
    /// Half-length along x at `-dz` (mm).
    pub dx1: f64,
    /// Half-length along x at `+dz` (mm).
    pub dx2: f64,
    /// Half-length along y at `-dz` (mm).
    pub dy1: f64,
    /// Half-length along y at `+dz` (mm).
    pub dy2: f64,
    /// Half-length along z (mm).
    pub dz: f64,
}

/// A full spherical shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Inner radius (mm).
    #[serde(default)]
    pub rmin: f64,
    /// Outer radius (mm).
    pub rmax: f64,
}

/// A conical section along z with radii given at `-dz` (1) and `+dz` (2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cone {
    #[serde(default)]
    pub rmin1: f64,
    pub rmax1: f64,
    #[serde(default)]
    pub rmin2: f64,
    pub rmax2: f64,
    /// Half-length along z (mm).
    pub dz: f64,
    #[serde(default)]
    pub start_phi: f64,
    #[serde(default = "full_turn")]
    pub delta_phi: f64,
}

fn full_turn() -> f64 {
    TWO_PI
}

impl Cuboid {
    pub fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }
}

impl Tube {
    /// A full solid cylinder.
    pub fn solid(rmax: f64, dz: f64) -> Self {
        Self::hollow(0.0, rmax, dz)
    }

    /// A full cylindrical shell.
    pub fn hollow(rmin: f64, rmax: f64, dz: f64) -> Self {
        Self {
            rmin,
            rmax,
            dz,
            start_phi: 0.0,
            delta_phi: TWO_PI,
        }
    }

    fn radius_margin(&self, r: f64) -> f64 {
        let outer = self.rmax - r;
        if self.rmin > 0.0 {
            outer.min(r - self.rmin)
        } else {
            outer
        }
    }
}

impl Trapezoid {
    pub fn new(dx1: f64, dx2: f64, dy1: f64, dy2: f64, dz: f64) -> Self {
        Self {
            dx1,
            dx2,
            dy1,
            dy2,
            dz,
        }
    }

    /// Half-lengths (x, y) of the cross-section at height `z`.
    fn half_lengths_at(&self, z: f64) -> (f64, f64) {
        let t = (z + self.dz) / (2.0 * self.dz);
        (
            self.dx1 + (self.dx2 - self.dx1) * t,
            self.dy1 + (self.dy2 - self.dy1) * t,
        )
    }
}

impl Sphere {
    pub fn solid(rmax: f64) -> Self {
        Self { rmin: 0.0, rmax }
    }
}

impl Cone {
    /// A full solid cone frustum.
    pub fn solid(rmax1: f64, rmax2: f64, dz: f64) -> Self {
        Self {
            rmin1: 0.0,
            rmax1,
            rmin2: 0.0,
            rmax2,
            dz,
            start_phi: 0.0,
            delta_phi: TWO_PI,
        }
    }

    /// Inner and outer radius at height `z`.
    fn radii_at(&self, z: f64) -> (f64, f64) {
        let t = (z + self.dz) / (2.0 * self.dz);
        (
            self.rmin1 + (self.rmin2 - self.rmin1) * t,
            self.rmax1 + (self.rmax2 - self.rmax1) * t,
        )
    }
}

impl Shape {
    /// Check that all dimensions are physical.
    pub fn validate(&self) -> Result<(), ShapeError> {
        match self {
            Shape::Box(b) => {
                positive("dx", b.dx)?;
                positive("dy", b.dy)?;
                positive("dz", b.dz)
            }
            Shape::Tube(t) => {
                non_negative("rmin", t.rmin)?;
                positive("rmax", t.rmax)?;
                positive("dz", t.dz)?;
                inner_below_outer(t.rmin, t.rmax)?;
                phi_segment(t.start_phi, t.delta_phi)
            }
            Shape::Trapezoid(t) => {
                non_negative("dx1", t.dx1)?;
                non_negative("dx2", t.dx2)?;
                non_negative("dy1", t.dy1)?;
                non_negative("dy2", t.dy2)?;
                positive("dz", t.dz)?;
                if t.dx1.max(t.dx2) == 0.0 || t.dy1.max(t.dy2) == 0.0 {
                    return Err(ShapeError::Degenerate("trapezoid has zero width"));
                }
                Ok(())
            }
            Shape::Sphere(s) => {
                non_negative("rmin", s.rmin)?;
                positive("rmax", s.rmax)?;
                inner_below_outer(s.rmin, s.rmax)
            }
            Shape::Cone(c) => {
                non_negative("rmin1", c.rmin1)?;
                non_negative("rmax1", c.rmax1)?;
                non_negative("rmin2", c.rmin2)?;
                non_negative("rmax2", c.rmax2)?;
                positive("dz", c.dz)?;
                if c.rmin1 > c.rmax1 {
                    return Err(ShapeError::InnerExceedsOuter {
                        inner: c.rmin1,
                        outer: c.rmax1,
                    });
                }
                if c.rmin2 > c.rmax2 {
                    return Err(ShapeError::InnerExceedsOuter {
                        inner: c.rmin2,
                        outer: c.rmax2,
                    });
                }
                if c.rmax1 - c.rmin1 + c.rmax2 - c.rmin2 <= 0.0 {
                    return Err(ShapeError::Degenerate("cone has zero wall thickness"));
                }
                phi_segment(c.start_phi, c.delta_phi)
            }
        }
    }

    /// Geometric volume (mm³).
    pub fn volume(&self) -> f64 {
        match self {
            Shape::Box(b) => 8.0 * b.dx * b.dy * b.dz,
            Shape::Tube(t) => t.delta_phi * t.dz * (t.rmax * t.rmax - t.rmin * t.rmin),
            Shape::Trapezoid(t) => {
                4.0 * t.dz / 3.0
                    * (2.0 * t.dx1 * t.dy1
                        + 2.0 * t.dx2 * t.dy2
                        + t.dx1 * t.dy2
                        + t.dx2 * t.dy1)
            }
            Shape::Sphere(s) => 4.0 / 3.0 * PI * (s.rmax.powi(3) - s.rmin.powi(3)),
            Shape::Cone(c) => {
                let outer = c.rmax1 * c.rmax1 + c.rmax1 * c.rmax2 + c.rmax2 * c.rmax2;
                let inner = c.rmin1 * c.rmin1 + c.rmin1 * c.rmin2 + c.rmin2 * c.rmin2;
                c.delta_phi * c.dz / 3.0 * (outer - inner)
            }
        }
    }

    /// Signed distance-like margin of a local point from the surface.
    ///
    /// Positive inside, negative outside, zero on the surface. The magnitude
    /// is a lower bound on the true distance for convex faces and is only
    /// meant for tolerance comparisons.
    pub fn inside_margin(&self, p: &[f64; 3]) -> f64 {
        let [x, y, z] = *p;
        match self {
            Shape::Box(b) => (b.dx - x.abs()).min(b.dy - y.abs()).min(b.dz - z.abs()),
            Shape::Tube(t) => {
                let r = x.hypot(y);
                (t.dz - z.abs())
                    .min(t.radius_margin(r))
                    .min(phi_margin(x, y, t.start_phi, t.delta_phi))
            }
            Shape::Trapezoid(t) => {
                let (hx, hy) = t.half_lengths_at(z);
                (t.dz - z.abs()).min(hx - x.abs()).min(hy - y.abs())
            }
            Shape::Sphere(s) => {
                let r = (x * x + y * y + z * z).sqrt();
                let outer = s.rmax - r;
                if s.rmin > 0.0 {
                    outer.min(r - s.rmin)
                } else {
                    outer
                }
            }
            Shape::Cone(c) => {
                let r = x.hypot(y);
                let (rmin, rmax) = c.radii_at(z);
                let mut margin = (c.dz - z.abs()).min(rmax - r);
                if c.rmin1 > 0.0 || c.rmin2 > 0.0 {
                    margin = margin.min(r - rmin);
                }
                margin.min(phi_margin(x, y, c.start_phi, c.delta_phi))
            }
        }
    }

    /// Check whether a local point lies inside or on the surface.
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        self.inside_margin(point) >= 0.0
    }

    /// Containment with a surface tolerance (mm).
    pub fn contains_with_tolerance(&self, point: &[f64; 3], tolerance: f64) -> bool {
        self.inside_margin(point) >= -tolerance
    }

    /// Axis-aligned bounding box in the local frame: (min_corner, max_corner).
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let half = match self {
            Shape::Box(b) => [b.dx, b.dy, b.dz],
            Shape::Tube(t) => [t.rmax, t.rmax, t.dz],
            Shape::Trapezoid(t) => [t.dx1.max(t.dx2), t.dy1.max(t.dy2), t.dz],
            Shape::Sphere(s) => [s.rmax, s.rmax, s.rmax],
            Shape::Cone(c) => {
                let r = c.rmax1.max(c.rmax2);
                [r, r, c.dz]
            }
        };
        ([-half[0], -half[1], -half[2]], half)
    }

    /// Whether the shape is a convex polyhedron fully described by
    /// [`vertices`](Self::vertices) and [`bounding_planes`](Self::bounding_planes).
    pub fn is_polyhedron(&self) -> bool {
        matches!(self, Shape::Box(_) | Shape::Trapezoid(_))
    }

    /// Corners of a box or trapezoid. Bit 0 of the index selects +x, bit 1
    /// +y and bit 2 the `+dz` face.
    pub fn vertices(&self) -> Option<[[f64; 3]; 8]> {
        let (x1, y1, x2, y2, dz) = match self {
            Shape::Box(b) => (b.dx, b.dy, b.dx, b.dy, b.dz),
            Shape::Trapezoid(t) => (t.dx1, t.dy1, t.dx2, t.dy2, t.dz),
            _ => return None,
        };
        let mut corners = [[0.0; 3]; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let (hx, hy, z) = if i & 4 == 0 { (x1, y1, -dz) } else { (x2, y2, dz) };
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            *corner = [sx * hx, sy * hy, z];
        }
        Some(corners)
    }

    /// Half-spaces `n · p <= d` (unit `n`) whose intersection contains the
    /// shape. For polyhedra the intersection is the shape itself; tubes and
    /// cones only contribute their end caps and spheres none.
    pub fn bounding_planes(&self) -> Vec<([f64; 3], f64)> {
        let caps = |dz: f64| vec![([0.0, 0.0, 1.0], dz), ([0.0, 0.0, -1.0], dz)];
        match self {
            Shape::Box(b) => vec![
                ([1.0, 0.0, 0.0], b.dx),
                ([-1.0, 0.0, 0.0], b.dx),
                ([0.0, 1.0, 0.0], b.dy),
                ([0.0, -1.0, 0.0], b.dy),
                ([0.0, 0.0, 1.0], b.dz),
                ([0.0, 0.0, -1.0], b.dz),
            ],
            Shape::Trapezoid(t) => {
                let mut planes = caps(t.dz);
                // Side faces lean by the change in half-length per unit z.
                let sx = (t.dx2 - t.dx1) / (2.0 * t.dz);
                let nx = sx.hypot(1.0);
                let sy = (t.dy2 - t.dy1) / (2.0 * t.dz);
                let ny = sy.hypot(1.0);
                let ox = (t.dx1 + t.dx2) / 2.0 / nx;
                let oy = (t.dy1 + t.dy2) / 2.0 / ny;
                planes.push(([1.0 / nx, 0.0, -sx / nx], ox));
                planes.push(([-1.0 / nx, 0.0, -sx / nx], ox));
                planes.push(([0.0, 1.0 / ny, -sy / ny], oy));
                planes.push(([0.0, -1.0 / ny, -sy / ny], oy));
                planes
            }
            Shape::Tube(t) => caps(t.dz),
            Shape::Cone(c) => caps(c.dz),
            Shape::Sphere(_) => Vec::new(),
        }
    }

    /// Point of the shape farthest along `direction` (local frame).
    ///
    /// Exact for every kind: the maximum of a linear function over a solid is
    /// reached on its convex hull, whose extreme points are corners, end-cap
    /// arcs and the ends of φ-cut edges.
    pub fn support(&self, direction: &[f64; 3]) -> [f64; 3] {
        match self {
            Shape::Box(_) | Shape::Trapezoid(_) => match self.vertices() {
                Some(corners) => farthest(direction, corners),
                None => [0.0; 3],
            },
            Shape::Sphere(s) => {
                let norm = dot(direction, direction).sqrt();
                if norm == 0.0 {
                    [0.0, 0.0, s.rmax]
                } else {
                    let scale = s.rmax / norm;
                    [direction[0] * scale, direction[1] * scale, direction[2] * scale]
                }
            }
            Shape::Tube(t) => ring_support(
                direction,
                [(-t.dz, t.rmin, t.rmax), (t.dz, t.rmin, t.rmax)],
                t.start_phi,
                t.delta_phi,
            ),
            Shape::Cone(c) => ring_support(
                direction,
                [(-c.dz, c.rmin1, c.rmax1), (c.dz, c.rmin2, c.rmax2)],
                c.start_phi,
                c.delta_phi,
            ),
        }
    }

    /// Deterministic sample of points on the shape's surface.
    ///
    /// `resolution` is the number of grid steps per face edge (at least 2).
    /// Edges and corners are always included.
    pub fn surface_points(&self, resolution: usize) -> Vec<[f64; 3]> {
        let n = resolution.max(2);
        let mut points = Vec::new();
        match self {
            Shape::Box(b) => {
                for u in linspace(-b.dx, b.dx, n) {
                    for v in linspace(-b.dy, b.dy, n) {
                        points.push([u, v, -b.dz]);
                        points.push([u, v, b.dz]);
                    }
                    for w in linspace(-b.dz, b.dz, n) {
                        points.push([u, -b.dy, w]);
                        points.push([u, b.dy, w]);
                    }
                }
                for v in linspace(-b.dy, b.dy, n) {
                    for w in linspace(-b.dz, b.dz, n) {
                        points.push([-b.dx, v, w]);
                        points.push([b.dx, v, w]);
                    }
                }
            }
            Shape::Tube(t) => {
                let phis: Vec<f64> = linspace(t.start_phi, t.start_phi + t.delta_phi, 2 * n).collect();
                for z in linspace(-t.dz, t.dz, n) {
                    for &phi in &phis {
                        points.push(polar(t.rmax, phi, z));
                        if t.rmin > 0.0 {
                            points.push(polar(t.rmin, phi, z));
                        }
                    }
                }
                for r in linspace(t.rmin, t.rmax, n) {
                    for &phi in &phis {
                        points.push(polar(r, phi, -t.dz));
                        points.push(polar(r, phi, t.dz));
                    }
                    if is_segmented(t.delta_phi) {
                        for z in linspace(-t.dz, t.dz, n) {
                            points.push(polar(r, t.start_phi, z));
                            points.push(polar(r, t.start_phi + t.delta_phi, z));
                        }
                    }
                }
            }
            Shape::Trapezoid(t) => {
                for u in linspace(-t.dx1, t.dx1, n) {
                    for v in linspace(-t.dy1, t.dy1, n) {
                        points.push([u, v, -t.dz]);
                    }
                }
                for u in linspace(-t.dx2, t.dx2, n) {
                    for v in linspace(-t.dy2, t.dy2, n) {
                        points.push([u, v, t.dz]);
                    }
                }
                for z in linspace(-t.dz, t.dz, n) {
                    let (hx, hy) = t.half_lengths_at(z);
                    for v in linspace(-hy, hy, n) {
                        points.push([-hx, v, z]);
                        points.push([hx, v, z]);
                    }
                    for u in linspace(-hx, hx, n) {
                        points.push([u, -hy, z]);
                        points.push([u, hy, z]);
                    }
                }
            }
            Shape::Sphere(s) => {
                for theta in linspace(0.0, PI, n) {
                    for phi in linspace(0.0, TWO_PI, 2 * n) {
                        points.push(spherical(s.rmax, theta, phi));
                        if s.rmin > 0.0 {
                            points.push(spherical(s.rmin, theta, phi));
                        }
                    }
                }
            }
            Shape::Cone(c) => {
                let phis: Vec<f64> = linspace(c.start_phi, c.start_phi + c.delta_phi, 2 * n).collect();
                for z in linspace(-c.dz, c.dz, n) {
                    let (rmin, rmax) = c.radii_at(z);
                    for &phi in &phis {
                        points.push(polar(rmax, phi, z));
                        if rmin > 0.0 {
                            points.push(polar(rmin, phi, z));
                        }
                    }
                    if is_segmented(c.delta_phi) {
                        for r in linspace(rmin, rmax, n) {
                            points.push(polar(r, c.start_phi, z));
                            points.push(polar(r, c.start_phi + c.delta_phi, z));
                        }
                    }
                }
                for &phi in &phis {
                    for r in linspace(c.rmin1, c.rmax1, n) {
                        points.push(polar(r, phi, -c.dz));
                    }
                    for r in linspace(c.rmin2, c.rmax2, n) {
                        points.push(polar(r, phi, c.dz));
                    }
                }
            }
        }
        points
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Box(b) => write!(f, "box(dx={}, dy={}, dz={})", b.dx, b.dy, b.dz),
            Shape::Tube(t) => write!(f, "tube(rmin={}, rmax={}, dz={})", t.rmin, t.rmax, t.dz),
            Shape::Trapezoid(t) => write!(
                f,
                "trapezoid(dx1={}, dx2={}, dy1={}, dy2={}, dz={})",
                t.dx1, t.dx2, t.dy1, t.dy2, t.dz
            ),
            Shape::Sphere(s) => write!(f, "sphere(rmin={}, rmax={})", s.rmin, s.rmax),
            Shape::Cone(c) => write!(
                f,
                "cone(rmin1={}, rmax1={}, rmin2={}, rmax2={}, dz={})",
                c.rmin1, c.rmax1, c.rmin2, c.rmax2, c.dz
            ),
        }
    }
}

fn finite(param: &'static str, value: f64) -> Result<(), ShapeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ShapeError::NonFinite { param, value })
    }
}

fn positive(param: &'static str, value: f64) -> Result<(), ShapeError> {
    finite(param, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ShapeError::NonPositive { param, value })
    }
}

fn non_negative(param: &'static str, value: f64) -> Result<(), ShapeError> {
    finite(param, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ShapeError::Negative { param, value })
    }
}

fn inner_below_outer(inner: f64, outer: f64) -> Result<(), ShapeError> {
    if inner < outer {
        Ok(())
    } else {
        Err(ShapeError::InnerExceedsOuter { inner, outer })
    }
}

fn phi_segment(start: f64, delta: f64) -> Result<(), ShapeError> {
    finite("start_phi", start)?;
    finite("delta_phi", delta)?;
    if delta > 0.0 && delta <= TWO_PI + FULL_TURN_EPSILON {
        Ok(())
    } else {
        Err(ShapeError::PhiSpan(delta))
    }
}

pub(crate) fn is_segmented(delta_phi: f64) -> bool {
    delta_phi < TWO_PI - FULL_TURN_EPSILON
}

/// Margin of the point's azimuth from the φ segment boundaries, as a length.
fn phi_margin(x: f64, y: f64, start: f64, delta: f64) -> f64 {
    if !is_segmented(delta) {
        return f64::INFINITY;
    }
    let r = x.hypot(y);
    if r == 0.0 {
        return 0.0;
    }
    let rel = (y.atan2(x) - start).rem_euclid(TWO_PI);
    if rel <= delta {
        r * rel.min(delta - rel).min(PI / 2.0).sin()
    } else {
        -r * (rel - delta).min(TWO_PI - rel).min(PI / 2.0).sin()
    }
}

pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn farthest(direction: &[f64; 3], candidates: impl IntoIterator<Item = [f64; 3]>) -> [f64; 3] {
    let mut best = [0.0; 3];
    let mut best_height = f64::NEG_INFINITY;
    for p in candidates {
        let height = dot(&p, direction);
        if height > best_height {
            best = p;
            best_height = height;
        }
    }
    best
}

/// Support point of a body of revolution given by its two end rings
/// `(z, rmin, rmax)`.
fn ring_support(direction: &[f64; 3], rings: [(f64, f64, f64); 2], start: f64, delta: f64) -> [f64; 3] {
    let toward = direction[1].atan2(direction[0]);
    let mut candidates = Vec::with_capacity(10);
    for (z, rmin, rmax) in rings {
        let inside_span = !is_segmented(delta) || (toward - start).rem_euclid(TWO_PI) <= delta;
        if inside_span {
            candidates.push(polar(rmax, toward, z));
        }
        if is_segmented(delta) {
            for edge in [start, start + delta] {
                candidates.push(polar(rmax, edge, z));
                candidates.push(polar(rmin, edge, z));
            }
        }
    }
    farthest(direction, candidates)
}

fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let steps = (n - 1) as f64;
    (0..n).map(move |i| start + (end - start) * i as f64 / steps)
}

fn polar(r: f64, phi: f64, z: f64) -> [f64; 3] {
    [r * phi.cos(), r * phi.sin(), z]
}

fn spherical(r: f64, theta: f64, phi: f64) -> [f64; 3] {
    [
        r * theta.sin() * phi.cos(),
        r * theta.sin() * phi.sin(),
        r * theta.cos(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_volume_and_containment() {
        let shape = Shape::Box(Cuboid::new(1.0, 2.0, 3.0));
        assert_relative_eq!(shape.volume(), 48.0);
        assert!(shape.contains(&[0.9, -1.9, 2.9]));
        assert!(shape.contains(&[1.0, 2.0, 3.0]));
        assert!(!shape.contains(&[1.1, 0.0, 0.0]));
    }

    #[test]
    fn test_tube_volume() {
        let solid = Shape::Tube(Tube::solid(2.0, 5.0));
        assert_relative_eq!(solid.volume(), PI * 4.0 * 10.0, max_relative = 1e-12);

        let shell = Shape::Tube(Tube::hollow(1.0, 2.0, 5.0));
        assert_relative_eq!(shell.volume(), PI * 3.0 * 10.0, max_relative = 1e-12);

        let half = Shape::Tube(Tube {
            delta_phi: PI,
            ..Tube::solid(2.0, 5.0)
        });
        assert_relative_eq!(half.volume(), PI * 4.0 * 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_trapezoid_volume_reduces_to_box() {
        let trd = Shape::Trapezoid(Trapezoid::new(500.0, 500.0, 500.0, 500.0, 25.0));
        let cuboid = Shape::Box(Cuboid::new(500.0, 500.0, 25.0));
        assert_relative_eq!(trd.volume(), cuboid.volume(), max_relative = 1e-12);
    }

    #[test]
    fn test_trapezoid_volume_pyramid() {
        // Square pyramid: base 2x2, apex, height 2 -> V = 4 * 2 / 3
        let pyramid = Shape::Trapezoid(Trapezoid::new(1.0, 0.0, 1.0, 0.0, 1.0));
        assert_relative_eq!(pyramid.volume(), 8.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn test_sphere_and_cone_volumes() {
        let sphere = Shape::Sphere(Sphere::solid(3.0));
        assert_relative_eq!(sphere.volume(), 36.0 * PI, max_relative = 1e-12);

        // Cone with apex: V = pi r^2 h / 3
        let cone = Shape::Cone(Cone::solid(2.0, 0.0, 1.5));
        assert_relative_eq!(cone.volume(), PI * 4.0 * 3.0 / 3.0, max_relative = 1e-12);

        // Equal radii degenerates to a tube
        let cylinder = Shape::Cone(Cone::solid(2.0, 2.0, 1.5));
        let tube = Shape::Tube(Tube::solid(2.0, 1.5));
        assert_relative_eq!(cylinder.volume(), tube.volume(), max_relative = 1e-12);
    }

    #[test]
    fn test_hollow_tube_excludes_bore() {
        let shell = Shape::Tube(Tube::hollow(10.0, 12.0, 5.0));
        assert!(!shell.contains(&[0.0, 0.0, 0.0]));
        assert!(shell.contains(&[11.0, 0.0, 0.0]));
        assert!(shell.contains(&[0.0, -11.5, 4.0]));
        assert!(!shell.contains(&[0.0, 11.0, 5.5]));
    }

    #[test]
    fn test_segmented_tube_phi_containment() {
        let quarter = Shape::Tube(Tube {
            delta_phi: PI / 2.0,
            ..Tube::solid(10.0, 1.0)
        });
        assert!(quarter.contains(&[5.0, 5.0, 0.0]));
        assert!(!quarter.contains(&[-5.0, 5.0, 0.0]));
        assert!(!quarter.contains(&[5.0, -5.0, 0.0]));
    }

    #[test]
    fn test_surface_points_lie_on_surface() {
        let shapes = [
            Shape::Box(Cuboid::new(1.0, 2.0, 3.0)),
            Shape::Tube(Tube::hollow(1.0, 2.0, 3.0)),
            Shape::Trapezoid(Trapezoid::new(1.0, 2.0, 3.0, 1.5, 2.0)),
            Shape::Sphere(Sphere { rmin: 1.0, rmax: 2.0 }),
            Shape::Cone(Cone {
                rmin1: 0.5,
                rmax1: 1.0,
                rmin2: 1.0,
                rmax2: 3.0,
                dz: 2.0,
                start_phi: 0.0,
                delta_phi: PI,
            }),
        ];
        for shape in &shapes {
            let points = shape.surface_points(8);
            assert!(!points.is_empty());
            for p in &points {
                let margin = shape.inside_margin(p);
                assert!(
                    margin.abs() < 1e-9,
                    "{} point {:?} has margin {}",
                    shape,
                    p,
                    margin
                );
            }
        }
    }

    #[test]
    fn test_support_of_round_shapes() {
        let tube = Shape::Tube(Tube::hollow(1.0, 2.0, 3.0));
        let p = tube.support(&[1.0, 1.0, 0.5]);
        assert_relative_eq!(p[0].hypot(p[1]), 2.0, max_relative = 1e-12);
        assert_relative_eq!(p[0], p[1], max_relative = 1e-12);
        assert_relative_eq!(p[2], 3.0);

        let ball = Shape::Sphere(Sphere::solid(4.0));
        let p = ball.support(&[0.0, -2.0, 0.0]);
        assert_relative_eq!(p[1], -4.0);

        // Half cone over y >= 0: straight down -y only the cut edge reaches.
        let half = Shape::Cone(Cone {
            delta_phi: PI,
            ..Cone::solid(1.0, 3.0, 2.0)
        });
        let p = half.support(&[0.0, -1.0, 0.0]);
        assert!(p[1].abs() < 1e-12, "support {:?} below the cut", p);
    }

    #[test]
    fn test_trapezoid_planes_pass_through_corners() {
        let trd = Shape::Trapezoid(Trapezoid::new(1.0, 2.0, 3.0, 1.5, 2.0));
        let planes = trd.bounding_planes();
        assert_eq!(planes.len(), 6);
        let corners = trd.vertices().unwrap();
        for (normal, offset) in &planes {
            let highest = corners
                .iter()
                .map(|c| dot(normal, c))
                .fold(f64::NEG_INFINITY, f64::max);
            assert_relative_eq!(highest, *offset, max_relative = 1e-12);
            assert_relative_eq!(dot(normal, normal), 1.0, max_relative = 1e-12);
        }
        assert!(Shape::Sphere(Sphere::solid(1.0)).vertices().is_none());
    }

    #[test]
    fn test_validation_rejects_bad_dimensions() {
        assert!(matches!(
            Shape::Box(Cuboid::new(0.0, 1.0, 1.0)).validate(),
            Err(ShapeError::NonPositive { param: "dx", .. })
        ));
        assert!(matches!(
            Shape::Tube(Tube::hollow(3.0, 2.0, 1.0)).validate(),
            Err(ShapeError::InnerExceedsOuter { .. })
        ));
        assert!(matches!(
            Shape::Sphere(Sphere::solid(f64::NAN)).validate(),
            Err(ShapeError::NonFinite { .. })
        ));
        assert!(matches!(
            Shape::Tube(Tube {
                delta_phi: 7.0,
                ..Tube::solid(1.0, 1.0)
            })
            .validate(),
            Err(ShapeError::PhiSpan(_))
        ));
        assert!(Shape::Trapezoid(Trapezoid::new(1.0, 0.0, 1.0, 0.0, 1.0))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_shape_deserialises_from_tagged_toml_like_json() {
        let shape: Shape =
            serde_json::from_str(r#"{"type": "tube", "rmax": 33.15, "dz": 25.65}"#).unwrap();
        match shape {
            Shape::Tube(t) => {
                assert_eq!(t.rmin, 0.0);
                assert_relative_eq!(t.delta_phi, TWO_PI);
            }
            other => panic!("expected tube, got {other}"),
        }
    }
}
