//! Containment and sibling-overlap checks.
//!
//! Boxes and trapezoids are convex polyhedra and are decided exactly:
//!
//! - **Containment** in a polyhedral parent compares the child's support
//!   point against each face plane of the parent. Tube and cone end caps are
//!   checked the same way for any child.
//! - **Sibling overlap** between two polyhedra is a separating-axis test over
//!   the face normals of both and the cross products of their edges.
//!
//! Curved shapes fall back to point sampling in three forms:
//!
//! - **Surface points** from [`Shape::surface_points`], which must all lie
//!   inside the parent after placement.
//! - **Interior points**, a cubic lattice over the shape's bounding box kept
//!   only where the point is strictly inside the shape. These catch coincident
//!   or fully nested siblings that share no surface crossing.
//! - **Focused points**, a lattice over the region where an overlap can
//!   actually happen: the intersection of two siblings' bounding boxes, or
//!   the part of a child's bounding box covering the parent's bore or φ cut.
//!   Thin features that slip between the coarser grids are caught here.
//!
//! A point is reported as overlapping a sibling only when it lies deeper than
//! the tolerance inside it, so touching faces are legal.

use crate::model::{GeometryError, Volume};
use crate::shapes::{dot, is_segmented, Shape};
use crate::transform::Transform;
use crate::units::NM;

type Aabb = ([f64; 3], [f64; 3]);

/// Sampling parameters for the geometry checks.
#[derive(Debug, Clone)]
pub struct OverlapCheck {
    /// Grid steps per face edge for surface sampling.
    pub resolution: usize,
    /// Lattice points per axis for interior sampling.
    pub lattice: usize,
    /// Lattice points per axis over a shared or cavity region.
    pub focus: usize,
    /// Surface tolerance (mm).
    pub tolerance: f64,
}

impl Default for OverlapCheck {
    fn default() -> Self {
        Self {
            resolution: 24,
            lattice: 9,
            focus: 11,
            tolerance: NM,
        }
    }
}

impl OverlapCheck {
    /// Verify that `child` lies inside `parent`.
    pub fn check_containment(&self, child: &Volume, parent: &Volume) -> Result<(), GeometryError> {
        let escape = self
            .beyond_bounding_planes(child, parent.shape())
            .or_else(|| self.sampled_escape(child, parent.shape()));
        match escape {
            Some(point) => Err(GeometryError::Containment {
                child: child.name().to_string(),
                parent: parent.name().to_string(),
                point,
            }),
            None => Ok(()),
        }
    }

    /// Verify that two siblings do not intersect.
    pub fn check_siblings(&self, a: &Volume, b: &Volume) -> Result<(), GeometryError> {
        let Some(shared) = intersect_boxes(
            placed_bounding_box(a.shape(), a.placement()),
            placed_bounding_box(b.shape(), b.placement()),
            self.tolerance,
        ) else {
            return Ok(());
        };

        if a.shape().is_polyhedron() && b.shape().is_polyhedron() {
            return match penetration_depth(a, b, self.tolerance) {
                Some(depth) => Err(overlap(a, b, centre(&shared), depth)),
                None => Ok(()),
            };
        }

        self.samples_inside(a, b)?;
        self.samples_inside(b, a)?;
        for q in lattice(shared, self.focus) {
            let depth = margin_at(a, &q).min(margin_at(b, &q));
            if depth > self.tolerance {
                return Err(overlap(a, b, q, depth));
            }
        }
        Ok(())
    }

    /// Child support point lying beyond one of the parent's bounding planes.
    fn beyond_bounding_planes(&self, child: &Volume, parent: &Shape) -> Option<[f64; 3]> {
        parent.bounding_planes().into_iter().find_map(|(normal, offset)| {
            let local = child.placement().rotate_inverse(&normal);
            let q = child.placement().apply(&child.shape().support(&local));
            (dot(&normal, &q) > offset + self.tolerance).then_some(q)
        })
    }

    /// Sampled point of the child lying outside a curved parent.
    fn sampled_escape(&self, child: &Volume, parent: &Shape) -> Option<[f64; 3]> {
        if parent.is_polyhedron() {
            return None;
        }
        let on_surface = child
            .shape()
            .surface_points(self.resolution)
            .into_iter()
            .map(|p| child.placement().apply(&p))
            .find(|q| !parent.contains_with_tolerance(q, self.tolerance));

        on_surface.or_else(|| {
            let extent = placed_bounding_box(child.shape(), child.placement());
            cavity_boxes(parent)
                .into_iter()
                .filter_map(|cavity| intersect_boxes(extent, cavity, self.tolerance))
                .flat_map(|region| lattice(region, self.focus))
                .find(|q| {
                    parent.inside_margin(q) < -self.tolerance && margin_at(child, q) > self.tolerance
                })
        })
    }

    /// Look for samples of `a` lying strictly inside `b`.
    fn samples_inside(&self, a: &Volume, b: &Volume) -> Result<(), GeometryError> {
        let samples = a
            .shape()
            .surface_points(self.resolution)
            .into_iter()
            .chain(interior_points(a.shape(), self.lattice, self.tolerance));

        for p in samples {
            let q = a.placement().apply(&p);
            let depth = margin_at(b, &q);
            if depth > self.tolerance {
                return Err(overlap(a, b, q, depth));
            }
        }
        Ok(())
    }
}

/// Lattice points strictly inside a shape, at `per_axis` points along each
/// bounding-box edge (rounded up to an odd count so the centre is included).
pub fn interior_points(shape: &Shape, per_axis: usize, tolerance: f64) -> Vec<[f64; 3]> {
    lattice(shape.bounding_box(), per_axis)
        .into_iter()
        .filter(|p| shape.inside_margin(p) > tolerance)
        .collect()
}

/// Axis-aligned bounding box of a placed shape in its parent frame.
pub fn placed_bounding_box(shape: &Shape, placement: &Transform) -> Aabb {
    let (lo, hi) = shape.bounding_box();
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for corner in 0..8 {
        let local = [
            if corner & 1 == 0 { lo[0] } else { hi[0] },
            if corner & 2 == 0 { lo[1] } else { hi[1] },
            if corner & 4 == 0 { lo[2] } else { hi[2] },
        ];
        let q = placement.apply(&local);
        for axis in 0..3 {
            min[axis] = min[axis].min(q[axis]);
            max[axis] = max[axis].max(q[axis]);
        }
    }
    (min, max)
}

/// Smallest projected overlap of two placed polyhedra, or `None` when some
/// axis separates them by more than `-tolerance`.
fn penetration_depth(a: &Volume, b: &Volume, tolerance: f64) -> Option<f64> {
    let corners_a = placed_vertices(a)?;
    let corners_b = placed_vertices(b)?;

    let mut axes = placed_normals(a);
    axes.extend(placed_normals(b));
    for ea in edge_directions(&corners_a) {
        for eb in edge_directions(&corners_b) {
            let axis = cross(&ea, &eb);
            let norm = dot(&axis, &axis).sqrt();
            // Parallel edges give no new axis.
            if norm > 1e-9 {
                axes.push([axis[0] / norm, axis[1] / norm, axis[2] / norm]);
            }
        }
    }

    let mut depth = f64::INFINITY;
    for axis in &axes {
        let (a_lo, a_hi) = project(&corners_a, axis);
        let (b_lo, b_hi) = project(&corners_b, axis);
        let overlap = a_hi.min(b_hi) - a_lo.max(b_lo);
        if overlap <= tolerance {
            return None;
        }
        depth = depth.min(overlap);
    }
    Some(depth)
}

fn placed_vertices(volume: &Volume) -> Option<[[f64; 3]; 8]> {
    let corners = volume.shape().vertices()?;
    Some(corners.map(|c| volume.placement().apply(&c)))
}

fn placed_normals(volume: &Volume) -> Vec<[f64; 3]> {
    volume
        .shape()
        .bounding_planes()
        .into_iter()
        .map(|(normal, _)| volume.placement().rotate(&normal))
        .collect()
}

/// Edge vectors of a hexahedron indexed as in [`Shape::vertices`].
fn edge_directions(corners: &[[f64; 3]; 8]) -> Vec<[f64; 3]> {
    let mut edges = Vec::with_capacity(12);
    for (i, from) in corners.iter().enumerate() {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                let to = corners[i | bit];
                edges.push([to[0] - from[0], to[1] - from[1], to[2] - from[2]]);
            }
        }
    }
    edges
}

fn project(corners: &[[f64; 3]; 8], axis: &[f64; 3]) -> (f64, f64) {
    corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        let h = dot(c, axis);
        (lo.min(h), hi.max(h))
    })
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Bounding boxes, in the shape's frame, of the regions its end planes and
/// outer surface do not exclude: the bore, the inner shell and any φ cut.
fn cavity_boxes(shape: &Shape) -> Vec<Aabb> {
    match shape {
        Shape::Tube(t) if is_segmented(t.delta_phi) => vec![shape.bounding_box()],
        Shape::Cone(c) if is_segmented(c.delta_phi) => vec![shape.bounding_box()],
        Shape::Tube(t) if t.rmin > 0.0 => vec![([-t.rmin, -t.rmin, -t.dz], [t.rmin, t.rmin, t.dz])],
        Shape::Cone(c) if c.rmin1.max(c.rmin2) > 0.0 => {
            let r = c.rmin1.max(c.rmin2);
            vec![([-r, -r, -c.dz], [r, r, c.dz])]
        }
        Shape::Sphere(s) if s.rmin > 0.0 => {
            let r = s.rmin;
            vec![([-r, -r, -r], [r, r, r])]
        }
        _ => Vec::new(),
    }
}

/// Common part of two boxes, collapsed to a face when they only touch.
fn intersect_boxes(a: Aabb, b: Aabb, tolerance: f64) -> Option<Aabb> {
    let mut min = [0.0; 3];
    let mut max = [0.0; 3];
    for axis in 0..3 {
        min[axis] = a.0[axis].max(b.0[axis]);
        max[axis] = a.1[axis].min(b.1[axis]);
        if max[axis] < min[axis] - tolerance {
            return None;
        }
        max[axis] = max[axis].max(min[axis]);
    }
    Some((min, max))
}

/// Regular lattice over a box with an odd number of points per axis.
fn lattice((min, max): Aabb, per_axis: usize) -> Vec<[f64; 3]> {
    let n = per_axis.max(3) | 1;
    let step = |axis: usize, i: usize| min[axis] + (max[axis] - min[axis]) * i as f64 / (n - 1) as f64;

    let mut points = Vec::with_capacity(n * n * n);
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                points.push([step(0, i), step(1, j), step(2, k)]);
            }
        }
    }
    points
}

fn centre((min, max): &Aabb) -> [f64; 3] {
    [
        (min[0] + max[0]) / 2.0,
        (min[1] + max[1]) / 2.0,
        (min[2] + max[2]) / 2.0,
    ]
}

fn margin_at(volume: &Volume, point: &[f64; 3]) -> f64 {
    volume.shape().inside_margin(&volume.placement().apply_inverse(point))
}

fn overlap(a: &Volume, b: &Volume, point: [f64; 3], depth: f64) -> GeometryError {
    GeometryError::Overlap {
        first: a.name().to_string(),
        second: b.name().to_string(),
        point,
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Cuboid, Sphere, Tube};

    #[test]
    fn test_interior_points_are_inside() {
        let shell = Shape::Tube(Tube::hollow(5.0, 10.0, 2.0));
        let points = interior_points(&shell, 9, NM);
        assert!(!points.is_empty());
        for p in &points {
            let r = p[0].hypot(p[1]);
            assert!(r > 5.0 && r < 10.0, "point {:?} outside shell wall", p);
        }
    }

    #[test]
    fn test_sphere_interior_count() {
        let sphere = Shape::Sphere(Sphere::solid(10.0));
        let points = interior_points(&sphere, 11, NM);
        // Lattice of 11^3 = 1331 over the cube; the ball fills ~52% of it,
        // less the lattice points sitting exactly on the sphere.
        assert!(points.len() > 400, "Too few points: {}", points.len());
        assert!(points.len() < 700, "Too many points: {}", points.len());
    }

    #[test]
    fn test_rotated_bounding_box() {
        let slab = Shape::Box(Cuboid::new(10.0, 1.0, 1.0));
        let rotated = Transform::rotation(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let (min, max) = placed_bounding_box(&slab, &rotated);
        assert!((max[0] - 1.0).abs() < 1e-9);
        assert!((max[1] - 10.0).abs() < 1e-9);
        assert!((min[1] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_touching_boxes_share_a_face() {
        let a = ([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = ([1.0, 0.5, -1.0], [2.0, 3.0, 0.5]);
        let (min, max) = intersect_boxes(a, b, NM).unwrap();
        assert_eq!(min, [1.0, 0.5, 0.0]);
        assert_eq!(max, [1.0, 1.0, 0.5]);

        let apart = ([1.5, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert!(intersect_boxes(a, apart, NM).is_none());
    }

    #[test]
    fn test_lattice_includes_centre() {
        let points = lattice(([-1.0, -2.0, 0.0], [1.0, 2.0, 4.0]), 4);
        assert_eq!(points.len(), 125);
        assert!(points.contains(&[0.0, 0.0, 2.0]));
    }

    #[test]
    fn test_hexahedron_edges() {
        let cuboid = Shape::Box(Cuboid::new(1.0, 2.0, 3.0));
        let edges = edge_directions(&cuboid.vertices().unwrap());
        assert_eq!(edges.len(), 12);
        assert_eq!(edges.iter().filter(|e| *e == &[2.0, 0.0, 0.0]).count(), 4);
        assert_eq!(edges.iter().filter(|e| *e == &[0.0, 0.0, 6.0]).count(), 4);
    }
}
