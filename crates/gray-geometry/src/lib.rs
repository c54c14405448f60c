//! # Gray Geometry
//!
//! Geometry handling for the Gray framework. This crate provides:
//!
//! - **Solid shapes** ([`shapes`]): Boxes, tubes, trapezoids, spheres and
//!   cones with closed-form volumes and point containment.
//! - **Placements** ([`transform`]): Rotation and translation of a volume
//!   relative to its parent.
//! - **Volume tree** ([`model`]): An immutable hierarchy of placed volumes,
//!   validated once at build time and queried by name afterwards.
//! - **Overlap checking** ([`overlap`]): Exact plane and separating-axis
//!   tests for polyhedra, point sampling for curved shapes, used to verify
//!   that children lie inside their parent and do not intersect siblings.
//! - **Presets** ([`presets`]): The canonical germanium detector set-up.
//!
//! Lengths are in millimetres and angles in radians; see [`units`].

pub mod model;
pub mod overlap;
pub mod presets;
pub mod shapes;
pub mod transform;
pub mod units;

pub use model::{GeometryBuilder, GeometryError, GeometryModel, Volume, VolumeId, VolumeSpec};
pub use shapes::{Cone, Cuboid, Shape, ShapeError, Sphere, Trapezoid, Tube};
pub use transform::Transform;
