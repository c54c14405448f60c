//! Ready-made geometries.
//!
//! The germanium detector set-up models a coaxial HPGe crystal in an
//! aluminium can, standing in a 1 m air envelope with an aluminium floor slab
//! underneath:
//!
//! ```text
//! World (box 120 cm, air)
//! ├── Envelope (box 100 cm, air)
//! │   ├── Detector   (Ge tube r = 33.15 mm, half-length 25.65 mm, z = -25.65 mm)
//! │   ├── Housing    (Al tube 35.15-36.15 mm, half-length 27.65 mm, z = -25.65 mm)
//! │   ├── CapTop     (Al disc r = 35.15 mm, 1 mm thick, z = +2.5 mm)
//! │   └── CapBottom  (Al disc r = 35.15 mm, 1 mm thick, z = -53.8 mm)
//! └── Block (Al trapezoid 100 x 100 x 5 cm, z = -55 cm)
//! ```
//!
//! The scoring volume is [`DETECTOR`].

use crate::model::{GeometryBuilder, GeometryError, GeometryModel, VolumeSpec};
use crate::shapes::{Cuboid, Shape, Trapezoid, Tube};
use crate::units::{CM, MM};

pub const WORLD: &str = "World";
pub const ENVELOPE: &str = "Envelope";
pub const DETECTOR: &str = "Detector";
pub const HOUSING: &str = "Housing";
pub const CAP_TOP: &str = "CapTop";
pub const CAP_BOTTOM: &str = "CapBottom";
pub const BLOCK: &str = "Block";

/// Germanium crystal radius.
pub const GE_RADIUS: f64 = 66.3 / 2.0 * MM;
/// Germanium crystal half-length.
pub const GE_HALF_Z: f64 = 51.3 / 2.0 * MM;

/// Names accepted by [`by_name`].
pub const PRESETS: &[&str] = &["germanium-detector"];

/// Look up a preset geometry by name.
pub fn by_name(name: &str) -> Option<GeometryBuilder> {
    match name {
        "germanium-detector" => Some(germanium_detector_builder()),
        _ => None,
    }
}

/// Build the germanium detector geometry.
pub fn germanium_detector() -> Result<GeometryModel, GeometryError> {
    germanium_detector_builder().build()
}

/// Volume specifications of the germanium detector, before validation.
pub fn germanium_detector_builder() -> GeometryBuilder {
    let env_size = 100.0 * CM;
    let world_size = 1.2 * env_size;

    // The can clears the crystal by 2 mm radially and axially.
    let can_radius = (66.3 + 4.0) / 2.0 * MM;
    let can_half_z = (51.3 + 4.0) / 2.0 * MM;
    let wall = 1.0 * MM;
    let cap_half_z = 0.5 * MM;

    GeometryBuilder::new()
        .volume(VolumeSpec::new(
            WORLD,
            Shape::Box(Cuboid::new(world_size / 2.0, world_size / 2.0, world_size / 2.0)),
            "G4_AIR",
        ))
        .volume(
            VolumeSpec::new(
                ENVELOPE,
                Shape::Box(Cuboid::new(env_size / 2.0, env_size / 2.0, env_size / 2.0)),
                "G4_AIR",
            )
            .inside(WORLD),
        )
        .volume(
            VolumeSpec::new(DETECTOR, Shape::Tube(Tube::solid(GE_RADIUS, GE_HALF_Z)), "G4_Ge")
                .inside(ENVELOPE)
                .at([0.0, 0.0, -GE_HALF_Z]),
        )
        .volume(
            VolumeSpec::new(
                HOUSING,
                Shape::Tube(Tube::hollow(can_radius, can_radius + wall, can_half_z)),
                "G4_Al",
            )
            .inside(ENVELOPE)
            .at([0.0, 0.0, -GE_HALF_Z]),
        )
        .volume(
            VolumeSpec::new(CAP_TOP, Shape::Tube(Tube::solid(can_radius, cap_half_z)), "G4_Al")
                .inside(ENVELOPE)
                .at([0.0, 0.0, (2.0 + 0.5) * MM]),
        )
        .volume(
            VolumeSpec::new(CAP_BOTTOM, Shape::Tube(Tube::solid(can_radius, cap_half_z)), "G4_Al")
                .inside(ENVELOPE)
                .at([0.0, 0.0, -2.0 * GE_HALF_Z - 2.5 * MM]),
        )
        .volume(
            VolumeSpec::new(
                BLOCK,
                Shape::Trapezoid(Trapezoid::new(
                    50.0 * CM,
                    50.0 * CM,
                    50.0 * CM,
                    50.0 * CM,
                    2.5 * CM,
                )),
                "G4_Al",
            )
            .inside(WORLD)
            .at([0.0, 0.0, -55.0 * CM]),
        )
}
