//! Primary particle description.
//!
//! The source only describes the primary; sampling and tracking belong to
//! the transport engine.

use gray_geometry::presets::ENVELOPE;
use gray_geometry::units::MM;
use gray_geometry::{GeometryModel, Shape};
use serde::{Deserialize, Serialize};

use crate::units::{best_energy, MEV};

/// Starting state of one event's primary particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryVertex {
    pub particle: String,
    /// Kinetic energy (MeV).
    pub energy: f64,
    /// Position in the world frame (mm).
    pub position: [f64; 3],
    /// Unit direction of flight.
    pub direction: [f64; 3],
}

/// Supplier of primary vertices and of the run condition shown in reports.
pub trait PrimarySource: Send + Sync {
    /// Human-readable run condition, e.g. `"gamma of 2.62 MeV"`.
    fn describe(&self) -> String;

    fn primary(&self, event_id: u64) -> PrimaryVertex;
}

/// A mono-energetic pencil beam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleGun {
    pub particle: String,
    /// Kinetic energy (MeV).
    pub energy: f64,
    /// Position (mm).
    pub position: [f64; 3],
    pub direction: [f64; 3],
}

impl Default for ParticleGun {
    fn default() -> Self {
        // Tl-208 line, fired down onto the detector cap.
        Self {
            particle: "gamma".to_string(),
            energy: 2.62 * MEV,
            position: [0.0, 0.0, 2.5 * MM],
            direction: [0.0, 0.0, -1.0],
        }
    }
}

impl ParticleGun {
    /// Check the gun position against the envelope of `model`.
    ///
    /// The envelope is looked up by name. When it is missing, is not a box,
    /// or does not contain the gun, the gun is moved to the origin.
    pub fn place_in_envelope(mut self, model: &GeometryModel) -> Self {
        let envelope = model.find_volume(ENVELOPE).ok().and_then(|id| {
            match model.volume(id).shape() {
                Shape::Box(cuboid) => Some((id, cuboid)),
                _ => None,
            }
        });

        match envelope {
            Some((id, cuboid)) => {
                let local = model.global_transform(id).apply_inverse(&self.position);
                let half = [cuboid.dx, cuboid.dy, cuboid.dz];
                if (0..3).any(|axis| local[axis].abs() > half[axis]) {
                    log::warn!(
                        "Gun position {:?} mm lies outside the envelope. The gun will be placed at the center.",
                        self.position
                    );
                    self.position = [0.0; 3];
                }
            }
            None => {
                log::warn!(
                    "Envelope volume of box shape not found. Perhaps you have changed geometry. \
                     The gun will be placed at the center."
                );
                self.position = [0.0; 3];
            }
        }
        self
    }
}

impl PrimarySource for ParticleGun {
    fn describe(&self) -> String {
        let energy = best_energy(self.energy);
        // Trim representation noise such as 662.0000000000001 keV.
        let value = (energy.value * 1e6).round() / 1e6;
        format!("{} of {} {}", self.particle, value, energy.unit)
    }

    fn primary(&self, _event_id: u64) -> PrimaryVertex {
        PrimaryVertex {
            particle: self.particle.clone(),
            energy: self.energy,
            position: self.position,
            direction: self.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gray_geometry::units::CM;
    use gray_geometry::{Cuboid, GeometryBuilder, VolumeSpec};

    #[test]
    fn test_describe() {
        assert_eq!(ParticleGun::default().describe(), "gamma of 2.62 MeV");
        let gun = ParticleGun {
            particle: "e-".to_string(),
            energy: 0.662,
            ..ParticleGun::default()
        };
        assert_eq!(gun.describe(), "e- of 662 keV");
    }

    #[test]
    fn test_gun_kept_inside_envelope() {
        let model = gray_geometry::presets::germanium_detector().unwrap();
        let gun = ParticleGun::default().place_in_envelope(&model);
        assert_eq!(gun.position, [0.0, 0.0, 2.5]);

        let outside = ParticleGun {
            position: [0.0, 0.0, 55.0 * CM],
            ..ParticleGun::default()
        }
        .place_in_envelope(&model);
        assert_eq!(outside.position, [0.0; 3]);
    }

    #[test]
    fn test_gun_centred_without_envelope() {
        let model = GeometryBuilder::new()
            .volume(VolumeSpec::new(
                "World",
                Shape::Box(Cuboid::new(10.0, 10.0, 10.0)),
                "G4_AIR",
            ))
            .build()
            .unwrap();
        let gun = ParticleGun::default().place_in_envelope(&model);
        assert_eq!(gun.position, [0.0; 3]);
    }
}
