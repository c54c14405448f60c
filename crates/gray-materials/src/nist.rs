//! Densities of NIST reference materials.
//!
//! The identifiers follow the `G4_` naming scheme used by radiation transport
//! toolkits so that geometry descriptions can be shared verbatim. Values are
//! taken from the NIST ESTAR/PSTAR material compositions.
//!
//! | Identifier | Description | Density (g/cm³) |
//! |-----------|-------------|-----------------|
//! | `G4_Galactic` | Near-vacuum | 1e-25 |
//! | `G4_AIR` | Dry air, sea level | 0.00120479 |
//! | `G4_Ge` | Germanium | 5.323 |
//! | `G4_Al` | Aluminium | 2.699 |
//! | `G4_Pb` | Lead | 11.35 |

use std::collections::BTreeMap;

use crate::provider::{Material, MaterialDatabase, MaterialError};

// (identifier, density g/cm³)
const NIST_TABLE: &[(&str, f64)] = &[
    ("G4_Galactic", 1.0e-25),
    ("G4_AIR", 0.001_204_79),
    ("G4_WATER", 1.0),
    ("G4_Al", 2.699),
    ("G4_Si", 2.33),
    ("G4_Fe", 7.874),
    ("G4_Cu", 8.96),
    ("G4_Ge", 5.323),
    ("G4_Pb", 11.35),
    ("G4_W", 19.3),
    ("G4_BGO", 7.13),
    ("G4_SODIUM_IODIDE", 3.667),
    ("G4_PLASTIC_SC_VINYLTOLUENE", 1.032),
    ("G4_A-150_TISSUE", 1.127),
    ("G4_BONE_COMPACT_ICRU", 1.85),
];

/// NIST material table, optionally extended with user materials.
#[derive(Debug, Clone)]
pub struct NistDatabase {
    materials: BTreeMap<String, Material>,
}

impl NistDatabase {
    /// Load the built-in NIST table.
    pub fn new() -> Self {
        let materials = NIST_TABLE
            .iter()
            .map(|&(name, density)| {
                (
                    name.to_string(),
                    Material {
                        name: name.to_string(),
                        density,
                    },
                )
            })
            .collect();
        Self { materials }
    }

    /// Register (or replace) a custom material.
    pub fn with_material(
        mut self,
        name: impl Into<String>,
        density: f64,
    ) -> Result<Self, MaterialError> {
        let material = Material::new(name, density)?;
        if self.materials.contains_key(&material.name) {
            log::warn!("Overriding density of material '{}'", material.name);
        }
        self.materials.insert(material.name.clone(), material);
        Ok(self)
    }
}

impl Default for NistDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialDatabase for NistDatabase {
    fn source_name(&self) -> &str {
        "NIST"
    }

    fn lookup(&self, name: &str) -> Result<&Material, MaterialError> {
        self.materials
            .get(name)
            .ok_or_else(|| MaterialError::UnknownMaterial(name.to_string()))
    }

    fn materials(&self) -> Vec<&Material> {
        self.materials.values().collect()
    }
}
