//! Material database trait.
//!
//! Geometry volumes refer to their material by name only. The scoring layer
//! resolves that name through a [`MaterialDatabase`] when it needs a mass.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from material lookups.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MaterialError {
    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("Material '{name}' has invalid density {density} g/cm³")]
    InvalidDensity { name: String, density: f64 },
}

/// A named bulk material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Identifier, e.g. `G4_Ge`.
    pub name: String,
    /// Density (g/cm³).
    pub density: f64,
}

impl Material {
    /// Construct a material, rejecting non-physical densities.
    pub fn new(name: impl Into<String>, density: f64) -> Result<Self, MaterialError> {
        let name = name.into();
        if !density.is_finite() || density <= 0.0 {
            return Err(MaterialError::InvalidDensity { name, density });
        }
        Ok(Self { name, density })
    }
}

/// Resolves material identifiers to material properties.
///
/// Implementations must be shareable across worker threads: the geometry is
/// queried from the aggregating thread while workers are still running.
pub trait MaterialDatabase: Send + Sync {
    /// Human-readable name of this data source.
    fn source_name(&self) -> &str;

    /// Look up a material by identifier.
    fn lookup(&self, name: &str) -> Result<&Material, MaterialError>;

    /// Density of the named material (g/cm³).
    fn density(&self, name: &str) -> Result<f64, MaterialError> {
        Ok(self.lookup(name)?.density)
    }

    /// All materials known to this source, in a stable order.
    fn materials(&self) -> Vec<&Material>;
}
