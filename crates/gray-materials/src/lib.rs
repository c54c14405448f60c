//! # Gray Materials
//!
//! Material property providers for the Gray framework. All material sources
//! implement the [`MaterialDatabase`](provider::MaterialDatabase) trait, which
//! resolves a material identifier to its bulk density.
//!
//! ## Available data sources
//!
//! | Source | Module | Status |
//! |--------|--------|--------|
//! | NIST compounds and elements (`G4_*` identifiers) | [`nist`] | Implemented |
//! | User-registered materials | [`nist::NistDatabase::with_material`] | Implemented |
//!
//! Densities are expressed in g/cm³ throughout.

pub mod nist;
pub mod provider;

pub use nist::NistDatabase;
pub use provider::{Material, MaterialDatabase, MaterialError};
