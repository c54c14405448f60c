//! Length and angle units.
//!
//! The geometry works internally in millimetres and radians. Multiply a
//! literal by one of these constants to express it in internal units, e.g.
//! `100.0 * CM`.

/// Millimetre (internal length unit).
pub const MM: f64 = 1.0;
/// Centimetre.
pub const CM: f64 = 10.0 * MM;
/// Nanometre.
pub const NM: f64 = 1.0e-6 * MM;

/// Cubic millimetres per cubic centimetre.
pub const MM3_PER_CM3: f64 = CM * CM * CM;

/// Degree.
pub const DEG: f64 = std::f64::consts::PI / 180.0;

/// Full turn.
pub const TWO_PI: f64 = 2.0 * std::f64::consts::PI;
