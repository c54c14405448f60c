//! Energy and dose units.
//!
//! Energies are carried in MeV and doses in MeV/g internally. Reports choose
//! the most readable unit through [`best_energy`] and [`best_dose`].

use std::fmt;

/// Mega-electronvolt (internal energy unit).
pub const MEV: f64 = 1.0;
pub const EV: f64 = 1.0e-6 * MEV;
pub const KEV: f64 = 1.0e-3 * MEV;
pub const GEV: f64 = 1.0e3 * MEV;
pub const TEV: f64 = 1.0e6 * MEV;

/// Gray per MeV/g: 1.602176634e-13 J / 1e-3 kg.
pub const GRAY_PER_MEV_PER_GRAM: f64 = 1.602_176_634e-10;

const ENERGY_UNITS: &[(&str, f64)] = &[
    ("TeV", TEV),
    ("GeV", GEV),
    ("MeV", MEV),
    ("keV", KEV),
    ("eV", EV),
];

const DOSE_UNITS: &[(&str, f64)] = &[
    ("Gy", 1.0),
    ("milliGy", 1.0e-3),
    ("microGy", 1.0e-6),
    ("nanoGy", 1.0e-9),
    ("picoGy", 1.0e-12),
];

/// Convert a dose from MeV/g to gray.
pub fn mev_per_gram_to_gray(dose: f64) -> f64 {
    dose * GRAY_PER_MEV_PER_GRAM
}

/// A value expressed in a chosen display unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestUnit {
    pub value: f64,
    pub unit: &'static str,
}

impl fmt::Display for BestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(4);
        write!(f, "{:.*} {}", precision, self.value, self.unit)
    }
}

/// Express an energy (MeV) in the largest unit that keeps the value ≥ 1.
pub fn best_energy(energy: f64) -> BestUnit {
    pick(energy, ENERGY_UNITS, "MeV")
}

/// Express a dose (gray) in the largest unit that keeps the value ≥ 1.
pub fn best_dose(gray: f64) -> BestUnit {
    pick(gray, DOSE_UNITS, "Gy")
}

fn pick(value: f64, units: &[(&'static str, f64)], zero_unit: &'static str) -> BestUnit {
    if value == 0.0 || !value.is_finite() {
        return BestUnit {
            value,
            unit: zero_unit,
        };
    }
    let (unit, scale) = units
        .iter()
        .copied()
        .find(|&(_, scale)| value.abs() >= scale)
        .unwrap_or(units[units.len() - 1]);
    BestUnit {
        value: value / scale,
        unit,
    }
}
