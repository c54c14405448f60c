//! Fixed-width 1D histogram.

use serde::{Deserialize, Serialize};

use super::SinkError;

/// A fixed-width histogram over `[min, max)` with under- and overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub name: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    /// Σx over all entries, including under/overflow.
    sum: f64,
    /// Σx² over all entries.
    sum_squares: f64,
}

impl Histogram1D {
    pub fn new(
        name: &str,
        label: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, SinkError> {
        let invalid = |reason: &str| SinkError::InvalidBinning {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if bins == 0 {
            return Err(invalid("zero bins"));
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(invalid("range must be finite with max > min"));
        }
        Ok(Self {
            name: name.to_string(),
            label: label.to_string(),
            min,
            max,
            counts: vec![0; bins],
            underflow: 0,
            overflow: 0,
            sum: 0.0,
            sum_squares: 0.0,
        })
    }

    pub fn fill(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        if value < self.min {
            self.underflow += 1;
        } else if value >= self.max {
            self.overflow += 1;
        } else {
            let width = self.bin_width();
            let bin = (((value - self.min) / width) as usize).min(self.counts.len() - 1);
            self.counts[bin] += 1;
        }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Lower and upper edge of an in-range bin.
    pub fn bin_edges(&self, bin: usize) -> (f64, f64) {
        let width = self.bin_width();
        (
            self.min + width * bin as f64,
            self.min + width * (bin + 1) as f64,
        )
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Total number of fills.
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }

    /// Mean of all filled values, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        let n = self.entries();
        (n > 0).then(|| self.sum / n as f64)
    }

    /// Population standard deviation of all filled values.
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.entries() as f64;
        let mean = self.mean()?;
        Some((self.sum_squares / n - mean * mean).max(0.0).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_binning_and_overflow() {
        let mut h = Histogram1D::new("Eabs", "Edep in absorber", 100, 0.0, 5.0).unwrap();
        for v in [0.0, 0.04, 0.05, 2.5, 4.999, 5.0, -0.1] {
            h.fill(v);
        }
        assert_eq!(h.counts()[0], 2);
        assert_eq!(h.counts()[1], 1);
        assert_eq!(h.counts()[50], 1);
        assert_eq!(h.counts()[99], 1);
        assert_eq!(h.overflow(), 1);
        assert_eq!(h.underflow(), 1);
        assert_eq!(h.entries(), 7);
    }

    #[test]
    fn test_moments() {
        let mut h = Histogram1D::new("h", "", 10, 0.0, 10.0).unwrap();
        assert!(h.mean().is_none());
        for v in [1.0, 2.0, 3.0] {
            h.fill(v);
        }
        assert_relative_eq!(h.mean().unwrap(), 2.0);
        assert_relative_eq!(h.std_dev().unwrap(), (2.0f64 / 3.0).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_binning() {
        assert!(Histogram1D::new("h", "", 0, 0.0, 1.0).is_err());
        assert!(Histogram1D::new("h", "", 10, 1.0, 1.0).is_err());
        assert!(Histogram1D::new("h", "", 10, 0.0, f64::INFINITY).is_err());
    }
}
