use serde::{Deserialize, Serialize};

/// m/z tolerance with an absolute and a relative (ppm) component.
///
/// The effective tolerance at a given m/z is the larger of the two, so the
/// absolute component acts as a floor at low masses while the relative
/// component takes over at high masses.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MzTolerance {
    /// Absolute tolerance in Th.
    pub absolute: f64,
    /// Relative tolerance in parts per million.
    pub ppm: f64,
}

impl MzTolerance {
    /// Creates a new `MzTolerance` instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use imtrace::tolerance::MzTolerance;
    ///
    /// let tolerance = MzTolerance::new(0.5, 0.0);
    /// assert_eq!(tolerance.bounds(100.0), (99.5, 100.5));
    /// ```
    pub fn new(absolute: f64, ppm: f64) -> Self {
        MzTolerance { absolute, ppm }
    }

    /// Effective absolute tolerance at `mz`.
    pub fn tolerance_at(&self, mz: f64) -> f64 {
        self.absolute.max(mz * self.ppm * 1e-6)
    }

    /// Tolerance window around `mz` as (lower, upper).
    pub fn bounds(&self, mz: f64) -> (f64, f64) {
        let tolerance = self.tolerance_at(mz);
        (mz - tolerance, mz + tolerance)
    }

    /// Whether `other` lies within the tolerance window around `base`.
    pub fn within(&self, base: f64, other: f64) -> bool {
        let (lower, upper) = self.bounds(base);
        lower <= other && other <= upper
    }
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance { absolute: 0.001, ppm: 5.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_floor_at_low_mass() {
        let tolerance = MzTolerance::new(0.01, 5.0);
        // 100 Th * 5 ppm = 0.0005, well below the absolute floor
        assert_eq!(tolerance.tolerance_at(100.0), 0.01);
    }

    #[test]
    fn test_ppm_dominates_at_high_mass() {
        let tolerance = MzTolerance::new(0.001, 10.0);
        // 2000 Th * 10 ppm = 0.02
        assert!((tolerance.tolerance_at(2000.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_within_uses_base_window() {
        let tolerance = MzTolerance::new(0.5, 0.0);
        assert!(tolerance.within(100.0, 100.5));
        assert!(tolerance.within(100.0, 99.5));
        assert!(!tolerance.within(100.0, 100.6));
    }
}
