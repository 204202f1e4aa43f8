//! Attack/release thresholds derived from the noise floor.

use super::noise_floor::NoiseStatistics;

/// Energy levels that open and close the gate, in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    pub attack: f64,
    pub release: f64,
}

impl ThresholdPair {
    /// Thresholds used while the noise window is still calibrating.
    pub const UNCALIBRATED: Self = Self {
        attack: f64::INFINITY,
        release: f64::INFINITY,
    };

    pub fn is_finite(&self) -> bool {
        self.attack.is_finite() && self.release.is_finite()
    }
}

/// Map noise statistics to a threshold pair.
///
/// Until the window holds `capacity` samples both thresholds are +inf, so
/// nothing can open the gate.
pub fn compute(
    stats: NoiseStatistics,
    attack_factor: f64,
    release_factor: f64,
    window_len: usize,
    capacity: usize,
) -> ThresholdPair {
    if window_len < capacity {
        return ThresholdPair::UNCALIBRATED;
    }
    ThresholdPair {
        attack: stats.mean + attack_factor * stats.std,
        release: stats.mean + release_factor * stats.std,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UNIT: NoiseStatistics = NoiseStatistics {
        mean: 0.0,
        std: 1.0,
    };

    #[test]
    fn test_unit_noise() {
        let th = compute(UNIT, 6.0, 2.5, 86, 86);
        assert_relative_eq!(th.attack, 6.0);
        assert_relative_eq!(th.release, 2.5);
        assert!(th.is_finite());
    }

    #[test]
    fn test_infinite_while_calibrating() {
        let th = compute(UNIT, 6.0, 2.5, 85, 86);
        assert_eq!(th, ThresholdPair::UNCALIBRATED);
        assert!(!th.is_finite());
    }

    #[test]
    fn test_offset_noise() {
        let stats = NoiseStatistics {
            mean: -55.0,
            std: 2.0,
        };
        let th = compute(stats, 6.0, 2.5, 4, 4);
        assert_relative_eq!(th.attack, -43.0);
        assert_relative_eq!(th.release, -50.0);
    }
}
