//! Piecewise-linear score curves

use super::policy::VibrationThresholds;

/// Map a deviation to a 0-100 score.
///
/// `|z| <= caution` falls 100 to 70, `<= danger` falls 70 to 30, and past
/// danger the score falls 30 to 0, reaching 0 at twice the danger value.
pub fn health_score_from_z(z: f64, thresholds: &VibrationThresholds) -> f64 {
    let z = z.abs();
    let caution = thresholds.caution_z;
    let danger = thresholds.danger_z;

    let score = if z <= caution {
        (100.0 - z / caution * 30.0).max(70.0)
    } else if z <= danger {
        let progress = (z - caution) / (danger - caution);
        (70.0 - progress * 40.0).max(30.0)
    } else {
        let progress = ((z - danger) / danger).min(1.0);
        30.0 - progress * 30.0
    };
    score.clamp(0.0, 100.0)
}

/// Where a temperature sits relative to an absolute safe band
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneBand {
    Safe,
    /// Above the band, inside the tolerance margin
    SlightlyHigh,
    SlightlyLow,
    CriticalHigh,
    CriticalLow,
}

pub fn zone_band(mean: f64, min_safe: f64, max_safe: f64, tolerance: f64) -> ZoneBand {
    if (min_safe..=max_safe).contains(&mean) {
        ZoneBand::Safe
    } else if mean > max_safe {
        if mean - max_safe <= tolerance {
            ZoneBand::SlightlyHigh
        } else {
            ZoneBand::CriticalHigh
        }
    } else if min_safe - mean <= tolerance {
        ZoneBand::SlightlyLow
    } else {
        ZoneBand::CriticalLow
    }
}

/// 100 inside the band, 100 to 50 across the tolerance margin, 0 beyond
pub fn zone_score(mean: f64, min_safe: f64, max_safe: f64, tolerance: f64) -> f64 {
    let margin = |distance: f64| {
        if tolerance > 0.0 {
            100.0 - (distance / tolerance) * 50.0
        } else {
            50.0
        }
    };
    let score = match zone_band(mean, min_safe, max_safe, tolerance) {
        ZoneBand::Safe => 100.0,
        ZoneBand::SlightlyHigh => margin(mean - max_safe),
        ZoneBand::SlightlyLow => margin(min_safe - mean),
        ZoneBand::CriticalHigh | ZoneBand::CriticalLow => 0.0,
    };
    score.clamp(0.0, 100.0)
}

/// Classification of a window's temperature slope
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateBand {
    Stable,
    Elevated,
    Rapid,
    /// Mean outside the absolute limits regardless of slope
    CriticalHigh,
    CriticalLow,
}

pub fn rate_band(
    slope: f64,
    mean: f64,
    caution_rate: f64,
    danger_rate: f64,
    critical_low: f64,
    critical_high: f64,
) -> RateBand {
    if mean > critical_high {
        RateBand::CriticalHigh
    } else if mean < critical_low {
        RateBand::CriticalLow
    } else if slope.abs() <= caution_rate {
        RateBand::Stable
    } else if slope.abs() <= danger_rate {
        RateBand::Elevated
    } else {
        RateBand::Rapid
    }
}

/// 100 while stable, 100 to 50 up to the danger rate, 50 to 0 over one more
/// danger-rate width. Absolute limits force 0.
pub fn rate_score(
    slope: f64,
    mean: f64,
    caution_rate: f64,
    danger_rate: f64,
    critical_low: f64,
    critical_high: f64,
) -> f64 {
    let rate = slope.abs();
    let score = match rate_band(slope, mean, caution_rate, danger_rate, critical_low, critical_high) {
        RateBand::CriticalHigh | RateBand::CriticalLow => 0.0,
        RateBand::Stable => 100.0,
        RateBand::Elevated => {
            let span = danger_rate - caution_rate;
            let progress = if span > 0.0 { (rate - caution_rate) / span } else { 1.0 };
            100.0 - progress * 50.0
        }
        RateBand::Rapid => {
            let progress = if danger_rate > 0.0 {
                ((rate - danger_rate) / danger_rate).min(1.0)
            } else {
                1.0
            };
            50.0 - progress * 50.0
        }
    };
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSITIVE: VibrationThresholds = VibrationThresholds {
        caution_z: 1.2,
        danger_z: 2.0,
    };

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_vibration_curve_anchors() {
        assert!(approx(health_score_from_z(0.0, &SENSITIVE), 100.0));
        assert!(approx(health_score_from_z(0.6, &SENSITIVE), 85.0));
        assert!(approx(health_score_from_z(1.2, &SENSITIVE), 70.0));
        assert!(approx(health_score_from_z(1.6, &SENSITIVE), 50.0));
        assert!(approx(health_score_from_z(2.0, &SENSITIVE), 30.0));
        assert!(approx(health_score_from_z(3.0, &SENSITIVE), 15.0));
        assert!(approx(health_score_from_z(4.0, &SENSITIVE), 0.0));
        assert!(approx(health_score_from_z(40.0, &SENSITIVE), 0.0));
    }

    #[test]
    fn test_vibration_curve_is_symmetric() {
        assert!(approx(
            health_score_from_z(-1.6, &SENSITIVE),
            health_score_from_z(1.6, &SENSITIVE)
        ));
    }

    #[test]
    fn test_vibration_curve_monotonic() {
        let mut last = 100.0;
        for i in 0..100 {
            let score = health_score_from_z(i as f64 * 0.05, &SENSITIVE);
            assert!(score <= last + 1e-12);
            last = score;
        }
    }

    #[test]
    fn test_zone_score() {
        assert_eq!(zone_score(25.0, 15.0, 35.0, 5.0), 100.0);
        assert_eq!(zone_score(35.0, 15.0, 35.0, 5.0), 100.0);
        assert!(approx(zone_score(37.0, 15.0, 35.0, 5.0), 80.0));
        assert!(approx(zone_score(40.0, 15.0, 35.0, 5.0), 50.0));
        assert_eq!(zone_score(40.5, 15.0, 35.0, 5.0), 0.0);
        assert!(approx(zone_score(12.5, 15.0, 35.0, 5.0), 75.0));
        assert_eq!(zone_score(9.0, 15.0, 35.0, 5.0), 0.0);
        assert_eq!(zone_band(9.0, 15.0, 35.0, 5.0), ZoneBand::CriticalLow);
    }

    #[test]
    fn test_rate_score() {
        let score = |slope, mean| rate_score(slope, mean, 0.1, 0.5, 5.0, 85.0);
        assert_eq!(score(0.05, 40.0), 100.0);
        assert_eq!(score(-0.1, 40.0), 100.0);
        assert!(approx(score(0.3, 40.0), 75.0));
        assert!(approx(score(0.5, 40.0), 50.0));
        assert!(approx(score(-0.75, 40.0), 25.0));
        assert_eq!(score(2.0, 40.0), 0.0);
        assert_eq!(score(0.0, 90.0), 0.0);
        assert_eq!(score(0.0, 4.0), 0.0);
        assert_eq!(
            rate_band(0.0, 90.0, 0.1, 0.5, 5.0, 85.0),
            RateBand::CriticalHigh
        );
    }
}
