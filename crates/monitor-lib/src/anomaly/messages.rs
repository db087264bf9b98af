//! Diagnostic text for a health result

use super::policy::{TemperaturePolicy, VibrationThresholds};
use super::scoring::{rate_band, zone_band, RateBand, ZoneBand};
use crate::models::{HealthState, TemperatureHealth};

/// Shown while the window is empty or too short to score
pub const WAITING_FOR_DATA: &str = "Waiting for data...";

/// Vibration line, keyed on the signed effective deviation
pub fn vibration_message(z: f64, thresholds: &VibrationThresholds) -> String {
    let magnitude = z.abs();
    let text = if magnitude <= thresholds.caution_z {
        "Vibration within normal range"
    } else if magnitude <= thresholds.danger_z {
        if z > 0.0 {
            "Vibration elevated above normal"
        } else {
            "Vibration unusually low"
        }
    } else if z > 0.0 {
        "High vibration detected!"
    } else {
        "Abnormally low vibration!"
    };
    text.to_string()
}

/// Temperature line for the active strategy
pub fn temperature_message(temperature: &TemperatureHealth, policy: &TemperaturePolicy) -> String {
    if temperature.state == HealthState::SensorOff {
        return "Temperature sensor disconnected".to_string();
    }
    let mean = temperature.mean;

    match *policy {
        TemperaturePolicy::AbsoluteZone {
            min_safe,
            max_safe,
            tolerance,
        } => match zone_band(mean, min_safe, max_safe, tolerance) {
            ZoneBand::Safe => format!("Temperature optimal ({mean:.1}°C)"),
            ZoneBand::SlightlyHigh => format!("Temperature slightly high ({mean:.1}°C)"),
            ZoneBand::SlightlyLow => format!("Temperature slightly low ({mean:.1}°C)"),
            ZoneBand::CriticalHigh => format!("Temperature CRITICAL HIGH ({mean:.1}°C)!"),
            ZoneBand::CriticalLow => format!("Temperature CRITICAL LOW ({mean:.1}°C)!"),
        },
        TemperaturePolicy::RateOfChange {
            caution_rate,
            danger_rate,
            critical_low,
            critical_high,
        } => {
            let slope = temperature.slope;
            let direction = if slope >= 0.0 { "rising" } else { "falling" };
            match rate_band(slope, mean, caution_rate, danger_rate, critical_low, critical_high) {
                RateBand::CriticalHigh => format!("Temperature CRITICAL HIGH ({mean:.1}°C)!"),
                RateBand::CriticalLow => format!("Temperature CRITICAL LOW ({mean:.1}°C)!"),
                RateBand::Stable => format!("Temperature stable ({mean:.1}°C)"),
                RateBand::Elevated => {
                    format!("Temperature {direction} ({slope:+.2}°C/s at {mean:.1}°C)")
                }
                RateBand::Rapid => {
                    format!("Temperature {direction} rapidly ({slope:+.2}°C/s at {mean:.1}°C)!")
                }
            }
        }
    }
}

/// Summary line in five bands of the overall score
pub fn overall_message(score: f64) -> String {
    let text = if score >= 90.0 {
        "Motor operating in excellent condition"
    } else if score >= 70.0 {
        "Motor operating normally"
    } else if score >= 50.0 {
        "Minor deviations detected - monitor closely"
    } else if score >= 30.0 {
        "Caution - significant deviations from baseline"
    } else {
        "Critical - immediate inspection recommended!"
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn temperature(mean: f64, slope: f64, state: HealthState) -> TemperatureHealth {
        TemperatureHealth {
            mean,
            std: 0.0,
            min: mean,
            max: mean,
            slope,
            z_score: 0.0,
            rate_z_score: 0.0,
            health_score: 100.0,
            state,
            severity: Severity::Ok,
        }
    }

    #[test]
    fn test_vibration_messages() {
        let t = VibrationThresholds {
            caution_z: 1.2,
            danger_z: 2.0,
        };
        assert_eq!(vibration_message(0.5, &t), "Vibration within normal range");
        assert_eq!(vibration_message(-1.2, &t), "Vibration within normal range");
        assert_eq!(vibration_message(1.5, &t), "Vibration elevated above normal");
        assert_eq!(vibration_message(-1.5, &t), "Vibration unusually low");
        assert_eq!(vibration_message(2.5, &t), "High vibration detected!");
        assert_eq!(vibration_message(-2.5, &t), "Abnormally low vibration!");
    }

    #[test]
    fn test_zone_temperature_messages() {
        let zone = TemperaturePolicy::absolute_zone();
        let msg = |mean| temperature_message(&temperature(mean, 0.0, HealthState::Normal), &zone);
        assert_eq!(msg(25.04), "Temperature optimal (25.0°C)");
        assert_eq!(msg(37.0), "Temperature slightly high (37.0°C)");
        assert_eq!(msg(12.0), "Temperature slightly low (12.0°C)");
        assert_eq!(msg(45.0), "Temperature CRITICAL HIGH (45.0°C)!");
        assert_eq!(msg(5.0), "Temperature CRITICAL LOW (5.0°C)!");
        assert_eq!(
            temperature_message(&temperature(0.2, 0.0, HealthState::SensorOff), &zone),
            "Temperature sensor disconnected"
        );
    }

    #[test]
    fn test_rate_temperature_messages() {
        let rate = TemperaturePolicy::rate_of_change();
        let msg = |slope| temperature_message(&temperature(40.0, slope, HealthState::Normal), &rate);
        assert_eq!(msg(0.01), "Temperature stable (40.0°C)");
        assert_eq!(msg(0.25), "Temperature rising (+0.25°C/s at 40.0°C)");
        assert_eq!(msg(-1.0), "Temperature falling rapidly (-1.00°C/s at 40.0°C)!");
    }

    #[test]
    fn test_overall_bands() {
        assert_eq!(overall_message(95.0), "Motor operating in excellent condition");
        assert_eq!(overall_message(90.0), "Motor operating in excellent condition");
        assert_eq!(overall_message(75.0), "Motor operating normally");
        assert_eq!(overall_message(55.0), "Minor deviations detected - monitor closely");
        assert_eq!(overall_message(30.0), "Caution - significant deviations from baseline");
        assert_eq!(overall_message(10.0), "Critical - immediate inspection recommended!");
    }
}
