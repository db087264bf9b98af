//! Windowed health scoring against a baseline

use super::messages::{overall_message, temperature_message, vibration_message, WAITING_FOR_DATA};
use super::policy::{MachinePolicy, TemperaturePolicy};
use super::scoring::{health_score_from_z, rate_score, zone_score};
use crate::baseline::BaselineRecord;
use crate::models::{
    HealthResult, HealthState, SensorSnapshot, SignalFeatures, TemperatureHealth, VibrationHealth,
};
use crate::stats;
use crate::window;
use std::sync::Arc;

/// Mean temperature below which the sensor is treated as unplugged (°C)
pub const SENSOR_OFF_THRESHOLD_C: f64 = 1.0;

/// Scale applied to the window-max / baseline-max ratio to form the impact score
const IMPACT_SCALE: f64 = 5.0;

/// Scores windows against one baseline under one policy.
///
/// Holds no per-call state; swapping profiles means building a new engine.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    baseline: Arc<BaselineRecord>,
    policy: MachinePolicy,
}

impl AnomalyEngine {
    pub fn new(baseline: Arc<BaselineRecord>, policy: MachinePolicy) -> Self {
        Self { baseline, policy }
    }

    pub fn baseline(&self) -> &Arc<BaselineRecord> {
        &self.baseline
    }

    pub fn policy(&self) -> &MachinePolicy {
        &self.policy
    }

    /// Score the trailing `window_duration` seconds of `data`.
    ///
    /// Empty input or a window with fewer than two samples yields
    /// [`AnomalyEngine::empty_result`].
    pub fn analyze(&self, data: &SensorSnapshot, window_duration: f64) -> HealthResult {
        if data.is_empty() {
            return self.empty_result();
        }

        let window = window::extract(data, window_duration);
        if !window::is_sufficient(&window) {
            return self.empty_result();
        }

        let magnitudes = stats::magnitudes(&window.ax, &window.ay, &window.az);
        let vibration = self.analyze_vibration(&magnitudes);
        let temperature = self.analyze_temperature(&window.temperature, &window.timestamps);

        let overall_health_score = vibration.health_score.min(temperature.health_score);
        let overall_state = HealthState::from_score(overall_health_score);

        let messages = vec![
            vibration_message(vibration.z_score, &self.policy.vibration),
            temperature_message(&temperature, &self.policy.temperature),
            overall_message(overall_health_score),
        ];
        let primary_message = messages[0].clone();

        HealthResult {
            vibration,
            temperature,
            overall_health_score,
            overall_state,
            overall_severity: overall_state.severity(),
            messages,
            primary_message,
            sample_count: window.len(),
            window_duration,
            baseline_key: self.baseline.key.clone(),
        }
    }

    fn analyze_vibration(&self, magnitudes: &[f64]) -> VibrationHealth {
        let baseline = &self.baseline.vibration;
        let mean = stats::mean(magnitudes);
        let max = stats::max(magnitudes);

        let z_mean = stats::z_score(mean, baseline.mean, baseline.std);
        let z_impact = if baseline.max > 0.0 {
            (max / baseline.max - 1.0) * IMPACT_SCALE
        } else {
            0.0
        };
        // Larger magnitude wins; the sign is kept for the low-vibration messages
        let z_score = if z_impact.abs() > z_mean.abs() {
            z_impact
        } else {
            z_mean
        };

        let health_score = health_score_from_z(z_score, &self.policy.vibration);
        let state = HealthState::from_score(health_score);

        VibrationHealth {
            mean,
            std: stats::std_dev(magnitudes),
            min: stats::min(magnitudes),
            max,
            z_score,
            z_mean,
            z_impact,
            health_score,
            state,
            severity: state.severity(),
            features: SignalFeatures {
                rms: stats::rms(magnitudes),
                peak_to_peak: stats::peak_to_peak(magnitudes),
                p95: stats::percentile(magnitudes, 95.0),
                cv_percent: stats::coefficient_of_variation(magnitudes),
                skewness: stats::skewness(magnitudes),
                kurtosis: stats::kurtosis(magnitudes),
            },
        }
    }

    fn analyze_temperature(&self, temperatures: &[f64], timestamps: &[f64]) -> TemperatureHealth {
        let mean = stats::mean(temperatures);
        let slope = stats::linear_regression_slope(timestamps, temperatures);
        let baseline = &self.baseline;
        let z_score = stats::z_score(mean, baseline.temperature.mean, baseline.temperature.std);
        let rate_z_score = stats::z_score(
            slope,
            baseline.temperature_rate.mean,
            baseline.temperature_rate.std,
        );

        let (health_score, state) = if mean < SENSOR_OFF_THRESHOLD_C {
            (100.0, HealthState::SensorOff)
        } else {
            let score = match self.policy.temperature {
                TemperaturePolicy::AbsoluteZone {
                    min_safe,
                    max_safe,
                    tolerance,
                } => zone_score(mean, min_safe, max_safe, tolerance),
                TemperaturePolicy::RateOfChange {
                    caution_rate,
                    danger_rate,
                    critical_low,
                    critical_high,
                } => rate_score(slope, mean, caution_rate, danger_rate, critical_low, critical_high),
            };
            (score, HealthState::from_score(score))
        };

        TemperatureHealth {
            mean,
            std: stats::std_dev(temperatures),
            min: stats::min(temperatures),
            max: stats::max(temperatures),
            slope,
            z_score,
            rate_z_score,
            health_score,
            state,
            severity: state.severity(),
        }
    }

    /// Result reported when there is nothing to score
    pub fn empty_result(&self) -> HealthResult {
        let no_data = HealthState::NoData;
        HealthResult {
            vibration: VibrationHealth {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                z_score: 0.0,
                z_mean: 0.0,
                z_impact: 0.0,
                health_score: 100.0,
                state: no_data,
                severity: no_data.severity(),
                features: SignalFeatures::default(),
            },
            temperature: TemperatureHealth {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                slope: 0.0,
                z_score: 0.0,
                rate_z_score: 0.0,
                health_score: 100.0,
                state: no_data,
                severity: no_data.severity(),
            },
            overall_health_score: 100.0,
            overall_state: no_data,
            overall_severity: no_data.severity(),
            messages: vec![WAITING_FOR_DATA.to_string()],
            primary_message: WAITING_FOR_DATA.to_string(),
            sample_count: 0,
            window_duration: 0.0,
            baseline_key: self.baseline.key.clone(),
        }
    }
}
