//! Statistical summary of normal operation for one profile

use crate::error::BaselineLoadError;
use crate::models::Sample;
use crate::stats;
use serde::{Deserialize, Serialize};

/// Sampling rate assumed when it cannot be derived from timestamps (Hz)
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 10.0;

/// Temperature rate statistics need more than this many samples
pub const MIN_SAMPLES_FOR_RATE: usize = 10;

/// Vibration magnitude distribution (g)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationBaseline {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    /// `mean + 2·std`
    pub threshold_normal: f64,
    /// `mean + 3·std`
    pub threshold_caution: f64,
}

impl VibrationBaseline {
    pub fn from_magnitudes(magnitudes: &[f64]) -> Self {
        let mean = stats::mean(magnitudes);
        let std = stats::std_dev(magnitudes);
        Self {
            mean,
            std,
            min: stats::min(magnitudes),
            max: stats::max(magnitudes),
            median: stats::median(magnitudes),
            p95: stats::percentile(magnitudes, 95.0),
            threshold_normal: mean + 2.0 * std,
            threshold_caution: mean + 3.0 * std,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Temperature distribution (°C)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBaseline {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl TemperatureBaseline {
    pub fn from_readings(readings: &[f64]) -> Self {
        Self {
            mean: stats::mean(readings),
            std: stats::std_dev(readings),
            min: stats::min(readings),
            max: stats::max(readings),
            median: stats::median(readings),
        }
    }
}

/// Temperature rate-of-change distribution (°C/s)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateBaseline {
    pub mean: f64,
    pub std: f64,
}

/// Immutable baseline for one speed or trajectory key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub key: String,
    pub sample_count: usize,
    pub duration_secs: f64,
    pub sampling_rate_hz: f64,
    pub vibration: VibrationBaseline,
    pub temperature: TemperatureBaseline,
    pub temperature_rate: RateBaseline,
}

impl BaselineRecord {
    /// Summarize a set of samples. Implausible samples are skipped; fewer
    /// than two usable samples is an error.
    pub fn from_samples(key: impl Into<String>, samples: &[Sample]) -> Result<Self, BaselineLoadError> {
        let key = key.into();
        let valid: Vec<&Sample> = samples.iter().filter(|s| s.validate().is_ok()).collect();
        if valid.len() < 2 {
            return Err(BaselineLoadError::Insufficient {
                profile: key,
                count: valid.len(),
            });
        }

        let timestamps: Vec<f64> = valid.iter().map(|s| s.timestamp).collect();
        let magnitudes: Vec<f64> = valid.iter().map(|s| s.magnitude()).collect();
        let temperatures: Vec<f64> = valid.iter().map(|s| s.temperature).collect();

        let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        let mean_interval = stats::mean(&intervals);
        let sampling_rate_hz = if mean_interval > 0.0 {
            1.0 / mean_interval
        } else {
            DEFAULT_SAMPLING_RATE_HZ
        };

        let temperature_rate = if valid.len() > MIN_SAMPLES_FOR_RATE {
            let rates: Vec<f64> = valid
                .windows(2)
                .filter_map(|w| {
                    let dt = w[1].timestamp - w[0].timestamp;
                    (dt > 0.0).then(|| (w[1].temperature - w[0].temperature) / dt)
                })
                .collect();
            RateBaseline {
                mean: stats::mean(&rates),
                std: stats::std_dev(&rates),
            }
        } else {
            RateBaseline::default()
        };

        let record = Self {
            sample_count: valid.len(),
            duration_secs: timestamps[timestamps.len() - 1] - timestamps[0],
            sampling_rate_hz,
            vibration: VibrationBaseline::from_magnitudes(&magnitudes),
            temperature: TemperatureBaseline::from_readings(&temperatures),
            temperature_rate,
            key,
        };
        record.validate()?;
        Ok(record)
    }

    /// Reject records whose statistics cannot drive scoring
    pub fn validate(&self) -> Result<(), BaselineLoadError> {
        let invalid = |reason: &str| BaselineLoadError::InvalidRecord {
            profile: self.key.clone(),
            reason: reason.to_string(),
        };

        let values = [
            self.duration_secs,
            self.sampling_rate_hz,
            self.vibration.mean,
            self.vibration.std,
            self.vibration.max,
            self.temperature.mean,
            self.temperature.std,
            self.temperature_rate.mean,
            self.temperature_rate.std,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("non-finite statistic"));
        }
        if self.vibration.std < 0.0 || self.temperature.std < 0.0 || self.temperature_rate.std < 0.0 {
            return Err(invalid("negative standard deviation"));
        }
        if self.vibration.min > self.vibration.max {
            return Err(invalid("vibration min exceeds max"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(count: usize, dt: f64) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let t = i as f64 * dt;
                // Alternate between 0.9 g and 1.1 g, temperature rising 0.1 °C per step
                let az = if i % 2 == 0 { 0.9 } else { 1.1 };
                Sample::new(t, 0.0, 0.0, az, 25.0 + i as f64 * 0.1)
            })
            .collect()
    }

    #[test]
    fn test_from_samples() {
        let record = BaselineRecord::from_samples("75", &steady(20, 0.5)).unwrap();
        assert_eq!(record.key, "75");
        assert_eq!(record.sample_count, 20);
        assert!((record.duration_secs - 9.5).abs() < 1e-9);
        assert!((record.sampling_rate_hz - 2.0).abs() < 1e-9);

        assert!((record.vibration.mean - 1.0).abs() < 1e-9);
        assert!((record.vibration.std - 0.1).abs() < 1e-9);
        assert!((record.vibration.max - 1.1).abs() < 1e-9);
        assert!((record.vibration.threshold_normal - 1.2).abs() < 1e-9);
        assert!((record.vibration.threshold_caution - 1.3).abs() < 1e-9);
        assert!((record.vibration.range() - 0.2).abs() < 1e-9);

        // 0.1 °C every 0.5 s
        assert!((record.temperature_rate.mean - 0.2).abs() < 1e-9);
        assert!(record.temperature_rate.std < 1e-9);
    }

    #[test]
    fn test_rate_stats_need_more_than_ten_samples() {
        let record = BaselineRecord::from_samples("50", &steady(10, 0.1)).unwrap();
        assert_eq!(record.temperature_rate, RateBaseline::default());
    }

    #[test]
    fn test_invalid_samples_skipped() {
        let mut samples = steady(5, 1.0);
        samples.push(Sample::new(10.0, f64::NAN, 0.0, 1.0, 25.0));
        samples.push(Sample::new(11.0, 0.0, 0.0, 1.0, 200.0));
        let record = BaselineRecord::from_samples("60", &samples).unwrap();
        assert_eq!(record.sample_count, 5);
    }

    #[test]
    fn test_insufficient() {
        let err = BaselineRecord::from_samples("90", &steady(1, 1.0)).unwrap_err();
        assert!(matches!(err, BaselineLoadError::Insufficient { count: 1, .. }));
    }

    #[test]
    fn test_identical_timestamps_use_default_rate() {
        let samples = vec![
            Sample::new(3.0, 0.0, 0.0, 1.0, 25.0),
            Sample::new(3.0, 0.0, 0.0, 1.0, 25.0),
        ];
        let record = BaselineRecord::from_samples("100", &samples).unwrap();
        assert_eq!(record.sampling_rate_hz, DEFAULT_SAMPLING_RATE_HZ);
    }

    #[test]
    fn test_serde() {
        let record = BaselineRecord::from_samples("75", &steady(12, 0.1)).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: BaselineRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, record.key);
        assert_eq!(back.sample_count, 12);
    }
}
