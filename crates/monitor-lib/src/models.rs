//! Core data models for the motor monitor

use crate::error::InvalidSampleError;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

/// Accelerometer range accepted on any axis (g)
pub const ACCEL_LIMIT_G: f64 = 50.0;

/// Lowest plausible temperature reading (°C)
pub const TEMP_MIN_C: f64 = -40.0;

/// Highest plausible temperature reading (°C)
pub const TEMP_MAX_C: f64 = 150.0;

/// One accelerometer + temperature reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    /// Degrees Celsius
    pub temperature: f64,
}

impl Sample {
    pub fn new(timestamp: f64, ax: f64, ay: f64, az: f64, temperature: f64) -> Self {
        Self {
            timestamp,
            ax,
            ay,
            az,
            temperature,
        }
    }

    /// Check the physical plausibility rules for this reading
    pub fn validate(&self) -> Result<(), InvalidSampleError> {
        let fields = [
            ("timestamp", self.timestamp),
            ("ax", self.ax),
            ("ay", self.ay),
            ("az", self.az),
            ("temperature", self.temperature),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(InvalidSampleError::NonFinite { field });
            }
        }

        for (axis, value) in [("ax", self.ax), ("ay", self.ay), ("az", self.az)] {
            if !(-ACCEL_LIMIT_G..=ACCEL_LIMIT_G).contains(&value) {
                return Err(InvalidSampleError::AccelerationOutOfRange { axis, value });
            }
        }

        if !(TEMP_MIN_C..=TEMP_MAX_C).contains(&self.temperature) {
            return Err(InvalidSampleError::TemperatureOutOfRange(self.temperature));
        }

        Ok(())
    }

    /// Vibration magnitude (Euclidean norm of the three axes)
    pub fn magnitude(&self) -> f64 {
        crate::stats::magnitude(self.ax, self.ay, self.az)
    }
}

/// Returns true when the raw readings are finite and inside the sensor's physical range
pub fn validate_sensor_data(ax: f64, ay: f64, az: f64, temperature: f64) -> bool {
    Sample::new(0.0, ax, ay, az, temperature).validate().is_ok()
}

/// Wall-clock seconds since the Unix epoch that never run backwards.
///
/// Anchored once to the system clock, then advanced with a monotonic instant.
pub fn wall_clock_secs() -> f64 {
    static ANCHOR: OnceLock<(f64, Instant)> = OnceLock::new();
    let (epoch, start) = ANCHOR.get_or_init(|| {
        let now = chrono::Utc::now();
        (now.timestamp_micros() as f64 / 1_000_000.0, Instant::now())
    });
    epoch + start.elapsed().as_secs_f64()
}

/// Column-oriented copy of buffered samples.
///
/// All five vectors always have the same length. An empty snapshot is the
/// canonical "no data yet" value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub timestamps: Vec<f64>,
    pub ax: Vec<f64>,
    pub ay: Vec<f64>,
    pub az: Vec<f64>,
    pub temperature: Vec<f64>,
}

impl SensorSnapshot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            ax: Vec::with_capacity(capacity),
            ay: Vec::with_capacity(capacity),
            az: Vec::with_capacity(capacity),
            temperature: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: &Sample) {
        self.timestamps.push(sample.timestamp);
        self.ax.push(sample.ax);
        self.ay.push(sample.ay);
        self.az.push(sample.az);
        self.temperature.push(sample.temperature);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Timestamp of the most recent sample
    pub fn newest(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Time covered between the oldest and newest sample
    pub fn span_secs(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) if self.len() > 1 => last - first,
            _ => 0.0,
        }
    }

    /// Row `index` as a sample
    pub fn sample(&self, index: usize) -> Option<Sample> {
        Some(Sample::new(
            *self.timestamps.get(index)?,
            self.ax[index],
            self.ay[index],
            self.az[index],
            self.temperature[index],
        ))
    }
}

impl<'a> FromIterator<&'a Sample> for SensorSnapshot {
    fn from_iter<I: IntoIterator<Item = &'a Sample>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut snapshot = Self::with_capacity(iter.size_hint().0);
        for sample in iter {
            snapshot.push(sample);
        }
        snapshot
    }
}

/// Discrete health state shown next to a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    #[serde(rename = "No Data")]
    NoData,
    #[serde(rename = "Sensor Off")]
    SensorOff,
    Normal,
    Caution,
    Danger,
}

impl HealthState {
    /// Three-band classifier shared by every channel
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            HealthState::Normal
        } else if score >= 30.0 {
            HealthState::Caution
        } else {
            HealthState::Danger
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthState::NoData => "No Data",
            HealthState::SensorOff => "Sensor Off",
            HealthState::Normal => "Normal",
            HealthState::Caution => "Caution",
            HealthState::Danger => "Danger",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            HealthState::NoData | HealthState::SensorOff => Severity::Inactive,
            HealthState::Normal => Severity::Ok,
            HealthState::Caution => Severity::Warning,
            HealthState::Danger => Severity::Critical,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity token consumed by presentation for coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Inactive,
    Ok,
    Warning,
    Critical,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Inactive => "#8E8E93",
            Severity::Ok => "#00FF88",
            Severity::Warning => "#FFB800",
            Severity::Critical => "#FF3366",
        }
    }
}

/// Shape descriptors of the window's vibration magnitude
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalFeatures {
    pub rms: f64,
    pub peak_to_peak: f64,
    pub p95: f64,
    /// Coefficient of variation in percent
    pub cv_percent: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution)
    pub kurtosis: f64,
}

/// Vibration channel of a health result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationHealth {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Effective deviation driving the score (signed)
    pub z_score: f64,
    /// Mean deviation against the baseline
    pub z_mean: f64,
    /// Impact pseudo z-score from the max ratio
    pub z_impact: f64,
    pub health_score: f64,
    pub state: HealthState,
    pub severity: Severity,
    pub features: SignalFeatures,
}

/// Temperature channel of a health result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureHealth {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Regression slope in °C/s
    pub slope: f64,
    /// Window mean against the baseline temperature distribution
    pub z_score: f64,
    /// Slope against the baseline rate-of-change distribution
    pub rate_z_score: f64,
    pub health_score: f64,
    pub state: HealthState,
    pub severity: Severity,
}

/// Output of one scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub vibration: VibrationHealth,
    pub temperature: TemperatureHealth,
    pub overall_health_score: f64,
    pub overall_state: HealthState,
    pub overall_severity: Severity,
    pub messages: Vec<String>,
    pub primary_message: String,
    pub sample_count: usize,
    pub window_duration: f64,
    pub baseline_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sensor_data_accepts_in_range() {
        assert!(validate_sensor_data(0.0, 0.0, 1.0, 25.0));
        assert!(validate_sensor_data(-49.9, 49.9, 0.0, -39.9));
        assert!(validate_sensor_data(0.1, 0.2, 0.3, 149.9));
    }

    #[test]
    fn test_validate_sensor_data_rejects_non_finite() {
        assert!(!validate_sensor_data(f64::NAN, 0.0, 0.0, 25.0));
        assert!(!validate_sensor_data(0.0, f64::INFINITY, 0.0, 25.0));
        assert!(!validate_sensor_data(0.0, 0.0, f64::NEG_INFINITY, 25.0));
        assert!(!validate_sensor_data(0.0, 0.0, 0.0, f64::NAN));
    }

    #[test]
    fn test_validate_sensor_data_rejects_out_of_range() {
        assert!(!validate_sensor_data(50.1, 0.0, 0.0, 25.0));
        assert!(!validate_sensor_data(0.0, -50.1, 0.0, 25.0));
        assert!(!validate_sensor_data(0.0, 0.0, 0.0, -40.1));
        assert!(!validate_sensor_data(0.0, 0.0, 0.0, 150.1));
    }

    #[test]
    fn test_sample_validate_reports_field() {
        let err = Sample::new(1.0, 0.0, 60.0, 0.0, 20.0).validate().unwrap_err();
        assert!(matches!(
            err,
            InvalidSampleError::AccelerationOutOfRange { axis: "ay", .. }
        ));
    }

    #[test]
    fn test_health_state_bands() {
        assert_eq!(HealthState::from_score(100.0), HealthState::Normal);
        assert_eq!(HealthState::from_score(70.0), HealthState::Normal);
        assert_eq!(HealthState::from_score(69.9), HealthState::Caution);
        assert_eq!(HealthState::from_score(30.0), HealthState::Caution);
        assert_eq!(HealthState::from_score(29.9), HealthState::Danger);
        assert_eq!(HealthState::Danger.severity(), Severity::Critical);
    }

    #[test]
    fn test_health_state_serializes_as_label() {
        let json = serde_json::to_string(&HealthState::SensorOff).unwrap();
        assert_eq!(json, "\"Sensor Off\"");
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let a = wall_clock_secs();
        let b = wall_clock_secs();
        assert!(b >= a);
        assert!(a > 1_000_000_000.0);
    }

    #[test]
    fn test_snapshot_span() {
        let samples = [
            Sample::new(10.0, 0.0, 0.0, 1.0, 20.0),
            Sample::new(12.5, 0.0, 0.0, 1.0, 20.0),
        ];
        let snapshot: SensorSnapshot = samples.iter().collect();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.span_secs(), 2.5);
        assert_eq!(snapshot.sample(1), Some(samples[1]));
    }
}
