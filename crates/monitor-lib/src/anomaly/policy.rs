//! Machine policies: scoring thresholds plus a temperature strategy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in policy presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Sensitive,
    Lenient,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Sensitive => f.write_str("sensitive"),
            PolicyKind::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sensitive" => Ok(PolicyKind::Sensitive),
            "lenient" => Ok(PolicyKind::Lenient),
            other => Err(format!("unknown policy {other:?}")),
        }
    }
}

/// Vibration z-score thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibrationThresholds {
    /// Score reaches 70 at this |z|
    pub caution_z: f64,
    /// Score reaches 30 at this |z|
    pub danger_z: f64,
}

/// How the temperature channel is scored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TemperaturePolicy {
    /// Fixed safe band with a linear tolerance margin on each side
    AbsoluteZone {
        min_safe: f64,
        max_safe: f64,
        tolerance: f64,
    },
    /// Window slope in °C/s, with absolute limits that force a zero score
    RateOfChange {
        caution_rate: f64,
        danger_rate: f64,
        critical_low: f64,
        critical_high: f64,
    },
}

impl TemperaturePolicy {
    /// 15–35 °C safe, 5 °C tolerance
    pub fn absolute_zone() -> Self {
        TemperaturePolicy::AbsoluteZone {
            min_safe: 15.0,
            max_safe: 35.0,
            tolerance: 5.0,
        }
    }

    /// 0.1 °C/s caution, 0.5 °C/s danger, 5–85 °C hard limits
    pub fn rate_of_change() -> Self {
        TemperaturePolicy::RateOfChange {
            caution_rate: 0.1,
            danger_rate: 0.5,
            critical_low: 5.0,
            critical_high: 85.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TemperaturePolicy::AbsoluteZone { .. } => "zone",
            TemperaturePolicy::RateOfChange { .. } => "rate",
        }
    }

    /// Preset by short name (`zone` or `rate`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zone" | "absolute_zone" => Some(Self::absolute_zone()),
            "rate" | "rate_of_change" => Some(Self::rate_of_change()),
            _ => None,
        }
    }
}

/// Thresholds and temperature strategy injected into the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachinePolicy {
    pub kind: PolicyKind,
    pub vibration: VibrationThresholds,
    pub temperature: TemperaturePolicy,
}

impl MachinePolicy {
    /// Tight vibration thresholds, absolute temperature zone
    pub fn sensitive() -> Self {
        Self {
            kind: PolicyKind::Sensitive,
            vibration: VibrationThresholds {
                caution_z: 1.2,
                danger_z: 2.0,
            },
            temperature: TemperaturePolicy::absolute_zone(),
        }
    }

    /// Wide vibration thresholds, temperature scored by rate of change
    pub fn lenient() -> Self {
        Self {
            kind: PolicyKind::Lenient,
            vibration: VibrationThresholds {
                caution_z: 3.0,
                danger_z: 4.5,
            },
            temperature: TemperaturePolicy::rate_of_change(),
        }
    }

    pub fn for_kind(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Sensitive => Self::sensitive(),
            PolicyKind::Lenient => Self::lenient(),
        }
    }

    /// Replace the temperature strategy of a preset
    pub fn with_temperature(mut self, temperature: TemperaturePolicy) -> Self {
        self.temperature = temperature;
        self
    }
}

impl Default for MachinePolicy {
    fn default() -> Self {
        Self::sensitive()
    }
}
