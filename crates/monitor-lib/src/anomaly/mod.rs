//! Anomaly scoring for vibration and temperature windows
//!
//! This module provides:
//! - Machine policies (thresholds plus a temperature strategy)
//! - Piecewise score curves
//! - The windowed engine and its diagnostic messages

mod engine;
mod messages;
mod policy;
mod scoring;

pub use engine::{AnomalyEngine, SENSOR_OFF_THRESHOLD_C};
pub use messages::{overall_message, temperature_message, vibration_message, WAITING_FOR_DATA};
pub use policy::{MachinePolicy, PolicyKind, TemperaturePolicy, VibrationThresholds};
pub use scoring::{health_score_from_z, rate_score, zone_score, RateBand, ZoneBand};
