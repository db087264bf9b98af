//! Monitor configuration

use anyhow::{anyhow, Context, Result};
use monitor_lib::{
    anomaly::{MachinePolicy, PolicyKind, TemperaturePolicy},
    buffer::BufferConfig,
    source::{SourceMode, DEFAULT_BAUD_RATE},
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// `live` or `replay`
    #[serde(default)]
    pub mode: SourceMode,

    /// Serial device; auto-detected when unset
    #[serde(default)]
    pub serial_port: Option<PathBuf>,

    /// `host:port` of a TCP bridge, used instead of the serial port when set
    #[serde(default)]
    pub tcp_address: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_replay_path")]
    pub replay_path: PathBuf,

    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,

    #[serde(default = "default_true")]
    pub replay_loop: bool,

    /// Baseline root directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_machine_type")]
    pub machine_type: String,

    #[serde(default)]
    pub policy: PolicyKind,

    /// `zone` or `rate`, overriding the policy's temperature strategy
    #[serde(default)]
    pub temperature_policy: Option<String>,

    /// Initial profile; the highest available key when unset
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default = "default_buffer_duration")]
    pub buffer_duration_secs: f64,

    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    /// API server port for health/metrics/control
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_replay_path() -> PathBuf {
    PathBuf::from("data/replay.csv")
}

fn default_playback_speed() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_machine_type() -> String {
    "motor".to_string()
}

fn default_buffer_duration() -> f64 {
    monitor_lib::buffer::DEFAULT_BUFFER_DURATION
}

fn default_max_samples() -> usize {
    monitor_lib::buffer::DEFAULT_MAX_SAMPLES
}

fn default_window_secs() -> f64 {
    monitor_lib::DEFAULT_WINDOW_SECS
}

fn default_refresh_interval() -> u64 {
    500
}

fn default_api_port() -> u16 {
    8080
}

impl MonitorConfig {
    /// Load from an optional `monitor.toml`, then `MONITOR_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("monitor").required(false))
            .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true))
            .build()
            .context("failed to read monitor configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("invalid monitor configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(anyhow!("window_secs must be positive, got {}", self.window_secs));
        }
        if !(self.buffer_duration_secs.is_finite() && self.buffer_duration_secs > 0.0) {
            return Err(anyhow!(
                "buffer_duration_secs must be positive, got {}",
                self.buffer_duration_secs
            ));
        }
        if self.refresh_interval_ms == 0 {
            return Err(anyhow!("refresh_interval_ms must be at least 1"));
        }
        self.machine_policy().map(|_| ())
    }

    pub fn buffer(&self) -> BufferConfig {
        BufferConfig::default()
            .with_max_duration(self.buffer_duration_secs)
            .with_max_samples(self.max_samples)
    }

    /// Preset for `policy`, with the temperature override applied
    pub fn machine_policy(&self) -> Result<MachinePolicy> {
        let policy = MachinePolicy::for_kind(self.policy);
        match self.temperature_policy.as_deref() {
            None => Ok(policy),
            Some(name) => TemperaturePolicy::from_name(name)
                .map(|temperature| policy.with_temperature(temperature))
                .ok_or_else(|| anyhow!("unknown temperature_policy {name:?}, expected zone or rate")),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_overrides(overrides: &[(&str, &str)]) -> Result<MonitorConfig> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        let config: MonitorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = from_overrides(&[]).unwrap();
        assert_eq!(config.mode, SourceMode::Replay);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.replay_path, PathBuf::from("data/replay.csv"));
        assert!(config.replay_loop);
        assert_eq!(config.machine_type, "motor");
        assert_eq!(config.policy, PolicyKind::Sensitive);
        assert_eq!(config.window_secs, 2.0);
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.buffer().max_samples, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = from_overrides(&[
            ("mode", "live"),
            ("policy", "lenient"),
            ("temperature_policy", "zone"),
            ("serial_port", "/dev/ttyACM0"),
        ])
        .unwrap();
        assert_eq!(config.mode, SourceMode::Live);
        assert_eq!(config.serial_port, Some(PathBuf::from("/dev/ttyACM0")));

        let policy = config.machine_policy().unwrap();
        assert_eq!(policy.kind, PolicyKind::Lenient);
        assert_eq!(policy.temperature, TemperaturePolicy::absolute_zone());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(from_overrides(&[("temperature_policy", "fuzzy")]).is_err());
        assert!(from_overrides(&[("mode", "network")]).is_err());
        assert!(from_overrides(&[("window_secs", "0")]).is_err());
    }
}
