//! Observability infrastructure for the motor monitor
//!
//! Provides:
//! - Prometheus metrics (analysis latency, buffer fill, ingestion counters, health scores)
//! - Structured JSON logging with tracing

use crate::baseline::BaselineRecord;
use crate::error::BaselineLoadError;
use crate::models::{HealthResult, HealthState};
use crate::source::{SourceMode, SourceStatistics};
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_gauge, Gauge, GaugeVec,
    Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for one analysis pass (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    analysis_latency_seconds: Histogram,
    buffer_samples: IntGauge,
    buffer_span_seconds: Gauge,
    samples_accepted: IntGauge,
    samples_dropped: IntGauge,
    transport_errors: IntGauge,
    health_score: GaugeVec,
    active_profile_info: GaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            analysis_latency_seconds: register_histogram!(
                "motor_monitor_analysis_latency_seconds",
                "Time spent scoring one analysis window",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            buffer_samples: register_int_gauge!(
                "motor_monitor_buffer_samples",
                "Number of samples currently held in the ring buffer"
            )
            .expect("Failed to register buffer_samples"),

            buffer_span_seconds: register_gauge!(
                "motor_monitor_buffer_span_seconds",
                "Time covered by the ring buffer contents"
            )
            .expect("Failed to register buffer_span_seconds"),

            samples_accepted: register_int_gauge!(
                "motor_monitor_samples_accepted_total",
                "Samples accepted by the active source since it was started"
            )
            .expect("Failed to register samples_accepted"),

            samples_dropped: register_int_gauge!(
                "motor_monitor_samples_dropped_total",
                "Malformed or implausible records dropped by the active source"
            )
            .expect("Failed to register samples_dropped"),

            transport_errors: register_int_gauge!(
                "motor_monitor_transport_errors_total",
                "Transport read and reconnect failures of the active source"
            )
            .expect("Failed to register transport_errors"),

            health_score: register_gauge_vec!(
                "motor_monitor_health_score",
                "Latest health score per channel (0-100)",
                &["channel"]
            )
            .expect("Failed to register health_score"),

            active_profile_info: register_gauge_vec!(
                "motor_monitor_active_profile_info",
                "Baseline profile currently used for scoring",
                &["machine_type", "profile"]
            )
            .expect("Failed to register active_profile_info"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    /// Mirror the source's buffer fill and counters
    pub fn record_source(&self, stats: &SourceStatistics) {
        let inner = self.inner();
        inner.buffer_samples.set(stats.buffer.samples as i64);
        inner.buffer_span_seconds.set(stats.buffer.span_secs);
        inner.samples_accepted.set(stats.accepted as i64);
        inner.samples_dropped.set(stats.dropped as i64);
        inner.transport_errors.set(stats.transport_errors as i64);
    }

    pub fn record_health(&self, result: &HealthResult) {
        let scores = &self.inner().health_score;
        scores
            .with_label_values(&["vibration"])
            .set(result.vibration.health_score);
        scores
            .with_label_values(&["temperature"])
            .set(result.temperature.health_score);
        scores
            .with_label_values(&["overall"])
            .set(result.overall_health_score);
    }

    /// Only the active profile carries the value 1
    pub fn set_active_profile(&self, machine_type: &str, profile: &str) {
        let info = &self.inner().active_profile_info;
        info.reset();
        info.with_label_values(&[machine_type, profile]).set(1.0);
    }
}

/// Structured logger for monitor events
///
/// Every line carries an `event` field and the machine type so log
/// pipelines can filter without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    machine_type: String,
}

impl StructuredLogger {
    pub fn new(machine_type: impl Into<String>) -> Self {
        Self {
            machine_type: machine_type.into(),
        }
    }

    pub fn log_monitor_started(&self, version: &str, mode: SourceMode, profile: &str) {
        info!(
            event = "monitor_started",
            machine_type = %self.machine_type,
            version = %version,
            mode = %mode,
            profile = %profile,
            "Motor monitor started"
        );
    }

    pub fn log_monitor_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            machine_type = %self.machine_type,
            reason = %reason,
            "Motor monitor shutting down"
        );
    }

    /// Danger transitions are logged at warn level
    pub fn log_health_state_changed(
        &self,
        previous: HealthState,
        result: &HealthResult,
    ) {
        if result.overall_state == HealthState::Danger {
            warn!(
                event = "health_state_changed",
                machine_type = %self.machine_type,
                profile = %result.baseline_key,
                previous = %previous,
                state = %result.overall_state,
                score = result.overall_health_score,
                message = %result.primary_message,
                "Motor health critical"
            );
        } else {
            info!(
                event = "health_state_changed",
                machine_type = %self.machine_type,
                profile = %result.baseline_key,
                previous = %previous,
                state = %result.overall_state,
                score = result.overall_health_score,
                message = %result.primary_message,
                "Motor health state changed"
            );
        }
    }

    pub fn log_profile_switched(&self, from: &str, to: &str) {
        info!(
            event = "profile_switched",
            machine_type = %self.machine_type,
            from = %from,
            to = %to,
            "Switched baseline profile"
        );
    }

    pub fn log_source_started(&self, stats: &SourceStatistics) {
        info!(
            event = "source_started",
            machine_type = %self.machine_type,
            mode = %stats.mode,
            target = %stats.target,
            "Sample source started"
        );
    }

    pub fn log_source_stopped(&self, stats: &SourceStatistics) {
        info!(
            event = "source_stopped",
            machine_type = %self.machine_type,
            mode = %stats.mode,
            target = %stats.target,
            accepted = stats.accepted,
            dropped = stats.dropped,
            "Sample source stopped"
        );
    }

    pub fn log_baseline_loaded(&self, record: &BaselineRecord) {
        info!(
            event = "baseline_loaded",
            machine_type = %self.machine_type,
            profile = %record.key,
            samples = record.sample_count,
            sampling_rate_hz = record.sampling_rate_hz,
            vibration_mean = record.vibration.mean,
            vibration_std = record.vibration.std,
            temperature_mean = record.temperature.mean,
            "Loaded baseline profile"
        );
    }

    pub fn log_baseline_load_failed(&self, profile: &str, error: &BaselineLoadError) {
        warn!(
            event = "baseline_load_failed",
            machine_type = %self.machine_type,
            profile = %profile,
            error = %error,
            "Skipping baseline profile"
        );
    }
}
