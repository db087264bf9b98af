//! Monitoring session: one source, one active baseline, one engine
//!
//! The session is the unit the service shell drives. It owns the profile
//! registry and swaps the scoring engine atomically on a profile switch so
//! a refresh running concurrently always sees a complete engine.

use crate::anomaly::{AnomalyEngine, MachinePolicy};
use crate::baseline::ProfileRegistry;
use crate::error::SessionError;
use crate::models::{HealthResult, HealthState};
use crate::observability::StructuredLogger;
use crate::source::{SampleSource, SourceStatistics};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::debug;

/// Default analysis window in seconds
pub const DEFAULT_WINDOW_SECS: f64 = 2.0;

/// One refresh: the health verdict plus the source it was computed from
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub health: HealthResult,
    pub source: SourceStatistics,
    pub analysis_latency_secs: f64,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

struct LastRefresh {
    state: HealthState,
    report: Option<MonitorReport>,
}

pub struct MonitorSession {
    registry: ProfileRegistry,
    policy: MachinePolicy,
    engine: ArcSwap<AnomalyEngine>,
    source: RwLock<Arc<dyn SampleSource>>,
    window_secs: f64,
    logger: StructuredLogger,
    last: Mutex<LastRefresh>,
}

impl MonitorSession {
    /// Build a session scoring against `initial_profile`, or the highest
    /// available profile when none is given.
    pub fn new(
        registry: ProfileRegistry,
        policy: MachinePolicy,
        source: Arc<dyn SampleSource>,
        initial_profile: Option<&str>,
        window_secs: f64,
    ) -> Result<Self, SessionError> {
        let key = match initial_profile {
            Some(key) => key.to_string(),
            None => registry.default_key().ok_or(SessionError::NoProfiles)?,
        };
        let baseline = registry
            .get(&key)
            .ok_or_else(|| SessionError::UnknownProfile(key.clone()))?;

        let logger = StructuredLogger::new(registry.machine_type());
        Ok(Self {
            engine: ArcSwap::from_pointee(AnomalyEngine::new(baseline, policy)),
            registry,
            policy,
            source: RwLock::new(source),
            window_secs,
            logger,
            last: Mutex::new(LastRefresh {
                state: HealthState::NoData,
                report: None,
            }),
        })
    }

    pub fn machine_type(&self) -> &str {
        self.registry.machine_type()
    }

    pub fn policy(&self) -> &MachinePolicy {
        &self.policy
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn active_profile(&self) -> String {
        self.engine.load().baseline().key.clone()
    }

    /// Available profile keys in ascending order
    pub fn profiles(&self) -> Vec<String> {
        self.registry.keys()
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn engine(&self) -> Arc<AnomalyEngine> {
        self.engine.load_full()
    }

    /// Score subsequent windows against another profile
    pub fn switch_profile(&self, key: &str) -> Result<(), SessionError> {
        let baseline = self
            .registry
            .get(key)
            .ok_or_else(|| SessionError::UnknownProfile(key.to_string()))?;

        let previous = self
            .engine
            .swap(Arc::new(AnomalyEngine::new(baseline, self.policy)));
        self.logger.log_profile_switched(&previous.baseline().key, key);
        Ok(())
    }

    pub fn source(&self) -> Arc<dyn SampleSource> {
        Arc::clone(&self.source.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Stop the current source and put `source` in its place (not started)
    pub async fn replace_source(&self, source: Arc<dyn SampleSource>) {
        let previous = {
            let mut slot = self.source.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, source)
        };
        if previous.is_running() {
            previous.stop().await;
            self.logger.log_source_stopped(&previous.statistics());
        }
        self.reset_state();
    }

    pub async fn start_source(&self) -> Result<(), SessionError> {
        let source = self.source();
        source.start().await?;
        self.logger.log_source_started(&source.statistics());
        Ok(())
    }

    pub async fn stop_source(&self) {
        let source = self.source();
        source.stop().await;
        self.logger.log_source_stopped(&source.statistics());
    }

    /// Stop, clear buffered data and counters, start again
    pub async fn restart_source(&self) -> Result<(), SessionError> {
        let source = self.source();
        self.reset_state();
        source.restart().await?;
        self.logger.log_source_started(&source.statistics());
        Ok(())
    }

    /// Returns the speed actually applied
    pub async fn set_playback_speed(&self, speed: f64) -> Result<f64, SessionError> {
        Ok(self.source().set_playback_speed(speed).await?)
    }

    /// Score the trailing window and remember the result
    pub fn refresh(&self) -> MonitorReport {
        let source = self.source();
        let engine = self.engine.load();

        let started = Instant::now();
        let snapshot = source.get_recent_data(Some(self.window_secs));
        let health = engine.analyze(&snapshot, self.window_secs);
        let analysis_latency_secs = started.elapsed().as_secs_f64();

        let report = MonitorReport {
            health,
            source: source.statistics(),
            analysis_latency_secs,
            generated_at: chrono::Utc::now(),
        };

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.state != report.health.overall_state {
            self.logger
                .log_health_state_changed(last.state, &report.health);
            last.state = report.health.overall_state;
        } else {
            debug!(
                score = report.health.overall_health_score,
                samples = report.health.sample_count,
                "Refreshed health"
            );
        }
        last.report = Some(report.clone());
        report
    }

    /// Most recent refresh, if any
    pub fn latest_report(&self) -> Option<MonitorReport> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .report
            .clone()
    }

    fn reset_state(&self) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.state = HealthState::NoData;
        last.report = None;
    }
}
