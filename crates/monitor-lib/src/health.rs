//! Component health for the liveness and readiness endpoints
//!
//! The refresh loop reports the state of the sample source, the scoring
//! engine and the baseline set; probes read the aggregate.

use crate::models::{HealthResult, HealthState};
use crate::source::SourceStatistics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const SOURCE: &str = "source";
    pub const ENGINE: &str = "engine";
    pub const BASELINE: &str = "baseline";
}

/// Ordered from best to worst, so the aggregate is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the verdict may be stale or missing
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    /// Health of the sample source as seen from its statistics
    pub fn for_source(stats: &SourceStatistics) -> Self {
        if !stats.running {
            match stats.progress_percent {
                Some(p) if p >= 100.0 => Self::degraded("Replay finished"),
                _ => Self::degraded("Source stopped"),
            }
        } else if stats.buffer.samples == 0 {
            Self::degraded(format!("No samples received from {}", stats.target))
        } else {
            Self::healthy()
        }
    }

    /// Health of the scoring engine from its latest result
    pub fn for_analysis(result: &HealthResult) -> Self {
        match result.overall_state {
            HealthState::NoData => Self::degraded("Not enough samples in the analysis window"),
            HealthState::SensorOff => Self::degraded("Temperature sensor disconnected"),
            _ => Self::healthy(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct Tracked {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

/// Latest health per component plus the startup readiness flag
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<Tracked>>,
}

impl HealthRegistry {
    /// Tracks `names`, each starting healthy
    pub fn new(names: &[&str]) -> Self {
        let components = names
            .iter()
            .map(|name| (name.to_string(), ComponentHealth::healthy()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(Tracked {
                components,
                ready: false,
            })),
        }
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.inner
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_ready(&self, ready: bool) {
        self.inner.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.inner.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse {
            status,
            components: state.components.clone(),
        }
    }

    /// Ready once initialized and while no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.inner.read().await;
        let reason = if !state.ready {
            Some("Monitor not yet initialized".to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, c)| c.status == ComponentStatus::Unhealthy)
                .map(|(name, c)| match &c.message {
                    Some(message) => format!("{name} unhealthy: {message}"),
                    None => format!("{name} unhealthy"),
                })
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
