//! HTTP API for health checks, Prometheus metrics and session control

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use monitor_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::MonitorMetrics,
    HealthResult, MonitorSession, SessionError, SourceError, SourceStatistics,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<MonitorSession>,
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(
        session: Arc<MonitorSession>,
        health_registry: HealthRegistry,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            session,
            health_registry,
            metrics,
        }
    }
}

/// Error body returned by control endpoints
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::UnknownProfile(_) => StatusCode::NOT_FOUND,
            SessionError::NoProfiles => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Source(SourceError::Unsupported(_)) => StatusCode::CONFLICT,
            SessionError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Latest health result; the waiting result before the first refresh
async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResult> {
    let health = match state.session.latest_report() {
        Some(report) => report.health,
        None => state.session.engine().empty_result(),
    };
    Json(health)
}

async fn get_source(State(state): State<Arc<AppState>>) -> Json<SourceStatistics> {
    Json(state.session.source().statistics())
}

#[derive(Debug, Serialize)]
struct ProfilesResponse {
    machine_type: String,
    active: String,
    profiles: Vec<String>,
    policy: String,
    temperature_policy: &'static str,
}

async fn get_profiles(State(state): State<Arc<AppState>>) -> Json<ProfilesResponse> {
    let session = &state.session;
    Json(ProfilesResponse {
        machine_type: session.machine_type().to_string(),
        active: session.active_profile(),
        profiles: session.profiles(),
        policy: session.policy().kind.to_string(),
        temperature_policy: session.policy().temperature.name(),
    })
}

#[derive(Debug, Deserialize)]
struct ProfileRequest {
    key: String,
}

async fn switch_profile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<ProfilesResponse>, ApiError> {
    state.session.switch_profile(&request.key)?;
    state
        .metrics
        .set_active_profile(state.session.machine_type(), &request.key);
    Ok(get_profiles(State(state)).await)
}

async fn control_source(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> Result<Json<SourceStatistics>, ApiError> {
    let session = &state.session;
    match action.as_str() {
        "start" => session.start_source().await?,
        "stop" => session.stop_source().await,
        "restart" => session.restart_source().await?,
        other => return Err(ApiError::not_found(format!("unknown source action {other:?}"))),
    }
    info!(action = %action, "Source control request handled");
    Ok(Json(session.source().statistics()))
}

#[derive(Debug, Deserialize)]
struct PlaybackRequest {
    speed: f64,
}

async fn set_playback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaybackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let applied = state.session.set_playback_speed(request.speed).await?;
    Ok(Json(json!({ "requested": request.speed, "speed": applied })))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/health", get(get_health))
        .route("/api/v1/source", get(get_source))
        .route("/api/v1/source/:action", post(control_source))
        .route("/api/v1/profiles", get(get_profiles))
        .route("/api/v1/profile", post(switch_profile))
        .route("/api/v1/playback", post(set_playback))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use monitor_lib::{
        health::{components, ComponentHealth},
        BaselineRecord, MachinePolicy, ProfileRegistry, ReplayConfig,
        ReplaySource, Sample,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn record(key: &str) -> BaselineRecord {
        let samples: Vec<Sample> = (0..40)
            .map(|i| {
                let az = if i % 2 == 0 { 0.75 } else { 1.25 };
                Sample::new(i as f64 * 0.0625, 0.0, 0.0, az, 25.0)
            })
            .collect();
        BaselineRecord::from_samples(key, &samples).unwrap()
    }

    fn test_state(dir: &TempDir) -> Arc<AppState> {
        let mut registry = ProfileRegistry::new("motor");
        registry.insert(record("50"));
        registry.insert(record("100"));

        let source = Arc::new(ReplaySource::new(ReplayConfig::new(
            dir.path().join("missing.csv"),
        )));
        let session =
            MonitorSession::new(registry, MachinePolicy::default(), source, None, 2.0).unwrap();
        Arc::new(AppState::new(
            Arc::new(session),
            HealthRegistry::new(&[components::SOURCE]),
            MonitorMetrics::new(),
        ))
    }

    async fn call(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = create_router(Arc::clone(state))
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_healthz_and_readyz() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, _) = call(&state, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&state, "GET", "/readyz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);

        state.health_registry.set_ready(true).await;
        let (status, _) = call(&state, "GET", "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);

        state
            .health_registry
            .update(
                components::SOURCE,
                ComponentHealth::unhealthy("No serial device found"),
            )
            .await;
        let (status, body) = call(&state, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        state.metrics.observe_analysis_latency(0.0001);

        let response = create_router(state)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("motor_monitor_analysis_latency_seconds"));
    }

    #[tokio::test]
    async fn test_health_before_first_refresh() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, body) = call(&state, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_state"], "No Data");
        assert_eq!(body["primary_message"], "Waiting for data...");
        assert_eq!(body["baseline_key"], "100");
    }

    #[tokio::test]
    async fn test_profiles_and_switch() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (_, body) = call(&state, "GET", "/api/v1/profiles", None).await;
        assert_eq!(body["active"], "100");
        assert_eq!(body["profiles"], json!(["50", "100"]));
        assert_eq!(body["policy"], "sensitive");

        let (status, body) =
            call(&state, "POST", "/api/v1/profile", Some(json!({ "key": "50" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], "50");

        let (status, body) =
            call(&state, "POST", "/api/v1/profile", Some(json!({ "key": "75" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("75"));
    }

    #[tokio::test]
    async fn test_source_control() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, body) = call(&state, "GET", "/api/v1/source", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "replay");
        assert_eq!(body["running"], false);

        // Recording does not exist
        let (status, _) = call(&state, "POST", "/api/v1/source/start", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&state, "POST", "/api/v1/source/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);

        let (status, _) = call(&state, "POST", "/api/v1/source/explode", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_playback_speed_is_clamped() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, body) =
            call(&state, "POST", "/api/v1/playback", Some(json!({ "speed": 25.0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speed"], 10.0);

        let (_, source) = call(&state, "GET", "/api/v1/source", None).await;
        assert_eq!(source["playback_speed"], 10.0);
    }
}
