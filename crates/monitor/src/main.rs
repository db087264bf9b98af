//! Motor Monitor - vibration and temperature health monitoring
//!
//! Reads samples from a controller (or replays a recording), scores the
//! trailing window against a baseline profile and serves the verdict,
//! health probes and Prometheus metrics over HTTP.

use anyhow::{Context, Result};
use monitor_lib::{
    health::{components, ComponentHealth, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    source::{SerialTransport, TcpTransport, Transport},
    BaselineLoader, LiveConfig, LiveSource, MonitorSession, ReplayConfig, ReplaySource,
    SampleSource, SourceMode,
};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_source(config: &config::MonitorConfig) -> Arc<dyn SampleSource> {
    match config.mode {
        SourceMode::Live => {
            let transport: Arc<dyn Transport> = match &config.tcp_address {
                Some(address) => Arc::new(TcpTransport::new(address.clone())),
                None => Arc::new(SerialTransport::new(
                    config.serial_port.clone(),
                    config.baud_rate,
                )),
            };
            Arc::new(LiveSource::new(
                transport,
                LiveConfig::default().with_buffer(config.buffer()),
            ))
        }
        SourceMode::Replay => Arc::new(ReplaySource::new(
            ReplayConfig::new(&config.replay_path)
                .with_playback_speed(config.playback_speed)
                .with_loop(config.replay_loop)
                .with_buffer(config.buffer()),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting motor-monitor");

    let config = config::MonitorConfig::load()?;
    info!(
        mode = %config.mode,
        machine_type = %config.machine_type,
        policy = %config.policy,
        "Monitor configured"
    );

    let health_registry =
        HealthRegistry::new(&[components::SOURCE, components::ENGINE, components::BASELINE]);

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.machine_type);

    let loader = BaselineLoader::new(&config.data_dir);
    let registry = loader.load_all(&config.machine_type).with_context(|| {
        format!(
            "failed to load baselines from {}",
            config.data_dir.display()
        )
    })?;
    let listed = loader.list_available_profiles(&config.machine_type).len();
    let baseline_health = if registry.len() < listed {
        ComponentHealth::degraded(format!(
            "{} of {listed} baseline profiles failed to load",
            listed - registry.len()
        ))
    } else {
        ComponentHealth::healthy()
    };
    health_registry
        .update(components::BASELINE, baseline_health)
        .await;

    let session = Arc::new(
        MonitorSession::new(
            registry,
            config.machine_policy()?,
            build_source(&config),
            config.profile.as_deref(),
            config.window_secs,
        )
        .context("failed to create monitoring session")?,
    );
    metrics.set_active_profile(&config.machine_type, &session.active_profile());

    // A missing device is not fatal: the source can be started later over the API
    if let Err(e) = session.start_source().await {
        warn!(error = %e, "Sample source did not start");
    }
    logger.log_monitor_started(MONITOR_VERSION, config.mode, &session.active_profile());

    let app_state = Arc::new(api::AppState::new(
        Arc::clone(&session),
        health_registry.clone(),
        metrics.clone(),
    ));
    health_registry.set_ready(true).await;

    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let reason = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = session.refresh();
                metrics.observe_analysis_latency(report.analysis_latency_secs);
                metrics.record_source(&report.source);
                metrics.record_health(&report.health);
                health_registry
                    .update(components::SOURCE, ComponentHealth::for_source(&report.source))
                    .await;
                health_registry
                    .update(components::ENGINE, ComponentHealth::for_analysis(&report.health))
                    .await;
            }
            result = &mut shutdown => {
                result.context("failed to listen for shutdown signal")?;
                break "SIGINT received";
            }
            result = &mut api_handle => {
                match result {
                    Ok(Ok(())) => warn!("API server exited"),
                    Ok(Err(e)) => error!(error = %e, "API server failed"),
                    Err(e) => error!(error = %e, "API server task panicked"),
                }
                break "API server stopped";
            }
        }
    };

    logger.log_monitor_shutdown(reason);
    session.stop_source().await;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
