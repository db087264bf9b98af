//! Sample sources feeding the ring buffer
//!
//! Two interchangeable producers implement [`SampleSource`]:
//! - [`LiveSource`] reads a line-oriented transport (serial device or TCP bridge)
//! - [`ReplaySource`] plays back a recording on a synthetic clock
//!
//! Each owns its [`SampleBuffer`] and one background worker task.

mod discovery;
mod live;
mod parse;
mod recording;
mod replay;


pub use discovery::{
    auto_detect_port, list_ports, select_port, PortInfo, CONTROLLER_KEYWORDS, DEFAULT_DEV_ROOT,
    DEFAULT_SYSFS_TTY,
};
pub use live::{
    ArrivalTracker, LiveConfig, LiveSource, SerialTransport, TcpTransport, Transport,
    TransportReader, DEFAULT_BAUD_RATE,
};
pub use parse::parse_line;
pub use recording::{Recording, REQUIRED_COLUMNS};
pub use replay::{ReplayConfig, ReplaySource, MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};

use crate::buffer::{BufferConfig, BufferStats, SampleBuffer};
use crate::error::SourceError;
use crate::models::{Sample, SensorSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long `stop()` waits for the worker before aborting it
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Which kind of source is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    #[default]
    Replay,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Live => f.write_str("live"),
            SourceMode::Replay => f.write_str("replay"),
        }
    }
}

/// Ingestion counters, updated by the worker and read by statistics
#[derive(Debug, Default)]
pub struct SourceCounters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    transport_errors: AtomicU64,
    reconnects: AtomicU64,
}

impl SourceCounters {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.reconnects.store(0, Ordering::Relaxed);
    }
}

/// State shared between a source handle and its worker
#[derive(Debug)]
pub struct SourceCore {
    buffer: Arc<SampleBuffer>,
    counters: SourceCounters,
    running: AtomicBool,
}

impl SourceCore {
    pub fn new(buffer: BufferConfig) -> Self {
        Self {
            buffer: Arc::new(SampleBuffer::new(buffer)),
            counters: SourceCounters::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn counters(&self) -> &SourceCounters {
        &self.counters
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Store a sample while the source is running.
    ///
    /// Returns true when the sample entered the buffer. Rejections are
    /// counted as dropped.
    pub fn offer(&self, sample: Sample) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.buffer.append(sample) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.counters.inc_dropped();
                debug!(error = %e, "Dropped sample");
                false
            }
        }
    }

    /// Empty the buffer and zero the counters
    pub fn reset(&self) {
        self.buffer.clear();
        self.counters.reset();
    }

    fn base_statistics(&self, mode: SourceMode, target: String) -> SourceStatistics {
        SourceStatistics {
            mode,
            target,
            running: self.is_running(),
            accepted: self.counters.accepted(),
            dropped: self.counters.dropped(),
            transport_errors: self.counters.transport_errors(),
            reconnects: self.counters.reconnects(),
            buffer: self.buffer.stats(),
            progress_percent: None,
            arrival_rate_hz: None,
            playback_speed: None,
        }
    }
}

/// Snapshot of a source's ingestion state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatistics {
    pub mode: SourceMode,
    /// Port, address or recording path
    pub target: String,
    pub running: bool,
    pub accepted: u64,
    /// Malformed or implausible records
    pub dropped: u64,
    pub transport_errors: u64,
    pub reconnects: u64,
    pub buffer: BufferStats,
    /// Replay only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    /// Live only, mean over recent arrivals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_rate_hz: Option<f64>,
    /// Replay only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_speed: Option<f64>,
}

/// A producer of timestamped samples that owns its ring buffer
#[async_trait]
pub trait SampleSource: Send + Sync {
    fn mode(&self) -> SourceMode;

    fn core(&self) -> &SourceCore;

    /// Begin background production. Calling it on a running source is a no-op.
    async fn start(&self) -> Result<(), SourceError>;

    /// Stop production and release the transport or file. Idempotent.
    async fn stop(&self);

    /// Stop, clear the buffer and counters, then start again
    async fn restart(&self) -> Result<(), SourceError> {
        self.stop().await;
        self.core().reset();
        self.start().await
    }

    fn is_running(&self) -> bool {
        self.core().is_running()
    }

    fn buffer(&self) -> Arc<SampleBuffer> {
        Arc::clone(self.core().buffer())
    }

    /// Copy of the trailing `duration` seconds, or everything buffered
    fn get_recent_data(&self, duration: Option<f64>) -> SensorSnapshot {
        self.core().buffer().snapshot(duration)
    }

    fn statistics(&self) -> SourceStatistics;

    /// Change the replay rate; returns the value actually applied
    async fn set_playback_speed(&self, _speed: f64) -> Result<f64, SourceError> {
        Err(SourceError::Unsupported("playback speed"))
    }
}

/// Background task plus the channel used to ask it to exit
pub(crate) struct Worker {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = broadcast::channel(1);
        let handle = tokio::spawn(task(rx));
        Self { shutdown, handle }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal, wait up to `timeout`, then abandon the task
    pub(crate) async fn stop(mut self, timeout: Duration) {
        let _ = self.shutdown.send(());
        if tokio::time::timeout(timeout, &mut self.handle).await.is_err() {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Source worker did not stop in time, aborting"
            );
            self.handle.abort();
        }
    }
}
