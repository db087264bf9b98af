//! Paced playback of a recorded CSV file
//!
//! Samples are released on a synthetic clock: the gap between two recorded
//! timestamps, divided by the playback speed, is the wait between them.
//! Released samples are re-stamped with the current wall clock so downstream
//! windows behave exactly as with a live sensor.

use super::recording::Recording;
use super::{SampleSource, SourceCore, SourceMode, SourceStatistics, Worker, DEFAULT_STOP_TIMEOUT};
use crate::buffer::BufferConfig;
use crate::error::SourceError;
use crate::models::{wall_clock_secs, Sample};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
pub const MAX_PLAYBACK_SPEED: f64 = 10.0;

/// Recording seconds between passes when the file has no usable spacing
const FALLBACK_ROW_INTERVAL: f64 = 0.1;

/// Replay source settings
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
    pub playback_speed: f64,
    /// Restart from the first sample after the last one
    pub loop_playback: bool,
    pub buffer: BufferConfig,
    pub stop_timeout: Duration,
}

impl ReplayConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            playback_speed: 1.0,
            loop_playback: true,
            buffer: BufferConfig::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_playback_speed(mut self, speed: f64) -> Self {
        self.playback_speed = clamp_speed(speed, 1.0);
        self
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }
}

/// Clamp into the supported range; NaN keeps `fallback`
fn clamp_speed(speed: f64, fallback: f64) -> f64 {
    if speed.is_nan() {
        fallback
    } else {
        speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
    }
}

struct ReplayShared {
    core: SourceCore,
    /// Index of the next sample to release
    cursor: AtomicUsize,
    total: AtomicUsize,
}

impl ReplayShared {
    fn progress_percent(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.cursor.load(Ordering::Relaxed) as f64 / total as f64 * 100.0
    }
}

/// Source replaying a recording at adjustable speed
pub struct ReplaySource {
    config: ReplayConfig,
    shared: Arc<ReplayShared>,
    speed: watch::Sender<f64>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl ReplaySource {
    pub fn new(config: ReplayConfig) -> Self {
        let (speed, _) = watch::channel(config.playback_speed);
        let shared = Arc::new(ReplayShared {
            core: SourceCore::new(config.buffer),
            cursor: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        });
        Self {
            config,
            shared,
            speed,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn playback_speed(&self) -> f64 {
        *self.speed.borrow()
    }

    pub fn progress_percent(&self) -> f64 {
        self.shared.progress_percent()
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    fn mode(&self) -> SourceMode {
        SourceMode::Replay
    }

    fn core(&self) -> &SourceCore {
        &self.shared.core
    }

    async fn start(&self) -> Result<(), SourceError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }

        let recording = Recording::load_async(&self.config.path).await?;
        info!(
            path = %recording.path.display(),
            samples = recording.len(),
            duration_secs = recording.duration_secs(),
            speed = self.playback_speed(),
            "Loaded recording for replay"
        );

        self.shared.total.store(recording.len(), Ordering::Relaxed);
        self.shared.cursor.store(0, Ordering::Relaxed);
        self.shared.core.set_running(true);

        let shared = Arc::clone(&self.shared);
        let speed = self.speed.subscribe();
        let loop_playback = self.config.loop_playback;
        *worker = Some(Worker::spawn(move |shutdown| {
            play_loop(recording.samples, shared, speed, loop_playback, shutdown)
        }));
        Ok(())
    }

    async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        self.shared.core.set_running(false);
        if let Some(worker) = worker {
            worker.stop(self.config.stop_timeout).await;
            debug!(path = %self.config.path.display(), "Replay stopped");
        }
    }

    fn statistics(&self) -> SourceStatistics {
        let mut stats = self
            .shared
            .core
            .base_statistics(SourceMode::Replay, self.config.path.display().to_string());
        stats.progress_percent = Some(self.progress_percent());
        stats.playback_speed = Some(self.playback_speed());
        stats
    }

    async fn set_playback_speed(&self, speed: f64) -> Result<f64, SourceError> {
        let applied = clamp_speed(speed, self.playback_speed());
        self.speed.send_replace(applied);
        info!(requested = speed, applied, "Playback speed changed");
        Ok(applied)
    }
}

/// Mean spacing of the recorded rows, used as the gap when looping
fn row_interval(samples: &[Sample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if samples.len() > 1 && last.timestamp > first.timestamp => {
            (last.timestamp - first.timestamp) / (samples.len() - 1) as f64
        }
        _ => FALLBACK_ROW_INTERVAL,
    }
}

/// Wall instant paired with the recording time it corresponds to
#[derive(Clone, Copy)]
struct Anchor {
    wall: Instant,
    record: f64,
}

impl Anchor {
    fn due(&self, record: f64, speed: f64) -> Instant {
        let offset = ((record - self.record) / speed).max(0.0);
        self.wall + Duration::from_secs_f64(offset)
    }

    /// Recording time reached at `now`, capped at `limit`
    fn position(&self, now: Instant, speed: f64, limit: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.wall).as_secs_f64();
        (self.record + elapsed * speed).min(limit)
    }
}

async fn play_loop(
    samples: Vec<Sample>,
    shared: Arc<ReplayShared>,
    mut speed: watch::Receiver<f64>,
    loop_playback: bool,
    mut shutdown: broadcast::Receiver<()>,
) {
    let gap = row_interval(&samples);
    let mut last_release: Option<Instant> = None;

    'replay: loop {
        let Some(first) = samples.first() else { break };
        let mut current_speed = *speed.borrow_and_update();
        // Later passes keep the row spacing across the wrap-around
        let mut anchor = match last_release {
            Some(wall) => Anchor {
                wall,
                record: first.timestamp - gap,
            },
            None => Anchor {
                wall: Instant::now(),
                record: first.timestamp,
            },
        };

        for (index, sample) in samples.iter().enumerate() {
            loop {
                let due = anchor.due(sample.timestamp, current_speed);
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break 'replay,
                    changed = speed.changed() => {
                        if changed.is_err() {
                            break 'replay;
                        }
                        let now = Instant::now();
                        anchor = Anchor {
                            wall: now,
                            record: anchor.position(now, current_speed, sample.timestamp),
                        };
                        current_speed = *speed.borrow_and_update();
                    }
                    _ = sleep_until(due) => break,
                }
            }

            shared.core.offer(Sample {
                timestamp: wall_clock_secs(),
                ..*sample
            });
            shared.cursor.store(index + 1, Ordering::Relaxed);
            last_release = Some(Instant::now());
        }

        if !loop_playback {
            info!(samples = samples.len(), "Replay finished");
            break;
        }
        debug!("Replay reached end of recording, looping");
        shared.cursor.store(0, Ordering::Relaxed);
    }

    shared.core.set_running(false);
}
