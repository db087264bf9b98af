//! Live acquisition from a line-oriented transport
//!
//! The controller prints one CSV record per line. A background task reads
//! lines, parses them and appends accepted samples to the buffer. When the
//! transport fails it is reopened with exponential backoff until `stop()`.

use super::discovery::{auto_detect_port, DEFAULT_DEV_ROOT, DEFAULT_SYSFS_TTY};
use super::parse::parse_line;
use super::{SampleSource, SourceCore, SourceMode, SourceStatistics, Worker, DEFAULT_STOP_TIMEOUT};
use crate::buffer::BufferConfig;
use crate::error::{SourceError, TransportError};
use crate::models::wall_clock_secs;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Number of recent inter-arrival intervals averaged for the rate estimate
const ARRIVAL_WINDOW: usize = 30;

pub type TransportReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Something that can be (re)opened into a stream of text lines
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable target for logs and statistics
    fn describe(&self) -> String;

    async fn open(&self) -> Result<TransportReader, TransportError>;
}

/// Serial device, configured raw 8N1 at the requested baud rate
#[derive(Debug, Clone)]
pub struct SerialTransport {
    /// `None` means auto-detect on every open
    path: Option<PathBuf>,
    baud_rate: u32,
    sysfs_root: PathBuf,
    dev_root: PathBuf,
}

impl SerialTransport {
    pub fn new(path: Option<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path,
            baud_rate,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_TTY),
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
        }
    }

    /// Override where port discovery looks
    pub fn with_discovery_roots(mut self, sysfs_root: PathBuf, dev_root: PathBuf) -> Self {
        self.sysfs_root = sysfs_root;
        self.dev_root = dev_root;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn resolve_path(&self) -> Result<PathBuf, TransportError> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => auto_detect_port(&self.sysfs_root, &self.dev_root).ok_or(TransportError::NoDevice),
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("{}@{}", path.display(), self.baud_rate),
            None => format!("auto@{}", self.baud_rate),
        }
    }

    async fn open(&self) -> Result<TransportReader, TransportError> {
        let path = self.resolve_path()?;
        let baud_rate = self.baud_rate;
        let target = path.display().to_string();

        let file = tokio::task::spawn_blocking(move || open_serial(&path, baud_rate))
            .await
            .map_err(|e| TransportError::Read(std::io::Error::other(e)))?
            .map_err(|source| TransportError::Open {
                target: target.clone(),
                source,
            })?;

        serial_reader(file).map_err(|source| TransportError::Open { target, source })
    }
}

/// Devices and fifos are polled through the reactor so that dropping the
/// reader closes the descriptor even while no bytes arrive. Regular files
/// cannot be registered with epoll and always hit EOF, so they are read
/// through `tokio::fs`.
#[cfg(unix)]
fn serial_reader(file: std::fs::File) -> std::io::Result<TransportReader> {
    if file.metadata()?.file_type().is_file() {
        return Ok(Box::new(BufReader::new(tokio::fs::File::from_std(file))));
    }
    let device = SerialDevice {
        fd: tokio::io::unix::AsyncFd::new(file)?,
    };
    Ok(Box::new(BufReader::new(device)))
}

#[cfg(not(unix))]
fn serial_reader(file: std::fs::File) -> std::io::Result<TransportReader> {
    Ok(Box::new(BufReader::new(tokio::fs::File::from_std(file))))
}

/// Non-blocking device descriptor driven by readiness events
#[cfg(unix)]
struct SerialDevice {
    fd: tokio::io::unix::AsyncFd<std::fs::File>,
}

#[cfg(unix)]
impl tokio::io::AsyncRead for SerialDevice {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        use std::io::Read;

        loop {
            let mut guard = std::task::ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return std::task::Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return std::task::Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

#[cfg(unix)]
fn open_serial(path: &std::path::Path, baud_rate: u32) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;
    configure_tty(&file, baud_rate)?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_serial(path: &std::path::Path, _baud_rate: u32) -> std::io::Result<std::fs::File> {
    std::fs::File::open(path)
}

#[cfg(unix)]
fn baud_constant(baud_rate: u32) -> std::io::Result<libc::speed_t> {
    Ok(match baud_rate {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {other}"),
            ))
        }
    })
}

/// Raw mode with the receiver enabled. Non-terminal files (pipes, fifos)
/// are left untouched.
#[cfg(unix)]
fn configure_tty(file: &std::fs::File, baud_rate: u32) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let speed = baud_constant(baud_rate)?;

    // SAFETY: `fd` stays open for the lifetime of `file`, and `tio` is fully
    // initialised by tcgetattr before use.
    unsafe {
        if libc::isatty(fd) != 1 {
            return Ok(());
        }
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cc[libc::VMIN] = 1;
        tio.c_cc[libc::VTIME] = 0;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

/// TCP bridge speaking the same line protocol
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }

    async fn open(&self) -> Result<TransportReader, TransportError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|source| TransportError::Open {
                target: self.address.clone(),
                source,
            })?;
        Ok(Box::new(BufReader::new(stream)))
    }
}

/// Live source settings
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub buffer: BufferConfig,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub stop_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl LiveConfig {
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

/// Moving average of instantaneous arrival rates
#[derive(Debug, Default)]
pub struct ArrivalTracker {
    last: Option<f64>,
    rates: VecDeque<f64>,
}

impl ArrivalTracker {
    pub fn record(&mut self, at: f64) {
        if let Some(previous) = self.last {
            let dt = at - previous;
            if dt > 0.0 {
                self.rates.push_back(1.0 / dt);
                if self.rates.len() > ARRIVAL_WINDOW {
                    self.rates.pop_front();
                }
            }
        }
        self.last = Some(at);
    }

    /// Samples per second, 0 until two arrivals were seen
    pub fn rate_hz(&self) -> f64 {
        if self.rates.is_empty() {
            return 0.0;
        }
        self.rates.iter().sum::<f64>() / self.rates.len() as f64
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.rates.clear();
    }
}

struct LiveShared {
    core: SourceCore,
    arrivals: Mutex<ArrivalTracker>,
}

impl LiveShared {
    fn arrivals(&self) -> std::sync::MutexGuard<'_, ArrivalTracker> {
        self.arrivals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ingest(&self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let arrival = wall_clock_secs();
        match parse_line(&line, arrival) {
            Ok(Some(sample)) => {
                if self.core.offer(sample) {
                    self.arrivals().record(arrival);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.core.counters().inc_dropped();
                debug!(error = %e, line = %line.trim(), "Dropped malformed line");
            }
        }
    }
}

/// Source reading a serial device or TCP bridge
pub struct LiveSource {
    transport: Arc<dyn Transport>,
    config: LiveConfig,
    shared: Arc<LiveShared>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl LiveSource {
    pub fn new(transport: Arc<dyn Transport>, config: LiveConfig) -> Self {
        let shared = Arc::new(LiveShared {
            core: SourceCore::new(config.buffer),
            arrivals: Mutex::new(ArrivalTracker::default()),
        });
        Self {
            transport,
            config,
            shared,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn target(&self) -> String {
        self.transport.describe()
    }

    pub fn arrival_rate_hz(&self) -> f64 {
        self.shared.arrivals().rate_hz()
    }
}

#[async_trait]
impl SampleSource for LiveSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    fn core(&self) -> &SourceCore {
        &self.shared.core
    }

    async fn start(&self) -> Result<(), SourceError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }

        let reader = self
            .transport
            .open()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        self.shared.arrivals().reset();
        self.shared.core.set_running(true);

        let transport = Arc::clone(&self.transport);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        *worker = Some(Worker::spawn(move |shutdown| {
            read_loop(transport, shared, config, reader, shutdown)
        }));

        info!(transport = %self.transport.describe(), "Transport opened");
        Ok(())
    }

    async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        self.shared.core.set_running(false);
        if let Some(worker) = worker {
            worker.stop(self.config.stop_timeout).await;
            debug!(transport = %self.transport.describe(), "Transport released");
        }
    }

    fn statistics(&self) -> SourceStatistics {
        let mut stats = self
            .shared
            .core
            .base_statistics(SourceMode::Live, self.transport.describe());
        stats.arrival_rate_hz = Some(self.arrival_rate_hz());
        stats
    }
}

async fn read_loop(
    transport: Arc<dyn Transport>,
    shared: Arc<LiveShared>,
    config: LiveConfig,
    reader: TransportReader,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut lines = reader.split(b'\n');

    loop {
        let outcome = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            segment = lines.next_segment() => segment,
        };

        let failure = match outcome {
            Ok(Some(raw)) => {
                shared.ingest(&raw);
                continue;
            }
            Ok(None) => TransportError::Closed,
            Err(e) => TransportError::Read(e),
        };
        warn!(transport = %transport.describe(), error = %failure, "Transport lost");

        shared.core.counters().inc_transport_errors();
        match reconnect(transport.as_ref(), &config, &shared, &mut shutdown).await {
            Some(reader) => lines = reader.split(b'\n'),
            None => break,
        }
    }

    debug!("Live reader exited");
}

/// Reopen with doubling delays; `None` once shutdown is requested
async fn reconnect(
    transport: &dyn Transport,
    config: &LiveConfig,
    shared: &LiveShared,
    shutdown: &mut broadcast::Receiver<()>,
) -> Option<TransportReader> {
    let mut backoff = config.initial_backoff;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => return None,
            _ = tokio::time::sleep(backoff) => {}
        }

        let attempt = tokio::select! {
            biased;
            _ = shutdown.recv() => return None,
            attempt = transport.open() => attempt,
        };

        match attempt {
            Ok(reader) => {
                shared.core.counters().inc_reconnects();
                info!(transport = %transport.describe(), "Transport reconnected");
                return Some(reader);
            }
            Err(e) => {
                shared.core.counters().inc_transport_errors();
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
                warn!(
                    transport = %transport.describe(),
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Reconnect failed"
                );
            }
        }
    }
}
