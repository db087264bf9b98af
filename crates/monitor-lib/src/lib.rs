//! Motor health monitoring library
//!
//! This crate provides the core functionality for:
//! - Sample ingestion from a serial/TCP controller or a recorded CSV file
//! - A time- and count-bounded ring buffer of validated samples
//! - Baseline loading and profile selection
//! - Windowed anomaly scoring of vibration and temperature
//! - Health checks and observability

pub mod anomaly;
pub mod baseline;
pub mod buffer;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod session;
pub mod source;
pub mod stats;
pub mod window;

pub use anomaly::{AnomalyEngine, MachinePolicy, PolicyKind, TemperaturePolicy};
pub use baseline::{BaselineLoader, BaselineRecord, ProfileRegistry};
pub use buffer::{BufferConfig, BufferStats, SampleBuffer};
pub use error::{
    BaselineLoadError, InvalidSampleError, MalformedRecordError, RecordingError, SessionError,
    SourceError, TransportError,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use session::{MonitorReport, MonitorSession, DEFAULT_WINDOW_SECS};
pub use source::{
    LiveConfig, LiveSource, ReplayConfig, ReplaySource, SampleSource, SourceMode,
    SourceStatistics,
};
