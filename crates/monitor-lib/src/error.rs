//! Error types for ingestion, baselines and sessions

use std::path::PathBuf;
use thiserror::Error;

/// A sample that must not enter the ring buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidSampleError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("{axis} = {value} g is outside the accelerometer range")]
    AccelerationOutOfRange { axis: &'static str, value: f64 },

    #[error("temperature {0} °C is outside the sensor range")]
    TemperatureOutOfRange(f64),

    #[error("timestamp {timestamp} precedes newest buffered sample {newest}")]
    OutOfOrder { timestamp: f64, newest: f64 },
}

/// A transport line that could not be turned into a sample
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedRecordError {
    #[error("expected 4 or 5 fields, got {0}")]
    FieldCount(usize),

    #[error("field {index} is not numeric: {value:?}")]
    NotNumeric { index: usize, value: String },

    #[error("invalid sample: {0}")]
    Invalid(#[from] InvalidSampleError),
}

/// Open or read failure on a live transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("transport closed by peer")]
    Closed,

    #[error("no serial device found")]
    NoDevice,
}

/// Failure to read a recorded CSV file
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is missing required columns: {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{0} contains no samples")]
    Empty(PathBuf),
}

/// Errors surfaced by sample sources
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("sample source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("operation not supported by this source: {0}")]
    Unsupported(&'static str),
}

/// Failure to build a baseline for one profile
#[derive(Error, Debug)]
pub enum BaselineLoadError {
    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("profile {profile} has only {count} valid samples")]
    Insufficient { profile: String, count: usize },

    #[error("no baseline recordings found for {machine_type}/{profile}")]
    NotFound {
        machine_type: String,
        profile: String,
    },

    #[error("no baseline profiles could be loaded for {0}")]
    NoProfiles(String),

    #[error("baseline {profile} is invalid: {reason}")]
    InvalidRecord { profile: String, reason: String },
}

/// Errors from session-level commands
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("unknown baseline profile: {0}")]
    UnknownProfile(String),

    #[error("no baseline profiles loaded")]
    NoProfiles,

    #[error(transparent)]
    Source(#[from] SourceError),
}
