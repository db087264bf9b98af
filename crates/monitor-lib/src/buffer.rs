//! Bounded, time-ordered sample buffer shared by a source and the engine
//!
//! Two limits are enforced on every insert:
//! - age: nothing older than `newest - max_duration`
//! - count: at most `max_samples` entries, oldest evicted first

use crate::error::InvalidSampleError;
use crate::models::{Sample, SensorSnapshot};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Default age limit relative to the newest sample (seconds)
pub const DEFAULT_BUFFER_DURATION: f64 = 10.0;

/// Default count limit
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Limits for a [`SampleBuffer`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferConfig {
    /// Maximum age of the oldest sample relative to the newest (seconds)
    pub max_duration: f64,
    /// Maximum number of samples held
    pub max_samples: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_BUFFER_DURATION,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl BufferConfig {
    pub fn with_max_duration(mut self, secs: f64) -> Self {
        self.max_duration = secs;
        self
    }

    pub fn with_max_samples(mut self, count: usize) -> Self {
        self.max_samples = count.max(1);
        self
    }
}

/// Ring buffer of validated samples.
///
/// One mutex guards append, snapshot and clear; it is only held while
/// mutating or copying, so readers never stall the producer for long.
#[derive(Debug)]
pub struct SampleBuffer {
    inner: Mutex<VecDeque<Sample>>,
    config: BufferConfig,
}

impl SampleBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(config.max_samples.min(10_000))),
            config,
        }
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    // Invariants are restored on every insert; a poisoned lock stays usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and store a sample, then evict by age and by count.
    ///
    /// Rejected samples leave the buffer untouched.
    pub fn append(&self, sample: Sample) -> Result<(), InvalidSampleError> {
        sample.validate()?;

        let mut buffer = self.lock();
        if let Some(newest) = buffer.back() {
            if sample.timestamp < newest.timestamp {
                return Err(InvalidSampleError::OutOfOrder {
                    timestamp: sample.timestamp,
                    newest: newest.timestamp,
                });
            }
        }

        buffer.push_back(sample);

        let cutoff = sample.timestamp - self.config.max_duration;
        let mut evicted = 0usize;
        while buffer
            .front()
            .is_some_and(|front| front.timestamp < cutoff)
        {
            buffer.pop_front();
            evicted += 1;
        }
        while buffer.len() > self.config.max_samples {
            buffer.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            trace!(evicted, remaining = buffer.len(), "Evicted samples");
        }
        Ok(())
    }

    /// Column-oriented copy of the buffer, optionally only the trailing
    /// `duration` seconds (`timestamp >= newest - duration`).
    pub fn snapshot(&self, duration: Option<f64>) -> SensorSnapshot {
        let buffer = self.lock();
        let Some(newest) = buffer.back().map(|s| s.timestamp) else {
            return SensorSnapshot::default();
        };

        let start = match duration {
            Some(secs) => {
                let cutoff = newest - secs;
                buffer.partition_point(|s| s.timestamp < cutoff)
            }
            None => 0,
        };

        buffer.range(start..).collect()
    }

    /// Drop every stored sample
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Seconds between the oldest and newest stored sample
    pub fn span_secs(&self) -> f64 {
        let buffer = self.lock();
        match (buffer.front(), buffer.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Occupancy figures for statistics and metrics
    pub fn stats(&self) -> BufferStats {
        let buffer = self.lock();
        BufferStats {
            samples: buffer.len(),
            capacity: self.config.max_samples,
            span_secs: match (buffer.front(), buffer.back()) {
                (Some(first), Some(last)) => last.timestamp - first.timestamp,
                _ => 0.0,
            },
            oldest_timestamp: buffer.front().map(|s| s.timestamp),
            newest_timestamp: buffer.back().map(|s| s.timestamp),
            max_duration_secs: self.config.max_duration,
        }
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

/// Buffer statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferStats {
    /// Number of stored samples
    pub samples: usize,
    /// Count limit
    pub capacity: usize,
    /// Depth in seconds (newest minus oldest)
    pub span_secs: f64,
    pub oldest_timestamp: Option<f64>,
    pub newest_timestamp: Option<f64>,
    /// Age limit in seconds
    pub max_duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(ts: f64) -> Sample {
        Sample::new(ts, 0.01, 0.02, 1.0, 25.0)
    }

    #[test]
    fn test_append_and_snapshot() {
        let buffer = SampleBuffer::default();
        buffer.append(sample(1.0)).unwrap();
        buffer.append(sample(2.0)).unwrap();

        let snap = buffer.snapshot(None);
        assert_eq!(snap.timestamps, vec![1.0, 2.0]);
        assert_eq!(snap.az, vec![1.0, 1.0]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_empty_snapshot_is_empty_not_absent() {
        let buffer = SampleBuffer::default();
        let snap = buffer.snapshot(Some(2.0));
        assert!(snap.is_empty());
        assert!(snap.temperature.is_empty());
    }

    #[test]
    fn test_invalid_sample_leaves_buffer_untouched() {
        let buffer = SampleBuffer::default();
        buffer.append(sample(1.0)).unwrap();

        let bad = Sample::new(2.0, f64::NAN, 0.0, 0.0, 25.0);
        assert!(buffer.append(bad).is_err());

        let hot = Sample::new(2.0, 0.0, 0.0, 0.0, 151.0);
        assert!(matches!(
            buffer.append(hot),
            Err(InvalidSampleError::TemperatureOutOfRange(_))
        ));

        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let buffer = SampleBuffer::default();
        buffer.append(sample(5.0)).unwrap();
        let err = buffer.append(sample(4.0)).unwrap_err();
        assert!(matches!(err, InvalidSampleError::OutOfOrder { .. }));

        // Equal timestamps keep non-decreasing order
        buffer.append(sample(5.0)).unwrap();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_age_eviction() {
        let buffer = SampleBuffer::new(BufferConfig::default().with_max_duration(10.0));
        for i in 0..=30 {
            buffer.append(sample(i as f64 * 0.5)).unwrap();
        }

        let snap = buffer.snapshot(None);
        let newest = snap.newest().unwrap();
        assert_eq!(newest, 15.0);
        assert!(snap.timestamps.iter().all(|t| *t >= newest - 10.0));
        assert_eq!(snap.timestamps[0], 5.0);
        assert!(snap.timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_count_eviction() {
        let buffer = SampleBuffer::new(BufferConfig::default().with_max_samples(5));
        for i in 0..20 {
            buffer.append(sample(i as f64 * 0.25)).unwrap();
        }

        assert_eq!(buffer.len(), 5);
        let snap = buffer.snapshot(None);
        assert_eq!(snap.timestamps.first().copied(), Some(3.75));
        assert_eq!(snap.timestamps.last().copied(), Some(4.75));
    }

    #[test]
    fn test_snapshot_duration_is_inclusive() {
        let buffer = SampleBuffer::default();
        for ts in [1.0, 2.0, 3.0, 4.0] {
            buffer.append(sample(ts)).unwrap();
        }

        let snap = buffer.snapshot(Some(2.0));
        assert_eq!(snap.timestamps, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_clear() {
        let buffer = SampleBuffer::default();
        buffer.append(sample(1.0)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        // Older timestamps are accepted again once cleared
        buffer.append(sample(0.5)).unwrap();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_stats() {
        let buffer = SampleBuffer::new(BufferConfig::default().with_max_samples(100));
        buffer.append(sample(10.0)).unwrap();
        buffer.append(sample(12.0)).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.span_secs, 2.0);
        assert_eq!(stats.oldest_timestamp, Some(10.0));
        assert_eq!(buffer.span_secs(), 2.0);
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let buffer = Arc::new(SampleBuffer::default());
        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.append(sample(i as f64 * 0.001)).unwrap();
                }
            })
        };

        for _ in 0..100 {
            let snap = buffer.snapshot(None);
            assert_eq!(snap.timestamps.len(), snap.temperature.len());
            assert!(snap.timestamps.windows(2).all(|w| w[0] <= w[1]));
        }

        producer.join().unwrap();
        assert_eq!(buffer.len(), 1000);
    }
}
