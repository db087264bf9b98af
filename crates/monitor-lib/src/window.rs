//! Trailing time window over a buffer snapshot

use crate::models::SensorSnapshot;

/// Minimum number of samples a window needs before it can be scored
pub const MIN_WINDOW_SAMPLES: usize = 2;

/// Samples with `timestamp >= newest - duration`.
///
/// An empty snapshot yields an empty window.
pub fn extract(snapshot: &SensorSnapshot, duration: f64) -> SensorSnapshot {
    let Some(newest) = snapshot.newest() else {
        return SensorSnapshot::default();
    };
    let cutoff = newest - duration;
    let start = snapshot.timestamps.partition_point(|t| *t < cutoff);

    SensorSnapshot {
        timestamps: snapshot.timestamps[start..].to_vec(),
        ax: snapshot.ax[start..].to_vec(),
        ay: snapshot.ay[start..].to_vec(),
        az: snapshot.az[start..].to_vec(),
        temperature: snapshot.temperature[start..].to_vec(),
    }
}

/// Whether a window holds enough samples to be scored
pub fn is_sufficient(window: &SensorSnapshot) -> bool {
    window.len() >= MIN_WINDOW_SAMPLES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;

    fn snapshot(timestamps: &[f64]) -> SensorSnapshot {
        timestamps
            .iter()
            .map(|t| Sample::new(*t, 0.0, 0.0, 1.0, 25.0))
            .collect::<Vec<_>>()
            .iter()
            .collect()
    }

    #[test]
    fn test_extract_trailing_window() {
        let snap = snapshot(&[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        let window = extract(&snap, 1.0);
        assert_eq!(window.timestamps, vec![2.0, 2.5, 3.0]);
        assert_eq!(window.ax.len(), 3);
        assert!(is_sufficient(&window));
    }

    #[test]
    fn test_extract_empty() {
        let window = extract(&SensorSnapshot::default(), 2.0);
        assert!(window.is_empty());
        assert!(!is_sufficient(&window));
    }

    #[test]
    fn test_single_sample_is_insufficient() {
        let snap = snapshot(&[0.0, 5.0]);
        let window = extract(&snap, 2.0);
        assert_eq!(window.len(), 1);
        assert!(!is_sufficient(&window));
    }

    #[test]
    fn test_window_longer_than_snapshot() {
        let snap = snapshot(&[1.0, 2.0]);
        assert_eq!(extract(&snap, 60.0), snap);
    }
}
