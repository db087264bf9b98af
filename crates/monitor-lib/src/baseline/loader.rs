//! Filesystem baseline loader
//!
//! Layout under the data directory, checked in order:
//! - `<machine_type>/<profile>.csv`: a single recording
//! - `<machine_type>/<profile>/*.csv`: several recordings, combined
//! - `<machine_type>_<profile>pct.csv`: flat files from the first collection rigs

use super::{compare_profile_keys, BaselineRecord, ProfileRegistry};
use crate::error::BaselineLoadError;
use crate::models::Sample;
use crate::observability::StructuredLogger;
use crate::source::Recording;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct BaselineLoader {
    data_dir: PathBuf,
}

impl BaselineLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn machine_dir(&self, machine_type: &str) -> PathBuf {
        self.data_dir.join(machine_type)
    }

    fn flat_file(&self, machine_type: &str, profile: &str) -> PathBuf {
        self.data_dir.join(format!("{machine_type}_{profile}pct.csv"))
    }

    /// Profile keys with at least one recording, in numeric-aware order
    pub fn list_available_profiles(&self, machine_type: &str) -> Vec<String> {
        let mut keys = Vec::new();

        if let Ok(entries) = std::fs::read_dir(self.machine_dir(machine_type)) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if !csv_files_in(&path).is_empty() {
                        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                            keys.push(name.to_string());
                        }
                    }
                } else if is_csv(&path) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        keys.push(stem.to_string());
                    }
                }
            }
        }

        let prefix = format!("{machine_type}_");
        if let Ok(entries) = std::fs::read_dir(&self.data_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if let Some(key) = name
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix("pct.csv"))
                {
                    keys.push(key.to_string());
                }
            }
        }

        keys.sort_by(|a, b| compare_profile_keys(a, b));
        keys.dedup();
        keys
    }

    /// Recording files backing one profile
    fn recordings_for(&self, machine_type: &str, profile: &str) -> Result<Vec<PathBuf>, BaselineLoadError> {
        let machine_dir = self.machine_dir(machine_type);

        if let Some(single) = single_recording(&machine_dir, profile) {
            return Ok(vec![single]);
        }

        let dir = machine_dir.join(profile);
        if dir.is_dir() {
            let files = csv_files_in(&dir);
            if !files.is_empty() {
                return Ok(files);
            }
        }

        let flat = self.flat_file(machine_type, profile);
        if flat.is_file() {
            return Ok(vec![flat]);
        }

        Err(BaselineLoadError::NotFound {
            machine_type: machine_type.to_string(),
            profile: profile.to_string(),
        })
    }

    /// Build the baseline for one profile.
    ///
    /// Multiple recordings are concatenated and sorted by timestamp before
    /// the statistics are computed over the union.
    pub fn load(&self, machine_type: &str, profile: &str) -> Result<BaselineRecord, BaselineLoadError> {
        let paths = self.recordings_for(machine_type, profile)?;

        let mut samples: Vec<Sample> = Vec::new();
        for path in &paths {
            let recording = Recording::load(path)?;
            debug!(path = %path.display(), rows = recording.len(), "Read baseline recording");
            samples.extend(recording.samples);
        }
        if paths.len() > 1 {
            samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        BaselineRecord::from_samples(profile, &samples)
    }

    /// Load every available profile, skipping the ones that fail.
    ///
    /// Errors only when nothing could be loaded.
    pub fn load_all(&self, machine_type: &str) -> Result<ProfileRegistry, BaselineLoadError> {
        let logger = StructuredLogger::new(machine_type);
        let mut registry = ProfileRegistry::new(machine_type);

        for profile in self.list_available_profiles(machine_type) {
            match self.load(machine_type, &profile) {
                Ok(record) => {
                    logger.log_baseline_loaded(&record);
                    registry.insert(record);
                }
                Err(e) => logger.log_baseline_load_failed(&profile, &e),
            }
        }

        if registry.is_empty() {
            return Err(BaselineLoadError::NoProfiles(machine_type.to_string()));
        }
        Ok(registry)
    }
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// `<profile>.csv` in `dir`, matched with the same extension rule as listing
fn single_recording(dir: &Path, profile: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .find(|p| is_csv(p) && p.file_stem().and_then(|s| s.to_str()) == Some(profile))
}

fn csv_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| is_csv(p))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,ax_g,ay_g,az_g,temp_C\n";

    fn write_recording(path: &Path, start: f64, count: usize, az: f64) {
        let mut text = String::from(HEADER);
        for i in 0..count {
            let t = start + i as f64 * 0.1;
            text.push_str(&format!("{t},0.0,0.0,{az},25.0\n"));
        }
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_list_and_load_single_file() {
        let dir = TempDir::new().unwrap();
        write_recording(&dir.path().join("motor/50.csv"), 0.0, 20, 1.0);
        write_recording(&dir.path().join("motor/100.csv"), 0.0, 20, 1.5);

        let loader = BaselineLoader::new(dir.path());
        assert_eq!(loader.list_available_profiles("motor"), vec!["50", "100"]);

        let record = loader.load("motor", "100").unwrap();
        assert_eq!(record.key, "100");
        assert_eq!(record.sample_count, 20);
        assert!((record.vibration.mean - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_directory_of_recordings_is_combined() {
        let dir = TempDir::new().unwrap();
        // Later run written first to check the union is time-sorted
        write_recording(&dir.path().join("motor/traj_a/run2.csv"), 10.0, 5, 1.2);
        write_recording(&dir.path().join("motor/traj_a/run1.csv"), 0.0, 5, 0.8);

        let loader = BaselineLoader::new(dir.path());
        assert_eq!(loader.list_available_profiles("motor"), vec!["traj_a"]);

        let record = loader.load("motor", "traj_a").unwrap();
        assert_eq!(record.sample_count, 10);
        assert!((record.vibration.mean - 1.0).abs() < 1e-9);
        assert!((record.duration_secs - 10.4).abs() < 1e-9);
    }

    #[test]
    fn test_flat_layout() {
        let dir = TempDir::new().unwrap();
        write_recording(&dir.path().join("motor_75pct.csv"), 0.0, 12, 1.0);

        let loader = BaselineLoader::new(dir.path());
        assert_eq!(loader.list_available_profiles("motor"), vec!["75"]);
        assert!(loader.load("motor", "75").is_ok());
    }

    #[test]
    fn test_uppercase_extension_lists_and_loads() {
        let dir = TempDir::new().unwrap();
        write_recording(&dir.path().join("motor/60.CSV"), 0.0, 20, 1.0);

        let loader = BaselineLoader::new(dir.path());
        assert_eq!(loader.list_available_profiles("motor"), vec!["60"]);
        assert_eq!(loader.load("motor", "60").unwrap().sample_count, 20);
    }

    #[test]
    fn test_missing_profile() {
        let dir = TempDir::new().unwrap();
        let loader = BaselineLoader::new(dir.path());
        assert!(matches!(
            loader.load("motor", "50"),
            Err(BaselineLoadError::NotFound { .. })
        ));
        assert!(loader.list_available_profiles("motor").is_empty());
    }

    #[test]
    fn test_load_all_skips_failures() {
        let dir = TempDir::new().unwrap();
        write_recording(&dir.path().join("motor/50.csv"), 0.0, 20, 1.0);
        std::fs::write(dir.path().join("motor/60.csv"), "timestamp,ax_g\n0,0\n").unwrap();
        write_recording(&dir.path().join("motor/90.csv"), 0.0, 1, 1.0);

        let loader = BaselineLoader::new(dir.path());
        let registry = loader.load_all("motor").unwrap();
        assert_eq!(registry.keys(), vec!["50"]);
        assert_eq!(registry.machine_type(), "motor");
    }

    #[test]
    fn test_load_all_nothing_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("fan")).unwrap();
        let loader = BaselineLoader::new(dir.path());
        assert!(matches!(
            loader.load_all("fan"),
            Err(BaselineLoadError::NoProfiles(_))
        ));
    }
}
