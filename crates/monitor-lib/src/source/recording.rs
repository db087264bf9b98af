//! Recorded sample files (CSV with a header row)
//!
//! Required columns are `timestamp, ax_g, ay_g, az_g, temp_C`; any other
//! column (microphone channels, labels) is ignored.

use crate::error::RecordingError;
use crate::models::Sample;
use std::path::{Path, PathBuf};

/// Columns every recording must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["timestamp", "ax_g", "ay_g", "az_g", "temp_C"];

/// Header position of each required column
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    timestamp: usize,
    ax: usize,
    ay: usize,
    az: usize,
    temperature: usize,
}

impl ColumnMap {
    fn from_header(path: &Path, header: &str) -> Result<Self, RecordingError> {
        let columns: Vec<&str> = header
            .trim_start_matches('\u{feff}')
            .split(',')
            .map(|c| c.trim().trim_matches('"'))
            .collect();
        let find = |name: &str| columns.iter().position(|c| *c == name);

        let positions: Vec<Option<usize>> = REQUIRED_COLUMNS.iter().map(|&c| find(c)).collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(&positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RecordingError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            });
        }

        let at = |i: usize| positions[i].unwrap_or_default();
        Ok(Self {
            timestamp: at(0),
            ax: at(1),
            ay: at(2),
            az: at(3),
            temperature: at(4),
        })
    }

    fn width(&self) -> usize {
        [self.timestamp, self.ax, self.ay, self.az, self.temperature]
            .into_iter()
            .max()
            .unwrap_or_default()
            + 1
    }
}

/// A parsed recording, rows in file order
#[derive(Debug, Clone)]
pub struct Recording {
    pub path: PathBuf,
    pub samples: Vec<Sample>,
}

impl Recording {
    /// Read and parse a recording from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RecordingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Async variant of [`Recording::load`] for use inside the runtime
    pub async fn load_async(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RecordingError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &text)
    }

    /// Parse CSV text. `path` is only used in error messages.
    ///
    /// Values are parsed but not range-checked; callers decide whether an
    /// implausible row is dropped or counted.
    pub fn parse(path: &Path, text: &str) -> Result<Self, RecordingError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(RecordingError::Empty(path.to_path_buf()));
        };
        let columns = ColumnMap::from_header(path, header)?;
        let width = columns.width();

        let mut samples = Vec::new();
        for (index, line) in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < width {
                return Err(RecordingError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("expected at least {} fields, got {}", width, fields.len()),
                });
            }

            let value = |col: usize| -> Result<f64, RecordingError> {
                fields[col].parse::<f64>().map_err(|_| RecordingError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("{:?} is not a number", fields[col]),
                })
            };

            samples.push(Sample::new(
                value(columns.timestamp)?,
                value(columns.ax)?,
                value(columns.ay)?,
                value(columns.az)?,
                value(columns.temperature)?,
            ));
        }

        if samples.is_empty() {
            return Err(RecordingError::Empty(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Seconds between the first and last row
    pub fn duration_secs(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Recording, RecordingError> {
        Recording::parse(Path::new("test.csv"), text)
    }

    #[test]
    fn test_parse_with_extra_columns() {
        let rec = parse(
            "timestamp,ax_g,ay_g,az_g,temp_C,mic_raw\n\
             0.0,0.01,0.02,0.98,24.5,512\n\
             0.1,0.02,0.01,0.99,24.6,498\n",
        )
        .unwrap();
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.samples[1], Sample::new(0.1, 0.02, 0.01, 0.99, 24.6));
        assert!((rec.duration_secs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_parse_reordered_columns() {
        let rec = parse("temp_C,az_g,ay_g,ax_g,timestamp\n30,1,2,3,7\n").unwrap();
        assert_eq!(rec.samples[0], Sample::new(7.0, 3.0, 2.0, 1.0, 30.0));
    }

    #[test]
    fn test_missing_columns_named() {
        let err = parse("timestamp,ax_g,ay_g\n0,0,0\n").unwrap_err();
        match err {
            RecordingError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["az_g".to_string(), "temp_C".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_row_reports_line() {
        let err = parse("timestamp,ax_g,ay_g,az_g,temp_C\n0,0,0,1,25\n0.1,x,0,1,25\n").unwrap_err();
        assert!(matches!(err, RecordingError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(matches!(
            parse("timestamp,ax_g,ay_g,az_g,temp_C\n"),
            Err(RecordingError::Empty(_))
        ));
        assert!(matches!(parse(""), Err(RecordingError::Empty(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.csv");
        std::fs::write(&path, "timestamp,ax_g,ay_g,az_g,temp_C\r\n1,0,0,1,20\r\n").unwrap();
        let rec = Recording::load(&path).unwrap();
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.path, path);

        assert!(matches!(
            Recording::load(dir.path().join("missing.csv")),
            Err(RecordingError::Io { .. })
        ));
    }

    #[test]
    fn test_load_async_matches_blocking_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.csv");
        std::fs::write(&path, "timestamp,ax_g,ay_g,az_g,temp_C\n1,0,0,1,20\n2,0,0,1,21\n").unwrap();

        let rec = tokio_test::block_on(Recording::load_async(&path)).unwrap();
        assert_eq!(rec.samples, Recording::load(&path).unwrap().samples);
        assert_eq!(rec.duration_secs(), 1.0);
    }
}
