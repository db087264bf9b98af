//! Line format of the live transport

use super::recording::REQUIRED_COLUMNS;
use crate::error::MalformedRecordError;
use crate::models::Sample;

/// Parse one transport line.
///
/// Accepts `ax,ay,az,temp` (stamped with `arrival`) or
/// `timestamp,ax,ay,az,temp`. Blank lines and header lines return `Ok(None)`.
pub fn parse_line(line: &str, arrival: f64) -> Result<Option<Sample>, MalformedRecordError> {
    let line = line.trim();
    if line.is_empty() || is_header(line) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let values = fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            field
                .parse::<f64>()
                .map_err(|_| MalformedRecordError::NotNumeric {
                    index,
                    value: field.to_string(),
                })
        })
        .collect::<Result<Vec<f64>, _>>();

    let sample = match (fields.len(), values) {
        (4, Ok(v)) => Sample::new(arrival, v[0], v[1], v[2], v[3]),
        (5, Ok(v)) => Sample::new(v[0], v[1], v[2], v[3], v[4]),
        (4 | 5, Err(e)) => return Err(e),
        (n, _) => return Err(MalformedRecordError::FieldCount(n)),
    };

    sample.validate()?;
    Ok(Some(sample))
}

/// Header lines start with a known column name
fn is_header(line: &str) -> bool {
    let first = line.split(',').next().unwrap_or_default().trim();
    REQUIRED_COLUMNS
        .iter()
        .any(|column| first.eq_ignore_ascii_case(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidSampleError;

    #[test]
    fn test_four_fields_use_arrival_time() {
        let sample = parse_line("0.01,-0.02,0.98,24.5\r\n", 1234.5).unwrap().unwrap();
        assert_eq!(sample, Sample::new(1234.5, 0.01, -0.02, 0.98, 24.5));
    }

    #[test]
    fn test_five_fields_keep_device_time() {
        let sample = parse_line("17.25, 0.0, 0.0, 1.0, 30.0", 99.0).unwrap().unwrap();
        assert_eq!(sample.timestamp, 17.25);
        assert_eq!(sample.temperature, 30.0);
    }

    #[test]
    fn test_headers_and_blanks_skipped() {
        assert_eq!(parse_line("ax_g,ay_g,az_g,temp_C", 0.0).unwrap(), None);
        assert_eq!(parse_line("Timestamp,ax_g,ay_g,az_g,temp_C", 0.0).unwrap(), None);
        assert_eq!(parse_line("   ", 0.0).unwrap(), None);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            parse_line("1,2,3", 0.0),
            Err(MalformedRecordError::FieldCount(3))
        );
        assert!(matches!(
            parse_line("0.1,abc,0.3,25", 0.0),
            Err(MalformedRecordError::NotNumeric { index: 1, .. })
        ));
        assert_eq!(
            parse_line("Sensor init OK", 0.0),
            Err(MalformedRecordError::FieldCount(1))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            parse_line("0.0,0.0,75.0,25.0", 1.0),
            Err(MalformedRecordError::Invalid(
                InvalidSampleError::AccelerationOutOfRange { axis: "az", .. }
            ))
        ));
        assert!(parse_line("0.0,0.0,1.0,nan", 1.0).is_err());
    }
}
