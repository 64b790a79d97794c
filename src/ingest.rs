//! Point ingest from CSV.
//!
//! Input is UTF-8 CSV with a header line (ignored) followed by
//! `longitude,latitude,weight` rows. Fields are trimmed; rows with
//! weight ≤ 0 are dropped, but still consume an id; region ids are the
//! pre-filter row index, so surviving ids may have gaps. Extra columns are
//! ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;

use crate::error::{ClusterError, Result};
use crate::Point;

/// Read weighted points from a CSV stream.
///
/// `max_records` caps the number of data rows read (not the number of points
/// kept); `None` reads everything. Unparsable rows and missing fields abort
/// with the offending line number.
pub fn read_points<R: Read>(input: R, max_records: Option<usize>) -> Result<Vec<Point>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);

    let max = max_records.unwrap_or(usize::MAX);
    let mut points = Vec::new();
    let mut rows_read: usize = 0;

    for result in reader.records() {
        if rows_read >= max {
            break;
        }
        let record = result.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let lon = parse_field(&record, 0, "longitude", line)?;
        let lat = parse_field(&record, 1, "latitude", line)?;
        let weight = parse_field(&record, 2, "weight", line)?;

        if weight > 0.0 {
            let point = Point::new(rows_read as u32, lon, lat, weight);
            if !point.is_valid() {
                return Err(ClusterError::InputFormat {
                    line,
                    message: format!("coordinates out of range: ({lon}, {lat})"),
                });
            }
            points.push(point);
        }
        rows_read += 1;
    }

    debug!("ingested {} points from {} rows", points.len(), rows_read);
    Ok(points)
}

/// Read weighted points from a CSV file on disk.
pub fn read_points_file(path: impl AsRef<Path>, max_records: Option<usize>) -> Result<Vec<Point>> {
    let file = File::open(path)?;
    read_points(file, max_records)
}

fn parse_field(record: &StringRecord, index: usize, name: &str, line: u64) -> Result<f64> {
    let raw = record.get(index).ok_or_else(|| ClusterError::InputFormat {
        line,
        message: format!("missing {name} field"),
    })?;
    raw.parse::<f64>().map_err(|_| ClusterError::InputFormat {
        line,
        message: format!("unparsable {name}: {raw:?}"),
    })
}

fn csv_error(err: csv::Error) -> ClusterError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    ClusterError::InputFormat {
        line,
        message: err.to_string(),
    }
}
