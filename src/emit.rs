//! Merge-record emission.
//!
//! One plain-text line per merge, 13 whitespace-separated fields:
//!
//! ```text
//! seq  idA  nA  latA  lonA  origLatA  origLonA  idB  nB  latB  lonB  origLatB  origLonB
//! ```
//!
//! Side A is the heavier region at the moment of merge; centroids are the
//! values before merging. Records are written in merge order.

use std::io::Write;

use crate::error::Result;
use crate::MergeRecord;

/// Destination for merge records.
///
/// The scheduler drives a full run through this seam, so tests can collect
/// into a `Vec<MergeRecord>` while the CLI streams to a file.
pub trait MergeSink {
    fn record(&mut self, record: &MergeRecord) -> Result<()>;

    /// Called once after the final merge.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl MergeSink for Vec<MergeRecord> {
    fn record(&mut self, record: &MergeRecord) -> Result<()> {
        self.push(*record);
        Ok(())
    }
}

/// Writes merge records as plain text lines to any [`Write`] target.
///
/// Writes are buffered by the caller's `W`; [`MergeSink::finish`] flushes.
pub struct MergeWriter<W: Write> {
    out: W,
}

impl<W: Write> MergeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Hand back the underlying writer, e.g. to inspect a test buffer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MergeSink for MergeWriter<W> {
    fn record(&mut self, r: &MergeRecord) -> Result<()> {
        writeln!(
            self.out,
            "{} {} {} {} {} {} {} {} {} {} {} {} {}",
            r.seq,
            r.id_a,
            r.n_a,
            r.lat_a,
            r.lon_a,
            r.orig_lat_a,
            r.orig_lon_a,
            r.id_b,
            r.n_b,
            r.lat_b,
            r.lon_b,
            r.orig_lat_b,
            r.orig_lon_b
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MergeRecord {
        MergeRecord {
            seq: 1,
            id_a: 4,
            n_a: 120.0,
            lat_a: 40.85,
            lon_a: -73.92,
            orig_lat_a: 40.86,
            orig_lon_a: -73.93,
            id_b: 9,
            n_b: 55.0,
            lat_b: 40.80,
            lon_b: -73.95,
            orig_lat_b: 40.80,
            orig_lon_b: -73.95,
        }
    }

    #[test]
    fn test_line_has_thirteen_fields() {
        let mut writer = MergeWriter::new(Vec::new());
        writer.record(&sample_record()).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let fields: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(fields.len(), 13);
        assert_eq!(fields[0], "1");
        assert_eq!(fields[1], "4");
        assert_eq!(fields[7], "9");
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut records: Vec<MergeRecord> = Vec::new();
        records.record(&sample_record()).unwrap();
        records.finish().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id_a, 4);
    }
}
