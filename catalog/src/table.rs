//! CSV detection tables with passthrough columns.
//!
//! A table holds one field's detections as produced by the coordinate
//! projection step. Only the score and the four sky bounds are interpreted;
//! every other column is carried through untouched so that writing a subset
//! reproduces the selected input rows field for field.

use std::io;
use std::path::Path;

use csv::StringRecord;
use log::warn;
use thiserror::Error;

use crate::resolver::Detection;
use crate::sky::{RaConvention, SkyBox};

pub const SCORE_COLUMN: &str = "score";
pub const RA_MIN_COLUMN: &str = "bbox_ra_min";
pub const RA_MAX_COLUMN: &str = "bbox_ra_max";
pub const DEC_MIN_COLUMN: &str = "bbox_dec_min";
pub const DEC_MAX_COLUMN: &str = "bbox_dec_max";

/// Columns every detection table must provide
pub const REQUIRED_COLUMNS: [&str; 5] = [
    RA_MIN_COLUMN,
    RA_MAX_COLUMN,
    DEC_MIN_COLUMN,
    DEC_MAX_COLUMN,
    SCORE_COLUMN,
];

/// Errors that can occur while reading or writing detection tables
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: column {column} has non-numeric value {value:?}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TableError {
    /// True for errors caused by the table's column layout
    pub fn is_schema_error(&self) -> bool {
        matches!(self, TableError::MissingColumns(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    score: usize,
    ra_min: usize,
    ra_max: usize,
    dec_min: usize,
    dec_max: usize,
}

impl ColumnIndices {
    fn locate(headers: &StringRecord) -> Result<Self, TableError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TableError::MissingColumns(missing));
        }

        // All present, checked above
        let column = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            score: column(SCORE_COLUMN),
            ra_min: column(RA_MIN_COLUMN),
            ra_max: column(RA_MAX_COLUMN),
            dec_min: column(DEC_MIN_COLUMN),
            dec_max: column(DEC_MAX_COLUMN),
        })
    }
}

/// One field's detections together with their raw CSV rows
#[derive(Debug, Clone)]
pub struct DetectionTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
    detections: Vec<Detection>,
    invalid_rows: usize,
}

impl DetectionTable {
    /// Load a table from a CSV file.
    ///
    /// See [`DetectionTable::from_reader`] for the validation rules.
    pub fn read(path: &Path, convention: RaConvention) -> Result<Self, TableError> {
        let reader = csv::ReaderBuilder::new().from_path(path)?;
        Self::from_csv(reader, convention)
    }

    /// Load a table from any CSV source.
    ///
    /// # Validation
    /// - Every name in [`REQUIRED_COLUMNS`] must appear in the header,
    ///   otherwise all missing names are reported together.
    /// - A row whose required cell is empty or NaN, or whose bounds do not
    ///   form a valid sky box, is skipped and counted in
    ///   [`DetectionTable::invalid_rows`].
    /// - Non-numeric text in a required cell fails the whole table.
    pub fn from_reader<R: io::Read>(
        reader: R,
        convention: RaConvention,
    ) -> Result<Self, TableError> {
        Self::from_csv(csv::ReaderBuilder::new().from_reader(reader), convention)
    }

    fn from_csv<R: io::Read>(
        mut reader: csv::Reader<R>,
        convention: RaConvention,
    ) -> Result<Self, TableError> {
        let headers = reader.headers()?.clone();
        let columns = ColumnIndices::locate(&headers)?;

        let mut records = Vec::new();
        let mut detections = Vec::new();
        let mut invalid_rows = 0;

        for (row_index, result) in reader.records().enumerate() {
            let record = result?;
            let row = row_index + 1;

            match parse_detection(&record, &columns, row, convention)? {
                Some(detection) => {
                    detections.push(detection);
                    records.push(record);
                }
                None => invalid_rows += 1,
            }
        }

        Ok(Self {
            headers,
            records,
            detections,
            invalid_rows,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Valid rows, aligned with [`DetectionTable::detections`]
    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Number of valid rows
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Rows skipped during loading
    pub fn invalid_rows(&self) -> usize {
        self.invalid_rows
    }

    /// Rows present in the source, valid or not
    pub fn total_rows(&self) -> usize {
        self.detections.len() + self.invalid_rows
    }

    /// Write the header and the selected rows to a CSV file.
    pub fn write_subset(&self, path: &Path, indices: &[usize]) -> Result<(), TableError> {
        let writer = csv::Writer::from_path(path)?;
        self.write_csv(writer, indices)
    }

    /// Write the header and the selected rows to any sink.
    pub fn write_subset_to<W: io::Write>(
        &self,
        sink: W,
        indices: &[usize],
    ) -> Result<(), TableError> {
        self.write_csv(csv::Writer::from_writer(sink), indices)
    }

    fn write_csv<W: io::Write>(
        &self,
        mut writer: csv::Writer<W>,
        indices: &[usize],
    ) -> Result<(), TableError> {
        writer.write_record(&self.headers)?;
        for &index in indices {
            writer.write_record(&self.records[index])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Parse one row; `Ok(None)` marks a row to skip
fn parse_detection(
    record: &StringRecord,
    columns: &ColumnIndices,
    row: usize,
    convention: RaConvention,
) -> Result<Option<Detection>, TableError> {
    let mut values = [0.0; 5];
    let fields = [
        (SCORE_COLUMN, columns.score),
        (RA_MIN_COLUMN, columns.ra_min),
        (RA_MAX_COLUMN, columns.ra_max),
        (DEC_MIN_COLUMN, columns.dec_min),
        (DEC_MAX_COLUMN, columns.dec_max),
    ];

    for (slot, (name, index)) in values.iter_mut().zip(fields) {
        let raw = record.get(index).unwrap_or("").trim();
        if raw.is_empty() {
            warn!("Row {row}: empty {name}, skipping");
            return Ok(None);
        }
        let value: f64 = raw.parse().map_err(|_| TableError::InvalidValue {
            row,
            column: name,
            value: raw.to_string(),
        })?;
        if value.is_nan() {
            warn!("Row {row}: {name} is NaN, skipping");
            return Ok(None);
        }
        *slot = value;
    }

    let [score, ra_min, ra_max, dec_min, dec_max] = values;
    match SkyBox::from_bounds(ra_min, ra_max, dec_min, dec_max, convention) {
        Ok(sky_box) => Ok(Some(Detection { score, sky_box })),
        Err(e) => {
            warn!("Row {row}: invalid sky box ({e}), skipping");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
component_id,label,score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max,counts
a.fits,cs,0.9,10.0,10.1,-5.0,-4.9,\"AbC,1\"
b.fits,fr,0.75,359.9,0.1,1.0,1.2,xyz
";

    fn read(text: &str) -> Result<DetectionTable, TableError> {
        DetectionTable::from_reader(text.as_bytes(), RaConvention::Ordered)
    }

    #[test]
    fn test_read_table() {
        let table = read(TABLE).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.invalid_rows(), 0);
        assert_eq!(table.headers().len(), 8);

        let first = &table.detections()[0];
        assert_eq!(first.score, 0.9);
        assert_eq!(first.sky_box.dec_min, -5.0);

        assert!(table.detections()[1].sky_box.ra.is_wrapping());
        assert_eq!(table.records()[0].get(7), Some("AbC,1"));
    }

    #[test]
    fn test_missing_columns_all_reported() {
        let err = read("component_id,bbox_ra_min,bbox_ra_max\nx,1,2\n").unwrap_err();
        match err {
            TableError::MissingColumns(missing) => {
                assert_eq!(missing, vec!["bbox_dec_min", "bbox_dec_max", "score"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_score_is_schema_error() {
        let err = read("bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max\n1,2,3,4\n").unwrap_err();
        assert!(err.is_schema_error());
        assert_eq!(err.to_string(), "Missing required columns: score");
    }

    #[test]
    fn test_empty_and_nan_rows_skipped() {
        let text = "\
score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max
0.5,1,2,3,4
,1,2,3,4
0.4,NaN,2,3,4
0.3,1,2,3,95
0.2,5,6,7,8
";
        let table = read(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.invalid_rows(), 3);
        assert_eq!(table.total_rows(), 5);
        assert_eq!(table.records()[1].get(0), Some("0.2"));
    }

    #[test]
    fn test_non_numeric_value_fails_table() {
        let text = "score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max\nhigh,1,2,3,4\n";
        match read(text).unwrap_err() {
            TableError::InvalidValue { row, column, value } => {
                assert_eq!(row, 1);
                assert_eq!(column, SCORE_COLUMN);
                assert_eq!(value, "high");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!read(text).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_ragged_rows_are_read_errors() {
        let text = "score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max\n0.1,1,2\n";
        assert!(matches!(read(text), Err(TableError::Csv(_))));
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let table = read("score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.total_rows(), 0);
    }

    #[test]
    fn test_write_subset_preserves_rows() {
        let table = read(TABLE).unwrap();
        let mut out = Vec::new();
        table.write_subset_to(&mut out, &[1]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "component_id,label,score,bbox_ra_min,bbox_ra_max,bbox_dec_min,bbox_dec_max,counts\n\
             b.fits,fr,0.75,359.9,0.1,1.0,1.2,xyz\n"
        );

        let mut out = Vec::new();
        table.write_subset_to(&mut out, &[]).unwrap();
        assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 1);
    }
}
