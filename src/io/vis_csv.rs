//! Visibility dumps in CSV, one row per (scan, time, baseline, polarization, channel).
//!
//! ```text
//! scan,field,time,ant1,ant2,pol,chan,re,im,flag
//! 1,3C286,4.8e9,0,1,RR,0,1.02,-0.13,0
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
    str::FromStr,
};

use csv::StringRecord;
use lexical::FromLexical;
use log::{debug, trace};
use num_complex::Complex;

use super::error::IOError;
use crate::{
    measurement_set::{MemoryMeasurementSet, VisRow},
    Baseline, Polarization,
};

/// Columns a visibility dump must have, in any order.
pub const VIS_CSV_COLUMNS: [&str; 10] = [
    "scan", "field", "time", "ant1", "ant2", "pol", "chan", "re", "im", "flag",
];

/// Find the index of each of `keys` in `headers`. Returns the missing keys on failure.
fn parse_csv_headers(
    headers: &StringRecord,
    keys: &[&'static str],
) -> Result<BTreeMap<&'static str, usize>, Vec<String>> {
    let mut remaining_keys: HashSet<&'static str> = keys.iter().copied().collect();
    let mut indices = BTreeMap::new();

    for (idx, cell) in headers.iter().enumerate() {
        if let Some(key) = remaining_keys.take(cell) {
            indices.insert(key, idx);
        }
    }

    if remaining_keys.is_empty() {
        Ok(indices)
    } else {
        let mut missing: Vec<String> = remaining_keys.into_iter().map(String::from).collect();
        missing.sort();
        Err(missing)
    }
}

/// The cells of one record, looked up by column name.
struct RecordCells<'a> {
    record: &'a StringRecord,
    indices: &'a BTreeMap<&'static str, usize>,
    file: &'a str,
}

impl RecordCells<'_> {
    fn get(&self, column: &'static str) -> &str {
        self.indices
            .get(column)
            .and_then(|&idx| self.record.get(idx))
            .unwrap_or_default()
    }

    fn invalid(&self, column: &'static str, expected: &str) -> IOError {
        IOError::InvalidValue {
            file: self.file.to_string(),
            line: self.record.position().map_or(0, csv::Position::line),
            column: column.to_string(),
            expected: expected.to_string(),
            value: self.get(column).to_string(),
        }
    }

    fn number<N: FromLexical>(&self, column: &'static str, expected: &str) -> Result<N, IOError> {
        lexical::parse::<N, _>(self.get(column)).map_err(|_| self.invalid(column, expected))
    }

    fn finite(&self, column: &'static str) -> Result<f64, IOError> {
        let value: f64 = self.number(column, "a finite number")?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(column, "a finite number"))
        }
    }

    fn polarization(&self) -> Result<Polarization, IOError> {
        Polarization::from_str(self.get("pol")).map_err(|_| self.invalid("pol", "a polarization"))
    }

    fn flag(&self) -> Result<bool, IOError> {
        match self.get("flag").to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(self.invalid("flag", "0, 1, true or false")),
        }
    }

    fn vis_row(&self) -> Result<VisRow, IOError> {
        Ok(VisRow {
            scan_id: self.number("scan", "an integer")?,
            field: self.get("field").to_string(),
            time: self.finite("time")?,
            baseline: Baseline::new(
                self.number("ant1", "an integer")?,
                self.number("ant2", "an integer")?,
            ),
            polarization: self.polarization()?,
            channel: self.number("chan", "an integer")?,
            vis: Complex::new(self.finite("re")?, self.finite("im")?),
            flagged: self.flag()?,
        })
    }
}

/// Load a visibility dump into memory.
///
/// # Errors
///
/// - [`IOError::MissingColumns`] if any of [`VIS_CSV_COLUMNS`] is not in the header.
/// - [`IOError::InvalidValue`] if a cell can't be parsed.
/// - [`IOError::CsvError`] if the file can't be read.
pub fn read_visibility_csv<P: AsRef<Path>>(path: P) -> Result<MemoryMeasurementSet, IOError> {
    let path = path.as_ref();
    let file = path.display().to_string();
    trace!("start read_visibility_csv {}", file);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let indices = parse_csv_headers(reader.headers()?, &VIS_CSV_COLUMNS).map_err(|missing| {
        IOError::MissingColumns {
            file: file.clone(),
            missing,
            source_file: file!(),
            source_line: line!(),
        }
    })?;

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let cells = RecordCells {
            record: &record,
            indices: &indices,
            file: &file,
        };
        rows.push(cells.vis_row()?);
    }
    debug!("read {} visibility rows from {}", rows.len(), file);

    Ok(MemoryMeasurementSet::new(rows))
}

/// Write visibility rows as a dump which [`read_visibility_csv`] can load.
///
/// # Errors
///
/// Will return [`IOError::CsvError`] if the file can't be written.
pub fn write_visibility_csv<P: AsRef<Path>>(path: P, rows: &[VisRow]) -> Result<(), IOError> {
    trace!("start write_visibility_csv");
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(VIS_CSV_COLUMNS)?;
    for row in rows {
        writer.write_record(&[
            row.scan_id.to_string(),
            row.field.clone(),
            row.time.to_string(),
            row.baseline.ant1().to_string(),
            row.baseline.ant2().to_string(),
            row.polarization.to_string(),
            row.channel.to_string(),
            row.vis.re.to_string(),
            row.vis.im.to_string(),
            u8::from(row.flagged).to_string(),
        ])?;
    }
    writer.flush()?;
    debug!(
        "wrote {} visibility rows to {}",
        rows.len(),
        path.as_ref().display()
    );
    Ok(())
}
