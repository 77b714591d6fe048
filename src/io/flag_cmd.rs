//! Flag command lists, one `key='value'` command per line, as read by CASA's
//! `flagdata(mode='list')`.

use std::{
    fs::File,
    io::{BufWriter, Write},
    ops::Range,
    path::Path,
};

use itertools::Itertools;
use log::{debug, trace};

use super::error::IOError;
use crate::{
    measurement_set::{FlagSelection, MemoryMeasurementSet},
    ScanId,
};

/// Timestamps of each half-open range of time indices, as `start~end` in seconds.
/// Indices past the last timestamp are clipped, and ranges entirely past it dropped.
fn format_timerange(timestamps: &[f64], ranges: &[Range<usize>]) -> String {
    ranges
        .iter()
        .filter_map(|range| {
            let start = timestamps.get(range.start)?;
            let last_idx = range.end.saturating_sub(1).min(timestamps.len() - 1);
            let end = timestamps.get(last_idx)?;
            Some(format!("{:.3}~{:.3}", start, end))
        })
        .join(",")
}

/// The flag command for a selection. `timerange` is only written if given.
pub fn flag_command(selection: &FlagSelection, timerange: Option<&str>) -> String {
    let mut pairs = vec![("mode", "manual".to_string())];
    let antenna = selection
        .antennas
        .iter()
        .map(ToString::to_string)
        .chain(selection.baselines.iter().map(ToString::to_string))
        .join(";");
    if !antenna.is_empty() {
        pairs.push(("antenna", antenna));
    }
    if !selection.scan_ids.is_empty() {
        pairs.push(("scan", selection.scan_ids.iter().join(",")));
    }
    if !selection.polarizations.is_empty() {
        pairs.push(("correlation", selection.polarizations.iter().join(",")));
    }
    if let Some(timerange) = timerange {
        pairs.push(("timerange", timerange.to_string()));
    }
    pairs.push(("reason", selection.reason.to_string()));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}='{}'", key, value))
        .join(" ")
}

/// The flag commands for a selection. Selections with time ranges are split into one
/// command per scan, since time indices are resolved against each scan's timestamps.
pub fn flag_commands(ms: &MemoryMeasurementSet, selection: &FlagSelection) -> Vec<String> {
    if selection.time_idx_ranges.is_empty() {
        return vec![flag_command(selection, None)];
    }
    let scan_ids: Vec<ScanId> = if selection.scan_ids.is_empty() {
        ms.scan_ids()
    } else {
        selection.scan_ids.clone()
    };
    scan_ids
        .into_iter()
        .filter_map(|scan_id| {
            let timestamps = ms.timestamps(scan_id);
            if timestamps.is_empty() {
                return None;
            }
            let timerange = format_timerange(&timestamps, &selection.time_idx_ranges);
            if timerange.is_empty() {
                return None;
            }
            let in_scan = FlagSelection {
                scan_ids: vec![scan_id],
                ..selection.clone()
            };
            Some(flag_command(&in_scan, Some(&timerange)))
        })
        .collect()
}

/// Write a command for every selection flagged in `ms` so far, in order.
///
/// # Errors
///
/// Will return [`IOError::StdIOError`] if the file can't be written.
pub fn write_flag_commands<P: AsRef<Path>>(
    path: P,
    ms: &MemoryMeasurementSet,
) -> Result<(), IOError> {
    trace!("start write_flag_commands");
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    let mut num_commands = 0;
    for selection in ms.flag_log() {
        for command in flag_commands(ms, selection) {
            writeln!(writer, "{}", command)?;
            num_commands += 1;
        }
    }
    writer.flush()?;
    debug!(
        "wrote {} flag commands to {}",
        num_commands,
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        measurement_set::{FlagReason, MeasurementSet},
        test_common::{synthetic_ms, SyntheticObs},
        Baseline, Polarization,
    };

    #[test]
    fn test_flag_command() {
        let selection = FlagSelection {
            antennas: vec![5],
            baselines: vec![Baseline::new(2, 1)],
            scan_ids: vec![1, 3],
            polarizations: vec![Polarization::RR],
            ..FlagSelection::new(FlagReason::BadAntennaTime)
        };
        assert_eq!(
            flag_command(&selection, None),
            "mode='manual' antenna='5;1&2' scan='1,3' correlation='RR' reason='BAD_ANTENNA_TIME'"
        );
        assert_eq!(
            flag_command(&FlagSelection::new(FlagReason::BadTime), Some("1.000~2.000")),
            "mode='manual' timerange='1.000~2.000' reason='BAD_TIME'"
        );
    }

    #[test]
    fn test_format_timerange() {
        let timestamps = [10., 20., 30., 40.];
        assert_eq!(
            format_timerange(&timestamps, &[0..2, 3..9]),
            "10.000~20.000,40.000~40.000"
        );
        assert_eq!(format_timerange(&timestamps, &[4..6]), "");
    }

    #[test]
    fn test_write_flag_commands() {
        let obs = SyntheticObs {
            scan_ids: vec![1, 2],
            ..SyntheticObs::default()
        };
        let mut ms = synthetic_ms(&obs);
        ms.flag(FlagSelection {
            antennas: vec![3],
            ..FlagSelection::new(FlagReason::BadAntenna)
        })
        .unwrap();
        ms.flag(FlagSelection {
            time_idx_ranges: vec![1..3],
            polarizations: vec![Polarization::LL],
            ..FlagSelection::new(FlagReason::BadTime)
        })
        .unwrap();

        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("flags.txt");
        write_flag_commands(&path, &ms).unwrap();

        let contents = read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "mode='manual' antenna='3' reason='BAD_ANTENNA'",
                "mode='manual' scan='1' correlation='LL' timerange='10.000~20.000' reason='BAD_TIME'",
                "mode='manual' scan='2' correlation='LL' timerange='1010.000~1020.000' reason='BAD_TIME'",
            ]
        );
    }
}
