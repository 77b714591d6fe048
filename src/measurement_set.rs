//! The measurement set collaborator: topology, visibility retrieval and flag writes.

use std::{
    collections::{BTreeSet, HashMap},
    ops::Range,
};

use log::{debug, trace};
use ndarray::{s, Array2, Array3};
use num_complex::Complex;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    error::ArtipError, types::ChannelRange, AntennaId, Baseline, Polarization, ScanId,
};

/// Storage of visibilities and their flags, which the flaggers read from and write
/// flags to.
///
/// Reads take `&self` and must be safe to share between threads, flag writes take
/// `&mut self`.
pub trait MeasurementSet: Sync {
    /// All antennas in the array, in ascending order
    fn antennas(&self) -> Vec<AntennaId>;

    /// The scan ids in which `field` was observed, in ascending order
    fn scan_ids_for(&self, field: &str) -> Vec<ScanId>;

    /// Antennas which still have unflagged cross-correlation data for this
    /// polarization and scan.
    fn unflagged_antenna_ids(&self, polarization: Polarization, scan_id: ScanId)
        -> BTreeSet<AntennaId>;

    /// Read the cross-correlation visibilities for a selection.
    ///
    /// # Errors
    ///
    /// Will return [`ArtipError::DataUnavailable`] if there are no rows at all for
    /// the selection. A selection where every row is flagged is not an error.
    fn read_visibilities(
        &self,
        polarization: Polarization,
        scan_id: ScanId,
        channel_range: &ChannelRange,
    ) -> Result<VisChunk, ArtipError>;

    /// Mark a selection as flagged in the underlying storage.
    ///
    /// # Errors
    ///
    /// Depends on the storage.
    fn flag(&mut self, selection: FlagSelection) -> Result<(), ArtipError>;
}

/// Visibilities for one (polarization, scan, channel range) selection.
#[derive(Debug, Clone)]
pub struct VisChunk {
    /// The polarization which was read
    pub polarization: Polarization,
    /// The scan which was read
    pub scan_id: ScanId,
    /// Baselines along the last axis of the arrays
    pub baselines: Vec<Baseline>,
    /// Time indices along the first axis of the arrays
    pub time_idxs: Vec<usize>,
    /// Visibilities, dimensions `[time][channel][baseline]`
    pub vis_array: Array3<Complex<f64>>,
    /// Flags, same dimensions as `vis_array`. Missing cells are flagged.
    pub flag_array: Array3<bool>,
}

impl VisChunk {
    /// Vector-average the unflagged channels of each (time, baseline). Cells with
    /// every channel flagged are `None`.
    ///
    /// Dimensions of the result are `[time][baseline]`
    pub fn channel_averaged(&self) -> Array2<Option<Complex<f64>>> {
        let (num_times, _, num_baselines) = self.vis_array.dim();
        Array2::from_shape_fn((num_times, num_baselines), |(time_idx, bl_idx)| {
            let vis = self.vis_array.slice(s![time_idx, .., bl_idx]);
            let flags = self.flag_array.slice(s![time_idx, .., bl_idx]);
            let (sum, count) = vis
                .iter()
                .zip(flags.iter())
                .filter(|&(_, &flag)| !flag)
                .fold((Complex::new(0., 0.), 0_usize), |(sum, count), (vis, _)| {
                    (sum + vis, count + 1)
                });
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        })
    }
}

/// Why a selection was flagged. Written alongside flag commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagReason {
    /// The whole antenna is bad
    BadAntenna,
    /// The whole baseline is bad
    BadBaseline,
    /// An antenna is bad within a scan
    BadAntennaTime,
    /// A baseline is bad within a scan
    BadBaselineTime,
    /// Some time samples are bad for every baseline
    BadTime,
}

/// A selection of visibilities to flag.
///
/// Empty `scan_ids`, `polarizations` and `time_idx_ranges` select everything along
/// that axis. A row is selected by `antennas` and `baselines` if either end of its
/// baseline is in `antennas`, or its baseline is in `baselines`; if both are empty
/// every baseline is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSelection {
    /// Scans to flag
    pub scan_ids: Vec<ScanId>,
    /// Polarizations to flag
    pub polarizations: Vec<Polarization>,
    /// Antennas to flag
    pub antennas: Vec<AntennaId>,
    /// Baselines to flag
    pub baselines: Vec<Baseline>,
    /// Half-open ranges of time indices to flag
    pub time_idx_ranges: Vec<Range<usize>>,
    /// Why this selection is being flagged
    pub reason: FlagReason,
}

impl FlagSelection {
    /// A selection of everything, to be narrowed with struct update syntax.
    pub fn new(reason: FlagReason) -> Self {
        Self {
            scan_ids: vec![],
            polarizations: vec![],
            antennas: vec![],
            baselines: vec![],
            time_idx_ranges: vec![],
            reason,
        }
    }

    fn selects_baseline(&self, baseline: &Baseline) -> bool {
        if self.antennas.is_empty() && self.baselines.is_empty() {
            return true;
        }
        self.antennas.iter().any(|&ant| baseline.contains(ant))
            || self.baselines.contains(baseline)
    }

    fn selects_time_idx(&self, time_idx: usize) -> bool {
        self.time_idx_ranges.is_empty()
            || self
                .time_idx_ranges
                .iter()
                .any(|range| range.contains(&time_idx))
    }

    /// Whether a visibility row falls within this selection.
    pub fn selects(&self, row: &VisRow, time_idx: usize) -> bool {
        (self.scan_ids.is_empty() || self.scan_ids.contains(&row.scan_id))
            && (self.polarizations.is_empty() || self.polarizations.contains(&row.polarization))
            && self.selects_baseline(&row.baseline)
            && self.selects_time_idx(time_idx)
    }
}

/// A single visibility sample.
#[derive(Debug, Clone, PartialEq)]
pub struct VisRow {
    /// Scan number
    pub scan_id: ScanId,
    /// Name of the observed field
    pub field: String,
    /// Timestamp in seconds
    pub time: f64,
    /// Correlated antennas
    pub baseline: Baseline,
    /// Correlation product
    pub polarization: Polarization,
    /// Channel index
    pub channel: usize,
    /// Complex visibility
    pub vis: Complex<f64>,
    /// Whether the sample is flagged
    pub flagged: bool,
}

/// A [`MeasurementSet`] held entirely in memory, e.g. loaded from a visibility dump.
///
/// Time indices are positions in the sorted distinct timestamps of a scan, across all
/// polarizations and channels.
#[derive(Debug, Default, Clone)]
pub struct MemoryMeasurementSet {
    rows: Vec<VisRow>,
    flag_log: Vec<FlagSelection>,
}

impl MemoryMeasurementSet {
    /// Create a measurement set from visibility rows
    pub fn new(rows: Vec<VisRow>) -> Self {
        Self {
            rows,
            flag_log: vec![],
        }
    }

    /// All visibility rows, with their current flags
    pub fn rows(&self) -> &[VisRow] {
        &self.rows
    }

    /// Every selection flagged so far, in order
    pub fn flag_log(&self) -> &[FlagSelection] {
        &self.flag_log
    }

    /// All scan ids, in ascending order
    pub fn scan_ids(&self) -> Vec<ScanId> {
        let scan_ids: BTreeSet<ScanId> = self.rows.iter().map(|row| row.scan_id).collect();
        scan_ids.into_iter().collect()
    }

    /// The sorted, distinct timestamps of a scan. A time index is a position in this.
    pub fn timestamps(&self, scan_id: ScanId) -> Vec<f64> {
        let mut timestamps: Vec<f64> = self
            .rows
            .iter()
            .filter(|row| row.scan_id == scan_id)
            .map(|row| row.time)
            .collect();
        timestamps.sort_by(f64::total_cmp);
        timestamps.dedup();
        timestamps
    }

    fn timestamps_by_scan(&self) -> HashMap<ScanId, Vec<f64>> {
        self.scan_ids()
            .into_iter()
            .map(|scan_id| (scan_id, self.timestamps(scan_id)))
            .collect()
    }
}

fn time_idx_of(timestamps: &[f64], time: f64) -> usize {
    // every row's timestamp is in its scan's timestamps
    timestamps
        .binary_search_by(|probe| probe.total_cmp(&time))
        .unwrap_or_else(|idx| idx)
}

impl MeasurementSet for MemoryMeasurementSet {
    fn antennas(&self) -> Vec<AntennaId> {
        let antennas: BTreeSet<AntennaId> = self
            .rows
            .iter()
            .flat_map(|row| [row.baseline.ant1(), row.baseline.ant2()])
            .collect();
        antennas.into_iter().collect()
    }

    fn scan_ids_for(&self, field: &str) -> Vec<ScanId> {
        let scan_ids: BTreeSet<ScanId> = self
            .rows
            .iter()
            .filter(|row| row.field == field)
            .map(|row| row.scan_id)
            .collect();
        scan_ids.into_iter().collect()
    }

    fn unflagged_antenna_ids(
        &self,
        polarization: Polarization,
        scan_id: ScanId,
    ) -> BTreeSet<AntennaId> {
        self.rows
            .iter()
            .filter(|row| {
                row.scan_id == scan_id
                    && row.polarization == polarization
                    && !row.baseline.is_auto()
                    && !row.flagged
            })
            .flat_map(|row| [row.baseline.ant1(), row.baseline.ant2()])
            .collect()
    }

    fn read_visibilities(
        &self,
        polarization: Polarization,
        scan_id: ScanId,
        channel_range: &ChannelRange,
    ) -> Result<VisChunk, ArtipError> {
        trace!(
            "start read_visibilities pol={} scan={} chans={}",
            polarization,
            scan_id,
            channel_range
        );
        let selected: Vec<&VisRow> = self
            .rows
            .iter()
            .filter(|row| {
                row.scan_id == scan_id
                    && row.polarization == polarization
                    && !row.baseline.is_auto()
                    && channel_range.contains(row.channel)
            })
            .collect();

        if selected.is_empty() {
            return Err(ArtipError::DataUnavailable {
                polarization,
                scan_id,
                source_file: file!(),
                source_line: line!(),
            });
        }

        let scan_timestamps = self.timestamps(scan_id);
        let time_idxs: Vec<usize> = selected
            .iter()
            .map(|row| time_idx_of(&scan_timestamps, row.time))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let channels: Vec<usize> = selected
            .iter()
            .map(|row| row.channel)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let baselines: Vec<Baseline> = selected
            .iter()
            .map(|row| row.baseline)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let shape = (time_idxs.len(), channels.len(), baselines.len());
        let mut vis_array = Array3::from_elem(shape, Complex::new(0., 0.));
        let mut flag_array = Array3::from_elem(shape, true);
        for row in selected {
            // all three lookups succeed, the axes were built from these rows
            let time_pos = time_idxs
                .binary_search(&time_idx_of(&scan_timestamps, row.time))
                .unwrap_or_default();
            let chan_pos = channels.binary_search(&row.channel).unwrap_or_default();
            let bl_pos = baselines.binary_search(&row.baseline).unwrap_or_default();
            vis_array[(time_pos, chan_pos, bl_pos)] = row.vis;
            flag_array[(time_pos, chan_pos, bl_pos)] = row.flagged;
        }
        debug!(
            "read {} times, {} channels, {} baselines for pol={} scan={}",
            shape.0, shape.1, shape.2, polarization, scan_id
        );

        Ok(VisChunk {
            polarization,
            scan_id,
            baselines,
            time_idxs,
            vis_array,
            flag_array,
        })
    }

    fn flag(&mut self, selection: FlagSelection) -> Result<(), ArtipError> {
        let timestamps_by_scan = self.timestamps_by_scan();
        let mut num_flagged = 0;
        for row in self.rows.iter_mut() {
            let time_idx = timestamps_by_scan
                .get(&row.scan_id)
                .map_or(0, |timestamps| time_idx_of(timestamps, row.time));
            if !row.flagged && selection.selects(row, time_idx) {
                row.flagged = true;
                num_flagged += 1;
            }
        }
        debug!(
            "flagged {} rows for {} in scans {:?}",
            num_flagged, selection.reason, selection.scan_ids
        );
        self.flag_log.push(selection);
        Ok(())
    }
}
