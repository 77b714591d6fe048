//! Amplitude readings for a single polarization and scan, indexed by baseline and time.

use std::collections::BTreeSet;

use log::trace;
use ndarray::{Array2, Axis};
use thiserror::Error;

use crate::{
    error::ArtipError,
    measurement_set::{MeasurementSet, VisChunk},
    stats::{median, median_absolute_deviation},
    types::ChannelRange,
    AntennaId, Baseline, Polarization, ScanId,
};

/// A statistic was requested from a store with no valid readings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no valid readings in amplitude store")]
pub struct EmptyStore;

/// The same (baseline, time index) was given more than one amplitude.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("more than one reading for baseline {baseline} at time index {time_idx}")]
pub struct DuplicateReading {
    /// The repeated baseline
    pub baseline: Baseline,
    /// The repeated time index
    pub time_idx: usize,
}

/// An immutable snapshot of amplitudes for one (polarization, scan, channel range)
/// selection.
///
/// Each cell of the `[baseline][time]` matrix is `None` when there is no data, or when
/// every channel of that cell is flagged. Filters return new, smaller stores.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeStore {
    baselines: Vec<Baseline>,
    time_idxs: Vec<usize>,
    amp_array: Array2<Option<f64>>,
}

impl AmplitudeStore {
    /// Read the amplitudes of a selection from a measurement set.
    ///
    /// # Errors
    ///
    /// Will return [`ArtipError::DataUnavailable`] if the measurement set has no rows
    /// for the selection. If every row is flagged, the store is empty instead.
    pub fn from_measurement_set<M: MeasurementSet + ?Sized>(
        ms: &M,
        polarization: Polarization,
        scan_id: ScanId,
        channel_range: &ChannelRange,
    ) -> Result<Self, ArtipError> {
        let chunk = ms.read_visibilities(polarization, scan_id, channel_range)?;
        Ok(Self::from_chunk(&chunk))
    }

    /// The amplitude of the channel-averaged visibility of each (baseline, time).
    pub fn from_chunk(chunk: &VisChunk) -> Self {
        trace!(
            "building amplitude store for pol={} scan={}",
            chunk.polarization,
            chunk.scan_id
        );
        let amp_array = chunk
            .channel_averaged()
            .t()
            .map(|vis| vis.map(|vis| vis.norm()));
        Self {
            baselines: chunk.baselines.clone(),
            time_idxs: chunk.time_idxs.clone(),
            amp_array,
        }
    }

    /// Build a store from `(baseline, time index, amplitude)` triples in any order.
    ///
    /// # Errors
    ///
    /// Will return [`DuplicateReading`] if a (baseline, time index) appears twice.
    pub fn from_readings<I>(readings: I) -> Result<Self, DuplicateReading>
    where
        I: IntoIterator<Item = (Baseline, usize, f64)>,
    {
        let readings: Vec<_> = readings.into_iter().collect();
        let baselines: Vec<Baseline> = readings
            .iter()
            .map(|&(baseline, ..)| baseline)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let time_idxs: Vec<usize> = readings
            .iter()
            .map(|&(_, time_idx, _)| time_idx)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut amp_array = Array2::from_elem((baselines.len(), time_idxs.len()), None);
        for (baseline, time_idx, amplitude) in readings {
            if let (Ok(bl_pos), Ok(time_pos)) = (
                baselines.binary_search(&baseline),
                time_idxs.binary_search(&time_idx),
            ) {
                let cell = &mut amp_array[(bl_pos, time_pos)];
                if cell.is_some() {
                    return Err(DuplicateReading { baseline, time_idx });
                }
                *cell = Some(amplitude);
            }
        }
        Ok(Self {
            baselines,
            time_idxs,
            amp_array,
        })
    }

    /// The baselines in this store, in ascending order
    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    /// The time indices in this store, in ascending order
    pub fn time_idxs(&self) -> &[usize] {
        &self.time_idxs
    }

    /// Iterate over the valid `(baseline, time index, amplitude)` readings.
    pub fn readings(&self) -> impl Iterator<Item = (Baseline, usize, f64)> + '_ {
        self.amp_array
            .indexed_iter()
            .filter_map(move |((bl_pos, time_pos), amp)| {
                amp.map(|amp| (self.baselines[bl_pos], self.time_idxs[time_pos], amp))
            })
    }

    fn values(&self) -> Vec<f64> {
        self.amp_array.iter().filter_map(|&amp| amp).collect()
    }

    /// The number of valid readings
    pub fn len(&self) -> usize {
        self.amp_array.iter().filter(|amp| amp.is_some()).count()
    }

    /// Whether the store has no valid readings
    pub fn is_empty(&self) -> bool {
        self.amp_array.iter().all(Option::is_none)
    }

    /// The number of distinct time indices in the store
    pub fn readings_count(&self) -> usize {
        self.time_idxs.len()
    }

    /// Median of all valid amplitudes.
    ///
    /// # Errors
    ///
    /// Will return [`EmptyStore`] if there are no valid readings.
    pub fn median(&self) -> Result<f64, EmptyStore> {
        median(&self.values()).ok_or(EmptyStore)
    }

    /// Median absolute deviation of all valid amplitudes.
    ///
    /// # Errors
    ///
    /// Will return [`EmptyStore`] if there are no valid readings.
    pub fn mad(&self) -> Result<f64, EmptyStore> {
        median_absolute_deviation(&self.values()).ok_or(EmptyStore)
    }

    fn select_baselines<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Baseline) -> bool,
    {
        let bl_positions: Vec<usize> = self
            .baselines
            .iter()
            .enumerate()
            .filter(|(_, baseline)| predicate(baseline))
            .map(|(bl_pos, _)| bl_pos)
            .collect();
        Self {
            baselines: bl_positions.iter().map(|&pos| self.baselines[pos]).collect(),
            time_idxs: self.time_idxs.clone(),
            amp_array: self.amp_array.select(Axis(0), &bl_positions),
        }
    }

    /// Readings of the baselines which include `antenna`
    pub fn filter_by_antenna(&self, antenna: AntennaId) -> Self {
        self.select_baselines(|baseline| baseline.contains(antenna))
    }

    /// Readings of exactly `baseline`, at every time
    pub fn filter_by_baseline(&self, baseline: Baseline) -> Self {
        self.select_baselines(|&other| other == baseline)
    }

    /// Readings at `time_idx`, for every baseline
    pub fn filter_by_time_index(&self, time_idx: usize) -> Self {
        let time_positions: Vec<usize> =
            self.time_idxs.binary_search(&time_idx).into_iter().collect();
        Self {
            baselines: self.baselines.clone(),
            time_idxs: time_positions.iter().map(|&pos| self.time_idxs[pos]).collect(),
            amp_array: self.amp_array.select(Axis(1), &time_positions),
        }
    }
}
