//! Detailed flagging: classify antennas, time samples and baselines of each
//! (polarization, scan) by how far their median amplitude strays from the median of
//! the whole scan.

use std::collections::{BTreeMap, BTreeSet};

use itertools::iproduct;
use log::{debug, info, trace, warn};
use rayon::prelude::*;

use crate::{
    amplitude::{AmplitudeStore, EmptyStore},
    classify::{classify, Classification},
    config::FlagConfig,
    error::ArtipError,
    measurement_set::{FlagReason, FlagSelection, MeasurementSet},
    types::{ChannelRange, SourceType},
    util::{contiguous_ranges, pass_progress_bar},
    AntennaId, Baseline, Polarization, ScanId,
};

/// Classifications of every dimension of one (polarization, scan).
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionClasses {
    /// Median amplitude of the whole scan, the reference for every dimension
    pub ideal_median: f64,
    /// Median absolute deviation of the whole scan
    pub ideal_mad: f64,
    /// Classes of the unflagged antennas with any valid readings
    pub antennas: Classification<AntennaId>,
    /// Classes of time indices with any valid readings
    pub times: Classification<usize>,
    /// Classes of baselines with any valid readings
    pub baselines: Classification<Baseline>,
}

/// What happened when analysing one (polarization, scan).
#[derive(Debug)]
pub enum PassOutcome {
    /// The scan was classified
    Classified(DimensionClasses),
    /// The scan has rows, but all of them are flagged
    NoValidReadings,
    /// The scan could not be read
    Failed(ArtipError),
}

/// The outcome of one (polarization, scan).
#[derive(Debug)]
pub struct DetailedPass {
    /// The polarization analysed
    pub polarization: Polarization,
    /// The scan analysed
    pub scan_id: ScanId,
    /// What was found
    pub outcome: PassOutcome,
}

impl DetailedPass {
    /// The classifications, if this pass was classified
    pub fn classes(&self) -> Option<&DimensionClasses> {
        match &self.outcome {
            PassOutcome::Classified(classes) => Some(classes),
            _ => None,
        }
    }

    fn is_failed(&self) -> bool {
        matches!(self.outcome, PassOutcome::Failed(_))
    }
}

/// Results of detailed flagging for a source, one pass per (polarization, scan) in
/// polarization-major order.
#[derive(Debug)]
pub struct DetailedFlagSummary {
    /// The source which was analysed
    pub source_type: SourceType,
    /// Every (polarization, scan) pass
    pub passes: Vec<DetailedPass>,
}

impl DetailedFlagSummary {
    /// Bad antennas in each scan, across all polarizations
    pub fn bad_antennas_by_scan(&self) -> BTreeMap<ScanId, BTreeSet<AntennaId>> {
        let mut bad_antennas: BTreeMap<ScanId, BTreeSet<AntennaId>> = BTreeMap::new();
        for pass in &self.passes {
            if let Some(classes) = pass.classes() {
                bad_antennas
                    .entry(pass.scan_id)
                    .or_default()
                    .extend(classes.antennas.bad());
            }
        }
        bad_antennas.retain(|_, antennas| !antennas.is_empty());
        bad_antennas
    }
}

/// The deviation of each key's slice median from `ideal_median`. Keys whose slice has no
/// valid readings are left out.
fn slice_deviations<K, I, F>(keys: I, ideal_median: f64, slice: F) -> BTreeMap<K, f64>
where
    K: Ord + Copy,
    I: IntoIterator<Item = K>,
    F: Fn(K) -> AmplitudeStore,
{
    keys.into_iter()
        .filter_map(|key| match slice(key).median() {
            Ok(slice_median) => Some((key, (slice_median - ideal_median).abs())),
            Err(EmptyStore) => None,
        })
        .collect()
}

/// Classify the antennas, time indices and baselines of a store against the median of
/// the whole store. Only `antennas` are considered in the antenna dimension.
///
/// # Errors
///
/// Will return [`EmptyStore`] if the store has no valid readings.
pub fn classify_store(
    store: &AmplitudeStore,
    antennas: &BTreeSet<AntennaId>,
) -> Result<DimensionClasses, EmptyStore> {
    let ideal_median = store.median()?;
    let ideal_mad = store.mad()?;

    let antenna_deviations = slice_deviations(antennas.iter().copied(), ideal_median, |ant| {
        store.filter_by_antenna(ant)
    });
    let time_deviations =
        slice_deviations(store.time_idxs().iter().copied(), ideal_median, |time_idx| {
            store.filter_by_time_index(time_idx)
        });
    let baseline_deviations =
        slice_deviations(store.baselines().iter().copied(), ideal_median, |baseline| {
            store.filter_by_baseline(baseline)
        });

    Ok(DimensionClasses {
        ideal_median,
        ideal_mad,
        antennas: classify(&antenna_deviations),
        times: classify(&time_deviations),
        baselines: classify(&baseline_deviations),
    })
}

/// Flags antennas, time samples and baselines from amplitude statistics
pub struct DetailedFlagger<'a, M: MeasurementSet + ?Sized> {
    ms: &'a M,
    config: &'a FlagConfig,
}

impl<'a, M: MeasurementSet + ?Sized> DetailedFlagger<'a, M> {
    /// Create a new detailed flagger
    pub fn new(ms: &'a M, config: &'a FlagConfig) -> Self {
        Self { ms, config }
    }

    fn run_pass(
        &self,
        polarization: Polarization,
        scan_id: ScanId,
        channel_range: &ChannelRange,
    ) -> PassOutcome {
        let store =
            match AmplitudeStore::from_measurement_set(self.ms, polarization, scan_id, channel_range)
            {
                Ok(store) => store,
                Err(err) => return PassOutcome::Failed(err),
            };
        let unflagged_antennas = self.ms.unflagged_antenna_ids(polarization, scan_id);
        if unflagged_antennas.is_empty() {
            debug!(
                "no unflagged antennas for pol={} scan={}",
                polarization, scan_id
            );
        }
        match classify_store(&store, &unflagged_antennas) {
            Ok(classes) => PassOutcome::Classified(classes),
            Err(EmptyStore) => PassOutcome::NoValidReadings,
        }
    }

    /// Analyse every (polarization, scan) of a source. Passes are independent and run
    /// in parallel; no flags are written.
    ///
    /// # Errors
    ///
    /// - [`ArtipError::UnknownSource`] if the source is not configured.
    /// - the first [`ArtipError::DataUnavailable`] if every pass failed. Otherwise
    ///   failed passes are reported in the summary.
    pub fn get_bad_antennas(
        &self,
        source_type: SourceType,
    ) -> Result<DetailedFlagSummary, ArtipError> {
        trace!("start get_bad_antennas");
        let source = self.config.source(source_type)?;
        let scan_ids = self.ms.scan_ids_for(&source.field);
        let pol_scans: Vec<(Polarization, ScanId)> =
            iproduct!(self.config.polarizations.iter().copied(), scan_ids).collect();

        let progress = pass_progress_bar(
            pol_scans.len(),
            "detailed flagging",
            self.config.draw_progress,
        );
        let mut passes: Vec<DetailedPass> = pol_scans
            .into_par_iter()
            .map(|(polarization, scan_id)| {
                let outcome = self.run_pass(polarization, scan_id, &source.channel_range);
                progress.inc(1);
                DetailedPass {
                    polarization,
                    scan_id,
                    outcome,
                }
            })
            .collect();
        progress.finish();

        for pass in &passes {
            log_pass(pass);
        }

        if !passes.is_empty() && passes.iter().all(DetailedPass::is_failed) {
            if let PassOutcome::Failed(err) = passes.swap_remove(0).outcome {
                return Err(err);
            }
        }

        trace!("end get_bad_antennas");
        Ok(DetailedFlagSummary {
            source_type,
            passes,
        })
    }
}

fn log_pass(pass: &DetailedPass) {
    match &pass.outcome {
        PassOutcome::Classified(classes) => {
            info!(
                "pol={} scan={}: ideal median={:.4} mad={:.4}",
                pass.polarization, pass.scan_id, classes.ideal_median, classes.ideal_mad
            );
            info!(
                "  bad antennas: {:?}, borderline: {:?}",
                classes.antennas.bad(),
                classes.antennas.borderline()
            );
            info!(
                "  bad times: {:?}, borderline: {:?}",
                classes.times.bad(),
                classes.times.borderline()
            );
            info!(
                "  bad baselines: {:?}, borderline: {:?}",
                classes.baselines.bad(),
                classes.baselines.borderline()
            );
        }
        PassOutcome::NoValidReadings => {
            info!(
                "pol={} scan={}: every reading is flagged",
                pass.polarization, pass.scan_id
            );
        }
        PassOutcome::Failed(err) => {
            warn!(
                "pol={} scan={} failed: {}",
                pass.polarization, pass.scan_id, err
            );
        }
    }
}

/// Selections which flag everything classified bad by a detailed flagging summary:
/// bad antennas and baselines within their scan, and bad time samples of every
/// baseline.
pub fn flag_selections(summary: &DetailedFlagSummary) -> Vec<FlagSelection> {
    let mut selections = vec![];
    for pass in &summary.passes {
        let classes = match pass.classes() {
            Some(classes) => classes,
            None => continue,
        };
        let within_pass = |reason| FlagSelection {
            scan_ids: vec![pass.scan_id],
            polarizations: vec![pass.polarization],
            ..FlagSelection::new(reason)
        };
        let bad_antennas = classes.antennas.bad();
        if !bad_antennas.is_empty() {
            selections.push(FlagSelection {
                antennas: bad_antennas,
                ..within_pass(FlagReason::BadAntennaTime)
            });
        }
        let bad_times = classes.times.bad();
        if !bad_times.is_empty() {
            selections.push(FlagSelection {
                time_idx_ranges: contiguous_ranges(&bad_times),
                ..within_pass(FlagReason::BadTime)
            });
        }
        let bad_baselines = classes.baselines.bad();
        if !bad_baselines.is_empty() {
            selections.push(FlagSelection {
                baselines: bad_baselines,
                ..within_pass(FlagReason::BadBaselineTime)
            });
        }
    }
    selections
}
