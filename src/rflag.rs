//! Flag baselines whose calibrator phases are not coherent over a scan.

use std::collections::{BTreeMap, BTreeSet};

use itertools::iproduct;
use log::{info, trace};
use ndarray::Axis;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    classify::classify,
    config::FlagConfig,
    error::ArtipError,
    measurement_set::{MeasurementSet, VisChunk},
    types::SourceType,
    util::{pass_progress_bar, union_bad_baselines},
    Baseline, Polarization, ScanId,
};

/// The circular dispersion of a set of phasors, `1 - |mean(v / |v|)|`. Zero-amplitude
/// phasors have no phase and are skipped.
///
/// This is 0 for phasors which all share a phase, and approaches 1 as phases become
/// uniformly spread. Returns `None` if there are no phasors with a phase.
///
/// # Examples
///
/// ```rust
/// use artip::rflag::phase_dispersion;
/// use num_complex::Complex;
///
/// let coherent = [Complex::new(0., 2.), Complex::new(0., 5.)];
/// assert!(phase_dispersion(coherent).unwrap().abs() < 1e-12);
///
/// let opposed = [Complex::new(1., 0.), Complex::new(-1., 0.)];
/// assert!((phase_dispersion(opposed).unwrap() - 1.).abs() < 1e-12);
/// ```
pub fn phase_dispersion<I>(phasors: I) -> Option<f64>
where
    I: IntoIterator<Item = Complex<f64>>,
{
    let (sum, count) = phasors
        .into_iter()
        .filter(|vis| vis.norm() > 0.)
        .fold((Complex::new(0., 0.), 0_usize), |(sum, count), vis| {
            (sum + vis / vis.norm(), count + 1)
        });
    if count == 0 {
        None
    } else {
        Some(1. - (sum / count as f64).norm())
    }
}

/// The phase dispersion over time of each baseline of a chunk, after averaging
/// channels. Baselines without any valid samples are left out.
pub fn baseline_dispersions(chunk: &VisChunk) -> BTreeMap<Baseline, f64> {
    let averaged = chunk.channel_averaged();
    chunk
        .baselines
        .iter()
        .zip(averaged.axis_iter(Axis(1)))
        .filter_map(|(&baseline, vis_over_time)| {
            phase_dispersion(vis_over_time.iter().flatten().copied())
                .map(|dispersion| (baseline, dispersion))
        })
        .collect()
}

/// Flags baselines by the angular dispersion of their phases on a calibrator.
pub struct RFlagger<'a, M: MeasurementSet + ?Sized> {
    ms: &'a M,
    config: &'a FlagConfig,
}

impl<'a, M: MeasurementSet + ?Sized> RFlagger<'a, M> {
    /// Create a new phase-dispersion flagger
    pub fn new(ms: &'a M, config: &'a FlagConfig) -> Self {
        Self { ms, config }
    }

    /// Baselines whose phase dispersion is bad in any (polarization, scan) of the source.
    ///
    /// # Errors
    ///
    /// - [`ArtipError::UnknownSource`] if the source is not configured.
    /// - the first [`ArtipError::DataUnavailable`] if no (polarization, scan) could be
    ///   read.
    pub fn get_bad_baselines(
        &self,
        source_type: SourceType,
    ) -> Result<BTreeSet<Baseline>, ArtipError> {
        trace!("start rflag get_bad_baselines");
        let source = self.config.source(source_type)?;
        let scan_ids = self.ms.scan_ids_for(&source.field);
        let pol_scans: Vec<(Polarization, ScanId)> =
            iproduct!(self.config.polarizations.iter().copied(), scan_ids).collect();

        let progress = pass_progress_bar(
            pol_scans.len(),
            "phase dispersion",
            self.config.draw_progress,
        );
        let passes: Vec<_> = pol_scans
            .into_par_iter()
            .map(|(polarization, scan_id)| {
                let result = self
                    .ms
                    .read_visibilities(polarization, scan_id, &source.channel_range)
                    .map(|chunk| classify(&baseline_dispersions(&chunk)));
                progress.inc(1);
                (polarization, scan_id, result)
            })
            .collect();
        progress.finish();

        let bad_baselines = union_bad_baselines(passes)?;
        info!(
            "{} bad baselines from phase dispersion: {:?}",
            bad_baselines.len(),
            bad_baselines
        );
        Ok(bad_baselines)
    }
}
