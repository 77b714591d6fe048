//! Flag baselines which take part in triangles with large closure phases.
//!
//! The closure phase of a triangle of antennas `i < j < k` is
//! `phase(i,j) + phase(j,k) - phase(i,k)`. Antenna-based phase errors cancel in this sum,
//! so a consistent instrument has zero closure phase on every triangle, and what remains
//! is due to baseline-based errors.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    f64::consts::{PI, TAU},
};

use itertools::{iproduct, Itertools};
use log::{info, trace};
use rayon::prelude::*;

use crate::{
    classify::classify,
    config::FlagConfig,
    constants::CLOSURE_PHASE_TOLERANCE,
    error::ArtipError,
    measurement_set::{MeasurementSet, VisChunk},
    stats::median,
    util::{pass_progress_bar, union_bad_baselines},
    AntennaId, Baseline, Polarization, ScanId,
};

/// A triangle of antennas, in ascending order
pub type Triangle = (AntennaId, AntennaId, AntennaId);

/// Wrap a phase in radians to `(-pi, pi]`.
pub fn wrap_phase(phase: f64) -> f64 {
    let mut wrapped = (phase + PI) % TAU;
    if wrapped <= 0. {
        wrapped += TAU;
    }
    wrapped - PI
}

/// The mean absolute closure phase of every triangle in a chunk, after averaging
/// channels. Only times where all three baselines have valid data are used, and
/// triangles without any such time are left out. Closure phases below
/// [`CLOSURE_PHASE_TOLERANCE`] count as zero.
pub fn triangle_residuals(chunk: &VisChunk) -> BTreeMap<Triangle, f64> {
    let averaged = chunk.channel_averaged();
    let bl_positions: HashMap<Baseline, usize> = chunk
        .baselines
        .iter()
        .enumerate()
        .map(|(bl_pos, &baseline)| (baseline, bl_pos))
        .collect();
    let antennas: BTreeSet<AntennaId> = chunk
        .baselines
        .iter()
        .flat_map(|baseline| [baseline.ant1(), baseline.ant2()])
        .collect();

    let mut residuals = BTreeMap::new();
    for (ant_i, ant_j, ant_k) in antennas.iter().copied().tuple_combinations() {
        let (pos_ij, pos_jk, pos_ik) = match (
            bl_positions.get(&Baseline::new(ant_i, ant_j)),
            bl_positions.get(&Baseline::new(ant_j, ant_k)),
            bl_positions.get(&Baseline::new(ant_i, ant_k)),
        ) {
            (Some(&ij), Some(&jk), Some(&ik)) => (ij, jk, ik),
            _ => continue,
        };
        let closures: Vec<f64> = averaged
            .outer_iter()
            .filter_map(|vis_t| match (vis_t[pos_ij], vis_t[pos_jk], vis_t[pos_ik]) {
                (Some(ij), Some(jk), Some(ik)) => {
                    let closure = wrap_phase(ij.arg() + jk.arg() - ik.arg()).abs();
                    Some(if closure < CLOSURE_PHASE_TOLERANCE {
                        0.
                    } else {
                        closure
                    })
                }
                _ => None,
            })
            .collect();
        if !closures.is_empty() {
            let mean = closures.iter().sum::<f64>() / closures.len() as f64;
            residuals.insert((ant_i, ant_j, ant_k), mean);
        }
    }
    residuals
}

/// The median residual of the triangles each baseline takes part in.
pub fn baseline_closure_residuals(
    triangle_residuals: &BTreeMap<Triangle, f64>,
) -> BTreeMap<Baseline, f64> {
    let mut by_baseline: BTreeMap<Baseline, Vec<f64>> = BTreeMap::new();
    for (&(ant_i, ant_j, ant_k), &residual) in triangle_residuals {
        for baseline in [
            Baseline::new(ant_i, ant_j),
            Baseline::new(ant_j, ant_k),
            Baseline::new(ant_i, ant_k),
        ] {
            by_baseline.entry(baseline).or_default().push(residual);
        }
    }
    by_baseline
        .into_iter()
        .filter_map(|(baseline, residuals)| median(&residuals).map(|m| (baseline, m)))
        .collect()
}

/// Flags baselines from closure phases of the closure source.
pub struct ClosureFlagger<'a, M: MeasurementSet + ?Sized> {
    ms: &'a M,
    config: &'a FlagConfig,
}

impl<'a, M: MeasurementSet + ?Sized> ClosureFlagger<'a, M> {
    /// Create a new closure phase flagger
    pub fn new(ms: &'a M, config: &'a FlagConfig) -> Self {
        Self { ms, config }
    }

    /// Baselines whose closure residual is bad in any (polarization, scan) of the
    /// closure source.
    ///
    /// # Errors
    ///
    /// - [`ArtipError::UnknownSource`] if the closure source is not configured.
    /// - the first [`ArtipError::DataUnavailable`] if no (polarization, scan) could be
    ///   read.
    pub fn get_bad_baselines(&self) -> Result<BTreeSet<Baseline>, ArtipError> {
        trace!("start closure get_bad_baselines");
        let source = self.config.source(self.config.closure_source)?;
        let scan_ids = self.ms.scan_ids_for(&source.field);
        let pol_scans: Vec<(Polarization, ScanId)> =
            iproduct!(self.config.polarizations.iter().copied(), scan_ids).collect();

        let progress = pass_progress_bar(
            pol_scans.len(),
            "closure phases",
            self.config.draw_progress,
        );
        let passes: Vec<_> = pol_scans
            .into_par_iter()
            .map(|(polarization, scan_id)| {
                let result = self
                    .ms
                    .read_visibilities(polarization, scan_id, &source.channel_range)
                    .map(|chunk| {
                        let residuals = baseline_closure_residuals(&triangle_residuals(&chunk));
                        classify(&residuals)
                    });
                progress.inc(1);
                (polarization, scan_id, result)
            })
            .collect();
        progress.finish();

        let bad_baselines = union_bad_baselines(passes)?;
        info!(
            "{} bad baselines from closure phases: {:?}",
            bad_baselines.len(),
            bad_baselines
        );
        Ok(bad_baselines)
    }
}
