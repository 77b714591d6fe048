use itertools::iproduct;
use num_complex::Complex;

use std::collections::BTreeMap;

use crate::{
    config::{FlagConfig, SourceConfig},
    measurement_set::{MemoryMeasurementSet, VisRow},
    types::{ChannelRange, SourceType},
    AntennaId, Baseline, Polarization, ScanId,
};

pub const FLUX_FIELD: &str = "3C286";

/// Shape of a synthetic observation of a single field.
#[derive(Debug, Clone)]
pub struct SyntheticObs {
    pub num_ants: usize,
    pub num_times: usize,
    pub num_chans: usize,
    pub scan_ids: Vec<ScanId>,
    pub polarizations: Vec<Polarization>,
    pub field: String,
}

impl Default for SyntheticObs {
    fn default() -> Self {
        Self {
            num_ants: 4,
            num_times: 4,
            num_chans: 4,
            scan_ids: vec![1],
            polarizations: vec![Polarization::RR, Polarization::LL],
            field: FLUX_FIELD.into(),
        }
    }
}

/// Every cross-correlation baseline between `num_ants` antennas.
pub fn cross_baselines(num_ants: usize) -> Vec<Baseline> {
    iproduct!(0..num_ants, 0..num_ants)
        .filter(|(ant1, ant2)| ant1 < ant2)
        .map(Baseline::from)
        .collect()
}

/// A synthetic observation where every visibility is `10 + 0i` and unflagged.
pub fn synthetic_ms(obs: &SyntheticObs) -> MemoryMeasurementSet {
    synthetic_ms_with(obs, |_, _, _, _| Some(Complex::new(10., 0.)))
}

/// A synthetic observation with every sample produced by `vis_fn(pol, scan, time_idx,
/// baseline)`, the same in every channel. `None` produces a flagged sample.
pub fn synthetic_ms_with<F>(obs: &SyntheticObs, vis_fn: F) -> MemoryMeasurementSet
where
    F: Fn(Polarization, ScanId, usize, Baseline) -> Option<Complex<f64>>,
{
    synthetic_ms_for_baselines(obs, &cross_baselines(obs.num_ants), vis_fn)
}

/// Like [`synthetic_ms_with`], but only for the given baselines.
pub fn synthetic_ms_for_baselines<F>(
    obs: &SyntheticObs,
    baselines: &[Baseline],
    vis_fn: F,
) -> MemoryMeasurementSet
where
    F: Fn(Polarization, ScanId, usize, Baseline) -> Option<Complex<f64>>,
{
    let mut rows = vec![];
    for (scan_pos, &scan_id) in obs.scan_ids.iter().enumerate() {
        for (&pol, time_idx, baseline, channel) in iproduct!(
            obs.polarizations.iter(),
            0..obs.num_times,
            baselines.iter().copied(),
            0..obs.num_chans
        ) {
            let vis = vis_fn(pol, scan_id, time_idx, baseline);
            rows.push(VisRow {
                scan_id,
                field: obs.field.clone(),
                time: 1000. * scan_pos as f64 + 10. * time_idx as f64,
                baseline,
                polarization: pol,
                channel,
                vis: vis.unwrap_or_default(),
                flagged: vis.is_none(),
            });
        }
    }
    MemoryMeasurementSet::new(rows)
}

/// A visibility with the given amplitude and phase
pub fn phasor(amplitude: f64, phase: f64) -> Complex<f64> {
    Complex::from_polar(amplitude, phase)
}

/// Baselines among three disjoint triangles of antennas (0,1,2), (3,4,5) and (6,7,8)
pub fn disjoint_triangle_baselines() -> Vec<Baseline> {
    [0, 3, 6]
        .into_iter()
        .flat_map(|first: AntennaId| {
            [
                Baseline::new(first, first + 1),
                Baseline::new(first + 1, first + 2),
                Baseline::new(first, first + 2),
            ]
        })
        .collect()
}

/// Configuration for the flux calibrator of [`SyntheticObs::default`], without
/// progress bars.
pub fn flux_config(polarizations: &[Polarization]) -> FlagConfig {
    FlagConfig {
        polarizations: polarizations.to_vec(),
        sources: BTreeMap::from([(
            SourceType::FluxCalibration,
            SourceConfig {
                field: FLUX_FIELD.into(),
                channel_range: ChannelRange { start: 0, end: 3 },
            },
        )]),
        draw_progress: false,
        ..FlagConfig::default()
    }
}
